//! Fixture-backed stand-ins for the remote rule service and recorder. HTTP
//! transport is out of scope for this crate; `split-cli run` reads a JSON
//! rule snapshot once and serves it as if it came off the wire, and records
//! impressions/metrics to the log instead of a collector.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use split_core::model::Split;
use split_runtime::error::SyncResult;
use split_runtime::transport::{
    ImpressionsRecorder, MetricsRecorder, SegmentFetcher, SegmentSnapshot, SplitChanges,
    SplitFetcher,
};

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    splits: Vec<Split>,
    #[serde(default)]
    segments: Vec<FixtureSegment>,
    #[serde(default)]
    till: i64,
}

#[derive(Debug, Deserialize)]
struct FixtureSegment {
    name: String,
    keys: Vec<String>,
    #[serde(default)]
    till: i64,
}

/// Serves one fixture snapshot exactly once: the first `fetch_since`/`fetch`
/// after construction returns the whole fixture; subsequent polls report no
/// change, since there is no live rule service behind this demo.
pub struct FixtureTransport {
    fixture: Fixture,
    served: Mutex<bool>,
}

impl FixtureTransport {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read fixture {}: {e}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse fixture {}: {e}", path.display()))?;
        Ok(Self {
            fixture,
            served: Mutex::new(false),
        })
    }
}

#[async_trait]
impl SplitFetcher for FixtureTransport {
    async fn fetch_since(&self, since: i64) -> SyncResult<SplitChanges> {
        let mut served = self.served.lock().expect("fixture lock poisoned");
        if *served || since >= self.fixture.till {
            return Ok(SplitChanges {
                splits: vec![],
                till: since,
            });
        }
        *served = true;
        Ok(SplitChanges {
            splits: self.fixture.splits.clone(),
            till: self.fixture.till,
        })
    }
}

#[async_trait]
impl SegmentFetcher for FixtureTransport {
    async fn fetch(&self, segment_name: &str, since: i64) -> SyncResult<SegmentSnapshot> {
        let Some(segment) = self.fixture.segments.iter().find(|s| s.name == segment_name) else {
            return Ok(SegmentSnapshot::default());
        };
        if since >= segment.till {
            return Ok(SegmentSnapshot {
                added: Default::default(),
                removed: Default::default(),
                till: since,
            });
        }
        // The fixture holds one full membership snapshot rather than a
        // delta, so the first poll reports it as "all added".
        Ok(SegmentSnapshot {
            added: segment.keys.iter().cloned().collect(),
            removed: Default::default(),
            till: segment.till,
        })
    }
}

/// Logs whatever it's handed instead of shipping it anywhere. Good enough
/// to see the sync loop's flush cadence at work.
pub struct LoggingRecorder;

#[async_trait]
impl ImpressionsRecorder for LoggingRecorder {
    async fn record(&self, impressions: Vec<split_core::Impression>) -> SyncResult<()> {
        tracing::info!(domain = "sync", count = impressions.len(), "impressions recorded");
        Ok(())
    }
}

#[async_trait]
impl MetricsRecorder for LoggingRecorder {
    async fn record_counters(&self, counters: Vec<(String, i64)>) -> SyncResult<()> {
        tracing::info!(domain = "sync", count = counters.len(), "counters recorded");
        Ok(())
    }

    async fn record_gauges(&self, gauges: Vec<(String, f64)>) -> SyncResult<()> {
        tracing::info!(domain = "sync", count = gauges.len(), "gauges recorded");
        Ok(())
    }

    async fn record_latencies(&self, latencies: Vec<(String, [u64; 23])>) -> SyncResult<()> {
        tracing::info!(domain = "sync", count = latencies.len(), "latencies recorded");
        Ok(())
    }
}
