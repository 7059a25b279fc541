//! Transport interfaces consumed by the sync tasks. Concrete HTTP clients
//! are out of scope for this crate; these traits are the seam a host
//! application wires a real client into, and the seam the sync-task tests
//! fake.

use async_trait::async_trait;
use split_core::model::Split;

use crate::error::SyncResult;

/// One split-sync poll's worth of change data.
#[derive(Debug, Clone, Default)]
pub struct SplitChanges {
    pub splits: Vec<Split>,
    pub till: i64,
}

/// One segment-sync poll's worth of change data for a single segment: the
/// membership delta since `since`, not the full key set — matching the
/// external fetcher contract's `{name, added[], removed[], till}` shape.
#[derive(Debug, Clone, Default)]
pub struct SegmentSnapshot {
    pub added: std::collections::HashSet<String>,
    pub removed: std::collections::HashSet<String>,
    pub till: i64,
}

#[async_trait]
pub trait SplitFetcher: Send + Sync {
    /// Fetch every split change since the given `change_number` watermark.
    async fn fetch_since(&self, since: i64) -> SyncResult<SplitChanges>;
}

#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    /// Fetch `segment_name`'s membership delta (additions/removals) since
    /// `since`.
    async fn fetch(&self, segment_name: &str, since: i64) -> SyncResult<SegmentSnapshot>;
}

#[async_trait]
pub trait ImpressionsRecorder: Send + Sync {
    /// Post a batch of impressions. Per the fire-and-forget flush policy
    /// the caller drops the batch on error rather than retrying.
    async fn record(&self, impressions: Vec<split_core::Impression>) -> SyncResult<()>;
}

#[async_trait]
pub trait MetricsRecorder: Send + Sync {
    async fn record_counters(&self, counters: Vec<(String, i64)>) -> SyncResult<()>;

    async fn record_gauges(&self, gauges: Vec<(String, f64)>) -> SyncResult<()>;

    /// `(feature, 23-bucket counts)` pairs, as drained by
    /// [`split_core::storage::MetricsStorage::pop_latencies`].
    async fn record_latencies(&self, latencies: Vec<(String, [u64; 23])>) -> SyncResult<()>;
}
