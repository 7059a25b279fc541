//! Redis-backed remote storage (`operation_mode = "remote"`): per-entity
//! key templates under a configurable prefix, and `MULTI`/`EXEC`
//! transactions wherever a write touches more than one key (segment `put`,
//! the metrics and impression flush drains).
//!
//! The storage traits in `split_core::storage` are synchronous (the
//! evaluator calls them inline, never `.await`s them), so this backend uses
//! the `redis` crate's blocking connection, guarded by a `Mutex` for
//! `Send + Sync`, rather than its async API. Callers that drive these
//! storages from inside a tokio task (`split_runtime::sync`'s sync/flush
//! bodies) push the blocking call onto `tokio::task::spawn_blocking` so it
//! never stalls a worker thread.

mod impression_storage;
mod metrics_storage;
mod segment_storage;
mod split_storage;

pub use impression_storage::RedisImpressionStorage;
pub use metrics_storage::RedisMetricsStorage;
pub use segment_storage::RedisSegmentStorage;
pub use split_storage::RedisSplitStorage;

use std::sync::Mutex;

use split_config::RemoteConfig;

/// Shared connection and key-naming scheme for every Redis-backed storage.
pub struct RedisClient {
    conn: Mutex<redis::Connection>,
    prefix: String,
    instance_scope: String,
}

impl RedisClient {
    pub fn connect(
        config: &RemoteConfig,
        instance_id: &str,
        sdk_version_tag: &str,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.connection_url())?;
        let conn = client.get_connection()?;
        Ok(Self {
            conn: Mutex::new(conn),
            prefix: config.key_prefix(),
            instance_scope: format!("SPLITIO/{sdk_version_tag}/{instance_id}"),
        })
    }

    fn split_key(&self, name: &str) -> String {
        format!("{}SPLITIO.split.{name}", self.prefix)
    }

    fn splits_till_key(&self) -> String {
        format!("{}SPLITIO.splits.till", self.prefix)
    }

    fn split_key_pattern(&self) -> String {
        format!("{}SPLITIO.split.*", self.prefix)
    }

    fn segment_key(&self, name: &str) -> String {
        format!("{}SPLITIO.segment.{name}", self.prefix)
    }

    fn segment_till_key(&self, name: &str) -> String {
        format!("{}SPLITIO.segments.till.{name}", self.prefix)
    }

    fn impressions_key(&self, feature: &str) -> String {
        format!("{}{}/impressions.{feature}", self.prefix, self.instance_scope)
    }

    fn impressions_key_pattern(&self) -> String {
        format!("{}{}/impressions.*", self.prefix, self.instance_scope)
    }

    fn counter_key(&self, name: &str) -> String {
        format!("{}{}/count.{name}", self.prefix, self.instance_scope)
    }

    fn counter_key_pattern(&self) -> String {
        format!("{}{}/count.*", self.prefix, self.instance_scope)
    }

    fn counter_key_prefix(&self) -> String {
        format!("{}{}/count.", self.prefix, self.instance_scope)
    }

    fn gauge_key(&self, name: &str) -> String {
        format!("{}{}/gauge.{name}", self.prefix, self.instance_scope)
    }

    fn gauge_key_pattern(&self) -> String {
        format!("{}{}/gauge.*", self.prefix, self.instance_scope)
    }

    fn gauge_key_prefix(&self) -> String {
        format!("{}{}/gauge.", self.prefix, self.instance_scope)
    }

    fn latency_key_prefix(&self) -> String {
        format!("{}{}/latency.", self.prefix, self.instance_scope)
    }

    fn latency_key(&self, feature: &str, bucket: usize) -> String {
        format!(
            "{}{}/latency.{feature}.bucket.{bucket}",
            self.prefix, self.instance_scope
        )
    }

    fn latency_key_pattern(&self) -> String {
        format!("{}{}/latency.*.bucket.*", self.prefix, self.instance_scope)
    }
}
