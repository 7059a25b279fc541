//! Storage traits. The evaluator only ever sees the consumer side
//! (`SplitStorage`, `SegmentStorage`); sync tasks in the runtime crate own
//! the producer methods. Keeping both sides on one trait, rather than
//! splitting into separate consumer/producer pairs, was a deliberate
//! simplification — see `DESIGN.md`.

pub mod memory;

use crate::impression::Impression;
use crate::model::{Segment, Split};

/// Split rule storage. Implementors must make `put_many` atomic with
/// respect to readers: a concurrent `get`/`get_all` never observes a
/// partially-applied sync.
pub trait SplitStorage: Send + Sync {
    /// Replace the stored split set: upsert everything in `splits` whose
    /// status is `Active`, remove anything `Archived`, and record `till` as
    /// the new sync watermark.
    fn put_many(&self, splits: Vec<Split>, till: i64);

    fn get(&self, name: &str) -> Option<Split>;

    fn get_all(&self) -> Vec<Split>;

    /// Names of every segment referenced by an `IN_SEGMENT` matcher across
    /// the current split set, used by the segment-sync task to know what to
    /// fetch.
    fn segment_names(&self) -> std::collections::HashSet<String>;

    fn till(&self) -> i64;
}

/// Segment (named key set) storage.
pub trait SegmentStorage: Send + Sync {
    /// Replace a segment's key set wholesale and record its `till`
    /// watermark. Used for tests and any caller that already holds a full
    /// snapshot rather than a delta.
    fn put(&self, name: &str, keys: std::collections::HashSet<String>, till: i64);

    /// Apply an incremental membership delta: add `added`, remove
    /// `removed`, and advance the segment's `till` watermark. Creates the
    /// segment if it doesn't exist yet. This is what the segment-sync task
    /// calls, since its fetcher contract hands back additions/removals, not
    /// a full snapshot.
    fn apply_delta(
        &self,
        name: &str,
        added: std::collections::HashSet<String>,
        removed: std::collections::HashSet<String>,
        till: i64,
    );

    fn is_in_segment(&self, name: &str, key: &str) -> bool;

    fn till(&self, name: &str) -> i64;

    fn remove(&self, name: &str);
}

/// Impression (evaluation record) storage. Impressions accumulate between
/// flushes; `pop_all` atomically drains and returns them.
pub trait ImpressionStorage: Send + Sync {
    fn put(&self, impression: Impression);

    fn pop_all(&self) -> Vec<Impression>;
}

/// Counter/gauge/latency telemetry storage.
pub trait MetricsStorage: Send + Sync {
    fn inc_latency(&self, feature: &str, bucket: usize);

    /// Drain every feature's latency histogram, returning `(feature,
    /// 23-bucket counts)` pairs for features with at least one recorded
    /// latency.
    fn pop_latencies(&self) -> Vec<(String, [u64; 23])>;

    fn inc_counter(&self, name: &str, delta: i64);

    fn pop_counters(&self) -> Vec<(String, i64)>;

    fn put_gauge(&self, name: &str, value: f64);

    /// Drain every gauge's last-written value.
    fn pop_gauges(&self) -> Vec<(String, f64)>;
}
