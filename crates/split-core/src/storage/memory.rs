//! In-process storage (`operation_mode = "in-memory"`): each trait backed
//! by an `Arc<RwLock<HashMap<...>>>`, mirroring the registry pattern used
//! elsewhere in this codebase for shared mutable lookup tables.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::{ImpressionStorage, MetricsStorage, SegmentStorage, SplitStorage};
use crate::impression::Impression;
use crate::model::{Segment, Split};

#[derive(Debug, Default)]
pub struct InMemorySplitStorage {
    inner: RwLock<SplitTable>,
}

#[derive(Debug, Default)]
struct SplitTable {
    splits: HashMap<String, Split>,
    till: i64,
}

impl InMemorySplitStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SplitStorage for InMemorySplitStorage {
    fn put_many(&self, splits: Vec<Split>, till: i64) {
        let mut table = self.inner.write().expect("split storage lock poisoned");
        for split in splits {
            if split.status == crate::model::SplitStatus::Archived {
                table.splits.remove(&split.name);
            } else {
                table.splits.insert(split.name.clone(), split);
            }
        }
        table.till = till;
    }

    fn get(&self, name: &str) -> Option<Split> {
        let table = self.inner.read().expect("split storage lock poisoned");
        table.splits.get(name).cloned()
    }

    fn get_all(&self) -> Vec<Split> {
        let table = self.inner.read().expect("split storage lock poisoned");
        table.splits.values().cloned().collect()
    }

    fn segment_names(&self) -> HashSet<String> {
        let table = self.inner.read().expect("split storage lock poisoned");
        let mut names = HashSet::new();
        for split in table.splits.values() {
            for condition in &split.conditions {
                for matcher in &condition.matcher_group.matchers {
                    if let crate::matcher::MatcherKind::InSegment { segment_name } = &matcher.kind
                    {
                        names.insert(segment_name.clone());
                    }
                }
            }
        }
        names
    }

    fn till(&self) -> i64 {
        self.inner.read().expect("split storage lock poisoned").till
    }
}

#[derive(Debug, Default)]
pub struct InMemorySegmentStorage {
    inner: RwLock<HashMap<String, Segment>>,
}

impl InMemorySegmentStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SegmentStorage for InMemorySegmentStorage {
    fn put(&self, name: &str, keys: HashSet<String>, till: i64) {
        let mut table = self.inner.write().expect("segment storage lock poisoned");
        table.insert(
            name.to_string(),
            Segment { name: name.to_string(), keys, till },
        );
    }

    fn apply_delta(&self, name: &str, added: HashSet<String>, removed: HashSet<String>, till: i64) {
        let mut table = self.inner.write().expect("segment storage lock poisoned");
        let entry = table.entry(name.to_string()).or_insert_with(|| Segment {
            name: name.to_string(),
            keys: HashSet::new(),
            till: -1,
        });
        for key in removed {
            entry.keys.remove(&key);
        }
        entry.keys.extend(added);
        entry.till = till;
    }

    fn is_in_segment(&self, name: &str, key: &str) -> bool {
        let table = self.inner.read().expect("segment storage lock poisoned");
        table.get(name).map(|e| e.keys.contains(key)).unwrap_or(false)
    }

    fn till(&self, name: &str) -> i64 {
        let table = self.inner.read().expect("segment storage lock poisoned");
        table.get(name).map(|e| e.till).unwrap_or(-1)
    }

    fn remove(&self, name: &str) {
        let mut table = self.inner.write().expect("segment storage lock poisoned");
        table.remove(name);
    }
}

#[derive(Debug, Default)]
pub struct InMemoryImpressionStorage {
    inner: RwLock<Vec<Impression>>,
}

impl InMemoryImpressionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImpressionStorage for InMemoryImpressionStorage {
    fn put(&self, impression: Impression) {
        self.inner
            .write()
            .expect("impression storage lock poisoned")
            .push(impression);
    }

    fn pop_all(&self) -> Vec<Impression> {
        std::mem::take(&mut *self.inner.write().expect("impression storage lock poisoned"))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMetricsStorage {
    inner: RwLock<MetricsTable>,
}

#[derive(Debug, Default)]
struct MetricsTable {
    latencies: HashMap<String, [u64; 23]>,
    counters: HashMap<String, i64>,
    gauges: HashMap<String, f64>,
}

impl InMemoryMetricsStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsStorage for InMemoryMetricsStorage {
    fn inc_latency(&self, feature: &str, bucket: usize) {
        let mut table = self.inner.write().expect("metrics storage lock poisoned");
        let entry = table.latencies.entry(feature.to_string()).or_insert([0u64; 23]);
        if let Some(slot) = entry.get_mut(bucket) {
            *slot += 1;
        }
    }

    fn pop_latencies(&self) -> Vec<(String, [u64; 23])> {
        let mut table = self.inner.write().expect("metrics storage lock poisoned");
        std::mem::take(&mut table.latencies).into_iter().collect()
    }

    fn inc_counter(&self, name: &str, delta: i64) {
        let mut table = self.inner.write().expect("metrics storage lock poisoned");
        *table.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    fn pop_counters(&self) -> Vec<(String, i64)> {
        let mut table = self.inner.write().expect("metrics storage lock poisoned");
        std::mem::take(&mut table.counters).into_iter().collect()
    }

    fn put_gauge(&self, name: &str, value: f64) {
        let mut table = self.inner.write().expect("metrics storage lock poisoned");
        table.gauges.insert(name.to_string(), value);
    }

    fn pop_gauges(&self) -> Vec<(String, f64)> {
        let mut table = self.inner.write().expect("metrics storage lock poisoned");
        std::mem::take(&mut table.gauges).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SplitStatus;

    fn split(name: &str, status: SplitStatus) -> Split {
        Split {
            name: name.to_string(),
            traffic_type_name: "user".into(),
            killed: false,
            default_treatment: "off".into(),
            change_number: 1,
            status,
            seed: 0,
            algo: crate::model::Algo::Legacy,
            conditions: vec![],
        }
    }

    #[test]
    fn put_many_upserts_active_and_drops_archived() {
        let storage = InMemorySplitStorage::new();
        storage.put_many(vec![split("a", SplitStatus::Active)], 100);
        assert!(storage.get("a").is_some());
        assert_eq!(storage.till(), 100);

        storage.put_many(vec![split("a", SplitStatus::Archived)], 200);
        assert!(storage.get("a").is_none());
        assert_eq!(storage.till(), 200);
    }

    #[test]
    fn segment_storage_round_trips() {
        let storage = InMemorySegmentStorage::new();
        assert!(!storage.is_in_segment("beta", "k1"));
        storage.put("beta", HashSet::from(["k1".to_string()]), 5);
        assert!(storage.is_in_segment("beta", "k1"));
        assert!(!storage.is_in_segment("beta", "k2"));
        assert_eq!(storage.till("beta"), 5);

        storage.remove("beta");
        assert!(!storage.is_in_segment("beta", "k1"));
        assert_eq!(storage.till("beta"), -1);
    }

    #[test]
    fn apply_delta_creates_the_segment_on_first_use() {
        let storage = InMemorySegmentStorage::new();
        storage.apply_delta("vip", HashSet::from(["u7".to_string()]), HashSet::new(), 1);
        assert!(storage.is_in_segment("vip", "u7"));
        assert_eq!(storage.till("vip"), 1);
    }

    #[test]
    fn apply_delta_adds_and_removes_without_touching_untouched_members() {
        let storage = InMemorySegmentStorage::new();
        storage.put(
            "vip",
            HashSet::from(["u1".to_string(), "u2".to_string()]),
            1,
        );

        storage.apply_delta(
            "vip",
            HashSet::from(["u3".to_string()]),
            HashSet::from(["u1".to_string()]),
            2,
        );

        assert!(!storage.is_in_segment("vip", "u1"));
        assert!(storage.is_in_segment("vip", "u2"));
        assert!(storage.is_in_segment("vip", "u3"));
        assert_eq!(storage.till("vip"), 2);
    }

    #[test]
    fn impression_storage_pop_drains() {
        let storage = InMemoryImpressionStorage::new();
        storage.put(Impression {
            matching_key: "k1".into(),
            bucketing_key: None,
            feature_name: "f1".into(),
            treatment: "on".into(),
            label: "default rule".into(),
            change_number: 1,
            timestamp_ms: 1,
        });
        assert_eq!(storage.pop_all().len(), 1);
        assert!(storage.pop_all().is_empty());
    }

    #[test]
    fn metrics_storage_counts_latencies_and_drains() {
        let storage = InMemoryMetricsStorage::new();
        storage.inc_latency("f1", 0);
        storage.inc_latency("f1", 0);
        storage.inc_latency("f1", 5);
        storage.inc_counter("requests", 3);
        storage.put_gauge("sdks", 2.0);

        let latencies = storage.pop_latencies();
        assert_eq!(latencies.len(), 1);
        let (feature, buckets) = &latencies[0];
        assert_eq!(feature, "f1");
        assert_eq!(buckets[0], 2);
        assert_eq!(buckets[5], 1);

        assert!(storage.pop_latencies().is_empty());
        assert_eq!(storage.pop_counters(), vec![("requests".to_string(), 3)]);
        assert_eq!(storage.pop_gauges(), vec![("sdks".to_string(), 2.0)]);
    }
}
