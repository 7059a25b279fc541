use std::collections::HashMap;
use std::sync::Arc;

use redis::Commands;
use split_core::storage::MetricsStorage;

use super::RedisClient;

pub struct RedisMetricsStorage {
    client: Arc<RedisClient>,
}

impl RedisMetricsStorage {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }
}

impl MetricsStorage for RedisMetricsStorage {
    fn inc_latency(&self, feature: &str, bucket: usize) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let _: Result<i64, _> = conn.incr(self.client.latency_key(feature, bucket), 1);
    }

    fn pop_latencies(&self) -> Vec<(String, [u64; 23])> {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let keys: Vec<String> = conn
            .keys(self.client.latency_key_pattern())
            .unwrap_or_default();
        let prefix = self.client.latency_key_prefix();

        let mut table: HashMap<String, [u64; 23]> = HashMap::new();
        for key in keys {
            let value: i64 = conn.get(&key).unwrap_or(0);
            let _: Result<(), _> = conn.del(&key);
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some((feature, bucket_str)) = rest.rsplit_once(".bucket.") else {
                continue;
            };
            let Ok(bucket) = bucket_str.parse::<usize>() else {
                continue;
            };
            if bucket < 23 {
                table.entry(feature.to_string()).or_insert([0u64; 23])[bucket] =
                    value.max(0) as u64;
            }
        }
        table.into_iter().collect()
    }

    fn inc_counter(&self, name: &str, delta: i64) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let _: Result<i64, _> = conn.incr(self.client.counter_key(name), delta);
    }

    fn pop_counters(&self) -> Vec<(String, i64)> {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let keys: Vec<String> = conn
            .keys(self.client.counter_key_pattern())
            .unwrap_or_default();
        let prefix = self.client.counter_key_prefix();

        let mut out = Vec::new();
        for key in keys {
            let value: i64 = conn.get(&key).unwrap_or(0);
            let _: Result<(), _> = conn.del(&key);
            if let Some(name) = key.strip_prefix(&prefix) {
                out.push((name.to_string(), value));
            }
        }
        out
    }

    fn put_gauge(&self, name: &str, value: f64) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let _: Result<(), _> = conn.set(self.client.gauge_key(name), value);
    }

    fn pop_gauges(&self) -> Vec<(String, f64)> {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let keys: Vec<String> = conn
            .keys(self.client.gauge_key_pattern())
            .unwrap_or_default();
        let prefix = self.client.gauge_key_prefix();

        let mut out = Vec::new();
        for key in keys {
            let value: f64 = conn.get(&key).unwrap_or(0.0);
            let _: Result<(), _> = conn.del(&key);
            if let Some(name) = key.strip_prefix(&prefix) {
                out.push((name.to_string(), value));
            }
        }
        out
    }
}
