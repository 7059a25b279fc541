use std::collections::HashSet;
use std::sync::Arc;

use orion_error::StructError;
use redis::Commands;
use split_core::error::EvalReason;
use split_core::storage::SegmentStorage;

use crate::error::SyncReason;

use super::RedisClient;

pub struct RedisSegmentStorage {
    client: Arc<RedisClient>,
}

impl RedisSegmentStorage {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }
}

impl SegmentStorage for RedisSegmentStorage {
    fn put(&self, name: &str, keys: HashSet<String>, till: i64) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let segment_key = self.client.segment_key(name);
        let till_key = self.client.segment_till_key(name);

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("DEL").arg(&segment_key).ignore();
        if !keys.is_empty() {
            pipe.cmd("SADD")
                .arg(&segment_key)
                .arg(keys.into_iter().collect::<Vec<_>>())
                .ignore();
        }
        pipe.cmd("SET").arg(till_key).arg(till).ignore();

        if let Err(e) = pipe.query::<()>(&mut *conn) {
            sync_warn!(store, segment = %name, error = %e, "redis segment put failed");
        }
    }

    fn apply_delta(&self, name: &str, added: HashSet<String>, removed: HashSet<String>, till: i64) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let segment_key = self.client.segment_key(name);
        let till_key = self.client.segment_till_key(name);

        let mut pipe = redis::pipe();
        pipe.atomic();
        if !removed.is_empty() {
            pipe.cmd("SREM")
                .arg(&segment_key)
                .arg(removed.into_iter().collect::<Vec<_>>())
                .ignore();
        }
        if !added.is_empty() {
            pipe.cmd("SADD")
                .arg(&segment_key)
                .arg(added.into_iter().collect::<Vec<_>>())
                .ignore();
        }
        pipe.cmd("SET").arg(till_key).arg(till).ignore();

        if let Err(e) = pipe.query::<()>(&mut *conn) {
            sync_warn!(store, segment = %name, error = %e, "redis segment apply_delta failed");
        }
    }

    fn is_in_segment(&self, name: &str, key: &str) -> bool {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        conn.sismember(self.client.segment_key(name), key).unwrap_or_else(|e| {
            let err = StructError::from(SyncReason::Core(EvalReason::StoreUnavailable));
            sync_warn!(store, segment = %name, redis_error = %e, error = %err, "segment membership lookup failed, treating key as absent");
            false
        })
    }

    fn till(&self, name: &str) -> i64 {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        conn.get(self.client.segment_till_key(name)).unwrap_or(-1)
    }

    fn remove(&self, name: &str) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let segment_key = self.client.segment_key(name);
        let till_key = self.client.segment_till_key(name);
        let _: Result<(), _> = conn.del((segment_key, till_key));
    }
}
