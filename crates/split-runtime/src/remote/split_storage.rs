use std::collections::HashSet;
use std::sync::Arc;

use redis::Commands;
use split_core::matcher::MatcherKind;
use split_core::model::{Split, SplitStatus};
use split_core::storage::SplitStorage;

use super::RedisClient;

pub struct RedisSplitStorage {
    client: Arc<RedisClient>,
}

impl RedisSplitStorage {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }
}

impl SplitStorage for RedisSplitStorage {
    fn put_many(&self, splits: Vec<Split>, till: i64) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let mut pipe = redis::pipe();
        pipe.atomic();
        for split in &splits {
            let key = self.client.split_key(&split.name);
            if split.status == SplitStatus::Archived {
                pipe.cmd("DEL").arg(key).ignore();
            } else {
                match serde_json::to_string(split) {
                    Ok(json) => {
                        pipe.cmd("SET").arg(key).arg(json).ignore();
                    }
                    Err(e) => sync_warn!(store, split = %split.name, error = %e, "split did not serialize, skipped"),
                }
            }
        }
        pipe.cmd("SET").arg(self.client.splits_till_key()).arg(till).ignore();
        if let Err(e) = pipe.query::<()>(&mut *conn) {
            sync_warn!(store, error = %e, "redis split put_many failed");
        }
    }

    fn get(&self, name: &str) -> Option<Split> {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let raw: Option<String> = conn.get(self.client.split_key(name)).ok();
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    fn get_all(&self) -> Vec<Split> {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let keys: Vec<String> = conn
            .keys(self.client.split_key_pattern())
            .unwrap_or_default();
        keys.into_iter()
            .filter_map(|key| {
                let raw: Option<String> = conn.get(&key).ok();
                raw.and_then(|s| serde_json::from_str(&s).ok())
            })
            .collect()
    }

    fn segment_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        for split in self.get_all() {
            for condition in &split.conditions {
                for matcher in &condition.matcher_group.matchers {
                    if let MatcherKind::InSegment { segment_name } = &matcher.kind {
                        names.insert(segment_name.clone());
                    }
                }
            }
        }
        names
    }

    fn till(&self) -> i64 {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        conn.get(self.client.splits_till_key()).unwrap_or(-1)
    }
}
