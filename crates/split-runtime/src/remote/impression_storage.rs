use std::sync::Arc;

use redis::Commands;
use split_core::storage::ImpressionStorage;
use split_core::Impression;

use super::RedisClient;

pub struct RedisImpressionStorage {
    client: Arc<RedisClient>,
}

impl RedisImpressionStorage {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }
}

impl ImpressionStorage for RedisImpressionStorage {
    fn put(&self, impression: Impression) {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let key = self.client.impressions_key(&impression.feature_name);
        match serde_json::to_string(&impression) {
            Ok(json) => {
                let _: Result<(), _> = conn.rpush(key, json);
            }
            Err(e) => sync_warn!(store, error = %e, "impression did not serialize, dropped"),
        }
    }

    fn pop_all(&self) -> Vec<Impression> {
        let mut conn = self.client.conn.lock().expect("redis connection lock poisoned");
        let keys: Vec<String> = conn
            .keys(self.client.impressions_key_pattern())
            .unwrap_or_default();

        let mut out = Vec::new();
        for key in keys {
            let mut pipe = redis::pipe();
            pipe.atomic();
            pipe.cmd("LRANGE").arg(&key).arg(0).arg(-1);
            pipe.cmd("DEL").arg(&key).ignore();
            let (raw,): (Vec<String>,) = match pipe.query(&mut *conn) {
                Ok(v) => v,
                Err(e) => {
                    sync_warn!(store, key = %key, error = %e, "impression drain failed for key");
                    continue;
                }
            };
            out.extend(raw.iter().filter_map(|s| serde_json::from_str(s).ok()));
        }
        out
    }
}
