//! A single evaluation record, queued by the evaluator and drained by the
//! impressions-flush sync task.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impression {
    pub matching_key: String,
    pub bucketing_key: Option<String>,
    pub feature_name: String,
    pub treatment: String,
    pub label: String,
    pub change_number: i64,
    pub timestamp_ms: i64,
}
