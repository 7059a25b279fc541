//! The public evaluation surface: wraps [`split_core::Evaluator`] over
//! shared storage, recording an impression per evaluation and catching
//! panics at the boundary so a bug in a matcher or a coercion never
//! propagates past `treatment`/`treatments`.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use split_core::storage::{ImpressionStorage, MetricsStorage, SegmentStorage, SplitStorage};
use split_core::{Attributes, Evaluator, Impression};

/// A treatment evaluation handle sharing a [`crate::factory::SplitFactory`]'s
/// storage. Cheap to clone; safe to call from multiple tasks concurrently.
pub struct SplitClient {
    split_storage: Arc<dyn SplitStorage>,
    segment_storage: Arc<dyn SegmentStorage>,
    impression_storage: Arc<dyn ImpressionStorage>,
    metrics_storage: Arc<dyn MetricsStorage>,
    labels_enabled: bool,
}

impl SplitClient {
    pub(crate) fn new(
        split_storage: Arc<dyn SplitStorage>,
        segment_storage: Arc<dyn SegmentStorage>,
        impression_storage: Arc<dyn ImpressionStorage>,
        metrics_storage: Arc<dyn MetricsStorage>,
        labels_enabled: bool,
    ) -> Self {
        Self {
            split_storage,
            segment_storage,
            impression_storage,
            metrics_storage,
            labels_enabled,
        }
    }

    /// Evaluate one feature flag for `matching_key`, recording an
    /// impression. Any panic inside the evaluator resolves to
    /// `"control"`/`"exception"` rather than unwinding into the caller.
    pub fn treatment(&self, matching_key: &str, feature_name: &str, attributes: &Attributes) -> String {
        self.treatment_with_bucketing_key(matching_key, matching_key, feature_name, attributes)
    }

    pub fn treatment_with_bucketing_key(
        &self,
        matching_key: &str,
        bucketing_key: &str,
        feature_name: &str,
        attributes: &Attributes,
    ) -> String {
        let outcome = self.evaluate_one(matching_key, bucketing_key, feature_name, attributes);
        self.metrics_storage.inc_latency(
            "sdk.get_treatment",
            split_core::latency::bucket_for_micros(outcome.evaluation_time_ns / 1_000),
        );
        self.record_impression(matching_key, bucketing_key, feature_name, &outcome);
        outcome.treatment
    }

    /// Evaluate several feature flags for `matching_key` in one call,
    /// recording one impression per feature.
    pub fn treatments(
        &self,
        matching_key: &str,
        feature_names: &[&str],
        attributes: &Attributes,
    ) -> HashMap<String, String> {
        feature_names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    self.treatment_with_bucketing_key(matching_key, matching_key, name, attributes),
                )
            })
            .collect()
    }

    fn evaluate_one(
        &self,
        matching_key: &str,
        bucketing_key: &str,
        feature_name: &str,
        attributes: &Attributes,
    ) -> split_core::EvalOutcome {
        let split_storage = self.split_storage.clone();
        let segment_storage = self.segment_storage.clone();
        let matching_key = matching_key.to_string();
        let bucketing_key = bucketing_key.to_string();
        let feature_name = feature_name.to_string();
        let attributes = attributes.clone();

        let result = panic::catch_unwind(AssertUnwindSafe(move || {
            let evaluator = Evaluator::new(split_storage.as_ref(), segment_storage.as_ref());
            evaluator.evaluate(&matching_key, &bucketing_key, &feature_name, &attributes)
        }));

        match result {
            Ok(outcome) => outcome,
            Err(_) => split_core::EvalOutcome {
                treatment: "control".to_string(),
                label: "exception".to_string(),
                change_number: 0,
                evaluation_time_ns: 0,
            },
        }
    }

    fn record_impression(
        &self,
        matching_key: &str,
        bucketing_key: &str,
        feature_name: &str,
        outcome: &split_core::EvalOutcome,
    ) {
        let label = if self.labels_enabled {
            outcome.label.clone()
        } else {
            String::new()
        };
        let bucketing_key = if bucketing_key == matching_key {
            None
        } else {
            Some(bucketing_key.to_string())
        };
        self.impression_storage.put(Impression {
            matching_key: matching_key.to_string(),
            bucketing_key,
            feature_name: feature_name.to_string(),
            treatment: outcome.treatment.clone(),
            label,
            change_number: outcome.change_number,
            timestamp_ms: now_epoch_ms(),
        });
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
