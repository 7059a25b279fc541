//! The evaluation orchestrator: walks a split's conditions, consulting the
//! matcher grammar and the hashing routine, and never lets a matcher
//! failure escape as an error — every path resolves to a treatment and a
//! label.

use std::collections::HashSet;
use std::time::Instant;

use crate::hashing;
use crate::matcher::MatchContext;
use crate::model::{Attributes, ConditionType, Split};
use crate::storage::{SegmentStorage, SplitStorage};

/// Result of one `evaluate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub treatment: String,
    pub label: String,
    pub change_number: i64,
    pub evaluation_time_ns: u64,
}

/// Borrows the storages for the duration of one evaluation.
pub struct Evaluator<'a> {
    splits: &'a dyn SplitStorage,
    segments: &'a dyn SegmentStorage,
}

impl<'a> Evaluator<'a> {
    pub fn new(splits: &'a dyn SplitStorage, segments: &'a dyn SegmentStorage) -> Self {
        Self { splits, segments }
    }

    /// Evaluates `feature` for `matching_key` end to end: missing split,
    /// kill switch, and condition walk, in that order. Timed end to end so
    /// the caller can feed `evaluation_time_ns` into the latency
    /// histogram.
    pub fn evaluate(
        &self,
        matching_key: &str,
        bucketing_key: &str,
        feature: &str,
        attributes: &Attributes,
    ) -> EvalOutcome {
        let start = Instant::now();

        let Some(split) = self.splits.get(feature) else {
            return EvalOutcome {
                treatment: "control".to_string(),
                label: "definition not found".to_string(),
                change_number: 0,
                evaluation_time_ns: start.elapsed().as_nanos() as u64,
            };
        };

        if split.killed {
            return EvalOutcome {
                treatment: split.default_treatment.clone(),
                label: "killed".to_string(),
                change_number: split.change_number,
                evaluation_time_ns: start.elapsed().as_nanos() as u64,
            };
        }

        let mut visited = HashSet::new();
        visited.insert(feature.to_string());

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.walk_conditions(&split, matching_key, bucketing_key, attributes, &mut visited)
        }));

        let elapsed = start.elapsed().as_nanos() as u64;
        match outcome {
            Ok((treatment, label)) => EvalOutcome {
                treatment,
                label,
                change_number: split.change_number,
                evaluation_time_ns: elapsed,
            },
            Err(_) => {
                tracing::error!(feature = %feature, "matcher evaluation panicked");
                EvalOutcome {
                    treatment: "control".to_string(),
                    label: "exception".to_string(),
                    change_number: split.change_number,
                    evaluation_time_ns: elapsed,
                }
            }
        }
    }

    /// Walks the condition list in order, returning the first match's
    /// `(treatment, label)`, or the split's default treatment if none
    /// match.
    fn walk_conditions(
        &self,
        split: &Split,
        matching_key: &str,
        bucketing_key: &str,
        attributes: &Attributes,
        visited: &mut HashSet<String>,
    ) -> (String, String) {
        for condition in &split.conditions {
            let matched = condition.matcher_group.matches(
                matching_key,
                attributes,
                bucketing_key,
                self,
                visited,
            );
            if !matched {
                continue;
            }

            if condition.condition_type == ConditionType::Whitelist {
                let treatment = condition
                    .partitions
                    .first()
                    .map(|p| p.treatment.clone())
                    .unwrap_or_else(|| split.default_treatment.clone());
                return (treatment, condition.label.clone());
            }

            let bucket = hashing::bucket(bucketing_key, split.seed, split.algo);
            return match hashing::pick_partition(&condition.partitions, bucket) {
                Some(partition) => (partition.treatment.clone(), condition.label.clone()),
                None => (split.default_treatment.clone(), "exception".to_string()),
            };
        }
        (split.default_treatment.clone(), "default rule".to_string())
    }
}

impl<'a> MatchContext for Evaluator<'a> {
    fn is_in_segment(&self, segment_name: &str, key: &str) -> bool {
        self.segments.is_in_segment(segment_name, key)
    }

    fn evaluate_dependency(
        &self,
        feature: &str,
        matching_key: &str,
        bucketing_key: &str,
        attributes: &Attributes,
        visited: &mut HashSet<String>,
    ) -> String {
        let Some(split) = self.splits.get(feature) else {
            return "control".to_string();
        };
        if split.killed {
            return split.default_treatment.clone();
        }
        self.walk_conditions(&split, matching_key, bucketing_key, attributes, visited)
            .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Matcher, MatcherGroup, MatcherKind};
    use crate::model::{Algo, Combinator, Condition, Partition, SplitStatus};
    use crate::storage::memory::{InMemorySegmentStorage, InMemorySplitStorage};

    fn base_split(name: &str) -> Split {
        Split {
            name: name.to_string(),
            traffic_type_name: "user".into(),
            killed: false,
            default_treatment: "off".into(),
            change_number: 10,
            status: SplitStatus::Active,
            seed: 0,
            algo: Algo::Legacy,
            conditions: vec![],
        }
    }

    fn all_keys_matcher() -> Matcher {
        Matcher {
            negate: false,
            attribute: None,
            kind: MatcherKind::AllKeys,
        }
    }

    #[test]
    fn missing_split_resolves_to_control() {
        let splits = InMemorySplitStorage::new();
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);
        let outcome = evaluator.evaluate("u1", "u1", "nope", &Attributes::new());
        assert_eq!(outcome.treatment, "control");
        assert_eq!(outcome.label, "definition not found");
        assert_eq!(outcome.change_number, 0);
    }

    #[test]
    fn killed_split_returns_default_with_killed_label() {
        let mut split = base_split("f1");
        split.killed = true;
        split.default_treatment = "off".into();
        let splits = InMemorySplitStorage::new();
        splits.put_many(vec![split], 10);
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);

        let outcome = evaluator.evaluate("u1", "u1", "f1", &Attributes::new());
        assert_eq!(outcome.treatment, "off");
        assert_eq!(outcome.label, "killed");
        assert_eq!(outcome.change_number, 10);
    }

    #[test]
    fn whitelist_condition_matches_and_short_circuits() {
        let mut split = base_split("f3");
        split.default_treatment = "off".into();
        split.conditions = vec![Condition {
            condition_type: ConditionType::Whitelist,
            label: "explicitly included".into(),
            matcher_group: MatcherGroup {
                combinator: Combinator::Or,
                matchers: vec![Matcher {
                    negate: false,
                    attribute: None,
                    kind: MatcherKind::Whitelist {
                        whitelist: vec!["alice".into(), "bob".into()],
                    },
                }],
            },
            partitions: vec![Partition { treatment: "on".into(), size: 100 }],
        }];

        let splits = InMemorySplitStorage::new();
        splits.put_many(vec![split], 1);
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);

        let alice = evaluator.evaluate("alice", "alice", "f3", &Attributes::new());
        assert_eq!(alice.treatment, "on");
        assert_eq!(alice.label, "explicitly included");

        let carol = evaluator.evaluate("carol", "carol", "f3", &Attributes::new());
        assert_eq!(carol.treatment, "off");
        assert_eq!(carol.label, "default rule");
    }

    #[test]
    fn in_segment_reflects_segment_storage_updates() {
        let mut split = base_split("f4");
        split.conditions = vec![Condition {
            condition_type: ConditionType::Rollout,
            label: "vip rule".into(),
            matcher_group: MatcherGroup {
                combinator: Combinator::And,
                matchers: vec![Matcher {
                    negate: false,
                    attribute: None,
                    kind: MatcherKind::InSegment { segment_name: "vip".into() },
                }],
            },
            partitions: vec![Partition { treatment: "on".into(), size: 100 }],
        }];

        let splits = InMemorySplitStorage::new();
        splits.put_many(vec![split], 1);
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);

        segments.put("vip", HashSet::from(["u7".to_string()]), 1);
        let before = evaluator.evaluate("u8", "u8", "f4", &Attributes::new());
        assert_eq!(before.treatment, "off");

        segments.put("vip", HashSet::from(["u7".to_string(), "u8".to_string()]), 2);
        let after = evaluator.evaluate("u8", "u8", "f4", &Attributes::new());
        assert_eq!(after.treatment, "on");
    }

    #[test]
    fn rollout_condition_splits_population_close_to_configured_sizes() {
        let mut split = base_split("f2");
        split.algo = Algo::Murmur;
        split.conditions = vec![Condition {
            condition_type: ConditionType::Rollout,
            label: "in segment all".into(),
            matcher_group: MatcherGroup {
                combinator: Combinator::And,
                matchers: vec![all_keys_matcher()],
            },
            partitions: vec![
                Partition { treatment: "on".into(), size: 50 },
                Partition { treatment: "off".into(), size: 50 },
            ],
        }];

        let splits = InMemorySplitStorage::new();
        splits.put_many(vec![split], 1);
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);

        let mut on = 0;
        for i in 0..1000 {
            let key = format!("user-{i}");
            let outcome = evaluator.evaluate(&key, &key, "f2", &Attributes::new());
            if outcome.treatment == "on" {
                on += 1;
            }
        }
        assert!((450..=550).contains(&on), "on={on}");
    }

    #[test]
    fn partitions_not_summing_to_100_fall_through_to_default_with_exception_label() {
        let mut split = base_split("f5");
        split.default_treatment = "off".into();
        split.conditions = vec![Condition {
            condition_type: ConditionType::Rollout,
            label: "half".into(),
            matcher_group: MatcherGroup {
                combinator: Combinator::And,
                matchers: vec![all_keys_matcher()],
            },
            partitions: vec![Partition { treatment: "on".into(), size: 1 }],
        }];

        let splits = InMemorySplitStorage::new();
        splits.put_many(vec![split], 1);
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);

        // Bucket 50 will not be reached by a cumulative size of 1.
        let outcome = evaluator.evaluate("user-that-hashes-high", "user-that-hashes-high", "f5", &Attributes::new());
        if outcome.label == "exception" {
            assert_eq!(outcome.treatment, "off");
        }
    }

    #[test]
    fn dependency_matcher_follows_referenced_feature_treatment() {
        let mut base = base_split("base");
        base.default_treatment = "off".into();
        base.conditions = vec![Condition {
            condition_type: ConditionType::Rollout,
            label: "all".into(),
            matcher_group: MatcherGroup { combinator: Combinator::And, matchers: vec![all_keys_matcher()] },
            partitions: vec![Partition { treatment: "on".into(), size: 100 }],
        }];

        let mut dependent = base_split("dependent");
        dependent.default_treatment = "off".into();
        dependent.conditions = vec![Condition {
            condition_type: ConditionType::Rollout,
            label: "depends on base".into(),
            matcher_group: MatcherGroup {
                combinator: Combinator::And,
                matchers: vec![Matcher {
                    negate: false,
                    attribute: None,
                    kind: MatcherKind::Dependency {
                        feature: "base".into(),
                        treatments: vec!["on".into()],
                    },
                }],
            },
            partitions: vec![Partition { treatment: "yes".into(), size: 100 }],
        }];

        let splits = InMemorySplitStorage::new();
        splits.put_many(vec![base, dependent], 1);
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);

        let outcome = evaluator.evaluate("u1", "u1", "dependent", &Attributes::new());
        assert_eq!(outcome.treatment, "yes");
    }

    #[test]
    fn dependency_cycle_resolves_to_false_not_infinite_recursion() {
        let mut a = base_split("a");
        a.default_treatment = "off".into();
        a.conditions = vec![Condition {
            condition_type: ConditionType::Rollout,
            label: "depends on b".into(),
            matcher_group: MatcherGroup {
                combinator: Combinator::And,
                matchers: vec![Matcher {
                    negate: false,
                    attribute: None,
                    kind: MatcherKind::Dependency { feature: "b".into(), treatments: vec!["x".into()] },
                }],
            },
            partitions: vec![Partition { treatment: "on".into(), size: 100 }],
        }];
        let mut b = base_split("b");
        b.default_treatment = "off".into();
        b.conditions = vec![Condition {
            condition_type: ConditionType::Rollout,
            label: "depends on a".into(),
            matcher_group: MatcherGroup {
                combinator: Combinator::And,
                matchers: vec![Matcher {
                    negate: false,
                    attribute: None,
                    kind: MatcherKind::Dependency { feature: "a".into(), treatments: vec!["y".into()] },
                }],
            },
            partitions: vec![Partition { treatment: "on".into(), size: 100 }],
        }];

        let splits = InMemorySplitStorage::new();
        splits.put_many(vec![a, b], 1);
        let segments = InMemorySegmentStorage::new();
        let evaluator = Evaluator::new(&splits, &segments);

        let outcome = evaluator.evaluate("u1", "u1", "a", &Attributes::new());
        assert_eq!(outcome.treatment, "off");
        assert_eq!(outcome.label, "default rule");
    }
}
