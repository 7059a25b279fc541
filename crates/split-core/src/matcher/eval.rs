use std::collections::HashSet;

use orion_error::StructError;

use super::sets::{resolve_string_set, starts_ends_contains};
use super::{Matcher, MatcherKind, NumericUnit};
use crate::error::EvalReason;
use crate::model::{AttributeValue, Attributes};

/// Capability set the matcher grammar needs from the surrounding evaluator:
/// segment membership for `IN_SEGMENT`, and a recursive evaluation hook for
/// `DEPENDENCY`.
pub trait MatchContext {
    fn is_in_segment(&self, segment_name: &str, key: &str) -> bool;

    /// Evaluate another feature for the same key/attributes and return its
    /// treatment. `visited` carries the set of features already on the
    /// current recursion path so a cycle resolves to `"control"` rather than
    /// recursing forever.
    fn evaluate_dependency(
        &self,
        feature: &str,
        matching_key: &str,
        bucketing_key: &str,
        attributes: &Attributes,
        visited: &mut HashSet<String>,
    ) -> String;
}

/// Resolved input value for a matcher: either the matching key (always a
/// string) or a looked-up attribute.
enum Resolved<'a> {
    Key(&'a str),
    Attr(&'a AttributeValue),
    /// Attribute name was given but missing, or present with the wrong
    /// shape for the matcher that asked for it — the predicate itself just
    /// returns false, before negation is applied.
    Missing,
}

fn resolve<'a>(
    attribute: &Option<String>,
    matching_key: &'a str,
    attributes: &'a Attributes,
) -> Resolved<'a> {
    match attribute {
        Some(name) => match attributes.get(name) {
            Some(v) => Resolved::Attr(v),
            None => Resolved::Missing,
        },
        None => Resolved::Key(matching_key),
    }
}

/// Coerce a resolved value to `i64` for the numeric comparison family.
fn as_i64(resolved: &Resolved) -> Option<i64> {
    match resolved {
        Resolved::Key(s) => s.parse::<i64>().ok(),
        Resolved::Attr(AttributeValue::Number(n)) => Some(*n as i64),
        Resolved::Attr(AttributeValue::String(s)) => s.parse::<i64>().ok(),
        Resolved::Attr(_) | Resolved::Missing => None,
    }
}

fn as_str<'a>(resolved: &'a Resolved<'a>) -> Option<&'a str> {
    match resolved {
        Resolved::Key(s) => Some(s),
        Resolved::Attr(AttributeValue::String(s)) => Some(s.as_str()),
        Resolved::Attr(_) | Resolved::Missing => None,
    }
}

/// Log a coercion failure for a present-but-wrong-shaped value. Missing
/// attributes are a normal, silent "no match" per [`Resolved::Missing`] —
/// this is only for values that resolved to something but not to what the
/// matcher needed.
fn log_coercion_failure(matcher: &str) {
    let err = StructError::from(EvalReason::Coercion);
    tracing::warn!(matcher, error = %err, "attribute value failed matcher coercion");
}

/// Like [`as_i64`], but logs via [`EvalReason::Coercion`] when the resolved
/// value was present and simply couldn't be coerced, as opposed to absent.
fn as_i64_checked(resolved: &Resolved, matcher: &str) -> Option<i64> {
    let v = as_i64(resolved);
    if v.is_none() && !matches!(resolved, Resolved::Missing) {
        log_coercion_failure(matcher);
    }
    v
}

/// Like [`as_bool`], but logs via [`EvalReason::Coercion`] when the resolved
/// value was present and simply couldn't be coerced, as opposed to absent.
fn as_bool_checked(resolved: &Resolved, matcher: &str) -> Option<bool> {
    let v = as_bool(resolved);
    if v.is_none() && !matches!(resolved, Resolved::Missing) {
        log_coercion_failure(matcher);
    }
    v
}

fn as_bool(resolved: &Resolved) -> Option<bool> {
    match resolved {
        Resolved::Attr(AttributeValue::Bool(b)) => Some(*b),
        Resolved::Attr(AttributeValue::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Resolved::Key(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Resolved::Attr(_) | Resolved::Missing => None,
    }
}

/// Zero a millisecond timestamp to its UTC day boundary.
fn normalize_datetime(value_ms: i64) -> i64 {
    const MS_PER_DAY: i64 = 86_400_000;
    (value_ms.div_euclid(MS_PER_DAY)) * MS_PER_DAY
}

fn normalize_for_unit(value: i64, unit: NumericUnit) -> i64 {
    match unit {
        NumericUnit::Number => value,
        NumericUnit::Datetime => normalize_datetime(value),
    }
}

impl Matcher {
    /// Evaluate this matcher, applying `negate` after the predicate as
    /// `result XOR negate`.
    pub fn matches(
        &self,
        matching_key: &str,
        attributes: &Attributes,
        bucketing_key: &str,
        ctx: &dyn MatchContext,
        visited: &mut HashSet<String>,
    ) -> bool {
        let result = self.evaluate_kind(matching_key, attributes, bucketing_key, ctx, visited);
        result ^ self.negate
    }

    fn evaluate_kind(
        &self,
        matching_key: &str,
        attributes: &Attributes,
        bucketing_key: &str,
        ctx: &dyn MatchContext,
        visited: &mut HashSet<String>,
    ) -> bool {
        match &self.kind {
            MatcherKind::AllKeys => true,

            MatcherKind::InSegment { segment_name } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                match as_str(&resolved) {
                    Some(key) => ctx.is_in_segment(segment_name, key),
                    None => false,
                }
            }

            MatcherKind::Whitelist { whitelist } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                match as_str(&resolved) {
                    Some(key) => whitelist.iter().any(|w| w == key),
                    None => false,
                }
            }

            MatcherKind::EqualTo { value, unit } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                match as_i64_checked(&resolved, "EQUAL_TO") {
                    Some(v) => normalize_for_unit(v, *unit) == normalize_for_unit(*value, *unit),
                    None => false,
                }
            }

            MatcherKind::GreaterThanOrEqualTo { value, unit } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                match as_i64_checked(&resolved, "GREATER_THAN_OR_EQUAL_TO") {
                    Some(v) => normalize_for_unit(v, *unit) >= normalize_for_unit(*value, *unit),
                    None => false,
                }
            }

            MatcherKind::LessThanOrEqualTo { value, unit } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                match as_i64_checked(&resolved, "LESS_THAN_OR_EQUAL_TO") {
                    Some(v) => normalize_for_unit(v, *unit) <= normalize_for_unit(*value, *unit),
                    None => false,
                }
            }

            MatcherKind::Between { lo, hi, unit } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                match as_i64_checked(&resolved, "BETWEEN") {
                    Some(v) => {
                        let v = normalize_for_unit(v, *unit);
                        v >= normalize_for_unit(*lo, *unit) && v <= normalize_for_unit(*hi, *unit)
                    }
                    None => false,
                }
            }

            MatcherKind::EqualToSet { values } => {
                let input = resolve_string_set(&self.attribute, matching_key, attributes);
                if input.is_empty() {
                    return false;
                }
                let matcher_set: HashSet<&str> = values.iter().map(String::as_str).collect();
                input.len() == matcher_set.len()
                    && input.iter().all(|v| matcher_set.contains(v.as_str()))
            }

            MatcherKind::ContainsAnyOfSet { values } => {
                let input = resolve_string_set(&self.attribute, matching_key, attributes);
                if input.is_empty() {
                    return false;
                }
                values.iter().any(|v| input.contains(v.as_str()))
            }

            MatcherKind::ContainsAllOfSet { values } => {
                let input = resolve_string_set(&self.attribute, matching_key, attributes);
                if input.is_empty() {
                    return false;
                }
                values.iter().all(|v| input.contains(v.as_str()))
            }

            MatcherKind::PartOfSet { values } => {
                let input = resolve_string_set(&self.attribute, matching_key, attributes);
                if input.is_empty() {
                    return false;
                }
                let matcher_set: HashSet<&str> = values.iter().map(String::as_str).collect();
                input.iter().all(|v| matcher_set.contains(v.as_str()))
            }

            MatcherKind::StartsWith { prefixes } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                starts_ends_contains(as_str(&resolved), prefixes, |s, p| s.starts_with(p))
            }

            MatcherKind::EndsWith { suffixes } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                starts_ends_contains(as_str(&resolved), suffixes, |s, p| s.ends_with(p))
            }

            MatcherKind::ContainsString { substrings } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                starts_ends_contains(as_str(&resolved), substrings, |s, p| s.contains(p))
            }

            MatcherKind::MatchesString { pattern } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                match as_str(&resolved) {
                    Some(s) => match regex::Regex::new(pattern) {
                        Ok(re) => re.is_match(s),
                        Err(e) => {
                            let err = StructError::from(EvalReason::RegexCompile);
                            tracing::warn!(pattern = %pattern, regex_error = %e, error = %err, "matcher regex failed to compile");
                            false
                        }
                    },
                    None => false,
                }
            }

            MatcherKind::Dependency { feature, treatments } => {
                if !visited.insert(feature.clone()) {
                    let err = StructError::from(EvalReason::DependencyCycle);
                    tracing::warn!(feature = %feature, error = %err, "dependency matcher cycle detected");
                    return false;
                }
                let treatment = ctx.evaluate_dependency(
                    feature,
                    matching_key,
                    bucketing_key,
                    attributes,
                    visited,
                );
                visited.remove(feature);
                treatments.iter().any(|t| t == &treatment)
            }

            MatcherKind::EqualToBoolean { value } => {
                let resolved = resolve(&self.attribute, matching_key, attributes);
                as_bool_checked(&resolved, "EQUAL_TO_BOOLEAN") == Some(*value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatcherGroup;
    use crate::model::Attributes;

    struct FakeContext {
        segment_members: HashSet<&'static str>,
        dependency_treatment: String,
    }

    impl MatchContext for FakeContext {
        fn is_in_segment(&self, _segment_name: &str, key: &str) -> bool {
            self.segment_members.contains(key)
        }

        fn evaluate_dependency(
            &self,
            _feature: &str,
            _matching_key: &str,
            _bucketing_key: &str,
            _attributes: &Attributes,
            _visited: &mut HashSet<String>,
        ) -> String {
            self.dependency_treatment.clone()
        }
    }

    fn ctx() -> FakeContext {
        FakeContext {
            segment_members: HashSet::from(["vip1"]),
            dependency_treatment: "on".to_string(),
        }
    }

    fn matcher(kind: MatcherKind) -> Matcher {
        Matcher { negate: false, attribute: None, kind }
    }

    fn attr_matcher(attribute: &str, kind: MatcherKind) -> Matcher {
        Matcher { negate: false, attribute: Some(attribute.to_string()), kind }
    }

    fn run(m: &Matcher, key: &str, attrs: &Attributes) -> bool {
        let mut visited = HashSet::new();
        m.matches(key, attrs, key, &ctx(), &mut visited)
    }

    #[test]
    fn negate_flips_the_result() {
        let positive = matcher(MatcherKind::AllKeys);
        let mut negated = positive.clone();
        negated.negate = true;

        assert!(run(&positive, "u1", &Attributes::new()));
        assert!(!run(&negated, "u1", &Attributes::new()));
    }

    #[test]
    fn missing_attribute_resolves_to_false_before_negation_then_negation_still_applies() {
        let m = attr_matcher("age", MatcherKind::EqualTo { value: 10, unit: NumericUnit::Number });
        assert!(!run(&m, "u1", &Attributes::new()));

        // The underlying predicate is false (missing attribute), but negate
        // still flips that false to true afterward.
        let mut negated = m.clone();
        negated.negate = true;
        assert!(run(&negated, "u1", &Attributes::new()));
    }

    #[test]
    fn whitelist_matches_membership_against_the_matching_key() {
        let m = matcher(MatcherKind::Whitelist { whitelist: vec!["alice".into(), "bob".into()] });
        assert!(run(&m, "alice", &Attributes::new()));
        assert!(!run(&m, "carol", &Attributes::new()));
    }

    #[test]
    fn in_segment_consults_the_match_context() {
        let m = matcher(MatcherKind::InSegment { segment_name: "vip".into() });
        assert!(run(&m, "vip1", &Attributes::new()));
        assert!(!run(&m, "vip2", &Attributes::new()));
    }

    #[test]
    fn numeric_comparators_coerce_attribute_values() {
        let mut attrs = Attributes::new();
        attrs.insert("age".into(), AttributeValue::Number(25.0));

        let eq = attr_matcher("age", MatcherKind::EqualTo { value: 25, unit: NumericUnit::Number });
        assert!(run(&eq, "u1", &attrs));

        let ge = attr_matcher(
            "age",
            MatcherKind::GreaterThanOrEqualTo { value: 20, unit: NumericUnit::Number },
        );
        assert!(run(&ge, "u1", &attrs));

        let le = attr_matcher(
            "age",
            MatcherKind::LessThanOrEqualTo { value: 20, unit: NumericUnit::Number },
        );
        assert!(!run(&le, "u1", &attrs));

        let between = attr_matcher(
            "age",
            MatcherKind::Between { lo: 18, hi: 30, unit: NumericUnit::Number },
        );
        assert!(run(&between, "u1", &attrs));
    }

    #[test]
    fn numeric_string_attribute_coerces_via_parse() {
        let mut attrs = Attributes::new();
        attrs.insert("age".into(), AttributeValue::String("42".into()));
        let eq = attr_matcher("age", MatcherKind::EqualTo { value: 42, unit: NumericUnit::Number });
        assert!(run(&eq, "u1", &attrs));
    }

    #[test]
    fn datetime_unit_normalizes_to_day_boundary() {
        const MS_PER_DAY: i64 = 86_400_000;
        let mut attrs = Attributes::new();
        // Same UTC day as `2 * MS_PER_DAY`, 12 hours later.
        attrs.insert(
            "signup".into(),
            AttributeValue::Number((2 * MS_PER_DAY + MS_PER_DAY / 2) as f64),
        );
        let eq = attr_matcher(
            "signup",
            MatcherKind::EqualTo { value: 2 * MS_PER_DAY, unit: NumericUnit::Datetime },
        );
        assert!(run(&eq, "u1", &attrs));
    }

    #[test]
    fn set_matchers_treat_missing_attribute_as_empty_input_and_false() {
        let m = attr_matcher("roles", MatcherKind::EqualToSet { values: vec!["a".into()] });
        assert!(!run(&m, "u1", &Attributes::new()));
    }

    #[test]
    fn set_matchers_compare_list_attributes() {
        let mut attrs = Attributes::new();
        attrs.insert(
            "roles".into(),
            AttributeValue::List(vec!["admin".into(), "beta".into()]),
        );

        let equal = attr_matcher(
            "roles",
            MatcherKind::EqualToSet { values: vec!["admin".into(), "beta".into()] },
        );
        assert!(run(&equal, "u1", &attrs));

        let any = attr_matcher(
            "roles",
            MatcherKind::ContainsAnyOfSet { values: vec!["beta".into(), "gamma".into()] },
        );
        assert!(run(&any, "u1", &attrs));

        let all = attr_matcher(
            "roles",
            MatcherKind::ContainsAllOfSet { values: vec!["admin".into(), "beta".into()] },
        );
        assert!(run(&all, "u1", &attrs));

        let missing_all = attr_matcher(
            "roles",
            MatcherKind::ContainsAllOfSet { values: vec!["admin".into(), "gamma".into()] },
        );
        assert!(!run(&missing_all, "u1", &attrs));

        let part_of = attr_matcher(
            "roles",
            MatcherKind::PartOfSet { values: vec!["admin".into(), "beta".into(), "gamma".into()] },
        );
        assert!(run(&part_of, "u1", &attrs));

        let not_part_of = matcher(MatcherKind::PartOfSet { values: vec!["admin".into()] });
        assert!(!run(&not_part_of, "u1", &Attributes::new()));
    }

    #[test]
    fn string_family_matches_any_candidate() {
        let starts = matcher(MatcherKind::StartsWith { prefixes: vec!["foo".into(), "bar".into()] });
        assert!(run(&starts, "barbaz", &Attributes::new()));
        assert!(!run(&starts, "bazbar", &Attributes::new()));

        let ends = matcher(MatcherKind::EndsWith { suffixes: vec!["baz".into()] });
        assert!(run(&ends, "foobaz", &Attributes::new()));

        let contains = matcher(MatcherKind::ContainsString { substrings: vec!["oob".into()] });
        assert!(run(&contains, "foobaz", &Attributes::new()));
        assert!(!run(&contains, "xyz", &Attributes::new()));
    }

    #[test]
    fn matches_string_compiles_and_applies_regex() {
        let m = matcher(MatcherKind::MatchesString { pattern: "^foo.*baz$".into() });
        assert!(run(&m, "foobarbaz", &Attributes::new()));
        assert!(!run(&m, "nope", &Attributes::new()));
    }

    #[test]
    fn present_but_wrong_typed_attribute_fails_coercion_same_as_mismatch() {
        let mut attrs = Attributes::new();
        attrs.insert("age".into(), AttributeValue::List(vec!["not".into(), "a".into(), "number".into()]));
        let eq = attr_matcher("age", MatcherKind::EqualTo { value: 10, unit: NumericUnit::Number });
        assert!(!run(&eq, "u1", &attrs));
    }

    #[test]
    fn matches_string_with_invalid_regex_resolves_false_not_panic() {
        let m = matcher(MatcherKind::MatchesString { pattern: "(unterminated".into() });
        assert!(!run(&m, "anything", &Attributes::new()));
    }

    #[test]
    fn equal_to_boolean_accepts_bool_and_case_insensitive_string() {
        let mut attrs = Attributes::new();
        attrs.insert("active".into(), AttributeValue::Bool(true));
        let m = attr_matcher("active", MatcherKind::EqualToBoolean { value: true });
        assert!(run(&m, "u1", &attrs));

        let mut attrs2 = Attributes::new();
        attrs2.insert("active".into(), AttributeValue::String("TRUE".into()));
        assert!(run(&m, "u1", &attrs2));

        let mut attrs3 = Attributes::new();
        attrs3.insert("active".into(), AttributeValue::String("false".into()));
        assert!(!run(&m, "u1", &attrs3));
    }

    #[test]
    fn dependency_matcher_checks_allowed_treatments() {
        let m = matcher(MatcherKind::Dependency {
            feature: "base".into(),
            treatments: vec!["on".into()],
        });
        assert!(run(&m, "u1", &Attributes::new()));

        let m_off = matcher(MatcherKind::Dependency {
            feature: "base".into(),
            treatments: vec!["off".into()],
        });
        assert!(!run(&m_off, "u1", &Attributes::new()));
    }

    #[test]
    fn matcher_group_and_short_circuits_on_first_false() {
        let group = MatcherGroup {
            combinator: crate::model::Combinator::And,
            matchers: vec![
                matcher(MatcherKind::AllKeys),
                matcher(MatcherKind::Whitelist { whitelist: vec!["alice".into()] }),
            ],
        };
        let mut visited = HashSet::new();
        assert!(!group.matches("carol", &Attributes::new(), "carol", &ctx(), &mut visited));
    }

    #[test]
    fn matcher_group_or_short_circuits_on_first_true() {
        let group = MatcherGroup {
            combinator: crate::model::Combinator::Or,
            matchers: vec![
                matcher(MatcherKind::Whitelist { whitelist: vec!["alice".into()] }),
                matcher(MatcherKind::MatchesString { pattern: "(unterminated".into() }),
            ],
        };
        let mut visited = HashSet::new();
        assert!(group.matches("alice", &Attributes::new(), "alice", &ctx(), &mut visited));
    }
}
