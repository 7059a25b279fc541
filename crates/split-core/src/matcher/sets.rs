use std::collections::HashSet;

use crate::model::{AttributeValue, Attributes};

/// Resolve the string-set input for the set-theoretic matcher family.
/// When the matcher targets an attribute, a `List` attribute
/// contributes its elements and a `String` attribute contributes itself as
/// a singleton; anything else (missing, wrong type) yields an empty set —
/// the caller then reports `false` per "empty input ⇒ false". When the
/// matcher targets the matching key itself, the set is the singleton
/// `{matching_key}`.
pub(super) fn resolve_string_set(
    attribute: &Option<String>,
    matching_key: &str,
    attributes: &Attributes,
) -> HashSet<String> {
    match attribute {
        None => HashSet::from([matching_key.to_string()]),
        Some(name) => match attributes.get(name) {
            Some(AttributeValue::List(items)) => items.iter().cloned().collect(),
            Some(AttributeValue::String(s)) => HashSet::from([s.clone()]),
            _ => HashSet::new(),
        },
    }
}

/// `STARTS_WITH` / `ENDS_WITH` / `CONTAINS_STRING`: OR across candidates.
/// No resolvable string input ⇒ false.
pub(super) fn starts_ends_contains(
    input: Option<&str>,
    candidates: &[String],
    predicate: impl Fn(&str, &str) -> bool,
) -> bool {
    match input {
        Some(s) => candidates.iter().any(|c| predicate(s, c)),
        None => false,
    }
}
