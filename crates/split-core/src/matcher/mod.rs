//! The closed matcher grammar.
//!
//! A [`Matcher`] is a tagged variant over a fixed set of predicate kinds.
//! Each carries a `negate` flag and an optional `attribute` name; resolution
//! of the input value and the negate XOR live in [`eval`].

mod eval;
mod sets;

pub use eval::MatchContext;

use serde::{Deserialize, Serialize};

use crate::model::Combinator;

/// Unit tag for the numeric comparison family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NumericUnit {
    Number,
    Datetime,
}

/// The closed matcher family. `#[serde(tag = "type")]` mirrors the remote
/// rule service's wire format, where each matcher spec names its own kind.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatcherKind {
    AllKeys,
    InSegment {
        segment_name: String,
    },
    Whitelist {
        whitelist: Vec<String>,
    },
    EqualTo {
        value: i64,
        unit: NumericUnit,
    },
    GreaterThanOrEqualTo {
        value: i64,
        unit: NumericUnit,
    },
    LessThanOrEqualTo {
        value: i64,
        unit: NumericUnit,
    },
    Between {
        lo: i64,
        hi: i64,
        unit: NumericUnit,
    },
    EqualToSet {
        values: Vec<String>,
    },
    ContainsAnyOfSet {
        values: Vec<String>,
    },
    ContainsAllOfSet {
        values: Vec<String>,
    },
    PartOfSet {
        values: Vec<String>,
    },
    StartsWith {
        prefixes: Vec<String>,
    },
    EndsWith {
        suffixes: Vec<String>,
    },
    ContainsString {
        substrings: Vec<String>,
    },
    MatchesString {
        pattern: String,
    },
    Dependency {
        feature: String,
        treatments: Vec<String>,
    },
    EqualToBoolean {
        value: bool,
    },
}

/// One matcher in a [`crate::model::Condition`]'s matcher group.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Matcher {
    #[serde(default)]
    pub negate: bool,
    /// `None` means "match against the matching key itself".
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(flatten)]
    pub kind: MatcherKind,
}

/// A condition's combinator plus its ordered matcher list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatcherGroup {
    #[serde(default = "default_combinator")]
    pub combinator: Combinator,
    pub matchers: Vec<Matcher>,
}

fn default_combinator() -> Combinator {
    Combinator::And
}

impl MatcherGroup {
    /// AND short-circuits on first false, OR short-circuits on first true.
    /// An empty matcher list vacuously matches under AND and fails to match
    /// under OR.
    pub fn matches(
        &self,
        matching_key: &str,
        attributes: &crate::model::Attributes,
        bucketing_key: &str,
        ctx: &dyn MatchContext,
        visited: &mut std::collections::HashSet<String>,
    ) -> bool {
        match self.combinator {
            Combinator::And => self
                .matchers
                .iter()
                .all(|m| m.matches(matching_key, attributes, bucketing_key, ctx, visited)),
            Combinator::Or => self
                .matchers
                .iter()
                .any(|m| m.matches(matching_key, attributes, bucketing_key, ctx, visited)),
        }
    }
}
