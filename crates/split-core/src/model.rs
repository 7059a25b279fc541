//! The authored rule shape: [`Split`], [`Condition`], [`Partition`] and the
//! enums that tag their variants. This is the JSON wire shape the split-sync
//! task deserializes from the remote rule service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::matcher::MatcherGroup;

/// Lifecycle state of a [`Split`]. A split with status `Archived` (or absent
/// from the latest sync payload) is removed from storage by `PutMany`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitStatus {
    Active,
    Archived,
}

/// Hash function selector feeding the bucketing routine.
/// Absent or zero in the wire payload means [`Algo::Legacy`].
///
/// The wire format is the bare integer discriminant (`1`/`2`), not the
/// variant name, so this carries a hand-written `Deserialize`/`Serialize`
/// pair instead of the derive: a derived `Deserialize` for a fieldless enum
/// reads variant names (or a 0-based positional index), never the
/// `#[repr(i32)]` value, and would silently misread a real `"algo": 2`
/// payload as the wrong variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Algo {
    #[default]
    Legacy = 1,
    Murmur = 2,
}

impl Algo {
    pub fn from_wire(value: i32) -> Self {
        match value {
            2 => Algo::Murmur,
            _ => Algo::Legacy,
        }
    }
}

impl<'de> serde::Deserialize<'de> for Algo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        Ok(Algo::from_wire(value))
    }
}

impl Serialize for Algo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(*self as i32)
    }
}

/// How a condition's matchers combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

/// Whether a condition is a rollout (percentage split) or a whitelist
/// short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionType {
    Rollout,
    Whitelist,
}

impl Default for ConditionType {
    fn default() -> Self {
        ConditionType::Rollout
    }
}

/// One treatment slice within a rollout condition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Partition {
    pub treatment: String,
    pub size: u32,
}

/// A single rule within a [`Split`]'s condition list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Condition {
    #[serde(default)]
    pub condition_type: ConditionType,
    #[serde(default)]
    pub label: String,
    pub matcher_group: MatcherGroup,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

/// A feature flag definition as authored remotely.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Split {
    pub name: String,
    pub traffic_type_name: String,
    #[serde(default)]
    pub killed: bool,
    pub default_treatment: String,
    pub change_number: i64,
    #[serde(default = "default_status")]
    pub status: SplitStatus,
    #[serde(default)]
    pub seed: i32,
    #[serde(default)]
    pub algo: Algo,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_status() -> SplitStatus {
    SplitStatus::Active
}

impl Split {
    /// Union of partition treatments across every condition, insertion
    /// order, used by the runtime crate's `SplitManager`/`SplitView`
    /// projection.
    pub fn treatments(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for condition in &self.conditions {
            for partition in &condition.partitions {
                if seen.insert(partition.treatment.clone()) {
                    out.push(partition.treatment.clone());
                }
            }
        }
        out
    }
}

/// A named set of matching keys. The in-process and remote storage
/// backends both replace this atomically per segment.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub name: String,
    pub keys: std::collections::HashSet<String>,
    pub till: i64,
}

/// Attribute bag passed into [`crate::evaluator::Evaluator::evaluate`].
pub type Attributes = HashMap<String, AttributeValue>;

/// One attribute value. Matchers coerce across variants where the matcher
/// grammar allows it (e.g. numeric string -> number) and fail closed
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}
