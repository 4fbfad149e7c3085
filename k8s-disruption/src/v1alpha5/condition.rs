use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use super::*;

/// `ConditionStatus` follows the Kubernetes tri-state convention
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("True"),
            Self::False => f.write_str("False"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// `Condition` is a single observation attached to a resource status
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// type of the condition, unique within one resource
    ///
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    /// severity with which to treat failures of this condition
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// the last time the condition moved from one status to another
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<metav1::Time>,

    /// one-word CamelCase reason for the last transition
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// human readable details about the last transition
    /// +optional
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    pub fn new(type_: impl ToString, status: ConditionStatus) -> Self {
        Self {
            type_: type_.to_string(),
            status,
            severity: None,
            last_transition_time: None,
            reason: None,
            message: None,
        }
    }

    pub fn transitioned(self, time: impl Into<Option<metav1::Time>>) -> Self {
        Self {
            last_transition_time: time.into(),
            ..self
        }
    }

    pub fn reason(self, reason: impl ToString) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..self
        }
    }

    pub fn message(self, message: impl ToString) -> Self {
        Self {
            message: Some(message.to_string()),
            ..self
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// `Conditions` holds at most one `Condition` per type.
///
/// On the wire it is the conventional list of conditions, ordered by type.
/// Duplicate types in an incoming list collapse to the last occurrence.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Condition>", into = "Vec<Condition>")]
pub struct Conditions(BTreeMap<String, Condition>);

impl Conditions {
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.get(type_)
    }

    /// Insert `condition`, returning the one it replaced
    ///
    pub fn insert(&mut self, condition: Condition) -> Option<Condition> {
        self.0.insert(condition.type_.clone(), condition)
    }

    pub fn remove(&mut self, type_: &str) -> Option<Condition> {
        self.0.remove(type_)
    }

    pub fn is_true(&self, type_: &str) -> bool {
        self.get(type_).is_some_and(Condition::is_true)
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, Condition> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Condition>> for Conditions {
    fn from(conditions: Vec<Condition>) -> Self {
        conditions.into_iter().collect()
    }
}

impl From<Conditions> for Vec<Condition> {
    fn from(conditions: Conditions) -> Self {
        conditions.0.into_values().collect()
    }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        let mut conditions = Self::default();
        for condition in iter {
            conditions.insert(condition);
        }
        conditions
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a Condition;
    type IntoIter = btree_map::Values<'a, String, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
