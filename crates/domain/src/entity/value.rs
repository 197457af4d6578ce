//! Structured state values.
//!
//! A [`StateValue`] is what an [`EntityState`](super::EntityState) records:
//! a scalar reading, an ordered list, or a nested key/value map. Only maps
//! take part in partial-update merging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Leaf value of a [`StateValue`].
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => number_eq(a, b),
            _ => false,
        }
    }
}

// `80` and `80.0` are the same reading.
#[allow(clippy::float_cmp)]
fn number_eq(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if a.is_f64() || b.is_f64() {
        return a.as_f64() == b.as_f64();
    }
    a == b
}

/// Structured payload of one entity observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum StateValue {
    Scalar(Scalar),
    List(Vec<StateValue>),
    Map(BTreeMap<String, StateValue>),
}

impl Default for StateValue {
    fn default() -> Self {
        Self::Scalar(Scalar::Null)
    }
}

impl StateValue {
    /// An empty map, the starting point for composite payloads.
    #[must_use]
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Insert `key` when `self` is a map. Other variants are left untouched.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        if let Self::Map(ref mut map) = self {
            map.insert(key.into(), value.into());
        }
        self
    }

    #[must_use]
    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Apply `self` as an update on top of `prior`.
    ///
    /// A map is deep-merged into the prior map: keys only present in `prior`
    /// are kept, keys present in both take the value from `self`, and nested
    /// maps merge recursively. Any other variant fully replaces `prior`.
    ///
    /// A null `prior` counts as no prior value at all.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] when `self` is a map but `prior` is
    /// neither a map nor null.
    pub fn merged_over(self, prior: &StateValue) -> Result<StateValue, HubError> {
        match (self, prior) {
            (Self::Map(update), Self::Map(base)) => Ok(Self::Map(merge_maps(base.clone(), update))),
            (Self::Map(update), prior) if prior.is_null() => Ok(Self::Map(update)),
            (Self::Map(_), _) => Err(HubError::Invalid(
                "cannot merge a map into a state value that is not a map".into(),
            )),
            (other, _) => Ok(other),
        }
    }
}

fn merge_maps(
    mut base: BTreeMap<String, StateValue>,
    update: BTreeMap<String, StateValue>,
) -> BTreeMap<String, StateValue> {
    for (key, value) in update {
        let merged = match (base.remove(&key), value) {
            (Some(StateValue::Map(inner)), StateValue::Map(patch)) => {
                StateValue::Map(merge_maps(inner, patch))
            }
            (_, value) => value,
        };
        base.insert(key, merged);
    }
    base
}

impl From<serde_json::Value> for StateValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Scalar(Scalar::Null),
            Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Self::Scalar(Scalar::Number(n)),
            Value::String(s) => Self::Scalar(Scalar::Text(s)),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<StateValue> for serde_json::Value {
    fn from(value: StateValue) -> Self {
        match value {
            StateValue::Scalar(Scalar::Null) => Self::Null,
            StateValue::Scalar(Scalar::Bool(b)) => Self::Bool(b),
            StateValue::Scalar(Scalar::Number(n)) => Self::Number(n),
            StateValue::Scalar(Scalar::Text(s)) => Self::String(s),
            StateValue::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            StateValue::Map(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Number(value.into()))
    }
}

impl From<u32> for StateValue {
    fn from(value: u32) -> Self {
        Self::Scalar(Scalar::Number(value.into()))
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map_or(Self::Scalar(Scalar::Null), |n| Self::Scalar(Scalar::Number(n)))
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::Text(value.to_owned()))
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::Text(value))
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Scalar(Scalar::Null), Into::into)
    }
}
