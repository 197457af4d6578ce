//! Entity state: one point-in-time observation of an entity.

use serde::{Deserialize, Serialize};

use super::StateValue;
use crate::id::EntityId;
use crate::time::Timestamp;

/// Immutable observation appended to an entity's history.
///
/// `created_at` is assigned by storage when the state is persisted; states
/// built by adapters leave it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: EntityId,
    pub value: StateValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl EntityState {
    #[must_use]
    pub fn new(entity_id: EntityId, value: impl Into<StateValue>) -> Self {
        Self {
            entity_id,
            value: value.into(),
            created_at: None,
        }
    }

    /// Whether `value` is the exact same reading as this state.
    ///
    /// A null on either side never counts as equal, so an explicit null
    /// reading is always recorded.
    #[must_use]
    pub fn is_equal(&self, value: &StateValue) -> bool {
        !self.value.is_null() && !value.is_null() && self.value == *value
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_report_equal_when_values_match_deeply() {
        let id = EntityId::derive("light", "desk");
        let state = EntityState::new(id, StateValue::from(json!({"is_on": true, "brightness": 3})));
        assert!(state.is_equal(&StateValue::from(json!({"brightness": 3, "is_on": true}))));
        assert!(!state.is_equal(&StateValue::from(json!({"brightness": 4, "is_on": true}))));
    }

    #[test]
    fn should_never_report_equal_when_value_is_null() {
        let id = EntityId::derive("sensor", "probe");
        let state = EntityState::new(id, StateValue::default());
        assert!(!state.is_equal(&StateValue::default()));
    }

    #[test]
    fn should_skip_created_at_when_serializing_unpersisted_state() {
        let id = EntityId::derive("binary_switch", "relay");
        let state = EntityState::new(id, json!({"is_on": false}));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            json!({"entity_id": "binary_switch.relay", "value": {"is_on": false}})
        );
    }
}
