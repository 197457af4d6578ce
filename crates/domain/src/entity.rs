//! Entity: one observable or controllable capability of a device.
//!
//! An entity (a light, a temperature probe, a relay) is owned by a
//! [`Device`](crate::device::Device). Its id is derived from its kind and
//! name, so announcing the same capability twice yields the same entity.

mod feature;
mod kind;
pub mod payload;
mod state;
mod value;

use serde::{Deserialize, Serialize};

pub use self::feature::{LightFeature, SensorClass, unit};
pub use self::kind::EntityKind;
pub use self::state::EntityState;
pub use self::value::{Scalar, StateValue};
use crate::id::{DeviceId, EntityId};
use crate::time::Timestamp;

/// A single capability of a device and its recorded states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Name of the adapter module that manages the entity.
    pub module: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub states: Vec<EntityState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Entity {
    /// Declare an entity with an id derived from `kind` and `name`.
    #[must_use]
    pub fn new(kind: EntityKind, name: impl Into<String>, module: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: EntityId::derive(kind.as_str(), &name),
            name,
            kind,
            module: module.into(),
            features: Vec::new(),
            states: Vec::new(),
            device_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Declare a light with the given capabilities.
    #[must_use]
    pub fn light(
        name: impl Into<String>,
        module: impl Into<String>,
        features: impl IntoIterator<Item = LightFeature>,
    ) -> Self {
        Self::new(EntityKind::Light, name, module).with_features(features)
    }

    #[must_use]
    pub fn sensor(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self::new(EntityKind::Sensor, name, module)
    }

    #[must_use]
    pub fn binary_switch(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self::new(EntityKind::BinarySwitch, name, module)
    }

    #[must_use]
    pub fn with_features<F: Into<String>>(mut self, features: impl IntoIterator<Item = F>) -> Self {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    /// Record an observation of this entity.
    pub fn add_state(&mut self, value: impl Into<StateValue>) {
        self.states.push(EntityState::new(self.id.clone(), value));
    }

    /// Most recent recorded state, if any.
    #[must_use]
    pub fn latest_state(&self) -> Option<&EntityState> {
        self.states.last()
    }
}
