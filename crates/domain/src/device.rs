//! Device: a physical or virtual thing that exposes one or more entities.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::HubError;
use crate::id::DeviceId;
use crate::time::Timestamp;

/// How a device can be reached, e.g. `{type: "mac", value: "A4:CF:12:..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// A device and the entities it owns.
///
/// `identifier` is the stable key supplied by the adapter that discovered
/// the device (e.g. `shelly-1`) and is unique across the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: DeviceId,
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] when `identifier` or `name` is empty,
    /// or when an entity appears twice.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.identifier.trim().is_empty() {
            return Err(HubError::Invalid("device identifier must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(HubError::Invalid("device name must not be empty".into()));
        }
        for (index, entity) in self.entities.iter().enumerate() {
            if self.entities[..index].iter().any(|e| e.id == entity.id) {
                return Err(HubError::Invalid(format!(
                    "entity ({}) is declared twice on device ({})",
                    entity.id, self.identifier
                )));
            }
        }
        Ok(())
    }

    pub fn add_connection(&mut self, kind: impl Into<String>, value: impl Into<String>) {
        self.connections.push(Connection {
            kind: kind.into(),
            value: value.into(),
        });
    }

    /// Attach an entity to this device, taking ownership of it.
    pub fn add_entity(&mut self, mut entity: Entity) {
        entity.device_id = Some(self.id);
        self.entities.push(entity);
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    identifier: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    sw_version: Option<String>,
    connections: Vec<Connection>,
    entities: Vec<Entity>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adapter-supplied key. Also used as the name when none is given.
    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn sw_version(mut self, sw_version: impl Into<String>) -> Self {
        self.sw_version = Some(sw_version.into());
        self
    }

    #[must_use]
    pub fn connection(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.connections.push(Connection {
            kind: kind.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] if `identifier` is missing or empty.
    pub fn build(self) -> Result<Device, HubError> {
        let identifier = self.identifier.unwrap_or_default();
        let mut device = Device {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_else(|| identifier.clone()),
            identifier,
            manufacturer: self.manufacturer.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            sw_version: self.sw_version.unwrap_or_default(),
            connections: self.connections,
            entities: Vec::with_capacity(self.entities.len()),
            created_at: None,
            updated_at: None,
        };
        for entity in self.entities {
            device.add_entity(entity);
        }
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::LightFeature;

    #[test]
    fn should_default_name_to_identifier() {
        let device = Device::builder().identifier("shelly-1").build().unwrap();
        assert_eq!(device.name, "shelly-1");
        assert_eq!(device.identifier, "shelly-1");
    }

    #[test]
    fn should_return_invalid_when_identifier_missing() {
        let result = Device::builder().name("Lamp").build();
        assert!(matches!(result, Err(HubError::Invalid(_))));
    }

    #[test]
    fn should_accept_device_without_entities() {
        let device = Device::builder()
            .identifier("bridge")
            .manufacturer("Acme")
            .connection("mac", "00:11:22:33:44:55")
            .build()
            .unwrap();
        assert!(device.entities.is_empty());
        assert_eq!(device.connections[0].kind, "mac");
    }

    #[test]
    fn should_attach_entities_to_the_device() {
        let device = Device::builder()
            .identifier("shelly-1")
            .entity(Entity::light("Shelly 1 Light", "shelly", [LightFeature::Brightness]))
            .build()
            .unwrap();
        assert_eq!(device.entities[0].device_id, Some(device.id));
    }

    #[test]
    fn should_return_invalid_when_entity_declared_twice() {
        let result = Device::builder()
            .identifier("shelly-1")
            .entity(Entity::sensor("Power", "shelly"))
            .entity(Entity::sensor("power", "shelly"))
            .build();
        assert!(matches!(result, Err(HubError::Invalid(_))));
    }

    #[test]
    fn should_serialize_connection_kind_as_type() {
        let device = Device::builder()
            .identifier("plug")
            .connection("ip", "10.0.0.4")
            .build()
            .unwrap();
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["connections"][0]["type"], "ip");
    }
}
