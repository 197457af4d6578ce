//! Event: the envelope carried over the message bus.
//!
//! On the wire an event is a JSON object `{topic, timestamp, payload}` where
//! `payload` is the base64 encoding of the serialized domain object. The
//! receiving side always trusts the transport topic over the one in the body.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::entity::EntityState;
use crate::error::HubError;
use crate::time::{Timestamp, now};

/// Namespace every bus topic lives under.
pub const NAMESPACE: &str = "hearth";

/// Topics the hub itself publishes and consumes, without namespace.
pub mod topic {
    pub const DEVICE_DISCOVERED: &str = "device/discovered";
    pub const ENTITY_STATE_UPDATE: &str = "entity/state_update";
    pub const HEARTBEAT: &str = "system/heartbeat";

    /// `command/<name>`
    #[must_use]
    pub fn command(name: &str) -> String {
        format!("command/{name}")
    }

    /// `<name>/discover`
    #[must_use]
    pub fn discover(name: &str) -> String {
        format!("{name}/discover")
    }
}

/// Prefix a logical topic with the bus namespace.
#[must_use]
pub fn namespaced(topic: &str) -> String {
    format!("{NAMESPACE}/{topic}")
}

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub topic: String,
    pub timestamp: Timestamp,
    #[serde(default, with = "base64_payload")]
    pub payload: Vec<u8>,
}

impl Event {
    /// Empty event on the namespaced `topic`, stamped now.
    #[must_use]
    pub fn new(topic: &str) -> Self {
        Self {
            topic: namespaced(topic),
            timestamp: now(),
            payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn command(name: &str) -> Self {
        Self::new(&topic::command(name))
    }

    #[must_use]
    pub fn discover(name: &str) -> Self {
        Self::new(&topic::discover(name))
    }

    /// Announce a discovered device.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if the device cannot be serialized.
    pub fn discovered(device: &Device) -> Result<Self, HubError> {
        Self::new(topic::DEVICE_DISCOVERED).with_payload(device)
    }

    /// Announce fresh observations for one or more entities.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if the states cannot be serialized.
    pub fn entity_state_update(states: &[EntityState]) -> Result<Self, HubError> {
        Self::new(topic::ENTITY_STATE_UPDATE).with_payload(states)
    }

    /// Set the payload to the JSON encoding of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if `data` cannot be serialized.
    pub fn with_payload<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self, HubError> {
        self.payload = serde_json::to_vec(data)
            .map_err(|err| HubError::internal_from("failed to marshal payload", err))?;
        Ok(self)
    }

    /// Decode the payload.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] if the payload does not decode as `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, HubError> {
        serde_json::from_slice(&self.payload)
            .map_err(|err| HubError::Invalid(format!("failed to unmarshal payload: {err}")))
    }

    /// Serialize the whole envelope for the transport.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if the envelope cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, HubError> {
        serde_json::to_vec(self).map_err(|err| HubError::internal_from("failed to marshal event", err))
    }

    /// Parse an envelope received on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] if `body` is not a valid envelope.
    pub fn parse(body: &[u8], topic: &str) -> Result<Self, HubError> {
        let mut event: Self = serde_json::from_slice(body)
            .map_err(|err| HubError::Invalid(format!("malformed event on ({topic}): {err}")))?;
        topic.clone_into(&mut event.topic);
        Ok(event)
    }
}

mod base64_payload {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::entity::Entity;
    use crate::id::EntityId;

    #[test]
    fn should_prefix_topic_with_namespace() {
        assert_eq!(Event::new("device/discovered").topic, "hearth/device/discovered");
        assert_eq!(Event::command("light").topic, "hearth/command/light");
        assert_eq!(Event::discover("shelly").topic, "hearth/shelly/discover");
    }

    #[test]
    fn should_encode_payload_as_base64() {
        let event = Event::new("x").with_payload(&json!({"a": 1})).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(json["payload"], "eyJhIjoxfQ==");
    }

    #[test]
    fn should_trust_transport_topic_when_parsing() {
        let event = Event::new("device/discovered");
        let parsed = Event::parse(&event.to_bytes().unwrap(), "hearth/other").unwrap();
        assert_eq!(parsed.topic, "hearth/other");
        assert_eq!(parsed.timestamp, event.timestamp);
    }

    #[test]
    fn should_return_invalid_when_body_is_not_an_envelope() {
        assert!(matches!(
            Event::parse(b"not json", "hearth/x"),
            Err(HubError::Invalid(_))
        ));
    }

    #[test]
    fn should_carry_discovered_device() {
        let device = Device::builder()
            .identifier("shelly-1")
            .entity(Entity::binary_switch("Relay", "shelly"))
            .build()
            .unwrap();
        let event = Event::discovered(&device).unwrap();
        let decoded: Device = event.payload().unwrap();
        assert_eq!(decoded, device);
    }

    #[test]
    fn should_carry_state_updates() {
        let state = EntityState::new(EntityId::derive("light", "desk"), json!({"brightness": 80}));
        let event = Event::entity_state_update(std::slice::from_ref(&state)).unwrap();
        assert_eq!(event.topic, "hearth/entity/state_update");
        let decoded: Vec<EntityState> = event.payload().unwrap();
        assert_eq!(decoded, vec![state]);
    }
}
