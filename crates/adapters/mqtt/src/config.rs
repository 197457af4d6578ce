//! MQTT broker configuration.

use serde::Deserialize;

use crate::error::MqttError;

/// Configuration for the MQTT bus transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address. Empty means not configured.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Capacity of the request queue towards the broker and of each
    /// subscription channel.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: String::new(),
            broker_port: 1883,
            client_id: "hearth".to_string(),
            keep_alive_secs: 5,
            channel_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Set the broker from a `host[:port]` address.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidBroker`] if the host is empty or the
    /// port is not a number.
    pub fn set_broker(&mut self, address: &str) -> Result<(), MqttError> {
        let address = address.trim();
        let address = address.strip_prefix("tcp://").unwrap_or(address);
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| MqttError::InvalidBroker(address.to_string()))?;
                (host, port)
            }
            None => (address, self.broker_port),
        };
        if host.is_empty() {
            return Err(MqttError::InvalidBroker(address.to_string()));
        }
        self.broker_host = host.to_string();
        self.broker_port = port;
        Ok(())
    }

    /// Whether a broker address is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.broker_host.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = MqttConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.client_id, "hearth");
        assert_eq!(config.keep_alive_secs, 5);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            broker_host = "mqtt.example.com"
            broker_port = 8883
            client_id = "my-hub"
            keep_alive_secs = 60
            channel_capacity = 16
        "#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_host, "mqtt.example.com");
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.client_id, "my-hub");
        assert_eq!(config.keep_alive_secs, 60);
        assert_eq!(config.channel_capacity, 16);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let toml = r#"broker_host = "192.168.1.100""#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_host, "192.168.1.100");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.client_id, "hearth");
    }

    #[test]
    fn should_parse_broker_address_with_and_without_port() {
        let mut config = MqttConfig::default();
        config.set_broker("tcp://broker.local:1884").unwrap();
        assert_eq!(config.broker_host, "broker.local");
        assert_eq!(config.broker_port, 1884);

        config.set_broker("other.local").unwrap();
        assert_eq!(config.broker_host, "other.local");
        assert_eq!(config.broker_port, 1884);
    }

    #[test]
    fn should_reject_malformed_broker_address() {
        let mut config = MqttConfig::default();
        assert!(matches!(config.set_broker(":1883"), Err(MqttError::InvalidBroker(_))));
        assert!(matches!(config.set_broker("host:port"), Err(MqttError::InvalidBroker(_))));
    }
}
