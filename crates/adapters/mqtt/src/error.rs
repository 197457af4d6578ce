//! MQTT adapter error types.

use hearth_domain::error::HubError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The broker address could not be parsed.
    #[error("invalid broker address ({0})")]
    InvalidBroker(String),

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),

    /// The connection to the broker failed.
    #[error("MQTT connection error")]
    Connection(#[from] rumqttc::ConnectionError),
}

impl From<MqttError> for HubError {
    fn from(err: MqttError) -> Self {
        match err {
            MqttError::InvalidBroker(address) => {
                Self::Invalid(format!("invalid broker address ({address})"))
            }
            other => Self::internal_from("MQTT transport failure", other),
        }
    }
}
