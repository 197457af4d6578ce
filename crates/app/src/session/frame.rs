//! Session wire frames.

use serde::{Deserialize, Serialize};

use hearth_domain::error::HubError;

/// Code sent when an inbound frame cannot be parsed.
pub const BAD_REQUEST: &str = "bad_request";

/// Inbound frame: `{request_id, topic, data}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub request_id: String,
    pub topic: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Error part of an outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&HubError> for ErrorBody {
    fn from(err: &HubError) -> Self {
        Self {
            code: err.code().as_str().to_owned(),
            message: err.public_message().to_owned(),
        }
    }
}

/// Outbound frame: `{request_id, topic, result?, error?}`.
///
/// Server-initiated broadcasts use the same shape without a request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    #[must_use]
    pub fn result(request_id: &str, topic: &str, result: serde_json::Value) -> Self {
        Self {
            request_id: request_id.to_owned(),
            topic: topic.to_owned(),
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn empty(request_id: &str, topic: &str) -> Self {
        Self {
            request_id: request_id.to_owned(),
            topic: topic.to_owned(),
            result: None,
            error: None,
        }
    }

    #[must_use]
    pub fn error(request_id: &str, topic: &str, error: ErrorBody) -> Self {
        Self {
            request_id: request_id.to_owned(),
            topic: topic.to_owned(),
            result: None,
            error: Some(error),
        }
    }

    /// A frame pushed by the server, not answering any request.
    #[must_use]
    pub fn broadcast(topic: &str, result: serde_json::Value) -> Self {
        Self::result("", topic, result)
    }

    /// Serialize for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if the frame cannot be serialized.
    pub fn to_text(&self) -> Result<String, HubError> {
        serde_json::to_string(self).map_err(|err| HubError::internal_from("failed to encode session frame", err))
    }
}
