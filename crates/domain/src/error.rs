//! Error taxonomy shared by every layer.
//!
//! Adapters define their own typed errors and convert into [`HubError`] at
//! the boundary. Transports turn a [`HubError`] into a status code or an
//! error frame using [`HubError::code`] and the sanitized message.

use std::fmt;

/// Boxed source error kept for logging only.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable, client-visible error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// An identifier is already taken.
    Conflict,
    /// A referenced record does not exist.
    NotFound,
    /// Malformed input or a violated constraint.
    Invalid,
    /// Unexpected or storage-layer fault.
    Internal,
}

impl ErrorCode {
    /// The wire representation of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Invalid => "invalid",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level error returned by services, repositories and handlers.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("<conflict> {0}")]
    Conflict(String),

    #[error("<not_found> {0}")]
    NotFound(String),

    #[error("<invalid> {0}")]
    Invalid(String),

    #[error("<internal> {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl HubError {
    /// Build an [`HubError::Internal`] without an underlying cause.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Build an [`HubError::Internal`] wrapping the error that caused it.
    #[must_use]
    pub fn internal_from(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Classification of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Invalid(_) => ErrorCode::Invalid,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Whether the error carries the given classification.
    #[must_use]
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == code
    }

    /// Message safe to hand to an API client.
    ///
    /// Internal errors collapse to a generic message; their detail is only
    /// available through `Display` and the source chain, for logs.
    #[must_use]
    pub fn public_message(&self) -> &str {
        match self {
            Self::Conflict(msg) | Self::NotFound(msg) | Self::Invalid(msg) => msg,
            Self::Internal { .. } => "internal server error",
        }
    }
}
