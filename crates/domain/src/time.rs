//! Timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::HubError;

/// UTC timestamp carried by devices, entities, states and events.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Fixed-width RFC 3339 form (microseconds, `Z` suffix).
///
/// Two values compare the same way as text and as timestamps, so the text
/// can be indexed and ordered directly.
#[must_use]
pub fn to_sortable(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse any RFC 3339 timestamp into UTC.
///
/// # Errors
///
/// Returns [`HubError::Invalid`] if `raw` is not RFC 3339.
pub fn parse(raw: &str) -> Result<Timestamp, HubError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.to_utc())
        .map_err(|err| HubError::Invalid(format!("invalid timestamp ({raw}): {err}")))
}
