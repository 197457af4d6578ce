//! Topic patterns with single-level wildcards.

use std::fmt;
use std::str::FromStr;

use hearth_domain::error::HubError;

/// Segment matching exactly one non-empty topic segment.
pub const WILDCARD: &str = "+";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// A `/`-separated topic pattern, parsed once at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Parse a pattern such as `hearth/shellies/+/info`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] for an empty pattern, an empty segment,
    /// a multi-level `#` wildcard, or a `+` mixed with other characters.
    pub fn parse(raw: &str) -> Result<Self, HubError> {
        if raw.is_empty() {
            return Err(HubError::Invalid("topic pattern must not be empty".into()));
        }
        let segments = raw
            .split('/')
            .map(|segment| match segment {
                "" => Err(HubError::Invalid(format!(
                    "topic pattern ({raw}) has an empty segment"
                ))),
                WILDCARD => Ok(Segment::Wildcard),
                s if s.contains('#') => Err(HubError::Invalid(format!(
                    "topic pattern ({raw}) uses an unsupported multi-level wildcard"
                ))),
                s if s.contains('+') => Err(HubError::Invalid(format!(
                    "topic pattern ({raw}) mixes a wildcard with text in one segment"
                ))),
                s => Ok(Segment::Literal(s.to_owned())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `topic` has as many segments as the pattern, every literal
    /// segment is equal, and every wildcard covers a non-empty segment.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        let mut parts = topic.split('/');
        for segment in &self.segments {
            match (segment, parts.next()) {
                (_, None) => return false,
                (Segment::Wildcard, Some(part)) => {
                    if part.is_empty() {
                        return false;
                    }
                }
                (Segment::Literal(literal), Some(part)) => {
                    if literal != part {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }
}

impl FromStr for TopicPattern {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
