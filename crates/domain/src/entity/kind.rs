//! Entity kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Domain tag of an entity. Also the prefix of its [`EntityId`](crate::id::EntityId).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Light,
    Sensor,
    BinarySwitch,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Sensor => "sensor",
            Self::BinarySwitch => "binary_switch",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "sensor" => Ok(Self::Sensor),
            "binary_switch" => Ok(Self::BinarySwitch),
            other => Err(HubError::Invalid(format!("unknown entity kind ({other})"))),
        }
    }
}
