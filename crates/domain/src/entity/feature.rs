//! Capability tags, sensor classes and units of measurement.

use serde::{Deserialize, Serialize};

/// Capability a light entity advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightFeature {
    Brightness,
    Color,
    ColorTemp,
    Effect,
    Flash,
    Transition,
    WhiteValue,
}

impl LightFeature {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Color => "color",
            Self::ColorTemp => "color_temp",
            Self::Effect => "effect",
            Self::Flash => "flash",
            Self::Transition => "transition",
            Self::WhiteValue => "white_value",
        }
    }
}

impl From<LightFeature> for String {
    fn from(value: LightFeature) -> Self {
        value.as_str().to_owned()
    }
}

/// What a sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorClass {
    Battery,
    Humidity,
    Illuminance,
    SignalStrength,
    Temperature,
    Power,
    Pressure,
    Timestamp,
}

impl SensorClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Humidity => "humidity",
            Self::Illuminance => "illuminance",
            Self::SignalStrength => "signal_strength",
            Self::Temperature => "temperature",
            Self::Power => "power",
            Self::Pressure => "pressure",
            Self::Timestamp => "timestamp",
        }
    }
}

/// Units of measurement reported by sensors.
pub mod unit {
    pub const PERCENT: &str = "%";
    pub const LUMEN: &str = "lm";
    pub const DECIBEL: &str = "dB";
    pub const DECIBEL_MILLIWATT: &str = "dBm";
    pub const CELSIUS: &str = "°C";
    pub const FAHRENHEIT: &str = "°F";
    pub const TIMESTAMP: &str = "ISO8601";
    pub const WATT: &str = "W";
    pub const KILOWATT: &str = "kW";
    pub const HECTOPASCAL: &str = "hPa";
    pub const MILLIBAR: &str = "mbar";
}
