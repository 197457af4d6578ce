//! Typed state payloads for the built-in entity kinds.
//!
//! Adapters build one of these and turn it into a [`StateValue`] before
//! announcing it, which keeps the stored shape uniform per kind.

use serde::{Deserialize, Serialize};

use super::{SensorClass, StateValue};

/// Colour temperature in mireds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTemp {
    pub value: u32,
    pub max: u32,
    pub min: u32,
}

/// State of a light or bulb.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub brightness: u32,
    /// Colour as `hsl(h, s%, l%)`.
    pub hsl: String,
    pub is_on: bool,
    pub color_temp: Option<ColorTemp>,
    pub mode: String,
}

/// State of a binary switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub is_on: bool,
}

/// Reading of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub state: StateValue,
    pub unit_of_measurement: String,
    pub class: SensorClass,
}

impl From<ColorTemp> for StateValue {
    fn from(value: ColorTemp) -> Self {
        StateValue::map()
            .with("value", value.value)
            .with("max", value.max)
            .with("min", value.min)
    }
}

impl From<Light> for StateValue {
    fn from(value: Light) -> Self {
        StateValue::map()
            .with("brightness", value.brightness)
            .with("hsl", value.hsl)
            .with("is_on", value.is_on)
            .with("color_temp", value.color_temp)
            .with("mode", value.mode)
    }
}

impl From<Switch> for StateValue {
    fn from(value: Switch) -> Self {
        StateValue::map().with("is_on", value.is_on)
    }
}

impl From<Sensor> for StateValue {
    fn from(value: Sensor) -> Self {
        StateValue::map()
            .with("state", value.state)
            .with("unit_of_measurement", value.unit_of_measurement)
            .with("class", value.class.as_str())
    }
}

/// Build an `hsl(h, s%, l%)` colour string.
#[must_use]
pub fn hsl(hue: i32, saturation: i32, lightness: i32) -> String {
    format!("hsl({hue}, {saturation}%, {lightness}%)")
}
