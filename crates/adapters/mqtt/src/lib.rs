//! # hearth-adapter-mqtt
//!
//! MQTT adapter: carries the hearth message bus over a broker.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker (via [rumqttc](https://docs.rs/rumqttc))
//! - Implement the `BusTransport` port: publish with at-least-once delivery,
//!   subscribe to `+`-wildcard topic patterns
//! - Drive the connection as an actor, renewing subscriptions after a
//!   reconnect
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hearth-app` and `hearth-domain`.

pub mod client;
pub mod config;
pub mod error;

pub use client::{MqttEventLoop, MqttTransport};
pub use config::MqttConfig;
pub use error::MqttError;
