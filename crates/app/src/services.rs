//! Application services: use-case implementations.
//!
//! Services take their repository as a generic parameter and run every
//! query inside the unit of work found in the caller's [`Scope`](crate::scope::Scope).

pub mod device_service;

#[cfg(test)]
pub(crate) mod testing;

pub use device_service::{DeviceService, Discovery};
