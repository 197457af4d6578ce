//! # hearth-domain
//!
//! Pure domain model for the hearth hub.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, the error taxonomy, timestamps
//! - Define **Devices** (physical things announced by adapters) and their
//!   **Entities** (one observable/controllable capability each)
//! - Define **Entity states** and the structured [`StateValue`](entity::StateValue)
//!   they carry, including the deep-merge rule used by reconciliation
//! - Define the bus **Event** envelope and the well-known topics
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod entity;
pub mod event;
