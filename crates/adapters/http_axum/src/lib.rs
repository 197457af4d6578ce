//! # hearth-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a small JSON API over the device registry
//!   (`/api/devices`, `/api/devices/{id}`), each request inside its own
//!   unit of work
//! - Serve live duplex sessions on `/ws`, routed by the application's
//!   [`SessionRouter`](hearth_app::session::SessionRouter)
//! - Map [`HubError`](hearth_domain::error::HubError) into status codes and
//!   sanitized JSON error bodies
//!
//! ## Dependency rule
//! Depends on `hearth-app` (for port traits, services and the session
//! router) and `hearth-domain` (for domain types used in response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod unit_of_work;
pub mod ws;

#[cfg(test)]
mod testing;
