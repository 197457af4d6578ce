//! # hearth-app
//!
//! Application layer: the hub kernel and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `DeviceRepository`: device registry and entity state history
//!   - `UnitOfWork`: begin / commit / roll back one atomic storage scope
//!   - `BusTransport`: the broker the message bus rides on
//!   - `Broadcaster`: push frames to live sessions
//! - Provide the kernel:
//!   - `ActorRuntime` / `Module`: run long-lived actors as one group
//!   - `MessageBus`: wildcard topic routing with fan-out and middlewares
//!   - `SessionRouter`: exact-topic routing of duplex session frames
//!   - `Scope` + `with_unit_of_work`: one unit of work per request/message
//!   - `StateReconciler`: decide which entity states to append
//! - Provide the device registry use-cases (`DeviceService`) and the handler
//!   sets exposing them on the bus and to sessions
//!
//! ## Dependency rule
//! Depends on `hearth-domain` only (plus `tokio` for channels, timers and
//! tasks). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod bus;
pub mod event_bus;
pub mod handlers;
pub mod ports;
pub mod reconciler;
pub mod runtime;
pub mod scope;
pub mod services;
pub mod session;
