//! Shared application state for axum handlers.

use std::sync::Arc;

use hearth_app::ports::{DeviceRepository, UnitOfWork};
use hearth_app::services::DeviceService;
use hearth_app::session::SessionRouter;

/// Application state shared across all axum handlers.
///
/// Generic over the repository and the unit of work source to avoid
/// dynamic dispatch. `Clone` is implemented manually so the underlying
/// types do not need to be `Clone`; only the `Arc` wrappers are cloned.
pub struct AppState<R, U: UnitOfWork> {
    /// Device registry service.
    pub device_service: Arc<DeviceService<R>>,
    /// Source of the per-request units of work.
    pub unit_of_work: Arc<U>,
    /// Router driving the `/ws` sessions.
    pub sessions: Arc<SessionRouter<U::Work>>,
}

impl<R, U: UnitOfWork> Clone for AppState<R, U> {
    fn clone(&self) -> Self {
        Self {
            device_service: Arc::clone(&self.device_service),
            unit_of_work: Arc::clone(&self.unit_of_work),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<R, U> AppState<R, U>
where
    R: DeviceRepository<Work = U::Work> + 'static,
    U: UnitOfWork + 'static,
{
    /// Create the state from pre-wrapped `Arc`s.
    ///
    /// The same service, unit of work source and session router are shared
    /// with the bus handlers, so they are built by the caller.
    pub fn new(
        device_service: Arc<DeviceService<R>>,
        unit_of_work: Arc<U>,
        sessions: Arc<SessionRouter<U::Work>>,
    ) -> Self {
        Self {
            device_service,
            unit_of_work,
            sessions,
        }
    }
}
