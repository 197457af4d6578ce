//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;

use axum::Router;
use axum::middleware;
use axum::routing::get;

use hearth_app::ports::{DeviceRepository, UnitOfWork};

use crate::state::AppState;

/// Build the `/api` sub-router.
///
/// Every route here runs inside its own unit of work.
pub fn routes<R, U>(state: &AppState<R, U>) -> Router<AppState<R, U>>
where
    R: DeviceRepository<Work = U::Work> + 'static,
    U: UnitOfWork + 'static,
{
    Router::new()
        .route("/devices", get(devices::list::<R, U>))
        .route("/devices/{id}", get(devices::get::<R, U>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::unit_of_work::unit_of_work::<R, U>,
        ))
}
