//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use hearth_app::ports::{DeviceRepository, UnitOfWork};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the API routes under `/api` and serves live sessions on `/ws`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<R, U>(state: AppState<R, U>) -> Router
where
    R: DeviceRepository<Work = U::Work> + 'static,
    U: UnitOfWork + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(crate::ws::upgrade::<R, U>))
        .nest("/api", crate::api::routes(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
