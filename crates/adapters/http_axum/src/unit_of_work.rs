//! Per-request unit of work.
//!
//! Every request through [`unit_of_work`] gets a fresh [`Scope`] in its
//! extensions, and the rest of the stack runs inside
//! [`with_unit_of_work`]. A response with a client or server error status
//! rolls the unit back; any other response commits it.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use hearth_app::ports::{DeviceRepository, UnitOfWork};
use hearth_app::scope::{Scope, with_unit_of_work};
use hearth_domain::error::HubError;

use crate::error::ApiError;
use crate::state::AppState;

/// Why a unit of work did not commit.
enum Abort {
    /// The handler answered with an error status.
    Response(Response),
    /// Begin or commit failed.
    Hub(HubError),
}

impl From<HubError> for Abort {
    fn from(err: HubError) -> Self {
        Self::Hub(err)
    }
}

/// Axum middleware wrapping the request in a unit of work.
pub async fn unit_of_work<R, U>(
    State(state): State<AppState<R, U>>,
    mut request: Request,
    next: Next,
) -> Response
where
    R: DeviceRepository<Work = U::Work> + 'static,
    U: UnitOfWork + 'static,
{
    let scope = Scope::<U::Work>::new();
    request.extensions_mut().insert(scope.clone());

    let outcome = with_unit_of_work(&*state.unit_of_work, &scope, |_| async move {
        let response = next.run(request).await;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            Err(Abort::Response(response))
        } else {
            Ok(response)
        }
    })
    .await;

    match outcome {
        Ok(response) | Err(Abort::Response(response)) => response,
        Err(Abort::Hub(err)) => ApiError::from(err).into_response(),
    }
}
