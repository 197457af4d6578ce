//! JSON REST handlers for devices.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;

use hearth_app::ports::{DeviceRepository, UnitOfWork};
use hearth_app::scope::Scope;
use hearth_app::session::ErrorBody;
use hearth_domain::device::Device;
use hearth_domain::error::HubError;
use hearth_domain::id::DeviceId;

use crate::error::ApiError;
use crate::state::AppState;

/// Success body: `{"data": ...}`.
#[derive(Serialize)]
pub struct Data<T> {
    pub data: T,
}

/// Not-found body: `{"data": null, "error": {...}}`.
#[derive(Serialize)]
pub struct Missing {
    pub data: Option<()>,
    pub error: ErrorBody,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Data<Vec<Device>>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<Data<Device>>),
    NotFound(Json<Missing>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::NotFound(json) => (StatusCode::NOT_FOUND, json).into_response(),
        }
    }
}

/// `GET /api/devices`
pub async fn list<R, U>(
    State(state): State<AppState<R, U>>,
    Extension(scope): Extension<Scope<U::Work>>,
) -> Result<ListResponse, ApiError>
where
    R: DeviceRepository<Work = U::Work> + 'static,
    U: UnitOfWork + 'static,
{
    let devices = state.device_service.list(&scope).await?;
    Ok(ListResponse::Ok(Json(Data { data: devices })))
}

/// `GET /api/devices/{id}`
pub async fn get<R, U>(
    State(state): State<AppState<R, U>>,
    Extension(scope): Extension<Scope<U::Work>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    R: DeviceRepository<Work = U::Work> + 'static,
    U: UnitOfWork + 'static,
{
    let device_id = DeviceId::from_str(&id)
        .map_err(|_| HubError::Invalid(format!("invalid device id ({id})")))?;
    match state.device_service.get(&scope, device_id).await {
        Ok(device) => Ok(GetResponse::Ok(Json(Data { data: device }))),
        Err(err @ HubError::NotFound(_)) => Ok(GetResponse::NotFound(Json(Missing {
            data: None,
            error: ErrorBody::from(&err),
        }))),
        Err(err) => Err(err.into()),
    }
}
