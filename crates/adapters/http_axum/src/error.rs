//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use hearth_app::session::ErrorBody;
use hearth_domain::error::{ErrorCode, HubError};

/// JSON error body returned by API endpoints: `{"error": {code, message}}`.
#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Maps [`HubError`] to an HTTP response with appropriate status code.
///
/// Internal failures are logged with their full chain and answered with a
/// generic message.
#[derive(Debug)]
pub struct ApiError(HubError);

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is(ErrorCode::Internal) {
            tracing::error!(error = ?self.0, "request failed");
        }
        let status = self.status();
        let body = ErrorEnvelope {
            error: ErrorBody::from(&self.0),
        };
        (status, Json(body)).into_response()
    }
}

pub(crate) fn status_for(err: &HubError) -> StatusCode {
    match err.code() {
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Invalid => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn should_map_each_error_code_to_a_status() {
        assert_eq!(status_for(&HubError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&HubError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&HubError::Invalid("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&HubError::internal("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn should_keep_message_when_error_is_conflict() {
        let response = ApiError::from(HubError::Conflict("device with identifier (shelly-1) already exist".into()))
            .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "error": {"code": "conflict", "message": "device with identifier (shelly-1) already exist"}
            })
        );
    }

    #[tokio::test]
    async fn should_hide_details_when_error_is_internal() {
        let err = HubError::internal_from("storage failure", std::io::Error::other("disk /dev/sda1 on fire"));
        let response = ApiError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "internal");
        assert!(!body.to_string().contains("sda1"));
    }
}
