//! API error type and helpers.
//!
//! Every handler failure becomes a status code plus an `{"error": "..."}` body.
//! Validation failures from the hub map to 400; anything else is a 500 whose
//! detail stays in the server log.
use crate::api::types::ErrorResponse;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use zrelay_hub::HubError;

/// Structured API error returned by handlers.
///
/// ```rust
/// use axum::http::StatusCode;
/// use relay::api::error::api_bad_request;
///
/// let err = api_bad_request("'id' must be a valid UUID");
/// assert_eq!(err.status, StatusCode::BAD_REQUEST);
/// assert_eq!(err.body.error, "'id' must be a valid UUID");
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn api_bad_request(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorResponse {
            error: message.to_string(),
        },
    }
}

pub fn api_internal(message: &str, err: &impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "{message}");
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error: message.to_string(),
        },
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        if err.is_validation() {
            api_bad_request(&err.to_string())
        } else {
            api_internal("hub rejected the request", &err)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        api_bad_request(&rejection.body_text())
    }
}
