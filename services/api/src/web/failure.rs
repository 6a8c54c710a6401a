//! services/api/src/web/failure.rs
//!
//! The JSON error shape every handler converts to at the boundary:
//! `{"error": "<descriptive message>"}` with an appropriate status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use textpoll_core::ports::PortError;
use textpoll_core::validate::ValidationError;
use tracing::error;

#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ApiFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("internal error: {}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<PortError> for ApiFailure {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => Self::not_found(msg),
            PortError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            PortError::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, "Unauthorized"),
            PortError::Unexpected(msg) => Self::internal(msg),
        }
    }
}

/// Validation problems are user-correctable and map to 422, mirroring the
/// field-level messages the form shows.
impl From<ValidationError> for ApiFailure {
    fn from(err: ValidationError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
    }
}
