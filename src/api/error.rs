//! Error responses of the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::LokalisointiError;

/// Library error rendered as a JSON error response
#[derive(Debug)]
pub struct ApiError(pub LokalisointiError);

impl From<LokalisointiError> for ApiError {
    fn from(e: LokalisointiError) -> Self {
        Self(e)
    }
}

fn error_type(e: &LokalisointiError) -> &'static str {
    match e {
        LokalisointiError::Validation(_) => "validation_error",
        LokalisointiError::NotFound(_) => "not_found",
        LokalisointiError::Parse(_) => "parse_error",
        LokalisointiError::RemoteSync(_) => "remote_sync_error",
        LokalisointiError::ObjectStore(_) => "object_store_error",
        _ => "internal_error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        (
            status,
            Json(json!({
                "error": {
                    "type": error_type(&self.0),
                    "message": self.0.to_string()
                }
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
