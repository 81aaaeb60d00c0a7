use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qg_errors::{ConfigError, ErrorClass, ValidationError};
use qg_pipeline::PipelineError;
use tracing::error;

/// Unifies every error an HTTP handler can fail with and maps it to a
/// response using each error kind's own `ErrorClass`/`Serialize`
/// implementation (§6) — never a generic 500 wrapper.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Pipeline(e) => e.http_status(),
            ApiError::Validation(e) => e.http_status(),
            ApiError::Config(e) => e.http_status(),
        };
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = match self {
            ApiError::Pipeline(e) => serde_json::to_value(e),
            ApiError::Validation(e) => serde_json::to_value(e),
            ApiError::Config(e) => serde_json::to_value(e),
        }
        .unwrap_or_else(|_| serde_json::json!({ "code": "SERIALIZATION_FAILED" }));

        (status, Json(body)).into_response()
    }
}
