//! Error types for the HTTP front-end.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use ctlrun_core::{CommandError, EngineError};

/// Errors returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A primitive refused its arguments; holds the usage text it printed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A primitive raised an error.
    #[error("{0}")]
    Command(#[from] CommandError),

    /// A control-file run could not complete.
    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Command(e) => {
                tracing::warn!(error = %e, "Command failed");
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AppError::Engine(e) => {
                tracing::error!(error = %e, "Control file run failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result alias for HTTP handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = AppError::NotFound("action 'x'".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(CommandError::IllegalArgument("bad".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = AppError::BadRequest("Usage: sleep <millis>".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_command_error_display_passes_through() {
        let err = AppError::from(CommandError::NotFound("stream1".to_string()));
        assert_eq!(err.to_string(), "Not found: stream1");
    }
}
