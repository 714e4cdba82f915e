use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bookrec_core::{ItemId, RecError};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

/// Server-specific error types.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Book not found: {0}")]
    BookNotFound(ItemId),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog storage error at {path:?}: {reason}")]
    CatalogStorage { path: PathBuf, reason: String },

    #[error("Core recommender error: {0}")]
    CoreError(#[from] RecError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ServerError::BookNotFound(id) => (StatusCode::NOT_FOUND, format!("Book {} not found", id)),
            ServerError::BadRequest(reason) => (StatusCode::BAD_REQUEST, format!("Bad request: {}", reason)),
            ServerError::Config(msg) => {
                error!(error = %msg, "Configuration error surfaced to a request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error (configuration)".to_string())
            }
            ServerError::CatalogStorage { path, reason } => {
                error!(path = ?path, error = %reason, "Catalog storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error (catalog storage)".to_string())
            }
            ServerError::CoreError(core_err) => match core_err {
                RecError::Configuration(msg) => (StatusCode::BAD_REQUEST, format!("Configuration error: {}", msg)),
                RecError::InvalidCorpus(msg) => {
                    error!(error = %msg, "Corpus could not be read for a rebuild");
                    (StatusCode::SERVICE_UNAVAILABLE, format!("Catalog unavailable: {}", msg))
                }
                RecError::CorruptModel { path, reason } => {
                    error!(path = ?path, error = %reason, "Persisted model is corrupt");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Persisted model is corrupt; request a forced rebuild".to_string(),
                    )
                }
                RecError::IoError { path, source } => {
                    error!(path = ?path, error = %source, "Core I/O error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error (I/O)".to_string())
                }
                RecError::Serialization(msg) => {
                    error!(error = %msg, "Core serialization error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error (Serialization)".to_string())
                }
                RecError::DimensionMismatch { expected, actual } => {
                    error!(expected, actual, "Core dimension mismatch");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
                RecError::Internal(msg) => {
                    error!(error = %msg, "Core internal error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
            ServerError::Internal(msg) => {
                error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        error!("Responding with status {}: {}", status, error_message);

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Define a Result type alias for handler functions
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServerError::BookNotFound(3).into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ServerError::BadRequest("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::from(RecError::InvalidCorpus("down".into())).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::from(RecError::CorruptModel { path: "m".into(), reason: "crc".into() })
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
