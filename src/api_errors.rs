use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::errors::NavError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::PayloadTooLarge(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.status();
        (code, Json(ErrBody { error: self.to_string() })).into_response()
    }
}

// Storage failures are logged in full and reported generically.
impl From<NavError> for AppError {
    fn from(err: NavError) -> Self {
        match err {
            NavError::Config { message } => AppError::BadRequest(message),
            NavError::Validation { field, message } => {
                AppError::BadRequest(format!("Validation error for {field}: {message}"))
            }
            NavError::Serialization { context, source } => {
                AppError::BadRequest(format!("Malformed {context}: {source}"))
            }
            NavError::ArchiveRejected(rejection) => AppError::BadRequest(rejection.to_string()),
            NavError::Manifest(problem) => AppError::BadRequest(problem.to_string()),
            NavError::NotFound { resource, id } => {
                AppError::NotFound(format!("{resource} '{id}' not found"))
            }
            NavError::Import { record, source } => {
                tracing::error!("Import rolled back at {}: {}", record, source);
                AppError::Internal(format!(
                    "Import failed at {record}; existing data was kept"
                ))
            }
            NavError::Database { operation, source } => {
                tracing::error!("Database {} failed: {}", operation, source);
                AppError::Internal("database operation failed".to_string())
            }
            NavError::Archive { operation, source } => {
                tracing::error!("Archive {} failed: {}", operation, source);
                AppError::Internal("archive operation failed".to_string())
            }
            NavError::Io { operation, source } => {
                tracing::error!("I/O {} failed: {}", operation, source);
                AppError::Internal("file operation failed".to_string())
            }
            NavError::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                AppError::Internal("internal error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_are_reported_generically() {
        let err = NavError::database(
            "insert site",
            rusqlite::Error::InvalidQuery,
        );
        let app: AppError = err.into();
        assert_eq!(app.to_string(), "database operation failed");
    }

    #[test]
    fn import_errors_name_the_record() {
        let err = NavError::import("site 'B' in category 'c1'", rusqlite::Error::InvalidQuery);
        let app: AppError = err.into();
        assert!(app.to_string().contains("site 'B' in category 'c1'"));
    }

    #[test]
    fn core_errors_map_to_one_status_each() {
        use crate::archive_validator::ArchiveRejection;
        use crate::manifest::ManifestError;

        let cases: Vec<(NavError, StatusCode)> = vec![
            (NavError::validation("classify", "must not be empty"), StatusCode::BAD_REQUEST),
            (NavError::from(ArchiveRejection::MissingManifest), StatusCode::BAD_REQUEST),
            (NavError::from(ManifestError::Empty), StatusCode::BAD_REQUEST),
            (NavError::not_found("site", 42), StatusCode::NOT_FOUND),
            (
                NavError::io("reading snapshot", std::io::Error::other("gone")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let label = err.to_string();
            assert_eq!(AppError::from(err).status(), expected, "{label}");
        }
    }
}
