//! Error handling for the navigation admin backend
//!
//! `NavError` is the error type of the core (storage, import, extraction, snapshot).
//! The HTTP layer converts it into [`crate::api_errors::AppError`].

use crate::archive_validator::ArchiveRejection;
use crate::manifest::ManifestError;
use thiserror::Error;

/// Main error type for the navigation admin core
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database operation failed: {operation} - {source}")]
    Database {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Import failed at {record}: {source}")]
    Import {
        record: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Archive rejected: {0}")]
    ArchiveRejected(#[from] ArchiveRejection),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Archive operation failed: {operation}")]
    Archive {
        operation: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {resource} - {id}")]
    NotFound { resource: String, id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result alias used throughout the crate
pub type NavResult<T> = Result<T, NavError>;

impl NavError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Create an import error naming the manifest record that failed
    pub fn import(record: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Import {
            record: record.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create an archive error
    pub fn archive(operation: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            operation: operation.into(),
            source,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for NavError {
    fn from(err: rusqlite::Error) -> Self {
        NavError::database("sqlite_operation", err)
    }
}

impl From<r2d2::Error> for NavError {
    fn from(err: r2d2::Error) -> Self {
        NavError::database("connection_pool", err)
    }
}

impl From<serde_json::Error> for NavError {
    fn from(err: serde_json::Error) -> Self {
        NavError::serialization("json_operation", err)
    }
}

impl From<std::io::Error> for NavError {
    fn from(err: std::io::Error) -> Self {
        NavError::io("io_operation", err)
    }
}

impl From<zip::result::ZipError> for NavError {
    fn from(err: zip::result::ZipError) -> Self {
        NavError::archive("zip_operation", err)
    }
}

impl From<tokio::task::JoinError> for NavError {
    fn from(err: tokio::task::JoinError) -> Self {
        NavError::internal(format!("blocking task failed: {err}"))
    }
}
