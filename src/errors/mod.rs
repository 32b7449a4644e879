//! Error handling module for the homestay backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const UPLOAD_ERROR: &str = "UPLOAD_ERROR";
    pub const LEDGER_ERROR: &str = "LEDGER_ERROR";
}

/// Not-found messages shared by the stores and services.
pub mod not_found {
    pub const DUES_CHARGE: &str = "dues charge not found";
    pub const MEMBER_OBLIGATION: &str = "member obligation not found";
    pub const PERIOD: &str = "period not found";
    pub const DOCUMENT: &str = "document not found";
    pub const MEMBER: &str = "member not found";
    pub const POSITION: &str = "position not found";
}

/// Rule violations that are reported to the caller verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictKind {
    #[error("month cannot be earlier than the current month")]
    DateInPast,
    #[error("this month already has a charge")]
    MonthAlreadyCharged,
    #[error("charge already has payment activity and can no longer be changed")]
    ChargeAlreadyProcessed,
    #[error("end date cannot be earlier than start date")]
    EndBeforeStart,
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required
    #[error("{0}")]
    Unauthorized(String),
    /// Resource not found, or not in a state the operation accepts
    #[error("{0}")]
    NotFound(String),
    /// Missing or malformed input field
    #[error("{0}")]
    Validation(String),
    /// Domain rule violation
    #[error(transparent)]
    Conflict(#[from] ConflictKind),
    /// Bad request
    #[error("{0}")]
    BadRequest(String),
    /// Database error
    #[error("database error: {0}")]
    Database(String),
    /// Upload collaborator error
    #[error("upload error: {0}")]
    Upload(String),
    /// Ledger collaborator error
    #[error("ledger error: {0}")]
    Ledger(String),
}

impl AppError {
    pub fn not_found(message: &str) -> Self {
        AppError::NotFound(message.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Upload(_) | AppError::Ledger(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Upload(_) => codes::UPLOAD_ERROR,
            AppError::Ledger(_) => codes::LEDGER_ERROR,
        }
    }

    /// Message safe to show to the caller. Dependency failures never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Upload(_) | AppError::Ledger(_) => {
                "something went wrong, please try again later".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_dependency(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Attach a short description of the attempted store operation to a database error.
pub trait ResultExt<T> {
    fn context(self, operation: &'static str) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, operation: &'static str) -> Result<T, AppError> {
        self.map_err(|err| AppError::Database(format!("{}: {}", operation, err)))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.public_message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_dependency() {
            tracing::error!("request failed: {}", self);
        }
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_are_client_errors_with_domain_message() {
        let err = AppError::from(ConflictKind::MonthAlreadyCharged);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), codes::CONFLICT);
        assert_eq!(err.public_message(), "this month already has a charge");
    }

    #[test]
    fn test_dependency_errors_hide_detail() {
        let err = AppError::Database("insert dues charge: disk I/O error".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("disk"));
        assert!(err.to_string().contains("insert dues charge"));
    }

    #[test]
    fn test_context_wraps_sqlx_error() {
        let result: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        let err = result.context("find period").unwrap_err();
        match err {
            AppError::Database(msg) => assert!(msg.starts_with("find period: ")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
