//! Server-wide error type
//!
//! Feature slices define their own error enums per command or query; this
//! type covers the cross-cutting failures (missing tenant context, health
//! checks) and the plain-text response shape every route shares.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::DbError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Plain-text error response
pub fn text_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "Database error");
                "a database error occurred".to_string()
            },
            AppError::Internal(ref message) => {
                tracing::error!(error = %message, "Internal error");
                "internal server error".to_string()
            },
            other => other.to_string(),
        };

        text_response(status, message)
    }
}
