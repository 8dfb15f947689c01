use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::forms::FieldErrors;

pub const INVALID_SIGNUP_MESSAGE: &str = "Invalid sign up - try again";
pub const INVALID_LOGIN_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// AppError
///
/// Every failure a handler can report. Repository methods return it as well, so handlers
/// simply propagate with `?`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Form validation failed")]
    Validation(FieldErrors),

    #[error("{}", INVALID_SIGNUP_MESSAGE)]
    InvalidSignup(FieldErrors),

    #[error("{}", INVALID_LOGIN_MESSAGE)]
    InvalidCredentials,

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidSignup(_) | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "PERMISSION_DENIED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidSignup(_) => "INVALID_SIGNUP",
            AppError::InvalidCredentials => "INVALID_LOGIN",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => tracing::error!(error = ?e, "database error"),
            AppError::Internal(msg) => tracing::error!(message = %msg, "internal error"),
            // Client errors are routine; keep them out of the error stream.
            other => tracing::debug!(code = other.code(), error = %other, "request rejected"),
        }
    }
}

// Malformed or mistyped bodies are form errors, not framework plain-text responses.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(FieldErrors::non_field(rejection.body_text()))
    }
}

/// ErrorBody
///
/// `error` member of an error response.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<FieldErrors>,
}

/// ErrorResponse
///
/// JSON envelope returned for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log();

        // Internal details stay in the logs.
        let message = match &self {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let code = self.code().to_string();
        let details = match self {
            AppError::Validation(errors) | AppError::InvalidSignup(errors) => Some(errors),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
