// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

use super::validation::ValidationResult;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    UserExists(String),
    ProviderMismatch(String),
    UserNotFound(String),
    OtpNotFound(String),
    OtpExpired(String),
    OtpMaxAttempts(String),
    InvalidOtp(String),
    AccountInactive(String),
    BadGateway(String),
    EmailError(String),
    NotConfigured(String),
    InternalServer(String),
    DatabaseError(sqlx::Error),
    ValidationError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::UserExists(msg) => write!(f, "User Exists: {}", msg),
            ApiError::ProviderMismatch(msg) => write!(f, "Provider Mismatch: {}", msg),
            ApiError::UserNotFound(msg) => write!(f, "User Not Found: {}", msg),
            ApiError::OtpNotFound(msg) => write!(f, "OTP Not Found: {}", msg),
            ApiError::OtpExpired(msg) => write!(f, "OTP Expired: {}", msg),
            ApiError::OtpMaxAttempts(msg) => write!(f, "OTP Max Attempts: {}", msg),
            ApiError::InvalidOtp(msg) => write!(f, "Invalid OTP: {}", msg),
            ApiError::AccountInactive(msg) => write!(f, "Account Inactive: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad Gateway: {}", msg),
            ApiError::EmailError(msg) => write!(f, "Email Error: {}", msg),
            ApiError::NotConfigured(msg) => write!(f, "Not Configured: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::UserExists(msg) => (StatusCode::CONFLICT, "USER_EXISTS", msg),
            ApiError::ProviderMismatch(msg) => (StatusCode::CONFLICT, "PROVIDER_MISMATCH", msg),
            ApiError::UserNotFound(msg) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", msg),
            ApiError::OtpNotFound(msg) => (StatusCode::NOT_FOUND, "OTP_NOT_FOUND", msg),
            ApiError::OtpExpired(msg) => (StatusCode::BAD_REQUEST, "OTP_EXPIRED", msg),
            ApiError::OtpMaxAttempts(msg) => (StatusCode::BAD_REQUEST, "OTP_MAX_ATTEMPTS", msg),
            ApiError::InvalidOtp(msg) => (StatusCode::BAD_REQUEST, "INVALID_OTP", msg),
            ApiError::AccountInactive(msg) => (StatusCode::BAD_REQUEST, "ACCOUNT_INACTIVE", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg),
            ApiError::EmailError(msg) => {
                error!(error = %msg, "Email dispatch failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "EMAIL_ERROR", msg)
            }
            ApiError::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED", msg),
            ApiError::InternalServer(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                msg,
            ),
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database operation failed".to_string(),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
        };

        let error_response = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(error_response)).into_response()
    }
}

/// Helper function to convert ValidationResult to ApiError
impl From<ValidationResult> for ApiError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            ApiError::InternalServer(
                "Validation result was valid but converted to error".to_string(),
            )
        } else {
            let error_messages: Vec<String> = result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            ApiError::ValidationError(error_messages.join(", "))
        }
    }
}
