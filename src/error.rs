//! # Error Handling
//!
//! Application-level error types and their HTTP mapping. Failures in this
//! service are scoped: nothing here is fatal to the process, and every
//! variant renders as the same JSON envelope so API clients only need one
//! error shape.
//!
//! ## HTTP Status Mapping:
//! - Internal/ConfigError -> 500
//! - BadRequest/ValidationError -> 400
//! - Unauthorized -> 401, Forbidden -> 403
//! - Upstream -> 502 (the hosted model failed or answered garbage)

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

use crate::analysis::extract::ExtractError;
use crate::scoring::ScoringError;

/// Error categories for the application.
#[derive(Debug)]
pub enum AppError {
    /// Server-side problems that are nobody's fault but ours
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Request lacks a required API key
    Unauthorized(String),

    /// Request carried an invalid or inactive API key
    Forbidden(String),

    /// The hosted scoring model failed, timed out, or returned an
    /// unparseable reply
    Upstream(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;

        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "missing_api_key", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "invalid_api_key", msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "model_error", msg),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Scoring failures surface to API clients as upstream errors; the detailed
/// variant is preserved in the message for logs.
impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

/// A reply we could not extract JSON from is still an upstream problem:
/// the model broke the output contract, not the client.
impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

/// Shorthand for handler results.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        use actix_web::http::StatusCode;

        let cases = [
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(err.error_response().status(), expected);
        }
    }

    #[test]
    fn test_display_includes_context() {
        let err = AppError::Upstream("scoring reply was empty".to_string());
        assert_eq!(err.to_string(), "Upstream error: scoring reply was empty");
    }
}
