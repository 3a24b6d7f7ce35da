//! Unified error handling for Busline
//!
//! This module provides a single error type that covers every failure the
//! reservation engine can report, with automatic HTTP response mapping.
//! Business-rule variants carry the remediation data the caller needs to act
//! (available seats, required amount, daily limit).

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    // ==================== Reservation Errors ====================
    /// Seat lock is held by another request; retry shortly
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Seat {seat_number} on trip {trip_id} is not available")]
    SeatUnavailable {
        trip_id: i32,
        seat_number: i32,
        available_seats: Vec<i32>,
    },

    #[error("Insufficient funds: required {required}, current balance {current_balance}")]
    InsufficientFunds {
        required: Decimal,
        current_balance: Decimal,
    },

    #[error("Daily reservation limit of {limit} reached")]
    LimitExceeded { limit: u32 },

    #[error("Wallet not found for user {0}")]
    WalletNotFound(i32),

    // ==================== Cancellation Errors ====================
    #[error("Booking {0} has already been cancelled")]
    AlreadyCancelled(i64),

    #[error("Trip for booking {0} has already departed")]
    DepartureAlreadyPassed(i64),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_)
            | AppError::SeatUnavailable { .. }
            | AppError::InsufficientFunds { .. }
            | AppError::AlreadyCancelled(_)
            | AppError::DepartureAlreadyPassed(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            AppError::Forbidden => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_) | AppError::AlreadyExists(_) => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Conflict(_) => "seat_locked",
            AppError::SeatUnavailable { .. } => "seat_unavailable",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::LimitExceeded { .. } => "daily_limit_exceeded",
            AppError::WalletNotFound(_) | AppError::InternalInvariantViolation(_) => {
                "internal_invariant_violation"
            }
            AppError::AlreadyCancelled(_) => "already_cancelled",
            AppError::DepartureAlreadyPassed(_) => "departure_already_passed",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Infrastructure failures worth retrying (database, pool, cache)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Pool(_)
                | AppError::Transaction(_)
                | AppError::Cache(_)
                | AppError::CacheConnection(_)
        )
    }

    /// Data corruption indicators; never shown verbatim to callers
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            AppError::WalletNotFound(_) | AppError::InternalInvariantViolation(_)
        )
    }

    /// Variant-specific remediation data merged into the response body
    fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            AppError::SeatUnavailable {
                available_seats, ..
            } => {
                details.insert("available_seats".into(), json!(available_seats));
            }
            AppError::InsufficientFunds {
                required,
                current_balance,
            } => {
                details.insert("required".into(), json!(required));
                details.insert("current_balance".into(), json!(current_balance));
            }
            AppError::LimitExceeded { limit } => {
                details.insert("limit".into(), json!(limit));
            }
            _ => {}
        }
        details
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if self.is_invariant_violation() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = Map::new();
        body.insert("error".into(), json!(self.error_code()));
        body.insert("message".into(), json!(message));
        body.insert("status".into(), json!(status.as_u16()));
        body.extend(self.details());

        HttpResponse::build(status).json(Value::Object(body))
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;
    use rust_decimal_macros::dec;

    fn body_json(err: &AppError) -> Value {
        let bytes = err
            .error_response()
            .into_body()
            .try_into_bytes()
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Conflict("seat".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::LimitExceeded { limit: 20 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::InsufficientFunds {
                required: dec!(600000),
                current_balance: dec!(100),
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("booking 1".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DepartureAlreadyPassed(1).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::WalletNotFound(7).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::AlreadyCancelled(3).error_code(), "already_cancelled");
        assert_eq!(
            AppError::LimitExceeded { limit: 20 }.error_code(),
            "daily_limit_exceeded"
        );
        assert_eq!(
            AppError::WalletNotFound(1).error_code(),
            "internal_invariant_violation"
        );
    }

    #[test]
    fn test_seat_unavailable_body_lists_seats() {
        let body = body_json(&AppError::SeatUnavailable {
            trip_id: 1,
            seat_number: 10,
            available_seats: vec![1, 2, 11],
        });

        assert_eq!(body["error"], "seat_unavailable");
        assert_eq!(body["status"], 400);
        assert_eq!(body["available_seats"], json!([1, 2, 11]));
    }

    #[test]
    fn test_insufficient_funds_body_has_amounts() {
        let body = body_json(&AppError::InsufficientFunds {
            required: dec!(600000),
            current_balance: dec!(250000),
        });

        assert_eq!(body["required"], json!(dec!(600000)));
        assert_eq!(body["current_balance"], json!(dec!(250000)));
    }

    #[test]
    fn test_invariant_violation_message_is_generic() {
        let body = body_json(&AppError::WalletNotFound(42));
        assert_eq!(body["message"], "Internal server error");
        assert!(!body["message"].as_str().unwrap().contains("42"));
    }

    #[test]
    fn test_refund_invariant_violation_is_sanitized() {
        let err = AppError::InternalInvariantViolation(
            "Wallet for user 9 missing while refunding booking 31".to_string(),
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_invariant_violation());

        let body = body_json(&err);
        assert_eq!(body["error"], "internal_invariant_violation");
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let err = AppError::AlreadyExists("plate ABC-123".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "already_exists");
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Database("down".to_string()).is_transient());
        assert!(AppError::CacheConnection("reset".to_string()).is_transient());
        assert!(!AppError::AlreadyCancelled(1).is_transient());
        assert!(!AppError::Conflict("held".to_string()).is_transient());
    }
}
