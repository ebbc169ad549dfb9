//! Error types for the student payment service
//!
//! This module provides the error type hierarchy using `thiserror`, one enum
//! per external collaborator, plus the [`ApiError`] boundary type that maps
//! error kinds onto HTTP responses. Raw internal error text is never
//! surfaced to clients; 500 responses carry fixed messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Persistence layer errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// A user with the given email already exists
    #[error("email already registered")]
    DuplicateEmail,

    /// No user with the given id
    #[error("user {0} not found")]
    UserNotFound(i32),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Payment gateway (Stripe) errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway rejected the request
    #[error("gateway rejected request ({status}): {message}")]
    Api {
        /// HTTP status returned by the gateway
        status: u16,
        /// Error message extracted from the gateway response
        message: String,
    },

    /// Transport-level failure reaching the gateway
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The amount does not fit the gateway's minor-unit integer representation
    #[error("amount out of range for minor-unit conversion")]
    AmountOutOfRange,
}

/// Email delivery (SendGrid) errors
#[derive(Error, Debug)]
pub enum EmailError {
    /// The email API did not accept the message
    #[error("email API returned status {status}")]
    Api {
        /// HTTP status returned by the email API
        status: u16,
    },

    /// Transport-level failure reaching the email API
    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Error kinds surfaced at the HTTP boundary.
///
/// Each kind carries a fixed, client-safe message and maps to exactly one
/// status code. Handlers build these directly for validation failures and
/// convert collaborator errors via the `From` impls below.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Email failed syntax/deliverability checks
    #[error("Invalid email format")]
    InvalidEmail,

    /// Phone number is not a valid E.164 number
    #[error("Invalid phone number")]
    InvalidPhone,

    /// Name missing or empty
    #[error("Name is required")]
    InvalidName,

    /// Language not in the supported set
    #[error("Unsupported language")]
    UnsupportedLanguage,

    /// Amount is not strictly positive
    #[error("Invalid payment amount")]
    InvalidAmount,

    /// Currency is not a 3-letter code
    #[error("Invalid currency code")]
    InvalidCurrency,

    /// Email already registered
    #[error("Email already registered")]
    DuplicateEmail,

    /// Unknown user id
    #[error("User not found")]
    UserNotFound,

    /// The payment gateway rejected or failed the payment-intent call
    #[error("Payment processing failed")]
    PaymentFailed,

    /// Anything unexpected; detail stays in the logs
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// HTTP status code for this error kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidEmail
            | Self::InvalidPhone
            | Self::InvalidName
            | Self::UnsupportedLanguage
            | Self::InvalidAmount
            | Self::InvalidCurrency => StatusCode::BAD_REQUEST,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::PaymentFailed | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error envelope: `{"error": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Client-safe error message
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateEmail => Self::DuplicateEmail,
            StorageError::UserNotFound(_) => Self::UserNotFound,
            StorageError::Database(e) => {
                error!(error = %e, "database failure");
                Self::Internal
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        error!(error = %err, "payment gateway failure");
        Self::PaymentFailed
    }
}

/// Result type alias for HTTP handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
