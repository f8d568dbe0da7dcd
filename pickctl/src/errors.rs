//! Error types and HTTP response conversion.
//!
//! Every fallible coordinator operation returns [`Result<T>`]. The [`Error`]
//! enum is a closed taxonomy of failure kinds, each carrying a stable
//! machine-readable code that the transport surfaces unchanged:
//!
//! - **Authentication**: `INVALID_CREDENTIALS`, `TOKEN_EXPIRED`,
//!   `TOKEN_INVALID`, `ACCOUNT_DISABLED` (401/403)
//! - **Authorization**: `FORBIDDEN` (403)
//! - **Not found**: `USER_NOT_FOUND`, `REQUEST_NOT_FOUND`, `ITEM_NOT_FOUND`,
//!   `PRODUCT_NOT_FOUND` (404)
//! - **Conflicts**: `USERNAME_EXISTS`, `REQUEST_NAME_EXISTS` (409)
//! - **Workflow**: `REQUEST_LOCKED` (423), `INVALID_STATUS`,
//!   `QUANTITY_EXCEEDED`, `INVALID_REQUEST_NAME` (400)
//! - **Validation**: `VALIDATION_ERROR` (422)
//! - **System**: `CATALOG_NOT_LOADED`, `INTERNAL_ERROR` (500)
//!
//! # Wire format
//!
//! All errors convert to JSON responses of the form:
//!
//! ```json
//! {
//!   "success": false,
//!   "error": {
//!     "code": "REQUEST_LOCKED",
//!     "message": "Request is locked by another picker",
//!     "details": { "locked_by": "bob" }
//!   }
//! }
//! ```

use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Login failed: unknown username or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Presented token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Presented token is malformed or has a bad signature
    #[error("Token is invalid")]
    TokenInvalid,

    /// The authenticated account has been deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// User lacks the capability for the operation
    #[error("{message}")]
    Forbidden { message: String },

    /// No user with the given identifier
    #[error("User '{id}' not found")]
    UserNotFound { id: String },

    /// Username already taken (case-insensitive)
    #[error("Username '{username}' already exists")]
    UsernameExists { username: String },

    /// No pick request with the given name
    #[error("Pick request '{name}' not found")]
    RequestNotFound { name: String },

    /// Pick request name already taken
    #[error("Request name '{name}' already exists")]
    RequestNameExists { name: String },

    /// Another principal holds the claim on the request
    #[error("Request is locked by {locked_by}")]
    RequestLocked { locked_by: String },

    /// Operation not permitted from the request's current status
    #[error("Invalid status: request is {current}, expected {expected}")]
    InvalidStatus { current: String, expected: String },

    /// Quantity update would exceed the requested quantity
    #[error("Quantity exceeds requested amount ({remaining} remaining)")]
    QuantityExceeded { remaining: i64 },

    /// Proposed request name fails the syntactic rules
    #[error("Invalid request name: {reason}")]
    InvalidRequestName { reason: String },

    /// No item with the given UPC in the request
    #[error("Item with UPC '{upc}' not found in request")]
    ItemNotFound { upc: String },

    /// No product matches the scanned code
    #[error("No product found for code '{code}'")]
    ProductNotFound { code: String },

    /// Input violates a business rule (missing shortage reason, bad payload)
    #[error("{message}")]
    Validation { message: String },

    /// Product catalog is not available
    #[error("Product catalog is not loaded")]
    CatalogNotLoaded,

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Stable machine-readable error code surfaced to the transport.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "INVALID_CREDENTIALS",
            Error::TokenExpired => "TOKEN_EXPIRED",
            Error::TokenInvalid => "TOKEN_INVALID",
            Error::AccountDisabled => "ACCOUNT_DISABLED",
            Error::Forbidden { .. } => "FORBIDDEN",
            Error::UserNotFound { .. } => "USER_NOT_FOUND",
            Error::UsernameExists { .. } => "USERNAME_EXISTS",
            Error::RequestNotFound { .. } => "REQUEST_NOT_FOUND",
            Error::RequestNameExists { .. } => "REQUEST_NAME_EXISTS",
            Error::RequestLocked { .. } => "REQUEST_LOCKED",
            Error::InvalidStatus { .. } => "INVALID_STATUS",
            Error::QuantityExceeded { .. } => "QUANTITY_EXCEEDED",
            Error::InvalidRequestName { .. } => "INVALID_REQUEST_NAME",
            Error::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            Error::ProductNotFound { .. } => "PRODUCT_NOT_FOUND",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::CatalogNotLoaded => "CATALOG_NOT_LOADED",
            Error::Internal { .. } | Error::Other(_) => "INTERNAL_ERROR",
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "NOT_FOUND",
                DbError::UniqueViolation { .. } => "CONFLICT",
                DbError::ForeignKeyViolation { .. } => "VALIDATION_ERROR",
                DbError::Other(_) => "INTERNAL_ERROR",
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::TokenExpired | Error::TokenInvalid => StatusCode::UNAUTHORIZED,
            Error::AccountDisabled | Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::UserNotFound { .. }
            | Error::RequestNotFound { .. }
            | Error::ItemNotFound { .. }
            | Error::ProductNotFound { .. } => StatusCode::NOT_FOUND,
            Error::UsernameExists { .. } | Error::RequestNameExists { .. } => StatusCode::CONFLICT,
            Error::RequestLocked { .. } => StatusCode::LOCKED,
            Error::InvalidStatus { .. } | Error::QuantityExceeded { .. } | Error::InvalidRequestName { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::CatalogNotLoaded | Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Structured context attached to the error payload, when the code carries one.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::RequestLocked { locked_by } => Some(json!({ "locked_by": locked_by })),
            Error::InvalidStatus { current, expected } => {
                Some(json!({ "current": current, "expected": expected }))
            }
            Error::QuantityExceeded { remaining } => Some(json!({ "remaining": remaining })),
            Error::InvalidRequestName { reason } => Some(json!({ "reason": reason })),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::InvalidCredentials
            | Error::TokenExpired
            | Error::TokenInvalid
            | Error::AccountDisabled
            | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::RequestLocked { .. } => {
                tracing::info!("Claim contention: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let mut error_body = json!({
            "code": self.code(),
            "message": self.user_message(),
        });
        if let Some(details) = self.details() {
            error_body["details"] = details;
        }

        let body = json!({ "success": false, "error": error_body });
        (status, axum::response::Json(body)).into_response()
    }
}

/// Convert raw sqlx errors through the database taxonomy
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(DbError::from(err))
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
