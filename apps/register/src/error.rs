//! # API Error Type
//!
//! Unified error type for register operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Register                           │
//! │                                                                         │
//! │  session.finish()                                                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Draft invalid? ─────── ValidationError ──────────────┐                │
//! │         │                                             │                │
//! │         ▼                                             ▼                │
//! │  Cart rule broken? ──── CoreError ─────────────────► ApiError ───► UI  │
//! │         │                                             ▲                │
//! │         ▼                                             │                │
//! │  Header write failed? ─ SettlementError::Persistence ─┤                │
//! │         │                                             │                │
//! │         ▼                                             │                │
//! │  Batch write failed? ── SettlementError::Partial ─────┘                │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Success ─────────────────────────────────────────────────────────► UI │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries a machine-readable `code` and a human-readable
//! `message`; the UI layer renders the message and branches on the code.

use despos_core::{CoreError, ValidationError};
use despos_db::{DbError, SettlementError};
use serde::Serialize;

use crate::config::ConfigError;

/// Error returned from register operations.
///
/// ## Serialization
/// ```json
/// {
///   "code": "OUT_OF_STOCK",
///   "message": "Sardines in Tomato Sauce is out of stock"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Referenced record does not exist
    NotFound,

    /// Input or draft failed validation; nothing was written
    ValidationError,

    /// Product has no price level to sell at
    NoPriceLevel,

    /// Product has no stock left
    OutOfStock,

    /// Line edit or status change refused by the cart engine
    CartError,

    /// Database operation failed; nothing after the failure was written
    DatabaseError,

    /// Header saved, some line or inventory writes failed
    PartialSettlement,

    /// Configuration could not be loaded
    ConfigError,

    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn cart(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::CartError, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::validation(format!(
                "{} '{}' already exists",
                field, value
            )),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConstraintViolation { message } => ApiError::validation(message),
            DbError::InvalidRow { entity, source } => {
                ApiError::validation(format!("Invalid {}: {}", entity, source))
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Storage(e) => {
                tracing::error!("Image storage failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Image storage failed")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts cart engine errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::NoPriceLevel { .. } => ApiError::new(ErrorCode::NoPriceLevel, err.to_string()),
            CoreError::AlreadyExpiredStock { .. } => {
                ApiError::new(ErrorCode::OutOfStock, err.to_string())
            }
            CoreError::LineNotFound(_)
            | CoreError::DuplicateLine(_)
            | CoreError::DraftNotEditable { .. }
            | CoreError::DetachedLine { .. }
            | CoreError::InvalidStatusTransition { .. } => ApiError::cart(err.to_string()),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Persistence(e) => e.into(),
            SettlementError::Partial(ref partial) => {
                for failure in &partial.failures {
                    tracing::error!(
                        kind = ?failure.kind,
                        target = %failure.target_id,
                        "Settlement write failed: {}",
                        failure.message
                    );
                }
                ApiError::new(ErrorCode::PartialSettlement, err.to_string())
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result alias for register operations.
pub type ApiResult<T> = Result<T, ApiError>;
