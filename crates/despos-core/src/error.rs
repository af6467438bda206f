//! # Error Types
//!
//! Domain-specific error types for despos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  despos-core errors (this file)                                        │
//! │  ├── CoreError        - Cart / pricing rule violations                 │
//! │  └── ValidationError  - Input and draft validity failures              │
//! │                                                                         │
//! │  despos-db errors                                                      │
//! │  ├── DbError          - Gateway read/write failures                    │
//! │  └── SettlementError  - Header failure or partial batch failure        │
//! │                                                                         │
//! │  despos-register                                                       │
//! │  └── ApiError         - What the UI layer sees (serialized)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;
use crate::types::SalesStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the cart engine and pricing resolver.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The product carries no price level, so no unit price can be resolved.
    ///
    /// ## When This Occurs
    /// - A product was created without any `items_price_levels` rows
    /// - Its price levels were deleted after it was listed
    #[error("Product {product_id} has no price level")]
    NoPriceLevel { product_id: String },

    /// The product has no stock left (`item_quantity <= 0`).
    #[error("{item_name} is out of stock")]
    AlreadyExpiredStock {
        product_id: String,
        item_name: String,
    },

    /// Removing or editing a line that is not on the draft.
    #[error("Product {0} is not on the order")]
    LineNotFound(String),

    /// Adding a product that already has a line on the draft.
    #[error("Product {0} is already on the order")]
    DuplicateLine(String),

    /// Line edits on a sale that is no longer in-progress or pending.
    #[error("Sale is {status}, lines can no longer be changed")]
    DraftNotEditable { status: SalesStatus },

    /// A line carries a stored row id but the draft has no sale id, so the
    /// row it refers to cannot be located.
    #[error("Line {selection_id} is stored but its sale has no id")]
    DetachedLine { selection_id: String },

    #[error("Sale cannot move from {from} to {to}")]
    InvalidStatusTransition { from: SalesStatus, to: SalesStatus },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Also returned by [`crate::cart::validate_draft`] to explain why a draft
/// cannot be submitted yet.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Cash tendered does not cover the total.
    #[error("Amount paid {paid} does not cover total due {due}")]
    InsufficientPayment { due: Money, paid: Money },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
