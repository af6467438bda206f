//! # Validation Module
//!
//! Field-level input validation for the register.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: UI layer              immediate feedback on forms             │
//! │  Layer 2: THIS MODULE           quantities, prices, names               │
//! │           cart::validate_draft  whole-draft submission check            │
//! │  Layer 3: SQLite                NOT NULL / UNIQUE / FK / CHECK          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use despos_core::validation::{validate_quantity, validate_item_name};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_item_name("Rice 5kg").is_ok());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    validate_required_text("item_name", name, 200)
}

/// Validates a price level name ("Level 1", "Wholesale").
pub fn validate_level_name(name: &str) -> ValidationResult<()> {
    validate_required_text("level_name", name, 50)
}

/// Validates a contact's first or last name.
pub fn validate_person_name(field: &str, name: &str) -> ValidationResult<()> {
    validate_required_text(field, name, 100)
}

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a line quantity.
///
/// ## Rules
/// - At least 1
/// - At most MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (free items).
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock count. Stock may not be set below zero by hand.
pub fn validate_stock(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "item_quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_item_name() {
        assert!(validate_item_name("Rice 5kg").is_ok());
        assert!(validate_item_name("").is_err());
        assert!(validate_item_name("   ").is_err());
        assert!(validate_item_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price("price", Money::zero()).is_ok());
        assert!(validate_price("price", Money::from_cents(1099)).is_ok());
        assert!(validate_price("price", Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_stock() {
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-3).is_err());
    }

    #[test]
    fn test_validate_person_name_reports_field() {
        let err = validate_person_name("last_name", "").unwrap_err();
        assert_eq!(err.to_string(), "last_name is required");
    }
}
