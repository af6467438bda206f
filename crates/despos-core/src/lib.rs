//! # despos-core: Pure Register Logic for DesPOS
//!
//! Everything the register decides without touching storage: pricing, the
//! sales draft and its operations, settlement planning, contact date
//! normalization and pagination windows.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DesPOS Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              despos-register (session, config, CLI)             │   │
//! │  │    toggle_product ──► tender ──► finish ──► discard             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ despos-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────────┐          │   │
//! │  │   │ pricing │ │  cart   │ │settlement│ │  contact   │          │   │
//! │  │   │ resolve │ │ draft   │ │  plan    │ │ normalize  │          │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └────────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         despos-db (SQLite gateway + settlement reconciler)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Persisted entities (Product, SalesHeader, Contact, ...)
//! - [`money`] - Integer money
//! - [`pricing`] - Unit price from price levels
//! - [`cart`] - SalesDraft and its by-value operations
//! - [`settlement`] - Inventory deltas for a settlement
//! - [`contact`] - Contact date normalization
//! - [`invoice`] - Invoice numbers
//! - [`pagination`] - Row windows for list queries
//! - [`validation`] - Field validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use despos_core::cart::{recompute, reset_draft, tender};
//! use despos_core::Money;
//!
//! let draft = recompute(reset_draft(), None);
//! let draft = tender(draft, Money::from_cents(1000));
//!
//! assert_eq!(draft.total_due, Money::zero());
//! assert_eq!(draft.change_due.cents(), 1000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod contact;
pub mod error;
pub mod invoice;
pub mod money;
pub mod pagination;
pub mod pricing;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{SalesDraft, SelectionDraft};
pub use contact::ContactDateStyle;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pagination::{Page, PageFormula, RowRange};
pub use settlement::{InventoryUpdate, SettlementPlan};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line.
///
/// Guards against typing 1000 instead of 10 at the register.
pub const MAX_ITEM_QUANTITY: i64 = 999;
