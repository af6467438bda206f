//! # Repository Module
//!
//! One repository per gateway entity.
//!
//! ## Uniform Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  list(filter?, page?)   ordered rows, windowed by the PageFormula       │
//! │  get_by_id(id)          Option<row>                                     │
//! │  upsert(row)            INSERT ... ON CONFLICT(id) DO UPDATE ... RETURNING│
//! │  delete(id)             NotFound when nothing was deleted               │
//! │  count(filter?)         i64                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes the settlement reconciler needs inside a transaction are also
//! exposed as free functions generic over [`sqlx::SqliteExecutor`], so the
//! same statement runs against the pool or `&mut *tx`.
//!
//! ## Available Repositories
//!
//! - [`location::LocationRepository`]
//! - [`contact::ContactRepository`] - dates normalized on read
//! - [`category::CategoryRepository`] - `item_types`
//! - [`invoice_type::InvoiceTypeRepository`]
//! - [`price_level::PriceLevelRepository`] - levels and item↔level joins
//! - [`product::ProductRepository`] - items with their price levels
//! - [`sale::SaleRepository`] - sales headers
//! - [`selection::SelectionRepository`] - sales line items

pub mod category;
pub mod contact;
pub mod invoice_type;
pub mod location;
pub mod price_level;
pub mod product;
pub mod sale;
pub mod selection;

use despos_core::{Page, PageFormula};

/// `(limit, offset)` for a list query.
///
/// No page means every row (`LIMIT -1` in SQLite).
pub(crate) fn limit_offset(formula: PageFormula, page: Option<Page>) -> (i64, i64) {
    match page {
        None => (-1, 0),
        Some(page) => {
            let range = formula.window(page);
            (range.limit(), range.offset())
        }
    }
}
