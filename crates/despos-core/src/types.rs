//! # Domain Types
//!
//! Persisted entities of the register and the enums that discriminate them.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    Product      │   │   SalesHeader   │   │ PersistedSelection  │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  item_quantity  │   │  invoice_no     │   │  sales_id (FK)      │   │
//! │  │  item_sold      │   │  sales_status   │   │  item_id (FK)       │   │
//! │  │  price_levels ──┼─┐ │  total_due      │   │  deducted_quantity  │   │
//! │  └─────────────────┘ │ └─────────────────┘   └─────────────────────┘   │
//! │                      │                                                  │
//! │  ┌─────────────────┐ │ ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │ ItemPriceLevel  │◄┘ │    Contact      │   │ Location / Category │   │
//! │  │  price_level ───┼──►│  contact_type   │   │ InvoiceType         │   │
//! │  └─────────────────┘   │  date_open      │   └─────────────────────┘   │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The in-memory draft types (`SalesDraft`, `SelectionDraft`) live in
//! [`crate::cart`] because the cart engine owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Sales Status
// =============================================================================

/// Lifecycle status of a sale.
///
/// ## State Machine
/// ```text
///   in-progress ──► paid ──► refunded
///        │  ▲        │
///        ▼  │        └─────► return
///      pending
///        │
///        └────────► cancelled  (also reachable from in-progress)
/// ```
/// Re-saving in the current status is always allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum SalesStatus {
    /// Draft is being rung up.
    #[default]
    InProgress,
    /// Finished transaction; inventory is deducted.
    Paid,
    /// Saved without finishing.
    Pending,
    /// Paid sale given back; inventory restored.
    Refunded,
    /// Paid sale whose goods came back; inventory restored.
    Return,
    Cancelled,
}

impl SalesStatus {
    /// Only these statuses accept line edits in the cart engine.
    pub fn is_editable(self) -> bool {
        matches!(self, SalesStatus::InProgress | SalesStatus::Pending)
    }

    /// Checks whether a sale in `self` may be saved as `next`.
    pub fn can_transition_to(self, next: SalesStatus) -> bool {
        use SalesStatus::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (InProgress, Paid | Pending | Cancelled)
                | (Pending, Paid | InProgress | Cancelled)
                | (Paid, Refunded | Return)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SalesStatus::InProgress => "in-progress",
            SalesStatus::Paid => "paid",
            SalesStatus::Pending => "pending",
            SalesStatus::Refunded => "refunded",
            SalesStatus::Return => "return",
            SalesStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SalesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer pays. Absent (`None` on the draft) until chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
}

// =============================================================================
// Contacts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ContactType {
    Customer,
    Staff,
    Dealer,
}

impl ContactType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContactType::Customer => "customer",
            ContactType::Staff => "staff",
            ContactType::Dealer => "dealer",
        }
    }
}

/// A customer, staff member or dealer.
///
/// `date_open` and `birthdate` are calendar-date strings; every read path
/// passes the record through [`crate::contact::normalize_contact`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Contact {
    pub id: String,
    pub contact_type: ContactType,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location_id: Option<String>,
    /// Price level name assigned to this customer (display only).
    pub price_level: Option<String>,
    pub date_open: Option<String>,
    pub birthdate: Option<String>,
    /// Storage path of the profile picture, if any.
    pub profile_url: Option<String>,
    #[ts(as = "String")]
    pub date_added: DateTime<Utc>,
}

// =============================================================================
// Reference Data
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub location_name: String,
    pub address: Option<String>,
}

/// A product category (`item_types` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ItemCategory {
    pub id: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceType {
    pub id: String,
    pub code: String,
    pub invoice_name: String,
}

// =============================================================================
// Products & Price Levels
// =============================================================================

/// A named pricing tier ("Level 1", "Wholesale", ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PriceLevel {
    pub id: String,
    pub level_name: String,
    pub price: Money,
}

/// Join record pairing a product with one of its price levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemPriceLevel {
    pub id: String,
    pub item_id: String,
    pub price_level_id: String,
    pub price_level: PriceLevel,
}

/// A persisted inventory item.
///
/// ## Inventory Counters
/// - `item_quantity`: stock currently available
/// - `item_sold`: cumulative units sold
/// - `default_item_quantity`: not a column; the `item_quantity` observed when
///   the row was loaded, used as the restoration baseline during settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub code: Option<String>,
    pub barcode: Option<String>,
    pub item_name: String,
    pub item_type_id: Option<String>,
    pub dealer_id: Option<String>,
    pub item_cost: Money,
    pub item_quantity: i64,
    pub item_sold: i64,
    pub item_image_url: Option<String>,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub default_item_quantity: i64,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub price_levels: Vec<ItemPriceLevel>,
}

impl Product {
    /// Records the loaded stock level as the restoration baseline.
    pub fn with_loaded_baseline(mut self) -> Self {
        self.default_item_quantity = self.item_quantity;
        self
    }

    /// A product with no stock left cannot be added to a draft.
    pub fn is_out_of_stock(&self) -> bool {
        self.item_quantity <= 0
    }
}

// =============================================================================
// Sales Header & Selections
// =============================================================================

/// The persisted sales row: a draft minus its UI-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesHeader {
    pub id: String,
    pub customer_id: Option<String>,
    pub invoice_type_id: Option<String>,
    #[ts(as = "String")]
    pub sales_date: DateTime<Utc>,
    pub sales_status: SalesStatus,
    pub is_cancelled: bool,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub sub_total: Money,
    pub total_due: Money,
    pub amount_paid: Money,
    pub change_due: Money,
    pub invoice_no: String,
    pub payment_method: Option<PaymentMethod>,
}

/// A line item row as stored.
///
/// `deducted_quantity` is the quantity currently reflected against the
/// product's inventory for this line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PersistedSelection {
    pub id: String,
    pub sales_id: String,
    pub item_id: String,
    pub price_level_id: Option<String>,
    pub quantity: i64,
    pub cost: Money,
    pub price: Money,
    pub deducted_quantity: i64,
}
