//! # Settlement Planning
//!
//! Computes every write a settlement needs, without touching storage.
//! `despos-db` loads the products, calls [`plan_settlement`], and executes
//! the resulting [`SettlementPlan`].
//!
//! ## Order of Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  working = loaded products (default_item_quantity = loaded quantity)    │
//! │                                                                         │
//! │  1. to_delete rows      restore stored deducted units, drop the row     │
//! │  2. surviving lines     move inventory toward the target status         │
//! │                                                                         │
//! │  Both passes update the SAME working copy in sequence, so a product     │
//! │  that is both deleted and re-added ends up with the sequential result,  │
//! │  not a merged one. One product update per touched product is emitted.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deducted-Quantity Ledger
//! Each stored line remembers how many units it currently holds out of
//! inventory. A settlement only moves the difference between that and what
//! the target status requires:
//!
//! | target status      | required deduction | effect                         |
//! |--------------------|--------------------|--------------------------------|
//! | paid               | quantity           | sold += Δ, quantity −= Δ       |
//! | refunded / return  | 0                  | sold −= d, quantity = base + d |
//! | anything else      | unchanged          | none                           |
//!
//! The "currently holds" side always comes from the stored selection rows,
//! never from the draft. Settling an already-paid sale again, or replaying
//! a stale copy of a draft that was settled since, is therefore a no-op on
//! inventory.

use std::collections::{BTreeMap, HashMap};

use crate::cart::SalesDraft;
use crate::types::{PersistedSelection, Product, SalesHeader, SalesStatus};

/// New counter values for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryUpdate {
    pub item_id: String,
    pub item_quantity: i64,
    pub item_sold: i64,
}

/// Everything a settlement writes after the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementPlan {
    pub product_updates: Vec<InventoryUpdate>,
    /// Selection rows to delete.
    pub deletions: Vec<PersistedSelection>,
    /// Selection rows to insert or update, owned by the stored header.
    pub upserts: Vec<PersistedSelection>,
}

impl SettlementPlan {
    pub fn write_count(&self) -> usize {
        self.product_updates.len() + self.deletions.len() + self.upserts.len()
    }
}

/// Ids of every product a settlement of `draft` may touch, given the
/// `stored` selection rows of its sale.
pub fn touched_product_ids(draft: &SalesDraft, stored: &[PersistedSelection]) -> Vec<String> {
    let mut ids: Vec<String> = draft
        .to_delete
        .iter()
        .chain(stored)
        .map(|row| row.item_id.clone())
        .chain(draft.selections.values().map(|line| line.item_id.clone()))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Units a line must hold out of inventory once it is in `status`.
fn required_deduction(status: SalesStatus, quantity: i64, deducted: i64) -> i64 {
    match status {
        SalesStatus::Paid => quantity,
        SalesStatus::Refunded | SalesStatus::Return => 0,
        _ => deducted,
    }
}

fn touch(touched: &mut Vec<String>, id: &str) {
    if !touched.iter().any(|t| t == id) {
        touched.push(id.to_string());
    }
}

/// Stored row a draft line settles onto: the row with its id when it has
/// one, otherwise an unclaimed row of the same sale for the same product.
fn match_stored<'a>(
    line_id: Option<&str>,
    item_id: &str,
    stored: &'a [PersistedSelection],
    claimed: &[&str],
) -> Option<&'a PersistedSelection> {
    let free = |row: &&PersistedSelection| !claimed.contains(&row.id.as_str());

    match line_id {
        Some(id) => stored.iter().filter(free).find(|row| row.id == id),
        None => stored.iter().filter(free).find(|row| row.item_id == item_id),
    }
}

/// Builds the settlement plan for `draft` against its stored `header`.
///
/// `stored` holds the selection rows currently persisted for the header;
/// their `deducted_quantity` is the baseline every delta is measured from,
/// whatever the draft remembers. `products` holds the current stored row
/// of every product in [`touched_product_ids`]. Lines whose product no
/// longer exists are still written, but no inventory update is emitted for
/// them.
///
/// Staged deletions whose row is already gone are dropped, so replaying a
/// stale draft never gives the same units back twice.
pub fn plan_settlement(
    draft: &SalesDraft,
    header: &SalesHeader,
    stored: &[PersistedSelection],
    products: &HashMap<String, Product>,
) -> SettlementPlan {
    let mut working: BTreeMap<String, Product> = products
        .iter()
        .map(|(id, p)| (id.clone(), p.clone().with_loaded_baseline()))
        .collect();
    let mut touched: Vec<String> = Vec::new();
    let mut claimed: Vec<&str> = Vec::new();

    // Pass 1: deletions give back what their stored row holds.
    let mut deletions = Vec::with_capacity(draft.to_delete.len());
    for staged in &draft.to_delete {
        let Some(row) = stored.iter().find(|row| row.id == staged.id) else {
            continue;
        };
        if claimed.contains(&row.id.as_str()) {
            continue;
        }
        claimed.push(&row.id);

        if row.deducted_quantity != 0 {
            if let Some(product) = working.get_mut(&row.item_id) {
                product.item_sold -= row.deducted_quantity;
                product.item_quantity = product.default_item_quantity + row.deducted_quantity;
                product.default_item_quantity = product.item_quantity;
                touch(&mut touched, &row.item_id);
            }
        }
        deletions.push(row.clone());
    }

    // Pass 2: surviving lines move from their stored deduction toward the
    // target status.
    let mut upserts = Vec::with_capacity(draft.selections.len());
    for line in draft.lines() {
        let mut row = line.to_persisted(&header.id);
        let baseline = match match_stored(line.id.as_deref(), &line.item_id, stored, &claimed) {
            Some(prior) => {
                claimed.push(&prior.id);
                row.id = prior.id.clone();
                prior.deducted_quantity
            }
            None => 0,
        };

        let target = required_deduction(header.sales_status, row.quantity, baseline);
        let delta = target - baseline;

        if delta != 0 {
            if let Some(product) = working.get_mut(&row.item_id) {
                product.item_sold += delta;
                product.item_quantity = product.default_item_quantity - delta;
                product.default_item_quantity = product.item_quantity;
                touch(&mut touched, &row.item_id);
            }
        }

        row.deducted_quantity = target;
        upserts.push(row);
    }

    let product_updates = touched
        .iter()
        .filter_map(|id| working.get(id))
        .map(|p| InventoryUpdate {
            item_id: p.id.clone(),
            item_quantity: p.item_quantity,
            item_sold: p.item_sold,
        })
        .collect();

    SettlementPlan {
        product_updates,
        deletions,
        upserts,
    }
}
