//! # Settlement Reconciler
//!
//! Commits a sales draft: writes the header, then reconciles every line
//! against stored inventory.
//!
//! ## Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. upsert header            ── failure aborts, nothing else is tried  │
//! │  2. load stored selections   (their deducted units are the baseline)   │
//! │  3. load touched products    (stored counters become the baseline)     │
//! │  4. plan_settlement()        (despos-core, pure, sequential deltas)    │
//! │  5. execute the plan:                                                   │
//! │       deletions ─┐                                                      │
//! │       inventory ─┼─ Atomic:     same transaction as the header         │
//! │       upserts  ──┘  BestEffort: one transaction per product, run       │
//! │                                 concurrently after the header commit  │
//! │  6. return stored header + stored selections                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modes
//! - **Atomic** (default): one SQLite transaction. Any failure rolls back
//!   everything and surfaces as [`SettlementError::Persistence`].
//! - **BestEffort**: the header commits on its own, then the batch runs
//!   concurrently, grouped per product. A product's selection rows and its
//!   counters commit together or not at all. Every group is attempted;
//!   failures are collected into [`SettlementError::Partial`] instead of
//!   being dropped. Settling the same draft again after fixing the cause
//!   only applies what is still missing.
//!
//! Two settlements touching the same product at once can still lose an
//! update in BestEffort mode: counters are written as absolute values
//! computed from what each settlement loaded.

use std::collections::{BTreeMap, HashMap};

use despos_core::settlement::{plan_settlement, touched_product_ids};
use despos_core::{
    InventoryUpdate, PersistedSelection, Product, SalesDraft, SalesHeader, SettlementPlan,
};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::product::{apply_inventory, fetch_item};
use crate::repository::sale::upsert_header;
use crate::repository::selection::{delete_selection, selections_for_sale, upsert_selection};

// =============================================================================
// Mode & Outcome
// =============================================================================

/// How settlement writes are grouped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    #[default]
    Atomic,
    BestEffort,
}

/// A fully applied settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    /// The stored header; its id and status are authoritative.
    pub header: SalesHeader,
    /// Stored selections, in draft display order.
    pub selections: Vec<PersistedSelection>,
    pub product_updates: Vec<InventoryUpdate>,
    /// Ids of the selection rows that were deleted.
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    InventoryUpdate,
    SelectionUpsert,
    SelectionDelete,
}

/// One batch write that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub kind: WriteKind,
    /// Product id for inventory updates, selection id otherwise.
    pub target_id: String,
    pub message: String,
}

/// Header committed, some batch writes failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSettlement {
    pub header: SalesHeader,
    /// Selections that were stored.
    pub selections: Vec<PersistedSelection>,
    pub failures: Vec<WriteFailure>,
    pub attempted: usize,
}

#[derive(Debug, Error)]
pub enum SettlementError {
    /// Nothing after the failure point was committed.
    #[error("Settlement failed: {0}")]
    Persistence(#[from] DbError),

    #[error("Settlement partially failed: {} of {} writes failed", .0.failures.len(), .0.attempted)]
    Partial(PartialSettlement),
}

pub type SettlementResult = Result<SettlementOutcome, SettlementError>;

// =============================================================================
// Reconciler
// =============================================================================

/// Executes settlement plans against the database.
///
/// ## Usage
/// ```rust,ignore
/// let outcome = db.settlement().settle(&draft).await?;
/// let draft = cart::absorb(draft, &outcome.header, &outcome.selections);
/// ```
#[derive(Debug, Clone)]
pub struct SettlementReconciler {
    db: Database,
    mode: SettlementMode,
}

impl SettlementReconciler {
    pub fn new(db: Database, mode: SettlementMode) -> Self {
        SettlementReconciler { db, mode }
    }

    pub fn mode(&self) -> SettlementMode {
        self.mode
    }

    /// Settles `draft`. The draft itself is never modified.
    pub async fn settle(&self, draft: &SalesDraft) -> SettlementResult {
        info!(
            invoice_no = %draft.invoice_no,
            status = %draft.sales_status,
            lines = draft.selections.len(),
            deletions = draft.to_delete.len(),
            mode = ?self.mode,
            "Settling sale"
        );

        let header = draft.to_header();

        let outcome = match self.mode {
            SettlementMode::Atomic => self.settle_atomic(draft, &header).await?,
            SettlementMode::BestEffort => self.settle_best_effort(draft, &header).await?,
        };

        info!(
            id = %outcome.header.id,
            status = %outcome.header.sales_status,
            inventory_updates = outcome.product_updates.len(),
            "Sale settled"
        );
        Ok(outcome)
    }

    async fn settle_atomic(
        &self,
        draft: &SalesDraft,
        header: &SalesHeader,
    ) -> Result<SettlementOutcome, SettlementError> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let stored = upsert_header(&mut *tx, header).await?;
        debug!(id = %stored.id, "Header written");

        let prior = selections_for_sale(&mut *tx, &stored.id).await?;
        let mut products = HashMap::new();
        for id in touched_product_ids(draft, &prior) {
            if let Some(product) = fetch_item(&mut *tx, &id).await? {
                products.insert(id, product);
            }
        }

        let plan = plan_settlement(draft, &stored, &prior, &products);

        for row in &plan.deletions {
            delete_selection(&mut *tx, &row.id).await?;
        }
        for update in &plan.product_updates {
            apply_inventory(&mut *tx, update).await?;
        }
        let mut selections = Vec::with_capacity(plan.upserts.len());
        for row in &plan.upserts {
            selections.push(upsert_selection(&mut *tx, row).await?);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(SettlementOutcome {
            header: stored,
            selections,
            deleted: plan.deletions.iter().map(|row| row.id.clone()).collect(),
            product_updates: plan.product_updates,
        })
    }

    async fn settle_best_effort(
        &self,
        draft: &SalesDraft,
        header: &SalesHeader,
    ) -> Result<SettlementOutcome, SettlementError> {
        let pool = self.db.pool();

        let stored = upsert_header(pool, header).await?;
        debug!(id = %stored.id, "Header committed");

        let prior = selections_for_sale(pool, &stored.id).await?;
        let products = load_products(pool, draft, &prior).await?;
        let plan = plan_settlement(draft, &stored, &prior, &products);
        let attempted = plan.write_count();

        let groups = group_by_product(&plan);
        let results = join_all(groups.iter().map(|group| apply_group(pool, group))).await;

        let mut failures = Vec::new();
        let mut written: HashMap<String, PersistedSelection> = HashMap::new();

        for (group, result) in groups.iter().zip(results) {
            match result {
                Ok(rows) => written.extend(rows.into_iter().map(|row| (row.id.clone(), row))),
                Err(e) => failures.extend(group.failures(&e)),
            }
        }

        // Back into draft display order.
        let selections: Vec<PersistedSelection> = plan
            .upserts
            .iter()
            .filter_map(|row| written.remove(&row.id))
            .collect();

        if !failures.is_empty() {
            warn!(
                id = %stored.id,
                failed = failures.len(),
                attempted,
                "Settlement batch partially failed"
            );
            return Err(SettlementError::Partial(PartialSettlement {
                header: stored,
                selections,
                failures,
                attempted,
            }));
        }

        let SettlementPlan {
            product_updates,
            deletions,
            ..
        } = plan;

        Ok(SettlementOutcome {
            header: stored,
            selections,
            product_updates,
            deleted: deletions.into_iter().map(|row| row.id).collect(),
        })
    }

    /// Rebuilds an editable or refundable draft from a stored sale.
    ///
    /// ## Errors
    /// `NotFound` when the sale, or a product one of its lines refers to,
    /// does not exist.
    pub async fn open(&self, sale_id: &str) -> DbResult<SalesDraft> {
        let (header, rows) = self
            .db
            .sales()
            .get_with_selections(sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        let products = self.db.products();
        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            let product = products
                .get_by_id(&row.item_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &row.item_id))?;
            lines.push((row, product));
        }

        let customer = match header.customer_id.as_deref() {
            Some(id) => self.db.contacts().get_by_id(id).await?,
            None => None,
        };

        debug!(id = %header.id, lines = lines.len(), "Opened stored sale");
        Ok(SalesDraft::from_persisted(header, lines, customer))
    }
}

async fn load_products<'c, E>(
    exec: E,
    draft: &SalesDraft,
    prior: &[PersistedSelection],
) -> DbResult<HashMap<String, Product>>
where
    E: SqliteExecutor<'c> + Copy,
{
    let mut products = HashMap::new();
    for id in touched_product_ids(draft, prior) {
        if let Some(product) = fetch_item(exec, &id).await? {
            products.insert(id, product);
        }
    }
    Ok(products)
}

/// Every write a settlement makes for one product.
///
/// A group commits or fails as a whole, so a product's counters never move
/// without the selection rows that account for them.
#[derive(Debug)]
struct WriteGroup<'a> {
    item_id: &'a str,
    deletions: Vec<&'a PersistedSelection>,
    update: Option<&'a InventoryUpdate>,
    upserts: Vec<&'a PersistedSelection>,
}

impl<'a> WriteGroup<'a> {
    fn new(item_id: &'a str) -> Self {
        WriteGroup {
            item_id,
            deletions: Vec::new(),
            update: None,
            upserts: Vec::new(),
        }
    }

    /// One failure per write the group rolled back.
    fn failures(&self, err: &DbError) -> Vec<WriteFailure> {
        warn!(item_id = %self.item_id, error = %err, "Settlement write group rolled back");

        let deletes = self
            .deletions
            .iter()
            .map(|row| (WriteKind::SelectionDelete, row.id.as_str()));
        let update = self
            .update
            .iter()
            .map(|u| (WriteKind::InventoryUpdate, u.item_id.as_str()));
        let upserts = self
            .upserts
            .iter()
            .map(|row| (WriteKind::SelectionUpsert, row.id.as_str()));

        deletes
            .chain(update)
            .chain(upserts)
            .map(|(kind, target_id)| WriteFailure {
                kind,
                target_id: target_id.to_string(),
                message: err.to_string(),
            })
            .collect()
    }
}

fn group_by_product(plan: &SettlementPlan) -> Vec<WriteGroup<'_>> {
    let mut groups: BTreeMap<&str, WriteGroup<'_>> = BTreeMap::new();

    for row in &plan.deletions {
        groups
            .entry(row.item_id.as_str())
            .or_insert_with(|| WriteGroup::new(&row.item_id))
            .deletions
            .push(row);
    }
    for update in &plan.product_updates {
        groups
            .entry(update.item_id.as_str())
            .or_insert_with(|| WriteGroup::new(&update.item_id))
            .update = Some(update);
    }
    for row in &plan.upserts {
        groups
            .entry(row.item_id.as_str())
            .or_insert_with(|| WriteGroup::new(&row.item_id))
            .upserts
            .push(row);
    }

    groups.into_values().collect()
}

async fn apply_group(pool: &SqlitePool, group: &WriteGroup<'_>) -> DbResult<Vec<PersistedSelection>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

    for row in &group.deletions {
        delete_selection(&mut *tx, &row.id).await?;
    }
    if let Some(update) = group.update {
        apply_inventory(&mut *tx, update).await?;
    }
    let mut stored = Vec::with_capacity(group.upserts.len());
    for row in &group.upserts {
        stored.push(upsert_selection(&mut *tx, row).await?);
    }

    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

    Ok(stored)
}
