//! # Register Session
//!
//! Owns the one sales draft a cashier is working on and drives it through
//! the cart engine and the settlement reconciler.
//!
//! ## Draft Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  new() ──► in-progress ──┬── toggle / quantity / customer / tender ──┐  │
//! │                 ▲        │                                           │  │
//! │                 │        └───────────────────────────────────────────┘  │
//! │                 │                                                       │
//! │                 │        save()   ──► pending ──► finish() ──► paid     │
//! │                 │        finish() ──────────────────────────► paid     │
//! │                 │                                              │        │
//! │   discard()  ───┘        open_sale(id) ─► refund() ─► refunded │        │
//! │                                       └─► mark_return() ─► return       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every settling call works on a copy of the draft. The session only
//! replaces its draft once settlement succeeded, so a failed settlement
//! leaves the cashier's draft exactly as it was.

use despos_core::cart::{self, reset_draft};
use despos_core::{Money, PaymentMethod, SalesDraft, SalesStatus};
use despos_db::{Database, SettlementOutcome};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};

/// One line of a [`SaleSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSummary {
    pub item_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub price: Money,
    pub line_total: Money,
}

/// Receipt-shaped view of a settled sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub sale_id: String,
    pub invoice_no: String,
    pub status: SalesStatus,
    pub customer_id: Option<String>,
    pub lines: Vec<LineSummary>,
    pub sub_total: Money,
    pub total_due: Money,
    pub amount_paid: Money,
    pub change_due: Money,
}

impl SaleSummary {
    fn new(draft: &SalesDraft, outcome: &SettlementOutcome) -> Self {
        let lines = draft
            .lines()
            .into_iter()
            .map(|line| LineSummary {
                item_id: line.item_id.clone(),
                item_name: line.product.item_name.clone(),
                quantity: line.quantity,
                price: line.price,
                line_total: line.line_total(),
            })
            .collect();

        let header = &outcome.header;
        SaleSummary {
            sale_id: header.id.clone(),
            invoice_no: header.invoice_no.clone(),
            status: header.sales_status,
            customer_id: header.customer_id.clone(),
            lines,
            sub_total: header.sub_total,
            total_due: header.total_due,
            amount_paid: header.amount_paid,
            change_due: header.change_due,
        }
    }
}

/// The cashier's working draft plus the database it settles into.
///
/// ## Usage
/// ```rust,ignore
/// let mut session = RegisterSession::new(db, false);
///
/// session.toggle_product(&product_id).await?;
/// session.select_customer(Some(&customer_id)).await?;
/// session.set_payment_method(Some(PaymentMethod::Cash));
/// session.tender(Money::from_cents(10_000));
///
/// let receipt = session.finish().await?;
/// ```
#[derive(Debug)]
pub struct RegisterSession {
    db: Database,
    draft: SalesDraft,
    discard_on_success: bool,
}

impl RegisterSession {
    pub fn new(db: Database, discard_on_success: bool) -> Self {
        RegisterSession {
            db,
            draft: reset_draft(),
            discard_on_success,
        }
    }

    pub fn draft(&self) -> &SalesDraft {
        &self.draft
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Draft edits
    // =========================================================================

    /// Picking a product that is already on the draft takes it off again.
    ///
    /// ## Errors
    /// - `NOT_FOUND` for an unknown product
    /// - `OUT_OF_STOCK` when adding a product with no stock left
    /// - `NO_PRICE_LEVEL` when the product has no price to sell at
    pub async fn toggle_product(&mut self, product_id: &str) -> ApiResult<&SalesDraft> {
        if self.draft.selections.contains_key(product_id) {
            self.remove_product(product_id)
        } else {
            self.add_product(product_id).await
        }
    }

    pub async fn add_product(&mut self, product_id: &str) -> ApiResult<&SalesDraft> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", product_id))?;

        debug!(id = %product_id, name = %product.item_name, "Adding line");
        let draft = cart::add_line(self.draft.clone(), &product)?;
        self.replace(draft);
        Ok(&self.draft)
    }

    pub fn remove_product(&mut self, product_id: &str) -> ApiResult<&SalesDraft> {
        debug!(id = %product_id, "Removing line");
        let draft = cart::remove_line(self.draft.clone(), product_id)?;
        self.replace(draft);
        Ok(&self.draft)
    }

    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> ApiResult<&SalesDraft> {
        let draft = cart::set_line_quantity(self.draft.clone(), product_id, quantity)?;
        self.replace(draft);
        Ok(&self.draft)
    }

    /// Attaches a stored customer to the draft, or clears it with `None`.
    pub async fn select_customer(&mut self, customer_id: Option<&str>) -> ApiResult<&SalesDraft> {
        let customer = match customer_id {
            Some(id) => Some(
                self.db
                    .contacts()
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("Contact", id))?,
            ),
            None => None,
        };

        self.draft = cart::select_customer(self.draft.clone(), customer);
        Ok(&self.draft)
    }

    pub async fn set_invoice_type(&mut self, invoice_type_id: Option<&str>) -> ApiResult<()> {
        if let Some(id) = invoice_type_id {
            if self.db.invoice_types().get_by_id(id).await?.is_none() {
                return Err(ApiError::not_found("Invoice type", id));
            }
        }

        self.draft.invoice_type_id = invoice_type_id.map(str::to_string);
        Ok(())
    }

    pub fn set_payment_method(&mut self, method: Option<PaymentMethod>) {
        self.draft = cart::set_payment_method(self.draft.clone(), method);
    }

    pub fn tender(&mut self, amount: Money) {
        self.draft = cart::tender(self.draft.clone(), amount);
    }

    /// Drops the current draft and starts a fresh one.
    pub fn discard(&mut self) {
        info!(invoice_no = %self.draft.invoice_no, "Discarding draft");
        self.draft = reset_draft();
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Why the draft cannot be finished yet, if it cannot.
    pub fn validate(&self) -> ApiResult<()> {
        cart::validate_draft(&self.draft, self.draft.customer.as_ref())?;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        cart::is_valid(&self.draft, self.draft.customer.as_ref())
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Settles the draft as paid. Refused with `VALIDATION_ERROR`, before
    /// anything is written, while the draft is not valid.
    pub async fn finish(&mut self) -> ApiResult<SaleSummary> {
        self.validate()?;
        self.settle_as(SalesStatus::Paid).await
    }

    /// Stores the draft as pending without taking payment.
    pub async fn save(&mut self) -> ApiResult<SaleSummary> {
        if self.draft.is_empty() {
            return Err(ApiError::validation("selections is required"));
        }
        self.settle_as(SalesStatus::Pending).await
    }

    /// Cancels the current draft. Stock is left as it is.
    pub async fn cancel(&mut self) -> ApiResult<SaleSummary> {
        self.settle_as(SalesStatus::Cancelled).await
    }

    /// Loads a stored sale as the working draft.
    pub async fn open_sale(&mut self, sale_id: &str) -> ApiResult<&SalesDraft> {
        if !self.draft.is_empty() && self.draft.id.is_none() {
            warn!(invoice_no = %self.draft.invoice_no, "Replacing unsaved draft");
        }

        self.draft = self.db.settlement().open(sale_id).await?;
        Ok(&self.draft)
    }

    /// Refunds the open paid sale, giving every deducted unit back.
    pub async fn refund(&mut self) -> ApiResult<SaleSummary> {
        self.settle_as(SalesStatus::Refunded).await
    }

    /// Records the open paid sale as returned goods.
    pub async fn mark_return(&mut self) -> ApiResult<SaleSummary> {
        self.settle_as(SalesStatus::Return).await
    }

    async fn settle_as(&mut self, status: SalesStatus) -> ApiResult<SaleSummary> {
        let customer_id = self.draft.customer_id.clone();
        let candidate = cart::with_status(self.draft.clone(), status)?;
        let candidate = cart::recompute(candidate, customer_id.as_deref());

        let outcome = self.db.settlement().settle(&candidate).await?;
        let settled = cart::absorb(candidate, &outcome.header, &outcome.selections);
        let summary = SaleSummary::new(&settled, &outcome);

        info!(
            id = %summary.sale_id,
            invoice_no = %summary.invoice_no,
            status = %summary.status,
            total_due = %summary.total_due,
            "Sale settled"
        );

        self.draft = if self.discard_on_success {
            reset_draft()
        } else {
            settled
        };

        Ok(summary)
    }

    fn replace(&mut self, draft: SalesDraft) {
        let customer_id = draft.customer_id.clone();
        self.draft = cart::recompute(draft, customer_id.as_deref());
    }
}
