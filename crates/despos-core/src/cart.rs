//! # Cart Engine
//!
//! Owns the sales draft and every operation that changes it.
//!
//! ## Value Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every operation takes the draft BY VALUE and hands back a new one:     │
//! │                                                                         │
//! │      let draft = add_line(draft, &product)?;                            │
//! │      let draft = recompute(draft, customer_id);                         │
//! │                                                                         │
//! │  On error the input draft is consumed, so callers that must keep the    │
//! │  old state on failure pass a clone (RegisterSession does this).         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Keys
//! Lines are keyed by product id: a product appears at most once per draft.
//! Display order follows `item_index`, which is assigned from a counter
//! that only ever grows, so a removed line's index is never handed out again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::invoice::generate_invoice_no;
use crate::money::Money;
use crate::pricing::resolve_price;
use crate::types::{
    Contact, PaymentMethod, PersistedSelection, Product, SalesHeader, SalesStatus,
};
use crate::validation::validate_quantity;

// =============================================================================
// Draft Types
// =============================================================================

/// One product line in a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SelectionDraft {
    /// Row id once the line has been persisted.
    pub id: Option<String>,
    /// Insertion order, unique within the draft.
    pub item_index: usize,
    /// Copy of the product taken when the line was added.
    pub product: Product,
    pub item_id: String,
    pub price_level_id: Option<String>,
    pub quantity: i64,
    pub cost: Money,
    pub price: Money,
    /// Units of this line already taken out of inventory.
    pub deducted_quantity: i64,
}

impl SelectionDraft {
    /// `price × quantity`
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }

    /// The row shape written by settlement.
    pub fn to_persisted(&self, sales_id: &str) -> PersistedSelection {
        PersistedSelection {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            sales_id: sales_id.to_string(),
            item_id: self.item_id.clone(),
            price_level_id: self.price_level_id.clone(),
            quantity: self.quantity,
            cost: self.cost,
            price: self.price,
            deducted_quantity: self.deducted_quantity,
        }
    }
}

/// The in-memory sale a register session works on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesDraft {
    /// `None` until the first settlement.
    pub id: Option<String>,
    pub customer_id: Option<String>,
    /// The selected customer record. UI-only, never persisted on the header.
    pub customer: Option<Contact>,
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
    /// Lines keyed by product id.
    pub selections: BTreeMap<String, SelectionDraft>,
    /// Persisted lines removed since the last save.
    pub to_delete: Vec<PersistedSelection>,
    pub line_count: usize,
    pub next_item_index: usize,
}

impl Default for SalesDraft {
    fn default() -> Self {
        reset_draft()
    }
}

impl SalesDraft {
    /// Lines in display order.
    pub fn lines(&self) -> Vec<&SelectionDraft> {
        let mut lines: Vec<&SelectionDraft> = self.selections.values().collect();
        lines.sort_by_key(|line| line.item_index);
        lines
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Header row for this draft, with the UI-only fields stripped.
    ///
    /// A draft that was never saved gets a fresh id here; the gateway may
    /// still swap it for the id already stored under the same invoice number.
    pub fn to_header(&self) -> SalesHeader {
        SalesHeader {
            id: self
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            customer_id: self.customer_id.clone(),
            invoice_type_id: self.invoice_type_id.clone(),
            sales_date: self.sales_date,
            sales_status: self.sales_status,
            is_cancelled: self.is_cancelled,
            discount_amount: self.discount_amount,
            tax_amount: self.tax_amount,
            sub_total: self.sub_total,
            total_due: self.total_due,
            amount_paid: self.amount_paid,
            change_due: self.change_due,
            invoice_no: self.invoice_no.clone(),
            payment_method: self.payment_method,
        }
    }

    /// Rebuilds a draft from a stored sale.
    ///
    /// `lines` pairs each stored selection with its current product row and
    /// is expected in display order.
    pub fn from_persisted(
        header: SalesHeader,
        lines: Vec<(PersistedSelection, Product)>,
        customer: Option<Contact>,
    ) -> Self {
        let mut selections = BTreeMap::new();

        for (index, (row, product)) in lines.into_iter().enumerate() {
            selections.insert(
                row.item_id.clone(),
                SelectionDraft {
                    id: Some(row.id),
                    item_index: index,
                    product,
                    item_id: row.item_id,
                    price_level_id: row.price_level_id,
                    quantity: row.quantity,
                    cost: row.cost,
                    price: row.price,
                    deducted_quantity: row.deducted_quantity,
                },
            );
        }

        let line_count = selections.len();

        SalesDraft {
            id: Some(header.id),
            customer_id: header.customer_id,
            customer,
            invoice_type_id: header.invoice_type_id,
            sales_date: header.sales_date,
            sales_status: header.sales_status,
            is_cancelled: header.is_cancelled,
            discount_amount: header.discount_amount,
            tax_amount: header.tax_amount,
            sub_total: header.sub_total,
            total_due: header.total_due,
            amount_paid: header.amount_paid,
            change_due: header.change_due,
            invoice_no: header.invoice_no,
            payment_method: header.payment_method,
            selections,
            to_delete: Vec::new(),
            line_count,
            next_item_index: line_count,
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

fn ensure_editable(draft: &SalesDraft) -> CoreResult<()> {
    if draft.sales_status.is_editable() {
        Ok(())
    } else {
        Err(CoreError::DraftNotEditable {
            status: draft.sales_status,
        })
    }
}

/// A fresh draft with defaults and a newly generated invoice number.
pub fn reset_draft() -> SalesDraft {
    SalesDraft {
        id: None,
        customer_id: None,
        customer: None,
        invoice_type_id: None,
        sales_date: Utc::now(),
        sales_status: SalesStatus::InProgress,
        is_cancelled: false,
        discount_amount: Money::zero(),
        tax_amount: Money::zero(),
        sub_total: Money::zero(),
        total_due: Money::zero(),
        amount_paid: Money::zero(),
        change_due: Money::zero(),
        invoice_no: generate_invoice_no(),
        payment_method: None,
        selections: BTreeMap::new(),
        to_delete: Vec::new(),
        line_count: 0,
        next_item_index: 0,
    }
}

/// Adds a line for `product` at quantity 1.
///
/// ## Errors
/// - `AlreadyExpiredStock` when the product has no stock
/// - `DuplicateLine` when the product is already on the draft
/// - `NoPriceLevel` when no unit price can be resolved
/// - `DraftNotEditable` outside in-progress/pending
pub fn add_line(mut draft: SalesDraft, product: &Product) -> CoreResult<SalesDraft> {
    ensure_editable(&draft)?;

    if product.is_out_of_stock() {
        return Err(CoreError::AlreadyExpiredStock {
            product_id: product.id.clone(),
            item_name: product.item_name.clone(),
        });
    }

    if draft.selections.contains_key(&product.id) {
        return Err(CoreError::DuplicateLine(product.id.clone()));
    }

    let resolved = resolve_price(product)?;
    let price_level_id = crate::pricing::base_price_level(&product.price_levels)
        .map(|level| level.price_level_id.clone());

    let line = SelectionDraft {
        id: None,
        item_index: draft.next_item_index,
        product: product.clone(),
        item_id: product.id.clone(),
        price_level_id,
        quantity: 1,
        cost: resolved.cost,
        price: resolved.price,
        deducted_quantity: 0,
    };

    draft.selections.insert(product.id.clone(), line);
    draft.line_count += 1;
    draft.next_item_index += 1;

    Ok(draft)
}

/// Removes the line for `product_id`.
///
/// A line that was already persisted is staged on `to_delete` so the next
/// settlement deletes its row and gives its deducted units back.
pub fn remove_line(mut draft: SalesDraft, product_id: &str) -> CoreResult<SalesDraft> {
    ensure_editable(&draft)?;

    let line = draft
        .selections
        .get(product_id)
        .ok_or_else(|| CoreError::LineNotFound(product_id.to_string()))?;

    let staged = match (&line.id, &draft.id) {
        (Some(_), Some(sales_id)) => Some(line.to_persisted(sales_id)),
        (Some(selection_id), None) => {
            return Err(CoreError::DetachedLine {
                selection_id: selection_id.clone(),
            })
        }
        (None, _) => None,
    };

    draft.selections.remove(product_id);
    draft.to_delete.extend(staged);

    draft.line_count -= 1;
    Ok(draft)
}

/// Changes the quantity of one line.
pub fn set_line_quantity(
    mut draft: SalesDraft,
    product_id: &str,
    quantity: i64,
) -> CoreResult<SalesDraft> {
    ensure_editable(&draft)?;
    validate_quantity(quantity)?;

    let line = draft
        .selections
        .get_mut(product_id)
        .ok_or_else(|| CoreError::LineNotFound(product_id.to_string()))?;
    line.quantity = quantity;

    Ok(draft)
}

/// Recomputes the totals and records the selected customer id.
///
/// ```text
/// sub_total = Σ price × quantity
/// total_due = sub_total + tax_amount − discount_amount
/// change_due = max(0, amount_paid − total_due)
/// ```
/// Tax and discount are reset to zero first: the register has no tax or
/// discount entry yet.
pub fn recompute(mut draft: SalesDraft, customer_id: Option<&str>) -> SalesDraft {
    draft.customer_id = customer_id.map(str::to_string);

    draft.discount_amount = Money::zero();
    draft.tax_amount = Money::zero();
    draft.sub_total = draft.selections.values().map(SelectionDraft::line_total).sum();
    draft.total_due = draft.sub_total + draft.tax_amount - draft.discount_amount;
    draft.change_due = draft.amount_paid.saturating_excess_over(draft.total_due);

    draft
}

/// Attaches (or clears) the customer and recomputes.
pub fn select_customer(mut draft: SalesDraft, customer: Option<Contact>) -> SalesDraft {
    let customer_id = customer.as_ref().map(|c| c.id.clone());
    draft.customer = customer;
    recompute(draft, customer_id.as_deref())
}

pub fn set_payment_method(mut draft: SalesDraft, method: Option<PaymentMethod>) -> SalesDraft {
    draft.payment_method = method;
    draft
}

/// Records the cash handed over and the change owed.
pub fn tender(mut draft: SalesDraft, amount: Money) -> SalesDraft {
    draft.amount_paid = amount;
    draft.change_due = amount.saturating_excess_over(draft.total_due);
    draft
}

/// Moves the draft to `next`, enforcing the status state machine.
pub fn with_status(mut draft: SalesDraft, next: SalesStatus) -> CoreResult<SalesDraft> {
    if !draft.sales_status.can_transition_to(next) {
        return Err(CoreError::InvalidStatusTransition {
            from: draft.sales_status,
            to: next,
        });
    }

    draft.sales_status = next;
    draft.is_cancelled = next == SalesStatus::Cancelled;
    Ok(draft)
}

/// Explains why a draft cannot be submitted.
///
/// Checked in order: lines, payment method, customer, amount paid.
pub fn validate_draft(
    draft: &SalesDraft,
    selected_customer: Option<&Contact>,
) -> Result<(), ValidationError> {
    if draft.selections.is_empty() {
        return Err(ValidationError::required("selections"));
    }

    if draft.payment_method.is_none() {
        return Err(ValidationError::required("payment_method"));
    }

    if selected_customer.is_none() {
        return Err(ValidationError::required("customer"));
    }

    if draft.amount_paid < draft.total_due {
        return Err(ValidationError::InsufficientPayment {
            due: draft.total_due,
            paid: draft.amount_paid,
        });
    }

    Ok(())
}

pub fn is_valid(draft: &SalesDraft, selected_customer: Option<&Contact>) -> bool {
    validate_draft(draft, selected_customer).is_ok()
}

/// Folds a settlement result back into the draft.
///
/// Takes the stored header id and status, stamps row ids and deducted
/// quantities onto the matching lines, and clears the delete staging list.
pub fn absorb(
    mut draft: SalesDraft,
    header: &SalesHeader,
    selections: &[PersistedSelection],
) -> SalesDraft {
    draft.id = Some(header.id.clone());
    draft.sales_status = header.sales_status;
    draft.is_cancelled = header.is_cancelled;

    for row in selections {
        if let Some(line) = draft.selections.get_mut(&row.item_id) {
            line.id = Some(row.id.clone());
            line.deducted_quantity = row.deducted_quantity;
        }
    }

    draft.to_delete.clear();
    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactType, ItemPriceLevel, PriceLevel};

    fn product(id: &str, cents: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            code: None,
            barcode: None,
            item_name: format!("Item {}", id),
            item_type_id: None,
            dealer_id: None,
            item_cost: Money::from_cents(1),
            item_quantity: stock,
            item_sold: 0,
            item_image_url: None,
            default_item_quantity: stock,
            price_levels: vec![ItemPriceLevel {
                id: format!("ipl-{}", id),
                item_id: id.to_string(),
                price_level_id: format!("pl-{}", id),
                price_level: PriceLevel {
                    id: format!("pl-{}", id),
                    level_name: "Level 1".to_string(),
                    price: Money::from_cents(cents),
                },
            }],
        }
    }

    fn customer() -> Contact {
        Contact {
            id: "cust-1".to_string(),
            contact_type: ContactType::Customer,
            first_name: "Ana".to_string(),
            middle_name: None,
            last_name: "Cruz".to_string(),
            email: None,
            phone: None,
            location_id: None,
            price_level: None,
            date_open: None,
            birthdate: None,
            profile_url: None,
            date_added: Utc::now(),
        }
    }

    fn ready_draft() -> SalesDraft {
        let draft = add_line(reset_draft(), &product("a", 500, 10)).unwrap();
        let draft = select_customer(draft, Some(customer()));
        let draft = set_payment_method(draft, Some(PaymentMethod::Cash));
        tender(draft, Money::from_cents(500))
    }

    #[test]
    fn test_reset_draft_defaults() {
        let draft = reset_draft();

        assert_eq!(draft.id, None);
        assert_eq!(draft.sales_status, SalesStatus::InProgress);
        assert_eq!(draft.line_count, 0);
        assert!(draft.selections.is_empty());
        assert!(!draft.invoice_no.is_empty());
    }

    #[test]
    fn test_add_line_uses_base_price_and_quantity_one() {
        let draft = add_line(reset_draft(), &product("a", 250, 3)).unwrap();
        let line = &draft.selections["a"];

        assert_eq!(line.quantity, 1);
        assert_eq!(line.price, Money::from_cents(250));
        assert_eq!(line.cost, Money::from_cents(250));
        assert_eq!(line.price_level_id.as_deref(), Some("pl-a"));
        assert_eq!(line.product.item_quantity, 3);
        assert_eq!(draft.line_count, 1);
    }

    #[test]
    fn test_add_line_refuses_out_of_stock() {
        let err = add_line(reset_draft(), &product("a", 250, 0)).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExpiredStock { .. }));
    }

    #[test]
    fn test_add_line_refuses_duplicates() {
        let draft = add_line(reset_draft(), &product("a", 250, 3)).unwrap();
        let err = add_line(draft, &product("a", 250, 3)).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateLine(id) if id == "a"));
    }

    #[test]
    fn test_add_line_without_price_level() {
        let mut p = product("a", 250, 3);
        p.price_levels.clear();

        let err = add_line(reset_draft(), &p).unwrap_err();
        assert!(matches!(err, CoreError::NoPriceLevel { .. }));
    }

    #[test]
    fn test_add_then_remove_restores_count_and_never_reuses_index() {
        let draft = add_line(reset_draft(), &product("a", 100, 5)).unwrap();
        let before = draft.line_count;

        let draft = add_line(draft, &product("b", 100, 5)).unwrap();
        let removed_index = draft.selections["b"].item_index;
        let draft = remove_line(draft, "b").unwrap();
        assert_eq!(draft.line_count, before);

        let draft = add_line(draft, &product("c", 100, 5)).unwrap();
        let indices: Vec<usize> = draft.lines().iter().map(|l| l.item_index).collect();

        assert!(!indices.contains(&removed_index));
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(draft.line_count, draft.selections.len());
    }

    #[test]
    fn test_remove_missing_line() {
        let err = remove_line(reset_draft(), "nope").unwrap_err();
        assert!(matches!(err, CoreError::LineNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_remove_unsaved_line_stages_nothing() {
        let draft = add_line(reset_draft(), &product("a", 100, 5)).unwrap();
        let draft = remove_line(draft, "a").unwrap();
        assert!(draft.to_delete.is_empty());
    }

    #[test]
    fn test_remove_persisted_line_stages_delete() {
        let mut draft = add_line(reset_draft(), &product("a", 100, 5)).unwrap();
        draft.id = Some("sale-1".to_string());
        let line = draft.selections.get_mut("a").unwrap();
        line.id = Some("sel-1".to_string());
        line.deducted_quantity = 1;

        let draft = remove_line(draft, "a").unwrap();

        assert_eq!(draft.to_delete.len(), 1);
        assert_eq!(draft.to_delete[0].id, "sel-1");
        assert_eq!(draft.to_delete[0].sales_id, "sale-1");
        assert_eq!(draft.to_delete[0].deducted_quantity, 1);
    }

    #[test]
    fn test_remove_stored_line_without_sale_id_is_rejected() {
        let mut draft = add_line(reset_draft(), &product("a", 100, 5)).unwrap();
        draft.selections.get_mut("a").unwrap().id = Some("sel-1".to_string());

        let err = remove_line(draft, "a").unwrap_err();

        assert!(matches!(err, CoreError::DetachedLine { selection_id } if selection_id == "sel-1"));
    }

    #[test]
    fn test_recompute_total_identity() {
        let mut draft = add_line(reset_draft(), &product("a", 199, 5)).unwrap();
        draft = add_line(draft, &product("b", 301, 5)).unwrap();
        draft.tax_amount = Money::from_cents(77);
        draft.discount_amount = Money::from_cents(12);

        let draft = recompute(draft, None);

        assert_eq!(
            draft.total_due,
            draft.sub_total + draft.tax_amount - draft.discount_amount
        );
        assert_eq!(draft.sub_total, Money::from_cents(500));
    }

    #[test]
    fn test_recompute_multiplies_price_by_quantity_not_unit_price_only() {
        let draft = add_line(reset_draft(), &product("a", 250, 10)).unwrap();
        let draft = set_line_quantity(draft, "a", 3).unwrap();
        let draft = recompute(draft, Some("cust-1"));

        assert_eq!(draft.sub_total, Money::from_cents(750));
        assert_eq!(draft.total_due, Money::from_cents(750));
        assert_eq!(draft.customer_id.as_deref(), Some("cust-1"));
    }

    #[test]
    fn test_set_line_quantity_bounds() {
        let draft = add_line(reset_draft(), &product("a", 250, 10)).unwrap();

        assert!(set_line_quantity(draft.clone(), "a", 0).is_err());
        assert!(set_line_quantity(draft.clone(), "a", 1000).is_err());
        assert!(set_line_quantity(draft, "a", 999).is_ok());
    }

    #[test]
    fn test_tender_floors_change_at_zero() {
        let draft = recompute(add_line(reset_draft(), &product("a", 1500, 2)).unwrap(), None);

        let paid_more = tender(draft.clone(), Money::from_cents(2000));
        assert_eq!(paid_more.change_due, Money::from_cents(500));

        let paid_less = tender(draft, Money::from_cents(1000));
        assert_eq!(paid_less.change_due, Money::zero());
    }

    #[test]
    fn test_is_valid_requires_lines_regardless_of_other_fields() {
        let mut draft = ready_draft();
        draft.selections.clear();
        draft.amount_paid = Money::from_cents(1_000_000);

        assert!(!is_valid(&draft, Some(&customer())));
    }

    #[test]
    fn test_is_valid_full_draft() {
        let draft = ready_draft();
        assert!(is_valid(&draft, draft.customer.as_ref()));
    }

    #[test]
    fn test_validate_draft_reasons() {
        let draft = ready_draft();

        let no_customer = validate_draft(&draft, None).unwrap_err();
        assert!(matches!(no_customer, ValidationError::Required { field } if field == "customer"));

        let no_method = set_payment_method(draft.clone(), None);
        assert!(validate_draft(&no_method, Some(&customer())).is_err());

        let short = tender(draft, Money::from_cents(499));
        let err = validate_draft(&short, Some(&customer())).unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientPayment { .. }));
    }

    #[test]
    fn test_paid_draft_is_not_editable() {
        let draft = with_status(ready_draft(), SalesStatus::Paid).unwrap();
        let err = add_line(draft, &product("b", 100, 5)).unwrap_err();
        assert!(matches!(err, CoreError::DraftNotEditable { status: SalesStatus::Paid }));
    }

    #[test]
    fn test_with_status_rejects_illegal_move() {
        let err = with_status(reset_draft(), SalesStatus::Refunded).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));

        let cancelled = with_status(reset_draft(), SalesStatus::Cancelled).unwrap();
        assert!(cancelled.is_cancelled);
    }

    #[test]
    fn test_to_header_strips_ui_fields() {
        let draft = ready_draft();
        let header = draft.to_header();

        assert_eq!(header.invoice_no, draft.invoice_no);
        assert_eq!(header.customer_id.as_deref(), Some("cust-1"));
        assert_eq!(header.total_due, draft.total_due);
        assert!(!header.id.is_empty());
    }

    #[test]
    fn test_absorb_and_reload_round_trip() {
        let draft = ready_draft();
        let header = draft.to_header();
        let rows: Vec<PersistedSelection> = draft
            .lines()
            .iter()
            .map(|line| {
                let mut row = line.to_persisted(&header.id);
                row.deducted_quantity = row.quantity;
                row
            })
            .collect();

        let absorbed = absorb(draft, &header, &rows);
        assert_eq!(absorbed.id.as_deref(), Some(header.id.as_str()));
        assert_eq!(absorbed.selections["a"].deducted_quantity, 1);
        assert!(absorbed.selections["a"].id.is_some());

        let lines = rows
            .into_iter()
            .map(|row| (row, product("a", 500, 9)))
            .collect();
        let reloaded = SalesDraft::from_persisted(header.clone(), lines, None);

        assert_eq!(reloaded.id, Some(header.id));
        assert_eq!(reloaded.line_count, 1);
        assert_eq!(reloaded.next_item_index, 1);
        assert_eq!(reloaded.selections["a"].deducted_quantity, 1);
    }
}
