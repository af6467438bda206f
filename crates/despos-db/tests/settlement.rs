//! Settlement against a real (in-memory) database.

use despos_core::cart::{
    absorb, add_line, recompute, remove_line, reset_draft, set_line_quantity,
    set_payment_method, tender, with_status,
};
use despos_core::{
    ItemPriceLevel, Money, PaymentMethod, PriceLevel, Product, SalesDraft, SalesStatus,
};
use despos_db::{Database, DbConfig, SettlementError, SettlementMode, WriteKind};

// =============================================================================
// Helpers
// =============================================================================

fn product(id: &str, price_cents: i64, quantity: i64, sold: i64) -> Product {
    Product {
        id: id.to_string(),
        code: Some(format!("C-{}", id)),
        barcode: None,
        item_name: format!("Item {}", id),
        item_type_id: None,
        dealer_id: None,
        item_cost: Money::from_cents(price_cents / 2),
        item_quantity: quantity,
        item_sold: sold,
        item_image_url: None,
        default_item_quantity: 0,
        price_levels: vec![ItemPriceLevel {
            id: format!("ipl-{}", id),
            item_id: id.to_string(),
            price_level_id: format!("lvl-{}", id),
            price_level: PriceLevel {
                id: format!("lvl-{}", id),
                level_name: "Level 1".to_string(),
                price: Money::from_cents(price_cents),
            },
        }],
    }
}

async fn db_with(mode: SettlementMode, products: &[Product]) -> Database {
    let db = Database::new(DbConfig::in_memory().settlement_mode(mode))
        .await
        .unwrap();
    for p in products {
        db.products().save(p).await.unwrap();
    }
    db
}

async fn stored(db: &Database, id: &str) -> Product {
    db.products().get_by_id(id).await.unwrap().unwrap()
}

/// Stock on hand plus everything stored lines hold must add back up to the
/// starting stock, and sold must grow by exactly what they hold.
async fn assert_ledger(db: &Database, start: &Product) {
    let after = stored(db, &start.id).await;
    let held = db.selections().deducted_for_item(&start.id).await.unwrap();

    assert_eq!(after.item_quantity, start.item_quantity - held, "stock of {}", start.id);
    assert_eq!(after.item_sold, start.item_sold + held, "sold of {}", start.id);
}

/// Rings up `lines` (product, quantity) on a fresh draft and pays in full.
fn paid_draft(lines: &[(&Product, i64)]) -> SalesDraft {
    let mut draft = reset_draft();
    for (p, qty) in lines {
        draft = add_line(draft, p).unwrap();
        draft = set_line_quantity(draft, &p.id, *qty).unwrap();
    }
    let draft = recompute(draft, None);
    let total = draft.total_due;
    let draft = set_payment_method(draft, Some(PaymentMethod::Cash));
    let draft = tender(draft, total);
    with_status(draft, SalesStatus::Paid).unwrap()
}

// =============================================================================
// Atomic
// =============================================================================

#[tokio::test]
async fn test_paid_sale_deducts_stock_and_counts_sold() {
    let p = product("p-1", 2500, 10, 5);
    let db = db_with(SettlementMode::Atomic, &[p.clone()]).await;

    let outcome = db.settlement().settle(&paid_draft(&[(&p, 3)])).await.unwrap();

    let after = stored(&db, "p-1").await;
    assert_eq!(after.item_quantity, 7);
    assert_eq!(after.item_sold, 8);

    assert_eq!(outcome.header.sales_status, SalesStatus::Paid);
    assert_eq!(outcome.header.total_due, Money::from_cents(7500));
    assert_eq!(outcome.selections.len(), 1);
    assert_eq!(outcome.selections[0].deducted_quantity, 3);

    let rows = db.selections().list_for_sale(&outcome.header.id).await.unwrap();
    assert_eq!(rows, outcome.selections);
}

#[tokio::test]
async fn test_resettling_absorbed_draft_is_idempotent() {
    let p = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[p.clone()]).await;
    let settlement = db.settlement();

    let draft = paid_draft(&[(&p, 4)]);
    let outcome = settlement.settle(&draft).await.unwrap();
    let draft = absorb(draft, &outcome.header, &outcome.selections);

    let again = settlement.settle(&draft).await.unwrap();

    let after = stored(&db, "p-1").await;
    assert_eq!(after.item_quantity, 6);
    assert_eq!(after.item_sold, 4);
    assert_eq!(again.header.id, outcome.header.id);
    assert_eq!(again.selections[0].id, outcome.selections[0].id);
    assert_eq!(db.sales().count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_refund_gives_units_back() {
    let p = product("p-1", 1000, 10, 5);
    let db = db_with(SettlementMode::Atomic, &[p.clone()]).await;
    let settlement = db.settlement();

    let draft = paid_draft(&[(&p, 3)]);
    let outcome = settlement.settle(&draft).await.unwrap();

    let draft = settlement.open(&outcome.header.id).await.unwrap();
    let draft = with_status(draft, SalesStatus::Refunded).unwrap();
    let refunded = settlement.settle(&draft).await.unwrap();

    let after = stored(&db, "p-1").await;
    assert_eq!(after.item_quantity, 10);
    assert_eq!(after.item_sold, 5);
    assert_eq!(refunded.header.sales_status, SalesStatus::Refunded);
    assert_eq!(refunded.selections[0].deducted_quantity, 0);
}

#[tokio::test]
async fn test_pending_sale_leaves_stock_alone_until_paid() {
    let p = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[p.clone()]).await;
    let settlement = db.settlement();

    let draft = add_line(reset_draft(), &p).unwrap();
    let draft = set_line_quantity(draft, "p-1", 2).unwrap();
    let draft = with_status(recompute(draft, None), SalesStatus::Pending).unwrap();
    let outcome = settlement.settle(&draft).await.unwrap();

    assert_eq!(stored(&db, "p-1").await.item_quantity, 10);

    let draft = absorb(draft, &outcome.header, &outcome.selections);
    let draft = with_status(draft, SalesStatus::Paid).unwrap();
    settlement.settle(&draft).await.unwrap();

    let after = stored(&db, "p-1").await;
    assert_eq!(after.item_quantity, 8);
    assert_eq!(after.item_sold, 2);
}

#[tokio::test]
async fn test_removed_line_row_is_deleted_and_survivor_kept() {
    let a = product("p-a", 1000, 10, 0);
    let b = product("p-b", 500, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[a.clone(), b.clone()]).await;
    let settlement = db.settlement();

    let draft = add_line(reset_draft(), &a).unwrap();
    let draft = add_line(draft, &b).unwrap();
    let draft = with_status(recompute(draft, None), SalesStatus::Pending).unwrap();
    let first = settlement.settle(&draft).await.unwrap();

    let draft = settlement.open(&first.header.id).await.unwrap();
    let draft = remove_line(draft, "p-a").unwrap();
    assert_eq!(draft.to_delete.len(), 1);
    let draft = with_status(recompute(draft, None), SalesStatus::Paid).unwrap();
    let second = settlement.settle(&draft).await.unwrap();

    let rows = db.selections().list_for_sale(&first.header.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].item_id, "p-b");
    assert_eq!(second.deleted.len(), 1);
    assert_eq!(stored(&db, "p-a").await.item_quantity, 10);
    assert_eq!(stored(&db, "p-b").await.item_quantity, 9);
}

#[tokio::test]
async fn test_delete_and_reringing_same_product_applies_in_order() {
    // Stored: stock 8, sold 2, one paid line holding 2 units
    let p = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[p.clone()]).await;
    let settlement = db.settlement();
    let first = settlement.settle(&paid_draft(&[(&p, 2)])).await.unwrap();
    assert_eq!(stored(&db, "p-1").await.item_quantity, 8);

    // Reopen for correction: remove the line and ring it up again at 5
    let mut draft = settlement.open(&first.header.id).await.unwrap();
    draft.sales_status = SalesStatus::Pending;
    let draft = remove_line(draft, "p-1").unwrap();
    let fresh = stored(&db, "p-1").await;
    let draft = add_line(draft, &fresh).unwrap();
    let draft = set_line_quantity(draft, "p-1", 5).unwrap();
    let draft = with_status(recompute(draft, None), SalesStatus::Paid).unwrap();

    let second = settlement.settle(&draft).await.unwrap();

    // 8 + 2 = 10 restored, then 5 deducted
    let after = stored(&db, "p-1").await;
    assert_eq!(after.item_quantity, 5);
    assert_eq!(after.item_sold, 5);
    assert_eq!(second.deleted, vec![first.selections[0].id.clone()]);
    let rows = db.selections().list_for_sale(&first.header.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].deducted_quantity, 5);
}

#[tokio::test]
async fn test_atomic_failure_rolls_back_everything() {
    let real = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[real.clone()]).await;
    // Never saved, so its selection row violates the item foreign key
    let ghost = product("p-ghost", 1000, 10, 0);

    let draft = paid_draft(&[(&real, 1), (&ghost, 1)]);
    let err = db.settlement().settle(&draft).await.unwrap_err();

    assert!(matches!(err, SettlementError::Persistence(_)));
    assert_eq!(db.sales().count(None).await.unwrap(), 0);
    assert_eq!(stored(&db, "p-1").await.item_quantity, 10);
}

// =============================================================================
// Replays
// =============================================================================

#[tokio::test]
async fn test_replaying_a_stale_refund_gives_units_back_once() {
    let p = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[p.clone()]).await;
    let settlement = db.settlement();
    let sale = settlement.settle(&paid_draft(&[(&p, 2)])).await.unwrap();

    let first = settlement.open(&sale.header.id).await.unwrap();
    let second = settlement.open(&sale.header.id).await.unwrap();

    settlement
        .settle(&with_status(first, SalesStatus::Refunded).unwrap())
        .await
        .unwrap();
    let replay = settlement
        .settle(&with_status(second, SalesStatus::Refunded).unwrap())
        .await
        .unwrap();

    let after = stored(&db, "p-1").await;
    assert_eq!(after.item_quantity, 10);
    assert_eq!(after.item_sold, 0);
    assert!(replay.product_updates.is_empty());
    assert_eq!(replay.selections[0].deducted_quantity, 0);
    assert_ledger(&db, &p).await;
}

#[tokio::test]
async fn test_settling_an_unabsorbed_draft_twice_deducts_once() {
    let p = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[p.clone()]).await;
    let settlement = db.settlement();
    let draft = paid_draft(&[(&p, 3)]);

    let first = settlement.settle(&draft).await.unwrap();
    let second = settlement.settle(&draft).await.unwrap();

    assert_eq!(second.header.id, first.header.id);
    assert_eq!(second.selections[0].id, first.selections[0].id);
    let rows = db.selections().list_for_sale(&first.header.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(stored(&db, "p-1").await.item_quantity, 7);
    assert_ledger(&db, &p).await;
}

#[tokio::test]
async fn test_replaying_a_stale_line_removal_restores_once() {
    let a = product("p-a", 1000, 10, 0);
    let b = product("p-b", 500, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[a.clone(), b.clone()]).await;
    let settlement = db.settlement();
    let sale = settlement.settle(&paid_draft(&[(&a, 2), (&b, 1)])).await.unwrap();

    let edit = |mut draft: SalesDraft| {
        draft.sales_status = SalesStatus::Pending;
        let draft = remove_line(draft, "p-a").unwrap();
        with_status(recompute(draft, None), SalesStatus::Paid).unwrap()
    };
    let first = edit(settlement.open(&sale.header.id).await.unwrap());
    let second = edit(settlement.open(&sale.header.id).await.unwrap());

    settlement.settle(&first).await.unwrap();
    let replay = settlement.settle(&second).await.unwrap();

    assert!(replay.deleted.is_empty());
    assert_eq!(stored(&db, "p-a").await.item_quantity, 10);
    assert_eq!(stored(&db, "p-b").await.item_quantity, 9);
    assert_ledger(&db, &a).await;
    assert_ledger(&db, &b).await;
}

// =============================================================================
// Best effort
// =============================================================================

#[tokio::test]
async fn test_best_effort_settles_like_atomic_when_nothing_fails() {
    let p = product("p-1", 2500, 10, 5);
    let db = db_with(SettlementMode::BestEffort, &[p.clone()]).await;
    assert_eq!(db.settlement().mode(), SettlementMode::BestEffort);

    let outcome = db.settlement().settle(&paid_draft(&[(&p, 3)])).await.unwrap();

    let after = stored(&db, "p-1").await;
    assert_eq!(after.item_quantity, 7);
    assert_eq!(after.item_sold, 8);
    assert_eq!(outcome.selections[0].deducted_quantity, 3);
}

#[tokio::test]
async fn test_best_effort_reports_failed_writes() {
    let real = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::BestEffort, &[real.clone()]).await;
    let ghost = product("p-ghost", 1000, 10, 0);

    let draft = paid_draft(&[(&real, 2), (&ghost, 1)]);
    let err = db.settlement().settle(&draft).await.unwrap_err();

    let partial = match err {
        SettlementError::Partial(partial) => partial,
        other => panic!("expected partial settlement, got {other:?}"),
    };

    // header + the real line's writes went through
    assert_eq!(partial.failures.len(), 1);
    assert_eq!(partial.failures[0].kind, WriteKind::SelectionUpsert);
    assert_eq!(partial.selections.len(), 1);
    assert_eq!(partial.selections[0].item_id, "p-1");
    assert_eq!(partial.attempted, 3);

    assert!(db.sales().get_by_id(&partial.header.id).await.unwrap().is_some());
    assert_eq!(stored(&db, "p-1").await.item_quantity, 8);
}

#[tokio::test]
async fn test_best_effort_retry_after_partial_only_writes_what_was_missing() {
    let real = product("p-1", 1000, 10, 0);
    let db = db_with(SettlementMode::BestEffort, &[real.clone()]).await;
    let late = product("p-late", 1000, 10, 0);
    let settlement = db.settlement();

    let draft = paid_draft(&[(&real, 2), (&late, 1)]);
    let err = settlement.settle(&draft).await.unwrap_err();
    assert!(matches!(err, SettlementError::Partial(_)));

    // The missing product shows up; the untouched draft is settled again.
    db.products().save(&late).await.unwrap();
    let outcome = settlement.settle(&draft).await.unwrap();

    let rows = db.selections().list_for_sale(&outcome.header.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(db.sales().count(None).await.unwrap(), 1);
    assert_eq!(stored(&db, "p-1").await.item_quantity, 8);
    assert_eq!(stored(&db, "p-late").await.item_quantity, 9);
    assert_ledger(&db, &real).await;
    assert_ledger(&db, &late).await;
}

#[tokio::test]
async fn test_best_effort_failed_group_leaves_counters_untouched() {
    let a = product("p-a", 1000, 10, 0);
    let db = db_with(SettlementMode::BestEffort, &[a.clone()]).await;
    let settlement = db.settlement();
    let sale = settlement.settle(&paid_draft(&[(&a, 2)])).await.unwrap();

    // A refund whose line points at a price level that does not exist: the
    // restore and the row update must fail together.
    let mut draft = settlement.open(&sale.header.id).await.unwrap();
    draft.selections.get_mut("p-a").unwrap().price_level_id = Some("no-such-level".to_string());
    let draft = with_status(draft, SalesStatus::Refunded).unwrap();

    let err = settlement.settle(&draft).await.unwrap_err();

    let partial = match err {
        SettlementError::Partial(partial) => partial,
        other => panic!("expected partial settlement, got {other:?}"),
    };
    let kinds: Vec<_> = partial.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![WriteKind::InventoryUpdate, WriteKind::SelectionUpsert]);
    assert_eq!(stored(&db, "p-a").await.item_quantity, 8);
    assert_ledger(&db, &a).await;
}

// =============================================================================
// Reopening
// =============================================================================

#[tokio::test]
async fn test_open_rebuilds_the_settled_draft() {
    let a = product("p-a", 1000, 10, 0);
    let b = product("p-b", 250, 10, 0);
    let db = db_with(SettlementMode::Atomic, &[a.clone(), b.clone()]).await;
    let settlement = db.settlement();

    let draft = paid_draft(&[(&a, 1), (&b, 4)]);
    let outcome = settlement.settle(&draft).await.unwrap();
    let absorbed = absorb(draft, &outcome.header, &outcome.selections);

    let reopened = settlement.open(&outcome.header.id).await.unwrap();

    assert_eq!(reopened.id, absorbed.id);
    assert_eq!(reopened.invoice_no, absorbed.invoice_no);
    assert_eq!(reopened.sub_total, absorbed.sub_total);
    assert_eq!(reopened.sales_status, SalesStatus::Paid);
    let order: Vec<_> = reopened.lines().iter().map(|l| l.item_id.clone()).collect();
    assert_eq!(order, vec!["p-a".to_string(), "p-b".to_string()]);
    assert_eq!(reopened.selections["p-b"].deducted_quantity, 4);
    assert_eq!(reopened.line_count, 2);
}

#[tokio::test]
async fn test_open_unknown_sale_is_not_found() {
    let db = db_with(SettlementMode::Atomic, &[]).await;

    let err = db.settlement().open("missing").await.unwrap_err();

    assert!(err.to_string().contains("missing"));
}
