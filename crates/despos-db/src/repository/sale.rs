//! # Sale Repository
//!
//! Database operations for sales headers.
//!
//! ## Header Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  upsert(header)                                                         │
//! │    ├── id already stored          → update that row                     │
//! │    ├── invoice_no already stored  → update that row, keep ITS id        │
//! │    └── neither                    → insert                              │
//! │  RETURNING gives back the stored row, so callers always learn the       │
//! │  authoritative id and status.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The second rule makes a retried settlement of a never-absorbed draft land
//! on the row the first attempt created instead of failing on the UNIQUE
//! invoice number.

use despos_core::{Page, PageFormula, PersistedSelection, SalesHeader, SalesStatus};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::limit_offset;
use crate::repository::selection::selections_for_sale;

const SALES_COLUMNS: &str = "id, customer_id, invoice_type_id, sales_date, sales_status, \
     is_cancelled, discount_amount, tax_amount, sub_total, total_due, amount_paid, change_due, \
     invoice_no, payment_method";

// =============================================================================
// Executor-generic statements
// =============================================================================

pub(crate) async fn upsert_header<'c, E>(exec: E, header: &SalesHeader) -> DbResult<SalesHeader>
where
    E: SqliteExecutor<'c>,
{
    let sql = format!(
        r#"
        INSERT INTO sales ({SALES_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(id) DO UPDATE SET
            customer_id = excluded.customer_id,
            invoice_type_id = excluded.invoice_type_id,
            sales_date = excluded.sales_date,
            sales_status = excluded.sales_status,
            is_cancelled = excluded.is_cancelled,
            discount_amount = excluded.discount_amount,
            tax_amount = excluded.tax_amount,
            sub_total = excluded.sub_total,
            total_due = excluded.total_due,
            amount_paid = excluded.amount_paid,
            change_due = excluded.change_due,
            invoice_no = excluded.invoice_no,
            payment_method = excluded.payment_method
        ON CONFLICT(invoice_no) DO UPDATE SET
            customer_id = excluded.customer_id,
            invoice_type_id = excluded.invoice_type_id,
            sales_date = excluded.sales_date,
            sales_status = excluded.sales_status,
            is_cancelled = excluded.is_cancelled,
            discount_amount = excluded.discount_amount,
            tax_amount = excluded.tax_amount,
            sub_total = excluded.sub_total,
            total_due = excluded.total_due,
            amount_paid = excluded.amount_paid,
            change_due = excluded.change_due,
            payment_method = excluded.payment_method
        RETURNING {SALES_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, SalesHeader>(&sql)
        .bind(&header.id)
        .bind(&header.customer_id)
        .bind(&header.invoice_type_id)
        .bind(header.sales_date)
        .bind(header.sales_status)
        .bind(header.is_cancelled)
        .bind(header.discount_amount)
        .bind(header.tax_amount)
        .bind(header.sub_total)
        .bind(header.total_due)
        .bind(header.amount_paid)
        .bind(header.change_due)
        .bind(&header.invoice_no)
        .bind(header.payment_method)
        .fetch_one(exec)
        .await?;

    Ok(row)
}

pub(crate) async fn fetch_header<'c, E>(exec: E, id: &str) -> DbResult<Option<SalesHeader>>
where
    E: SqliteExecutor<'c>,
{
    let sql = format!("SELECT {SALES_COLUMNS} FROM sales WHERE id = ?1");

    let row = sqlx::query_as::<_, SalesHeader>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(row)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sales headers.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    formula: PageFormula,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool, formula: PageFormula) -> Self {
        SaleRepository { pool, formula }
    }

    /// Lists sales, newest first, optionally in one status.
    pub async fn list(
        &self,
        status: Option<SalesStatus>,
        page: Option<Page>,
    ) -> DbResult<Vec<SalesHeader>> {
        let (limit, offset) = limit_offset(self.formula, page);

        let sql = format!(
            r#"
            SELECT {SALES_COLUMNS}
            FROM sales
            WHERE (?1 IS NULL OR sales_status = ?1)
            ORDER BY sales_date DESC, invoice_no
            LIMIT ?2 OFFSET ?3
            "#
        );

        let rows = sqlx::query_as::<_, SalesHeader>(&sql)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesHeader>> {
        fetch_header(&self.pool, id).await
    }

    pub async fn get_by_invoice_no(&self, invoice_no: &str) -> DbResult<Option<SalesHeader>> {
        let sql = format!("SELECT {SALES_COLUMNS} FROM sales WHERE invoice_no = ?1");

        let row = sqlx::query_as::<_, SalesHeader>(&sql)
            .bind(invoice_no)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Header plus its selections in ring-up order.
    pub async fn get_with_selections(
        &self,
        id: &str,
    ) -> DbResult<Option<(SalesHeader, Vec<PersistedSelection>)>> {
        let header = match fetch_header(&self.pool, id).await? {
            Some(header) => header,
            None => return Ok(None),
        };

        let selections = selections_for_sale(&self.pool, &header.id).await?;
        Ok(Some((header, selections)))
    }

    /// Writes a header without touching selections or inventory.
    pub async fn upsert(&self, header: &SalesHeader) -> DbResult<SalesHeader> {
        debug!(id = %header.id, invoice_no = %header.invoice_no, "Upserting sale");
        upsert_header(&self.pool, header).await
    }

    /// Deletes a sale and its selections.
    ///
    /// Inventory is not restored; refund or return a paid sale first.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    pub async fn count(&self, status: Option<SalesStatus>) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE (?1 IS NULL OR sales_status = ?1)")
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{TimeZone, Utc};
    use despos_core::{Money, PaymentMethod};

    fn header(id: &str, invoice_no: &str, status: SalesStatus) -> SalesHeader {
        SalesHeader {
            id: id.to_string(),
            customer_id: None,
            invoice_type_id: None,
            sales_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            sales_status: status,
            is_cancelled: false,
            discount_amount: Money::zero(),
            tax_amount: Money::zero(),
            sub_total: Money::from_cents(1500),
            total_due: Money::from_cents(1500),
            amount_paid: Money::from_cents(2000),
            change_due: Money::from_cents(500),
            invoice_no: invoice_no.to_string(),
            payment_method: Some(PaymentMethod::Cash),
        }
    }

    #[tokio::test]
    async fn test_upsert_round_trips_every_column() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let h = header("s-1", "1001", SalesStatus::Paid);

        let stored = db.sales().upsert(&h).await.unwrap();

        assert_eq!(stored, h);
    }

    #[tokio::test]
    async fn test_same_invoice_keeps_stored_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sales();

        repo.upsert(&header("s-1", "1001", SalesStatus::Pending))
            .await
            .unwrap();
        let stored = repo
            .upsert(&header("s-other", "1001", SalesStatus::Paid))
            .await
            .unwrap();

        assert_eq!(stored.id, "s-1");
        assert_eq!(stored.sales_status, SalesStatus::Paid);
        assert_eq!(repo.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_filter_by_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sales();

        repo.upsert(&header("s-1", "1001", SalesStatus::Paid)).await.unwrap();
        repo.upsert(&header("s-2", "1002", SalesStatus::Pending)).await.unwrap();
        repo.upsert(&header("s-3", "1003", SalesStatus::Paid)).await.unwrap();

        assert_eq!(repo.count(Some(SalesStatus::Paid)).await.unwrap(), 2);
        let pending = repo.list(Some(SalesStatus::Pending), None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "s-2");
        assert!(repo.get_by_invoice_no("1003").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_cascades_selections() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.sales()
            .upsert(&header("s-1", "1001", SalesStatus::Pending))
            .await
            .unwrap();
        sqlx::query("INSERT INTO items (id, item_name) VALUES ('p-1', 'Soap')")
            .execute(db.pool())
            .await
            .unwrap();
        db.selections()
            .upsert(&PersistedSelection {
                id: "sel-1".to_string(),
                sales_id: "s-1".to_string(),
                item_id: "p-1".to_string(),
                price_level_id: None,
                quantity: 2,
                cost: Money::from_cents(100),
                price: Money::from_cents(100),
                deducted_quantity: 0,
            })
            .await
            .unwrap();

        let (_, lines) = db.sales().get_with_selections("s-1").await.unwrap().unwrap();
        assert_eq!(lines.len(), 1);

        db.sales().delete("s-1").await.unwrap();

        assert!(db.selections().get_by_id("sel-1").await.unwrap().is_none());
        assert!(db.sales().get_with_selections("s-1").await.unwrap().is_none());
    }
}
