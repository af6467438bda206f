//! # Invoice Type Repository
//!
//! Kinds of invoice a sale can be issued under ("OR", "SI", ...).

use despos_core::{InvoiceType, Page, PageFormula};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::limit_offset;

#[derive(Debug, Clone)]
pub struct InvoiceTypeRepository {
    pool: SqlitePool,
    formula: PageFormula,
}

impl InvoiceTypeRepository {
    pub fn new(pool: SqlitePool, formula: PageFormula) -> Self {
        InvoiceTypeRepository { pool, formula }
    }

    pub async fn list(&self, page: Option<Page>) -> DbResult<Vec<InvoiceType>> {
        let (limit, offset) = limit_offset(self.formula, page);

        let rows = sqlx::query_as::<_, InvoiceType>(
            "SELECT id, code, invoice_name FROM invoice_types ORDER BY code LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InvoiceType>> {
        let row = sqlx::query_as::<_, InvoiceType>(
            "SELECT id, code, invoice_name FROM invoice_types WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<InvoiceType>> {
        let row = sqlx::query_as::<_, InvoiceType>(
            "SELECT id, code, invoice_name FROM invoice_types WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Inserts or updates by id.
    ///
    /// ## Errors
    /// `UniqueViolation` when another row already uses the code.
    pub async fn upsert(&self, invoice_type: &InvoiceType) -> DbResult<InvoiceType> {
        debug!(id = %invoice_type.id, code = %invoice_type.code, "Upserting invoice type");

        let row = sqlx::query_as::<_, InvoiceType>(
            r#"
            INSERT INTO invoice_types (id, code, invoice_name)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                invoice_name = excluded.invoice_name
            RETURNING id, code, invoice_name
            "#,
        )
        .bind(&invoice_type.id)
        .bind(&invoice_type.code)
        .bind(&invoice_type.invoice_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM invoice_types WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InvoiceType", id));
        }

        Ok(())
    }
}
