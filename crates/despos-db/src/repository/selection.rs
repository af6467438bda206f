//! # Selection Repository
//!
//! Line items of stored sales.

use despos_core::PersistedSelection;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const SELECTION_COLUMNS: &str =
    "id, sales_id, item_id, price_level_id, quantity, cost, price, deducted_quantity";

// =============================================================================
// Executor-generic statements
// =============================================================================

/// Inserts or updates a selection by its id.
pub(crate) async fn upsert_selection<'c, E>(
    exec: E,
    selection: &PersistedSelection,
) -> DbResult<PersistedSelection>
where
    E: SqliteExecutor<'c>,
{
    let sql = format!(
        r#"
        INSERT INTO selections ({SELECTION_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO UPDATE SET
            sales_id = excluded.sales_id,
            item_id = excluded.item_id,
            price_level_id = excluded.price_level_id,
            quantity = excluded.quantity,
            cost = excluded.cost,
            price = excluded.price,
            deducted_quantity = excluded.deducted_quantity
        RETURNING {SELECTION_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, PersistedSelection>(&sql)
        .bind(&selection.id)
        .bind(&selection.sales_id)
        .bind(&selection.item_id)
        .bind(&selection.price_level_id)
        .bind(selection.quantity)
        .bind(selection.cost)
        .bind(selection.price)
        .bind(selection.deducted_quantity)
        .fetch_one(exec)
        .await?;

    Ok(row)
}

/// Deletes a selection row. A row that is already gone is not an error.
pub(crate) async fn delete_selection<'c, E>(exec: E, id: &str) -> DbResult<()>
where
    E: SqliteExecutor<'c>,
{
    sqlx::query("DELETE FROM selections WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(())
}

pub(crate) async fn selections_for_sale<'c, E>(
    exec: E,
    sales_id: &str,
) -> DbResult<Vec<PersistedSelection>>
where
    E: SqliteExecutor<'c>,
{
    // rowid keeps insertion order, which is the order lines were rung up
    let sql = format!(
        "SELECT {SELECTION_COLUMNS} FROM selections WHERE sales_id = ?1 ORDER BY rowid"
    );

    let rows = sqlx::query_as::<_, PersistedSelection>(&sql)
        .bind(sales_id)
        .fetch_all(exec)
        .await?;

    Ok(rows)
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct SelectionRepository {
    pool: SqlitePool,
}

impl SelectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SelectionRepository { pool }
    }

    pub async fn list_for_sale(&self, sales_id: &str) -> DbResult<Vec<PersistedSelection>> {
        selections_for_sale(&self.pool, sales_id).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PersistedSelection>> {
        let sql = format!("SELECT {SELECTION_COLUMNS} FROM selections WHERE id = ?1");

        let row = sqlx::query_as::<_, PersistedSelection>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    pub async fn upsert(&self, selection: &PersistedSelection) -> DbResult<PersistedSelection> {
        debug!(id = %selection.id, sales_id = %selection.sales_id, "Upserting selection");
        upsert_selection(&self.pool, selection).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting selection");

        if self.get_by_id(id).await?.is_none() {
            return Err(DbError::not_found("Selection", id));
        }

        delete_selection(&self.pool, id).await
    }

    /// Units of a product held by paid lines across all sales.
    pub async fn deducted_for_item(&self, item_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(deducted_quantity), 0) FROM selections WHERE item_id = ?1",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
