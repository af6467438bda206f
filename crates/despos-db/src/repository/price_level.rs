//! # Price Level Repository
//!
//! Pricing tiers and the `items_price_levels` rows that attach them to
//! products.

use despos_core::{ItemPriceLevel, Money, Page, PageFormula, PriceLevel};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::limit_offset;

/// Flat join row: `items_price_levels` joined with `price_levels`.
#[derive(Debug, FromRow)]
struct ItemPriceLevelRow {
    id: String,
    item_id: String,
    price_level_id: String,
    level_name: String,
    price: Money,
}

impl From<ItemPriceLevelRow> for ItemPriceLevel {
    fn from(row: ItemPriceLevelRow) -> Self {
        ItemPriceLevel {
            id: row.id,
            item_id: row.item_id,
            price_level_id: row.price_level_id.clone(),
            price_level: PriceLevel {
                id: row.price_level_id,
                level_name: row.level_name,
                price: row.price,
            },
        }
    }
}

// =============================================================================
// Executor-generic statements
// =============================================================================

pub(crate) async fn upsert_level<'c, E>(exec: E, level: &PriceLevel) -> DbResult<PriceLevel>
where
    E: SqliteExecutor<'c>,
{
    let row = sqlx::query_as::<_, PriceLevel>(
        r#"
        INSERT INTO price_levels (id, level_name, price)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET
            level_name = excluded.level_name,
            price = excluded.price
        RETURNING id, level_name, price
        "#,
    )
    .bind(&level.id)
    .bind(&level.level_name)
    .bind(level.price)
    .fetch_one(exec)
    .await?;

    Ok(row)
}

/// Attaches a level to an item. Re-linking the same pair keeps one row.
pub(crate) async fn link<'c, E>(exec: E, join_id: &str, item_id: &str, price_level_id: &str) -> DbResult<()>
where
    E: SqliteExecutor<'c>,
{
    sqlx::query(
        r#"
        INSERT INTO items_price_levels (id, item_id, price_level_id)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(item_id, price_level_id) DO NOTHING
        "#,
    )
    .bind(join_id)
    .bind(item_id)
    .bind(price_level_id)
    .execute(exec)
    .await?;

    Ok(())
}

pub(crate) async fn levels_for_item<'c, E>(exec: E, item_id: &str) -> DbResult<Vec<ItemPriceLevel>>
where
    E: SqliteExecutor<'c>,
{
    let rows = sqlx::query_as::<_, ItemPriceLevelRow>(
        r#"
        SELECT ipl.id, ipl.item_id, ipl.price_level_id, pl.level_name, pl.price
        FROM items_price_levels ipl
        INNER JOIN price_levels pl ON pl.id = ipl.price_level_id
        WHERE ipl.item_id = ?1
        ORDER BY pl.level_name
        "#,
    )
    .bind(item_id)
    .fetch_all(exec)
    .await?;

    Ok(rows.into_iter().map(ItemPriceLevel::from).collect())
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct PriceLevelRepository {
    pool: SqlitePool,
    formula: PageFormula,
}

impl PriceLevelRepository {
    pub fn new(pool: SqlitePool, formula: PageFormula) -> Self {
        PriceLevelRepository { pool, formula }
    }

    pub async fn list(&self, page: Option<Page>) -> DbResult<Vec<PriceLevel>> {
        let (limit, offset) = limit_offset(self.formula, page);

        let rows = sqlx::query_as::<_, PriceLevel>(
            "SELECT id, level_name, price FROM price_levels ORDER BY level_name LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PriceLevel>> {
        let row = sqlx::query_as::<_, PriceLevel>(
            "SELECT id, level_name, price FROM price_levels WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn upsert(&self, level: &PriceLevel) -> DbResult<PriceLevel> {
        debug!(id = %level.id, name = %level.level_name, "Upserting price level");
        upsert_level(&self.pool, level).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM price_levels WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PriceLevel", id));
        }

        Ok(())
    }

    /// Levels of one product, ordered by level name.
    pub async fn for_item(&self, item_id: &str) -> DbResult<Vec<ItemPriceLevel>> {
        levels_for_item(&self.pool, item_id).await
    }

    pub async fn link(&self, join_id: &str, item_id: &str, price_level_id: &str) -> DbResult<()> {
        debug!(item_id = %item_id, price_level_id = %price_level_id, "Linking price level");
        link(&self.pool, join_id, item_id, price_level_id).await
    }

    /// Removes one item↔level join row.
    pub async fn unlink(&self, join_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM items_price_levels WHERE id = ?1")
            .bind(join_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ItemPriceLevel", join_id));
        }

        Ok(())
    }
}
