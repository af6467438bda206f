//! # Product Repository
//!
//! Database operations for items and their price levels.
//!
//! ## Key Operations
//! - Lookups by id, barcode, id + name, and a name/code/barcode search
//! - Save: item row, then each price level, then each item↔level join
//! - Inventory counter updates from a settlement plan
//! - Delete, including the product picture
//!
//! ## Loaded Products
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SELECT ... FROM items            ─► Product { price_levels: [] }       │
//! │  levels_for_item(id)              ─► price_levels sorted by level_name  │
//! │  with_loaded_baseline()           ─► default_item_quantity = quantity   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use despos_core::{InventoryUpdate, Page, PageFormula, Product};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::limit_offset;
use crate::repository::price_level::{levels_for_item, link, upsert_level};
use crate::storage::ImageStore;

const ITEM_COLUMNS: &str = "id, code, barcode, item_name, item_type_id, dealer_id, \
     item_cost, item_quantity, item_sold, item_image_url";

// =============================================================================
// Executor-generic statements
// =============================================================================

/// Loads the item row alone (no price levels).
pub(crate) async fn fetch_item<'c, E>(exec: E, id: &str) -> DbResult<Option<Product>>
where
    E: SqliteExecutor<'c>,
{
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");

    let row = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(row.map(Product::with_loaded_baseline))
}

/// Writes new inventory counters.
///
/// ## Errors
/// `NotFound` when the product no longer exists.
pub(crate) async fn apply_inventory<'c, E>(exec: E, update: &InventoryUpdate) -> DbResult<()>
where
    E: SqliteExecutor<'c>,
{
    let result = sqlx::query(
        r#"
        UPDATE items
        SET item_quantity = ?2, item_sold = ?3
        WHERE id = ?1
        "#,
    )
    .bind(&update.item_id)
    .bind(update.item_quantity)
    .bind(update.item_sold)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", &update.item_id));
    }

    Ok(())
}

async fn upsert_item<'c, E>(exec: E, product: &Product) -> DbResult<()>
where
    E: SqliteExecutor<'c>,
{
    let sql = format!(
        r#"
        INSERT INTO items ({ITEM_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
            code = excluded.code,
            barcode = excluded.barcode,
            item_name = excluded.item_name,
            item_type_id = excluded.item_type_id,
            dealer_id = excluded.dealer_id,
            item_cost = excluded.item_cost,
            item_quantity = excluded.item_quantity,
            item_sold = excluded.item_sold,
            item_image_url = excluded.item_image_url
        "#
    );

    sqlx::query(&sql)
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.barcode)
        .bind(&product.item_name)
        .bind(&product.item_type_id)
        .bind(&product.dealer_id)
        .bind(product.item_cost)
        .bind(product.item_quantity)
        .bind(product.item_sold)
        .bind(&product.item_image_url)
        .execute(exec)
        .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_barcode("4800016644290").await?;
/// let page = repo.list(Some(Page::new(0, 20))).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    formula: PageFormula,
    images: ImageStore,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, formula: PageFormula, images: ImageStore) -> Self {
        ProductRepository {
            pool,
            formula,
            images,
        }
    }

    async fn with_levels(&self, mut product: Product) -> DbResult<Product> {
        product.price_levels = levels_for_item(&self.pool, &product.id).await?;
        Ok(product)
    }

    async fn with_levels_all(&self, rows: Vec<Product>) -> DbResult<Vec<Product>> {
        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            products.push(self.with_levels(row.with_loaded_baseline()).await?);
        }
        Ok(products)
    }

    /// Lists products ordered by name.
    pub async fn list(&self, page: Option<Page>) -> DbResult<Vec<Product>> {
        let (limit, offset) = limit_offset(self.formula, page);
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY item_name LIMIT ?1 OFFSET ?2");

        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        self.with_levels_all(rows).await
    }

    /// Matches name, code or barcode (case-insensitive, substring).
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching products");

        let sql = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE item_name LIKE ?1 OR code LIKE ?1 OR barcode LIKE ?1
            ORDER BY item_name
            LIMIT ?2
            "#
        );

        let rows = sqlx::query_as::<_, Product>(&sql)
            .bind(format!("%{}%", query))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Search returned products");
        self.with_levels_all(rows).await
    }

    /// Gets a product with its price levels.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        match fetch_item(&self.pool, id).await? {
            Some(product) => Ok(Some(self.with_levels(product).await?)),
            None => Ok(None),
        }
    }

    /// Scanner lookup. The first match by name wins if a barcode repeats.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE barcode = ?1 ORDER BY item_name LIMIT 1"
        );

        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(barcode.trim())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(product) => Ok(Some(self.with_levels(product.with_loaded_baseline()).await?)),
            None => Ok(None),
        }
    }

    /// Confirms a picked product still exists under the name shown.
    pub async fn get_by_id_and_name(&self, id: &str, item_name: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1 AND item_name = ?2");

        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(item_name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(product) => Ok(Some(self.with_levels(product.with_loaded_baseline()).await?)),
            None => Ok(None),
        }
    }

    /// Saves a product: item row, then each price level, then each join.
    ///
    /// Runs in one transaction. Join rows without an id get a new one.
    pub async fn save(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, levels = product.price_levels.len(), "Saving product");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        upsert_item(&mut *tx, product).await?;

        for entry in &product.price_levels {
            let level = upsert_level(&mut *tx, &entry.price_level).await?;
            let join_id = if entry.id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                entry.id.clone()
            };
            link(&mut *tx, &join_id, &product.id, &level.id).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        self.get_by_id(&product.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &product.id))
    }

    /// Writes inventory counters for one product.
    pub async fn update_inventory(&self, update: &InventoryUpdate) -> DbResult<()> {
        debug!(
            id = %update.item_id,
            quantity = update.item_quantity,
            sold = update.item_sold,
            "Updating inventory"
        );
        apply_inventory(&self.pool, update).await
    }

    /// Deletes the product, its price-level joins, and its picture.
    ///
    /// ## Errors
    /// - `NotFound` when the product does not exist
    /// - `ForeignKeyViolation` while stored sales still reference it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let product = fetch_item(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.images.remove(product.item_image_url.as_deref()).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
