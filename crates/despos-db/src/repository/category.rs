//! # Category Repository
//!
//! Product categories, stored in `item_types`.

use despos_core::{ItemCategory, Page, PageFormula};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::limit_offset;

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    formula: PageFormula,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool, formula: PageFormula) -> Self {
        CategoryRepository { pool, formula }
    }

    pub async fn list(&self, page: Option<Page>) -> DbResult<Vec<ItemCategory>> {
        let (limit, offset) = limit_offset(self.formula, page);

        let rows = sqlx::query_as::<_, ItemCategory>(
            "SELECT id, type_name FROM item_types ORDER BY type_name LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ItemCategory>> {
        let row = sqlx::query_as::<_, ItemCategory>(
            "SELECT id, type_name FROM item_types WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn upsert(&self, category: &ItemCategory) -> DbResult<ItemCategory> {
        debug!(id = %category.id, name = %category.type_name, "Upserting category");

        let row = sqlx::query_as::<_, ItemCategory>(
            r#"
            INSERT INTO item_types (id, type_name)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET type_name = excluded.type_name
            RETURNING id, type_name
            "#,
        )
        .bind(&category.id)
        .bind(&category.type_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Products in the category keep existing with no category.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM item_types WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        let category = ItemCategory {
            id: "cat-1".to_string(),
            type_name: "Beverages".to_string(),
        };
        repo.upsert(&category).await.unwrap();

        assert_eq!(repo.get_by_id("cat-1").await.unwrap(), Some(category));
        assert_eq!(repo.list(None).await.unwrap().len(), 1);

        repo.delete("cat-1").await.unwrap();
        assert_eq!(repo.get_by_id("cat-1").await.unwrap(), None);
    }
}
