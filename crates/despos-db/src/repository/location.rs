//! # Location Repository
//!
//! Store branches and customer addresses.

use despos_core::{Location, Page, PageFormula};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::limit_offset;

#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
    formula: PageFormula,
}

impl LocationRepository {
    pub fn new(pool: SqlitePool, formula: PageFormula) -> Self {
        LocationRepository { pool, formula }
    }

    /// Lists locations ordered by name.
    pub async fn list(&self, page: Option<Page>) -> DbResult<Vec<Location>> {
        let (limit, offset) = limit_offset(self.formula, page);

        let rows = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, location_name, address
            FROM locations
            ORDER BY location_name
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Location>> {
        let row = sqlx::query_as::<_, Location>(
            "SELECT id, location_name, address FROM locations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Inserts or updates by id.
    pub async fn upsert(&self, location: &Location) -> DbResult<Location> {
        debug!(id = %location.id, "Upserting location");

        let row = sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (id, location_name, address)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                location_name = excluded.location_name,
                address = excluded.address
            RETURNING id, location_name, address
            "#,
        )
        .bind(&location.id)
        .bind(&location.location_name)
        .bind(&location.address)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting location");

        let result = sqlx::query("DELETE FROM locations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
