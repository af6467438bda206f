//! # Contact Repository
//!
//! Customers, staff and dealers in one table, discriminated by
//! `contact_type`.
//!
//! ## Date Handling
//! ```text
//!   upsert ──► parse date_open / birthdate ──► store ISO "YYYY-MM-DD"
//!                                               (blank birthdate → NULL)
//!   read   ──► normalize_contact_lenient(row, style) ──► caller
//!              (an unparseable stored date is passed through and logged)
//! ```
//! Every read path goes through [`ContactRepository::normalize`], so the
//! configured [`ContactDateStyle`] is what callers always see.

use despos_core::contact::{normalize_contact, normalize_contact_lenient};
use despos_core::{Contact, ContactDateStyle, ContactType, Page, PageFormula};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::limit_offset;
use crate::storage::ImageStore;

const CONTACT_COLUMNS: &str = "id, contact_type, first_name, middle_name, last_name, email, \
     phone, location_id, price_level, date_open, birthdate, profile_url, date_added";

#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
    dates: ContactDateStyle,
    formula: PageFormula,
    images: ImageStore,
}

impl ContactRepository {
    pub fn new(
        pool: SqlitePool,
        dates: ContactDateStyle,
        formula: PageFormula,
        images: ImageStore,
    ) -> Self {
        ContactRepository {
            pool,
            dates,
            formula,
            images,
        }
    }

    /// Unparseable stored dates are passed through as-is and logged.
    fn normalize(&self, contact: Contact) -> Contact {
        let (contact, issues) = normalize_contact_lenient(contact, self.dates);
        for issue in &issues {
            warn!(id = %contact.id, error = %issue, "Stored contact date left as is");
        }
        contact
    }

    fn normalize_all(&self, rows: Vec<Contact>) -> Vec<Contact> {
        rows.into_iter().map(|c| self.normalize(c)).collect()
    }

    /// Lists contacts ordered by last name, optionally of one type.
    pub async fn list(
        &self,
        contact_type: Option<ContactType>,
        page: Option<Page>,
    ) -> DbResult<Vec<Contact>> {
        let (limit, offset) = limit_offset(self.formula, page);

        let sql = format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE (?1 IS NULL OR contact_type = ?1)
            ORDER BY last_name, first_name
            LIMIT ?2 OFFSET ?3
            "#
        );

        let rows = sqlx::query_as::<_, Contact>(&sql)
            .bind(contact_type)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(self.normalize_all(rows))
    }

    /// Case-insensitive match on first or last name.
    pub async fn search(
        &self,
        contact_type: Option<ContactType>,
        query: &str,
        limit: u32,
    ) -> DbResult<Vec<Contact>> {
        let pattern = format!("%{}%", query.trim());
        debug!(query = %query, limit = %limit, "Searching contacts");

        let sql = format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE (?1 IS NULL OR contact_type = ?1)
            AND (first_name LIKE ?2 OR last_name LIKE ?2)
            ORDER BY last_name, first_name
            LIMIT ?3
            "#
        );

        let rows = sqlx::query_as::<_, Contact>(&sql)
            .bind(contact_type)
            .bind(pattern)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(self.normalize_all(rows))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Contact>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1");

        let row = sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|c| self.normalize(c)))
    }

    /// Inserts or updates by id.
    ///
    /// Dates are stored as ISO calendar dates; a blank birthdate is stored
    /// as absent. The returned row is normalized like any other read.
    pub async fn upsert(&self, contact: &Contact) -> DbResult<Contact> {
        debug!(id = %contact.id, contact_type = %contact.contact_type.as_str(), "Upserting contact");

        let canonical = normalize_contact(contact.clone(), ContactDateStyle::Iso)
            .map_err(|e| DbError::invalid_row("Contact", e))?;

        let sql = format!(
            r#"
            INSERT INTO contacts ({CONTACT_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                contact_type = excluded.contact_type,
                first_name = excluded.first_name,
                middle_name = excluded.middle_name,
                last_name = excluded.last_name,
                email = excluded.email,
                phone = excluded.phone,
                location_id = excluded.location_id,
                price_level = excluded.price_level,
                date_open = excluded.date_open,
                birthdate = excluded.birthdate,
                profile_url = excluded.profile_url
            RETURNING {CONTACT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Contact>(&sql)
            .bind(&canonical.id)
            .bind(canonical.contact_type)
            .bind(&canonical.first_name)
            .bind(&canonical.middle_name)
            .bind(&canonical.last_name)
            .bind(&canonical.email)
            .bind(&canonical.phone)
            .bind(&canonical.location_id)
            .bind(&canonical.price_level)
            .bind(&canonical.date_open)
            .bind(&canonical.birthdate)
            .bind(&canonical.profile_url)
            .bind(canonical.date_added)
            .fetch_one(&self.pool)
            .await?;

        Ok(self.normalize(row))
    }

    /// Deletes the contact, then its profile picture if it has one.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting contact");

        let profile_url: Option<Option<String>> =
            sqlx::query_scalar("SELECT profile_url FROM contacts WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let profile_url = profile_url.ok_or_else(|| DbError::not_found("Contact", id))?;

        sqlx::query("DELETE FROM contacts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.images.remove(profile_url.as_deref()).await
    }

    pub async fn count(&self, contact_type: Option<ContactType>) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE (?1 IS NULL OR contact_type = ?1)")
                .bind(contact_type)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Utc;

    fn contact(id: &str, contact_type: ContactType, last_name: &str) -> Contact {
        Contact {
            id: id.to_string(),
            contact_type,
            first_name: "Jose".to_string(),
            middle_name: None,
            last_name: last_name.to_string(),
            email: None,
            phone: None,
            location_id: None,
            price_level: None,
            date_open: Some("2021-03-09".to_string()),
            birthdate: Some("1990-01-05".to_string()),
            profile_url: None,
            date_added: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reads_use_legacy_dates_by_default() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.contacts();

        repo.upsert(&contact("c-1", ContactType::Customer, "Rizal"))
            .await
            .unwrap();
        let stored = repo.get_by_id("c-1").await.unwrap().unwrap();

        assert_eq!(stored.birthdate.as_deref(), Some("1990-01-5"));
        assert_eq!(stored.date_open.as_deref(), Some("2021-03-9"));
    }

    #[tokio::test]
    async fn test_reads_use_iso_dates_when_configured() {
        let config = DbConfig::in_memory().contact_dates(ContactDateStyle::Iso);
        let db = Database::new(config).await.unwrap();
        let repo = db.contacts();

        let stored = repo
            .upsert(&contact("c-1", ContactType::Customer, "Rizal"))
            .await
            .unwrap();

        assert_eq!(stored.birthdate.as_deref(), Some("1990-01-05"));
    }

    #[tokio::test]
    async fn test_blank_birthdate_is_stored_absent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.contacts();

        let mut c = contact("c-1", ContactType::Customer, "Rizal");
        c.birthdate = Some(String::new());
        repo.upsert(&c).await.unwrap();

        let raw: Option<String> =
            sqlx::query_scalar("SELECT birthdate FROM contacts WHERE id = 'c-1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(raw, None);
    }

    #[tokio::test]
    async fn test_filter_and_count_by_type() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.contacts();

        repo.upsert(&contact("c-1", ContactType::Customer, "Bonifacio"))
            .await
            .unwrap();
        repo.upsert(&contact("c-2", ContactType::Customer, "Aquino"))
            .await
            .unwrap();
        repo.upsert(&contact("d-1", ContactType::Dealer, "Luna"))
            .await
            .unwrap();

        let customers = repo.list(Some(ContactType::Customer), None).await.unwrap();
        let names: Vec<&str> = customers.iter().map(|c| c.last_name.as_str()).collect();
        assert_eq!(names, vec!["Aquino", "Bonifacio"]);

        assert_eq!(repo.count(Some(ContactType::Dealer)).await.unwrap(), 1);
        assert_eq!(repo.count(None).await.unwrap(), 3);

        let found = repo
            .search(Some(ContactType::Customer), "aqui", 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_profile_picture() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory().image_dir(dir.path()))
            .await
            .unwrap();
        let repo = db.contacts();

        let stored = db.images().put("profiles/c-1.png", b"img").await.unwrap();
        let mut c = contact("c-1", ContactType::Staff, "Mabini");
        c.profile_url = Some(stored);
        repo.upsert(&c).await.unwrap();

        repo.delete("c-1").await.unwrap();

        assert!(!dir.path().join("profiles/c-1.png").exists());
        assert!(repo.get_by_id("c-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_contact() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.contacts().delete("nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_stored_date_does_not_hide_the_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.contacts();
        repo.upsert(&contact("c-1", ContactType::Customer, "Rizal"))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO contacts (id, contact_type, first_name, last_name, date_open, date_added) \
             VALUES ('c-2', 'customer', 'Juan', 'Luna', 'last Tuesday', ?1)",
        )
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

        let all = repo.list(None, None).await.unwrap();

        assert_eq!(all.len(), 2);
        let luna = all.iter().find(|c| c.id == "c-2").unwrap();
        assert_eq!(luna.date_open.as_deref(), Some("last Tuesday"));
    }

    #[tokio::test]
    async fn test_upsert_still_rejects_unparseable_dates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut c = contact("c-1", ContactType::Customer, "Rizal");
        c.birthdate = Some("not a date".to_string());

        let err = db.contacts().upsert(&c).await.unwrap_err();

        assert!(err.to_string().contains("birthdate"));
    }
}
