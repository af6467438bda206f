//! # Database Pool Management
//!
//! Connection pool creation and gateway configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Register startup                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← pool settings + gateway policies                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├──► db.products() / db.sales() / db.contacts() / ...            │
//! │       └──► db.settlement() ← batch writes may run on several conns     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so readers don't block
//! the settlement writer.

use despos_core::{ContactDateStyle, PageFormula};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::category::CategoryRepository;
use crate::repository::contact::ContactRepository;
use crate::repository::invoice_type::InvoiceTypeRepository;
use crate::repository::location::LocationRepository;
use crate::repository::price_level::PriceLevelRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::selection::SelectionRepository;
use crate::settlement::{SettlementMode, SettlementReconciler};
use crate::storage::ImageStore;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/despos.db")
///     .max_connections(5)
///     .settlement_mode(SettlementMode::Atomic);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// How settlement writes are grouped.
    /// Default: atomic (one transaction)
    pub settlement_mode: SettlementMode,

    /// Output style of contact calendar dates on read.
    /// Default: legacy
    pub contact_dates: ContactDateStyle,

    /// Row window formula for paged lists.
    /// Default: standard
    pub page_formula: PageFormula,

    /// Directory holding product and profile pictures.
    pub image_dir: PathBuf,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// Images default to an `images` directory next to the database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let database_path: PathBuf = path.into();
        let image_dir = database_path
            .parent()
            .map(|dir| dir.join("images"))
            .unwrap_or_else(|| PathBuf::from("images"));

        DbConfig {
            database_path,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            settlement_mode: SettlementMode::default(),
            contact_dates: ContactDateStyle::default(),
            page_formula: PageFormula::default(),
            image_dir,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn settlement_mode(mut self, mode: SettlementMode) -> Self {
        self.settlement_mode = mode;
        self
    }

    pub fn contact_dates(mut self, style: ContactDateStyle) -> Self {
        self.contact_dates = style;
        self
    }

    pub fn page_formula(mut self, formula: PageFormula) -> Self {
        self.page_formula = formula;
        self
    }

    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let config = DbConfig::in_memory();
    /// let db = Database::new(config).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            settlement_mode: SettlementMode::default(),
            contact_dates: ContactDateStyle::default(),
            page_formula: PageFormula::default(),
            image_dir: std::env::temp_dir().join("despos-images"),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./despos.db")).await?;
///
/// let page = db.products().list(Some(Page::new(0, 20))).await?;
/// let outcome = db.settlement().settle(&draft).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
    images: ImageStore,
    settlement_mode: SettlementMode,
    contact_dates: ContactDateStyle,
    page_formula: PageFormula,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            mode = ?config.settlement_mode,
            "Initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            images: ImageStore::new(config.image_dir),
            settlement_mode: config.settlement_mode,
            contact_dates: config.contact_dates,
            page_formula: config.page_formula,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Idempotent: already-applied migrations are skipped.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn locations(&self) -> LocationRepository {
        LocationRepository::new(self.pool.clone(), self.page_formula)
    }

    /// Contacts come back with dates normalized in the configured style.
    pub fn contacts(&self) -> ContactRepository {
        ContactRepository::new(
            self.pool.clone(),
            self.contact_dates,
            self.page_formula,
            self.images.clone(),
        )
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone(), self.page_formula)
    }

    pub fn invoice_types(&self) -> InvoiceTypeRepository {
        InvoiceTypeRepository::new(self.pool.clone(), self.page_formula)
    }

    pub fn price_levels(&self) -> PriceLevelRepository {
        PriceLevelRepository::new(self.pool.clone(), self.page_formula)
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone(), self.page_formula, self.images.clone())
    }

    /// Returns the sale repository.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone(), self.page_formula)
    }

    pub fn selections(&self) -> SelectionRepository {
        SelectionRepository::new(self.pool.clone())
    }

    /// Returns the settlement reconciler in the configured mode.
    pub fn settlement(&self) -> SettlementReconciler {
        SettlementReconciler::new(self.clone(), self.settlement_mode)
    }

    pub fn settlement_mode(&self) -> SettlementMode {
        self.settlement_mode
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
