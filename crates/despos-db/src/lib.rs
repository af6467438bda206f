//! # despos-db: Data Access Gateway for DesPOS
//!
//! SQLite storage for the register, plus the settlement reconciler that
//! commits a sales draft against stored inventory.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DesPOS Data Flow                                 │
//! │                                                                         │
//! │  RegisterSession::finish()                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     despos-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Settlement  │  │   │
//! │  │   │   (pool.rs)   │    │  contacts     │    │  Reconciler  │  │   │
//! │  │   │               │◄───│  products     │◄───│  atomic /    │  │   │
//! │  │   │ SqlitePool    │    │  sales        │    │  best-effort │  │   │
//! │  │   │ ImageStore    │    │  selections…  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (+ images/ directory next to it)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and gateway configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per entity
//! - [`settlement`] - Settlement reconciler
//! - [`storage`] - Image blobs on disk
//!
//! ## Usage
//!
//! ```rust,ignore
//! use despos_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("despos.db")).await?;
//!
//! let product = db.products().get_by_barcode("4800016644290").await?;
//! let outcome = db.settlement().settle(&draft).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settlement;
pub mod storage;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use settlement::{
    PartialSettlement, SettlementError, SettlementMode, SettlementOutcome, SettlementReconciler,
    WriteFailure, WriteKind,
};
pub use storage::ImageStore;

pub use repository::category::CategoryRepository;
pub use repository::contact::ContactRepository;
pub use repository::invoice_type::InvoiceTypeRepository;
pub use repository::location::LocationRepository;
pub use repository::price_level::PriceLevelRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::selection::SelectionRepository;

/// Initializes the tracing subscriber for the workspace binaries.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=despos_db=trace` - Trace the gateway only
/// - Default: INFO, DEBUG for despos crates, WARN for sqlx
///
/// A second call is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,despos=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
