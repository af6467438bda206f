//! # DesPOS Register
//!
//! The cashier-facing layer: one [`RegisterSession`] per register, its
//! configuration, and the errors handed to whatever renders the UI.
//!
//! ## Module Organization
//! ```text
//! despos_register/
//! ├── lib.rs          ◄─── You are here (startup helpers)
//! ├── config.rs       ◄─── RegisterConfig: defaults ← TOML ← DESPOS_* env
//! ├── session.rs      ◄─── RegisterSession: draft edits and settlement
//! └── error.rs        ◄─── ApiError { code, message }
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize logging (RUST_LOG, default info)                         │
//! │  2. Load RegisterConfig                                                 │
//! │  3. Create the data directory, connect, run migrations                  │
//! │  4. Hand the Database to a RegisterSession                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod session;

use despos_db::Database;
use tracing::info;

pub use config::{ConfigError, RegisterConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use session::{LineSummary, RegisterSession, SaleSummary};

/// Opens the database described by `config`, creating its directory.
pub async fn connect(config: &RegisterConfig) -> ApiResult<Database> {
    let db_config = config.to_db_config()?;

    if let Some(dir) = db_config.database_path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                ApiError::internal(format!("Could not create {}: {}", dir.display(), e))
            })?;
        }
    }

    info!(path = %db_config.database_path.display(), "Opening register database");
    Ok(Database::new(db_config).await?)
}

/// Loads configuration, connects, and starts a session with an empty draft.
pub async fn start() -> ApiResult<RegisterSession> {
    let config = RegisterConfig::load()?;
    let db = connect(&config).await?;
    Ok(RegisterSession::new(db, config.discard_on_success))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegisterConfig {
            database_path: Some(dir.path().join("nested").join("despos.db")),
            ..RegisterConfig::default()
        };

        let db = connect(&config).await.unwrap();

        assert!(db.health_check().await);
        assert!(dir.path().join("nested").join("despos.db").exists());
        db.close().await;
    }
}
