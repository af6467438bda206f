//! # Register Configuration
//!
//! Settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`DESPOS_*`)
//! 2. Config file (`DESPOS_CONFIG`, else `config.toml` in the platform
//!    config directory)
//! 3. Defaults (this file)
//!
//! ## Example `config.toml`
//! ```toml
//! database_path = "/var/lib/despos/despos.db"
//! settlement_mode = "best_effort"
//! contact_dates = "iso"
//! page_formula = "legacy"
//! discard_on_success = true
//! ```

use std::path::{Path, PathBuf};

use despos_core::{ContactDateStyle, PageFormula};
use despos_db::{DbConfig, SettlementMode};
use directories::ProjectDirs;
use serde::de::{value, DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Could not determine the platform data directory")]
    NoDataDir,
}

/// Register configuration.
///
/// Every field is optional in the file; missing ones keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// SQLite file. `None` means `despos.db` in the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Product and profile pictures. `None` means `images/` next to the
    /// database file.
    pub image_dir: Option<PathBuf>,

    pub settlement_mode: SettlementMode,

    /// How contact dates are rendered on read.
    pub contact_dates: ContactDateStyle,

    pub page_formula: PageFormula,

    /// Start a fresh draft after a successful finish or save, instead of
    /// keeping the settled one open.
    pub discard_on_success: bool,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        RegisterConfig {
            database_path: None,
            image_dir: None,
            settlement_mode: SettlementMode::Atomic,
            contact_dates: ContactDateStyle::Legacy,
            page_formula: PageFormula::Standard,
            discard_on_success: false,
        }
    }
}

impl RegisterConfig {
    /// Defaults, then the config file if one exists, then `DESPOS_*`
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => RegisterConfig::from_file(&path)?,
            _ => RegisterConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Reading config file");

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        RegisterConfig::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Overrides fields from environment-style variables.
    ///
    /// ## Variables
    /// - `DESPOS_DB_PATH`
    /// - `DESPOS_IMAGE_DIR`
    /// - `DESPOS_SETTLEMENT_MODE`: `atomic` | `best_effort`
    /// - `DESPOS_CONTACT_DATES`: `legacy` | `iso`
    /// - `DESPOS_PAGE_FORMULA`: `legacy` | `standard`
    /// - `DESPOS_DISCARD_ON_SUCCESS`: `true` | `false`
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("DESPOS_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }

        if let Some(dir) = var("DESPOS_IMAGE_DIR") {
            self.image_dir = Some(PathBuf::from(dir));
        }

        if let Some(raw) = var("DESPOS_SETTLEMENT_MODE") {
            self.settlement_mode = parse_choice("DESPOS_SETTLEMENT_MODE", &raw)?;
        }

        if let Some(raw) = var("DESPOS_CONTACT_DATES") {
            self.contact_dates = parse_choice("DESPOS_CONTACT_DATES", &raw)?;
        }

        if let Some(raw) = var("DESPOS_PAGE_FORMULA") {
            self.page_formula = parse_choice("DESPOS_PAGE_FORMULA", &raw)?;
        }

        if let Some(raw) = var("DESPOS_DISCARD_ON_SUCCESS") {
            self.discard_on_success = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "DESPOS_DISCARD_ON_SUCCESS".to_string(),
                value: raw.clone(),
            })?;
        }

        Ok(())
    }

    /// Resolves the database file, falling back to the platform data dir.
    ///
    /// ## Platform-Specific Paths
    /// - **macOS**: `~/Library/Application Support/com.despos.register/despos.db`
    /// - **Windows**: `%APPDATA%\despos\register\data\despos.db`
    /// - **Linux**: `~/.local/share/register/despos.db`
    pub fn resolved_database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let dirs = project_dirs().ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join("despos.db"))
    }

    /// Builds the gateway configuration.
    pub fn to_db_config(&self) -> Result<DbConfig, ConfigError> {
        let mut db = DbConfig::new(self.resolved_database_path()?)
            .settlement_mode(self.settlement_mode)
            .contact_dates(self.contact_dates)
            .page_formula(self.page_formula);

        if let Some(dir) = &self.image_dir {
            db = db.image_dir(dir.clone());
        }

        Ok(db)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "despos", "register")
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("DESPOS_CONFIG") {
        return Some(PathBuf::from(path));
    }

    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Parses a unit enum from its serde name (`"best_effort"`, `"iso"`, ...).
fn parse_choice<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, ConfigError> {
    let de: value::StrDeserializer<'_, value::Error> = raw.trim().into_deserializer();

    T::deserialize(de).map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
