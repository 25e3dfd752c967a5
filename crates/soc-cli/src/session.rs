//! Per-invocation session: the store and settings loaded from the database.
//!
//! Commands mutate `store` and `settings` through the core API and then call
//! [`Session::save`]; nothing is written when a mutation is rejected.

use anyhow::{Context, Result};

use soc_core::{ReferenceTables, Settings, Store, StoreError, ValidationError};
use soc_db::{Database, DbError};

use crate::Config;

pub struct Session {
    db: Database,
    pub store: Store,
    pub settings: Settings,
}

impl Session {
    /// Opens the configured database, creating its directory if needed.
    pub fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config
            .database_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }

        let db = Database::open(&config.database_path)
            .with_context(|| format!("failed to open {}", config.database_path.display()))?;
        let range = config.year_range().context("invalid year range in configuration")?;
        let store = db.load_store(range).map_err(|err| match err {
            DbError::Store(StoreError::InvalidInput(ValidationError::YearOutOfRange {
                year,
                min,
                max,
            })) => anyhow::anyhow!(
                "stored year {year} is outside the configured range {min}..={max}; \
                 widen `min_year`/`max_year` in the config file \
                 (or SOC_MIN_YEAR/SOC_MAX_YEAR) to open these records"
            ),
            other => anyhow::Error::new(other).context("failed to load records"),
        })?;
        let settings = db
            .load_settings()
            .context("failed to load settings")?
            .unwrap_or_default();
        tracing::debug!(?settings, "opened session");

        Ok(Self {
            db,
            store,
            settings,
        })
    }

    /// Session backed by an in-memory database.
    pub fn in_memory(config: &Config) -> Result<Self> {
        let db = Database::open_in_memory()?;
        let store = Store::new(config.year_range()?);
        Ok(Self {
            db,
            store,
            settings: Settings::default(),
        })
    }

    /// Persists the record store.
    pub fn save(&mut self) -> Result<()> {
        self.db
            .save_store(&self.store)
            .context("failed to save records")
    }

    /// Validates and persists the settings.
    pub fn save_settings(&self) -> Result<()> {
        self.db
            .save_settings(&self.settings)
            .context("failed to save settings")
    }

    /// Drops stored settings and returns to the built-in defaults.
    pub fn reset_settings(&mut self) -> Result<()> {
        self.db
            .clear_settings()
            .context("failed to reset settings")?;
        self.settings = Settings::default();
        Ok(())
    }

    pub fn tables(&self) -> &'static ReferenceTables {
        ReferenceTables::standard()
    }
}
