//! Configuration loading and management.

use std::path::{Path, PathBuf};

use chrono::Datelike;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use soc_core::{ValidationError, YearRange};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Path to the JSON user store.
    pub users_path: PathBuf,
    /// SoilGrids properties endpoint.
    pub soil_api_url: String,
    pub soil_timeout_secs: u64,
    /// Earliest year accepted by the record store.
    pub min_year: i32,
    /// Latest accepted year; the current calendar year when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,
    /// Default depth band for stock estimates, e.g. `0-30cm`.
    pub depth: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("soc.db"),
            users_path: data_dir.join("users.json"),
            soil_api_url: soc_soil::SOILGRIDS_URL.to_string(),
            soil_timeout_secs: soc_soil::DEFAULT_TIMEOUT.as_secs(),
            min_year: YearRange::EARLIEST,
            max_year: None,
            depth: "0-30cm".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // SOC_DATABASE_PATH, SOC_MAX_YEAR, ...
        figment = figment.merge(Env::prefixed("SOC_"));

        figment.extract()
    }

    /// Accepted years, capped at the current year unless `max_year` is set.
    pub fn year_range(&self) -> Result<YearRange, ValidationError> {
        let max = self
            .max_year
            .unwrap_or_else(|| chrono::Local::now().year());
        YearRange::new(self.min_year, max)
    }
}

/// Returns the platform-specific config directory for soc.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("soc"))
}

/// Returns the platform-specific data directory for soc.
///
/// On Linux: `~/.local/share/soc`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("soc"))
}
