//! Application settings loading from config.toml
//!
//! Every field has a default, so a missing file section or key falls back to the
//! values the ledger ships with. `DATABASE_URL` in the environment overrides the
//! file so deployments can keep credentials in `.env`.

use crate::errors::{Error, Result};
use jiff::tz::TimeZone;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/pocket_ledger.sqlite?mode=rwc";
const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";
const DEFAULT_SUMMARY_CRON: &str = "1 0 * * *";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SeaORM connection string
    pub database_url: String,
    /// IANA name of the users' zone, e.g. `"Asia/Jakarta"`
    pub timezone: String,
    /// Cron expression for the daily summary job
    pub daily_summary_cron: String,
    /// Deadline applied to each service operation
    pub store_timeout_secs: u64,
    /// Upper bound on one daily summary run
    pub summary_job_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            daily_summary_cron: DEFAULT_SUMMARY_CRON.to_string(),
            store_timeout_secs: 10,
            summary_job_timeout_secs: 30 * 60,
        }
    }
}

impl AppConfig {
    /// Looks up `timezone` in the bundled zone database.
    ///
    /// # Errors
    /// Returns `Error::Config` if the name is not a known IANA zone.
    pub fn time_zone(&self) -> Result<TimeZone> {
        TimeZone::get(self.timezone.trim()).map_err(|e| Error::Config {
            message: format!("Unknown timezone '{}': {e}", self.timezone),
        })
    }

    /// Deadline for a single service operation
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Deadline for a daily summary run
    #[must_use]
    pub const fn summary_job_timeout(&self) -> Duration {
        Duration::from_secs(self.summary_job_timeout_secs)
    }
}

/// Loads settings from a TOML file and applies environment overrides.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - The timezone is not a known IANA zone
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    let mut config = parse_config(&contents)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Loads settings from `./config.toml`, or defaults when the file does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be parsed.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        return load_config(path);
    }

    tracing::info!("No config.toml found, using default settings");
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.time_zone()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
}
