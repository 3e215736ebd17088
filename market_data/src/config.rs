//! Dashboard configuration
//!
//! Defaults mirror the values the dashboard ships with. A TOML file may
//! override any subset of them; keys that are left out keep the default.
//!
//! ```toml
//! default_forecast_days = 15
//! cache_dir = "/var/cache/topten"
//! supported_models = ["ARIMA"]
//! ```

use crate::Result;
use chrono::{Duration as DateDuration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix shared by all B3 tickers
pub const B3_SUFFIX: &str = ".SA";
/// File extension of cached series
pub const CACHE_EXTENSION: &str = "parquet";

/// Runtime configuration for loading and forecasting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tickers offered when the caller does not name any
    pub default_tickers: Vec<String>,
    /// Length of the default history window, in months
    pub default_period_months: u32,
    /// Directory holding cached series
    pub cache_dir: PathBuf,
    /// Cached files older than this are refetched
    pub cache_max_age_hours: u64,
    /// Forecast horizon used when none is requested
    pub default_forecast_days: usize,
    /// Model names the dashboard offers
    pub supported_models: Vec<String>,
    /// Provider request timeout, in seconds
    pub provider_timeout_secs: u64,
    /// Attempts made per provider request
    pub max_retries: u32,
    /// Pause between provider attempts, in seconds
    pub retry_delay_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_tickers: [
                "VALE3.SA", "PETR4.SA", "ITUB4.SA", "BBDC4.SA", "ABEV3.SA", "MGLU3.SA",
                "WEGE3.SA", "RENT3.SA", "LREN3.SA", "GGBR4.SA",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            default_period_months: 12,
            cache_dir: PathBuf::from("cache"),
            cache_max_age_hours: 24,
            default_forecast_days: 30,
            supported_models: vec!["Seasonal".to_string(), "ARIMA".to_string()],
            provider_timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 1,
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Path of the cache file for a ticker
    pub fn cache_path(&self, ticker: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(ticker))
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_hours * 3600)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Check that a ticker looks like a B3 symbol, e.g. `PETR4.SA`
pub fn validate_ticker(ticker: &str) -> bool {
    ticker.ends_with(B3_SUFFIX) && ticker.len() >= 6
}

/// Cache file name for a ticker: the symbol without the exchange suffix
pub fn cache_file_name(ticker: &str) -> String {
    format!("{}.{}", ticker.replace(B3_SUFFIX, ""), CACHE_EXTENSION)
}

/// Default history window ending today. Months are counted as 30 days.
pub fn default_date_range(months: u32) -> (NaiveDate, NaiveDate) {
    let end = Local::now().date_naive();
    let start = end - DateDuration::days(30 * i64::from(months));
    (start, end)
}
