//! # TopTen
//!
//! Daily price forecasting for the most traded B3 equities.
//!
//! This crate re-exports the workspace members:
//!
//! - [`series_math`]: least squares, differencing and descriptive statistics
//! - [`market_data`]: price series, provider access, disk cache and configuration
//! - [`price_forecast`]: the [`Predictor`] front end with seasonal and ARIMA models
//!
//! ## Example
//!
//! ```no_run
//! use topten::{AppConfig, DataLoader, ModelParams, Predictor, YahooProvider};
//! use topten::market_data::config::default_date_range;
//!
//! let config = AppConfig::default();
//! let loader = DataLoader::new(YahooProvider::new(config.provider_timeout())?, &config, true)?;
//! let (start, end) = default_date_range(config.default_period_months);
//! let series = loader.load_ticker_data("PETR4.SA", start, end, false)?;
//!
//! let predictor = Predictor::from_config(&config);
//! let result = predictor.train_and_predict(&series, "Seasonal", "close", 30, &ModelParams::default())?;
//! println!("{} rows, success = {}", result.predictions.len(), result.success);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use market_data;
pub use price_forecast;
pub use series_math;

pub use market_data::{AppConfig, DataLoader, PriceSeries, YahooProvider};
pub use price_forecast::{ModelKind, ModelParams, PredictionResult, Predictor};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_exposes_predictor() {
        assert_eq!(NAME, "topten");
        let predictor = Predictor::new();
        assert!(!predictor.available_models().is_empty());
    }
}
