//! # Price Forecast
//!
//! Short-horizon forecasting of daily closing prices.
//!
//! ## Features
//!
//! - Seasonal trend model: piecewise-linear trend with weekly, yearly and
//!   optional daily Fourier seasonality (cargo feature `seasonal`)
//! - ARIMA fitted by conditional sum of squares, with the differencing order
//!   chosen by an augmented Dickey-Fuller test (cargo feature `arima`)
//! - One [`Predictor`] front end that validates data, fits a model by name
//!   and returns dated forecasts with intervals
//! - CSV, JSON and `DataFrame` export of forecast tables
//!
//! ## Quick Start
//!
//! ```no_run
//! use market_data::PriceSeries;
//! use price_forecast::{ModelParams, Predictor, DEFAULT_MIN_PERIODS};
//!
//! let series = PriceSeries::from_csv("prices.csv")?;
//! let predictor = Predictor::new();
//!
//! let (ok, message) = predictor.validate(&series, DEFAULT_MIN_PERIODS);
//! println!("{}", message);
//!
//! if ok {
//!     let result = predictor.train_and_predict(&series, "ARIMA", "close", 7, &ModelParams::default())?;
//!     for row in &result.predictions {
//!         println!("{} {:.2} [{:.2}, {:.2}]", row.date, row.yhat, row.yhat_lower, row.yhat_upper);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(not(any(feature = "seasonal", feature = "arima")))]
compile_error!("price_forecast needs at least one model backend: enable `seasonal` or `arima`");

pub mod error;
pub mod models;
pub mod params;
pub mod predictor;
pub mod registry;
pub mod stationarity;
pub mod utils;

// Re-export commonly used types
pub use crate::error::{ForecastError, Result};
pub use crate::models::{
    ArimaOrder, FittedModel, ForecastModel, ForecastResult, ForecastRow, ForecastTable,
    ModelHandle, ModelKind,
};
pub use crate::params::{ModelParams, SeasonalConfig, SeasonalOverrides, SeasonalityMode};
pub use crate::predictor::{PredictionResult, Predictor, DEFAULT_MIN_PERIODS, MAX_MISSING_RATIO};
pub use crate::registry::ModelRegistry;
pub use crate::stationarity::{adf_test, AdfResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
