//! Error types for the price_forecast crate

use market_data::MarketDataError;
use polars::prelude::PolarsError;
use series_math::MathError;
use thiserror::Error;

/// Custom error types for the price_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The requested model kind is not offered
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Target column is not part of the series
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    /// Too few usable observations
    #[error("Insufficient data: required {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Error raised while fitting or forecasting a model
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from numeric routines
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error while exporting a forecast
    #[error("Export error: {0}")]
    ExportError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<MarketDataError> for ForecastError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::MissingColumn(column) => ForecastError::MissingColumn(column),
            MarketDataError::Polars(msg) => ForecastError::PolarsError(msg),
            MarketDataError::Io(e) => ForecastError::IoError(e),
            other => ForecastError::DataError(other.to_string()),
        }
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::ExportError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::ExportError(err.to_string())
    }
}

#[cfg(feature = "arima")]
impl From<argmin::core::Error> for ForecastError {
    fn from(err: argmin::core::Error) -> Self {
        ForecastError::ModelError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insufficient_data_message_names_both_counts() {
        let err = ForecastError::InsufficientData {
            required: 10,
            actual: 5,
        };
        assert_eq!(err.to_string(), "Insufficient data: required 10, got 5");
    }

    #[test]
    fn test_market_data_missing_column_is_kept() {
        let err = ForecastError::from(MarketDataError::MissingColumn("close".to_string()));
        assert!(matches!(err, ForecastError::MissingColumn(c) if c == "close"));
    }

    #[test]
    fn test_math_error_conversion() {
        let err: ForecastError = MathError::SingularMatrix("pivot 0".to_string()).into();
        assert!(err.to_string().starts_with("Math error"));
    }
}
