//! # Series Math
//!
//! Numeric building blocks shared by the price forecasting models.
//! This crate provides small dense least-squares solvers, series
//! transforms (differencing, integration, gap interpolation) and the
//! descriptive statistics the models need.

use thiserror::Error;

pub mod regression;
pub mod stats;
pub mod transforms;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MathError::SingularMatrix("pivot 2 is zero".to_string());
        assert_eq!(err.to_string(), "Singular matrix: pivot 2 is zero");
    }
}
