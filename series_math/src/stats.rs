//! Descriptive statistics and standard normal helpers

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Variance with `ddof` delta degrees of freedom
pub fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - ddof) as f64)
}

/// Percentile of already sorted values with linear interpolation between
/// closest ranks. `q` is a fraction in `[0, 1]`.
pub fn percentile(sorted: &[f64], q: f64) -> Result<f64> {
    if sorted.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take a percentile of no values".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Percentile fraction must be within [0, 1], got {}",
            q
        )));
    }

    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Standard normal cumulative distribution function
pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}

/// Standard normal quantile (inverse CDF) for probability `p` in `(0, 1)`
pub fn normal_quantile(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Probability must be within (0, 1), got {}",
            p
        )));
    }
    Ok(standard_normal()?.inverse_cdf(p))
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| MathError::CalculationError(e.to_string()))
}
