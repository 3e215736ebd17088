//! Augmented Dickey-Fuller unit-root test
//!
//! Regression with a constant term. The number of lagged differences is
//! chosen by AIC over `0..=maxlag`, all candidates fitted on the sample of
//! the largest lag; the chosen lag is then refitted on its full sample.
//! P-values use MacKinnon's (1994) approximation for one variable.

use crate::error::{ForecastError, Result};
use series_math::regression::{ols, OlsFit};
use series_math::stats::normal_cdf;
use series_math::transforms::difference;

/// Series are stationary when the ADF p-value is below this level
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

// MacKinnon surface for the constant-only regression, N = 1
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// Outcome of an ADF test
#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient
    pub statistic: f64,
    /// Approximate p-value
    pub p_value: f64,
    /// Number of lagged differences used
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
}

impl AdfResult {
    /// True when the unit-root hypothesis is rejected at 5%
    pub fn is_stationary(&self) -> bool {
        self.p_value < SIGNIFICANCE_LEVEL
    }
}

/// Default maximum lag: `ceil(12 * (n / 100)^(1/4))`, capped at `n / 2 - 2`
pub fn default_max_lag(n: usize) -> Result<usize> {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let cap = (n / 2).checked_sub(2).ok_or(ForecastError::InsufficientData {
        required: 4,
        actual: n,
    })?;
    Ok(schwert.min(cap))
}

/// Run the ADF test on a series
pub fn adf_test(series: &[f64]) -> Result<AdfResult> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::DataError(
            "ADF test needs finite values".to_string(),
        ));
    }
    let max_lag = default_max_lag(series.len())?;
    let diffs = difference(series);

    let mut best: Option<(f64, usize)> = None;
    let (design, target) = lag_regression(series, &diffs, max_lag, max_lag);
    for lag in 0..=max_lag {
        let columns = lag + 2;
        let narrowed: Vec<Vec<f64>> = design.iter().map(|row| row[..columns].to_vec()).collect();
        let aic = ols(&narrowed, &target)?.aic();
        if !aic.is_finite() {
            continue;
        }
        // Ties resolve to the smaller lag
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lag));
        }
    }
    let (_, used_lag) = best.ok_or_else(|| {
        ForecastError::ModelError("No lag length gave a finite AIC".to_string())
    })?;

    let (design, target) = lag_regression(series, &diffs, used_lag, used_lag);
    let fit: OlsFit = ols(&design, &target)?;
    let statistic = fit.t_values()[1];
    if !statistic.is_finite() {
        return Err(ForecastError::ModelError(format!(
            "ADF statistic is not finite: {}",
            statistic
        )));
    }

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic)?,
        used_lag,
        nobs: fit.nobs,
    })
}

/// Approximate p-value of an ADF statistic
pub fn mackinnon_p_value(statistic: f64) -> Result<f64> {
    if statistic > TAU_MAX {
        return Ok(1.0);
    }
    if statistic < TAU_MIN {
        return Ok(0.0);
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    let value = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);
    Ok(normal_cdf(value)?)
}

/// Rows `[1, x_t, dx_{t-1}, .., dx_{t-lags}]` with target `dx_t`, starting
/// after `skip` leading differences
fn lag_regression(
    levels: &[f64],
    diffs: &[f64],
    lags: usize,
    skip: usize,
) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut design = Vec::with_capacity(diffs.len().saturating_sub(skip));
    let mut target = Vec::with_capacity(diffs.len().saturating_sub(skip));
    for t in skip..diffs.len() {
        let mut row = Vec::with_capacity(lags + 2);
        row.push(1.0);
        row.push(levels[t]);
        row.extend((1..=lags).map(|j| diffs[t - j]));
        design.push(row);
        target.push(diffs[t]);
    }
    (design, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(30, 9)]
    #[case(100, 12)]
    #[case(250, 16)]
    #[case(10, 3)]
    fn test_default_max_lag(#[case] n: usize, #[case] expected: usize) {
        assert_eq!(default_max_lag(n).unwrap(), expected);
    }

    #[test]
    fn test_default_max_lag_too_short() {
        assert!(default_max_lag(3).is_err());
    }

    #[rstest]
    #[case(-2.8623, 0.05)]
    #[case(-3.4335, 0.01)]
    #[case(-2.5671, 0.10)]
    fn test_mackinnon_critical_values(#[case] statistic: f64, #[case] expected: f64) {
        assert_relative_eq!(mackinnon_p_value(statistic).unwrap(), expected, epsilon = 2e-3);
    }

    #[test]
    fn test_mackinnon_tails() {
        assert_eq!(mackinnon_p_value(3.0).unwrap(), 1.0);
        assert_eq!(mackinnon_p_value(-20.0).unwrap(), 0.0);
        let p = mackinnon_p_value(0.5).unwrap();
        assert!(p > 0.9 && p < 1.0);
    }

    #[test]
    fn test_constant_series_fails() {
        assert!(adf_test(&[5.0; 40]).is_err());
    }

    #[test]
    fn test_lag_regression_layout() {
        let levels = [1.0, 3.0, 6.0, 10.0, 15.0];
        let diffs = difference(&levels);
        let (design, target) = lag_regression(&levels, &diffs, 1, 1);
        assert_eq!(design, vec![
            vec![1.0, 3.0, 2.0],
            vec![1.0, 6.0, 3.0],
            vec![1.0, 10.0, 4.0],
        ]);
        assert_eq!(target, vec![3.0, 4.0, 5.0]);
    }
}
