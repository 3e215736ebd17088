//! Decomposable trend and seasonality model
//!
//! `y(t) = g(t) + s(t)` in additive mode and `y(t) = g(t) * (1 + s(t))` in
//! multiplicative mode, where
//!
//! - `g(t) = k t + m + sum_j delta_j (t - s_j)+` is a piecewise-linear trend
//!   whose slope may change at the changepoints `s_j`, and
//! - `s(t)` is a sum of Fourier series over days since the Unix epoch.
//!
//! Time is scaled to `[0, 1]` over the history and values by their largest
//! magnitude. Parameters are MAP estimates under Gaussian priors, which
//! turns every solve into a ridge regression. Forecast intervals come from
//! simulated paths: future slope changes are drawn at the historical rate
//! with Laplace magnitudes, and Gaussian observation noise is added.

use crate::error::{ForecastError, Result};
use crate::models::{FittedModel, ForecastModel, ForecastResult};
use crate::params::{SeasonalConfig, SeasonalityMode};
use crate::utils::{days_since_epoch, future_dates};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Poisson};
use series_math::regression::ridge;
use series_math::stats::{mean, percentile, variance};
use series_math::transforms::difference;
use std::f64::consts::PI;
use tracing::debug;

/// Prior variance of the base slope and offset
const TREND_PRIOR_VARIANCE: f64 = 25.0;
/// Lower bound on the scaled noise variance used to weight the priors
const NOISE_VARIANCE_FLOOR: f64 = 1e-4;
const NOISE_ITERATIONS: usize = 3;
const MAX_ALTERNATIONS: usize = 50;
const CONVERGENCE_TOLERANCE: f64 = 1e-9;

/// A Fourier seasonal component
#[derive(Debug, Clone, PartialEq)]
pub struct Seasonality {
    pub name: &'static str,
    /// Period in days
    pub period: f64,
    /// Number of sine/cosine pairs
    pub order: usize,
}

impl Seasonality {
    pub fn weekly() -> Self {
        Self {
            name: "weekly",
            period: 7.0,
            order: 3,
        }
    }

    pub fn yearly() -> Self {
        Self {
            name: "yearly",
            period: 365.25,
            order: 10,
        }
    }

    pub fn daily() -> Self {
        Self {
            name: "daily",
            period: 1.0,
            order: 4,
        }
    }

    fn features(&self, day: f64, out: &mut Vec<f64>) {
        for i in 1..=self.order {
            let x = 2.0 * PI * i as f64 * day / self.period;
            out.push(x.sin());
            out.push(x.cos());
        }
    }
}

/// Seasonal trend model
#[derive(Debug, Clone, Default)]
pub struct SeasonalModel {
    config: SeasonalConfig,
}

impl SeasonalModel {
    pub fn new(config: SeasonalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SeasonalConfig {
        &self.config
    }

    fn seasonalities(&self) -> Vec<Seasonality> {
        let mut enabled = Vec::new();
        if self.config.weekly_seasonality {
            enabled.push(Seasonality::weekly());
        }
        if self.config.yearly_seasonality {
            enabled.push(Seasonality::yearly());
        }
        if self.config.daily_seasonality {
            enabled.push(Seasonality::daily());
        }
        enabled
    }
}

impl ForecastModel for SeasonalModel {
    type Fitted = FittedSeasonal;

    fn fit(&self, observations: &[(NaiveDate, f64)]) -> Result<FittedSeasonal> {
        let mut observations = observations.to_vec();
        observations.sort_by_key(|(date, _)| *date);
        observations.dedup_by_key(|(date, _)| *date);
        if observations.iter().any(|(_, v)| !v.is_finite()) {
            return Err(ForecastError::DataError(
                "Seasonal model input contains non-finite values".to_string(),
            ));
        }
        if observations.len() < 2 {
            return Err(ForecastError::InsufficientData {
                required: 2,
                actual: observations.len(),
            });
        }

        let dates: Vec<NaiveDate> = observations.iter().map(|(d, _)| *d).collect();
        let days: Vec<f64> = dates.iter().map(|d| days_since_epoch(*d)).collect();
        let start_day = days[0];
        let day_span = days[days.len() - 1] - start_day;

        let y_scale = observations
            .iter()
            .map(|(_, v)| v.abs())
            .fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let y: Vec<f64> = observations.iter().map(|(_, v)| v / y_scale).collect();
        let t: Vec<f64> = days.iter().map(|d| (d - start_day) / day_span).collect();

        let changepoints = place_changepoints(
            &t,
            self.config.n_changepoints,
            self.config.changepoint_range,
        );
        let seasonalities = self.seasonalities();
        let mut fitted = FittedSeasonal {
            config: self.config.clone(),
            seasonalities,
            dates,
            start_day,
            day_span,
            y_scale,
            changepoints,
            trend: Vec::new(),
            beta: Vec::new(),
            sigma: 0.0,
        };

        let trend_rows: Vec<Vec<f64>> = t.iter().map(|t| fitted.trend_row(*t)).collect();
        let seasonal_rows: Vec<Vec<f64>> = days.iter().map(|d| fitted.seasonal_row(*d)).collect();
        let noise_variance = variance(&difference(&y), 0)
            .map(|v| v / 2.0)
            .unwrap_or(NOISE_VARIANCE_FLOOR);

        let (trend, beta) = match self.config.seasonality_mode {
            SeasonalityMode::Additive => {
                solve_additive(&fitted, &trend_rows, &seasonal_rows, &y, noise_variance)?
            }
            SeasonalityMode::Multiplicative => {
                solve_multiplicative(&fitted, &trend_rows, &seasonal_rows, &y, noise_variance)?
            }
        };
        fitted.trend = trend;
        fitted.beta = beta;

        let residuals: Vec<f64> = t
            .iter()
            .zip(&days)
            .zip(&y)
            .map(|((t, d), y)| y - fitted.fitted_scaled(*t, *d).0)
            .collect();
        fitted.sigma = mean(&residuals.iter().map(|r| r * r).collect::<Vec<_>>())
            .unwrap_or(0.0)
            .sqrt();
        if !fitted.sigma.is_finite() || fitted.trend.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::ModelError(
                "Seasonal fit produced non-finite parameters".to_string(),
            ));
        }

        debug!(
            observations = fitted.dates.len(),
            changepoints = fitted.changepoints.len(),
            sigma = fitted.sigma * y_scale,
            "seasonal model fitted"
        );
        Ok(fitted)
    }

    fn name(&self) -> &str {
        "Seasonal"
    }
}

/// Changepoints at evenly spaced observations of the leading
/// `changepoint_range` share of the history, excluding the first
fn place_changepoints(t: &[f64], requested: usize, range: f64) -> Vec<f64> {
    let history = (t.len() as f64 * range).floor() as usize;
    let count = requested.min(history.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }
    let last = (history - 1) as f64;
    (1..=count)
        .map(|i| {
            let index = (i as f64 * last / count as f64).round() as usize;
            t[index.min(t.len() - 1)]
        })
        .collect()
}

fn trend_penalties(model: &FittedSeasonal, noise_variance: f64) -> Vec<f64> {
    let noise_variance = noise_variance.max(NOISE_VARIANCE_FLOOR);
    let mut penalties = vec![noise_variance / TREND_PRIOR_VARIANCE; 2];
    let tau = model.config.changepoint_prior_scale;
    penalties.extend(std::iter::repeat(noise_variance / (tau * tau)).take(model.changepoints.len()));
    penalties
}

fn seasonal_penalties(model: &FittedSeasonal, noise_variance: f64) -> Vec<f64> {
    let noise_variance = noise_variance.max(NOISE_VARIANCE_FLOOR);
    let scale = model.config.seasonality_prior_scale;
    vec![noise_variance / (scale * scale); model.seasonal_width()]
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn mean_square(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v * v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Joint solve of trend and seasonal coefficients
fn solve_additive(
    model: &FittedSeasonal,
    trend_rows: &[Vec<f64>],
    seasonal_rows: &[Vec<f64>],
    y: &[f64],
    mut noise_variance: f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let width = trend_rows.first().map_or(0, Vec::len);
    let design: Vec<Vec<f64>> = trend_rows
        .iter()
        .zip(seasonal_rows)
        .map(|(tr, sr)| tr.iter().chain(sr).copied().collect())
        .collect();

    let mut coefficients = Vec::new();
    for _ in 0..NOISE_ITERATIONS {
        let mut penalties = trend_penalties(model, noise_variance);
        penalties.extend(seasonal_penalties(model, noise_variance));
        coefficients = ridge(&design, y, &penalties)?;
        noise_variance = mean_square(
            design
                .iter()
                .zip(y)
                .map(|(row, y)| y - dot(row, &coefficients)),
        );
    }

    let beta = coefficients.split_off(width);
    Ok((coefficients, beta))
}

/// Alternate between seasonal and trend solves for `y = g (1 + X beta)`
fn solve_multiplicative(
    model: &FittedSeasonal,
    trend_rows: &[Vec<f64>],
    seasonal_rows: &[Vec<f64>],
    y: &[f64],
    mut noise_variance: f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut trend = ridge(trend_rows, y, &trend_penalties(model, noise_variance))?;
    let mut beta = vec![0.0; model.seasonal_width()];
    if beta.is_empty() {
        return Ok((trend, beta));
    }

    for iteration in 0..MAX_ALTERNATIONS {
        let g: Vec<f64> = trend_rows.iter().map(|row| dot(row, &trend)).collect();
        let weighted: Vec<Vec<f64>> = seasonal_rows
            .iter()
            .zip(&g)
            .map(|(row, g)| row.iter().map(|x| x * g).collect())
            .collect();
        let detrended: Vec<f64> = y.iter().zip(&g).map(|(y, g)| y - g).collect();
        let next_beta = ridge(&weighted, &detrended, &seasonal_penalties(model, noise_variance))?;

        let factors: Vec<f64> = seasonal_rows.iter().map(|row| 1.0 + dot(row, &next_beta)).collect();
        let scaled: Vec<Vec<f64>> = trend_rows
            .iter()
            .zip(&factors)
            .map(|(row, f)| row.iter().map(|x| x * f).collect())
            .collect();
        let next_trend = ridge(&scaled, y, &trend_penalties(model, noise_variance))?;

        let change = trend
            .iter()
            .zip(&next_trend)
            .chain(beta.iter().zip(&next_beta))
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        trend = next_trend;
        beta = next_beta;
        noise_variance = mean_square(
            scaled
                .iter()
                .zip(y)
                .map(|(row, y)| y - dot(row, &trend)),
        );

        if change < CONVERGENCE_TOLERANCE {
            debug!(iteration, "multiplicative fit converged");
            break;
        }
    }

    Ok((trend, beta))
}

/// Fitted seasonal trend model
#[derive(Debug, Clone)]
pub struct FittedSeasonal {
    config: SeasonalConfig,
    seasonalities: Vec<Seasonality>,
    /// Dates of the fitted history
    dates: Vec<NaiveDate>,
    start_day: f64,
    day_span: f64,
    y_scale: f64,
    /// Changepoint locations on the scaled time axis
    changepoints: Vec<f64>,
    /// `[k, m, delta_1..delta_C]`
    trend: Vec<f64>,
    /// Fourier coefficients
    beta: Vec<f64>,
    /// Residual standard deviation on the scaled axis
    sigma: f64,
}

impl FittedSeasonal {
    /// Last date of the fitted history
    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    /// Base slope and offset on the scaled axes
    pub fn base_trend(&self) -> (f64, f64) {
        (self.trend[0], self.trend[1])
    }

    /// Slope changes at the changepoints
    pub fn changepoint_deltas(&self) -> &[f64] {
        &self.trend[2..]
    }

    pub fn seasonalities(&self) -> &[Seasonality] {
        &self.seasonalities
    }

    /// Residual standard deviation on the original scale
    pub fn sigma(&self) -> f64 {
        self.sigma * self.y_scale
    }

    fn seasonal_width(&self) -> usize {
        self.seasonalities.iter().map(|s| 2 * s.order).sum()
    }

    fn scaled_time(&self, day: f64) -> f64 {
        (day - self.start_day) / self.day_span
    }

    fn trend_row(&self, t: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(2 + self.changepoints.len());
        row.push(t);
        row.push(1.0);
        row.extend(self.changepoints.iter().map(|s| (t - s).max(0.0)));
        row
    }

    fn seasonal_row(&self, day: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.seasonal_width());
        for seasonality in &self.seasonalities {
            seasonality.features(day, &mut row);
        }
        row
    }

    /// Scaled fitted value and the seasonal term at one time point
    fn fitted_scaled(&self, t: f64, day: f64) -> (f64, f64) {
        let g = dot(&self.trend_row(t), &self.trend);
        let s = dot(&self.seasonal_row(day), &self.beta);
        let value = match self.config.seasonality_mode {
            SeasonalityMode::Additive => g + s,
            SeasonalityMode::Multiplicative => g * (1.0 + s),
        };
        (value, s)
    }

    /// Point forecasts and interval bounds for arbitrary dates
    pub fn predict_dates(&self, dates: &[NaiveDate]) -> Result<ForecastResult> {
        let days: Vec<f64> = dates.iter().map(|d| days_since_epoch(*d)).collect();
        let t: Vec<f64> = days.iter().map(|d| self.scaled_time(*d)).collect();
        let fitted: Vec<(f64, f64)> = t
            .iter()
            .zip(&days)
            .map(|(t, d)| self.fitted_scaled(*t, *d))
            .collect();
        let values: Vec<f64> = fitted.iter().map(|(v, _)| v * self.y_scale).collect();

        let intervals = if self.config.uncertainty_samples == 0 {
            values.iter().map(|v| (*v, *v)).collect()
        } else {
            self.simulate_intervals(&t, &fitted, &values)?
        };
        ForecastResult::new(values, intervals)
    }

    /// Percentile bounds of simulated paths around the point forecast
    fn simulate_intervals(
        &self,
        t: &[f64],
        fitted: &[(f64, f64)],
        values: &[f64],
    ) -> Result<Vec<(f64, f64)>> {
        let samples = self.config.uncertainty_samples;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let distribution_error = |e: &dyn std::fmt::Display| ForecastError::ModelError(e.to_string());

        let horizon_end = t.iter().copied().fold(1.0, f64::max);
        let change_rate = self.changepoints.len() as f64 * (horizon_end - 1.0);
        let change_count = if change_rate > 0.0 {
            Some(Poisson::new(change_rate).map_err(|e| distribution_error(&e))?)
        } else {
            None
        };
        let laplace_scale = mean(
            &self
                .changepoint_deltas()
                .iter()
                .map(|d| d.abs())
                .collect::<Vec<_>>(),
        )
        .unwrap_or(0.0)
            + 1e-8;
        let magnitude = Exp::new(1.0 / laplace_scale).map_err(|e| distribution_error(&e))?;
        let noise = if self.sigma > 0.0 {
            Some(Normal::new(0.0, self.sigma).map_err(|e| distribution_error(&e))?)
        } else {
            None
        };

        let mut paths = vec![Vec::with_capacity(samples); t.len()];
        let mut new_changes: Vec<(f64, f64)> = Vec::new();
        for _ in 0..samples {
            new_changes.clear();
            if let Some(count) = &change_count {
                let n: f64 = count.sample(&mut rng);
                for _ in 0..n as usize {
                    let location = 1.0 + rng.gen::<f64>() * (horizon_end - 1.0);
                    let size: f64 = magnitude.sample(&mut rng);
                    let delta = if rng.gen_bool(0.5) { size } else { -size };
                    new_changes.push((location, delta));
                }
            }

            for (i, (ti, (_, seasonal))) in t.iter().zip(fitted).enumerate() {
                let drift: f64 = new_changes
                    .iter()
                    .map(|(s, delta)| delta * (ti - s).max(0.0))
                    .sum();
                let drift = match self.config.seasonality_mode {
                    SeasonalityMode::Additive => drift,
                    SeasonalityMode::Multiplicative => drift * (1.0 + seasonal),
                };
                let shock = noise.as_ref().map_or(0.0, |n| n.sample(&mut rng));
                paths[i].push(values[i] + (drift + shock) * self.y_scale);
            }
        }

        let lower_q = (1.0 - self.config.interval_width) / 2.0;
        let upper_q = (1.0 + self.config.interval_width) / 2.0;
        paths
            .into_iter()
            .map(|mut path| {
                path.sort_by(f64::total_cmp);
                Ok((percentile(&path, lower_q)?, percentile(&path, upper_q)?))
            })
            .collect()
    }
}

impl FittedModel for FittedSeasonal {
    /// Forecast the history plus `horizons` following days and keep the
    /// future tail
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let mut dates = self.dates.clone();
        dates.extend(future_dates(self.last_date(), horizons));
        let full = self.predict_dates(&dates)?;

        let start = self.dates.len();
        ForecastResult::new(
            full.values()[start..].to_vec(),
            full.intervals()[start..].to_vec(),
        )
    }

    fn name(&self) -> &str {
        "Seasonal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Days;
    use pretty_assertions::assert_eq;

    fn dated(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start.checked_add_days(Days::new(i as u64)).unwrap(), *v))
            .collect()
    }

    fn weekly_pattern(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 0.2 * i as f64 + 3.0 * (2.0 * PI * i as f64 / 7.0).sin())
            .collect()
    }

    #[test]
    fn test_place_changepoints() {
        let t: Vec<f64> = (0..10).map(|i| i as f64 / 9.0).collect();
        // history = 8, so at most 7 changepoints at indices 1..=7
        let cps = place_changepoints(&t, 25, 0.8);
        assert_eq!(cps.len(), 7);
        assert_relative_eq!(cps[0], t[1]);
        assert_relative_eq!(cps[6], t[7]);

        let cps = place_changepoints(&t, 2, 0.8);
        assert_eq!(cps, vec![t[4], t[7]]);
        assert!(place_changepoints(&t[..1], 25, 0.8).is_empty());
    }

    #[test]
    fn test_seasonal_features() {
        let mut row = Vec::new();
        Seasonality::weekly().features(7.0, &mut row);
        assert_eq!(row.len(), 6);
        assert_relative_eq!(row[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(row[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_tracks_trend_and_weekly_cycle() {
        let values = weekly_pattern(120);
        let config = SeasonalConfig {
            yearly_seasonality: false,
            seasonality_mode: SeasonalityMode::Additive,
            ..SeasonalConfig::default()
        };
        let fitted = SeasonalModel::new(config).unwrap().fit(&dated(&values)).unwrap();
        let forecast = fitted.forecast(7).unwrap();

        for (h, value) in forecast.values().iter().enumerate() {
            let i = 120 + h;
            let expected = 100.0 + 0.2 * i as f64 + 3.0 * (2.0 * PI * i as f64 / 7.0).sin();
            assert_relative_eq!(*value, expected, epsilon = 1.5);
        }
    }

    #[test]
    fn test_multiplicative_forecast_intervals_are_ordered() {
        let values = weekly_pattern(60);
        let fitted = SeasonalModel::default().fit(&dated(&values)).unwrap();
        let forecast = fitted.forecast(10).unwrap();

        assert_eq!(forecast.horizons(), 10);
        for (value, (lower, upper)) in forecast.values().iter().zip(forecast.intervals()) {
            assert!(lower <= value && value <= upper, "{} not in [{}, {}]", value, lower, upper);
        }
    }

    #[test]
    fn test_forecast_is_deterministic() {
        let fitted = SeasonalModel::default().fit(&dated(&weekly_pattern(50))).unwrap();
        let a = fitted.forecast(5).unwrap();
        let b = fitted.forecast(5).unwrap();
        assert_eq!(a.intervals(), b.intervals());
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut observations = dated(&weekly_pattern(30));
        observations.reverse();
        let fitted = SeasonalModel::default().fit(&observations).unwrap();
        assert_eq!(fitted.last_date(), NaiveDate::from_ymd_opt(2023, 1, 31).unwrap());
    }

    #[test]
    fn test_single_observation_is_rejected() {
        let err = SeasonalModel::default().fit(&dated(&[10.0])).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { required: 2, actual: 1 }));
    }
}
