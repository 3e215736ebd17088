//! ARIMA models for time series forecasting
//!
//! The series is differenced `d` times and an ARMA(p, q) model is fitted
//! to the result by conditional sum of squares. A mean term is estimated
//! only when `d = 0`. Coefficients are searched in an unconstrained space
//! and mapped into the stationary (AR) and invertible (MA) regions, so
//! the Nelder-Mead search never leaves them.

use crate::error::{ForecastError, Result};
use crate::models::{ArimaOrder, FittedModel, ForecastModel, ForecastResult};
use crate::stationarity::{adf_test, SIGNIFICANCE_LEVEL};
use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::neldermead::NelderMead;
use chrono::NaiveDate;
use series_math::stats::{mean, normal_quantile};
use series_math::transforms::{difference, difference_n, integrate};
use tracing::{debug, warn};

/// Fewest non-missing observations an ARIMA fit accepts
pub const MIN_OBSERVATIONS: usize = 10;
/// Differencing is never applied more often than this during order search
pub const MAX_DIFFERENCING: usize = 2;
/// Coverage of the forecast intervals
pub const INTERVAL_LEVEL: f64 = 0.95;

const MAX_ITERATIONS: u64 = 1000;
const INITIAL_STEP: f64 = 0.5;
const SD_TOLERANCE: f64 = 1e-12;
const INFEASIBLE_COST: f64 = 1e30;

/// Pick `(1, d, 1)` with the smallest `d <= 2` that makes the series pass
/// the ADF test.
///
/// A test that cannot be computed counts as non-stationary. When the series
/// still looks non-stationary after two differences, `d` stays at 2.
pub fn find_order(values: &[f64]) -> ArimaOrder {
    let mut current = values.to_vec();
    let mut d = 0;
    loop {
        let p_value = match adf_test(&current) {
            Ok(result) => result.p_value,
            Err(e) => {
                warn!(d, error = %e, "stationarity test failed, assuming non-stationary");
                1.0
            }
        };
        debug!(d, p_value, "stationarity test");
        if p_value < SIGNIFICANCE_LEVEL || d >= MAX_DIFFERENCING {
            break;
        }
        current = difference(&current);
        d += 1;
    }
    ArimaOrder::new(1, d, 1)
}

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone)]
pub struct ArimaModel {
    /// Name of the model
    name: String,
    /// Fixed order, or `None` to search for one at fit time
    order: Option<ArimaOrder>,
}

impl ArimaModel {
    /// Create a model with a fixed order
    pub fn new(order: ArimaOrder) -> Self {
        Self {
            name: format!("ARIMA{}", order),
            order: Some(order),
        }
    }

    /// Create a model whose order is chosen by [`find_order`]
    pub fn auto() -> Self {
        Self {
            name: "ARIMA(auto)".to_string(),
            order: None,
        }
    }

    pub fn order(&self) -> Option<ArimaOrder> {
        self.order
    }

    /// Fit on plain values in time order
    pub fn fit_values(&self, values: &[f64]) -> Result<FittedArima> {
        if values.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientData {
                required: MIN_OBSERVATIONS,
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(
                "ARIMA input contains non-finite values".to_string(),
            ));
        }

        let order = self.order.unwrap_or_else(|| find_order(values));
        let ArimaOrder { p, d, q } = order;
        let differenced = difference_n(values, d);
        if differenced.len() <= p + q + 1 {
            return Err(ForecastError::InsufficientData {
                required: p + q + d + 2,
                actual: values.len(),
            });
        }

        let level = if d == 0 {
            mean(&differenced).unwrap_or(0.0)
        } else {
            0.0
        };
        let problem = ConditionalSumOfSquares {
            series: differenced.iter().map(|v| v - level).collect(),
            p,
            q,
        };
        let params = if p + q == 0 {
            Vec::new()
        } else {
            minimize(&problem)?
        };

        let (ar, ma) = problem.coefficients(&params);
        let residuals = problem.residuals(&ar, &ma);
        let effective = problem.series.len() - p;
        let css: f64 = residuals[p..].iter().map(|e| e * e).sum();
        let sigma2 = css / effective as f64;
        if !sigma2.is_finite() {
            return Err(ForecastError::ModelError(format!(
                "Innovation variance is not finite for ARIMA{}",
                order
            )));
        }

        Ok(FittedArima {
            name: format!("ARIMA{}", order),
            order,
            ar,
            ma,
            mean: level,
            sigma2,
            history: values.to_vec(),
            centered: problem.series,
            residuals,
        })
    }
}

impl ForecastModel for ArimaModel {
    type Fitted = FittedArima;

    fn fit(&self, observations: &[(NaiveDate, f64)]) -> Result<FittedArima> {
        let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
        self.fit_values(&values)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fitted ARIMA model
#[derive(Debug, Clone)]
pub struct FittedArima {
    /// Name of the model
    name: String,
    order: ArimaOrder,
    /// AR coefficients `phi_1..phi_p`
    ar: Vec<f64>,
    /// MA coefficients `theta_1..theta_q`
    ma: Vec<f64>,
    /// Mean of the differenced series, zero when `d > 0`
    mean: f64,
    /// Innovation variance
    sigma2: f64,
    /// Observed values on the original scale
    history: Vec<f64>,
    /// Differenced series minus its mean
    centered: Vec<f64>,
    /// In-sample innovations
    residuals: Vec<f64>,
}

impl FittedArima {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Number of observations the model was fitted on
    pub fn nobs(&self) -> usize {
        self.history.len()
    }

    /// Point forecasts on the differenced scale, mean included
    fn forecast_differenced(&self, horizons: usize) -> Vec<f64> {
        let n = self.centered.len();
        let mut values = self.centered.clone();
        let mut shocks = self.residuals.clone();
        for t in n..n + horizons {
            let ar: f64 = lagged(&self.ar, &values, t);
            let ma: f64 = lagged(&self.ma, &shocks, t);
            values.push(ar + ma);
            shocks.push(0.0);
        }
        values[n..].iter().map(|v| v + self.mean).collect()
    }
}

impl FittedModel for FittedArima {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let differenced = self.forecast_differenced(horizons);
        let point = integrate(&differenced, &self.history, self.order.d)?;

        let z = normal_quantile(0.5 + INTERVAL_LEVEL / 2.0)?;
        let psi = psi_weights(&self.ar, &self.ma, self.order.d, horizons);
        let mut variance_sum = 0.0;
        let intervals = point
            .iter()
            .zip(&psi)
            .map(|(y, weight)| {
                variance_sum += weight * weight;
                let half_width = z * (self.sigma2 * variance_sum).sqrt();
                (y - half_width, y + half_width)
            })
            .collect();

        ForecastResult::new(point, intervals)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `sum_i coefficients[i] * values[t - 1 - i]` over the lags that exist
fn lagged(coefficients: &[f64], values: &[f64], t: usize) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < t)
        .map(|(i, c)| c * values[t - 1 - i])
        .sum()
}

/// Map unconstrained values onto the coefficients of a stationary AR
/// polynomial through partial autocorrelations (Monahan, 1984)
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    let partial: Vec<f64> = unconstrained
        .iter()
        .map(|u| u / (1.0 + u * u).sqrt())
        .collect();
    let mut y = vec![vec![0.0; n]; n];
    for k in 0..n {
        for i in 0..k {
            y[k][i] = y[k - 1][i] + partial[k] * y[k - 1][k - i - 1];
        }
        y[k][k] = partial[k];
    }
    y.last()
        .map(|row| row.iter().map(|v| -v).collect())
        .unwrap_or_default()
}

/// MA(infinity) weights `psi_0..psi_{count-1}` of the integrated model
fn psi_weights(ar: &[f64], ma: &[f64], d: usize, count: usize) -> Vec<f64> {
    // phi(B) (1 - B)^d as 1 - sum(phi*_i B^i)
    let mut polynomial = Vec::with_capacity(ar.len() + d + 1);
    polynomial.push(1.0);
    polynomial.extend(ar.iter().map(|phi| -phi));
    for _ in 0..d {
        let mut next = vec![0.0; polynomial.len() + 1];
        for (i, c) in polynomial.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c;
        }
        polynomial = next;
    }
    let integrated_ar: Vec<f64> = polynomial[1..].iter().map(|c| -c).collect();

    let mut psi: Vec<f64> = Vec::with_capacity(count);
    for j in 0..count {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let ma_term = ma.get(j - 1).copied().unwrap_or(0.0);
        let ar_term: f64 = lagged(&integrated_ar, &psi, j);
        psi.push(ma_term + ar_term);
    }
    psi
}

/// Conditional sum of squares of a zero-mean ARMA(p, q)
#[derive(Debug, Clone)]
struct ConditionalSumOfSquares {
    series: Vec<f64>,
    p: usize,
    q: usize,
}

impl ConditionalSumOfSquares {
    fn coefficients(&self, params: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let ar = constrain_stationary(&params[..self.p]);
        let ma = constrain_stationary(&params[self.p..self.p + self.q])
            .into_iter()
            .map(|c| -c)
            .collect();
        (ar, ma)
    }

    /// Innovations, zero for the first `p` observations
    fn residuals(&self, ar: &[f64], ma: &[f64]) -> Vec<f64> {
        let mut shocks = vec![0.0; self.series.len()];
        for t in self.p..self.series.len() {
            let predicted = lagged(ar, &self.series, t) + lagged(ma, &shocks, t);
            shocks[t] = self.series[t] - predicted;
        }
        shocks
    }

    fn css(&self, params: &[f64]) -> f64 {
        let (ar, ma) = self.coefficients(params);
        let total: f64 = self.residuals(&ar, &ma).iter().map(|e| e * e).sum();
        if total.is_finite() {
            total
        } else {
            INFEASIBLE_COST
        }
    }
}

impl CostFunction for ConditionalSumOfSquares {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        Ok(self.css(params))
    }
}

fn minimize(problem: &ConditionalSumOfSquares) -> Result<Vec<f64>> {
    let dim = problem.p + problem.q;
    let start = vec![0.0; dim];
    let mut simplex = vec![start.clone()];
    for i in 0..dim {
        let mut vertex = start.clone();
        vertex[i] += INITIAL_STEP;
        simplex.push(vertex);
    }

    let tolerance = SD_TOLERANCE * (1.0 + problem.css(&start));
    let solver = NelderMead::new(simplex).with_sd_tolerance(tolerance)?;
    let result = Executor::new(problem.clone(), solver)
        .configure(|state| state.max_iters(MAX_ITERATIONS))
        .run()?;

    let state = result.state();
    debug!(
        iterations = state.get_iter(),
        css = state.get_best_cost(),
        "conditional sum of squares minimized"
    );
    state
        .get_best_param()
        .cloned()
        .ok_or_else(|| ForecastError::ModelError("Optimizer returned no parameters".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn white_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..n).map(|_| normal.sample(&mut rng)).collect()
    }

    fn ar1(n: usize, phi: f64, level: f64, seed: u64) -> Vec<f64> {
        let noise = white_noise(n, seed);
        let mut values = Vec::with_capacity(n);
        let mut prev = 0.0;
        for e in noise {
            prev = phi * prev + e;
            values.push(level + prev);
        }
        values
    }

    #[test]
    fn test_constrain_single_coefficient() {
        assert_eq!(constrain_stationary(&[]), Vec::<f64>::new());
        let phi = constrain_stationary(&[1.0]);
        assert_relative_eq!(phi[0], -1.0 / 2f64.sqrt(), epsilon = 1e-12);
        assert!(constrain_stationary(&[1e6])[0].abs() < 1.0);
    }

    #[test]
    fn test_constrain_two_coefficients_stationary() {
        for u in [[-5.0, 3.0], [2.0, -4.0], [10.0, 10.0]] {
            let phi = constrain_stationary(&u);
            assert!(phi[1].abs() < 1.0);
            assert!(phi[0] + phi[1] < 1.0);
            assert!(phi[1] - phi[0] < 1.0);
        }
    }

    #[test]
    fn test_psi_weights() {
        let psi = psi_weights(&[0.5], &[], 0, 4);
        assert_eq!(psi, vec![1.0, 0.5, 0.25, 0.125]);

        let random_walk = psi_weights(&[], &[], 1, 3);
        assert_eq!(random_walk, vec![1.0, 1.0, 1.0]);

        let arma = psi_weights(&[0.5], &[0.3], 0, 3);
        assert_relative_eq!(arma[1], 0.8, epsilon = 1e-12);
        assert_relative_eq!(arma[2], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_find_order_white_noise_needs_no_differencing() {
        assert_eq!(find_order(&white_noise(200, 11)), ArimaOrder::new(1, 0, 1));
    }

    #[test]
    fn test_find_order_constant_series_caps_at_two() {
        assert_eq!(find_order(&[3.0; 50]), ArimaOrder::new(1, 2, 1));
    }

    #[test]
    fn test_find_order_random_walk_bounded() {
        let walk: Vec<f64> = white_noise(150, 5)
            .iter()
            .scan(100.0, |level, e| {
                *level += e;
                Some(*level)
            })
            .collect();
        let order = find_order(&walk);
        assert!(order.d <= MAX_DIFFERENCING);
        assert_eq!((order.p, order.q), (1, 1));
    }

    #[test]
    fn test_fit_recovers_ar_coefficient() {
        let values = ar1(400, 0.6, 50.0, 3);
        let fitted = ArimaModel::new(ArimaOrder::new(1, 0, 0))
            .fit_values(&values)
            .unwrap();
        assert_relative_eq!(fitted.ar_coefficients()[0], 0.6, epsilon = 0.12);
        assert_relative_eq!(fitted.sigma2(), 1.0, epsilon = 0.25);
        assert_eq!(fitted.name(), "ARIMA(1, 0, 0)");
    }

    #[test]
    fn test_forecast_reverts_to_mean_with_widening_intervals() {
        let values = ar1(300, 0.5, 20.0, 8);
        let fitted = ArimaModel::new(ArimaOrder::new(1, 0, 1))
            .fit_values(&values)
            .unwrap();
        let forecast = fitted.forecast(30).unwrap();

        assert_eq!(forecast.horizons(), 30);
        let last = forecast.values()[29];
        assert!((last - 20.0).abs() < 1.0);
        let widths: Vec<f64> = forecast.intervals().iter().map(|(l, u)| u - l).collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0] - 1e-12));
        for (value, (lower, upper)) in forecast.values().iter().zip(forecast.intervals()) {
            assert!(lower <= value && value <= upper);
        }
    }

    #[test]
    fn test_integrated_forecast_continues_level() {
        let values: Vec<f64> = (0..60).map(|t| 10.0 + 0.5 * t as f64 + (t % 3) as f64 * 0.1).collect();
        let fitted = ArimaModel::new(ArimaOrder::new(0, 1, 0))
            .fit_values(&values)
            .unwrap();
        let forecast = fitted.forecast(3).unwrap();
        // Random walk: every step repeats the last observation
        assert!(forecast.values().iter().all(|v| (*v - values[59]).abs() < 1e-9));
    }

    #[test]
    fn test_too_few_observations() {
        let err = ArimaModel::auto()
            .fit_values(&[1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData {
                required: 10,
                actual: 5
            }
        ));
    }
}
