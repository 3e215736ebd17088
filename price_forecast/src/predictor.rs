//! Model-agnostic forecasting front end
//!
//! [`Predictor`] validates price series, fits the requested model and turns
//! its output into a [`ForecastTable`]. Only an unsupported model name is
//! reported as an error; every other failure is logged and comes back
//! in-band, as `None`, an empty table, or a [`PredictionResult`] with
//! `success == false`.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastTable, ModelHandle, ModelKind};
use crate::params::{ModelParams, SeasonalConfig};
use crate::registry::ModelRegistry;
use chrono::NaiveDate;
use market_data::series::CLOSE_COLUMN;
use market_data::{AppConfig, MarketDataError, PriceSeries};
use tracing::{error, info, warn};

#[cfg(feature = "arima")]
use crate::models::arima::{find_order, ArimaModel, FittedArima, MIN_OBSERVATIONS};
#[cfg(feature = "arima")]
use crate::models::ArimaOrder;
#[cfg(any(feature = "arima", feature = "seasonal"))]
use crate::models::FittedModel;
#[cfg(feature = "seasonal")]
use crate::models::seasonal::{FittedSeasonal, SeasonalModel};
#[cfg(feature = "seasonal")]
use crate::models::ForecastModel;
#[cfg(feature = "seasonal")]
use crate::params::SeasonalOverrides;

/// Minimum series length `validate` asks for by default
pub const DEFAULT_MIN_PERIODS: usize = 30;
/// Largest share of missing prices `validate` accepts
pub const MAX_MISSING_RATIO: f64 = 0.1;

/// Outcome of [`Predictor::train_and_predict`]
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Model kind that was requested
    pub model_type: ModelKind,
    /// Fitted model, when fitting succeeded
    pub model: Option<ModelHandle>,
    /// Forecast rows, empty on failure
    pub predictions: ForecastTable,
    /// True when a model was fitted and produced a non-empty forecast
    pub success: bool,
    /// Reason of the failure
    pub error: Option<String>,
}

impl PredictionResult {
    fn failed(model_type: ModelKind, model: Option<ModelHandle>, message: String) -> Self {
        Self {
            model_type,
            model,
            predictions: ForecastTable::empty(),
            success: false,
            error: Some(message),
        }
    }
}

/// Forecasting front end over the compiled-in model backends
#[derive(Debug, Clone)]
pub struct Predictor {
    registry: ModelRegistry,
    /// Model kinds the application offers
    supported: Vec<ModelKind>,
    seasonal_config: SeasonalConfig,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor {
    /// Predictor offering every compiled-in model
    pub fn new() -> Self {
        Self {
            registry: ModelRegistry::new(),
            supported: ModelKind::ALL.to_vec(),
            seasonal_config: SeasonalConfig::default(),
        }
    }

    /// Predictor offering the models named in the configuration
    pub fn from_config(config: &AppConfig) -> Self {
        let mut supported = Vec::new();
        for name in &config.supported_models {
            match name.parse::<ModelKind>() {
                Ok(kind) if !supported.contains(&kind) => supported.push(kind),
                Ok(_) => {}
                Err(_) => warn!(model = %name, "ignoring unknown model in configuration"),
            }
        }
        Self {
            supported,
            ..Self::new()
        }
    }

    /// Replace the backend registry
    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the seasonal defaults that per-request overrides apply to
    pub fn with_seasonal_config(mut self, config: SeasonalConfig) -> Self {
        self.seasonal_config = config;
        self
    }

    /// Models that are both offered and backed by a working implementation.
    /// Empty when no forecasting is possible.
    pub fn available_models(&self) -> Vec<ModelKind> {
        self.registry
            .kinds()
            .iter()
            .copied()
            .filter(|kind| self.supported.contains(kind))
            .collect()
    }

    /// Check that the `close` column of a series is fit for forecasting.
    ///
    /// Advisory: the fit and predict methods do not call it.
    pub fn validate(&self, series: &PriceSeries, min_periods: usize) -> (bool, String) {
        self.validate_column(series, CLOSE_COLUMN, min_periods)
    }

    /// Check that `column` of a series is fit for forecasting
    pub fn validate_column(
        &self,
        series: &PriceSeries,
        column: &str,
        min_periods: usize,
    ) -> (bool, String) {
        if series.is_empty() {
            return (false, "empty data".to_string());
        }
        if series.len() < min_periods {
            return (
                false,
                format!(
                    "insufficient data: required {}, got {}",
                    min_periods,
                    series.len()
                ),
            );
        }
        match series.missing_ratio(column) {
            Err(MarketDataError::MissingColumn(name)) => {
                (false, format!("column '{}' not found", name))
            }
            Err(e) => (false, e.to_string()),
            Ok(ratio) if ratio > MAX_MISSING_RATIO => (
                false,
                format!("too many missing values: {:.1}%", ratio * 100.0),
            ),
            Ok(_) => (true, "data valid for forecasting".to_string()),
        }
    }

    /// Pick an ARIMA order `(1, d, 1)` for a series of values
    #[cfg(feature = "arima")]
    pub fn find_arima_order(&self, values: &[f64]) -> ArimaOrder {
        find_order(values)
    }

    /// Fit the seasonal model on `target_column`. Failures are logged and
    /// give `None`.
    #[cfg(feature = "seasonal")]
    pub fn fit_seasonal(
        &self,
        series: &PriceSeries,
        target_column: &str,
        overrides: &SeasonalOverrides,
    ) -> Option<FittedSeasonal> {
        self.try_fit_seasonal(series, target_column, overrides)
            .map_err(|e| error!(target_column, error = %e, "seasonal fit failed"))
            .ok()
    }

    /// Fit an ARIMA model on `target_column`, searching the order when
    /// none is given. Failures are logged and give `None`.
    #[cfg(feature = "arima")]
    pub fn fit_arima(
        &self,
        series: &PriceSeries,
        target_column: &str,
        order: Option<ArimaOrder>,
    ) -> Option<FittedArima> {
        self.try_fit_arima(series, target_column, order)
            .map_err(|e| error!(target_column, error = %e, "ARIMA fit failed"))
            .ok()
    }

    /// Forecast `periods` days after the fitted history. Failures are
    /// logged and give an empty table.
    #[cfg(feature = "seasonal")]
    pub fn predict_seasonal(&self, model: &FittedSeasonal, periods: usize) -> ForecastTable {
        self.try_predict_seasonal(model, periods)
            .unwrap_or_else(|e| {
                error!(error = %e, "seasonal prediction failed");
                ForecastTable::empty()
            })
    }

    /// Forecast `periods` days after `last_date`. Without a date the
    /// forecast is dated from today. Failures are logged and give an empty
    /// table.
    #[cfg(feature = "arima")]
    pub fn predict_arima(
        &self,
        model: &FittedArima,
        periods: usize,
        last_date: Option<NaiveDate>,
    ) -> ForecastTable {
        self.try_predict_arima(model, periods, last_date)
            .unwrap_or_else(|e| {
                error!(error = %e, "ARIMA prediction failed");
                ForecastTable::empty()
            })
    }

    /// Fit `model_type` on `target_column` and forecast `forecast_days`
    /// days past the end of the series.
    ///
    /// Returns an error only when the model name is unknown or not offered.
    pub fn train_and_predict(
        &self,
        series: &PriceSeries,
        model_type: &str,
        target_column: &str,
        forecast_days: usize,
        params: &ModelParams,
    ) -> Result<PredictionResult> {
        let kind: ModelKind = model_type.parse()?;
        if !self.supported.contains(&kind) {
            return Err(ForecastError::UnsupportedModel(model_type.to_string()));
        }
        info!(model = %kind, rows = series.len(), forecast_days, "training model");

        if !self.registry.is_available(kind) {
            let message = format!("{} backend is not available", kind);
            warn!(model = %kind, "{}", message);
            return Ok(PredictionResult::failed(kind, None, message));
        }

        let handle = match self.fit_handle(kind, series, target_column, params) {
            Ok(handle) => handle,
            Err(e) => {
                error!(model = %kind, error = %e, "fit failed");
                return Ok(PredictionResult::failed(kind, None, e.to_string()));
            }
        };

        let last_date = series.dates().ok().and_then(|dates| dates.into_iter().max());
        let result = match self.predict_handle(&handle, forecast_days, last_date) {
            Ok(table) if !table.is_empty() => {
                info!(model = %handle.name(), rows = table.len(), "forecast ready");
                PredictionResult {
                    model_type: kind,
                    model: Some(handle),
                    predictions: table,
                    success: true,
                    error: None,
                }
            }
            Ok(_) => PredictionResult::failed(
                kind,
                Some(handle),
                "forecast produced no rows".to_string(),
            ),
            Err(e) => {
                error!(model = %kind, error = %e, "prediction failed");
                PredictionResult::failed(kind, Some(handle), e.to_string())
            }
        };
        Ok(result)
    }

    #[allow(unused_variables)]
    fn fit_handle(
        &self,
        kind: ModelKind,
        series: &PriceSeries,
        target_column: &str,
        params: &ModelParams,
    ) -> Result<ModelHandle> {
        match kind {
            #[cfg(feature = "seasonal")]
            ModelKind::Seasonal => self
                .try_fit_seasonal(series, target_column, &params.seasonal)
                .map(ModelHandle::Seasonal),
            #[cfg(feature = "arima")]
            ModelKind::Arima => self
                .try_fit_arima(series, target_column, params.arima_order)
                .map(ModelHandle::Arima),
            #[allow(unreachable_patterns)]
            other => Err(ForecastError::ModelError(format!(
                "{} backend is not compiled in",
                other
            ))),
        }
    }

    #[allow(unused_variables)]
    fn predict_handle(
        &self,
        handle: &ModelHandle,
        periods: usize,
        last_date: Option<NaiveDate>,
    ) -> Result<ForecastTable> {
        match handle {
            #[cfg(feature = "seasonal")]
            ModelHandle::Seasonal(model) => self.try_predict_seasonal(model, periods),
            #[cfg(feature = "arima")]
            ModelHandle::Arima(model) => self.try_predict_arima(model, periods, last_date),
        }
    }

    #[cfg(feature = "seasonal")]
    fn try_fit_seasonal(
        &self,
        series: &PriceSeries,
        target_column: &str,
        overrides: &SeasonalOverrides,
    ) -> Result<FittedSeasonal> {
        let observations = target_observations(series, target_column)?;
        let model = SeasonalModel::new(self.seasonal_config.with_overrides(overrides))?;
        let fitted = model.fit(&observations)?;
        let seasonalities: Vec<&str> = fitted.seasonalities().iter().map(|s| s.name).collect();
        info!(
            target_column,
            observations = observations.len(),
            changepoints = fitted.changepoints().len(),
            ?seasonalities,
            sigma = fitted.sigma(),
            "seasonal model fitted"
        );
        let (slope, offset) = fitted.base_trend();
        tracing::debug!(slope, offset, deltas = ?fitted.changepoint_deltas(), "seasonal trend");
        Ok(fitted)
    }

    #[cfg(feature = "arima")]
    fn try_fit_arima(
        &self,
        series: &PriceSeries,
        target_column: &str,
        order: Option<ArimaOrder>,
    ) -> Result<FittedArima> {
        let values: Vec<f64> = target_observations(series, target_column)?
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        if values.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientData {
                required: MIN_OBSERVATIONS,
                actual: values.len(),
            });
        }

        let model = order.map_or_else(ArimaModel::auto, ArimaModel::new);
        let fitted = model.fit_values(&values)?;
        info!(
            target_column,
            order = %fitted.order(),
            nobs = fitted.nobs(),
            sigma2 = fitted.sigma2(),
            "ARIMA model fitted"
        );
        Ok(fitted)
    }

    #[cfg(feature = "seasonal")]
    fn try_predict_seasonal(&self, model: &FittedSeasonal, periods: usize) -> Result<ForecastTable> {
        let forecast = model.forecast(periods)?;
        Ok(ForecastTable::from_forecast(model.last_date(), &forecast))
    }

    #[cfg(feature = "arima")]
    fn try_predict_arima(
        &self,
        model: &FittedArima,
        periods: usize,
        last_date: Option<NaiveDate>,
    ) -> Result<ForecastTable> {
        let last_date = last_date.unwrap_or_else(|| {
            warn!("no last historical date given, dating the forecast from today");
            chrono::Local::now().date_naive()
        });
        let forecast = model.forecast(periods)?;
        Ok(ForecastTable::from_forecast(last_date, &forecast))
    }
}

/// Non-missing `(date, value)` pairs of a column in date order
#[cfg(any(feature = "arima", feature = "seasonal"))]
fn target_observations(series: &PriceSeries, column: &str) -> Result<Vec<(NaiveDate, f64)>> {
    if series.is_empty() {
        return Err(ForecastError::DataError("empty data".to_string()));
    }
    let mut observations = series.observations(column)?;
    observations.sort_by_key(|(date, _)| *date);
    Ok(observations)
}
