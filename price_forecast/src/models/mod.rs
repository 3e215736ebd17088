//! Forecasting models and the forecast output types they share

use crate::error::{ForecastError, Result};
use crate::utils::future_dates;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::io::Write;
use std::str::FromStr;

#[cfg(feature = "arima")]
pub mod arima;
#[cfg(feature = "seasonal")]
pub mod seasonal;

/// Model families the predictor can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    /// Piecewise-linear trend plus Fourier seasonalities
    Seasonal,
    /// Autoregressive integrated moving average
    Arima,
}

impl ModelKind {
    /// Every kind, in display order
    pub const ALL: [ModelKind; 2] = [ModelKind::Seasonal, ModelKind::Arima];

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Seasonal => "Seasonal",
            ModelKind::Arima => "ARIMA",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    /// Case-insensitive; `prophet` is accepted for the seasonal model
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seasonal" | "prophet" => Ok(ModelKind::Seasonal),
            "arima" => Ok(ModelKind::Arima),
            _ => Err(ForecastError::UnsupportedModel(s.to_string())),
        }
    }
}

/// ARIMA `(p, d, q)` order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// Autoregressive order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// Moving-average order
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.p, self.d, self.q)
    }
}

/// Point forecasts with their interval bounds, without dates
#[derive(Debug, Clone)]
pub struct ForecastResult {
    values: Vec<f64>,
    intervals: Vec<(f64, f64)>,
}

impl ForecastResult {
    /// Create a forecast result; values and intervals must have equal length
    pub fn new(values: Vec<f64>, intervals: Vec<(f64, f64)>) -> Result<Self> {
        if values.len() != intervals.len() {
            return Err(ForecastError::ModelError(format!(
                "Values length ({}) doesn't match intervals length ({})",
                values.len(),
                intervals.len()
            )));
        }
        Ok(Self { values, intervals })
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the `(lower, upper)` bounds
    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    /// Number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.values.len()
    }
}

/// Forecast model that can be fitted on dated observations
pub trait ForecastModel: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: FittedModel;

    /// Fit the model on `(date, value)` pairs
    fn fit(&self, observations: &[(NaiveDate, f64)]) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Fitted model able to forecast the periods after its history
pub trait FittedModel: Debug {
    /// Generate forecasts for the next `horizons` periods
    fn forecast(&self, horizons: usize) -> Result<ForecastResult>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Fitted model state returned by a fit and consumed by the matching predict
#[derive(Debug, Clone)]
pub enum ModelHandle {
    #[cfg(feature = "seasonal")]
    Seasonal(seasonal::FittedSeasonal),
    #[cfg(feature = "arima")]
    Arima(arima::FittedArima),
}

impl ModelHandle {
    /// Kind of the fitted model
    pub fn kind(&self) -> ModelKind {
        match self {
            #[cfg(feature = "seasonal")]
            ModelHandle::Seasonal(_) => ModelKind::Seasonal,
            #[cfg(feature = "arima")]
            ModelHandle::Arima(_) => ModelKind::Arima,
        }
    }

    /// Descriptive name, e.g. `ARIMA(1, 1, 1)`
    pub fn name(&self) -> &str {
        match self {
            #[cfg(feature = "seasonal")]
            ModelHandle::Seasonal(model) => model.name(),
            #[cfg(feature = "arima")]
            ModelHandle::Arima(model) => model.name(),
        }
    }
}

/// One future day of a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Date-indexed forecast rows. Empty when forecasting failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    rows: Vec<ForecastRow>,
}

impl ForecastTable {
    pub fn new(rows: Vec<ForecastRow>) -> Self {
        Self { rows }
    }

    /// Table with no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach consecutive calendar dates starting the day after `last_date`
    pub fn from_forecast(last_date: NaiveDate, forecast: &ForecastResult) -> Self {
        let rows = future_dates(last_date, forecast.horizons())
            .into_iter()
            .zip(forecast.values().iter().zip(forecast.intervals()))
            .map(|(date, (yhat, (lower, upper)))| ForecastRow {
                date,
                yhat: *yhat,
                yhat_lower: *lower,
                yhat_upper: *upper,
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastRow> {
        self.rows.iter()
    }

    /// Convert to a DataFrame with `date`, `yhat`, `yhat_lower` and `yhat_upper` columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let column = |f: fn(&ForecastRow) -> f64| -> Vec<f64> { self.rows.iter().map(f).collect() };
        let df = DataFrame::new(vec![
            Series::new("date", self.dates()),
            Series::new("yhat", column(|r| r.yhat)),
            Series::new("yhat_lower", column(|r| r.yhat_lower)),
            Series::new("yhat_upper", column(|r| r.yhat_upper)),
        ])?;
        Ok(df)
    }

    /// Write the rows as CSV with a header
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Pretty-printed JSON array of the rows
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }
}

impl<'a> IntoIterator for &'a ForecastTable {
    type Item = &'a ForecastRow;
    type IntoIter = std::slice::Iter<'a, ForecastRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
