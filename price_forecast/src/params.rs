//! Model hyperparameters and per-request overrides

use crate::error::{ForecastError, Result};
use crate::models::ArimaOrder;
use serde::{Deserialize, Serialize};

/// How seasonal terms combine with the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// `y = g(t) + s(t)`
    Additive,
    /// `y = g(t) * (1 + s(t))`
    Multiplicative,
}

/// Hyperparameters of the seasonal trend model.
///
/// The defaults are tuned for daily closing prices: a fairly stiff trend,
/// multiplicative weekly and yearly seasonality, no intraday component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    /// Prior scale of trend slope changes; larger values bend more easily
    pub changepoint_prior_scale: f64,
    /// Prior scale of the Fourier coefficients
    pub seasonality_prior_scale: f64,
    pub seasonality_mode: SeasonalityMode,
    pub weekly_seasonality: bool,
    pub yearly_seasonality: bool,
    pub daily_seasonality: bool,
    /// Potential changepoints placed in the history
    pub n_changepoints: usize,
    /// Leading fraction of the history that may hold changepoints
    pub changepoint_range: f64,
    /// Coverage of the forecast intervals
    pub interval_width: f64,
    /// Simulated paths used for the intervals; zero gives point intervals
    pub uncertainty_samples: usize,
    /// Seed of the interval simulation
    pub seed: u64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            seasonality_mode: SeasonalityMode::Multiplicative,
            weekly_seasonality: true,
            yearly_seasonality: true,
            daily_seasonality: false,
            n_changepoints: 25,
            changepoint_range: 0.8,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 42,
        }
    }
}

impl SeasonalConfig {
    /// Copy of this configuration with every set override applied
    pub fn with_overrides(&self, overrides: &SeasonalOverrides) -> Self {
        let mut config = self.clone();
        if let Some(v) = overrides.changepoint_prior_scale {
            config.changepoint_prior_scale = v;
        }
        if let Some(v) = overrides.seasonality_prior_scale {
            config.seasonality_prior_scale = v;
        }
        if let Some(v) = overrides.seasonality_mode {
            config.seasonality_mode = v;
        }
        if let Some(v) = overrides.weekly_seasonality {
            config.weekly_seasonality = v;
        }
        if let Some(v) = overrides.yearly_seasonality {
            config.yearly_seasonality = v;
        }
        if let Some(v) = overrides.daily_seasonality {
            config.daily_seasonality = v;
        }
        config
    }

    /// Check that every value is in range
    pub fn validate(&self) -> Result<()> {
        let positive = |value: f64, name: &str| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ForecastError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        };
        positive(self.changepoint_prior_scale, "changepoint_prior_scale")?;
        positive(self.seasonality_prior_scale, "seasonality_prior_scale")?;

        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "changepoint_range must be within (0, 1], got {}",
                self.changepoint_range
            )));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval_width must be within (0, 1), got {}",
                self.interval_width
            )));
        }
        Ok(())
    }
}

/// Per-request replacements for [`SeasonalConfig`] fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalOverrides {
    pub changepoint_prior_scale: Option<f64>,
    pub seasonality_prior_scale: Option<f64>,
    pub seasonality_mode: Option<SeasonalityMode>,
    pub weekly_seasonality: Option<bool>,
    pub yearly_seasonality: Option<bool>,
    pub daily_seasonality: Option<bool>,
}

/// Extra parameters accepted by `train_and_predict`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Applied to the seasonal model
    pub seasonal: SeasonalOverrides,
    /// Fixed ARIMA order; searched automatically when `None`
    pub arima_order: Option<ArimaOrder>,
}

impl ModelParams {
    pub fn with_arima_order(order: ArimaOrder) -> Self {
        Self {
            arima_order: Some(order),
            ..Self::default()
        }
    }

    pub fn with_seasonal(overrides: SeasonalOverrides) -> Self {
        Self {
            seasonal: overrides,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overrides_replace_only_set_fields() {
        let overrides = SeasonalOverrides {
            changepoint_prior_scale: Some(0.5),
            seasonality_mode: Some(SeasonalityMode::Additive),
            ..SeasonalOverrides::default()
        };
        let config = SeasonalConfig::default().with_overrides(&overrides);
        assert_eq!(config.changepoint_prior_scale, 0.5);
        assert_eq!(config.seasonality_mode, SeasonalityMode::Additive);
        assert_eq!(config.seasonality_prior_scale, 10.0);
        assert!(config.weekly_seasonality && config.yearly_seasonality);
        assert!(!config.daily_seasonality);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SeasonalConfig::default().validate().is_ok());

        let config = SeasonalConfig {
            changepoint_prior_scale: 0.0,
            ..SeasonalConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ForecastError::InvalidParameter(_))
        ));

        let config = SeasonalConfig {
            interval_width: 1.0,
            ..SeasonalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_params_from_json() {
        let params: ModelParams =
            serde_json::from_str(r#"{"arima_order": {"p": 2, "d": 1, "q": 0}}"#).unwrap();
        assert_eq!(params.arima_order, Some(ArimaOrder::new(2, 1, 0)));
        assert_eq!(params.seasonal, SeasonalOverrides::default());
    }
}
