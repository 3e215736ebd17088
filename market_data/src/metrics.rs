//! Headline figures of a price series

use crate::series::{PriceSeries, CLOSE_COLUMN, VOLUME_COLUMN};
use crate::{MarketDataError, Result};
use serde::Serialize;
use series_math::stats::mean;

/// Latest price, last daily change and range of a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    /// Latest close
    pub current_price: f64,
    /// Latest close minus the previous close
    pub price_change: f64,
    /// `price_change` as a percentage of the previous close; zero when the
    /// previous close is zero
    pub price_change_pct: f64,
    pub max_price: f64,
    pub min_price: f64,
    /// Mean volume; zero without a volume column
    pub avg_volume: f64,
}

/// Summarize the closes of a series.
///
/// `None` when the series is empty, has no `close` column, or has no
/// present close. A single close counts as its own previous close.
pub fn summarize(series: &PriceSeries) -> Result<Option<PriceSummary>> {
    if series.is_empty() {
        return Ok(None);
    }
    let mut closes = match series.observations(CLOSE_COLUMN) {
        Ok(closes) => closes,
        Err(MarketDataError::MissingColumn(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    closes.sort_by_key(|(date, _)| *date);

    let Some(&(_, current_price)) = closes.last() else {
        return Ok(None);
    };
    let previous_price = if closes.len() > 1 {
        closes[closes.len() - 2].1
    } else {
        current_price
    };

    let price_change = current_price - previous_price;
    let price_change_pct = if previous_price != 0.0 {
        price_change / previous_price * 100.0
    } else {
        0.0
    };
    let (min_price, max_price) = closes
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| {
            (lo.min(*v), hi.max(*v))
        });

    let avg_volume = if series.has_column(VOLUME_COLUMN) {
        let volumes: Vec<f64> = series
            .column_values(VOLUME_COLUMN)?
            .into_iter()
            .flatten()
            .collect();
        mean(&volumes).unwrap_or(0.0)
    } else {
        0.0
    };

    Ok(Some(PriceSummary {
        current_price,
        price_change,
        price_change_pct,
        max_price,
        min_price,
        avg_volume,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DailyOhlcv, OhlcvData};
    use approx::assert_relative_eq;
    use chrono::{Days, NaiveDate};
    use pretty_assertions::assert_eq;
    use polars::prelude::NamedFrom;

    fn bars(closes: &[f64], volumes: &[u64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let rows: Vec<DailyOhlcv> = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (close, volume))| DailyOhlcv {
                date: start.checked_add_days(Days::new(i as u64)).unwrap(),
                data: OhlcvData {
                    open: *close,
                    high: *close,
                    low: *close,
                    close: *close,
                    volume: *volume,
                },
            })
            .collect();
        PriceSeries::from_bars(&rows).unwrap()
    }

    #[test]
    fn test_summary_of_several_days() {
        let summary = summarize(&bars(&[10.0, 12.0, 9.0, 11.0], &[100, 200, 300, 400]))
            .unwrap()
            .unwrap();
        assert_relative_eq!(summary.current_price, 11.0);
        assert_relative_eq!(summary.price_change, 2.0);
        assert_relative_eq!(summary.price_change_pct, 2.0 / 9.0 * 100.0);
        assert_relative_eq!(summary.max_price, 12.0);
        assert_relative_eq!(summary.min_price, 9.0);
        assert_relative_eq!(summary.avg_volume, 250.0);
    }

    #[test]
    fn test_single_row_has_no_change() {
        let summary = summarize(&bars(&[42.5], &[1000])).unwrap().unwrap();
        assert_eq!(
            summary,
            PriceSummary {
                current_price: 42.5,
                price_change: 0.0,
                price_change_pct: 0.0,
                max_price: 42.5,
                min_price: 42.5,
                avg_volume: 1000.0,
            }
        );
    }

    #[test]
    fn test_zero_previous_close_gives_zero_percent() {
        let summary = summarize(&bars(&[5.0, 0.0, 3.0], &[1, 1, 1])).unwrap().unwrap();
        assert_relative_eq!(summary.price_change, 3.0);
        assert_eq!(summary.price_change_pct, 0.0);
        assert_relative_eq!(summary.min_price, 0.0);
    }

    #[test]
    fn test_empty_or_closeless_series_has_no_summary() {
        assert_eq!(summarize(&bars(&[], &[])).unwrap(), None);

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let df = polars::prelude::DataFrame::new(vec![
            polars::prelude::Series::new("date", vec![start]),
            polars::prelude::Series::new("open", vec![1.0]),
        ])
        .unwrap();
        let series = PriceSeries::from_dataframe(df).unwrap();
        assert_eq!(summarize(&series).unwrap(), None);
    }

    #[test]
    fn test_missing_volume_column_averages_zero() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = PriceSeries::from_closes(
            vec![start, start + Days::new(1)],
            vec![Some(20.0), Some(21.0)],
        )
        .unwrap();
        let summary = summarize(&series).unwrap().unwrap();
        assert_eq!(summary.avg_volume, 0.0);
        assert_relative_eq!(summary.price_change_pct, 5.0);
    }
}
