//! Date-indexed price series

use crate::{DailyOhlcv, MarketDataError, OhlcvData, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Name of the date column
pub const DATE_COLUMN: &str = "date";
/// Name of the closing price column
pub const CLOSE_COLUMN: &str = "close";
/// Price columns in OHLC order
pub const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", CLOSE_COLUMN];
/// Name of the volume column
pub const VOLUME_COLUMN: &str = "volume";

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Time series of daily prices.
///
/// Holds a `date` column of polars `Date` values plus any number of
/// numeric columns. Values may be missing, either as nulls or `NaN`.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    df: DataFrame,
}

impl PriceSeries {
    /// Wrap an existing DataFrame.
    ///
    /// The `date` column may be a polars `Date`, a `Datetime` or a string
    /// column in `YYYY-MM-DD` form; it is normalized to `Date`.
    pub fn from_dataframe(mut df: DataFrame) -> Result<Self> {
        let column = df
            .column(DATE_COLUMN)
            .map_err(|_| MarketDataError::MissingColumn(DATE_COLUMN.to_string()))?;

        let dates = match column.dtype() {
            DataType::Date => None,
            DataType::Datetime(_, _) => Some(column.cast(&DataType::Date)?),
            DataType::Utf8 => Some(parse_date_strings(column)?),
            other => {
                return Err(MarketDataError::InvalidData(format!(
                    "Column '{}' has unsupported type {}",
                    DATE_COLUMN, other
                )))
            }
        };
        if let Some(dates) = dates {
            df.with_column(dates)?;
        }

        if df.column(DATE_COLUMN)?.null_count() > 0 {
            return Err(MarketDataError::InvalidData(
                "Date column contains missing values".to_string(),
            ));
        }

        Ok(Self { df })
    }

    /// Build a series from provider rows
    pub fn from_bars(bars: &[DailyOhlcv]) -> Result<Self> {
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        let field = |f: fn(&OhlcvData) -> f64| -> Vec<Option<f64>> {
            bars.iter().map(|b| present(f(&b.data))).collect()
        };
        let volumes: Vec<u64> = bars.iter().map(|b| b.data.volume).collect();

        let df = DataFrame::new(vec![
            Series::new(DATE_COLUMN, dates),
            Series::new("open", field(|d| d.open)),
            Series::new("high", field(|d| d.high)),
            Series::new("low", field(|d| d.low)),
            Series::new(CLOSE_COLUMN, field(|d| d.close)),
            Series::new(VOLUME_COLUMN, volumes),
        ])?;

        Ok(Self { df })
    }

    /// Build a close-only series
    pub fn from_closes(dates: Vec<NaiveDate>, closes: Vec<Option<f64>>) -> Result<Self> {
        if dates.len() != closes.len() {
            return Err(MarketDataError::InvalidData(format!(
                "Got {} dates but {} closes",
                dates.len(),
                closes.len()
            )));
        }
        let closes: Vec<Option<f64>> = closes.into_iter().map(|v| v.and_then(present)).collect();
        let df = DataFrame::new(vec![
            Series::new(DATE_COLUMN, dates),
            Series::new(CLOSE_COLUMN, closes),
        ])?;
        Ok(Self { df })
    }

    /// Load a series from a CSV file with a header row.
    ///
    /// Column names are lower-cased so `Date,Close` and `date,close` both work.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();
        df.set_column_names(&names)?;

        Self::from_dataframe(df)
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Check if the series has no rows
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Check whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().iter().any(|c| *c == name)
    }

    /// Row dates in order
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let days = self.df.column(DATE_COLUMN)?.cast(&DataType::Int32)?;
        days.i32()?
            .into_iter()
            .map(|d| d.and_then(epoch_days_to_date))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| MarketDataError::InvalidData("Invalid date in series".to_string()))
    }

    /// Date of the first row
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates().ok().and_then(|d| d.first().copied())
    }

    /// Date of the last row
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates().ok().and_then(|d| d.last().copied())
    }

    /// Values of a numeric column with nulls and `NaN` mapped to `None`
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self
            .df
            .column(name)
            .map_err(|_| MarketDataError::MissingColumn(name.to_string()))?;
        let values = column.cast(&DataType::Float64)?;
        let values = values
            .f64()?
            .into_iter()
            .map(|v| v.and_then(present))
            .collect();
        Ok(values)
    }

    /// Non-missing `(date, value)` pairs of a column
    pub fn observations(&self, name: &str) -> Result<Vec<(NaiveDate, f64)>> {
        let dates = self.dates()?;
        let values = self.column_values(name)?;
        Ok(dates
            .into_iter()
            .zip(values)
            .filter_map(|(date, value)| value.map(|v| (date, v)))
            .collect())
    }

    /// Fraction of rows where the column is missing
    pub fn missing_ratio(&self, name: &str) -> Result<f64> {
        let values = self.column_values(name)?;
        if values.is_empty() {
            return Ok(0.0);
        }
        let missing = values.iter().filter(|v| v.is_none()).count();
        Ok(missing as f64 / values.len() as f64)
    }

    /// Rows with `start <= date <= end`
    pub fn filter_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let flags: Vec<bool> = self
            .dates()?
            .iter()
            .map(|d| *d >= start && *d <= end)
            .collect();
        let mask = Series::new("mask", flags);
        let df = self.df.filter(mask.bool()?)?;
        Ok(Self { df })
    }

    /// Headline figures of the `close` column, see [`crate::metrics::summarize`]
    pub fn summary(&self) -> Result<Option<crate::metrics::PriceSummary>> {
        crate::metrics::summarize(self)
    }

    /// Convert back to provider rows. Missing prices become `NaN`, a missing
    /// volume column becomes zero volume.
    pub fn to_bars(&self) -> Result<Vec<DailyOhlcv>> {
        let dates = self.dates()?;
        let mut columns = Vec::with_capacity(PRICE_COLUMNS.len());
        for name in PRICE_COLUMNS {
            columns.push(self.column_values(name)?);
        }
        let volumes = if self.has_column(VOLUME_COLUMN) {
            self.column_values(VOLUME_COLUMN)?
        } else {
            vec![None; dates.len()]
        };

        let price = |col: usize, row: usize| columns[col][row].unwrap_or(f64::NAN);
        Ok(dates
            .iter()
            .enumerate()
            .map(|(i, date)| DailyOhlcv {
                date: *date,
                data: OhlcvData {
                    open: price(0, i),
                    high: price(1, i),
                    low: price(2, i),
                    close: price(3, i),
                    volume: volumes[i].map(|v| v.max(0.0) as u64).unwrap_or(0),
                },
            })
            .collect())
    }
}

fn present(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn parse_date_strings(column: &Series) -> Result<Series> {
    let mut dates = Vec::with_capacity(column.len());
    for value in column.utf8()?.into_iter() {
        let date = match value {
            Some(raw) => {
                let raw = raw.trim();
                let day = raw.get(..10).unwrap_or(raw);
                Some(NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| {
                    MarketDataError::InvalidData(format!("Cannot parse date '{}': {}", raw, e))
                })?)
            }
            None => None,
        };
        dates.push(date);
    }
    Ok(Series::new(DATE_COLUMN, dates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_from_closes_round_trips_dates() {
        let series =
            PriceSeries::from_closes(vec![day(1), day(2), day(3)], vec![Some(1.0), None, Some(3.0)])
                .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.dates().unwrap(), vec![day(1), day(2), day(3)]);
        assert_eq!(series.last_date(), Some(day(3)));
        assert_eq!(
            series.column_values(CLOSE_COLUMN).unwrap(),
            vec![Some(1.0), None, Some(3.0)]
        );
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let series = PriceSeries::from_closes(
            vec![day(1), day(2), day(3), day(4)],
            vec![Some(1.0), Some(f64::NAN), Some(3.0), Some(4.0)],
        )
        .unwrap();
        assert!((series.missing_ratio(CLOSE_COLUMN).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(series.observations(CLOSE_COLUMN).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_column() {
        let series = PriceSeries::from_closes(vec![day(1)], vec![Some(1.0)]).unwrap();
        assert!(!series.has_column("open"));
        assert!(matches!(
            series.column_values("open"),
            Err(MarketDataError::MissingColumn(name)) if name == "open"
        ));
    }

    #[test]
    fn test_filter_dates() {
        let series = PriceSeries::from_closes(
            (1..=5).map(day).collect(),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
        )
        .unwrap();
        let window = series.filter_dates(day(2), day(4)).unwrap();
        assert_eq!(window.dates().unwrap(), vec![day(2), day(3), day(4)]);
    }

    #[test]
    fn test_bars_round_trip() {
        let bars = vec![DailyOhlcv {
            date: day(1),
            data: OhlcvData {
                open: 10.0,
                high: 11.0,
                low: f64::NAN,
                close: 10.5,
                volume: 1200,
            },
        }];
        let series = PriceSeries::from_bars(&bars).unwrap();
        let back = series.to_bars().unwrap();
        assert_eq!(back[0].date, day(1));
        assert_eq!(back[0].data.volume, 1200);
        assert!(back[0].data.low.is_nan());
        assert_eq!(back[0].data.close, 10.5);
    }
}
