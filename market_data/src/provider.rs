//! Price history providers

use crate::{DailyOhlcv, MarketDataError, OhlcvData, Result};
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Source of raw daily price history
pub trait PriceProvider {
    /// Fetch daily rows for `ticker` in `[start, end)`.
    ///
    /// An empty vector means the provider knows no data for the range.
    fn fetch_history(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<DailyOhlcv>>;

    /// Name of the provider
    fn name(&self) -> &str;
}

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart API client
#[derive(Debug, Clone)]
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    /// Create a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; topten/0.1)")
            .build()?;
        Ok(Self {
            client,
            base_url: YAHOO_CHART_URL.to_string(),
        })
    }

    /// Point the client at another chart endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            ticker,
            unix_seconds(start),
            unix_seconds(end)
        )
    }
}

impl PriceProvider for YahooProvider {
    fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyOhlcv>> {
        let url = self.build_url(ticker, start, end);
        debug!(%url, "requesting chart");
        let response = self.client.get(&url).send()?.error_for_status()?;
        let body: ChartResponse = response.json()?;
        parse_chart(body)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteColumns {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

fn parse_chart(response: ChartResponse) -> Result<Vec<DailyOhlcv>> {
    if let Some(err) = response.chart.error {
        return Err(MarketDataError::Provider(format!(
            "{}: {}",
            err.code, err.description
        )));
    }

    let Some(data) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();
    let mut rows = Vec::with_capacity(data.timestamp.len());
    for (i, ts) in data.timestamp.iter().enumerate() {
        let date = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| MarketDataError::InvalidData(format!("Bad timestamp {}", ts)))?
            .date_naive();
        rows.push(DailyOhlcv {
            date,
            data: OhlcvData {
                open: at(&quote.open, i).unwrap_or(f64::NAN),
                high: at(&quote.high, i).unwrap_or(f64::NAN),
                low: at(&quote.low, i).unwrap_or(f64::NAN),
                close: at(&quote.close, i).unwrap_or(f64::NAN),
                volume: at(&quote.volume, i).map(|v| v.max(0.0) as u64).unwrap_or(0),
            },
        });
    }

    Ok(rows)
}

fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> Result<Vec<DailyOhlcv>> {
        parse_chart(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_parse_chart_rows() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704805200,1704891600],
            "indicators":{"quote":[{"open":[68.1,null],"high":[69.0,68.5],
            "low":[67.5,67.9],"close":[68.7,68.2],"volume":[1000,null]}]}}],"error":null}}"#;
        let rows = parse(json).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(rows[0].data.close, 68.7);
        assert_eq!(rows[0].data.volume, 1000);
        assert!(rows[1].data.open.is_nan());
        assert_eq!(rows[1].data.volume, 0);
    }

    #[test]
    fn test_parse_chart_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found",
            "description":"No data found, symbol may be delisted"}}}"#;
        let err = parse(json).unwrap_err();
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn test_parse_chart_without_rows() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse(json).unwrap().is_empty());
    }

    #[test]
    fn test_build_url() {
        let provider = YahooProvider::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost/chart");
        let url = provider.build_url(
            "VALE3.SA",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        assert_eq!(
            url,
            "http://localhost/chart/VALE3.SA?period1=1704067200&period2=1704153600&interval=1d&events=history"
        );
    }
}
