use chrono::NaiveDate;
use market_data::utils::generate_test_data;
use market_data::{
    AppConfig, DailyOhlcv, DataLoader, MarketDataError, PriceProvider, PriceSeries,
};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

/// Provider that fails a fixed number of times before returning its rows
struct MockProvider {
    rows: Vec<DailyOhlcv>,
    failures: Cell<u32>,
    calls: Cell<u32>,
}

impl MockProvider {
    fn new(rows: Vec<DailyOhlcv>, failures: u32) -> Self {
        Self {
            rows,
            failures: Cell::new(failures),
            calls: Cell::new(0),
        }
    }
}

impl PriceProvider for MockProvider {
    fn fetch_history(
        &self,
        _ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> market_data::Result<Vec<DailyOhlcv>> {
        self.calls.set(self.calls.get() + 1);
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(MarketDataError::Provider("connection reset".to_string()));
        }
        Ok(self
            .rows
            .iter()
            .filter(|r| r.date >= start && r.date < end)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn test_config(dir: &TempDir) -> AppConfig {
    AppConfig {
        cache_dir: dir.path().join("cache"),
        retry_delay_secs: 0,
        ..AppConfig::default()
    }
}

fn range() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
    )
}

#[test]
fn test_invalid_ticker_is_rejected() {
    let dir = TempDir::new().unwrap();
    let loader = DataLoader::new(MockProvider::new(Vec::new(), 0), &test_config(&dir), false).unwrap();
    let (start, end) = range();

    let err = loader.load_ticker_data("AAPL", start, end, false).unwrap_err();
    assert!(matches!(err, MarketDataError::InvalidTicker(_)));
    assert_eq!(loader.provider().calls.get(), 0);
}

#[test]
fn test_retries_then_succeeds() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new(generate_test_data(90, 50.0, 0.02, 1), 2);
    let loader = DataLoader::new(provider, &test_config(&dir), false).unwrap();
    let (start, end) = range();

    let series = loader.load_ticker_data("VALE3.SA", start, end, false).unwrap();
    assert_eq!(series.len(), 59);
    assert_eq!(loader.provider().calls.get(), 3);
}

#[test]
fn test_gives_up_after_max_retries() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new(generate_test_data(90, 50.0, 0.02, 1), 10);
    let loader = DataLoader::new(provider, &test_config(&dir), false).unwrap();
    let (start, end) = range();

    let err = loader.load_ticker_data("VALE3.SA", start, end, false).unwrap_err();
    assert!(matches!(err, MarketDataError::Provider(_)));
    assert_eq!(loader.provider().calls.get(), 3);
}

#[test]
fn test_empty_provider_result_is_no_data() {
    let dir = TempDir::new().unwrap();
    let loader = DataLoader::new(MockProvider::new(Vec::new(), 0), &test_config(&dir), false).unwrap();
    let (start, end) = range();

    let err = loader.load_ticker_data("PETR4.SA", start, end, false).unwrap_err();
    assert!(matches!(err, MarketDataError::NoData(_)));
    assert_eq!(loader.provider().calls.get(), 1);
}

#[test]
fn test_cache_is_written_and_reused() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let provider = MockProvider::new(generate_test_data(90, 50.0, 0.02, 3), 0);
    let loader = DataLoader::new(provider, &config, true).unwrap();
    let (start, end) = range();

    let first = loader.load_ticker_data("ITUB4.SA", start, end, false).unwrap();
    assert!(config.cache_path("ITUB4.SA").exists());

    let second = loader.load_ticker_data("ITUB4.SA", start, end, false).unwrap();
    assert_eq!(loader.provider().calls.get(), 1);
    assert_eq!(first.dates().unwrap(), second.dates().unwrap());

    loader.load_ticker_data("ITUB4.SA", start, end, true).unwrap();
    assert_eq!(loader.provider().calls.get(), 2);
}

#[test]
fn test_load_multiple_skips_failures() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new(generate_test_data(90, 20.0, 0.02, 5), 0);
    let loader = DataLoader::new(provider, &test_config(&dir), false).unwrap();
    let (start, end) = range();

    let tickers = vec!["VALE3.SA".to_string(), "bad".to_string(), "WEGE3.SA".to_string()];
    let loaded = loader.load_multiple_tickers(&tickers, start, end, false);
    assert_eq!(
        loaded.keys().cloned().collect::<Vec<_>>(),
        vec!["VALE3.SA".to_string(), "WEGE3.SA".to_string()]
    );
}

#[test]
fn test_clear_cache() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let provider = MockProvider::new(generate_test_data(90, 20.0, 0.02, 9), 0);
    let loader = DataLoader::new(provider, &config, true).unwrap();
    let (start, end) = range();

    loader.load_ticker_data("VALE3.SA", start, end, false).unwrap();
    loader.load_ticker_data("PETR4.SA", start, end, false).unwrap();
    std::fs::write(config.cache_dir.join("notes.txt"), "keep me").unwrap();

    assert_eq!(loader.clear_cache(Some("VALE3.SA")).unwrap(), 1);
    assert_eq!(loader.clear_cache(Some("VALE3.SA")).unwrap(), 0);
    assert_eq!(loader.clear_cache(None).unwrap(), 1);
    assert!(config.cache_dir.join("notes.txt").exists());
}

#[test]
fn test_top_volume_tickers() {
    let dir = TempDir::new().unwrap();
    let loader = DataLoader::new(MockProvider::new(Vec::new(), 0), &test_config(&dir), false).unwrap();
    let top = loader.top_volume_tickers(3);
    assert_eq!(top, vec!["VALE3.SA", "PETR4.SA", "ITUB4.SA"]);
}

#[test]
fn test_price_series_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
    writeln!(file, "2023-01-02,100.0,105.0,98.0,103.0,1000").unwrap();
    writeln!(file, "2023-01-03,103.0,107.0,101.0,106.0,1200").unwrap();
    writeln!(file, "2023-01-04,106.0,110.0,104.0,108.0,1500").unwrap();

    let series = PriceSeries::from_csv(file.path()).unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(
        series.first_date(),
        Some(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap())
    );
    assert_eq!(
        series.column_values("close").unwrap(),
        vec![Some(103.0), Some(106.0), Some(108.0)]
    );
}
