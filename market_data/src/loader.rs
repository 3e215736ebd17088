//! Cache-or-fetch loading of ticker history

use crate::cache::ParquetCache;
use crate::config::{validate_ticker, AppConfig};
use crate::provider::PriceProvider;
use crate::{DailyOhlcv, MarketDataError, PriceSeries, Result};
use chrono::NaiveDate;
use series_math::transforms::interpolate_linear;
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Loads daily history for tickers, going through the disk cache when enabled
#[derive(Debug)]
pub struct DataLoader<P: PriceProvider> {
    provider: P,
    cache: ParquetCache,
    use_cache: bool,
    max_retries: u32,
    retry_delay: Duration,
    default_tickers: Vec<String>,
}

impl<P: PriceProvider> DataLoader<P> {
    /// Create a loader. The cache directory is created when caching is enabled.
    pub fn new(provider: P, config: &AppConfig, use_cache: bool) -> Result<Self> {
        let cache = ParquetCache::from_config(config);
        if use_cache {
            cache.ensure_dir()?;
        }
        Ok(Self {
            provider,
            cache,
            use_cache,
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            default_tickers: config.default_tickers.clone(),
        })
    }

    /// Get the underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the cache
    pub fn cache(&self) -> &ParquetCache {
        &self.cache
    }

    /// Load the history of one ticker between `start` and `end`, inclusive.
    ///
    /// A fresh cache file is used unless `force_refresh` is set. Fetched data
    /// is cleaned and written back to the cache; a failed write only logs.
    pub fn load_ticker_data(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
    ) -> Result<PriceSeries> {
        if !validate_ticker(ticker) {
            error!(ticker, "invalid ticker");
            return Err(MarketDataError::InvalidTicker(ticker.to_string()));
        }

        if self.use_cache && !force_refresh && self.cache.is_fresh(ticker) {
            info!(ticker, "loading from cache");
            match self.read_cached(ticker, start, end) {
                Ok(series) if !series.is_empty() => return Ok(series),
                Ok(_) => info!(ticker, "cached series does not cover the range"),
                Err(e) => warn!(ticker, error = %e, "failed to read cache"),
            }
        }

        info!(ticker, provider = self.provider.name(), "fetching from provider");
        let bars = clean_bars(self.fetch_with_retries(ticker, start, end)?);
        if bars.is_empty() {
            return Err(MarketDataError::NoData(ticker.to_string()));
        }
        let series = PriceSeries::from_bars(&bars)?;

        if self.use_cache {
            if let Err(e) = self.cache.write(ticker, &series) {
                warn!(ticker, error = %e, "failed to write cache");
            }
        }

        Ok(series)
    }

    /// Load several tickers. Tickers that fail to load are logged and left out.
    pub fn load_multiple_tickers(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
    ) -> BTreeMap<String, PriceSeries> {
        let mut results = BTreeMap::new();
        for ticker in tickers {
            match self.load_ticker_data(ticker, start, end, force_refresh) {
                Ok(series) => {
                    results.insert(ticker.clone(), series);
                }
                Err(e) => warn!(ticker = %ticker, error = %e, "could not load ticker"),
            }
        }
        info!(loaded = results.len(), requested = tickers.len(), "tickers loaded");
        results
    }

    /// Most traded tickers, as configured
    pub fn top_volume_tickers(&self, limit: usize) -> Vec<String> {
        self.default_tickers.iter().take(limit).cloned().collect()
    }

    /// Remove the cache of one ticker, or of every ticker when `None`.
    /// Returns the number of files removed.
    pub fn clear_cache(&self, ticker: Option<&str>) -> Result<usize> {
        match ticker {
            Some(ticker) => Ok(usize::from(self.cache.clear(ticker)?)),
            None => self.cache.clear_all(),
        }
    }

    fn read_cached(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries> {
        let window = self.cache.read(ticker)?.filter_dates(start, end)?;
        PriceSeries::from_bars(&clean_bars(window.to_bars()?))
    }

    fn fetch_with_retries(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyOhlcv>> {
        let mut last_error = None;
        for attempt in 1..=self.max_retries {
            match self.provider.fetch_history(ticker, start, end) {
                Ok(bars) if bars.is_empty() => {
                    warn!(ticker, "provider returned no data");
                    return Err(MarketDataError::NoData(ticker.to_string()));
                }
                Ok(bars) => {
                    info!(ticker, rows = bars.len(), "data fetched");
                    return Ok(bars);
                }
                Err(e) => {
                    warn!(ticker, attempt, error = %e, "fetch attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        thread::sleep(self.retry_delay);
                    }
                }
            }
        }
        error!(ticker, attempts = self.max_retries, "giving up on provider");
        Err(last_error
            .unwrap_or_else(|| MarketDataError::Provider(format!("No attempt made for {}", ticker))))
    }
}

/// Clean raw rows: sort by date, keep the last row of duplicated dates,
/// fill interior price gaps linearly and drop rows with no price at all.
///
/// Gaps after the last known price take that price; gaps before the first
/// known price are left missing.
pub fn clean_bars(mut bars: Vec<DailyOhlcv>) -> Vec<DailyOhlcv> {
    // Stable sort keeps input order within a date, so the last one wins below
    bars.sort_by_key(|b| b.date);
    let mut deduped: Vec<DailyOhlcv> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => deduped.push(bar),
        }
    }

    fill_gaps(&mut deduped, |b| &mut b.data.open);
    fill_gaps(&mut deduped, |b| &mut b.data.high);
    fill_gaps(&mut deduped, |b| &mut b.data.low);
    fill_gaps(&mut deduped, |b| &mut b.data.close);

    deduped.retain(|b| !b.data.is_blank());
    deduped
}

fn fill_gaps(bars: &mut [DailyOhlcv], field: fn(&mut DailyOhlcv) -> &mut f64) {
    let values: Vec<Option<f64>> = bars
        .iter_mut()
        .map(|b| {
            let v = *field(b);
            if v.is_nan() {
                None
            } else {
                Some(v)
            }
        })
        .collect();
    for (bar, filled) in bars.iter_mut().zip(interpolate_linear(&values)) {
        *field(bar) = filled.unwrap_or(f64::NAN);
    }
}
