//! Parquet disk cache keyed by ticker

use crate::config::{cache_file_name, AppConfig, CACHE_EXTENSION};
use crate::{PriceSeries, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::info;

/// Read-through cache storing one parquet file per ticker
#[derive(Debug, Clone)]
pub struct ParquetCache {
    dir: PathBuf,
    max_age: Duration,
}

impl ParquetCache {
    pub fn new<P: Into<PathBuf>>(dir: P, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.cache_max_age())
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// File used for a ticker
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(cache_file_name(ticker))
    }

    /// True when a cache file exists and is younger than the maximum age
    pub fn is_fresh(&self, ticker: &str) -> bool {
        let Ok(modified) = fs::metadata(self.path_for(ticker)).and_then(|m| m.modified()) else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.max_age,
            // Modification time in the future; treat as just written
            Err(_) => !self.max_age.is_zero(),
        }
    }

    /// Read the cached series of a ticker
    pub fn read(&self, ticker: &str) -> Result<PriceSeries> {
        let file = File::open(self.path_for(ticker))?;
        let df = ParquetReader::new(file).finish()?;
        PriceSeries::from_dataframe(df)
    }

    /// Write a ticker's series, replacing any previous file
    pub fn write(&self, ticker: &str, series: &PriceSeries) -> Result<()> {
        self.ensure_dir()?;
        let mut df = series.dataframe().clone();
        let file = File::create(self.path_for(ticker))?;
        ParquetWriter::new(file).finish(&mut df)?;
        info!(ticker, rows = df.height(), "cache written");
        Ok(())
    }

    /// Remove the cache file of one ticker. Returns whether a file was removed.
    pub fn clear(&self, ticker: &str) -> Result<bool> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        info!(ticker, "cache removed");
        Ok(true)
    }

    /// Remove every cached series. Returns the number of files removed.
    pub fn clear_all(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXTENSION) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        info!(removed, "cache cleared");
        Ok(removed)
    }
}
