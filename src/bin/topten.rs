//! # topten
//!
//! Command-line front end: list models, validate and summarize price history,
//! and forecast closing prices for B3 tickers or CSV files.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use topten::market_data::config::default_date_range;
use topten::market_data::series::CLOSE_COLUMN;
use topten::price_forecast::DEFAULT_MIN_PERIODS;
use topten::{AppConfig, DataLoader, ModelParams, PriceSeries, Predictor, YahooProvider};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "topten")]
#[command(about = "Daily price forecasting for B3 equities", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where the price history comes from
#[derive(clap::Args)]
struct Source {
    /// B3 ticker, e.g. PETR4.SA
    #[arg(short, long, conflicts_with = "input", required_unless_present = "input")]
    ticker: Option<String>,

    /// CSV file with `date` and `close` columns
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// First day of the history window (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the history window (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Ignore the disk cache and fetch again
    #[arg(long)]
    refresh: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the models that can be used
    Models,

    /// Check whether a price history can be forecast
    Validate {
        #[command(flatten)]
        source: Source,

        /// Minimum number of rows
        #[arg(long, default_value_t = DEFAULT_MIN_PERIODS)]
        min_periods: usize,
    },

    /// Show the latest close, last change, price range and average volume
    Summary {
        #[command(flatten)]
        source: Source,
    },

    /// Fit a model and forecast the following days
    Forecast {
        #[command(flatten)]
        source: Source,

        /// Model type (Seasonal, ARIMA)
        #[arg(short, long, default_value = "Seasonal")]
        model: String,

        /// Number of days to forecast; defaults to the configured horizon
        #[arg(short, long)]
        days: Option<usize>,

        /// Column to forecast
        #[arg(long, default_value = CLOSE_COLUMN)]
        column: String,

        /// Write the forecast as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the forecast as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Delete cached price files
    ClearCache {
        /// Only this ticker
        #[arg(short, long)]
        ticker: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> CliResult<AppConfig> {
    match path {
        Some(path) => Ok(AppConfig::from_file(path)?),
        None => Ok(AppConfig::default()),
    }
}

fn load_series(source: &Source, config: &AppConfig) -> CliResult<PriceSeries> {
    if let Some(path) = &source.input {
        info!(path = %path.display(), "reading price history");
        return Ok(PriceSeries::from_csv(path)?);
    }
    let ticker = source
        .ticker
        .as_deref()
        .ok_or("either --ticker or --input is required")?;

    let (default_start, default_end) = default_date_range(config.default_period_months);
    let start = source.start.unwrap_or(default_start);
    let end = source.end.unwrap_or(default_end);

    let provider = YahooProvider::new(config.provider_timeout())?;
    let loader = DataLoader::new(provider, config, true)?;
    Ok(loader.load_ticker_data(ticker, start, end, source.refresh)?)
}

fn print_summary(series: &PriceSeries) -> CliResult<()> {
    match series.summary()? {
        Some(summary) => {
            println!("Current price:  {:.2}", summary.current_price);
            println!(
                "Change:         {:+.2} ({:+.2}%)",
                summary.price_change, summary.price_change_pct
            );
            println!("Range:          {:.2} - {:.2}", summary.min_price, summary.max_price);
            println!("Average volume: {:.0}", summary.avg_volume);
        }
        None => println!("No closing prices to summarize"),
    }
    Ok(())
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_ref())?;
    let predictor = Predictor::from_config(&config);

    match cli.command {
        Commands::Models => {
            let models = predictor.available_models();
            if models.is_empty() {
                println!("No forecasting models available");
            }
            for model in models {
                println!("{}", model);
            }
        }
        Commands::Validate {
            source,
            min_periods,
        } => {
            let series = load_series(&source, &config)?;
            let (ok, message) = predictor.validate(&series, min_periods);
            println!("{}: {}", if ok { "OK" } else { "INVALID" }, message);
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Summary { source } => {
            let series = load_series(&source, &config)?;
            print_summary(&series)?;
        }
        Commands::Forecast {
            source,
            model,
            days,
            column,
            csv,
            json,
        } => {
            let series = load_series(&source, &config)?;
            let days = days.unwrap_or(config.default_forecast_days);
            let result =
                predictor.train_and_predict(&series, &model, &column, days, &ModelParams::default())?;

            if !result.success {
                let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
                return Err(format!("{} forecast failed: {}", result.model_type, reason).into());
            }

            print_summary(&series)?;
            println!();
            println!("{:<12} {:>12} {:>12} {:>12}", "date", "yhat", "lower", "upper");
            for row in &result.predictions {
                println!(
                    "{:<12} {:>12.4} {:>12.4} {:>12.4}",
                    row.date, row.yhat, row.yhat_lower, row.yhat_upper
                );
            }

            if let Some(path) = csv {
                result.predictions.write_csv(File::create(&path)?)?;
                info!(path = %path.display(), "forecast written as CSV");
            }
            if let Some(path) = json {
                std::fs::write(&path, result.predictions.to_json()?)?;
                info!(path = %path.display(), "forecast written as JSON");
            }
        }
        Commands::ClearCache { ticker } => {
            let provider = YahooProvider::new(config.provider_timeout())?;
            let loader = DataLoader::new(provider, &config, true)?;
            let removed = loader.clear_cache(ticker.as_deref())?;
            println!("Removed {} cached file(s)", removed);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
