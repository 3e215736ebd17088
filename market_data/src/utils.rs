//! Synthetic data helpers for tests and demos

use crate::{DailyOhlcv, OhlcvData};
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a reproducible random walk of daily OHLCV rows
///
/// # Arguments
/// * `num_points` - Number of consecutive calendar days, starting 2023-01-01
/// * `starting_price` - Open of the first day
/// * `volatility` - Price volatility factor (0.0-1.0)
/// * `seed` - RNG seed; the same seed yields the same rows
pub fn generate_test_data(
    num_points: usize,
    starting_price: f64,
    volatility: f64,
    seed: u64,
) -> Vec<DailyOhlcv> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(num_points);
    let mut current_price = starting_price;
    let base_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default();

    for i in 0..num_points {
        let price_change = current_price * volatility * (rng.gen::<f64>() - 0.5);
        let open = current_price;
        let close = open + price_change;

        let high = open.max(close) + rng.gen::<f64>() * volatility * open * 0.5;
        let low = open.min(close) - rng.gen::<f64>() * volatility * open * 0.5;
        let volume = rng.gen_range(1000..10000);

        let Some(date) = base_date.checked_add_days(Days::new(i as u64)) else {
            break;
        };
        data.push(DailyOhlcv {
            date,
            data: OhlcvData {
                open,
                high,
                low,
                close,
                volume,
            },
        });

        current_price = close;
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_test_data_is_reproducible() {
        let a = generate_test_data(30, 100.0, 0.02, 7);
        let b = generate_test_data(30, 100.0, 0.02, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
        assert!(a.windows(2).all(|w| w[0].date < w[1].date));
        assert!(a.iter().all(|d| d.data.low <= d.data.high));
    }
}
