//! Date helpers shared by the models

use chrono::{Days, NaiveDate};

/// `horizon` consecutive calendar days starting the day after `last_date`
pub fn future_dates(last_date: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as u64)
        .map_while(|offset| last_date.checked_add_days(Days::new(offset)))
        .collect()
}

/// Days elapsed since 1970-01-01, negative before it
pub fn days_since_epoch(date: NaiveDate) -> f64 {
    (date - NaiveDate::default()).num_days() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_future_dates() {
        let last = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
        assert_eq!(
            future_dates(last, 3),
            vec![
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ]
        );
        assert!(future_dates(last, 0).is_empty());
    }

    #[test]
    fn test_days_since_epoch() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1.0);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1.0);
    }
}
