//! Series transforms: differencing, integration and gap filling

use crate::{MathError, Result};

/// First difference of a series; the result is one element shorter
pub fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Apply first differencing `order` times
pub fn difference_n(values: &[f64], order: usize) -> Vec<f64> {
    let mut result = values.to_vec();
    for _ in 0..order {
        result = difference(&result);
    }
    result
}

/// Undo `order` rounds of differencing for values that continue `history`.
///
/// `forecasts` are expressed on the `order`-times differenced scale; the
/// returned values are on the scale of `history`.
pub fn integrate(forecasts: &[f64], history: &[f64], order: usize) -> Result<Vec<f64>> {
    if history.len() < order + 1 {
        return Err(MathError::InsufficientData(format!(
            "Integrating order {} needs at least {} historical values, got {}",
            order,
            order + 1,
            history.len()
        )));
    }

    let mut result = forecasts.to_vec();
    for level in (0..order).rev() {
        let base = difference_n(history, level);
        let mut acc = base[base.len() - 1];
        for value in result.iter_mut() {
            acc += *value;
            *value = acc;
        }
    }
    Ok(result)
}

/// Linear interpolation of interior gaps. Trailing gaps take the last
/// observed value; leading gaps stay missing.
pub fn interpolate_linear(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut result = values.to_vec();
    let mut last_seen: Option<usize> = None;

    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };
        if let Some(prev) = last_seen {
            if i - prev > 1 {
                let start = values[prev].unwrap_or(current);
                let step = (current - start) / (i - prev) as f64;
                for (offset, slot) in result[prev + 1..i].iter_mut().enumerate() {
                    *slot = Some(start + step * (offset + 1) as f64);
                }
            }
        }
        last_seen = Some(i);
    }

    if let Some(last) = last_seen {
        let fill = values[last];
        for slot in result[last + 1..].iter_mut() {
            *slot = fill;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_difference_n() {
        let values = [1.0, 4.0, 9.0, 16.0, 25.0];
        assert_eq!(difference(&values), vec![3.0, 5.0, 7.0, 9.0]);
        assert_eq!(difference_n(&values, 2), vec![2.0, 2.0, 2.0]);
        assert_eq!(difference_n(&values, 0), values.to_vec());
    }

    #[test]
    fn test_integrate_inverts_differencing() {
        let history = [1.0, 4.0, 9.0, 16.0, 25.0];
        // Next second differences of n^2 stay at 2
        let restored = integrate(&[2.0, 2.0], &history, 2).unwrap();
        assert_relative_eq!(restored[0], 36.0);
        assert_relative_eq!(restored[1], 49.0);

        let restored = integrate(&[1.0, 1.0], &history, 1).unwrap();
        assert_eq!(restored, vec![26.0, 27.0]);
    }

    #[test]
    fn test_integrate_requires_history() {
        assert!(integrate(&[1.0], &[1.0], 1).is_err());
    }

    #[test]
    fn test_interpolate_linear() {
        let values = [None, Some(1.0), None, None, Some(4.0), None];
        let filled = interpolate_linear(&values);
        assert_eq!(filled[0], None);
        assert_eq!(filled[1], Some(1.0));
        assert_relative_eq!(filled[2].unwrap(), 2.0);
        assert_relative_eq!(filled[3].unwrap(), 3.0);
        assert_eq!(filled[4], Some(4.0));
        assert_eq!(filled[5], Some(4.0));
    }
}
