//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window.
//! Lookback: window - 1 (first valid value at index window-1).

use super::{Indicator, Reading};

/// SMA of the last `window` values.
pub fn sma(values: &[f64], window: usize) -> Reading<f64> {
    let window = window.max(1);
    if let Some(short) = Reading::check(window, values.len()) {
        return short;
    }
    let tail = &values[values.len() - window..];
    Reading::Ready(tail.iter().sum::<f64>() / window as f64)
}

#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    name: String,
}

impl Sma {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            name: format!("sma_{window}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let mut result = vec![f64::NAN; n];
        if n < self.window {
            return result;
        }

        let mut sum: f64 = values[..self.window].iter().sum();
        result[self.window - 1] = sum / self.window as f64;
        for i in self.window..n {
            sum += values[i] - values[i - self.window];
            result[i] = sum / self.window as f64;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, assert_series_matches_point, DEFAULT_EPSILON};

    #[test]
    fn rolling_mean_over_three() {
        let result = Sma::new(3).compute(&[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!(result[0].is_nan() && result[1].is_nan());
        assert_approx(result[2], 4.0, DEFAULT_EPSILON);
        assert_approx(result[3], 6.0, DEFAULT_EPSILON);
        assert_approx(result[4], 8.0, DEFAULT_EPSILON);
    }

    #[test]
    fn window_of_one_is_identity() {
        let result = Sma::new(1).compute(&[100.0, 200.0, 300.0]);
        assert_eq!(result, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn point_form_reports_insufficient_data() {
        assert_eq!(
            sma(&[1.0, 2.0], 5),
            Reading::InsufficientData {
                needed: 5,
                available: 2
            }
        );
        assert_eq!(sma(&[1.0, 2.0, 3.0], 3), Reading::Ready(2.0));
    }

    #[test]
    fn zero_window_treated_as_one() {
        assert_eq!(sma(&[4.0], 0), Reading::Ready(4.0));
        assert_eq!(Sma::new(0).name(), "sma_1");
    }

    #[test]
    fn series_matches_point() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        assert_series_matches_point(&Sma::new(7), &values, |v| sma(v, 7).value());
    }

    #[test]
    fn first_value_at_window_minus_one() {
        assert_eq!(Sma::new(12).lookback(), 11);
        assert_eq!(Sma::new(1).lookback(), 0);
    }
}
