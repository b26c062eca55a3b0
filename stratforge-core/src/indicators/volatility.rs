//! Rolling volatility: population stddev of simple returns over `window` returns.
//!
//! Lookback: window (needs window + 1 prices).

use super::{mean_std, Indicator, Reading};

pub fn volatility(values: &[f64], window: usize) -> Reading<f64> {
    let window = window.max(1);
    if let Some(short) = Reading::check(window + 1, values.len()) {
        return short;
    }
    let tail = &values[values.len() - window - 1..];
    let returns = simple_returns(tail);
    Reading::Ready(mean_std(&returns).1)
}

fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Volatility {
    window: usize,
    name: String,
}

impl Volatility {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            name: format!("vol_{window}"),
        }
    }
}

impl Indicator for Volatility {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let mut result = vec![f64::NAN; n];
        if n < self.window + 1 {
            return result;
        }
        let returns = simple_returns(values);
        for t in self.window..n {
            // returns[j] is the move from j to j+1
            result[t] = mean_std(&returns[t - self.window..t]).1;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, assert_series_matches_point, DEFAULT_EPSILON};

    #[test]
    fn constant_growth_has_zero_volatility() {
        let values: Vec<f64> = (0..10).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        assert_approx(volatility(&values, 5).value().unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn alternating_returns() {
        // returns: +10%, -10%/1.1..., check against direct computation
        let values = [100.0, 110.0, 99.0, 108.9];
        let returns = [0.1, -0.1, 0.1];
        let (_, expected) = crate::indicators::mean_std(&returns);
        assert_approx(volatility(&values, 3).value().unwrap(), expected, DEFAULT_EPSILON);
    }

    #[test]
    fn needs_window_plus_one() {
        assert!(!volatility(&[1.0, 2.0], 2).is_ready());
        assert!(volatility(&[1.0, 2.0, 3.0], 2).is_ready());
    }

    #[test]
    fn series_matches_point() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 1.3).sin() * 3.0).collect();
        assert_series_matches_point(&Volatility::new(5), &values, |v| volatility(v, 5).value());
    }
}
