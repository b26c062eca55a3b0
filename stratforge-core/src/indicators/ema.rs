//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[period-1] = SMA of the first `period` values.
//! Lookback: period - 1.

use super::{Indicator, Reading};

/// EMA at the last value of `values`.
pub fn ema(values: &[f64], period: usize) -> Reading<f64> {
    let period = period.max(1);
    if let Some(short) = Reading::check(period, values.len()) {
        return short;
    }
    match ema_of_series(values, period).last() {
        Some(v) if v.is_finite() => Reading::Ready(*v),
        _ => Reading::InsufficientData {
            needed: period,
            available: values.len(),
        },
    }
}

/// EMA of an arbitrary series, which may itself start with a NaN warmup prefix.
///
/// Seeding starts at the first run of `period` consecutive finite values;
/// used by MACD for the signal line over the MACD line.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    let Some(first) = values.iter().position(|v| v.is_finite()) else {
        return result;
    };
    if n - first < period {
        return result;
    }
    let seed_window = &values[first..first + period];
    if seed_window.iter().any(|v| !v.is_finite()) {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    result[first + period - 1] = prev;
    for i in (first + period)..n {
        if !values[i].is_finite() {
            // Tainted from here on.
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        ema_of_series(values, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, assert_series_matches_point, DEFAULT_EPSILON};

    #[test]
    fn ema_seed_and_recursion() {
        let result = Ema::new(3).compute(&[1.0, 2.0, 3.0, 4.0]);
        assert!(result[0].is_nan() && result[1].is_nan());
        assert_approx(result[2], 2.0, DEFAULT_EPSILON);
        // alpha = 0.5: 0.5 * 4 + 0.5 * 2
        assert_approx(result[3], 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_of_constant_is_constant() {
        let result = Ema::new(5).compute(&[7.0; 12]);
        for v in &result[4..] {
            assert_approx(*v, 7.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn ema_of_series_skips_nan_prefix() {
        let result = ema_of_series(&[f64::NAN, f64::NAN, 2.0, 4.0, 6.0], 2);
        assert!(result[2].is_nan());
        assert_approx(result[3], 3.0, DEFAULT_EPSILON);
        // alpha = 2/3: 2/3 * 6 + 1/3 * 3
        assert_approx(result[4], 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn point_form_insufficient() {
        assert!(!ema(&[1.0], 3).is_ready());
    }

    #[test]
    fn series_matches_point() {
        let values: Vec<f64> = (0..30).map(|i| 50.0 + (i as f64).cos() * 3.0).collect();
        assert_series_matches_point(&Ema::new(6), &values, |v| ema(v, 6).value());
    }
}
