//! Bollinger Bands — moving average +/- k standard deviations.
//!
//! - Middle: SMA(window)
//! - Upper: middle + k * stddev(window)
//! - Lower: middle - k * stddev(window)
//!
//! Population stddev (divide by N). Lookback: window - 1.

use super::{mean_std, Indicator, Reading};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bands over the last `window` values.
pub fn bollinger(values: &[f64], window: usize, k: f64) -> Reading<BollingerBands> {
    let window = window.max(1);
    if let Some(short) = Reading::check(window, values.len()) {
        return short;
    }
    let (middle, std) = mean_std(&values[values.len() - window..]);
    Reading::Ready(BollingerBands {
        upper: middle + k * std,
        middle,
        lower: middle - k * std,
    })
}

/// Which band a [`Bollinger`] series instance produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

/// One band as a series. The three bands are separate instances so the
/// single-series [`Indicator`] trait stays unchanged.
#[derive(Debug, Clone)]
pub struct Bollinger {
    window: usize,
    k: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(window: usize, k: f64, band: BollingerBand) -> Self {
        let window = window.max(1);
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            window,
            k,
            band,
            name: format!("bb_{label}_{window}_{k}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let mut result = vec![f64::NAN; n];
        for end in self.window..=n {
            let (middle, std) = mean_std(&values[end - self.window..end]);
            result[end - 1] = match self.band {
                BollingerBand::Upper => middle + self.k * std,
                BollingerBand::Middle => middle,
                BollingerBand::Lower => middle - self.k * std,
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, assert_series_matches_point, DEFAULT_EPSILON};

    #[test]
    fn bands_of_known_window() {
        // mean 5, population std 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger(&values, 8, 2.0).value().unwrap();
        assert_approx(bands.middle, 5.0, DEFAULT_EPSILON);
        assert_approx(bands.upper, 9.0, DEFAULT_EPSILON);
        assert_approx(bands.lower, 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn flat_series_collapses_bands() {
        let bands = bollinger(&[3.0; 5], 5, 2.0).value().unwrap();
        assert_eq!(bands.upper, bands.lower);
    }

    #[test]
    fn insufficient_history() {
        assert!(!bollinger(&[1.0, 2.0], 3, 2.0).is_ready());
    }

    #[test]
    fn series_matches_point_for_each_band() {
        let values: Vec<f64> = (0..30).map(|i| 10.0 + (i as f64 * 0.4).sin()).collect();
        assert_series_matches_point(
            &Bollinger::new(6, 1.5, BollingerBand::Upper),
            &values,
            |v| bollinger(v, 6, 1.5).value().map(|b| b.upper),
        );
        assert_series_matches_point(
            &Bollinger::new(6, 1.5, BollingerBand::Lower),
            &values,
            |v| bollinger(v, 6, 1.5).value().map(|b| b.lower),
        );
    }

    #[test]
    fn names_distinguish_bands() {
        assert_ne!(
            Bollinger::new(20, 2.0, BollingerBand::Upper).name(),
            Bollinger::new(20, 2.0, BollingerBand::Lower).name()
        );
    }
}
