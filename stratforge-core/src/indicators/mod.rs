//! Indicator library.
//!
//! Every indicator is a pure function of a close-price series and comes in
//! two forms:
//! - a point form (`sma`, `rsi`, ...) returning a [`Reading`] for the window
//!   ending at the last value, with an explicit insufficient-data sentinel;
//! - a series form (the [`Indicator`] implementations) that the simulator
//!   precomputes once per run, `NaN` during warmup.
//!
//! The two forms agree at every index; a value at index `t` never depends on
//! anything after `t`.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod volatility;

pub use bollinger::{bollinger, Bollinger, BollingerBand, BollingerBands};
pub use ema::{ema, ema_of_series, Ema};
pub use macd::{macd, Macd, MacdLine, MacdValue};
pub use rsi::{rsi, Rsi};
pub use sma::{sma, Sma};
pub use volatility::{volatility, Volatility};

use crate::domain::Bar;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of a point-form indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading<T> {
    Ready(T),
    /// Not enough history: `needed` values required, `available` supplied.
    InsufficientData { needed: usize, available: usize },
}

impl<T> Reading<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Reading::Ready(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Reading::Ready(v) => Some(v),
            Reading::InsufficientData { .. } => None,
        }
    }

    pub(crate) fn check(needed: usize, available: usize) -> Option<Reading<T>> {
        (available < needed).then_some(Reading::InsufficientData { needed, available })
    }
}

/// Series-form indicator over close prices.
///
/// # Look-ahead contamination guard
/// `compute(&values[..=t])[t]` must equal `compute(values)[t]` for every `t`.
pub trait Indicator: Send + Sync {
    /// Unique key, e.g. "sma_20"; used to look the series up after precompute.
    fn name(&self) -> &str;

    /// Index of the first non-NaN output.
    fn lookback(&self) -> usize;

    /// Output has the same length as `values`; the first `lookback()` entries are NaN.
    fn compute(&self, values: &[f64]) -> Vec<f64>;
}

/// Close prices of a bar slice.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Precomputed indicator series, keyed by [`Indicator::name`].
///
/// Built once before the bar loop, then queried by bar index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute and store `indicator` unless a series with its name already exists.
    pub fn ensure(&mut self, indicator: &dyn Indicator, values: &[f64]) {
        if !self.series.contains_key(indicator.name()) {
            self.series
                .insert(indicator.name().to_string(), indicator.compute(values));
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Finite value at `bar_index`; `None` during warmup or for unknown names.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
            .filter(|v| v.is_finite())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Population mean and standard deviation of a non-empty slice.
pub(crate) fn mean_std(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.max(0.0).sqrt())
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub(crate) const DEFAULT_EPSILON: f64 = 1e-10;

/// Point and series forms agree at every index (within float tolerance).
#[cfg(test)]
pub(crate) fn assert_series_matches_point(
    indicator: &dyn Indicator,
    values: &[f64],
    point: impl Fn(&[f64]) -> Option<f64>,
) {
    let series = indicator.compute(values);
    for t in 0..values.len() {
        match point(&values[..=t]) {
            Some(p) => assert_approx(series[t], p, 1e-9),
            None => assert!(series[t].is_nan(), "{} index {t}", indicator.name()),
        }
    }
}
