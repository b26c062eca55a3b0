//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), bounded to [0, 100].
//! Lookback: period (needs period + 1 values).
//! Edge cases: no movement → 50; avg_loss == 0 → 100; avg_gain == 0 → 0.

use super::{Indicator, Reading};

/// RSI at the last value of `values`.
pub fn rsi(values: &[f64], period: usize) -> Reading<f64> {
    let period = period.max(1);
    if let Some(short) = Reading::check(period + 1, values.len()) {
        return short;
    }
    match Rsi::new(period).compute(values).last() {
        Some(v) if v.is_finite() => Reading::Ready(*v),
        _ => Reading::InsufficientData {
            needed: period + 1,
            available: values.len(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; values.len()];
        if values.len() <= self.period {
            return out;
        }

        let mut smoothed = Wilder::default();
        for (t, pair) in values.windows(2).enumerate() {
            let change = pair[1] - pair[0];
            if !change.is_finite() {
                break;
            }
            let idx = t + 1;
            if idx < self.period {
                smoothed.accumulate(change);
                continue;
            }
            if idx == self.period {
                smoothed.accumulate(change);
                smoothed.seed(self.period);
            } else {
                smoothed.update(change, self.period);
            }
            out[idx] = smoothed.rsi();
        }
        out
    }
}

/// Running Wilder averages of gains and losses (losses positive).
#[derive(Debug, Default)]
struct Wilder {
    gain: f64,
    loss: f64,
}

impl Wilder {
    fn accumulate(&mut self, change: f64) {
        if change > 0.0 {
            self.gain += change;
        } else {
            self.loss -= change;
        }
    }

    /// Turn the accumulated sums into plain averages.
    fn seed(&mut self, period: usize) {
        self.gain /= period as f64;
        self.loss /= period as f64;
    }

    fn update(&mut self, change: f64, period: usize) {
        let keep = (period - 1) as f64 / period as f64;
        let weight = 1.0 / period as f64;
        self.gain = self.gain * keep + change.max(0.0) * weight;
        self.loss = self.loss * keep + (-change).max(0.0) * weight;
    }

    fn rsi(&self) -> f64 {
        match (self.gain > 0.0, self.loss > 0.0) {
            (false, false) => 50.0,
            (true, false) => 100.0,
            (false, true) => 0.0,
            (true, true) => (100.0 - 100.0 / (1.0 + self.gain / self.loss)).clamp(0.0, 100.0),
        }
    }
}
