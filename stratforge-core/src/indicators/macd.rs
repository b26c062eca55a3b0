//! Moving Average Convergence Divergence (MACD).
//!
//! - MACD line: EMA(fast) - EMA(slow)
//! - Signal line: EMA(signal) of the MACD line
//! - Histogram: MACD line - signal line
//!
//! Lookback: slow + signal - 2.

use super::ema::ema_of_series;
use super::{Indicator, Reading};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD at the last value of `values`.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Reading<MacdValue> {
    let lines = MacdLines::compute(values, fast, slow, signal);
    let needed = lines.lookback + 1;
    if let Some(short) = Reading::check(needed, values.len()) {
        return short;
    }
    let last = values.len() - 1;
    let value = MacdValue {
        macd: lines.macd[last],
        signal: lines.signal[last],
        histogram: lines.histogram[last],
    };
    if value.histogram.is_finite() {
        Reading::Ready(value)
    } else {
        Reading::InsufficientData {
            needed,
            available: values.len(),
        }
    }
}

struct MacdLines {
    macd: Vec<f64>,
    signal: Vec<f64>,
    histogram: Vec<f64>,
    lookback: usize,
}

impl MacdLines {
    fn compute(values: &[f64], fast: usize, slow: usize, signal: usize) -> Self {
        let (fast, slow, signal) = (fast.max(1), slow.max(1), signal.max(1));
        let fast_ema = ema_of_series(values, fast);
        let slow_ema = ema_of_series(values, slow);
        let macd: Vec<f64> = fast_ema
            .iter()
            .zip(&slow_ema)
            .map(|(f, s)| f - s)
            .collect();
        let signal_line = ema_of_series(&macd, signal);
        let histogram = macd.iter().zip(&signal_line).map(|(m, s)| m - s).collect();
        Self {
            macd,
            signal: signal_line,
            histogram,
            lookback: fast.max(slow) + signal - 2,
        }
    }
}

/// Which MACD output a [`Macd`] series instance produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        let label = match line {
            MacdLine::Macd => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.fast.max(self.slow).max(1) + self.signal.max(1) - 2
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let mut lines = MacdLines::compute(values, self.fast, self.slow, self.signal);
        // Align all three outputs on the signal line's warmup.
        let mut out = match self.line {
            MacdLine::Macd => std::mem::take(&mut lines.macd),
            MacdLine::Signal => std::mem::take(&mut lines.signal),
            MacdLine::Histogram => std::mem::take(&mut lines.histogram),
        };
        for v in out.iter_mut().take(lines.lookback.min(values.len())) {
            *v = f64::NAN;
        }
        out
    }
}
