//! Fitness — a single finite score for ranking strategies.
//!
//! score = w_profit·tanh(net%/100) + w_win·winRate + w_sharpe·tanh(sharpe/3)
//!         − w_dd·(maxDD%/100)

use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitnessWeights {
    pub profit: f64,
    pub win_rate: f64,
    pub sharpe: f64,
    pub drawdown: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            profit: 0.4,
            win_rate: 0.2,
            sharpe: 0.3,
            drawdown: 0.3,
        }
    }
}

impl FitnessWeights {
    pub fn validate(&self) -> Result<(), String> {
        for (name, w) in [
            ("profit", self.profit),
            ("win_rate", self.win_rate),
            ("sharpe", self.sharpe),
            ("drawdown", self.drawdown),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(format!("fitness weight {name} must be finite and >= 0, got {w}"));
            }
        }
        Ok(())
    }
}

/// Weighted fitness; finite for any metrics whose fields obey the sentinels.
///
/// A non-finite input term contributes 0 rather than poisoning the sum.
pub fn fitness(metrics: &PerformanceMetrics, weights: &FitnessWeights) -> f64 {
    let profit = bounded((metrics.net_profit_percent / 100.0).tanh());
    let win_rate = bounded(metrics.win_rate);
    let sharpe = bounded((metrics.sharpe_ratio / 3.0).tanh());
    let drawdown = bounded(metrics.max_drawdown_percent / 100.0);

    weights.profit * profit + weights.win_rate * win_rate + weights.sharpe * sharpe
        - weights.drawdown * drawdown
}

/// Whether `a` ranks ahead of `b`. NaN never ranks ahead.
pub fn is_better(a: f64, b: f64) -> bool {
    a > b || (b.is_nan() && !a.is_nan())
}

fn bounded(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
