//! Promotion gates — threshold checks that decide the next lifecycle state.
//!
//! Gate 1 follows a backtest, Gate 2 a paper-trading session. Both compare
//! with strict inequalities: `win_rate > θ` and `profit_factor > θ`.

use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use stratforge_core::domain::{LifecycleState, RetireReason};

/// Thresholds of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateThresholds {
    /// Exclusive lower bound on win rate (fraction).
    pub min_win_rate: f64,
    /// Exclusive lower bound on profit factor.
    pub min_profit_factor: f64,
    /// Inclusive lower bound on closed trades.
    #[serde(default)]
    pub min_trades: usize,
}

impl GateThresholds {
    pub fn passes(&self, metrics: &PerformanceMetrics) -> bool {
        self.failure(metrics).is_none()
    }

    /// Human-readable reason the metrics fail, if they do.
    pub fn failure(&self, metrics: &PerformanceMetrics) -> Option<String> {
        if metrics.total_trades < self.min_trades {
            return Some(format!(
                "{} trades < {} required",
                metrics.total_trades, self.min_trades
            ));
        }
        if !(metrics.win_rate > self.min_win_rate) {
            return Some(format!(
                "win rate {:.3} <= {:.3}",
                metrics.win_rate, self.min_win_rate
            ));
        }
        if !(metrics.profit_factor > self.min_profit_factor) {
            return Some(format!(
                "profit factor {:.3} <= {:.3}",
                metrics.profit_factor, self.min_profit_factor
            ));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatesConfig {
    pub backtest: GateThresholds,
    pub paper: GateThresholds,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            backtest: GateThresholds {
                min_win_rate: 0.55,
                min_profit_factor: 1.5,
                min_trades: 0,
            },
            paper: GateThresholds {
                min_win_rate: 0.60,
                min_profit_factor: 1.8,
                min_trades: 0,
            },
        }
    }
}

impl GatesConfig {
    /// Paper thresholds must be at least as strict as backtest thresholds.
    pub fn validate(&self) -> Result<(), String> {
        let (b, p) = (&self.backtest, &self.paper);
        for (name, v) in [
            ("gates.backtest.min_win_rate", b.min_win_rate),
            ("gates.backtest.min_profit_factor", b.min_profit_factor),
            ("gates.paper.min_win_rate", p.min_win_rate),
            ("gates.paper.min_profit_factor", p.min_profit_factor),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{name} must be finite and >= 0, got {v}"));
            }
        }
        if p.min_win_rate < b.min_win_rate {
            return Err(format!(
                "gates.paper.min_win_rate ({}) must be >= gates.backtest.min_win_rate ({})",
                p.min_win_rate, b.min_win_rate
            ));
        }
        if p.min_profit_factor < b.min_profit_factor {
            return Err(format!(
                "gates.paper.min_profit_factor ({}) must be >= gates.backtest.min_profit_factor ({})",
                p.min_profit_factor, b.min_profit_factor
            ));
        }
        Ok(())
    }
}

/// Which gate is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Backtest,
    Paper,
}

/// Outcome of a gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub gate: Gate,
    pub next: LifecycleState,
    /// Set when the gate failed.
    pub reason: Option<String>,
}

impl GateDecision {
    pub fn passed(&self) -> bool {
        self.reason.is_none()
    }
}

/// Gate 1: backtested → queued_paper, or retired(failed_backtest).
pub fn backtest_gate(metrics: &PerformanceMetrics, config: &GatesConfig) -> GateDecision {
    match config.backtest.failure(metrics) {
        None => GateDecision {
            gate: Gate::Backtest,
            next: LifecycleState::QueuedPaper,
            reason: None,
        },
        Some(reason) => GateDecision {
            gate: Gate::Backtest,
            next: LifecycleState::Retired(RetireReason::FailedBacktest),
            reason: Some(reason),
        },
    }
}

/// Gate 2: paper_trading → promotable, or retired(failed_paper_trading).
pub fn paper_gate(metrics: &PerformanceMetrics, config: &GatesConfig) -> GateDecision {
    match config.paper.failure(metrics) {
        None => GateDecision {
            gate: Gate::Paper,
            next: LifecycleState::Promotable,
            reason: None,
        },
        Some(reason) => GateDecision {
            gate: Gate::Paper,
            next: LifecycleState::Retired(RetireReason::FailedPaperTrading),
            reason: Some(reason),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(win_rate: f64, profit_factor: f64, trades: usize) -> PerformanceMetrics {
        let mut m = PerformanceMetrics::empty(10_000.0);
        m.win_rate = win_rate;
        m.profit_factor = profit_factor;
        m.total_trades = trades;
        m
    }

    #[test]
    fn boundary_values_fail_strict_comparison() {
        let g = GatesConfig::default();
        assert!(!backtest_gate(&metrics(0.55, 2.0, 10), &g).passed());
        assert!(!backtest_gate(&metrics(0.60, 1.5, 10), &g).passed());
        assert!(backtest_gate(&metrics(0.56, 1.51, 10), &g).passed());
    }

    #[test]
    fn infinite_profit_factor_passes() {
        let g = GatesConfig::default();
        let d = paper_gate(&metrics(0.9, f64::INFINITY, 3), &g);
        assert_eq!(d.next, LifecycleState::Promotable);
    }

    #[test]
    fn empty_log_fails_both_gates() {
        let g = GatesConfig::default();
        let m = PerformanceMetrics::empty(10_000.0);
        assert_eq!(
            backtest_gate(&m, &g).next,
            LifecycleState::Retired(RetireReason::FailedBacktest)
        );
        assert_eq!(
            paper_gate(&m, &g).next,
            LifecycleState::Retired(RetireReason::FailedPaperTrading)
        );
    }

    #[test]
    fn min_trades_is_enforced() {
        let mut g = GatesConfig::default();
        g.backtest.min_trades = 5;
        let d = backtest_gate(&metrics(0.8, 3.0, 4), &g);
        assert!(!d.passed());
        assert!(d.reason.unwrap().contains("trades"));
    }

    #[test]
    fn paper_looser_than_backtest_is_invalid() {
        let mut g = GatesConfig::default();
        g.paper.min_profit_factor = 1.0;
        assert!(g.validate().is_err());
        assert!(GatesConfig::default().validate().is_ok());
    }
}
