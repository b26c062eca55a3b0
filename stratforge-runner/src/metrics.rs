//! Performance metrics — pure functions that reduce a trade log and an
//! equity curve to scalar statistics.
//!
//! Every ratio has a documented divide-by-zero sentinel. The only infinity
//! that may leave this module is the profit-factor sentinel for a log with
//! winners and no losers; it serializes as the string `"inf"`.

use serde::{Deserialize, Serialize};
use stratforge_core::domain::{EquityPoint, Trade};

/// Aggregate performance metrics for one run.
///
/// `net_profit_percent` and `max_drawdown_percent` are percentage points;
/// `win_rate` is a fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub net_profit: f64,
    pub net_profit_percent: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    #[serde(with = "profit_factor_serde")]
    pub profit_factor: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub expectancy: f64,
    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    /// Compute every metric.
    ///
    /// Net profit is measured on equity (final point minus initial capital),
    /// so a still-open position contributes its unrealized PnL. Drawdown is
    /// measured from a running peak seeded with the initial capital. Sharpe and
    /// Sortino are annualized with `periods_per_year`.
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        periods_per_year: f64,
    ) -> Self {
        let values: Vec<f64> = equity_curve.iter().map(|p| p.total_value).collect();
        let final_equity = values.last().copied().unwrap_or(initial_capital);
        let net_profit = final_equity - initial_capital;
        // The peak starts at the capital, so a first-bar fee dip counts.
        let from_capital: Vec<f64> = std::iter::once(initial_capital)
            .chain(values.iter().copied())
            .collect();
        let (max_dd, max_dd_pct) = max_drawdown(&from_capital);
        let returns = period_returns(&values);

        Self {
            net_profit,
            net_profit_percent: net_profit_percent(net_profit, initial_capital),
            total_trades: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_winner()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loser()).count(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            gross_profit: gross_profit(trades),
            gross_loss: gross_loss(trades),
            average_win: average_win(trades),
            average_loss: average_loss(trades),
            expectancy: expectancy(trades),
            max_drawdown: max_dd,
            max_drawdown_percent: max_dd_pct,
            sharpe_ratio: sharpe_ratio(&returns, periods_per_year),
            sortino_ratio: sortino_ratio(&returns, periods_per_year),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            final_equity,
        }
    }

    /// Metrics of a run that never traded and never moved.
    pub fn empty(initial_capital: f64) -> Self {
        Self::compute(&[], &[], initial_capital, 1.0)
    }

    /// Name and value of the first non-finite field that no sentinel covers.
    ///
    /// `profit_factor == +∞` is the documented sentinel and is allowed.
    pub fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        let fields = [
            ("net_profit", self.net_profit),
            ("net_profit_percent", self.net_profit_percent),
            ("win_rate", self.win_rate),
            ("gross_profit", self.gross_profit),
            ("gross_loss", self.gross_loss),
            ("average_win", self.average_win),
            ("average_loss", self.average_loss),
            ("expectancy", self.expectancy),
            ("max_drawdown", self.max_drawdown),
            ("max_drawdown_percent", self.max_drawdown_percent),
            ("sharpe_ratio", self.sharpe_ratio),
            ("sortino_ratio", self.sortino_ratio),
            ("final_equity", self.final_equity),
        ];
        if self.profit_factor.is_nan() || self.profit_factor == f64::NEG_INFINITY {
            return Some(("profit_factor", self.profit_factor));
        }
        fields.into_iter().find(|(_, v)| !v.is_finite())
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Net profit over initial capital in percentage points; 0 when capital ≤ 0.
pub fn net_profit_percent(net_profit: f64, initial_capital: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    net_profit / initial_capital * 100.0
}

/// Fraction of trades that were winners; 0 for an empty log.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn gross_profit(trades: &[Trade]) -> f64 {
    trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum()
}

/// Sum of losing PnL as a positive number.
pub fn gross_loss(trades: &[Trade]) -> f64 {
    trades.iter().filter(|t| t.is_loser()).map(|t| -t.pnl).sum()
}

/// Gross profit / gross loss.
///
/// Sentinels: 0 for an empty log or no winners; +∞ with winners and no losers.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let profit = gross_profit(trades);
    let loss = gross_loss(trades);
    if loss <= 0.0 {
        return if profit > 0.0 { f64::INFINITY } else { 0.0 };
    }
    profit / loss
}

/// Mean winning PnL; 0 without winners.
pub fn average_win(trades: &[Trade]) -> f64 {
    let n = trades.iter().filter(|t| t.is_winner()).count();
    if n == 0 {
        return 0.0;
    }
    gross_profit(trades) / n as f64
}

/// Mean losing PnL as a positive number; 0 without losers.
pub fn average_loss(trades: &[Trade]) -> f64 {
    let n = trades.iter().filter(|t| t.is_loser()).count();
    if n == 0 {
        return 0.0;
    }
    gross_loss(trades) / n as f64
}

/// Mean PnL per trade; 0 for an empty log.
pub fn expectancy(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.pnl).sum::<f64>() / trades.len() as f64
}

/// Largest peak-to-trough decline: (absolute, percentage points).
///
/// Returns (0, 0) for fewer than two points.
pub fn max_drawdown(equity: &[f64]) -> (f64, f64) {
    if equity.len() < 2 {
        return (0.0, 0.0);
    }
    let mut peak = equity[0];
    let mut max_abs = 0.0_f64;
    let mut max_pct = 0.0_f64;
    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        let dd = peak - eq;
        if dd > max_abs {
            max_abs = dd;
        }
        if peak > 0.0 {
            max_pct = max_pct.max(dd / peak * 100.0);
        }
    }
    (max_abs, max_pct)
}

/// Simple returns between consecutive equity points; a non-positive base
/// contributes a zero return.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio with a zero risk-free rate.
///
/// Sentinel: 0 with fewer than two returns or zero deviation.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(returns);
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    finite_or_zero(mean / std * periods_per_year.max(0.0).sqrt())
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Sentinel: 0 with fewer than two returns, no downside return, or zero
/// downside deviation.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    finite_or_zero(mean_f64(returns) / downside_std * periods_per_year.max(0.0).sqrt())
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut best = 0;
    let mut run = 0;
    for t in trades {
        let hit = if winners { t.is_winner() } else { t.is_loser() };
        if hit {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Profit factor as a JSON number, or `"inf"` for the no-loser sentinel.
mod profit_factor_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if *value == f64::INFINITY {
            Repr::Text("inf".to_string()).serialize(serializer)
        } else {
            Repr::Number(*value).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) if s == "inf" => Ok(f64::INFINITY),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "invalid profit factor '{s}'"
            ))),
        }
    }
}
