//! Trade — a closed round trip. Open positions never appear in the log.

use super::position::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Signal,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::Signal => "signal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Entry plus exit fee.
    pub fee: f64,
    /// Net of both fees.
    pub pnl: f64,
    /// `pnl` over entry notional, in percentage points.
    pub pnl_percent: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade(pnl: f64) -> Trade {
        Trade {
            side: Side::Long,
            entry_price: 100.0,
            exit_price: 104.0,
            size: 1.0,
            fee: 0.2,
            pnl,
            pnl_percent: pnl,
            opened_at: DateTime::<Utc>::UNIX_EPOCH,
            closed_at: DateTime::<Utc>::UNIX_EPOCH,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn winner_and_loser() {
        assert!(sample_trade(3.8).is_winner());
        assert!(sample_trade(-1.0).is_loser());
        let flat = sample_trade(0.0);
        assert!(!flat.is_winner() && !flat.is_loser());
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::TrailingStop.to_string(), "trailing_stop");
        assert_eq!(
            serde_json::to_string(&ExitReason::StopLoss).unwrap(),
            "\"stop_loss\""
        );
    }
}
