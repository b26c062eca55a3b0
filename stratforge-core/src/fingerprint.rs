//! Fingerprints — BLAKE3 digests over run output and spec content.
//!
//! - `RunFingerprint`: trade log + equity curve; equal fingerprints mean
//!   byte-identical simulation output.
//! - `SpecFingerprint`: everything that shapes a spec's behaviour (type,
//!   market, indicators, parameters, risk) but not its id or lineage; used to
//!   spot duplicate candidates.
//!
//! Floats are hashed by bit pattern, so `0.1 + 0.2` and `0.3` differ.

use crate::domain::{EquityPoint, StrategySpec, Trade};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunFingerprint(pub String);

impl RunFingerprint {
    pub fn of(trades: &[Trade], equity_curve: &[EquityPoint]) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(&(trades.len() as u64).to_le_bytes());
        for t in trades {
            h.update(&[t.side.direction() as i8 as u8]);
            for v in [t.entry_price, t.exit_price, t.size, t.fee, t.pnl, t.pnl_percent] {
                h.update(&v.to_bits().to_le_bytes());
            }
            h.update(&t.opened_at.timestamp_millis().to_le_bytes());
            h.update(&t.closed_at.timestamp_millis().to_le_bytes());
            h.update(t.exit_reason.to_string().as_bytes());
        }
        h.update(&(equity_curve.len() as u64).to_le_bytes());
        for p in equity_curve {
            h.update(&p.timestamp.timestamp_millis().to_le_bytes());
            h.update(&p.total_value.to_bits().to_le_bytes());
        }
        Self(h.finalize().to_hex().to_string())
    }
}

impl fmt::Display for RunFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecFingerprint(pub String);

impl SpecFingerprint {
    pub fn of(spec: &StrategySpec) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(spec.strategy_type.as_str().as_bytes());
        h.update(b"|");
        h.update(spec.symbol.as_bytes());
        h.update(b"|");
        h.update(spec.timeframe.as_str().as_bytes());
        for kind in &spec.indicator_set {
            h.update(format!("|{kind:?}").as_bytes());
        }
        // BTreeMap iteration is ordered.
        for (name, value) in &spec.parameters {
            h.update(name.as_bytes());
            h.update(&value.to_bits().to_le_bytes());
        }
        let risk = &spec.risk;
        for v in [
            risk.stop_loss_percent,
            risk.take_profit_percent,
            risk.risk_per_trade,
            risk.max_position_size_percent,
        ] {
            h.update(&v.to_bits().to_le_bytes());
        }
        h.update(format!("{:?}", spec.trading_mode).as_bytes());
        Self(h.finalize().to_hex().to_string())
    }
}

impl fmt::Display for SpecFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::test_support::crossover_spec;
    use crate::domain::{ExitReason, Side, StrategyId};
    use chrono::{DateTime, Utc};

    fn trade(pnl: f64) -> Trade {
        Trade {
            side: Side::Long,
            entry_price: 100.0,
            exit_price: 101.0,
            size: 1.0,
            fee: 0.0,
            pnl,
            pnl_percent: pnl,
            opened_at: DateTime::<Utc>::UNIX_EPOCH,
            closed_at: DateTime::<Utc>::UNIX_EPOCH,
            exit_reason: ExitReason::Signal,
        }
    }

    #[test]
    fn run_fingerprint_detects_any_change() {
        let a = RunFingerprint::of(&[trade(1.0)], &[]);
        let b = RunFingerprint::of(&[trade(1.0)], &[]);
        let c = RunFingerprint::of(&[trade(1.0000001)], &[]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn empty_run_fingerprint_is_stable() {
        assert_eq!(RunFingerprint::of(&[], &[]), RunFingerprint::of(&[], &[]));
    }

    #[test]
    fn spec_fingerprint_ignores_identity() {
        let a = crossover_spec();
        let mut b = crossover_spec();
        b.id = StrategyId::new("other");
        b.lineage = vec![a.id.clone()];
        b.generation = 4;
        assert_eq!(SpecFingerprint::of(&a), SpecFingerprint::of(&b));
    }

    #[test]
    fn spec_fingerprint_tracks_parameters() {
        let a = crossover_spec();
        let mut b = crossover_spec();
        b.parameters.insert("fast_period".into(), 6.0);
        assert_ne!(SpecFingerprint::of(&a), SpecFingerprint::of(&b));
    }
}
