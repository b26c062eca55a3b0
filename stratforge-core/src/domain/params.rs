//! Parameter catalog: the documented valid range of every strategy parameter.
//!
//! Ordered pairs (fast/slow periods, oversold/overbought levels) use disjoint
//! ranges, so any value clamped into its range keeps the pair ordered.

use super::strategy::{IndicatorKind, StrategyType};
use rand::Rng;
use serde::Serialize;

/// Valid range for one numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamRange {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Integer parameters are rounded after every clamp.
    pub integer: bool,
}

impl ParamRange {
    const fn int(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            default,
            min,
            max,
            integer: true,
        }
    }

    const fn real(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            default,
            min,
            max,
            integer: false,
        }
    }

    /// Clamp into range (rounding integers). Non-finite input maps to the default.
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.default;
        }
        let clamped = value.clamp(self.min, self.max);
        if self.integer {
            clamped.round().clamp(self.min, self.max)
        } else {
            clamped
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite()
            && value >= self.min
            && value <= self.max
            && (!self.integer || value.fract() == 0.0)
    }

    /// Uniform sample over the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.integer {
            rng.gen_range(self.min as i64..=self.max as i64) as f64
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    /// Smallest deterministic move away from `value` that stays in range.
    pub fn nudge(&self, value: f64) -> f64 {
        let step = if self.integer {
            1.0
        } else {
            ((self.max - self.min) * 0.01).max(f64::EPSILON)
        };
        let up = self.clamp(value + step);
        if up != value {
            up
        } else {
            self.clamp(value - step)
        }
    }
}

// ─── Catalog ───

const CATALOG: &[ParamRange] = &[
    // ma_crossover
    ParamRange::int("fast_period", 9.0, 2.0, 15.0),
    ParamRange::int("slow_period", 30.0, 16.0, 200.0),
    // rsi_reversion
    ParamRange::int("rsi_period", 14.0, 5.0, 30.0),
    ParamRange::real("rsi_oversold", 30.0, 10.0, 40.0),
    ParamRange::real("rsi_overbought", 70.0, 60.0, 90.0),
    // bollinger_reversion
    ParamRange::int("bb_period", 20.0, 10.0, 50.0),
    ParamRange::real("bb_k", 2.0, 1.0, 3.0),
    // macd_momentum
    ParamRange::int("macd_fast", 12.0, 5.0, 15.0),
    ParamRange::int("macd_slow", 26.0, 16.0, 40.0),
    ParamRange::int("macd_signal", 9.0, 3.0, 15.0),
    // entry filters
    ParamRange::int("trend_period", 50.0, 20.0, 200.0),
    ParamRange::int("ema_period", 21.0, 5.0, 100.0),
    ParamRange::int("filter_rsi_period", 14.0, 5.0, 30.0),
    ParamRange::real("filter_rsi_ceiling", 70.0, 55.0, 85.0),
    ParamRange::int("filter_bb_period", 20.0, 10.0, 50.0),
    ParamRange::real("filter_bb_k", 2.0, 1.0, 3.0),
    ParamRange::int("vol_window", 20.0, 10.0, 50.0),
    ParamRange::real("vol_max", 0.03, 0.005, 0.10),
];

// ── Risk parameter ranges (fractions) ──

pub const STOP_LOSS_RANGE: ParamRange = ParamRange::real("stop_loss_percent", 0.02, 0.01, 0.05);
pub const TAKE_PROFIT_RANGE: ParamRange =
    ParamRange::real("take_profit_percent", 0.04, 0.02, 0.10);
pub const RISK_PER_TRADE_RANGE: ParamRange =
    ParamRange::real("risk_per_trade", 0.02, 0.005, 0.03);
pub const MAX_POSITION_RANGE: ParamRange =
    ParamRange::real("max_position_size_percent", 0.25, 0.1, 0.5);

/// Look up a parameter's range by name.
pub fn param_range(name: &str) -> Option<&'static ParamRange> {
    CATALOG.iter().find(|r| r.name == name)
}

/// Parameters owned by the strategy type's own rule.
pub fn type_parameters(strategy_type: StrategyType) -> &'static [&'static str] {
    match strategy_type {
        StrategyType::MaCrossover => &["fast_period", "slow_period"],
        StrategyType::RsiReversion => &["rsi_period", "rsi_oversold", "rsi_overbought"],
        StrategyType::BollingerReversion => &["bb_period", "bb_k"],
        StrategyType::MacdMomentum => &["macd_fast", "macd_slow", "macd_signal"],
    }
}

/// Parameters of an indicator used as an entry filter.
///
/// The MACD filter uses the standard 12/26/9 setting and has no parameters.
pub fn filter_parameters(kind: IndicatorKind) -> &'static [&'static str] {
    match kind {
        IndicatorKind::Sma => &["trend_period"],
        IndicatorKind::Ema => &["ema_period"],
        IndicatorKind::Rsi => &["filter_rsi_period", "filter_rsi_ceiling"],
        IndicatorKind::Bollinger => &["filter_bb_period", "filter_bb_k"],
        IndicatorKind::Macd => &[],
        IndicatorKind::Volatility => &["vol_window", "vol_max"],
    }
}

/// Every parameter a spec with this type and indicator set must carry.
pub fn required_parameters(
    strategy_type: StrategyType,
    indicators: &[IndicatorKind],
) -> Vec<&'static str> {
    let primary = strategy_type.primary_indicator();
    let mut names: Vec<&'static str> = type_parameters(strategy_type).to_vec();
    for kind in indicators.iter().filter(|k| **k != primary) {
        names.extend_from_slice(filter_parameters(*kind));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn every_named_parameter_is_in_catalog() {
        for t in StrategyType::ALL {
            for name in type_parameters(t) {
                assert!(param_range(name).is_some(), "{name} missing");
            }
        }
        for k in IndicatorKind::ALL {
            for name in filter_parameters(k) {
                assert!(param_range(name).is_some(), "{name} missing");
            }
        }
    }

    #[test]
    fn defaults_lie_inside_ranges() {
        for r in CATALOG {
            assert!(r.contains(r.default), "{} default out of range", r.name);
        }
    }

    #[test]
    fn ordered_pairs_use_disjoint_ranges() {
        let pairs = [
            ("fast_period", "slow_period"),
            ("macd_fast", "macd_slow"),
            ("rsi_oversold", "rsi_overbought"),
        ];
        for (lo, hi) in pairs {
            assert!(param_range(lo).unwrap().max < param_range(hi).unwrap().min);
        }
    }

    #[test]
    fn clamp_rounds_integers() {
        let r = param_range("fast_period").unwrap();
        assert_eq!(r.clamp(7.4), 7.0);
        assert_eq!(r.clamp(100.0), 15.0);
        assert_eq!(r.clamp(f64::NAN), r.default);
    }

    #[test]
    fn samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for r in CATALOG {
            for _ in 0..50 {
                assert!(r.contains(r.sample(&mut rng)));
            }
        }
    }

    #[test]
    fn nudge_always_moves() {
        for r in CATALOG {
            for v in [r.min, r.default, r.max] {
                let moved = r.nudge(v);
                assert_ne!(moved, v, "{} stuck at {v}", r.name);
                assert!(r.contains(moved));
            }
        }
    }

    #[test]
    fn required_parameters_skip_primary_filter() {
        let names = required_parameters(
            StrategyType::MaCrossover,
            &[IndicatorKind::Sma, IndicatorKind::Rsi],
        );
        assert_eq!(
            names,
            vec!["fast_period", "slow_period", "filter_rsi_period", "filter_rsi_ceiling"]
        );
    }
}
