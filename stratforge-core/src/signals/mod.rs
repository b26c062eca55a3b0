//! Signal rules — portfolio-agnostic market timing.
//!
//! A rule sees precomputed indicator values only, never account state. The
//! simulator tells [`StrategyRules::evaluate`] which side (if any) is open,
//! and the rule answers "enter", "exit" or "hold".
//!
//! Each spec compiles to one primary [`SignalRule`] (chosen by its strategy
//! type) plus one [`EntryFilter`] per additional indicator. Filters can veto
//! entries but never force or delay exits.

pub mod bollinger_reversion;
pub mod filters;
pub mod ma_crossover;
pub mod macd_momentum;
pub mod rsi_reversion;

pub use bollinger_reversion::BollingerReversion;
pub use filters::{
    BandFilter, EmaTrendFilter, MacdFilter, RsiCeilingFilter, SmaTrendFilter, VolatilityFilter,
};
pub use ma_crossover::MaCrossover;
pub use macd_momentum::MacdMomentum;
pub use rsi_reversion::RsiReversion;

use crate::domain::{
    Bar, ConfigurationError, IndicatorKind, Side, StrategySpec, StrategyType, TradingMode,
};
use crate::indicators::{closes, Indicator, IndicatorValues};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key under which raw close prices are stored in [`IndicatorValues`].
pub const CLOSE: &str = "close";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Long,
    Short,
    Exit,
    Hold,
}

/// Primary entry/exit logic of a strategy type.
pub trait SignalRule: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Series this rule reads; computed once per run.
    fn indicators(&self) -> Vec<Box<dyn Indicator>>;

    /// Directional bias at `bar_index`, or `None` when there is no setup
    /// (including warmup).
    fn entry(&self, bar_index: usize, values: &IndicatorValues) -> Option<Side>;

    /// Whether an open `side` position should be closed at `bar_index`.
    fn exit(&self, bar_index: usize, side: Side, values: &IndicatorValues) -> bool;
}

/// Entry veto driven by one extra indicator.
pub trait EntryFilter: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn indicators(&self) -> Vec<Box<dyn Indicator>>;

    /// Whether an entry on `side` may proceed. Missing data blocks the entry.
    fn allows(&self, side: Side, bar_index: usize, values: &IndicatorValues) -> bool;
}

/// A spec compiled into executable rules.
#[derive(Debug)]
pub struct StrategyRules {
    rule: Box<dyn SignalRule>,
    filters: Vec<Box<dyn EntryFilter>>,
    trading_mode: TradingMode,
}

impl StrategyRules {
    /// Compile a spec. The spec is validated first.
    pub fn from_spec(spec: &StrategySpec) -> Result<Self, ConfigurationError> {
        spec.validate()?;

        let rule: Box<dyn SignalRule> = match spec.strategy_type {
            StrategyType::MaCrossover => Box::new(MaCrossover::new(
                spec.period("fast_period"),
                spec.period("slow_period"),
            )),
            StrategyType::RsiReversion => Box::new(RsiReversion::new(
                spec.period("rsi_period"),
                required(spec, "rsi_oversold")?,
                required(spec, "rsi_overbought")?,
            )),
            StrategyType::BollingerReversion => Box::new(BollingerReversion::new(
                spec.period("bb_period"),
                required(spec, "bb_k")?,
            )),
            StrategyType::MacdMomentum => Box::new(MacdMomentum::new(
                spec.period("macd_fast"),
                spec.period("macd_slow"),
                spec.period("macd_signal"),
            )),
        };

        let mut filters: Vec<Box<dyn EntryFilter>> = Vec::new();
        for kind in spec.filters() {
            let filter: Box<dyn EntryFilter> = match kind {
                IndicatorKind::Sma => Box::new(SmaTrendFilter::new(spec.period("trend_period"))),
                IndicatorKind::Ema => Box::new(EmaTrendFilter::new(spec.period("ema_period"))),
                IndicatorKind::Rsi => Box::new(RsiCeilingFilter::new(
                    spec.period("filter_rsi_period"),
                    required(spec, "filter_rsi_ceiling")?,
                )),
                IndicatorKind::Bollinger => Box::new(BandFilter::new(
                    spec.period("filter_bb_period"),
                    required(spec, "filter_bb_k")?,
                )),
                IndicatorKind::Macd => Box::new(MacdFilter::standard()),
                IndicatorKind::Volatility => Box::new(VolatilityFilter::new(
                    spec.period("vol_window"),
                    required(spec, "vol_max")?,
                )),
            };
            filters.push(filter);
        }

        Ok(Self {
            rule,
            filters,
            trading_mode: spec.trading_mode,
        })
    }

    /// Precompute every series the rule and its filters read.
    pub fn prepare(&self, bars: &[Bar]) -> IndicatorValues {
        let values = closes(bars);
        let mut out = IndicatorValues::new();
        for indicator in self.all_indicators() {
            out.ensure(indicator.as_ref(), &values);
        }
        out.insert(CLOSE, values);
        out
    }

    /// Bars needed before the rule and every filter can produce a value.
    pub fn warmup(&self) -> usize {
        self.all_indicators()
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0)
    }

    pub fn name(&self) -> &'static str {
        self.rule.name()
    }

    /// Decide what to do at `bar_index` given the currently open side.
    pub fn evaluate(
        &self,
        bar_index: usize,
        open_side: Option<Side>,
        values: &IndicatorValues,
    ) -> Signal {
        if let Some(side) = open_side {
            return if self.rule.exit(bar_index, side, values) {
                Signal::Exit
            } else {
                Signal::Hold
            };
        }

        let Some(side) = self.rule.entry(bar_index, values) else {
            return Signal::Hold;
        };
        if side == Side::Short && self.trading_mode == TradingMode::LongOnly {
            return Signal::Hold;
        }
        if !self.filters.iter().all(|f| f.allows(side, bar_index, values)) {
            return Signal::Hold;
        }
        match side {
            Side::Long => Signal::Long,
            Side::Short => Signal::Short,
        }
    }

    fn all_indicators(&self) -> Vec<Box<dyn Indicator>> {
        let mut all = self.rule.indicators();
        for f in &self.filters {
            all.extend(f.indicators());
        }
        all
    }
}

fn required(spec: &StrategySpec, name: &str) -> Result<f64, ConfigurationError> {
    spec.param(name)
        .ok_or_else(|| ConfigurationError::MissingParameter(name.to_string()))
}

#[cfg(test)]
pub(crate) fn values_with(series: &[(&str, Vec<f64>)]) -> IndicatorValues {
    let mut iv = IndicatorValues::new();
    for (name, v) in series {
        iv.insert(*name, v.clone());
    }
    iv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::test_support::crossover_spec;

    #[test]
    fn compiles_crossover_spec() {
        let rules = StrategyRules::from_spec(&crossover_spec()).unwrap();
        assert_eq!(rules.name(), "ma_crossover");
        assert_eq!(rules.warmup(), 19);
    }

    #[test]
    fn invalid_spec_is_rejected() {
        let mut spec = crossover_spec();
        spec.parameters.remove("slow_period");
        assert!(StrategyRules::from_spec(&spec).is_err());
    }

    #[test]
    fn filters_extend_warmup() {
        let mut spec = crossover_spec();
        spec.indicator_set.push(IndicatorKind::Volatility);
        spec.parameters.insert("vol_window".into(), 30.0);
        spec.parameters.insert("vol_max".into(), 0.05);
        let rules = StrategyRules::from_spec(&spec).unwrap();
        assert_eq!(rules.warmup(), 30);
    }

    #[test]
    fn long_only_suppresses_short_entries() {
        let rules = StrategyRules::from_spec(&crossover_spec()).unwrap();
        // fast below slow → short bias
        let iv = values_with(&[("sma_5", vec![90.0]), ("sma_20", vec![100.0])]);
        assert_eq!(rules.evaluate(0, None, &iv), Signal::Hold);

        let mut spec = crossover_spec();
        spec.trading_mode = TradingMode::LongShort;
        let rules = StrategyRules::from_spec(&spec).unwrap();
        assert_eq!(rules.evaluate(0, None, &iv), Signal::Short);
    }

    #[test]
    fn open_position_only_sees_exit_or_hold() {
        let rules = StrategyRules::from_spec(&crossover_spec()).unwrap();
        let iv = values_with(&[("sma_5", vec![110.0, 90.0]), ("sma_20", vec![100.0, 100.0])]);
        assert_eq!(rules.evaluate(0, Some(Side::Long), &iv), Signal::Hold);
        assert_eq!(rules.evaluate(1, Some(Side::Long), &iv), Signal::Exit);
    }

    #[test]
    fn filter_veto_blocks_entry() {
        let mut spec = crossover_spec();
        spec.indicator_set.push(IndicatorKind::Volatility);
        spec.parameters.insert("vol_window".into(), 20.0);
        spec.parameters.insert("vol_max".into(), 0.01);
        let rules = StrategyRules::from_spec(&spec).unwrap();
        let calm = values_with(&[
            ("sma_5", vec![110.0]),
            ("sma_20", vec![100.0]),
            ("vol_20", vec![0.005]),
        ]);
        let wild = values_with(&[
            ("sma_5", vec![110.0]),
            ("sma_20", vec![100.0]),
            ("vol_20", vec![0.05]),
        ]);
        assert_eq!(rules.evaluate(0, None, &calm), Signal::Long);
        assert_eq!(rules.evaluate(0, None, &wild), Signal::Hold);
    }

    #[test]
    fn prepare_stores_closes_and_series() {
        let rules = StrategyRules::from_spec(&crossover_spec()).unwrap();
        let bars = crate::data::synthetic::linear_bars(100.0, 145.0, 50);
        let iv = rules.prepare(&bars);
        assert_eq!(iv.get(CLOSE, 0), Some(100.0));
        assert!(iv.get("sma_20", 18).is_none());
        assert!(iv.get("sma_20", 19).is_some());
    }
}
