//! Strategy factory — seeded generation, mutation and crossover of specs.
//!
//! All randomness comes from one seeded `StdRng`: the same seed and the same
//! call sequence reproduce the same specs, ids included.

use crate::domain::params::{
    MAX_POSITION_RANGE, RISK_PER_TRADE_RANGE, STOP_LOSS_RANGE, TAKE_PROFIT_RANGE,
};
use crate::domain::strategy::MAX_INDICATORS;
use crate::domain::{
    param_range, required_parameters, ConfigurationError, IndicatorKind, RiskParameters,
    StrategyId, StrategySpec, StrategyType, Timeframe, TradingMode,
};
use crate::rng::RngHierarchy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactoryConfig {
    /// Probability that `mutate` perturbs any one parameter.
    pub mutation_rate: f64,
    /// Perturbation scale: new = old × (1 + U(−p, p)).
    pub perturbation: f64,
    /// Resample attempts before `mutate` falls back to a forced single step.
    pub max_mutation_attempts: u32,
    pub timeframes: Vec<Timeframe>,
    pub trading_mode: TradingMode,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            mutation_rate: 0.3,
            perturbation: 0.2,
            max_mutation_attempts: 8,
            timeframes: vec![Timeframe::H1, Timeframe::H4, Timeframe::D1],
            trading_mode: TradingMode::LongOnly,
        }
    }
}

#[derive(Debug)]
pub struct StrategyFactory {
    rng: StdRng,
    config: FactoryConfig,
}

impl StrategyFactory {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, FactoryConfig::default())
    }

    pub fn with_config(seed: u64, config: FactoryConfig) -> Self {
        Self {
            rng: RngHierarchy::new(seed).rng_for("factory", 0),
            config,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// A fresh generation-0 spec with uniformly sampled parameters.
    pub fn generate(
        &mut self,
        symbols: &[String],
        strategy_types: &[StrategyType],
    ) -> Result<StrategySpec, ConfigurationError> {
        let symbol = symbols
            .choose(&mut self.rng)
            .cloned()
            .ok_or(ConfigurationError::NoSymbols)?;
        let strategy_type = *strategy_types
            .choose(&mut self.rng)
            .ok_or(ConfigurationError::NoStrategyTypes)?;
        let timeframe = self
            .config
            .timeframes
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Timeframe::H1);

        let primary = strategy_type.primary_indicator();
        let count = self.rng.gen_range(1..=MAX_INDICATORS);
        let extras: Vec<IndicatorKind> = IndicatorKind::ALL
            .iter()
            .copied()
            .filter(|k| *k != primary)
            .collect();
        let indicator_set = self.pick_indicators(primary, &extras, count - 1);

        let mut parameters = BTreeMap::new();
        for name in required_parameters(strategy_type, &indicator_set) {
            if let Some(range) = param_range(name) {
                parameters.insert(name.to_string(), range.sample(&mut self.rng));
            }
        }

        let risk = RiskParameters {
            stop_loss_percent: STOP_LOSS_RANGE.sample(&mut self.rng),
            take_profit_percent: TAKE_PROFIT_RANGE.sample(&mut self.rng),
            risk_per_trade: RISK_PER_TRADE_RANGE.sample(&mut self.rng),
            max_position_size_percent: MAX_POSITION_RANGE.sample(&mut self.rng),
        };

        let spec = StrategySpec {
            id: StrategyId::random(&mut self.rng),
            strategy_type,
            symbol,
            timeframe,
            indicator_set,
            parameters,
            risk,
            trading_mode: self.config.trading_mode,
            lineage: Vec::new(),
            generation: 0,
        };
        spec.validate()?;
        debug!(id = spec.id.short(), strategy_type = %spec.strategy_type, "generated spec");
        Ok(spec)
    }

    pub fn generate_batch(
        &mut self,
        count: usize,
        symbols: &[String],
        strategy_types: &[StrategyType],
    ) -> Result<Vec<StrategySpec>, ConfigurationError> {
        (0..count)
            .map(|_| self.generate(symbols, strategy_types))
            .collect()
    }

    /// Perturbed copy of `parent` that differs in at least one parameter.
    pub fn mutate(&mut self, parent: &StrategySpec) -> Result<StrategySpec, ConfigurationError> {
        parent.validate()?;
        let parameters = self.mutated_parameters(&parent.parameters);
        let child = StrategySpec {
            id: self.fresh_id(&[&parent.id]),
            parameters,
            lineage: vec![parent.id.clone()],
            generation: parent.generation + 1,
            ..parent.clone()
        };
        child.validate()?;
        Ok(child)
    }

    /// Perturb a freshly recombined child's parameters in place.
    ///
    /// Unlike [`mutate`](Self::mutate) the child keeps its id, lineage and
    /// generation, so its recorded parents stay the two it was bred from.
    pub fn mutate_offspring(
        &mut self,
        mut child: StrategySpec,
    ) -> Result<StrategySpec, ConfigurationError> {
        child.validate()?;
        child.parameters = self.mutated_parameters(&child.parameters);
        child.validate()?;
        Ok(child)
    }

    /// Recombine two parents.
    ///
    /// Type, symbol, timeframe, risk and trading mode come from one randomly
    /// chosen parent. The indicator set is a random subset of the union that
    /// always keeps the chosen type's primary indicator. Parameters carried by
    /// both parents are inherited from either with equal odds; a parameter
    /// neither parent carries is sampled fresh.
    pub fn crossover(
        &mut self,
        a: &StrategySpec,
        b: &StrategySpec,
    ) -> Result<StrategySpec, ConfigurationError> {
        a.validate()?;
        b.validate()?;

        let base = if self.rng.gen_bool(0.5) { a } else { b };
        let primary = base.strategy_type.primary_indicator();

        let mut union: Vec<IndicatorKind> = a
            .indicator_set
            .iter()
            .chain(&b.indicator_set)
            .copied()
            .collect();
        union.sort();
        union.dedup();
        let extras: Vec<IndicatorKind> = union.into_iter().filter(|k| *k != primary).collect();
        let count = self.rng.gen_range(1..=MAX_INDICATORS.min(extras.len() + 1));
        let indicator_set = self.pick_indicators(primary, &extras, count - 1);

        let mut parameters = BTreeMap::new();
        for name in required_parameters(base.strategy_type, &indicator_set) {
            let value = match (a.param(name), b.param(name)) {
                (Some(x), Some(y)) => {
                    if self.rng.gen_bool(0.5) {
                        x
                    } else {
                        y
                    }
                }
                (Some(x), None) | (None, Some(x)) => x,
                (None, None) => match param_range(name) {
                    Some(range) => range.sample(&mut self.rng),
                    None => return Err(ConfigurationError::UnknownParameter(name.to_string())),
                },
            };
            parameters.insert(name.to_string(), value);
        }

        let child = StrategySpec {
            id: self.fresh_id(&[&a.id, &b.id]),
            strategy_type: base.strategy_type,
            symbol: base.symbol.clone(),
            timeframe: base.timeframe,
            indicator_set,
            parameters,
            risk: base.risk,
            trading_mode: base.trading_mode,
            lineage: vec![a.id.clone(), b.id.clone()],
            generation: a.generation.max(b.generation) + 1,
        };
        child.validate()?;
        Ok(child)
    }

    // ── helpers ──

    /// Perturbed parameters that differ from `current` in at least one value.
    fn mutated_parameters(&mut self, current: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        for _ in 0..self.config.max_mutation_attempts {
            let candidate = self.perturb(current);
            if candidate != *current {
                return candidate;
            }
        }
        self.force_step(current)
    }

    fn pick_indicators(
        &mut self,
        primary: IndicatorKind,
        extras: &[IndicatorKind],
        count: usize,
    ) -> Vec<IndicatorKind> {
        let mut set: Vec<IndicatorKind> = extras
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();
        set.push(primary);
        set.sort();
        set
    }

    fn perturb(&mut self, params: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let rate = self.config.mutation_rate.clamp(0.0, 1.0);
        let p = self.config.perturbation.abs();
        let mut out = params.clone();
        for (name, value) in out.iter_mut() {
            if !self.rng.gen_bool(rate) {
                continue;
            }
            let factor = if p > 0.0 {
                1.0 + self.rng.gen_range(-p..=p)
            } else {
                1.0
            };
            if let Some(range) = param_range(name) {
                *value = range.clamp(*value * factor);
            }
        }
        out
    }

    /// Move one randomly chosen parameter by the smallest in-range step.
    fn force_step(&mut self, params: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut out = params.clone();
        let names: Vec<String> = out.keys().cloned().collect();
        if let Some(name) = names.choose(&mut self.rng) {
            if let (Some(range), Some(value)) = (param_range(name), out.get_mut(name)) {
                *value = range.nudge(*value);
            }
        }
        out
    }

    fn fresh_id(&mut self, avoid: &[&StrategyId]) -> StrategyId {
        loop {
            let id = StrategyId::random(&mut self.rng);
            if !avoid.contains(&&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::test_support::crossover_spec;
    use std::collections::HashSet;

    fn symbols() -> Vec<String> {
        vec!["BTCUSDT".into(), "ETHUSDT".into()]
    }

    #[test]
    fn generated_specs_are_valid_generation_zero() {
        let mut f = StrategyFactory::new(1);
        for _ in 0..200 {
            let spec = f.generate(&symbols(), &StrategyType::ALL).unwrap();
            assert_eq!(spec.validate(), Ok(()));
            assert_eq!(spec.generation, 0);
            assert!(spec.lineage.is_empty());
            assert!((1..=4).contains(&spec.indicator_set.len()));
            assert!(spec.has_indicator(spec.strategy_type.primary_indicator()));
        }
    }

    #[test]
    fn same_seed_same_specs() {
        let a = StrategyFactory::new(77)
            .generate_batch(10, &symbols(), &StrategyType::ALL)
            .unwrap();
        let b = StrategyFactory::new(77)
            .generate_batch(10, &symbols(), &StrategyType::ALL)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_choices_are_configuration_errors() {
        let mut f = StrategyFactory::new(1);
        assert_eq!(
            f.generate(&[], &StrategyType::ALL),
            Err(ConfigurationError::NoSymbols)
        );
        assert_eq!(
            f.generate(&symbols(), &[]),
            Err(ConfigurationError::NoStrategyTypes)
        );
        assert_eq!(
            f.generate(&[String::new()], &StrategyType::ALL),
            Err(ConfigurationError::EmptySymbol)
        );
    }

    #[test]
    fn mutate_changes_parameters_and_lineage() {
        let mut f = StrategyFactory::new(5);
        let parent = crossover_spec();
        let child = f.mutate(&parent).unwrap();
        assert_ne!(child.parameters, parent.parameters);
        assert_ne!(child.id, parent.id);
        assert_eq!(child.lineage, vec![parent.id.clone()]);
        assert_eq!(child.generation, 1);
        assert_eq!(child.strategy_type, parent.strategy_type);
        assert_eq!(child.indicator_set, parent.indicator_set);
    }

    #[test]
    fn mutate_falls_back_when_perturbation_is_disabled() {
        let config = FactoryConfig {
            mutation_rate: 0.0,
            ..FactoryConfig::default()
        };
        let mut f = StrategyFactory::with_config(5, config);
        let parent = crossover_spec();
        let child = f.mutate(&parent).unwrap();
        let changed = parent
            .parameters
            .iter()
            .filter(|(k, v)| child.parameters[*k] != **v)
            .count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn mutate_rejects_invalid_parent() {
        let mut parent = crossover_spec();
        parent.symbol.clear();
        assert!(StrategyFactory::new(1).mutate(&parent).is_err());
    }

    #[test]
    fn hundred_mutations_are_distinct_offspring() {
        let mut f = StrategyFactory::new(2024);
        let parent = crossover_spec();
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let child = f.mutate(&parent).unwrap();
            assert_ne!(child.parameters, parent.parameters);
            assert!(ids.insert(child.id.clone()));
        }
    }

    #[test]
    fn crossover_lineage_and_generation() {
        let mut f = StrategyFactory::new(8);
        let mut a = f.generate(&symbols(), &StrategyType::ALL).unwrap();
        let b = f.generate(&symbols(), &StrategyType::ALL).unwrap();
        a.generation = 3;
        let child = f.crossover(&a, &b).unwrap();
        assert_eq!(child.lineage, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(child.generation, 4);
        assert_eq!(child.validate(), Ok(()));
    }

    #[test]
    fn mutate_offspring_keeps_crossover_lineage() {
        let mut f = StrategyFactory::new(31);
        let a = f.generate(&symbols(), &StrategyType::ALL).unwrap();
        let b = f.generate(&symbols(), &StrategyType::ALL).unwrap();
        let child = f.crossover(&a, &b).unwrap();
        let mutated = f.mutate_offspring(child.clone()).unwrap();
        assert_ne!(mutated.parameters, child.parameters);
        assert_eq!(mutated.id, child.id);
        assert_eq!(mutated.lineage, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(mutated.generation, 1);
        assert_eq!(mutated.validate(), Ok(()));
    }

    #[test]
    fn crossover_indicators_come_from_parents() {
        let mut f = StrategyFactory::new(19);
        for _ in 0..100 {
            let a = f.generate(&symbols(), &StrategyType::ALL).unwrap();
            let b = f.generate(&symbols(), &StrategyType::ALL).unwrap();
            let child = f.crossover(&a, &b).unwrap();
            for kind in &child.indicator_set {
                assert!(a.has_indicator(*kind) || b.has_indicator(*kind));
            }
            assert!(child.strategy_type == a.strategy_type || child.strategy_type == b.strategy_type);
        }
    }
}
