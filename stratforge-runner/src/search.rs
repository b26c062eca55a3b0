//! Strategy generation and evolutionary search.
//!
//! `evolve` scores each generation in parallel with rayon. Each candidate
//! gets its own simulator; results are collected in population order, and
//! all randomness comes from seeded generators on the calling thread, so
//! the outcome does not depend on the thread count.

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stratforge_core::domain::{Bar, ConfigurationError, StrategySpec, StrategyType};
use stratforge_core::engine::SimulatorConfig;
use stratforge_core::rng::RngHierarchy;
use stratforge_core::{FactoryConfig, StrategyFactory};
use thiserror::Error;
use tracing::{debug, info};

use crate::fitness::FitnessWeights;
use crate::metrics::PerformanceMetrics;
use crate::runner::run_backtest;

// ─── Generation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub seed: u64,
    pub count: usize,
    pub symbols: Vec<String>,
    pub strategy_types: Vec<StrategyType>,
    pub factory: FactoryConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            count: 10,
            symbols: vec!["BTCUSDT".to_string()],
            strategy_types: StrategyType::ALL.to_vec(),
            factory: FactoryConfig::default(),
        }
    }
}

/// Generate `config.count` fresh specs.
pub fn generate_strategies(config: &GenerationConfig) -> Result<Vec<StrategySpec>, ConfigurationError> {
    let mut factory = StrategyFactory::with_config(config.seed, config.factory.clone());
    factory.generate_batch(config.count, &config.symbols, &config.strategy_types)
}

// ─── Evolution ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvolutionConfig {
    pub seed: u64,
    pub population: usize,
    pub generations: usize,
    /// Best candidates copied unchanged into the next generation.
    pub elite: usize,
    /// Candidates drawn per tournament.
    pub tournament_size: usize,
    pub symbols: Vec<String>,
    pub strategy_types: Vec<StrategyType>,
    pub factory: FactoryConfig,
    pub simulator: SimulatorConfig,
    pub fitness: FitnessWeights,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population: 24,
            generations: 5,
            elite: 4,
            tournament_size: 3,
            symbols: vec!["BTCUSDT".to_string()],
            strategy_types: StrategyType::ALL.to_vec(),
            factory: FactoryConfig::default(),
            simulator: SimulatorConfig::default(),
            fitness: FitnessWeights::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("invalid evolution config: {0}")]
    Invalid(String),
}

/// A candidate and its score. Candidates whose run failed score `None` and
/// rank last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSpec {
    pub spec: StrategySpec,
    pub metrics: Option<PerformanceMetrics>,
    pub fitness: Option<f64>,
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.population < 2 {
            return Err(SearchError::Invalid("population must be >= 2".into()));
        }
        if self.elite >= self.population {
            return Err(SearchError::Invalid(format!(
                "elite ({}) must be smaller than population ({})",
                self.elite, self.population
            )));
        }
        if self.tournament_size == 0 {
            return Err(SearchError::Invalid("tournament_size must be >= 1".into()));
        }
        self.simulator.validate().map_err(SearchError::Invalid)?;
        self.fitness.validate().map_err(SearchError::Invalid)
    }
}

/// Run the search over `bars`. Returns the final population, best first.
pub fn evolve(config: &EvolutionConfig, bars: &[Bar]) -> Result<Vec<ScoredSpec>, SearchError> {
    config.validate()?;
    let mut factory = StrategyFactory::with_config(config.seed, config.factory.clone());
    let mut population =
        factory.generate_batch(config.population, &config.symbols, &config.strategy_types)?;
    let mut ranked = score(&population, bars, config);

    for generation in 1..=config.generations {
        let mut rng = RngHierarchy::new(config.seed).rng_for("tournament", generation as u64);
        let mut next: Vec<StrategySpec> = ranked
            .iter()
            .take(config.elite)
            .map(|s| s.spec.clone())
            .collect();
        while next.len() < config.population {
            let a = tournament(&ranked, config.tournament_size, &mut rng);
            let b = tournament(&ranked, config.tournament_size, &mut rng);
            let child = factory.crossover(a, b)?;
            next.push(factory.mutate_offspring(child)?);
        }
        population = next;
        ranked = score(&population, bars, config);
        info!(
            generation,
            best = ranked.first().and_then(|s| s.fitness).unwrap_or(f64::NAN),
            "generation scored"
        );
    }
    Ok(ranked)
}

/// Score every candidate in parallel, then rank best first.
fn score(population: &[StrategySpec], bars: &[Bar], config: &EvolutionConfig) -> Vec<ScoredSpec> {
    let mut scored: Vec<ScoredSpec> = population
        .par_iter()
        .map(|spec| match run_backtest(spec, bars, &config.simulator, &config.fitness) {
            Ok(run) => ScoredSpec {
                spec: spec.clone(),
                metrics: Some(run.metrics),
                fitness: Some(run.fitness),
            },
            Err(e) => {
                debug!(spec_id = %spec.id, error = %e, "candidate failed");
                ScoredSpec {
                    spec: spec.clone(),
                    metrics: None,
                    fitness: None,
                }
            }
        })
        .collect();
    // Stable sort keeps population order among ties.
    scored.sort_by(|a, b| {
        let key = |s: &ScoredSpec| s.fitness.unwrap_or(f64::NEG_INFINITY);
        key(b).total_cmp(&key(a))
    });
    scored
}

fn tournament<'a>(ranked: &'a [ScoredSpec], size: usize, rng: &mut StdRng) -> &'a StrategySpec {
    // `ranked` is sorted best first, so the smallest drawn index wins.
    let best = (0..size)
        .map(|_| rng.gen_range(0..ranked.len()))
        .min()
        .unwrap_or(0);
    &ranked[best].spec
}
