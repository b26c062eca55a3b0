//! Backtest runner — wires the simulator, metrics and fitness together.
//!
//! Pure and synchronous: the scheduler calls it on the blocking pool, the
//! evolutionary search from rayon workers, the CLI directly.

use serde::{Deserialize, Serialize};
use stratforge_core::domain::{Bar, StrategySpec};
use stratforge_core::engine::{SimulationResult, Simulator, SimulatorConfig, SimulatorError};
use thiserror::Error;

use crate::fitness::{fitness, FitnessWeights};
use crate::metrics::PerformanceMetrics;

/// A metric came out non-finite and no sentinel covers it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("metric {name} is non-finite ({value})")]
    NonFiniteMetric { name: &'static str, value: f64 },
    #[error("fitness is non-finite ({0})")]
    NonFiniteFitness(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error(transparent)]
    Simulator(#[from] SimulatorError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

impl RunError {
    /// Malformed input bars; worth one retry with a fresh fetch.
    pub fn is_data_error(&self) -> bool {
        matches!(self, RunError::Simulator(SimulatorError::DataQuality(_)))
    }
}

/// Complete result of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRun {
    pub spec: StrategySpec,
    pub result: SimulationResult,
    pub metrics: PerformanceMetrics,
    pub fitness: f64,
    pub bar_count: usize,
}

/// Simulate `spec` over every bar, then score it.
pub fn run_backtest(
    spec: &StrategySpec,
    bars: &[Bar],
    config: &SimulatorConfig,
    weights: &FitnessWeights,
) -> Result<BacktestRun, RunError> {
    run_backtest_window(spec, bars, 0, config, weights)
}

/// Like [`run_backtest`], trading only from `first_tradable` onward; earlier
/// bars warm the indicators.
pub fn run_backtest_window(
    spec: &StrategySpec,
    bars: &[Bar],
    first_tradable: usize,
    config: &SimulatorConfig,
    weights: &FitnessWeights,
) -> Result<BacktestRun, RunError> {
    let simulator = Simulator::new(config.clone())?;
    let result = simulator.run_window(spec, bars, first_tradable)?;
    let metrics = PerformanceMetrics::compute(
        &result.trades,
        &result.equity_curve,
        result.initial_capital,
        spec.timeframe.periods_per_year(),
    );
    if let Some((name, value)) = metrics.first_non_finite() {
        return Err(SimulationError::NonFiniteMetric { name, value }.into());
    }
    let score = fitness(&metrics, weights);
    if !score.is_finite() {
        return Err(SimulationError::NonFiniteFitness(score).into());
    }
    Ok(BacktestRun {
        spec: spec.clone(),
        result,
        metrics,
        fitness: score,
        bar_count: bars.len(),
    })
}
