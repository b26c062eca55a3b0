//! StratForge Core — domain types, indicators, signal rules, simulator, factory.
//!
//! This crate holds everything that is pure and deterministic:
//! - Domain types (bars, strategy specs, lifecycle states, positions, trades)
//! - Indicator library with explicit insufficient-data readings
//! - Signal rules and entry filters compiled from a spec
//! - Portfolio simulator with a per-run simulation context
//! - Strategy factory (generate, mutate, crossover)
//! - Seeded synthetic markets for tests and offline runs

pub mod data;
pub mod domain;
pub mod engine;
pub mod factory;
pub mod fingerprint;
pub mod indicators;
pub mod rng;
pub mod signals;

pub use domain::{
    Bar, ConfigurationError, DataQualityError, EquityPoint, IndicatorKind, LifecycleState,
    RetireReason, RiskParameters, Side, StrategyId, StrategySpec, StrategyType, Timeframe, Trade,
};
pub use engine::{SimulationResult, Simulator, SimulatorConfig, SimulatorError};
pub use factory::{FactoryConfig, StrategyFactory};
