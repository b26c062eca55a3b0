//! Portfolio simulation engine.
//!
//! `Simulator` replays bars for one spec; each run owns a fresh
//! `SimulationContext`, so simulators can run in parallel without sharing
//! mutable state.

pub mod config;
pub mod context;
pub mod cost_model;
pub mod simulator;
pub mod sizing;

pub use config::{SimulatorConfig, SlippageModel, TrailingStopConfig, MAX_SLIPPAGE_BPS};
pub use context::SimulationContext;
pub use cost_model::{CostModel, FillSide};
pub use simulator::{SimulationResult, Simulator, SimulatorError};
pub use sizing::{margin_required, position_size};
