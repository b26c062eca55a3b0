//! StratForge Runner — metrics, gates, lifecycle scheduler, search, export.
//!
//! This crate builds on `stratforge-core` to provide:
//! - Performance metrics and the composite fitness score
//! - Backtest and paper gates
//! - Ports for bar supply, order execution and persistence, with in-memory
//!   and paper implementations
//! - The lifecycle scheduler: backtest workers, paper sessions, live
//!   promotion and retirement, all reported on an event stream
//! - Batch generation and evolutionary search
//! - JSON and CSV export

pub mod config;
pub mod events;
pub mod export;
pub mod fitness;
pub mod gates;
pub mod metrics;
pub mod ports;
pub mod record;
pub mod repository;
pub mod runner;
pub mod scheduler;
pub mod search;
pub mod sink;
pub mod supplier;

pub use config::{
    BacktestConfig, ConfigError, EventsConfig, LifecycleConfig, LiveConfig, PaperConfig,
    RetryConfig, SchedulerConfig,
};
pub use events::{EventBus, LifecycleEvent};
pub use fitness::{fitness, FitnessWeights};
pub use gates::{backtest_gate, paper_gate, Gate, GateDecision, GateThresholds, GatesConfig};
pub use metrics::PerformanceMetrics;
pub use ports::{
    BarSupplier, ExecutionError, ExecutionSink, PersistenceError, StrategyRepository,
    SupplierError,
};
pub use record::{StageMetrics, StateChange, StrategyRecord};
pub use repository::InMemoryStrategyRepository;
pub use runner::{run_backtest, run_backtest_window, BacktestRun, RunError, SimulationError};
pub use scheduler::{Scheduler, SchedulerError, SchedulerHandle, SchedulerStatus};
pub use search::{
    evolve, generate_strategies, EvolutionConfig, GenerationConfig, ScoredSpec, SearchError,
};
pub use sink::{PaperExecutionSink, PaperOrder};
pub use supplier::{StaticBarSupplier, SyntheticBarSupplier};
