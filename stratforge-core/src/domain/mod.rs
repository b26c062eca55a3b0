//! Domain types for StratForge.

pub mod bar;
pub mod equity;
pub mod ids;
pub mod lifecycle;
pub mod params;
pub mod position;
pub mod strategy;
pub mod trade;

pub use bar::{check_contiguous, validate_bars, Bar, BarDefect, DataQualityError, Timeframe};
pub use equity::EquityPoint;
pub use ids::{OrderId, StrategyId};
pub use lifecycle::{LifecycleState, RetireReason};
pub use params::{param_range, required_parameters, ParamRange};
pub use position::{Position, Side};
pub use strategy::{
    ConfigurationError, IndicatorKind, RiskParameters, StrategySpec, StrategyType, TradingMode,
};
pub use trade::{ExitReason, Trade};

/// Symbol type alias
pub type Symbol = String;
