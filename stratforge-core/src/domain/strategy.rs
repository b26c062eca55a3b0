//! StrategySpec — the immutable description of one candidate strategy.
//!
//! Lifecycle status is absent: it lives in the repository
//! record, so a spec never changes after the factory creates it.

use super::bar::Timeframe;
use super::ids::StrategyId;
use super::params::{
    param_range, required_parameters, MAX_POSITION_RANGE, RISK_PER_TRADE_RANGE,
    STOP_LOSS_RANGE, TAKE_PROFIT_RANGE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_INDICATORS: usize = 4;
pub const MAX_LINEAGE: usize = 2;

/// Rule family. Each family has exactly one primary indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    MaCrossover,
    RsiReversion,
    BollingerReversion,
    MacdMomentum,
}

impl StrategyType {
    pub const ALL: [StrategyType; 4] = [
        StrategyType::MaCrossover,
        StrategyType::RsiReversion,
        StrategyType::BollingerReversion,
        StrategyType::MacdMomentum,
    ];

    pub fn primary_indicator(&self) -> IndicatorKind {
        match self {
            StrategyType::MaCrossover => IndicatorKind::Sma,
            StrategyType::RsiReversion => IndicatorKind::Rsi,
            StrategyType::BollingerReversion => IndicatorKind::Bollinger,
            StrategyType::MacdMomentum => IndicatorKind::Macd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::MaCrossover => "ma_crossover",
            StrategyType::RsiReversion => "rsi_reversion",
            StrategyType::BollingerReversion => "bollinger_reversion",
            StrategyType::MacdMomentum => "macd_momentum",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownStrategyType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Bollinger,
    Macd,
    Volatility,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 6] = [
        IndicatorKind::Sma,
        IndicatorKind::Ema,
        IndicatorKind::Rsi,
        IndicatorKind::Bollinger,
        IndicatorKind::Macd,
        IndicatorKind::Volatility,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    #[default]
    LongOnly,
    LongShort,
}

/// Per-trade risk settings. All values are fractions (0.02 = 2%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    pub risk_per_trade: f64,
    pub max_position_size_percent: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            stop_loss_percent: STOP_LOSS_RANGE.default,
            take_profit_percent: TAKE_PROFIT_RANGE.default,
            risk_per_trade: RISK_PER_TRADE_RANGE.default,
            max_position_size_percent: MAX_POSITION_RANGE.default,
        }
    }
}

impl RiskParameters {
    fn validate(&self) -> Result<(), ConfigurationError> {
        let fields = [
            ("stop_loss_percent", self.stop_loss_percent),
            ("take_profit_percent", self.take_profit_percent),
            ("risk_per_trade", self.risk_per_trade),
            ("max_position_size_percent", self.max_position_size_percent),
        ];
        for (field, value) in fields {
            if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                return Err(ConfigurationError::InvalidRisk { field, value });
            }
        }
        Ok(())
    }
}

/// Invalid strategy configuration. Raised synchronously, never enqueued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("symbol is empty")]
    EmptySymbol,
    #[error("no symbols to choose from")]
    NoSymbols,
    #[error("no strategy types to choose from")]
    NoStrategyTypes,
    #[error("unknown strategy type '{0}'")]
    UnknownStrategyType(String),
    #[error("{strategy_type} requires indicator {indicator:?}")]
    MissingPrimaryIndicator {
        strategy_type: StrategyType,
        indicator: IndicatorKind,
    },
    #[error("indicator set must hold 1 to 4 indicators, got {0}")]
    IndicatorCount(usize),
    #[error("indicator {0:?} listed twice")]
    DuplicateIndicator(IndicatorKind),
    #[error("missing parameter '{0}'")]
    MissingParameter(String),
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("parameter '{name}' = {value} outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("risk field {field} = {value} must lie in (0, 1]")]
    InvalidRisk { field: &'static str, value: f64 },
    #[error("lineage holds {0} parents, at most 2 allowed")]
    LineageTooLong(usize),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub id: StrategyId,
    pub strategy_type: StrategyType,
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Sorted, primary indicator included.
    pub indicator_set: Vec<IndicatorKind>,
    /// `BTreeMap` keeps serialization (and hashing) order deterministic.
    pub parameters: BTreeMap<String, f64>,
    pub risk: RiskParameters,
    #[serde(default)]
    pub trading_mode: TradingMode,
    #[serde(default)]
    pub lineage: Vec<StrategyId>,
    #[serde(default)]
    pub generation: u32,
}

impl StrategySpec {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Parameter as a period length. Missing parameters read as 0.
    pub fn period(&self, name: &str) -> usize {
        self.param(name).map(|v| v.max(0.0) as usize).unwrap_or(0)
    }

    pub fn has_indicator(&self, kind: IndicatorKind) -> bool {
        self.indicator_set.contains(&kind)
    }

    /// Indicators beyond the primary one; each gates entries.
    pub fn filters(&self) -> impl Iterator<Item = IndicatorKind> + '_ {
        let primary = self.strategy_type.primary_indicator();
        self.indicator_set.iter().copied().filter(move |k| *k != primary)
    }

    /// Full structural and range check.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigurationError::EmptySymbol);
        }
        let count = self.indicator_set.len();
        if count == 0 || count > MAX_INDICATORS {
            return Err(ConfigurationError::IndicatorCount(count));
        }
        for (i, kind) in self.indicator_set.iter().enumerate() {
            if self.indicator_set[..i].contains(kind) {
                return Err(ConfigurationError::DuplicateIndicator(*kind));
            }
        }
        let primary = self.strategy_type.primary_indicator();
        if !self.has_indicator(primary) {
            return Err(ConfigurationError::MissingPrimaryIndicator {
                strategy_type: self.strategy_type,
                indicator: primary,
            });
        }
        if self.lineage.len() > MAX_LINEAGE {
            return Err(ConfigurationError::LineageTooLong(self.lineage.len()));
        }

        let required = required_parameters(self.strategy_type, &self.indicator_set);
        for name in &required {
            if !self.parameters.contains_key(*name) {
                return Err(ConfigurationError::MissingParameter((*name).to_string()));
            }
        }
        for (name, &value) in &self.parameters {
            if !required.contains(&name.as_str()) {
                return Err(ConfigurationError::UnknownParameter(name.clone()));
            }
            let range = param_range(name)
                .ok_or_else(|| ConfigurationError::UnknownParameter(name.clone()))?;
            if !range.contains(value) {
                return Err(ConfigurationError::OutOfRange {
                    name: name.clone(),
                    value,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        self.risk.validate()
    }
}
