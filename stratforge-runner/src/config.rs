//! Lifecycle configuration, loaded from TOML.
//!
//! ```toml
//! [gates.backtest]
//! min_win_rate = 0.55
//! min_profit_factor = 1.5
//!
//! [scheduler]
//! workers = 3
//!
//! [simulator]
//! fee_rate = 0.001
//! slippage = { kind = "fixed", bps = 5.0 }
//! ```
//!
//! Every section and field has a default; unknown keys are rejected.

use crate::fitness::FitnessWeights;
use crate::gates::GatesConfig;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stratforge_core::engine::SimulatorConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Worker tasks draining the job queue.
    pub workers: usize,
    /// Timeout for one bar-supplier call.
    pub supplier_timeout_ms: u64,
    /// Extra attempts after a data error before retiring `simulation_error`.
    pub data_retries: u32,
    /// Delayed re-runs of a job that failed outright (repository down after
    /// backoff, worker panic) before retiring `job_failed`.
    pub job_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            supplier_timeout_ms: 10_000,
            data_retries: 1,
            job_retries: 3,
        }
    }
}

impl SchedulerConfig {
    pub fn supplier_timeout(&self) -> Duration {
        Duration::from_millis(self.supplier_timeout_ms)
    }
}

/// Exponential backoff for repository operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let ms = (self.initial_backoff_ms as f64 * exp).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

/// Backtest window: the `bars` bars that end at `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub bars: usize,
    pub end: DateTime<Utc>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            bars: 500,
            end: Utc
                .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

/// Paper-trading session, starting where the backtest window ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaperConfig {
    /// Session length in bars.
    pub duration_bars: usize,
    /// History before the session used only to warm indicators.
    pub warmup_bars: usize,
    /// Bars revealed per check-in.
    pub bars_per_check_in: usize,
    /// Wall-clock delay between check-ins.
    pub check_in_interval_ms: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            duration_bars: 168,
            warmup_bars: 250,
            bars_per_check_in: 24,
            check_in_interval_ms: 25,
        }
    }
}

impl PaperConfig {
    pub fn check_in_interval(&self) -> Duration {
        Duration::from_millis(self.check_in_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
    /// Submit promotable strategies to the execution sink without waiting
    /// for `promote_to_live`.
    pub auto_promote: bool,
    /// Capital each live strategy sizes against.
    pub allocated_capital: f64,
    /// Notional cap as a fraction of allocated capital.
    pub max_position_fraction: f64,
    /// Peak-to-current drawdown, in percentage points, that retires a live strategy.
    pub max_drawdown_percent: f64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            auto_promote: false,
            allocated_capital: 1_000.0,
            max_position_fraction: 0.1,
            max_drawdown_percent: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Broadcast buffer; slow subscribers lag past this and drop events.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Complete lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleConfig {
    pub gates: GatesConfig,
    pub scheduler: SchedulerConfig,
    pub retry: RetryConfig,
    pub simulator: SimulatorConfig,
    pub backtest: BacktestConfig,
    pub paper: PaperConfig,
    pub live: LiveConfig,
    pub fitness: FitnessWeights,
    pub events: EventsConfig,
}

impl LifecycleConfig {
    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gates.validate().map_err(ConfigError::Invalid)?;
        self.simulator.validate().map_err(ConfigError::Invalid)?;
        self.fitness.validate().map_err(ConfigError::Invalid)?;

        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let s = &self.scheduler;
        if !(1..=16).contains(&s.workers) {
            return invalid(format!("scheduler.workers must be in 1..=16, got {}", s.workers));
        }
        if s.supplier_timeout_ms == 0 {
            return invalid("scheduler.supplier_timeout_ms must be > 0".into());
        }
        let r = &self.retry;
        if r.max_attempts == 0 {
            return invalid("retry.max_attempts must be >= 1".into());
        }
        if !(r.multiplier.is_finite() && r.multiplier >= 1.0) {
            return invalid(format!("retry.multiplier must be >= 1, got {}", r.multiplier));
        }
        if self.backtest.bars == 0 {
            return invalid("backtest.bars must be > 0".into());
        }
        let p = &self.paper;
        if p.duration_bars == 0 || p.bars_per_check_in == 0 {
            return invalid("paper.duration_bars and paper.bars_per_check_in must be > 0".into());
        }
        let l = &self.live;
        if !(l.allocated_capital.is_finite() && l.allocated_capital > 0.0) {
            return invalid(format!(
                "live.allocated_capital must be > 0, got {}",
                l.allocated_capital
            ));
        }
        if !(l.max_position_fraction > 0.0 && l.max_position_fraction <= 1.0) {
            return invalid(format!(
                "live.max_position_fraction must be in (0, 1], got {}",
                l.max_position_fraction
            ));
        }
        if !(l.max_drawdown_percent > 0.0 && l.max_drawdown_percent <= 100.0) {
            return invalid(format!(
                "live.max_drawdown_percent must be in (0, 100], got {}",
                l.max_drawdown_percent
            ));
        }
        if self.events.capacity == 0 {
            return invalid("events.capacity must be > 0".into());
        }
        Ok(())
    }
}
