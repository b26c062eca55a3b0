//! Ports — async interfaces to the collaborators the engine does not own.
//!
//! - [`BarSupplier`]: historical bars for a symbol and window.
//! - [`ExecutionSink`]: order placement for live strategies.
//! - [`StrategyRepository`]: persisted strategy records with atomic
//!   compare-and-set state transitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use stratforge_core::domain::{
    Bar, DataQualityError, LifecycleState, OrderId, Side, StrategyId, Timeframe,
};
use thiserror::Error;

use crate::record::{StageMetrics, StrategyRecord};

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SupplierError {
    #[error("bar supplier timed out after {ms}ms")]
    Timeout { ms: u64 },
    #[error("bar supplier unavailable: {0}")]
    Unavailable(String),
    #[error("no bars for {symbol} {timeframe}")]
    UnknownSeries { symbol: String, timeframe: Timeframe },
    #[error(transparent)]
    DataQuality(#[from] DataQualityError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("execution venue unavailable: {0}")]
    Unavailable(String),
    #[error("no open position for {0}")]
    NoPosition(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("strategy {0} not found")]
    NotFound(StrategyId),
    #[error("strategy {0} already exists")]
    Duplicate(StrategyId),
    #[error("strategy {id}: expected state {expected}, found {actual}")]
    Conflict {
        id: StrategyId,
        expected: LifecycleState,
        actual: LifecycleState,
    },
    #[error("strategy {id}: transition {from} -> {to} is not allowed")]
    IllegalTransition {
        id: StrategyId,
        from: LifecycleState,
        to: LifecycleState,
    },
}

impl PersistenceError {
    /// Only unavailability is worth retrying; the rest are answers.
    pub fn is_transient(&self) -> bool {
        matches!(self, PersistenceError::Unavailable(_))
    }
}

// ─── Traits ──────────────────────────────────────────────────────────

#[async_trait]
pub trait BarSupplier: Send + Sync {
    /// Bars with open time in `[start, end)`, ascending and gap-free.
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, SupplierError>;
}

#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn submit_order(
        &self,
        symbol: &str,
        side: Side,
        size: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Result<OrderId, ExecutionError>;

    /// Flatten every position held on `symbol`.
    async fn close_position(&self, symbol: &str) -> Result<(), ExecutionError>;
}

#[async_trait]
pub trait StrategyRepository: Send + Sync {
    /// Insert a new record; fails with `Duplicate` if the id exists.
    async fn save(&self, record: StrategyRecord) -> Result<(), PersistenceError>;

    async fn load(&self, id: &StrategyId) -> Result<StrategyRecord, PersistenceError>;

    async fn list_by_state(
        &self,
        state: LifecycleState,
    ) -> Result<Vec<StrategyRecord>, PersistenceError>;

    async fn list_all(&self) -> Result<Vec<StrategyRecord>, PersistenceError>;

    /// Atomically move `id` from `expected` to `state`, attaching `metrics`.
    ///
    /// Fails with `Conflict` when the stored state differs from `expected`
    /// and with `IllegalTransition` when the transition table forbids it.
    /// Either the whole update is visible or none of it is.
    async fn update_state(
        &self,
        id: &StrategyId,
        expected: LifecycleState,
        state: LifecycleState,
        metrics: Option<StageMetrics>,
    ) -> Result<StrategyRecord, PersistenceError>;

    /// Record counts keyed by [`LifecycleState`] display form.
    async fn counts_by_state(&self) -> Result<BTreeMap<String, usize>, PersistenceError> {
        let mut counts = BTreeMap::new();
        for record in self.list_all().await? {
            *counts.entry(record.state.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
