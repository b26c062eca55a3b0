//! Lifecycle events on a bounded broadcast channel.
//!
//! Delivery is best-effort: a subscriber that falls more than `capacity`
//! events behind receives `Lagged` and skips ahead. The repository stays the
//! source of truth.

use serde::{Deserialize, Serialize};
use stratforge_core::domain::{LifecycleState, OrderId, RetireReason, StrategyId};
use tokio::sync::broadcast;
use tracing::trace;

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Enqueued {
        id: StrategyId,
    },
    Backtested {
        id: StrategyId,
        metrics: PerformanceMetrics,
        fitness: f64,
    },
    Promoted {
        id: StrategyId,
        from: LifecycleState,
        to: LifecycleState,
    },
    Retired {
        id: StrategyId,
        reason: RetireReason,
    },
    PaperStarted {
        id: StrategyId,
        duration_bars: usize,
    },
    PaperCheckIn {
        id: StrategyId,
        elapsed_bars: usize,
        duration_bars: usize,
        equity: f64,
    },
    WentLive {
        id: StrategyId,
        order_id: OrderId,
        size: f64,
    },
    ExecutionAlert {
        id: StrategyId,
        message: String,
    },
}

impl LifecycleEvent {
    pub fn strategy_id(&self) -> &StrategyId {
        match self {
            LifecycleEvent::Enqueued { id }
            | LifecycleEvent::Backtested { id, .. }
            | LifecycleEvent::Promoted { id, .. }
            | LifecycleEvent::Retired { id, .. }
            | LifecycleEvent::PaperStarted { id, .. }
            | LifecycleEvent::PaperCheckIn { id, .. }
            | LifecycleEvent::WentLive { id, .. }
            | LifecycleEvent::ExecutionAlert { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Never blocks; an event with no subscribers is dropped.
    pub fn publish(&self, event: LifecycleEvent) {
        if self.tx.send(event).is_err() {
            trace!("lifecycle event dropped: no subscribers");
        }
    }
}
