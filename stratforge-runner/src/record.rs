//! Repository row for one strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratforge_core::domain::{LifecycleState, StrategyId, StrategySpec};

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub at: DateTime<Utc>,
}

/// Metrics attached to a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageMetrics {
    Backtest {
        metrics: PerformanceMetrics,
        fitness: f64,
    },
    Paper {
        metrics: PerformanceMetrics,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub spec: StrategySpec,
    pub state: LifecycleState,
    pub backtest_metrics: Option<PerformanceMetrics>,
    pub paper_metrics: Option<PerformanceMetrics>,
    pub fitness: Option<f64>,
    pub history: Vec<StateChange>,
    pub updated_at: DateTime<Utc>,
}

impl StrategyRecord {
    /// A freshly generated record.
    pub fn new(spec: StrategySpec) -> Self {
        Self {
            spec,
            state: LifecycleState::Generated,
            backtest_metrics: None,
            paper_metrics: None,
            fitness: None,
            history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &StrategyId {
        &self.spec.id
    }

    /// Apply a transition in place. The caller has checked it is allowed.
    pub(crate) fn apply(&mut self, state: LifecycleState, metrics: Option<StageMetrics>) {
        let now = Utc::now();
        self.history.push(StateChange {
            from: self.state,
            to: state,
            at: now,
        });
        self.state = state;
        self.updated_at = now;
        match metrics {
            Some(StageMetrics::Backtest { metrics, fitness }) => {
                self.backtest_metrics = Some(metrics);
                self.fitness = Some(fitness);
            }
            Some(StageMetrics::Paper { metrics }) => self.paper_metrics = Some(metrics),
            None => {}
        }
    }

    /// Whether the history passed Gate 1 and then Gate 2, in that order.
    pub fn passed_both_gates(&self) -> bool {
        let gate1 = self
            .history
            .iter()
            .position(|c| c.from == LifecycleState::Backtested && c.to == LifecycleState::QueuedPaper);
        let gate2 = self
            .history
            .iter()
            .position(|c| c.from == LifecycleState::PaperTrading && c.to == LifecycleState::Promotable);
        matches!((gate1, gate2), (Some(a), Some(b)) if a < b)
    }
}
