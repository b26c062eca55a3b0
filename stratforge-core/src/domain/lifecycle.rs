//! Lifecycle state machine for a strategy.
//!
//! The transition table lives here so every caller agrees on it; only the
//! scheduler in `stratforge-runner` actually drives transitions.
//!
//! ```text
//! generated → queued_backtest → backtested → queued_paper → paper_trading → promotable → live
//!                                   │                            │                        │
//!                                   └─ retired(failed_backtest)  └─ retired(failed_paper) └─ retired(...)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a strategy left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireReason {
    FailedBacktest,
    FailedPaperTrading,
    SimulationError,
    InvalidConfiguration,
    /// A pipeline job kept failing after its retries ran out.
    JobFailed,
    Manual,
    MaxDrawdownExceeded,
    EmergencyStop,
}

impl RetireReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetireReason::FailedBacktest => "failed_backtest",
            RetireReason::FailedPaperTrading => "failed_paper_trading",
            RetireReason::SimulationError => "simulation_error",
            RetireReason::InvalidConfiguration => "invalid_configuration",
            RetireReason::JobFailed => "job_failed",
            RetireReason::Manual => "manual",
            RetireReason::MaxDrawdownExceeded => "max_drawdown_exceeded",
            RetireReason::EmergencyStop => "emergency_stop",
        }
    }
}

impl fmt::Display for RetireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Generated,
    QueuedBacktest,
    Backtested,
    QueuedPaper,
    PaperTrading,
    Promotable,
    Live,
    Retired(RetireReason),
}

impl LifecycleState {
    /// Every non-retired state, in pipeline order.
    pub const ACTIVE: [LifecycleState; 7] = [
        LifecycleState::Generated,
        LifecycleState::QueuedBacktest,
        LifecycleState::Backtested,
        LifecycleState::QueuedPaper,
        LifecycleState::PaperTrading,
        LifecycleState::Promotable,
        LifecycleState::Live,
    ];

    pub fn is_retired(&self) -> bool {
        matches!(self, LifecycleState::Retired(_))
    }

    /// States in which a simulation job may be queued or running.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            LifecycleState::QueuedBacktest | LifecycleState::QueuedPaper | LifecycleState::PaperTrading
        )
    }

    /// Whether the transition table allows `self → next`.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (*self, next) {
            (Retired(_), _) => false,
            (Generated, QueuedBacktest)
            | (QueuedBacktest, Backtested)
            | (Backtested, QueuedPaper)
            | (QueuedPaper, PaperTrading)
            | (PaperTrading, Promotable)
            | (Promotable, Live) => true,
            (Backtested, Retired(RetireReason::FailedBacktest)) => true,
            (PaperTrading, Retired(RetireReason::FailedPaperTrading)) => true,
            (
                QueuedBacktest | Backtested | QueuedPaper | PaperTrading,
                Retired(
                    RetireReason::SimulationError
                    | RetireReason::InvalidConfiguration
                    | RetireReason::JobFailed,
                ),
            ) => true,
            (Live, Retired(RetireReason::MaxDrawdownExceeded)) => true,
            (_, Retired(RetireReason::Manual | RetireReason::EmergencyStop)) => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::Generated => "generated",
            LifecycleState::QueuedBacktest => "queued_backtest",
            LifecycleState::Backtested => "backtested",
            LifecycleState::QueuedPaper => "queued_paper",
            LifecycleState::PaperTrading => "paper_trading",
            LifecycleState::Promotable => "promotable",
            LifecycleState::Live => "live",
            LifecycleState::Retired(_) => "retired",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Retired(reason) => write!(f, "retired({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn forward_chain_is_allowed() {
        let chain = LifecycleState::ACTIVE;
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn skipping_stages_is_rejected() {
        assert!(!Generated.can_transition_to(Live));
        assert!(!Generated.can_transition_to(Backtested));
        assert!(!Backtested.can_transition_to(PaperTrading));
        assert!(!QueuedPaper.can_transition_to(Promotable));
        assert!(!Promotable.can_transition_to(QueuedPaper));
    }

    #[test]
    fn gate_failures_only_from_their_gate() {
        assert!(Backtested.can_transition_to(Retired(RetireReason::FailedBacktest)));
        assert!(!PaperTrading.can_transition_to(Retired(RetireReason::FailedBacktest)));
        assert!(PaperTrading.can_transition_to(Retired(RetireReason::FailedPaperTrading)));
        assert!(!Live.can_transition_to(Retired(RetireReason::FailedPaperTrading)));
    }

    #[test]
    fn drawdown_retirement_only_when_live() {
        assert!(Live.can_transition_to(Retired(RetireReason::MaxDrawdownExceeded)));
        assert!(!Promotable.can_transition_to(Retired(RetireReason::MaxDrawdownExceeded)));
    }

    #[test]
    fn job_failure_retires_only_pipeline_states() {
        let reason = Retired(RetireReason::JobFailed);
        assert!(QueuedBacktest.can_transition_to(reason));
        assert!(PaperTrading.can_transition_to(reason));
        assert!(!Promotable.can_transition_to(reason));
        assert!(!Live.can_transition_to(reason));
        assert_eq!(reason.to_string(), "retired(job_failed)");
    }

    #[test]
    fn manual_retirement_from_any_active_state() {
        for state in LifecycleState::ACTIVE {
            assert!(state.can_transition_to(Retired(RetireReason::Manual)));
            assert!(state.can_transition_to(Retired(RetireReason::EmergencyStop)));
        }
    }

    #[test]
    fn retired_is_terminal() {
        let retired = Retired(RetireReason::Manual);
        for state in LifecycleState::ACTIVE {
            assert!(!retired.can_transition_to(state));
        }
        assert!(!retired.can_transition_to(Retired(RetireReason::EmergencyStop)));
    }

    #[test]
    fn display_includes_reason() {
        assert_eq!(QueuedPaper.to_string(), "queued_paper");
        assert_eq!(
            Retired(RetireReason::FailedBacktest).to_string(),
            "retired(failed_backtest)"
        );
    }

    #[test]
    fn serde_shape() {
        assert_eq!(serde_json::to_string(&PaperTrading).unwrap(), "\"paper_trading\"");
        assert_eq!(
            serde_json::to_string(&Retired(RetireReason::Manual)).unwrap(),
            "{\"retired\":\"manual\"}"
        );
    }
}
