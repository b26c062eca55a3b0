//! Job queue: one FIFO shared by every worker, plus per-strategy claims.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use stratforge_core::domain::StrategyId;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Task {
    /// Fetch the backtest window, simulate, apply Gate 1.
    Backtest { id: StrategyId },
    /// Move queued_paper → paper_trading and schedule the first check-in.
    PaperStart { id: StrategyId },
    /// Replay the first `elapsed` bars of the paper session.
    PaperCheckIn { id: StrategyId, elapsed: usize },
}

/// A task plus its two retry counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Job {
    pub(crate) task: Task,
    /// Data-error retries used so far.
    pub(crate) attempt: u32,
    /// Whole-job failures (persistence, worker panics) so far.
    pub(crate) failures: u32,
}

impl Job {
    fn new(task: Task) -> Self {
        Self {
            task,
            attempt: 0,
            failures: 0,
        }
    }

    pub(crate) fn backtest(id: StrategyId) -> Self {
        Self::new(Task::Backtest { id })
    }

    pub(crate) fn paper_start(id: StrategyId) -> Self {
        Self::new(Task::PaperStart { id })
    }

    pub(crate) fn check_in(id: StrategyId, elapsed: usize) -> Self {
        Self::new(Task::PaperCheckIn { id, elapsed })
    }

    pub(crate) fn id(&self) -> &StrategyId {
        match &self.task {
            Task::Backtest { id } | Task::PaperStart { id } | Task::PaperCheckIn { id, .. } => id,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self.task {
            Task::Backtest { .. } => "backtest",
            Task::PaperStart { .. } => "paper_start",
            Task::PaperCheckIn { .. } => "paper_check_in",
        }
    }

    /// The same job with its data-error counter bumped.
    pub(crate) fn retried(&self) -> Job {
        Job {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// The same job with its failure counter bumped.
    pub(crate) fn failed(&self) -> Job {
        Job {
            failures: self.failures + 1,
            ..self.clone()
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    notify: Notify,
}

impl JobQueue {
    pub(crate) fn push(&self, job: Job) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push_back(job);
        }
        self.notify.notify_one();
    }

    /// Put jobs back at the head, keeping their relative order.
    pub(crate) fn push_front(&self, returned: Vec<Job>) {
        if returned.is_empty() {
            return;
        }
        let n = returned.len();
        if let Ok(mut jobs) = self.jobs.lock() {
            for job in returned.into_iter().rev() {
                jobs.push_front(job);
            }
        }
        for _ in 0..n {
            self.notify.notify_one();
        }
    }

    pub(crate) fn pop(&self) -> Option<Job> {
        self.jobs.lock().ok().and_then(|mut jobs| jobs.pop_front())
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    /// Drop every queued job, returning how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        self.jobs
            .lock()
            .map(|mut jobs| {
                let n = jobs.len();
                jobs.clear();
                n
            })
            .unwrap_or(0)
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Strategies currently held by a worker or a promotion, each with the jobs
/// that arrived while it was held.
#[derive(Debug, Default)]
pub(crate) struct Claims {
    held: Mutex<HashMap<StrategyId, Vec<Job>>>,
}

impl Claims {
    /// Claim `id`; false if someone else holds it.
    pub(crate) fn try_claim(&self, id: &StrategyId) -> bool {
        let Ok(mut held) = self.held.lock() else {
            return true;
        };
        if held.contains_key(id) {
            return false;
        }
        held.insert(id.clone(), Vec::new());
        true
    }

    /// Claim `job`'s strategy, or park the job behind the current holder.
    /// `None` means parked.
    pub(crate) fn claim_job(&self, job: Job) -> Option<Job> {
        let Ok(mut held) = self.held.lock() else {
            return Some(job);
        };
        match held.get_mut(job.id()) {
            Some(parked) => {
                parked.push(job);
                None
            }
            None => {
                held.insert(job.id().clone(), Vec::new());
                Some(job)
            }
        }
    }

    /// Drop the claim on `id`, handing back its parked jobs in arrival order.
    pub(crate) fn release(&self, id: &StrategyId) -> Vec<Job> {
        self.held
            .lock()
            .ok()
            .and_then(|mut held| held.remove(id))
            .unwrap_or_default()
    }
}
