//! Lifecycle scheduler — the only place lifecycle states change.
//!
//! A bounded pool of tokio worker tasks drains one FIFO job queue. Each job
//! fetches its own bar window and runs a fresh simulator on the blocking
//! pool; nothing mutable is shared between jobs. Every state change is a
//! compare-and-set against the repository, so a result whose strategy was
//! retired mid-flight is discarded at commit time.
//!
//! Paper sessions advance through timer-driven check-ins; no worker sleeps
//! through a session.

mod jobs;
mod live;
mod paper;
mod retry;
mod worker;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stratforge_core::domain::{
    check_contiguous, Bar, ConfigurationError, LifecycleState, OrderId, RetireReason, StrategyId,
    StrategySpec, Timeframe,
};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{ConfigError, LifecycleConfig};
use crate::events::{EventBus, LifecycleEvent};
use crate::ports::{
    BarSupplier, ExecutionError, ExecutionSink, PersistenceError, StrategyRepository,
    SupplierError,
};
use crate::record::{StageMetrics, StrategyRecord};

use jobs::{Claims, Job, JobQueue};
use live::LivePosition;
use retry::with_backoff;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Supplier(#[from] SupplierError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("strategy {id} is {state}, cannot {action}")]
    InvalidState {
        id: StrategyId,
        state: LifecycleState,
        action: &'static str,
    },
    #[error("live equity must be finite and positive, got {0}")]
    InvalidEquity(f64),
    #[error("scheduler is shut down")]
    ShutDown,
    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub queue_depth: usize,
    pub active_workers: usize,
    /// Keyed by lifecycle state display form, e.g. "retired(failed_backtest)".
    pub counts_by_state: BTreeMap<String, usize>,
}

/// State shared by the handle, workers and check-in timers.
pub(crate) struct Inner {
    config: LifecycleConfig,
    supplier: Arc<dyn BarSupplier>,
    sink: Arc<dyn ExecutionSink>,
    repo: Arc<dyn StrategyRepository>,
    events: EventBus,
    queue: JobQueue,
    claims: Claims,
    released: Notify,
    active_workers: AtomicUsize,
    /// Queued jobs + running jobs + pending timers.
    outstanding: watch::Sender<usize>,
    shutdown: watch::Sender<bool>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    live: tokio::sync::Mutex<HashMap<StrategyId, LivePosition>>,
}

/// Entry point: validates the config and spawns the worker pool.
pub struct Scheduler;

impl Scheduler {
    /// Must be called from inside a tokio runtime.
    pub fn start(
        config: LifecycleConfig,
        supplier: Arc<dyn BarSupplier>,
        sink: Arc<dyn ExecutionSink>,
        repo: Arc<dyn StrategyRepository>,
    ) -> Result<SchedulerHandle, SchedulerError> {
        config.validate()?;
        let workers = config.scheduler.workers;
        let inner = Arc::new(Inner {
            events: EventBus::new(config.events.capacity),
            config,
            supplier,
            sink,
            repo,
            queue: JobQueue::default(),
            claims: Claims::default(),
            released: Notify::new(),
            active_workers: AtomicUsize::new(0),
            outstanding: watch::channel(0).0,
            shutdown: watch::channel(false).0,
            timers: Mutex::new(Vec::new()),
            live: tokio::sync::Mutex::new(HashMap::new()),
        });

        let handles = (0..workers)
            .map(|n| tokio::spawn(worker::run(Arc::clone(&inner), n)))
            .collect();
        info!(workers, "scheduler started");
        Ok(SchedulerHandle {
            inner,
            workers: Arc::new(tokio::sync::Mutex::new(handles)),
        })
    }
}

/// Cloneable handle to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<Inner>,
    workers: Arc<tokio::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl SchedulerHandle {
    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    /// Persist `spec` as generated, move it to queued_backtest and queue the job.
    ///
    /// Invalid specs are rejected here and never enqueued.
    pub async fn enqueue_for_backtest(&self, spec: StrategySpec) -> Result<(), SchedulerError> {
        let inner = &self.inner;
        if inner.is_shutting_down() {
            return Err(SchedulerError::ShutDown);
        }
        spec.validate()?;
        let id = spec.id.clone();
        let record = StrategyRecord::new(spec);
        let repo = inner.repo.as_ref();
        with_backoff(&inner.config.retry, "save", move || repo.save(record.clone())).await?;

        if inner
            .transition(&id, LifecycleState::Generated, LifecycleState::QueuedBacktest, None)
            .await?
            .is_none()
        {
            return Ok(());
        }
        inner.events.publish(LifecycleEvent::Enqueued { id: id.clone() });
        inner.enqueue(Job::backtest(id));
        Ok(())
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let inner = &self.inner;
        let repo = inner.repo.as_ref();
        let counts_by_state =
            with_backoff(&inner.config.retry, "counts_by_state", move || repo.counts_by_state())
                .await?;
        Ok(SchedulerStatus {
            queue_depth: inner.queue.len(),
            active_workers: inner.active_workers.load(Ordering::SeqCst),
            counts_by_state,
        })
    }

    pub async fn load(&self, id: &StrategyId) -> Result<StrategyRecord, SchedulerError> {
        self.inner.load(id).await
    }

    /// Hand a promotable strategy to the execution sink.
    ///
    /// Holds the strategy's claim throughout, so concurrent promotions and
    /// pipeline jobs for the same strategy run one at a time.
    pub async fn promote_to_live(&self, id: &StrategyId) -> Result<OrderId, SchedulerError> {
        let _claim = self.inner.claim(id).await;
        live::go_live(&self.inner, id).await
    }

    /// Report live equity; returns the strategy's state afterwards.
    pub async fn record_live_equity(
        &self,
        id: &StrategyId,
        equity: f64,
    ) -> Result<LifecycleState, SchedulerError> {
        live::record_equity(&self.inner, id, equity).await
    }

    /// Retire a strategy manually. Idempotent on retired strategies.
    pub async fn retire(&self, id: &StrategyId) -> Result<LifecycleState, SchedulerError> {
        live::retire(&self.inner, id, RetireReason::Manual).await
    }

    /// Close and retire every live strategy; returns the ids stopped.
    pub async fn emergency_stop(&self) -> Result<Vec<StrategyId>, SchedulerError> {
        live::emergency_stop(&self.inner).await
    }

    /// Resolve once no job is queued or running and no check-in is pending.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stop workers after their current job and cancel pending check-ins.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.shutdown.send_replace(true);
        let dropped = inner.queue.clear();
        if let Ok(mut timers) = inner.timers.lock() {
            for t in timers.drain(..) {
                t.abort();
            }
        }
        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for h in handles {
            let _ = h.await;
        }
        inner.outstanding.send_replace(0);
        info!(dropped_jobs = dropped, "scheduler shut down");
    }
}

impl Inner {
    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn track(&self) {
        self.outstanding.send_modify(|n| *n += 1);
    }

    fn untrack(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    fn enqueue(&self, job: Job) {
        if self.is_shutting_down() {
            return;
        }
        self.track();
        debug!(spec_id = %job.id(), job = job.kind(), "job queued");
        self.queue.push(job);
    }

    /// `None` means the strategy is busy and the job was parked.
    fn claim_job(&self, job: Job) -> Option<Job> {
        let (id, kind) = (job.id().clone(), job.kind());
        let claimed = self.claims.claim_job(job);
        if claimed.is_none() {
            debug!(spec_id = %id, job = kind, "strategy busy, job parked");
        }
        claimed
    }

    /// Wait until `id` is unclaimed, then claim it until the guard drops.
    async fn claim(&self, id: &StrategyId) -> ClaimGuard<'_> {
        loop {
            let released = self.released.notified();
            if self.claims.try_claim(id) {
                return ClaimGuard {
                    inner: self,
                    id: id.clone(),
                };
            }
            released.await;
        }
    }

    /// Drop the claim on `id`; its parked jobs go back to the head of the queue.
    fn release(&self, id: &StrategyId) {
        let parked = self.claims.release(id);
        if !self.is_shutting_down() {
            self.queue.push_front(parked);
        }
        self.released.notify_waiters();
    }

    /// Queue `job` after `delay` from a timer task.
    fn schedule(self: &Arc<Self>, job: Job, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        self.track();
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.enqueue(job);
            inner.untrack();
        });
        if let Ok(mut timers) = self.timers.lock() {
            timers.retain(|t| !t.is_finished());
            timers.push(handle);
        }
    }

    async fn load(&self, id: &StrategyId) -> Result<StrategyRecord, SchedulerError> {
        let repo = self.repo.as_ref();
        Ok(with_backoff(&self.config.retry, "load", move || repo.load(id)).await?)
    }

    /// Commit `expected → next`. `Ok(None)` means the stored state moved on
    /// and the caller's result must be discarded.
    async fn transition(
        &self,
        id: &StrategyId,
        expected: LifecycleState,
        next: LifecycleState,
        metrics: Option<StageMetrics>,
    ) -> Result<Option<StrategyRecord>, SchedulerError> {
        let repo = self.repo.as_ref();
        let result = with_backoff(&self.config.retry, "update_state", move || {
            repo.update_state(id, expected, next, metrics.clone())
        })
        .await;
        match result {
            Ok(record) => {
                info!(spec_id = %id, from = %expected, to = %next, "state transition");
                Ok(Some(record))
            }
            Err(PersistenceError::Conflict { actual, .. }) => {
                debug!(spec_id = %id, expected = %expected, actual = %actual, "stale result discarded");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Retire from `expected` and publish the event.
    async fn retire_from(
        &self,
        id: &StrategyId,
        expected: LifecycleState,
        reason: RetireReason,
    ) -> Result<bool, SchedulerError> {
        let committed = self
            .transition(id, expected, LifecycleState::Retired(reason), None)
            .await?
            .is_some();
        if committed {
            self.events.publish(LifecycleEvent::Retired {
                id: id.clone(),
                reason,
            });
        }
        Ok(committed)
    }

    /// Fetch `[start, end)` with the configured timeout; gaps are data errors.
    async fn fetch(
        &self,
        spec: &StrategySpec,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, SupplierError> {
        let timeout = self.config.scheduler.supplier_timeout();
        let bars = tokio::time::timeout(
            timeout,
            self.supplier
                .get_bars(&spec.symbol, spec.timeframe, start, end),
        )
        .await
        .map_err(|_| SupplierError::Timeout {
            ms: self.config.scheduler.supplier_timeout_ms,
        })??;
        check_contiguous(&bars, spec.timeframe)?;
        Ok(bars)
    }

    fn backtest_window(&self, timeframe: Timeframe) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.config.backtest.end;
        (end - span(timeframe, self.config.backtest.bars), end)
    }
}

/// Held claim on one strategy; dropping it releases the claim, so a
/// cancelled promotion cannot leave the strategy blocked.
struct ClaimGuard<'a> {
    inner: &'a Inner,
    id: StrategyId,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.inner.release(&self.id);
    }
}

/// Duration of `bars` bars of `timeframe`.
pub(crate) fn span(timeframe: Timeframe, bars: usize) -> ChronoDuration {
    let n = i32::try_from(bars).unwrap_or(i32::MAX);
    timeframe.duration() * n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_send_sync() {
        fn require<T: Send + Sync>() {}
        require::<SchedulerHandle>();
        require::<SchedulerStatus>();
    }

    #[test]
    fn span_counts_bars() {
        assert_eq!(span(Timeframe::H4, 6), ChronoDuration::hours(24));
    }
}
