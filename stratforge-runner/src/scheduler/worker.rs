//! Worker loop and the backtest job.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use stratforge_core::domain::{LifecycleState, RetireReason, StrategyId};
use tracing::{debug, error, info, warn};

use super::jobs::{Job, Task};
use super::{paper, Inner, SchedulerError};
use crate::events::LifecycleEvent;
use crate::gates::backtest_gate;
use crate::metrics::PerformanceMetrics;
use crate::record::StageMetrics;
use crate::runner::run_backtest;

pub(crate) async fn run(inner: Arc<Inner>, worker: usize) {
    let mut shutdown = inner.shutdown.subscribe();
    debug!(worker, "worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let Some(job) = inner.queue.pop() else {
            tokio::select! {
                _ = inner.queue.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        };
        // Parked jobs come back when the current holder releases the claim.
        let Some(job) = inner.claim_job(job) else {
            continue;
        };

        inner.active_workers.fetch_add(1, Ordering::SeqCst);
        let id = job.id().clone();
        if let Err(e) = execute(&inner, &job).await {
            recover(&inner, worker, &job, e).await;
        }
        inner.release(&id);
        inner.active_workers.fetch_sub(1, Ordering::SeqCst);
        inner.untrack();
    }
    debug!(worker, "worker stopped");
}

async fn execute(inner: &Arc<Inner>, job: &Job) -> Result<(), SchedulerError> {
    match &job.task {
        Task::Backtest { id } => backtest(inner, job, id).await,
        Task::PaperStart { id } => paper::start(inner, id).await,
        Task::PaperCheckIn { id, elapsed } => paper::check_in(inner, job, id, *elapsed).await,
    }
}

/// A job that failed outright runs again after a backoff delay, up to
/// `scheduler.job_retries` times. Then the strategy is retired `job_failed`
/// if it still sits in a pipeline state.
async fn recover(inner: &Arc<Inner>, worker: usize, job: &Job, e: SchedulerError) {
    let id = job.id();
    if inner.is_shutting_down() {
        return;
    }
    if job.failures < inner.config.scheduler.job_retries {
        let failures = job.failures + 1;
        let delay = inner.config.retry.backoff(failures);
        warn!(worker, spec_id = %id, job = job.kind(), failures, ?delay, error = %e, "job failed, rescheduling");
        inner.schedule(job.failed(), delay);
        return;
    }

    error!(worker, spec_id = %id, job = job.kind(), error = %e, "job failed, retries exhausted");
    let state = match inner.load(id).await {
        Ok(record) => record.state,
        Err(load_error) => {
            error!(spec_id = %id, error = %load_error, "cannot load strategy to retire it");
            return;
        }
    };
    let reason = RetireReason::JobFailed;
    if !state.can_transition_to(LifecycleState::Retired(reason)) {
        debug!(spec_id = %id, %state, "nothing to retire after job failure");
        return;
    }
    if let Err(retire_error) = inner.retire_from(id, state, reason).await {
        error!(spec_id = %id, error = %retire_error, "retirement after job failure failed");
    }
}

/// A data error gets `scheduler.data_retries` more attempts, then retires
/// the strategy with `simulation_error`.
pub(super) async fn data_failure(
    inner: &Arc<Inner>,
    job: &Job,
    state: LifecycleState,
    error: String,
) -> Result<(), SchedulerError> {
    let id = job.id();
    if job.attempt < inner.config.scheduler.data_retries {
        warn!(spec_id = %id, job = job.kind(), attempt = job.attempt + 1, %error, "data error, requeueing");
        inner.enqueue(job.retried());
        return Ok(());
    }
    warn!(spec_id = %id, job = job.kind(), %error, "data error persisted, retiring");
    inner
        .retire_from(id, state, RetireReason::SimulationError)
        .await?;
    Ok(())
}

async fn backtest(inner: &Arc<Inner>, job: &Job, id: &StrategyId) -> Result<(), SchedulerError> {
    let record = inner.load(id).await?;
    match (record.state, record.backtest_metrics) {
        (LifecycleState::QueuedBacktest, _) => {}
        // A rerun after the result committed but the gate did not.
        (LifecycleState::Backtested, Some(metrics)) => {
            debug!(spec_id = %id, "resuming at gate 1");
            return apply_gate(inner, id, &metrics).await;
        }
        (state, _) => {
            debug!(spec_id = %id, %state, "backtest skipped");
            return Ok(());
        }
    }
    let spec = record.spec;
    let (start, end) = inner.backtest_window(spec.timeframe);
    let bars = match inner.fetch(&spec, start, end).await {
        Ok(bars) => bars,
        Err(e) => {
            return data_failure(inner, job, LifecycleState::QueuedBacktest, e.to_string()).await
        }
    };

    let sim_config = inner.config.simulator.clone();
    let weights = inner.config.fitness;
    let run_spec = spec.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        run_backtest(&run_spec, &bars, &sim_config, &weights)
    })
    .await
    .map_err(|e| SchedulerError::Worker(e.to_string()))?;

    let run = match outcome {
        Ok(run) => run,
        Err(e) if e.is_data_error() => {
            return data_failure(inner, job, LifecycleState::QueuedBacktest, e.to_string()).await
        }
        Err(e) => {
            warn!(spec_id = %id, error = %e, "backtest rejected configuration");
            inner
                .retire_from(id, LifecycleState::QueuedBacktest, RetireReason::InvalidConfiguration)
                .await?;
            return Ok(());
        }
    };

    let stage = StageMetrics::Backtest {
        metrics: run.metrics.clone(),
        fitness: run.fitness,
    };
    if inner
        .transition(id, LifecycleState::QueuedBacktest, LifecycleState::Backtested, Some(stage))
        .await?
        .is_none()
    {
        return Ok(());
    }
    info!(
        spec_id = %id,
        trades = run.metrics.total_trades,
        win_rate = run.metrics.win_rate,
        profit_factor = run.metrics.profit_factor,
        fitness = run.fitness,
        "backtest complete"
    );
    inner.events.publish(LifecycleEvent::Backtested {
        id: id.clone(),
        metrics: run.metrics.clone(),
        fitness: run.fitness,
    });
    apply_gate(inner, id, &run.metrics).await
}

/// Gate 1: backtested → queued_paper, or retired `failed_backtest`.
async fn apply_gate(
    inner: &Arc<Inner>,
    id: &StrategyId,
    metrics: &PerformanceMetrics,
) -> Result<(), SchedulerError> {
    let decision = backtest_gate(metrics, &inner.config.gates);
    match decision.next {
        LifecycleState::Retired(reason) => {
            info!(spec_id = %id, reason = decision.reason.as_deref().unwrap_or(""), "gate 1 failed");
            inner
                .retire_from(id, LifecycleState::Backtested, reason)
                .await?;
        }
        next => {
            if inner
                .transition(id, LifecycleState::Backtested, next, None)
                .await?
                .is_some()
            {
                inner.events.publish(LifecycleEvent::Promoted {
                    id: id.clone(),
                    from: LifecycleState::Backtested,
                    to: next,
                });
                inner.enqueue(Job::paper_start(id.clone()));
            }
        }
    }
    Ok(())
}
