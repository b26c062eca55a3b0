//! Paper trading: a bounded session replayed through periodic check-ins.
//!
//! The session covers `paper.duration_bars` bars starting where the
//! backtest window ends. Each check-in fetches warmup history plus the bars
//! revealed so far and replays them through a fresh simulator that trades
//! only inside the session. The last check-in applies Gate 2.

use std::sync::Arc;
use stratforge_core::domain::{LifecycleState, RetireReason, StrategyId};
use tracing::{debug, info, warn};

use super::jobs::Job;
use super::worker::data_failure;
use super::{live, span, Inner, SchedulerError};
use crate::events::LifecycleEvent;
use crate::gates::paper_gate;
use crate::record::StageMetrics;
use crate::runner::run_backtest_window;

pub(super) async fn start(inner: &Arc<Inner>, id: &StrategyId) -> Result<(), SchedulerError> {
    let paper = &inner.config.paper;
    if inner
        .transition(id, LifecycleState::QueuedPaper, LifecycleState::PaperTrading, None)
        .await?
        .is_none()
    {
        return Ok(());
    }
    inner.events.publish(LifecycleEvent::PaperStarted {
        id: id.clone(),
        duration_bars: paper.duration_bars,
    });
    let first = paper.bars_per_check_in.min(paper.duration_bars);
    inner.schedule(Job::check_in(id.clone(), first), paper.check_in_interval());
    Ok(())
}

pub(super) async fn check_in(
    inner: &Arc<Inner>,
    job: &Job,
    id: &StrategyId,
    elapsed: usize,
) -> Result<(), SchedulerError> {
    let record = inner.load(id).await?;
    if record.state != LifecycleState::PaperTrading {
        debug!(spec_id = %id, state = %record.state, "check-in skipped");
        return Ok(());
    }
    let spec = record.spec;
    let paper = &inner.config.paper;
    let session_start = inner.config.backtest.end;
    let history_start = session_start - span(spec.timeframe, paper.warmup_bars);
    let now = session_start + span(spec.timeframe, elapsed);

    let bars = match inner.fetch(&spec, history_start, now).await {
        Ok(bars) => bars,
        Err(e) => return data_failure(inner, job, LifecycleState::PaperTrading, e.to_string()).await,
    };
    let first_tradable = bars.partition_point(|b| b.timestamp < session_start);

    let sim_config = inner.config.simulator.clone();
    let weights = inner.config.fitness;
    let run_spec = spec.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        run_backtest_window(&run_spec, &bars, first_tradable, &sim_config, &weights)
    })
    .await
    .map_err(|e| SchedulerError::Worker(e.to_string()))?;

    let run = match outcome {
        Ok(run) => run,
        Err(e) if e.is_data_error() => {
            return data_failure(inner, job, LifecycleState::PaperTrading, e.to_string()).await
        }
        Err(e) => {
            warn!(spec_id = %id, error = %e, "paper replay rejected configuration");
            inner
                .retire_from(id, LifecycleState::PaperTrading, RetireReason::InvalidConfiguration)
                .await?;
            return Ok(());
        }
    };

    inner.events.publish(LifecycleEvent::PaperCheckIn {
        id: id.clone(),
        elapsed_bars: elapsed,
        duration_bars: paper.duration_bars,
        equity: run.metrics.final_equity,
    });
    debug!(spec_id = %id, elapsed, equity = run.metrics.final_equity, "paper check-in");

    if elapsed < paper.duration_bars {
        let next = (elapsed + paper.bars_per_check_in).min(paper.duration_bars);
        inner.schedule(Job::check_in(id.clone(), next), paper.check_in_interval());
        return Ok(());
    }

    let decision = paper_gate(&run.metrics, &inner.config.gates);
    let stage = StageMetrics::Paper {
        metrics: run.metrics.clone(),
    };
    let committed = inner
        .transition(id, LifecycleState::PaperTrading, decision.next, Some(stage))
        .await?
        .is_some();
    if !committed {
        return Ok(());
    }
    match decision.next {
        LifecycleState::Retired(reason) => {
            info!(spec_id = %id, reason = decision.reason.as_deref().unwrap_or(""), "gate 2 failed");
            inner.events.publish(LifecycleEvent::Retired {
                id: id.clone(),
                reason,
            });
        }
        next => {
            inner.events.publish(LifecycleEvent::Promoted {
                id: id.clone(),
                from: LifecycleState::PaperTrading,
                to: next,
            });
            // The worker already holds this strategy's claim.
            if inner.config.live.auto_promote {
                if let Err(e) = live::go_live(inner, id).await {
                    warn!(spec_id = %id, error = %e, "automatic promotion to live failed");
                }
            }
        }
    }
    Ok(())
}
