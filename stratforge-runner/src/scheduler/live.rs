//! Going live, live drawdown monitoring, and retirement.

use std::sync::Arc;
use stratforge_core::domain::{
    Bar, ConfigurationError, LifecycleState, OrderId, RetireReason, Side, StrategyId, StrategySpec,
};
use stratforge_core::engine::position_size;
use stratforge_core::signals::{Signal, StrategyRules};
use tracing::{info, warn};

use super::retry::with_backoff;
use super::{span, Inner, SchedulerError};
use crate::events::LifecycleEvent;
use crate::ports::SupplierError;

/// Book entry for a strategy holding a live position.
#[derive(Debug, Clone)]
pub(crate) struct LivePosition {
    pub(crate) symbol: String,
    pub(crate) order_id: OrderId,
    pub(crate) peak_equity: f64,
}

/// Submit the entry order and move promotable → live.
///
/// The caller holds the strategy's claim, so no second promotion can pass
/// the state check before this one commits.
pub(super) async fn go_live(inner: &Arc<Inner>, id: &StrategyId) -> Result<OrderId, SchedulerError> {
    let record = inner.load(id).await?;
    if record.state != LifecycleState::Promotable {
        return Err(SchedulerError::InvalidState {
            id: id.clone(),
            state: record.state,
            action: "go live",
        });
    }
    let spec = record.spec;
    let live = &inner.config.live;
    let paper = &inner.config.paper;

    let session_start = inner.config.backtest.end;
    let start = session_start - span(spec.timeframe, paper.warmup_bars);
    let end = session_start + span(spec.timeframe, paper.duration_bars);
    let bars = inner.fetch(&spec, start, end).await?;
    let price = bars
        .last()
        .map(|b| b.close)
        .ok_or_else(|| SupplierError::Unavailable("no bars to price the live entry".into()))?;

    let side = entry_side(&spec, &bars)?;
    let cap = live.allocated_capital * live.max_position_fraction / price;
    let size = position_size(live.allocated_capital, price, &spec.risk).min(cap);
    let dir = side.direction();
    let stop_loss = price * (1.0 - dir * spec.risk.stop_loss_percent);
    let take_profit = price * (1.0 + dir * spec.risk.take_profit_percent);

    let order_id = match inner
        .sink
        .submit_order(&spec.symbol, side, size, stop_loss, take_profit)
        .await
    {
        Ok(order_id) => order_id,
        Err(e) => {
            alert(inner, id, format!("order submission failed: {e}"));
            return Err(e.into());
        }
    };

    if inner
        .transition(id, LifecycleState::Promotable, LifecycleState::Live, None)
        .await?
        .is_none()
    {
        flatten(inner, id, &spec.symbol).await;
        let state = inner.load(id).await?.state;
        return Err(SchedulerError::InvalidState {
            id: id.clone(),
            state,
            action: "go live",
        });
    }

    inner.live.lock().await.insert(
        id.clone(),
        LivePosition {
            symbol: spec.symbol.clone(),
            order_id: order_id.clone(),
            peak_equity: live.allocated_capital,
        },
    );
    info!(spec_id = %id, order_id = %order_id, ?side, size, price, "strategy live");
    inner.events.publish(LifecycleEvent::Promoted {
        id: id.clone(),
        from: LifecycleState::Promotable,
        to: LifecycleState::Live,
    });
    inner.events.publish(LifecycleEvent::WentLive {
        id: id.clone(),
        order_id: order_id.clone(),
        size,
    });
    Ok(order_id)
}

/// Short only when the rules signal a short entry on the last bar.
fn entry_side(spec: &StrategySpec, bars: &[Bar]) -> Result<Side, ConfigurationError> {
    let rules = StrategyRules::from_spec(spec)?;
    let values = rules.prepare(bars);
    let last = bars.len().saturating_sub(1);
    Ok(match rules.evaluate(last, None, &values) {
        Signal::Short => Side::Short,
        _ => Side::Long,
    })
}

pub(super) async fn record_equity(
    inner: &Arc<Inner>,
    id: &StrategyId,
    equity: f64,
) -> Result<LifecycleState, SchedulerError> {
    if !(equity.is_finite() && equity >= 0.0) {
        return Err(SchedulerError::InvalidEquity(equity));
    }
    let max_dd = inner.config.live.max_drawdown_percent;
    let breach = {
        let mut book = inner.live.lock().await;
        let Some(pos) = book.get_mut(id) else {
            drop(book);
            let state = inner.load(id).await?.state;
            return Err(SchedulerError::InvalidState {
                id: id.clone(),
                state,
                action: "record live equity",
            });
        };
        pos.peak_equity = pos.peak_equity.max(equity);
        let drawdown = if pos.peak_equity > 0.0 {
            (pos.peak_equity - equity) / pos.peak_equity * 100.0
        } else {
            0.0
        };
        if drawdown > max_dd {
            book.remove(id).map(|p| (p, drawdown))
        } else {
            None
        }
    };

    let Some((pos, drawdown)) = breach else {
        return Ok(LifecycleState::Live);
    };
    warn!(spec_id = %id, drawdown, limit = max_dd, order_id = %pos.order_id, "live drawdown limit breached");
    flatten(inner, id, &pos.symbol).await;
    let reason = RetireReason::MaxDrawdownExceeded;
    inner
        .retire_from(id, LifecycleState::Live, reason)
        .await?;
    Ok(LifecycleState::Retired(reason))
}

/// Retire from whatever state the strategy is in, closing a live position first.
pub(super) async fn retire(
    inner: &Arc<Inner>,
    id: &StrategyId,
    reason: RetireReason,
) -> Result<LifecycleState, SchedulerError> {
    for _ in 0..inner.config.retry.max_attempts.max(1) {
        let record = inner.load(id).await?;
        if record.state.is_retired() {
            return Ok(record.state);
        }
        if record.state == LifecycleState::Live {
            let pos = inner.live.lock().await.remove(id);
            let symbol = pos.map_or_else(|| record.spec.symbol.clone(), |p| p.symbol);
            flatten(inner, id, &symbol).await;
        }
        if inner.retire_from(id, record.state, reason).await? {
            info!(spec_id = %id, from = %record.state, %reason, "strategy retired");
            return Ok(LifecycleState::Retired(reason));
        }
    }
    let state = inner.load(id).await?.state;
    Err(SchedulerError::InvalidState {
        id: id.clone(),
        state,
        action: "retire",
    })
}

pub(super) async fn emergency_stop(inner: &Arc<Inner>) -> Result<Vec<StrategyId>, SchedulerError> {
    let repo = inner.repo.as_ref();
    let live = with_backoff(&inner.config.retry, "list_by_state", move || {
        repo.list_by_state(LifecycleState::Live)
    })
    .await?;

    let mut stopped = Vec::with_capacity(live.len());
    for record in live {
        let id = record.id().clone();
        let pos = inner.live.lock().await.remove(&id);
        let symbol = pos.map_or_else(|| record.spec.symbol.clone(), |p| p.symbol);
        flatten(inner, &id, &symbol).await;
        if inner
            .retire_from(&id, LifecycleState::Live, RetireReason::EmergencyStop)
            .await?
        {
            stopped.push(id);
        }
    }
    warn!(count = stopped.len(), "emergency stop");
    Ok(stopped)
}

/// Close the position; a failure raises an execution alert but never blocks
/// the retirement.
async fn flatten(inner: &Inner, id: &StrategyId, symbol: &str) {
    if let Err(e) = inner.sink.close_position(symbol).await {
        alert(inner, id, format!("close_position({symbol}) failed: {e}"));
    }
}

fn alert(inner: &Inner, id: &StrategyId, message: String) {
    warn!(spec_id = %id, %message, "execution alert");
    inner.events.publish(LifecycleEvent::ExecutionAlert {
        id: id.clone(),
        message,
    });
}
