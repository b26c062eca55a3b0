//! Portfolio simulator — deterministic bar-by-bar replay of one strategy.
//!
//! Per bar:
//! 1. Position open: stop-loss (gap fills at the open) > take-profit (limit,
//!    no slippage) > trailing-stop ratchet (effective from the next bar) >
//!    strategy exit signal (fills at the close).
//! 2. Flat, and no position closed this bar: evaluate the entry signal at the
//!    close; size, slip and pay the fee, then open.
//! 3. Append the mark-to-market equity point.
//!
//! Identical spec, bars and config always give identical output.

use super::config::SimulatorConfig;
use super::context::{Entry, SimulationContext};
use super::cost_model::{CostModel, FillSide};
use super::sizing::{margin_required, position_size};
use crate::domain::{
    validate_bars, Bar, ConfigurationError, DataQualityError, EquityPoint, ExitReason, Position,
    Side, StrategySpec, Trade,
};
use crate::fingerprint::RunFingerprint;
use crate::indicators::{Indicator, IndicatorValues};
use crate::signals::{Signal, StrategyRules};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    #[error(transparent)]
    DataQuality(#[from] DataQualityError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("invalid simulator config: {0}")]
    InvalidConfig(String),
    #[error("equity became non-finite at bar {index}")]
    NonFiniteEquity { index: usize },
}

/// Output of one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Still open after the last bar; its PnL is in `unrealized_pnl`.
    pub open_position: Option<Position>,
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Gross unrealized PnL of `open_position` minus its entry fee.
    pub unrealized_pnl: f64,
    /// Index of the first bar on which signals were evaluated.
    pub first_tradable_index: usize,
    /// Indicator warmup of the compiled rules, in bars.
    pub warmup: usize,
}

impl SimulationResult {
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn fingerprint(&self) -> RunFingerprint {
        RunFingerprint::of(&self.trades, &self.equity_curve)
    }
}

#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
    cost: CostModel,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate().map_err(SimulatorError::InvalidConfig)?;
        let cost = CostModel::from_config(&config);
        Ok(Self { config, cost })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Replay every bar.
    pub fn run(&self, spec: &StrategySpec, bars: &[Bar]) -> Result<SimulationResult, SimulatorError> {
        self.run_window(spec, bars, 0)
    }

    /// Replay `bars`, trading only from `first_tradable` onward.
    ///
    /// Earlier bars still feed the indicators. Equity points start at
    /// `first_tradable`.
    pub fn run_window(
        &self,
        spec: &StrategySpec,
        bars: &[Bar],
        first_tradable: usize,
    ) -> Result<SimulationResult, SimulatorError> {
        validate_bars(bars)?;
        let rules = StrategyRules::from_spec(spec)?;

        let mut values = rules.prepare(bars);
        let vol_key = self.cost.volatility_indicator().map(|vol| {
            values.ensure(&vol, &crate::indicators::closes(bars));
            vol.name().to_string()
        });

        let first_tradable = first_tradable.min(bars.len());
        let mut ctx = SimulationContext::new(self.config.initial_capital);

        for (t, bar) in bars.iter().enumerate().skip(first_tradable) {
            let volatility = vol_key.as_deref().and_then(|k| values.get(k, t));
            let slip_bps = self.cost.slippage_bps(volatility);

            let mut closed_this_bar = false;
            if ctx.position().is_some() {
                closed_this_bar = self.manage_position(&mut ctx, &rules, &values, bar, t, slip_bps);
            }

            if ctx.position().is_none() && !closed_this_bar {
                match rules.evaluate(t, None, &values) {
                    Signal::Long => self.open(&mut ctx, spec, Side::Long, bar, slip_bps),
                    Signal::Short => self.open(&mut ctx, spec, Side::Short, bar, slip_bps),
                    Signal::Exit | Signal::Hold => {}
                }
            }

            let equity = ctx.mark(bar.timestamp, bar.close);
            if !equity.is_finite() {
                return Err(SimulatorError::NonFiniteEquity { index: t });
            }
            trace!(index = t, equity, "marked");
        }

        let last_close = bars.last().map_or(0.0, |b| b.close);
        let final_equity = ctx.equity(last_close);
        let unrealized_pnl = ctx.unrealized_net(last_close);
        let initial_capital = ctx.initial_capital();
        let (trades, equity_curve, open_position) = ctx.into_parts();

        debug!(
            spec = spec.id.short(),
            trades = trades.len(),
            final_equity,
            "simulation finished"
        );

        Ok(SimulationResult {
            trades,
            equity_curve,
            open_position,
            initial_capital,
            final_equity,
            unrealized_pnl,
            first_tradable_index: first_tradable,
            warmup: rules.warmup(),
        })
    }

    /// Apply exit checks in priority order. Returns true if the position closed.
    fn manage_position(
        &self,
        ctx: &mut SimulationContext,
        rules: &StrategyRules,
        values: &IndicatorValues,
        bar: &Bar,
        t: usize,
        slip_bps: f64,
    ) -> bool {
        let Some(position) = ctx.position().cloned() else {
            return false;
        };
        let exit_side = match position.side {
            Side::Long => FillSide::Sell,
            Side::Short => FillSide::Buy,
        };

        if let Some(raw) = stop_fill(&position, bar) {
            let price = self.cost.apply_slippage(raw, exit_side, slip_bps);
            let reason = if position.trailing_active {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            };
            self.close(ctx, price, bar, reason);
            return true;
        }

        if let Some(price) = take_profit_fill(&position, bar) {
            self.close(ctx, price, bar, ExitReason::TakeProfit);
            return true;
        }

        if let (Some(trail), Some(pos)) = (self.config.trailing_stop, ctx.position_mut()) {
            let best = match pos.side {
                Side::Long => pos.watermark.max(bar.high),
                Side::Short => pos.watermark.min(bar.low),
            };
            pos.watermark = best;
            if pos.gain_fraction(best) >= trail.trigger_percent {
                let candidate = best * (1.0 - pos.side.direction() * trail.trail_percent);
                let tighter = match pos.side {
                    Side::Long => candidate > pos.stop_loss,
                    Side::Short => candidate < pos.stop_loss,
                };
                if tighter {
                    pos.stop_loss = candidate;
                    pos.trailing_active = true;
                }
            }
        }

        if rules.evaluate(t, Some(position.side), values) == Signal::Exit {
            let price = self.cost.apply_slippage(bar.close, exit_side, slip_bps);
            self.close(ctx, price, bar, ExitReason::Signal);
            return true;
        }
        false
    }

    fn open(
        &self,
        ctx: &mut SimulationContext,
        spec: &StrategySpec,
        side: Side,
        bar: &Bar,
        slip_bps: f64,
    ) {
        let fill_side = match side {
            Side::Long => FillSide::Buy,
            Side::Short => FillSide::Sell,
        };
        let price = self.cost.apply_slippage(bar.close, fill_side, slip_bps);
        let equity = ctx.equity(bar.close);
        let mut size = position_size(equity, price, &spec.risk);

        // Shrink to fit available margin.
        let available = ctx.cash();
        if margin_required(size * price, self.config.leverage) > available {
            size = (available * self.config.leverage / price).max(0.0);
        }
        if !(size.is_finite() && size > 0.0) {
            return;
        }

        let dir = side.direction();
        let entry = Entry {
            side,
            price,
            size,
            fee: self.cost.fee(price, size),
            stop_loss: price * (1.0 - dir * spec.risk.stop_loss_percent),
            take_profit: price * (1.0 + dir * spec.risk.take_profit_percent),
            at: bar.timestamp,
        };
        if ctx.open(entry) {
            debug!(?side, price, size, at = %bar.timestamp, "opened position");
        }
    }

    fn close(&self, ctx: &mut SimulationContext, price: f64, bar: &Bar, reason: ExitReason) {
        let size = ctx.position().map_or(0.0, |p| p.size);
        let fee = self.cost.fee(price, size);
        if let Some(trade) = ctx.close(price, fee, bar.timestamp, reason) {
            debug!(%reason, price, pnl = trade.pnl, at = %bar.timestamp, "closed position");
        }
    }
}

/// Stop fill price if the bar touches the stop; a gap through it fills at the open.
fn stop_fill(position: &Position, bar: &Bar) -> Option<f64> {
    let stop = position.stop_loss;
    match position.side {
        Side::Long if bar.open <= stop => Some(bar.open),
        Side::Long if bar.low <= stop => Some(stop),
        Side::Short if bar.open >= stop => Some(bar.open),
        Side::Short if bar.high >= stop => Some(stop),
        _ => None,
    }
}

/// Take-profit fill price; a gap beyond the target fills at the better open.
fn take_profit_fill(position: &Position, bar: &Bar) -> Option<f64> {
    let target = position.take_profit;
    match position.side {
        Side::Long if bar.open >= target => Some(bar.open),
        Side::Long if bar.high >= target => Some(target),
        Side::Short if bar.open <= target => Some(bar.open),
        Side::Short if bar.low <= target => Some(target),
        _ => None,
    }
}
