//! Per-run account state.
//!
//! One `SimulationContext` per simulation; nothing is shared between runs.
//!
//! Accounting: the entry fee leaves cash when a position opens; on close,
//! cash receives the gross PnL minus the exit fee. Equity is cash plus gross
//! unrealized PnL, so `initial + Σ trade.pnl + unrealized_net == equity`.

use crate::domain::{EquityPoint, ExitReason, Position, Side, Trade};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct SimulationContext {
    initial_capital: f64,
    cash: f64,
    position: Option<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

/// Parameters of a new position.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub fee: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub at: DateTime<Utc>,
}

impl SimulationContext {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn position_mut(&mut self) -> Option<&mut Position> {
        self.position.as_mut()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Mark-to-market equity at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.unrealized_pnl(price))
    }

    /// Unrealized PnL net of the open position's entry fee.
    pub fn unrealized_net(&self, price: f64) -> f64 {
        self.position
            .as_ref()
            .map_or(0.0, |p| p.unrealized_pnl(price) - p.entry_fee)
    }

    /// Open a position. Returns false (and does nothing) if one is already open.
    pub fn open(&mut self, entry: Entry) -> bool {
        if self.position.is_some() {
            return false;
        }
        self.cash -= entry.fee;
        self.position = Some(Position {
            side: entry.side,
            entry_price: entry.price,
            size: entry.size,
            opened_at: entry.at,
            entry_fee: entry.fee,
            stop_loss: entry.stop_loss,
            take_profit: entry.take_profit,
            trailing_active: false,
            watermark: entry.price,
        });
        true
    }

    /// Close the open position and append the trade to the log.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_fee: f64,
        at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<&Trade> {
        let position = self.position.take()?;
        let gross = position.unrealized_pnl(exit_price);
        self.cash += gross - exit_fee;

        let pnl = gross - position.entry_fee - exit_fee;
        let entry_notional = position.entry_price * position.size;
        let pnl_percent = if entry_notional > 0.0 {
            pnl / entry_notional * 100.0
        } else {
            0.0
        };
        self.trades.push(Trade {
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            fee: position.entry_fee + exit_fee,
            pnl,
            pnl_percent,
            opened_at: position.opened_at,
            closed_at: at,
            exit_reason: reason,
        });
        self.trades.last()
    }

    /// Append the equity point for a bar; returns the recorded value.
    pub fn mark(&mut self, at: DateTime<Utc>, price: f64) -> f64 {
        let value = self.equity(price);
        self.equity_curve.push(EquityPoint::new(at, value));
        value
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<EquityPoint>, Option<Position>) {
        (self.trades, self.equity_curve, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(side: Side) -> Entry {
        Entry {
            side,
            price: 100.0,
            size: 10.0,
            fee: 1.0,
            stop_loss: 98.0,
            take_profit: 104.0,
            at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn round_trip_accounting() {
        let mut ctx = SimulationContext::new(10_000.0);
        assert!(ctx.open(entry(Side::Long)));
        assert_eq!(ctx.cash(), 9_999.0);
        assert_eq!(ctx.equity(101.0), 10_009.0);

        let trade = ctx
            .close(104.0, 1.04, DateTime::<Utc>::UNIX_EPOCH, ExitReason::TakeProfit)
            .cloned()
            .unwrap();
        // gross 40, fees 2.04
        assert!((trade.pnl - 37.96).abs() < 1e-9);
        assert!((trade.fee - 2.04).abs() < 1e-9);
        assert!((ctx.cash() - 10_037.96).abs() < 1e-9);
        assert!(ctx.position().is_none());
    }

    #[test]
    fn second_open_is_refused() {
        let mut ctx = SimulationContext::new(10_000.0);
        assert!(ctx.open(entry(Side::Long)));
        assert!(!ctx.open(entry(Side::Short)));
    }

    #[test]
    fn conservation_with_open_position() {
        let mut ctx = SimulationContext::new(10_000.0);
        ctx.open(entry(Side::Short));
        ctx.close(97.0, 0.97, DateTime::<Utc>::UNIX_EPOCH, ExitReason::Signal);
        ctx.open(entry(Side::Long));
        let mark = 99.5;
        let realized: f64 = ctx.trades().iter().map(|t| t.pnl).sum();
        let lhs = ctx.initial_capital() + realized + ctx.unrealized_net(mark);
        assert!((lhs - ctx.equity(mark)).abs() < 1e-9);
    }

    #[test]
    fn close_without_position_is_none() {
        let mut ctx = SimulationContext::new(1.0);
        assert!(ctx
            .close(1.0, 0.0, DateTime::<Utc>::UNIX_EPOCH, ExitReason::Signal)
            .is_none());
    }
}
