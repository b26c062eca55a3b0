//! Paper execution sink: records orders in memory and returns sequential ids.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use stratforge_core::domain::{OrderId, Side};
use tracing::info;

use crate::ports::{ExecutionError, ExecutionSink};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperOrder {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Book {
    orders: Vec<PaperOrder>,
    /// Open order ids per symbol.
    open: HashMap<String, Vec<OrderId>>,
    closed: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PaperExecutionSink {
    book: Mutex<Book>,
    next_id: AtomicU64,
    /// Remaining submissions that fail with `Unavailable`.
    injected_failures: AtomicU32,
}

impl PaperExecutionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` submissions fail.
    pub fn fail_next_submissions(&self, n: u32) {
        self.injected_failures.store(n, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<PaperOrder> {
        self.book.lock().map(|b| b.orders.clone()).unwrap_or_default()
    }

    pub fn open_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .book
            .lock()
            .map(|b| b.open.keys().cloned().collect())
            .unwrap_or_default();
        symbols.sort();
        symbols
    }

    /// Symbols flattened so far, in call order.
    pub fn closed_symbols(&self) -> Vec<String> {
        self.book.lock().map(|b| b.closed.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionSink for PaperExecutionSink {
    async fn submit_order(
        &self,
        symbol: &str,
        side: Side,
        size: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Result<OrderId, ExecutionError> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(ExecutionError::Unavailable("injected failure".into()));
        }
        if !(size.is_finite() && size > 0.0) {
            return Err(ExecutionError::Rejected(format!("invalid size {size}")));
        }

        let id = OrderId::from(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let order = PaperOrder {
            id: id.clone(),
            symbol: symbol.to_string(),
            side,
            size,
            stop_loss,
            take_profit,
            submitted_at: Utc::now(),
        };
        let mut book = self
            .book
            .lock()
            .map_err(|_| ExecutionError::Unavailable("order book poisoned".into()))?;
        book.open
            .entry(symbol.to_string())
            .or_default()
            .push(id.clone());
        book.orders.push(order);
        info!(order_id = %id, symbol, ?side, size, "paper order filled");
        Ok(id)
    }

    async fn close_position(&self, symbol: &str) -> Result<(), ExecutionError> {
        let mut book = self
            .book
            .lock()
            .map_err(|_| ExecutionError::Unavailable("order book poisoned".into()))?;
        if book.open.remove(symbol).is_none() {
            return Err(ExecutionError::NoPosition(symbol.to_string()));
        }
        book.closed.push(symbol.to_string());
        info!(symbol, "paper position closed");
        Ok(())
    }
}
