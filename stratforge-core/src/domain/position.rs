use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn direction(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

/// The single open position of a simulated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub opened_at: DateTime<Utc>,
    /// Fee paid on entry; settled into the trade's pnl on close.
    pub entry_fee: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Set once the trailing stop has moved `stop_loss` off its initial level.
    pub trailing_active: bool,
    /// Best price seen since entry (high for longs, low for shorts).
    pub watermark: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn notional(&self, price: f64) -> f64 {
        self.size * price
    }

    /// Gross unrealized PnL at `price`, before any fees.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.direction() * (price - self.entry_price) * self.size
    }

    /// Favourable move from entry as a fraction of entry price.
    pub fn gain_fraction(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.side.direction() * (price - self.entry_price) / self.entry_price
    }
}
