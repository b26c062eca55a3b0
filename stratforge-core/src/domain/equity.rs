use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mark-to-market account value at the close of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
}

impl EquityPoint {
    pub fn new(timestamp: DateTime<Utc>, total_value: f64) -> Self {
        Self {
            timestamp,
            total_value,
        }
    }
}
