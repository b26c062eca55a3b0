//! Bar suppliers that need no network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use stratforge_core::data::SyntheticMarket;
use stratforge_core::domain::{check_contiguous, validate_bars, Bar, Timeframe};

use crate::ports::{BarSupplier, SupplierError};

/// Seeded random-walk candles for any symbol and window.
///
/// A window is a slice of one fixed path per (symbol, timeframe), so
/// overlapping requests agree bar for bar.
#[derive(Debug, Clone)]
pub struct SyntheticBarSupplier {
    market: SyntheticMarket,
    latency: Option<Duration>,
}

impl SyntheticBarSupplier {
    pub fn new(seed: u64) -> Self {
        Self::from_market(SyntheticMarket::new(seed))
    }

    pub fn from_market(market: SyntheticMarket) -> Self {
        Self {
            market,
            latency: None,
        }
    }

    /// Simulated network latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn market(&self) -> &SyntheticMarket {
        &self.market
    }
}

#[async_trait]
impl BarSupplier for SyntheticBarSupplier {
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, SupplierError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let market = self.market.clone();
        let symbol = symbol.to_string();
        tokio::task::spawn_blocking(move || market.bars(&symbol, timeframe, start, end))
            .await
            .map_err(|e| SupplierError::Unavailable(format!("generator task failed: {e}")))
    }
}

/// Serves a fixed set of bar series, validated on insert.
#[derive(Debug, Clone, Default)]
pub struct StaticBarSupplier {
    series: HashMap<(String, Timeframe), Vec<Bar>>,
}

impl StaticBarSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series; rejects malformed or gapped bars.
    pub fn insert(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<(), SupplierError> {
        validate_bars(&bars)?;
        check_contiguous(&bars, timeframe)?;
        self.series.insert((symbol.to_string(), timeframe), bars);
        Ok(())
    }

    pub fn with_series(
        mut self,
        symbol: &str,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, SupplierError> {
        self.insert(symbol, timeframe, bars)?;
        Ok(self)
    }
}

#[async_trait]
impl BarSupplier for StaticBarSupplier {
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, SupplierError> {
        let bars = self
            .series
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| SupplierError::UnknownSeries {
                symbol: symbol.to_string(),
                timeframe,
            })?;
        Ok(bars
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp < end)
            .copied()
            .collect())
    }
}
