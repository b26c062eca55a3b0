//! Synthetic bar generation.
//!
//! `SyntheticMarket` produces a seeded random walk anchored at a fixed
//! origin. The path depends only on the seed, symbol and timeframe, so any
//! two windows over the same market agree on their overlapping bars.

use crate::domain::{Bar, Timeframe};
use crate::rng::RngHierarchy;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// 2024-01-01T00:00:00Z
const DEFAULT_ORIGIN_SECS: i64 = 1_704_067_200;

fn default_origin() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(DEFAULT_ORIGIN_SECS)
}

/// `count` hourly bars with closes rising linearly from `first_close` to
/// `last_close`; open = previous close, high/low = close ± 0.5.
pub fn linear_bars(first_close: f64, last_close: f64, count: usize) -> Vec<Bar> {
    let origin = default_origin();
    let step = if count > 1 {
        (last_close - first_close) / (count - 1) as f64
    } else {
        0.0
    };
    let mut prev_close = first_close;
    (0..count)
        .map(|i| {
            let close = first_close + step * i as f64;
            let bar = Bar::new(
                origin + Duration::hours(i as i64),
                prev_close,
                close + 0.5,
                close - 0.5,
                close,
                1_000.0,
            );
            prev_close = close;
            bar
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    rng: RngHierarchy,
    origin: DateTime<Utc>,
    start_price: f64,
    /// Mean per-bar return.
    drift: f64,
    /// Per-bar return standard deviation.
    volatility: f64,
}

impl SyntheticMarket {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RngHierarchy::new(seed),
            origin: default_origin(),
            start_price: 100.0,
            drift: 0.0002,
            volatility: 0.01,
        }
    }

    pub fn with_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// The first `count` bars of the market.
    pub fn bars_from_origin(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Vec<Bar> {
        self.generate(symbol, timeframe, count)
    }

    /// Bars whose open time lies in `[start, end)`.
    pub fn bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Bar> {
        let step = timeframe.duration().num_seconds().max(1);
        let index_at = |t: DateTime<Utc>| {
            let offset = (t - self.origin).num_seconds();
            if offset <= 0 {
                0
            } else {
                // ceil division
                ((offset + step - 1) / step) as usize
            }
        };
        let first = index_at(start);
        let last = index_at(end);
        if last <= first {
            return Vec::new();
        }
        let mut bars = self.generate(symbol, timeframe, last);
        bars.drain(..first);
        bars
    }

    fn generate(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Vec<Bar> {
        let mut rng = self.rng.rng_for(symbol, timeframe.minutes() as u64);
        let step = timeframe.duration();
        let mut bars = Vec::with_capacity(count);
        let mut prev_close = self.start_price;

        for i in 0..count {
            // Irwin–Hall approximation of a standard normal.
            let z: f64 = (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0;
            let ret = self.drift + self.volatility * z;
            let open = prev_close;
            let close = (open * (1.0 + ret)).max(0.01);
            let wick_up = rng.gen::<f64>() * self.volatility * 0.5;
            let wick_down = rng.gen::<f64>() * self.volatility * 0.5;
            let high = open.max(close) * (1.0 + wick_up);
            let low = (open.min(close) * (1.0 - wick_down)).max(0.005);
            let volume = rng.gen_range(1_000.0..10_000.0);

            bars.push(Bar::new(
                self.origin + step * i as i32,
                open,
                high,
                low,
                close,
                volume,
            ));
            prev_close = close;
        }
        bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{check_contiguous, validate_bars};

    #[test]
    fn linear_bars_shape() {
        let bars = linear_bars(100.0, 145.0, 50);
        assert_eq!(bars.len(), 50);
        assert_eq!(bars[0].close, 100.0);
        assert!((bars[49].close - 145.0).abs() < 1e-9);
        assert_eq!(bars[1].open, bars[0].close);
        assert!((bars[10].high - bars[10].close - 0.5).abs() < 1e-12);
        assert!(validate_bars(&bars).is_ok());
    }

    #[test]
    fn synthetic_bars_are_valid_and_contiguous() {
        let bars = SyntheticMarket::new(1).bars_from_origin("ETHUSDT", Timeframe::H1, 500);
        assert!(validate_bars(&bars).is_ok());
        assert!(check_contiguous(&bars, Timeframe::H1).is_ok());
    }

    #[test]
    fn same_seed_same_path() {
        let a = SyntheticMarket::new(9).bars_from_origin("BTCUSDT", Timeframe::H4, 100);
        let b = SyntheticMarket::new(9).bars_from_origin("BTCUSDT", Timeframe::H4, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn symbols_get_independent_paths() {
        let m = SyntheticMarket::new(9);
        let a = m.bars_from_origin("BTCUSDT", Timeframe::H1, 20);
        let b = m.bars_from_origin("ETHUSDT", Timeframe::H1, 20);
        assert_ne!(a, b);
    }

    #[test]
    fn windows_agree_on_overlap() {
        let m = SyntheticMarket::new(5);
        let origin = m.origin();
        let full = m.bars("BTCUSDT", Timeframe::H1, origin, origin + Duration::hours(100));
        let window = m.bars(
            "BTCUSDT",
            Timeframe::H1,
            origin + Duration::hours(40),
            origin + Duration::hours(60),
        );
        assert_eq!(full.len(), 100);
        assert_eq!(window.len(), 20);
        assert_eq!(window[..], full[40..60]);
    }

    #[test]
    fn window_before_origin_is_clamped() {
        let m = SyntheticMarket::new(5);
        let origin = m.origin();
        let bars = m.bars(
            "BTCUSDT",
            Timeframe::H1,
            origin - Duration::hours(10),
            origin + Duration::hours(5),
        );
        assert_eq!(bars.len(), 5);
        assert!(m
            .bars("BTCUSDT", Timeframe::H1, origin + Duration::hours(5), origin)
            .is_empty());
    }
}
