//! Bar — the fundamental market data unit — and bar-series validation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OHLCV sample for a single symbol over one fixed interval.
///
/// `timestamp` is the interval's open time in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLCV field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// First defect found in this bar taken on its own, if any.
    pub fn defect(&self) -> Option<BarDefect> {
        if self.is_void() {
            return Some(BarDefect::NonFiniteValue);
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Some(BarDefect::NonPositivePrice);
        }
        if self.high < self.low {
            return Some(BarDefect::HighBelowLow);
        }
        if self.volume < 0.0 {
            return Some(BarDefect::NegativeVolume);
        }
        None
    }

    pub fn is_sane(&self) -> bool {
        self.defect().is_none()
    }
}

/// What is wrong with a malformed bar.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BarDefect {
    #[error("timestamp does not increase")]
    NonMonotonicTimestamp,
    #[error("non-positive price")]
    NonPositivePrice,
    #[error("NaN or infinite field")]
    NonFiniteValue,
    #[error("high below low")]
    HighBelowLow,
    #[error("negative volume")]
    NegativeVolume,
    #[error("gap: expected {expected}, found {found}")]
    Gap {
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },
}

/// A bar series failed validation. `index` points at the offending bar.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("malformed bar at index {index}: {defect}")]
pub struct DataQualityError {
    pub index: usize,
    pub defect: BarDefect,
}

/// Validate a bar series: every bar sane, timestamps strictly increasing.
///
/// Fails on the first offending bar. Bars are never skipped.
pub fn validate_bars(bars: &[Bar]) -> Result<(), DataQualityError> {
    for (index, bar) in bars.iter().enumerate() {
        if let Some(defect) = bar.defect() {
            return Err(DataQualityError { index, defect });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(DataQualityError {
                index,
                defect: BarDefect::NonMonotonicTimestamp,
            });
        }
    }
    Ok(())
}

/// Check that consecutive bars are exactly one `timeframe` apart.
pub fn check_contiguous(bars: &[Bar], timeframe: Timeframe) -> Result<(), DataQualityError> {
    let step = timeframe.duration();
    for (index, pair) in bars.windows(2).enumerate() {
        let expected = pair[0].timestamp + step;
        if pair[1].timestamp != expected {
            return Err(DataQualityError {
                index: index + 1,
                defect: BarDefect::Gap {
                    expected,
                    found: pair[1].timestamp,
                },
            });
        }
    }
    Ok(())
}

/// Bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Bars per year on a 24/7 calendar; used to annualize per-bar ratios.
    pub fn periods_per_year(&self) -> f64 {
        365.0 * 1440.0 / self.minutes() as f64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe '{s}'"))
    }
}
