//! Entry filters. One per extra indicator in a spec's indicator set.

use super::{EntryFilter, CLOSE};
use crate::domain::Side;
use crate::indicators::{
    Bollinger, BollingerBand, Ema, Indicator, IndicatorValues, Macd, MacdLine, Rsi, Sma,
    Volatility,
};

/// Trade only in the direction of the close relative to a moving average.
fn with_trend(side: Side, close: f64, average: f64) -> bool {
    match side {
        Side::Long => close > average,
        Side::Short => close < average,
    }
}

// ─── SMA trend ───

#[derive(Debug, Clone)]
pub struct SmaTrendFilter {
    sma: Sma,
}

impl SmaTrendFilter {
    pub fn new(period: usize) -> Self {
        Self {
            sma: Sma::new(period),
        }
    }
}

impl EntryFilter for SmaTrendFilter {
    fn name(&self) -> &'static str {
        "sma_trend"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.sma.clone())]
    }

    fn allows(&self, side: Side, bar_index: usize, values: &IndicatorValues) -> bool {
        match (values.get(CLOSE, bar_index), values.get(self.sma.name(), bar_index)) {
            (Some(close), Some(avg)) => with_trend(side, close, avg),
            _ => false,
        }
    }
}

// ─── EMA trend ───

#[derive(Debug, Clone)]
pub struct EmaTrendFilter {
    ema: Ema,
}

impl EmaTrendFilter {
    pub fn new(period: usize) -> Self {
        Self {
            ema: Ema::new(period),
        }
    }
}

impl EntryFilter for EmaTrendFilter {
    fn name(&self) -> &'static str {
        "ema_trend"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.ema.clone())]
    }

    fn allows(&self, side: Side, bar_index: usize, values: &IndicatorValues) -> bool {
        match (values.get(CLOSE, bar_index), values.get(self.ema.name(), bar_index)) {
            (Some(close), Some(avg)) => with_trend(side, close, avg),
            _ => false,
        }
    }
}

// ─── RSI ceiling ───

/// Blocks longs into an overbought market (RSI above `ceiling`) and shorts
/// into an oversold one (RSI below `100 - ceiling`).
#[derive(Debug, Clone)]
pub struct RsiCeilingFilter {
    rsi: Rsi,
    ceiling: f64,
}

impl RsiCeilingFilter {
    pub fn new(period: usize, ceiling: f64) -> Self {
        Self {
            rsi: Rsi::new(period),
            ceiling,
        }
    }
}

impl EntryFilter for RsiCeilingFilter {
    fn name(&self) -> &'static str {
        "rsi_ceiling"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.rsi.clone())]
    }

    fn allows(&self, side: Side, bar_index: usize, values: &IndicatorValues) -> bool {
        let Some(rsi) = values.get(self.rsi.name(), bar_index) else {
            return false;
        };
        match side {
            Side::Long => rsi <= self.ceiling,
            Side::Short => rsi >= 100.0 - self.ceiling,
        }
    }
}

// ─── Bollinger band ───

/// Blocks longs above the upper band and shorts below the lower band.
#[derive(Debug, Clone)]
pub struct BandFilter {
    upper: Bollinger,
    lower: Bollinger,
}

impl BandFilter {
    pub fn new(period: usize, k: f64) -> Self {
        Self {
            upper: Bollinger::new(period, k, BollingerBand::Upper),
            lower: Bollinger::new(period, k, BollingerBand::Lower),
        }
    }
}

impl EntryFilter for BandFilter {
    fn name(&self) -> &'static str {
        "bollinger_band"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.upper.clone()), Box::new(self.lower.clone())]
    }

    fn allows(&self, side: Side, bar_index: usize, values: &IndicatorValues) -> bool {
        let Some(close) = values.get(CLOSE, bar_index) else {
            return false;
        };
        match side {
            Side::Long => values
                .get(self.upper.name(), bar_index)
                .is_some_and(|upper| close <= upper),
            Side::Short => values
                .get(self.lower.name(), bar_index)
                .is_some_and(|lower| close >= lower),
        }
    }
}

// ─── MACD histogram ───

/// Requires MACD(12, 26, 9) momentum to agree with the entry side.
#[derive(Debug, Clone)]
pub struct MacdFilter {
    histogram: Macd,
}

impl MacdFilter {
    pub fn standard() -> Self {
        Self {
            histogram: Macd::new(12, 26, 9, MacdLine::Histogram),
        }
    }
}

impl EntryFilter for MacdFilter {
    fn name(&self) -> &'static str {
        "macd_confirm"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.histogram.clone())]
    }

    fn allows(&self, side: Side, bar_index: usize, values: &IndicatorValues) -> bool {
        values
            .get(self.histogram.name(), bar_index)
            .is_some_and(|hist| side.direction() * hist > 0.0)
    }
}

// ─── Volatility ceiling ───

#[derive(Debug, Clone)]
pub struct VolatilityFilter {
    vol: Volatility,
    max: f64,
}

impl VolatilityFilter {
    pub fn new(window: usize, max: f64) -> Self {
        Self {
            vol: Volatility::new(window),
            max,
        }
    }
}

impl EntryFilter for VolatilityFilter {
    fn name(&self) -> &'static str {
        "volatility_cap"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.vol.clone())]
    }

    fn allows(&self, _side: Side, bar_index: usize, values: &IndicatorValues) -> bool {
        values
            .get(self.vol.name(), bar_index)
            .is_some_and(|vol| vol <= self.max)
    }
}
