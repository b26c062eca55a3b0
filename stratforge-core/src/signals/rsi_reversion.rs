//! RSI mean reversion: buy oversold, sell overbought.
//!
//! Longs exit once RSI reaches the overbought level; shorts once it falls to
//! the oversold level.

use super::SignalRule;
use crate::domain::Side;
use crate::indicators::{Indicator, IndicatorValues, Rsi};

#[derive(Debug, Clone)]
pub struct RsiReversion {
    rsi: Rsi,
    oversold: f64,
    overbought: f64,
}

impl RsiReversion {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            rsi: Rsi::new(period),
            oversold,
            overbought,
        }
    }
}

impl SignalRule for RsiReversion {
    fn name(&self) -> &'static str {
        "rsi_reversion"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.rsi.clone())]
    }

    fn entry(&self, bar_index: usize, values: &IndicatorValues) -> Option<Side> {
        let rsi = values.get(self.rsi.name(), bar_index)?;
        if rsi < self.oversold {
            Some(Side::Long)
        } else if rsi > self.overbought {
            Some(Side::Short)
        } else {
            None
        }
    }

    fn exit(&self, bar_index: usize, side: Side, values: &IndicatorValues) -> bool {
        let Some(rsi) = values.get(self.rsi.name(), bar_index) else {
            return false;
        };
        match side {
            Side::Long => rsi >= self.overbought,
            Side::Short => rsi <= self.oversold,
        }
    }
}
