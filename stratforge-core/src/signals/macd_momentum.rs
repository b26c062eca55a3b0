//! MACD momentum: long while the MACD line is above its signal line.

use super::SignalRule;
use crate::domain::Side;
use crate::indicators::{Indicator, IndicatorValues, Macd, MacdLine};

#[derive(Debug, Clone)]
pub struct MacdMomentum {
    histogram: Macd,
}

impl MacdMomentum {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            histogram: Macd::new(fast, slow, signal, MacdLine::Histogram),
        }
    }
}

impl SignalRule for MacdMomentum {
    fn name(&self) -> &'static str {
        "macd_momentum"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.histogram.clone())]
    }

    fn entry(&self, bar_index: usize, values: &IndicatorValues) -> Option<Side> {
        let hist = values.get(self.histogram.name(), bar_index)?;
        if hist > 0.0 {
            Some(Side::Long)
        } else if hist < 0.0 {
            Some(Side::Short)
        } else {
            None
        }
    }

    fn exit(&self, bar_index: usize, side: Side, values: &IndicatorValues) -> bool {
        values
            .get(self.histogram.name(), bar_index)
            .map(|hist| side.direction() * hist < 0.0)
            .unwrap_or(false)
    }
}
