//! Bollinger mean reversion.
//!
//! Long when the close drops below the lower band, short above the upper
//! band; either position exits when the close returns to the middle band.

use super::{SignalRule, CLOSE};
use crate::domain::Side;
use crate::indicators::{Bollinger, BollingerBand, Indicator, IndicatorValues};

#[derive(Debug, Clone)]
pub struct BollingerReversion {
    upper: Bollinger,
    middle: Bollinger,
    lower: Bollinger,
}

impl BollingerReversion {
    pub fn new(period: usize, k: f64) -> Self {
        Self {
            upper: Bollinger::new(period, k, BollingerBand::Upper),
            middle: Bollinger::new(period, k, BollingerBand::Middle),
            lower: Bollinger::new(period, k, BollingerBand::Lower),
        }
    }
}

impl SignalRule for BollingerReversion {
    fn name(&self) -> &'static str {
        "bollinger_reversion"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(self.upper.clone()),
            Box::new(self.middle.clone()),
            Box::new(self.lower.clone()),
        ]
    }

    fn entry(&self, bar_index: usize, values: &IndicatorValues) -> Option<Side> {
        let close = values.get(CLOSE, bar_index)?;
        let upper = values.get(self.upper.name(), bar_index)?;
        let lower = values.get(self.lower.name(), bar_index)?;
        if close < lower {
            Some(Side::Long)
        } else if close > upper {
            Some(Side::Short)
        } else {
            None
        }
    }

    fn exit(&self, bar_index: usize, side: Side, values: &IndicatorValues) -> bool {
        let (Some(close), Some(middle)) = (
            values.get(CLOSE, bar_index),
            values.get(self.middle.name(), bar_index),
        ) else {
            return false;
        };
        match side {
            Side::Long => close >= middle,
            Side::Short => close <= middle,
        }
    }
}
