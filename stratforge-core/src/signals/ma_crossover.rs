//! Moving-average crossover.
//!
//! Regime form: long while SMA(fast) is above SMA(slow), short while below.
//! A held position exits once the averages cross back against it.

use super::SignalRule;
use crate::domain::Side;
use crate::indicators::{Indicator, IndicatorValues, Sma};

#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast: Sma,
    slow: Sma,
}

impl MaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast: Sma::new(fast_period),
            slow: Sma::new(slow_period),
        }
    }

    fn spread(&self, bar_index: usize, values: &IndicatorValues) -> Option<f64> {
        let fast = values.get(self.fast.name(), bar_index)?;
        let slow = values.get(self.slow.name(), bar_index)?;
        Some(fast - slow)
    }
}

impl SignalRule for MaCrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(self.fast.clone()), Box::new(self.slow.clone())]
    }

    fn entry(&self, bar_index: usize, values: &IndicatorValues) -> Option<Side> {
        let spread = self.spread(bar_index, values)?;
        if spread > 0.0 {
            Some(Side::Long)
        } else if spread < 0.0 {
            Some(Side::Short)
        } else {
            None
        }
    }

    fn exit(&self, bar_index: usize, side: Side, values: &IndicatorValues) -> bool {
        match self.spread(bar_index, values) {
            Some(spread) => side.direction() * spread < 0.0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::values_with;

    fn values() -> IndicatorValues {
        values_with(&[
            ("sma_5", vec![f64::NAN, 101.0, 99.0, 100.0]),
            ("sma_20", vec![f64::NAN, 100.0, 100.0, 100.0]),
        ])
    }

    #[test]
    fn bias_follows_spread() {
        let rule = MaCrossover::new(5, 20);
        let iv = values();
        assert_eq!(rule.entry(0, &iv), None);
        assert_eq!(rule.entry(1, &iv), Some(Side::Long));
        assert_eq!(rule.entry(2, &iv), Some(Side::Short));
        assert_eq!(rule.entry(3, &iv), None);
    }

    #[test]
    fn exits_on_opposite_cross() {
        let rule = MaCrossover::new(5, 20);
        let iv = values();
        assert!(!rule.exit(1, Side::Long, &iv));
        assert!(rule.exit(2, Side::Long, &iv));
        assert!(rule.exit(1, Side::Short, &iv));
        // equal averages hold the position
        assert!(!rule.exit(3, Side::Long, &iv));
    }
}
