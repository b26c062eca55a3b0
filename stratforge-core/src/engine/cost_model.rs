//! Cost model — slippage and proportional fees.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Take-profit exits are limit fills and never slip.

use super::config::{SimulatorConfig, SlippageModel, MAX_SLIPPAGE_BPS};
use crate::indicators::Volatility;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone)]
pub struct CostModel {
    pub fee_rate: f64,
    pub slippage: SlippageModel,
}

impl CostModel {
    pub fn new(fee_rate: f64, slippage: SlippageModel) -> Self {
        Self { fee_rate, slippage }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(config.fee_rate, config.slippage.clone())
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, SlippageModel::Fixed { bps: 0.0 })
    }

    /// Volatility series the model reads, if any.
    pub fn volatility_indicator(&self) -> Option<Volatility> {
        match self.slippage {
            SlippageModel::Fixed { .. } => None,
            SlippageModel::VolatilityScaled { window, .. } => Some(Volatility::new(window)),
        }
    }

    /// Slippage in basis points given the current volatility reading.
    ///
    /// Volatility-scaled slippage falls back to its floor during warmup.
    /// The result never exceeds [`MAX_SLIPPAGE_BPS`], so slipped prices stay positive.
    pub fn slippage_bps(&self, volatility: Option<f64>) -> f64 {
        let bps = match self.slippage {
            SlippageModel::Fixed { bps } => bps,
            SlippageModel::VolatilityScaled {
                multiplier,
                floor_bps,
                ..
            } => match volatility {
                Some(vol) => (multiplier * vol * 10_000.0).max(floor_bps),
                None => floor_bps,
            },
        };
        bps.clamp(0.0, MAX_SLIPPAGE_BPS)
    }

    /// Slip `raw_price` against the trader.
    pub fn apply_slippage(&self, raw_price: f64, side: FillSide, bps: f64) -> f64 {
        let fraction = bps / 10_000.0;
        match side {
            FillSide::Buy => raw_price * (1.0 + fraction),
            FillSide::Sell => raw_price * (1.0 - fraction),
        }
    }

    pub fn fee(&self, price: f64, size: f64) -> f64 {
        price * size * self.fee_rate
    }
}
