//! Simulator configuration: capital, fees, slippage model, trailing stop.

use serde::{Deserialize, Serialize};

/// Largest slippage a fill can take. At 10 000 bps a sell fills at zero.
pub const MAX_SLIPPAGE_BPS: f64 = 9_999.0;

/// How market fills are slipped. One model applies to every market fill of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlippageModel {
    /// Constant adverse slippage in basis points.
    Fixed { bps: f64 },
    /// `max(floor_bps, multiplier × volatility(window) × 10 000)` basis points,
    /// where volatility is the stddev of recent simple returns.
    VolatilityScaled {
        multiplier: f64,
        window: usize,
        floor_bps: f64,
    },
}

impl Default for SlippageModel {
    fn default() -> Self {
        SlippageModel::Fixed { bps: 5.0 }
    }
}

/// Trailing stop: once the favourable move reaches `trigger_percent`, the
/// stop follows the best price at `trail_percent` distance. Fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopConfig {
    pub trigger_percent: f64,
    pub trail_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    /// Proportional fee per side (0.001 = 0.1%).
    pub fee_rate: f64,
    pub slippage: SlippageModel,
    pub trailing_stop: Option<TrailingStopConfig>,
    /// Scales the margin requirement only; sizing ignores it.
    pub leverage: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            fee_rate: 0.001,
            slippage: SlippageModel::default(),
            trailing_stop: None,
            leverage: 1.0,
        }
    }
}

impl SimulatorConfig {
    pub fn frictionless(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            fee_rate: 0.0,
            slippage: SlippageModel::Fixed { bps: 0.0 },
            ..Self::default()
        }
    }

    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(format!("initial_capital must be positive, got {}", self.initial_capital));
        }
        if !(self.fee_rate.is_finite() && (0.0..1.0).contains(&self.fee_rate)) {
            return Err(format!("fee_rate must lie in [0, 1), got {}", self.fee_rate));
        }
        if !(self.leverage.is_finite() && self.leverage >= 1.0) {
            return Err(format!("leverage must be >= 1, got {}", self.leverage));
        }
        match self.slippage {
            SlippageModel::Fixed { bps }
                if !(bps.is_finite() && (0.0..=MAX_SLIPPAGE_BPS).contains(&bps)) =>
            {
                return Err(format!("slippage bps must lie in [0, {MAX_SLIPPAGE_BPS}], got {bps}"));
            }
            SlippageModel::VolatilityScaled {
                multiplier,
                window,
                floor_bps,
            } => {
                if !(multiplier.is_finite() && multiplier >= 0.0) || window == 0 {
                    return Err("volatility slippage needs multiplier >= 0 and window > 0".into());
                }
                if !(floor_bps.is_finite() && (0.0..=MAX_SLIPPAGE_BPS).contains(&floor_bps)) {
                    return Err(format!(
                        "slippage floor must lie in [0, {MAX_SLIPPAGE_BPS}], got {floor_bps}"
                    ));
                }
            }
            _ => {}
        }
        if let Some(trail) = self.trailing_stop {
            let ok = |v: f64| v.is_finite() && v > 0.0 && v < 1.0;
            if !ok(trail.trigger_percent) || !ok(trail.trail_percent) {
                return Err("trailing stop percents must lie in (0, 1)".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SimulatorConfig::default().validate().is_ok());
        assert!(SimulatorConfig::frictionless(1_000.0).validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let mut c = SimulatorConfig::default();
        c.leverage = 0.5;
        assert!(c.validate().is_err());

        let mut c = SimulatorConfig::default();
        c.slippage = SlippageModel::VolatilityScaled {
            multiplier: 1.0,
            window: 0,
            floor_bps: 1.0,
        };
        assert!(c.validate().is_err());

        let mut c = SimulatorConfig::default();
        c.trailing_stop = Some(TrailingStopConfig {
            trigger_percent: 0.02,
            trail_percent: 1.5,
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_slippage_that_would_zero_a_sell() {
        let mut c = SimulatorConfig::default();
        c.slippage = SlippageModel::Fixed { bps: 10_000.0 };
        assert!(c.validate().is_err());
        c.slippage = SlippageModel::Fixed { bps: MAX_SLIPPAGE_BPS };
        assert!(c.validate().is_ok());
        c.slippage = SlippageModel::VolatilityScaled {
            multiplier: 1.0,
            window: 20,
            floor_bps: 12_000.0,
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn slippage_model_serde_shape() {
        let json = serde_json::to_string(&SlippageModel::Fixed { bps: 3.0 }).unwrap();
        assert_eq!(json, r#"{"kind":"fixed","bps":3.0}"#);
    }
}
