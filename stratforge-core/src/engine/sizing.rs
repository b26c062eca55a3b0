//! Risk-based position sizing.
//!
//! ```text
//! risk_amount = equity × risk_per_trade
//! raw_size    = risk_amount / (entry_price × stop_loss_percent)
//! final_size  = min(raw_size, equity × max_position_size_percent / entry_price)
//! ```
//!
//! Leverage only changes the margin a position ties up.

use crate::domain::RiskParameters;

/// Units to buy or sell. Zero when no position should be opened.
pub fn position_size(equity: f64, entry_price: f64, risk: &RiskParameters) -> f64 {
    if !(equity.is_finite() && equity > 0.0 && entry_price.is_finite() && entry_price > 0.0) {
        return 0.0;
    }
    let stop_distance = entry_price * risk.stop_loss_percent;
    if stop_distance <= 0.0 {
        return 0.0;
    }
    let raw = equity * risk.risk_per_trade / stop_distance;
    let cap = equity * risk.max_position_size_percent / entry_price;
    let size = raw.min(cap);
    if size.is_finite() && size > 0.0 {
        size
    } else {
        0.0
    }
}

/// Margin tied up by a position of `notional` value.
pub fn margin_required(notional: f64, leverage: f64) -> f64 {
    notional / leverage.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk(sl: f64, rpt: f64, max: f64) -> RiskParameters {
        RiskParameters {
            stop_loss_percent: sl,
            take_profit_percent: 0.04,
            risk_per_trade: rpt,
            max_position_size_percent: max,
        }
    }

    #[test]
    fn risk_bound_when_cap_is_loose() {
        // risk 100, stop distance 2 → 50 units; cap 10 000 × 1.0 / 100 = 100 units
        let size = position_size(10_000.0, 100.0, &risk(0.02, 0.01, 1.0));
        assert!((size - 50.0).abs() < 1e-9);
    }

    #[test]
    fn cap_binds_in_units() {
        // raw = 200 / 2 = 100 units; cap = 10 000 × 0.25 / 100 = 25 units
        let size = position_size(10_000.0, 100.0, &risk(0.02, 0.02, 0.25));
        assert!((size - 25.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_give_zero() {
        let r = risk(0.02, 0.02, 0.25);
        assert_eq!(position_size(0.0, 100.0, &r), 0.0);
        assert_eq!(position_size(-5.0, 100.0, &r), 0.0);
        assert_eq!(position_size(10_000.0, 0.0, &r), 0.0);
        assert_eq!(position_size(f64::NAN, 100.0, &r), 0.0);
    }

    #[test]
    fn leverage_scales_margin_only() {
        assert_eq!(margin_required(1_000.0, 4.0), 250.0);
        assert_eq!(margin_required(1_000.0, 0.5), 1_000.0);
    }
}
