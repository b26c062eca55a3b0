//! Look-ahead contamination tests for every indicator.
//!
//! No indicator value at bar t may depend on price data from bar t+1 or later.
//!
//! Method: compute on a truncated series and on the full series; the shared
//! prefix must be identical.

use stratforge_core::data::SyntheticMarket;
use stratforge_core::domain::Timeframe;
use stratforge_core::indicators::*;

fn closes_of(n: usize) -> Vec<f64> {
    let bars = SyntheticMarket::new(3)
        .with_volatility(0.02)
        .bars_from_origin("TEST", Timeframe::D1, n);
    closes(&bars)
}

fn assert_no_lookahead(indicator: &dyn Indicator, full: &[f64], truncated_len: usize) {
    let truncated = indicator.compute(&full[..truncated_len]);
    let complete = indicator.compute(full);
    for t in 0..truncated_len {
        let (a, b) = (truncated[t], complete[t]);
        assert!(
            (a.is_nan() && b.is_nan()) || a == b,
            "{} leaks future data at bar {t}: truncated={a}, full={b}",
            indicator.name()
        );
    }
}

#[test]
fn no_indicator_looks_ahead() {
    let full = closes_of(200);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(20)),
        Box::new(Ema::new(12)),
        Box::new(Rsi::new(14)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Upper)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Middle)),
        Box::new(Bollinger::new(20, 2.0, BollingerBand::Lower)),
        Box::new(Macd::new(12, 26, 9, MacdLine::Macd)),
        Box::new(Macd::new(12, 26, 9, MacdLine::Signal)),
        Box::new(Macd::new(12, 26, 9, MacdLine::Histogram)),
        Box::new(Volatility::new(20)),
    ];
    for indicator in &indicators {
        assert_no_lookahead(indicator.as_ref(), &full, 100);
    }
}

#[test]
fn warmup_prefix_is_nan_and_rest_is_finite() {
    let full = closes_of(120);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(10)),
        Box::new(Ema::new(10)),
        Box::new(Rsi::new(10)),
        Box::new(Macd::new(5, 16, 4, MacdLine::Histogram)),
        Box::new(Volatility::new(10)),
    ];
    for indicator in &indicators {
        let out = indicator.compute(&full);
        let lookback = indicator.lookback();
        assert!(out[..lookback].iter().all(|v| v.is_nan()), "{}", indicator.name());
        assert!(out[lookback..].iter().all(|v| v.is_finite()), "{}", indicator.name());
    }
}

#[test]
fn point_forms_report_insufficient_data_instead_of_panicking() {
    let empty: [f64; 0] = [];
    assert!(!sma(&empty, 5).is_ready());
    assert!(!ema(&empty, 5).is_ready());
    assert!(!rsi(&empty, 14).is_ready());
    assert!(!bollinger(&empty, 20, 2.0).is_ready());
    assert!(!macd(&empty, 12, 26, 9).is_ready());
    assert!(!volatility(&empty, 20).is_ready());
}
