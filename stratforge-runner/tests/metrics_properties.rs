//! Metric edge cases and sentinel properties.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use stratforge_core::domain::{EquityPoint, ExitReason, Side, Trade};
use stratforge_runner::metrics::{max_drawdown, profit_factor};
use stratforge_runner::{fitness, FitnessWeights, PerformanceMetrics};

fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(19_723)
}

fn trade(pnl: f64) -> Trade {
    Trade {
        side: Side::Long,
        entry_price: 100.0,
        exit_price: 100.0 + pnl,
        size: 1.0,
        fee: 0.0,
        pnl,
        pnl_percent: pnl,
        opened_at: t0(),
        closed_at: t0() + Duration::hours(1),
        exit_reason: ExitReason::Signal,
    }
}

fn curve(values: &[f64]) -> Vec<EquityPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| EquityPoint::new(t0() + Duration::hours(i as i64), *v))
        .collect()
}

// ─── Scenario B ───

#[test]
fn empty_run_has_zero_sentinels() {
    // GIVEN no trades and a single equity point at the starting capital
    let equity = curve(&[10_000.0]);

    // WHEN metrics are computed
    let m = PerformanceMetrics::compute(&[], &equity, 10_000.0, 8_760.0);

    // THEN profit factor, win rate and drawdown are all zero
    assert_eq!(m.profit_factor, 0.0);
    assert_eq!(m.win_rate, 0.0);
    assert_eq!(m.max_drawdown, 0.0);
    assert_eq!(m.max_drawdown_percent, 0.0);
    assert_eq!(m.sharpe_ratio, 0.0);
    assert!(m.first_non_finite().is_none());
}

#[test]
fn winners_only_has_infinite_profit_factor() {
    let m = PerformanceMetrics::compute(
        &[trade(5.0), trade(3.0)],
        &curve(&[10_000.0, 10_005.0, 10_008.0]),
        10_000.0,
        8_760.0,
    );
    assert_eq!(m.profit_factor, f64::INFINITY);
    assert_eq!(m.win_rate, 1.0);
    assert!(m.first_non_finite().is_none());
    assert!(fitness(&m, &FitnessWeights::default()).is_finite());
}

#[test]
fn infinite_profit_factor_survives_json() {
    let m = PerformanceMetrics::compute(&[trade(5.0)], &curve(&[10_000.0, 10_005.0]), 10_000.0, 1.0);
    let json = serde_json::to_string(&m).unwrap();
    assert!(json.contains("\"inf\""));
    let back: PerformanceMetrics = serde_json::from_str(&json).unwrap();
    assert_eq!(back.profit_factor, f64::INFINITY);
}

#[test]
fn drawdown_is_peak_to_trough() {
    let (abs, pct) = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
    assert!((abs - 30.0).abs() < 1e-9);
    assert!((pct - 25.0).abs() < 1e-9);
}

#[test]
fn drawdown_counts_a_dip_below_starting_capital() {
    // GIVEN a curve whose first point already sits below the capital
    let equity = curve(&[9_900.0, 9_950.0]);

    // WHEN metrics are computed
    let m = PerformanceMetrics::compute(&[], &equity, 10_000.0, 8_760.0);

    // THEN the drawdown is measured from the capital, not the first point
    assert!((m.max_drawdown - 100.0).abs() < 1e-9);
    assert!((m.max_drawdown_percent - 1.0).abs() < 1e-9);
}

// ─── Properties ───

fn arb_pnls() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-500.0f64..500.0, 0..40)
}

fn arb_equity() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..50_000.0, 0..80)
}

proptest! {
    #[test]
    fn metrics_are_finite_or_sentinel(pnls in arb_pnls(), equity in arb_equity()) {
        let trades: Vec<Trade> = pnls.iter().map(|p| trade(*p)).collect();
        let m = PerformanceMetrics::compute(&trades, &curve(&equity), 10_000.0, 8_760.0);
        prop_assert!(m.first_non_finite().is_none());
        prop_assert!((0.0..=1.0).contains(&m.win_rate));
        prop_assert!(m.profit_factor >= 0.0);
        prop_assert!((0.0..=100.0).contains(&m.max_drawdown_percent));
        prop_assert!(fitness(&m, &FitnessWeights::default()).is_finite());
    }

    #[test]
    fn profit_factor_is_infinite_only_without_losses(pnls in arb_pnls()) {
        let trades: Vec<Trade> = pnls.iter().map(|p| trade(*p)).collect();
        let pf = profit_factor(&trades);
        let has_loss = pnls.iter().any(|p| *p < 0.0);
        let has_win = pnls.iter().any(|p| *p > 0.0);
        prop_assert_eq!(pf.is_infinite(), has_win && !has_loss);
    }

    #[test]
    fn win_and_loss_counts_partition_trades(pnls in arb_pnls()) {
        let trades: Vec<Trade> = pnls.iter().map(|p| trade(*p)).collect();
        let m = PerformanceMetrics::compute(&trades, &[], 10_000.0, 1.0);
        prop_assert!(m.winning_trades + m.losing_trades <= m.total_trades);
        prop_assert_eq!(m.total_trades, pnls.len());
    }
}
