//! Export — JSON and CSV artifacts for a backtest run.
//!
//! - **JSON**: the full `BacktestRun`, spec included, for re-import
//! - **CSV**: trade log and equity curve for external analysis tools

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stratforge_core::domain::{EquityPoint, Side, Trade};

use crate::runner::BacktestRun;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(run: &BacktestRun) -> Result<String> {
    serde_json::to_string_pretty(run).context("failed to serialize BacktestRun to JSON")
}

pub fn import_json(json: &str) -> Result<BacktestRun> {
    serde_json::from_str(json).context("failed to deserialize BacktestRun from JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: side, opened_at, entry_price, closed_at, exit_price, size, fee,
/// pnl, pnl_percent, exit_reason
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "opened_at",
        "entry_price",
        "closed_at",
        "exit_price",
        "size",
        "fee",
        "pnl",
        "pnl_percent",
        "exit_reason",
    ])?;

    for t in trades {
        let side = match t.side {
            Side::Long => "long",
            Side::Short => "short",
        };
        wtr.write_record([
            side,
            &t.opened_at.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.closed_at.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.6}", t.size),
            &format!("{:.4}", t.fee),
            &format!("{:.4}", t.pnl),
            &format!("{:.4}", t.pnl_percent),
            &t.exit_reason.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for point in equity_curve {
        wtr.write_record([
            point.timestamp.to_rfc3339(),
            format!("{:.2}", point.total_value),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `run.json`, `trades.csv` and `equity.csv` into
/// `output_dir/{spec_id_short}/`. Returns that directory.
pub fn save_artifacts(run: &BacktestRun, output_dir: &Path) -> Result<PathBuf> {
    let dir = output_dir.join(run.spec.id.short());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    write(&dir.join("run.json"), &export_json(run)?)?;
    write(&dir.join("trades.csv"), &export_trades_csv(&run.result.trades)?)?;
    write(
        &dir.join("equity.csv"),
        &export_equity_csv(&run.result.equity_curve)?,
    )?;
    Ok(dir)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::FitnessWeights;
    use crate::runner::run_backtest;
    use stratforge_core::data::linear_bars;
    use stratforge_core::engine::SimulatorConfig;
    use stratforge_core::{StrategyFactory, StrategyType};

    fn sample_run() -> BacktestRun {
        let spec = StrategyFactory::new(3)
            .generate(&["BTCUSDT".to_string()], &[StrategyType::MaCrossover])
            .unwrap();
        let bars = linear_bars(100.0, 145.0, 120);
        run_backtest(
            &spec,
            &bars,
            &SimulatorConfig::default(),
            &FitnessWeights::default(),
        )
        .unwrap()
    }

    #[test]
    fn trades_csv_has_header_and_one_row_per_trade() {
        let run = sample_run();
        let csv = export_trades_csv(&run.result.trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].starts_with("side,opened_at,entry_price"));
        assert_eq!(lines.len(), run.result.trades.len() + 1);
    }

    #[test]
    fn equity_csv_has_one_row_per_point() {
        let run = sample_run();
        let csv = export_equity_csv(&run.result.equity_curve).unwrap();
        assert_eq!(csv.lines().count(), run.result.equity_curve.len() + 1);
    }

    #[test]
    fn json_reimports_equal() {
        let run = sample_run();
        let json = export_json(&run).unwrap();
        assert_eq!(import_json(&json).unwrap(), run);
    }

    #[test]
    fn artifacts_land_in_spec_directory() {
        let run = sample_run();
        let tmp = tempfile::tempdir().unwrap();
        let dir = save_artifacts(&run, tmp.path()).unwrap();
        assert!(dir.ends_with(run.spec.id.short()));
        for name in ["run.json", "trades.csv", "equity.csv"] {
            assert!(dir.join(name).exists(), "{name} missing");
        }
    }
}
