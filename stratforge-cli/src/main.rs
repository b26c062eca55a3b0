//! StratForge CLI — generate, backtest, evolve and run the lifecycle pipeline.
//!
//! Commands:
//! - `generate`: sample strategy specs and print or save them as JSON
//! - `backtest`: score specs against synthetic bars, optionally saving artifacts
//! - `evolve`: evolutionary search from a TOML config
//! - `pipeline`: run generated specs through backtest, paper and promotion
//! - `init-config`: write the default lifecycle config as TOML
//!
//! Market data is synthetic and seeded; no command touches the network.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stratforge_core::data::SyntheticMarket;
use stratforge_core::domain::{LifecycleState, StrategySpec, StrategyType, Timeframe};
use stratforge_runner::export::save_artifacts;
use stratforge_runner::{
    evolve, generate_strategies, run_backtest, EvolutionConfig, GenerationConfig,
    InMemoryStrategyRepository, LifecycleConfig, LifecycleEvent, PaperExecutionSink, Scheduler,
    SyntheticBarSupplier,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(
    name = "stratforge",
    about = "StratForge — automated trading strategy lifecycle engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample fresh strategy specs.
    Generate {
        #[arg(long, default_value_t = 10)]
        count: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Symbols to draw from.
        #[arg(long, num_args = 1.., default_values_t = ["BTCUSDT".to_string()])]
        symbols: Vec<String>,

        /// Strategy types to draw from (ma_crossover, rsi_reversion, ...). All when omitted.
        #[arg(long, num_args = 1..)]
        types: Vec<StrategyType>,

        /// Write the specs here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Backtest specs against seeded synthetic bars.
    Backtest {
        /// JSON file of specs, as written by `generate`. Generates `--count` specs when omitted.
        #[arg(long)]
        spec: Option<PathBuf>,

        #[arg(long, default_value_t = 10)]
        count: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Seed of the synthetic market.
        #[arg(long, default_value_t = 7)]
        data_seed: u64,

        /// Bars per backtest.
        #[arg(long, default_value_t = 1_000)]
        bars: usize,

        /// Lifecycle TOML supplying simulator and fitness settings.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Save JSON and CSV artifacts per spec here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Evolutionary search over one synthetic series.
    Evolve {
        /// Evolution TOML. Defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overrides the config's generation count.
        #[arg(long)]
        generations: Option<usize>,

        /// Overrides the config's population size.
        #[arg(long)]
        population: Option<usize>,

        /// Overrides the config's seed.
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,

        #[arg(long, default_value_t = 7)]
        data_seed: u64,

        #[arg(long, default_value_t = 1_000)]
        bars: usize,

        /// Candidates to print.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Run generated specs through the full lifecycle with a paper execution sink.
    Pipeline {
        /// Lifecycle TOML. Defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 10)]
        count: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 7)]
        data_seed: u64,

        #[arg(long, num_args = 1.., default_values_t = ["BTCUSDT".to_string()])]
        symbols: Vec<String>,

        /// Hand every promotable strategy to the paper sink at the end.
        #[arg(long, default_value_t = false)]
        promote: bool,

        /// Give up waiting after this many seconds.
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Write the default lifecycle config.
    InitConfig {
        #[arg(long, default_value = "stratforge.toml")]
        out: PathBuf,

        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            count,
            seed,
            symbols,
            types,
            out,
        } => run_generate(count, seed, symbols, types, out),
        Commands::Backtest {
            spec,
            count,
            seed,
            data_seed,
            bars,
            config,
            output_dir,
        } => run_backtest_cmd(spec, count, seed, data_seed, bars, config, output_dir),
        Commands::Evolve {
            config,
            generations,
            population,
            seed,
            timeframe,
            data_seed,
            bars,
            top,
        } => run_evolve(
            config,
            EvolveOverrides {
                generations,
                population,
                seed,
            },
            timeframe,
            data_seed,
            bars,
            top,
        ),
        Commands::Pipeline {
            config,
            count,
            seed,
            data_seed,
            symbols,
            promote,
            timeout_secs,
        } => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(run_pipeline(
                config,
                count,
                seed,
                data_seed,
                symbols,
                promote,
                timeout_secs,
            ))
        }
        Commands::InitConfig { out, force } => run_init_config(&out, force),
    }
}

/// `RUST_LOG` wins; otherwise info.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn types_or_all(types: Vec<StrategyType>) -> Vec<StrategyType> {
    if types.is_empty() {
        StrategyType::ALL.to_vec()
    } else {
        types
    }
}

fn load_lifecycle_config(path: Option<&Path>) -> Result<LifecycleConfig> {
    match path {
        Some(p) => LifecycleConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(LifecycleConfig::default()),
    }
}

// ─── generate ────────────────────────────────────────────────────────

fn run_generate(
    count: usize,
    seed: u64,
    symbols: Vec<String>,
    types: Vec<StrategyType>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = GenerationConfig {
        seed,
        count,
        symbols,
        strategy_types: types_or_all(types),
        ..GenerationConfig::default()
    };
    let specs = generate_strategies(&config)?;
    let json = serde_json::to_string_pretty(&specs).context("failed to serialize specs")?;
    match out {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(count = specs.len(), path = %path.display(), "specs written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ─── backtest ────────────────────────────────────────────────────────

fn run_backtest_cmd(
    specs_path: Option<PathBuf>,
    count: usize,
    seed: u64,
    data_seed: u64,
    bars: usize,
    config_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    if bars == 0 {
        bail!("--bars must be > 0");
    }
    let config = load_lifecycle_config(config_path.as_deref())?;
    let specs: Vec<StrategySpec> = match specs_path {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("failed to parse specs in {}", path.display()))?
        }
        None => generate_strategies(&GenerationConfig {
            seed,
            count,
            ..GenerationConfig::default()
        })?,
    };

    let market = SyntheticMarket::new(data_seed);
    println!(
        "{:<10} {:<18} {:<4} {:>7} {:>8} {:>8} {:>9} {:>8} {:>8}",
        "Id", "Type", "TF", "Trades", "WinRate", "PF", "Net%", "MaxDD%", "Fitness"
    );
    println!("{}", "-".repeat(90));
    for spec in &specs {
        let series = market.bars_from_origin(&spec.symbol, spec.timeframe, bars);
        let run = match run_backtest(spec, &series, &config.simulator, &config.fitness) {
            Ok(run) => run,
            Err(e) => {
                warn!(spec_id = %spec.id, error = %e, "backtest failed");
                continue;
            }
        };
        let m = &run.metrics;
        println!(
            "{:<10} {:<18} {:<4} {:>7} {:>8.3} {:>8.2} {:>9.2} {:>8.2} {:>8.4}",
            spec.id.short(),
            spec.strategy_type.as_str(),
            spec.timeframe.as_str(),
            m.total_trades,
            m.win_rate,
            m.profit_factor,
            m.net_profit_percent,
            m.max_drawdown_percent,
            run.fitness
        );
        if let Some(dir) = &output_dir {
            let saved = save_artifacts(&run, dir)?;
            info!(path = %saved.display(), "artifacts saved");
        }
    }
    Ok(())
}

// ─── evolve ──────────────────────────────────────────────────────────

struct EvolveOverrides {
    generations: Option<usize>,
    population: Option<usize>,
    seed: Option<u64>,
}

fn run_evolve(
    config_path: Option<PathBuf>,
    overrides: EvolveOverrides,
    timeframe: Timeframe,
    data_seed: u64,
    bars: usize,
    top: usize,
) -> Result<()> {
    let mut config: EvolutionConfig = match &config_path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            toml::from_str(&content).with_context(|| format!("failed to parse {}", p.display()))?
        }
        None => EvolutionConfig::default(),
    };
    if let Some(g) = overrides.generations {
        config.generations = g;
    }
    if let Some(p) = overrides.population {
        config.population = p;
    }
    if let Some(s) = overrides.seed {
        config.seed = s;
    }
    // Every candidate is scored on one series.
    config.factory.timeframes = vec![timeframe];
    let Some(symbol) = config.symbols.first().cloned() else {
        bail!("evolution config needs at least one symbol");
    };
    config.symbols = vec![symbol.clone()];

    let series = SyntheticMarket::new(data_seed).bars_from_origin(&symbol, timeframe, bars);
    let ranked = evolve(&config, &series)?;

    println!(
        "{:<4} {:<10} {:<18} {:>4} {:>7} {:>8} {:>8}",
        "Rank", "Id", "Type", "Gen", "Trades", "WinRate", "Fitness"
    );
    println!("{}", "-".repeat(65));
    for (rank, scored) in ranked.iter().take(top).enumerate() {
        let (trades, win_rate) = scored
            .metrics
            .as_ref()
            .map_or((0, 0.0), |m| (m.total_trades, m.win_rate));
        println!(
            "{:<4} {:<10} {:<18} {:>4} {:>7} {:>8.3} {:>8.4}",
            rank + 1,
            scored.spec.id.short(),
            scored.spec.strategy_type.as_str(),
            scored.spec.generation,
            trades,
            win_rate,
            scored.fitness.unwrap_or(f64::NAN)
        );
    }
    Ok(())
}

// ─── pipeline ────────────────────────────────────────────────────────

async fn run_pipeline(
    config_path: Option<PathBuf>,
    count: usize,
    seed: u64,
    data_seed: u64,
    symbols: Vec<String>,
    promote: bool,
    timeout_secs: u64,
) -> Result<()> {
    let config = load_lifecycle_config(config_path.as_deref())?;
    let specs = generate_strategies(&GenerationConfig {
        seed,
        count,
        symbols,
        ..GenerationConfig::default()
    })?;

    let repo = Arc::new(InMemoryStrategyRepository::new());
    let sink = Arc::new(PaperExecutionSink::new());
    let supplier = Arc::new(SyntheticBarSupplier::new(data_seed));
    let handle = Scheduler::start(config, supplier, sink.clone(), repo)?;

    let mut events = handle.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    for spec in &specs {
        handle.enqueue_for_backtest(spec.clone()).await?;
    }
    if tokio::time::timeout(Duration::from_secs(timeout_secs), handle.wait_idle())
        .await
        .is_err()
    {
        warn!(timeout_secs, "pipeline did not finish in time");
    }

    if promote {
        for spec in &specs {
            if handle.load(&spec.id).await?.state == LifecycleState::Promotable {
                match handle.promote_to_live(&spec.id).await {
                    Ok(order) => info!(spec_id = %spec.id, order_id = %order, "promoted to live"),
                    Err(e) => warn!(spec_id = %spec.id, error = %e, "promotion failed"),
                }
            }
        }
    }

    let status = handle.status().await?;
    handle.shutdown().await;
    logger.abort();

    println!("{:<30} {:>6}", "State", "Count");
    println!("{}", "-".repeat(37));
    for (state, n) in &status.counts_by_state {
        println!("{state:<30} {n:>6}");
    }
    println!("Orders submitted: {}", sink.orders().len());
    Ok(())
}

fn log_event(event: &LifecycleEvent) {
    let id = event.strategy_id().short();
    match event {
        LifecycleEvent::Enqueued { .. } => info!(id, "enqueued"),
        LifecycleEvent::Backtested { metrics, fitness, .. } => info!(
            id,
            trades = metrics.total_trades,
            win_rate = metrics.win_rate,
            fitness,
            "backtested"
        ),
        LifecycleEvent::Promoted { from, to, .. } => info!(id, %from, %to, "promoted"),
        LifecycleEvent::Retired { reason, .. } => info!(id, %reason, "retired"),
        LifecycleEvent::PaperStarted { duration_bars, .. } => {
            info!(id, duration_bars, "paper trading started")
        }
        LifecycleEvent::PaperCheckIn {
            elapsed_bars,
            duration_bars,
            equity,
            ..
        } => info!(id, elapsed_bars, duration_bars, equity, "paper check-in"),
        LifecycleEvent::WentLive { order_id, size, .. } => {
            info!(id, %order_id, size, "went live")
        }
        LifecycleEvent::ExecutionAlert { message, .. } => warn!(id, %message, "execution alert"),
    }
}

// ─── init-config ─────────────────────────────────────────────────────

fn run_init_config(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        bail!("{} exists; pass --force to overwrite", out.display());
    }
    let toml = LifecycleConfig::default().to_toml()?;
    std::fs::write(out, toml).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Wrote {}", out.display());
    Ok(())
}
