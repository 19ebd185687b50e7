use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tokio::sync::watch;

use reversion_quant::config::Config;
use reversion_quant::controller::{CycleOutcome, RebalanceController};
use reversion_quant::execution::PaperExecutionSink;
use reversion_quant::market_data::InMemoryMarketData;
use reversion_quant::runner::run_scheduled;
use reversion_quant::schedule::SystemClock;

enum Command {
    /// Run a single cycle for the given date (default: today).
    Once(Option<NaiveDate>),
    /// Poll the weekly schedule until Ctrl+C.
    Run,
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None | Some("run") => Ok(Command::Run),
        Some("once") => {
            let date = args
                .get(1)
                .map(|s| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .with_context(|| format!("invalid date '{}': expected YYYY-MM-DD", s))
                })
                .transpose()?;
            Ok(Command::Once(date))
        }
        Some(other) => bail!("unknown command '{}': expected `run` or `once [YYYY-MM-DD]`", other),
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(&config.logging.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });

    match &config.logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(log_file))
                .with_ansi(false)
                .json()
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set RQ_CONFIG_PATH or create config/default.toml");
            std::process::exit(1);
        }
    };
    init_tracing(&config)?;

    let feed = InMemoryMarketData::load_json(&config.market_data.snapshot_path).with_context(
        || {
            format!(
                "failed to load market data from {}",
                config.market_data.snapshot_path.display()
            )
        },
    )?;
    let sink = PaperExecutionSink::new(
        &config.execution.journal_path,
        &config.execution.positions_path,
    );
    let mut controller = RebalanceController::new(config.pipeline()?, feed, sink);

    tracing::info!(
        securities = controller.feed().len(),
        lookback = config.strategy.returns_lookback_days,
        max_gross = config.risk.max_gross_exposure,
        max_position = config.risk.max_position_concentration,
        "Rebalancer started"
    );

    match command {
        Command::Once(date) => {
            let as_of = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            match controller.run_cycle(as_of)? {
                CycleOutcome::Submitted { report, ack, .. } => {
                    println!("{}", serde_json::to_string_pretty(&report.targets)?);
                    tracing::info!(cycle_id = %ack.cycle_id, orders = ack.accepted_orders, "Cycle complete");
                }
                CycleOutcome::Rejected { rejection, .. } => {
                    bail!("rebalance rejected: {}", rejection.reason);
                }
                CycleOutcome::Skipped(reason) => {
                    tracing::info!(%reason, "Cycle skipped");
                }
            }
        }
        Command::Run => {
            let schedule = config.schedule.to_schedule()?;
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl+C received");
                    let _ = shutdown_tx.send(true);
                }
            });
            let summary = run_scheduled(
                &mut controller,
                &schedule,
                &SystemClock,
                Duration::from_secs(config.schedule.poll_interval_secs.max(1)),
                None,
                shutdown_rx,
            )
            .await?;
            tracing::info!(
                submitted = summary.submitted,
                rejected = summary.rejected,
                skipped = summary.skipped,
                "Shutdown complete"
            );
        }
    }
    Ok(())
}
