use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{Context, Result};
use barramento::config::LogFormat;
use barramento::db::log_repo::LogFilter;
use barramento::{load_config, Config, Database, PreservationError, Processor, Scheduler};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

#[derive(Parser, Debug)]
#[clap(name = "barramento", version, about = "Moves repository items into long-term preservation")]
struct CliArgs {
    /// Path to the JSON configuration file.
    #[clap(long, env = "BARRAMENTO_CONFIG")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue every item of a collection.
    Enqueue {
        collection: u64,
        /// Re-queue items that are already queued, failed or preserved.
        #[clap(long)]
        force: bool,
    },
    /// Package and submit queued items.
    ProcessQueue {
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Package and submit one item right away.
    ProcessItem { item: u64, collection: u64 },
    /// Poll the backend for started transfers.
    CheckTransfers {
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Poll the backend for started ingests.
    CheckIngests {
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Show one object, re-polling it first when it is in flight.
    Status { object_id: i64 },
    /// Re-poll every in-flight object.
    Refresh {
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Re-hash the recorded files of an object.
    Verify { object_id: i64 },
    /// Record the dissemination package of a stored object.
    Disseminate { object_id: i64, dip_id: String },
    /// Run one scheduled cycle and exit (for cron).
    RunScheduled,
    /// Run scheduled cycles on the configured interval until interrupted.
    Daemon,
    /// Test both HTTP connections.
    CheckConnection,
    /// Object and queue counts by status.
    Stats {
        #[clap(long)]
        collection: Option<u64>,
    },
    /// Query the audit log.
    Logs {
        #[clap(long)]
        level: Option<String>,
        #[clap(long)]
        item: Option<u64>,
        #[clap(long, default_value_t = 50)]
        limit: u32,
    },
    /// Delete old audit log entries.
    CleanupLogs {
        #[clap(long)]
        days: Option<u32>,
        /// Keep critical entries regardless of age.
        #[clap(long)]
        keep_critical: bool,
    },
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let config = load_config(&cli_args.config)
        .with_context(|| format!("Failed to load config {}", cli_args.config.display()))?;
    init_logging(&config)?;

    let db_path = config
        .resolved_database_path()
        .context("No database path configured and no home directory found")?;
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let processor = Arc::new(Processor::from_config(&config, db)?);

    match cli_args.command {
        Command::Enqueue { collection, force } => {
            emit(processor.enqueue_collection(collection, force))
        }
        Command::ProcessQueue { limit } => {
            let limit = limit.unwrap_or(processor.config().scheduled_batch_limit);
            emit(processor.process_queue(limit))
        }
        Command::ProcessItem { item, collection } => {
            emit(processor.process_item(item, collection, None))
        }
        Command::CheckTransfers { limit } => {
            emit(processor.check_transfers(limit.unwrap_or(processor.config().poll_limit)))
        }
        Command::CheckIngests { limit } => {
            emit(processor.check_ingests(limit.unwrap_or(processor.config().poll_limit)))
        }
        Command::Status { object_id } => emit(processor.check_preservation_status(object_id)),
        Command::Refresh { limit } => {
            emit(processor.update_all_statuses(limit.unwrap_or(processor.config().poll_limit)))
        }
        Command::Verify { object_id } => emit(processor.verify_object(object_id)),
        Command::Disseminate { object_id, dip_id } => {
            emit(processor.record_dissemination(object_id, &dip_id))
        }
        Command::RunScheduled => emit(processor.run_scheduled_cycle()),
        Command::Daemon => run_daemon(processor, &config),
        Command::CheckConnection => {
            let report = processor.test_connections();
            print_json(&report)?;
            if !(report.repository.ok && report.backend.ok) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Stats { collection } => emit(processor.collection_stats(collection)),
        Command::Logs { level, item, limit } => {
            let filter = LogFilter {
                level,
                item_id: item,
                limit: Some(limit),
                ..LogFilter::default()
            };
            let (rows, total) = processor.audit().query(&filter)?;
            let entries: Vec<_> = rows
                .into_iter()
                .map(|row| {
                    json!({
                        "id": row.id,
                        "level": row.level,
                        "message": row.message,
                        "context": row.context,
                        "item_id": row.item_id,
                        "collection_id": row.collection_id,
                        "batch_id": row.batch_id,
                        "aip_id": row.aip_id,
                        "created_at": row.created_at,
                    })
                })
                .collect();
            print_json(&json!({ "total": total, "entries": entries }))
        }
        Command::CleanupLogs {
            days,
            keep_critical,
        } => {
            let days = days.unwrap_or(config.logging.retention_days);
            let keep_critical = keep_critical || config.logging.keep_critical;
            let deleted = processor.audit().cleanup_logs(days, keep_critical)?;
            print_json(&json!({ "deleted": deleted, "days": days, "keep_critical": keep_critical }))
        }
    }
}

fn init_logging(config: &Config) -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    let default_level = if config.logging.debug_mode {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let (text, json) = match config.logging.format {
        LogFormat::Text => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn run_daemon(processor: Arc<Processor>, config: &Config) -> Result<()> {
    let interval = config.schedule.interval();
    let scheduler = Scheduler::new(processor, interval);

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install signal handler")?;

    let handle = scheduler.start();
    scheduler.trigger();
    info!("Preservation daemon started, running every {:?}", interval);

    let _ = stop_rx.recv();
    info!("Shutting down...");
    scheduler.stop();
    if handle.join().is_err() {
        anyhow::bail!("Scheduler thread panicked");
    }
    Ok(())
}

/// Prints a successful result, or the structured error and exits non-zero.
fn emit<T: Serialize>(result: Result<T, PreservationError>) -> Result<()> {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            print_json(&json!({
                "error": e.to_string(),
                "kind": e.kind(),
                "details": e.details(),
            }))?;
            std::process::exit(1);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
