//! supervisor CLI: operator interface to the dispatcher, workers, and result cache.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use supervisor_rs::config::Config;
use supervisor_rs::db::Db;
use supervisor_rs::engine::{
    CollectorConfig, DelayProcessor, Dispatcher, ResultCollector, ResultQuery, SubmitResult,
    WorkerConfig, WorkerRuntime,
};
use supervisor_rs::model::{NewTask, TaskId, WorkerId};
use supervisor_rs::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};

#[derive(Parser)]
#[command(name = "supervisor", about = "Round-robin task dispatch with a result cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the result collector daemon
    Serve,
    /// Run one worker runtime
    Worker {
        /// This worker's id, 1..=WORKER_COUNT
        #[arg(long)]
        id: u32,
        /// Simulated processing time per task
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
        /// Abandon a task after this many seconds (no result is emitted)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Submit a task for dispatch
    Submit {
        /// Task id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
    /// Show the cached result for a task
    Result {
        /// Task id
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve => cmd_serve(config).await,
        Command::Worker {
            id,
            delay_ms,
            timeout_secs,
        } => cmd_worker(config, id, delay_ms, timeout_secs).await,
        Command::Submit { id, payload } => cmd_submit(config, id, payload).await,
        Command::Result { id } => cmd_result(config, id).await,
    }
}

fn telemetry(config: &Config, service_name: &str) -> anyhow::Result<TelemetryGuard> {
    Ok(init_telemetry(TelemetryConfig::from_config(
        config,
        service_name,
    ))?)
}

async fn connect(config: &Config) -> anyhow::Result<Arc<Db>> {
    Ok(Arc::new(Db::open(config).await?))
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let _guard = telemetry(&config, "supervisor")?;
    let db = connect(&config).await?;

    let collector = ResultCollector::new(
        db.clone(),
        db,
        config.channels.result_queue.clone(),
        CollectorConfig {
            result_ttl: config.result_ttl,
            ..CollectorConfig::default()
        },
    );

    let ctrl = collector.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.shutdown();
    });

    collector.run().await?;
    Ok(())
}

async fn cmd_worker(
    config: Config,
    id: u32,
    delay_ms: u64,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    if id == 0 || id > config.worker_count {
        anyhow::bail!(
            "worker id {id} is outside 1..={} (WORKER_COUNT)",
            config.worker_count
        );
    }
    let _guard = telemetry(&config, &format!("supervisor-worker-{id}"))?;
    let db = connect(&config).await?;

    let worker = WorkerRuntime::new(
        WorkerId(id),
        db,
        config.channels.clone(),
        Arc::new(DelayProcessor::new(Duration::from_millis(delay_ms))),
        WorkerConfig {
            processing_timeout: timeout_secs.map(Duration::from_secs),
            ..WorkerConfig::default()
        },
    );

    let ctrl = worker.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.shutdown();
    });

    worker.run().await?;
    Ok(())
}

async fn cmd_submit(
    config: Config,
    id: Option<String>,
    payload: Option<String>,
) -> anyhow::Result<()> {
    let _guard = telemetry(&config, "supervisor")?;
    let db = connect(&config).await?;

    let payload: serde_json::Value = match payload {
        Some(json) => serde_json::from_str(&json)?,
        None => serde_json::json!({}),
    };
    let mut new = NewTask::new(payload);
    if let Some(id) = id {
        new = new.id(id);
    }

    let dispatcher = Dispatcher::new(
        db.clone(),
        db,
        config.worker_count,
        config.channels.clone(),
    )?;

    match dispatcher.submit(new).await {
        SubmitResult::Dispatched { id, worker_id } => {
            println!("Dispatched: {id} → worker {worker_id}");
        }
        SubmitResult::AlreadyProcessed { id } => {
            println!("Already processed: {id}");
        }
        SubmitResult::NotDispatched { id, reason } => {
            println!("Dispatch attempted: {id} ({reason})");
        }
    }
    Ok(())
}

async fn cmd_result(config: Config, id: String) -> anyhow::Result<()> {
    let _guard = telemetry(&config, "supervisor")?;
    let db = connect(&config).await?;

    let value = ResultQuery::new(db).lookup(&TaskId(id)).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
