//! avatar CLI: operator interface to the avatar background workers.

use avatar_core::config::{Config, DrainSchedule};
use avatar_core::db::Db;
use avatar_core::drain::drain_with_timeout;
use avatar_core::health::HealthMonitor;
use avatar_core::http::{AppState, build_router, serve};
use avatar_core::model::work::{SubjectId, WorkKind};
use avatar_core::schedule::DrainScheduler;
use avatar_core::store::WorkStore;
use avatar_core::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "avatar", about = "Avatar background queue workers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP trigger surface, scheduled drains, and health polling
    Serve {
        /// TOML drain schedule; without it drains only run over HTTP
        #[arg(long)]
        schedule: Option<PathBuf>,
        /// Seconds between store health probes
        #[arg(long, default_value_t = 15)]
        health_interval: u64,
    },
    /// Drain one queue now and print the report
    Drain {
        /// Work kind: thumbnail-count or serve-time
        kind: WorkKind,
        /// Give up after this many seconds (defaults to DRAIN_TIMEOUT_SECS)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Queue a unit of work for a subject
    Enqueue {
        /// Work kind: thumbnail-count or serve-time
        kind: WorkKind,
        /// Subject (avatar) identifier
        subject: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve {
            schedule,
            health_interval,
        } => cmd_serve(config, schedule, health_interval).await,
        Command::Drain { kind, timeout } => cmd_drain(config, kind, timeout).await,
        Command::Enqueue { kind, subject } => {
            let db = connect(&config).await?;
            let msg_id = db.enqueue(kind, &SubjectId::new(subject)).await?;
            println!("Queued: {kind} (msg {msg_id})");
            Ok(())
        }
    }
}

async fn connect(config: &Config) -> anyhow::Result<Db> {
    let db = Db::connect(config.database_url.expose_secret())
        .await?
        .with_visibility_timeout(config.visibility_timeout);
    db.migrate().await?;
    db.ensure_queues().await?;
    Ok(db)
}

fn telemetry(config: &Config) -> anyhow::Result<TelemetryGuard> {
    Ok(init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "avatar".to_string(),
        log_level: config.log_level.clone(),
    })?)
}

async fn cmd_serve(
    config: Config,
    schedule: Option<PathBuf>,
    health_interval: u64,
) -> anyhow::Result<()> {
    let _guard = telemetry(&config)?;

    let schedule = match schedule {
        Some(path) => DrainSchedule::load(&path)?,
        None => DrainSchedule::default(),
    };
    schedule.check_claim_window(config.visibility_timeout)?;
    let store: Arc<dyn WorkStore> = Arc::new(connect(&config).await?);

    let monitor = Arc::new(HealthMonitor::new(
        Arc::clone(&store),
        Duration::from_secs(health_interval),
    ));
    let scheduler = DrainScheduler::new(Arc::clone(&store), schedule);

    let state = Arc::new(AppState {
        store,
        drain_timeout: config.drain_timeout,
        health: monitor.subscribe(),
    });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    let health_task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run().await }
    });
    let schedule_task = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    serve(listener, build_router(state), async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;

    scheduler.shutdown();
    monitor.shutdown_handle().notify_one();
    schedule_task.await??;
    health_task.await?;
    Ok(())
}

async fn cmd_drain(config: Config, kind: WorkKind, timeout: Option<u64>) -> anyhow::Result<()> {
    let _guard = telemetry(&config)?;
    let timeout = timeout.map_or(config.drain_timeout, Duration::from_secs);
    config.check_drain_timeout("--timeout", timeout)?;
    let db = connect(&config).await?;

    let report = drain_with_timeout(&db, kind, timeout).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(error) = report.error {
        anyhow::bail!("drain stopped early: {error}");
    }
    Ok(())
}
