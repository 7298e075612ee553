use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use courier_startup::init::DiagnosticsInit;
use courier_startup::messages::MessagesJobInit;
use courier_startup::{AppContext, InitSequence};

#[derive(Parser)]
#[command(name = "courierd", about = "Courier message-sync daemon")]
struct Args {
    /// Path to courier.toml (default: COURIER_CONFIG env, then ~/.courier/courier.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=info".into()),
        )
        .init();

    let args = Args::parse();

    // load config: explicit path > COURIER_CONFIG env > ~/.courier/courier.toml
    let config_path = args.config.or_else(|| std::env::var("COURIER_CONFIG").ok());
    let config =
        courier_core::CourierConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            courier_core::CourierConfig::default()
        });

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = open_db(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    courier_jobs::db::init_db(&db)?;
    info!("database migrations complete");

    // registry and engine get separate connections for thread safety
    let registry = courier_jobs::JobRegistry::new(open_db(&db_path)?)?;

    // Fired-job channel: JobEngine → sync drain task
    let (fired_tx, mut fired_rx) = tokio::sync::mpsc::channel::<courier_jobs::FiredJob>(256);
    let engine = courier_jobs::JobEngine::new(open_db(&db_path)?, Some(fired_tx))?
        .with_poll_secs(config.runtime.poll_secs);

    // This is the once-per-process-start lifecycle hook: the sequence runs
    // the messages-job guard before anything else can tear the process down.
    let ctx = AppContext::new(config, Arc::new(registry));
    let reports = InitSequence::new()
        .register(Box::new(DiagnosticsInit))
        .register(Box::new(MessagesJobInit))
        .run_all(&ctx);
    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    if failed > 0 {
        warn!(failed, total = reports.len(), "startup finished with failures");
    }

    // Drain task: acknowledge fires. The sync work itself lives elsewhere;
    // this process only guarantees the schedule.
    tokio::spawn(async move {
        while let Some(fired) = fired_rx.recv().await {
            info!(
                run_id = %fired.run_id,
                job_id = %fired.job_id,
                run = fired.run_count,
                "job fired"
            );
        }
    });

    // spawn engine loop in background
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move { engine.run(shutdown_rx).await });

    info!("courierd running — ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    // signal engine to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Open a connection with a busy timeout, so a registry write racing an
/// engine tick waits instead of surfacing SQLITE_BUSY.
fn open_db(path: &str) -> rusqlite::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
