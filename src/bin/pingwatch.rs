use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pingwatch::config::AppConfig;
use pingwatch::db::{
    self,
    services::{SeaOrmStatisticsStore, SeaOrmTargetStore, ensure_statistics_schema},
};
use pingwatch::notifications::{FailureNotifier, telegram::TelegramNotifier};
use pingwatch::scheduler::{
    Flusher, Prober, ResultBuffer, SchedulerController, change_event_channel,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (falls back to CONFIG_PATH)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the probe scheduler (default)
    Run,
    /// Print recorded probe statistics for one owner
    Stats {
        #[arg(long)]
        owner: i64,
        /// Restrict the report to one URL and include its error breakdown
        #[arg(long)]
        url: Option<String>,
    },
}

fn init_logging(config: &AppConfig) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(&config.log_dir, "pingwatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // RUST_LOG wins; otherwise the profile decides.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.environment.default_log_filter()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn connect_databases(config: &AppConfig) -> Result<(DatabaseConnection, DatabaseConnection), BoxError> {
    let targets_db = db::connect(&config.database_url, config.max_db_connections).await?;
    let statistics_db = if config.statistics_database_url == config.database_url {
        targets_db.clone()
    } else {
        db::connect(&config.statistics_database_url, config.max_db_connections).await?
    };
    Ok((targets_db, statistics_db))
}

async fn run_scheduler(config: AppConfig) -> Result<(), BoxError> {
    let (targets_db, statistics_db) = connect_databases(&config).await?;
    ensure_statistics_schema(&statistics_db).await?;

    let notifier: Option<Arc<dyn FailureNotifier>> = match &config.telegram_bot_token {
        Some(token) => Some(Arc::new(TelegramNotifier::new(token.clone())?)),
        None => {
            warn!("TELEGRAM_BOT_TOKEN is not set, failure notices are disabled.");
            None
        }
    };

    let settings = config.scheduler_settings();
    let prober = Arc::new(Prober::new(notifier)?);
    let buffer = Arc::new(ResultBuffer::new(settings.buffer_capacity));

    let flusher = Flusher::new(
        buffer.clone(),
        Arc::new(SeaOrmStatisticsStore::new(statistics_db)),
        settings.flush_interval,
    )
    .spawn();

    let mut controller = SchedulerController::new(
        Arc::new(SeaOrmTargetStore::new(targets_db)),
        prober,
        buffer,
        settings.clone(),
    );
    if let Err(e) = controller.start().await {
        error!(error = %e, "Failed to start probe scheduler.");
        flusher.shutdown().await;
        return Err(e.into());
    }

    // The command front-end publishes through `change_events`; it stays open
    // for as long as the scheduler runs.
    let (change_events, change_rx) = change_event_channel(settings.change_event_capacity);
    let report = controller.run(change_rx, flusher, shutdown_signal()).await;
    drop(change_events);

    info!(?report, "pingwatch stopped.");
    Ok(())
}

async fn print_statistics(config: &AppConfig, owner: i64, url: Option<&str>) -> Result<(), BoxError> {
    let (_, statistics_db) = connect_databases(config).await?;
    let store = SeaOrmStatisticsStore::new(statistics_db);

    let rows: Vec<_> = match url {
        Some(url) => store.statistics_by_url(owner, url).await?.into_iter().collect(),
        None => store.statistics_by_owner(owner).await?,
    };
    if rows.is_empty() {
        println!("No probes recorded for owner {owner}.");
        return Ok(());
    }

    let fmt_secs = |v: Option<f64>| v.map(|s| format!("{s:.3}s")).unwrap_or_else(|| "-".to_string());
    for row in &rows {
        println!(
            "{}\n  probes: {}  ok: {}  cancelled: {}  min: {}  avg: {}  max: {}",
            row.url,
            row.count_ping,
            row.correct_count,
            row.cancel_count,
            fmt_secs(row.min_connection_time),
            fmt_secs(row.avg_connection_time),
            fmt_secs(row.max_connection_time),
        );
    }

    if let Some(url) = url {
        for error in store.error_breakdown(owner, url).await? {
            println!("  {:>6} x {}", error.count, error.text);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let config_path = args.config.or_else(|| env::var("CONFIG_PATH").ok());
    let config = AppConfig::load(config_path.as_deref())?;

    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting pingwatch.");

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_scheduler(config).await,
        Command::Stats { owner, url } => print_statistics(&config, owner, url.as_deref()).await,
    }
}
