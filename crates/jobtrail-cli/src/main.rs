//! jobtrail - track job applications from the terminal, online or offline.
//!
//! Changes go straight to the backend when it is reachable and are kept in
//! a local cache otherwise, to be reconciled on the next `online` or `sync`.

mod commands;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobtrail_core::{ApiClient, AutoSync, Config, ConnectivityMonitor, FileStorage, SyncManager};

use commands::{parse_args, Command, USAGE};

// ============================================================================
// Constants
// ============================================================================

/// Log file written inside the cache directory
const LOG_FILE: &str = "jobtrail.log";

const API_URL_ENV: &str = "JOBTRAIL_API_URL";
const API_TOKEN_ENV: &str = "JOBTRAIL_API_TOKEN";

/// Initialize the tracing subscriber, logging to a file in `log_dir`.
/// The returned guard flushes the writer when dropped.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load().context("Failed to load config")?;
    let cache_dir = config.cache_dir()?;
    let _log_guard = init_tracing(&cache_dir)?;
    info!(?command, "jobtrail starting");

    let base_url = std::env::var(API_URL_ENV)
        .unwrap_or_else(|_| config.api_base_url().to_string());
    let api = ApiClient::new(base_url)?;
    let api = match std::env::var(API_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => api.with_token(token),
        _ => {
            warn!("{} not set, sending unauthenticated requests", API_TOKEN_ENV);
            api
        }
    };

    let storage = FileStorage::new(cache_dir)?;
    let monitor = ConnectivityMonitor::new(!config.offline_mode);
    let manager = Arc::new(SyncManager::new(Arc::new(api), Box::new(storage), monitor));
    let auto_sync = AutoSync::start(Arc::clone(&manager));

    commands::run(command, &manager, auto_sync, &mut config).await?;

    info!("jobtrail finished");
    Ok(())
}
