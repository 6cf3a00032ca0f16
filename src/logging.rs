//! Tracing setup for the ingestion service.
//!
//! Logs go to stdout and to a file. `DOCSIFT_LOG_FILE` selects the file to append to; without
//! it the service writes `logs/docsift.log`. File output goes through a non-blocking writer whose
//! guard lives for the whole process.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "DOCSIFT_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "docsift.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. `RUST_LOG` controls filtering and defaults to `info`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact());

    match file_writer() {
        Some(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .compact(),
            )
            .init(),
        None => registry.init(),
    }
}

fn file_writer() -> Option<NonBlocking> {
    let (writer, guard) = match std::env::var(LOG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| eprintln!("Failed to open log file {path}: {err}"))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        _ => {
            std::fs::create_dir_all(DEFAULT_LOG_DIR)
                .map_err(|err| eprintln!("Failed to create {DEFAULT_LOG_DIR} directory: {err}"))
                .ok()?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                DEFAULT_LOG_DIR,
                DEFAULT_LOG_NAME,
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
