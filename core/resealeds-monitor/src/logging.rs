//! Tracing setup for the `resealeds` binary.
//!
//! Logs go to a daily rolling file under the log directory so rendered
//! output on stdout stays clean. If the directory cannot be created, logs
//! fall back to stderr.

use std::env;

use fs_err as fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "RESEALEDS_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "resealeds.log";

/// Installs the global subscriber. Keep the returned guard alive for the
/// life of the process, or buffered lines are lost on exit.
pub fn init() -> Option<WorkerGuard> {
    let filter = build_filter();

    let Some(log_dir) = resealeds_core::get_log_dir() else {
        init_stderr(filter);
        return None;
    };

    if let Err(err) = fs::create_dir_all(&log_dir) {
        init_stderr(filter);
        tracing::warn!(error = %err, "Log directory unavailable; logging to stderr");
        return None;
    }

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    if installed.is_err() {
        return None;
    }
    Some(guard)
}

fn init_stderr(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter() -> EnvFilter {
    if debug_forced(env::var(DEBUG_ENV).ok().as_deref()) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn debug_forced(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}
