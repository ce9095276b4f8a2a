use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "resonite-discord-rpc.log";
const LOG_RETENTION_DAYS: u64 = 7;

/// Filter used when `RUST_LOG` is not set.
///
/// Transport trace lines are always let through here, `TransportLogger` already
/// drops them unless debug mode is on at the time they are written.
fn default_directives(debug_mode: bool) -> String {
    let mut directives = String::from("info,discord_rpc::transport=debug");
    if debug_mode {
        directives.push_str(",resonite_discord_rpc=debug");
    }
    directives
}

/// Install console and daily-rolling file logging into `log_dir`.
///
/// Keep the returned guard alive, dropping it flushes and stops the file writer.
/// If the host already installed a global subscriber, that one is kept.
pub fn init_logging(log_dir: &Path, debug_mode: bool) -> WorkerGuard {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug_mode)));

    let console_layer = fmt::layer().with_target(true);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(file_writer);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: Logging already initialized: {}", e);
    }

    tracing::info!(
        "ResoniteDiscordRpc {} logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );

    let removed = cleanup_old_logs(log_dir, LOG_RETENTION_DAYS);
    if removed > 0 {
        tracing::debug!("Removed {} expired log file(s)", removed);
    }

    guard
}

pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ResoniteDiscordRpc")
        .join("logs")
}

/// Remove rotated log files older than `keep_days`, returns how many were removed
fn cleanup_old_logs(log_dir: &Path, keep_days: u64) -> usize {
    let cutoff = SystemTime::now() - Duration::from_secs(keep_days * 24 * 60 * 60);

    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read log directory for cleanup: {}", e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if name.starts_with(LOG_FILE_NAME) => name,
            _ => continue,
        };

        if filename == LOG_FILE_NAME {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(_) => continue,
        };

        if modified < cutoff {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove old log file {:?}: {}", path, e);
            } else {
                removed += 1;
            }
        }
    }

    removed
}
