use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for console and file logging
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub file_prefix: String,
    pub max_files: usize,
    pub enable_console: bool,
    pub enable_file: bool,
    pub log_level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            file_prefix: "banking-dashboard.log".to_string(),
            max_files: 30, // Keep 30 days of logs
            enable_console: true,
            enable_file: false,
            log_level: Level::INFO,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: &str) -> Self {
        self.log_level = level.parse().unwrap_or(Level::INFO);
        self
    }
}

/// Install the global subscriber.
///
/// Keep the returned guards alive for the lifetime of the process; dropping
/// them stops the background file writer.
pub fn init_logging(config: LoggingConfig) -> Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.to_string().to_lowercase();
        EnvFilter::new(format!(
            "banking_dashboard={},dashboard_client={},tower_http={},reqwest=warn",
            level, level, level
        ))
    });

    let mut layers: Vec<Box<dyn Layer<_> + Send + Sync>> = Vec::new();

    if config.enable_console {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true);
        layers.push(Box::new(console_layer));
    }

    if config.enable_file {
        fs::create_dir_all(&config.log_dir)?;
        let appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);
        layers.push(Box::new(file_layer));
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    Ok(guards)
}

/// Remove the oldest `.log` files beyond `max_files`. Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &str, max_files: usize) -> Result<usize> {
    let log_path = Path::new(log_dir);
    if !log_path.exists() {
        return Ok(0);
    }

    let mut log_files: Vec<_> = fs::read_dir(log_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.contains(".log"))
                .unwrap_or(false)
        })
        .collect();

    // Oldest first
    log_files.sort_by_key(|entry| {
        entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    let mut removed = 0;
    if log_files.len() > max_files {
        let excess = log_files.len() - max_files;
        for entry in log_files.iter().take(excess) {
            if fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
    }

    Ok(removed)
}
