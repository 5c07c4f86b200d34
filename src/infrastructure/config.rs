use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Server process settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub seed_demo_data: bool,
    pub log_level: String,
    pub log_dir: String,
    pub log_to_file: bool,
}

impl AppConfig {
    /// Read settings from the environment (and `.env` if present).
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            host: env_or("BANKING_HOST", defaults.host),
            port: env_parse("BANKING_PORT", defaults.port),
            seed_demo_data: env_flag("BANKING_SEED_DEMO", defaults.seed_demo_data),
            log_level: env_or("LOG_LEVEL", defaults.log_level),
            log_dir: env_or("LOG_DIR", defaults.log_dir),
            log_to_file: env_flag("LOG_TO_FILE", defaults.log_to_file),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            seed_demo_data: true,
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            log_to_file: false,
        }
    }
}

/// Polling cadence shared by every watched resource.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    /// Ceiling for exponential backoff after consecutive poll failures.
    pub max_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            max_backoff: Duration::from_millis(60_000),
        }
    }
}

/// Dashboard client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub session_file: PathBuf,
    pub sync: SyncConfig,
    pub log_level: String,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            api_url: env_or("BANKING_API_URL", defaults.api_url),
            request_timeout: env_millis("BANKING_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            session_file: PathBuf::from(env_or(
                "BANKING_SESSION_FILE",
                defaults.session_file.to_string_lossy().into_owned(),
            )),
            sync: SyncConfig {
                poll_interval: env_millis("BANKING_POLL_INTERVAL_MS", defaults.sync.poll_interval),
                max_backoff: env_millis("BANKING_MAX_BACKOFF_MS", defaults.sync.max_backoff),
            },
            log_level: env_or("LOG_LEVEL", defaults.log_level),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".to_string(),
            request_timeout: Duration::from_millis(10_000),
            session_file: PathBuf::from(".banking-session.json"),
            sync: SyncConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// A millisecond setting. Zero is treated like garbage and falls back.
fn env_millis(key: &str, default: Duration) -> Duration {
    match env_parse::<u64>(key, 0) {
        0 => default,
        ms => Duration::from_millis(ms),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref().map(str::trim) {
        Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
        Some("false" | "0" | "no" | "FALSE" | "NO") => false,
        _ => default,
    }
}
