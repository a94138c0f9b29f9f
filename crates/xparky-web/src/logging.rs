//! Tracing setup for the dashboard server.
//!
//! - `RUST_LOG`: filter (default `info`)
//! - `LOG_FORMAT`: `text` (default) or `json` for stderr output
//! - `LOG_DIR`: when set, also write JSON logs to a daily rolling file there

use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Rolling log file name prefix inside LOG_DIR
const LOG_FILE_PREFIX: &str = "xparky.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Accepts "json", or "text"/"pretty". Anything else is text.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let format = std::env::var("LOG_FORMAT")
            .map(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_dir = std::env::var("LOG_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            format,
            level,
            log_dir,
        }
    }
}

/// Install the global subscriber. Logs go to stderr so `--dump-leaderboard`
/// output on stdout stays clean. Keep the returned guard alive for the life
/// of the process or buffered file logs are lost.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let json = config.format == LogFormat::Json;
    let stderr_json = json.then(|| fmt::layer().json().with_writer(io::stderr));
    let stderr_text = (!json).then(|| fmt::layer().with_writer(io::stderr));

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_json)
        .with(stderr_text)
        .with(file_layer)
        .init();

    guard
}
