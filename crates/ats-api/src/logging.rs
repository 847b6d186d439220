//! Tracing subscriber setup.
//!
//! Environment variables:
//!   LOG_FORMAT - "json" or "text" (default: "text")
//!   LOG_FILE   - path to log file (optional, enables file logging)
//!   LOG_ANSI   - "true"/"false" override ANSI colors (auto-detected by default)
//!   RUST_LOG   - standard env filter (default: [`DEFAULT_FILTER`])

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "ats_api=debug,ats_core=debug,ats_db=info,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub json: bool,
    pub file: Option<String>,
    pub ansi: Option<bool>,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            json: std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false),
            file: std::env::var("LOG_FILE").ok().filter(|v| !v.is_empty()),
            ansi: std::env::var("LOG_ANSI").ok().map(|v| v == "true" || v == "1"),
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// stops the background file writer.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    match &config.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("ats-api.log");
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            if config.json {
                registry
                    .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                    .init();
            } else {
                // No ANSI in files unless asked for.
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(config.ansi.unwrap_or(false));
                registry.with(layer).init();
            }
            Some(guard)
        }
        None => {
            if config.json {
                registry.with(tracing_subscriber::fmt::layer().json()).init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = config.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            None
        }
    }
}
