use std::path::PathBuf;

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Crate target used when no targets are configured
const DEFAULT_TARGET: &str = "sgl_function_call";

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for parser diagnostics (default: INFO)
    pub level: Level,
    /// Whether to use json format for logs (default: false)
    pub json_format: bool,
    /// Path to store log files. If None, logs will only go to stdout
    pub log_dir: Option<String>,
    /// Whether to colorize logs when output is a terminal (default: true)
    pub colorize: bool,
    /// Log file name prefix used if log_dir is specified (default: "sgl-function-call")
    pub log_file_name: String,
    /// Targets to enable at `level` (default: "sgl_function_call")
    pub log_targets: Option<Vec<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "sgl-function-call".to_string(),
            log_targets: Some(vec![DEFAULT_TARGET.to_string()]),
        }
    }
}

/// Guard that keeps the file appender worker thread alive
///
/// Keep it in scope for as long as events should reach the log file.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LogGuard {
    /// Whether a file writer was installed
    pub fn writes_to_file(&self) -> bool {
        self._file_guard.is_some()
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Filter directives for the configured targets, e.g. `a=debug,b=debug`
pub fn filter_directives(config: &LoggingConfig) -> String {
    let level = level_name(config.level);
    match &config.log_targets {
        Some(targets) if !targets.is_empty() => targets
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(","),
        _ => format!("{}={}", DEFAULT_TARGET, level),
    }
}

/// Initialize the logging system with the given configuration
///
/// `RUST_LOG` overrides the configured targets when set. Initialization
/// errors, including an already installed subscriber, are ignored.
///
/// # Returns
/// A LogGuard that must be kept alive while logging to a file
pub fn init_logging(config: LoggingConfig) -> LogGuard {
    // Forward `log` records to tracing; a second call is a no-op
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config)));

    // Standard timestamp format: YYYY-MM-DD HH:MM:SS
    let time_format = "%Y-%m-%d %H:%M:%S".to_string();
    let mut layers = Vec::new();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(time_format.clone()));
    let stdout_layer = if config.json_format {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    };
    layers.push(stdout_layer);

    let mut file_guard = None;
    let mut dir_error = None;

    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);
        match std::fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let file_appender =
                    RollingFileAppender::new(Rotation::DAILY, log_dir, &config.log_file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                file_guard = Some(guard);

                let file_layer = tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::new(time_format))
                    .with_writer(non_blocking);
                let file_layer = if config.json_format {
                    file_layer.json().flatten_event(true).boxed()
                } else {
                    file_layer.boxed()
                };
                layers.push(file_layer);
            }
            Err(e) => dir_error = Some((log_dir, e)),
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    if let Some((dir, e)) = dir_error {
        tracing::warn!(dir = %dir.display(), error = %e, "Failed to create log directory");
    }

    LogGuard {
        _file_guard: file_guard,
    }
}
