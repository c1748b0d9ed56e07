//! Logging setup for the command line tool.
//!
//! Log lines go to stderr so stdout carries nothing but event JSON.

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

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DEFAULT_LOG_TARGET: &str = "sgl_tool_fence";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json_format: bool,
    pub log_dir: Option<String>,
    pub colorize: bool,
    pub log_file_name: String,
    pub log_targets: Option<Vec<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "sgl-tool-fence".to_string(),
            log_targets: Some(vec![DEFAULT_LOG_TARGET.to_string()]),
        }
    }
}

/// Keeps the file writer thread alive; drop it last.
#[allow(dead_code)]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn parse_level(level: &str) -> Option<Level> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

const fn level_to_str(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

fn build_filter_string(targets: &[String], level: &str) -> String {
    targets
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

fn filter_for(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level_to_str(config.level);
        let filter = match &config.log_targets {
            Some(targets) if !targets.is_empty() => build_filter_string(targets, level),
            _ => format!("{}={}", DEFAULT_LOG_TARGET, level),
        };
        EnvFilter::new(filter)
    })
}

pub fn init_logging(config: LoggingConfig) -> LogGuard {
    let _ = LogTracer::init();

    let mut layers = Vec::with_capacity(2);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.colorize)
        .with_target(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));

    layers.push(if config.json_format {
        stderr_layer.json().flatten_event(true).boxed()
    } else {
        stderr_layer.boxed()
    });

    let mut file_guard = None;

    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);

        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory: {}", e);
        } else {
            let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, &config.log_file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
                .with_writer(non_blocking);

            layers.push(if config.json_format {
                file_layer.json().flatten_event(true).boxed()
            } else {
                file_layer.boxed()
            });
        }
    }

    let _ = tracing_subscriber::registry()
        .with(filter_for(&config))
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}
