//! Logging setup for bridge applications.
//!
//! The bridge crates only emit `tracing` events. Call [`init`] (or
//! [`init_test`] from test binaries) once to install a subscriber.

use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Environment variable names read by [`LogConfig::from_env`].
pub mod vars {
    pub const BRIDGE_LOG_LEVEL: &str = "BRIDGE_LOG_LEVEL";
    pub const BRIDGE_LOG_FORMAT: &str = "BRIDGE_LOG_FORMAT";
    pub const BRIDGE_LOG_FILE: &str = "BRIDGE_LOG_FILE";
    pub const BRIDGE_LOG_SOURCE: &str = "BRIDGE_LOG_SOURCE";
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Also append to this file.
    pub file_path: Option<PathBuf>,
    /// Include source location.
    pub source_location: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
            LogLevel::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            LogLevel::Info => tracing_subscriber::filter::LevelFilter::INFO,
            LogLevel::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            LogLevel::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        }
    }
}

impl LogLevel {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON structured format.
    Json,
}

impl LogFormat {
    /// Parse from string; unknown values fall back to `Pretty`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    ///
    /// `RUST_LOG` is consulted only when `BRIDGE_LOG_LEVEL` is unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let level = std::env::var(vars::BRIDGE_LOG_LEVEL).or_else(|_| std::env::var("RUST_LOG"));
        if let Some(level) = level.ok().as_deref().and_then(LogLevel::parse) {
            config.level = level;
        }

        if let Ok(format) = std::env::var(vars::BRIDGE_LOG_FORMAT) {
            config.format = LogFormat::parse(&format);
        }

        if let Ok(file_path) = std::env::var(vars::BRIDGE_LOG_FILE) {
            config.file_path = Some(PathBuf::from(file_path));
        }

        if let Ok(source_location) = std::env::var(vars::BRIDGE_LOG_SOURCE) {
            config.source_location = source_location.to_lowercase() == "true" || source_location == "1";
        }

        config
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn stderr_layer(config: &LogConfig) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    match config.format {
        LogFormat::Pretty => layer.with_ansi(true).boxed(),
        LogFormat::Compact => layer.compact().with_ansi(true).boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn file_layer(config: &LogConfig, file: std::fs::File) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    match config.format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Initialize logging with the given configuration.
///
/// `RUST_LOG` directives, when present, take precedence over `config.level`.
pub fn init(config: LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let mut layers = vec![stderr_layer(&config)];
    if let Some(file_path) = &config.file_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        layers.push(file_layer(&config, file));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LogError::InitError(e.to_string()))
}

/// Install a subscriber that writes through the libtest capture.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    #[error("failed to open log file: {0}")]
    FileError(#[from] io::Error),
}
