//! Diagnostic logging setup.
//!
//! Logs go to stderr (or a log file) so generation output on stdout stays
//! machine-readable. Credentials never appear in logs, only their
//! fingerprints.
//!
//! Level precedence (highest first): `--log-level`, `-v/--verbose`,
//! `GENFLOW_LOG`, `GENFLOW_VERBOSE`, `[general] log_level`, `error`.
//! Format precedence: `--json-output`, `GENFLOW_LOG_FORMAT`,
//! `[general] log_format`, human. `RUST_LOG` replaces the computed filter.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

use crate::cli::args::Cli;
use crate::storage::config::{ConfigSource, ENV_VERBOSE, GeneralConfig, is_truthy};

pub const ENV_LOG_LEVEL: &str = "GENFLOW_LOG";
pub const ENV_LOG_FORMAT: &str = "GENFLOW_LOG_FORMAT";
pub const ENV_LOG_FILE: &str = "GENFLOW_LOG_FILE";

/// Diagnostic log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event.
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!(
                "unknown log format '{other}' (expected human, json, compact)"
            )),
        }
    }
}

/// Minimum level of `genflow` events that are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    #[default]
    Error,
}

impl LogLevel {
    const fn directive(self) -> &'static str {
        match self {
            Self::Trace => "genflow=trace",
            Self::Debug => "genflow=debug",
            Self::Info => "genflow=info",
            Self::Warn => "genflow=warn",
            Self::Error => "genflow=error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" | "verbose" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "unknown log level '{other}' (expected error, warn, info, debug, trace)"
            )),
        }
    }
}

/// Resolved logging settings, with the origin of the level and format.
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    pub level: LogLevel,
    pub level_source: ConfigSource,
    pub format: LogFormat,
    pub format_source: ConfigSource,
    /// Events go here instead of stderr when set.
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Settings with a fixed level and format, writing to stderr.
    #[must_use]
    pub fn new(level: LogLevel, format: LogFormat) -> Self {
        Self {
            level,
            format,
            ..Self::default()
        }
    }

    /// Merge CLI flags, the environment, and the `[general]` config section.
    ///
    /// Unparseable values at one layer fall through to the next.
    pub fn resolve<E>(cli: &Cli, general: &GeneralConfig, env: E) -> Self
    where
        E: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let (level, level_source) = if let Some(level) =
            cli.log_level.as_deref().and_then(|v| v.parse().ok())
        {
            (level, ConfigSource::Cli)
        } else if cli.verbose {
            (LogLevel::Debug, ConfigSource::Cli)
        } else if let Some(level) = env_value(ENV_LOG_LEVEL).and_then(|v| v.parse().ok()) {
            (level, ConfigSource::Env)
        } else if is_truthy(env(ENV_VERBOSE).as_deref()) {
            (LogLevel::Debug, ConfigSource::Env)
        } else if let Some(level) = general.log_level.as_deref().and_then(|v| v.parse().ok()) {
            (level, ConfigSource::ConfigFile)
        } else {
            (LogLevel::default(), ConfigSource::Default)
        };

        let (format, format_source) = if cli.json_output {
            (LogFormat::Json, ConfigSource::Cli)
        } else if let Some(format) = env_value(ENV_LOG_FORMAT).and_then(|v| v.parse().ok()) {
            (format, ConfigSource::Env)
        } else if let Some(format) = general.log_format.as_deref().and_then(|v| v.parse().ok()) {
            (format, ConfigSource::ConfigFile)
        } else {
            (LogFormat::default(), ConfigSource::Default)
        };

        Self {
            level,
            level_source,
            format,
            format_source,
            file: env_value(ENV_LOG_FILE).map(|v| PathBuf::from(v.trim())),
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.directive()))
    }

    /// The log file when it can be opened for appending, else stderr.
    fn writer(&self) -> BoxMakeWriter {
        let file = self.file.as_ref().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        match file {
            Some(file) => BoxMakeWriter::new(file),
            None => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// Install the global subscriber. Only the first call in a process has any
/// effect.
pub fn init(settings: &LogSettings) {
    let writer = settings.writer();
    let layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(writer)
            .boxed(),
        LogFormat::Human => tracing_subscriber::fmt::layer()
            .with_target(false)
            .without_time()
            .with_writer(writer)
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(layer)
        .with(settings.filter())
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(
            level = ?settings.level,
            level_source = %settings.level_source,
            format = ?settings.format,
            format_source = %settings.format_source,
            "Logging initialised"
        );
    }
}
