//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux/macOS: `~/.config/genflow/config.toml`
//! - Windows: `%APPDATA%/genflow/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `GENFLOW_TOKENS`: Comma-separated session tokens
//! - `GENFLOW_BASE_URL`: Service base URL
//! - `GENFLOW_TIMEOUT`: Per-request timeout in seconds
//! - `GENFLOW_POLL_INTERVAL_MS`: Delay between status queries
//! - `GENFLOW_FORMAT`: Output format (human, json)
//! - `GENFLOW_PRETTY`: Pretty-print JSON output (1, true, yes)
//! - `GENFLOW_VERBOSE`: Debug-level logging (1, true, yes); see `core::logging`
//! - `GENFLOW_CONFIG`: Override config file path

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cli::args::{Cli, OutputFormat};
use crate::core::catalog::{ModelCatalog, ModelTableOverride};
use crate::core::http::{DEFAULT_ASSISTANT_ID, DEFAULT_BASE_URL, ServiceEndpoint};
use crate::core::logging::{LogFormat, LogLevel};
use crate::error::{GenError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable for comma-separated session tokens.
pub const ENV_TOKENS: &str = "GENFLOW_TOKENS";
/// Environment variable for the service base URL.
pub const ENV_BASE_URL: &str = "GENFLOW_BASE_URL";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "GENFLOW_TIMEOUT";
/// Environment variable for the poll interval in milliseconds.
pub const ENV_POLL_INTERVAL: &str = "GENFLOW_POLL_INTERVAL_MS";
/// Environment variable for output format.
pub const ENV_FORMAT: &str = "GENFLOW_FORMAT";
/// Environment variable for pretty JSON output.
pub const ENV_PRETTY: &str = "GENFLOW_PRETTY";
/// Environment variable for verbose output.
pub const ENV_VERBOSE: &str = "GENFLOW_VERBOSE";
/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "GENFLOW_CONFIG";

const MAX_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Session tokens forming the credential pool.
    pub tokens: Vec<String>,
    /// Service connection settings.
    pub endpoint: ServiceEndpoint,
    /// Delay between status queries.
    pub poll_interval: Duration,
    /// Per-kind model tables.
    pub catalog: ModelCatalog,
    /// Output format.
    pub format: OutputFormat,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub tokens: ConfigSource,
    pub base_url: ConfigSource,
    pub timeout: ConfigSource,
    pub poll_interval: ConfigSource,
    pub format: ConfigSource,
    pub pretty: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI args, environment variables, and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - Any resolved value is invalid (e.g., zero timeout)
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config = Config::load_effective()?;
        Self::resolve_from(cli, &config, |key| std::env::var(key).ok())
    }

    /// Resolve against an explicit config and environment lookup.
    ///
    /// # Errors
    ///
    /// See [`ResolvedConfig::resolve`].
    pub fn resolve_from<E>(cli: &Cli, config: &Config, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        config.validate()?;
        let mut sources = ConfigSources::default();

        let tokens = Self::resolve_tokens(cli, config, &env, &mut sources.tokens);
        let base_url = Self::resolve_base_url(cli, config, &env, &mut sources.base_url);
        let timeout = Self::resolve_timeout(cli, config, &env, &mut sources.timeout)?;
        let poll_interval =
            Self::resolve_poll_interval(config, &env, &mut sources.poll_interval)?;
        let format = Self::resolve_format(cli, config, &env, &mut sources.format)?;
        let pretty = Self::resolve_pretty(cli, config, &env, &mut sources.pretty);

        let endpoint = ServiceEndpoint {
            base_url,
            assistant_id: config.service.assistant_id.unwrap_or(DEFAULT_ASSISTANT_ID),
            region: config
                .service
                .region
                .clone()
                .unwrap_or_else(|| ServiceEndpoint::default().region),
            app_version: config
                .service
                .app_version
                .clone()
                .unwrap_or_else(|| ServiceEndpoint::default().app_version),
            timeout,
        };

        Ok(Self {
            tokens,
            endpoint,
            poll_interval,
            catalog: config.catalog()?,
            format,
            pretty,
            sources,
        })
    }

    fn resolve_tokens<E>(
        cli: &Cli,
        config: &Config,
        env: &E,
        source: &mut ConfigSource,
    ) -> Vec<String>
    where
        E: Fn(&str) -> Option<String>,
    {
        let clean = |tokens: Vec<String>| -> Vec<String> {
            tokens
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        };

        // 1. CLI --token
        let from_cli = clean(cli.tokens.clone());
        if !from_cli.is_empty() {
            *source = ConfigSource::Cli;
            return from_cli;
        }

        // 2. Environment variable
        if let Some(value) = env(ENV_TOKENS) {
            let from_env = clean(value.split(',').map(str::to_string).collect());
            if !from_env.is_empty() {
                *source = ConfigSource::Env;
                return from_env;
            }
        }

        // 3. Config file
        let from_file = clean(config.service.tokens.clone());
        if !from_file.is_empty() {
            *source = ConfigSource::ConfigFile;
            return from_file;
        }

        // 4. Default: none
        *source = ConfigSource::Default;
        Vec::new()
    }

    fn resolve_base_url<E>(
        cli: &Cli,
        config: &Config,
        env: &E,
        source: &mut ConfigSource,
    ) -> String
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some(url) = &cli.base_url {
            *source = ConfigSource::Cli;
            return url.clone();
        }
        if let Some(url) = env(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            *source = ConfigSource::Env;
            return url;
        }
        if let Some(url) = &config.service.base_url {
            *source = ConfigSource::ConfigFile;
            return url.clone();
        }
        *source = ConfigSource::Default;
        DEFAULT_BASE_URL.to_string()
    }

    fn resolve_timeout<E>(
        cli: &Cli,
        config: &Config,
        env: &E,
        source: &mut ConfigSource,
    ) -> Result<Duration>
    where
        E: Fn(&str) -> Option<String>,
    {
        let seconds = if let Some(timeout) = cli.timeout {
            *source = ConfigSource::Cli;
            timeout
        } else if let Some(timeout) = env(ENV_TIMEOUT).and_then(|v| v.trim().parse::<u64>().ok())
        {
            *source = ConfigSource::Env;
            timeout
        } else if let Some(timeout) = config.general.timeout_seconds {
            *source = ConfigSource::ConfigFile;
            timeout
        } else {
            *source = ConfigSource::Default;
            DEFAULT_TIMEOUT_SECONDS
        };
        validate_timeout(seconds)?;
        Ok(Duration::from_secs(seconds))
    }

    fn resolve_poll_interval<E>(
        config: &Config,
        env: &E,
        source: &mut ConfigSource,
    ) -> Result<Duration>
    where
        E: Fn(&str) -> Option<String>,
    {
        let millis = if let Some(ms) =
            env(ENV_POLL_INTERVAL).and_then(|v| v.trim().parse::<u64>().ok())
        {
            *source = ConfigSource::Env;
            ms
        } else if let Some(ms) = config.general.poll_interval_ms {
            *source = ConfigSource::ConfigFile;
            ms
        } else {
            *source = ConfigSource::Default;
            DEFAULT_POLL_INTERVAL_MS
        };
        if millis == 0 {
            return Err(GenError::Config(
                "Poll interval must be greater than 0 ms".to_string(),
            ));
        }
        Ok(Duration::from_millis(millis))
    }

    fn resolve_format<E>(
        cli: &Cli,
        config: &Config,
        env: &E,
        source: &mut ConfigSource,
    ) -> Result<OutputFormat>
    where
        E: Fn(&str) -> Option<String>,
    {
        // 1. CLI --json flag (shorthand)
        if cli.json {
            *source = ConfigSource::Cli;
            return Ok(OutputFormat::Json);
        }

        // 2. Environment variable; clap's default_value hides whether
        //    --format human was passed explicitly.
        if let Some(format_env) = env(ENV_FORMAT) {
            *source = ConfigSource::Env;
            return Self::parse_format(&format_env);
        }

        if cli.format != OutputFormat::Human {
            *source = ConfigSource::Cli;
            return Ok(cli.format);
        }

        // 3. Config file
        if let Some(ref format_str) = config.output.format {
            *source = ConfigSource::ConfigFile;
            return Self::parse_format(format_str);
        }

        *source = ConfigSource::Default;
        Ok(OutputFormat::Human)
    }

    /// Parse a format string into `OutputFormat`.
    fn parse_format(s: &str) -> Result<OutputFormat> {
        match s.trim().to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            _ => Err(GenError::Config(format!(
                "Invalid format '{s}'. Valid formats: human, json"
            ))),
        }
    }

    fn resolve_pretty<E>(cli: &Cli, config: &Config, env: &E, source: &mut ConfigSource) -> bool
    where
        E: Fn(&str) -> Option<String>,
    {
        if cli.pretty {
            *source = ConfigSource::Cli;
            return true;
        }
        if is_truthy(env(ENV_PRETTY).as_deref()) {
            *source = ConfigSource::Env;
            return true;
        }
        if config.output.pretty {
            *source = ConfigSource::ConfigFile;
            return true;
        }
        *source = ConfigSource::Default;
        false
    }
}

/// Check if an environment value is truthy.
pub(crate) fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn validate_timeout(seconds: u64) -> Result<()> {
    if seconds == 0 || seconds > MAX_TIMEOUT_SECONDS {
        return Err(GenError::Config(format!(
            "Timeout must be between 1 and {MAX_TIMEOUT_SECONDS} seconds"
        )));
    }
    Ok(())
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Remote service settings.
    pub service: ServiceConfig,
    /// Output settings.
    pub output: OutputConfig,
    /// Model table overlays.
    pub models: ModelsConfig,
}

/// General application settings. Unset values fall back to built-in
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: Option<u64>,
    /// Delay between status queries in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Log level when neither flags nor env set one (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Log format when neither flags nor env set one (human, json, compact).
    pub log_format: Option<String>,
}

/// Remote service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    pub assistant_id: Option<u32>,
    pub region: Option<String>,
    pub app_version: Option<String>,
    /// Session tokens, one per account.
    pub tokens: Vec<String>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (human, json).
    pub format: Option<String>,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
}

/// Per-kind model table overlays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub image: ModelTableOverride,
    pub reference: ModelTableOverride,
    pub video: ModelTableOverride,
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| GenError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load the config file named by `GENFLOW_CONFIG`, else the default path.
    ///
    /// # Errors
    /// Returns error only if the file exists but is invalid.
    pub fn load_effective() -> Result<Self> {
        match std::env::var(ENV_CONFIG) {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => Self::load(),
        }
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Built-in model catalog overlaid with this file's `[models]` tables.
    ///
    /// # Errors
    /// Returns a configuration error if a resulting default is not in its table.
    pub fn catalog(&self) -> Result<ModelCatalog> {
        let ModelCatalog {
            mut image,
            mut reference,
            mut video,
        } = ModelCatalog::default();
        image.merge(self.models.image.clone());
        reference.merge(self.models.reference.clone());
        video.merge(self.models.video.clone());
        ModelCatalog::new(image, reference, video)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns a configuration error for an out-of-range timeout, a zero poll
    /// interval, an unknown output or log format, an unknown log level, or an
    /// invalid model table.
    pub fn validate(&self) -> Result<()> {
        if let Some(seconds) = self.general.timeout_seconds {
            validate_timeout(seconds)?;
        }

        if self.general.poll_interval_ms == Some(0) {
            return Err(GenError::Config(
                "Poll interval must be greater than 0 ms".to_string(),
            ));
        }

        if let Some(level) = &self.general.log_level {
            level.parse::<LogLevel>().map_err(GenError::Config)?;
        }
        if let Some(format) = &self.general.log_format {
            format.parse::<LogFormat>().map_err(GenError::Config)?;
        }

        if let Some(format) = &self.output.format {
            if !["human", "json"].contains(&format.as_str()) {
                return Err(GenError::Config(format!(
                    "Invalid format \"{format}\". Valid formats: human, json"
                )));
            }
        }

        self.catalog().map(|_| ())
    }
}
