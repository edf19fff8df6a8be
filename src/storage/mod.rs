//! Storage for configuration.

pub mod config;
pub mod paths;

pub use config::{
    Config, ConfigSource, ConfigSources, ENV_BASE_URL, ENV_CONFIG, ENV_FORMAT, ENV_POLL_INTERVAL,
    ENV_PRETTY, ENV_TIMEOUT, ENV_TOKENS, ENV_VERBOSE, GeneralConfig, ResolvedConfig,
};
pub use paths::AppPaths;
