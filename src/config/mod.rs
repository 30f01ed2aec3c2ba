//! Configuration management module
//!
//! Handles loading configuration from multiple sources with proper precedence:
//! CLI arguments > environment variables > TOML files > defaults

use crate::error::ConfigError;
use crate::network::service::DEFAULT_API_VERSION;
use crate::network::version::ApiVersion;

pub mod cli;
pub mod env;
pub mod toml;

use self::cli::CliArgs;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    /// TOML file holding the local and cluster network records
    pub state_file: String,
    /// API version assumed for callers that do not send one
    pub default_api_version: ApiVersion,
    /// When false the cluster manager is treated as unreachable
    pub cluster_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            state_file: "/var/lib/docker-netview/networks.toml".to_string(),
            default_api_version: DEFAULT_API_VERSION,
            cluster_enabled: true,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Unknown log level '{}'. Expected one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.state_file.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "State file path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Build the effective configuration for a command line invocation
pub fn load_configuration(args: &CliArgs) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();

    if let Some(ref path) = args.config {
        config = toml::load_toml_config(path)?.apply_to_config(config)?;
    }
    config = env::apply_env_config(config)?;
    config = args.apply_to_config(config)?;

    config.validate()?;
    Ok(config)
}

pub(crate) fn parse_api_version(value: &str) -> Result<ApiVersion, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidFormat(format!("Invalid API version: '{}'", value)))
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFormat(format!(
            "Invalid boolean value: '{}'",
            value
        ))),
    }
}
