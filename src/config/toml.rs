//! TOML configuration file parsing

use crate::config::{parse_api_version, AppConfig};
use crate::error::ConfigError;
use serde::Deserialize;

/// TOML configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub state_file: Option<String>,
    pub default_api_version: Option<String>,
    pub cluster_enabled: Option<bool>,
    pub logging: Option<LoggingConfig>,
}

/// Logging configuration
#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl TomlConfig {
    /// Apply file values over base configuration
    pub fn apply_to_config(self, mut base_config: AppConfig) -> Result<AppConfig, ConfigError> {
        if let Some(state_file) = self.state_file {
            base_config.state_file = state_file;
        }

        if let Some(ref version) = self.default_api_version {
            base_config.default_api_version = parse_api_version(version)?;
        }

        if let Some(enabled) = self.cluster_enabled {
            base_config.cluster_enabled = enabled;
        }

        if let Some(level) = self.logging.and_then(|logging| logging.level) {
            base_config.log_level = level;
        }

        Ok(base_config)
    }
}

/// Load configuration from TOML file
pub fn load_toml_config(path: &str) -> Result<TomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_string(),
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
}

/// Commented template holding every option at its default value
pub fn default_config_toml() -> String {
    let defaults = AppConfig::default();
    format!(
        "# docker-netview configuration\n\
         # This is the default configuration with all available options\n\
         \n\
         # TOML file holding the local and cluster network records\n\
         state_file = \"{}\"\n\
         \n\
         # API version assumed when a request does not carry one\n\
         default_api_version = \"{}\"\n\
         \n\
         # Set to false on hosts that are not part of a swarm\n\
         cluster_enabled = {}\n\
         \n\
         [logging]\n\
         # Log level: trace, debug, info, warn, error\n\
         level = \"{}\"\n",
        defaults.state_file,
        defaults.default_api_version,
        defaults.cluster_enabled,
        defaults.log_level
    )
}

/// Print default configuration in TOML format
pub fn print_default_config() {
    print!("{}", default_config_toml());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::version::ApiVersion;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_toml_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
state_file = "/tmp/networks.toml"
default_api_version = "1.27"
cluster_enabled = false

[logging]
level = "debug"
"#
        )
        .unwrap();

        let toml_config = load_toml_config(file.path().to_str().unwrap()).unwrap();
        let config = toml_config.apply_to_config(AppConfig::default()).unwrap();

        assert_eq!(config.state_file, "/tmp/networks.toml");
        assert_eq!(config.default_api_version, ApiVersion::new(1, 27));
        assert!(!config.cluster_enabled);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_config: TomlConfig = toml::from_str("cluster_enabled = false").unwrap();
        let config = toml_config.apply_to_config(AppConfig::default()).unwrap();

        assert!(!config.cluster_enabled);
        assert_eq!(config.log_level, AppConfig::default().log_level);
        assert_eq!(config.state_file, AppConfig::default().state_file);
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "state_file = [").unwrap();
        let result = load_toml_config(file.path().to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));

        let toml_config: TomlConfig = toml::from_str("default_api_version = \"x.y\"").unwrap();
        assert!(toml_config.apply_to_config(AppConfig::default()).is_err());
    }

    #[test]
    fn test_default_template_parses_back_to_defaults() {
        let toml_config: TomlConfig = toml::from_str(&default_config_toml()).unwrap();
        let config = toml_config.apply_to_config(AppConfig::default()).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
