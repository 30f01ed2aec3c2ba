//! Environment variable configuration handling

use crate::config::{parse_api_version, parse_bool, AppConfig};
use crate::error::ConfigError;
use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "DOCKER_NETVIEW_";

/// Apply environment variable configuration over base configuration
pub fn apply_env_config(base_config: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_vars(base_config, |name| env::var(format!("{}{}", ENV_PREFIX, name)).ok())
}

/// Apply variables looked up by their unprefixed name
fn apply_vars<F>(mut base_config: AppConfig, var: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = var("LOG_LEVEL") {
        base_config.log_level = level;
    }

    if let Some(state_file) = var("STATE_FILE") {
        base_config.state_file = state_file;
    }

    if let Some(version) = var("DEFAULT_API_VERSION") {
        base_config.default_api_version = parse_api_version(&version)?;
    }

    if let Some(enabled) = var("CLUSTER_ENABLED") {
        base_config.cluster_enabled = parse_bool(&enabled)?;
    }

    Ok(base_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::version::ApiVersion;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_apply_env_vars() {
        let config = apply_vars(
            AppConfig::default(),
            lookup(&[
                ("LOG_LEVEL", "debug"),
                ("STATE_FILE", "/srv/networks.toml"),
                ("DEFAULT_API_VERSION", "1.24"),
                ("CLUSTER_ENABLED", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.state_file, "/srv/networks.toml");
        assert_eq!(config.default_api_version, ApiVersion::new(1, 24));
        assert!(!config.cluster_enabled);
    }

    #[test]
    fn test_apply_env_no_vars() {
        let base_config = AppConfig::default();
        let config = apply_vars(base_config.clone(), lookup(&[])).unwrap();

        // Should be unchanged from base config
        assert_eq!(config, base_config);
    }

    #[test]
    fn test_apply_env_invalid_values() {
        let result = apply_vars(AppConfig::default(), lookup(&[("CLUSTER_ENABLED", "sometimes")]));
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));

        let result = apply_vars(AppConfig::default(), lookup(&[("DEFAULT_API_VERSION", "1.x")]));
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }
}
