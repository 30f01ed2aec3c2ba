//! Decoding of request parameters and bodies

use serde::de::DeserializeOwned;

use crate::backend::{SCOPE_GLOBAL, SCOPE_LOCAL, SCOPE_SWARM};
use crate::error::NetworkError;
use crate::network::{NetworkConnect, NetworkCreateRequest, NetworkDisconnect};

/// Query parameters of a single-network lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectOptions {
    pub verbose: bool,
    pub scope: String,
}

impl InspectOptions {
    /// Options with a checked scope; no scope matches every network
    pub fn new(verbose: bool, scope: Option<&str>) -> Result<Self, NetworkError> {
        let scope = scope.unwrap_or_default();
        if !scope.is_empty() && ![SCOPE_LOCAL, SCOPE_SWARM, SCOPE_GLOBAL].contains(&scope) {
            return Err(NetworkError::invalid_parameter(format!(
                "invalid scope: {}",
                scope
            )));
        }

        Ok(Self {
            verbose,
            scope: scope.to_string(),
        })
    }

    pub fn from_query(verbose: Option<&str>, scope: Option<&str>) -> Result<Self, NetworkError> {
        let verbose = match verbose {
            Some(v) if !v.is_empty() => parse_bool(v).ok_or_else(|| {
                NetworkError::invalid_parameter(format!("invalid value for verbose: {}", v))
            })?,
            _ => false,
        };

        Self::new(verbose, scope)
    }
}

/// Boolean spellings accepted in query strings
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, NetworkError> {
    serde_json::from_str(body)
        .map_err(|e| NetworkError::invalid_parameter(format!("malformed request body: {}", e)))
}

impl NetworkCreateRequest {
    pub fn from_json(body: &str) -> Result<Self, NetworkError> {
        let request: Self = decode(body)?;
        if request.name.trim().is_empty() {
            return Err(NetworkError::invalid_parameter("network name is required"));
        }
        Ok(request)
    }
}

impl NetworkConnect {
    pub fn from_json(body: &str) -> Result<Self, NetworkError> {
        decode(body)
    }
}

impl NetworkDisconnect {
    pub fn from_json(body: &str) -> Result<Self, NetworkError> {
        decode(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_inspect_options_defaults() {
        let options = InspectOptions::from_query(None, None).unwrap();
        assert!(!options.verbose);
        assert!(options.scope.is_empty());

        let options = InspectOptions::from_query(Some(""), Some("")).unwrap();
        assert_eq!(options, InspectOptions::default());
    }

    #[test]
    fn test_inspect_options_parses_values() {
        let options = InspectOptions::from_query(Some("1"), Some("swarm")).unwrap();
        assert!(options.verbose);
        assert_eq!(options.scope, "swarm");

        let options = InspectOptions::from_query(Some("False"), Some("local")).unwrap();
        assert!(!options.verbose);
    }

    #[test]
    fn test_inspect_options_rejects_bad_values() {
        let err = InspectOptions::from_query(Some("yes"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(err.to_string().contains("verbose"));

        let err = InspectOptions::from_query(None, Some("planet")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_inspect_options_new_checks_scope() {
        let options = InspectOptions::new(true, Some("global")).unwrap();
        assert!(options.verbose);
        assert_eq!(options.scope, "global");

        assert!(InspectOptions::new(false, None).unwrap().scope.is_empty());
        let err = InspectOptions::new(true, Some("cluster")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_create_request_from_json() {
        let request = NetworkCreateRequest::from_json(
            r#"{"Name":"web","CheckDuplicate":true,"Driver":"bridge",
                "IPAM":{"Config":[{"Subnet":"10.5.0.0/16"}]},"Labels":{"tier":"front"}}"#,
        )
        .unwrap();
        assert_eq!(request.name, "web");
        assert!(request.check_duplicate);
        assert_eq!(request.ipam.unwrap().config[0].subnet, "10.5.0.0/16");
        assert_eq!(request.labels["tier"], "front");
    }

    #[test]
    fn test_create_request_requires_name() {
        let err = NetworkCreateRequest::from_json(r#"{"Driver":"bridge"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let err = NetworkCreateRequest::from_json("{").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_connect_and_disconnect_bodies() {
        let connect = NetworkConnect::from_json(
            r#"{"Container":"c1","EndpointConfig":{"Aliases":["api"],"IPAMConfig":{"IPv4Address":"10.0.0.9"}}}"#,
        )
        .unwrap();
        assert_eq!(connect.container, "c1");
        let config = connect.endpoint_config.unwrap();
        assert_eq!(config.aliases, vec!["api"]);
        assert_eq!(config.ipam_config.unwrap().ipv4_address, "10.0.0.9");

        let disconnect =
            NetworkDisconnect::from_json(r#"{"Container":"c1","Force":true}"#).unwrap();
        assert!(disconnect.force);
    }
}
