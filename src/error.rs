//! Centralized error types and handling

use std::fmt;
use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State file error: {0}")]
    State(#[from] StateError),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a [`NetworkError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParameter,
    NotFound,
    Conflict,
    Ambiguous,
    Upstream,
    Cancelled,
}

/// What an ambiguous lookup was matching on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBasis {
    Name,
    IdPrefix,
}

impl fmt::Display for MatchBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchBasis::Name => f.write_str("name"),
            MatchBasis::IdPrefix => f.write_str("ID prefix"),
        }
    }
}

/// Errors produced by network lookups and mutations.
///
/// Backends report failures with the same type so that the core can pass
/// them through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("network {0} not found")]
    NotFound(String),

    #[error("network with name {0} already exists")]
    Conflict(String),

    #[error("network {term} is ambiguous ({count} matches found based on {basis})")]
    Ambiguous {
        term: String,
        count: usize,
        basis: MatchBasis,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl NetworkError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        NetworkError::InvalidParameter(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        NetworkError::Upstream(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            NetworkError::NotFound(_) => ErrorKind::NotFound,
            NetworkError::Conflict(_) => ErrorKind::Conflict,
            NetworkError::Ambiguous { .. } => ErrorKind::Ambiguous,
            NetworkError::Upstream(_) => ErrorKind::Upstream,
            NetworkError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Errors loading or saving the network state file
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid state file {path}: {message}")]
    InvalidFormat { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_names_basis() {
        let err = NetworkError::Ambiguous {
            term: "web".to_string(),
            count: 2,
            basis: MatchBasis::Name,
        };
        assert_eq!(
            err.to_string(),
            "network web is ambiguous (2 matches found based on name)"
        );
        assert_eq!(err.kind(), ErrorKind::Ambiguous);

        let err = NetworkError::Ambiguous {
            term: "ab".to_string(),
            count: 3,
            basis: MatchBasis::IdPrefix,
        };
        assert_eq!(
            err.to_string(),
            "network ab is ambiguous (3 matches found based on ID prefix)"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            NetworkError::NotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            NetworkError::Conflict("x".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            NetworkError::invalid_parameter("bad").kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(NetworkError::upstream("boom").kind(), ErrorKind::Upstream);
        assert_eq!(NetworkError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_upstream_is_verbatim() {
        let err = NetworkError::upstream("driver failed: no such plugin");
        assert_eq!(err.to_string(), "driver failed: no such plugin");
    }
}
