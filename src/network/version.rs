//! Negotiated Engine API version

use std::fmt;
use std::str::FromStr;

use crate::error::NetworkError;

/// A dotted API version such as `1.41`.
///
/// Components compare in order; absent ones count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    /// First version whose list responses omit attached containers
    pub const LIGHTWEIGHT_LIST: ApiVersion = ApiVersion::new(1, 28);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: 0,
        }
    }

    pub fn is_older_than(&self, other: &ApiVersion) -> bool {
        self < other
    }
}

impl FromStr for ApiVersion {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::invalid_parameter(format!("invalid API version: '{}'", s));

        let s = s.trim().trim_start_matches('v');
        let parts = s
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match parts[..] {
            [major] => Ok(Self::new(major, 0)),
            [major, minor] => Ok(Self::new(major, minor)),
            [major, minor, patch] => Ok(Self {
                major,
                minor,
                patch,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.patch != 0 {
            write!(f, ".{}", self.patch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_versions() {
        assert_eq!("1.41".parse::<ApiVersion>().unwrap(), ApiVersion::new(1, 41));
        assert_eq!("v1.27".parse::<ApiVersion>().unwrap(), ApiVersion::new(1, 27));
        assert_eq!("2".parse::<ApiVersion>().unwrap(), ApiVersion::new(2, 0));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "one.two", "1.x", "1.2.3.4", "1..2"] {
            let err = bad.parse::<ApiVersion>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter, "input {:?}", bad);
        }
    }

    #[test]
    fn test_patch_component_compares_after_minor() {
        let patched: ApiVersion = "1.28.1".parse().unwrap();
        assert_eq!(patched.patch, 1);
        assert!(ApiVersion::new(1, 28) < patched);
        assert!(patched < ApiVersion::new(1, 29));
        assert_eq!("1.28.0".parse::<ApiVersion>().unwrap(), ApiVersion::new(1, 28));
        assert_eq!(patched.to_string(), "1.28.1");
    }

    #[test]
    fn test_compares_numerically() {
        let v1_9: ApiVersion = "1.9".parse().unwrap();
        let v1_28: ApiVersion = "1.28".parse().unwrap();
        assert!(v1_9.is_older_than(&v1_28));
        assert!(!v1_28.is_older_than(&ApiVersion::LIGHTWEIGHT_LIST));
        assert_eq!(v1_28.to_string(), "1.28");
    }
}
