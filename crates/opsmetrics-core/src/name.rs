//! Managed object identity decomposition.
//!
//! Identities look like
//! `org.cloudfoundry:deployment=<d>,job=<j>,index=<n>,ip=<addr>`. Both `:` and
//! `,` are treated as field delimiters before matching, and the four values are
//! returned verbatim. `ip` is frequently the literal text `null`.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Namespace every monitored object lives under.
pub const NAMESPACE: &str = "org.cloudfoundry";

static IDENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^org\.cloudfoundry/deployment=(.*)/job=(.*)/index=(\d+)/ip=(.*)$")
        .expect("identity pattern is valid")
});

/// The identity string did not match the four-field grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric named '{raw}'")]
pub struct NameParseError {
    pub raw: String,
}

/// Deployment/job/index/ip components of a managed object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectNamePath {
    pub deployment: String,
    pub job: String,
    pub index: String,
    pub ip: String,
}

impl ObjectNamePath {
    /// Parse a raw identity string.
    pub fn parse(identity: &str) -> Result<Self, NameParseError> {
        let normalized = identity.replace([':', ','], "/");
        let caps = IDENTITY_PATTERN
            .captures(&normalized)
            .ok_or_else(|| NameParseError {
                raw: identity.to_string(),
            })?;

        Ok(Self {
            deployment: caps[1].to_string(),
            job: caps[2].to_string(),
            index: caps[3].to_string(),
            ip: caps[4].to_string(),
        })
    }
}

impl std::str::FromStr for ObjectNamePath {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_identity() {
        let p = ObjectNamePath::parse(
            "org.cloudfoundry:deployment=cf-ff8aaad5ee70d9fd796b,job=dea-partition-e4843d06a9805bbe56ae,index=9,ip=null",
        )
        .unwrap();
        assert_eq!(p.deployment, "cf-ff8aaad5ee70d9fd796b");
        assert_eq!(p.job, "dea-partition-e4843d06a9805bbe56ae");
        assert_eq!(p.index, "9");
        assert_eq!(p.ip, "null");
    }

    #[test]
    fn test_runtime_identity() {
        let p: ObjectNamePath = "org.cloudfoundry:deployment=untitled_dev,job=Router,index=1,ip=10.187.115.254"
            .parse()
            .unwrap();
        assert_eq!(p.deployment, "untitled_dev");
        assert_eq!(p.job, "Router");
        assert_eq!(p.index, "1");
        assert_eq!(p.ip, "10.187.115.254");
    }

    #[test]
    fn test_missing_ip_is_rejected() {
        let raw = "org.cloudfoundry:deployment=untitled_dev,job=DEA,index=10";
        let err = ObjectNamePath::parse(raw).unwrap_err();
        assert_eq!(err.raw, raw);
        assert_eq!(err.to_string(), format!("unknown metric named '{raw}'"));
    }

    #[test]
    fn test_wrong_namespace_is_rejected() {
        assert!(ObjectNamePath::parse("com.example:deployment=a,job=b,index=0,ip=c").is_err());
    }

    #[test]
    fn test_namespace_dot_is_literal() {
        assert!(ObjectNamePath::parse("orgXcloudfoundry:deployment=a,job=b,index=0,ip=c").is_err());
    }

    #[test]
    fn test_non_numeric_index_is_rejected() {
        assert!(ObjectNamePath::parse("org.cloudfoundry:deployment=a,job=b,index=z,ip=c").is_err());
    }

    #[test]
    fn test_fields_out_of_order_are_rejected() {
        assert!(ObjectNamePath::parse("org.cloudfoundry:job=b,deployment=a,index=0,ip=c").is_err());
    }

    #[test]
    fn test_empty_values_are_kept_verbatim() {
        let p = ObjectNamePath::parse("org.cloudfoundry:deployment=,job=,index=0,ip=").unwrap();
        assert_eq!(p.deployment, "");
        assert_eq!(p.job, "");
        assert_eq!(p.ip, "");
    }

    #[test]
    fn test_empty_string_is_rejected() {
        assert!(ObjectNamePath::parse("").is_err());
    }
}
