//! Management endpoint capability interface.
//!
//! The query engine never talks to a management protocol directly. Adapters
//! implement [`ConnectionProvider`] to open a [`Connection`], which exposes the
//! three reads the pipeline needs: match objects against an
//! [`ObjectNamePattern`], list an object's attribute names, and read a single
//! attribute value.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to establish or tear down a connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("transport failure connecting to {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("authentication rejected by {endpoint}")]
    Authentication { endpoint: String },

    #[error("connection already closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to enumerate objects or their attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query failed: {0}")]
pub struct QueryError(pub String);

/// An attribute could not be read (removed since listing, or a transient error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attribute '{attribute}' unavailable on {identity}")]
pub struct AttributeUnavailable {
    pub identity: String,
    pub attribute: String,
}

/// Host and port of the management endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Username/password pair attached to a connection attempt.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Credentials are only formed when both halves are configured.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) => Some(Self {
                username: u.to_string(),
                password: p.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque identity of a managed object as reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectIdentity(String);

impl ObjectIdentity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into domain and `key=value` properties.
    fn split(&self) -> Option<(&str, BTreeMap<&str, &str>)> {
        let (domain, props) = self.0.split_once(':')?;
        let mut map = BTreeMap::new();
        for prop in props.split(',') {
            let (k, v) = prop.split_once('=')?;
            map.insert(k, v);
        }
        Some((domain, map))
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Object name pattern: a domain plus properties whose values may be `*`.
///
/// Property order is not significant. An object matches when its domain is
/// equal and it carries exactly the pattern's property keys, each with an equal
/// value or any value where the pattern says `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNamePattern {
    domain: String,
    properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PropertyValue {
    Any,
    Exact(String),
}

/// Malformed object name pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object name pattern '{0}'")]
pub struct PatternError(pub String);

impl ObjectNamePattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let err = || PatternError(raw.to_string());
        let (domain, props) = raw.split_once(':').ok_or_else(err)?;
        if domain.is_empty() || props.is_empty() {
            return Err(err());
        }

        let mut properties = BTreeMap::new();
        for prop in props.split(',') {
            let (k, v) = prop.split_once('=').ok_or_else(err)?;
            if k.is_empty() {
                return Err(err());
            }
            let value = if v == "*" {
                PropertyValue::Any
            } else {
                PropertyValue::Exact(v.to_string())
            };
            if properties.insert(k.to_string(), value).is_some() {
                return Err(err());
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn matches(&self, identity: &ObjectIdentity) -> bool {
        let Some((domain, props)) = identity.split() else {
            return false;
        };
        if domain != self.domain || props.len() != self.properties.len() {
            return false;
        }
        self.properties.iter().all(|(key, want)| {
            props.get(key.as_str()).is_some_and(|got| match want {
                PropertyValue::Any => true,
                PropertyValue::Exact(v) => v == got,
            })
        })
    }
}

impl fmt::Display for ObjectNamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        for (i, (k, v)) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match v {
                PropertyValue::Any => write!(f, "{k}=*")?,
                PropertyValue::Exact(s) => write!(f, "{k}={s}")?,
            }
        }
        Ok(())
    }
}

/// Attribute value as read from the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManagedValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl ManagedValue {
    /// Numeric view of the value; `None` for non-numeric kinds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(_) | Self::Text(_) | Self::Null => None,
        }
    }
}

/// An open session against a management endpoint.
pub trait Connection {
    /// All objects whose identity matches `pattern`.
    fn query_instances(
        &self,
        pattern: &ObjectNamePattern,
    ) -> Result<Vec<ObjectIdentity>, QueryError>;

    /// Declared attribute names of one object.
    fn list_attribute_names(&self, identity: &ObjectIdentity) -> Result<Vec<String>, QueryError>;

    /// Current value of one attribute.
    fn get_attribute_value(
        &self,
        identity: &ObjectIdentity,
        attribute: &str,
    ) -> Result<ManagedValue, AttributeUnavailable>;

    /// Release the session.
    fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Opens connections to a management endpoint.
pub trait ConnectionProvider {
    type Conn: Connection;

    fn open(
        &self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<Self::Conn, ConnectionError>;
}
