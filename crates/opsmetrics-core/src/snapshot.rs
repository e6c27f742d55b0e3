//! JSON snapshot adapter for the [`Connection`] interface.
//!
//! A snapshot is a point-in-time dump of an endpoint's managed objects:
//!
//! ```json
//! {
//!   "credentials": { "username": "admin", "password": "secret" },
//!   "objects": [
//!     {
//!       "name": "org.cloudfoundry:deployment=untitled_dev,job=Router,index=1,ip=10.0.0.1",
//!       "attributes": { "router.total_requests": 1200, "state": "running" }
//!     }
//!   ]
//! }
//! ```
//!
//! File-backed providers re-read the file on every `open`, so an exporter can
//! rewrite it between cycles. When `credentials` is present, connections must
//! present exactly those credentials.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connection::{
    AttributeUnavailable, Connection, ConnectionError, ConnectionProvider, Credentials, Endpoint,
    ManagedValue, ObjectIdentity, ObjectNamePattern, QueryError,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub objects: Vec<SnapshotObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotObject {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, ManagedValue>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn object(&self, identity: &ObjectIdentity) -> Option<&SnapshotObject> {
        self.objects.iter().find(|o| o.name == identity.as_str())
    }
}

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Memory(Arc<Snapshot>),
}

/// Opens connections backed by a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    source: Source,
}

impl SnapshotProvider {
    /// Read `path` on every connection attempt.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            source: Source::Memory(Arc::new(snapshot)),
        }
    }

    fn load(&self, endpoint: &Endpoint) -> Result<Arc<Snapshot>, ConnectionError> {
        match &self.source {
            Source::Memory(s) => Ok(Arc::clone(s)),
            Source::File(path) => {
                let raw = std::fs::read_to_string(path)?;
                let snapshot = Snapshot::from_json(&raw).map_err(|e| ConnectionError::Transport {
                    endpoint: endpoint.to_string(),
                    message: format!("malformed snapshot {}: {e}", path.display()),
                })?;
                Ok(Arc::new(snapshot))
            }
        }
    }
}

impl ConnectionProvider for SnapshotProvider {
    type Conn = SnapshotConnection;

    fn open(
        &self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
    ) -> Result<SnapshotConnection, ConnectionError> {
        let snapshot = self.load(endpoint)?;
        if let Some(ref required) = snapshot.credentials {
            if credentials != Some(required) {
                return Err(ConnectionError::Authentication {
                    endpoint: endpoint.to_string(),
                });
            }
        }
        Ok(SnapshotConnection {
            snapshot: Some(snapshot),
        })
    }
}

/// A connection over one loaded snapshot.
#[derive(Debug)]
pub struct SnapshotConnection {
    snapshot: Option<Arc<Snapshot>>,
}

impl SnapshotConnection {
    fn snapshot(&self) -> Result<&Snapshot, QueryError> {
        self.snapshot
            .as_deref()
            .ok_or_else(|| QueryError("connection closed".to_string()))
    }
}

impl Connection for SnapshotConnection {
    fn query_instances(
        &self,
        pattern: &ObjectNamePattern,
    ) -> Result<Vec<ObjectIdentity>, QueryError> {
        // Instances are a set; a repeated name resolves to its first entry.
        let mut seen = BTreeSet::new();
        Ok(self
            .snapshot()?
            .objects
            .iter()
            .filter(|o| seen.insert(o.name.as_str()))
            .map(|o| ObjectIdentity::new(o.name.as_str()))
            .filter(|id| pattern.matches(id))
            .collect())
    }

    fn list_attribute_names(&self, identity: &ObjectIdentity) -> Result<Vec<String>, QueryError> {
        let object = self
            .snapshot()?
            .object(identity)
            .ok_or_else(|| QueryError(format!("instance not found: {identity}")))?;
        Ok(object.attributes.keys().cloned().collect())
    }

    fn get_attribute_value(
        &self,
        identity: &ObjectIdentity,
        attribute: &str,
    ) -> Result<ManagedValue, AttributeUnavailable> {
        let unavailable = || AttributeUnavailable {
            identity: identity.to_string(),
            attribute: attribute.to_string(),
        };
        let snapshot = self.snapshot().map_err(|_| unavailable())?;
        snapshot
            .object(identity)
            .and_then(|o| o.attributes.get(attribute))
            .cloned()
            .ok_or_else(unavailable)
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        self.snapshot.take().map(|_| ()).ok_or(ConnectionError::Closed)
    }
}
