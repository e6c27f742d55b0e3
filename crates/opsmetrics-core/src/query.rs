//! Query engine: one poll cycle against a management endpoint.
//!
//! A cycle opens a connection, finds every object under the platform
//! namespace, and reads each admitted numeric attribute once. Only failing to
//! connect or to enumerate objects aborts the cycle; per-object and
//! per-attribute failures just shrink the result.

use std::ops::Deref;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::connection::{
    Connection, ConnectionError, ConnectionProvider, Credentials, Endpoint, ObjectIdentity,
    ObjectNamePattern, QueryError,
};
use crate::filter::AttributeFilter;

/// Wildcard covering every deployment/job/index/ip under the namespace.
pub const WILDCARD_OBJECT_NAME: &str = "org.cloudfoundry:deployment=*,job=*,index=*,ip=*";

static WILDCARD_PATTERN: LazyLock<ObjectNamePattern> = LazyLock::new(|| {
    ObjectNamePattern::parse(WILDCARD_OBJECT_NAME).expect("wildcard object name is valid")
});

/// One numeric attribute reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricSample {
    pub identity: String,
    pub attribute_name: String,
    pub value: f64,
}

/// A poll cycle that produced no output.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("unable to connect: {0}")]
    Connect(#[from] ConnectionError),

    #[error("unable to enumerate managed objects: {0}")]
    Query(#[from] QueryError),
}

/// Closes the wrapped connection when dropped. Close errors are discarded.
struct ConnectionGuard<C: Connection> {
    conn: C,
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.conn.close() {
            log::debug!("Ignoring error while closing connection: {e}");
        }
    }
}

/// Polls one endpoint with a fixed filter policy.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    filter: AttributeFilter,
}

impl QueryEngine {
    pub fn new(endpoint: Endpoint, credentials: Option<Credentials>, filter: AttributeFilter) -> Self {
        Self {
            endpoint,
            credentials,
            filter,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.endpoint(),
            config.credentials(),
            AttributeFilter::new(config.collection.include_app_specific_metrics),
        )
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn filter(&self) -> AttributeFilter {
        self.filter
    }

    /// Run one cycle. The connection is closed on every exit path.
    pub fn poll<P: ConnectionProvider>(
        &self,
        provider: &P,
    ) -> Result<Vec<RawMetricSample>, PollError> {
        log::debug!("Connecting to {}", self.endpoint);
        let conn = ConnectionGuard {
            conn: provider.open(&self.endpoint, self.credentials.as_ref())?,
        };
        self.search_for_metrics(&*conn)
    }

    fn search_for_metrics<C: Connection>(
        &self,
        conn: &C,
    ) -> Result<Vec<RawMetricSample>, PollError> {
        let objects = conn.query_instances(&WILDCARD_PATTERN)?;
        let mut samples = Vec::new();
        for object in &objects {
            self.collect_object(conn, object, &mut samples);
        }
        Ok(samples)
    }

    fn collect_object<C: Connection>(
        &self,
        conn: &C,
        object: &ObjectIdentity,
        out: &mut Vec<RawMetricSample>,
    ) {
        let names = match conn.list_attribute_names(object) {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Skipping {object}: {e}");
                return;
            }
        };

        for name in names {
            if !self.filter.admit(&name) {
                continue;
            }
            // One read per attribute: the probed value is the emitted value.
            let Some(value) = conn
                .get_attribute_value(object, &name)
                .ok()
                .and_then(|v| v.as_f64())
                .filter(|v| v.is_finite())
            else {
                continue;
            };
            out.push(RawMetricSample {
                identity: object.to_string(),
                attribute_name: name,
                value,
            });
        }
    }
}
