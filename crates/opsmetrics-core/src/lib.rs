//! # opsmetrics-core
//!
//! **Platform component health from a management endpoint, as metric events.**
//!
//! `opsmetrics-core` polls a management endpoint for numeric attributes of
//! every managed object under the `org.cloudfoundry` namespace, filters out
//! application-specific attributes, and turns each reading into a classified
//! [`NormalizedMetric`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use opsmetrics_core::{AttributeFilter, Endpoint, QueryEngine, SnapshotProvider, normalize_all};
//!
//! let engine = QueryEngine::new(
//!     Endpoint::new("10.0.0.5", 44444),
//!     None,
//!     AttributeFilter::default(),
//! );
//! let provider = SnapshotProvider::from_path("objects.json");
//!
//! let samples = engine.poll(&provider).expect("endpoint reachable");
//! for metric in normalize_all(&samples, "sandbox").metrics {
//!     println!("{metric}");
//! }
//! ```
//!
//! ## Architecture
//!
//! Connection → Query (filter, numeric read) → Name/Tag parsing → Classify → Recorder
//!
//! - [`QueryEngine`] opens a [`Connection`] through a [`ConnectionProvider`],
//!   enumerates matching objects, and reads each admitted attribute once.
//! - [`ObjectNamePath`] and [`AttributeDescriptor`] decompose the identity and
//!   the attribute name.
//! - [`normalize`] classifies by deployment and builds the event attributes.
//! - [`Forwarder`] runs whole cycles and delivers events to an
//!   [`EventRecorder`].

pub mod config;
pub mod connection;
pub mod filter;
pub mod forwarder;
pub mod metric;
pub mod name;
pub mod query;
pub mod snapshot;
pub mod tags;

pub use config::{Config, ConfigError, ConfigLoader, ConfigOverrides};
pub use connection::{
    AttributeUnavailable, Connection, ConnectionError, ConnectionProvider, Credentials, Endpoint,
    ManagedValue, ObjectIdentity, ObjectNamePattern, QueryError,
};
pub use filter::{AttributeFilter, admit, is_app_specific};
pub use forwarder::{
    CycleReport, EventRecorder, Forwarder, JsonLinesRecorder, MemoryRecorder, RecordError,
    RecordedEvent, RunSummary,
};
pub use metric::{
    FieldValue, MetricType, Normalized, NormalizedMetric, normalize, normalize_all,
    normalize_sample,
};
pub use name::{NameParseError, ObjectNamePath};
pub use query::{PollError, QueryEngine, RawMetricSample, WILDCARD_OBJECT_NAME};
pub use snapshot::{Snapshot, SnapshotConnection, SnapshotObject, SnapshotProvider};
pub use tags::AttributeDescriptor;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
