//! Classification and normalization of raw samples into metric events.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::{NameParseError, ObjectNamePath};
use crate::query::RawMetricSample;
use crate::tags::AttributeDescriptor;

/// Deployment whose components are runtime (not VM-level) metrics.
pub const RUNTIME_DEPLOYMENT: &str = "untitled_dev";

/// Attribute keys every event carries before tags are overlaid.
pub const FIXED_KEYS: [&str; 7] = [
    "platform_instance",
    "deployment",
    "job",
    "index",
    "ip",
    "attribute",
    "value",
];

/// Event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    /// VM-level health of a platform component.
    PlatformComponentMetric,
    /// Runtime (elastic runtime) metrics.
    RuntimeMetric,
}

impl MetricType {
    pub fn classify(deployment: &str) -> Self {
        if deployment.eq_ignore_ascii_case(RUNTIME_DEPLOYMENT) {
            Self::RuntimeMetric
        } else {
            Self::PlatformComponentMetric
        }
    }

    /// Event type name used when recording to a telemetry backend.
    pub fn event_type(self) -> &'static str {
        match self {
            Self::PlatformComponentMetric => "cf_vm_metrics",
            Self::RuntimeMetric => "cf_elastic_runtime_metrics",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// Value of one event attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Classified event ready for delivery. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMetric {
    #[serde(rename = "type")]
    metric_type: MetricType,
    attributes: BTreeMap<String, FieldValue>,
}

impl NormalizedMetric {
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn event_type(&self) -> &'static str {
        self.metric_type.event_type()
    }

    pub fn attributes(&self) -> &BTreeMap<String, FieldValue> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.attributes.get(key)
    }

    /// Shorthand for a text attribute.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn value(&self) -> Option<f64> {
        self.get("value").and_then(FieldValue::as_f64)
    }
}

impl fmt::Display for NormalizedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.metric_type)?;
        for (i, (k, v)) in self.attributes.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{k}={v}")?;
        }
        f.write_str(" }")
    }
}

/// Build an event from its parsed parts.
///
/// Fixed keys go in first and tags are overlaid afterwards, so a tag named
/// like a fixed key replaces it.
pub fn normalize(
    path: &ObjectNamePath,
    descriptor: &AttributeDescriptor,
    value: f64,
    platform_instance: &str,
) -> NormalizedMetric {
    let mut attributes: BTreeMap<String, FieldValue> = BTreeMap::new();
    attributes.insert("platform_instance".into(), platform_instance.into());
    attributes.insert("deployment".into(), path.deployment.as_str().into());
    attributes.insert("job".into(), path.job.as_str().into());
    attributes.insert("index".into(), path.index.as_str().into());
    attributes.insert("ip".into(), path.ip.as_str().into());
    attributes.insert("attribute".into(), descriptor.base.as_str().into());
    attributes.insert("value".into(), value.into());
    for (k, v) in &descriptor.tags {
        attributes.insert(k.clone(), v.as_str().into());
    }

    NormalizedMetric {
        metric_type: MetricType::classify(&path.deployment),
        attributes,
    }
}

/// Parse and normalize one raw sample.
pub fn normalize_sample(
    sample: &RawMetricSample,
    platform_instance: &str,
) -> Result<NormalizedMetric, NameParseError> {
    let path = ObjectNamePath::parse(&sample.identity)?;
    let descriptor = AttributeDescriptor::parse(&sample.attribute_name);
    for key in descriptor.shadowed_keys(&FIXED_KEYS) {
        log::warn!(
            "Tag '{key}' in attribute '{}' replaces the fixed '{key}' field",
            sample.attribute_name
        );
    }
    Ok(normalize(&path, &descriptor, sample.value, platform_instance))
}

/// Outcome of normalizing one cycle's samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub metrics: Vec<NormalizedMetric>,
    pub rejected: Vec<NameParseError>,
}

/// Normalize every sample, dropping (and logging) those with an unparseable
/// identity. One bad identity never affects the others.
pub fn normalize_all(samples: &[RawMetricSample], platform_instance: &str) -> Normalized {
    let mut out = Normalized::default();
    for sample in samples {
        match normalize_sample(sample, platform_instance) {
            Ok(metric) => out.metrics.push(metric),
            Err(e) => {
                log::error!("{e}");
                out.rejected.push(e);
            }
        }
    }
    out
}
