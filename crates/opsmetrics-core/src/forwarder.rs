//! Forwarding: poll, normalize, and hand events to a recorder.
//!
//! A [`Forwarder`] owns one endpoint's query engine and a recorder. Each
//! [`Forwarder::forward_cycle`] is one poll cycle; [`Forwarder::run_fixed_rate`]
//! repeats cycles on a fixed-rate schedule until told to stop.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::connection::ConnectionProvider;
use crate::metric::{FieldValue, normalize_all};
use crate::query::{PollError, QueryEngine};

/// Granularity of the stop-flag check while waiting for the next cycle.
const WAIT_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error writing event: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Delivery seam towards a telemetry backend.
pub trait EventRecorder {
    fn record(
        &mut self,
        event_type: &str,
        attributes: &BTreeMap<String, FieldValue>,
    ) -> Result<(), RecordError>;
}

#[derive(Serialize)]
struct EventLine<'a> {
    event_type: &'a str,
    attributes: &'a BTreeMap<String, FieldValue>,
}

/// Writes one JSON object per event, newline-delimited.
pub struct JsonLinesRecorder<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesRecorder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventRecorder for JsonLinesRecorder<W> {
    fn record(
        &mut self,
        event_type: &str,
        attributes: &BTreeMap<String, FieldValue>,
    ) -> Result<(), RecordError> {
        serde_json::to_writer(
            &mut self.out,
            &EventLine {
                event_type,
                attributes,
            },
        )?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Event captured by a [`MemoryRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub event_type: String,
    pub attributes: BTreeMap<String, FieldValue>,
}

/// Keeps recorded events in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    events: Vec<RecordedEvent>,
}

impl MemoryRecorder {
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(
        &mut self,
        event_type: &str,
        attributes: &BTreeMap<String, FieldValue>,
    ) -> Result<(), RecordError> {
        self.events.push(RecordedEvent {
            event_type: event_type.to_string(),
            attributes: attributes.clone(),
        });
        Ok(())
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub elapsed_ms: u64,
    /// Numeric samples read from the endpoint.
    pub samples: usize,
    /// Events accepted by the recorder.
    pub recorded: usize,
    /// Samples dropped for an unparseable identity.
    pub dropped: usize,
    /// Events the recorder refused.
    pub failed: usize,
}

/// Totals across a fixed-rate run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub recorded: usize,
}

pub struct Forwarder<P: ConnectionProvider, R: EventRecorder> {
    engine: QueryEngine,
    provider: P,
    recorder: R,
    platform_instance: String,
}

impl<P: ConnectionProvider, R: EventRecorder> Forwarder<P, R> {
    pub fn new(engine: QueryEngine, provider: P, recorder: R, platform_instance: &str) -> Self {
        Self {
            engine,
            provider,
            recorder,
            platform_instance: platform_instance.to_string(),
        }
    }

    pub fn from_config(config: &Config, provider: P, recorder: R) -> Self {
        Self::new(
            QueryEngine::from_config(config),
            provider,
            recorder,
            &config.platform_instance,
        )
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn into_recorder(self) -> R {
        self.recorder
    }

    /// Run one poll cycle and record its events.
    ///
    /// A cycle that cannot connect records nothing and returns the error.
    pub fn forward_cycle(&mut self) -> Result<CycleReport, PollError> {
        let cycle_id = Uuid::new_v4();
        let start = Instant::now();
        log::info!("Starting ops metrics collection (cycle {cycle_id})");

        let samples = self.engine.poll(&self.provider).inspect_err(|e| {
            log::error!("Unable to forward ops metrics from {}: {e}", self.engine.endpoint());
        })?;

        let normalized = normalize_all(&samples, &self.platform_instance);
        let mut recorded = 0;
        let mut failed = 0;
        for metric in &normalized.metrics {
            log::debug!("Recording {metric}");
            match self.recorder.record(metric.event_type(), metric.attributes()) {
                Ok(()) => recorded += 1,
                Err(e) => {
                    log::warn!("Failed to record {} event: {e}", metric.event_type());
                    failed += 1;
                }
            }
        }

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Ops metrics collection completed in {elapsed_ms} ms. {recorded} metrics reported."
        );

        Ok(CycleReport {
            cycle_id,
            elapsed_ms,
            samples: samples.len(),
            recorded,
            dropped: normalized.rejected.len(),
            failed,
        })
    }

    /// Repeat cycles at a fixed rate until `running` is cleared or
    /// `max_cycles` have run.
    ///
    /// Cycles never overlap: when one overruns the interval the next starts
    /// immediately. A failed cycle does not stop the run.
    pub fn run_fixed_rate(
        &mut self,
        interval: Duration,
        max_cycles: Option<usize>,
        running: &AtomicBool,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        while running.load(Ordering::SeqCst) {
            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }

            let next = Instant::now() + interval;
            match self.forward_cycle() {
                Ok(report) => summary.recorded += report.recorded,
                Err(_) => summary.failed_cycles += 1,
            }
            summary.cycles += 1;

            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            while running.load(Ordering::SeqCst) {
                let remaining = next.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                std::thread::sleep(remaining.min(WAIT_SLICE));
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Endpoint;
    use crate::filter::AttributeFilter;
    use crate::snapshot::{Snapshot, SnapshotProvider};

    const SNAPSHOT: &str = r#"{
        "objects": [
            {
                "name": "org.cloudfoundry:deployment=untitled_dev,job=Router,index=1,ip=10.187.115.254",
                "attributes": {
                    "router.responses[component=app,dea_index=4,status=5xx]": 45.0,
                    "router.requests[appId=0b5a2f3e-52c1-4d0b-9d8e-7b3a0c1f2e4d]": 3,
                    "state": "running"
                }
            },
            {
                "name": "org.cloudfoundry:deployment=cf-ff8aaad5ee70d9fd796b,job=nats,index=0,ip=null",
                "attributes": { "system.cpu.user": 0.2 }
            }
        ]
    }"#;

    struct FailingRecorder;

    impl EventRecorder for FailingRecorder {
        fn record(
            &mut self,
            _event_type: &str,
            _attributes: &BTreeMap<String, FieldValue>,
        ) -> Result<(), RecordError> {
            Err(RecordError::Io(std::io::Error::other("backend down")))
        }
    }

    fn engine() -> QueryEngine {
        QueryEngine::new(Endpoint::new("localhost", 44444), None, AttributeFilter::default())
    }

    fn provider() -> SnapshotProvider {
        SnapshotProvider::from_snapshot(Snapshot::from_json(SNAPSHOT).unwrap())
    }

    #[test]
    fn test_cycle_records_normalized_events() {
        let mut fwd = Forwarder::new(engine(), provider(), MemoryRecorder::default(), "sandbox");
        let report = fwd.forward_cycle().unwrap();
        assert_eq!(report.samples, 2);
        assert_eq!(report.recorded, 2);
        assert_eq!(report.dropped, 0);

        let events = fwd.recorder().events();
        let router = events
            .iter()
            .find(|e| e.event_type == "cf_elastic_runtime_metrics")
            .unwrap();
        assert_eq!(router.attributes["attribute"], FieldValue::from("router.responses"));
        assert_eq!(router.attributes["status"], FieldValue::from("5xx"));
        assert_eq!(router.attributes["platform_instance"], FieldValue::from("sandbox"));

        let vm = events.iter().find(|e| e.event_type == "cf_vm_metrics").unwrap();
        assert_eq!(vm.attributes["value"], FieldValue::Number(0.2));
    }

    #[test]
    fn test_failed_connection_records_nothing() {
        let mut fwd = Forwarder::new(
            engine(),
            SnapshotProvider::from_path("/nonexistent/snapshot.json"),
            MemoryRecorder::default(),
            "sandbox",
        );
        assert!(fwd.forward_cycle().is_err());
        assert!(fwd.recorder().events().is_empty());
    }

    #[test]
    fn test_recorder_failures_are_counted() {
        let mut fwd = Forwarder::new(engine(), provider(), FailingRecorder, "sandbox");
        let report = fwd.forward_cycle().unwrap();
        assert_eq!(report.recorded, 0);
        assert_eq!(report.failed, 2);
    }

    #[test]
    fn test_json_lines_output() {
        let mut fwd = Forwarder::new(
            engine(),
            provider(),
            JsonLinesRecorder::new(Vec::new()),
            "sandbox",
        );
        fwd.forward_cycle().unwrap();
        let out = String::from_utf8(fwd.into_recorder().into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l["attributes"]["platform_instance"] == "sandbox"));
        assert!(lines.iter().any(|l| l["event_type"] == "cf_vm_metrics"));
    }

    #[test]
    fn test_fixed_rate_run_stops_after_max_cycles() {
        let mut fwd = Forwarder::new(engine(), provider(), MemoryRecorder::default(), "sandbox");
        let running = AtomicBool::new(true);
        let summary = fwd.run_fixed_rate(Duration::from_millis(5), Some(3), &running);
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.failed_cycles, 0);
        assert_eq!(summary.recorded, 6);
        assert_eq!(fwd.recorder().events().len(), 6);
    }

    #[test]
    fn test_fixed_rate_run_counts_failed_cycles() {
        let mut fwd = Forwarder::new(
            engine(),
            SnapshotProvider::from_path("/nonexistent/snapshot.json"),
            MemoryRecorder::default(),
            "sandbox",
        );
        let running = AtomicBool::new(true);
        let summary = fwd.run_fixed_rate(Duration::from_millis(1), Some(2), &running);
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.failed_cycles, 2);
    }

    #[test]
    fn test_cleared_flag_runs_nothing() {
        let mut fwd = Forwarder::new(engine(), provider(), MemoryRecorder::default(), "sandbox");
        let running = AtomicBool::new(false);
        let summary = fwd.run_fixed_rate(Duration::from_secs(60), None, &running);
        assert_eq!(summary, RunSummary::default());
    }
}
