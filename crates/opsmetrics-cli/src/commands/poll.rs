use std::io::Write;

use opsmetrics_core::{EventRecorder, JsonLinesRecorder, QueryEngine, normalize_all};

use super::{EndpointArgs, load_config, make_provider};

pub fn run(args: &EndpointArgs, format: &str) {
    let config = load_config(args, args.overrides());
    let provider = make_provider(&config);
    let engine = QueryEngine::from_config(&config);

    let samples = match engine.poll(&provider) {
        Ok(samples) => samples,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let normalized = normalize_all(&samples, &config.platform_instance);

    let stdout = std::io::stdout();
    match format {
        "text" => {
            let mut out = stdout.lock();
            for metric in &normalized.metrics {
                if let Err(e) = writeln!(out, "{metric}") {
                    eprintln!("Error writing output: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ => {
            let mut recorder = JsonLinesRecorder::new(stdout.lock());
            for metric in &normalized.metrics {
                if let Err(e) = recorder.record(metric.event_type(), metric.attributes()) {
                    eprintln!("Error writing output: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    log::info!(
        "{} samples from {}: {} events, {} rejected",
        samples.len(),
        engine.endpoint(),
        normalized.metrics.len(),
        normalized.rejected.len()
    );
}
