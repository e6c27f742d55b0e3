use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use opsmetrics_core::{Forwarder, JsonLinesRecorder};

use super::{EndpointArgs, load_config, make_provider, parse_duration};

pub fn run(args: &EndpointArgs, interval: Option<&str>, cycles: Option<usize>, output: Option<&str>) {
    let mut overrides = args.overrides();
    if let Some(s) = interval {
        match parse_duration(s) {
            Some(d) if !d.is_zero() => overrides.interval_ms = Some(d.as_millis() as u64),
            _ => {
                eprintln!("Invalid interval: {s}");
                std::process::exit(1);
            }
        }
    }
    let config = load_config(args, overrides);
    let provider = make_provider(&config);

    let sink: Box<dyn Write> = match output {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("Error opening {path}: {e}");
                std::process::exit(1);
            }
        },
        None => Box::new(std::io::stdout()),
    };

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    log::info!(
        "Forwarding ops metrics from {} every {} ms (platform instance '{}')",
        config.endpoint(),
        config.collection.interval_ms,
        config.platform_instance
    );

    let mut forwarder = Forwarder::from_config(&config, provider, JsonLinesRecorder::new(sink));
    let summary = forwarder.run_fixed_rate(config.interval(), cycles, &running);

    log::info!(
        "Stopped after {} cycles ({} failed), {} events recorded",
        summary.cycles,
        summary.failed_cycles,
        summary.recorded
    );
    if summary.cycles > 0 && summary.failed_cycles == summary.cycles {
        std::process::exit(1);
    }
}
