//! CLI for opsmetrics — poll, classify and forward platform telemetry.

mod commands;

use clap::{Parser, Subcommand};

use commands::EndpointArgs;

#[derive(Parser)]
#[command(name = "opsmetrics")]
#[command(about = "opsmetrics — platform component telemetry as normalized metric events")]
#[command(version = opsmetrics_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single poll cycle and print the resulting events
    Poll {
        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Output format
        #[arg(long, default_value = "json", value_parser = ["json", "text"])]
        format: String,
    },

    /// Poll on a fixed-rate schedule and forward events as JSON lines
    Run {
        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Collection interval (e.g. "30s", "500ms", "1m"); overrides collection.interval_ms
        #[arg(long)]
        interval: Option<String>,

        /// Stop after this many cycles (default: until Ctrl+C)
        #[arg(long)]
        cycles: Option<usize>,

        /// Append events to this file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },

    /// Classify one identity/attribute pair offline
    Parse {
        /// Managed object identity, e.g. org.cloudfoundry:deployment=d,job=j,index=0,ip=null
        identity: String,

        /// Attribute name, optionally with a [key=value,...] tag suffix
        attribute: String,

        /// Sample value
        #[arg(long, default_value = "0")]
        value: f64,

        /// Platform instance label
        #[arg(long, default_value = opsmetrics_core::config::DEFAULT_PLATFORM_INSTANCE)]
        platform_instance: String,
    },

    /// Print the effective configuration (password redacted)
    Config {
        #[command(flatten)]
        endpoint: EndpointArgs,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Poll { endpoint, format } => commands::poll::run(&endpoint, &format),
        Commands::Run {
            endpoint,
            interval,
            cycles,
            output,
        } => commands::run::run(&endpoint, interval.as_deref(), cycles, output.as_deref()),
        Commands::Parse {
            identity,
            attribute,
            value,
            platform_instance,
        } => commands::parse::run(&identity, &attribute, value, &platform_instance),
        Commands::Config { endpoint } => commands::config::run(&endpoint),
    }
}
