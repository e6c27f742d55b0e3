pub mod config;
pub mod parse;
pub mod poll;
pub mod run;

use std::path::PathBuf;
use std::time::Duration;

use opsmetrics_core::{Config, ConfigLoader, ConfigOverrides, SnapshotProvider};

/// Endpoint and collection flags shared by the polling commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Management endpoint host
    #[arg(long)]
    pub host: Option<String>,

    /// Management endpoint port (default: 44444)
    #[arg(long)]
    pub port: Option<u16>,

    /// Username; sent only together with --password
    #[arg(long)]
    pub username: Option<String>,

    /// Password; sent only together with --username
    #[arg(long)]
    pub password: Option<String>,

    /// Include attributes tagged with an application id (appId=<uuid>)
    #[arg(long)]
    pub include_app_specific_metrics: bool,

    /// Label stamped on every event as platform_instance
    #[arg(long)]
    pub platform_instance: Option<String>,

    /// Serve the endpoint from a JSON snapshot file
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

impl EndpointArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            // Absent flag defers to the config file.
            include_app_specific_metrics: self.include_app_specific_metrics.then_some(true),
            interval_ms: None,
            platform_instance: self.platform_instance.clone(),
            snapshot: self.snapshot.clone(),
        }
    }
}

/// Load layered configuration, exiting with a message on failure.
pub fn load_config(args: &EndpointArgs, overrides: ConfigOverrides) -> Config {
    let mut loader = ConfigLoader::new();
    if let Some(ref path) = args.config {
        loader = loader.with_file(path);
    }
    match loader.load(&overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

/// Build the connection provider for a loaded configuration.
///
/// The CLI ships the snapshot adapter; other transports plug in through
/// `ConnectionProvider` when embedding the core library.
pub fn make_provider(config: &Config) -> SnapshotProvider {
    match config.snapshot {
        Some(ref path) => SnapshotProvider::from_path(path),
        None => {
            eprintln!(
                "Error: no connection adapter available for {}; pass --snapshot <file> \
                 (or set `snapshot` in the config file)",
                config.endpoint()
            );
            std::process::exit(2);
        }
    }
}

/// Parse a duration string like "5m", "30s", "1h", "100ms".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        // Assume seconds
        (s, 1000)
    };

    let value: u64 = numeric.trim().parse().ok()?;
    value.checked_mul(multiplier).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_parse_duration_bare_number_is_seconds() {
        assert_eq!(parse_duration("15"), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-5s"), None);
    }

    #[test]
    fn test_overrides_leave_unset_flags_alone() {
        let args = EndpointArgs::default();
        assert_eq!(args.overrides(), ConfigOverrides::default());
    }

    #[test]
    fn test_overrides_carry_flags() {
        let args = EndpointArgs {
            host: Some("10.0.0.5".into()),
            port: Some(45000),
            include_app_specific_metrics: true,
            platform_instance: Some("sandbox".into()),
            ..EndpointArgs::default()
        };
        let o = args.overrides();
        assert_eq!(o.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(o.port, Some(45000));
        assert_eq!(o.include_app_specific_metrics, Some(true));
        assert_eq!(o.platform_instance.as_deref(), Some("sandbox"));
    }

    #[test]
    fn test_load_config_layers_file_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opsmetrics.toml");
        std::fs::write(
            &path,
            "platform_instance = \"prod-east\"\n\n[endpoint]\nhost = \"10.0.0.5\"\nport = 45000\n",
        )
        .unwrap();

        let args = EndpointArgs {
            config: Some(path),
            port: Some(46000),
            ..EndpointArgs::default()
        };
        let config = load_config(&args, args.overrides());
        assert_eq!(config.platform_instance, "prod-east");
        assert_eq!(config.endpoint.host, "10.0.0.5");
        assert_eq!(config.endpoint.port, 46000);
    }
}
