//! Layered configuration.
//!
//! Precedence, lowest first:
//! 1. Embedded defaults
//! 2. TOML file (`--config`)
//! 3. Environment variables `OPSMETRICS_*`, nested keys joined with `__`
//!    (`OPSMETRICS_ENDPOINT__HOST`, `OPSMETRICS_COLLECTION__INTERVAL_MS`)
//! 4. Command-line overrides
//!
//! The result is validated once and treated as immutable afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{Credentials, Endpoint};

/// Default management endpoint port.
pub const DEFAULT_PORT: u16 = 44444;
/// Default collection interval.
pub const DEFAULT_INTERVAL_MS: u64 = 30_000;
/// Platform label used when none is configured.
pub const DEFAULT_PLATFORM_INSTANCE: &str = "default";
/// Environment variable prefix.
pub const ENV_PREFIX: &str = "OPSMETRICS_";

/// String-typed keys taken verbatim from the environment. `Env` would parse
/// `12345` or `2024` as numbers, which then fail to extract as strings.
const TEXT_KEYS: [&str; 5] = [
    "endpoint.host",
    "endpoint.username",
    "endpoint.password",
    "platform_instance",
    "snapshot",
];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidFormat(#[from] Box<figment::Error>),

    #[error("configuration validation failed: {message}")]
    Validation { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::InvalidFormat(Box::new(e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub collection: CollectionConfig,
    /// Label stamped on every emitted metric.
    pub platform_instance: String,
    /// Serve the endpoint from a JSON snapshot instead of a live adapter.
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Let `appId=<uuid>` attributes through the filter.
    pub include_app_specific_metrics: bool,
    pub interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            collection: CollectionConfig::default(),
            platform_instance: DEFAULT_PLATFORM_INSTANCE.to_string(),
            snapshot: None,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            include_app_specific_metrics: false,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl Config {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.endpoint.host.clone(), self.endpoint.port)
    }

    /// Credentials, present only when both username and password are set.
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(
            self.endpoint.username.as_deref(),
            self.endpoint.password.as_deref(),
        )
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.collection.interval_ms)
    }

    /// Copy with the password masked, for display.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        if out.endpoint.password.is_some() {
            out.endpoint.password = Some("********".to_string());
        }
        out
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref host) = overrides.host {
            self.endpoint.host.clone_from(host);
        }
        if let Some(port) = overrides.port {
            self.endpoint.port = port;
        }
        if let Some(ref username) = overrides.username {
            self.endpoint.username = Some(username.clone());
        }
        if let Some(ref password) = overrides.password {
            self.endpoint.password = Some(password.clone());
        }
        if let Some(include) = overrides.include_app_specific_metrics {
            self.collection.include_app_specific_metrics = include;
        }
        if let Some(interval_ms) = overrides.interval_ms {
            self.collection.interval_ms = interval_ms;
        }
        if let Some(ref label) = overrides.platform_instance {
            self.platform_instance.clone_from(label);
        }
        if let Some(ref snapshot) = overrides.snapshot {
            self.snapshot = Some(snapshot.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // A snapshot stands in for the endpoint, so no host is needed then.
        if self.snapshot.is_none() && self.endpoint.host.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "endpoint.host must be set".to_string(),
            });
        }
        if self.endpoint.port == 0 {
            return Err(ConfigError::Validation {
                message: "endpoint.port must be greater than 0".to_string(),
            });
        }
        if self.collection.interval_ms == 0 {
            return Err(ConfigError::Validation {
                message: "collection.interval_ms must be greater than 0".to_string(),
            });
        }
        if self.platform_instance.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "platform_instance must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Values supplied on the command line; `None` leaves the layered value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub include_app_specific_metrics: Option<bool>,
    pub interval_ms: Option<u64>,
    pub platform_instance: Option<String>,
    pub snapshot: Option<PathBuf>,
}

/// Builds a [`Config`] from the layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Read a TOML file on top of the defaults. The file must exist.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    fn figment(&self) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(ref path) = self.file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound { path: path.clone() });
            }
            figment = figment.merge(Toml::file(path));
        }

        let env = Env::prefixed(&self.env_prefix).split("__");
        figment = figment.merge(env.clone().ignore(&TEXT_KEYS));
        let text = env.only(&TEXT_KEYS);
        for (key, value) in text.iter() {
            figment = figment.merge(Serialized::default(key.as_str(), value));
        }
        Ok(figment)
    }

    /// Load, apply command-line overrides, and validate.
    pub fn load(&self, overrides: &ConfigOverrides) -> Result<Config, ConfigError> {
        let mut config: Config = self.figment()?.extract()?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // A prefix no test environment sets, so the env layer is empty.
    const QUIET_PREFIX: &str = "OPSMETRICS_UNIT_TEST_UNSET_";

    fn loader() -> ConfigLoader {
        ConfigLoader::new().with_env_prefix(QUIET_PREFIX)
    }

    fn host_override() -> ConfigOverrides {
        ConfigOverrides {
            host: Some("10.0.0.5".into()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn test_defaults_match_service_defaults() {
        let config = loader().load(&host_override()).unwrap();
        assert_eq!(config.endpoint.port, 44444);
        assert!(!config.collection.include_app_specific_metrics);
        assert_eq!(config.collection.interval_ms, 30_000);
        assert_eq!(config.platform_instance, "default");
        assert_eq!(config.credentials(), None);
    }

    #[test]
    fn test_host_is_required_without_snapshot() {
        let err = loader().load(&ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_snapshot_replaces_host_requirement() {
        let overrides = ConfigOverrides {
            snapshot: Some(PathBuf::from("objects.json")),
            ..ConfigOverrides::default()
        };
        assert!(loader().load(&overrides).is_ok());
    }

    #[test]
    fn test_toml_file_layer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
platform_instance = "sandbox"

[endpoint]
host = "opsmetrics.example.internal"
port = 45555
username = "admin"
password = "secret"

[collection]
include_app_specific_metrics = true
interval_ms = 10000
"#
        )
        .unwrap();

        let config = loader()
            .with_file(file.path())
            .load(&ConfigOverrides::default())
            .unwrap();
        assert_eq!(config.endpoint.host, "opsmetrics.example.internal");
        assert_eq!(config.endpoint.port, 45555);
        assert_eq!(config.platform_instance, "sandbox");
        assert!(config.collection.include_app_specific_metrics);
        assert_eq!(config.interval(), Duration::from_secs(10));
        let creds = config.credentials().unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[endpoint]\nhost = \"from-file\"\nport = 1").unwrap();
        let overrides = ConfigOverrides {
            host: Some("from-flag".into()),
            include_app_specific_metrics: Some(true),
            ..ConfigOverrides::default()
        };
        let config = loader().with_file(file.path()).load(&overrides).unwrap();
        assert_eq!(config.endpoint.host, "from-flag");
        assert_eq!(config.endpoint.port, 1);
        assert!(config.collection.include_app_specific_metrics);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = loader()
            .with_file("/nonexistent/opsmetrics.toml")
            .load(&host_override())
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[endpoint]\nport = [1, 2]").unwrap();
        let err = loader()
            .with_file(file.path())
            .load(&host_override())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let overrides = ConfigOverrides {
            interval_ms: Some(0),
            ..host_override()
        };
        assert!(loader().load(&overrides).is_err());
    }

    #[test]
    fn test_username_alone_gives_no_credentials() {
        let overrides = ConfigOverrides {
            username: Some("admin".into()),
            ..host_override()
        };
        let config = loader().load(&overrides).unwrap();
        assert_eq!(config.credentials(), None);
    }

    #[test]
    fn test_numeric_env_values_stay_text() {
        const PREFIX: &str = "OPSMETRICS_UNIT_TEST_NUMERIC_";
        unsafe {
            std::env::set_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__HOST", "10.0.0.5");
            std::env::set_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__USERNAME", "1001");
            std::env::set_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__PASSWORD", "012345");
            std::env::set_var("OPSMETRICS_UNIT_TEST_NUMERIC_PLATFORM_INSTANCE", "2024");
            std::env::set_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__PORT", "45000");
        }

        let result = ConfigLoader::new()
            .with_env_prefix(PREFIX)
            .load(&ConfigOverrides::default());

        unsafe {
            std::env::remove_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__HOST");
            std::env::remove_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__USERNAME");
            std::env::remove_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__PASSWORD");
            std::env::remove_var("OPSMETRICS_UNIT_TEST_NUMERIC_PLATFORM_INSTANCE");
            std::env::remove_var("OPSMETRICS_UNIT_TEST_NUMERIC_ENDPOINT__PORT");
        }

        let config = result.unwrap();
        assert_eq!(config.endpoint.host, "10.0.0.5");
        assert_eq!(config.endpoint.port, 45000);
        assert_eq!(config.platform_instance, "2024");
        let creds = config.credentials().unwrap();
        assert_eq!(creds.username, "1001");
        assert_eq!(creds.password, "012345");
    }

    #[test]
    fn test_redacted_masks_password() {
        let overrides = ConfigOverrides {
            username: Some("admin".into()),
            password: Some("secret".into()),
            ..host_override()
        };
        let config = loader().load(&overrides).unwrap();
        let shown = config.redacted();
        assert_eq!(shown.endpoint.password.as_deref(), Some("********"));
        assert_eq!(config.endpoint.password.as_deref(), Some("secret"));
    }
}
