//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix every contract path is mounted under.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    // === Contract ===
    /// Filesystem fallback for the contract when no bundled copy exists.
    #[serde(default = "default_spec_path")]
    pub openapi_spec_path: PathBuf,

    // === Dependency Probe ===
    /// HTTP(S) URL probed by the health endpoint.
    #[serde(default)]
    pub dependency_url: Option<String>,

    /// `host:port` probed with a TCP connect by the health endpoint.
    #[serde(default)]
    pub dependency_addr: Option<String>,

    /// Upper bound for a single probe call, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    // === Observability ===
    /// Port for the Prometheus exporter. Disabled when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Log line format. Levels come from `RUST_LOG`.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_port() -> u16 {
    8080
}

fn default_base_path() -> String {
    "/api".to_string()
}

fn default_spec_path() -> PathBuf {
    PathBuf::from("openapi/openapi.yml")
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_path: default_base_path(),
            openapi_spec_path: default_spec_path(),
            dependency_url: None,
            dependency_addr: None,
            probe_timeout_ms: default_probe_timeout_ms(),
            metrics_port: None,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !base_path_is_mountable(&self.base_path) {
            return Err(ConfigError::Invalid(format!(
                "BASE_PATH {:?} must be empty or start with '/' and not end with '/'",
                self.base_path
            )));
        }

        if self.dependency_url.is_some() && self.dependency_addr.is_some() {
            return Err(ConfigError::Invalid(
                "set only one of DEPENDENCY_URL and DEPENDENCY_ADDR".to_string(),
            ));
        }

        if self.dependency_url.is_some() {
            self.dependency_url()?;
        }

        if let Some(addr) = &self.dependency_addr {
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(ConfigError::Invalid(format!(
                    "DEPENDENCY_ADDR {addr:?} must be host:port"
                )));
            }
        }

        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "PROBE_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.metrics_port == Some(self.port) {
            return Err(ConfigError::Invalid(
                "METRICS_PORT must differ from PORT".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed dependency URL, if one is configured.
    pub fn dependency_url(&self) -> Result<Option<Url>, ConfigError> {
        let Some(raw) = &self.dependency_url else {
            return Ok(None);
        };

        let url = Url::parse(raw)
            .map_err(|e| ConfigError::Invalid(format!("DEPENDENCY_URL {raw:?}: {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(Some(url)),
            other => Err(ConfigError::Invalid(format!(
                "DEPENDENCY_URL scheme must be http or https, got {other}"
            ))),
        }
    }

    /// Probe timeout as a duration.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Whether `path` can be used as a mount prefix.
pub fn base_path_is_mountable(path: &str) -> bool {
    path.is_empty() || (path.starts_with('/') && !path.ends_with('/'))
}
