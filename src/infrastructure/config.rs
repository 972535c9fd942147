//! Client configuration: backend address, request timeout and poll cadence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::domain::{ClientError, ClientResult};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

/// Configuration shared by the API client, the poller and the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base address of the segmentation service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout applied to every request.
    #[serde(with = "duration_ms", default = "default_timeout")]
    pub timeout: Duration,

    /// Delay between two job status fetches.
    #[serde(with = "duration_ms", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Where the terminal UI writes its log.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            log_file: default_log_file(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Base address without a trailing slash, ready for path concatenation.
    pub fn base_str(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Checks that the base address is an absolute URL.
    pub fn validate(&self) -> ClientResult<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    /// Load configuration from `V3DI_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`] with an arbitrary variable source.
    /// Values that fail to parse leave the default in place.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("V3DI_BACKEND_URL") {
            match Url::parse(&url) {
                Ok(_) => config.base_url = url,
                Err(e) => warn!(value = %url, error = %e, "Ignoring invalid V3DI_BACKEND_URL"),
            }
        }

        if let Some(ms) = millis(&lookup, "V3DI_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = millis(&lookup, "V3DI_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }

        if let Some(path) = lookup("V3DI_LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }

        config
    }

    /// Load configuration from a TOML file, or JSON when the extension says so.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)?;

        if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)
                .map_err(|e| ClientError::config(format!("failed to parse {}: {e}", path.display())))
        } else {
            toml::from_str(&content)
                .map_err(|e| ClientError::config(format!("failed to parse {}: {e}", path.display())))
        }
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let value = lookup(key)?;
    match value.parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!(key, %value, "Ignoring non-numeric duration");
            None
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_millis(30_000)
}

const fn default_poll_interval() -> Duration {
    Duration::from_millis(2_000)
}

fn default_log_file() -> PathBuf {
    PathBuf::from("v3di-slicer.log")
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tracing_test::traced_test;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_str(), "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.poll_interval, Duration::from_millis(2_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let config = ClientConfig::with_base_url("localhost");
        assert!(matches!(config.validate(), Err(ClientError::Url(_))));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("V3DI_BACKEND_URL", "https://api.example.org/"),
            ("V3DI_TIMEOUT_MS", "5000"),
            ("V3DI_POLL_INTERVAL_MS", "250"),
        ]);
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.base_str(), "https://api.example.org");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    #[traced_test]
    fn test_from_lookup_ignores_bad_values() {
        let config = ClientConfig::from_lookup(|k| match k {
            "V3DI_BACKEND_URL" => Some("not a url".to_string()),
            "V3DI_TIMEOUT_MS" => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config, ClientConfig::default());
        assert!(logs_contain("Ignoring invalid V3DI_BACKEND_URL"));
        assert!(logs_contain("V3DI_TIMEOUT_MS"));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "base_url = \"http://10.0.0.5:8001\"\npoll_interval = 500").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_str(), "http://10.0.0.5:8001");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn test_from_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = ClientConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ClientError::Config { .. }));
    }
}
