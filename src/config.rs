//! Service and mock configuration, read from values, JSON files or the environment.

use std::path::Path;

use crate::errors::Error;
use crate::headers::HeaderSet;

pub const BASE_URL_KEY: &str = "BaseUrl";
pub const DEFAULT_REACHABILITY_HOST: &str = "www.google.com";
pub const DEFAULT_VALID_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Debug, serde::Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default = "default_reachability_host")]
    pub reachability_host: String,
    #[serde(default)]
    pub reachability_enabled: bool,
    #[serde(default = "default_headers")]
    pub default_headers: HeaderSet,
    #[serde(default = "default_valid_content_types")]
    pub valid_content_types: Vec<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_reachability_host() -> String {
    DEFAULT_REACHABILITY_HOST.to_string()
}

pub(crate) fn default_headers() -> HeaderSet {
    HeaderSet::from_pairs([("Accept", "application/json")])
}

fn default_valid_content_types() -> Vec<String> {
    vec![DEFAULT_VALID_CONTENT_TYPE.to_string()]
}

impl ServiceConfig {
    pub fn from_values(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reachability_host: default_reachability_host(),
            reachability_enabled: false,
            default_headers: default_headers(),
            valid_content_types: default_valid_content_types(),
            request_timeout_secs: None,
        }
    }

    pub fn with_reachability(mut self, host: impl Into<String>, enabled: bool) -> Self {
        self.reachability_host = host.into();
        self.reachability_enabled = enabled;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServiceConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Reads one service out of a JSON document holding several services keyed by name.
    /// The selected entry must carry a `BaseUrl` string.
    pub fn from_file_with_root(path: impl AsRef<Path>, root_key: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let document: serde_json::Value = serde_json::from_str(&contents)?;
        let entry = document
            .get(root_key)
            .ok_or_else(|| Error::Config(format!("Service root key '{}' not found", root_key)))?;
        let base_url = entry
            .get(BASE_URL_KEY)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::Config(format!("{} not found under '{}'", BASE_URL_KEY, root_key))
            })?;
        Ok(Self::from_values(base_url))
    }

    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("NETWORK_SERVICE_BASE_URL").map_err(|_| {
            Error::Config("Missing NETWORK_SERVICE_BASE_URL env var".to_string())
        })?;
        let mut config = Self::from_values(base_url);
        if let Ok(host) = std::env::var("NETWORK_SERVICE_REACHABILITY_HOST") {
            config.reachability_host = host;
        }
        if let Ok(enabled) = std::env::var("NETWORK_SERVICE_REACHABILITY_ENABLED") {
            config.reachability_enabled = enabled.parse().map_err(|_| {
                Error::Config(format!(
                    "NETWORK_SERVICE_REACHABILITY_ENABLED must be true or false, got '{}'",
                    enabled
                ))
            })?;
        }
        Ok(config)
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct MockConfig {
    pub enable_success_mock: bool,
    #[serde(default)]
    pub response_delay_ms: f32,
    #[serde(default)]
    pub fixture_dir: Option<String>,
}

impl MockConfig {
    pub fn from_values(enable_success_mock: bool, response_delay_ms: f32) -> Self {
        Self {
            enable_success_mock,
            response_delay_ms,
            fixture_dir: None,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: MockConfig = serde_json::from_str(&contents)?;
        if !config.response_delay_ms.is_finite() || config.response_delay_ms < 0.0 {
            return Err(Error::Config(format!(
                "response_delay_ms must be a non-negative number, got {}",
                config.response_delay_ms
            )));
        }
        Ok(config)
    }
}
