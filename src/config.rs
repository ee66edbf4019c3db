//! Widget configuration read from the process environment.

use std::env;

use thiserror::Error;

use crate::observability::parse_bool;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/api/prices";
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub endpoint: String,
    pub refresh_interval_ms: u64,
    /// `None` leaves the transport default in place.
    pub fetch_timeout_ms: Option<u64>,
    pub host_bridge: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            fetch_timeout_ms: None,
            host_bridge: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid widget config: refresh_interval_ms must be >= 1")]
    ZeroRefreshInterval,
    #[error("invalid widget config: fetch_timeout_ms must be >= 1 when set")]
    ZeroFetchTimeout,
    #[error("invalid widget config: endpoint must be an http(s) URL, got '{0}'")]
    InvalidEndpoint(String),
}

impl WidgetConfig {
    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        if self.fetch_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroFetchTimeout);
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }
}

pub fn widget_config_from_env() -> WidgetConfig {
    let mut config = WidgetConfig::default();

    if let Ok(endpoint) = env::var("PRICEWATCH_ENDPOINT") {
        let trimmed = endpoint.trim();
        if !trimmed.is_empty() {
            config.endpoint = trimmed.to_string();
        }
    }

    if let Some(interval_ms) = env_u64("PRICEWATCH_REFRESH_INTERVAL_MS") {
        config.refresh_interval_ms = interval_ms;
    }

    if let Some(timeout_ms) = env_u64("PRICEWATCH_FETCH_TIMEOUT_MS") {
        config.fetch_timeout_ms = Some(timeout_ms);
    }

    if let Ok(host_bridge) = env::var("PRICEWATCH_HOST_BRIDGE") {
        if let Some(parsed) = parse_bool(&host_bridge) {
            config.host_bridge = parsed;
        }
    }

    config
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
}
