//! Client configuration

use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the agent chat client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the analytics agent server
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Send the greeting request when a session starts
    pub greet_on_start: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            greet_on_start: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let base_url = lookup("ANALYST_API_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.base_url);

        let connect_timeout = lookup("ANALYST_CONNECT_TIMEOUT_SECS")
            .and_then(|secs| secs.parse().ok())
            .map_or(defaults.connect_timeout, Duration::from_secs);

        let greet_on_start = lookup("ANALYST_GREETING")
            .map_or(defaults.greet_on_start, |v| !matches!(v.as_str(), "0" | "false" | "off"));

        Self {
            base_url,
            connect_timeout,
            greet_on_start,
        }
    }
}
