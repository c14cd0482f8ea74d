//! Configuration module for the incident console client.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// What happens to an edited field when saving it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFailurePolicy {
    /// Restore the last-known-good value and drop the attempted edit.
    Revert,
    /// Keep the attempted edit and its dirty marker so the user can retry.
    Retain,
}

impl SaveFailurePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "revert" => Some(Self::Revert),
            "retain" => Some(Self::Retain),
            _ => None,
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the backend (default: "http://127.0.0.1:8000")
    pub backend_url: String,
    /// Background poll interval (default: 6s)
    pub poll_interval: Duration,
    /// Per-request timeout (default: 10s)
    pub request_timeout: Duration,
    /// File holding the locally persisted custom Slack channels
    pub channels_path: PathBuf,
    /// How long a toast stays visible (default: 4.2s)
    pub toast_duration: Duration,
    pub save_failure: SaveFailurePolicy,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            poll_interval: Duration::from_millis(6000),
            request_timeout: Duration::from_millis(10_000),
            channels_path: PathBuf::from("incident_console.slack_channels.json"),
            toast_duration: Duration::from_millis(4200),
            save_failure: SaveFailurePolicy::Revert,
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `INCIDENT_CONSOLE_BACKEND_URL`: backend base URL
    /// - `INCIDENT_CONSOLE_POLL_INTERVAL_MS`: poll interval in milliseconds
    /// - `INCIDENT_CONSOLE_TIMEOUT_MS`: request timeout in milliseconds
    /// - `INCIDENT_CONSOLE_CHANNELS_PATH`: custom channel file
    /// - `INCIDENT_CONSOLE_TOAST_MS`: toast duration in milliseconds
    /// - `INCIDENT_CONSOLE_SAVE_FAILURE`: `revert` or `retain`
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("INCIDENT_CONSOLE_BACKEND_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                cfg.backend_url = url.to_string();
            }
        }

        let millis = |key: &str| lookup(key).and_then(|v| parse_millis(&v));

        if let Some(ms) = millis("INCIDENT_CONSOLE_POLL_INTERVAL_MS") {
            cfg.poll_interval = ms;
        }

        if let Some(ms) = millis("INCIDENT_CONSOLE_TIMEOUT_MS") {
            cfg.request_timeout = ms;
        }

        if let Some(path) = lookup("INCIDENT_CONSOLE_CHANNELS_PATH") {
            if !path.trim().is_empty() {
                cfg.channels_path = PathBuf::from(path.trim());
            }
        }

        if let Some(ms) = millis("INCIDENT_CONSOLE_TOAST_MS") {
            cfg.toast_duration = ms;
        }

        let policy = lookup("INCIDENT_CONSOLE_SAVE_FAILURE")
            .and_then(|v| SaveFailurePolicy::parse(&v));
        if let Some(policy) = policy {
            cfg.save_failure = policy;
        }

        cfg
    }
}

/// Upper bound for any configured duration: one day.
const MAX_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// Accepts 1..=[`MAX_MILLIS`]. Zero would turn the poller into a busy loop
/// and huge values overflow `Instant` arithmetic.
fn parse_millis(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(ms @ 1..=MAX_MILLIS) => Some(Duration::from_millis(ms)),
        _ => None,
    }
}
