//! Tracking configuration for the performance monitor
//!
//! A [`TrackingConfig`] is consumed once at construction and never changes
//! afterwards. It can be built in Rust, deserialized from the JavaScript
//! options object, or loaded from JSON/TOML.
//!
//! Field names follow the JavaScript option names (`apiUrl`,
//! `enableConsole`, `enableLocalStorage`, `samplingRate`); snake_case
//! aliases are accepted so TOML files read naturally. Unknown keys are
//! ignored.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Immutable configuration snapshot for one monitor instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingConfig {
    /// Endpoint receiving the JSON record. Remote delivery is off when unset.
    #[serde(default, alias = "api_url", skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Log every report to the console (default: true)
    #[serde(default = "default_enable_console", alias = "enable_console")]
    pub enable_console: bool,
    /// Append every report to the local cache (default: false)
    #[serde(default, alias = "enable_local_storage")]
    pub enable_local_storage: bool,
    /// Probability in [0, 1] that a page load is instrumented (default: 1)
    #[serde(default = "default_sampling_rate", alias = "sampling_rate")]
    pub sampling_rate: f64,
}

fn default_enable_console() -> bool {
    true
}

fn default_sampling_rate() -> f64 {
    1.0
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            enable_console: default_enable_console(),
            enable_local_storage: false,
            sampling_rate: default_sampling_rate(),
        }
    }
}

impl TrackingConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use perf_telemetry::TrackingConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = TrackingConfig::from_toml_str(r#"
    ///     api_url = "https://telemetry.example.com/perf"
    ///     sampling_rate = 0.25
    /// "#)?;
    /// assert!(config.enable_console);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML tracking configuration")
    }

    /// Parse configuration from a JSON string (the JavaScript options shape)
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("Failed to parse JSON tracking configuration")
    }

    /// Set the remote endpoint
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Enable or disable the console sink
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.enable_console = enabled;
        self
    }

    /// Enable or disable the local cache sink
    pub fn with_local_storage(mut self, enabled: bool) -> Self {
        self.enable_local_storage = enabled;
        self
    }

    /// Set the sampling rate
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Remote endpoint, treating an empty string as unset
    pub fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// Sampling rate clamped into [0, 1]; NaN counts as 1
    pub fn sampling_rate(&self) -> f64 {
        if self.sampling_rate.is_nan() {
            1.0
        } else {
            self.sampling_rate.clamp(0.0, 1.0)
        }
    }

    /// Whether a uniform draw in [0, 1) admits this page load
    pub fn admits(&self, draw: f64) -> bool {
        draw < self.sampling_rate()
    }
}
