use serde::Deserialize;
use std::time::Duration;

/// Configuration for query monitoring.
///
/// By default, monitoring is disabled and must be explicitly enabled. When
/// read from configuration files the threshold is given in milliseconds:
///
/// ```toml
/// [monitor]
/// monitoring_enabled = true
/// slow_query_threshold = 250
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Slow query threshold for `on_slow_query` callbacks.
    #[serde(deserialize_with = "crate::config::deserialize_opt_millis")]
    pub slow_query_threshold: Option<Duration>,
    /// Whether monitors receive events.
    pub monitoring_enabled: bool,
}

impl MonitorConfig {
    /// Create a new configuration with defaults (monitoring disabled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slow query threshold.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        self.monitoring_enabled = false;
        self
    }
}
