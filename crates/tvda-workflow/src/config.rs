//! Workflow timing configuration.
//!
//! Defaults are the production windows: evidence closes 24h after the
//! workflow starts, analysis 48h, and the whole workflow must finish within
//! 72h. Override via environment variables or explicit construction.

use chrono::Duration;

/// Timing knobs for the coordinator and scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Evidence collection window.
    pub evidence_window: Duration,
    /// Analysis window, measured from workflow start.
    pub analysis_window: Duration,
    /// Overall workflow window, measured from workflow start.
    pub workflow_window: Duration,
    /// Remaining time at which the deadline warning goes out.
    pub warning_threshold: Duration,
    /// Scheduler polling interval.
    pub tick_interval: std::time::Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            evidence_window: Duration::hours(24),
            analysis_window: Duration::hours(48),
            workflow_window: Duration::hours(72),
            warning_threshold: Duration::hours(12),
            tick_interval: std::time::Duration::from_secs(300),
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `EVIDENCE_WINDOW_HOURS` (default: 24)
    /// - `ANALYSIS_WINDOW_HOURS` (default: 48)
    /// - `WORKFLOW_WINDOW_HOURS` (default: 72)
    /// - `DEADLINE_WARNING_HOURS` (default: 12)
    /// - `TICK_INTERVAL_SECS` (default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let hours = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .map(Duration::hours)
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
            }
        };
        let tick_interval = match lookup("TICK_INTERVAL_SECS") {
            None => defaults.tick_interval,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(std::time::Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue("TICK_INTERVAL_SECS".to_string(), raw))?,
        };
        let config = Self {
            evidence_window: hours("EVIDENCE_WINDOW_HOURS", defaults.evidence_window)?,
            analysis_window: hours("ANALYSIS_WINDOW_HOURS", defaults.analysis_window)?,
            workflow_window: hours("WORKFLOW_WINDOW_HOURS", defaults.workflow_window)?,
            warning_threshold: hours("DEADLINE_WARNING_HOURS", defaults.warning_threshold)?,
            tick_interval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Windows must be positive and nested.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.evidence_window <= Duration::zero() {
            return Err(ConfigError::Inconsistent("evidence window must be positive".to_string()));
        }
        if self.analysis_window < self.evidence_window {
            return Err(ConfigError::Inconsistent(
                "analysis window must not end before evidence window".to_string(),
            ));
        }
        if self.workflow_window < self.analysis_window {
            return Err(ConfigError::Inconsistent(
                "workflow window must not end before analysis window".to_string(),
            ));
        }
        if self.warning_threshold < Duration::zero() {
            return Err(ConfigError::Inconsistent("warning threshold must not be negative".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Inconsistent("tick interval must be positive".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
    #[error("inconsistent workflow windows: {0}")]
    Inconsistent(String),
}
