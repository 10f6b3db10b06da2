//! # Server Configuration
//!
//! Everything the binary reads from the environment. Invalid values are
//! errors, never silent defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `PORT` | `8080` |
//! | `LOG_FORMAT` | `text` (`json` for structured output) |
//! | `SCORING_WEIGHTS_PATH` | unset (built-in weights) |
//! | `EVIDENCE_WINDOW_HOURS`, `ANALYSIS_WINDOW_HOURS`, `WORKFLOW_WINDOW_HOURS`, `DEADLINE_WARNING_HOURS`, `TICK_INTERVAL_SECS` | see [`WorkflowConfig`] |

use std::path::PathBuf;

use tvda_arbitration::ArbitrationError;
use tvda_workflow::WorkflowConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Listen port.
    pub port: u16,
    /// Log output format.
    pub log_format: LogFormat,
    /// YAML file with scoring weights.
    pub weights_path: Option<PathBuf>,
    /// Workflow timing.
    pub workflow: WorkflowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_format: LogFormat::Text,
            weights_path: None,
            workflow: WorkflowConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            None => 8080,
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string(), raw))?,
        };
        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "LOG_FORMAT".to_string(),
                    other.to_string(),
                ))
            }
        };
        let weights_path = lookup("SCORING_WEIGHTS_PATH")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let workflow = WorkflowConfig::from_lookup(&lookup)?;
        Ok(Self {
            port,
            log_format,
            weights_path,
            workflow,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
    #[error(transparent)]
    Workflow(#[from] tvda_workflow::ConfigError),
    #[error(transparent)]
    Weights(#[from] ArbitrationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("LOG_FORMAT", "json"),
            ("SCORING_WEIGHTS_PATH", "/etc/tvda/weights.yaml"),
            ("WORKFLOW_WINDOW_HOURS", "96"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.weights_path, Some(PathBuf::from("/etc/tvda/weights.yaml")));
        assert_eq!(config.workflow.workflow_window, chrono::Duration::hours(96));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("EVIDENCE_WINDOW_HOURS", "0")])),
            Err(ConfigError::Workflow(_))
        ));
    }
}
