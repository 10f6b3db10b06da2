//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Cloning is cheap: every store is behind an
//! `Arc`.

use std::sync::Arc;

use tvda_arbitration::{ArbitrationScorer, InMemoryLedger, ScoringWeights};
use tvda_workflow::ArbitrationService;

use crate::config::{AppConfig, ConfigError};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<AppConfig>,
    /// Escrow transactions, registered through `/v1/transactions`.
    pub ledger: Arc<InMemoryLedger>,
    /// The arbitration service.
    pub service: ArbitrationService,
}

impl AppState {
    /// State with default configuration and built-in scoring weights.
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let service = ArbitrationService::builder(ledger.clone()).build();
        Self::from_parts(AppConfig::default(), ledger, service)
    }

    /// State for a loaded configuration. Reads the weights file if one is
    /// configured.
    pub fn with_config(config: AppConfig) -> Result<Self, ConfigError> {
        let weights = match &config.weights_path {
            Some(path) => {
                let weights = ScoringWeights::load(path)?;
                tracing::info!(path = %path.display(), "loaded scoring weights");
                weights
            }
            None => ScoringWeights::default(),
        };
        let ledger = Arc::new(InMemoryLedger::new());
        let service = ArbitrationService::builder(ledger.clone())
            .scorer(ArbitrationScorer::new(weights))
            .config(config.workflow.clone())
            .build();
        Ok(Self::from_parts(config, ledger, service))
    }

    /// Assemble state from an existing ledger and service.
    pub fn from_parts(config: AppConfig, ledger: Arc<InMemoryLedger>, service: ArbitrationService) -> Self {
        Self {
            config: Arc::new(config),
            ledger,
            service,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn weights_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "vendor_fault_per_violation: 0.25").unwrap();
        let config = AppConfig {
            weights_path: Some(file.path().to_path_buf()),
            ..AppConfig::default()
        };
        let state = AppState::with_config(config).unwrap();
        assert_eq!(state.service.scorer().weights().vendor_fault_per_violation, 0.25);
        assert_eq!(state.service.scorer().weights().quality_base, 0.5);
    }

    #[test]
    fn missing_weights_file_is_an_error() {
        let config = AppConfig {
            weights_path: Some("/nonexistent/weights.yaml".into()),
            ..AppConfig::default()
        };
        assert!(matches!(
            AppState::with_config(config),
            Err(ConfigError::Weights(_))
        ));
    }
}
