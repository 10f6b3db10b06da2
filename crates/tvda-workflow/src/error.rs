//! # Workflow Errors

use thiserror::Error;

use tvda_arbitration::ArbitrationError;

use crate::gateway::GatewayError;

/// Errors from workflow operations.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Domain error from the arbitration model.
    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),

    /// A required collaborator call failed.
    #[error("collaborator call failed: {0}")]
    Gateway(#[from] GatewayError),

    /// The user is neither buyer nor vendor of the transaction.
    #[error("user {user_id} is not a party to transaction {transaction_id}")]
    NotAParty {
        /// The caller.
        user_id: String,
        /// The transaction.
        transaction_id: String,
    },

    /// The transaction already has an unsettled dispute.
    #[error("transaction {transaction_id} already has open dispute {dispute_id}")]
    DuplicateDispute {
        /// The transaction.
        transaction_id: String,
        /// The existing dispute.
        dispute_id: String,
    },

    /// Another worker holds this dispute.
    #[error("dispute {dispute_id} is being processed elsewhere")]
    LeaseHeld {
        /// The dispute.
        dispute_id: String,
    },

    /// The dispute changed between load and commit.
    #[error("version conflict on dispute {dispute_id}: expected {expected}, found {found}")]
    VersionConflict {
        /// The dispute.
        dispute_id: String,
        /// Version read.
        expected: u64,
        /// Version found at commit.
        found: u64,
    },

    /// An override split that cannot be honored.
    #[error("invalid override: {0}")]
    InvalidOverride(String),
}

impl WorkflowError {
    /// Whether the error means a referenced record is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Arbitration(e) if e.is_not_found())
    }

    /// Whether retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Gateway(_)
                | Self::LeaseHeld { .. }
                | Self::VersionConflict { .. }
                | Self::Arbitration(ArbitrationError::ScoringNotReady { .. })
        )
    }
}
