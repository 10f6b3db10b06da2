//! # Arbitration Error Types
//!
//! Structured error hierarchy for the arbitration domain. Every variant
//! carries the identifiers and state an operator needs to diagnose the
//! failure without inspecting logs.
//!
//! Data-quality conditions (missing evidence, absent SLA data) are never
//! errors here; they flow into anomalies and the confidence score.

use thiserror::Error;

/// Errors arising from arbitration operations.
#[derive(Error, Debug)]
pub enum ArbitrationError {
    /// No dispute with this identifier exists.
    #[error("dispute {dispute_id} not found")]
    DisputeNotFound {
        /// The dispute identifier.
        dispute_id: String,
    },

    /// No transaction with this identifier exists.
    #[error("transaction {transaction_id} not found")]
    TransactionNotFound {
        /// The transaction identifier.
        transaction_id: String,
    },

    /// No arbitration case has been opened for the dispute.
    #[error("no arbitration case for dispute {dispute_id}")]
    CaseNotFound {
        /// The dispute identifier.
        dispute_id: String,
    },

    /// Attempted stage change is not valid from the current stage.
    #[error("invalid workflow transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// The current stage name.
        from: String,
        /// The attempted target stage name.
        to: String,
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// Dispute is terminal for automated processing.
    #[error("dispute {dispute_id} is in terminal stage {stage}")]
    TerminalState {
        /// The dispute identifier.
        dispute_id: String,
        /// The terminal stage name.
        stage: String,
    },

    /// The submitter is not the party allowed to supply this evidence type.
    #[error("{submitter} may not submit {evidence_type} for dispute {dispute_id}: {reason}")]
    UnauthorizedSubmitter {
        /// The dispute identifier.
        dispute_id: String,
        /// Who attempted the submission.
        submitter: String,
        /// The evidence type submitted.
        evidence_type: String,
        /// Which party is allowed instead.
        reason: String,
    },

    /// The evidence type cannot be submitted through the external path.
    #[error("evidence type {evidence_type} is produced by the platform and cannot be submitted")]
    SystemOnlyEvidence {
        /// The evidence type submitted.
        evidence_type: String,
    },

    /// Evidence payload does not have the basic shape of its type.
    #[error("malformed {evidence_type} payload: {reason}")]
    MalformedEvidence {
        /// The evidence type.
        evidence_type: String,
        /// What is wrong with the payload.
        reason: String,
    },

    /// The dispute no longer accepts evidence.
    #[error("dispute {dispute_id} is {status} and no longer accepts evidence")]
    EvidenceClosed {
        /// The dispute identifier.
        dispute_id: String,
        /// The dispute status.
        status: String,
    },

    /// The scorer cannot run yet, e.g. no unified packet exists.
    #[error("arbitration for dispute {dispute_id} is not ready: {reason}")]
    ScoringNotReady {
        /// The dispute identifier.
        dispute_id: String,
        /// What is missing.
        reason: String,
    },

    /// Scoring weights are out of range.
    #[error("invalid scoring weights: {0}")]
    InvalidWeights(String),

    /// Scoring weights file could not be loaded.
    #[error("failed to load scoring weights from {path}: {reason}")]
    WeightsLoad {
        /// Path of the weights file.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Unknown dispute type string.
    #[error("unsupported dispute type: \"{0}\"")]
    InvalidDisputeType(String),

    /// Unknown evidence type string.
    #[error("unsupported evidence type: \"{0}\"")]
    InvalidEvidenceType(String),

    /// Canonicalization error during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] tvda_core::CanonicalizationError),

    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] tvda_core::ValidationError),
}

impl ArbitrationError {
    /// Whether the error is a missing-record condition.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DisputeNotFound { .. } | Self::TransactionNotFound { .. } | Self::CaseNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let err = ArbitrationError::InvalidTransition {
            from: "ai_analysis".to_string(),
            to: "evidence_collection".to_string(),
            reason: "stages only move forward".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("ai_analysis"));
        assert!(msg.contains("evidence_collection"));
        assert!(msg.contains("only move forward"));
    }

    #[test]
    fn unauthorized_submitter_display() {
        let err = ArbitrationError::UnauthorizedSubmitter {
            dispute_id: "dispute:1".to_string(),
            submitter: "user:2".to_string(),
            evidence_type: "vendor_logs".to_string(),
            reason: "only the counterparty may submit vendor logs".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("user:2"));
        assert!(msg.contains("vendor_logs"));
    }

    #[test]
    fn not_found_classification() {
        assert!(ArbitrationError::DisputeNotFound {
            dispute_id: "d".to_string()
        }
        .is_not_found());
        assert!(!ArbitrationError::InvalidWeights("x".to_string()).is_not_found());
    }

    #[test]
    fn validation_wraps() {
        let err: ArbitrationError =
            tvda_core::ValidationError::InvalidAmount("1.234".to_string()).into();
        assert!(format!("{err}").contains("1.234"));
    }
}
