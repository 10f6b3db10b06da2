//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps workflow and arbitration errors to HTTP status codes and returns a
//! JSON body with a machine-readable code and a message. Internal error
//! details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use tvda_arbitration::ArbitrationError;
use tvda_workflow::WorkflowError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller may not perform this action (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A collaborator call failed; retry later (502).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream(_) => tracing::warn!(error = %self, "collaborator failure"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ArbitrationError> for AppError {
    fn from(err: ArbitrationError) -> Self {
        match &err {
            ArbitrationError::DisputeNotFound { .. }
            | ArbitrationError::TransactionNotFound { .. }
            | ArbitrationError::CaseNotFound { .. } => Self::NotFound(err.to_string()),
            ArbitrationError::UnauthorizedSubmitter { .. }
            | ArbitrationError::SystemOnlyEvidence { .. } => Self::Forbidden(err.to_string()),
            ArbitrationError::InvalidTransition { .. }
            | ArbitrationError::TerminalState { .. }
            | ArbitrationError::EvidenceClosed { .. }
            | ArbitrationError::ScoringNotReady { .. } => Self::Conflict(err.to_string()),
            ArbitrationError::MalformedEvidence { .. }
            | ArbitrationError::InvalidDisputeType(_)
            | ArbitrationError::InvalidEvidenceType(_)
            | ArbitrationError::Validation(_) => Self::Validation(err.to_string()),
            ArbitrationError::InvalidWeights(_)
            | ArbitrationError::WeightsLoad { .. }
            | ArbitrationError::Canonicalization(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Arbitration(e) => e.into(),
            WorkflowError::Gateway(e) => Self::Upstream(e.to_string()),
            e @ WorkflowError::NotAParty { .. } => Self::Forbidden(e.to_string()),
            e @ (WorkflowError::DuplicateDispute { .. }
            | WorkflowError::LeaseHeld { .. }
            | WorkflowError::VersionConflict { .. }) => Self::Conflict(e.to_string()),
            e @ WorkflowError::InvalidOverride(_) => Self::Validation(e.to_string()),
        }
    }
}

impl From<tvda_core::ValidationError> for AppError {
    fn from(err: tvda_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
