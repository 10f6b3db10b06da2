//! # Error Types — Structured Error Hierarchy
//!
//! Base error types shared by every crate in the workspace. All errors use
//! `thiserror`; validation errors carry the rejected input so operators can
//! diagnose bad requests without reading logs.

use thiserror::Error;

/// Top-level error type for the foundational layer.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A domain primitive failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// A number could not be represented canonically (NaN or infinity).
    #[error("non-finite number is not permitted in canonical representations")]
    NonFiniteNumber,

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Monetary amount string is not a non-negative decimal with at most
    /// two fractional digits.
    #[error("invalid monetary amount: \"{0}\" (expected e.g. \"1000.00\")")]
    InvalidAmount(String),

    /// Monetary arithmetic left the representable range.
    #[error("monetary amount overflow in {operation}")]
    AmountOverflow {
        /// The arithmetic operation that overflowed.
        operation: String,
    },

    /// Currency code is not a three-letter ISO 4217 code.
    #[error("invalid currency code: \"{0}\" (expected 3 uppercase letters)")]
    InvalidCurrency(String),

    /// Timestamp string is not valid RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Identifier string is not a valid UUID (optionally prefixed).
    #[error("invalid {kind} identifier: \"{value}\"")]
    InvalidIdentifier {
        /// Identifier namespace, e.g. "dispute".
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_amount_display() {
        let err = ValidationError::InvalidAmount("12.345".to_string());
        assert!(format!("{err}").contains("12.345"));
    }

    #[test]
    fn overflow_display_names_operation() {
        let err = ValidationError::AmountOverflow {
            operation: "add".to_string(),
        };
        assert!(format!("{err}").contains("add"));
    }

    #[test]
    fn invalid_identifier_display() {
        let err = ValidationError::InvalidIdentifier {
            kind: "dispute",
            value: "nope".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("dispute"));
        assert!(msg.contains("nope"));
    }

    #[test]
    fn core_error_wraps_validation() {
        let err: CoreError = ValidationError::InvalidCurrency("usd".to_string()).into();
        assert!(format!("{err}").starts_with("validation error"));
    }
}
