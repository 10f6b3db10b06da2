#![deny(missing_docs)]

//! # tvda-core — Foundational Types for Dispute Arbitration
//!
//! Every other crate in the workspace depends on `tvda-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`DisputeId`] cannot be passed
//!    where a [`TransactionId`] is expected.
//!
//! 2. **Money is fixed-point.** [`Amount`] holds integer minor units and
//!    serializes as a two-decimal string. Payout arithmetic never goes
//!    through a float on the wire.
//!
//! 3. **`CanonicalBytes` is the sole path to digests.** Evidence digests and
//!    ruling fingerprints are computed from sorted-key compact JSON, so the
//!    same logical content always hashes to the same value.
//!
//! 4. **UTC-only timestamps.** [`Timestamp`] is UTC, truncated to seconds.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tvda-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, CoreError, ValidationError};
pub use identity::{CaseId, DisputeId, EvidenceItemId, PartyRef, TransactionId, UserId};
pub use money::Amount;
pub use temporal::Timestamp;
