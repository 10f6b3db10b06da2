//! # tvda-arbitration — Escrow Dispute Arbitration
//!
//! The domain model behind automated dispute resolution:
//!
//! - **Error** ([`error`]): Structured error hierarchy for the arbitration
//!   subsystem.
//!
//! - **Dispute** ([`dispute`]): Dispute records, the four-stage workflow
//!   state machine, deadlines and the transition audit log.
//!
//! - **Transaction** ([`transaction`]): The escrow transaction and its
//!   service-level terms, behind the [`TransactionLedger`] trait.
//!
//! - **Evidence** ([`evidence`], [`aggregator`]): Typed evidence items with
//!   content digests, submitter authorization, cross-validation and the
//!   unified packet.
//!
//! - **Scoring** ([`scoring`]): The deterministic arbitration scorer and its
//!   YAML-loadable weights.
//!
//! - **Case** ([`case`]): One arbitration case per dispute, holding the
//!   ruling and any human override.

pub mod aggregator;
pub mod case;
pub mod dispute;
pub mod error;
pub mod evidence;
pub mod scoring;
pub mod store;
pub mod transaction;

// Error types
pub use error::ArbitrationError;

// Dispute lifecycle
pub use dispute::{
    Dispute, DisputeStatus, DisputeType, StageTransition, WorkflowDeadlines, WorkflowStage,
};

// Transactions
pub use transaction::{
    InMemoryLedger, SlaTerms, SystemEvent, Transaction, TransactionLedger, TransactionStatus,
};

// Evidence
pub use aggregator::{cross_validate, CrossValidationRules, EvidenceAggregator};
pub use evidence::{
    BuyerEvidence, CrossValidation, EvidenceItem, EvidencePayload, EvidenceStore, EvidenceType,
    InternalLogEvidence, ItemSummary, UnifiedPacket, VendorLogEvidence,
};

// Scoring
pub use scoring::{
    ArbitrationDecision, ArbitrationScorer, FaultScores, MetricsExtractor, ObservedMetrics,
    PacketMetricsExtractor, Payouts, ScoringInput, ScoringWeights,
};

// Cases
pub use case::{ArbitrationCase, CaseStatus, CaseStore, HumanOverride};

pub use store::Store;
