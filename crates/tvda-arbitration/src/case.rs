//! # Arbitration Cases
//!
//! One [`ArbitrationCase`] per dispute holds the scorer's ruling, the
//! recommended payouts, and any human override.
//!
//! ## Override Invariant
//!
//! Once a reviewer has supplied a [`HumanOverride`], re-scoring refreshes the
//! analysis but never touches the override fields, and
//! [`ArbitrationCase::effective_payouts`] keeps returning the override split.

use serde::{Deserialize, Serialize};

use tvda_core::{Amount, CaseId, DisputeId, Timestamp, TransactionId};

use crate::error::ArbitrationError;
use crate::scoring::{ArbitrationDecision, Payouts};
use crate::store::Store;

/// Processing status of an arbitration case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Case opened, no evidence packet yet.
    Initiated,
    /// A unified packet has been built.
    EvidenceCollected,
    /// The scorer is running.
    Analyzing,
    /// A ruling is available for disbursement.
    RulingGenerated,
    /// Funds were disbursed.
    Resolved,
    /// A forced scoring attempt failed.
    Failed,
    /// Handed to a human reviewer.
    HumanReview,
}

impl CaseStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::EvidenceCollected => "evidence_collected",
            Self::Analyzing => "analyzing",
            Self::RulingGenerated => "ruling_generated",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
            Self::HumanReview => "human_review",
        }
    }

    /// Whether no further automated change is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer-supplied payout split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanOverride {
    /// Refund to the buyer.
    pub buyer_payout: Amount,
    /// Release to the vendor.
    pub vendor_payout: Amount,
    /// When the override was recorded.
    pub reviewed_at: Timestamp,
    /// Reviewer note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HumanOverride {
    /// The override as a payout split.
    pub fn payouts(&self) -> Payouts {
        Payouts {
            buyer: self.buyer_payout,
            vendor: self.vendor_payout,
        }
    }
}

/// The arbitration record for one dispute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationCase {
    /// Case identifier.
    pub id: CaseId,
    /// The dispute this case belongs to.
    pub dispute_id: DisputeId,
    /// The disputed transaction.
    pub transaction_id: TransactionId,
    /// Processing status.
    pub status: CaseStatus,
    /// Buyer fault from the latest ruling.
    pub buyer_fault: f64,
    /// Vendor fault from the latest ruling.
    pub vendor_fault: f64,
    /// Recommended refund to the buyer.
    pub buyer_payout: Amount,
    /// Recommended release to the vendor.
    pub vendor_payout: Amount,
    /// Ruling summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Ruling confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Full scorer output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ArbitrationDecision>,
    /// Whether a human has ruled on this case.
    pub human_reviewed: bool,
    /// The human ruling, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_override: Option<HumanOverride>,
    /// Why the last forced scoring attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl ArbitrationCase {
    /// Open a case with no ruling.
    pub fn new(dispute_id: DisputeId, transaction_id: TransactionId, now: Timestamp) -> Self {
        Self {
            id: CaseId::new(),
            dispute_id,
            transaction_id,
            status: CaseStatus::Initiated,
            buyer_fault: 0.0,
            vendor_fault: 0.0,
            buyer_payout: Amount::ZERO,
            vendor_payout: Amount::ZERO,
            summary: None,
            confidence: None,
            analysis: None,
            human_reviewed: false,
            human_override: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Store a ruling.
    ///
    /// The status moves to `ruling_generated` unless the case is already
    /// resolved or under human review.
    pub fn apply_decision(&mut self, decision: ArbitrationDecision, now: Timestamp) {
        self.buyer_fault = decision.fault.buyer;
        self.vendor_fault = decision.fault.vendor;
        self.buyer_payout = decision.payouts.buyer;
        self.vendor_payout = decision.payouts.vendor;
        self.summary = Some(decision.summary.clone());
        self.confidence = Some(decision.confidence);
        self.analysis = Some(decision);
        self.failure_reason = None;
        if !self.human_reviewed && !matches!(self.status, CaseStatus::Resolved | CaseStatus::HumanReview) {
            self.status = CaseStatus::RulingGenerated;
        }
        self.updated_at = now;
    }

    /// Record a human ruling. Replaces any earlier override.
    pub fn apply_override(&mut self, ruling: HumanOverride, now: Timestamp) -> Result<(), ArbitrationError> {
        if self.status == CaseStatus::Resolved {
            return Err(ArbitrationError::InvalidTransition {
                from: self.status.to_string(),
                to: CaseStatus::HumanReview.to_string(),
                reason: "case already resolved".to_string(),
            });
        }
        self.human_reviewed = true;
        self.human_override = Some(ruling);
        self.status = CaseStatus::HumanReview;
        self.updated_at = now;
        Ok(())
    }

    /// Set a bookkeeping status. A resolved case stays resolved.
    pub fn set_status(&mut self, status: CaseStatus, now: Timestamp) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Record a failed forced scoring attempt.
    pub fn mark_failed(&mut self, reason: &str, now: Timestamp) {
        self.failure_reason = Some(reason.to_string());
        self.set_status(CaseStatus::Failed, now);
    }

    /// Whether an automated ruling is ready for disbursement.
    pub fn has_ruling(&self) -> bool {
        self.status == CaseStatus::RulingGenerated
    }

    /// The split to disburse: the override if present, else the ruling.
    pub fn effective_payouts(&self) -> Option<Payouts> {
        if let Some(ruling) = &self.human_override {
            return Some(ruling.payouts());
        }
        self.analysis.as_ref().map(|_| Payouts {
            buyer: self.buyer_payout,
            vendor: self.vendor_payout,
        })
    }
}

/// Case records keyed by dispute.
#[derive(Debug, Clone, Default)]
pub struct CaseStore {
    cases: Store<DisputeId, ArbitrationCase>,
}

impl CaseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the case for a dispute, or return the existing one.
    pub fn open(&self, dispute_id: DisputeId, transaction_id: TransactionId, now: Timestamp) -> ArbitrationCase {
        self.cases.upsert(
            dispute_id,
            || ArbitrationCase::new(dispute_id, transaction_id, now),
            |case| case.clone(),
        )
    }

    /// The case for a dispute.
    pub fn get(&self, dispute_id: &DisputeId) -> Option<ArbitrationCase> {
        self.cases.get(dispute_id)
    }

    /// The case for a dispute, or `CaseNotFound`.
    pub fn require(&self, dispute_id: &DisputeId) -> Result<ArbitrationCase, ArbitrationError> {
        self.get(dispute_id).ok_or_else(|| ArbitrationError::CaseNotFound {
            dispute_id: dispute_id.to_string(),
        })
    }

    /// Apply a fallible mutation to an existing case.
    pub fn update<R>(
        &self,
        dispute_id: &DisputeId,
        f: impl FnOnce(&mut ArbitrationCase) -> Result<R, ArbitrationError>,
    ) -> Result<R, ArbitrationError> {
        self.cases.try_update(dispute_id, f).unwrap_or_else(|| {
            Err(ArbitrationError::CaseNotFound {
                dispute_id: dispute_id.to_string(),
            })
        })
    }

    /// Persist a ruling, creating the case if needed.
    pub fn record_decision(
        &self,
        transaction_id: TransactionId,
        decision: ArbitrationDecision,
        now: Timestamp,
    ) -> ArbitrationCase {
        let dispute_id = decision.dispute_id;
        self.cases.upsert(
            dispute_id,
            || ArbitrationCase::new(dispute_id, transaction_id, now),
            |case| {
                case.apply_decision(decision, now);
                case.clone()
            },
        )
    }

    /// Record a human ruling, creating the case if needed.
    pub fn record_override(
        &self,
        dispute_id: DisputeId,
        transaction_id: TransactionId,
        ruling: HumanOverride,
        now: Timestamp,
    ) -> Result<ArbitrationCase, ArbitrationError> {
        self.cases.upsert(
            dispute_id,
            || ArbitrationCase::new(dispute_id, transaction_id, now),
            |case| {
                case.apply_override(ruling, now)?;
                Ok(case.clone())
            },
        )
    }

    /// All cases.
    pub fn list(&self) -> Vec<ArbitrationCase> {
        self.cases.list()
    }
}
