//! # Dispute Lifecycle
//!
//! A dispute moves through a fixed pipeline:
//!
//! ```text
//! Created ──▶ EvidenceCollection ──▶ AiAnalysis ──▶ FinalRuling ──▶ Completed
//!    │               │                   │               │
//!    └───────────────┴─────────┬─────────┴───────────────┘
//!                              ▼
//!                         HumanReview
//! ```
//!
//! `workflow_stage` only moves forward along the main line. `HumanReview`
//! is a side exit reachable from every non-terminal stage and is terminal
//! for automated processing; `Completed` is terminal outright.
//!
//! ## Design Choice: Validated Enum
//!
//! Stages are a runtime-checked enum rather than a typestate. Disputes are
//! persisted and served over HTTP where the stage is not known statically,
//! and the side exit applies to every non-terminal stage.
//!
//! Every change is appended to [`Dispute::transition_log`] and bumps
//! [`Dispute::version`], which callers use for compare-and-swap commits.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tvda_core::{DisputeId, TransactionId, UserId};

use crate::error::ArbitrationError;

// ── Dispute Types ──────────────────────────────────────────────────────

/// Classification of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    /// Goods or service never arrived.
    ItemNotReceived,
    /// The counterparty acted fraudulently.
    Scam,
    /// Delivered goods or service below the agreed standard.
    QualityIssue,
    /// The buyer did not authorize the charge.
    UnauthorizedCharge,
    /// A contractual service-level term was breached.
    SlaBreach,
    /// Anything else.
    Other,
}

impl DisputeType {
    /// All dispute types.
    pub fn all() -> &'static [DisputeType] {
        &[
            Self::ItemNotReceived,
            Self::Scam,
            Self::QualityIssue,
            Self::UnauthorizedCharge,
            Self::SlaBreach,
            Self::Other,
        ]
    }

    /// The canonical string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemNotReceived => "item_not_received",
            Self::Scam => "scam",
            Self::QualityIssue => "quality_issue",
            Self::UnauthorizedCharge => "unauthorized_charge",
            Self::SlaBreach => "sla_breach",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DisputeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DisputeType {
    type Err = ArbitrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ArbitrationError::InvalidDisputeType(s.to_string()))
    }
}

// ── Status and Stage ───────────────────────────────────────────────────

/// User-facing dispute status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Raised, workflow not yet started.
    Open,
    /// Waiting for evidence.
    EvidenceCollection,
    /// Evidence is being scored.
    AiAnalysis,
    /// A ruling exists and awaits execution.
    PendingRuling,
    /// Funds disbursed according to a ruling or override.
    Resolved,
    /// Closed without further action.
    Closed,
    /// Automated processing stopped; a person must decide.
    HumanReview,
}

impl DisputeStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::EvidenceCollection => "evidence_collection",
            Self::AiAnalysis => "ai_analysis",
            Self::PendingRuling => "pending_ruling",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::HumanReview => "human_review",
        }
    }

    /// Whether the dispute is finished from the user's point of view.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of the arbitration workflow. Drives every automated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Dispute recorded, workflow not started.
    Created,
    /// Collecting evidence from the platform and both parties.
    EvidenceCollection,
    /// Scoring the unified evidence packet.
    AiAnalysis,
    /// Executing the ruling.
    FinalRuling,
    /// Funds disbursed. Terminal.
    Completed,
    /// Escalated to a person. Terminal for automation.
    HumanReview,
}

impl WorkflowStage {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::EvidenceCollection => "evidence_collection",
            Self::AiAnalysis => "ai_analysis",
            Self::FinalRuling => "final_ruling",
            Self::Completed => "completed",
            Self::HumanReview => "human_review",
        }
    }

    /// Whether automated processing has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::HumanReview)
    }

    /// Valid target stages from this stage.
    pub fn valid_transitions(&self) -> &'static [WorkflowStage] {
        match self {
            Self::Created => &[Self::EvidenceCollection, Self::HumanReview],
            Self::EvidenceCollection => &[Self::AiAnalysis, Self::HumanReview],
            Self::AiAnalysis => &[Self::FinalRuling, Self::HumanReview],
            Self::FinalRuling => &[Self::Completed, Self::HumanReview],
            Self::Completed | Self::HumanReview => &[],
        }
    }

    /// The status a dispute shows while in this stage.
    pub fn status(&self) -> DisputeStatus {
        match self {
            Self::Created => DisputeStatus::Open,
            Self::EvidenceCollection => DisputeStatus::EvidenceCollection,
            Self::AiAnalysis => DisputeStatus::AiAnalysis,
            Self::FinalRuling => DisputeStatus::PendingRuling,
            Self::Completed => DisputeStatus::Resolved,
            Self::HumanReview => DisputeStatus::HumanReview,
        }
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Deadlines ──────────────────────────────────────────────────────────

/// Absolute deadlines opened when the workflow starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDeadlines {
    /// End of evidence collection.
    pub evidence_deadline: DateTime<Utc>,
    /// End of automated analysis.
    pub analysis_deadline: DateTime<Utc>,
    /// Hard ceiling for the whole workflow.
    pub workflow_deadline: DateTime<Utc>,
}

impl WorkflowDeadlines {
    /// Open deadlines measured from `start`.
    pub fn starting_at(
        start: DateTime<Utc>,
        evidence_window: Duration,
        analysis_window: Duration,
        workflow_window: Duration,
    ) -> Self {
        Self {
            evidence_deadline: start + evidence_window,
            analysis_deadline: start + analysis_window,
            workflow_deadline: start + workflow_window,
        }
    }

    /// Time left before the workflow deadline, floored at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.workflow_deadline - now).max(Duration::zero())
    }
}

// ── Transition Record ──────────────────────────────────────────────────

/// One stage change in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    /// Stage before the change.
    pub from: WorkflowStage,
    /// Stage after the change.
    pub to: WorkflowStage,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Why it happened.
    pub reason: String,
}

// ── The Dispute ────────────────────────────────────────────────────────

/// A claim opened by one party against an escrow transaction.
///
/// ## Invariant
///
/// `workflow_stage` only changes through [`Dispute::advance`] and
/// [`Dispute::escalate`], both of which validate against
/// [`WorkflowStage::valid_transitions`] and record the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    /// Dispute identifier.
    pub id: DisputeId,
    /// The disputed transaction.
    pub transaction_id: TransactionId,
    /// The user who raised the dispute.
    pub raised_by: UserId,
    /// Short reason given by the raiser.
    pub reason: String,
    /// Free-text description.
    pub description: String,
    /// Classification.
    pub dispute_type: DisputeType,
    /// User-facing status.
    pub status: DisputeStatus,
    /// Workflow stage.
    pub workflow_stage: WorkflowStage,
    /// Deadlines, set when the workflow starts.
    pub deadlines: Option<WorkflowDeadlines>,
    /// Whether the escrow gateway confirmed the freeze.
    pub escrow_frozen: bool,
    /// Whether the dispute was handed to a person.
    pub escalated_to_human: bool,
    /// Why it was escalated.
    pub escalation_reason: Option<String>,
    /// Whether the deadline-approaching notice went out.
    pub deadline_warning_sent: bool,
    /// Optimistic concurrency counter, bumped on every change.
    pub version: u64,
    /// When the dispute was raised.
    pub created_at: DateTime<Utc>,
    /// When the dispute last changed.
    pub updated_at: DateTime<Utc>,
    /// When funds were disbursed.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Stage history.
    pub transition_log: Vec<StageTransition>,
}

impl Dispute {
    /// Raise a dispute in the `Created` stage.
    pub fn raise(
        transaction_id: TransactionId,
        raised_by: UserId,
        reason: String,
        description: String,
        dispute_type: DisputeType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DisputeId::new(),
            transaction_id,
            raised_by,
            reason,
            description,
            dispute_type,
            status: DisputeStatus::Open,
            workflow_stage: WorkflowStage::Created,
            deadlines: None,
            escrow_frozen: false,
            escalated_to_human: false,
            escalation_reason: None,
            deadline_warning_sent: false,
            version: 0,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            transition_log: Vec::new(),
        }
    }

    /// Move along the main pipeline.
    ///
    /// # Errors
    ///
    /// [`ArbitrationError::TerminalState`] from a terminal stage,
    /// [`ArbitrationError::InvalidTransition`] for anything not in
    /// [`WorkflowStage::valid_transitions`].
    pub fn advance(
        &mut self,
        to: WorkflowStage,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), ArbitrationError> {
        self.require_transition(to)?;
        let from = self.workflow_stage;
        self.workflow_stage = to;
        self.status = to.status();
        if to == WorkflowStage::Completed {
            self.resolved_at = Some(now);
        }
        self.record_transition(from, to, now, reason);
        Ok(())
    }

    /// Side exit to `HumanReview`. Idempotent once escalated.
    pub fn escalate(&mut self, now: DateTime<Utc>, reason: &str) -> Result<(), ArbitrationError> {
        if self.workflow_stage == WorkflowStage::HumanReview {
            return Ok(());
        }
        self.require_transition(WorkflowStage::HumanReview)?;
        let from = self.workflow_stage;
        self.workflow_stage = WorkflowStage::HumanReview;
        self.status = DisputeStatus::HumanReview;
        self.escalated_to_human = true;
        self.escalation_reason = Some(reason.to_string());
        self.record_transition(from, WorkflowStage::HumanReview, now, reason);
        Ok(())
    }

    /// Mark a human-reviewed dispute as resolved. The stage stays
    /// `HumanReview`; only the status changes.
    pub fn resolve_after_review(&mut self, now: DateTime<Utc>) -> Result<(), ArbitrationError> {
        if self.workflow_stage != WorkflowStage::HumanReview {
            return Err(ArbitrationError::InvalidTransition {
                from: self.workflow_stage.to_string(),
                to: DisputeStatus::Resolved.to_string(),
                reason: "only escalated disputes are resolved by review".to_string(),
            });
        }
        if self.status != DisputeStatus::Resolved {
            self.status = DisputeStatus::Resolved;
            self.resolved_at = Some(now);
            self.touch(now);
        }
        Ok(())
    }

    /// Open the workflow deadlines.
    pub fn open_deadlines(&mut self, deadlines: WorkflowDeadlines, now: DateTime<Utc>) {
        self.deadlines = Some(deadlines);
        self.touch(now);
    }

    /// Record that the escrow freeze succeeded.
    pub fn mark_escrow_frozen(&mut self, now: DateTime<Utc>) {
        if !self.escrow_frozen {
            self.escrow_frozen = true;
            self.touch(now);
        }
    }

    /// Record that the deadline warning was sent.
    pub fn mark_deadline_warning_sent(&mut self, now: DateTime<Utc>) {
        if !self.deadline_warning_sent {
            self.deadline_warning_sent = true;
            self.touch(now);
        }
    }

    /// Whether the overall deadline has passed without completion.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.deadlines {
            Some(d) => now > d.workflow_deadline && self.workflow_stage != WorkflowStage::Completed,
            None => false,
        }
    }

    /// Whether parties may still submit evidence.
    pub fn accepts_evidence(&self) -> bool {
        !self.status.is_settled() && self.workflow_stage != WorkflowStage::Completed
    }

    fn require_transition(&self, to: WorkflowStage) -> Result<(), ArbitrationError> {
        if self.workflow_stage.is_terminal() {
            return Err(ArbitrationError::TerminalState {
                dispute_id: self.id.to_string(),
                stage: self.workflow_stage.to_string(),
            });
        }
        if !self.workflow_stage.valid_transitions().contains(&to) {
            return Err(ArbitrationError::InvalidTransition {
                from: self.workflow_stage.to_string(),
                to: to.to_string(),
                reason: "stages only move forward one step".to_string(),
            });
        }
        Ok(())
    }

    fn record_transition(
        &mut self,
        from: WorkflowStage,
        to: WorkflowStage,
        at: DateTime<Utc>,
        reason: &str,
    ) {
        self.transition_log.push(StageTransition {
            from,
            to,
            at,
            reason: reason.to_string(),
        });
        self.touch(at);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    fn dispute() -> Dispute {
        Dispute::raise(
            TransactionId::new(),
            UserId::new(),
            "never arrived".to_string(),
            "parcel missing".to_string(),
            DisputeType::ItemNotReceived,
            t0(),
        )
    }

    #[test]
    fn raise_starts_created_and_open() {
        let d = dispute();
        assert_eq!(d.workflow_stage, WorkflowStage::Created);
        assert_eq!(d.status, DisputeStatus::Open);
        assert_eq!(d.version, 0);
        assert!(d.transition_log.is_empty());
    }

    #[test]
    fn full_pipeline_forward() {
        let mut d = dispute();
        for stage in [
            WorkflowStage::EvidenceCollection,
            WorkflowStage::AiAnalysis,
            WorkflowStage::FinalRuling,
            WorkflowStage::Completed,
        ] {
            d.advance(stage, t0(), "test").unwrap();
        }
        assert_eq!(d.status, DisputeStatus::Resolved);
        assert_eq!(d.resolved_at, Some(t0()));
        assert_eq!(d.transition_log.len(), 4);
        assert_eq!(d.version, 4);
    }

    #[test]
    fn cannot_skip_or_go_back() {
        let mut d = dispute();
        let err = d.advance(WorkflowStage::AiAnalysis, t0(), "skip").unwrap_err();
        assert!(matches!(err, ArbitrationError::InvalidTransition { .. }));
        d.advance(WorkflowStage::EvidenceCollection, t0(), "start").unwrap();
        d.advance(WorkflowStage::AiAnalysis, t0(), "next").unwrap();
        assert!(d.advance(WorkflowStage::EvidenceCollection, t0(), "back").is_err());
    }

    #[test]
    fn escalation_is_terminal_and_idempotent() {
        let mut d = dispute();
        d.advance(WorkflowStage::EvidenceCollection, t0(), "start").unwrap();
        d.escalate(t0(), "manual escalation").unwrap();
        assert!(d.escalated_to_human);
        assert_eq!(d.status, DisputeStatus::HumanReview);
        let version = d.version;
        d.escalate(t0(), "again").unwrap();
        assert_eq!(d.version, version);
        let err = d.advance(WorkflowStage::AiAnalysis, t0(), "resume").unwrap_err();
        assert!(matches!(err, ArbitrationError::TerminalState { .. }));
    }

    #[test]
    fn completed_cannot_escalate() {
        let mut d = dispute();
        d.workflow_stage = WorkflowStage::Completed;
        assert!(d.escalate(t0(), "late").is_err());
    }

    #[test]
    fn resolve_after_review_keeps_stage() {
        let mut d = dispute();
        d.escalate(t0(), "manual escalation").unwrap();
        d.resolve_after_review(t0()).unwrap();
        assert_eq!(d.workflow_stage, WorkflowStage::HumanReview);
        assert_eq!(d.status, DisputeStatus::Resolved);
        assert!(!d.accepts_evidence());
    }

    #[test]
    fn overdue_only_after_workflow_deadline() {
        let mut d = dispute();
        assert!(!d.is_overdue(t0() + Duration::hours(100)));
        d.open_deadlines(
            WorkflowDeadlines::starting_at(t0(), Duration::hours(24), Duration::hours(48), Duration::hours(72)),
            t0(),
        );
        assert!(!d.is_overdue(t0() + Duration::hours(72)));
        assert!(d.is_overdue(t0() + Duration::hours(72) + Duration::seconds(1)));
    }

    #[test]
    fn remaining_floors_at_zero() {
        let dl = WorkflowDeadlines::starting_at(t0(), Duration::hours(24), Duration::hours(48), Duration::hours(72));
        assert_eq!(dl.remaining(t0() + Duration::hours(60)), Duration::hours(12));
        assert_eq!(dl.remaining(t0() + Duration::hours(90)), Duration::zero());
    }

    #[test]
    fn dispute_type_round_trip_strings() {
        for t in DisputeType::all() {
            assert_eq!(t.as_str().parse::<DisputeType>().unwrap(), *t);
            assert_eq!(serde_json::to_value(t).unwrap(), serde_json::json!(t.as_str()));
        }
        assert!("chargeback".parse::<DisputeType>().is_err());
    }
}
