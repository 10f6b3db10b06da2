//! # Arbitration Service
//!
//! The operations the rest of the platform calls:
//!
//! | Operation | Method |
//! |---|---|
//! | create a dispute and start its workflow | [`ArbitrationService::create_dispute`] |
//! | submit vendor logs or buyer evidence | [`ArbitrationService::submit_evidence`] |
//! | read dispute, workflow, ruling and evidence state | [`ArbitrationService::get_status`] |
//! | score now, regardless of stage | [`ArbitrationService::run_arbitration_manually`] |
//! | hand to a person, optionally with a payout override | [`ArbitrationService::escalate_to_human`] |
//! | scheduler entry point | [`ArbitrationService::tick`] |
//!
//! Every state change on a dispute happens inside [`ArbitrationService::step`]
//! or an escalation, both under the dispute's lease and committed with a
//! version check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tvda_arbitration::{
    ArbitrationDecision, ArbitrationError, ArbitrationScorer, CaseStatus, CaseStore, Dispute,
    DisputeType, EvidenceAggregator, EvidenceItem, EvidenceStore, EvidenceType, HumanOverride,
    SystemEvent, TransactionLedger, WorkflowDeadlines, WorkflowStage,
};
use tvda_core::{Amount, CaseId, DisputeId, Timestamp, TransactionId, UserId};

use crate::clock::{Clock, SystemClock};
use crate::config::WorkflowConfig;
use crate::coordinator::{plan, DisputeView, Effect, REASON_MANUAL_ESCALATION};
use crate::error::WorkflowError;
use crate::executor::EffectExecutor;
use crate::gateway::{
    EscrowGateway, InMemoryEscrowGateway, LogNotificationSink, LogWebhookEmitter,
    NotificationKind, NotificationSink, WebhookEmitter,
};
use crate::repository::DisputeRepository;

// ── Requests and Reports ───────────────────────────────────────────────

/// Input to [`ArbitrationService::create_dispute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDispute {
    /// The disputed transaction.
    pub transaction_id: TransactionId,
    /// The party raising the dispute.
    pub raised_by: UserId,
    /// Short reason.
    pub reason: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Classification.
    pub dispute_type: DisputeType,
}

/// A reviewer's payout split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridePayouts {
    /// Refund to the buyer.
    pub buyer_payout: Amount,
    /// Release to the vendor.
    pub vendor_payout: Amount,
    /// Reviewer note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Workflow timing for a status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    /// Current stage.
    pub stage: WorkflowStage,
    /// Deadlines, once the workflow has started.
    pub deadlines: Option<WorkflowDeadlines>,
    /// Whole hours left before the workflow deadline.
    pub hours_remaining: Option<i64>,
    /// Past the workflow deadline without completing.
    pub overdue: bool,
    /// Handed to a person.
    pub escalated_to_human: bool,
}

/// Ruling details for a status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationSummary {
    /// Case identifier.
    pub case_id: CaseId,
    /// Case status.
    pub status: CaseStatus,
    /// Buyer fault.
    pub buyer_fault: f64,
    /// Vendor fault.
    pub vendor_fault: f64,
    /// Refund to the buyer that will be or was disbursed.
    pub buyer_payout: Amount,
    /// Release to the vendor that will be or was disbursed.
    pub vendor_payout: Amount,
    /// Ruling confidence.
    pub confidence: Option<f64>,
    /// Ruling summary.
    pub summary: Option<String>,
    /// Whether a human ruled.
    pub human_reviewed: bool,
}

/// Result of [`ArbitrationService::get_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeStatusReport {
    /// The dispute.
    pub dispute: Dispute,
    /// Workflow timing.
    pub workflow: WorkflowInfo,
    /// Ruling, if any.
    pub arbitration: Option<ArbitrationSummary>,
    /// Stored evidence items, packets included.
    pub evidence_count: usize,
    /// Internal logs plus at least one external source.
    pub evidence_complete: bool,
}

/// Result of [`ArbitrationService::escalate_to_human`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationAck {
    /// The dispute.
    pub dispute_id: DisputeId,
    /// Stage after escalation.
    pub stage: WorkflowStage,
    /// Whether an override was stored.
    pub override_recorded: bool,
    /// Whether the override was already disbursed.
    pub resolved: bool,
}

/// What one step did to one dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Moved to the next stage.
    Advanced {
        /// Previous stage.
        from: WorkflowStage,
        /// New stage.
        to: WorkflowStage,
    },
    /// Nothing due, or a retryable condition.
    Waiting {
        /// Why.
        reason: String,
    },
    /// Moved to human review.
    Escalated {
        /// Stage escalated from.
        from: WorkflowStage,
        /// Why.
        reason: String,
    },
    /// A human override was disbursed.
    Resolved,
    /// Another worker holds the dispute.
    Skipped {
        /// Why.
        reason: String,
    },
    /// A required effect failed; the stage is unchanged.
    Failed {
        /// Error message.
        error: String,
    },
}

/// One line of a [`TickReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEntry {
    /// The dispute.
    pub dispute_id: DisputeId,
    /// What happened.
    pub outcome: StepOutcome,
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick time.
    pub at: DateTime<Utc>,
    /// Per-dispute outcomes.
    pub entries: Vec<TickEntry>,
}

impl TickReport {
    /// Number of disputes visited.
    pub fn processed(&self) -> usize {
        self.entries.len()
    }

    /// Number of stage advances.
    pub fn advanced(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Advanced { .. }))
    }

    /// Number of escalations.
    pub fn escalated(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Escalated { .. }))
    }

    /// Number of failures.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Failed { .. }))
    }

    /// Outcome for one dispute.
    pub fn outcome_for(&self, dispute_id: &DisputeId) -> Option<&StepOutcome> {
        self.entries
            .iter()
            .find(|e| e.dispute_id == *dispute_id)
            .map(|e| &e.outcome)
    }

    fn count(&self, f: impl Fn(&StepOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| f(&e.outcome)).count()
    }
}

// ── Builder ────────────────────────────────────────────────────────────

/// Wires an [`ArbitrationService`]. Unset collaborators default to the
/// in-process implementations.
pub struct ServiceBuilder {
    ledger: Arc<dyn TransactionLedger>,
    escrow: Arc<dyn EscrowGateway>,
    notifier: Arc<dyn NotificationSink>,
    webhooks: Arc<dyn WebhookEmitter>,
    scorer: ArbitrationScorer,
    clock: Arc<dyn Clock>,
    config: WorkflowConfig,
}

impl ServiceBuilder {
    /// Use this escrow gateway.
    pub fn escrow(mut self, escrow: Arc<dyn EscrowGateway>) -> Self {
        self.escrow = escrow;
        self
    }

    /// Use this notification sink.
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use this webhook emitter.
    pub fn webhooks(mut self, webhooks: Arc<dyn WebhookEmitter>) -> Self {
        self.webhooks = webhooks;
        self
    }

    /// Use this scorer.
    pub fn scorer(mut self, scorer: ArbitrationScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Use this clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use this timing configuration.
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the service.
    pub fn build(self) -> ArbitrationService {
        let aggregator = EvidenceAggregator::new(EvidenceStore::new(), Arc::clone(&self.ledger));
        let executor = EffectExecutor::new(
            self.escrow,
            self.notifier,
            self.webhooks,
            self.ledger,
            aggregator,
            self.scorer,
            CaseStore::new(),
        );
        ArbitrationService {
            repo: DisputeRepository::new(),
            executor,
            config: self.config,
            clock: self.clock,
        }
    }
}

// ── Service ────────────────────────────────────────────────────────────

/// Dispute arbitration facade.
#[derive(Clone)]
pub struct ArbitrationService {
    repo: DisputeRepository,
    executor: EffectExecutor,
    config: WorkflowConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ArbitrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationService")
            .field("disputes", &self.repo.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ArbitrationService {
    /// Start wiring a service over a transaction ledger.
    pub fn builder(ledger: Arc<dyn TransactionLedger>) -> ServiceBuilder {
        ServiceBuilder {
            ledger,
            escrow: Arc::new(InMemoryEscrowGateway::new()),
            notifier: Arc::new(LogNotificationSink),
            webhooks: Arc::new(LogWebhookEmitter),
            scorer: ArbitrationScorer::default(),
            clock: Arc::new(SystemClock),
            config: WorkflowConfig::default(),
        }
    }

    /// Timing configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Current time according to the service clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The arbitration case store.
    pub fn cases(&self) -> &CaseStore {
        self.executor.cases()
    }

    /// The evidence store.
    pub fn evidence(&self) -> &EvidenceStore {
        self.executor.aggregator().store()
    }

    /// The scorer.
    pub fn scorer(&self) -> &ArbitrationScorer {
        self.executor.scorer()
    }

    /// All disputes, oldest first.
    pub fn list_disputes(&self) -> Vec<Dispute> {
        self.repo.list()
    }

    /// Open a dispute and run the first workflow step.
    ///
    /// # Errors
    ///
    /// Not-found for an unknown transaction, [`WorkflowError::NotAParty`]
    /// if the raiser is neither buyer nor vendor, and
    /// [`WorkflowError::DuplicateDispute`] if the transaction already has an
    /// open dispute.
    pub fn create_dispute(&self, request: NewDispute) -> Result<Dispute, WorkflowError> {
        let now = self.clock.now();
        let ledger = self.executor.ledger();
        let transaction = ledger.get(&request.transaction_id)?;
        if !transaction.involves(request.raised_by) {
            return Err(WorkflowError::NotAParty {
                user_id: request.raised_by.to_string(),
                transaction_id: transaction.id.to_string(),
            });
        }
        if let Some(existing) = self.repo.open_for_transaction(&transaction.id) {
            return Err(WorkflowError::DuplicateDispute {
                transaction_id: transaction.id.to_string(),
                dispute_id: existing.id.to_string(),
            });
        }

        let dispute = Dispute::raise(
            transaction.id,
            request.raised_by,
            request.reason,
            request.description,
            request.dispute_type,
            now,
        );
        self.repo.insert(dispute.clone());
        info!(
            dispute_id = %dispute.id,
            transaction_id = %transaction.id,
            dispute_type = %dispute.dispute_type,
            "dispute created"
        );

        let event = SystemEvent {
            event_type: "dispute_opened".to_string(),
            occurred_at: Timestamp::from_utc(now),
            details: serde_json::json!({ "dispute_id": dispute.id }),
        };
        if let Err(e) = ledger.record_event(&transaction.id, event) {
            warn!(dispute_id = %dispute.id, error = %e, "failed to record dispute event");
        }
        if let Err(e) = self.executor.notify(
            &dispute,
            NotificationKind::DisputeCreated,
            serde_json::json!({ "reason": dispute.reason, "dispute_type": dispute.dispute_type }),
        ) {
            warn!(dispute_id = %dispute.id, error = %e, "dispute notification not delivered");
        }
        if let Err(e) = self.executor.emit_disputed(&dispute) {
            warn!(dispute_id = %dispute.id, error = %e, "escrow.disputed webhook not delivered");
        }

        match self.step(dispute.id) {
            Ok(outcome) => info!(dispute_id = %dispute.id, ?outcome, "workflow initialized"),
            Err(e) => warn!(dispute_id = %dispute.id, error = %e, "workflow start deferred to next tick"),
        }
        self.repo.require(&dispute.id)
    }

    /// Accept evidence from a party.
    pub fn submit_evidence(
        &self,
        dispute_id: DisputeId,
        evidence_type: EvidenceType,
        payload: serde_json::Value,
        submitter: UserId,
    ) -> Result<EvidenceItem, WorkflowError> {
        let dispute = self.repo.require(&dispute_id)?;
        let now = Timestamp::from_utc(self.clock.now());
        Ok(self
            .executor
            .aggregator()
            .submit_external_evidence(&dispute, submitter, evidence_type, payload, now)?)
    }

    /// Dispute, workflow timing, ruling summary and evidence count.
    pub fn get_status(&self, dispute_id: DisputeId) -> Result<DisputeStatusReport, WorkflowError> {
        let dispute = self.repo.require(&dispute_id)?;
        let now = self.clock.now();
        let arbitration = self.cases().get(&dispute_id).map(|case| {
            let effective = case.effective_payouts();
            ArbitrationSummary {
                case_id: case.id,
                status: case.status,
                buyer_fault: case.buyer_fault,
                vendor_fault: case.vendor_fault,
                buyer_payout: effective.map(|p| p.buyer).unwrap_or(case.buyer_payout),
                vendor_payout: effective.map(|p| p.vendor).unwrap_or(case.vendor_payout),
                confidence: case.confidence,
                summary: case.summary.clone(),
                human_reviewed: case.human_reviewed,
            }
        });
        let workflow = WorkflowInfo {
            stage: dispute.workflow_stage,
            deadlines: dispute.deadlines,
            hours_remaining: dispute.deadlines.map(|d| d.remaining(now).num_hours()),
            overdue: dispute.is_overdue(now),
            escalated_to_human: dispute.escalated_to_human,
        };
        Ok(DisputeStatusReport {
            evidence_count: self.evidence().all(&dispute_id).len(),
            evidence_complete: self.executor.aggregator().is_complete(&dispute_id),
            arbitration,
            workflow,
            dispute,
        })
    }

    /// Build a fresh packet and score it now, whatever the stage.
    ///
    /// The ruling is recorded on the case; a human override is preserved.
    /// Stage changes are left to the next tick.
    pub fn run_arbitration_manually(&self, dispute_id: DisputeId) -> Result<ArbitrationDecision, WorkflowError> {
        let _lease = self.repo.try_lease(dispute_id)?;
        let dispute = self.repo.require(&dispute_id)?;
        let now = Timestamp::from_utc(self.clock.now());
        let aggregator = self.executor.aggregator();
        if !aggregator.store().has(&dispute_id, EvidenceType::TrustverifyLogs) {
            aggregator.fetch_internal_logs(&dispute, now)?;
        }
        aggregator.build_unified_packet(&dispute, now)?;
        let decision = self.executor.score(&dispute, now)?;
        info!(dispute_id = %dispute_id, stage = %dispute.workflow_stage, "manual arbitration run");
        Ok(decision)
    }

    /// Escalate to human review, optionally with a payout override that is
    /// disbursed immediately.
    pub fn escalate_to_human(
        &self,
        dispute_id: DisputeId,
        override_payouts: Option<OverridePayouts>,
    ) -> Result<EscalationAck, WorkflowError> {
        let lease = self.repo.try_lease(dispute_id)?;
        let snapshot = self.repo.require(&dispute_id)?;
        let now = self.clock.now();
        let ts = Timestamp::from_utc(now);

        if let Some(split) = &override_payouts {
            let transaction = self.executor.ledger().get(&snapshot.transaction_id)?;
            let total = split.buyer_payout.checked_add(split.vendor_payout).map_err(ArbitrationError::from)?;
            if total > transaction.amount {
                return Err(WorkflowError::InvalidOverride(format!(
                    "split of {total} exceeds transaction amount {}",
                    transaction.amount
                )));
            }
        }

        let mut working = snapshot.clone();
        working.escalate(now, REASON_MANUAL_ESCALATION)?;

        let cases = self.cases();
        cases.open(dispute_id, working.transaction_id, ts);
        cases.update(&dispute_id, |case| {
            case.set_status(CaseStatus::HumanReview, ts);
            Ok(())
        })?;
        if let Some(split) = &override_payouts {
            cases.record_override(
                dispute_id,
                working.transaction_id,
                HumanOverride {
                    buyer_payout: split.buyer_payout,
                    vendor_payout: split.vendor_payout,
                    reviewed_at: ts,
                    note: split.note.clone(),
                },
                ts,
            )?;
        }

        let newly_escalated = working != snapshot;
        if newly_escalated {
            self.repo.commit(working.clone(), snapshot.version)?;
            if let Err(e) = self.executor.notify(
                &working,
                NotificationKind::StageChanged,
                serde_json::json!({ "stage": WorkflowStage::HumanReview, "reason": REASON_MANUAL_ESCALATION }),
            ) {
                warn!(dispute_id = %dispute_id, error = %e, "escalation notification not delivered");
            }
        }
        info!(
            dispute_id = %dispute_id,
            from = %snapshot.workflow_stage,
            override_recorded = override_payouts.is_some(),
            "escalated to human review"
        );
        drop(lease);

        let resolved = if override_payouts.is_some() {
            matches!(self.step(dispute_id)?, StepOutcome::Resolved)
        } else {
            false
        };
        Ok(EscalationAck {
            dispute_id,
            stage: WorkflowStage::HumanReview,
            override_recorded: override_payouts.is_some(),
            resolved,
        })
    }

    /// Run one workflow step for every active dispute.
    ///
    /// A failure on one dispute is recorded in the report and never stops
    /// the others.
    pub fn tick(&self) -> TickReport {
        let at = self.clock.now();
        let entries: Vec<TickEntry> = self
            .repo
            .list()
            .into_iter()
            .filter(|d| d.workflow_stage != WorkflowStage::Completed && !d.status.is_settled())
            .map(|d| {
                let outcome = self.step(d.id).unwrap_or_else(|e| StepOutcome::Failed {
                    error: e.to_string(),
                });
                TickEntry {
                    dispute_id: d.id,
                    outcome,
                }
            })
            .collect();
        let report = TickReport { at, entries };
        info!(
            processed = report.processed(),
            advanced = report.advanced(),
            escalated = report.escalated(),
            failed = report.failed(),
            "workflow tick"
        );
        report
    }

    /// Plan and execute one step for one dispute under its lease.
    pub fn step(&self, dispute_id: DisputeId) -> Result<StepOutcome, WorkflowError> {
        let _lease = match self.repo.try_lease(dispute_id) {
            Ok(lease) => lease,
            Err(WorkflowError::LeaseHeld { .. }) => {
                return Ok(StepOutcome::Skipped {
                    reason: "dispute is being processed elsewhere".to_string(),
                })
            }
            Err(e) => return Err(e),
        };
        let snapshot = self.repo.require(&dispute_id)?;
        let now = self.clock.now();
        let case = self.cases().get(&dispute_id);
        let view = DisputeView {
            dispute: &snapshot,
            case: case.as_ref(),
            evidence_complete: self.executor.aggregator().is_complete(&dispute_id),
        };
        let plan = plan(view, now, &self.config);
        if plan.is_idle() {
            return Ok(StepOutcome::Waiting { reason: plan.reason });
        }

        let mut working = snapshot.clone();
        let execution = self.executor.execute(&plan, &mut working, now);
        if working != snapshot {
            self.repo.commit(working, snapshot.version)?;
        }

        let outcome = match (execution.failure, execution.committed) {
            (Some(WorkflowError::Arbitration(e @ ArbitrationError::ScoringNotReady { .. })), _) => {
                StepOutcome::Waiting { reason: e.to_string() }
            }
            (Some(e), _) => StepOutcome::Failed { error: e.to_string() },
            (None, Some(WorkflowStage::HumanReview)) => StepOutcome::Escalated {
                from: plan.from,
                reason: plan.reason,
            },
            (None, Some(to)) => StepOutcome::Advanced { from: plan.from, to },
            (None, None) if execution.completed.contains(&Effect::ResolveAfterReview) => StepOutcome::Resolved,
            (None, None) => StepOutcome::Waiting { reason: plan.reason },
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use tvda_arbitration::{InMemoryLedger, SlaTerms, Transaction};

    use crate::clock::ManualClock;
    use crate::gateway::{RecordingNotificationSink, RecordingWebhookEmitter, WebhookEventName};

    struct Harness {
        service: ArbitrationService,
        ledger: Arc<InMemoryLedger>,
        clock: ManualClock,
        notices: RecordingNotificationSink,
        webhooks: RecordingWebhookEmitter,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        let notices = RecordingNotificationSink::new();
        let webhooks = RecordingWebhookEmitter::new();
        let service = ArbitrationService::builder(ledger.clone())
            .clock(Arc::new(clock.clone()))
            .notifier(Arc::new(notices.clone()))
            .webhooks(Arc::new(webhooks.clone()))
            .build();
        Harness {
            service,
            ledger,
            clock,
            notices,
            webhooks,
        }
    }

    fn transaction(h: &Harness) -> Transaction {
        let txn = Transaction::new(
            UserId::new(),
            UserId::new(),
            Amount::parse("100.00").unwrap(),
            "USD",
            SlaTerms::default(),
            Timestamp::from_utc(h.clock.now() - Duration::days(2)),
        )
        .unwrap();
        h.ledger.insert(txn.clone());
        txn
    }

    fn new_dispute(txn: &Transaction) -> NewDispute {
        NewDispute {
            transaction_id: txn.id,
            raised_by: txn.buyer_id,
            reason: "not delivered".to_string(),
            description: String::new(),
            dispute_type: DisputeType::ItemNotReceived,
        }
    }

    #[test]
    fn create_starts_workflow_and_announces() {
        let h = harness();
        let txn = transaction(&h);
        let d = h.service.create_dispute(new_dispute(&txn)).unwrap();
        assert_eq!(d.workflow_stage, WorkflowStage::EvidenceCollection);
        assert!(d.escrow_frozen);
        assert!(d.deadlines.is_some());
        assert_eq!(h.notices.count(&d.id, NotificationKind::DisputeCreated), 1);
        assert_eq!(h.notices.count(&d.id, NotificationKind::EvidenceRequested), 1);
        assert_eq!(h.webhooks.named(WebhookEventName::EscrowDisputed).len(), 1);
        assert!(h.service.cases().get(&d.id).is_some());
    }

    #[test]
    fn create_rejects_strangers_and_duplicates() {
        let h = harness();
        let txn = transaction(&h);
        let mut req = new_dispute(&txn);
        req.raised_by = UserId::new();
        assert!(matches!(
            h.service.create_dispute(req),
            Err(WorkflowError::NotAParty { .. })
        ));
        h.service.create_dispute(new_dispute(&txn)).unwrap();
        assert!(matches!(
            h.service.create_dispute(new_dispute(&txn)),
            Err(WorkflowError::DuplicateDispute { .. })
        ));
        let mut unknown = new_dispute(&txn);
        unknown.transaction_id = TransactionId::new();
        assert!(h.service.create_dispute(unknown).unwrap_err().is_not_found());
    }

    #[test]
    fn failing_notifications_do_not_block() {
        let h = harness();
        h.notices.set_failing(true);
        let txn = transaction(&h);
        let d = h.service.create_dispute(new_dispute(&txn)).unwrap();
        assert_eq!(d.workflow_stage, WorkflowStage::EvidenceCollection);
    }

    #[test]
    fn status_reports_evidence_and_time() {
        let h = harness();
        let txn = transaction(&h);
        let d = h.service.create_dispute(new_dispute(&txn)).unwrap();
        h.service
            .submit_evidence(d.id, EvidenceType::BuyerEvidence, json!({"statement": "never arrived"}), txn.buyer_id)
            .unwrap();
        let status = h.service.get_status(d.id).unwrap();
        assert_eq!(status.evidence_count, 2);
        assert!(status.evidence_complete);
        assert_eq!(status.workflow.hours_remaining, Some(72));
        assert!(!status.workflow.overdue);
        assert_eq!(status.arbitration.unwrap().status, CaseStatus::Initiated);
    }

    #[test]
    fn lease_held_step_is_skipped() {
        let h = harness();
        let txn = transaction(&h);
        let d = h.service.create_dispute(new_dispute(&txn)).unwrap();
        let _lease = h.service.repo.try_lease(d.id).unwrap();
        assert!(matches!(h.service.step(d.id).unwrap(), StepOutcome::Skipped { .. }));
        assert!(matches!(
            h.service.run_arbitration_manually(d.id),
            Err(WorkflowError::LeaseHeld { .. })
        ));
    }

    #[test]
    fn override_above_amount_is_rejected() {
        let h = harness();
        let txn = transaction(&h);
        let d = h.service.create_dispute(new_dispute(&txn)).unwrap();
        let err = h
            .service
            .escalate_to_human(
                d.id,
                Some(OverridePayouts {
                    buyer_payout: Amount::parse("90.00").unwrap(),
                    vendor_payout: Amount::parse("20.00").unwrap(),
                    note: None,
                }),
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidOverride(_)));
        let status = h.service.get_status(d.id).unwrap();
        assert_eq!(status.workflow.stage, WorkflowStage::EvidenceCollection);
    }
}
