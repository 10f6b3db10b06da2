//! End-to-end workflow scenarios driven by a manual clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use tvda_arbitration::{
    ArbitrationError, CaseStatus, DisputeStatus, DisputeType, EvidenceType, InMemoryLedger,
    SlaTerms, SystemEvent, Transaction, TransactionLedger, WorkflowStage,
};
use tvda_core::{Amount, DisputeId, Timestamp, TransactionId, UserId};
use tvda_workflow::gateway::{EscrowCall, EscrowOperation};
use tvda_workflow::{
    ArbitrationService, Clock, EscrowGateway, InMemoryEscrowGateway, ManualClock, NewDispute, NotificationKind,
    OverridePayouts, RecordingNotificationSink, RecordingWebhookEmitter, StepOutcome,
    WebhookEventName,
};

struct World {
    service: ArbitrationService,
    ledger: Arc<InMemoryLedger>,
    clock: ManualClock,
    escrow: InMemoryEscrowGateway,
    notices: RecordingNotificationSink,
    webhooks: RecordingWebhookEmitter,
}

fn world() -> World {
    let ledger = Arc::new(InMemoryLedger::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap());
    let escrow = InMemoryEscrowGateway::new();
    let notices = RecordingNotificationSink::new();
    let webhooks = RecordingWebhookEmitter::new();
    let service = ArbitrationService::builder(ledger.clone())
        .clock(Arc::new(clock.clone()))
        .escrow(Arc::new(escrow.clone()))
        .notifier(Arc::new(notices.clone()))
        .webhooks(Arc::new(webhooks.clone()))
        .build();
    World {
        service,
        ledger,
        clock,
        escrow,
        notices,
        webhooks,
    }
}

fn amount(s: &str) -> Amount {
    Amount::parse(s).unwrap()
}

fn transaction(w: &World, total: &str, terms: SlaTerms) -> Transaction {
    let txn = Transaction::new(
        UserId::new(),
        UserId::new(),
        amount(total),
        "USD",
        terms,
        Timestamp::from_utc(w.clock.now() - Duration::days(3)),
    )
    .unwrap();
    w.ledger.insert(txn.clone());
    txn
}

fn open(w: &World, txn: &Transaction, dispute_type: DisputeType) -> DisputeId {
    w.service
        .create_dispute(NewDispute {
            transaction_id: txn.id,
            raised_by: txn.buyer_id,
            reason: "contract not honored".to_string(),
            description: "see evidence".to_string(),
            dispute_type,
        })
        .unwrap()
        .id
}

fn stage(w: &World, id: DisputeId) -> WorkflowStage {
    w.service.get_status(id).unwrap().dispute.workflow_stage
}

fn moved(w: &World, op: EscrowOperation) -> Vec<Amount> {
    w.escrow
        .calls()
        .into_iter()
        .filter(|c: &EscrowCall| c.operation == op)
        .filter_map(|c| c.amount)
        .collect()
}

fn uptime_terms() -> SlaTerms {
    SlaTerms {
        uptime_requirement: Some(99.9),
        ..SlaTerms::default()
    }
}

fn submit_full_evidence(w: &World, id: DisputeId, txn: &Transaction) {
    w.service
        .submit_evidence(
            id,
            EvidenceType::VendorLogs,
            json!({
                "entries": [{"timestamp": "2026-05-01T08:00:00Z", "event_type": "monthly_report"}],
                "metrics": {"uptime": 98.0}
            }),
            txn.vendor_id,
        )
        .unwrap();
    w.service
        .submit_evidence(
            id,
            EvidenceType::BuyerEvidence,
            json!({"statement": "service was down for days", "amount": "1000.00"}),
            txn.buyer_id,
        )
        .unwrap();
}

#[test]
fn sla_breach_runs_to_completion_with_split_payout() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::SlaBreach);
    assert_eq!(stage(&w, id), WorkflowStage::EvidenceCollection);
    assert!(w.escrow.is_frozen(&txn.id));

    submit_full_evidence(&w, id, &txn);
    w.clock.advance(Duration::minutes(5));

    let report = w.service.tick();
    assert_eq!(
        report.outcome_for(&id),
        Some(&StepOutcome::Advanced {
            from: WorkflowStage::EvidenceCollection,
            to: WorkflowStage::AiAnalysis
        })
    );
    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::FinalRuling);
    let case = w.service.cases().get(&id).unwrap();
    assert_eq!(case.status, CaseStatus::RulingGenerated);
    assert!((case.vendor_fault - 0.46).abs() < 1e-9);

    w.service.tick();
    let status = w.service.get_status(id).unwrap();
    assert_eq!(status.dispute.workflow_stage, WorkflowStage::Completed);
    assert_eq!(status.dispute.status, DisputeStatus::Resolved);
    assert_eq!(status.arbitration.unwrap().status, CaseStatus::Resolved);
    assert_eq!(moved(&w, EscrowOperation::Release), vec![amount("540.00")]);
    assert_eq!(moved(&w, EscrowOperation::Refund), vec![amount("460.00")]);

    let resolved = w.webhooks.named(WebhookEventName::ArbitrationResolved);
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].payload["buyer_payout"], json!("460.00"));
    assert_eq!(resolved[0].accounts, vec![txn.buyer_id, txn.vendor_id]);

    // Completed disputes are no longer visited.
    assert_eq!(w.service.tick().outcome_for(&id), None);
    assert_eq!(w.escrow.calls().len(), 3);
}

#[test]
fn incomplete_evidence_waits_for_the_evidence_deadline() {
    let w = world();
    let txn = transaction(&w, "100.00", SlaTerms::default());
    let id = open(&w, &txn, DisputeType::ItemNotReceived);
    assert!(!w.service.get_status(id).unwrap().evidence_complete);

    w.clock.advance(Duration::hours(12));
    assert!(matches!(
        w.service.tick().outcome_for(&id),
        Some(StepOutcome::Waiting { .. })
    ));
    assert_eq!(stage(&w, id), WorkflowStage::EvidenceCollection);

    w.clock.advance(Duration::hours(12));
    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::AiAnalysis);
    w.service.tick();
    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::Completed);

    let paid: i64 = w
        .escrow
        .calls()
        .iter()
        .filter_map(|c| c.amount)
        .map(|a| a.minor_units())
        .sum();
    assert!(paid <= txn.amount.minor_units());
    assert_eq!(moved(&w, EscrowOperation::Refund), vec![amount("20.00")]);
    assert_eq!(moved(&w, EscrowOperation::Release), vec![amount("80.00")]);
}

#[test]
fn overdue_dispute_escalates_and_never_completes() {
    let w = world();
    let txn = transaction(&w, "250.00", SlaTerms::default());
    let id = open(&w, &txn, DisputeType::QualityIssue);

    w.clock.advance(Duration::hours(73));
    let report = w.service.tick();
    assert!(matches!(
        report.outcome_for(&id),
        Some(StepOutcome::Escalated { from: WorkflowStage::EvidenceCollection, .. })
    ));

    for _ in 0..3 {
        w.clock.advance(Duration::hours(1));
        w.service.tick();
    }
    let status = w.service.get_status(id).unwrap();
    assert_eq!(status.dispute.workflow_stage, WorkflowStage::HumanReview);
    assert!(status.dispute.escalated_to_human);
    assert_eq!(
        status.dispute.transition_log.last().map(|t| t.reason.as_str()),
        Some("workflow deadline exceeded")
    );
    assert_eq!(status.arbitration.unwrap().status, CaseStatus::HumanReview);
    assert!(moved(&w, EscrowOperation::Release).is_empty());
    assert!(moved(&w, EscrowOperation::Refund).is_empty());
}

#[test]
fn human_override_refunds_in_full_without_scoring() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::Scam);

    let ack = w
        .service
        .escalate_to_human(
            id,
            Some(OverridePayouts {
                buyer_payout: amount("1000.00"),
                vendor_payout: Amount::ZERO,
                note: Some("confirmed fraud".to_string()),
            }),
        )
        .unwrap();
    assert!(ack.override_recorded);
    assert!(ack.resolved);

    assert_eq!(moved(&w, EscrowOperation::Refund), vec![amount("1000.00")]);
    assert!(moved(&w, EscrowOperation::Release).is_empty());

    let case = w.service.cases().get(&id).unwrap();
    assert_eq!(case.status, CaseStatus::Resolved);
    assert!(case.human_reviewed);
    assert!(case.analysis.is_none());

    let status = w.service.get_status(id).unwrap();
    assert_eq!(status.dispute.workflow_stage, WorkflowStage::HumanReview);
    assert_eq!(status.dispute.status, DisputeStatus::Resolved);
    let resolved = w.webhooks.named(WebhookEventName::ArbitrationResolved);
    assert_eq!(resolved[0].payload["resolution"], json!("human_review"));

    w.service.tick();
    assert_eq!(w.escrow.calls().iter().filter(|c| c.amount.is_some()).count(), 1);
}

#[test]
fn partial_override_refunds_the_remainder_to_the_buyer() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::Scam);

    let ack = w
        .service
        .escalate_to_human(
            id,
            Some(OverridePayouts {
                buyer_payout: amount("400.00"),
                vendor_payout: amount("250.00"),
                note: None,
            }),
        )
        .unwrap();
    assert!(ack.resolved);

    assert_eq!(moved(&w, EscrowOperation::Release), vec![amount("250.00")]);
    assert_eq!(moved(&w, EscrowOperation::Refund), vec![amount("750.00")]);
    let state = w.escrow.disbursement_state(&txn.id).unwrap();
    assert_eq!(state.released.checked_add(state.refunded).unwrap(), txn.amount);
}

#[test]
fn full_refund_override_below_amount_empties_escrow() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::Scam);
    w.service
        .escalate_to_human(
            id,
            Some(OverridePayouts {
                buyer_payout: amount("400.00"),
                vendor_payout: Amount::ZERO,
                note: None,
            }),
        )
        .unwrap();

    assert!(moved(&w, EscrowOperation::Release).is_empty());
    assert_eq!(moved(&w, EscrowOperation::Refund), vec![amount("1000.00")]);
    assert_eq!(w.service.get_status(id).unwrap().dispute.status, DisputeStatus::Resolved);

    // Nothing further is moved on later ticks.
    w.service.tick();
    assert_eq!(w.escrow.calls().iter().filter(|c| c.amount.is_some()).count(), 1);
}

#[test]
fn escalation_without_override_halts_automation() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::SlaBreach);
    submit_full_evidence(&w, id, &txn);
    w.service.tick();
    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::FinalRuling);

    let ack = w.service.escalate_to_human(id, None).unwrap();
    assert!(!ack.resolved);
    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::HumanReview);
    assert!(moved(&w, EscrowOperation::Release).is_empty());

    // A later override resumes disbursement with the reviewer's split.
    let ack = w
        .service
        .escalate_to_human(
            id,
            Some(OverridePayouts {
                buyer_payout: amount("300.00"),
                vendor_payout: amount("700.00"),
                note: None,
            }),
        )
        .unwrap();
    assert!(ack.resolved);
    assert_eq!(moved(&w, EscrowOperation::Release), vec![amount("700.00")]);
    assert_eq!(moved(&w, EscrowOperation::Refund), vec![amount("300.00")]);
}

#[test]
fn failed_disbursement_is_retried_without_double_payment() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::SlaBreach);
    submit_full_evidence(&w, id, &txn);
    w.service.tick();
    w.service.tick();

    // Release succeeds, refund fails: the stage must not complete.
    w.escrow.fail_next(EscrowOperation::Refund, 1);
    let report = w.service.tick();
    assert!(matches!(report.outcome_for(&id), Some(StepOutcome::Failed { .. })));
    assert_eq!(stage(&w, id), WorkflowStage::FinalRuling);

    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::Completed);
    assert_eq!(moved(&w, EscrowOperation::Release), vec![amount("540.00")]);
    assert_eq!(moved(&w, EscrowOperation::Refund), vec![amount("460.00")]);
}

#[test]
fn failed_freeze_does_not_block_the_workflow() {
    let w = world();
    w.escrow.fail_next(EscrowOperation::Freeze, 1);
    let txn = transaction(&w, "50.00", SlaTerms::default());
    let id = open(&w, &txn, DisputeType::Other);
    let status = w.service.get_status(id).unwrap();
    assert_eq!(status.dispute.workflow_stage, WorkflowStage::EvidenceCollection);
    assert!(!status.dispute.escrow_frozen);
}

#[test]
fn one_failing_dispute_does_not_stop_the_tick() {
    let w = world();
    let a = transaction(&w, "1000.00", uptime_terms());
    let b = transaction(&w, "1000.00", uptime_terms());
    let id_a = open(&w, &a, DisputeType::SlaBreach);
    let id_b = open(&w, &b, DisputeType::SlaBreach);
    submit_full_evidence(&w, id_a, &a);
    submit_full_evidence(&w, id_b, &b);
    w.service.tick();
    w.service.tick();

    w.escrow.fail_next(EscrowOperation::Query, 1);
    let report = w.service.tick();
    assert_eq!(report.failed(), 1);
    assert_eq!(report.advanced(), 1);
}

#[test]
fn concurrent_ticks_disburse_once() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::SlaBreach);
    submit_full_evidence(&w, id, &txn);
    w.service.tick();
    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::FinalRuling);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                w.service.tick();
            });
        }
    });
    assert_eq!(stage(&w, id), WorkflowStage::Completed);
    assert_eq!(moved(&w, EscrowOperation::Release).len(), 1);
    assert_eq!(moved(&w, EscrowOperation::Refund).len(), 1);
}

#[test]
fn deadline_warning_is_sent_once() {
    let w = world();
    let txn = transaction(&w, "80.00", SlaTerms::default());
    let id = open(&w, &txn, DisputeType::Other);
    w.clock.advance(Duration::hours(61));
    for _ in 0..4 {
        w.service.tick();
    }
    assert_eq!(w.notices.count(&id, NotificationKind::DeadlineApproaching), 1);
    assert!(w.service.get_status(id).unwrap().dispute.deadline_warning_sent);
}

#[test]
fn manual_run_is_reused_by_the_workflow() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::SlaBreach);
    submit_full_evidence(&w, id, &txn);

    let decision = w.service.run_arbitration_manually(id).unwrap();
    assert_eq!(decision.payouts.buyer, amount("460.00"));
    assert_eq!(stage(&w, id), WorkflowStage::EvidenceCollection);

    w.service.tick();
    w.service.tick();
    assert_eq!(stage(&w, id), WorkflowStage::FinalRuling);
    assert_eq!(w.notices.count(&id, NotificationKind::RulingGenerated), 1);
}

#[test]
fn evidence_rules_are_enforced() {
    let w = world();
    let txn = transaction(&w, "100.00", SlaTerms::default());
    let id = open(&w, &txn, DisputeType::QualityIssue);

    let err = w
        .service
        .submit_evidence(id, EvidenceType::BuyerEvidence, json!({"statement": "x"}), txn.vendor_id)
        .unwrap_err();
    assert!(err.to_string().contains("may not submit"));
    let err = w
        .service
        .submit_evidence(id, EvidenceType::TrustverifyLogs, json!({}), txn.buyer_id)
        .unwrap_err();
    assert!(err.to_string().contains("cannot be submitted"));
    assert!(w
        .service
        .submit_evidence(DisputeId::new(), EvidenceType::BuyerEvidence, json!({}), txn.buyer_id)
        .unwrap_err()
        .is_not_found());
    assert_eq!(w.service.get_status(id).unwrap().evidence_count, 1);
}

#[test]
fn ledger_records_dispute_and_disbursement_events() {
    let w = world();
    let txn = transaction(&w, "1000.00", uptime_terms());
    let id = open(&w, &txn, DisputeType::SlaBreach);
    submit_full_evidence(&w, id, &txn);
    for _ in 0..3 {
        w.service.tick();
    }
    let events: Vec<String> = w
        .ledger
        .get(&txn.id)
        .unwrap()
        .events
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(events, vec!["dispute_opened", "escrow_released", "escrow_refunded"]);
}

/// Ledger whose transactions can be made temporarily unreadable.
struct FlakyLedger {
    inner: InMemoryLedger,
    hidden: AtomicBool,
}

impl TransactionLedger for FlakyLedger {
    fn get(&self, id: &TransactionId) -> Result<Transaction, ArbitrationError> {
        if self.hidden.load(Ordering::SeqCst) {
            return Err(ArbitrationError::TransactionNotFound {
                transaction_id: id.to_string(),
            });
        }
        self.inner.get(id)
    }

    fn record_event(&self, id: &TransactionId, event: SystemEvent) -> Result<(), ArbitrationError> {
        self.inner.record_event(id, event)
    }
}

#[test]
fn analysis_retries_until_ready_and_marks_forced_failure() {
    let ledger = Arc::new(FlakyLedger {
        inner: InMemoryLedger::new(),
        hidden: AtomicBool::new(false),
    });
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap());
    let escrow = InMemoryEscrowGateway::new();
    let service = ArbitrationService::builder(ledger.clone())
        .clock(Arc::new(clock.clone()))
        .escrow(Arc::new(escrow.clone()))
        .build();

    let txn = Transaction::new(
        UserId::new(),
        UserId::new(),
        amount("1000.00"),
        "USD",
        uptime_terms(),
        Timestamp::from_utc(clock.now() - Duration::days(3)),
    )
    .unwrap();
    ledger.inner.insert(txn.clone());
    let id = service
        .create_dispute(NewDispute {
            transaction_id: txn.id,
            raised_by: txn.buyer_id,
            reason: "outage".to_string(),
            description: String::new(),
            dispute_type: DisputeType::SlaBreach,
        })
        .unwrap()
        .id;
    service
        .submit_evidence(
            id,
            EvidenceType::VendorLogs,
            json!({
                "entries": [{"timestamp": "2026-05-01T08:00:00Z", "event_type": "monthly_report"}],
                "metrics": {"uptime": 98.0}
            }),
            txn.vendor_id,
        )
        .unwrap();
    service
        .submit_evidence(id, EvidenceType::BuyerEvidence, json!({"statement": "down"}), txn.buyer_id)
        .unwrap();
    service.tick();
    let stage_of = |id| service.get_status(id).unwrap().dispute.workflow_stage;
    assert_eq!(stage_of(id), WorkflowStage::AiAnalysis);

    // Scoring cannot read the transaction: wait in place.
    ledger.hidden.store(true, Ordering::SeqCst);
    match service.tick().outcome_for(&id) {
        Some(StepOutcome::Waiting { reason }) => assert!(reason.contains("not ready"), "{reason}"),
        other => panic!("expected waiting, got {other:?}"),
    }
    assert_eq!(stage_of(id), WorkflowStage::AiAnalysis);
    assert_ne!(service.cases().get(&id).unwrap().status, CaseStatus::Failed);

    // Past the analysis deadline the forced attempt fails and is recorded.
    clock.advance(Duration::hours(49));
    assert!(matches!(
        service.tick().outcome_for(&id),
        Some(StepOutcome::Waiting { .. })
    ));
    assert_eq!(stage_of(id), WorkflowStage::AiAnalysis);
    let case = service.cases().get(&id).unwrap();
    assert_eq!(case.status, CaseStatus::Failed);
    assert!(case.failure_reason.is_some());

    // Once the dependency is back the next attempt produces a ruling.
    ledger.hidden.store(false, Ordering::SeqCst);
    service.tick();
    assert_eq!(stage_of(id), WorkflowStage::FinalRuling);
    assert_eq!(service.cases().get(&id).unwrap().status, CaseStatus::RulingGenerated);
}
