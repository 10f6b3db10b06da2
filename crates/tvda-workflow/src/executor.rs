//! # Effect Executor
//!
//! Performs the effects of a [`Plan`] against the collaborators and the
//! arbitration stores, then commits the plan's target stage on the local
//! dispute copy.
//!
//! ## Failure Model
//!
//! Effects run in order. When a required effect fails (see
//! [`Effect::is_required`]) execution stops and the stage is not committed,
//! so the next tick retries the same plan. Optional effects (escrow freeze,
//! notifications, webhooks) log their failure and execution continues.
//!
//! ## Idempotent Disbursement
//!
//! Before moving money the executor reads
//! [`EscrowGateway::disbursement_state`] and pays only the difference
//! between the target split and what the gateway reports as already paid.
//! The vendor leg is the (scaled) vendor payout; the buyer leg is the rest
//! of the transaction amount, so nothing stays held once a dispute
//! completes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use tvda_arbitration::{
    ArbitrationCase, ArbitrationDecision, ArbitrationError, ArbitrationScorer, CaseStatus,
    CaseStore, Dispute, EvidenceAggregator, Payouts, ScoringInput, SystemEvent, TransactionLedger,
    WorkflowStage,
};
use tvda_core::{Timestamp, UserId};

use crate::coordinator::{fit_payouts, Effect, Plan};
use crate::error::WorkflowError;
use crate::gateway::{
    EscrowGateway, Notification, NotificationKind, NotificationSink, WebhookEmitter, WebhookEvent,
    WebhookEventName,
};

/// Result of executing one plan.
#[derive(Debug)]
pub struct Execution {
    /// Effects that completed, in order.
    pub completed: Vec<Effect>,
    /// Stage committed on the dispute copy, if any.
    pub committed: Option<WorkflowStage>,
    /// The required effect failure that stopped execution.
    pub failure: Option<WorkflowError>,
}

/// Runs workflow effects.
#[derive(Clone)]
pub struct EffectExecutor {
    escrow: Arc<dyn EscrowGateway>,
    notifier: Arc<dyn NotificationSink>,
    webhooks: Arc<dyn WebhookEmitter>,
    ledger: Arc<dyn TransactionLedger>,
    aggregator: EvidenceAggregator,
    scorer: ArbitrationScorer,
    cases: CaseStore,
}

impl std::fmt::Debug for EffectExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectExecutor")
            .field("escrow", &self.escrow.gateway_name())
            .field("scorer", &self.scorer)
            .finish_non_exhaustive()
    }
}

impl EffectExecutor {
    /// Wire an executor.
    pub fn new(
        escrow: Arc<dyn EscrowGateway>,
        notifier: Arc<dyn NotificationSink>,
        webhooks: Arc<dyn WebhookEmitter>,
        ledger: Arc<dyn TransactionLedger>,
        aggregator: EvidenceAggregator,
        scorer: ArbitrationScorer,
        cases: CaseStore,
    ) -> Self {
        Self {
            escrow,
            notifier,
            webhooks,
            ledger,
            aggregator,
            scorer,
            cases,
        }
    }

    /// Execute `plan` against `dispute`, which the caller commits afterwards.
    pub fn execute(&self, plan: &Plan, dispute: &mut Dispute, now: DateTime<Utc>) -> Execution {
        let mut completed = Vec::with_capacity(plan.effects.len());
        for effect in &plan.effects {
            match self.apply(effect, plan, dispute, now) {
                Ok(()) => completed.push(effect.clone()),
                Err(e) if effect.is_required() => {
                    warn!(
                        dispute_id = %dispute.id,
                        stage = %dispute.workflow_stage,
                        effect = ?effect,
                        error = %e,
                        "required effect failed; stage not advanced"
                    );
                    return Execution {
                        completed,
                        committed: None,
                        failure: Some(e),
                    };
                }
                Err(e) => {
                    warn!(dispute_id = %dispute.id, effect = ?effect, error = %e, "optional effect failed");
                }
            }
        }

        let Some(to) = plan.to else {
            return Execution {
                completed,
                committed: None,
                failure: None,
            };
        };
        let result = if to == WorkflowStage::HumanReview {
            dispute.escalate(now, &plan.reason)
        } else {
            dispute.advance(to, now, &plan.reason)
        };
        match result {
            Ok(()) => {
                info!(
                    dispute_id = %dispute.id,
                    from = %plan.from,
                    to = %to,
                    reason = %plan.reason,
                    "workflow stage changed"
                );
                Execution {
                    completed,
                    committed: Some(to),
                    failure: None,
                }
            }
            Err(e) => Execution {
                completed,
                committed: None,
                failure: Some(e.into()),
            },
        }
    }

    fn apply(
        &self,
        effect: &Effect,
        plan: &Plan,
        dispute: &mut Dispute,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let ts = Timestamp::from_utc(now);
        match effect {
            Effect::FreezeEscrow => {
                self.escrow.freeze(&dispute.transaction_id, &dispute.id)?;
                dispute.mark_escrow_frozen(now);
            }
            Effect::OpenDeadlines { deadlines } => dispute.open_deadlines(*deadlines, now),
            Effect::OpenCase => {
                self.cases.open(dispute.id, dispute.transaction_id, ts);
            }
            Effect::CaptureInternalLogs => {
                self.aggregator.fetch_internal_logs(dispute, ts)?;
            }
            Effect::BuildPacket => {
                self.aggregator.build_unified_packet(dispute, ts)?;
            }
            Effect::RunScorer { forced } => {
                if let Err(e) = self.score(dispute, ts) {
                    if *forced {
                        self.cases.open(dispute.id, dispute.transaction_id, ts);
                        self.cases.update(&dispute.id, |case| {
                            case.mark_failed(&e.to_string(), ts);
                            Ok(())
                        })?;
                        error!(dispute_id = %dispute.id, error = %e, "forced ruling attempt failed");
                    }
                    return Err(e);
                }
            }
            Effect::Disburse => self.disburse(dispute, now)?,
            Effect::SetCaseStatus { status } => {
                self.cases.open(dispute.id, dispute.transaction_id, ts);
                self.cases.update(&dispute.id, |case| {
                    case.set_status(*status, ts);
                    Ok(())
                })?;
            }
            Effect::ResolveAfterReview => dispute.resolve_after_review(now)?,
            Effect::Notify { kind } => {
                let context = json!({
                    "stage": plan.to.unwrap_or(dispute.workflow_stage),
                    "reason": plan.reason,
                });
                self.notify(dispute, *kind, context)?;
            }
            Effect::WarnDeadline => {
                let remaining = dispute
                    .deadlines
                    .map(|d| d.remaining(now).num_hours())
                    .unwrap_or(0);
                self.notify(
                    dispute,
                    NotificationKind::DeadlineApproaching,
                    json!({ "hours_remaining": remaining }),
                )?;
                dispute.mark_deadline_warning_sent(now);
            }
            Effect::EmitResolved => {
                let case = self.cases.require(&dispute.id)?;
                self.emit_resolved(dispute, &case)?;
            }
        }
        Ok(())
    }

    /// Score the latest packet and record the ruling on the case.
    ///
    /// A human override on the case survives re-scoring.
    pub fn score(&self, dispute: &Dispute, ts: Timestamp) -> Result<ArbitrationDecision, WorkflowError> {
        let packet = self
            .aggregator
            .store()
            .latest_packet(&dispute.id)
            .ok_or_else(|| ArbitrationError::ScoringNotReady {
                dispute_id: dispute.id.to_string(),
                reason: "no unified evidence packet".to_string(),
            })?;
        let transaction = self
            .ledger
            .get(&dispute.transaction_id)
            .map_err(|e| ArbitrationError::ScoringNotReady {
                dispute_id: dispute.id.to_string(),
                reason: format!("transaction unavailable: {e}"),
            })?;

        self.cases.open(dispute.id, dispute.transaction_id, ts);
        self.cases.update(&dispute.id, |case| {
            case.set_status(CaseStatus::Analyzing, ts);
            Ok(())
        })?;
        let decision = self.scorer.score(ScoringInput {
            packet: &packet,
            transaction: &transaction,
        });
        let case = self
            .cases
            .record_decision(dispute.transaction_id, decision.clone(), ts);
        info!(
            dispute_id = %dispute.id,
            case_id = %case.id,
            buyer_fault = decision.fault.buyer,
            vendor_fault = decision.fault.vendor,
            confidence = decision.confidence,
            "ruling generated"
        );
        if let Err(e) = self.notify(
            dispute,
            NotificationKind::RulingGenerated,
            json!({ "summary": decision.summary, "confidence": decision.confidence }),
        ) {
            warn!(dispute_id = %dispute.id, error = %e, "ruling notification not delivered");
        }
        Ok(decision)
    }

    fn disburse(&self, dispute: &Dispute, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        let case = self.cases.require(&dispute.id)?;
        let payouts = case
            .effective_payouts()
            .ok_or_else(|| ArbitrationError::ScoringNotReady {
                dispute_id: dispute.id.to_string(),
                reason: "case has no ruling or override".to_string(),
            })?;
        let transaction = self.ledger.get(&dispute.transaction_id)?;
        let target = fit_payouts(payouts, transaction.amount);
        if target != payouts {
            warn!(
                dispute_id = %dispute.id,
                buyer = %payouts.buyer,
                vendor = %payouts.vendor,
                amount = %transaction.amount,
                "payout split exceeds transaction amount; scaled down"
            );
        }

        let paid = self.escrow.disbursement_state(&transaction.id)?;
        let release = target.vendor.saturating_sub(paid.released);
        // The buyer receives everything not released to the vendor.
        let refund = transaction
            .amount
            .saturating_sub(target.vendor)
            .saturating_sub(paid.refunded);
        let ts = Timestamp::from_utc(now);

        if release.is_positive() {
            self.escrow.release(&transaction.id, release)?;
            self.record_event(dispute, "escrow_released", release, ts);
        }
        if refund.is_positive() {
            let reason = format!("arbitration of dispute {}", dispute.id);
            self.escrow.refund(&transaction.id, refund, &reason)?;
            self.record_event(dispute, "escrow_refunded", refund, ts);
        }
        if !release.is_positive() && !refund.is_positive() {
            debug!(dispute_id = %dispute.id, "disbursement already complete at gateway");
        }
        Ok(())
    }

    fn record_event(&self, dispute: &Dispute, event_type: &str, amount: tvda_core::Amount, ts: Timestamp) {
        let event = SystemEvent {
            event_type: event_type.to_string(),
            occurred_at: ts,
            details: json!({ "dispute_id": dispute.id, "amount": amount }),
        };
        if let Err(e) = self.ledger.record_event(&dispute.transaction_id, event) {
            warn!(dispute_id = %dispute.id, error = %e, "failed to record escrow event");
        }
    }

    /// Both parties of the disputed transaction, or the raiser alone if
    /// the transaction cannot be read.
    pub fn parties(&self, dispute: &Dispute) -> Vec<UserId> {
        match self.ledger.get(&dispute.transaction_id) {
            Ok(txn) => vec![txn.buyer_id, txn.vendor_id],
            Err(_) => vec![dispute.raised_by],
        }
    }

    /// Notify both parties.
    pub fn notify(
        &self,
        dispute: &Dispute,
        kind: NotificationKind,
        context: serde_json::Value,
    ) -> Result<(), WorkflowError> {
        let notification = Notification {
            kind,
            dispute_id: dispute.id,
            recipients: self.parties(dispute),
            context,
        };
        self.notifier.notify(&notification).map_err(|e| {
            warn!(dispute_id = %dispute.id, kind = %kind, error = %e, "notification not delivered");
            WorkflowError::from(e)
        })
    }

    /// Emit `escrow.disputed`.
    pub fn emit_disputed(&self, dispute: &Dispute) -> Result<(), WorkflowError> {
        let event = WebhookEvent {
            event: WebhookEventName::EscrowDisputed,
            accounts: self.parties(dispute),
            payload: json!({
                "dispute_id": dispute.id,
                "transaction_id": dispute.transaction_id,
                "dispute_type": dispute.dispute_type,
                "reason": dispute.reason,
            }),
        };
        Ok(self.webhooks.emit(&event)?)
    }

    fn emit_resolved(&self, dispute: &Dispute, case: &ArbitrationCase) -> Result<(), WorkflowError> {
        let payouts = case.effective_payouts().unwrap_or(Payouts {
            buyer: case.buyer_payout,
            vendor: case.vendor_payout,
        });
        let event = WebhookEvent {
            event: WebhookEventName::ArbitrationResolved,
            accounts: self.parties(dispute),
            payload: json!({
                "dispute_id": dispute.id,
                "transaction_id": dispute.transaction_id,
                "resolution": if case.human_reviewed { "human_review" } else { "automated" },
                "buyer_fault": case.buyer_fault,
                "vendor_fault": case.vendor_fault,
                "buyer_payout": payouts.buyer,
                "vendor_payout": payouts.vendor,
                "confidence": case.confidence,
            }),
        };
        Ok(self.webhooks.emit(&event)?)
    }

    /// The case store.
    pub fn cases(&self) -> &CaseStore {
        &self.cases
    }

    /// The evidence aggregator.
    pub fn aggregator(&self) -> &EvidenceAggregator {
        &self.aggregator
    }

    /// The transaction ledger.
    pub fn ledger(&self) -> &Arc<dyn TransactionLedger> {
        &self.ledger
    }

    /// The scorer.
    pub fn scorer(&self) -> &ArbitrationScorer {
        &self.scorer
    }
}
