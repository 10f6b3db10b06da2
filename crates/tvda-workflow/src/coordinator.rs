//! # Workflow Coordinator
//!
//! The stage machine as a pure function:
//!
//! ```text
//! plan(DisputeView, now, config) -> Plan { target stage, effects }
//! ```
//!
//! No I/O happens here. The [`crate::executor`] performs the effects and
//! commits the target stage only if every required effect succeeded.
//!
//! ## Precedence
//!
//! 1. `Completed` is idle. `HumanReview` is idle unless a human override is
//!    waiting to be disbursed.
//! 2. An overdue dispute escalates to `HumanReview`, whatever its stage.
//! 3. Otherwise the stage-specific rule applies. A deadline warning rides
//!    along with any plan once twelve hours or less remain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tvda_arbitration::{
    ArbitrationCase, CaseStatus, Dispute, Payouts, WorkflowDeadlines, WorkflowStage,
};

use crate::config::WorkflowConfig;
use crate::gateway::NotificationKind;

/// Escalation reason recorded when the workflow deadline passes.
pub const REASON_DEADLINE_EXCEEDED: &str = "workflow deadline exceeded";

/// Escalation reason recorded for operator escalation.
pub const REASON_MANUAL_ESCALATION: &str = "manual escalation";

/// What the planner sees of one dispute.
#[derive(Debug, Clone, Copy)]
pub struct DisputeView<'a> {
    /// The dispute.
    pub dispute: &'a Dispute,
    /// Its arbitration case, if opened.
    pub case: Option<&'a ArbitrationCase>,
    /// Internal logs plus at least one external source are present.
    pub evidence_complete: bool,
}

/// A side effect for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Freeze escrowed funds. Failure is logged, not fatal.
    FreezeEscrow,
    /// Record the workflow deadlines on the dispute.
    OpenDeadlines {
        /// Deadlines to record.
        deadlines: WorkflowDeadlines,
    },
    /// Create the arbitration case.
    OpenCase,
    /// Snapshot the platform's transaction record as evidence.
    CaptureInternalLogs,
    /// Build and store the unified packet.
    BuildPacket,
    /// Run the scorer and record its ruling.
    RunScorer {
        /// Past the analysis deadline: a failure marks the case failed.
        forced: bool,
    },
    /// Move funds according to the case.
    Disburse,
    /// Set a bookkeeping status on the case.
    SetCaseStatus {
        /// Status to set.
        status: CaseStatus,
    },
    /// Mark a reviewed dispute resolved without changing its stage.
    ResolveAfterReview,
    /// Notify both parties.
    Notify {
        /// Notification kind.
        kind: NotificationKind,
    },
    /// Send the once-only deadline warning.
    WarnDeadline,
    /// Emit `arbitration.resolved`.
    EmitResolved,
}

impl Effect {
    /// Whether a failure must keep the stage from advancing.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Self::OpenCase
                | Self::CaptureInternalLogs
                | Self::BuildPacket
                | Self::RunScorer { .. }
                | Self::Disburse
                | Self::SetCaseStatus { .. }
                | Self::ResolveAfterReview
        )
    }
}

/// The planner's decision for one dispute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Stage when planned.
    pub from: WorkflowStage,
    /// Stage to commit after the effects succeed.
    pub to: Option<WorkflowStage>,
    /// Effects, in execution order.
    pub effects: Vec<Effect>,
    /// Why; recorded in the transition log or reported as the wait reason.
    pub reason: String,
}

impl Plan {
    fn idle(from: WorkflowStage, reason: &str) -> Self {
        Self {
            from,
            to: None,
            effects: Vec::new(),
            reason: reason.to_string(),
        }
    }

    fn advance(from: WorkflowStage, to: WorkflowStage, effects: Vec<Effect>, reason: &str) -> Self {
        Self {
            from,
            to: Some(to),
            effects,
            reason: reason.to_string(),
        }
    }

    /// Whether the plan does nothing.
    pub fn is_idle(&self) -> bool {
        self.to.is_none() && self.effects.is_empty()
    }

    /// Whether the plan escalates.
    pub fn escalates(&self) -> bool {
        self.to == Some(WorkflowStage::HumanReview)
    }
}

/// Decide the next step for a dispute.
pub fn plan(view: DisputeView<'_>, now: DateTime<Utc>, config: &WorkflowConfig) -> Plan {
    let dispute = view.dispute;
    let stage = dispute.workflow_stage;

    match stage {
        WorkflowStage::Completed => return Plan::idle(stage, "workflow completed"),
        WorkflowStage::HumanReview => return plan_review(view),
        _ => {}
    }

    if dispute.is_overdue(now) {
        return Plan::advance(
            stage,
            WorkflowStage::HumanReview,
            vec![
                Effect::SetCaseStatus {
                    status: CaseStatus::HumanReview,
                },
                Effect::Notify {
                    kind: NotificationKind::StageChanged,
                },
            ],
            REASON_DEADLINE_EXCEEDED,
        );
    }

    let mut plan = match stage {
        WorkflowStage::Created => plan_created(dispute, now, config),
        WorkflowStage::EvidenceCollection => plan_evidence(view, now),
        WorkflowStage::AiAnalysis => plan_analysis(view, now),
        WorkflowStage::FinalRuling => plan_ruling(view),
        WorkflowStage::Completed | WorkflowStage::HumanReview => Plan::idle(stage, "terminal"),
    };

    if let Some(deadlines) = dispute.deadlines {
        if !dispute.deadline_warning_sent && deadlines.remaining(now) <= config.warning_threshold {
            plan.effects.push(Effect::WarnDeadline);
        }
    }
    plan
}

fn plan_created(dispute: &Dispute, now: DateTime<Utc>, config: &WorkflowConfig) -> Plan {
    let deadlines = dispute.deadlines.unwrap_or_else(|| {
        WorkflowDeadlines::starting_at(
            now,
            config.evidence_window,
            config.analysis_window,
            config.workflow_window,
        )
    });
    Plan::advance(
        WorkflowStage::Created,
        WorkflowStage::EvidenceCollection,
        vec![
            Effect::FreezeEscrow,
            Effect::OpenDeadlines { deadlines },
            Effect::OpenCase,
            Effect::CaptureInternalLogs,
            Effect::Notify {
                kind: NotificationKind::EvidenceRequested,
            },
        ],
        "workflow started",
    )
}

fn plan_evidence(view: DisputeView<'_>, now: DateTime<Utc>) -> Plan {
    let stage = WorkflowStage::EvidenceCollection;
    let deadline_passed = view
        .dispute
        .deadlines
        .map(|d| now >= d.evidence_deadline)
        .unwrap_or(true);
    if !view.evidence_complete && !deadline_passed {
        return Plan::idle(stage, "awaiting evidence");
    }
    let reason = if view.evidence_complete {
        "evidence complete"
    } else {
        "evidence window closed"
    };
    // Refresh so the packet sees events recorded since creation.
    let mut effects = vec![Effect::CaptureInternalLogs, Effect::BuildPacket];
    // A manual run may already have produced a ruling; keep its status.
    if view.case.map(|c| c.status == CaseStatus::Initiated).unwrap_or(true) {
        effects.push(Effect::SetCaseStatus {
            status: CaseStatus::EvidenceCollected,
        });
    }
    effects.push(Effect::Notify {
        kind: NotificationKind::StageChanged,
    });
    Plan::advance(stage, WorkflowStage::AiAnalysis, effects, reason)
}

fn plan_analysis(view: DisputeView<'_>, now: DateTime<Utc>) -> Plan {
    let stage = WorkflowStage::AiAnalysis;
    let notify = Effect::Notify {
        kind: NotificationKind::StageChanged,
    };
    if view.case.map(ArbitrationCase::has_ruling).unwrap_or(false) {
        return Plan::advance(stage, WorkflowStage::FinalRuling, vec![notify], "ruling available");
    }
    let forced = view
        .dispute
        .deadlines
        .map(|d| now > d.analysis_deadline)
        .unwrap_or(false);
    Plan::advance(
        stage,
        WorkflowStage::FinalRuling,
        vec![Effect::RunScorer { forced }, notify],
        if forced {
            "analysis deadline passed; forced ruling"
        } else {
            "ruling generated"
        },
    )
}

fn plan_ruling(view: DisputeView<'_>) -> Plan {
    let stage = WorkflowStage::FinalRuling;
    if view.dispute.escalated_to_human {
        return Plan::idle(stage, "awaiting manual resolution");
    }
    match view.case {
        Some(case) if case.has_ruling() => Plan::advance(
            stage,
            WorkflowStage::Completed,
            vec![
                Effect::Disburse,
                Effect::SetCaseStatus {
                    status: CaseStatus::Resolved,
                },
                Effect::EmitResolved,
                Effect::Notify {
                    kind: NotificationKind::StageChanged,
                },
            ],
            "ruling executed",
        ),
        _ => Plan::idle(stage, "no ruling available"),
    }
}

fn plan_review(view: DisputeView<'_>) -> Plan {
    let stage = WorkflowStage::HumanReview;
    let pending_override = view
        .case
        .map(|c| c.human_override.is_some() && c.status != CaseStatus::Resolved)
        .unwrap_or(false);
    if !pending_override {
        return Plan::idle(stage, "awaiting human review");
    }
    Plan {
        from: stage,
        to: None,
        effects: vec![
            Effect::Disburse,
            Effect::SetCaseStatus {
                status: CaseStatus::Resolved,
            },
            Effect::ResolveAfterReview,
            Effect::EmitResolved,
        ],
        reason: "human override executed".to_string(),
    }
}

/// Scale a split down proportionally so it fits `amount`.
///
/// Integer arithmetic on minor units, rounding each leg down, so the result
/// never exceeds `amount`. A split that already fits is returned unchanged.
pub fn fit_payouts(payouts: Payouts, amount: tvda_core::Amount) -> Payouts {
    let buyer = i128::from(payouts.buyer.minor_units());
    let vendor = i128::from(payouts.vendor.minor_units());
    let total = buyer + vendor;
    let cap = i128::from(amount.minor_units());
    if total <= cap || total == 0 {
        return payouts;
    }
    let scale = |leg: i128| -> tvda_core::Amount {
        let scaled = (leg * cap / total) as i64;
        tvda_core::Amount::from_minor(scaled).unwrap_or(tvda_core::Amount::ZERO)
    };
    Payouts {
        buyer: scale(buyer),
        vendor: scale(vendor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use tvda_arbitration::{DisputeType, HumanOverride};
    use tvda_core::{Amount, Timestamp, TransactionId, UserId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn dispute() -> Dispute {
        Dispute::raise(
            TransactionId::new(),
            UserId::new(),
            "outage".to_string(),
            "service was down".to_string(),
            DisputeType::SlaBreach,
            t0(),
        )
    }

    fn started(config: &WorkflowConfig) -> Dispute {
        let mut d = dispute();
        d.open_deadlines(
            WorkflowDeadlines::starting_at(
                t0(),
                config.evidence_window,
                config.analysis_window,
                config.workflow_window,
            ),
            t0(),
        );
        d.advance(WorkflowStage::EvidenceCollection, t0(), "workflow started")
            .unwrap();
        d
    }

    fn view<'a>(d: &'a Dispute, case: Option<&'a ArbitrationCase>, complete: bool) -> DisputeView<'a> {
        DisputeView {
            dispute: d,
            case,
            evidence_complete: complete,
        }
    }

    fn case_with_status(d: &Dispute, status: CaseStatus) -> ArbitrationCase {
        let mut c = ArbitrationCase::new(d.id, d.transaction_id, Timestamp::from_utc(t0()));
        c.status = status;
        c
    }

    #[test]
    fn created_starts_workflow() {
        let config = WorkflowConfig::default();
        let d = dispute();
        let p = plan(view(&d, None, false), t0(), &config);
        assert_eq!(p.to, Some(WorkflowStage::EvidenceCollection));
        assert_eq!(p.effects[0], Effect::FreezeEscrow);
        let opened = p.effects.iter().find_map(|e| match e {
            Effect::OpenDeadlines { deadlines } => Some(*deadlines),
            _ => None,
        });
        let deadlines = opened.unwrap();
        assert_eq!(deadlines.evidence_deadline, t0() + Duration::hours(24));
        assert_eq!(deadlines.analysis_deadline, t0() + Duration::hours(48));
        assert_eq!(deadlines.workflow_deadline, t0() + Duration::hours(72));
    }

    #[test]
    fn evidence_waits_until_complete_or_deadline() {
        let config = WorkflowConfig::default();
        let d = started(&config);
        let p = plan(view(&d, None, false), t0() + Duration::hours(1), &config);
        assert!(p.is_idle());
        assert_eq!(p.reason, "awaiting evidence");

        let p = plan(view(&d, None, true), t0() + Duration::hours(1), &config);
        assert_eq!(p.to, Some(WorkflowStage::AiAnalysis));
        assert!(p.effects.contains(&Effect::BuildPacket));

        let p = plan(view(&d, None, false), t0() + Duration::hours(24), &config);
        assert_eq!(p.to, Some(WorkflowStage::AiAnalysis));
        assert_eq!(p.reason, "evidence window closed");
    }

    #[test]
    fn analysis_forces_after_deadline() {
        let config = WorkflowConfig::default();
        let mut d = started(&config);
        d.advance(WorkflowStage::AiAnalysis, t0(), "evidence complete").unwrap();
        let p = plan(view(&d, None, true), t0() + Duration::hours(2), &config);
        assert!(p.effects.contains(&Effect::RunScorer { forced: false }));
        let p = plan(view(&d, None, true), t0() + Duration::hours(49), &config);
        assert!(p.effects.contains(&Effect::RunScorer { forced: true }));
    }

    #[test]
    fn analysis_skips_scoring_when_ruling_exists() {
        let config = WorkflowConfig::default();
        let mut d = started(&config);
        d.advance(WorkflowStage::AiAnalysis, t0(), "evidence complete").unwrap();
        let case = case_with_status(&d, CaseStatus::RulingGenerated);
        let p = plan(view(&d, Some(&case), true), t0(), &config);
        assert_eq!(p.to, Some(WorkflowStage::FinalRuling));
        assert!(!p.effects.iter().any(|e| matches!(e, Effect::RunScorer { .. })));
    }

    #[test]
    fn final_ruling_needs_ruling_and_no_escalation() {
        let config = WorkflowConfig::default();
        let mut d = started(&config);
        d.advance(WorkflowStage::AiAnalysis, t0(), "x").unwrap();
        d.advance(WorkflowStage::FinalRuling, t0(), "x").unwrap();
        let p = plan(view(&d, None, true), t0(), &config);
        assert!(p.is_idle());

        let case = case_with_status(&d, CaseStatus::RulingGenerated);
        let p = plan(view(&d, Some(&case), true), t0(), &config);
        assert_eq!(p.to, Some(WorkflowStage::Completed));
        assert_eq!(p.effects[0], Effect::Disburse);

        d.escalated_to_human = true;
        let p = plan(view(&d, Some(&case), true), t0(), &config);
        assert!(p.is_idle());
    }

    #[test]
    fn overdue_escalates_from_any_stage() {
        let config = WorkflowConfig::default();
        let late = t0() + Duration::hours(73);
        let mut d = started(&config);
        for next in [WorkflowStage::AiAnalysis, WorkflowStage::FinalRuling] {
            let p = plan(view(&d, None, true), late, &config);
            assert!(p.escalates());
            assert_eq!(p.reason, REASON_DEADLINE_EXCEEDED);
            d.advance(next, t0(), "x").unwrap();
        }
        let case = case_with_status(&d, CaseStatus::RulingGenerated);
        assert!(plan(view(&d, Some(&case), true), late, &config).escalates());
    }

    #[test]
    fn terminal_stages_are_idle() {
        let config = WorkflowConfig::default();
        let mut d = started(&config);
        d.escalate(t0(), REASON_MANUAL_ESCALATION).unwrap();
        let p = plan(view(&d, None, true), t0() + Duration::hours(100), &config);
        assert!(p.is_idle());
    }

    #[test]
    fn review_with_override_disburses_once() {
        let config = WorkflowConfig::default();
        let mut d = started(&config);
        d.escalate(t0(), REASON_MANUAL_ESCALATION).unwrap();
        let mut case = case_with_status(&d, CaseStatus::HumanReview);
        case.apply_override(
            HumanOverride {
                buyer_payout: Amount::parse("1000.00").unwrap(),
                vendor_payout: Amount::ZERO,
                reviewed_at: Timestamp::from_utc(t0()),
                note: None,
            },
            Timestamp::from_utc(t0()),
        )
        .unwrap();
        let p = plan(view(&d, Some(&case), true), t0(), &config);
        assert_eq!(p.to, None);
        assert_eq!(p.effects[0], Effect::Disburse);

        case.status = CaseStatus::Resolved;
        assert!(plan(view(&d, Some(&case), true), t0(), &config).is_idle());
    }

    #[test]
    fn warning_once_within_threshold() {
        let config = WorkflowConfig::default();
        let mut d = started(&config);
        let near = t0() + Duration::hours(61);
        let p = plan(view(&d, None, false), near, &config);
        assert!(p.effects.contains(&Effect::WarnDeadline));
        d.mark_deadline_warning_sent(near);
        let p = plan(view(&d, None, false), near, &config);
        assert!(!p.effects.contains(&Effect::WarnDeadline));
        let early = t0() + Duration::hours(59);
        let fresh = started(&config);
        assert!(!plan(view(&fresh, None, false), early, &config)
            .effects
            .contains(&Effect::WarnDeadline));
    }

    #[test]
    fn fit_payouts_scales_over_allocation() {
        let amount = Amount::parse("1000.00").unwrap();
        let fitted = fit_payouts(
            Payouts {
                buyer: Amount::parse("800.00").unwrap(),
                vendor: Amount::parse("800.00").unwrap(),
            },
            amount,
        );
        assert_eq!(fitted.buyer, Amount::parse("500.00").unwrap());
        assert_eq!(fitted.vendor, Amount::parse("500.00").unwrap());
    }

    proptest! {
        #[test]
        fn fitted_split_never_exceeds_amount(
            buyer in 0i64..10_000_000_000,
            vendor in 0i64..10_000_000_000,
            amount in 0i64..10_000_000_000,
        ) {
            let fitted = fit_payouts(
                Payouts {
                    buyer: Amount::from_minor(buyer).unwrap(),
                    vendor: Amount::from_minor(vendor).unwrap(),
                },
                Amount::from_minor(amount).unwrap(),
            );
            let sum = fitted.buyer.minor_units() + fitted.vendor.minor_units();
            prop_assert!(sum <= amount.max(buyer + vendor));
            if buyer + vendor > amount {
                prop_assert!(sum <= amount);
            } else {
                prop_assert_eq!(fitted.buyer.minor_units(), buyer);
                prop_assert_eq!(fitted.vendor.minor_units(), vendor);
            }
        }
    }
}
