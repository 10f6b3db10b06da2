//! # Simulate Subcommand
//!
//! Runs one case file through the full arbitration service on a manual
//! clock: the dispute is filed, evidence is submitted, and the scheduler
//! ticks every `--step-hours` until the workflow completes, escalates, or
//! the horizon is reached. Escrow and webhooks are in-process recorders.
//!
//! ```bash
//! tvda simulate case.yaml --step-hours 6
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use clap::Args;
use serde::Serialize;

use tvda_arbitration::{ArbitrationScorer, EvidenceType, InMemoryLedger, WorkflowStage};
use tvda_core::Amount;
use tvda_workflow::{
    ArbitrationService, EscrowGateway, InMemoryEscrowGateway, ManualClock, NewDispute,
    RecordingNotificationSink, RecordingWebhookEmitter, StepOutcome,
};

use crate::case_file::CaseFile;
use crate::score::load_scorer;

/// Arguments for `tvda simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Case file (YAML or JSON).
    pub case: PathBuf,

    /// Scoring weights YAML; defaults apply when absent.
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Simulated hours between scheduler ticks.
    #[arg(long, default_value_t = 6)]
    pub step_hours: u32,

    /// Stop after this many simulated hours.
    #[arg(long, default_value_t = 96)]
    pub horizon_hours: u32,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// One tick of the simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStep {
    /// Hours since filing.
    pub hour: u32,
    /// Stage after the tick.
    pub stage: WorkflowStage,
    /// What the tick did.
    pub outcome: String,
}

/// Result of a simulated run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub dispute_id: String,
    pub steps: Vec<SimulationStep>,
    pub final_stage: WorkflowStage,
    pub final_status: String,
    pub released: Amount,
    pub refunded: Amount,
    pub webhooks: Vec<String>,
    pub notifications: usize,
}

fn describe(outcome: Option<&StepOutcome>) -> String {
    match outcome {
        Some(StepOutcome::Advanced { from, to }) => format!("advanced {from} -> {to}"),
        Some(StepOutcome::Waiting { reason }) => format!("waiting: {reason}"),
        Some(StepOutcome::Escalated { reason, .. }) => format!("escalated: {reason}"),
        Some(StepOutcome::Resolved) => "resolved".to_string(),
        Some(StepOutcome::Skipped { reason }) => format!("skipped: {reason}"),
        Some(StepOutcome::Failed { error }) => format!("failed: {error}"),
        None => "not processed".to_string(),
    }
}

/// Run the workflow for one case.
pub fn simulate_case(
    case: &CaseFile,
    scorer: ArbitrationScorer,
    step_hours: u32,
    horizon_hours: u32,
) -> Result<SimulationReport> {
    if step_hours == 0 {
        anyhow::bail!("--step-hours must be at least 1");
    }
    let transaction = case.build_transaction()?;
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.insert(transaction.clone());

    let clock = Arc::new(ManualClock::new(case.filed_at().into_datetime()));
    let escrow = Arc::new(InMemoryEscrowGateway::new());
    let webhooks = Arc::new(RecordingWebhookEmitter::new());
    let notifier = Arc::new(RecordingNotificationSink::new());
    let service = ArbitrationService::builder(ledger)
        .escrow(escrow.clone())
        .webhooks(webhooks.clone())
        .notifier(notifier.clone())
        .scorer(scorer)
        .clock(clock.clone())
        .build();

    let dispute = service.create_dispute(NewDispute {
        transaction_id: transaction.id,
        raised_by: case.raiser(&transaction),
        reason: case.dispute.reason.clone(),
        description: case.dispute.description.clone(),
        dispute_type: case.dispute.dispute_type,
    })?;
    if let Some(logs) = &case.vendor_logs {
        service.submit_evidence(
            dispute.id,
            EvidenceType::VendorLogs,
            logs.clone(),
            case.counterparty(&transaction),
        )?;
    }
    if let Some(evidence) = &case.buyer_evidence {
        service.submit_evidence(
            dispute.id,
            EvidenceType::BuyerEvidence,
            evidence.clone(),
            case.raiser(&transaction),
        )?;
    }

    let mut steps = Vec::new();
    let mut hour = 0;
    while hour + step_hours <= horizon_hours {
        hour += step_hours;
        clock.advance(Duration::hours(i64::from(step_hours)));
        let report = service.tick();
        let stage = service.get_status(dispute.id)?.dispute.workflow_stage;
        let outcome = describe(report.outcome_for(&dispute.id));
        tracing::debug!(hour, %stage, %outcome, "simulated tick");
        steps.push(SimulationStep { hour, stage, outcome });
        if matches!(stage, WorkflowStage::Completed | WorkflowStage::HumanReview) {
            break;
        }
    }

    let status = service.get_status(dispute.id)?;
    let paid = escrow.disbursement_state(&transaction.id)?;
    Ok(SimulationReport {
        dispute_id: dispute.id.as_uuid().to_string(),
        steps,
        final_stage: status.dispute.workflow_stage,
        final_status: status.dispute.status.to_string(),
        released: paid.released,
        refunded: paid.refunded,
        webhooks: webhooks.emitted().iter().map(|e| e.event.to_string()).collect(),
        notifications: notifier.sent().len(),
    })
}

/// Execute `tvda simulate`.
pub fn run_simulate(args: &SimulateArgs) -> Result<u8> {
    let case = CaseFile::load(&args.case)?;
    let scorer = load_scorer(args.weights.as_deref())?;
    let report = simulate_case(&case, scorer, args.step_hours, args.horizon_hours)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    println!("Dispute {}", report.dispute_id);
    for step in &report.steps {
        println!("  +{:>3}h  {:<20} {}", step.hour, step.stage.as_str(), step.outcome);
    }
    println!("Final stage:   {}", report.final_stage);
    println!("Final status:  {}", report.final_status);
    println!("Released:      {}", report.released);
    println!("Refunded:      {}", report.refunded);
    println!("Webhooks:      {}", report.webhooks.join(", "));
    println!("Notifications: {}", report.notifications);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case_file::tests::SLA_CASE;

    #[test]
    fn sla_case_completes_with_a_split() {
        let case = CaseFile::from_yaml_str(SLA_CASE).unwrap();
        let report = simulate_case(&case, ArbitrationScorer::default(), 6, 96).unwrap();
        assert_eq!(report.final_stage, WorkflowStage::Completed);
        assert_eq!(report.final_status, "resolved");
        let total = report.released.checked_add(report.refunded).unwrap();
        assert_eq!(total, case.transaction.amount);
        assert!(report.refunded.is_positive());
        assert_eq!(report.webhooks, vec!["escrow.disputed", "arbitration.resolved"]);
        assert!(report.steps.last().unwrap().hour <= 72);
    }

    #[test]
    fn missing_evidence_waits_for_the_window() {
        let mut case = CaseFile::from_yaml_str(SLA_CASE).unwrap();
        case.vendor_logs = None;
        case.buyer_evidence = None;
        let report = simulate_case(&case, ArbitrationScorer::default(), 6, 12).unwrap();
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps.iter().all(|s| s.stage == WorkflowStage::EvidenceCollection));
        assert!(report.steps[0].outcome.starts_with("waiting"));
        assert_eq!(report.released, Amount::ZERO);
        assert_eq!(report.refunded, Amount::ZERO);
    }

    #[test]
    fn zero_step_is_rejected() {
        let case = CaseFile::from_yaml_str(SLA_CASE).unwrap();
        assert!(simulate_case(&case, ArbitrationScorer::default(), 0, 10).is_err());
    }
}
