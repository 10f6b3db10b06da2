//! # Score Subcommand
//!
//! Runs the evidence aggregator and arbitration scorer over a case file
//! without a workflow, escrow or network. The packet is built exactly as
//! the service builds it at filing time.
//!
//! ```bash
//! tvda score case.yaml
//! tvda score case.yaml --weights weights.yaml --json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use tvda_arbitration::{
    ArbitrationDecision, ArbitrationScorer, Dispute, EvidenceAggregator, EvidenceStore, EvidenceType,
    InMemoryLedger, ScoringInput, ScoringWeights, TransactionLedger,
};

use crate::case_file::CaseFile;

/// Arguments for `tvda score`.
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Case file (YAML or JSON).
    pub case: PathBuf,

    /// Scoring weights YAML; defaults apply when absent.
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Print the full decision as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Build a scorer from an optional weights file.
pub fn load_scorer(path: Option<&Path>) -> Result<ArbitrationScorer> {
    let weights = match path {
        Some(p) => ScoringWeights::load(p)?,
        None => ScoringWeights::default(),
    };
    Ok(ArbitrationScorer::new(weights))
}

/// Aggregate the case's evidence and score it.
pub fn score_case(case: &CaseFile, scorer: &ArbitrationScorer) -> Result<ArbitrationDecision> {
    let transaction = case.build_transaction()?;
    let ledger = InMemoryLedger::new();
    ledger.insert(transaction.clone());
    let ledger: Arc<dyn TransactionLedger> = Arc::new(ledger);

    let filed_at = case.filed_at();
    let dispute = Dispute::raise(
        transaction.id,
        case.raiser(&transaction),
        case.dispute.reason.clone(),
        case.dispute.description.clone(),
        case.dispute.dispute_type,
        filed_at.into_datetime(),
    );

    let aggregator = EvidenceAggregator::new(EvidenceStore::new(), ledger);
    aggregator.fetch_internal_logs(&dispute, filed_at)?;
    if let Some(logs) = &case.vendor_logs {
        aggregator
            .submit_external_evidence(
                &dispute,
                case.counterparty(&transaction),
                EvidenceType::VendorLogs,
                logs.clone(),
                filed_at,
            )
            .context("vendor_logs rejected")?;
    }
    if let Some(evidence) = &case.buyer_evidence {
        aggregator
            .submit_external_evidence(
                &dispute,
                case.raiser(&transaction),
                EvidenceType::BuyerEvidence,
                evidence.clone(),
                filed_at,
            )
            .context("buyer_evidence rejected")?;
    }
    let packet = aggregator.build_unified_packet(&dispute, filed_at)?;
    Ok(scorer.score(ScoringInput {
        packet: &packet,
        transaction: &transaction,
    }))
}

/// Execute `tvda score`.
pub fn run_score(args: &ScoreArgs) -> Result<u8> {
    let case = CaseFile::load(&args.case)?;
    let scorer = load_scorer(args.weights.as_deref())?;
    let decision = score_case(&case, &scorer)?;
    let fingerprint = decision.fingerprint()?.to_hex();

    if args.json {
        let out = serde_json::json!({ "decision": decision, "fingerprint": fingerprint });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(0);
    }

    println!("Dispute type:  {}", decision.dispute_type);
    println!(
        "Fault:         buyer {:.3}  vendor {:.3}",
        decision.fault.buyer, decision.fault.vendor
    );
    println!(
        "Payouts:       buyer {} {}  vendor {} {}",
        decision.payouts.buyer, decision.currency, decision.payouts.vendor, decision.currency
    );
    println!("Confidence:    {:.3}", decision.confidence);
    println!("Compliance:    {:.3}", decision.sla.compliance_score);
    for v in &decision.sla.violations {
        println!("  violation: {v}");
    }
    for a in &decision.anomalies.anomalies {
        println!("  anomaly:   {a}");
    }
    for f in &decision.anomalies.flags {
        println!("  flag:      {f}");
    }
    println!("Summary:       {}", decision.summary);
    println!("Fingerprint:   {fingerprint}");
    Ok(0)
}
