//! # Case Files
//!
//! A case file describes one disputed transaction and the evidence each
//! party would submit. It is YAML (JSON is accepted, being a YAML subset):
//!
//! ```yaml
//! transaction:
//!   amount: "1000.00"
//!   currency: USD
//!   created_at: "2026-05-01T08:00:00Z"
//!   sla_terms:
//!     uptime_requirement: 99.9
//! dispute:
//!   raised_by: buyer
//!   dispute_type: sla_breach
//!   reason: service outage
//! vendor_logs:
//!   entries: [{ timestamp: "2026-05-01T09:00:00Z", event_type: monthly_report }]
//!   metrics: { uptime: 98.0 }
//! buyer_evidence:
//!   statement: the service was down for two days
//! ```
//!
//! `vendor_logs` are submitted by the counterparty of whoever raised the
//! dispute and `buyer_evidence` by the raiser.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use tvda_arbitration::{DisputeType, SlaTerms, SystemEvent, Transaction};
use tvda_core::{Amount, Timestamp, UserId};

/// Which side raised the dispute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    #[default]
    Buyer,
    Vendor,
}

/// The disputed transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionSpec {
    /// Buyer identity; generated when absent.
    #[serde(default)]
    pub buyer_id: Option<UserId>,
    /// Vendor identity; generated when absent.
    #[serde(default)]
    pub vendor_id: Option<UserId>,
    pub amount: Amount,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub sla_terms: SlaTerms,
    pub created_at: Timestamp,
    #[serde(default)]
    pub risk_score: Option<f64>,
    /// Platform events already on record.
    #[serde(default)]
    pub events: Vec<SystemEvent>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// The dispute being filed.
#[derive(Debug, Clone, Deserialize)]
pub struct DisputeSpec {
    #[serde(default)]
    pub raised_by: Party,
    pub dispute_type: DisputeType,
    #[serde(default = "default_reason")]
    pub reason: String,
    #[serde(default)]
    pub description: String,
    /// Filing time; one day after the transaction when absent.
    #[serde(default)]
    pub filed_at: Option<Timestamp>,
}

fn default_reason() -> String {
    "disputed transaction".to_string()
}

/// A complete case file.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseFile {
    pub transaction: TransactionSpec,
    pub dispute: DisputeSpec,
    #[serde(default)]
    pub vendor_logs: Option<Value>,
    #[serde(default)]
    pub buyer_evidence: Option<Value>,
}

impl CaseFile {
    /// Read and parse a case file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read case file: {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("invalid case file: {}", path.display()))
    }

    /// Parse a case file from YAML or JSON text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let case: Self = serde_yaml::from_str(text)?;
        if !case.transaction.amount.is_positive() {
            anyhow::bail!("transaction amount must be positive");
        }
        Ok(case)
    }

    /// Materialize the transaction with its recorded events.
    pub fn build_transaction(&self) -> Result<Transaction> {
        let spec = &self.transaction;
        let buyer = spec.buyer_id.unwrap_or_default();
        let vendor = spec.vendor_id.unwrap_or_default();
        if buyer == vendor {
            anyhow::bail!("buyer and vendor must differ");
        }
        let mut txn = Transaction::new(
            buyer,
            vendor,
            spec.amount,
            &spec.currency,
            spec.sla_terms.clone(),
            spec.created_at,
        )?;
        txn.risk_score = spec.risk_score;
        txn.events = spec.events.clone();
        if let Some(last) = txn.events.iter().map(|e| e.occurred_at).max() {
            txn.updated_at = txn.updated_at.max(last);
        }
        Ok(txn)
    }

    /// When the dispute is filed.
    pub fn filed_at(&self) -> Timestamp {
        self.dispute.filed_at.unwrap_or_else(|| {
            Timestamp::from_utc(self.transaction.created_at.into_datetime() + chrono::Duration::days(1))
        })
    }

    /// The party raising the dispute.
    pub fn raiser(&self, txn: &Transaction) -> UserId {
        match self.dispute.raised_by {
            Party::Buyer => txn.buyer_id,
            Party::Vendor => txn.vendor_id,
        }
    }

    /// The other party.
    pub fn counterparty(&self, txn: &Transaction) -> UserId {
        match self.dispute.raised_by {
            Party::Buyer => txn.vendor_id,
            Party::Vendor => txn.buyer_id,
        }
    }
}
