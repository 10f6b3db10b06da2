//! # Escrow Transactions
//!
//! The transaction a dispute is raised against. It is owned by the payments
//! side of the platform and is read-only to arbitration: the aggregator
//! snapshots it into internal logs, and the scorer reads its amount and
//! service-level terms.
//!
//! Access goes through the [`TransactionLedger`] trait so the workflow can
//! run against the real payments database or the in-process
//! [`InMemoryLedger`].

use serde::{Deserialize, Serialize};

use tvda_core::{Amount, Timestamp, TransactionId, UserId, ValidationError};

use crate::error::ArbitrationError;
use crate::store::Store;

/// Payment status of an escrow transaction as recorded by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Funds authorized, awaiting capture.
    Pending,
    /// Funds captured and held in escrow.
    Held,
    /// Held funds frozen by an open dispute.
    Disputed,
    /// Funds released to the vendor.
    Released,
    /// Funds refunded to the buyer.
    Refunded,
}

impl TransactionStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "held",
            Self::Disputed => "disputed",
            Self::Released => "released",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contractual service-level terms attached to a transaction.
///
/// Every field is optional; absent terms are simply not compared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaTerms {
    /// Minimum uptime, in percent (e.g. `99.9`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_requirement: Option<f64>,
    /// Maximum average response time, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_time_ms: Option<f64>,
    /// Latest acceptable delivery time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_deadline: Option<Timestamp>,
    /// Free-text quality standards, carried into the analysis for reviewers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_standards: Vec<String>,
}

impl SlaTerms {
    /// Whether any comparable term is defined.
    pub fn has_measurable_terms(&self) -> bool {
        self.uptime_requirement.is_some()
            || self.max_response_time_ms.is_some()
            || self.delivery_deadline.is_some()
    }
}

/// An event the platform recorded against a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Event type, e.g. `payment_captured`, `delivered`.
    pub event_type: String,
    /// When the event occurred.
    pub occurred_at: Timestamp,
    /// Free-form event details.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

/// An escrow transaction between a buyer and a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier.
    pub id: TransactionId,
    /// The paying party.
    pub buyer_id: UserId,
    /// The receiving party.
    pub vendor_id: UserId,
    /// Amount held in escrow.
    pub amount: Amount,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Payment status.
    pub status: TransactionStatus,
    /// Platform risk score in `[0, 1]`, if computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    /// Service-level terms.
    #[serde(default)]
    pub sla_terms: SlaTerms,
    /// Platform-recorded events, oldest first.
    #[serde(default)]
    pub events: Vec<SystemEvent>,
    /// When the transaction was created.
    pub created_at: Timestamp,
    /// When the transaction last changed.
    pub updated_at: Timestamp,
}

impl Transaction {
    /// Create a held transaction.
    pub fn new(
        buyer_id: UserId,
        vendor_id: UserId,
        amount: Amount,
        currency: &str,
        sla_terms: SlaTerms,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: TransactionId::new(),
            buyer_id,
            vendor_id,
            amount,
            currency: validate_currency(currency)?,
            status: TransactionStatus::Held,
            risk_score: None,
            sla_terms,
            events: Vec::new(),
            created_at,
            updated_at: created_at,
        })
    }

    /// The other party of the transaction, if `user` is one of them.
    pub fn counterparty_of(&self, user: UserId) -> Option<UserId> {
        if user == self.buyer_id {
            Some(self.vendor_id)
        } else if user == self.vendor_id {
            Some(self.buyer_id)
        } else {
            None
        }
    }

    /// Whether `user` is a party to this transaction.
    pub fn involves(&self, user: UserId) -> bool {
        self.counterparty_of(user).is_some()
    }
}

/// Validate and normalize an ISO 4217 currency code.
pub fn validate_currency(code: &str) -> Result<String, ValidationError> {
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(code.to_string())
    } else {
        Err(ValidationError::InvalidCurrency(code.to_string()))
    }
}

/// Read access to escrow transactions.
pub trait TransactionLedger: Send + Sync {
    /// Fetch a transaction by id.
    fn get(&self, id: &TransactionId) -> Result<Transaction, ArbitrationError>;

    /// Record a platform event against a transaction.
    fn record_event(&self, id: &TransactionId, event: SystemEvent) -> Result<(), ArbitrationError>;
}

/// In-process ledger backed by a [`Store`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    transactions: Store<TransactionId, Transaction>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a transaction.
    pub fn insert(&self, txn: Transaction) {
        self.transactions.insert(txn.id, txn);
    }

    /// All transactions.
    pub fn list(&self) -> Vec<Transaction> {
        self.transactions.list()
    }
}

impl TransactionLedger for InMemoryLedger {
    fn get(&self, id: &TransactionId) -> Result<Transaction, ArbitrationError> {
        self.transactions
            .get(id)
            .ok_or_else(|| ArbitrationError::TransactionNotFound {
                transaction_id: id.to_string(),
            })
    }

    fn record_event(&self, id: &TransactionId, event: SystemEvent) -> Result<(), ArbitrationError> {
        self.transactions
            .try_update(id, |txn| {
                txn.updated_at = event.occurred_at;
                txn.events.push(event);
                Ok(())
            })
            .unwrap_or_else(|| {
                Err(ArbitrationError::TransactionNotFound {
                    transaction_id: id.to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn() -> Transaction {
        Transaction::new(
            UserId::new(),
            UserId::new(),
            Amount::parse("250.00").unwrap(),
            "USD",
            SlaTerms::default(),
            Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn counterparty_resolution() {
        let t = txn();
        assert_eq!(t.counterparty_of(t.buyer_id), Some(t.vendor_id));
        assert_eq!(t.counterparty_of(t.vendor_id), Some(t.buyer_id));
        assert_eq!(t.counterparty_of(UserId::new()), None);
    }

    #[test]
    fn currency_validation() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("eur").is_err());
        assert!(validate_currency("EURO").is_err());
    }

    #[test]
    fn ledger_get_and_missing() {
        let ledger = InMemoryLedger::new();
        let t = txn();
        ledger.insert(t.clone());
        assert_eq!(ledger.get(&t.id).unwrap(), t);
        let err = ledger.get(&TransactionId::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn record_event_appends() {
        let ledger = InMemoryLedger::new();
        let t = txn();
        ledger.insert(t.clone());
        let at = Timestamp::parse("2026-01-02T00:00:00Z").unwrap();
        ledger
            .record_event(
                &t.id,
                SystemEvent {
                    event_type: "delivered".to_string(),
                    occurred_at: at,
                    details: serde_json::Value::Null,
                },
            )
            .unwrap();
        let stored = ledger.get(&t.id).unwrap();
        assert_eq!(stored.events.len(), 1);
        assert_eq!(stored.updated_at, at);
    }

    #[test]
    fn sla_terms_default_has_nothing_measurable() {
        assert!(!SlaTerms::default().has_measurable_terms());
        let terms = SlaTerms {
            uptime_requirement: Some(99.9),
            ..SlaTerms::default()
        };
        assert!(terms.has_measurable_terms());
    }
}
