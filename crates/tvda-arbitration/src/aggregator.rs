//! # Evidence Aggregator
//!
//! Collects evidence from the platform and both parties and reconciles it
//! into one [`UnifiedPacket`].
//!
//! - Internal logs are pulled from the [`TransactionLedger`] and are always
//!   validated. Re-fetching appends a newer snapshot; only the latest counts.
//! - External submissions are authorized against the dispute before anything
//!   is stored: buyer evidence only from the party who raised the dispute,
//!   vendor logs only from that party's counterparty.
//! - Packets are re-buildable; each build appends a new packet that
//!   supersedes the previous one.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use tvda_core::{DisputeId, PartyRef, Timestamp, UserId};

use crate::dispute::Dispute;
use crate::error::ArbitrationError;
use crate::evidence::{
    BuyerEvidence, CrossValidation, EvidenceItem, EvidencePayload, EvidenceStore, EvidenceType,
    InternalLogEvidence, UnifiedPacket, VendorLogEvidence,
};
use crate::transaction::TransactionLedger;

const SOURCE_PLATFORM: &str = "platform";
const SOURCE_VENDOR: &str = "vendor_submission";
const SOURCE_BUYER: &str = "buyer_submission";
const SOURCE_AGGREGATOR: &str = "aggregator";

/// Tunable cross-validation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationRules {
    /// Maximum tolerated gap between internal and vendor timestamps, in hours.
    pub timestamp_tolerance_hours: i64,
    /// Consistency penalty for a timestamp conflict.
    pub timestamp_conflict_penalty: f64,
    /// Consistency penalty for an amount conflict.
    pub amount_conflict_penalty: f64,
}

impl Default for CrossValidationRules {
    fn default() -> Self {
        Self {
            timestamp_tolerance_hours: 24,
            timestamp_conflict_penalty: 0.2,
            amount_conflict_penalty: 0.3,
        }
    }
}

/// Compare the three sources against each other.
pub fn cross_validate(
    internal: Option<&InternalLogEvidence>,
    vendor: Option<&VendorLogEvidence>,
    buyer: Option<&BuyerEvidence>,
    rules: &CrossValidationRules,
) -> CrossValidation {
    let mut consistency = 1.0_f64;
    let mut conflicts = Vec::new();
    let mut agreements = Vec::new();

    if let (Some(i), Some(reported)) = (internal, vendor.and_then(|v| v.reported_at)) {
        let gap = i.transaction_created_at.abs_diff(&reported);
        if gap > Duration::hours(rules.timestamp_tolerance_hours) {
            conflicts.push(format!(
                "vendor log time {reported} differs from platform record {} by {}h",
                i.transaction_created_at,
                gap.num_hours()
            ));
            consistency -= rules.timestamp_conflict_penalty;
        } else {
            agreements.push(format!(
                "vendor log time agrees with platform record within {}h",
                rules.timestamp_tolerance_hours
            ));
        }
    }

    if let (Some(i), Some(claimed)) = (internal, buyer.and_then(|b| b.claimed_amount)) {
        if claimed != i.amount {
            conflicts.push(format!(
                "buyer claims {claimed} {} but platform recorded {}",
                i.currency, i.amount
            ));
            consistency -= rules.amount_conflict_penalty;
        } else {
            agreements.push(format!("buyer amount matches platform record ({})", i.amount));
        }
    }

    CrossValidation {
        consistency_score: consistency.max(0.0),
        conflicts,
        agreements,
    }
}

/// Gathers, validates and reconciles dispute evidence.
#[derive(Clone)]
pub struct EvidenceAggregator {
    store: EvidenceStore,
    ledger: Arc<dyn TransactionLedger>,
    rules: CrossValidationRules,
}

impl std::fmt::Debug for EvidenceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceAggregator")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl EvidenceAggregator {
    /// Create an aggregator over a store and ledger.
    pub fn new(store: EvidenceStore, ledger: Arc<dyn TransactionLedger>) -> Self {
        Self {
            store,
            ledger,
            rules: CrossValidationRules::default(),
        }
    }

    /// Replace the cross-validation rules.
    pub fn with_rules(mut self, rules: CrossValidationRules) -> Self {
        self.rules = rules;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &EvidenceStore {
        &self.store
    }

    /// Snapshot the platform's record of the disputed transaction.
    pub fn fetch_internal_logs(
        &self,
        dispute: &Dispute,
        now: Timestamp,
    ) -> Result<EvidenceItem, ArbitrationError> {
        let txn = self.ledger.get(&dispute.transaction_id)?;
        let logs = InternalLogEvidence {
            transaction_id: txn.id,
            status: txn.status,
            amount: txn.amount,
            currency: txn.currency,
            buyer_id: txn.buyer_id,
            vendor_id: txn.vendor_id,
            risk_score: txn.risk_score,
            transaction_created_at: txn.created_at,
            transaction_updated_at: txn.updated_at,
            events: txn.events,
            captured_at: now,
        };
        let item = EvidenceItem::new(
            dispute.id,
            PartyRef::System,
            SOURCE_PLATFORM,
            true,
            EvidencePayload::TrustverifyLogs(logs),
            now,
        )?;
        self.store.append(item.clone());
        info!(dispute_id = %dispute.id, evidence_id = %item.id, "captured internal transaction logs");
        Ok(item)
    }

    /// Accept a vendor-log or buyer-evidence submission.
    ///
    /// # Errors
    ///
    /// - [`ArbitrationError::SystemOnlyEvidence`] for platform-only types.
    /// - [`ArbitrationError::EvidenceClosed`] once the dispute is settled.
    /// - [`ArbitrationError::UnauthorizedSubmitter`] for the wrong party.
    /// - [`ArbitrationError::MalformedEvidence`] for a non-object payload.
    pub fn submit_external_evidence(
        &self,
        dispute: &Dispute,
        submitter: UserId,
        evidence_type: EvidenceType,
        payload: Value,
        now: Timestamp,
    ) -> Result<EvidenceItem, ArbitrationError> {
        if evidence_type.is_system_only() {
            return Err(ArbitrationError::SystemOnlyEvidence {
                evidence_type: evidence_type.to_string(),
            });
        }
        if !dispute.accepts_evidence() {
            return Err(ArbitrationError::EvidenceClosed {
                dispute_id: dispute.id.to_string(),
                status: dispute.status.to_string(),
            });
        }
        self.authorize(dispute, submitter, evidence_type)?;

        let (payload, validated, source) = match evidence_type {
            EvidenceType::VendorLogs => {
                let logs = VendorLogEvidence::parse(payload)?;
                let valid = logs.is_structurally_valid();
                if !valid {
                    warn!(
                        dispute_id = %dispute.id,
                        "vendor logs lack a timestamp or event type; stored unvalidated"
                    );
                }
                (EvidencePayload::VendorLogs(logs), valid, SOURCE_VENDOR)
            }
            _ => (
                EvidencePayload::BuyerEvidence(BuyerEvidence::parse(payload)?),
                false,
                SOURCE_BUYER,
            ),
        };

        let item = EvidenceItem::new(
            dispute.id,
            PartyRef::User(submitter),
            source,
            validated,
            payload,
            now,
        )?;
        self.store.append(item.clone());
        info!(
            dispute_id = %dispute.id,
            evidence_id = %item.id,
            evidence_type = %evidence_type,
            validated,
            "accepted external evidence"
        );
        Ok(item)
    }

    fn authorize(
        &self,
        dispute: &Dispute,
        submitter: UserId,
        evidence_type: EvidenceType,
    ) -> Result<(), ArbitrationError> {
        let allowed = match evidence_type {
            EvidenceType::BuyerEvidence => Some(dispute.raised_by),
            _ => self
                .ledger
                .get(&dispute.transaction_id)?
                .counterparty_of(dispute.raised_by),
        };
        if allowed == Some(submitter) {
            return Ok(());
        }
        let reason = match evidence_type {
            EvidenceType::BuyerEvidence => "only the party who raised the dispute may submit buyer evidence",
            _ => "only the transaction counterparty may submit vendor logs",
        };
        Err(ArbitrationError::UnauthorizedSubmitter {
            dispute_id: dispute.id.to_string(),
            submitter: submitter.to_string(),
            evidence_type: evidence_type.to_string(),
            reason: reason.to_string(),
        })
    }

    /// Internal logs present and at least one external source present.
    pub fn is_complete(&self, dispute_id: &DisputeId) -> bool {
        self.store.has(dispute_id, EvidenceType::TrustverifyLogs)
            && (self.store.has(dispute_id, EvidenceType::VendorLogs)
                || self.store.has(dispute_id, EvidenceType::BuyerEvidence))
    }

    /// Merge the latest item of each type, cross-validate, and store the
    /// result as a new `unified_packet` item.
    pub fn build_unified_packet(
        &self,
        dispute: &Dispute,
        now: Timestamp,
    ) -> Result<UnifiedPacket, ArbitrationError> {
        let latest = |t| self.store.latest(&dispute.id, t).map(|i| i.payload);
        let internal_logs = match latest(EvidenceType::TrustverifyLogs) {
            Some(EvidencePayload::TrustverifyLogs(l)) => Some(l),
            _ => None,
        };
        let vendor_logs = match latest(EvidenceType::VendorLogs) {
            Some(EvidencePayload::VendorLogs(l)) => Some(l),
            _ => None,
        };
        let buyer_evidence = match latest(EvidenceType::BuyerEvidence) {
            Some(EvidencePayload::BuyerEvidence(b)) => Some(b),
            _ => None,
        };

        let cross_validation = cross_validate(
            internal_logs.as_ref(),
            vendor_logs.as_ref(),
            buyer_evidence.as_ref(),
            &self.rules,
        );
        let items = self
            .store
            .active(&dispute.id)
            .iter()
            .map(EvidenceItem::summary)
            .collect();

        let packet = UnifiedPacket {
            dispute_id: dispute.id,
            transaction_id: dispute.transaction_id,
            dispute_type: dispute.dispute_type,
            dispute_filed_at: Timestamp::from_utc(dispute.created_at),
            generated_at: now,
            internal_logs,
            vendor_logs,
            buyer_evidence,
            items,
            cross_validation,
        };
        let item = EvidenceItem::new(
            dispute.id,
            PartyRef::System,
            SOURCE_AGGREGATOR,
            true,
            EvidencePayload::UnifiedPacket(Box::new(packet.clone())),
            now,
        )?;
        self.store.append(item);
        debug!(
            dispute_id = %dispute.id,
            items = packet.items.len(),
            consistency = packet.cross_validation.consistency_score,
            conflicts = packet.cross_validation.conflicts.len(),
            "built unified evidence packet"
        );
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispute::DisputeType;
    use crate::transaction::{InMemoryLedger, SlaTerms, Transaction};
    use serde_json::json;
    use tvda_core::Amount;

    struct Fixture {
        agg: EvidenceAggregator,
        dispute: Dispute,
        buyer: UserId,
        vendor: UserId,
    }

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn fixture() -> Fixture {
        let ledger = InMemoryLedger::new();
        let buyer = UserId::new();
        let vendor = UserId::new();
        let txn = Transaction::new(
            buyer,
            vendor,
            Amount::parse("1000.00").unwrap(),
            "USD",
            SlaTerms::default(),
            ts("2026-01-01T00:00:00Z"),
        )
        .unwrap();
        ledger.insert(txn.clone());
        let dispute = Dispute::raise(
            txn.id,
            buyer,
            "late".to_string(),
            String::new(),
            DisputeType::SlaBreach,
            *ts("2026-01-05T00:00:00Z").as_datetime(),
        );
        Fixture {
            agg: EvidenceAggregator::new(EvidenceStore::new(), Arc::new(ledger)),
            dispute,
            buyer,
            vendor,
        }
    }

    fn now() -> Timestamp {
        ts("2026-01-05T01:00:00Z")
    }

    #[test]
    fn internal_logs_are_validated_and_idempotent() {
        let f = fixture();
        f.agg.fetch_internal_logs(&f.dispute, now()).unwrap();
        let second = f.agg.fetch_internal_logs(&f.dispute, now()).unwrap();
        assert!(second.validated);
        let active = f.agg.store().active(&f.dispute.id);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }

    #[test]
    fn buyer_evidence_only_from_raiser() {
        let f = fixture();
        let err = f
            .agg
            .submit_external_evidence(&f.dispute, f.vendor, EvidenceType::BuyerEvidence, json!({}), now())
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::UnauthorizedSubmitter { .. }));
        let item = f
            .agg
            .submit_external_evidence(&f.dispute, f.buyer, EvidenceType::BuyerEvidence, json!({"statement": "x"}), now())
            .unwrap();
        assert!(!item.validated);
    }

    #[test]
    fn vendor_logs_only_from_counterparty() {
        let f = fixture();
        let payload = json!({"timestamp": "2026-01-01T02:00:00Z", "event_type": "shipped"});
        assert!(f
            .agg
            .submit_external_evidence(&f.dispute, f.buyer, EvidenceType::VendorLogs, payload.clone(), now())
            .is_err());
        assert!(f
            .agg
            .submit_external_evidence(&f.dispute, UserId::new(), EvidenceType::VendorLogs, payload.clone(), now())
            .is_err());
        let item = f
            .agg
            .submit_external_evidence(&f.dispute, f.vendor, EvidenceType::VendorLogs, payload, now())
            .unwrap();
        assert!(item.validated);
        assert!(f.agg.store().all(&f.dispute.id).len() == 1);
    }

    #[test]
    fn system_types_cannot_be_submitted() {
        let f = fixture();
        let err = f
            .agg
            .submit_external_evidence(&f.dispute, f.buyer, EvidenceType::UnifiedPacket, json!({}), now())
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::SystemOnlyEvidence { .. }));
    }

    #[test]
    fn completeness_requires_internal_and_one_external() {
        let f = fixture();
        assert!(!f.agg.is_complete(&f.dispute.id));
        f.agg.fetch_internal_logs(&f.dispute, now()).unwrap();
        assert!(!f.agg.is_complete(&f.dispute.id));
        f.agg
            .submit_external_evidence(&f.dispute, f.buyer, EvidenceType::BuyerEvidence, json!({"a": 1}), now())
            .unwrap();
        assert!(f.agg.is_complete(&f.dispute.id));
    }

    #[test]
    fn external_only_is_not_complete() {
        let f = fixture();
        f.agg
            .submit_external_evidence(&f.dispute, f.buyer, EvidenceType::BuyerEvidence, json!({"a": 1}), now())
            .unwrap();
        assert!(!f.agg.is_complete(&f.dispute.id));
    }

    #[test]
    fn packet_cross_validation_penalties() {
        let f = fixture();
        f.agg.fetch_internal_logs(&f.dispute, now()).unwrap();
        f.agg
            .submit_external_evidence(
                &f.dispute,
                f.vendor,
                EvidenceType::VendorLogs,
                json!({"timestamp": "2026-01-03T00:00:00Z", "event_type": "order"}),
                now(),
            )
            .unwrap();
        f.agg
            .submit_external_evidence(&f.dispute, f.buyer, EvidenceType::BuyerEvidence, json!({"amount": "900.00"}), now())
            .unwrap();
        let packet = f.agg.build_unified_packet(&f.dispute, now()).unwrap();
        assert_eq!(packet.cross_validation.conflicts.len(), 2);
        assert!((packet.cross_validation.consistency_score - 0.5).abs() < 1e-9);
        assert_eq!(packet.items.len(), 3);
        assert_eq!(f.agg.store().latest_packet(&f.dispute.id), Some(packet));
    }

    #[test]
    fn later_packets_supersede_earlier() {
        let f = fixture();
        let first = f.agg.build_unified_packet(&f.dispute, now()).unwrap();
        assert!(first.items.is_empty());
        f.agg.fetch_internal_logs(&f.dispute, now()).unwrap();
        let second = f.agg.build_unified_packet(&f.dispute, ts("2026-01-05T02:00:00Z")).unwrap();
        assert_eq!(f.agg.store().latest_packet(&f.dispute.id), Some(second));
    }

    #[test]
    fn consistency_clamps_at_zero() {
        let rules = CrossValidationRules {
            amount_conflict_penalty: 2.0,
            ..CrossValidationRules::default()
        };
        let internal = InternalLogEvidence {
            transaction_id: tvda_core::TransactionId::new(),
            status: crate::transaction::TransactionStatus::Held,
            amount: Amount::parse("10.00").unwrap(),
            currency: "USD".to_string(),
            buyer_id: UserId::new(),
            vendor_id: UserId::new(),
            risk_score: None,
            transaction_created_at: now(),
            transaction_updated_at: now(),
            events: vec![],
            captured_at: now(),
        };
        let buyer = BuyerEvidence::parse(json!({"amount": 11})).unwrap();
        let cv = cross_validate(Some(&internal), None, Some(&buyer), &rules);
        assert_eq!(cv.consistency_score, 0.0);
    }

    #[test]
    fn settled_dispute_rejects_evidence() {
        let mut f = fixture();
        f.dispute.status = crate::dispute::DisputeStatus::Resolved;
        let err = f
            .agg
            .submit_external_evidence(&f.dispute, f.buyer, EvidenceType::BuyerEvidence, json!({}), now())
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::EvidenceClosed { .. }));
    }
}
