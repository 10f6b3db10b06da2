//! # Evidence Items and Store
//!
//! Evidence arrives from three sources: the platform's own transaction logs,
//! the vendor's service logs, and the buyer's statement. Each source has a
//! typed payload in [`EvidencePayload`]; external submissions are parsed
//! from JSON into those types at ingestion, and the raw object is kept
//! alongside for reviewers.
//!
//! ## Security Invariant
//!
//! Evidence items are immutable after creation and carry a SHA-256 digest of
//! their canonical payload. The store is append-only: a newer item of the
//! same type supersedes an older one for scoring but never replaces it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tvda_core::{
    sha256_digest, Amount, CanonicalBytes, ContentDigest, DisputeId, EvidenceItemId, PartyRef,
    Timestamp, TransactionId, UserId,
};

use crate::dispute::DisputeType;
use crate::error::ArbitrationError;
use crate::store::Store;
use crate::transaction::{SystemEvent, TransactionStatus};

// ── Evidence Types ─────────────────────────────────────────────────────

/// Kind of evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    /// First-party transaction logs captured by the platform.
    TrustverifyLogs,
    /// Service logs submitted by the vendor.
    VendorLogs,
    /// Statement and supporting material submitted by the buyer.
    BuyerEvidence,
    /// Reconciled packet produced by the aggregator.
    UnifiedPacket,
}

impl EvidenceType {
    /// All evidence types.
    pub fn all() -> &'static [EvidenceType] {
        &[
            Self::TrustverifyLogs,
            Self::VendorLogs,
            Self::BuyerEvidence,
            Self::UnifiedPacket,
        ]
    }

    /// The canonical string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrustverifyLogs => "trustverify_logs",
            Self::VendorLogs => "vendor_logs",
            Self::BuyerEvidence => "buyer_evidence",
            Self::UnifiedPacket => "unified_packet",
        }
    }

    /// Whether only the platform may produce this type.
    pub fn is_system_only(&self) -> bool {
        matches!(self, Self::TrustverifyLogs | Self::UnifiedPacket)
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EvidenceType {
    type Err = ArbitrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ArbitrationError::InvalidEvidenceType(s.to_string()))
    }
}

// ── Payloads ───────────────────────────────────────────────────────────

/// Snapshot of the platform's own record of the transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalLogEvidence {
    /// The transaction.
    pub transaction_id: TransactionId,
    /// Payment status at capture time.
    pub status: TransactionStatus,
    /// Amount held.
    pub amount: Amount,
    /// Currency code.
    pub currency: String,
    /// Buyer.
    pub buyer_id: UserId,
    /// Vendor.
    pub vendor_id: UserId,
    /// Platform risk score.
    pub risk_score: Option<f64>,
    /// When the transaction was created.
    pub transaction_created_at: Timestamp,
    /// When the transaction last changed.
    pub transaction_updated_at: Timestamp,
    /// Platform events recorded for the transaction.
    pub events: Vec<SystemEvent>,
    /// When this snapshot was taken.
    pub captured_at: Timestamp,
}

/// One line of a vendor log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorLogEntry {
    /// When the logged event happened, if a parsable time was given.
    pub timestamp: Option<Timestamp>,
    /// Event type, if given.
    pub event_type: Option<String>,
}

/// Service metrics reported in vendor logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportedMetrics {
    /// Uptime over the service period, in percent.
    pub uptime_percent: Option<f64>,
    /// Average response time, in milliseconds.
    pub avg_response_time_ms: Option<f64>,
    /// When the goods or service were delivered.
    pub delivered_at: Option<Timestamp>,
}

/// Vendor-submitted service logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorLogEvidence {
    /// The vendor's own timestamp for the transaction, or its earliest entry.
    pub reported_at: Option<Timestamp>,
    /// Parsed log lines.
    pub entries: Vec<VendorLogEntry>,
    /// Parsed metrics.
    pub metrics: ReportedMetrics,
    /// The submission as received.
    pub raw: Map<String, Value>,
}

/// Buyer-submitted statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerEvidence {
    /// The amount the buyer says was paid.
    pub claimed_amount: Option<Amount>,
    /// The buyer's account of events.
    pub statement: Option<String>,
    /// References to attached files.
    pub attachments: Vec<String>,
    /// The submission as received.
    pub raw: Map<String, Value>,
}

/// Outcome of comparing the sources against each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    /// `1.0` when all comparable facts agree, reduced per conflict.
    pub consistency_score: f64,
    /// Human-readable conflicts.
    pub conflicts: Vec<String>,
    /// Human-readable agreements.
    pub agreements: Vec<String>,
}

/// Per-item facts the scorer needs without re-reading the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Evidence item.
    pub id: EvidenceItemId,
    /// Its type.
    pub evidence_type: EvidenceType,
    /// Who submitted it.
    pub submitted_by: PartyRef,
    /// Whether it passed validation.
    pub validated: bool,
    /// Whether its payload is a non-empty structured object.
    pub substantive: bool,
}

/// The reconciled evidence view scored by the arbitration scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedPacket {
    /// Dispute.
    pub dispute_id: DisputeId,
    /// Disputed transaction.
    pub transaction_id: TransactionId,
    /// Dispute classification.
    pub dispute_type: DisputeType,
    /// When the dispute was raised.
    pub dispute_filed_at: Timestamp,
    /// When this packet was built.
    pub generated_at: Timestamp,
    /// Latest internal logs.
    pub internal_logs: Option<InternalLogEvidence>,
    /// Latest vendor logs.
    pub vendor_logs: Option<VendorLogEvidence>,
    /// Latest buyer evidence.
    pub buyer_evidence: Option<BuyerEvidence>,
    /// Every active (non-superseded) item that went into the packet.
    pub items: Vec<ItemSummary>,
    /// Cross-source comparison.
    pub cross_validation: CrossValidation,
}

/// Typed evidence payload, one variant per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EvidencePayload {
    /// Platform logs.
    TrustverifyLogs(InternalLogEvidence),
    /// Vendor logs.
    VendorLogs(VendorLogEvidence),
    /// Buyer statement.
    BuyerEvidence(BuyerEvidence),
    /// Reconciled packet.
    UnifiedPacket(Box<UnifiedPacket>),
}

impl EvidencePayload {
    /// The evidence type of this payload.
    pub fn evidence_type(&self) -> EvidenceType {
        match self {
            Self::TrustverifyLogs(_) => EvidenceType::TrustverifyLogs,
            Self::VendorLogs(_) => EvidenceType::VendorLogs,
            Self::BuyerEvidence(_) => EvidenceType::BuyerEvidence,
            Self::UnifiedPacket(_) => EvidenceType::UnifiedPacket,
        }
    }

    /// Whether the payload carries a non-empty structured object.
    pub fn is_substantive(&self) -> bool {
        match self {
            Self::TrustverifyLogs(_) | Self::UnifiedPacket(_) => true,
            Self::VendorLogs(v) => !v.raw.is_empty(),
            Self::BuyerEvidence(b) => !b.raw.is_empty(),
        }
    }
}

// ── Evidence Item ──────────────────────────────────────────────────────

/// One immutable piece of evidence attached to a dispute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Item identifier.
    pub id: EvidenceItemId,
    /// Dispute it belongs to.
    pub dispute_id: DisputeId,
    /// Who produced it.
    pub submitted_by: PartyRef,
    /// Source tag, e.g. `platform`, `vendor_submission`.
    pub source: String,
    /// Whether it passed validation at ingestion.
    pub validated: bool,
    /// Typed payload.
    pub payload: EvidencePayload,
    /// Digest of the canonical payload.
    pub digest: ContentDigest,
    /// When it was stored.
    pub submitted_at: Timestamp,
}

impl EvidenceItem {
    /// Create an item, computing its payload digest.
    pub fn new(
        dispute_id: DisputeId,
        submitted_by: PartyRef,
        source: &str,
        validated: bool,
        payload: EvidencePayload,
        submitted_at: Timestamp,
    ) -> Result<Self, ArbitrationError> {
        let digest = sha256_digest(&CanonicalBytes::new(&payload)?);
        Ok(Self {
            id: EvidenceItemId::new(),
            dispute_id,
            submitted_by,
            source: source.to_string(),
            validated,
            payload,
            digest,
            submitted_at,
        })
    }

    /// The item's evidence type.
    pub fn evidence_type(&self) -> EvidenceType {
        self.payload.evidence_type()
    }

    /// Recompute the payload digest and compare with the stored one.
    pub fn verify_integrity(&self) -> Result<bool, ArbitrationError> {
        Ok(sha256_digest(&CanonicalBytes::new(&self.payload)?) == self.digest)
    }

    /// Summary used inside packets.
    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id,
            evidence_type: self.evidence_type(),
            submitted_by: self.submitted_by,
            validated: self.validated,
            substantive: self.payload.is_substantive(),
        }
    }
}

// ── Ingestion ──────────────────────────────────────────────────────────

const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "ts", "occurred_at", "created_at", "date"];
const EVENT_KEYS: &[&str] = &["event_type", "event", "type", "action", "activity"];
const ENTRY_KEYS: &[&str] = &["entries", "events", "logs"];
const UPTIME_KEYS: &[&str] = &["uptime_percent", "uptime", "uptime_pct"];
const RESPONSE_KEYS: &[&str] = &["avg_response_time_ms", "response_time_ms", "avg_response_time"];
const DELIVERED_KEYS: &[&str] = &["delivered_at", "delivery_time", "fulfilled_at"];
const AMOUNT_KEYS: &[&str] = &["amount", "claimed_amount", "paid_amount"];
const STATEMENT_KEYS: &[&str] = &["statement", "description", "message"];

fn require_object(evidence_type: EvidenceType, payload: Value) -> Result<Map<String, Value>, ArbitrationError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(ArbitrationError::MalformedEvidence {
            evidence_type: evidence_type.to_string(),
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn first_key<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

fn as_timestamp(v: &Value) -> Option<Timestamp> {
    match v {
        Value::String(s) => Timestamp::parse(s).ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(Timestamp::from_utc),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|f| f.is_finite())
}

fn parse_entry(map: &Map<String, Value>) -> VendorLogEntry {
    VendorLogEntry {
        timestamp: first_key(map, TIMESTAMP_KEYS).and_then(as_timestamp),
        event_type: first_key(map, EVENT_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

impl VendorLogEvidence {
    /// Parse a vendor submission. Never fails on content; only the shape
    /// (must be an object) is enforced.
    pub fn parse(payload: Value) -> Result<Self, ArbitrationError> {
        let raw = require_object(EvidenceType::VendorLogs, payload)?;

        let mut entries: Vec<VendorLogEntry> = ENTRY_KEYS
            .iter()
            .filter_map(|k| raw.get(*k).and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_object)
            .map(parse_entry)
            .collect();
        let top = parse_entry(&raw);
        if top.timestamp.is_some() || top.event_type.is_some() {
            entries.insert(0, top.clone());
        }

        let metrics_obj = raw.get("metrics").and_then(Value::as_object);
        let metric = |keys: &[&str]| {
            first_key(&raw, keys)
                .or_else(|| metrics_obj.and_then(|m| first_key(m, keys)))
                .cloned()
        };
        let delivered_from_entries = entries
            .iter()
            .filter(|e| {
                e.event_type
                    .as_deref()
                    .is_some_and(|t| t.to_ascii_lowercase().contains("deliver"))
            })
            .filter_map(|e| e.timestamp)
            .min();
        let metrics = ReportedMetrics {
            uptime_percent: metric(UPTIME_KEYS).as_ref().and_then(as_number),
            avg_response_time_ms: metric(RESPONSE_KEYS).as_ref().and_then(as_number),
            delivered_at: metric(DELIVERED_KEYS)
                .as_ref()
                .and_then(as_timestamp)
                .or(delivered_from_entries),
        };

        let reported_at = top
            .timestamp
            .or_else(|| entries.iter().filter_map(|e| e.timestamp).min());

        Ok(Self {
            reported_at,
            entries,
            metrics,
            raw,
        })
    }

    /// Structural check: at least one entry carries both a timestamp-like
    /// field and an event-type-like field.
    pub fn is_structurally_valid(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.timestamp.is_some() && e.event_type.as_deref().is_some_and(|t| !t.is_empty()))
    }
}

impl BuyerEvidence {
    /// Parse a buyer submission. Unparsable fields are left empty.
    pub fn parse(payload: Value) -> Result<Self, ArbitrationError> {
        let raw = require_object(EvidenceType::BuyerEvidence, payload)?;
        let claimed_amount = first_key(&raw, AMOUNT_KEYS)
            .and_then(|v| serde_json::from_value::<Amount>(v.clone()).ok());
        let statement = first_key(&raw, STATEMENT_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string);
        let attachments = raw
            .get("attachments")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self {
            claimed_amount,
            statement,
            attachments,
            raw,
        })
    }
}

// ── Evidence Store ─────────────────────────────────────────────────────

/// Append-only evidence record per dispute.
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    items: Store<DisputeId, Vec<EvidenceItem>>,
}

impl EvidenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item.
    pub fn append(&self, item: EvidenceItem) {
        self.items.upsert(item.dispute_id, Vec::new, |v| v.push(item));
    }

    /// Every item ever stored for the dispute, oldest first.
    pub fn all(&self, dispute_id: &DisputeId) -> Vec<EvidenceItem> {
        self.items.get(dispute_id).unwrap_or_default()
    }

    /// The most recent item of a type.
    pub fn latest(&self, dispute_id: &DisputeId, evidence_type: EvidenceType) -> Option<EvidenceItem> {
        self.all(dispute_id)
            .into_iter()
            .rev()
            .find(|i| i.evidence_type() == evidence_type)
    }

    /// Whether any item of the type exists.
    pub fn has(&self, dispute_id: &DisputeId, evidence_type: EvidenceType) -> bool {
        self.latest(dispute_id, evidence_type).is_some()
    }

    /// Items that count as scoring input: the latest internal logs plus every
    /// external submission. Packets and superseded internal logs excluded.
    pub fn active(&self, dispute_id: &DisputeId) -> Vec<EvidenceItem> {
        let all = self.all(dispute_id);
        let latest_internal = all
            .iter()
            .rev()
            .find(|i| i.evidence_type() == EvidenceType::TrustverifyLogs)
            .map(|i| i.id);
        all.into_iter()
            .filter(|i| match i.evidence_type() {
                EvidenceType::TrustverifyLogs => Some(i.id) == latest_internal,
                EvidenceType::VendorLogs | EvidenceType::BuyerEvidence => true,
                EvidenceType::UnifiedPacket => false,
            })
            .collect()
    }

    /// The authoritative packet: the most recent one.
    pub fn latest_packet(&self, dispute_id: &DisputeId) -> Option<UnifiedPacket> {
        match self.latest(dispute_id, EvidenceType::UnifiedPacket)?.payload {
            EvidencePayload::UnifiedPacket(p) => Some(*p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn vendor_logs_with_entries_are_valid() {
        let v = VendorLogEvidence::parse(json!({
            "entries": [
                {"timestamp": "2026-01-01T10:00:00Z", "event_type": "order_received"},
                {"timestamp": "2026-01-03T10:00:00Z", "event_type": "delivered"}
            ],
            "metrics": {"uptime": 99.2, "avg_response_time_ms": "180"}
        }))
        .unwrap();
        assert!(v.is_structurally_valid());
        assert_eq!(v.reported_at, Some(ts("2026-01-01T10:00:00Z")));
        assert_eq!(v.metrics.uptime_percent, Some(99.2));
        assert_eq!(v.metrics.avg_response_time_ms, Some(180.0));
        assert_eq!(v.metrics.delivered_at, Some(ts("2026-01-03T10:00:00Z")));
    }

    #[test]
    fn vendor_logs_flat_shape_and_epoch_seconds() {
        let v = VendorLogEvidence::parse(json!({"ts": 1767225600, "action": "shipped"})).unwrap();
        assert!(v.is_structurally_valid());
        assert_eq!(v.reported_at, Some(ts("2026-01-01T00:00:00Z")));
    }

    #[test]
    fn vendor_logs_missing_event_type_fail_structure_check() {
        let v = VendorLogEvidence::parse(json!({"timestamp": "2026-01-01T00:00:00Z", "note": "hi"})).unwrap();
        assert!(!v.is_structurally_valid());
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let err = VendorLogEvidence::parse(json!(["a"])).unwrap_err();
        assert!(matches!(err, ArbitrationError::MalformedEvidence { .. }));
        assert!(BuyerEvidence::parse(json!("text")).is_err());
    }

    #[test]
    fn buyer_evidence_extracts_amount_and_statement() {
        let b = BuyerEvidence::parse(json!({
            "amount": "1000.00",
            "statement": "never delivered",
            "attachments": ["receipt.pdf", 3]
        }))
        .unwrap();
        assert_eq!(b.claimed_amount, Some(Amount::parse("1000.00").unwrap()));
        assert_eq!(b.statement.as_deref(), Some("never delivered"));
        assert_eq!(b.attachments, vec!["receipt.pdf".to_string()]);
    }

    #[test]
    fn buyer_evidence_bad_amount_is_ignored() {
        let b = BuyerEvidence::parse(json!({"amount": "lots"})).unwrap();
        assert_eq!(b.claimed_amount, None);
    }

    #[test]
    fn empty_object_is_not_substantive() {
        let b = BuyerEvidence::parse(json!({})).unwrap();
        assert!(!EvidencePayload::BuyerEvidence(b).is_substantive());
    }

    #[test]
    fn item_digest_verifies() {
        let b = BuyerEvidence::parse(json!({"statement": "x"})).unwrap();
        let item = EvidenceItem::new(
            DisputeId::new(),
            PartyRef::User(UserId::new()),
            "buyer_submission",
            false,
            EvidencePayload::BuyerEvidence(b),
            ts("2026-01-01T00:00:00Z"),
        )
        .unwrap();
        assert!(item.verify_integrity().unwrap());
        assert_eq!(item.evidence_type(), EvidenceType::BuyerEvidence);
    }

    #[test]
    fn store_active_keeps_latest_internal_and_all_external() {
        let store = EvidenceStore::new();
        let dispute = DisputeId::new();
        let mk = |payload: EvidencePayload| {
            EvidenceItem::new(dispute, PartyRef::System, "test", true, payload, ts("2026-01-01T00:00:00Z")).unwrap()
        };
        let internal = || InternalLogEvidence {
            transaction_id: TransactionId::new(),
            status: TransactionStatus::Disputed,
            amount: Amount::ZERO,
            currency: "USD".to_string(),
            buyer_id: UserId::new(),
            vendor_id: UserId::new(),
            risk_score: None,
            transaction_created_at: ts("2026-01-01T00:00:00Z"),
            transaction_updated_at: ts("2026-01-01T00:00:00Z"),
            events: vec![],
            captured_at: ts("2026-01-01T00:00:00Z"),
        };
        let first = mk(EvidencePayload::TrustverifyLogs(internal()));
        let second = mk(EvidencePayload::TrustverifyLogs(internal()));
        store.append(first.clone());
        store.append(mk(EvidencePayload::BuyerEvidence(BuyerEvidence::parse(json!({"a": 1})).unwrap())));
        store.append(mk(EvidencePayload::BuyerEvidence(BuyerEvidence::parse(json!({"b": 2})).unwrap())));
        store.append(second.clone());

        let active = store.active(&dispute);
        assert_eq!(active.len(), 3);
        assert!(active.iter().any(|i| i.id == second.id));
        assert!(!active.iter().any(|i| i.id == first.id));
        assert_eq!(store.all(&dispute).len(), 4);
        assert!(store.latest_packet(&dispute).is_none());
    }

    #[test]
    fn evidence_type_strings() {
        for t in EvidenceType::all() {
            assert_eq!(t.as_str().parse::<EvidenceType>().unwrap(), *t);
        }
        assert!(EvidenceType::TrustverifyLogs.is_system_only());
        assert!(!EvidenceType::VendorLogs.is_system_only());
    }
}
