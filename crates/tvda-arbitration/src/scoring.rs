//! # Arbitration Scorer
//!
//! Turns a [`UnifiedPacket`] and the transaction's terms into fault scores,
//! a payout split and a confidence estimate.
//!
//! The scorer is a pure function of its inputs: no clock, no randomness, no
//! hash-ordered collections. Scoring the same packet twice yields
//! byte-identical serialized output, and [`ArbitrationDecision::fingerprint`]
//! makes that checkable.
//!
//! Every constant lives in [`ScoringWeights`], which can be loaded from
//! YAML. Observed service metrics come from a pluggable
//! [`MetricsExtractor`].

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tvda_core::{sha256_digest, Amount, CanonicalBytes, ContentDigest, DisputeId, Timestamp};

use crate::dispute::DisputeType;
use crate::error::ArbitrationError;
use crate::evidence::UnifiedPacket;
use crate::transaction::{SlaTerms, Transaction};

// ── Weights ────────────────────────────────────────────────────────────

/// Additive fault adjustment for one dispute type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultAdjustment {
    /// Added to the buyer's fault.
    pub buyer: f64,
    /// Added to the vendor's fault.
    pub vendor: f64,
}

/// Per-dispute-type fault adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeAdjustments {
    /// `item_not_received`.
    pub item_not_received: FaultAdjustment,
    /// `scam`.
    pub scam: FaultAdjustment,
    /// `quality_issue`.
    pub quality_issue: FaultAdjustment,
    /// `unauthorized_charge`.
    pub unauthorized_charge: FaultAdjustment,
    /// `sla_breach`.
    pub sla_breach: FaultAdjustment,
    /// `other`.
    pub other: FaultAdjustment,
}

impl Default for TypeAdjustments {
    fn default() -> Self {
        let vendor = |v| FaultAdjustment { buyer: 0.0, vendor: v };
        Self {
            item_not_received: vendor(0.2),
            scam: vendor(0.3),
            quality_issue: FaultAdjustment { buyer: 0.05, vendor: 0.1 },
            unauthorized_charge: FaultAdjustment { buyer: 0.1, vendor: 0.2 },
            sla_breach: vendor(0.2),
            other: FaultAdjustment::default(),
        }
    }
}

impl TypeAdjustments {
    /// Adjustment for a dispute type.
    pub fn for_type(&self, t: DisputeType) -> FaultAdjustment {
        match t {
            DisputeType::ItemNotReceived => self.item_not_received,
            DisputeType::Scam => self.scam,
            DisputeType::QualityIssue => self.quality_issue,
            DisputeType::UnauthorizedCharge => self.unauthorized_charge,
            DisputeType::SlaBreach => self.sla_breach,
            DisputeType::Other => self.other,
        }
    }

    fn all(&self) -> [FaultAdjustment; 6] {
        [
            self.item_not_received,
            self.scam,
            self.quality_issue,
            self.unauthorized_charge,
            self.sla_breach,
            self.other,
        ]
    }
}

/// Every tunable constant of the scoring model.
///
/// Defaults reproduce the production heuristics. They have not been
/// calibrated against outcome data, so operators can override them from a
/// YAML file without a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Compliance lost per SLA violation.
    pub compliance_penalty_per_violation: f64,
    /// Vendor fault added per SLA violation.
    pub vendor_fault_per_violation: f64,
    /// Cap on the per-violation vendor fault.
    pub vendor_violation_fault_cap: f64,
    /// Vendor fault per unit of non-compliance.
    pub noncompliance_fault_factor: f64,
    /// Dispute-type adjustments.
    pub type_adjustments: TypeAdjustments,
    /// Evidence quality below this scales both faults down.
    pub low_quality_threshold: f64,
    /// Scale applied to both faults under low evidence quality.
    pub low_quality_fault_scale: f64,
    /// Anomaly count above which the vendor is penalized.
    pub anomaly_penalty_threshold: usize,
    /// Vendor fault added when too many anomalies are found.
    pub anomaly_vendor_penalty: f64,
    /// Fault at or above which a party loses everything.
    pub full_award_fault: f64,
    /// The other party's fault must be below this for a full award.
    pub full_award_other_ceiling: f64,
    /// Per-item quality base.
    pub quality_base: f64,
    /// Per-item quality bonus when validated.
    pub quality_validated_bonus: f64,
    /// Per-item quality bonus for a non-empty structured payload.
    pub quality_structured_bonus: f64,
    /// Confidence starting point.
    pub confidence_base: f64,
    /// Confidence per evidence item.
    pub confidence_per_item: f64,
    /// Cap on item-count confidence.
    pub confidence_item_cap: f64,
    /// Confidence per validated item.
    pub confidence_per_validated: f64,
    /// Cap on validated-item confidence.
    pub confidence_validated_cap: f64,
    /// Confidence added when any SLA violation was found.
    pub confidence_violation_bonus: f64,
    /// Confidence lost per anomaly.
    pub confidence_per_anomaly: f64,
    /// Cap on anomaly confidence loss.
    pub confidence_anomaly_cap: f64,
    /// Days after the transaction beyond which filing is flagged late.
    pub filing_delay_days: i64,
    /// Amounts above this are flagged as high value (informational).
    pub high_value_threshold: Amount,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            compliance_penalty_per_violation: 0.2,
            vendor_fault_per_violation: 0.2,
            vendor_violation_fault_cap: 0.7,
            noncompliance_fault_factor: 0.3,
            type_adjustments: TypeAdjustments::default(),
            low_quality_threshold: 0.5,
            low_quality_fault_scale: 0.8,
            anomaly_penalty_threshold: 2,
            anomaly_vendor_penalty: 0.1,
            full_award_fault: 0.9,
            full_award_other_ceiling: 0.1,
            quality_base: 0.5,
            quality_validated_bonus: 0.3,
            quality_structured_bonus: 0.2,
            confidence_base: 0.5,
            confidence_per_item: 0.05,
            confidence_item_cap: 0.2,
            confidence_per_validated: 0.05,
            confidence_validated_cap: 0.15,
            confidence_violation_bonus: 0.15,
            confidence_per_anomaly: 0.05,
            confidence_anomaly_cap: 0.2,
            filing_delay_days: 30,
            high_value_threshold: Amount::from_minor(1_000_000).unwrap_or(Amount::ZERO),
        }
    }
}

impl ScoringWeights {
    /// Parse weights from YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ArbitrationError> {
        let weights: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ArbitrationError::InvalidWeights(e.to_string()))?;
        weights.validate()?;
        Ok(weights)
    }

    /// Load weights from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ArbitrationError> {
        let text = std::fs::read_to_string(path).map_err(|e| ArbitrationError::WeightsLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&text).map_err(|e| ArbitrationError::WeightsLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Reject negative or non-finite weights and out-of-range thresholds.
    pub fn validate(&self) -> Result<(), ArbitrationError> {
        let mut named = vec![
            ("compliance_penalty_per_violation", self.compliance_penalty_per_violation),
            ("vendor_fault_per_violation", self.vendor_fault_per_violation),
            ("vendor_violation_fault_cap", self.vendor_violation_fault_cap),
            ("noncompliance_fault_factor", self.noncompliance_fault_factor),
            ("low_quality_threshold", self.low_quality_threshold),
            ("low_quality_fault_scale", self.low_quality_fault_scale),
            ("anomaly_vendor_penalty", self.anomaly_vendor_penalty),
            ("full_award_fault", self.full_award_fault),
            ("full_award_other_ceiling", self.full_award_other_ceiling),
            ("quality_base", self.quality_base),
            ("quality_validated_bonus", self.quality_validated_bonus),
            ("quality_structured_bonus", self.quality_structured_bonus),
            ("confidence_base", self.confidence_base),
            ("confidence_per_item", self.confidence_per_item),
            ("confidence_item_cap", self.confidence_item_cap),
            ("confidence_per_validated", self.confidence_per_validated),
            ("confidence_validated_cap", self.confidence_validated_cap),
            ("confidence_violation_bonus", self.confidence_violation_bonus),
            ("confidence_per_anomaly", self.confidence_per_anomaly),
            ("confidence_anomaly_cap", self.confidence_anomaly_cap),
        ];
        for adj in self.type_adjustments.all() {
            named.push(("type_adjustments.buyer", adj.buyer));
            named.push(("type_adjustments.vendor", adj.vendor));
        }
        if let Some((name, value)) = named.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(ArbitrationError::InvalidWeights(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
        for (name, value) in [
            ("low_quality_fault_scale", self.low_quality_fault_scale),
            ("full_award_fault", self.full_award_fault),
            ("full_award_other_ceiling", self.full_award_other_ceiling),
        ] {
            if value > 1.0 {
                return Err(ArbitrationError::InvalidWeights(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.filing_delay_days < 0 {
            return Err(ArbitrationError::InvalidWeights(
                "filing_delay_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Metrics Extraction ─────────────────────────────────────────────────

/// Service metrics observed in the evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedMetrics {
    /// Uptime in percent.
    pub uptime_percent: Option<f64>,
    /// Average response time in milliseconds.
    pub avg_response_time_ms: Option<f64>,
    /// Delivery time.
    pub delivered_at: Option<Timestamp>,
}

/// Extracts service metrics from an evidence packet.
pub trait MetricsExtractor: Send + Sync {
    /// Observed metrics. Anything not extractable stays `None`.
    fn extract(&self, packet: &UnifiedPacket) -> ObservedMetrics;
}

/// Reads metrics the vendor reported and delivery events the platform
/// recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketMetricsExtractor;

impl MetricsExtractor for PacketMetricsExtractor {
    fn extract(&self, packet: &UnifiedPacket) -> ObservedMetrics {
        let reported = packet.vendor_logs.as_ref().map(|v| &v.metrics);
        let platform_delivery = packet.internal_logs.as_ref().and_then(|logs| {
            logs.events
                .iter()
                .filter(|e| e.event_type.to_ascii_lowercase().contains("deliver"))
                .map(|e| e.occurred_at)
                .min()
        });
        ObservedMetrics {
            uptime_percent: reported.and_then(|m| m.uptime_percent),
            avg_response_time_ms: reported.and_then(|m| m.avg_response_time_ms),
            // The platform's own record wins over the vendor's claim.
            delivered_at: platform_delivery.or_else(|| reported.and_then(|m| m.delivered_at)),
        }
    }
}

// ── Scoring Steps ──────────────────────────────────────────────────────

/// Result of comparing observed metrics with contractual terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaAssessment {
    /// One string per violation.
    pub violations: Vec<String>,
    /// `max(0, 1 - penalty * violations)`.
    pub compliance_score: f64,
}

/// Compare observed metrics against the transaction's SLA terms.
///
/// Terms whose observed value cannot be extracted are skipped. An
/// undelivered order counts as late once `as_of` is past the deadline.
pub fn compare_sla(
    terms: &SlaTerms,
    observed: &ObservedMetrics,
    as_of: Timestamp,
    weights: &ScoringWeights,
) -> SlaAssessment {
    let mut violations = Vec::new();
    if let (Some(required), Some(actual)) = (terms.uptime_requirement, observed.uptime_percent) {
        if actual < required {
            violations.push(format!("uptime {actual:.2}% below required {required:.2}%"));
        }
    }
    if let (Some(max), Some(actual)) = (terms.max_response_time_ms, observed.avg_response_time_ms) {
        if actual > max {
            violations.push(format!(
                "average response time {actual:.0}ms exceeds maximum {max:.0}ms"
            ));
        }
    }
    if let Some(deadline) = terms.delivery_deadline {
        match observed.delivered_at {
            Some(delivered) if delivered > deadline => {
                violations.push(format!("delivered at {delivered}, after deadline {deadline}"));
            }
            None if as_of > deadline => {
                violations.push(format!("not delivered by deadline {deadline}"));
            }
            _ => {}
        }
    }
    let compliance_score =
        (1.0 - weights.compliance_penalty_per_violation * violations.len() as f64).max(0.0);
    SlaAssessment {
        violations,
        compliance_score,
    }
}

/// A data-quality condition that lowers confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// No platform logs in the packet.
    MissingInternalLogs,
    /// The vendor submitted nothing.
    MissingVendorLogs,
    /// The buyer submitted nothing.
    MissingBuyerEvidence,
    /// The dispute was filed long after the transaction.
    LateFiling {
        /// Days between transaction and filing.
        days: i64,
    },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingInternalLogs => f.write_str("no internal transaction logs"),
            Self::MissingVendorLogs => f.write_str("no vendor logs submitted"),
            Self::MissingBuyerEvidence => f.write_str("no buyer evidence submitted"),
            Self::LateFiling { days } => write!(f, "dispute filed {days} days after the transaction"),
        }
    }
}

/// Anomalies plus informational flags that do not affect scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Anomalies counted by the fault and confidence steps.
    pub anomalies: Vec<Anomaly>,
    /// Informational flags only.
    pub flags: Vec<String>,
}

/// Detect missing sources, late filing, and high-value transactions.
pub fn detect_anomalies(
    packet: &UnifiedPacket,
    transaction: &Transaction,
    weights: &ScoringWeights,
) -> AnomalyReport {
    let mut anomalies = Vec::new();
    if packet.internal_logs.is_none() {
        anomalies.push(Anomaly::MissingInternalLogs);
    }
    if packet.vendor_logs.is_none() {
        anomalies.push(Anomaly::MissingVendorLogs);
    }
    if packet.buyer_evidence.is_none() {
        anomalies.push(Anomaly::MissingBuyerEvidence);
    }
    let delay = *packet.dispute_filed_at.as_datetime() - *transaction.created_at.as_datetime();
    if delay > Duration::days(weights.filing_delay_days) {
        anomalies.push(Anomaly::LateFiling {
            days: delay.num_days(),
        });
    }
    let mut flags = Vec::new();
    if transaction.amount > weights.high_value_threshold {
        flags.push(format!(
            "high-value transaction: {} {} exceeds {}",
            transaction.amount, transaction.currency, weights.high_value_threshold
        ));
    }
    AnomalyReport { anomalies, flags }
}

/// Mean per-item quality; `0.0` when there are no items.
pub fn evidence_quality(packet: &UnifiedPacket, weights: &ScoringWeights) -> f64 {
    if packet.items.is_empty() {
        return 0.0;
    }
    let total: f64 = packet
        .items
        .iter()
        .map(|item| {
            let mut score = weights.quality_base;
            if item.validated {
                score += weights.quality_validated_bonus;
            }
            if item.substantive {
                score += weights.quality_structured_bonus;
            }
            score
        })
        .sum();
    total / packet.items.len() as f64
}

/// Buyer and vendor fault, each in `[0, 1]`, summing to at most `1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultScores {
    /// Buyer's share of responsibility.
    pub buyer: f64,
    /// Vendor's share of responsibility.
    pub vendor: f64,
}

/// Apportion fault.
pub fn score_fault(
    dispute_type: DisputeType,
    sla: &SlaAssessment,
    quality: f64,
    anomaly_count: usize,
    weights: &ScoringWeights,
) -> FaultScores {
    let violations = sla.violations.len() as f64;
    let mut vendor = (violations * weights.vendor_fault_per_violation)
        .min(weights.vendor_violation_fault_cap)
        + (1.0 - sla.compliance_score) * weights.noncompliance_fault_factor;
    let mut buyer = 0.0;

    let adj = weights.type_adjustments.for_type(dispute_type);
    vendor += adj.vendor;
    buyer += adj.buyer;

    if quality < weights.low_quality_threshold {
        buyer *= weights.low_quality_fault_scale;
        vendor *= weights.low_quality_fault_scale;
    }
    if anomaly_count > weights.anomaly_penalty_threshold {
        vendor += weights.anomaly_vendor_penalty;
    }

    let mut vendor = vendor.clamp(0.0, 1.0);
    let mut buyer = buyer.clamp(0.0, 1.0);
    let sum = vendor + buyer;
    if sum > 1.0 {
        vendor /= sum;
        // Derive from the complement so rounding cannot push the sum past 1.
        buyer = (buyer / sum).min(1.0 - vendor);
    }
    FaultScores { buyer, vendor }
}

/// Recommended disbursement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payouts {
    /// Refunded to the buyer.
    pub buyer: Amount,
    /// Released to the vendor.
    pub vendor: Amount,
}

/// Split the transaction amount according to fault.
pub fn calculate_payouts(amount: Amount, fault: FaultScores, weights: &ScoringWeights) -> Payouts {
    if fault.vendor >= weights.full_award_fault && fault.buyer < weights.full_award_other_ceiling {
        return Payouts {
            buyer: amount,
            vendor: Amount::ZERO,
        };
    }
    if fault.buyer >= weights.full_award_fault && fault.vendor < weights.full_award_other_ceiling {
        return Payouts {
            buyer: Amount::ZERO,
            vendor: amount,
        };
    }
    Payouts {
        buyer: amount.mul_fraction(fault.vendor),
        vendor: amount.mul_fraction(1.0 - fault.vendor),
    }
}

/// Confidence in the automated ruling.
pub fn confidence_score(
    item_count: usize,
    validated_count: usize,
    violation_count: usize,
    anomaly_count: usize,
    weights: &ScoringWeights,
) -> f64 {
    let mut confidence = weights.confidence_base;
    confidence += (item_count as f64 * weights.confidence_per_item).min(weights.confidence_item_cap);
    confidence += (validated_count as f64 * weights.confidence_per_validated)
        .min(weights.confidence_validated_cap);
    if violation_count > 0 {
        confidence += weights.confidence_violation_bonus;
    }
    confidence -= (anomaly_count as f64 * weights.confidence_per_anomaly)
        .min(weights.confidence_anomaly_cap);
    confidence.clamp(0.0, 1.0)
}

fn summarize(fault: FaultScores, sla: &SlaAssessment) -> String {
    let primary = if fault.vendor > fault.buyer {
        format!(
            "Vendor bears primary fault ({:.2} vs buyer {:.2}).",
            fault.vendor, fault.buyer
        )
    } else if fault.buyer > fault.vendor {
        format!(
            "Buyer bears primary fault ({:.2} vs vendor {:.2}).",
            fault.buyer, fault.vendor
        )
    } else {
        format!("Fault is shared equally ({:.2} each).", fault.vendor)
    };
    match sla.violations.first() {
        Some(first) => format!(
            "{primary} {} SLA violation(s) detected; first: {first}.",
            sla.violations.len()
        ),
        None => format!("{primary} No SLA violations detected."),
    }
}

// ── Decision ───────────────────────────────────────────────────────────

/// Complete scorer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationDecision {
    /// Dispute scored.
    pub dispute_id: DisputeId,
    /// Its type.
    pub dispute_type: DisputeType,
    /// Fault apportionment.
    pub fault: FaultScores,
    /// Recommended payouts.
    pub payouts: Payouts,
    /// Transaction currency.
    pub currency: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Mean per-item evidence quality.
    pub evidence_quality: f64,
    /// SLA assessment.
    pub sla: SlaAssessment,
    /// Anomalies and informational flags.
    pub anomalies: AnomalyReport,
    /// Metrics the extractor observed.
    pub observed_metrics: ObservedMetrics,
    /// Cross-source consistency carried from the packet.
    pub consistency_score: f64,
    /// Cross-source conflicts carried from the packet.
    pub conflicts: Vec<String>,
    /// Free-text quality standards for reviewers.
    pub quality_standards: Vec<String>,
    /// Number of evidence items scored.
    pub evidence_items: usize,
    /// Number of validated items.
    pub validated_items: usize,
    /// Natural-language summary.
    pub summary: String,
    /// Generation time of the packet that was scored.
    pub packet_generated_at: Timestamp,
}

impl ArbitrationDecision {
    /// SHA-256 over the canonical decision.
    pub fn fingerprint(&self) -> Result<ContentDigest, ArbitrationError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

/// Inputs to one scoring run.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    /// The authoritative packet.
    pub packet: &'a UnifiedPacket,
    /// The disputed transaction.
    pub transaction: &'a Transaction,
}

/// The arbitration scorer.
#[derive(Clone)]
pub struct ArbitrationScorer {
    weights: ScoringWeights,
    extractor: Arc<dyn MetricsExtractor>,
}

impl std::fmt::Debug for ArbitrationScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationScorer")
            .field("weights", &self.weights)
            .finish_non_exhaustive()
    }
}

impl Default for ArbitrationScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl ArbitrationScorer {
    /// Scorer with the default metrics extractor.
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            weights,
            extractor: Arc::new(PacketMetricsExtractor),
        }
    }

    /// Replace the metrics extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn MetricsExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Active weights.
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a packet.
    pub fn score(&self, input: ScoringInput<'_>) -> ArbitrationDecision {
        let ScoringInput { packet, transaction } = input;
        let w = &self.weights;

        let observed = self.extractor.extract(packet);
        let sla = compare_sla(&transaction.sla_terms, &observed, packet.generated_at, w);
        let anomalies = detect_anomalies(packet, transaction, w);
        let quality = evidence_quality(packet, w);
        let fault = score_fault(packet.dispute_type, &sla, quality, anomalies.anomalies.len(), w);
        let payouts = calculate_payouts(transaction.amount, fault, w);
        let validated_items = packet.items.iter().filter(|i| i.validated).count();
        let confidence = confidence_score(
            packet.items.len(),
            validated_items,
            sla.violations.len(),
            anomalies.anomalies.len(),
            w,
        );
        let summary = summarize(fault, &sla);

        debug!(
            dispute_id = %packet.dispute_id,
            buyer_fault = fault.buyer,
            vendor_fault = fault.vendor,
            confidence,
            violations = sla.violations.len(),
            anomalies = anomalies.anomalies.len(),
            "scored dispute"
        );

        ArbitrationDecision {
            dispute_id: packet.dispute_id,
            dispute_type: packet.dispute_type,
            fault,
            payouts,
            currency: transaction.currency.clone(),
            confidence,
            evidence_quality: quality,
            sla,
            anomalies,
            observed_metrics: observed,
            consistency_score: packet.cross_validation.consistency_score,
            conflicts: packet.cross_validation.conflicts.clone(),
            quality_standards: transaction.sla_terms.quality_standards.clone(),
            evidence_items: packet.items.len(),
            validated_items,
            summary,
            packet_generated_at: packet.generated_at,
        }
    }
}
