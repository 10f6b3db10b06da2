//! # Dispute Routes
//!
//! HTTP surface over [`tvda_workflow::ArbitrationService`]: open a dispute,
//! submit evidence, read status, run arbitration on demand, and escalate to
//! a human reviewer with an optional payout override.
//!
//! Handlers parse and validate request bodies and delegate everything else
//! to the service.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use tvda_arbitration::{ArbitrationDecision, Dispute, DisputeType, EvidenceItem, EvidenceType};
use tvda_core::{Amount, DisputeId, TransactionId, UserId};
use tvda_workflow::{DisputeStatusReport, EscalationAck, NewDispute, OverridePayouts};

use super::render_time;
use crate::error::AppError;
use crate::state::AppState;

// ── Request / Response types ───────────────────────────────────────────

/// Request to open a dispute.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDisputeRequest {
    /// Disputed transaction UUID.
    pub transaction_id: Uuid,
    /// UUID of the party raising the dispute.
    pub raised_by: Uuid,
    /// Short reason.
    pub reason: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// One of `item_not_received`, `scam`, `quality_issue`,
    /// `unauthorized_charge`, `sla_breach`, `other`.
    pub dispute_type: String,
}

/// Evidence submission.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitEvidenceRequest {
    /// `vendor_logs` or `buyer_evidence`.
    pub evidence_type: String,
    /// UUID of the submitting party.
    pub submitter_id: Uuid,
    /// Evidence body; must be a JSON object.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Escalation request. Payouts are decimal strings and must be given
/// together.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EscalateRequest {
    /// Refund to the buyer.
    pub buyer_payout: Option<String>,
    /// Release to the vendor.
    pub vendor_payout: Option<String>,
    /// Reviewer note.
    pub note: Option<String>,
}

/// Dispute summary in API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisputeResponse {
    pub dispute_id: String,
    pub transaction_id: String,
    pub raised_by: String,
    pub dispute_type: String,
    pub status: String,
    pub workflow_stage: String,
    pub reason: String,
    pub description: String,
    pub escrow_frozen: bool,
    pub escalated_to_human: bool,
    pub escalation_reason: Option<String>,
    pub transition_count: usize,
    pub created_at: String,
    pub updated_at: String,
    pub resolved_at: Option<String>,
}

/// Workflow timing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkflowResponse {
    pub stage: String,
    pub evidence_deadline: Option<String>,
    pub analysis_deadline: Option<String>,
    pub workflow_deadline: Option<String>,
    pub hours_remaining: Option<i64>,
    pub overdue: bool,
    pub escalated_to_human: bool,
}

/// Ruling summary.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArbitrationResponse {
    pub case_id: String,
    pub status: String,
    pub buyer_fault: f64,
    pub vendor_fault: f64,
    pub buyer_payout: String,
    pub vendor_payout: String,
    pub confidence: Option<f64>,
    pub summary: Option<String>,
    pub human_reviewed: bool,
}

/// Full status of a dispute.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisputeStatusResponse {
    pub dispute: DisputeResponse,
    pub workflow: WorkflowResponse,
    pub arbitration: Option<ArbitrationResponse>,
    pub evidence_count: usize,
    pub evidence_complete: bool,
}

/// A stored evidence item.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvidenceResponse {
    pub evidence_id: String,
    pub dispute_id: String,
    pub evidence_type: String,
    pub submitted_by: String,
    pub validated: bool,
    /// SHA-256 of the canonical payload, hex.
    pub digest: String,
    pub submitted_at: String,
}

/// Scorer output.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DecisionResponse {
    pub dispute_id: String,
    pub dispute_type: String,
    pub buyer_fault: f64,
    pub vendor_fault: f64,
    pub buyer_payout: String,
    pub vendor_payout: String,
    pub currency: String,
    pub confidence: f64,
    pub evidence_quality: f64,
    pub compliance_score: f64,
    pub sla_violations: Vec<String>,
    pub anomalies: Vec<String>,
    pub flags: Vec<String>,
    pub summary: String,
    /// SHA-256 of the canonical decision, hex.
    pub fingerprint: String,
}

/// Escalation acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscalationResponse {
    pub dispute_id: String,
    pub stage: String,
    pub override_recorded: bool,
    pub resolved: bool,
}

// ── Router ─────────────────────────────────────────────────────────────

/// Build the dispute router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes", post(create_dispute).get(list_disputes))
        .route("/v1/disputes/{id}", get(get_dispute))
        .route("/v1/disputes/{id}/evidence", post(submit_evidence).get(list_evidence))
        .route("/v1/disputes/{id}/arbitrate", post(arbitrate))
        .route("/v1/disputes/{id}/escalate", post(escalate))
}

// ── Helpers ────────────────────────────────────────────────────────────

fn dispute_to_response(d: &Dispute) -> DisputeResponse {
    DisputeResponse {
        dispute_id: d.id.as_uuid().to_string(),
        transaction_id: d.transaction_id.as_uuid().to_string(),
        raised_by: d.raised_by.as_uuid().to_string(),
        dispute_type: d.dispute_type.as_str().to_string(),
        status: d.status.as_str().to_string(),
        workflow_stage: d.workflow_stage.as_str().to_string(),
        reason: d.reason.clone(),
        description: d.description.clone(),
        escrow_frozen: d.escrow_frozen,
        escalated_to_human: d.escalated_to_human,
        escalation_reason: d.escalation_reason.clone(),
        transition_count: d.transition_log.len(),
        created_at: render_time(d.created_at),
        updated_at: render_time(d.updated_at),
        resolved_at: d.resolved_at.map(render_time),
    }
}

fn status_to_response(report: DisputeStatusReport) -> DisputeStatusResponse {
    let deadlines = report.workflow.deadlines;
    DisputeStatusResponse {
        dispute: dispute_to_response(&report.dispute),
        workflow: WorkflowResponse {
            stage: report.workflow.stage.as_str().to_string(),
            evidence_deadline: deadlines.map(|d| render_time(d.evidence_deadline)),
            analysis_deadline: deadlines.map(|d| render_time(d.analysis_deadline)),
            workflow_deadline: deadlines.map(|d| render_time(d.workflow_deadline)),
            hours_remaining: report.workflow.hours_remaining,
            overdue: report.workflow.overdue,
            escalated_to_human: report.workflow.escalated_to_human,
        },
        arbitration: report.arbitration.map(|a| ArbitrationResponse {
            case_id: a.case_id.as_uuid().to_string(),
            status: a.status.to_string(),
            buyer_fault: a.buyer_fault,
            vendor_fault: a.vendor_fault,
            buyer_payout: a.buyer_payout.to_string(),
            vendor_payout: a.vendor_payout.to_string(),
            confidence: a.confidence,
            summary: a.summary,
            human_reviewed: a.human_reviewed,
        }),
        evidence_count: report.evidence_count,
        evidence_complete: report.evidence_complete,
    }
}

fn evidence_to_response(item: &EvidenceItem) -> EvidenceResponse {
    EvidenceResponse {
        evidence_id: item.id.as_uuid().to_string(),
        dispute_id: item.dispute_id.as_uuid().to_string(),
        evidence_type: item.evidence_type().as_str().to_string(),
        submitted_by: item.submitted_by.to_string(),
        validated: item.validated,
        digest: item.digest.to_hex(),
        submitted_at: item.submitted_at.to_string(),
    }
}

fn decision_to_response(d: &ArbitrationDecision) -> Result<DecisionResponse, AppError> {
    Ok(DecisionResponse {
        dispute_id: d.dispute_id.as_uuid().to_string(),
        dispute_type: d.dispute_type.as_str().to_string(),
        buyer_fault: d.fault.buyer,
        vendor_fault: d.fault.vendor,
        buyer_payout: d.payouts.buyer.to_string(),
        vendor_payout: d.payouts.vendor.to_string(),
        currency: d.currency.clone(),
        confidence: d.confidence,
        evidence_quality: d.evidence_quality,
        compliance_score: d.sla.compliance_score,
        sla_violations: d.sla.violations.clone(),
        anomalies: d.anomalies.anomalies.iter().map(ToString::to_string).collect(),
        flags: d.anomalies.flags.clone(),
        summary: d.summary.clone(),
        fingerprint: d.fingerprint()?.to_hex(),
    })
}

fn parse_override(req: EscalateRequest) -> Result<Option<OverridePayouts>, AppError> {
    match (req.buyer_payout, req.vendor_payout) {
        (None, None) => Ok(None),
        (Some(buyer), Some(vendor)) => Ok(Some(OverridePayouts {
            buyer_payout: Amount::parse(&buyer)?,
            vendor_payout: Amount::parse(&vendor)?,
            note: req.note,
        })),
        _ => Err(AppError::Validation(
            "buyer_payout and vendor_payout must be given together".to_string(),
        )),
    }
}

fn ack_to_response(ack: EscalationAck) -> EscalationResponse {
    EscalationResponse {
        dispute_id: ack.dispute_id.as_uuid().to_string(),
        stage: ack.stage.as_str().to_string(),
        override_recorded: ack.override_recorded,
        resolved: ack.resolved,
    }
}

// ── Handlers ───────────────────────────────────────────────────────────

/// POST /v1/disputes — Open a dispute and start its workflow.
#[utoipa::path(
    post,
    path = "/v1/disputes",
    request_body = CreateDisputeRequest,
    responses(
        (status = 201, description = "Dispute opened", body = DisputeResponse),
        (status = 403, description = "Caller is not a party to the transaction"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction already has an open dispute"),
        (status = 422, description = "Validation error"),
    ),
    tag = "disputes"
)]
pub async fn create_dispute(
    State(state): State<AppState>,
    Json(req): Json<CreateDisputeRequest>,
) -> Result<(StatusCode, Json<DisputeResponse>), AppError> {
    let dispute_type: DisputeType = req.dispute_type.parse()?;
    if req.reason.trim().is_empty() {
        return Err(AppError::Validation("reason must not be empty".to_string()));
    }
    let dispute = state.service.create_dispute(NewDispute {
        transaction_id: TransactionId::from_uuid(req.transaction_id),
        raised_by: UserId::from_uuid(req.raised_by),
        reason: req.reason,
        description: req.description.unwrap_or_default(),
        dispute_type,
    })?;
    Ok((StatusCode::CREATED, Json(dispute_to_response(&dispute))))
}

/// GET /v1/disputes — List all disputes.
#[utoipa::path(
    get,
    path = "/v1/disputes",
    responses(
        (status = 200, description = "All disputes, oldest first", body = Vec<DisputeResponse>),
    ),
    tag = "disputes"
)]
pub async fn list_disputes(State(state): State<AppState>) -> Json<Vec<DisputeResponse>> {
    Json(state.service.list_disputes().iter().map(dispute_to_response).collect())
}

/// GET /v1/disputes/{id} — Dispute, workflow timing, ruling and evidence count.
#[utoipa::path(
    get,
    path = "/v1/disputes/{id}",
    params(("id" = String, Path, description = "Dispute UUID")),
    responses(
        (status = 200, description = "Dispute status", body = DisputeStatusResponse),
        (status = 404, description = "Dispute not found"),
    ),
    tag = "disputes"
)]
pub async fn get_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DisputeStatusResponse>, AppError> {
    let report = state.service.get_status(DisputeId::from_uuid(id))?;
    Ok(Json(status_to_response(report)))
}

/// POST /v1/disputes/{id}/evidence — Submit vendor logs or buyer evidence.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/evidence",
    params(("id" = String, Path, description = "Dispute UUID")),
    request_body = SubmitEvidenceRequest,
    responses(
        (status = 201, description = "Evidence stored", body = EvidenceResponse),
        (status = 403, description = "Submitter may not provide this evidence type"),
        (status = 404, description = "Dispute not found"),
        (status = 409, description = "Dispute no longer accepts evidence"),
        (status = 422, description = "Malformed evidence"),
    ),
    tag = "disputes"
)]
pub async fn submit_evidence(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitEvidenceRequest>,
) -> Result<(StatusCode, Json<EvidenceResponse>), AppError> {
    let evidence_type: EvidenceType = req.evidence_type.parse()?;
    let item = state.service.submit_evidence(
        DisputeId::from_uuid(id),
        evidence_type,
        req.payload,
        UserId::from_uuid(req.submitter_id),
    )?;
    Ok((StatusCode::CREATED, Json(evidence_to_response(&item))))
}

/// GET /v1/disputes/{id}/evidence — Every stored evidence item.
#[utoipa::path(
    get,
    path = "/v1/disputes/{id}/evidence",
    params(("id" = String, Path, description = "Dispute UUID")),
    responses(
        (status = 200, description = "Evidence items, oldest first", body = Vec<EvidenceResponse>),
        (status = 404, description = "Dispute not found"),
    ),
    tag = "disputes"
)]
pub async fn list_evidence(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EvidenceResponse>>, AppError> {
    let dispute_id = DisputeId::from_uuid(id);
    state.service.get_status(dispute_id)?;
    let items = state.service.evidence().all(&dispute_id);
    Ok(Json(items.iter().map(evidence_to_response).collect()))
}

/// POST /v1/disputes/{id}/arbitrate — Score now, regardless of stage.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/arbitrate",
    params(("id" = String, Path, description = "Dispute UUID")),
    responses(
        (status = 200, description = "Ruling recorded", body = DecisionResponse),
        (status = 404, description = "Dispute not found"),
        (status = 409, description = "Dispute is being processed"),
    ),
    tag = "disputes"
)]
pub async fn arbitrate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, AppError> {
    let decision = state.service.run_arbitration_manually(DisputeId::from_uuid(id))?;
    Ok(Json(decision_to_response(&decision)?))
}

/// POST /v1/disputes/{id}/escalate — Hand to a human reviewer.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/escalate",
    params(("id" = String, Path, description = "Dispute UUID")),
    request_body = EscalateRequest,
    responses(
        (status = 200, description = "Escalated", body = EscalationResponse),
        (status = 404, description = "Dispute not found"),
        (status = 409, description = "Dispute cannot be escalated"),
        (status = 422, description = "Invalid override"),
        (status = 502, description = "Escrow gateway failure; override will be retried"),
    ),
    tag = "disputes"
)]
pub async fn escalate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<EscalationResponse>, AppError> {
    // An empty body escalates without an override.
    let req: EscalateRequest = if body.is_empty() {
        EscalateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::Validation(format!("invalid escalation body: {e}")))?
    };
    let override_payouts = parse_override(req)?;
    let ack = state
        .service
        .escalate_to_human(DisputeId::from_uuid(id), override_payouts)?;
    Ok(Json(ack_to_response(ack)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_requires_both_amounts() {
        let err = parse_override(EscalateRequest {
            buyer_payout: Some("10.00".to_string()),
            ..EscalateRequest::default()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(parse_override(EscalateRequest::default()).unwrap().is_none());
    }

    #[test]
    fn override_amounts_are_parsed() {
        let split = parse_override(EscalateRequest {
            buyer_payout: Some("12.50".to_string()),
            vendor_payout: Some("0".to_string()),
            note: Some("ok".to_string()),
        })
        .unwrap()
        .unwrap();
        assert_eq!(split.buyer_payout.minor_units(), 1250);
        assert_eq!(split.vendor_payout, Amount::ZERO);
    }
}
