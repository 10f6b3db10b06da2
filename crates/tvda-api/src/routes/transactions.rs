//! # Transaction Routes
//!
//! Registers escrow transactions in the in-process ledger and records
//! platform events (e.g. `delivered`) against them. In production the
//! payments system owns this data; these routes exist so the arbitration
//! service can be exercised on its own.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use tvda_arbitration::{SlaTerms, SystemEvent, Transaction, TransactionLedger};
use tvda_core::{Amount, Timestamp, TransactionId, UserId};

use crate::error::AppError;
use crate::state::AppState;

// ── Request / Response types ───────────────────────────────────────────

/// Service-level terms.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SlaTermsRequest {
    /// Minimum uptime percent.
    pub uptime_requirement: Option<f64>,
    /// Maximum average response time in milliseconds.
    pub max_response_time_ms: Option<f64>,
    /// Delivery deadline (ISO 8601).
    pub delivery_deadline: Option<String>,
    /// Free-text quality standards.
    #[serde(default)]
    pub quality_standards: Vec<String>,
}

/// Request to register a transaction.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    /// Buyer UUID.
    pub buyer_id: Uuid,
    /// Vendor UUID.
    pub vendor_id: Uuid,
    /// Amount held in escrow (decimal string).
    pub amount: String,
    /// ISO 4217 currency.
    pub currency: String,
    /// Contractual terms.
    #[serde(default)]
    pub sla_terms: Option<SlaTermsRequest>,
    /// Creation time (ISO 8601); defaults to now.
    pub created_at: Option<String>,
}

/// Request to record a platform event.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordEventRequest {
    /// Event type, e.g. `delivered`.
    pub event_type: String,
    /// When it happened (ISO 8601); defaults to now.
    pub occurred_at: Option<String>,
    /// Free-form details.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

/// Transaction summary.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub buyer_id: String,
    pub vendor_id: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub event_count: usize,
    pub created_at: String,
}

// ── Router ─────────────────────────────────────────────────────────────

/// Build the transaction router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/transactions", post(create_transaction))
        .route("/v1/transactions/{id}", get(get_transaction))
        .route("/v1/transactions/{id}/events", post(record_event))
}

fn to_response(t: &Transaction) -> TransactionResponse {
    TransactionResponse {
        transaction_id: t.id.as_uuid().to_string(),
        buyer_id: t.buyer_id.as_uuid().to_string(),
        vendor_id: t.vendor_id.as_uuid().to_string(),
        amount: t.amount.to_string(),
        currency: t.currency.clone(),
        status: t.status.as_str().to_string(),
        event_count: t.events.len(),
        created_at: t.created_at.to_string(),
    }
}

fn parse_time(raw: Option<&str>) -> Result<Timestamp, AppError> {
    match raw {
        Some(s) => Ok(Timestamp::parse(s)?),
        None => Ok(Timestamp::now()),
    }
}

// ── Handlers ───────────────────────────────────────────────────────────

/// POST /v1/transactions — Register an escrow transaction.
#[utoipa::path(
    post,
    path = "/v1/transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction registered", body = TransactionResponse),
        (status = 422, description = "Validation error"),
    ),
    tag = "transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    if req.buyer_id == req.vendor_id {
        return Err(AppError::Validation("buyer and vendor must differ".to_string()));
    }
    let amount = Amount::parse(&req.amount)?;
    if !amount.is_positive() {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    let terms = req.sla_terms.unwrap_or_default();
    let sla_terms = SlaTerms {
        uptime_requirement: terms.uptime_requirement,
        max_response_time_ms: terms.max_response_time_ms,
        delivery_deadline: terms
            .delivery_deadline
            .as_deref()
            .map(Timestamp::parse)
            .transpose()?,
        quality_standards: terms.quality_standards,
    };
    let txn = Transaction::new(
        UserId::from_uuid(req.buyer_id),
        UserId::from_uuid(req.vendor_id),
        amount,
        &req.currency,
        sla_terms,
        parse_time(req.created_at.as_deref())?,
    )?;
    state.ledger.insert(txn.clone());
    tracing::info!(transaction_id = %txn.id, amount = %txn.amount, "transaction registered");
    Ok((StatusCode::CREATED, Json(to_response(&txn))))
}

/// GET /v1/transactions/{id} — Fetch a transaction.
#[utoipa::path(
    get,
    path = "/v1/transactions/{id}",
    params(("id" = String, Path, description = "Transaction UUID")),
    responses(
        (status = 200, description = "Transaction", body = TransactionResponse),
        (status = 404, description = "Transaction not found"),
    ),
    tag = "transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let txn = state.ledger.get(&TransactionId::from_uuid(id))?;
    Ok(Json(to_response(&txn)))
}

/// POST /v1/transactions/{id}/events — Record a platform event.
#[utoipa::path(
    post,
    path = "/v1/transactions/{id}/events",
    params(("id" = String, Path, description = "Transaction UUID")),
    request_body = RecordEventRequest,
    responses(
        (status = 200, description = "Event recorded", body = TransactionResponse),
        (status = 404, description = "Transaction not found"),
        (status = 422, description = "Validation error"),
    ),
    tag = "transactions"
)]
pub async fn record_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordEventRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    if req.event_type.trim().is_empty() {
        return Err(AppError::Validation("event_type must not be empty".to_string()));
    }
    let id = TransactionId::from_uuid(id);
    state.ledger.record_event(
        &id,
        SystemEvent {
            event_type: req.event_type,
            occurred_at: parse_time(req.occurred_at.as_deref())?,
            details: req.details,
        },
    )?;
    Ok(Json(to_response(&state.ledger.get(&id)?)))
}
