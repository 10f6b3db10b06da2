//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TVDA — Escrow Dispute Arbitration",
        version = "0.1.0",
        description = "Time-bounded arbitration of escrow disputes.\n\nA dispute moves through evidence collection, automated analysis and a final ruling within 72 hours, or is handed to a human reviewer. Rulings split the escrowed amount between buyer and vendor by fault.",
        license(name = "AGPL-3.0-or-later"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // ── Disputes ────────────────────────────────────────────────────
        crate::routes::disputes::create_dispute,
        crate::routes::disputes::list_disputes,
        crate::routes::disputes::get_dispute,
        crate::routes::disputes::submit_evidence,
        crate::routes::disputes::list_evidence,
        crate::routes::disputes::arbitrate,
        crate::routes::disputes::escalate,
        // ── Transactions ────────────────────────────────────────────────
        crate::routes::transactions::create_transaction,
        crate::routes::transactions::get_transaction,
        crate::routes::transactions::record_event,
        // ── Workflows ───────────────────────────────────────────────────
        crate::routes::workflows::tick,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::disputes::CreateDisputeRequest,
            crate::routes::disputes::SubmitEvidenceRequest,
            crate::routes::disputes::EscalateRequest,
            crate::routes::disputes::DisputeResponse,
            crate::routes::disputes::WorkflowResponse,
            crate::routes::disputes::ArbitrationResponse,
            crate::routes::disputes::DisputeStatusResponse,
            crate::routes::disputes::EvidenceResponse,
            crate::routes::disputes::DecisionResponse,
            crate::routes::disputes::EscalationResponse,
            crate::routes::transactions::SlaTermsRequest,
            crate::routes::transactions::CreateTransactionRequest,
            crate::routes::transactions::RecordEventRequest,
            crate::routes::transactions::TransactionResponse,
            crate::routes::workflows::TickEntryResponse,
            crate::routes::workflows::TickResponse,
        )
    ),
    tags(
        (name = "disputes", description = "Dispute lifecycle, evidence and rulings"),
        (name = "transactions", description = "Escrow transactions in the local ledger"),
        (name = "workflows", description = "Scheduler entry point"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        for path in [
            "/v1/disputes",
            "/v1/disputes/{id}",
            "/v1/disputes/{id}/evidence",
            "/v1/disputes/{id}/arbitrate",
            "/v1/disputes/{id}/escalate",
            "/v1/transactions",
            "/v1/transactions/{id}",
            "/v1/transactions/{id}/events",
            "/v1/workflows/tick",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
