//! # Workflow Routes
//!
//! `POST /v1/workflows/tick` runs one scheduler pass on demand. The server
//! also ticks on its own interval; this route lets an external scheduler
//! drive the workflow instead.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tvda_workflow::{StepOutcome, TickReport};

use super::render_time;
use crate::state::AppState;

/// One dispute's outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TickEntryResponse {
    pub dispute_id: String,
    /// `advanced`, `waiting`, `escalated`, `resolved`, `skipped` or `failed`.
    pub outcome: String,
    pub detail: Option<String>,
}

/// Result of a tick.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TickResponse {
    pub at: String,
    pub processed: usize,
    pub advanced: usize,
    pub escalated: usize,
    pub failed: usize,
    pub entries: Vec<TickEntryResponse>,
}

/// Build the workflow router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/workflows/tick", post(tick))
}

fn outcome_parts(outcome: &StepOutcome) -> (&'static str, Option<String>) {
    match outcome {
        StepOutcome::Advanced { from, to } => ("advanced", Some(format!("{from} -> {to}"))),
        StepOutcome::Waiting { reason } => ("waiting", Some(reason.clone())),
        StepOutcome::Escalated { reason, .. } => ("escalated", Some(reason.clone())),
        StepOutcome::Resolved => ("resolved", None),
        StepOutcome::Skipped { reason } => ("skipped", Some(reason.clone())),
        StepOutcome::Failed { error } => ("failed", Some(error.clone())),
    }
}

pub(crate) fn report_to_response(report: &TickReport) -> TickResponse {
    TickResponse {
        at: render_time(report.at),
        processed: report.processed(),
        advanced: report.advanced(),
        escalated: report.escalated(),
        failed: report.failed(),
        entries: report
            .entries
            .iter()
            .map(|e| {
                let (outcome, detail) = outcome_parts(&e.outcome);
                TickEntryResponse {
                    dispute_id: e.dispute_id.as_uuid().to_string(),
                    outcome: outcome.to_string(),
                    detail,
                }
            })
            .collect(),
    }
}

/// POST /v1/workflows/tick — Process every active dispute once.
#[utoipa::path(
    post,
    path = "/v1/workflows/tick",
    responses(
        (status = 200, description = "Per-dispute outcomes", body = TickResponse),
    ),
    tag = "workflows"
)]
pub async fn tick(State(state): State<AppState>) -> Json<TickResponse> {
    let report = state.service.tick();
    Json(report_to_response(&report))
}
