//! # tvda-api — Axum API Services
//!
//! HTTP surface over the arbitration service, built on Axum/Tower/Tokio.
//!
//! ## API Surface
//!
//! | Prefix | Module | Domain |
//! |---|---|---|
//! | `/v1/disputes/*` | [`routes::disputes`] | Disputes, evidence, rulings, escalation |
//! | `/v1/transactions/*` | [`routes::transactions`] | Escrow transactions (local ledger) |
//! | `/v1/workflows/tick` | [`routes::workflows`] | Scheduler entry point |
//! | `/openapi.json` | [`openapi`] | OpenAPI document |
//! | `/health/*` | this module | Liveness and readiness probes |
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers; they delegate to `tvda-workflow`.
//! - All errors map to structured HTTP responses via [`AppError`].
//! - The workflow is advanced by [`spawn_ticker`] on the configured interval
//!   and by `POST /v1/workflows/tick`.

pub mod config;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::disputes::router())
        .merge(routes::transactions::router())
        .merge(routes::workflows::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Run [`tvda_workflow::ArbitrationService::tick`] every `interval` on a
/// blocking thread so lock waits never stall the async runtime.
pub fn spawn_ticker(state: AppState, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let service = state.service.clone();
            match tokio::task::spawn_blocking(move || service.tick()).await {
                Ok(report) if report.failed() > 0 => {
                    tracing::warn!(failed = report.failed(), "tick finished with failures")
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "tick task panicked"),
            }
        }
    })
}

/// Liveness probe. Returns 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Succeeds once the dispute store is readable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let disputes = state.service.list_disputes().len();
    tracing::debug!(disputes, "readiness probe");
    (StatusCode::OK, "ready")
}
