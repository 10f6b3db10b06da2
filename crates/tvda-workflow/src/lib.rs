//! # tvda-workflow — Time-Bounded Dispute Workflow
//!
//! Drives each dispute through `created → evidence_collection →
//! ai_analysis → final_ruling → completed` within 72 hours, or hands it to
//! a person.
//!
//! - **Coordinator** ([`coordinator`]): pure planner,
//!   `(dispute view, now) → (target stage, effects)`.
//! - **Executor** ([`executor`]): performs effects, including idempotent
//!   disbursement through the escrow gateway.
//! - **Repository** ([`repository`]): disputes with per-dispute leases and
//!   compare-and-swap commits.
//! - **Gateway** ([`gateway`]): escrow, notification and webhook traits
//!   with in-process implementations.
//! - **Service** ([`service`]): the public operations and the scheduler
//!   `tick`.
//!
//! ## Scheduling
//!
//! There is no task per dispute. An external scheduler calls
//! [`ArbitrationService::tick`] at a fixed interval and every wait is a
//! deadline comparison on the next tick.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod repository;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, WorkflowConfig};
pub use coordinator::{fit_payouts, plan, DisputeView, Effect, Plan};
pub use error::WorkflowError;
pub use executor::EffectExecutor;
pub use gateway::{
    DisbursementState, EscrowGateway, GatewayError, InMemoryEscrowGateway, LogNotificationSink,
    LogWebhookEmitter, Notification, NotificationKind, NotificationSink, RecordingNotificationSink,
    RecordingWebhookEmitter, WebhookEmitter, WebhookEvent, WebhookEventName,
};
pub use repository::DisputeRepository;
pub use service::{
    ArbitrationService, ArbitrationSummary, DisputeStatusReport, EscalationAck, NewDispute,
    OverridePayouts, ServiceBuilder, StepOutcome, TickEntry, TickReport, WorkflowInfo,
};
