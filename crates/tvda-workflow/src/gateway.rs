//! # Collaborator Interfaces
//!
//! The workflow touches the outside world through three traits:
//!
//! - [`EscrowGateway`]: freeze, release, refund, and the authoritative
//!   record of what has already been disbursed.
//! - [`NotificationSink`]: fire-and-forget party notifications.
//! - [`WebhookEmitter`]: `escrow.disputed` and `arbitration.resolved`
//!   events for the developer accounts of both parties.
//!
//! Production deployments implement these against the payments platform.
//! [`InMemoryEscrowGateway`], [`RecordingNotificationSink`] and
//! [`RecordingWebhookEmitter`] back the in-process server and tests; the
//! `Log*` sinks write to `tracing` only.
//!
//! ## Gateway Truth
//!
//! After a crash between a release and the stage commit, the workflow asks
//! [`EscrowGateway::disbursement_state`] what was already paid rather than
//! trusting its own flags, so a retried disbursement never pays twice.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tvda_core::{Amount, DisputeId, TransactionId, UserId};

// ── Escrow ─────────────────────────────────────────────────────────────

/// Escrow gateway operation names, used in errors and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowOperation {
    /// Freeze held funds.
    Freeze,
    /// Release funds to the vendor.
    Release,
    /// Refund funds to the buyer.
    Refund,
    /// Query disbursement state.
    Query,
}

impl EscrowOperation {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Freeze => "freeze",
            Self::Release => "release",
            Self::Refund => "refund",
            Self::Query => "query",
        }
    }
}

impl std::fmt::Display for EscrowOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from collaborator calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The collaborator could not be reached or timed out.
    #[error("{operation} failed: {reason}")]
    Unavailable {
        /// Operation attempted.
        operation: String,
        /// Failure detail.
        reason: String,
    },

    /// The collaborator refused the request.
    #[error("{operation} rejected: {reason}")]
    Rejected {
        /// Operation attempted.
        operation: String,
        /// Rejection detail.
        reason: String,
    },
}

/// Outcome reported by the gateway for a money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    /// Funds moved.
    Completed,
    /// Accepted, settling asynchronously.
    Pending,
}

/// What the gateway has already paid out for a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementState {
    /// Total released to the vendor.
    pub released: Amount,
    /// Total refunded to the buyer.
    pub refunded: Amount,
}

/// The single path to escrowed funds.
pub trait EscrowGateway: Send + Sync {
    /// Freeze the transaction's held funds for a dispute.
    fn freeze(&self, transaction_id: &TransactionId, dispute_id: &DisputeId) -> Result<(), GatewayError>;

    /// Release `amount` to the vendor.
    fn release(&self, transaction_id: &TransactionId, amount: Amount) -> Result<DisbursementStatus, GatewayError>;

    /// Refund `amount` to the buyer.
    fn refund(
        &self,
        transaction_id: &TransactionId,
        amount: Amount,
        reason: &str,
    ) -> Result<DisbursementStatus, GatewayError>;

    /// What has already been released and refunded.
    fn disbursement_state(&self, transaction_id: &TransactionId) -> Result<DisbursementState, GatewayError>;

    /// Implementation name for logs.
    fn gateway_name(&self) -> &str;
}

/// A call made against [`InMemoryEscrowGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowCall {
    /// Operation.
    pub operation: EscrowOperation,
    /// Transaction.
    pub transaction_id: TransactionId,
    /// Amount moved, for release and refund.
    pub amount: Option<Amount>,
}

#[derive(Debug, Default)]
struct EscrowLedgerState {
    frozen: HashMap<TransactionId, DisputeId>,
    disbursed: HashMap<TransactionId, DisbursementState>,
    calls: Vec<EscrowCall>,
    failing: HashMap<EscrowOperation, u32>,
}

/// In-process escrow gateway with call recording and failure injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEscrowGateway {
    state: Arc<Mutex<EscrowLedgerState>>,
}

impl InMemoryEscrowGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `operation` fail as unavailable.
    pub fn fail_next(&self, operation: EscrowOperation, times: u32) {
        self.state.lock().failing.insert(operation, times);
    }

    /// Every successful money movement and freeze, in call order.
    pub fn calls(&self) -> Vec<EscrowCall> {
        self.state.lock().calls.clone()
    }

    /// Whether funds are frozen for a transaction.
    pub fn is_frozen(&self, transaction_id: &TransactionId) -> bool {
        self.state.lock().frozen.contains_key(transaction_id)
    }

    fn check_failure(state: &mut EscrowLedgerState, operation: EscrowOperation) -> Result<(), GatewayError> {
        if let Some(remaining) = state.failing.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GatewayError::Unavailable {
                    operation: operation.to_string(),
                    reason: "escrow gateway unavailable".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl EscrowGateway for InMemoryEscrowGateway {
    fn freeze(&self, transaction_id: &TransactionId, dispute_id: &DisputeId) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state, EscrowOperation::Freeze)?;
        // Re-freezing for the same dispute is a no-op.
        if state.frozen.insert(*transaction_id, *dispute_id).is_none() {
            state.calls.push(EscrowCall {
                operation: EscrowOperation::Freeze,
                transaction_id: *transaction_id,
                amount: None,
            });
        }
        Ok(())
    }

    fn release(&self, transaction_id: &TransactionId, amount: Amount) -> Result<DisbursementStatus, GatewayError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state, EscrowOperation::Release)?;
        let entry = state.disbursed.entry(*transaction_id).or_default();
        entry.released = entry.released.checked_add(amount).map_err(|e| GatewayError::Rejected {
            operation: EscrowOperation::Release.to_string(),
            reason: e.to_string(),
        })?;
        state.calls.push(EscrowCall {
            operation: EscrowOperation::Release,
            transaction_id: *transaction_id,
            amount: Some(amount),
        });
        Ok(DisbursementStatus::Completed)
    }

    fn refund(
        &self,
        transaction_id: &TransactionId,
        amount: Amount,
        _reason: &str,
    ) -> Result<DisbursementStatus, GatewayError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state, EscrowOperation::Refund)?;
        let entry = state.disbursed.entry(*transaction_id).or_default();
        entry.refunded = entry.refunded.checked_add(amount).map_err(|e| GatewayError::Rejected {
            operation: EscrowOperation::Refund.to_string(),
            reason: e.to_string(),
        })?;
        state.calls.push(EscrowCall {
            operation: EscrowOperation::Refund,
            transaction_id: *transaction_id,
            amount: Some(amount),
        });
        Ok(DisbursementStatus::Completed)
    }

    fn disbursement_state(&self, transaction_id: &TransactionId) -> Result<DisbursementState, GatewayError> {
        let mut state = self.state.lock();
        Self::check_failure(&mut state, EscrowOperation::Query)?;
        Ok(state.disbursed.get(transaction_id).copied().unwrap_or_default())
    }

    fn gateway_name(&self) -> &str {
        "InMemoryEscrowGateway"
    }
}

// ── Notifications ──────────────────────────────────────────────────────

/// Kinds of party notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A dispute was opened.
    DisputeCreated,
    /// Parties are asked for evidence.
    EvidenceRequested,
    /// The workflow stage changed.
    StageChanged,
    /// The scorer produced a ruling.
    RulingGenerated,
    /// Twelve hours or less remain.
    DeadlineApproaching,
}

impl NotificationKind {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisputeCreated => "dispute_created",
            Self::EvidenceRequested => "evidence_requested",
            Self::StageChanged => "stage_changed",
            Self::RulingGenerated => "ruling_generated",
            Self::DeadlineApproaching => "deadline_approaching",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification to the parties of a dispute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Kind.
    pub kind: NotificationKind,
    /// Dispute concerned.
    pub dispute_id: DisputeId,
    /// Users to notify.
    pub recipients: Vec<UserId>,
    /// Minimal context, e.g. the new stage.
    pub context: serde_json::Value,
}

/// Fire-and-forget notification delivery.
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification. Failures are logged by the caller and never
    /// affect workflow state.
    fn notify(&self, notification: &Notification) -> Result<(), GatewayError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: &Notification) -> Result<(), GatewayError> {
        tracing::info!(
            kind = %notification.kind,
            dispute_id = %notification.dispute_id,
            recipients = notification.recipients.len(),
            "notification"
        );
        Ok(())
    }
}

/// Records notifications; can be switched to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingNotificationSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Delivered notifications.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Delivered notifications of one kind for one dispute.
    pub fn count(&self, dispute_id: &DisputeId, kind: NotificationKind) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.dispute_id == *dispute_id && n.kind == kind)
            .count()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(&self, notification: &Notification) -> Result<(), GatewayError> {
        if *self.failing.lock() {
            return Err(GatewayError::Unavailable {
                operation: format!("notify {}", notification.kind),
                reason: "notification service unavailable".to_string(),
            });
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

// ── Webhooks ───────────────────────────────────────────────────────────

/// Webhook event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventName {
    /// A dispute was opened and escrow frozen.
    #[serde(rename = "escrow.disputed")]
    EscrowDisputed,
    /// Funds were disbursed.
    #[serde(rename = "arbitration.resolved")]
    ArbitrationResolved,
}

impl WebhookEventName {
    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscrowDisputed => "escrow.disputed",
            Self::ArbitrationResolved => "arbitration.resolved",
        }
    }
}

impl std::fmt::Display for WebhookEventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event name.
    pub event: WebhookEventName,
    /// Developer accounts the event is scoped to.
    pub accounts: Vec<UserId>,
    /// JSON payload.
    pub payload: serde_json::Value,
}

/// Outbound webhook delivery.
pub trait WebhookEmitter: Send + Sync {
    /// Emit an event. Failures are logged by the caller.
    fn emit(&self, event: &WebhookEvent) -> Result<(), GatewayError>;
}

/// Writes webhook events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWebhookEmitter;

impl WebhookEmitter for LogWebhookEmitter {
    fn emit(&self, event: &WebhookEvent) -> Result<(), GatewayError> {
        tracing::info!(event = %event.event, accounts = event.accounts.len(), "webhook");
        Ok(())
    }
}

/// Records webhook events.
#[derive(Debug, Clone, Default)]
pub struct RecordingWebhookEmitter {
    emitted: Arc<Mutex<Vec<WebhookEvent>>>,
}

impl RecordingWebhookEmitter {
    /// Create an empty emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitted events.
    pub fn emitted(&self) -> Vec<WebhookEvent> {
        self.emitted.lock().clone()
    }

    /// Emitted events with the given name.
    pub fn named(&self, name: WebhookEventName) -> Vec<WebhookEvent> {
        self.emitted
            .lock()
            .iter()
            .filter(|e| e.event == name)
            .cloned()
            .collect()
    }
}

impl WebhookEmitter for RecordingWebhookEmitter {
    fn emit(&self, event: &WebhookEvent) -> Result<(), GatewayError> {
        self.emitted.lock().push(event.clone());
        Ok(())
    }
}
