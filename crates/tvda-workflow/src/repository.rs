//! # Dispute Repository
//!
//! Dispute records plus the two guards that keep overlapping ticks from
//! acting twice on one dispute:
//!
//! - an advisory **lease** held for the duration of one step, released on
//!   drop;
//! - a **compare-and-swap** commit on [`Dispute::version`], so a write based
//!   on a stale read is rejected.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use tvda_arbitration::{ArbitrationError, Dispute, Store};
use tvda_core::{DisputeId, TransactionId};

use crate::error::WorkflowError;

/// Dispute storage with per-dispute leases.
#[derive(Debug, Clone, Default)]
pub struct DisputeRepository {
    disputes: Store<DisputeId, Dispute>,
    leases: Arc<Mutex<HashSet<DisputeId>>>,
}

/// Exclusive processing right over one dispute. Released on drop.
#[derive(Debug)]
pub struct DisputeLease {
    dispute_id: DisputeId,
    leases: Arc<Mutex<HashSet<DisputeId>>>,
}

impl DisputeLease {
    /// The leased dispute.
    pub fn dispute_id(&self) -> DisputeId {
        self.dispute_id
    }
}

impl Drop for DisputeLease {
    fn drop(&mut self) {
        self.leases.lock().remove(&self.dispute_id);
    }
}

impl DisputeRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new dispute.
    pub fn insert(&self, dispute: Dispute) {
        self.disputes.insert(dispute.id, dispute);
    }

    /// Fetch a dispute.
    pub fn get(&self, id: &DisputeId) -> Option<Dispute> {
        self.disputes.get(id)
    }

    /// Fetch a dispute or fail with not-found.
    pub fn require(&self, id: &DisputeId) -> Result<Dispute, WorkflowError> {
        self.get(id).ok_or_else(|| {
            ArbitrationError::DisputeNotFound {
                dispute_id: id.to_string(),
            }
            .into()
        })
    }

    /// All disputes, oldest first.
    pub fn list(&self) -> Vec<Dispute> {
        let mut all = self.disputes.list();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// The unsettled dispute on a transaction, if any.
    pub fn open_for_transaction(&self, transaction_id: &TransactionId) -> Option<Dispute> {
        self.disputes
            .list()
            .into_iter()
            .find(|d| d.transaction_id == *transaction_id && !d.status.is_settled())
    }

    /// Try to take the lease on a dispute.
    pub fn try_lease(&self, id: DisputeId) -> Result<DisputeLease, WorkflowError> {
        let mut leases = self.leases.lock();
        if !leases.insert(id) {
            return Err(WorkflowError::LeaseHeld {
                dispute_id: id.to_string(),
            });
        }
        Ok(DisputeLease {
            dispute_id: id,
            leases: Arc::clone(&self.leases),
        })
    }

    /// Replace a dispute if its stored version still equals
    /// `expected_version`.
    pub fn commit(&self, dispute: Dispute, expected_version: u64) -> Result<(), WorkflowError> {
        let id = dispute.id;
        self.disputes
            .try_update(&id, |stored| {
                if stored.version != expected_version {
                    return Err(WorkflowError::VersionConflict {
                        dispute_id: id.to_string(),
                        expected: expected_version,
                        found: stored.version,
                    });
                }
                *stored = dispute;
                Ok(())
            })
            .unwrap_or_else(|| {
                Err(ArbitrationError::DisputeNotFound {
                    dispute_id: id.to_string(),
                }
                .into())
            })
    }

    /// Number of disputes.
    pub fn len(&self) -> usize {
        self.disputes.len()
    }

    /// Whether there are no disputes.
    pub fn is_empty(&self) -> bool {
        self.disputes.is_empty()
    }
}
