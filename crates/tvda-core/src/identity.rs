//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier in the arbitration domain. They
//! serialize as bare UUID strings and display with a namespace prefix
//! (`dispute:…`, `txn:…`) for logs.
//!
//! ## Security Invariant
//!
//! Type-level distinction between identifier namespaces prevents an evidence
//! submission keyed by a transaction id from being routed to a dispute with
//! the same UUID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for a dispute.
    DisputeId,
    "dispute"
);
uuid_identifier!(
    /// Identifier of the escrow transaction a dispute is raised against.
    TransactionId,
    "txn"
);
uuid_identifier!(
    /// Identifier of a platform user (buyer or vendor).
    UserId,
    "user"
);
uuid_identifier!(
    /// Identifier of one stored evidence item.
    EvidenceItemId,
    "evidence"
);
uuid_identifier!(
    /// Identifier of an arbitration case record.
    CaseId,
    "case"
);

/// Who produced a piece of data: the platform itself or a specific user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PartyRef {
    /// The platform (internal logs, generated packets).
    System,
    /// A platform user.
    User(UserId),
}

impl PartyRef {
    /// The user behind this reference, if any.
    pub fn user(&self) -> Option<UserId> {
        match self {
            Self::System => None,
            Self::User(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for PartyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}
