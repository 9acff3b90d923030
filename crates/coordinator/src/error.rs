//! Error types for the coordinator core

use crate::manager::ManagerError;
use pact_addressing::AddressError;
use pact_common::{GlobalId, ParticipantId, Phase};
use thiserror::Error;

/// Coordinator error types
///
/// A timed-out wait is deliberately not represented here: `wait_response`
/// surfaces expiry as the `TimedOut` state value, since a vote that never
/// arrives is a normal protocol outcome the driver handles as an abort.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A remote address could not be parsed into the transport's form.
    /// Fatal only to the endpoint being constructed, never to the
    /// transaction as a whole.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Participant id collision on registration. Ids are random UUIDs, so
    /// hitting this means a broken invariant, not a recoverable condition.
    #[error("Duplicate participant {participant_id} in transaction {global_id}")]
    DuplicateParticipant {
        global_id: GlobalId,
        participant_id: ParticipantId,
    },

    /// The transaction-manager delegate failed while driving a phase. Always
    /// surfaced to the caller, which must drive the transaction to rollback.
    #[error("Transaction manager failed during {phase}: {source}")]
    Protocol {
        phase: Phase,
        #[source]
        source: ManagerError,
    },

    /// No transaction with this id in the registry
    #[error("Transaction not found: {0}")]
    TransactionNotFound(GlobalId),

    /// Recovery-only operation invoked on a live transaction
    #[error("Transaction {0} is not in recovery")]
    NotRecovering(GlobalId),

    /// Persisted record could not be encoded or decoded
    #[error("Recovery record codec error: {0}")]
    Codec(String),
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
