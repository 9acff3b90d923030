//! Persisted transaction records and crash-recovery replay
//!
//! One record per transaction, holding canonical addresses only. Derived
//! transport state is deliberately absent: reconstruction re-derives it by
//! running every address back through the endpoint constructors, the same
//! path first construction took.

use crate::error::{CoordinatorError, Result};
use crate::manager::TransactionManager;
use crate::participant::Participant;
use crate::transaction::GlobalTransaction;
use pact_addressing::{CoordinatorEndpoint, Endpoint, EndpointAddress};
use pact_common::{GlobalId, ParticipantId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persisted form of one enrolled participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub participant_id: ParticipantId,
    pub remote_address: EndpointAddress,
}

impl ParticipantRecord {
    /// Capture the persistable state of a live participant
    pub fn capture(participant: &Participant) -> Self {
        Self {
            participant_id: participant.participant_id(),
            remote_address: participant.remote().address().duplicate(),
        }
    }

    /// Reconstruct the participant, re-deriving its transport state
    pub fn restore(&self, global_id: GlobalId) -> Result<Participant> {
        let remote = Endpoint::from_canonical(self.remote_address.duplicate())?;
        Ok(Participant::new(global_id, self.participant_id, remote))
    }
}

/// Persisted form of one global transaction: everything needed to fully
/// reconstruct the aggregate after a crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub global_id: GlobalId,
    pub timeout_millis: i64,
    pub recovery: bool,
    pub coordinator_address: EndpointAddress,
    pub participants: Vec<ParticipantRecord>,
}

impl TransactionRecord {
    /// Capture the persistable state of a live transaction
    pub fn capture(txn: &GlobalTransaction) -> Self {
        let participants = txn
            .participant_ids()
            .into_iter()
            .filter_map(|id| txn.participant(&id))
            .map(|p| ParticipantRecord::capture(&p))
            .collect();

        Self {
            global_id: txn.global_id(),
            timeout_millis: txn.timeout_millis(),
            recovery: txn.is_recovery(),
            coordinator_address: txn.coordinator_endpoint().address().duplicate(),
            participants,
        }
    }

    /// Serialize to bytes for persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|e| CoordinatorError::Codec(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| CoordinatorError::Codec(e.to_string()))
    }
}

impl GlobalTransaction {
    /// Rebuild a transaction from its persisted record.
    ///
    /// The result is a recovery transaction: no registration endpoint,
    /// participant-count-reaches-zero as its completion signal, and every
    /// participant replayed through the recovery registration path with its
    /// state reset to active.
    pub fn recover_from(
        record: &TransactionRecord,
        manager: Arc<dyn TransactionManager>,
    ) -> Result<Arc<GlobalTransaction>> {
        let coordinator =
            CoordinatorEndpoint::from_canonical(record.coordinator_address.duplicate())?;
        let txn = GlobalTransaction::recovered(
            record.global_id,
            record.timeout_millis,
            coordinator,
            manager,
        );

        for participant in &record.participants {
            txn.add_recovered(participant.restore(record.global_id)?)?;
        }

        tracing::info!(
            global_id = %record.global_id,
            participants = record.participants.len(),
            "transaction recovered from persisted record"
        );
        Ok(txn)
    }
}
