//! Recovery-record storage and startup replay
//!
//! The coordinator captures one [`TransactionRecord`] per in-flight
//! transaction; this crate stores those records durably and replays them
//! into a registry after a restart. Two backends are provided: an in-memory
//! log for tests and embedding, and a one-file-per-transaction filesystem
//! log.

mod file;
mod memory;

pub use file::FileRecoveryLog;
pub use memory::MemoryRecoveryLog;

use pact_common::GlobalId;
use pact_coordinator::{
    GlobalTransaction, TransactionManager, TransactionRecord, TransactionRegistry,
};
use std::sync::Arc;
use thiserror::Error;

/// Recovery-log error types
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Recovery log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recovery record codec error: {0}")]
    Codec(String),
}

/// Durable store for transaction recovery records
pub trait RecoveryLog: Send + Sync {
    /// Persist a record, replacing any previous record for the same
    /// transaction
    fn save(&self, record: &TransactionRecord) -> Result<(), LogError>;

    /// Load every stored record. Corrupt records are skipped with a warning
    /// rather than failing the whole load.
    fn load_all(&self) -> Result<Vec<TransactionRecord>, LogError>;

    /// Delete the record for a transaction; deleting a missing record is
    /// not an error
    fn delete(&self, global_id: &GlobalId) -> Result<(), LogError>;
}

/// Replay every logged transaction into the registry after a restart.
///
/// Each record is rebuilt via [`GlobalTransaction::recover_from`] and
/// registered; completing (removing the last participant of) a recovered
/// transaction deletes its log record. A record whose addresses no longer
/// parse is logged and skipped: one bad participant must not block recovery
/// of the rest.
pub fn replay(
    log: Arc<dyn RecoveryLog>,
    manager: Arc<dyn TransactionManager>,
    registry: &TransactionRegistry,
) -> Result<Vec<Arc<GlobalTransaction>>, LogError> {
    let mut recovered = Vec::new();

    for record in log.load_all()? {
        let global_id = record.global_id;
        match GlobalTransaction::recover_from(&record, manager.clone()) {
            Ok(txn) => {
                registry.insert(txn.clone());
                let log = log.clone();
                txn.on_completion(move || {
                    if let Err(e) = log.delete(&global_id) {
                        tracing::warn!(global_id = %global_id, error = %e, "failed to delete recovery record");
                    }
                });
                recovered.push(txn);
            }
            Err(e) => {
                tracing::warn!(global_id = %global_id, error = %e, "skipping unrecoverable transaction record");
            }
        }
    }

    tracing::info!(count = recovered.len(), "recovery replay finished");
    Ok(recovered)
}

#[cfg(test)]
pub(crate) mod tests_support {
    use pact_addressing::EndpointAddress;
    use pact_common::{GlobalId, ParticipantId};
    use pact_coordinator::{ParticipantRecord, TransactionRecord};

    pub fn sample_record() -> TransactionRecord {
        TransactionRecord {
            global_id: GlobalId::new(),
            timeout_millis: 30_000,
            recovery: false,
            coordinator_address: EndpointAddress::new("https://coord.test:9443/coordinator"),
            participants: vec![
                ParticipantRecord {
                    participant_id: ParticipantId::new(),
                    remote_address: EndpointAddress::new("http://node1.test:7070/participant"),
                },
                ParticipantRecord {
                    participant_id: ParticipantId::new(),
                    remote_address: EndpointAddress::new("https://node2.test:7443/participant"),
                },
            ],
        }
    }
}
