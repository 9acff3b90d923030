//! In-memory recovery log

use crate::{LogError, RecoveryLog};
use dashmap::DashMap;
use pact_common::GlobalId;
use pact_coordinator::TransactionRecord;

/// In-memory recovery log for tests and embedding.
///
/// Records are stored in their serialized form so the codec path is
/// exercised exactly as with a durable backend.
#[derive(Default)]
pub struct MemoryRecoveryLog {
    records: DashMap<GlobalId, Vec<u8>>,
}

impl MemoryRecoveryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecoveryLog for MemoryRecoveryLog {
    fn save(&self, record: &TransactionRecord) -> Result<(), LogError> {
        let bytes = record.to_bytes().map_err(|e| LogError::Codec(e.to_string()))?;
        self.records.insert(record.global_id, bytes);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<TransactionRecord>, LogError> {
        let mut records = Vec::with_capacity(self.records.len());
        for entry in self.records.iter() {
            match TransactionRecord::from_bytes(entry.value()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(global_id = %entry.key(), error = %e, "skipping corrupt recovery record");
                }
            }
        }
        Ok(records)
    }

    fn delete(&self, global_id: &GlobalId) -> Result<(), LogError> {
        self.records.remove(global_id);
        Ok(())
    }
}
