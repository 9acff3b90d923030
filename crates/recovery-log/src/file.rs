//! Filesystem-based recovery log

use crate::{LogError, RecoveryLog};
use pact_common::GlobalId;
use pact_coordinator::TransactionRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem recovery log: one `<global_id>.txn` file per transaction
/// under a base directory.
pub struct FileRecoveryLog {
    base_path: PathBuf,
}

impl FileRecoveryLog {
    /// Open a log rooted at `base_path`, creating the directory if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, LogError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn record_file(&self, global_id: &GlobalId) -> PathBuf {
        self.base_path.join(format!("{}.txn", global_id))
    }
}

impl RecoveryLog for FileRecoveryLog {
    fn save(&self, record: &TransactionRecord) -> Result<(), LogError> {
        let bytes = record.to_bytes().map_err(|e| LogError::Codec(e.to_string()))?;
        fs::write(self.record_file(&record.global_id), bytes)?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<TransactionRecord>, LogError> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("txn") {
                continue;
            }

            let bytes = fs::read(&path)?;
            match TransactionRecord::from_bytes(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt recovery record");
                }
            }
        }

        Ok(records)
    }

    fn delete(&self, global_id: &GlobalId) -> Result<(), LogError> {
        let path = self.record_file(global_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::sample_record;
    use std::env;

    fn temp_log() -> (FileRecoveryLog, PathBuf) {
        let dir = env::temp_dir().join(format!("pact_log_test_{}", uuid::Uuid::new_v4()));
        (FileRecoveryLog::new(&dir).unwrap(), dir)
    }

    #[test]
    fn test_roundtrip_across_reopen() {
        let (log, dir) = temp_log();
        let record = sample_record();
        log.save(&record).unwrap();

        // Simulate a restart: open a fresh log over the same directory
        let reopened = FileRecoveryLog::new(&dir).unwrap();
        let loaded = reopened.load_all().unwrap();
        assert_eq!(loaded, vec![record.clone()]);

        reopened.delete(&record.global_id).unwrap();
        assert!(reopened.load_all().unwrap().is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_skipped() {
        let (log, dir) = temp_log();
        let record = sample_record();
        log.save(&record).unwrap();

        fs::write(dir.join("garbage.txn"), b"not a record").unwrap();
        fs::write(dir.join("ignored.tmp"), b"unrelated file").unwrap();

        let loaded = log.load_all().unwrap();
        assert_eq!(loaded, vec![record]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_delete_missing_record_is_ok() {
        let (log, dir) = temp_log();
        log.delete(&sample_record().global_id).unwrap();
        fs::remove_dir_all(&dir).unwrap();
    }
}
