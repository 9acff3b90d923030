//! Integration test for recovery replay from a durable log

use pact_addressing::{CoordinatorEndpoint, Endpoint, EndpointAddress};
use pact_common::{GlobalId, Vote};
use pact_coordinator::{
    GlobalTransaction, ManagerError, ParticipantState, TransactionManager, TransactionRecord,
    TransactionRegistry,
};
use pact_recovery_log::{FileRecoveryLog, MemoryRecoveryLog, RecoveryLog, replay};
use std::sync::Arc;

struct YesManager;

impl TransactionManager for YesManager {
    fn prepare_transaction(&self, _: &GlobalId) -> Result<Vote, ManagerError> {
        Ok(Vote::Commit)
    }
    fn commit_transaction(&self, _: &GlobalId) -> Result<(), ManagerError> {
        Ok(())
    }
    fn rollback_transaction(&self, _: &GlobalId) -> Result<(), ManagerError> {
        Ok(())
    }
}

fn coordinator_endpoint() -> CoordinatorEndpoint {
    CoordinatorEndpoint::from_canonical(EndpointAddress::new(
        "https://coord.test:9443/coordinator",
    ))
    .unwrap()
}

fn in_flight_transaction(manager: Arc<dyn TransactionManager>, n: usize) -> Arc<GlobalTransaction> {
    let txn = GlobalTransaction::begin(
        GlobalId::new(),
        30_000,
        coordinator_endpoint(),
        coordinator_endpoint(),
        manager,
    );
    for i in 0..n {
        let remote = Endpoint::from_canonical(EndpointAddress::new(format!(
            "http://node{}.test:7070/participant",
            i
        )))
        .unwrap();
        txn.add_participant(remote).unwrap();
    }
    txn
}

#[test]
fn test_replay_restores_logged_transactions() {
    let manager: Arc<dyn TransactionManager> = Arc::new(YesManager);
    let log: Arc<dyn RecoveryLog> = Arc::new(MemoryRecoveryLog::new());

    let txn_a = in_flight_transaction(manager.clone(), 2);
    let txn_b = in_flight_transaction(manager.clone(), 1);
    log.save(&TransactionRecord::capture(&txn_a)).unwrap();
    log.save(&TransactionRecord::capture(&txn_b)).unwrap();
    drop((txn_a, txn_b));

    // Restart: replay the log into a fresh registry
    let registry = TransactionRegistry::new();
    let recovered = replay(log.clone(), manager, &registry).unwrap();

    assert_eq!(recovered.len(), 2);
    assert_eq!(registry.len(), 2);
    for txn in &recovered {
        assert!(txn.is_recovery());
        for id in txn.participant_ids() {
            assert_eq!(
                txn.participant(&id).unwrap().state(),
                ParticipantState::Active
            );
        }
    }
}

#[test]
fn test_completing_recovered_transaction_deletes_its_record() {
    let manager: Arc<dyn TransactionManager> = Arc::new(YesManager);
    let log = Arc::new(MemoryRecoveryLog::new());

    let txn = in_flight_transaction(manager.clone(), 2);
    log.save(&TransactionRecord::capture(&txn)).unwrap();
    drop(txn);

    let registry = TransactionRegistry::new();
    let recovered = replay(log.clone(), manager, &registry).unwrap();
    let restored = recovered[0].clone();

    // Drive both participants out; the last removal completes the
    // transaction, which deregisters it and deletes its log record
    for id in restored.participant_ids() {
        restored.remove_participant(&id);
    }

    assert!(restored.is_completed());
    assert!(registry.is_empty());
    assert!(log.is_empty());
}

#[test]
fn test_replay_skips_unrecoverable_records() {
    let manager: Arc<dyn TransactionManager> = Arc::new(YesManager);
    let log: Arc<dyn RecoveryLog> = Arc::new(MemoryRecoveryLog::new());

    let good = in_flight_transaction(manager.clone(), 1);
    log.save(&TransactionRecord::capture(&good)).unwrap();

    let mut bad = TransactionRecord::capture(&in_flight_transaction(manager.clone(), 1));
    bad.coordinator_address = EndpointAddress::new("not a uri");
    log.save(&bad).unwrap();

    let registry = TransactionRegistry::new();
    let recovered = replay(log, manager, &registry).unwrap();

    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].global_id(), good.global_id());
}

#[test]
fn test_replay_from_file_log_across_restart() {
    let manager: Arc<dyn TransactionManager> = Arc::new(YesManager);
    let dir = std::env::temp_dir().join(format!("pact_replay_test_{}", uuid::Uuid::new_v4()));

    let global_id = {
        let log = FileRecoveryLog::new(&dir).unwrap();
        let txn = in_flight_transaction(manager.clone(), 2);
        log.save(&TransactionRecord::capture(&txn)).unwrap();
        txn.global_id()
    };

    // Fresh log handle over the same directory, as after a process restart
    let log: Arc<dyn RecoveryLog> = Arc::new(FileRecoveryLog::new(&dir).unwrap());
    let registry = TransactionRegistry::new();
    let recovered = replay(log, manager, &registry).unwrap();

    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].global_id(), global_id);
    assert_eq!(recovered[0].participant_count(), 2);

    std::fs::remove_dir_all(&dir).unwrap();
}
