//! Two-Phase Commit Walkthrough
//!
//! This example demonstrates the coordinator core end to end:
//! - Register two participants into a live global transaction
//! - Deliver their prepare votes from separate threads
//! - Drive the prepare and commit decisions through the transaction manager
//! - Crash the coordinator and rebuild the transaction from its persisted
//!   record, then drive the recovered participants to completion

use pact_addressing::{CoordinatorEndpoint, Endpoint, EndpointAddress};
use pact_common::{GlobalId, Vote};
use pact_coordinator::{
    GlobalTransaction, ManagerError, ParticipantState, TransactionManager, TransactionRecord,
    TransactionRegistry,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Transaction manager stub that always votes to commit
struct InMemoryManager;

impl TransactionManager for InMemoryManager {
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Two-Phase Commit Walkthrough ===\n");

    let registry = TransactionRegistry::new();
    let manager: Arc<dyn TransactionManager> = Arc::new(InMemoryManager);

    // ===================================================================
    // PHASE 1: Registration
    // ===================================================================
    println!("--- PHASE 1: Registration ---\n");

    let coordinator = CoordinatorEndpoint::from_canonical(EndpointAddress::new(
        "https://coordinator.example.com:9443/coordinator",
    ))?;
    let txn = GlobalTransaction::begin(
        GlobalId::new(),
        30_000,
        coordinator.clone(),
        coordinator,
        manager.clone(),
    );
    registry.insert(txn.clone());
    println!("✓ Started transaction {}\n", txn.global_id());

    let mut participants = Vec::new();
    for host in ["inventory.example.com", "billing.example.com"] {
        let remote = Endpoint::from_canonical(EndpointAddress::new(format!(
            "https://{}:8443/participant",
            host
        )))?;
        let p = txn.add_participant(remote)?;
        println!(
            "✓ Registered {} as participant {} (token {})",
            host,
            p.participant_id(),
            p.coordinator_endpoint()
                .map(|ep| ep.correlation_token().unwrap_or("-").to_string())
                .unwrap_or_default()
        );
        participants.push(p);
    }
    println!();

    // ===================================================================
    // PHASE 2: Vote collection and commit
    // ===================================================================
    println!("--- PHASE 2: Vote collection and commit ---\n");

    // Replies arrive asynchronously on transport threads
    let responders: Vec<_> = participants
        .iter()
        .map(|p| {
            let registry = registry.clone();
            let global_id = p.global_id();
            let participant_id = p.participant_id();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(25));
                if let Some(txn) = registry.lookup(&global_id)
                    && let Some(p) = txn.participant(&participant_id)
                {
                    p.set_response(ParticipantState::Prepared);
                }
            })
        })
        .collect();

    for p in &participants {
        let state = p.wait_response(
            5_000,
            &[
                ParticipantState::Prepared,
                ParticipantState::ReadOnly,
                ParticipantState::Aborted,
            ],
        );
        println!("✓ Participant {} voted: {}", p.participant_id(), state);
    }
    for responder in responders {
        let _ = responder.join();
    }

    let vote = txn.prepare()?;
    println!("✓ Prepare decision: {}", vote);
    txn.commit()?;
    println!("✓ Transaction committed\n");

    // The record a real server would keep on its recovery log
    let record_bytes = TransactionRecord::capture(&txn).to_bytes()?;
    println!(
        "✓ Captured recovery record ({} bytes) before the crash\n",
        record_bytes.len()
    );

    // ===================================================================
    // PHASE 3: Crash and recovery
    // ===================================================================
    println!("--- PHASE 3: Crash and recovery ---\n");

    drop(txn);
    drop(participants);
    let registry = TransactionRegistry::new();
    println!("✓ Process restarted with an empty registry");

    let record = TransactionRecord::from_bytes(&record_bytes)?;
    let restored = GlobalTransaction::recover_from(&record, manager)?;
    registry.insert(restored.clone());
    println!(
        "✓ Recovered transaction {} with {} participant(s), all active again",
        restored.global_id(),
        restored.participant_count()
    );

    // Finish the second phase with the recovered participants; removing the
    // last one completes and deregisters the transaction on its own
    for id in restored.participant_ids() {
        if let Some(p) = restored.participant(&id) {
            p.set_response(ParticipantState::Committed);
            p.remove(&registry);
            println!("✓ Participant {} acknowledged commit and left", id);
        }
    }

    assert!(registry.is_empty());
    println!("\n✓ Recovery transaction completed itself; registry is empty");

    Ok(())
}
