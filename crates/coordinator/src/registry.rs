//! Process-wide transaction table
//!
//! One registry per process maps global ids to live transactions. The
//! transport layer resolves every inbound protocol message here first, and
//! participants reach their owning transaction through it rather than
//! holding back-references.

use crate::error::{CoordinatorError, Result};
use crate::transaction::GlobalTransaction;
use dashmap::DashMap;
use pact_common::GlobalId;
use std::sync::Arc;

/// Keyed store of in-flight transactions with completion wiring.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone, Default)]
pub struct TransactionRegistry {
    table: Arc<DashMap<GlobalId, Arc<GlobalTransaction>>>,
}

impl TransactionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a transaction and install the completion hook that removes it
    /// from the table again.
    ///
    /// For a live transaction the hook fires when the external "transaction
    /// ended" signal arrives via [`end_transaction`]; a recovery transaction
    /// fires it itself when its last participant is removed.
    ///
    /// [`end_transaction`]: TransactionRegistry::end_transaction
    pub fn insert(&self, txn: Arc<GlobalTransaction>) {
        let global_id = txn.global_id();
        {
            let table = self.table.clone();
            txn.on_completion(move || {
                table.remove(&global_id);
            });
        }
        self.table.insert(global_id, txn);
        tracing::debug!(global_id = %global_id, "transaction registered");
    }

    /// Look a transaction up by global id
    pub fn lookup(&self, global_id: &GlobalId) -> Option<Arc<GlobalTransaction>> {
        self.table.get(global_id).map(|entry| entry.value().clone())
    }

    /// Remove a transaction without firing its completion hooks
    pub fn remove(&self, global_id: &GlobalId) -> Option<Arc<GlobalTransaction>> {
        self.table.remove(global_id).map(|(_, txn)| txn)
    }

    /// External "transaction ended" signal for live transactions: remove the
    /// entry and run the transaction's completion hooks.
    pub fn end_transaction(&self, global_id: &GlobalId) -> Result<()> {
        let txn = self
            .remove(global_id)
            .ok_or(CoordinatorError::TransactionNotFound(*global_id))?;
        txn.fire_completion();
        Ok(())
    }

    /// Number of registered transactions
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no transactions are registered
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Ids of all registered transactions, in no particular order
    pub fn global_ids(&self) -> Vec<GlobalId> {
        self.table.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ManagerError, TransactionManager};
    use pact_addressing::{CoordinatorEndpoint, Endpoint, EndpointAddress};
    use pact_common::Vote;

    struct YesManager;

    impl TransactionManager for YesManager {
        fn prepare_transaction(&self, _: &GlobalId) -> std::result::Result<Vote, ManagerError> {
            Ok(Vote::Commit)
        }
        fn commit_transaction(&self, _: &GlobalId) -> std::result::Result<(), ManagerError> {
            Ok(())
        }
        fn rollback_transaction(&self, _: &GlobalId) -> std::result::Result<(), ManagerError> {
            Ok(())
        }
    }

    fn coordinator_endpoint() -> CoordinatorEndpoint {
        CoordinatorEndpoint::from_canonical(EndpointAddress::new(
            "http://coord.test:8080/coordinator",
        ))
        .unwrap()
    }

    fn live_transaction() -> Arc<GlobalTransaction> {
        GlobalTransaction::begin(
            GlobalId::new(),
            30_000,
            coordinator_endpoint(),
            coordinator_endpoint(),
            Arc::new(YesManager),
        )
    }

    #[test]
    fn test_insert_lookup_remove() {
        let registry = TransactionRegistry::new();
        let txn = live_transaction();
        let id = txn.global_id();

        registry.insert(txn.clone());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&id).unwrap().global_id(), id);

        registry.remove(&id);
        assert!(registry.lookup(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_end_transaction_removes_and_completes() {
        let registry = TransactionRegistry::new();
        let txn = live_transaction();
        let id = txn.global_id();
        registry.insert(txn.clone());

        registry.end_transaction(&id).unwrap();
        assert!(registry.lookup(&id).is_none());
        assert!(txn.is_completed());

        assert!(matches!(
            registry.end_transaction(&id),
            Err(CoordinatorError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn test_recovery_self_completion_drops_registry_entry() {
        let registry = TransactionRegistry::new();
        let txn = GlobalTransaction::recovered(
            GlobalId::new(),
            30_000,
            coordinator_endpoint(),
            Arc::new(YesManager),
        );
        let id = txn.global_id();
        registry.insert(txn.clone());

        let remote =
            Endpoint::from_canonical(EndpointAddress::new("http://node1.test:7070/participant"))
                .unwrap();
        let p = txn
            .add_recovered(crate::Participant::new(
                id,
                pact_common::ParticipantId::new(),
                remote,
            ))
            .unwrap();

        // Participant self-removal through the registry empties the table,
        // which completes the recovery transaction and deregisters it
        assert!(p.remove(&registry));
        assert!(registry.lookup(&id).is_none());
        assert!(txn.is_completed());
    }
}
