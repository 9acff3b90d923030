//! Transaction-manager delegate boundary
//!
//! The coordinator core never touches resource managers itself. The actual
//! prepare vote and commit/rollback work is delegated through this trait,
//! injected into every [`GlobalTransaction`](crate::GlobalTransaction) at
//! construction.

use pact_common::{GlobalId, Vote};
use thiserror::Error;

/// Failure reported by the transaction-manager delegate.
///
/// A manager failure is an authoritative outcome for the phase being driven;
/// the coordinator wraps it and surfaces it, never swallows it. `retryable`
/// is advisory data for the transport layer, which owns retry policy.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ManagerError {
    message: String,
    retryable: bool,
}

impl ManagerError {
    /// A terminal failure
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// A failure the caller may retry
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Whether the transport layer may retry the failed phase
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// The local transaction manager driving resource commit/rollback and
/// deciding the prepare vote, keyed by global transaction id.
pub trait TransactionManager: Send + Sync {
    /// Run the prepare phase for the transaction's resources and return the
    /// collective vote
    fn prepare_transaction(&self, global_id: &GlobalId) -> Result<Vote, ManagerError>;

    /// Commit the transaction's resources
    fn commit_transaction(&self, global_id: &GlobalId) -> Result<(), ManagerError>;

    /// Roll the transaction's resources back
    fn rollback_transaction(&self, global_id: &GlobalId) -> Result<(), ManagerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_marker() {
        assert!(!ManagerError::new("resource gone").is_retryable());
        assert!(ManagerError::retryable("log device busy").is_retryable());
    }
}
