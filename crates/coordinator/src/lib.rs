//! Pact coordinator core
//!
//! This crate implements the coordinator side of a two-phase-commit protocol
//! between one coordinating process and an arbitrary number of remote
//! participants:
//!
//! - [`Participant`] — one enrolled remote party with a monitor-guarded state
//!   machine and blocking wait-with-timeout used to join asynchronous
//!   protocol replies back onto synchronous driver threads
//! - [`GlobalTransaction`] — the aggregate owning the participant table and
//!   the synchronized prepare/commit/rollback entry points, delegating the
//!   actual vote/commit decision to an injected [`TransactionManager`]
//! - [`TransactionRegistry`] — the process-wide `global id -> transaction`
//!   table with completion hooks
//! - [`TransactionRecord`] — the persisted per-transaction record from which
//!   in-flight transactions are reconstructed after a crash
//!
//! The transport layer that marshals protocol messages, the resource-manager
//! 2PC logic, and participant discovery all live outside this crate; they
//! are reached only through [`TransactionManager`] and the endpoint handles
//! exposed by `pact-addressing`.

mod error;
mod manager;
mod participant;
mod recovery;
mod registry;
mod transaction;

pub use error::{CoordinatorError, Result};
pub use manager::{ManagerError, TransactionManager};
pub use participant::{Participant, ParticipantState};
pub use recovery::{ParticipantRecord, TransactionRecord};
pub use registry::TransactionRegistry;
pub use transaction::GlobalTransaction;
