//! Common types for the Pact coordinator
//!
//! This crate defines:
//! - Transaction and participant identifiers (UUID-based)
//! - The prepare-phase vote vocabulary
//! - Protocol phase names used in error reporting and logging

mod global_id;
mod participant_id;
mod vote;

pub use global_id::GlobalId;
pub use participant_id::ParticipantId;
pub use vote::{Phase, Vote};
