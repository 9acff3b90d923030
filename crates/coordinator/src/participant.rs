//! Participant state machine with blocking wait-with-timeout
//!
//! The coordinator fires prepare/commit/rollback at N participants from
//! driver threads and needs a synchronous join point per participant, while
//! the replies arrive later on whatever worker thread the transport picked.
//! Each participant therefore carries its own monitor: a mutex-guarded state
//! plus a condvar. Waits on different participants never contend.

use crate::registry::TransactionRegistry;
use pact_addressing::{CoordinatorEndpoint, Endpoint};
use pact_common::{GlobalId, ParticipantId};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

/// Protocol state of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Initial state, and the state every participant re-enters on
    /// recovery re-registration
    Active,
    /// Voted yes to prepare
    Prepared,
    /// Voted read-only; drops out of the second phase
    ReadOnly,
    /// Acknowledged commit
    Committed,
    /// Aborted, by its own vote or by coordinator decision
    Aborted,
    /// Wait-expiry sentinel returned by [`Participant::wait_response`];
    /// never stored
    TimedOut,
}

impl ParticipantState {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Prepared => "prepared",
            Self::ReadOnly => "read_only",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote party enrolled in a global transaction.
///
/// Identity is `(global_id, participant_id)` and nothing else: equality and
/// hashing ignore all mutable state, so a participant behaves correctly as a
/// map/set key across state transitions.
pub struct Participant {
    global_id: GlobalId,
    participant_id: ParticipantId,

    /// The participant's own callable address
    remote: Endpoint,

    /// Coordinator address personalized for this participant. Bound after
    /// construction (the personalized address embeds this participant's id)
    /// and rebound on recovery re-registration.
    coordinator: Mutex<Option<CoordinatorEndpoint>>,

    state: Mutex<ParticipantState>,
    state_changed: Condvar,
}

impl Participant {
    /// Create a new participant in the `Active` state
    pub fn new(global_id: GlobalId, participant_id: ParticipantId, remote: Endpoint) -> Self {
        Self {
            global_id,
            participant_id,
            remote,
            coordinator: Mutex::new(None),
            state: Mutex::new(ParticipantState::Active),
            state_changed: Condvar::new(),
        }
    }

    /// Owning transaction's global id
    pub fn global_id(&self) -> GlobalId {
        self.global_id
    }

    /// This participant's id within its transaction
    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    /// The participant's own callable address
    pub fn remote(&self) -> &Endpoint {
        &self.remote
    }

    /// Bind the personalized coordinator endpoint for this participant
    pub fn bind_coordinator_endpoint(&self, endpoint: CoordinatorEndpoint) {
        *self.coordinator.lock() = Some(endpoint);
    }

    /// The personalized coordinator endpoint, once bound
    pub fn coordinator_endpoint(&self) -> Option<CoordinatorEndpoint> {
        self.coordinator.lock().clone()
    }

    /// Current state
    pub fn state(&self) -> ParticipantState {
        *self.state.lock()
    }

    /// Unconditional administrative overwrite of the state, without regard
    /// to sticky-abort semantics. Wakes all waiters.
    pub fn set_state(&self, next: ParticipantState) {
        if next == ParticipantState::TimedOut {
            tracing::warn!(
                participant_id = %self.participant_id,
                "refusing to store wait sentinel as participant state"
            );
            return;
        }

        let mut state = self.state.lock();
        tracing::debug!(
            global_id = %self.global_id,
            participant_id = %self.participant_id,
            from = %*state,
            to = %next,
            "forced state transition"
        );
        *state = next;
        self.state_changed.notify_all();
    }

    /// Transition driven by an asynchronous protocol reply.
    ///
    /// Once a participant is `Aborted`, no later reply may move it out:
    /// a reordered "prepared" arriving after the coordinator has decided to
    /// abort must not resurrect the participant. Wakes all waiters on every
    /// accepted transition.
    pub fn set_response(&self, next: ParticipantState) {
        if next == ParticipantState::TimedOut {
            tracing::warn!(
                participant_id = %self.participant_id,
                "refusing to store wait sentinel as participant state"
            );
            return;
        }

        let mut state = self.state.lock();
        if *state == ParticipantState::Aborted && next != ParticipantState::Aborted {
            tracing::debug!(
                global_id = %self.global_id,
                participant_id = %self.participant_id,
                dropped = %next,
                "late response ignored, participant already aborted"
            );
            return;
        }
        *state = next;
        self.state_changed.notify_all();
    }

    /// Block the calling thread until the state is one of `accepted`, or the
    /// timeout elapses.
    ///
    /// `timeout_millis <= 0` waits indefinitely. Returns the matched state,
    /// or [`ParticipantState::TimedOut`] if the deadline passed first. The
    /// wait loops against an absolute deadline recomputed on every wake, so
    /// spurious wakeups and partial waits cannot shorten or extend it.
    /// There is no interruption path: cancellation is the deadline only.
    pub fn wait_response(
        &self,
        timeout_millis: i64,
        accepted: &[ParticipantState],
    ) -> ParticipantState {
        let mut state = self.state.lock();

        if timeout_millis <= 0 {
            loop {
                if accepted.contains(&*state) {
                    return *state;
                }
                self.state_changed.wait(&mut state);
            }
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_millis as u64);
        loop {
            if accepted.contains(&*state) {
                return *state;
            }
            if self.state_changed.wait_until(&mut state, deadline).timed_out() {
                // One last check: the transition may have landed between the
                // deadline expiring and us reacquiring the lock.
                return if accepted.contains(&*state) {
                    *state
                } else {
                    ParticipantState::TimedOut
                };
            }
        }
    }

    /// Self-deregistration: look the owning transaction up by global id and
    /// remove this participant from it. Returns whether anything was
    /// removed. The participant holds no reference back to its transaction;
    /// the registry is the only path to its owner.
    pub fn remove(&self, registry: &TransactionRegistry) -> bool {
        match registry.lookup(&self.global_id) {
            Some(txn) => txn.remove_participant(&self.participant_id).is_some(),
            None => {
                tracing::debug!(
                    global_id = %self.global_id,
                    participant_id = %self.participant_id,
                    "remove: owning transaction no longer registered"
                );
                false
            }
        }
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.global_id == other.global_id && self.participant_id == other.participant_id
    }
}

impl Eq for Participant {}

impl Hash for Participant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.global_id.hash(state);
        self.participant_id.hash(state);
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("global_id", &self.global_id)
            .field("participant_id", &self.participant_id)
            .field("remote", &self.remote.address().uri())
            .field("state", &*self.state.lock())
            .finish()
    }
}
