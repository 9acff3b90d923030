//! Global transaction aggregate and protocol driver entry points

use crate::error::{CoordinatorError, Result};
use crate::manager::TransactionManager;
use crate::participant::{Participant, ParticipantState};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pact_addressing::{CoordinatorEndpoint, Endpoint};
use pact_common::{GlobalId, ParticipantId, Phase, Vote};
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type CompletionHook = Box<dyn FnOnce() + Send>;

/// One global transaction: identity, timeout, endpoints, and the live set of
/// enrolled participants.
///
/// The aggregate owns every participant by id in a concurrent map; a
/// participant never holds a reference back, it reaches its owner through
/// the registry when it needs to act on it. Prepare/commit/rollback are
/// serialized against each other per transaction but never across
/// transactions, and the bare coordinator endpoint has its own lock so
/// recovery can rebind it while registrations proceed.
pub struct GlobalTransaction {
    global_id: GlobalId,

    /// Time remaining before the transaction must be unilaterally rolled
    /// back. Advisory data for callers; enforcement belongs to the
    /// transaction manager.
    timeout_millis: i64,

    /// Reconstructed from persisted state after a crash, as opposed to
    /// created by a live registration. Recovery transactions have no
    /// registration endpoint and complete themselves when their last
    /// participant is removed.
    recovery: bool,

    /// Endpoint a new participant uses to join; absent for recovery
    /// transactions
    registration_endpoint: Option<CoordinatorEndpoint>,

    /// Bare coordinator address before per-participant personalization.
    /// Guarded separately from the participant table: recovery may replace
    /// it while participant operations run.
    coordinator: Mutex<CoordinatorEndpoint>,

    participants: DashMap<ParticipantId, Arc<Participant>>,

    manager: Arc<dyn TransactionManager>,

    /// Serializes prepare/commit/rollback for this transaction
    phase_lock: Mutex<()>,

    completion_hooks: Mutex<Vec<CompletionHook>>,
    completed: AtomicBool,
}

impl GlobalTransaction {
    /// Create a live transaction from a client registration.
    pub fn begin(
        global_id: GlobalId,
        timeout_millis: i64,
        registration_endpoint: CoordinatorEndpoint,
        coordinator_endpoint: CoordinatorEndpoint,
        manager: Arc<dyn TransactionManager>,
    ) -> Arc<Self> {
        tracing::debug!(global_id = %global_id, timeout_millis, "transaction started");

        Arc::new(Self {
            global_id,
            timeout_millis,
            recovery: false,
            registration_endpoint: Some(registration_endpoint),
            coordinator: Mutex::new(coordinator_endpoint),
            participants: DashMap::new(),
            manager,
            phase_lock: Mutex::new(()),
            completion_hooks: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
        })
    }

    /// Create the shell of a transaction reconstructed from persisted state.
    /// Participants are replayed separately through [`add_recovered`].
    ///
    /// [`add_recovered`]: GlobalTransaction::add_recovered
    pub fn recovered(
        global_id: GlobalId,
        timeout_millis: i64,
        coordinator_endpoint: CoordinatorEndpoint,
        manager: Arc<dyn TransactionManager>,
    ) -> Arc<Self> {
        tracing::info!(global_id = %global_id, "transaction reconstructed for recovery");

        Arc::new(Self {
            global_id,
            timeout_millis,
            recovery: true,
            registration_endpoint: None,
            coordinator: Mutex::new(coordinator_endpoint),
            participants: DashMap::new(),
            manager,
            phase_lock: Mutex::new(()),
            completion_hooks: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
        })
    }

    /// Global id, the sole identity of this transaction
    pub fn global_id(&self) -> GlobalId {
        self.global_id
    }

    /// Remaining transaction timeout in milliseconds
    pub fn timeout_millis(&self) -> i64 {
        self.timeout_millis
    }

    /// Whether this instance was reconstructed after a crash
    pub fn is_recovery(&self) -> bool {
        self.recovery
    }

    /// Endpoint a new participant uses to join, absent for recovery
    /// transactions
    pub fn registration_endpoint(&self) -> Option<CoordinatorEndpoint> {
        self.registration_endpoint.clone()
    }

    /// Current bare coordinator endpoint
    pub fn coordinator_endpoint(&self) -> CoordinatorEndpoint {
        self.coordinator.lock().clone()
    }

    /// Replace the bare coordinator endpoint. Used by recovery processing
    /// while participant operations proceed concurrently; already-bound
    /// personalized endpoints are unaffected.
    pub fn rebind_coordinator_endpoint(&self, endpoint: CoordinatorEndpoint) {
        tracing::info!(global_id = %self.global_id, endpoint = %endpoint, "coordinator endpoint rebound");
        *self.coordinator.lock() = endpoint;
    }

    /// Personalize the bare coordinator endpoint for one participant.
    ///
    /// Returns a copy with the correlation token for `participant_id`
    /// embedded and any stale token stripped; the bare endpoint is never
    /// mutated and repeated calls yield equal endpoints.
    pub fn coordinator_endpoint_for(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<CoordinatorEndpoint> {
        let bare = self.coordinator.lock();
        Ok(bare.personalize(&participant_id.to_string())?)
    }

    /// Enroll a new remote party: generates a fresh participant id, builds
    /// the personalized coordinator endpoint, and inserts the participant
    /// into the table. Safe under concurrent calls.
    pub fn add_participant(&self, remote: Endpoint) -> Result<Arc<Participant>> {
        let participant_id = ParticipantId::new();
        let coordinator_endpoint = self.coordinator_endpoint_for(&participant_id)?;

        let participant = Arc::new(Participant::new(self.global_id, participant_id, remote));
        participant.bind_coordinator_endpoint(coordinator_endpoint);

        match self.participants.entry(participant_id) {
            Entry::Occupied(_) => Err(CoordinatorError::DuplicateParticipant {
                global_id: self.global_id,
                participant_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(participant.clone());
                tracing::debug!(
                    global_id = %self.global_id,
                    participant_id = %participant_id,
                    remote = %participant.remote(),
                    "participant registered"
                );
                Ok(participant)
            }
        }
    }

    /// Recovery-path registration: re-bind a personalized coordinator
    /// endpoint onto a participant reconstructed from persisted state, reset
    /// it to `Active`, and reinsert it. Only legal while in recovery.
    pub fn add_recovered(&self, participant: Participant) -> Result<Arc<Participant>> {
        if !self.recovery {
            return Err(CoordinatorError::NotRecovering(self.global_id));
        }
        debug_assert_eq!(participant.global_id(), self.global_id);

        let participant_id = participant.participant_id();
        participant.bind_coordinator_endpoint(self.coordinator_endpoint_for(&participant_id)?);
        participant.set_state(ParticipantState::Active);

        let participant = Arc::new(participant);
        self.participants.insert(participant_id, participant.clone());

        tracing::info!(
            global_id = %self.global_id,
            participant_id = %participant_id,
            "participant re-registered from recovery record"
        );
        Ok(participant)
    }

    /// Remove a participant from the table.
    ///
    /// A recovery transaction has no external "transaction ended" hook to
    /// rely on, so removing its last participant fires the completion hooks
    /// immediately.
    pub fn remove_participant(&self, participant_id: &ParticipantId) -> Option<Arc<Participant>> {
        let removed = self.participants.remove(participant_id).map(|(_, p)| p);

        if removed.is_some() {
            tracing::debug!(
                global_id = %self.global_id,
                participant_id = %participant_id,
                "participant removed"
            );
            if self.recovery && self.participants.is_empty() {
                self.fire_completion();
            }
        }
        removed
    }

    /// Look a participant up by id, used to route an inbound reply
    pub fn participant(&self, participant_id: &ParticipantId) -> Option<Arc<Participant>> {
        self.participants
            .get(participant_id)
            .map(|entry| entry.value().clone())
    }

    /// Number of currently enrolled participants
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Ids of currently enrolled participants, in no particular order
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|entry| *entry.key()).collect()
    }

    /// Drive the prepare phase through the transaction manager and return
    /// the collective vote. Serialized against `commit`/`rollback` for this
    /// transaction.
    ///
    /// Participant fan-out/fan-in is the transport caller's job, via
    /// [`participant`](GlobalTransaction::participant) and
    /// [`Participant::wait_response`].
    pub fn prepare(&self) -> Result<Vote> {
        let _phase = self.phase_lock.lock();
        self.manager
            .prepare_transaction(&self.global_id)
            .map_err(|source| self.protocol_error(Phase::Prepare, source))
    }

    /// Drive the commit decision through the transaction manager.
    /// Serialized against `prepare`/`rollback` for this transaction.
    pub fn commit(&self) -> Result<()> {
        let _phase = self.phase_lock.lock();
        self.manager
            .commit_transaction(&self.global_id)
            .map_err(|source| self.protocol_error(Phase::Commit, source))
    }

    /// Drive the rollback decision through the transaction manager.
    /// Serialized against `prepare`/`commit` for this transaction.
    pub fn rollback(&self) -> Result<()> {
        let _phase = self.phase_lock.lock();
        self.manager
            .rollback_transaction(&self.global_id)
            .map_err(|source| self.protocol_error(Phase::Rollback, source))
    }

    fn protocol_error(
        &self,
        phase: Phase,
        source: crate::manager::ManagerError,
    ) -> CoordinatorError {
        tracing::error!(
            global_id = %self.global_id,
            phase = %phase,
            error = %source,
            "transaction manager failed"
        );
        CoordinatorError::Protocol { phase, source }
    }

    /// Register a hook to run when this transaction completes. Hooks run
    /// exactly once, in registration order; hooks registered after
    /// completion never run.
    pub fn on_completion(&self, hook: impl FnOnce() + Send + 'static) {
        if self.completed.load(Ordering::Acquire) {
            tracing::debug!(global_id = %self.global_id, "hook registered after completion, dropped");
            return;
        }
        self.completion_hooks.lock().push(Box::new(hook));
    }

    /// Mark the transaction completed and run its hooks. Idempotent.
    pub fn fire_completion(&self) {
        if self.completed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(global_id = %self.global_id, recovery = self.recovery, "transaction completed");

        let hooks = std::mem::take(&mut *self.completion_hooks.lock());
        for hook in hooks {
            hook();
        }
    }

    /// Whether the completion hooks have fired
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

impl PartialEq for GlobalTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.global_id == other.global_id
    }
}

impl Eq for GlobalTransaction {}

impl Hash for GlobalTransaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.global_id.hash(state);
    }
}

impl fmt::Debug for GlobalTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalTransaction")
            .field("global_id", &self.global_id)
            .field("timeout_millis", &self.timeout_millis)
            .field("recovery", &self.recovery)
            .field("participants", &self.participants.len())
            .finish()
    }
}

impl fmt::Display for GlobalTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.global_id)
    }
}
