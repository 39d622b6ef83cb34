//! Proposal registry: identity, lifecycle, and the finalization commit.
//!
//! Each proposal lives in its own mutex-guarded slot together with its
//! ballot log. The registry index is only held long enough to look a slot
//! up or insert a new one, so work on one proposal never blocks another.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use liquid_store::GovernanceStore;
use liquid_types::{Clock, ParticipantId, ProposalId};

use crate::ballot::BallotBook;
use crate::codec;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, ProposalStatus, TallyResult};

/// A proposal and its ballots; the unit of mutual exclusion.
pub(crate) struct ProposalSlot {
    pub(crate) proposal: Proposal,
    pub(crate) ballots: BallotBook,
}

pub(crate) type SharedSlot = Arc<Mutex<ProposalSlot>>;

/// Enter a proposal's critical section.
///
/// In-memory state is only written after the durable write succeeded, so a
/// panic elsewhere never leaves a slot half-updated; a poisoned lock is
/// taken over as is.
pub(crate) fn lock_slot(slot: &Mutex<ProposalSlot>) -> MutexGuard<'_, ProposalSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct RegistryIndex {
    slots: HashMap<ProposalId, SharedSlot>,
    /// Creation sequence → proposal id.
    order: BTreeMap<u64, ProposalId>,
}

/// Owns proposal identity and lifecycle status.
pub struct ProposalRegistry {
    index: RwLock<RegistryIndex>,
    next_sequence: AtomicU64,
    store: Arc<dyn GovernanceStore>,
    clock: Arc<dyn Clock>,
}

impl ProposalRegistry {
    pub fn new(store: Arc<dyn GovernanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            index: RwLock::new(RegistryIndex::default()),
            next_sequence: AtomicU64::new(0),
            store,
            clock,
        }
    }

    /// Create a new open proposal with a fresh id.
    ///
    /// The record is made durable before the index lock is taken; a failed
    /// write only burns a sequence number.
    pub fn create(
        &self,
        proposer_id: ParticipantId,
        statement: String,
    ) -> Result<Proposal, GovernanceError> {
        let proposal = Proposal {
            id: ProposalId::generate(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            proposer_id,
            statement,
            status: ProposalStatus::Open,
            created_at: self.clock.now(),
            result: None,
        };
        let bytes = codec::encode(&proposal)?;
        self.store.put_proposal(&proposal.id, &bytes)?;

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        index.order.insert(proposal.sequence, proposal.id);
        index.slots.insert(
            proposal.id,
            Arc::new(Mutex::new(ProposalSlot {
                proposal: proposal.clone(),
                ballots: BallotBook::new(),
            })),
        );
        Ok(proposal)
    }

    pub fn get(&self, id: &ProposalId) -> Result<Proposal, GovernanceError> {
        let slot = self.slot(id)?;
        let guard = lock_slot(&slot);
        Ok(guard.proposal.clone())
    }

    /// All proposals in creation order.
    pub fn list(&self) -> Vec<Proposal> {
        let slots: Vec<SharedSlot> = {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            index
                .order
                .values()
                .filter_map(|id| index.slots.get(id).cloned())
                .collect()
        };
        slots
            .iter()
            .map(|slot| lock_slot(slot).proposal.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transition an open proposal to finalized and attach its result.
    ///
    /// Fails with `AlreadyFinalized`, mutating nothing, if the proposal is
    /// not open. This check-and-set is the only way a result is ever
    /// attached, which is what makes finalization at-most-once.
    pub fn commit_finalization(
        &self,
        id: &ProposalId,
        result: TallyResult,
    ) -> Result<Proposal, GovernanceError> {
        let slot = self.slot(id)?;
        let mut guard = lock_slot(&slot);
        self.commit_locked(&mut guard, result)
    }

    /// [`commit_finalization`](Self::commit_finalization) for a caller that
    /// already holds the proposal's critical section.
    pub(crate) fn commit_locked(
        &self,
        slot: &mut ProposalSlot,
        result: TallyResult,
    ) -> Result<Proposal, GovernanceError> {
        let id = slot.proposal.id;
        if !slot.proposal.is_open() {
            return Err(GovernanceError::AlreadyFinalized(id));
        }
        debug_assert_eq!(result.proposal_id, id);

        let mut finalized = slot.proposal.clone();
        finalized.status = ProposalStatus::Finalized;
        finalized.result = Some(result.clone());

        let proposal_bytes = codec::encode(&finalized)?;
        let tally_bytes = codec::encode(&result)?;
        self.store
            .put_finalization(&id, &proposal_bytes, &tally_bytes)?;

        slot.proposal = finalized.clone();
        Ok(finalized)
    }

    /// Re-insert a proposal read back from the durable store.
    pub(crate) fn restore(&self, proposal: Proposal, ballots: BallotBook) {
        self.next_sequence
            .fetch_max(proposal.sequence.saturating_add(1), Ordering::SeqCst);
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        index.order.insert(proposal.sequence, proposal.id);
        index.slots.insert(
            proposal.id,
            Arc::new(Mutex::new(ProposalSlot { proposal, ballots })),
        );
    }

    pub(crate) fn slot(&self, id: &ProposalId) -> Result<SharedSlot, GovernanceError> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .get(id)
            .cloned()
            .ok_or(GovernanceError::NotFound(*id))
    }

    pub(crate) fn store(&self) -> &dyn GovernanceStore {
        self.store.as_ref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Outcome;
    use liquid_nullables::{NullClock, NullGovernanceStore};
    use liquid_types::Timestamp;

    fn registry() -> (Arc<NullGovernanceStore>, ProposalRegistry) {
        let store = Arc::new(NullGovernanceStore::new());
        let registry = ProposalRegistry::new(store.clone(), Arc::new(NullClock::new(100)));
        (store, registry)
    }

    fn result_for(id: ProposalId) -> TallyResult {
        TallyResult {
            proposal_id: id,
            yes_count: 2,
            no_count: 1,
            abstain_count: 0,
            outcome: Outcome::Passed,
            finalized_by: ParticipantId::new(5),
            finalized_at: Timestamp::new(200),
        }
    }

    #[test]
    fn create_assigns_fresh_ids_in_order() {
        let (_, registry) = registry();
        let a = registry.create(ParticipantId::new(1), "first".into()).unwrap();
        let b = registry.create(ParticipantId::new(2), "second".into()).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!((a.sequence, b.sequence), (0, 1));
        assert_eq!(a.status, ProposalStatus::Open);
        assert_eq!(a.created_at, Timestamp::new(100));
        let listed: Vec<ProposalId> = registry.list().iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![a.id, b.id]);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let (_, registry) = registry();
        let id = ProposalId::generate();
        assert!(matches!(registry.get(&id), Err(GovernanceError::NotFound(x)) if x == id));
    }

    #[test]
    fn second_commit_is_rejected_without_mutation() {
        let (_, registry) = registry();
        let p = registry.create(ParticipantId::new(1), "charter".into()).unwrap();

        let committed = registry.commit_finalization(&p.id, result_for(p.id)).unwrap();
        assert_eq!(committed.status, ProposalStatus::Finalized);

        let mut other = result_for(p.id);
        other.outcome = Outcome::Rejected;
        let err = registry.commit_finalization(&p.id, other).unwrap_err();
        assert!(matches!(err, GovernanceError::AlreadyFinalized(_)));
        assert_eq!(registry.get(&p.id).unwrap().result, Some(result_for(p.id)));
    }

    #[test]
    fn failed_write_leaves_registry_unchanged() {
        let (store, registry) = registry();
        let p = registry.create(ParticipantId::new(1), "charter".into()).unwrap();

        store.set_fail_writes(true);
        assert!(matches!(
            registry.create(ParticipantId::new(1), "second".into()),
            Err(GovernanceError::Store(_))
        ));
        assert!(matches!(
            registry.commit_finalization(&p.id, result_for(p.id)),
            Err(GovernanceError::Store(_))
        ));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&p.id).unwrap().is_open());
    }
}
