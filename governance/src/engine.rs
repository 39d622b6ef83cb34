//! Governance engine: the single entry point over the four components.

use std::sync::Arc;

use liquid_store::{GovernanceStore, StoreError};
use liquid_types::{Clock, ParticipantId, ProposalId};

use crate::ballot::{BallotAction, BallotBook, BallotRecord, BallotStore};
use crate::codec;
use crate::delegation::{DelegationResolver, Resolution};
use crate::error::GovernanceError;
use crate::params::GovernanceParams;
use crate::proposal::{Proposal, TallyResult};
use crate::registry::ProposalRegistry;
use crate::tally::{TallyEngine, TallyPreview};

/// Owns the registry, ballots, resolver and tally engine for one store.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and the
/// per-proposal locking lives in the registry.
pub struct GovernanceEngine {
    registry: Arc<ProposalRegistry>,
    ballots: BallotStore,
    resolver: DelegationResolver,
    tally: TallyEngine,
    params: GovernanceParams,
}

impl GovernanceEngine {
    /// An engine with no proposals, writing through to `store`.
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        clock: Arc<dyn Clock>,
        params: GovernanceParams,
    ) -> Self {
        let registry = Arc::new(ProposalRegistry::new(store, clock));
        Self::assemble(registry, params)
    }

    /// Rebuild an engine from everything previously committed to `store`.
    pub fn recover(
        store: Arc<dyn GovernanceStore>,
        clock: Arc<dyn Clock>,
        params: GovernanceParams,
    ) -> Result<Self, GovernanceError> {
        let entries = store.iter_proposals()?;
        let registry = Arc::new(ProposalRegistry::new(store.clone(), clock));
        let mut ballot_count = 0usize;

        for (key, bytes) in &entries {
            let proposal: Proposal = codec::decode(bytes)?;
            if proposal.id != *key || !proposal.is_consistent() {
                return Err(corruption(key, "proposal record is inconsistent"));
            }
            if proposal.sequence.checked_add(1).is_none() {
                return Err(corruption(key, "proposal sequence out of range"));
            }
            if let Some(result) = &proposal.result {
                let stored = store
                    .get_tally(key)?
                    .ok_or_else(|| corruption(key, "finalized without a tally record"))?;
                let tally: TallyResult = codec::decode(&stored)?;
                if tally != *result {
                    return Err(corruption(key, "tally record disagrees with proposal"));
                }
            }

            let mut book = BallotBook::new();
            for (seq, bytes) in store.get_ballots(key)? {
                let record: BallotRecord = codec::decode(&bytes)?;
                if record.action.seq() != seq {
                    return Err(corruption(key, "ballot sequence mismatch"));
                }
                if seq.checked_add(1).is_none() {
                    return Err(corruption(key, "ballot sequence out of range"));
                }
                if let BallotAction::Delegation {
                    voter_id,
                    delegate_id,
                    ..
                } = record.action
                {
                    if voter_id == delegate_id {
                        return Err(corruption(key, "stored self-delegation"));
                    }
                }
                book.apply(record);
                ballot_count += 1;
            }
            registry.restore(proposal, book);
        }

        tracing::info!(
            proposals = entries.len(),
            ballots = ballot_count,
            "governance state recovered"
        );
        Ok(Self::assemble(registry, params))
    }

    fn assemble(registry: Arc<ProposalRegistry>, params: GovernanceParams) -> Self {
        Self {
            ballots: BallotStore::new(registry.clone()),
            resolver: DelegationResolver::new(registry.clone()),
            tally: TallyEngine::new(registry.clone(), params.clone()),
            registry,
            params,
        }
    }

    /// Submit a new proposal. The statement is stored as given.
    pub fn propose(
        &self,
        proposer_id: ParticipantId,
        statement: impl Into<String>,
    ) -> Result<Proposal, GovernanceError> {
        let statement = statement.into();
        if statement.trim().is_empty() {
            return Err(GovernanceError::InvalidStatement(
                "statement must not be empty".into(),
            ));
        }
        if statement.len() > self.params.max_statement_len {
            return Err(GovernanceError::InvalidStatement(format!(
                "statement is {} bytes, limit is {}",
                statement.len(),
                self.params.max_statement_len
            )));
        }

        let proposal = self.registry.create(proposer_id, statement)?;
        tracing::info!(proposal = %proposal.id, proposer = %proposer_id, "proposal created");
        Ok(proposal)
    }

    pub fn vote(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
        is_yes: bool,
    ) -> Result<BallotAction, GovernanceError> {
        self.ballots.record_vote(proposal_id, voter_id, is_yes)
    }

    pub fn delegate(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
        delegate_id: ParticipantId,
    ) -> Result<BallotAction, GovernanceError> {
        self.ballots
            .record_delegation(proposal_id, voter_id, delegate_id)
    }

    pub fn finalize(
        &self,
        proposal_id: &ProposalId,
        finalizer_id: ParticipantId,
    ) -> Result<TallyResult, GovernanceError> {
        self.tally.finalize(proposal_id, finalizer_id)
    }

    /// All proposals in creation order.
    pub fn list_proposals(&self) -> Vec<Proposal> {
        self.registry.list()
    }

    pub fn get_proposal(&self, proposal_id: &ProposalId) -> Result<Proposal, GovernanceError> {
        self.registry.get(proposal_id)
    }

    pub fn preview(&self, proposal_id: &ProposalId) -> Result<TallyPreview, GovernanceError> {
        self.tally.preview(proposal_id)
    }

    pub fn resolve(&self, proposal_id: &ProposalId) -> Result<Resolution, GovernanceError> {
        self.resolver.resolve(proposal_id)
    }

    pub fn current_action(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
    ) -> Result<Option<BallotAction>, GovernanceError> {
        self.ballots.current_action(proposal_id, voter_id)
    }

    pub fn ballot_history(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
    ) -> Result<Vec<BallotRecord>, GovernanceError> {
        self.ballots.history(proposal_id, voter_id)
    }

    pub fn proposal_count(&self) -> usize {
        self.registry.len()
    }

    pub fn open_count(&self) -> usize {
        self.registry.list().iter().filter(|p| p.is_open()).count()
    }

    pub fn registry(&self) -> &Arc<ProposalRegistry> {
        &self.registry
    }

    pub fn ballots(&self) -> &BallotStore {
        &self.ballots
    }

    pub fn params(&self) -> &GovernanceParams {
        &self.params
    }
}

fn corruption(id: &ProposalId, what: &str) -> GovernanceError {
    GovernanceError::Store(StoreError::Corruption(format!("proposal {id}: {what}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::ProposalStatus;
    use liquid_nullables::{NullClock, NullGovernanceStore};

    fn engine_with(params: GovernanceParams) -> GovernanceEngine {
        GovernanceEngine::new(
            Arc::new(NullGovernanceStore::new()),
            Arc::new(NullClock::new(0)),
            params,
        )
    }

    #[test]
    fn blank_statement_is_rejected() {
        let engine = engine_with(GovernanceParams::default());
        let err = engine.propose(ParticipantId::new(1), "   ").unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidStatement(_)));
        assert_eq!(engine.proposal_count(), 0);
    }

    #[test]
    fn oversized_statement_is_rejected() {
        let engine = engine_with(GovernanceParams {
            max_statement_len: 8,
            ..GovernanceParams::default()
        });
        assert!(engine.propose(ParticipantId::new(1), "12345678").is_ok());
        assert!(matches!(
            engine.propose(ParticipantId::new(1), "123456789"),
            Err(GovernanceError::InvalidStatement(_))
        ));
    }

    #[test]
    fn recover_restores_ballots_and_order() {
        let store = Arc::new(NullGovernanceStore::new());
        let clock = Arc::new(NullClock::new(0));
        let engine = GovernanceEngine::new(store.clone(), clock.clone(), GovernanceParams::default());

        let a = engine.propose(ParticipantId::new(1), "first").unwrap();
        let b = engine.propose(ParticipantId::new(1), "second").unwrap();
        engine.vote(&a.id, ParticipantId::new(2), true).unwrap();
        engine
            .delegate(&a.id, ParticipantId::new(3), ParticipantId::new(2))
            .unwrap();
        engine.finalize(&b.id, ParticipantId::new(1)).unwrap();

        let recovered = GovernanceEngine::recover(store, clock, GovernanceParams::default()).unwrap();
        let ids: Vec<ProposalId> = recovered.list_proposals().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(recovered.resolve(&a.id).unwrap(), engine.resolve(&a.id).unwrap());
        assert_eq!(
            recovered.get_proposal(&b.id).unwrap(),
            engine.get_proposal(&b.id).unwrap()
        );

        // Sequence numbers continue past the recovered ones.
        let c = recovered.propose(ParticipantId::new(1), "third").unwrap();
        assert_eq!(c.sequence, 2);
        let action = recovered.vote(&a.id, ParticipantId::new(4), false).unwrap();
        assert_eq!(action.seq(), 3);
    }

    #[test]
    fn recover_rejects_undecodable_record() {
        let store = Arc::new(NullGovernanceStore::new());
        store.put_proposal(&ProposalId::generate(), b"garbage").unwrap();

        let result = GovernanceEngine::recover(
            store,
            Arc::new(NullClock::new(0)),
            GovernanceParams::default(),
        );
        assert!(matches!(
            result,
            Err(GovernanceError::Store(StoreError::Serialization(_)))
        ));
    }

    fn stored_proposal(sequence: u64) -> Proposal {
        Proposal {
            id: ProposalId::generate(),
            sequence,
            proposer_id: ParticipantId::new(1),
            statement: "stored".into(),
            status: ProposalStatus::Open,
            created_at: liquid_types::Timestamp::new(0),
            result: None,
        }
    }

    fn recover_from(store: Arc<NullGovernanceStore>) -> Result<GovernanceEngine, GovernanceError> {
        GovernanceEngine::recover(store, Arc::new(NullClock::new(0)), GovernanceParams::default())
    }

    #[test]
    fn recover_rejects_exhausted_proposal_sequence() {
        let store = Arc::new(NullGovernanceStore::new());
        let proposal = stored_proposal(u64::MAX);
        store
            .put_proposal(&proposal.id, &codec::encode(&proposal).unwrap())
            .unwrap();

        assert!(matches!(
            recover_from(store),
            Err(GovernanceError::Store(StoreError::Corruption(_)))
        ));
    }

    #[test]
    fn recover_rejects_exhausted_ballot_sequence() {
        let store = Arc::new(NullGovernanceStore::new());
        let proposal = stored_proposal(0);
        store
            .put_proposal(&proposal.id, &codec::encode(&proposal).unwrap())
            .unwrap();
        let record = BallotRecord {
            action: BallotAction::DirectVote {
                voter_id: ParticipantId::new(2),
                is_yes: true,
                seq: u64::MAX,
            },
            recorded_at: liquid_types::Timestamp::new(0),
        };
        store
            .put_ballot(&proposal.id, u64::MAX, &codec::encode(&record).unwrap())
            .unwrap();

        assert!(matches!(
            recover_from(store),
            Err(GovernanceError::Store(StoreError::Corruption(_)))
        ));
    }
}
