//! Ballot actions and the per-proposal ballot log.
//!
//! Every vote or delegation is appended to the proposal's log under a
//! strictly increasing sequence number. The latest action per voter is the
//! *current* action; earlier ones are kept for audit only and never take
//! part in resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use liquid_types::{ParticipantId, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::GovernanceError;
use crate::registry::{lock_slot, ProposalRegistry};

/// What a participant did on a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallotAction {
    /// Vote yes or no directly.
    DirectVote {
        voter_id: ParticipantId,
        is_yes: bool,
        seq: u64,
    },
    /// Hand this voter's vote to `delegate_id`, whatever they end up doing.
    Delegation {
        voter_id: ParticipantId,
        delegate_id: ParticipantId,
        seq: u64,
    },
}

impl BallotAction {
    pub fn voter_id(&self) -> ParticipantId {
        match self {
            Self::DirectVote { voter_id, .. } | Self::Delegation { voter_id, .. } => *voter_id,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Self::DirectVote { seq, .. } | Self::Delegation { seq, .. } => *seq,
        }
    }
}

/// A ballot action as appended to the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRecord {
    pub action: BallotAction,
    pub recorded_at: Timestamp,
}

/// One proposal's ballot log plus the current-action index derived from it.
#[derive(Clone, Debug, Default)]
pub struct BallotBook {
    current: BTreeMap<ParticipantId, BallotAction>,
    history: BTreeMap<ParticipantId, Vec<BallotRecord>>,
    next_seq: u64,
}

impl BallotBook {
    pub fn new() -> Self {
        Self {
            current: BTreeMap::new(),
            history: BTreeMap::new(),
            next_seq: 1,
        }
    }

    /// Sequence number the next appended action will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq.max(1)
    }

    /// Append a record. It becomes the voter's current action unless the
    /// voter already holds a later one.
    pub fn apply(&mut self, record: BallotRecord) {
        let voter = record.action.voter_id();
        let seq = record.action.seq();
        self.next_seq = self.next_seq().max(seq.saturating_add(1));

        let supersedes = self
            .current
            .get(&voter)
            .map_or(true, |existing| seq > existing.seq());
        if supersedes {
            self.current.insert(voter, record.action.clone());
        }

        let trail = self.history.entry(voter).or_default();
        let pos = trail.partition_point(|r| r.action.seq() < seq);
        trail.insert(pos, record);
    }

    pub fn current_action(&self, voter: ParticipantId) -> Option<&BallotAction> {
        self.current.get(&voter)
    }

    /// Voters with a current action, ascending.
    pub fn actors(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.current.keys().copied()
    }

    pub fn actor_count(&self) -> usize {
        self.current.len()
    }

    /// Every action the voter has recorded, oldest first.
    pub fn history(&self, voter: ParticipantId) -> &[BallotRecord] {
        self.history.get(&voter).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Records votes and delegations against open proposals.
///
/// Each call runs inside the proposal's critical section: the proposal is
/// checked open, the record is made durable, and only then is it applied in
/// memory. A rejected call changes nothing.
pub struct BallotStore {
    registry: Arc<ProposalRegistry>,
}

impl BallotStore {
    pub fn new(registry: Arc<ProposalRegistry>) -> Self {
        Self { registry }
    }

    /// Record a direct vote as the voter's new current action.
    pub fn record_vote(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
        is_yes: bool,
    ) -> Result<BallotAction, GovernanceError> {
        self.append(proposal_id, |seq| BallotAction::DirectVote {
            voter_id,
            is_yes,
            seq,
        })
    }

    /// Record a delegation as the voter's new current action.
    ///
    /// The delegate does not need to have acted (or ever act); an
    /// unresolved delegate makes the chain abstain at tally time.
    pub fn record_delegation(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
        delegate_id: ParticipantId,
    ) -> Result<BallotAction, GovernanceError> {
        if voter_id == delegate_id {
            return Err(GovernanceError::InvalidDelegation(voter_id));
        }
        self.append(proposal_id, |seq| BallotAction::Delegation {
            voter_id,
            delegate_id,
            seq,
        })
    }

    pub fn current_action(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
    ) -> Result<Option<BallotAction>, GovernanceError> {
        let slot = self.registry.slot(proposal_id)?;
        let guard = lock_slot(&slot);
        Ok(guard.ballots.current_action(voter_id).cloned())
    }

    pub fn actors(&self, proposal_id: &ProposalId) -> Result<BTreeSet<ParticipantId>, GovernanceError> {
        let slot = self.registry.slot(proposal_id)?;
        let guard = lock_slot(&slot);
        Ok(guard.ballots.actors().collect())
    }

    /// Audit trail for one voter, oldest first.
    pub fn history(
        &self,
        proposal_id: &ProposalId,
        voter_id: ParticipantId,
    ) -> Result<Vec<BallotRecord>, GovernanceError> {
        let slot = self.registry.slot(proposal_id)?;
        let guard = lock_slot(&slot);
        Ok(guard.ballots.history(voter_id).to_vec())
    }

    fn append(
        &self,
        proposal_id: &ProposalId,
        build: impl FnOnce(u64) -> BallotAction,
    ) -> Result<BallotAction, GovernanceError> {
        let slot = self.registry.slot(proposal_id)?;
        let mut guard = lock_slot(&slot);
        if !guard.proposal.is_open() {
            return Err(GovernanceError::ProposalFinalized(*proposal_id));
        }

        let seq = guard.ballots.next_seq();
        let record = BallotRecord {
            action: build(seq),
            recorded_at: self.registry.clock().now(),
        };
        let bytes = codec::encode(&record)?;
        self.registry.store().put_ballot(proposal_id, seq, &bytes)?;

        let action = record.action.clone();
        guard.ballots.apply(record);
        tracing::debug!(proposal = %proposal_id, ?action, "ballot recorded");
        Ok(action)
    }
}
