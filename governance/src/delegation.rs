//! Transitive delegation resolution.
//!
//! A voter's effective vote is found by following their current delegation
//! chain until it reaches a direct vote. Chains that loop back on
//! themselves, or that run into a participant who never acted, abstain.
//!
//! The walk is iterative with an explicit path, so chain length is bounded
//! by heap memory rather than stack depth, and results are memoized across
//! the pass so each delegation edge is followed at most once.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use liquid_types::{ParticipantId, ProposalId};
use serde::{Deserialize, Serialize};

use crate::ballot::{BallotAction, BallotBook};
use crate::error::GovernanceError;
use crate::registry::{lock_slot, ProposalRegistry};

/// The value ultimately attributed to a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveVote {
    Yes,
    No,
    Abstain,
}

impl EffectiveVote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Abstain => "abstain",
        }
    }
}

impl From<bool> for EffectiveVote {
    fn from(is_yes: bool) -> Self {
        if is_yes {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// Effective vote of every actor on one proposal, ordered by participant.
pub type Resolution = BTreeMap<ParticipantId, EffectiveVote>;

/// Resolves effective votes for a proposal's actors.
pub struct DelegationResolver {
    registry: Arc<ProposalRegistry>,
}

impl DelegationResolver {
    pub fn new(registry: Arc<ProposalRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve every actor's effective vote from the current ballot state.
    pub fn resolve(&self, proposal_id: &ProposalId) -> Result<Resolution, GovernanceError> {
        let slot = self.registry.slot(proposal_id)?;
        let guard = lock_slot(&slot);
        Ok(resolve_book(&guard.ballots))
    }
}

/// Resolve a ballot book.
///
/// Pure: the result depends only on the current actions in `book`. Every
/// actor appears exactly once in the output; dangling delegation targets
/// (participants with no action) never do.
pub fn resolve_book(book: &BallotBook) -> Resolution {
    let mut resolved = Resolution::new();
    let mut path: Vec<ParticipantId> = Vec::new();
    let mut on_path: HashSet<ParticipantId> = HashSet::new();

    for start in book.actors() {
        if resolved.contains_key(&start) {
            continue;
        }

        let mut current = start;
        let vote = loop {
            if let Some(&known) = resolved.get(&current) {
                break known;
            }
            let Some(action) = book.current_action(current) else {
                // Dangling: the chain ends at someone who never acted.
                break EffectiveVote::Abstain;
            };
            if !on_path.insert(current) {
                // Revisited a voter on this walk. The cycle and everything
                // leading into it abstains.
                break EffectiveVote::Abstain;
            }
            path.push(current);
            match action {
                BallotAction::DirectVote { is_yes, .. } => break EffectiveVote::from(*is_yes),
                BallotAction::Delegation { delegate_id, .. } => current = *delegate_id,
            }
        };

        for voter in path.drain(..) {
            resolved.insert(voter, vote);
        }
        on_path.clear();
    }

    resolved
}
