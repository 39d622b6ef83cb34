//! Tallying and the one-shot finalization commit.

use std::sync::Arc;

use liquid_types::{ParticipantId, ProposalId};
use serde::{Deserialize, Serialize};

use crate::delegation::{resolve_book, EffectiveVote, Resolution};
use crate::error::GovernanceError;
use crate::params::{FinalizePolicy, GovernanceParams};
use crate::proposal::{Outcome, ProposalStatus, TallyResult};
use crate::registry::{lock_slot, ProposalRegistry};

/// Effective vote totals over a proposal's actors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub yes: u64,
    pub no: u64,
    pub abstain: u64,
}

impl VoteCounts {
    pub fn from_resolution(resolution: &Resolution) -> Self {
        resolution
            .values()
            .fold(Self::default(), |mut counts, vote| {
                match vote {
                    EffectiveVote::Yes => counts.yes += 1,
                    EffectiveVote::No => counts.no += 1,
                    EffectiveVote::Abstain => counts.abstain += 1,
                }
                counts
            })
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_counts(self.yes, self.no)
    }

    pub fn total(&self) -> u64 {
        self.yes + self.no + self.abstain
    }
}

/// A non-binding look at where a proposal stands.
///
/// For a finalized proposal the counts are those of the committed result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyPreview {
    pub proposal_id: ProposalId,
    pub counts: VoteCounts,
    pub outcome: Outcome,
    pub status: ProposalStatus,
}

/// Counts effective votes and commits the binding result.
pub struct TallyEngine {
    registry: Arc<ProposalRegistry>,
    params: GovernanceParams,
}

impl TallyEngine {
    pub fn new(registry: Arc<ProposalRegistry>, params: GovernanceParams) -> Self {
        Self { registry, params }
    }

    /// Resolve, count and commit the proposal's tally.
    ///
    /// Runs entirely inside the proposal's critical section, so no ballot
    /// can land between resolution and commit. Either commits exactly once
    /// or fails; a prior result is never recomputed or handed out again.
    pub fn finalize(
        &self,
        proposal_id: &ProposalId,
        finalizer_id: ParticipantId,
    ) -> Result<TallyResult, GovernanceError> {
        let slot = self.registry.slot(proposal_id)?;
        let mut guard = lock_slot(&slot);

        if !guard.proposal.is_open() {
            tracing::warn!(
                proposal = %proposal_id,
                finalizer = %finalizer_id,
                "finalize rejected, proposal already closed"
            );
            return Err(GovernanceError::AlreadyFinalized(*proposal_id));
        }
        if self.params.finalize_policy == FinalizePolicy::ProposerOnly
            && guard.proposal.proposer_id != finalizer_id
        {
            return Err(GovernanceError::NotProposer {
                proposer: guard.proposal.proposer_id,
            });
        }

        let counts = VoteCounts::from_resolution(&resolve_book(&guard.ballots));
        let result = TallyResult {
            proposal_id: *proposal_id,
            yes_count: counts.yes,
            no_count: counts.no,
            abstain_count: counts.abstain,
            outcome: counts.outcome(),
            finalized_by: finalizer_id,
            finalized_at: self.registry.clock().now(),
        };
        self.registry.commit_locked(&mut guard, result.clone())?;

        tracing::info!(
            proposal = %proposal_id,
            finalizer = %finalizer_id,
            yes = result.yes_count,
            no = result.no_count,
            abstain = result.abstain_count,
            outcome = result.outcome.as_str(),
            "proposal finalized"
        );
        Ok(result)
    }

    /// Current standing without committing anything.
    pub fn preview(&self, proposal_id: &ProposalId) -> Result<TallyPreview, GovernanceError> {
        let slot = self.registry.slot(proposal_id)?;
        let guard = lock_slot(&slot);

        let counts = match &guard.proposal.result {
            Some(result) => VoteCounts {
                yes: result.yes_count,
                no: result.no_count,
                abstain: result.abstain_count,
            },
            None => VoteCounts::from_resolution(&resolve_book(&guard.ballots)),
        };
        Ok(TallyPreview {
            proposal_id: *proposal_id,
            counts,
            outcome: guard
                .proposal
                .result
                .as_ref()
                .map_or_else(|| counts.outcome(), |r| r.outcome),
            status: guard.proposal.status,
        })
    }

    pub fn params(&self) -> &GovernanceParams {
        &self.params
    }
}
