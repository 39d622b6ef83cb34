//! Proposals, their lifecycle, and the committed tally.

use liquid_types::{ParticipantId, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle of a proposal. The only transition is `Open → Finalized`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Accepting votes and delegations.
    Open,
    /// Closed; carries its [`TallyResult`].
    Finalized,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Finalized => "finalized",
        }
    }
}

/// Binding outcome of a finalized proposal. Ties reject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Passed,
    Rejected,
}

impl Outcome {
    /// `Passed` iff yes strictly outnumbers no.
    pub fn from_counts(yes: u64, no: u64) -> Self {
        if yes > no {
            Self::Passed
        } else {
            Self::Rejected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Rejected => "rejected",
        }
    }
}

/// The tally committed by finalize. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub proposal_id: ProposalId,
    pub yes_count: u64,
    pub no_count: u64,
    pub abstain_count: u64,
    pub outcome: Outcome,
    pub finalized_by: ParticipantId,
    pub finalized_at: Timestamp,
}

/// A proposal put to the participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    /// Creation ordinal; listing order.
    pub sequence: u64,
    pub proposer_id: ParticipantId,
    pub statement: String,
    pub status: ProposalStatus,
    pub created_at: Timestamp,
    /// Present exactly when `status` is `Finalized`.
    pub result: Option<TallyResult>,
}

impl Proposal {
    pub fn is_open(&self) -> bool {
        self.status == ProposalStatus::Open
    }

    /// Finalized iff a result is attached, and the result names this proposal.
    pub(crate) fn is_consistent(&self) -> bool {
        match (&self.status, &self.result) {
            (ProposalStatus::Open, None) => true,
            (ProposalStatus::Finalized, Some(result)) => result.proposal_id == self.id,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_reject() {
        assert_eq!(Outcome::from_counts(3, 3), Outcome::Rejected);
        assert_eq!(Outcome::from_counts(0, 0), Outcome::Rejected);
        assert_eq!(Outcome::from_counts(4, 3), Outcome::Passed);
        assert_eq!(Outcome::from_counts(1, 2), Outcome::Rejected);
    }

    #[test]
    fn consistency_requires_result_iff_finalized() {
        let id = ProposalId::generate();
        let mut proposal = Proposal {
            id,
            sequence: 0,
            proposer_id: ParticipantId::new(1),
            statement: "Adopt charter".into(),
            status: ProposalStatus::Open,
            created_at: Timestamp::new(10),
            result: None,
        };
        assert!(proposal.is_consistent());

        proposal.status = ProposalStatus::Finalized;
        assert!(!proposal.is_consistent());

        proposal.result = Some(TallyResult {
            proposal_id: id,
            yes_count: 1,
            no_count: 0,
            abstain_count: 0,
            outcome: Outcome::Passed,
            finalized_by: ParticipantId::new(1),
            finalized_at: Timestamp::new(20),
        });
        assert!(proposal.is_consistent());
    }
}
