use liquid_store::StoreError;
use liquid_types::{ParticipantId, ProposalId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("proposal {0} not found")]
    NotFound(ProposalId),

    #[error("proposal {0} is finalized, ballots are closed")]
    ProposalFinalized(ProposalId),

    #[error("participant {0} cannot delegate to themselves")]
    InvalidDelegation(ParticipantId),

    #[error("proposal {0} has already been finalized")]
    AlreadyFinalized(ProposalId),

    #[error("only the proposer ({proposer}) can finalize this proposal")]
    NotProposer { proposer: ParticipantId },

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GovernanceError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ProposalFinalized(_) => "proposal_finalized",
            Self::InvalidDelegation(_) => "invalid_delegation",
            Self::AlreadyFinalized(_) => "already_finalized",
            Self::NotProposer { .. } => "not_proposer",
            Self::InvalidStatement(_) => "invalid_statement",
            Self::Store(_) => "store",
        }
    }
}
