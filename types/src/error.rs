//! Errors raised while parsing or constructing shared types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid proposal id: {0}")]
    InvalidProposalId(String),

    #[error("invalid participant id: {0}")]
    InvalidParticipantId(String),
}
