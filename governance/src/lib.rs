//! Liquid-democracy decision engine.
//!
//! Participants submit proposals, vote directly, or delegate their vote to
//! another participant (transitively). Finalizing a proposal resolves every
//! delegation chain and commits a binding tally exactly once.
//!
//! Components, leaves first:
//! - [`ProposalRegistry`]: proposal identity and lifecycle status.
//! - [`BallotStore`]: each participant's current vote-or-delegate action.
//! - [`DelegationResolver`]: effective votes via cycle-safe chain walks.
//! - [`TallyEngine`]: counts, outcome, and the single finalization commit.
//!
//! [`GovernanceEngine`] owns all four and is the entry point for callers.
//! Every mutation of a proposal runs inside that proposal's own critical
//! section; distinct proposals never contend.

pub mod ballot;
mod codec;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod params;
pub mod proposal;
pub mod registry;
pub mod tally;

pub use ballot::{BallotAction, BallotBook, BallotRecord, BallotStore};
pub use delegation::{DelegationResolver, EffectiveVote, Resolution};
pub use engine::GovernanceEngine;
pub use error::GovernanceError;
pub use params::{FinalizePolicy, GovernanceParams};
pub use proposal::{Outcome, Proposal, ProposalStatus, TallyResult};
pub use registry::ProposalRegistry;
pub use tally::{TallyEngine, TallyPreview, VoteCounts};
