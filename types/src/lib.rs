//! Fundamental types for the liquid-democracy engine.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! participant and proposal identifiers, timestamps, and the clock abstraction.

pub mod error;
pub mod id;
pub mod time;

pub use error::TypesError;
pub use id::{ParticipantId, ProposalId};
pub use time::{Clock, SystemClock, Timestamp};
