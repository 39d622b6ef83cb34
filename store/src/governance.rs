//! Governance storage trait.
//!
//! Values are opaque bytes; the governance crate owns the encoding.

use crate::StoreError;
use liquid_types::ProposalId;

/// Durable storage for proposals, their ballot logs and their tally results.
///
/// Each method is one atomic write or read. Implementations must be safe to
/// share between threads; callers serialize writes per proposal.
pub trait GovernanceStore: Send + Sync {
    /// Store (or overwrite) a proposal record.
    fn put_proposal(&self, id: &ProposalId, data: &[u8]) -> Result<(), StoreError>;

    /// Get a proposal record by id.
    fn get_proposal(&self, id: &ProposalId) -> Result<Vec<u8>, StoreError>;

    /// All stored proposal records, in key order.
    fn iter_proposals(&self) -> Result<Vec<(ProposalId, Vec<u8>)>, StoreError>;

    /// Append one ballot action to a proposal's log under its sequence number.
    fn put_ballot(&self, proposal: &ProposalId, seq: u64, data: &[u8])
        -> Result<(), StoreError>;

    /// A proposal's full ballot log, ordered by ascending sequence number.
    fn get_ballots(&self, proposal: &ProposalId) -> Result<Vec<(u64, Vec<u8>)>, StoreError>;

    /// Write the finalized proposal record and its tally in a single
    /// transaction: either both land or neither does.
    fn put_finalization(
        &self,
        id: &ProposalId,
        proposal: &[u8],
        tally: &[u8],
    ) -> Result<(), StoreError>;

    /// The committed tally for a proposal, if it has been finalized.
    fn get_tally(&self, id: &ProposalId) -> Result<Option<Vec<u8>>, StoreError>;
}
