//! LMDB implementation of GovernanceStore.
//!
//! Key formats:
//! - `proposals`, `tallies`: the 16-byte proposal id.
//! - `ballots`: `proposal_id ++ seq.to_be_bytes()`, so a range scan over the
//!   proposal prefix yields the log in sequence order.

use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use liquid_store::governance::GovernanceStore;
use liquid_store::StoreError;
use liquid_types::ProposalId;

use crate::LmdbError;

pub struct LmdbGovernanceStore {
    pub(crate) env: Arc<Env>,
    pub(crate) proposals_db: Database<Bytes, Bytes>,
    pub(crate) ballots_db: Database<Bytes, Bytes>,
    pub(crate) tallies_db: Database<Bytes, Bytes>,
}

fn ballot_key(proposal: &ProposalId, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(ProposalId::LEN + 8);
    key.extend_from_slice(proposal.as_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn decode_seq(key: &[u8]) -> Result<u64, LmdbError> {
    let tail: [u8; 8] = key
        .get(ProposalId::LEN..)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| LmdbError::Serialization("invalid ballot key length".into()))?;
    Ok(u64::from_be_bytes(tail))
}

fn decode_proposal_id(key: &[u8]) -> Result<ProposalId, LmdbError> {
    let arr: [u8; ProposalId::LEN] = key
        .try_into()
        .map_err(|_| LmdbError::Serialization("invalid proposal key length".into()))?;
    Ok(ProposalId::from_bytes(arr))
}

/// Increment a byte string as a big-endian integer, giving the first key
/// past every key that starts with it. `None` when the prefix is all `0xff`.
fn increment_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

impl GovernanceStore for LmdbGovernanceStore {
    fn put_proposal(&self, id: &ProposalId, data: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.proposals_db
            .put(&mut wtxn, id.as_bytes(), data)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_proposal(&self, id: &ProposalId) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .proposals_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("proposal {id}")))?;
        Ok(val.to_vec())
    }

    fn iter_proposals(&self) -> Result<Vec<(ProposalId, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut proposals = Vec::new();
        let iter = self.proposals_db.iter(&rtxn).map_err(LmdbError::from)?;
        for result in iter {
            let (key, val) = result.map_err(LmdbError::from)?;
            proposals.push((decode_proposal_id(key)?, val.to_vec()));
        }
        Ok(proposals)
    }

    fn put_ballot(&self, proposal: &ProposalId, seq: u64, data: &[u8]) -> Result<(), StoreError> {
        let key = ballot_key(proposal, seq);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.ballots_db
            .put(&mut wtxn, &key, data)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_ballots(&self, proposal: &ProposalId) -> Result<Vec<(u64, Vec<u8>)>, StoreError> {
        let prefix: &[u8] = proposal.as_bytes();
        let upper = increment_prefix(prefix);

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(prefix),
            match upper.as_deref() {
                Some(upper) => Bound::Excluded(upper),
                None => Bound::Unbounded,
            },
        );
        let iter = self
            .ballots_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        let mut ballots = Vec::new();
        for result in iter {
            let (key, val) = result.map_err(LmdbError::from)?;
            ballots.push((decode_seq(key)?, val.to_vec()));
        }
        Ok(ballots)
    }

    fn put_finalization(
        &self,
        id: &ProposalId,
        proposal: &[u8],
        tally: &[u8],
    ) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.proposals_db
            .put(&mut wtxn, id.as_bytes(), proposal)
            .map_err(LmdbError::from)?;
        self.tallies_db
            .put(&mut wtxn, id.as_bytes(), tally)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_tally(&self, id: &ProposalId) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .tallies_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(|v| v.to_vec()))
    }
}
