//! Nullable store: thread-safe in-memory governance storage for testing.

use liquid_store::governance::GovernanceStore;
use liquid_store::StoreError;
use liquid_types::ProposalId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// An in-memory governance store for testing.
///
/// Writes can be made to fail on demand, which lets tests check that a
/// rejected durable write leaves the engine's state untouched.
pub struct NullGovernanceStore {
    proposals: Mutex<BTreeMap<ProposalId, Vec<u8>>>,
    ballots: Mutex<BTreeMap<(ProposalId, u64), Vec<u8>>>,
    tallies: Mutex<BTreeMap<ProposalId, Vec<u8>>>,
    fail_writes: AtomicBool,
    /// Milliseconds every write sleeps before landing.
    write_delay_ms: AtomicU64,
    writes: AtomicU64,
}

impl NullGovernanceStore {
    pub fn new() -> Self {
        Self {
            proposals: Mutex::new(BTreeMap::new()),
            ballots: Mutex::new(BTreeMap::new()),
            tallies: Mutex::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
            write_delay_ms: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write take at least `delay`, like a slow fsync.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for NullGovernanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GovernanceStore for NullGovernanceStore {
    fn put_proposal(&self, id: &ProposalId, data: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.proposals.lock().unwrap().insert(*id, data.to_vec());
        self.record_write();
        Ok(())
    }

    fn get_proposal(&self, id: &ProposalId) -> Result<Vec<u8>, StoreError> {
        self.proposals
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("proposal {id}")))
    }

    fn iter_proposals(&self) -> Result<Vec<(ProposalId, Vec<u8>)>, StoreError> {
        Ok(self
            .proposals
            .lock()
            .unwrap()
            .iter()
            .map(|(id, data)| (*id, data.clone()))
            .collect())
    }

    fn put_ballot(&self, proposal: &ProposalId, seq: u64, data: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.ballots
            .lock()
            .unwrap()
            .insert((*proposal, seq), data.to_vec());
        self.record_write();
        Ok(())
    }

    fn get_ballots(&self, proposal: &ProposalId) -> Result<Vec<(u64, Vec<u8>)>, StoreError> {
        Ok(self
            .ballots
            .lock()
            .unwrap()
            .range((*proposal, 0)..=(*proposal, u64::MAX))
            .map(|((_, seq), data)| (*seq, data.clone()))
            .collect())
    }

    fn put_finalization(
        &self,
        id: &ProposalId,
        proposal: &[u8],
        tally: &[u8],
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut proposals = self.proposals.lock().unwrap();
        let mut tallies = self.tallies.lock().unwrap();
        proposals.insert(*id, proposal.to_vec());
        tallies.insert(*id, tally.to_vec());
        self.record_write();
        Ok(())
    }

    fn get_tally(&self, id: &ProposalId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tallies.lock().unwrap().get(id).cloned())
    }
}
