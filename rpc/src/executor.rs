//! Bounded blocking executor for engine calls.
//!
//! Engine operations take std mutexes and write to LMDB, so they run on the
//! blocking pool. Requests for the same proposal queue on an async lock
//! here instead of parking pool threads on the engine's slot mutex, and a
//! semaphore caps how many run at once. Different proposals proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use liquid_types::ProposalId;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor is shut down")]
    Closed,

    #[error("engine task failed: {0}")]
    Join(String),
}

struct LockSlot {
    lock: Arc<Mutex<()>>,
    users: usize,
}

type LockMap = Arc<StdMutex<HashMap<ProposalId, LockSlot>>>;

/// One caller's claim on a proposal's lock entry. The entry is removed when
/// the last claim drops, whether the call finished or was abandoned.
struct Lease {
    locks: LockMap,
    id: ProposalId,
}

impl Lease {
    fn acquire(locks: &LockMap, id: ProposalId) -> (Self, Arc<Mutex<()>>) {
        let mut map = locks.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = map.entry(id).or_insert_with(|| LockSlot {
            lock: Arc::new(Mutex::new(())),
            users: 0,
        });
        slot.users += 1;
        let lock = Arc::clone(&slot.lock);
        (
            Self {
                locks: Arc::clone(locks),
                id,
            },
            lock,
        )
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = map.get_mut(&self.id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                map.remove(&self.id);
            }
        }
    }
}

pub struct ProposalExecutor {
    proposal_locks: LockMap,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
}

impl ProposalExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            proposal_locks: Arc::new(StdMutex::new(HashMap::new())),
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Run `f` on the blocking pool.
    ///
    /// With a `key`, calls for the same proposal are serialized in arrival
    /// order; without one (propose, list) only the global bound applies.
    ///
    /// The permit, the proposal lock and the lease move into the blocking
    /// task, so dropping the returned future (a disconnected client) neither
    /// frees the proposal for the next caller early nor leaks its entry.
    pub async fn run<F, R>(&self, key: Option<ProposalId>, f: F) -> Result<R, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Closed)?;

        let task = match key {
            Some(id) => {
                let (lease, lock) = Lease::acquire(&self.proposal_locks, id);
                let guard = lock.lock_owned().await;
                tokio::task::spawn_blocking(move || {
                    let out = f();
                    drop(guard);
                    drop(lease);
                    drop(permit);
                    out
                })
            }
            None => tokio::task::spawn_blocking(move || {
                let out = f();
                drop(permit);
                out
            }),
        };
        task.await.map_err(|e| ExecutorError::Join(e.to_string()))
    }

    /// Stop admitting work. Calls already running finish; new ones fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Proposals with a call running or queued.
    pub fn active_proposals(&self) -> usize {
        self.proposal_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
