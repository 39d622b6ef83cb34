//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::governance::LmdbGovernanceStore;
use crate::meta::LmdbMetaStore;
use crate::migration::Migrator;
use crate::LmdbError;

/// Named databases inside the environment.
pub(crate) const PROPOSALS_DB: &str = "proposals";
pub(crate) const BALLOTS_DB: &str = "ballots";
pub(crate) const TALLIES_DB: &str = "tallies";
pub(crate) const META_DB: &str = "meta";

/// Default number of named databases reserved when opening.
pub const DEFAULT_MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) proposals_db: Database<Bytes, Bytes>,
    pub(crate) ballots_db: Database<Bytes, Bytes>,
    pub(crate) tallies_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// Creates the directory and every named database if missing, then
    /// brings the schema up to date.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per path by this process and
        // the memory map is never resized while transactions are alive.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let proposals_db = env.create_database(&mut wtxn, Some(PROPOSALS_DB))?;
        let ballots_db = env.create_database(&mut wtxn, Some(BALLOTS_DB))?;
        let tallies_db = env.create_database(&mut wtxn, Some(TALLIES_DB))?;
        let meta_db = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            proposals_db,
            ballots_db,
            tallies_db,
            meta_db,
        };

        Migrator::run(&environment.meta_store())?;

        tracing::info!(path = %path.display(), map_size, "LMDB environment opened");
        Ok(environment)
    }

    /// The underlying heed environment.
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// A governance store backed by this environment.
    pub fn governance_store(&self) -> LmdbGovernanceStore {
        LmdbGovernanceStore {
            env: Arc::clone(&self.env),
            proposals_db: self.proposals_db,
            ballots_db: self.ballots_db,
            tallies_db: self.tallies_db,
        }
    }

    /// A metadata store backed by this environment.
    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}
