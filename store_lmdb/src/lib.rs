//! LMDB storage backend for the liquid-democracy engine.
//!
//! Implements the storage traits from `liquid-store` using the `heed` LMDB bindings.
//! Each logical store maps to one or more LMDB databases within a single environment.

pub mod environment;
pub mod error;
pub mod governance;
pub mod integrity;
pub mod meta;
pub mod migration;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use governance::LmdbGovernanceStore;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use meta::LmdbMetaStore;
