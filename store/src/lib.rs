//! Abstract storage traits for the liquid-democracy engine.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The governance core depends only on the traits, and only on the
//! durability contract they describe: a call that returns `Ok` has been
//! made durable.

pub mod error;
pub mod governance;
pub mod meta;

pub use error::StoreError;
pub use governance::GovernanceStore;
pub use meta::MetaStore;
