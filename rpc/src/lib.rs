//! HTTP gateway for the liquid-democracy engine.
//!
//! Endpoints:
//! - `POST /propose`, `/vote`, `/delegate`, `/finalize`
//! - `GET /` and `/proposals`: paginated listing in creation order
//! - `GET /proposals/:id`, `/proposals/:id/tally`,
//!   `/proposals/:id/ballots/:voter_id`
//! - `GET /health`, `/metrics`
//!
//! Errors are JSON bodies of the form `{"error": kind, "message": text}`.

pub mod error;
pub mod executor;
pub mod handlers;
pub mod observer;
pub mod pagination;
pub mod server;

pub use error::RpcError;
pub use executor::ProposalExecutor;
pub use observer::{NoopObserver, RequestObserver};
pub use server::{router, RpcServer, RpcState};
