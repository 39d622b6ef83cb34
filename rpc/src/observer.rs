//! Hooks the gateway calls as requests complete.
//!
//! The node plugs its Prometheus metrics in here; tests and embedders that
//! don't care use [`NoopObserver`].

use std::time::Duration;

use liquid_governance::{BallotAction, TallyResult};

pub trait RequestObserver: Send + Sync {
    fn proposal_created(&self) {}

    fn ballot_recorded(&self, _action: &BallotAction) {}

    fn proposal_finalized(&self, _result: &TallyResult, _elapsed: Duration) {}

    /// A request was answered with an error of this kind.
    fn request_rejected(&self, _kind: &'static str) {}

    fn open_proposals(&self, _count: usize) {}

    /// Prometheus text exposition, or `None` when metrics are off.
    fn render(&self) -> Option<String> {
        None
    }
}

pub struct NoopObserver;

impl RequestObserver for NoopObserver {}
