//! Prometheus metrics for the node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] and plugs into the RPC layer
//! as its [`RequestObserver`], so the `/metrics` endpoint renders this
//! registry in the Prometheus text exposition format.

use std::time::Duration;

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use liquid_governance::{BallotAction, TallyResult};
use liquid_rpc::RequestObserver;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub proposals_created: IntCounter,
    pub votes_cast: IntCounter,
    pub delegations_cast: IntCounter,
    /// Finalized proposals, labelled by outcome.
    pub proposals_finalized: IntCounterVec,
    /// Rejected requests, labelled by error kind.
    pub requests_rejected: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub open_proposals: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of a finalize call, including resolution and the commit.
    pub finalize_duration_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics registered under a new [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let proposals_created = register_int_counter_with_registry!(
            Opts::new("liquid_proposals_created_total", "Total proposals created"),
            registry
        )?;

        let votes_cast = register_int_counter_with_registry!(
            Opts::new("liquid_votes_total", "Total direct votes recorded"),
            registry
        )?;

        let delegations_cast = register_int_counter_with_registry!(
            Opts::new("liquid_delegations_total", "Total delegations recorded"),
            registry
        )?;

        let proposals_finalized = register_int_counter_vec_with_registry!(
            Opts::new(
                "liquid_proposals_finalized_total",
                "Total proposals finalized, by outcome"
            ),
            &["outcome"],
            registry
        )?;

        let requests_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "liquid_requests_rejected_total",
                "Total rejected requests, by error kind"
            ),
            &["kind"],
            registry
        )?;

        let open_proposals = register_int_gauge_with_registry!(
            Opts::new("liquid_open_proposals", "Proposals still accepting ballots"),
            registry
        )?;

        // 0.1 ms to ~1.6 s.
        let finalize_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "liquid_finalize_duration_ms",
                "Finalize latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.1, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            proposals_created,
            votes_cast,
            delegations_cast,
            proposals_finalized,
            requests_rejected,
            open_proposals,
            finalize_duration_ms,
        })
    }

    /// Encode every metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl RequestObserver for NodeMetrics {
    fn proposal_created(&self) {
        self.proposals_created.inc();
        self.open_proposals.inc();
    }

    fn ballot_recorded(&self, action: &BallotAction) {
        match action {
            BallotAction::DirectVote { .. } => self.votes_cast.inc(),
            BallotAction::Delegation { .. } => self.delegations_cast.inc(),
        }
    }

    fn proposal_finalized(&self, result: &TallyResult, elapsed: Duration) {
        self.proposals_finalized
            .with_label_values(&[result.outcome.as_str()])
            .inc();
        self.open_proposals.dec();
        self.finalize_duration_ms
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    fn request_rejected(&self, kind: &'static str) {
        self.requests_rejected.with_label_values(&[kind]).inc();
    }

    fn open_proposals(&self, count: usize) {
        self.open_proposals.set(count as i64);
    }

    fn render(&self) -> Option<String> {
        match self.encode() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode metrics");
                None
            }
        }
    }
}
