//! Router tests: requests go through the full axum stack via `oneshot`,
//! against an engine backed by the in-memory store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use liquid_governance::{BallotAction, GovernanceEngine, GovernanceParams, TallyResult};
use liquid_nullables::{NullClock, NullGovernanceStore};
use liquid_rpc::handlers::{
    BallotAck, BallotHistoryResponse, ProposalListResponse, ProposalResponse, TallyPreviewResponse,
    TallyResultResponse,
};
use liquid_rpc::{router, RequestObserver, RpcState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CountingObserver {
    created: AtomicU64,
    ballots: AtomicU64,
    finalized: AtomicU64,
    rejected: Mutex<Vec<&'static str>>,
}

impl RequestObserver for CountingObserver {
    fn proposal_created(&self) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    fn ballot_recorded(&self, _action: &BallotAction) {
        self.ballots.fetch_add(1, Ordering::SeqCst);
    }

    fn proposal_finalized(&self, _result: &TallyResult, _elapsed: Duration) {
        self.finalized.fetch_add(1, Ordering::SeqCst);
    }

    fn request_rejected(&self, kind: &'static str) {
        self.rejected.lock().unwrap().push(kind);
    }

    fn render(&self) -> Option<String> {
        Some(format!(
            "liquid_proposals_created_total {}\n",
            self.created.load(Ordering::SeqCst)
        ))
    }
}

fn app() -> (Router, Arc<CountingObserver>) {
    app_with_store(Arc::new(NullGovernanceStore::new()))
}

fn app_with_store(store: Arc<NullGovernanceStore>) -> (Router, Arc<CountingObserver>) {
    let engine = GovernanceEngine::new(
        store,
        Arc::new(NullClock::new(1_700_000_000)),
        GovernanceParams::default(),
    );
    let observer = Arc::new(CountingObserver::default());
    let state = RpcState::new(Arc::new(engine), 4, observer.clone());
    (router(state), observer)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn create(app: &Router, proposer: u32, statement: &str) -> String {
    let (status, body) = post(
        app,
        "/propose",
        json!({"proposer_id": proposer, "statement": statement}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_value::<ProposalResponse>(body).unwrap().id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn charter_flow_over_http() {
    let (app, observer) = app();
    let id = create(&app, 1, "Adopt charter").await;

    let (status, _) = post(&app, "/vote", json!({"proposal_id": id, "voter_id": 2, "is_yes": true})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post(
        &app,
        "/delegate",
        json!({"proposal_id": id, "voter_id": 3, "delegate_id": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ack: BallotAck = serde_json::from_value(body).unwrap();
    assert_eq!((ack.voter_id, ack.seq), (3, 2));
    let (status, _) = post(&app, "/vote", json!({"proposal_id": id, "voter_id": 4, "is_yes": false})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/finalize", json!({"proposal_id": id, "finalizer_id": 5})).await;
    assert_eq!(status, StatusCode::OK);
    let tally: TallyResultResponse = serde_json::from_value(body).unwrap();
    assert_eq!((tally.yes_count, tally.no_count), (2, 1));
    assert_eq!(tally.outcome, "passed");
    assert_eq!(tally.finalized_by, 5);

    assert_eq!(observer.created.load(Ordering::SeqCst), 1);
    assert_eq!(observer.ballots.load(Ordering::SeqCst), 3);
    assert_eq!(observer.finalized.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn delegator_id_alias_is_accepted() {
    let (app, _) = app();
    let id = create(&app, 1, "Adopt charter").await;

    let (status, _) = post(
        &app,
        "/delegate",
        json!({"proposal_id": id, "voter_id": 3, "delegator_id": 7}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, &format!("/proposals/{id}/ballots/3")).await;
    let history: BallotHistoryResponse = serde_json::from_value(body).unwrap();
    assert_eq!(history.history.len(), 1);
    assert_eq!(history.history[0].kind, "delegation");
    assert_eq!(history.history[0].delegate_id, Some(7));
}

#[tokio::test]
async fn errors_map_to_status_and_kind() {
    let (app, observer) = app();
    let id = create(&app, 1, "Adopt charter").await;

    let (status, body) = post(
        &app,
        "/delegate",
        json!({"proposal_id": id, "voter_id": 2, "delegate_id": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_delegation");

    let missing = "6f1c8a52-0c1e-4d3b-9a57-0c1b2d3e4f50";
    let (status, body) = post(&app, "/vote", json!({"proposal_id": missing, "voter_id": 2, "is_yes": true})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = post(&app, "/vote", json!({"proposal_id": "P1", "voter_id": 2, "is_yes": true})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = post(&app, "/vote", json!({"proposal_id": id})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    post(&app, "/finalize", json!({"proposal_id": id, "finalizer_id": 1})).await;
    let (status, body) = post(&app, "/finalize", json!({"proposal_id": id, "finalizer_id": 1})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_finalized");

    let (status, body) = post(&app, "/vote", json!({"proposal_id": id, "voter_id": 6, "is_yes": true})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "proposal_finalized");

    let rejected = observer.rejected.lock().unwrap().clone();
    assert_eq!(
        rejected,
        vec![
            "invalid_delegation",
            "not_found",
            "invalid_request",
            "invalid_request",
            "already_finalized",
            "proposal_finalized",
        ]
    );
}

#[tokio::test]
async fn listing_is_paginated_in_creation_order() {
    let (app, _) = app();
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(create(&app, 1, &format!("proposal {i}")).await);
    }

    let (_, body) = get(&app, "/").await;
    let all: ProposalListResponse = serde_json::from_value(body).unwrap();
    let listed: Vec<String> = all.proposals.into_iter().map(|p| p.id).collect();
    assert_eq!(listed, ids);
    assert!(all.pagination.cursor.is_none());

    let (_, body) = get(&app, "/proposals?count=2").await;
    let first: ProposalListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(first.proposals.len(), 2);
    let cursor = first.pagination.cursor.expect("more pages");

    let (_, body) = get(&app, &format!("/proposals?count=2&cursor={cursor}")).await;
    let second: ProposalListResponse = serde_json::from_value(body).unwrap();
    assert_eq!(second.proposals[0].id, ids[2]);

    let (status, body) = get(&app, "/proposals?cursor=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn proposal_and_tally_views() {
    let (app, _) = app();
    let id = create(&app, 1, "Adopt charter").await;
    post(&app, "/vote", json!({"proposal_id": id, "voter_id": 2, "is_yes": true})).await;

    let (status, body) = get(&app, &format!("/proposals/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let proposal: ProposalResponse = serde_json::from_value(body).unwrap();
    assert_eq!(proposal.status, "open");
    assert!(proposal.result.is_none());

    let (_, body) = get(&app, &format!("/proposals/{id}/tally")).await;
    let preview: TallyPreviewResponse = serde_json::from_value(body).unwrap();
    assert_eq!((preview.yes, preview.no, preview.abstain), (1, 0, 0));
    assert_eq!(preview.status, "open");

    post(&app, "/finalize", json!({"proposal_id": id, "finalizer_id": 1})).await;
    let (_, body) = get(&app, &format!("/proposals/{id}")).await;
    let proposal: ProposalResponse = serde_json::from_value(body).unwrap();
    assert_eq!(proposal.status, "finalized");
    assert_eq!(proposal.result.map(|r| r.yes_count), Some(1));
}

#[tokio::test]
async fn health_and_metrics() {
    let (app, _) = app();
    create(&app, 1, "Adopt charter").await;

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["proposals"], 1);

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_str()
        .unwrap()
        .contains("liquid_proposals_created_total 1"));
}

#[tokio::test]
async fn metrics_disabled_is_not_found() {
    let engine = GovernanceEngine::new(
        Arc::new(NullGovernanceStore::new()),
        Arc::new(NullClock::new(0)),
        GovernanceParams::default(),
    );
    let app = router(RpcState::without_metrics(Arc::new(engine), 2));

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "metrics_disabled");
}

#[tokio::test]
async fn reads_queue_behind_in_flight_finalize_without_blocking_runtime() {
    let store = Arc::new(NullGovernanceStore::new());
    let (app, _) = app_with_store(store.clone());
    let id = create(&app, 1, "Adopt charter").await;
    post(&app, "/vote", json!({"proposal_id": id, "voter_id": 2, "is_yes": true})).await;
    store.set_write_delay(Duration::from_millis(200));

    let finalize = tokio::spawn({
        let app = app.clone();
        let id = id.clone();
        async move { post(&app, "/finalize", json!({"proposal_id": id, "finalizer_id": 1})).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // On this single-threaded runtime the ticker only advances if the reads
    // below wait asynchronously instead of parking the thread.
    let ticks = Arc::new(AtomicU64::new(0));
    let ticker = tokio::spawn({
        let ticks = ticks.clone();
        async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let (status, body) = get(&app, &format!("/proposals/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let proposal: ProposalResponse = serde_json::from_value(body).unwrap();
    assert_eq!(proposal.status, "finalized");
    assert!(ticks.load(Ordering::SeqCst) > 0, "read blocked the runtime");

    let (status, body) = get(&app, &format!("/proposals/{id}/ballots/2")).await;
    assert_eq!(status, StatusCode::OK);
    let history: BallotHistoryResponse = serde_json::from_value(body).unwrap();
    assert_eq!(history.history.len(), 1);

    let (status, _) = finalize.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    ticker.abort();
}
