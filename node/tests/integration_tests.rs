//! Integration tests running a real node: LMDB in a temp dir, the HTTP server
//! on an ephemeral port, requests over `reqwest`.

use std::path::Path;

use serde_json::{json, Value};

use liquid_governance::{FinalizePolicy, ProposalStatus};
use liquid_node::{LiquidNode, NodeConfig, NodeError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config(dir: &Path) -> NodeConfig {
    NodeConfig {
        data_dir: dir.to_path_buf(),
        rpc_port: 0,
        enable_metrics: true,
        lmdb_map_size: 64 * 1024 * 1024,
        ..NodeConfig::default()
    }
}

async fn started(config: NodeConfig) -> (LiquidNode, String) {
    let mut node = LiquidNode::new(config).expect("node");
    node.start().await.expect("start");
    let addr = node.rpc_addr().expect("rpc bound");
    (node, format!("http://{addr}"))
}

async fn post(client: &reqwest::Client, url: &str, body: Value) -> (u16, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn serves_the_charter_flow_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let (mut node, base) = started(config(dir.path())).await;
    let client = reqwest::Client::new();

    let (status, proposal) = post(
        &client,
        &format!("{base}/propose"),
        json!({"proposer_id": 1, "statement": "Adopt charter"}),
    )
    .await;
    assert_eq!(status, 200);
    let id = proposal["id"].as_str().unwrap().to_string();

    post(&client, &format!("{base}/vote"), json!({"proposal_id": id, "voter_id": 2, "is_yes": true})).await;
    post(&client, &format!("{base}/delegate"), json!({"proposal_id": id, "voter_id": 3, "delegate_id": 2})).await;
    post(&client, &format!("{base}/vote"), json!({"proposal_id": id, "voter_id": 4, "is_yes": false})).await;

    let (status, tally) = post(
        &client,
        &format!("{base}/finalize"),
        json!({"proposal_id": id, "finalizer_id": 1}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(tally["yes_count"], 2);
    assert_eq!(tally["no_count"], 1);
    assert_eq!(tally["outcome"], "passed");

    let (status, body) = post(
        &client,
        &format!("{base}/finalize"),
        json!({"proposal_id": id, "finalizer_id": 1}),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "already_finalized");

    let metrics = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("liquid_proposals_created_total 1"));
    assert!(metrics.contains("liquid_votes_total 2"));
    assert!(metrics.contains("liquid_delegations_total 1"));
    assert!(metrics.contains(r#"liquid_proposals_finalized_total{outcome="passed"} 1"#));
    assert!(metrics.contains(r#"liquid_requests_rejected_total{kind="already_finalized"} 1"#));
    assert!(metrics.contains("liquid_open_proposals 0"));

    node.stop().await.unwrap();
    assert!(node.rpc_addr().is_none());
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let (open_id, closed_id) = {
        let mut node = LiquidNode::new(config(dir.path())).unwrap();
        let engine = node.engine().clone();
        let closed = engine.propose(1u32.into(), "Close me").unwrap();
        let open = engine.propose(1u32.into(), "Keep me open").unwrap();
        engine.vote(&closed.id, 2u32.into(), true).unwrap();
        engine.delegate(&open.id, 3u32.into(), 2u32.into()).unwrap();
        engine.finalize(&closed.id, 1u32.into()).unwrap();
        node.stop().await.unwrap();
        (open.id, closed.id)
    };

    let (mut node, base) = started(config(dir.path())).await;
    let engine = node.engine().clone();
    assert_eq!(engine.proposal_count(), 2);
    assert_eq!(engine.open_count(), 1);
    assert_eq!(
        engine.get_proposal(&closed_id).unwrap().status,
        ProposalStatus::Finalized
    );

    let client = reqwest::Client::new();
    let listing: Value = client
        .get(format!("{base}/proposals"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = listing["proposals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![closed_id.to_string(), open_id.to_string()]);

    let metrics = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("liquid_open_proposals 1"));

    // The replayed delegation still points at voter 2.
    let (status, _) = post(
        &client,
        &format!("{base}/vote"),
        json!({"proposal_id": open_id.to_string(), "voter_id": 2, "is_yes": false}),
    )
    .await;
    assert_eq!(status, 200);
    let tally = engine.preview(&open_id).unwrap();
    assert_eq!((tally.counts.yes, tally.counts.no), (0, 2));

    node.stop().await.unwrap();
}

#[tokio::test]
async fn proposer_only_policy_is_applied_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        finalize_policy: FinalizePolicy::ProposerOnly,
        ..config(dir.path())
    };
    let (mut node, base) = started(config).await;
    let client = reqwest::Client::new();

    let (_, proposal) = post(
        &client,
        &format!("{base}/propose"),
        json!({"proposer_id": 1, "statement": "Adopt charter"}),
    )
    .await;
    let id = proposal["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &client,
        &format!("{base}/finalize"),
        json!({"proposal_id": id, "finalizer_id": 9}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "not_proposer");

    let (status, _) = post(
        &client,
        &format!("{base}/finalize"),
        json!({"proposal_id": id, "finalizer_id": 1}),
    )
    .await;
    assert_eq!(status, 200);

    node.stop().await.unwrap();
}

#[tokio::test]
async fn rpc_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        enable_rpc: false,
        enable_metrics: false,
        ..config(dir.path())
    };
    let mut node = LiquidNode::new(config).unwrap();
    node.start().await.unwrap();
    assert!(node.rpc_addr().is_none());
    assert!(node.metrics.is_none());
    node.stop().await.unwrap();
}

#[test]
fn foreign_data_dir_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("something-else.db"), b"not lmdb").unwrap();
    let result = LiquidNode::new(config(dir.path()));
    assert!(matches!(result, Err(NodeError::Integrity(_))));
}
