//! Request handlers and the JSON shapes they speak.

use std::str::FromStr;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use liquid_governance::{BallotAction, BallotRecord, Proposal, TallyPreview, TallyResult};
use liquid_types::{ParticipantId, ProposalId};

use crate::error::RpcError;
use crate::pagination::{paginate, PaginationMeta, PaginationParams};
use crate::server::RpcState;

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub proposer_id: u32,
    pub statement: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub proposal_id: String,
    pub voter_id: u32,
    pub is_yes: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DelegateRequest {
    pub proposal_id: String,
    pub voter_id: u32,
    /// Older clients send this as `delegator_id`.
    #[serde(alias = "delegator_id")]
    pub delegate_id: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub proposal_id: String,
    pub finalizer_id: u32,
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct TallyResultResponse {
    pub proposal_id: String,
    pub yes_count: u64,
    pub no_count: u64,
    pub abstain_count: u64,
    pub outcome: String,
    pub finalized_by: u32,
    pub finalized_at: u64,
}

impl From<&TallyResult> for TallyResultResponse {
    fn from(r: &TallyResult) -> Self {
        Self {
            proposal_id: r.proposal_id.to_string(),
            yes_count: r.yes_count,
            no_count: r.no_count,
            abstain_count: r.abstain_count,
            outcome: r.outcome.as_str().to_string(),
            finalized_by: r.finalized_by.get(),
            finalized_at: r.finalized_at.as_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub id: String,
    pub sequence: u64,
    pub proposer_id: u32,
    pub statement: String,
    pub status: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TallyResultResponse>,
}

impl From<&Proposal> for ProposalResponse {
    fn from(p: &Proposal) -> Self {
        Self {
            id: p.id.to_string(),
            sequence: p.sequence,
            proposer_id: p.proposer_id.get(),
            statement: p.statement.clone(),
            status: p.status.as_str().to_string(),
            created_at: p.created_at.as_secs(),
            result: p.result.as_ref().map(TallyResultResponse::from),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalListResponse {
    pub proposals: Vec<ProposalResponse>,
    #[serde(flatten)]
    pub pagination: PaginationMeta,
}

/// Acknowledgement of an accepted vote or delegation.
#[derive(Debug, Serialize, Deserialize)]
pub struct BallotAck {
    pub proposal_id: String,
    pub voter_id: u32,
    pub seq: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TallyPreviewResponse {
    pub proposal_id: String,
    pub status: String,
    pub yes: u64,
    pub no: u64,
    pub abstain: u64,
    pub outcome: String,
}

impl From<&TallyPreview> for TallyPreviewResponse {
    fn from(t: &TallyPreview) -> Self {
        Self {
            proposal_id: t.proposal_id.to_string(),
            status: t.status.as_str().to_string(),
            yes: t.counts.yes,
            no: t.counts.no,
            abstain: t.counts.abstain,
            outcome: t.outcome.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BallotEntry {
    pub seq: u64,
    /// `vote` or `delegation`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_yes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate_id: Option<u32>,
    pub recorded_at: u64,
}

impl From<&BallotRecord> for BallotEntry {
    fn from(record: &BallotRecord) -> Self {
        let (kind, is_yes, delegate_id) = match &record.action {
            BallotAction::DirectVote { is_yes, .. } => ("vote", Some(*is_yes), None),
            BallotAction::Delegation { delegate_id, .. } => {
                ("delegation", None, Some(delegate_id.get()))
            }
        };
        Self {
            seq: record.action.seq(),
            kind: kind.to_string(),
            is_yes,
            delegate_id,
            recorded_at: record.recorded_at.as_secs(),
        }
    }
}

/// A voter's audit trail; the last entry is the current action.
#[derive(Debug, Serialize, Deserialize)]
pub struct BallotHistoryResponse {
    pub proposal_id: String,
    pub voter_id: u32,
    pub history: Vec<BallotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub proposals: usize,
    pub uptime_secs: u64,
}

// ── Handlers ─────────────────────────────────────────────────────────────

fn parse_proposal_id(raw: &str) -> Result<ProposalId, RpcError> {
    ProposalId::from_str(raw.trim()).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

pub async fn list_proposals(
    State(state): State<RpcState>,
    query: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<ProposalListResponse>, RpcError> {
    let Query(params) = query?;
    let engine = state.engine.clone();
    let proposals = state.executor.run(None, move || engine.list_proposals()).await?;
    let (page, pagination) =
        paginate(proposals, |p| p.sequence, &params).map_err(RpcError::InvalidRequest)?;
    Ok(Json(ProposalListResponse {
        proposals: page.iter().map(ProposalResponse::from).collect(),
        pagination,
    }))
}

pub async fn propose(
    State(state): State<RpcState>,
    payload: Result<Json<ProposeRequest>, JsonRejection>,
) -> Result<Json<ProposalResponse>, RpcError> {
    let Json(req) = payload?;
    let engine = state.engine.clone();
    let proposal = state
        .executor
        .run(None, move || {
            engine.propose(ParticipantId::new(req.proposer_id), req.statement)
        })
        .await??;
    state.observer.proposal_created();
    Ok(Json(ProposalResponse::from(&proposal)))
}

pub async fn vote(
    State(state): State<RpcState>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<BallotAck>, RpcError> {
    let Json(req) = payload?;
    let id = parse_proposal_id(&req.proposal_id)?;
    let engine = state.engine.clone();
    let action = state
        .executor
        .run(Some(id), move || {
            engine.vote(&id, ParticipantId::new(req.voter_id), req.is_yes)
        })
        .await??;
    state.observer.ballot_recorded(&action);
    Ok(Json(ack(&id, &action)))
}

pub async fn delegate(
    State(state): State<RpcState>,
    payload: Result<Json<DelegateRequest>, JsonRejection>,
) -> Result<Json<BallotAck>, RpcError> {
    let Json(req) = payload?;
    let id = parse_proposal_id(&req.proposal_id)?;
    let engine = state.engine.clone();
    let action = state
        .executor
        .run(Some(id), move || {
            engine.delegate(
                &id,
                ParticipantId::new(req.voter_id),
                ParticipantId::new(req.delegate_id),
            )
        })
        .await??;
    state.observer.ballot_recorded(&action);
    Ok(Json(ack(&id, &action)))
}

pub async fn finalize(
    State(state): State<RpcState>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<TallyResultResponse>, RpcError> {
    let Json(req) = payload?;
    let id = parse_proposal_id(&req.proposal_id)?;
    let engine = state.engine.clone();
    let started = Instant::now();
    let tally = state
        .executor
        .run(Some(id), move || {
            engine.finalize(&id, ParticipantId::new(req.finalizer_id))
        })
        .await??;
    state.observer.proposal_finalized(&tally, started.elapsed());
    Ok(Json(TallyResultResponse::from(&tally)))
}

pub async fn get_proposal(
    State(state): State<RpcState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ProposalResponse>, RpcError> {
    let Path(raw) = path?;
    let id = parse_proposal_id(&raw)?;
    let engine = state.engine.clone();
    let proposal = state
        .executor
        .run(Some(id), move || engine.get_proposal(&id))
        .await??;
    Ok(Json(ProposalResponse::from(&proposal)))
}

pub async fn tally_preview(
    State(state): State<RpcState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<TallyPreviewResponse>, RpcError> {
    let Path(raw) = path?;
    let id = parse_proposal_id(&raw)?;
    let engine = state.engine.clone();
    let preview = state
        .executor
        .run(Some(id), move || engine.preview(&id))
        .await??;
    Ok(Json(TallyPreviewResponse::from(&preview)))
}

pub async fn ballot_history(
    State(state): State<RpcState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Result<Json<BallotHistoryResponse>, RpcError> {
    let Path((raw, voter_id)) = path?;
    let id = parse_proposal_id(&raw)?;
    let engine = state.engine.clone();
    let history = state
        .executor
        .run(Some(id), move || {
            engine.ballot_history(&id, ParticipantId::new(voter_id))
        })
        .await??;
    Ok(Json(BallotHistoryResponse {
        proposal_id: id.to_string(),
        voter_id,
        history: history.iter().map(BallotEntry::from).collect(),
    }))
}

pub async fn health(State(state): State<RpcState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        proposals: state.engine.proposal_count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn metrics(State(state): State<RpcState>) -> Result<String, RpcError> {
    state.observer.render().ok_or(RpcError::MetricsDisabled)
}

fn ack(id: &ProposalId, action: &BallotAction) -> BallotAck {
    BallotAck {
        proposal_id: id.to_string(),
        voter_id: action.voter_id().get(),
        seq: action.seq(),
    }
}
