//! RPC error types and their HTTP mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use liquid_governance::GovernanceError;
use thiserror::Error;

use crate::executor::ExecutorError;

/// Marks an error response with its kind so middleware can count it.
#[derive(Clone, Copy, Debug)]
pub struct RejectedKind(pub &'static str);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics are disabled on this node")]
    MetricsDisabled,

    #[error("server error: {0}")]
    Server(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Stable machine-readable name, used as the `error` field of the body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Governance(e) => e.kind(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::MetricsDisabled => "metrics_disabled",
            Self::Server(_) | Self::Io(_) => "server",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Governance(e) => match e {
                GovernanceError::NotFound(_) => StatusCode::NOT_FOUND,
                GovernanceError::ProposalFinalized(_) | GovernanceError::AlreadyFinalized(_) => {
                    StatusCode::CONFLICT
                }
                GovernanceError::InvalidDelegation(_)
                | GovernanceError::NotProposer { .. }
                | GovernanceError::InvalidStatement(_) => StatusCode::BAD_REQUEST,
                GovernanceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MetricsDisabled => StatusCode::NOT_FOUND,
            Self::Server(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(kind, error = %self, "request rejected");
        }
        let body = serde_json::json!({
            "error": kind,
            "message": self.to_string(),
        });
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(RejectedKind(kind));
        response
    }
}

impl From<JsonRejection> for RpcError {
    fn from(rejection: JsonRejection) -> Self {
        RpcError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for RpcError {
    fn from(rejection: PathRejection) -> Self {
        RpcError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for RpcError {
    fn from(rejection: QueryRejection) -> Self {
        RpcError::InvalidRequest(rejection.body_text())
    }
}

impl From<ExecutorError> for RpcError {
    fn from(e: ExecutorError) -> Self {
        RpcError::Server(e.to_string())
    }
}
