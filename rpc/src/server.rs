//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use liquid_governance::GovernanceEngine;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::{RejectedKind, RpcError};
use crate::executor::ProposalExecutor;
use crate::handlers;
use crate::observer::{NoopObserver, RequestObserver};

/// State shared by every handler.
#[derive(Clone)]
pub struct RpcState {
    pub engine: Arc<GovernanceEngine>,
    pub executor: Arc<ProposalExecutor>,
    pub observer: Arc<dyn RequestObserver>,
    pub started_at: Instant,
}

impl RpcState {
    pub fn new(
        engine: Arc<GovernanceEngine>,
        max_concurrent: usize,
        observer: Arc<dyn RequestObserver>,
    ) -> Self {
        Self {
            engine,
            executor: Arc::new(ProposalExecutor::new(max_concurrent)),
            observer,
            started_at: Instant::now(),
        }
    }

    /// State with no metrics attached.
    pub fn without_metrics(engine: Arc<GovernanceEngine>, max_concurrent: usize) -> Self {
        Self::new(engine, max_concurrent, Arc::new(NoopObserver))
    }
}

/// Build the router. `/` lists proposals, as older clients expect.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/", get(handlers::list_proposals))
        .route("/proposals", get(handlers::list_proposals))
        .route("/proposals/:id", get(handlers::get_proposal))
        .route("/proposals/:id/tally", get(handlers::tally_preview))
        .route(
            "/proposals/:id/ballots/:voter_id",
            get(handlers::ballot_history),
        )
        .route("/propose", post(handlers::propose))
        .route("/vote", post(handlers::vote))
        .route("/delegate", post(handlers::delegate))
        .route("/finalize", post(handlers::finalize))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            count_rejections,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn count_rejections(State(state): State<RpcState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if let Some(RejectedKind(kind)) = response.extensions().get::<RejectedKind>() {
        state.observer.request_rejected(kind);
    }
    response
}

pub struct RpcServer {
    addr: SocketAddr,
    state: RpcState,
}

impl RpcServer {
    pub fn new(addr: SocketAddr, state: RpcState) -> Self {
        Self { addr, state }
    }

    /// Bind the listening socket.
    pub async fn bind(&self) -> Result<TcpListener, RpcError> {
        Ok(TcpListener::bind(self.addr).await?)
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests and stop admitting engine work.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "RPC server listening");

        let executor = self.state.executor.clone();
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;
        executor.close();

        tracing::info!("RPC server stopped");
        Ok(())
    }

    /// Bind and serve.
    pub async fn start(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}
