//! The node: opens storage, replays the engine and serves it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use liquid_governance::GovernanceEngine;
use liquid_rpc::{NoopObserver, RequestObserver, RpcServer, RpcState};
use liquid_store::GovernanceStore;
use liquid_store_lmdb::environment::DEFAULT_MAX_DBS;
use liquid_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use liquid_types::SystemClock;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;

/// How long [`LiquidNode::stop`] waits for in-flight requests to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LiquidNode {
    pub config: NodeConfig,
    pub engine: Arc<GovernanceEngine>,
    pub metrics: Option<Arc<NodeMetrics>>,
    pub shutdown: Arc<ShutdownController>,
    /// Keeps the memory map open for the node's lifetime.
    _environment: LmdbEnvironment,
    rpc_addr: Option<SocketAddr>,
    task_handles: Vec<JoinHandle<()>>,
}

impl LiquidNode {
    /// Open the data directory, verify it and replay every stored proposal.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        check_data_dir(&config.data_dir).map_err(NodeError::Integrity)?;
        let environment =
            LmdbEnvironment::open(&config.data_dir, DEFAULT_MAX_DBS, config.lmdb_map_size)?;

        let report = check_integrity(environment.env())?;
        if !report.is_healthy() {
            for error in &report.errors {
                tracing::error!(%error, "integrity check");
            }
            return Err(NodeError::Integrity(report.errors.join("; ")));
        }
        tracing::info!(
            databases = report.databases_checked(),
            entries = report.total_entries(),
            "integrity check passed"
        );

        let store: Arc<dyn GovernanceStore> = Arc::new(environment.governance_store());
        let engine = GovernanceEngine::recover(
            store,
            Arc::new(SystemClock),
            config.governance_params(),
        )?;
        let engine = Arc::new(engine);

        let metrics = if config.enable_metrics {
            let metrics = NodeMetrics::new()?;
            metrics.open_proposals(engine.open_count());
            Some(Arc::new(metrics))
        } else {
            None
        };

        tracing::info!(
            data_dir = %config.data_dir.display(),
            proposals = engine.proposal_count(),
            open = engine.open_count(),
            finalize_policy = config.finalize_policy.as_str(),
            "node initialised"
        );

        Ok(Self {
            config,
            engine,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            _environment: environment,
            rpc_addr: None,
            task_handles: Vec::new(),
        })
    }

    /// Start the HTTP server if enabled. Returns once the socket is bound.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        tracing::info!("node starting");

        if self.config.enable_rpc {
            let observer: Arc<dyn RequestObserver> = match &self.metrics {
                Some(metrics) => Arc::clone(metrics) as Arc<dyn RequestObserver>,
                None => Arc::new(NoopObserver),
            };
            let state = RpcState::new(
                Arc::clone(&self.engine),
                self.config.max_concurrent,
                observer,
            );

            let server = RpcServer::new(self.config.rpc_addr()?, state);
            let listener = server.bind().await?;
            self.rpc_addr = Some(listener.local_addr()?);

            let shutdown = self.shutdown.signal();
            let rpc_handle = tokio::spawn(async move {
                match server.serve(listener, shutdown).await {
                    Ok(()) => tracing::info!("RPC server exited"),
                    Err(e) => tracing::error!("RPC server error: {e}"),
                }
            });
            self.task_handles.push(rpc_handle);
        } else {
            tracing::info!("RPC disabled");
        }

        Ok(())
    }

    /// Signal every task and wait for them to finish.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!("task ended abnormally: {e}");
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "shutdown timeout ({:?}), requests may still be in flight",
                SHUTDOWN_TIMEOUT
            );
            return Err(NodeError::ShutdownTimeout);
        }

        self.rpc_addr = None;
        tracing::info!("node stopped");
        Ok(())
    }

    pub fn engine(&self) -> &Arc<GovernanceEngine> {
        &self.engine
    }

    /// Address the HTTP server is bound to, once started.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }
}
