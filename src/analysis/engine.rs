//! Worker runtime for analysis, daemon queries and builds.
//!
//! The engine owns the tokio runtime the control thread must never block
//! on. Everything it spawns reports back through the async bridge; nothing
//! returns results directly. A semaphore caps how many analyses run at
//! once so a burst of dispatches across many files degrades to queueing,
//! not thread starvation.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;

use crate::analysis::client::{AnalysisClient, AnalyzeRequest};
use crate::analysis::controller::{DispatchKind, DispatchPlan};
use crate::project::build;
use crate::project::daemon::{DaemonClient, DaemonError, TargetInfo};
use crate::services::async_bridge::{AsyncMessage, AsyncSender};

pub struct AnalysisEngine {
    runtime: Runtime,
    client: Arc<dyn AnalysisClient>,
    permits: Arc<Semaphore>,
    tx: AsyncSender,
}

impl AnalysisEngine {
    /// Build the runtime. `max_workers` caps concurrent analyses and sizes
    /// the thread pool; subprocess and daemon I/O ride the same runtime.
    pub fn new(
        client: Arc<dyn AnalysisClient>,
        max_workers: usize,
        tx: AsyncSender,
    ) -> std::io::Result<Self> {
        let workers = max_workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("limn-worker")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            client,
            permits: Arc::new(Semaphore::new(workers)),
            tx,
        })
    }

    /// Start one analysis run. The completion arrives on the bridge as
    /// `AnalysisFinished` carrying the dispatch generation.
    pub fn dispatch(&self, request: AnalyzeRequest, plan: DispatchPlan) {
        let client = Arc::clone(&self.client);
        let permits = Arc::clone(&self.permits);
        let tx = self.tx.clone();
        let path = request.path.clone();
        let generation = plan.generation;

        self.runtime.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                // Semaphore closes only at shutdown.
                Err(_) => return,
            };
            let result = match plan.kind {
                DispatchKind::Full => client.analyze(request).await,
                DispatchKind::Incremental(prior) => client.reanalyze(request, prior).await,
            };
            let _ = tx.send(AsyncMessage::AnalysisFinished {
                path,
                generation,
                result,
            });
        });
    }

    /// Ask the daemon for the target list; reply arrives as `TargetList`.
    pub fn fetch_target_list(&self, command: String, args: Vec<String>) {
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = query_target_list(&command, &args).await;
            let _ = tx.send(AsyncMessage::TargetList(result));
        });
    }

    /// Ask the daemon for one target's metadata; reply arrives as
    /// `TargetInfo`.
    pub fn fetch_target_info(&self, command: String, args: Vec<String>, name: String) {
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = query_target_info(&command, &args, &name).await;
            let _ = tx.send(AsyncMessage::TargetInfo(result));
        });
    }

    /// Run a build subprocess; its lifecycle streams in as `Build` events.
    pub fn start_build(&self, argv: Vec<String>, directory: PathBuf) {
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let (build_tx, mut build_rx) = mpsc::unbounded_channel();
            let forward = tokio::spawn(async move {
                while let Some(event) = build_rx.recv().await {
                    if tx.send(AsyncMessage::Build(event)).is_err() {
                        break;
                    }
                }
            });
            // Spawn failures already surface as a Failed event in the sink.
            let _ = build::run(&argv, &directory, build_tx).await;
            let _ = forward.await;
        });
    }
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

async fn query_target_list(command: &str, args: &[String]) -> Result<Vec<String>, DaemonError> {
    match DaemonClient::spawn(command, args)? {
        Some(mut client) => client.target_list().await,
        None => Err(DaemonError::Unavailable),
    }
}

async fn query_target_info(
    command: &str,
    args: &[String],
    name: &str,
) -> Result<TargetInfo, DaemonError> {
    match DaemonClient::spawn(command, args)? {
        Some(mut client) => client.target_info(name).await,
        None => Err(DaemonError::Unavailable),
    }
}
