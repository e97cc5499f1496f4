//! Channel bridge between the worker runtime and the control thread.
//!
//! Background tasks (analysis workers, daemon queries, build pumps) finish
//! on the tokio runtime; their results must reach the thread that owns the
//! sessions. They send `AsyncMessage`s through an unbounded channel, and
//! the control thread drains it with `try_recv` on every pump, so nothing
//! here ever blocks and no result is applied off-thread.

use std::path::PathBuf;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::analysis::client::AnalysisError;
use crate::analysis::snapshot::AnalysisSnapshot;
use crate::project::build::BuildEvent;
use crate::project::daemon::{DaemonError, TargetInfo};

/// Everything that can arrive from the background.
#[derive(Debug)]
pub enum AsyncMessage {
    /// An analysis run finished. `generation` is the dispatch counter value
    /// the run was started with; the controller uses it to pair completions
    /// with dispatches.
    AnalysisFinished {
        path: PathBuf,
        generation: u64,
        result: Result<AnalysisSnapshot, AnalysisError>,
    },
    /// Reply to a target-list query.
    TargetList(Result<Vec<String>, DaemonError>),
    /// Reply to a target-info query.
    TargetInfo(Result<TargetInfo, DaemonError>),
    /// Progress of the running build subprocess.
    Build(BuildEvent),
}

/// Sender half handed to background tasks.
pub type AsyncSender = UnboundedSender<AsyncMessage>;

/// Owning end of the bridge, held by the control thread.
#[derive(Debug)]
pub struct AsyncBridge {
    tx: AsyncSender,
    rx: UnboundedReceiver<AsyncMessage>,
}

impl AsyncBridge {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Clone a sender for a background task.
    pub fn sender(&self) -> AsyncSender {
        self.tx.clone()
    }

    /// Non-blocking receive; `None` when nothing is pending.
    pub fn try_recv(&mut self) -> Option<AsyncMessage> {
        self.rx.try_recv().ok()
    }
}

impl Default for AsyncBridge {
    fn default() -> Self {
        Self::new()
    }
}
