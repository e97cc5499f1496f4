//! Background Analysis Pipeline
//!
//! This module implements the editing-while-analyzing pipeline: edits are
//! debounced per file, at most one analysis runs per file at a time, and
//! finished snapshots are swapped in on the control thread while a line map
//! keeps stale annotations attached to the lines they came from.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │                        Control thread (Workspace)                      │
//! │                                                                        │
//! │  ┌──────────────────────────────┐   ┌─────────────────────────────┐    │
//! │  │  EditorSession (per file)    │   │  AnnotationProjector        │    │
//! │  │  - Buffer (live text)        │──▶│  - line overlays            │    │
//! │  │  - LineMap (line identity)   │   │  - goto definition          │    │
//! │  │  - ReanalysisController      │   │  - completions              │    │
//! │  └──────────────┬───────────────┘   └─────────────────────────────┘    │
//! │                 │ note_edit / poll / complete                          │
//! │                 ▼                                                      │
//! │  ┌──────────────────────────────┐                                      │
//! │  │  ReanalysisController        │  Idle → Debouncing → Analyzing       │
//! │  │  (pure state machine,        │           ▲              │           │
//! │  │   one per open file)         │           └── pending ◀──┘           │
//! │  └──────────────┬───────────────┘                                      │
//! └─────────────────┼──────────────────────────────────────────────────────┘
//!                   │ DispatchPlan { generation, Full | Incremental }
//!                   ▼
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │                     AnalysisEngine (tokio runtime)                     │
//! │                                                                        │
//! │  - semaphore caps concurrent analyses across all files                 │
//! │  - each task runs AnalysisClient::analyze / reanalyze                  │
//! │  - request carries point-in-time copies: text, compile context,        │
//! │    open-file set                                                       │
//! └─────────────────┬──────────────────────────────────────────────────────┘
//!                   │ AsyncMessage::AnalysisFinished { path, generation }
//!                   ▼
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │                         AsyncBridge (channel)                          │
//! │   drained on the control thread; stale generations are discarded,      │
//! │   matching ones promote staged → committed and the LineMap with them   │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! - **`controller`**: [`ReanalysisController`] - Per-file debounce and
//!   single-flight state machine. Pure and synchronous; the caller feeds it
//!   instants and routes its `DispatchPlan`s to the engine.
//!
//! - **`engine`**: [`AnalysisEngine`] - Owns the tokio runtime and a
//!   semaphore bounding concurrent background work. Also runs build daemon
//!   queries and build subprocesses, reporting everything through the
//!   [`AsyncBridge`](crate::services::async_bridge::AsyncBridge).
//!
//! - **`client`**: [`AnalysisClient`] - The seam to the actual analyzer.
//!   `analyze` builds a snapshot from scratch; `reanalyze` may reuse a prior
//!   snapshot and defaults to a plain `analyze`.
//!
//! - **`snapshot`**: [`AnalysisSnapshot`] - Immutable analysis result:
//!   per-line annotations plus a symbol index. Shared by `Arc`, never
//!   mutated after construction.
//!
//! - **`projector`**: [`AnnotationProjector`] - Projects a committed
//!   snapshot onto live buffer lines through the
//!   [`LineMap`](crate::model::line_map::LineMap), and answers cursor
//!   queries (definition, completions).
//!
//! - **`token_index`**: [`TokenIndexClient`] - The built-in lexical
//!   analyzer: classifies tokens, indexes identifier definitions across the
//!   open-file set, and feeds the completion pool.
//!
//! # Result Flow
//!
//! 1. An edit mutates `Buffer` and `LineMap`, then calls
//!    `ReanalysisController::note_edit`, restarting the quiet window
//! 2. Once the window elapses, `poll` returns a `DispatchPlan` and the
//!    workspace captures the file text, compile context, and open-file set
//! 3. The engine runs the client on a worker task; the control thread is
//!    never blocked
//! 4. Completion arrives through the bridge tagged with its generation;
//!    the controller discards stale ones and otherwise swaps the staged
//!    snapshot in; the workspace promotes the staged line map in the same
//!    step
//! 5. Edits made while analyzing re-arm the window at completion, so the
//!    next run starts without further input
//!
//! # Error Handling
//!
//! - **Analysis failure**: Committed snapshot and overlays stay; failure is
//!   logged and the next run is forced to be a full analysis
//! - **No compile context**: The file opens fine; analysis is skipped and
//!   code intelligence stays off until a context appears
//! - **Closed files**: In-flight results for files no longer open are
//!   dropped, logged once per session

pub mod client;
pub mod controller;
pub mod engine;
pub mod projector;
pub mod snapshot;
pub mod token_index;

pub use client::{AnalysisClient, AnalysisError, AnalyzeRequest, OpenFileSet};
pub use controller::{DispatchKind, DispatchPlan, Phase, ReanalysisController, SwapOutcome};
pub use engine::AnalysisEngine;
pub use projector::{AnnotationProjector, Cursor, HighlightStyles, NoDefinition, StyledSpan};
pub use snapshot::{AnalysisSnapshot, Annotation, AnnotationKind, Completion, Location};
pub use token_index::TokenIndexClient;
