//! Per-file reanalysis state machine.
//!
//! One controller per open file decides *when* to analyze and *what to do*
//! with results, without touching threads or channels itself. The owner
//! feeds it edits and completions and polls it for due dispatches, which
//! keeps every transition on the control thread and makes the whole
//! machine testable with a hand-driven clock.
//!
//! ```text
//!                 edit                    quiet timer expires
//!   ┌──────┐  ───────────►  ┌────────────┐  ─────────────────►  ┌───────────┐
//!   │ Idle │                │ Debouncing │                      │ Analyzing │
//!   └──────┘  ◄───────────  └────────────┘  ◄───┐               └───────────┘
//!      ▲       completion,        ▲             │ completion,      │
//!      │       no pending edit    │ re-arm      │ pending edit     │ edit
//!      │                          │             │                  ▼
//!      │                          │    ┌─────────────────────────────┐
//!      └──────────────────────────┴─── │ AnalyzingWithPendingEdit    │
//!                                      └─────────────────────────────┘
//! ```
//!
//! Invariants: at most one dispatch is outstanding per controller; every
//! edit while one is outstanding collapses into a single follow-up run; a
//! failed run never disturbs the committed snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::client::AnalysisError;
use crate::analysis::snapshot::AnalysisSnapshot;

/// Generations are unique across every controller in the process. A file
/// closed and reopened gets a fresh controller; results from the old one
/// must never pair with the new one's dispatches.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Where the controller is in its edit/analyze cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No unanalyzed edits, no run in flight.
    Idle,
    /// Edits seen; waiting for the quiet window to elapse.
    Debouncing,
    /// A run is in flight and nothing changed since it was dispatched.
    Analyzing,
    /// A run is in flight and the buffer has changed since; a follow-up
    /// cycle starts as soon as this run completes.
    AnalyzingWithPendingEdit,
}

/// Whether the next run starts fresh or continues from a prior snapshot.
#[derive(Debug, Clone)]
pub enum DispatchKind {
    Full,
    Incremental(Arc<AnalysisSnapshot>),
}

/// A due dispatch handed to the owner, which captures inputs and spawns
/// the worker.
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub generation: u64,
    pub kind: DispatchKind,
}

/// What a completion did to the controller's snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The result is now the committed snapshot; promote the line map.
    Swapped,
    /// The run failed; result discarded, committed kept, next run full.
    DiscardedFailure,
    /// The completion does not match the outstanding dispatch; ignore it.
    Stale,
}

#[derive(Debug)]
pub struct ReanalysisController {
    phase: Phase,
    committed: Option<Arc<AnalysisSnapshot>>,
    staged: Option<Arc<AnalysisSnapshot>>,
    last_edit_at: Option<Instant>,
    /// Generation of the outstanding (or most recent) dispatch.
    generation: u64,
    force_full: bool,
    debounce: Duration,
}

impl ReanalysisController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            committed: None,
            staged: None,
            last_edit_at: None,
            generation: 0,
            force_full: false,
            debounce,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn committed(&self) -> Option<&Arc<AnalysisSnapshot>> {
        self.committed.as_ref()
    }

    /// A run is in flight.
    pub fn is_analyzing(&self) -> bool {
        matches!(
            self.phase,
            Phase::Analyzing | Phase::AnalyzingWithPendingEdit
        )
    }

    /// Unanalyzed edits exist (a run will happen without further input).
    pub fn needs_reanalysis(&self) -> bool {
        matches!(
            self.phase,
            Phase::Debouncing | Phase::AnalyzingWithPendingEdit
        )
    }

    /// The next dispatch would be a full analysis rather than incremental.
    pub fn next_is_full(&self) -> bool {
        self.committed.is_none() || self.force_full
    }

    /// When the debounce timer fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Debouncing => self.last_edit_at.map(|t| t + self.debounce),
            _ => None,
        }
    }

    /// Record an edit. The quiet window always restarts from `now`; while a
    /// run is in flight the edit only flags a follow-up, it never spawns a
    /// second run.
    pub fn note_edit(&mut self, now: Instant) {
        match self.phase {
            Phase::Idle | Phase::Debouncing => {
                self.phase = Phase::Debouncing;
                self.last_edit_at = Some(now);
            }
            Phase::Analyzing => {
                self.phase = Phase::AnalyzingWithPendingEdit;
                self.last_edit_at = Some(now);
            }
            Phase::AnalyzingWithPendingEdit => {
                self.last_edit_at = Some(now);
            }
        }
    }

    /// Hand out a dispatch if the quiet window has elapsed. The caller must
    /// then stage the line map, capture the open set, and start a worker
    /// with the returned generation.
    pub fn poll(&mut self, now: Instant) -> Option<DispatchPlan> {
        if self.phase != Phase::Debouncing {
            return None;
        }
        let armed_at = self.last_edit_at?;
        if now.saturating_duration_since(armed_at) < self.debounce {
            return None;
        }

        self.phase = Phase::Analyzing;
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let kind = match (&self.committed, self.force_full) {
            (Some(prior), false) => DispatchKind::Incremental(Arc::clone(prior)),
            _ => DispatchKind::Full,
        };
        self.force_full = false;
        Some(DispatchPlan {
            generation: self.generation,
            kind,
        })
    }

    /// Apply a finished run. Swap happens here, on the caller's thread; the
    /// pending-edit flag re-arms the timer from `now` so the follow-up run
    /// waits a full quiet window instead of firing back to back.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<AnalysisSnapshot, AnalysisError>,
        now: Instant,
    ) -> SwapOutcome {
        if generation != self.generation || !self.is_analyzing() {
            tracing::debug!(
                "dropping completion for generation {} (current {}, phase {:?})",
                generation,
                self.generation,
                self.phase
            );
            return SwapOutcome::Stale;
        }

        let had_pending_edit = self.phase == Phase::AnalyzingWithPendingEdit;
        self.phase = if had_pending_edit {
            self.last_edit_at = Some(now);
            Phase::Debouncing
        } else {
            Phase::Idle
        };

        match result {
            Ok(snapshot) => {
                self.staged = Some(Arc::new(snapshot));
                self.swap();
                SwapOutcome::Swapped
            }
            Err(e) => {
                tracing::warn!(
                    "analysis generation {} failed, keeping committed snapshot: {}",
                    generation,
                    e
                );
                self.staged = None;
                self.force_full = true;
                SwapOutcome::DiscardedFailure
            }
        }
    }

    /// Promote staged to committed. The old committed value drops here if
    /// no query result still holds a clone of its Arc.
    fn swap(&mut self) {
        if let Some(staged) = self.staged.take() {
            self.committed = Some(staged);
        }
    }
}
