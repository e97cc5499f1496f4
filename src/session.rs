//! Per-file editing session.
//!
//! Bundles the live buffer, its line map, and the reanalysis controller,
//! and keeps the three in lockstep: every edit mutates buffer and map
//! together and restarts the controller's quiet window. The workspace pumps
//! dispatch and completion through here so map staging always pairs with
//! the controller's own bookkeeping.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::controller::{DispatchPlan, ReanalysisController, SwapOutcome};
use crate::analysis::projector::{AnnotationProjector, Cursor, HighlightStyles, NoDefinition, StyledSpan};
use crate::analysis::snapshot::{AnalysisSnapshot, Completion, Location};
use crate::analysis::AnalysisError;
use crate::model::buffer::Buffer;
use crate::model::line_map::LineMap;

pub struct EditorSession {
    buffer: Buffer,
    line_map: LineMap,
    controller: ReanalysisController,
    projector: AnnotationProjector,
}

impl EditorSession {
    pub fn open(
        path: impl Into<PathBuf>,
        text: &str,
        debounce: Duration,
        styles: HighlightStyles,
    ) -> Self {
        let buffer = Buffer::from_text(path, text);
        let line_map = LineMap::new(buffer.line_count());
        Self {
            buffer,
            line_map,
            controller: ReanalysisController::new(debounce),
            projector: AnnotationProjector::new(styles),
        }
    }

    pub fn path(&self) -> &Path {
        self.buffer.path()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn line_map(&self) -> &LineMap {
        &self.line_map
    }

    pub fn controller(&self) -> &ReanalysisController {
        &self.controller
    }

    pub fn committed(&self) -> Option<&Arc<AnalysisSnapshot>> {
        self.controller.committed()
    }

    // ---- edits -----------------------------------------------------------

    pub fn insert_line(&mut self, ix: usize, text: impl Into<String>, now: Instant) {
        self.buffer.insert_line(ix, text);
        self.line_map.insert_line(ix.min(self.line_map.len()));
        self.after_edit(now);
    }

    pub fn remove_line(&mut self, ix: usize, now: Instant) {
        if ix >= self.buffer.line_count() {
            return;
        }
        self.buffer.remove_line(ix);
        self.line_map.remove_line(ix);
        self.after_edit(now);
    }

    pub fn replace_line(&mut self, ix: usize, text: impl Into<String>, now: Instant) {
        if ix >= self.buffer.line_count() {
            return;
        }
        self.buffer.replace_line(ix, text);
        self.after_edit(now);
    }

    pub fn insert_str(&mut self, line: usize, col: usize, s: &str, now: Instant) {
        if line >= self.buffer.line_count() {
            return;
        }
        self.buffer.insert_str(line, col, s);
        self.after_edit(now);
    }

    pub fn delete_str(&mut self, line: usize, col: usize, len: usize, now: Instant) {
        if line >= self.buffer.line_count() {
            return;
        }
        self.buffer.delete_str(line, col, len);
        self.after_edit(now);
    }

    pub fn split_line(&mut self, line: usize, col: usize, now: Instant) {
        if line >= self.buffer.line_count() {
            return;
        }
        self.buffer.split_line(line, col);
        self.line_map.split_line(line);
        self.after_edit(now);
    }

    pub fn merge_with_next(&mut self, line: usize, now: Instant) {
        if line + 1 >= self.buffer.line_count() {
            return;
        }
        self.buffer.merge_with_next(line);
        self.line_map.merge_with_next(line);
        self.after_edit(now);
    }

    /// Replace the whole buffer. All line identity is lost; the mapping
    /// starts over and analysis is rescheduled.
    pub fn set_text(&mut self, text: &str, now: Instant) {
        self.buffer.set_text(text);
        self.line_map.reset(self.buffer.line_count());
        self.after_edit(now);
    }

    fn after_edit(&mut self, now: Instant) {
        debug_assert_eq!(self.line_map.len(), self.buffer.line_count());
        self.controller.note_edit(now);
    }

    // ---- pipeline --------------------------------------------------------

    /// Schedule analysis without a content change, as on open or when a
    /// compile context becomes available.
    pub fn schedule_analysis(&mut self, now: Instant) {
        self.controller.note_edit(now);
    }

    pub fn needs_reanalysis(&self) -> bool {
        self.controller.needs_reanalysis()
    }

    pub fn is_analyzing(&self) -> bool {
        self.controller.is_analyzing()
    }

    /// Ask the controller whether the quiet window has elapsed. On a
    /// dispatch, stage the current line identity so the finished snapshot
    /// can be tied back to the lines it analyzed.
    pub fn poll_dispatch(&mut self, now: Instant) -> Option<DispatchPlan> {
        let plan = self.controller.poll(now)?;
        self.line_map.stage();
        Some(plan)
    }

    /// Route a finished analysis through the controller and mirror the
    /// outcome onto the line map. Stale completions leave the map alone:
    /// any staged mapping belongs to a newer dispatch still in flight.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<AnalysisSnapshot, AnalysisError>,
        now: Instant,
    ) -> SwapOutcome {
        let outcome = self.controller.complete(generation, result, now);
        match outcome {
            SwapOutcome::Swapped => self.line_map.promote(),
            SwapOutcome::DiscardedFailure => self.line_map.clear_staged(),
            SwapOutcome::Stale => {}
        }
        outcome
    }

    /// Point-in-time copy of the text for an analysis dispatch.
    pub fn capture_text(&self) -> Arc<str> {
        Arc::from(self.buffer.text())
    }

    // ---- queries ---------------------------------------------------------

    pub fn line_overlay(&self, line: usize) -> Vec<StyledSpan> {
        let line_len = self.buffer.line(line).map_or(0, str::len);
        self.projector
            .line_overlay(self.committed(), &self.line_map, line, line_len)
    }

    pub fn goto_definition(&self, cursor: Cursor) -> Result<Location, NoDefinition> {
        self.projector
            .goto_definition(self.committed(), &self.line_map, cursor)
    }

    pub fn completions(&self, cursor: Cursor) -> Vec<Completion> {
        let line_text = self.buffer.line(cursor.line).unwrap_or("");
        self.projector
            .completions(self.committed(), &self.line_map, line_text, cursor)
    }

    /// Map a snapshot line of the committed analysis back to the buffer
    /// line that today holds it. Used to land same-file definition jumps
    /// on the line even after it moved.
    pub fn buffer_line_for_committed(&self, snapshot_line: usize) -> Option<usize> {
        self.line_map.buffer_line_for_committed(snapshot_line)
    }

    pub fn diagnostic_count(&self) -> usize {
        self.committed().map_or(0, |s| s.diagnostic_count())
    }
}
