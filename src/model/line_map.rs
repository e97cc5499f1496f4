//! Per-line analysis index map.
//!
//! Analysis results are line-addressed against the text that was sent to the
//! analyzer, while the buffer keeps changing underneath. `LineMap` carries,
//! for every buffer line, *where that line lives* in the committed analysis
//! result and in one currently being computed:
//!
//! - `committed`: index into the committed snapshot's per-line arrays, or
//!   `None` if the line has no analyzed counterpart (e.g. it was created
//!   after the snapshot was taken).
//! - `staged`: index into the result of the in-flight analysis. Stamped at
//!   dispatch time with each line's position at that moment, carried along
//!   through subsequent edits, and promoted wholesale when the result lands.
//!
//! Structural edits move whole slots around; the index *values* never
//! change, because they refer to the frozen analyzed text, not the buffer.
//! In-place text edits do not touch the map at all. Annotations on an
//! edited line stay attached, stale, until the next swap replaces them.

/// Index pair for one buffer line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSlot {
    pub committed: Option<usize>,
    pub staged: Option<usize>,
}

/// Line-index map for one buffer, same length as the buffer at all times.
#[derive(Debug, Clone)]
pub struct LineMap {
    slots: Vec<LineSlot>,
}

impl LineMap {
    /// Create a map for a buffer with `line_count` lines, all unanalyzed.
    pub fn new(line_count: usize) -> Self {
        Self {
            slots: vec![LineSlot::default(); line_count.max(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Committed-snapshot line index for a buffer line.
    pub fn committed(&self, line: usize) -> Option<usize> {
        self.slots.get(line).and_then(|s| s.committed)
    }

    /// Staged (in-flight) line index for a buffer line.
    pub fn staged(&self, line: usize) -> Option<usize> {
        self.slots.get(line).and_then(|s| s.staged)
    }

    /// Buffer line currently mapped to the given committed-snapshot index.
    ///
    /// Linear scan; line counts are editor-buffer sized, not corpus sized.
    pub fn buffer_line_for_committed(&self, snapshot_line: usize) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.committed == Some(snapshot_line))
    }

    /// Mirror of `Buffer::insert_line`: a fresh slot appears at `index`.
    pub fn insert_line(&mut self, index: usize) {
        let index = index.min(self.slots.len());
        self.slots.insert(index, LineSlot::default());
    }

    /// Mirror of `Buffer::remove_line`.
    pub fn remove_line(&mut self, index: usize) {
        if index >= self.slots.len() {
            return;
        }
        self.slots.remove(index);
        if self.slots.is_empty() {
            self.slots.push(LineSlot::default());
        }
    }

    /// Mirror of `Buffer::split_line`: the head keeps the original line's
    /// indices, the tail starts unanalyzed.
    pub fn split_line(&mut self, index: usize) {
        if index >= self.slots.len() {
            return;
        }
        self.slots.insert(index + 1, LineSlot::default());
    }

    /// Mirror of `Buffer::merge_with_next`: the merged line keeps the head's
    /// indices, the tail's are dropped.
    pub fn merge_with_next(&mut self, index: usize) {
        if index + 1 >= self.slots.len() {
            return;
        }
        self.slots.remove(index + 1);
    }

    /// Mirror of `Buffer::set_text`: every line becomes unanalyzed.
    pub fn reset(&mut self, line_count: usize) {
        self.slots = vec![LineSlot::default(); line_count.max(1)];
    }

    /// Stamp dispatch positions: line `i`'s staged index becomes `i`. Called
    /// at the moment an analysis is dispatched, when buffer and analyzed
    /// text still agree line for line.
    pub fn stage(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.staged = Some(i);
        }
    }

    /// Promote staged indices to committed; the staged side empties. Called
    /// when the in-flight result is swapped in.
    pub fn promote(&mut self) {
        for slot in &mut self.slots {
            slot.committed = slot.staged.take();
        }
    }

    /// Forget staged indices without promoting. Called when the in-flight
    /// analysis fails and its result is discarded.
    pub fn clear_staged(&mut self) {
        for slot in &mut self.slots {
            slot.staged = None;
        }
    }

    /// Committed indices must be unique and, right after a promote, within
    /// the staged line count. Used by tests and debug assertions.
    #[cfg(test)]
    pub fn check_committed_consistency(&self, staged_len: usize) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for (line, slot) in self.slots.iter().enumerate() {
            if let Some(ix) = slot.committed {
                if ix >= staged_len {
                    return Err(format!(
                        "line {} committed index {} out of range (staged {} lines)",
                        line, ix, staged_len
                    ));
                }
                if !seen.insert(ix) {
                    return Err(format!("committed index {} mapped twice", ix));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_unanalyzed() {
        let map = LineMap::new(3);
        assert_eq!(map.len(), 3);
        assert_eq!(map.committed(0), None);
        assert_eq!(map.staged(2), None);
    }

    #[test]
    fn stage_then_promote_is_identity() {
        let mut map = LineMap::new(3);
        map.stage();
        map.promote();
        for i in 0..3 {
            assert_eq!(map.committed(i), Some(i));
            assert_eq!(map.staged(i), None);
        }
    }

    #[test]
    fn insert_between_stage_and_promote_leaves_new_line_unannotated() {
        let mut map = LineMap::new(2);
        map.stage();
        map.insert_line(1);
        map.promote();
        assert_eq!(map.committed(0), Some(0));
        assert_eq!(map.committed(1), None);
        assert_eq!(map.committed(2), Some(1));
    }

    #[test]
    fn remove_between_stage_and_promote_drops_that_index() {
        let mut map = LineMap::new(3);
        map.stage();
        map.remove_line(1);
        map.promote();
        assert_eq!(map.committed(0), Some(0));
        // Index 1 is simply absent now.
        assert_eq!(map.committed(1), Some(2));
        assert_eq!(map.buffer_line_for_committed(1), None);
    }

    #[test]
    fn split_keeps_indices_on_head() {
        let mut map = LineMap::new(2);
        map.stage();
        map.promote();
        map.split_line(0);
        assert_eq!(map.committed(0), Some(0));
        assert_eq!(map.committed(1), None);
        assert_eq!(map.committed(2), Some(1));
    }

    #[test]
    fn merge_keeps_head_indices() {
        let mut map = LineMap::new(3);
        map.stage();
        map.promote();
        map.merge_with_next(0);
        assert_eq!(map.committed(0), Some(0));
        assert_eq!(map.committed(1), Some(2));
    }

    #[test]
    fn clear_staged_discards_without_promoting() {
        let mut map = LineMap::new(2);
        map.stage();
        map.promote();
        map.stage();
        map.clear_staged();
        // Committed survives the failed cycle.
        assert_eq!(map.committed(0), Some(0));
        assert_eq!(map.staged(0), None);
    }

    #[test]
    fn reverse_lookup_finds_moved_lines() {
        let mut map = LineMap::new(3);
        map.stage();
        map.promote();
        map.insert_line(0);
        map.insert_line(0);
        assert_eq!(map.buffer_line_for_committed(2), Some(4));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum LineOp {
            Insert(usize),
            Remove(usize),
            Split(usize),
            Merge(usize),
        }

        fn arb_line_op(max_index: usize) -> impl Strategy<Value = LineOp> {
            prop_oneof![
                (0..=max_index).prop_map(LineOp::Insert),
                (0..max_index).prop_map(LineOp::Remove),
                (0..max_index).prop_map(LineOp::Split),
                (0..max_index).prop_map(LineOp::Merge),
            ]
        }

        proptest! {
            /// However the buffer is reshaped between dispatch and swap,
            /// promoted indices stay unique and inside the staged range.
            #[test]
            fn prop_promote_is_consistent(
                start_lines in 1..30usize,
                ops in prop::collection::vec(arb_line_op(40), 0..25)
            ) {
                let mut map = LineMap::new(start_lines);
                map.stage();
                let staged_len = map.len();

                for op in ops {
                    match op {
                        LineOp::Insert(i) => map.insert_line(i % (map.len() + 1)),
                        LineOp::Remove(i) => map.remove_line(i % map.len()),
                        LineOp::Split(i) => map.split_line(i % map.len()),
                        LineOp::Merge(i) => map.merge_with_next(i % map.len()),
                    }
                }

                map.promote();
                map.check_committed_consistency(staged_len).unwrap();
            }

            /// Staged values survive moves untouched: any slot that still
            /// has one holds a position that existed at stage time.
            #[test]
            fn prop_staged_values_never_invented(
                start_lines in 1..30usize,
                ops in prop::collection::vec(arb_line_op(40), 0..25)
            ) {
                let mut map = LineMap::new(start_lines);
                map.stage();
                let staged_len = map.len();

                for op in ops {
                    match op {
                        LineOp::Insert(i) => map.insert_line(i % (map.len() + 1)),
                        LineOp::Remove(i) => map.remove_line(i % map.len()),
                        LineOp::Split(i) => map.split_line(i % map.len()),
                        LineOp::Merge(i) => map.merge_with_next(i % map.len()),
                    }
                    for line in 0..map.len() {
                        if let Some(ix) = map.staged(line) {
                            prop_assert!(ix < staged_len);
                        }
                    }
                }
            }
        }
    }
}
