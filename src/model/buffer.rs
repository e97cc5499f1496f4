//! Line-oriented text buffer.
//!
//! The buffer stores a file as a vector of lines. All edit operations are
//! expressed against line indices so the analysis index map can mirror them
//! one for one (see `line_map`). Columns are byte offsets within a line;
//! offsets that land inside a multi-byte character are floored to the
//! nearest character boundary rather than rejected.

use std::path::{Path, PathBuf};

/// In-memory contents of one open file.
#[derive(Debug, Clone)]
pub struct Buffer {
    path: PathBuf,
    lines: Vec<String>,
}

impl Buffer {
    /// Create a buffer from full file text. An empty file still has one
    /// (empty) line so that line indices are always valid for a new buffer.
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: split_lines(text),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|l| l.as_str())
    }

    /// Iterate over all lines in order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.as_str())
    }

    /// Reassemble the full text with `\n` separators.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Insert a new line so that it becomes line `index`. `index` may equal
    /// `line_count()` to append; larger values are clamped to append.
    pub fn insert_line(&mut self, index: usize, text: impl Into<String>) {
        let index = index.min(self.lines.len());
        self.lines.insert(index, text.into());
    }

    /// Remove a line. Out-of-range indices are ignored. Removing the last
    /// remaining line leaves one empty line in its place.
    pub fn remove_line(&mut self, index: usize) {
        if index >= self.lines.len() {
            return;
        }
        self.lines.remove(index);
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
    }

    /// Replace a line's text in place. Out-of-range indices are ignored.
    pub fn replace_line(&mut self, index: usize, text: impl Into<String>) {
        if let Some(line) = self.lines.get_mut(index) {
            *line = text.into();
        }
    }

    /// Insert a string inside a line at a byte column.
    pub fn insert_str(&mut self, index: usize, col: usize, s: &str) {
        if let Some(line) = self.lines.get_mut(index) {
            let col = floor_char_boundary(line, col);
            line.insert_str(col, s);
        }
    }

    /// Delete `len` bytes from a line starting at a byte column, clamped to
    /// the line end and to character boundaries.
    pub fn delete_str(&mut self, index: usize, col: usize, len: usize) {
        if let Some(line) = self.lines.get_mut(index) {
            let start = floor_char_boundary(line, col);
            let end = floor_char_boundary(line, start.saturating_add(len).min(line.len()));
            if start < end {
                line.replace_range(start..end, "");
            }
        }
    }

    /// Split line `index` at a byte column: the head keeps the prefix, a new
    /// line holding the suffix becomes line `index + 1`.
    pub fn split_line(&mut self, index: usize, col: usize) {
        if index >= self.lines.len() {
            return;
        }
        let tail = {
            let line = &mut self.lines[index];
            let col = floor_char_boundary(line, col);
            line.split_off(col)
        };
        self.lines.insert(index + 1, tail);
    }

    /// Append line `index + 1` onto line `index` and remove it. A no-op on
    /// the last line.
    pub fn merge_with_next(&mut self, index: usize) {
        if index + 1 >= self.lines.len() {
            return;
        }
        let next = self.lines.remove(index + 1);
        self.lines[index].push_str(&next);
    }

    /// Replace the whole contents, as after an external reload.
    pub fn set_text(&mut self, text: &str) {
        self.lines = split_lines(text);
    }
}

fn split_lines(text: &str) -> Vec<String> {
    // str::lines would drop a trailing empty line; split keeps it, which
    // matters because the cursor can sit on it.
    let mut lines: Vec<String> = text.split('\n').map(|l| l.to_string()).collect();
    if let Some(last) = lines.last() {
        // A single trailing newline denotes end-of-file, not an extra line.
        if lines.len() > 1 && last.is_empty() && text.ends_with('\n') {
            lines.pop();
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Largest byte offset `<= col` that lies on a character boundary.
pub(crate) fn floor_char_boundary(s: &str, col: usize) -> usize {
    let mut col = col.min(s.len());
    while col > 0 && !s.is_char_boundary(col) {
        col -= 1;
    }
    col
}
