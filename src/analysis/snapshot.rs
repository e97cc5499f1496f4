//! Immutable analysis results.
//!
//! An `AnalysisSnapshot` is everything one analysis run produced for one
//! file: per-line annotation spans (syntax classes and diagnostics) plus a
//! symbol index for definition and completion queries. Snapshots are built
//! by a worker, handed over whole, and never mutated afterwards; the
//! pipeline shares them behind `Arc` and drops them when no slot refers to
//! them anymore.
//!
//! All line and column values in a snapshot refer to the text that was
//! analyzed, not to the live buffer. Translating between the two is the
//! line map's job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Classification of an annotation span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Comment,
    StringLiteral,
    NumberLiteral,
    Keyword,
    Identifier,
    Preprocessor,
    Error,
    Warning,
}

impl AnnotationKind {
    /// Diagnostics carry messages and are counted separately from syntax.
    pub fn is_diagnostic(self) -> bool {
        matches!(self, AnnotationKind::Error | AnnotationKind::Warning)
    }
}

/// One classified span within a snapshot line. Columns are byte offsets
/// into the analyzed line's text, `start < end` except for zero-length
/// diagnostic anchors at end of line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub kind: AnnotationKind,
    /// Diagnostic message, `None` for syntax spans.
    pub message: Option<String>,
}

impl Annotation {
    pub fn span(start: usize, end: usize, kind: AnnotationKind) -> Self {
        Self {
            start,
            end,
            kind,
            message: None,
        }
    }

    pub fn diagnostic(start: usize, end: usize, kind: AnnotationKind, message: String) -> Self {
        Self {
            start,
            end,
            kind,
            message: Some(message),
        }
    }
}

/// Position of a definition in some analyzed file. Line and column are
/// snapshot coordinates of that file's text as captured at dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

/// One completion candidate. `insert_text` is the full replacement for the
/// prefix under the cursor; `label` is what a front end lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    pub insert_text: String,
}

/// A named symbol occurrence on one snapshot line of the analyzed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSpan {
    pub start: usize,
    pub end: usize,
    pub name: String,
}

/// Symbol-level results of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    /// First definition-like occurrence of each name, across the analyzed
    /// file and every other file in the captured open set.
    pub definitions: HashMap<String, Location>,
    /// Symbol occurrences per snapshot line of the analyzed file, spans
    /// sorted by start column.
    pub occurrences: Vec<Vec<SymbolSpan>>,
    /// Sorted, deduplicated pool of completable names.
    pub completion_pool: Vec<String>,
}

/// Immutable result of analyzing one file.
#[derive(Debug, Clone)]
pub struct AnalysisSnapshot {
    path: PathBuf,
    line_annotations: Vec<Vec<Annotation>>,
    symbols: SymbolIndex,
}

impl AnalysisSnapshot {
    pub fn new(
        path: impl Into<PathBuf>,
        line_annotations: Vec<Vec<Annotation>>,
        symbols: SymbolIndex,
    ) -> Self {
        Self {
            path: path.into(),
            line_annotations,
            symbols,
        }
    }

    /// A contentless snapshot: no annotations, no symbols.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Vec::new(), SymbolIndex::default())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines in the analyzed text.
    pub fn line_count(&self) -> usize {
        self.line_annotations.len()
    }

    /// Annotation spans for a snapshot line, empty for out-of-range lines.
    pub fn annotations(&self, line: usize) -> &[Annotation] {
        self.line_annotations
            .get(line)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Total number of Error/Warning annotations across all lines.
    pub fn diagnostic_count(&self) -> usize {
        self.line_annotations
            .iter()
            .flatten()
            .filter(|a| a.kind.is_diagnostic())
            .count()
    }

    /// The symbol whose span covers the byte column on a snapshot line.
    /// A cursor sitting exactly at a span's end still counts as on it, so
    /// goto-definition works with the cursor just past the last character.
    pub fn symbol_at(&self, line: usize, col: usize) -> Option<&SymbolSpan> {
        self.symbols
            .occurrences
            .get(line)?
            .iter()
            .find(|s| s.start <= col && col <= s.end)
    }

    pub fn definition_of(&self, name: &str) -> Option<&Location> {
        self.symbols.definitions.get(name)
    }

    /// Candidates whose names start with `prefix`, in pool (sorted) order.
    /// An empty prefix yields the whole pool.
    pub fn completions(&self, prefix: &str) -> Vec<Completion> {
        self.symbols
            .completion_pool
            .iter()
            .filter(|name| name.starts_with(prefix) && name.as_str() != prefix)
            .map(|name| Completion {
                label: name.clone(),
                insert_text: name.clone(),
            })
            .collect()
    }

    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }
}
