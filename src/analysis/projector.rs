//! Projection of committed analysis onto live buffer lines.
//!
//! Rendering and queries never look at the analyzed text itself; they look
//! at the committed snapshot *through* the line map. A line whose mapping
//! is gone (created since the last swap, or never analyzed) simply renders
//! bare. Spans from the snapshot are clamped to the line's current length,
//! so an edited line shows stale-but-sane annotation until the next swap.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::analysis::snapshot::{
    AnalysisSnapshot, AnnotationKind, Completion, Location,
};
use crate::model::line_map::LineMap;

/// 24-bit color, rendering-toolkit neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Option<Rgb>,
    pub bold: bool,
    pub underline: bool,
}

/// Per-kind styles, injected at construction rather than read from any
/// global, so embedders can restyle without recompiling.
#[derive(Debug, Clone)]
pub struct HighlightStyles {
    pub comment: Style,
    pub string: Style,
    pub number: Style,
    pub keyword: Style,
    pub identifier: Style,
    pub preprocessor: Style,
    pub error: Style,
    pub warning: Style,
}

impl HighlightStyles {
    pub fn style_for(&self, kind: AnnotationKind) -> Style {
        match kind {
            AnnotationKind::Comment => self.comment,
            AnnotationKind::StringLiteral => self.string,
            AnnotationKind::NumberLiteral => self.number,
            AnnotationKind::Keyword => self.keyword,
            AnnotationKind::Identifier => self.identifier,
            AnnotationKind::Preprocessor => self.preprocessor,
            AnnotationKind::Error => self.error,
            AnnotationKind::Warning => self.warning,
        }
    }
}

/// Solarized-light defaults.
static DEFAULT_STYLES: Lazy<HighlightStyles> = Lazy::new(|| HighlightStyles {
    comment: Style {
        fg: Some(Rgb(0x93, 0xa1, 0xa1)),
        ..Style::default()
    },
    string: Style {
        fg: Some(Rgb(0x2a, 0xa1, 0x98)),
        ..Style::default()
    },
    number: Style {
        fg: Some(Rgb(0xd3, 0x36, 0x82)),
        ..Style::default()
    },
    keyword: Style {
        fg: Some(Rgb(0x85, 0x99, 0x00)),
        bold: true,
        underline: false,
    },
    identifier: Style {
        fg: Some(Rgb(0x65, 0x7b, 0x83)),
        ..Style::default()
    },
    preprocessor: Style {
        fg: Some(Rgb(0xcb, 0x4b, 0x16)),
        ..Style::default()
    },
    error: Style {
        fg: Some(Rgb(0xdc, 0x32, 0x2f)),
        bold: false,
        underline: true,
    },
    warning: Style {
        fg: Some(Rgb(0xb5, 0x89, 0x00)),
        bold: false,
        underline: true,
    },
});

pub fn default_styles() -> HighlightStyles {
    DEFAULT_STYLES.clone()
}

/// One styled region of a live buffer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub start: usize,
    pub end: usize,
    pub kind: AnnotationKind,
    pub style: Style,
    pub message: Option<String>,
}

/// Cursor position in live buffer coordinates (line index, byte column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub line: usize,
    pub col: usize,
}

/// The query found nothing to jump to. A result, not a failure: the
/// caller shows "no definition" and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoDefinition;

impl std::fmt::Display for NoDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no definition found")
    }
}

impl std::error::Error for NoDefinition {}

/// Stateless lens from (committed snapshot, line map) to per-line overlays
/// and cursor queries. Holds only the injected style table.
#[derive(Debug, Clone)]
pub struct AnnotationProjector {
    styles: HighlightStyles,
}

impl AnnotationProjector {
    pub fn new(styles: HighlightStyles) -> Self {
        Self { styles }
    }

    pub fn styles(&self) -> &HighlightStyles {
        &self.styles
    }

    /// Styled spans for one buffer line. Empty when the line has no
    /// committed mapping or the snapshot is absent.
    pub fn line_overlay(
        &self,
        committed: Option<&Arc<AnalysisSnapshot>>,
        line_map: &LineMap,
        line: usize,
        line_len: usize,
    ) -> Vec<StyledSpan> {
        let Some(snapshot) = committed else {
            return Vec::new();
        };
        let Some(snapshot_line) = line_map.committed(line) else {
            return Vec::new();
        };

        snapshot
            .annotations(snapshot_line)
            .iter()
            .filter_map(|ann| {
                let start = ann.start.min(line_len);
                let end = ann.end.min(line_len);
                // Shrunken lines can leave nothing of a span; diagnostics
                // keep a zero-width anchor so the message survives.
                if start >= end && ann.message.is_none() {
                    return None;
                }
                Some(StyledSpan {
                    start,
                    end,
                    kind: ann.kind,
                    style: self.styles.style_for(ann.kind),
                    message: ann.message.clone(),
                })
            })
            .collect()
    }

    /// Definition target for the symbol under the cursor, in the target
    /// file's snapshot coordinates. Every missing link in the chain means
    /// `NoDefinition`, never an error.
    pub fn goto_definition(
        &self,
        committed: Option<&Arc<AnalysisSnapshot>>,
        line_map: &LineMap,
        cursor: Cursor,
    ) -> Result<Location, NoDefinition> {
        let snapshot = committed.ok_or(NoDefinition)?;
        let snapshot_line = line_map.committed(cursor.line).ok_or(NoDefinition)?;
        let symbol = snapshot
            .symbol_at(snapshot_line, cursor.col)
            .ok_or(NoDefinition)?;
        snapshot
            .definition_of(&symbol.name)
            .cloned()
            .ok_or(NoDefinition)
    }

    /// Completion candidates for the identifier prefix ending at the
    /// cursor. The prefix is read from the *live* line text; the pool is
    /// the committed snapshot's. Missing snapshot or mapping yields an
    /// empty list.
    pub fn completions(
        &self,
        committed: Option<&Arc<AnalysisSnapshot>>,
        line_map: &LineMap,
        line_text: &str,
        cursor: Cursor,
    ) -> Vec<Completion> {
        let Some(snapshot) = committed else {
            return Vec::new();
        };
        if line_map.committed(cursor.line).is_none() {
            return Vec::new();
        }
        let prefix = identifier_prefix(line_text, cursor.col);
        snapshot.completions(prefix)
    }
}

/// The identifier characters immediately before `col`.
fn identifier_prefix(line: &str, col: usize) -> &str {
    let col = crate::model::buffer::floor_char_boundary(line, col);
    let head = &line[..col];
    let start = head
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(|ix| ix + 1)
        .unwrap_or(0);
    &head[start..]
}
