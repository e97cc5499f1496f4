//! Bundled reference analyzer.
//!
//! A self-contained `AnalysisClient` so the pipeline runs end to end with
//! no external services: a line-oriented scanner for C-family source that
//! classifies comments, strings, numbers, keywords and identifiers,
//! indexes the first occurrence of every name as its definition (across
//! the whole captured open set, so unsaved edits in other files are
//! visible), and serves prefix completions from the names it has seen.
//!
//! It is deliberately approximate. Real deployments put a compiler-backed
//! analyzer behind the same trait; everything downstream only depends on
//! the snapshot shape.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::analysis::client::{AnalysisClient, AnalysisError, AnalyzeRequest};
use crate::analysis::snapshot::{
    AnalysisSnapshot, Annotation, AnnotationKind, Location, SymbolIndex, SymbolSpan,
};

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
        "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
        "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
        "unsigned", "void", "volatile", "while", "bool", "true", "false", "class", "namespace",
        "new", "delete", "template", "typename", "public", "private", "protected", "virtual",
        "override", "nullptr", "using",
    ]
    .into_iter()
    .collect()
});

/// Scanner output for one line.
#[derive(Debug, Default)]
struct ScannedLine {
    annotations: Vec<Annotation>,
    symbols: Vec<SymbolSpan>,
    /// Name introduced by a `#define` on this line, with its column.
    defined_macro: Option<(String, usize)>,
}

#[derive(Debug, Default)]
pub struct TokenIndexClient;

impl TokenIndexClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnalysisClient for TokenIndexClient {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisSnapshot, AnalysisError> {
        let mut symbols = SymbolIndex::default();
        let mut pool: HashSet<String> = KEYWORDS.iter().map(|k| k.to_string()).collect();

        // Macro names from the compile command count as known words.
        for arg in &request.compile.arguments {
            if let Some(def) = arg.strip_prefix("-D") {
                let name = def.split('=').next().unwrap_or(def);
                if !name.is_empty() {
                    pool.insert(name.to_string());
                }
            }
        }

        // Pass 1: the analyzed file itself, producing annotations, symbol
        // occurrences and first-occurrence definitions.
        let mut line_annotations = Vec::new();
        let mut in_block_comment = false;
        for (line_ix, line) in request.text.split('\n').enumerate() {
            let scanned = scan_line(line, &mut in_block_comment);
            for sym in &scanned.symbols {
                pool.insert(sym.name.clone());
                symbols
                    .definitions
                    .entry(sym.name.clone())
                    .or_insert_with(|| Location {
                        path: request.path.clone(),
                        line: line_ix,
                        column: sym.start,
                    });
            }
            if let Some((name, column)) = &scanned.defined_macro {
                pool.insert(name.clone());
                symbols
                    .definitions
                    .entry(name.clone())
                    .or_insert_with(|| Location {
                        path: request.path.clone(),
                        line: line_ix,
                        column: *column,
                    });
            }
            line_annotations.push(scanned.annotations);
            symbols.occurrences.push(scanned.symbols);
        }

        // Pass 2: the rest of the captured open set, in path order for
        // deterministic first-occurrence resolution. Only names missing a
        // definition so far pick one up here.
        let mut others: Vec<_> = request
            .open_files
            .iter()
            .filter(|(path, _)| path.as_path() != request.path.as_path())
            .collect();
        others.sort_by(|a, b| a.0.cmp(b.0));
        for (path, text) in others {
            index_secondary_file(path, text, &mut symbols.definitions, &mut pool);
        }

        let mut completion_pool: Vec<String> = pool.into_iter().collect();
        completion_pool.sort();
        symbols.completion_pool = completion_pool;

        tracing::debug!(
            "analyzed {:?}: {} lines, {} definitions",
            request.path,
            line_annotations.len(),
            symbols.definitions.len()
        );

        Ok(AnalysisSnapshot::new(request.path, line_annotations, symbols))
    }
}

/// Index one non-primary file: definitions and completion words only.
fn index_secondary_file(
    path: &Path,
    text: &Arc<str>,
    definitions: &mut HashMap<String, Location>,
    pool: &mut HashSet<String>,
) {
    let mut in_block_comment = false;
    for (line_ix, line) in text.split('\n').enumerate() {
        let scanned = scan_line(line, &mut in_block_comment);
        for sym in scanned.symbols {
            pool.insert(sym.name.clone());
            definitions.entry(sym.name).or_insert(Location {
                path: path.to_path_buf(),
                line: line_ix,
                column: sym.start,
            });
        }
        if let Some((name, column)) = scanned.defined_macro {
            pool.insert(name.clone());
            definitions.entry(name).or_insert(Location {
                path: path.to_path_buf(),
                line: line_ix,
                column,
            });
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scan one line, carrying block-comment state across lines.
fn scan_line(line: &str, in_block_comment: &mut bool) -> ScannedLine {
    let mut out = ScannedLine::default();
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    if *in_block_comment {
        match line.find("*/") {
            Some(end) => {
                out.annotations
                    .push(Annotation::span(0, end + 2, AnnotationKind::Comment));
                *in_block_comment = false;
                i = end + 2;
            }
            None => {
                out.annotations
                    .push(Annotation::span(0, len, AnnotationKind::Comment));
                return out;
            }
        }
    }

    // Preprocessor lines are annotated whole; a #define still introduces
    // a name worth indexing.
    if !*in_block_comment && i == 0 {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            out.annotations
                .push(Annotation::span(0, len, AnnotationKind::Preprocessor));
            let directive = trimmed[1..].trim_start();
            if let Some(rest) = directive.strip_prefix("define") {
                let rest_trimmed = rest.trim_start();
                let name: String = rest_trimmed
                    .chars()
                    .take_while(|&c| is_ident_continue(c))
                    .collect();
                if !name.is_empty() && name.chars().next().is_some_and(is_ident_start) {
                    // Column of the macro name within the original line.
                    let column = line.len() - rest_trimmed.len();
                    out.defined_macro = Some((name, column));
                }
            }
            return out;
        }
    }

    while i < len {
        let c = bytes[i] as char;

        if c == '/' && i + 1 < len && bytes[i + 1] == b'/' {
            out.annotations
                .push(Annotation::span(i, len, AnnotationKind::Comment));
            break;
        }

        if c == '/' && i + 1 < len && bytes[i + 1] == b'*' {
            match line[i + 2..].find("*/") {
                Some(rel) => {
                    let end = i + 2 + rel + 2;
                    out.annotations
                        .push(Annotation::span(i, end, AnnotationKind::Comment));
                    i = end;
                    continue;
                }
                None => {
                    out.annotations
                        .push(Annotation::span(i, len, AnnotationKind::Comment));
                    *in_block_comment = true;
                    break;
                }
            }
        }

        if c == '"' || c == '\'' {
            let quote = bytes[i];
            let mut j = i + 1;
            let mut closed = false;
            while j < len {
                if bytes[j] == b'\\' {
                    j += 2;
                    continue;
                }
                if bytes[j] == quote {
                    closed = true;
                    j += 1;
                    break;
                }
                j += 1;
            }
            let end = j.min(len);
            out.annotations
                .push(Annotation::span(i, end, AnnotationKind::StringLiteral));
            if !closed {
                out.annotations.push(Annotation::diagnostic(
                    i,
                    len,
                    AnnotationKind::Error,
                    "unterminated string literal".to_string(),
                ));
            }
            i = end;
            continue;
        }

        if c.is_ascii_digit() {
            let mut j = i + 1;
            while j < len {
                let d = bytes[j] as char;
                if d.is_ascii_alphanumeric() || d == '.' {
                    j += 1;
                } else {
                    break;
                }
            }
            out.annotations
                .push(Annotation::span(i, j, AnnotationKind::NumberLiteral));
            i = j;
            continue;
        }

        if is_ident_start(c) {
            let mut j = i + 1;
            while j < len && is_ident_continue(bytes[j] as char) {
                j += 1;
            }
            let word = &line[i..j];
            if KEYWORDS.contains(word) {
                out.annotations
                    .push(Annotation::span(i, j, AnnotationKind::Keyword));
            } else {
                out.annotations
                    .push(Annotation::span(i, j, AnnotationKind::Identifier));
                out.symbols.push(SymbolSpan {
                    start: i,
                    end: j,
                    name: word.to_string(),
                });
            }
            i = j;
            continue;
        }

        // Everything else is multi-byte safe to skip bytewise because
        // identifiers and literals above only match ASCII starts.
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::client::OpenFileSet;
    use crate::project::CompileContext;
    use std::path::PathBuf;

    fn request(path: &str, text: &str, open_files: OpenFileSet) -> AnalyzeRequest {
        AnalyzeRequest {
            path: PathBuf::from(path),
            text: Arc::from(text),
            compile: CompileContext {
                directory: PathBuf::from("/proj"),
                arguments: vec!["cc".to_string(), "-DFEATURE_X=1".to_string()],
            },
            open_files,
        }
    }

    async fn analyze(path: &str, text: &str) -> AnalysisSnapshot {
        let mut open = OpenFileSet::new();
        open.insert(path, text);
        TokenIndexClient::new()
            .analyze(request(path, text, open))
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn keywords_and_identifiers_are_classified() {
        let snap = analyze("/src/a.c", "int counter = 0;").await;
        let kinds: Vec<_> = snap.annotations(0).iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AnnotationKind::Keyword,
                AnnotationKind::Identifier,
                AnnotationKind::NumberLiteral
            ]
        );
        assert_eq!(snap.symbol_at(0, 4).unwrap().name, "counter");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn line_comment_swallows_rest_of_line() {
        let snap = analyze("/src/a.c", "x) // int y").await;
        let anns = snap.annotations(0);
        assert_eq!(anns.last().unwrap().kind, AnnotationKind::Comment);
        assert!(anns.iter().all(|a| a.kind != AnnotationKind::Keyword));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn block_comment_spans_lines() {
        let snap = analyze("/src/a.c", "a /* start\nstill comment\nend */ b").await;
        assert_eq!(snap.annotations(1)[0].kind, AnnotationKind::Comment);
        assert_eq!(snap.annotations(1)[0].end, "still comment".len());
        // After the comment closes, scanning resumes.
        assert!(snap.symbol_at(2, 7).is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unterminated_string_is_an_error_diagnostic() {
        let snap = analyze("/src/a.c", "s = \"oops").await;
        assert_eq!(snap.diagnostic_count(), 1);
        let diag = snap
            .annotations(0)
            .iter()
            .find(|a| a.kind == AnnotationKind::Error)
            .unwrap();
        assert_eq!(diag.message.as_deref(), Some("unterminated string literal"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn first_occurrence_is_the_definition() {
        let snap = analyze("/src/a.c", "int frob;\nfrob = 1;\nfrob = 2;").await;
        let def = snap.definition_of("frob").unwrap();
        assert_eq!(def.line, 0);
        assert_eq!(def.column, 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn definitions_come_from_other_open_files_too() {
        let mut open = OpenFileSet::new();
        open.insert("/src/main.c", "frob();");
        open.insert("/src/util.c", "void frob() {}");
        let snap = TokenIndexClient::new()
            .analyze(request("/src/main.c", "frob();", open))
            .await
            .unwrap();

        let def = snap.definition_of("frob").unwrap();
        // Defined in main.c first (the analyzed file wins over the open set).
        assert_eq!(def.path, PathBuf::from("/src/main.c"));

        // A name only present in the other file resolves there.
        let mut open2 = OpenFileSet::new();
        open2.insert("/src/main.c", "helper();");
        open2.insert("/src/util.c", "void other_helper() {}");
        let snap2 = TokenIndexClient::new()
            .analyze(request("/src/main.c", "helper();", open2))
            .await
            .unwrap();
        assert_eq!(
            snap2.definition_of("other_helper").unwrap().path,
            PathBuf::from("/src/util.c")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn define_directive_introduces_a_name() {
        let snap = analyze("/src/a.h", "#define MAX_SIZE 64").await;
        assert_eq!(snap.annotations(0)[0].kind, AnnotationKind::Preprocessor);
        let def = snap.definition_of("MAX_SIZE").unwrap();
        assert_eq!(def.line, 0);
        assert_eq!(def.column, "#define ".len());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn completions_include_compile_definitions_and_keywords() {
        let snap = analyze("/src/a.c", "int frob;").await;
        let labels: Vec<_> = snap
            .completions("FEATURE")
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, vec!["FEATURE_X"]);
        assert!(!snap.completions("whi").is_empty()); // "while"
    }

    #[tokio::test(flavor = "current_thread")]
    async fn completion_pool_is_sorted() {
        let snap = analyze("/src/a.c", "zeta();\nalpha();").await;
        let all: Vec<_> = snap.completions("").into_iter().map(|c| c.label).collect();
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
    }
}
