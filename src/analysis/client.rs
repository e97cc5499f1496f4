//! Analyzer-facing request surface.
//!
//! `AnalysisClient` is the seam between the pipeline and whatever actually
//! computes semantics. Implementations run on the worker runtime and may
//! take arbitrarily long; they only ever see a point-in-time capture of the
//! open files, never the live buffers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::analysis::snapshot::AnalysisSnapshot;
use crate::project::CompileContext;

/// Point-in-time copy of every open file's text, captured at dispatch.
#[derive(Debug, Clone, Default)]
pub struct OpenFileSet {
    files: HashMap<PathBuf, Arc<str>>,
}

impl OpenFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<Arc<str>>) {
        self.files.insert(path.into(), text.into());
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<str>> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Arc<str>)> {
        self.files.iter()
    }
}

/// Everything one analysis run needs, captured before dispatch.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub path: PathBuf,
    /// The analyzed file's text as captured at dispatch.
    pub text: Arc<str>,
    pub compile: CompileContext,
    /// Captured open set, including the analyzed file itself.
    pub open_files: OpenFileSet,
}

/// Why an analysis run produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// No compile command could be resolved for the file; per-file
    /// intelligence stays off until one appears.
    NoCompileContext,
    /// The analyzer itself failed; the previous committed snapshot stays
    /// visible and the next attempt is a full analysis.
    Failed(String),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::NoCompileContext => {
                write!(f, "no compile context for file")
            }
            AnalysisError::Failed(msg) => write!(f, "analysis failed: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Black-box analyzer interface.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Analyze from scratch.
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisSnapshot, AnalysisError>;

    /// Analyze with a prior result available for reuse. The output must be
    /// equivalent to a fresh `analyze` of the same request; the prior
    /// snapshot is an optimization input, not a semantic one.
    async fn reanalyze(
        &self,
        request: AnalyzeRequest,
        prior: Arc<AnalysisSnapshot>,
    ) -> Result<AnalysisSnapshot, AnalysisError> {
        let _ = prior;
        self.analyze(request).await
    }
}
