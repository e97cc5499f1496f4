//! Workspace test harness.
//!
//! Drives a real workspace (real engine, real runtime, real bridge) with a
//! hand-held clock: the debounce never waits on wall time because every
//! pump is given a fabricated instant. Only worker completion needs real
//! waiting, which `pump_until` does with short sleeps and a hard deadline.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;

use limn::analysis::client::{AnalysisClient, AnalysisError, AnalyzeRequest};
use limn::analysis::snapshot::{AnalysisSnapshot, SymbolIndex};
use limn::config::Config;
use limn::session::EditorSession;
use limn::settings::Settings;
use limn::workspace::Workspace;

pub const TEST_DEBOUNCE: Duration = Duration::from_millis(100);

/// One analysis call as the analyzer saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: PathBuf,
    pub text: String,
    pub open_files: Vec<(PathBuf, String)>,
    pub incremental: bool,
}

#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Succeed,
    SucceedAfter(Duration),
    Fail(String),
}

/// Analyzer double: records every request and plays back scripted
/// outcomes, succeeding immediately once the script runs out.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: ScriptedOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn run(
        &self,
        request: AnalyzeRequest,
        incremental: bool,
    ) -> Result<AnalysisSnapshot, AnalysisError> {
        let outcome = {
            let mut script = self.script.lock().unwrap();
            script.pop_front().unwrap_or(ScriptedOutcome::Succeed)
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            path: request.path.clone(),
            text: request.text.to_string(),
            open_files: request
                .open_files
                .iter()
                .map(|(p, t)| (p.clone(), t.to_string()))
                .collect(),
            incremental,
        });

        match outcome {
            ScriptedOutcome::Succeed => {}
            ScriptedOutcome::SucceedAfter(delay) => tokio::time::sleep(delay).await,
            ScriptedOutcome::Fail(msg) => return Err(AnalysisError::Failed(msg)),
        }

        let lines = request.text.split('\n').count();
        Ok(AnalysisSnapshot::new(
            request.path,
            vec![Vec::new(); lines],
            SymbolIndex::default(),
        ))
    }
}

#[async_trait]
impl AnalysisClient for ScriptedClient {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisSnapshot, AnalysisError> {
        self.run(request, false).await
    }

    async fn reanalyze(
        &self,
        request: AnalyzeRequest,
        _prior: Arc<AnalysisSnapshot>,
    ) -> Result<AnalysisSnapshot, AnalysisError> {
        self.run(request, true).await
    }
}

pub struct PipelineHarness {
    pub workspace: Workspace,
    /// Present unless the harness was built with the lexical analyzer.
    client: Option<Arc<ScriptedClient>>,
    t0: Instant,
    temp: TempDir,
    sources: Vec<PathBuf>,
}

impl PipelineHarness {
    /// Harness over the scripted analyzer.
    pub fn scripted() -> Self {
        Self::scripted_with_debounce(TEST_DEBOUNCE)
    }

    pub fn scripted_with_debounce(debounce: Duration) -> Self {
        let client = Arc::new(ScriptedClient::new());
        Self::build(debounce, Some(client), |_| {})
    }

    /// Harness over the built-in lexical analyzer.
    pub fn lexical() -> Self {
        Self::build(TEST_DEBOUNCE, None, |_| {})
    }

    /// Lexical harness with a caller-adjusted config, for daemon and
    /// build settings.
    pub fn lexical_with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        Self::build(TEST_DEBOUNCE, None, adjust)
    }

    fn build(
        debounce: Duration,
        client: Option<Arc<ScriptedClient>>,
        adjust: impl FnOnce(&mut Config),
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.analysis.debounce_ms = debounce.as_millis() as u64;
        adjust(&mut config);

        let settings = Settings::load(temp.path().join("settings.json"), Instant::now());
        let workspace = match &client {
            Some(client) => {
                Workspace::with_client(config, settings, Arc::clone(client) as Arc<dyn AnalysisClient>)
            }
            None => Workspace::new(config, settings),
        }
        .unwrap();

        Self {
            workspace,
            client,
            t0: Instant::now(),
            temp,
            sources: Vec::new(),
        }
    }

    pub fn client(&self) -> &ScriptedClient {
        self.client.as_ref().expect("harness has no scripted client")
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Virtual clock: everything is expressed as an offset from start.
    pub fn at(&self, offset: Duration) -> Instant {
        self.t0 + offset
    }

    /// Create a source file on disk, register it in a project index so it
    /// resolves a compile context, and open it.
    pub fn open_source(&mut self, name: &str, text: &str, offset: Duration) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, text).unwrap();
        self.sources.push(path.clone());
        self.reload_project(offset);
        self.workspace.open_file(path.clone(), text, self.at(offset));
        path
    }

    fn reload_project(&mut self, offset: Duration) {
        let entries: Vec<serde_json::Value> = self
            .sources
            .iter()
            .map(|p| {
                serde_json::json!({
                    "directory": self.temp.path(),
                    "file": p,
                    "command": format!("cc -c {}", p.display()),
                })
            })
            .collect();
        let project_path = self.temp.path().join("compile_commands.json");
        std::fs::write(
            &project_path,
            serde_json::to_string_pretty(&entries).unwrap(),
        )
        .unwrap();
        self.workspace
            .load_project(&project_path, self.at(offset))
            .unwrap();
    }

    pub fn session(&self, path: &Path) -> &EditorSession {
        self.workspace.session(path).expect("file not open")
    }

    pub fn session_mut(&mut self, path: &Path) -> &mut EditorSession {
        self.workspace.session_mut(path).expect("file not open")
    }

    /// Apply an edit at a virtual instant.
    pub fn edit(&mut self, path: &Path, offset: Duration, f: impl FnOnce(&mut EditorSession, Instant)) {
        let now = self.at(offset);
        let session = self.workspace.session_mut(path).expect("file not open");
        f(session, now);
    }

    pub fn pump(&mut self, offset: Duration) {
        self.workspace.pump(self.at(offset));
    }

    /// Pump repeatedly at one virtual instant until the predicate holds.
    /// Real time passes only while waiting for worker tasks.
    pub fn pump_until(&mut self, offset: Duration, pred: impl Fn(&Workspace) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            self.workspace.pump(self.at(offset));
            if pred(&self.workspace) {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "condition not reached within the harness deadline"
            );
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Pump at `offset` until the analyzer has seen `count` requests.
    /// Dispatch hands the work to a pool task, so even an already-due run
    /// reaches the analyzer a beat after the pump that released it.
    pub fn wait_for_requests(&mut self, offset: Duration, count: usize) {
        let client = Arc::clone(self.client.as_ref().expect("harness has no scripted client"));
        self.pump_until(offset, move |_| client.request_count() >= count);
    }

    /// Pump at `offset` until the file has a committed snapshot.
    pub fn settle(&mut self, path: &Path, offset: Duration) {
        let path = path.to_path_buf();
        self.pump_until(offset, move |ws| {
            ws.session(&path).is_some_and(|s| s.committed().is_some())
        });
    }

    /// Pump at `offset` until nothing is pending or in flight.
    pub fn quiesce(&mut self, offset: Duration) {
        self.pump_until(offset, |ws| !ws.analysis_pending());
    }
}
