//! Control-thread hub.
//!
//! The workspace owns every open session, the engine, and the bridge, and
//! is pumped from the control thread: drain finished background work,
//! dispatch analyses whose quiet window elapsed, let the settings store
//! flush. Nothing in here blocks; results for files closed in the meantime
//! are dropped on the floor and the pipeline never panics over a failure.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::analysis::client::{AnalysisClient, AnalysisError, AnalyzeRequest, OpenFileSet};
use crate::analysis::engine::AnalysisEngine;
use crate::analysis::projector::{default_styles, Cursor, HighlightStyles, NoDefinition, StyledSpan};
use crate::analysis::snapshot::{Completion, Location};
use crate::analysis::token_index::TokenIndexClient;
use crate::config::Config;
use crate::project::build::BuildEvent;
use crate::project::compile_commands::{CompileCommandIndex, CompileContext};
use crate::project::daemon::TargetInfo;
use crate::project::ProjectError;
use crate::services::async_bridge::{AsyncBridge, AsyncMessage};
use crate::session::EditorSession;
use crate::settings::Settings;

pub struct Workspace {
    config: Config,
    settings: Settings,
    styles: HighlightStyles,
    engine: AnalysisEngine,
    bridge: AsyncBridge,
    sessions: HashMap<PathBuf, EditorSession>,
    project: Option<CompileCommandIndex>,
    target_list: Option<Vec<String>>,
    target_info: Option<TargetInfo>,
    build_events: Vec<BuildEvent>,
    build_running: bool,
    logged_dropped_result: bool,
    logged_missing_context: HashSet<PathBuf>,
}

impl Workspace {
    /// Workspace with the built-in lexical analyzer.
    pub fn new(config: Config, settings: Settings) -> std::io::Result<Self> {
        Self::with_client(config, settings, Arc::new(TokenIndexClient::new()))
    }

    /// Workspace with an injected analyzer.
    pub fn with_client(
        config: Config,
        settings: Settings,
        client: Arc<dyn AnalysisClient>,
    ) -> std::io::Result<Self> {
        let bridge = AsyncBridge::new();
        let engine = AnalysisEngine::new(client, config.analysis.max_workers, bridge.sender())?;
        Ok(Self {
            config,
            settings,
            styles: default_styles(),
            engine,
            bridge,
            sessions: HashMap::new(),
            project: None,
            target_list: None,
            target_info: None,
            build_events: Vec::new(),
            build_running: false,
            logged_dropped_result: false,
            logged_missing_context: HashSet::new(),
        })
    }

    pub fn with_styles(mut self, styles: HighlightStyles) -> Self {
        self.styles = styles;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    // ---- files -----------------------------------------------------------

    /// Open a file, scheduling its first analysis. Opening a path that is
    /// already open keeps the existing session untouched.
    pub fn open_file(&mut self, path: impl Into<PathBuf>, text: &str, now: Instant) {
        let path = path.into();
        if self.sessions.contains_key(&path) {
            return;
        }
        let mut session = EditorSession::open(
            path.clone(),
            text,
            self.config.analysis.debounce(),
            self.styles.clone(),
        );
        session.schedule_analysis(now);
        tracing::debug!("Opened {}", path.display());
        self.sessions.insert(path, session);
    }

    /// Close a file. A run still in flight for it will be dropped when its
    /// result arrives.
    pub fn close_file(&mut self, path: &Path) -> bool {
        let removed = self.sessions.remove(path).is_some();
        if removed {
            tracing::debug!("Closed {}", path.display());
        }
        removed
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.sessions.contains_key(path)
    }

    pub fn session(&self, path: &Path) -> Option<&EditorSession> {
        self.sessions.get(path)
    }

    /// Mutable session access; all edits flow through here.
    pub fn session_mut(&mut self, path: &Path) -> Option<&mut EditorSession> {
        self.sessions.get_mut(path)
    }

    pub fn open_files(&self) -> impl Iterator<Item = &Path> {
        self.sessions.keys().map(PathBuf::as_path)
    }

    // ---- pump ------------------------------------------------------------

    /// One control-thread tick.
    pub fn pump(&mut self, now: Instant) {
        self.drain_bridge(now);
        self.dispatch_due(now);
        self.settings.maybe_flush(now);
    }

    /// Any session still owes a run or has one in flight.
    pub fn analysis_pending(&self) -> bool {
        self.sessions
            .values()
            .any(|s| s.needs_reanalysis() || s.is_analyzing())
    }

    fn drain_bridge(&mut self, now: Instant) {
        while let Some(message) = self.bridge.try_recv() {
            match message {
                AsyncMessage::AnalysisFinished {
                    path,
                    generation,
                    result,
                } => match self.sessions.get_mut(&path) {
                    Some(session) => {
                        session.complete(generation, result, now);
                    }
                    None => {
                        if !self.logged_dropped_result {
                            tracing::warn!(
                                "Dropping analysis result for closed file {}",
                                path.display()
                            );
                            self.logged_dropped_result = true;
                        }
                    }
                },
                AsyncMessage::TargetList(Ok(list)) => {
                    tracing::debug!("Daemon returned {} targets", list.len());
                    self.target_list = Some(list);
                }
                AsyncMessage::TargetList(Err(e)) => {
                    tracing::warn!("Target list query failed: {}", e);
                }
                AsyncMessage::TargetInfo(Ok(info)) => {
                    if self.settings.default_build_target() == Some(info.name.as_str()) {
                        tracing::debug!("Default target {} resolved", info.name);
                        self.target_info = Some(info);
                        self.reschedule_unanalyzed(now);
                    } else {
                        tracing::debug!(
                            "Ignoring target info for {}: no longer the default target",
                            info.name
                        );
                    }
                }
                AsyncMessage::TargetInfo(Err(e)) => {
                    tracing::warn!("Target info query failed: {}", e);
                }
                AsyncMessage::Build(event) => {
                    if matches!(event, BuildEvent::Exited(_) | BuildEvent::Failed(_)) {
                        self.build_running = false;
                    }
                    self.build_events.push(event);
                }
            }
        }
    }

    fn dispatch_due(&mut self, now: Instant) {
        let due: Vec<PathBuf> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.controller().deadline().is_some_and(|d| d <= now))
            .map(|(p, _)| p.clone())
            .collect();

        for path in due {
            let compile = self.resolve_compile_context(&path);
            let open_files = self.capture_open_files();
            let Some(session) = self.sessions.get_mut(&path) else {
                continue;
            };
            let Some(plan) = session.poll_dispatch(now) else {
                continue;
            };

            match compile {
                Some(compile) => {
                    let text = open_files
                        .get(&path)
                        .cloned()
                        .unwrap_or_else(|| session.capture_text());
                    self.engine.dispatch(
                        AnalyzeRequest {
                            path,
                            text,
                            compile,
                            open_files,
                        },
                        plan,
                    );
                }
                None => {
                    // The run cannot start; settle it as failed on the spot
                    // so the controller is not left waiting for a completion.
                    if self.logged_missing_context.insert(path.clone()) {
                        tracing::info!(
                            "No compile context for {}, analysis stays off until one appears",
                            path.display()
                        );
                    }
                    session.complete(plan.generation, Err(AnalysisError::NoCompileContext), now);
                }
            }
        }
    }

    /// Compile context for a file: the project index entry when there is
    /// one, otherwise a context synthesized from the default build target
    /// for recognized source files.
    fn resolve_compile_context(&self, path: &Path) -> Option<CompileContext> {
        if let Some(project) = &self.project {
            if let Some(context) = project.lookup(path) {
                return Some(context);
            }
        }
        if !self.config.analysis.is_source_file(path) {
            return None;
        }
        let info = self.target_info.as_ref()?;
        let directory = self
            .project
            .as_ref()
            .map(|p| p.root().to_path_buf())
            .or_else(|| path.parent().map(Path::to_path_buf))?;
        Some(CompileContext::synthesize(path, &directory, info))
    }

    fn capture_open_files(&self) -> OpenFileSet {
        let mut set = OpenFileSet::new();
        for (path, session) in &self.sessions {
            set.insert(path.clone(), session.capture_text());
        }
        set
    }

    /// Files whose analysis never produced a snapshot get another chance
    /// once project or target context shows up.
    fn reschedule_unanalyzed(&mut self, now: Instant) {
        self.logged_missing_context.clear();
        for session in self.sessions.values_mut() {
            if session.committed().is_none()
                && !session.is_analyzing()
                && !session.needs_reanalysis()
            {
                session.schedule_analysis(now);
            }
        }
    }

    // ---- project / daemon ------------------------------------------------

    pub fn load_project(&mut self, path: &Path, now: Instant) -> Result<(), ProjectError> {
        let index = CompileCommandIndex::load(path)?;
        tracing::info!(
            "Loaded {} compile commands from {}",
            index.len(),
            path.display()
        );
        self.project = Some(index);
        self.reschedule_unanalyzed(now);
        Ok(())
    }

    pub fn project(&self) -> Option<&CompileCommandIndex> {
        self.project.as_ref()
    }

    /// Kick off a target-list query; the reply lands on a later pump.
    /// Returns false when no daemon is configured.
    pub fn request_target_list(&mut self) -> bool {
        let Some(command) = self.config.build.daemon_command.clone() else {
            tracing::debug!("No daemon command configured; target list unavailable");
            return false;
        };
        self.engine
            .fetch_target_list(command, self.config.build.daemon_args.clone());
        true
    }

    /// Kick off a target-info query for the default build target.
    pub fn request_default_target_info(&mut self) -> bool {
        let Some(name) = self.settings.default_build_target().map(str::to_string) else {
            tracing::debug!("No default build target set");
            return false;
        };
        let Some(command) = self.config.build.daemon_command.clone() else {
            tracing::debug!("No daemon command configured; target info unavailable");
            return false;
        };
        self.engine
            .fetch_target_info(command, self.config.build.daemon_args.clone(), name);
        true
    }

    pub fn set_default_target(&mut self, name: impl Into<String>) {
        self.settings.set_default_build_target(name);
        self.target_info = None;
        self.request_default_target_info();
    }

    pub fn target_list(&self) -> Option<&[String]> {
        self.target_list.as_deref()
    }

    pub fn default_target_info(&self) -> Option<&TargetInfo> {
        self.target_info.as_ref()
    }

    // ---- build -----------------------------------------------------------

    /// Start the configured build command. Output and exit arrive as build
    /// events on later pumps.
    pub fn start_build(&mut self) -> bool {
        if self.build_running {
            tracing::warn!("Build already running");
            return false;
        }
        let command = &self.config.build.build_command;
        if command.is_empty() {
            tracing::warn!("No build command configured");
            return false;
        }
        let wants_target = command.iter().any(|a| a == "{target}");
        let target = self.settings.default_build_target().map(str::to_string);
        if wants_target && target.is_none() {
            tracing::warn!("Build command needs a target but none is set");
            return false;
        }

        let argv: Vec<String> = command
            .iter()
            .map(|arg| {
                if arg == "{target}" {
                    target.clone().unwrap_or_default()
                } else {
                    arg.clone()
                }
            })
            .collect();
        let directory = self
            .project
            .as_ref()
            .map(|p| p.root().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        tracing::info!("Starting build: {}", argv.join(" "));
        self.engine.start_build(argv, directory);
        self.build_running = true;
        true
    }

    pub fn build_running(&self) -> bool {
        self.build_running
    }

    pub fn take_build_events(&mut self) -> Vec<BuildEvent> {
        std::mem::take(&mut self.build_events)
    }

    // ---- queries ---------------------------------------------------------

    pub fn line_overlay(&self, path: &Path, line: usize) -> Vec<StyledSpan> {
        self.sessions
            .get(path)
            .map_or_else(Vec::new, |s| s.line_overlay(line))
    }

    pub fn completions(&self, path: &Path, cursor: Cursor) -> Vec<Completion> {
        self.sessions
            .get(path)
            .map_or_else(Vec::new, |s| s.completions(cursor))
    }

    /// Definition jump. Same-file targets are mapped back through the line
    /// map so the jump lands where the line lives now; other files keep the
    /// coordinates of the copy that was analyzed.
    pub fn goto_definition(&self, path: &Path, cursor: Cursor) -> Result<Location, NoDefinition> {
        let session = self.sessions.get(path).ok_or(NoDefinition)?;
        let location = session.goto_definition(cursor)?;
        if location.path.as_path() == path {
            let line = session
                .buffer_line_for_committed(location.line)
                .ok_or(NoDefinition)?;
            return Ok(Location {
                path: location.path,
                line,
                column: location.column,
            });
        }
        Ok(location)
    }

    // ---- shutdown --------------------------------------------------------

    /// Final synchronous flush of anything dirty.
    pub fn shutdown(&mut self, now: Instant) {
        if self.settings.is_dirty() {
            if let Err(e) = self.settings.flush(now) {
                tracing::warn!("Failed to save settings on shutdown: {}", e);
            }
        }
    }
}
