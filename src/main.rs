use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use limn::analysis::snapshot::AnnotationKind;
use limn::config::{Config, Directories};
use limn::project::build::{BuildEvent, BuildStream};
use limn::services::time_source::{RealTimeSource, TimeSource};
use limn::services::tracing_setup;
use limn::settings::Settings;
use limn::workspace::Workspace;
use std::path::PathBuf;
use std::time::Duration;

/// Background code analysis for C/C++ sources
#[derive(Parser, Debug)]
#[command(name = "limn")]
#[command(about = "Analyze source files with editor-grade background analysis", long_about = None)]
#[command(version)]
struct Args {
    /// Files to analyze
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Path to a compile_commands.json project index
    #[arg(long, value_name = "PATH")]
    project: Option<PathBuf>,

    /// Set the default build target before analyzing
    #[arg(long, value_name = "NAME")]
    target: Option<String>,

    /// Query the build daemon for the target list and exit
    #[arg(long)]
    list_targets: bool,

    /// Run the configured build command
    #[arg(long)]
    build: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file (default: limn.log in the data directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

const PUMP_INTERVAL: Duration = Duration::from_millis(15);
const ANALYSIS_DEADLINE: Duration = Duration::from_secs(30);
const DAEMON_DEADLINE: Duration = Duration::from_secs(5);

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    let directories = Directories::from_system().context("Failed to locate system directories")?;
    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| directories.data_dir.join("limn.log"));
    tracing_setup::init_global(&log_file);
    tracing::info!("limn starting");

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&directories.config_path()),
    };

    let time = RealTimeSource::new();
    let settings = Settings::load(directories.settings_path(), time.now());
    let mut workspace =
        Workspace::new(config, settings).context("Failed to start the analysis engine")?;

    if let Some(target) = &args.target {
        workspace.set_default_target(target.clone());
    } else {
        workspace.request_default_target_info();
    }

    if let Some(project) = &args.project {
        if let Err(e) = workspace.load_project(project, time.now()) {
            eprintln!(
                "Warning: could not load project index {}: {}",
                project.display(),
                e
            );
        }
    }

    if args.list_targets {
        list_targets(&mut workspace, &time);
        workspace.shutdown(time.now());
        return Ok(());
    }

    if args.files.is_empty() && !args.build {
        println!("Nothing to do: pass source files, --list-targets or --build");
        // A bare --target run still has a settings change to persist.
        workspace.shutdown(time.now());
        return Ok(());
    }

    let opened = open_requested_files(&mut workspace, &args.files, &time);
    if !opened.is_empty() {
        pump_until_quiet(&mut workspace, &time);
        report(&workspace, &opened);
    }

    let result = if args.build {
        run_build(&mut workspace, &time)
    } else {
        Ok(())
    };

    workspace.shutdown(time.now());
    result
}

fn open_requested_files(
    workspace: &mut Workspace,
    files: &[PathBuf],
    time: &RealTimeSource,
) -> Vec<PathBuf> {
    let mut opened = Vec::new();
    for file in files {
        let path = std::fs::canonicalize(file).unwrap_or_else(|_| file.clone());
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                workspace.open_file(path.clone(), &text, time.now());
                opened.push(path);
            }
            Err(e) => eprintln!("Warning: could not read {}: {}", file.display(), e),
        }
    }
    opened
}

/// Pump the workspace until every open file settled or the deadline hits.
fn pump_until_quiet(workspace: &mut Workspace, time: &RealTimeSource) {
    let stop_at = time.now() + ANALYSIS_DEADLINE;
    loop {
        workspace.pump(time.now());
        if !workspace.analysis_pending() {
            return;
        }
        if time.now() >= stop_at {
            tracing::warn!("Analysis did not settle before the deadline");
            return;
        }
        time.sleep(PUMP_INTERVAL);
    }
}

fn report(workspace: &Workspace, paths: &[PathBuf]) {
    for path in paths {
        let Some(session) = workspace.session(path) else {
            continue;
        };
        if session.committed().is_none() {
            println!("{}: no compile context, analysis skipped", path.display());
            continue;
        }

        let mut annotations = 0usize;
        let mut diagnostics = Vec::new();
        for line in 0..session.buffer().line_count() {
            for span in session.line_overlay(line) {
                annotations += 1;
                if span.kind.is_diagnostic() {
                    diagnostics.push((line, span));
                }
            }
        }

        println!(
            "{}: {} lines, {} annotations, {} diagnostics",
            path.display(),
            session.buffer().line_count(),
            annotations,
            diagnostics.len()
        );
        for (line, span) in diagnostics {
            let severity = match span.kind {
                AnnotationKind::Warning => "warning",
                _ => "error",
            };
            println!(
                "  {}:{}:{}: {}: {}",
                path.display(),
                line + 1,
                span.start + 1,
                severity,
                span.message.as_deref().unwrap_or("diagnostic")
            );
        }
    }
}

fn list_targets(workspace: &mut Workspace, time: &RealTimeSource) {
    if !workspace.request_target_list() {
        println!("Build daemon unavailable: no daemon command configured");
        return;
    }

    let stop_at = time.now() + DAEMON_DEADLINE;
    while workspace.target_list().is_none() && time.now() < stop_at {
        workspace.pump(time.now());
        time.sleep(PUMP_INTERVAL);
    }

    match workspace.target_list() {
        Some([]) => println!("No targets"),
        Some(targets) => {
            let default = workspace.settings().default_build_target();
            for name in targets {
                if Some(name.as_str()) == default {
                    println!("{name} (default)");
                } else {
                    println!("{name}");
                }
            }
        }
        None => println!("Build daemon unavailable or not responding"),
    }
}

fn run_build(workspace: &mut Workspace, time: &RealTimeSource) -> AnyhowResult<()> {
    if !workspace.start_build() {
        anyhow::bail!("Build could not start; check build.build_command in the config");
    }

    loop {
        workspace.pump(time.now());
        for event in workspace.take_build_events() {
            match event {
                BuildEvent::OutputLine { stream, line } => match stream {
                    BuildStream::Stdout => println!("{line}"),
                    BuildStream::Stderr => eprintln!("{line}"),
                },
                BuildEvent::Failed(msg) => anyhow::bail!("Build failed to start: {msg}"),
                BuildEvent::Exited(Some(0)) => return Ok(()),
                BuildEvent::Exited(Some(code)) => anyhow::bail!("Build exited with status {code}"),
                BuildEvent::Exited(None) => anyhow::bail!("Build terminated by a signal"),
            }
        }
        time.sleep(PUMP_INTERVAL);
    }
}
