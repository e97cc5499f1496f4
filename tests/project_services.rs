//! Daemon queries, build subprocesses and settings persistence at the
//! workspace level.
//!
//! The daemon tests speak the real JSON-lines protocol to a shell-script
//! stand-in and the build tests run real subprocesses, so those are
//! unix-only like the rest of the script-backed fixtures.

mod common;

use std::time::{Duration, Instant};

use common::harness::PipelineHarness;
use limn::config::Config;
use limn::settings::Settings;
use limn::workspace::Workspace;
use tempfile::TempDir;

#[cfg(unix)]
use limn::project::{BuildEvent, BuildStream};
#[cfg(unix)]
use std::fs::Permissions;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Answers every info query with target "app" no matter what was asked,
/// which is exactly what the stale-reply test needs.
#[cfg(unix)]
const FAKE_DAEMON: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *get_target_info*)
      printf '%s\n' '{"result":"target_info","value":{"name":"app","output_path":"out/app","compile_definitions":["FEATURE_X=1"],"compile_options":["-O1"],"include_directories":["include"]}}'
      ;;
    *get_target_list*)
      printf '%s\n' '{"result":"target_list","value":["app","tests"]}'
      ;;
  esac
done
"#;

#[cfg(unix)]
fn collect_build_events(h: &mut PipelineHarness) -> Vec<BuildEvent> {
    let mut events = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while h.workspace.build_running() {
        assert!(Instant::now() < deadline, "build did not finish");
        h.pump(ms(0));
        events.extend(h.workspace.take_build_events());
        std::thread::sleep(Duration::from_millis(5));
    }
    events.extend(h.workspace.take_build_events());
    events
}

#[test]
fn unconfigured_services_degrade_quietly() {
    let mut h = PipelineHarness::lexical();

    assert!(!h.workspace.request_target_list());
    assert!(h.workspace.target_list().is_none());
    assert!(!h.workspace.start_build(), "no build command configured");

    // A default target alone is not enough; the daemon is still absent.
    h.workspace.set_default_target("app");
    assert!(!h.workspace.request_default_target_info());
    assert_eq!(h.workspace.settings().default_build_target(), Some("app"));
}

#[test]
fn a_missing_daemon_command_degrades_to_unavailable() {
    let mut h = PipelineHarness::lexical_with_config(|c| {
        c.build.daemon_command = Some("limn-daemon-that-does-not-exist".to_string());
    });

    // The query fires, the spawn fails, the error reply is absorbed and
    // the target list simply never materializes.
    assert!(h.workspace.request_target_list());
    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        h.pump(ms(0));
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(h.workspace.target_list().is_none());
}

#[test]
#[cfg(unix)]
fn target_metadata_flows_back_from_the_daemon() {
    let script_dir = TempDir::new().unwrap();
    let script = script_dir.path().join("fake_daemon.sh");
    std::fs::write(&script, FAKE_DAEMON).unwrap();
    std::fs::set_permissions(&script, Permissions::from_mode(0o755)).unwrap();

    let command = script.display().to_string();
    let mut h = PipelineHarness::lexical_with_config(move |c| {
        c.build.daemon_command = Some(command);
    });

    assert!(h.workspace.request_target_list());
    h.pump_until(ms(0), |ws| ws.target_list().is_some());
    let expected = vec!["app".to_string(), "tests".to_string()];
    assert_eq!(h.workspace.target_list(), Some(expected.as_slice()));

    h.workspace.set_default_target("app");
    h.pump_until(ms(0), |ws| ws.default_target_info().is_some());
    let info = h.workspace.default_target_info().unwrap();
    assert_eq!(info.name, "app");
    assert_eq!(info.compile_definitions, vec!["FEATURE_X=1".to_string()]);

    // The script always answers "app"; once the default moves to "tests"
    // that reply no longer matches and must be dropped, not cached.
    h.workspace.set_default_target("tests");
    assert!(h.workspace.default_target_info().is_none());
    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        h.pump(ms(0));
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(h.workspace.default_target_info().is_none());
}

#[test]
#[cfg(unix)]
fn build_output_streams_line_by_line_until_exit() {
    let mut h = PipelineHarness::lexical_with_config(|c| {
        c.build.build_command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo line one; echo line two; echo bad 1>&2; exit 3".to_string(),
        ];
    });

    assert!(h.workspace.start_build());
    assert!(h.workspace.build_running());
    assert!(!h.workspace.start_build(), "one build at a time");

    let events = collect_build_events(&mut h);

    let stdout_lines: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BuildEvent::OutputLine {
                stream: BuildStream::Stdout,
                line,
            } => Some(line.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(stdout_lines, vec!["line one", "line two"]);
    assert!(events.iter().any(|e| matches!(
        e,
        BuildEvent::OutputLine { stream: BuildStream::Stderr, line } if line == "bad"
    )));
    assert_eq!(events.last(), Some(&BuildEvent::Exited(Some(3))));
    assert!(!h.workspace.build_running());
}

#[test]
#[cfg(unix)]
fn build_substitutes_the_default_target() {
    let mut h = PipelineHarness::lexical_with_config(|c| {
        c.build.build_command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo target is $0".to_string(),
            "{target}".to_string(),
        ];
    });

    // The placeholder needs a target before anything can start.
    assert!(!h.workspace.start_build());

    h.workspace.set_default_target("app");
    assert!(h.workspace.start_build());

    let events = collect_build_events(&mut h);
    assert!(events.iter().any(|e| matches!(
        e,
        BuildEvent::OutputLine { line, .. } if line == "target is app"
    )));
    assert_eq!(events.last(), Some(&BuildEvent::Exited(Some(0))));
}

#[test]
fn settings_flush_is_debounced_through_the_pump() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    let t0 = Instant::now();

    let mut ws = Workspace::new(Config::default(), Settings::load(path.clone(), t0)).unwrap();
    ws.settings_mut().set("editor.tab_width", "4");

    // Inside the save interval nothing hits the disk.
    ws.pump(t0 + Duration::from_secs(1));
    assert!(!path.exists());

    // Past it, the next pump flushes.
    ws.pump(t0 + Duration::from_secs(6));
    assert!(path.exists());
    let reloaded = Settings::load(path, Instant::now());
    assert_eq!(reloaded.get("editor.tab_width"), Some("4"));
}

#[test]
fn settings_survive_workspace_shutdown() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.json");
    let t0 = Instant::now();

    let mut ws = Workspace::new(Config::default(), Settings::load(path.clone(), t0)).unwrap();
    ws.set_default_target("app");
    ws.shutdown(t0);

    let reloaded = Settings::load(path, Instant::now());
    assert_eq!(reloaded.default_build_target(), Some("app"));
}
