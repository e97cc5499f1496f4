//! Build subprocess runner.
//!
//! Runs a build or lint command and pumps its output, line by line, into a
//! channel the control thread drains into whatever terminal-like surface
//! the front end has. Stdout and stderr are read concurrently so neither
//! pipe can fill up and stall the child.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

/// Which pipe a line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStream {
    Stdout,
    Stderr,
}

/// Events a running build emits, ending with exactly one `Failed` or
/// `Exited`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    OutputLine { stream: BuildStream, line: String },
    /// The command could not be started or waited on.
    Failed(String),
    /// Exit code, `None` when the child was killed by a signal.
    Exited(Option<i32>),
}

#[derive(Debug)]
pub enum BuildError {
    EmptyCommand,
    SpawnError(String),
    IoError(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::EmptyCommand => write!(f, "empty build command"),
            BuildError::SpawnError(msg) => write!(f, "failed to spawn build: {}", msg),
            BuildError::IoError(msg) => write!(f, "build IO error: {}", msg),
        }
    }
}

impl std::error::Error for BuildError {}

/// Run `argv` in `directory`, streaming output into `sink` until both
/// pipes reach EOF, then report the exit status. The terminal event is
/// also sent through `sink`, so callers that only watch the channel see
/// the whole lifecycle.
pub async fn run(
    argv: &[String],
    directory: &Path,
    sink: UnboundedSender<BuildEvent>,
) -> Result<Option<i32>, BuildError> {
    let Some((program, args)) = argv.split_first() else {
        let _ = sink.send(BuildEvent::Failed("empty build command".to_string()));
        return Err(BuildError::EmptyCommand);
    };

    tracing::info!("running build: {:?} in {:?}", argv, directory);

    let spawned = Command::new(program)
        .args(args)
        .current_dir(directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let msg = format!("{}: {}", program, e);
            let _ = sink.send(BuildEvent::Failed(msg.clone()));
            return Err(BuildError::SpawnError(msg));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BuildError::IoError("stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| BuildError::IoError("stderr not captured".to_string()))?;

    let out_pump = tokio::spawn(pump_lines(stdout, BuildStream::Stdout, sink.clone()));
    let err_pump = tokio::spawn(pump_lines(stderr, BuildStream::Stderr, sink.clone()));

    let status = child
        .wait()
        .await
        .map_err(|e| BuildError::IoError(format!("wait: {}", e)))?;

    // Both pipes hit EOF once the child is gone; join to flush the tail.
    let _ = out_pump.await;
    let _ = err_pump.await;

    let code = status.code();
    tracing::info!("build exited with {:?}", code);
    let _ = sink.send(BuildEvent::Exited(code));
    Ok(code)
}

async fn pump_lines<R: AsyncRead + Unpin>(
    reader: R,
    stream: BuildStream,
    sink: UnboundedSender<BuildEvent>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                // Even with the receiver gone, keep draining so the child
                // never blocks on a full pipe.
                let _ = sink.send(BuildEvent::OutputLine { stream, line });
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("build output read error on {:?}: {}", stream, e);
                break;
            }
        }
    }
}
