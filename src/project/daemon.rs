//! Build-system daemon client.
//!
//! The build system exposes target metadata through a long-running daemon.
//! We speak newline-delimited JSON to it over a spawned subprocess's stdio:
//! one request line out, one response line back. Only two queries exist,
//! `get_target_list` and `get_target_info`.
//!
//! A missing daemon is an expected deployment state, not an error: spawn
//! failure surfaces as `Ok(None)` so callers disable target-based features
//! and move on. Editing and raw build commands keep working without it.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Metadata the build system knows about one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub name: String,
    pub output_path: String,
    #[serde(default)]
    pub compile_definitions: Vec<String>,
    #[serde(default)]
    pub compile_options: Vec<String>,
    #[serde(default)]
    pub include_directories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum DaemonRequest {
    GetTargetList,
    GetTargetInfo { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum DaemonResponse {
    TargetList(Vec<String>),
    TargetInfo(TargetInfo),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// No daemon is running or configured. Target features are off.
    Unavailable,
    IoError(String),
    /// The daemon answered with something other than what was asked.
    ProtocolError(String),
    /// The daemon itself reported a failure.
    RemoteError(String),
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonError::Unavailable => write!(f, "build daemon unavailable"),
            DaemonError::IoError(msg) => write!(f, "daemon IO error: {}", msg),
            DaemonError::ProtocolError(msg) => write!(f, "daemon protocol error: {}", msg),
            DaemonError::RemoteError(msg) => write!(f, "daemon error: {}", msg),
        }
    }
}

impl std::error::Error for DaemonError {}

/// Request/response channel to a daemon. Production uses subprocess stdio;
/// tests script responses in memory.
#[async_trait]
pub trait DaemonTransport: Send {
    async fn request(&mut self, request: DaemonRequest) -> Result<DaemonResponse, DaemonError>;
}

/// JSON-lines transport over a spawned daemon subprocess.
pub struct StdioTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl StdioTransport {
    /// Spawn the daemon command. `Ok(None)` when the command does not
    /// exist, so callers can degrade instead of failing.
    pub fn spawn(command: &str, args: &[String]) -> Result<Option<Self>, DaemonError> {
        let spawned = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("build daemon command {:?} not found", command);
                return Ok(None);
            }
            Err(e) => return Err(DaemonError::IoError(format!("spawn {:?}: {}", command, e))),
        };

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DaemonError::IoError("daemon stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DaemonError::IoError("daemon stdout not captured".to_string()))?;

        Ok(Some(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        }))
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        // kill_on_drop reaps the child; start_kill here makes shutdown
        // prompt when the client is dropped mid-request.
        let _ = self.child.start_kill();
    }
}

#[async_trait]
impl DaemonTransport for StdioTransport {
    async fn request(&mut self, request: DaemonRequest) -> Result<DaemonResponse, DaemonError> {
        let mut line = serde_json::to_string(&request)
            .map_err(|e| DaemonError::ProtocolError(format!("encode request: {}", e)))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DaemonError::IoError(format!("write request: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| DaemonError::IoError(format!("flush request: {}", e)))?;

        let reply = self
            .stdout
            .next_line()
            .await
            .map_err(|e| DaemonError::IoError(format!("read response: {}", e)))?
            .ok_or(DaemonError::Unavailable)?;

        serde_json::from_str(&reply)
            .map_err(|e| DaemonError::ProtocolError(format!("decode response: {}", e)))
    }
}

/// Typed query interface over any transport.
pub struct DaemonClient {
    transport: Box<dyn DaemonTransport>,
}

impl DaemonClient {
    pub fn new(transport: Box<dyn DaemonTransport>) -> Self {
        Self { transport }
    }

    /// Spawn and wrap the configured daemon. `Ok(None)` when there is no
    /// daemon to talk to.
    pub fn spawn(command: &str, args: &[String]) -> Result<Option<Self>, DaemonError> {
        Ok(StdioTransport::spawn(command, args)?.map(|t| Self::new(Box::new(t))))
    }

    pub async fn target_list(&mut self) -> Result<Vec<String>, DaemonError> {
        match self.transport.request(DaemonRequest::GetTargetList).await? {
            DaemonResponse::TargetList(names) => Ok(names),
            DaemonResponse::Error(msg) => Err(DaemonError::RemoteError(msg)),
            other => Err(DaemonError::ProtocolError(format!(
                "expected target list, got {:?}",
                other
            ))),
        }
    }

    pub async fn target_info(&mut self, name: &str) -> Result<TargetInfo, DaemonError> {
        let request = DaemonRequest::GetTargetInfo {
            name: name.to_string(),
        };
        match self.transport.request(request).await? {
            DaemonResponse::TargetInfo(info) => Ok(info),
            DaemonResponse::Error(msg) => Err(DaemonError::RemoteError(msg)),
            other => Err(DaemonError::ProtocolError(format!(
                "expected target info, got {:?}",
                other
            ))),
        }
    }
}
