//! Project-level metadata and build integration
//!
//! Everything that makes the pipeline project-aware rather than
//! file-at-a-time: the compile-command database, the build-system daemon
//! client, and the build subprocess runner.

pub mod build;
pub mod compile_commands;
pub mod daemon;

pub use build::{BuildError, BuildEvent, BuildStream};
pub use compile_commands::{CompileCommandIndex, CompileContext, ProjectError};
pub use daemon::{DaemonClient, DaemonError, DaemonTransport, TargetInfo};
