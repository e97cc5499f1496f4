//! Tracing subscriber setup
//!
//! Shared between the binary and integration tests. Logs go to a file so
//! the terminal stays free for program output.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber with file logging.
///
/// Environment-based filtering (RUST_LOG) applies on top of an INFO
/// default. Returns false when the log file could not be created; the
/// process then runs unlogged rather than failing.
pub fn init_global(log_file_path: &Path) -> bool {
    if let Some(parent) = log_file_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(log_file) = File::create(log_file_path) else {
        return false;
    };
    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    build_subscriber(log_file, env_filter).init();
    true
}

/// Build the subscriber. This is the core configuration shared between
/// production and tests; tests pass an explicit filter.
pub fn build_subscriber(
    log_file: File,
    env_filter: EnvFilter,
) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
}
