//! Shared runtime services: the worker-to-control channel, time access,
//! and logging setup.

pub mod async_bridge;
pub mod time_source;
pub mod tracing_setup;
