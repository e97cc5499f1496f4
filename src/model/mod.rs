//! Core data model for open files
//!
//! Pure data structures with no async or I/O dependencies: the line buffer
//! and the per-line analysis index map kept in lockstep with it.

pub mod buffer;
pub mod line_map;
