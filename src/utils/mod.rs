//! Utility functions and helpers
//!
//! Application directories and the logging setup shared by the binary
//! and the `\logs` command.

pub mod app_paths;
pub mod logging;
