//! Configuration module
//!
//! User settings loaded from `config.toml` and the saved connection
//! profiles that live alongside them.

pub mod config;

pub use config::{BehaviorConfig, Config, DisplayConfig};
