//! Data module
//!
//! The in-memory table model, the file loaders that produce it, the
//! normalization pass that makes it safe to persist, and the CSV sink.

pub mod datatable;
pub mod error;
pub mod exporter;
pub mod loaders;
pub mod normalizer;
