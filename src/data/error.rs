//! Error types for data operations
//!
//! Loading a file and writing a CSV export each have their own error
//! enum so callers can tell a malformed input apart from a failed sink.

use thiserror::Error;

/// Errors that can occur while turning a file into a [`DataTable`](super::datatable::DataTable)
#[derive(Error, Debug)]
pub enum LoadError {
    /// IO error from std::io
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error from serde_json
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet could not be opened or read
    #[error("Excel error: {0}")]
    Excel(String),

    /// dBase file could not be read
    #[error("DBF error: {0}")]
    Dbf(String),

    /// Format not recognised or not compiled in
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// The file parsed but produced no rows or no columns
    #[error("File contains no data or has an unsupported structure")]
    Empty,

    /// The document parsed but its shape cannot become a table
    #[error("Unsupported data shape: {0}")]
    Shape(String),
}

/// Errors from the CSV export sink
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No data to export")]
    NoData,
}

/// Result type alias for loading operations
pub type LoadResult<T> = Result<T, LoadError>;

impl From<String> for LoadError {
    fn from(s: String) -> Self {
        LoadError::Shape(s)
    }
}
