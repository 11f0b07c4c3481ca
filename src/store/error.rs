use thiserror::Error;

/// Failures surfaced by the store manager.
///
/// Backend messages are carried verbatim; nothing here interprets them.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Bad credentials, unreachable host, missing driver
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Malformed SQL or a backend-side error while running a query
    #[error("Query failed: {0}")]
    Query(String),

    /// The backend rejected a write (types, constraints, schema)
    #[error("Write failed: {0}")]
    Persistence(String),

    /// A connection parameter was missing before any attempt was made
    #[error("Invalid connection settings: {0}")]
    InvalidConfig(String),

    #[error("No external database connection is active")]
    NotConnected,

    #[error("Table '{0}' already exists")]
    TableExists(String),

    /// The async runtime backing the drivers could not be started
    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
