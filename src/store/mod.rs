//! Store manager
//!
//! Owns exactly one active relational store. At startup that is an
//! in-memory SQLite database; `connect` switches every read and write to
//! an external database until `disconnect`. The in-memory store is kept
//! alive underneath and comes back untouched.
//!
//! The drivers are async; the manager runs them on its own current-thread
//! runtime and blocks, so every operation completes before it returns.

pub mod backend;
pub mod connection;
pub mod dialect;
pub mod error;

use crate::data::datatable::DataTable;
use crate::data::normalizer::NormalizedFrame;
use backend::WriteMode;
use connection::{BackendKind, ConnectionConfig};
use dialect::Dialect;
use error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use sqlx::any::AnyConnection;
use sqlx::Connection;
use std::fmt;
use std::str::FromStr;
use tokio::runtime::Runtime;
use tracing::{info, warn};

pub use connection::SqlServerAuth;

const EPHEMERAL_URL: &str = "sqlite::memory:";
const RESULT_TABLE_NAME: &str = "result";

/// Which store currently serves queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Ephemeral,
    ExternalConnected(BackendKind),
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreState::Ephemeral => f.write_str("in-memory store"),
            StoreState::ExternalConnected(kind) => write!(f, "external {}", kind),
        }
    }
}

/// What `export` does when the destination table already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Drop and recreate the table
    #[default]
    Replace,
    /// Insert into the existing table; schema checks are the backend's
    Append,
    /// Refuse and leave the table alone
    Fail,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(ConflictPolicy::Replace),
            "append" => Ok(ConflictPolicy::Append),
            "fail" => Ok(ConflictPolicy::Fail),
            other => Err(format!(
                "unknown conflict policy '{}' (expected replace, append or fail)",
                other
            )),
        }
    }
}

struct ExternalStore {
    conn: AnyConnection,
    config: ConnectionConfig,
}

impl ExternalStore {
    fn dialect(&self) -> Dialect {
        Dialect::new(self.config.kind())
    }
}

pub struct StoreManager {
    // Connections are declared before the runtime so they are dropped
    // while it is still alive.
    ephemeral: AnyConnection,
    external: Option<ExternalStore>,
    current_table: Option<String>,
    last_result: Option<DataTable>,
    runtime: Runtime,
}

impl StoreManager {
    /// Start with an empty in-memory store
    pub fn new() -> StoreResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Runtime(e.to_string()))?;

        let ephemeral = open_ephemeral(&runtime)?;
        info!(target: "store", "In-memory store ready");

        Ok(Self {
            ephemeral,
            external: None,
            current_table: None,
            last_result: None,
            runtime,
        })
    }

    pub fn state(&self) -> StoreState {
        match &self.external {
            Some(external) => StoreState::ExternalConnected(external.config.kind()),
            None => StoreState::Ephemeral,
        }
    }

    /// One-line description of the active store
    pub fn describe(&self) -> String {
        match &self.external {
            Some(external) => format!("Connected to {}", external.config),
            None => match &self.current_table {
                Some(table) => format!("In-memory store (table '{}')", table),
                None => "In-memory store (empty)".to_string(),
            },
        }
    }

    /// Name of the table the last successful `load` wrote
    pub fn current_table(&self) -> Option<&str> {
        self.current_table.as_deref()
    }

    /// Result of the last successful `execute`
    pub fn last_result(&self) -> Option<&DataTable> {
        self.last_result.as_ref()
    }

    /// Open an external database and make it the active store.
    ///
    /// A previous external connection is released only after the new one
    /// is up; on failure nothing changes.
    pub fn connect(&mut self, config: ConnectionConfig) -> StoreResult<String> {
        config.validate()?;
        info!(target: "store", "Connecting to {}", config);

        let options = config.connect_options();
        let conn = self
            .runtime
            .block_on(AnyConnection::connect_with(&options))
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let message = format!("Connected to {}", config);
        if let Some(previous) = self.external.replace(ExternalStore { conn, config }) {
            self.close_external(previous);
        }

        info!(target: "store", "{}", message);
        Ok(message)
    }

    /// Release the external connection and fall back to the in-memory store
    pub fn disconnect(&mut self) -> StoreResult<String> {
        let external = self.external.take().ok_or(StoreError::NotConnected)?;
        let message = format!("Disconnected from {}", external.config);
        self.close_external(external);

        info!(target: "store", "{}", message);
        Ok(message)
    }

    fn close_external(&self, external: ExternalStore) {
        if let Err(e) = self.runtime.block_on(external.conn.close()) {
            warn!(target: "store", "Error closing {}: {}", external.config, e);
        }
    }

    /// Persist `frame` into the active store, replacing any table named
    /// `table_name`
    pub fn load(&mut self, frame: &NormalizedFrame, table_name: &str) -> StoreResult<String> {
        ensure_columns(frame.table(), table_name)?;
        let (runtime, conn, dialect) = self.active();
        let rows = runtime
            .block_on(backend::write_table(
                conn,
                dialect,
                frame.table(),
                table_name,
                WriteMode::Replace,
            ))
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        self.current_table = Some(table_name.to_string());
        info!(
            target: "store",
            "Loaded {} rows into '{}' ({})",
            rows,
            table_name,
            self.state()
        );
        Ok(format!("Data loaded into table '{}' ({} rows)", table_name, rows))
    }

    /// Run `query` verbatim against the active store
    pub fn execute(&mut self, query: &str) -> StoreResult<DataTable> {
        let (runtime, conn, _) = self.active();
        let result = runtime
            .block_on(backend::fetch_table(conn, query, RESULT_TABLE_NAME))
            .map_err(|e| StoreError::Query(e.to_string()))?;

        self.last_result = Some(result.clone());
        Ok(result)
    }

    /// Write `frame` into the external database under `table_name`
    pub fn export(
        &mut self,
        frame: &DataTable,
        table_name: &str,
        policy: ConflictPolicy,
    ) -> StoreResult<String> {
        let Some(external) = self.external.as_mut() else {
            return Err(StoreError::NotConnected);
        };
        ensure_columns(frame, table_name)?;
        let dialect = external.dialect();
        let conn = &mut external.conn;

        let mode = match policy {
            ConflictPolicy::Replace => WriteMode::Replace,
            ConflictPolicy::Append => WriteMode::Append,
            ConflictPolicy::Fail => {
                let exists = self
                    .runtime
                    .block_on(backend::table_exists(conn, dialect, table_name))
                    .map_err(|e| StoreError::Query(e.to_string()))?;
                if exists {
                    return Err(StoreError::TableExists(table_name.to_string()));
                }
                WriteMode::Replace
            }
        };

        let rows = self
            .runtime
            .block_on(backend::write_table(conn, dialect, frame, table_name, mode))
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        info!(
            target: "store",
            "Exported {} rows to '{}' ({:?})",
            rows,
            table_name,
            policy
        );
        Ok(format!("Exported {} rows to table '{}'", rows, table_name))
    }

    /// Tables of the active store
    pub fn list_tables(&mut self) -> StoreResult<Vec<String>> {
        let (runtime, conn, dialect) = self.active();
        runtime
            .block_on(backend::list_tables(conn, dialect))
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Throw away the in-memory store and start a fresh, empty one
    pub fn reset_ephemeral(&mut self) -> StoreResult<String> {
        let fresh = open_ephemeral(&self.runtime)?;
        let old = std::mem::replace(&mut self.ephemeral, fresh);
        if let Err(e) = self.runtime.block_on(old.close()) {
            warn!(target: "store", "Error closing in-memory store: {}", e);
        }
        if self.external.is_none() {
            self.current_table = None;
        }

        info!(target: "store", "In-memory store cleared");
        Ok("In-memory store cleared".to_string())
    }

    fn active(&mut self) -> (&Runtime, &mut AnyConnection, Dialect) {
        match self.external.as_mut() {
            Some(external) => {
                let dialect = external.dialect();
                (&self.runtime, &mut external.conn, dialect)
            }
            None => (
                &self.runtime,
                &mut self.ephemeral,
                Dialect::new(BackendKind::Sqlite),
            ),
        }
    }
}

fn open_ephemeral(runtime: &Runtime) -> StoreResult<AnyConnection> {
    runtime
        .block_on(AnyConnection::connect(EPHEMERAL_URL))
        .map_err(|e| StoreError::Connection(e.to_string()))
}

/// Reject zero-column tables before any DDL runs
fn ensure_columns(table: &DataTable, table_name: &str) -> StoreResult<()> {
    if table.column_count() == 0 {
        return Err(StoreError::Persistence(format!(
            "nothing to write to '{}': the data has no columns",
            table_name
        )));
    }
    Ok(())
}
