//! One interactive session: the store manager, the user's settings and
//! whatever was loaded or queried last.

use crate::commands::{parse_command, Command, ConnectTarget};
use crate::config::Config;
use crate::data::datatable::DataTable;
use crate::data::exporter::export_csv;
use crate::data::loaders::load_file;
use crate::data::normalizer::{normalize, NormalizationReport};
use crate::display::frame_summary;
use crate::store::StoreManager;
use crate::utils::logging::{log_file_path, LogRingBuffer};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What the caller should do after a line was handled
#[derive(Debug)]
pub enum Outcome {
    Message(String),
    Table(DataTable),
    Clear,
    Quit,
}

/// The frame most recently loaded from a file
#[derive(Debug)]
pub struct LoadedFrame {
    pub source: PathBuf,
    pub table: DataTable,
    pub report: NormalizationReport,
}

pub struct Session {
    store: StoreManager,
    config: Config,
    logs: Option<LogRingBuffer>,
    last_loaded: Option<LoadedFrame>,
}

impl Session {
    pub fn new(config: Config) -> Result<Self> {
        let store = StoreManager::new().context("Failed to start the in-memory store")?;
        Ok(Self {
            store,
            config,
            logs: None,
            last_loaded: None,
        })
    }

    /// Attach the log buffer `\logs` reads from
    pub fn with_log_buffer(mut self, buffer: LogRingBuffer) -> Self {
        self.logs = Some(buffer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &StoreManager {
        &self.store
    }

    pub fn last_loaded(&self) -> Option<&LoadedFrame> {
        self.last_loaded.as_ref()
    }

    /// Parse and run one line of input
    pub fn handle_line(&mut self, line: &str) -> Result<Outcome> {
        let command = parse_command(line).map_err(|e| anyhow!(e))?;
        debug!(target: "session", "Command: {:?}", command);

        match command {
            Command::Help => Ok(Outcome::Message(help_text())),
            Command::Load(path) => self.load_file(&path).map(Outcome::Message),
            Command::Connect(target) => self.connect(target).map(Outcome::Message),
            Command::Disconnect => Ok(Outcome::Message(self.store.disconnect()?)),
            Command::Tables => self.tables().map(Outcome::Message),
            Command::Status => Ok(Outcome::Message(self.status())),
            Command::Info => Ok(Outcome::Message(self.info())),
            Command::ExportCsv(path) => self.export_csv(&path).map(Outcome::Message),
            Command::ExportTable { name, policy } => {
                let policy = policy.unwrap_or(self.config.behavior.default_conflict_policy);
                let frame = self
                    .store
                    .last_result()
                    .cloned()
                    .ok_or_else(|| anyhow!("No results to export. Run a query first."))?;
                Ok(Outcome::Message(self.store.export(&frame, &name, policy)?))
            }
            Command::ExportDataset { name, policy } => {
                let policy = policy.unwrap_or(self.config.behavior.default_conflict_policy);
                let loaded = self
                    .last_loaded
                    .as_ref()
                    .ok_or_else(|| anyhow!("No file loaded. Use \\load <file> first."))?;
                Ok(Outcome::Message(
                    self.store.export(&loaded.table, &name, policy)?,
                ))
            }
            Command::Reset => {
                self.last_loaded = None;
                Ok(Outcome::Message(self.store.reset_ephemeral()?))
            }
            Command::Logs(count) => Ok(Outcome::Message(self.recent_logs(count))),
            Command::Clear => Ok(Outcome::Clear),
            Command::Quit => Ok(Outcome::Quit),
            Command::Sql(query) if query.is_empty() => Ok(Outcome::Message(String::new())),
            Command::Sql(query) => self.execute(&query).map(Outcome::Table),
        }
    }

    /// Read a file, normalize it and persist it into the active store
    /// under the configured table name
    pub fn load_file(&mut self, path: &Path) -> Result<String> {
        let table_name = self.config.behavior.default_table_name.clone();

        let table = load_file(path, &table_name)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let (frame, report) = normalize(table);
        let message = self.store.load(&frame, &table_name)?;

        info!(
            target: "session",
            "Loaded {} ({} rows, {} columns)",
            path.display(),
            frame.row_count(),
            frame.column_count()
        );

        let mut output = message;
        if self.config.behavior.preview_on_load {
            output.push('\n');
            output.push_str(&frame_summary(&frame, Some(&report)));
        }

        self.last_loaded = Some(LoadedFrame {
            source: path.to_path_buf(),
            table: frame.into_inner(),
            report,
        });
        Ok(output)
    }

    /// Run SQL verbatim against the active store
    pub fn execute(&mut self, query: &str) -> Result<DataTable> {
        Ok(self.store.execute(query)?)
    }

    fn connect(&mut self, target: ConnectTarget) -> Result<String> {
        let config = match target {
            ConnectTarget::Config(config) => config,
            ConnectTarget::Profile(name) => self
                .config
                .profile(&name)
                .cloned()
                .ok_or_else(|| anyhow!("No connection profile named '{}'", name))?,
        };
        Ok(self.store.connect(config)?)
    }

    /// Table names for completion; empty when the store cannot list them
    pub fn table_names(&mut self) -> Vec<String> {
        self.store.list_tables().unwrap_or_default()
    }

    fn tables(&mut self) -> Result<String> {
        let tables = self.store.list_tables()?;
        if tables.is_empty() {
            return Ok(format!("No tables in {}", self.store.state()));
        }
        Ok(tables.join("\n"))
    }

    fn status(&self) -> String {
        let mut lines = vec![format!("Store: {}", self.store.describe())];
        lines.push(format!(
            "Current table: {}",
            self.store.current_table().unwrap_or("(none)")
        ));
        match self.store.last_result() {
            Some(result) => lines.push(format!(
                "Last result: {} rows, {} columns",
                result.row_count(),
                result.column_count()
            )),
            None => lines.push("Last result: (none)".to_string()),
        }
        if let Some(path) = log_file_path() {
            lines.push(format!("Log file: {}", path.display()));
        }
        lines.join("\n")
    }

    fn info(&self) -> String {
        match &self.last_loaded {
            Some(loaded) => format!(
                "Source: {}\n{}",
                loaded.source.display(),
                frame_summary(&loaded.table, Some(&loaded.report))
            ),
            None => "No file loaded. Use \\load <file>.".to_string(),
        }
    }

    fn export_csv(&self, path: &Path) -> Result<String> {
        let result = self
            .store
            .last_result()
            .ok_or_else(|| anyhow!("No results to export. Run a query first."))?;
        let rows = export_csv(result, path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        Ok(format!("Exported {} rows to {}", rows, path.display()))
    }

    fn recent_logs(&self, count: usize) -> String {
        let Some(buffer) = &self.logs else {
            return "Logging is not initialized".to_string();
        };
        let entries = buffer.get_recent(count);
        if entries.is_empty() {
            return "No log entries".to_string();
        }
        entries
            .iter()
            .map(|e| e.format_for_display())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn help_text() -> String {
    r#"Commands:
  \help                                   Show this help
  \load <file>                            Load CSV, Excel, DBF or JSON into table 'dataset'
  \connect sqlite <path>                  Use an existing SQLite file as the active store
  \connect mysql host=.. [port=..] user=.. [password=..] database=..
  \connect sqlserver server=.. database=.. [user=.. password=..]
                                          Trusted authentication when no user is given
  \connect @<profile>                     Connect using a saved profile from config.toml
  \disconnect                             Return to the in-memory store
  \tables                                 List tables of the active store
  \status                                 Active store, current table, last result
  \info                                   Summary of the last loaded file
  \export csv <file>                      Write the last result to CSV (UTF-8 with BOM)
  \export table <name> [replace|append|fail]
                                          Write the last result to the external database
  \export dataset <name> [replace|append|fail]
                                          Copy the loaded file to the external database
  \reset                                  Start a fresh in-memory store
  \logs [n]                               Show recent log entries
  \clear                                  Clear the screen
  \quit                                   Exit

Anything else is sent to the active store as SQL, e.g.
  SELECT * FROM dataset LIMIT 10"#
        .to_string()
}
