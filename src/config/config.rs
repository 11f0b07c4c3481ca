use crate::store::connection::ConnectionConfig;
use crate::store::ConflictPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub behavior: BehaviorConfig,

    /// Saved connection profiles, used as `\connect @name`
    pub connections: BTreeMap<String, ConnectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Maximum rows rendered for a result; queries and exports are not capped
    pub max_display_rows: usize,

    /// Marker printed for null cells
    pub null_display: String,

    /// Colored prompt and messages
    pub use_colors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Table name every loaded file is persisted under
    pub default_table_name: String,

    /// Show the frame summary after a successful load
    pub preview_on_load: bool,

    /// Enable command history
    pub enable_history: bool,

    /// Maximum history entries
    pub max_history_entries: usize,

    /// Policy used by `\export table` when none is given
    pub default_conflict_policy: ConflictPolicy,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_display_rows: 1000,
            null_display: "NULL".to_string(),
            use_colors: true,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            default_table_name: "dataset".to_string(),
            preview_on_load: true,
            enable_history: true,
            max_history_entries: 1000,
            default_conflict_policy: ConflictPolicy::Replace,
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults
    /// when no file exists yet
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("dataset-analyzer").join("config.toml"))
    }

    /// Look up a saved connection profile
    pub fn profile(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }

    /// Write the commented default file to the default location, unless
    /// one is already there
    pub fn write_default_file() -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            anyhow::bail!("Config file already exists at {}", config_path.display());
        }
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, Self::create_default_with_comments())?;
        Ok(config_path)
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# Dataset Analyzer Configuration File
# Location: ~/.config/dataset-analyzer/config.toml (Linux)
#           ~/Library/Application Support/dataset-analyzer/config.toml (macOS)
#           %APPDATA%\dataset-analyzer\config.toml (Windows)

[display]
# Maximum rows shown for a query result (queries and exports are never capped)
max_display_rows = 1000

# How null cells are shown in result grids
null_display = "NULL"

# Colored prompt and messages
use_colors = true

[behavior]
# Every loaded file is stored under this table name
default_table_name = "dataset"

# Show a summary of the data after loading a file
preview_on_load = true

# Keep command history between sessions
enable_history = true

# Maximum number of history entries to keep
max_history_entries = 1000

# What `\export table` does when the table exists: "replace", "append" or "fail"
default_conflict_policy = "replace"

# Saved connections, used as `\connect @name`
# [connections.local]
# kind = "sqlite"
# path = "/path/to/analysis.db"
#
# [connections.shop]
# kind = "mysql"
# host = "localhost"
# port = 3306
# user = "analyst"
# password = ""
# database = "shop"
#
# [connections.warehouse]
# kind = "sqlserver"
# server = "db01,1433"
# database = "sales"
# auth = { method = "trusted" }
# # auth = { method = "login", user = "sa", password = "secret" }
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::connection::BackendKind;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.max_display_rows, 1000);
        assert_eq!(config.display.null_display, "NULL");
        assert_eq!(config.behavior.default_table_name, "dataset");
        assert_eq!(
            config.behavior.default_conflict_policy,
            ConflictPolicy::Replace
        );
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_commented_default_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::create_default_with_comments()).unwrap();
        let defaults = Config::default();
        assert_eq!(
            parsed.display.max_display_rows,
            defaults.display.max_display_rows
        );
        assert_eq!(
            parsed.behavior.default_table_name,
            defaults.behavior.default_table_name
        );
        assert!(parsed.connections.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [behavior]
            default_conflict_policy = "fail"

            [connections.local]
            kind = "sqlite"
            path = "/tmp/analysis.db"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.behavior.default_conflict_policy, ConflictPolicy::Fail);
        assert!(parsed.behavior.preview_on_load);
        assert_eq!(parsed.display.null_display, "NULL");
        assert_eq!(
            parsed.profile("local").map(|p| p.kind()),
            Some(BackendKind::Sqlite)
        );
        assert!(parsed.profile("missing").is_none());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.connections.insert(
            "local".to_string(),
            ConnectionConfig::Sqlite {
                path: "/tmp/a.db".into(),
            },
        );
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.connections, config.connections);
    }

    #[test]
    fn test_load_from_reports_bad_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "[display\nmax_display_rows = ").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }
}
