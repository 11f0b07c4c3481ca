use crate::store::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use sqlx::any::AnyConnectOptions;
use sqlx::mssql::MssqlConnectOptions;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_MYSQL_PORT: u16 = 3306;
const DEFAULT_SQLSERVER_PORT: u16 = 1433;

/// Relational engines the store manager can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlserver")]
    SqlServer,
}

impl BackendKind {
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "SQLite",
            BackendKind::MySql => "MySQL",
            BackendKind::SqlServer => "SQL Server",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How to authenticate against SQL Server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum SqlServerAuth {
    /// Ambient (integrated) credentials of the current user
    #[default]
    Trusted,
    Login { user: String, password: String },
}

/// Parameters for an external database, as typed by the user or read
/// from a `[connections.<name>]` profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Sqlite {
        path: PathBuf,
    },
    #[serde(rename = "mysql")]
    MySql {
        host: String,
        #[serde(default = "default_mysql_port")]
        port: u16,
        user: String,
        #[serde(default)]
        password: String,
        database: String,
    },
    #[serde(rename = "sqlserver")]
    SqlServer {
        server: String,
        database: String,
        #[serde(default)]
        auth: SqlServerAuth,
    },
}

fn default_mysql_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

fn require(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidConfig(format!("'{}' must not be empty", field)));
    }
    Ok(())
}

impl ConnectionConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            ConnectionConfig::Sqlite { .. } => BackendKind::Sqlite,
            ConnectionConfig::MySql { .. } => BackendKind::MySql,
            ConnectionConfig::SqlServer { .. } => BackendKind::SqlServer,
        }
    }

    /// Presence-only check of the fields each backend needs
    pub fn validate(&self) -> StoreResult<()> {
        match self {
            ConnectionConfig::Sqlite { path } => require("path", &path.to_string_lossy()),
            ConnectionConfig::MySql {
                host,
                port,
                user,
                database,
                ..
            } => {
                require("host", host)?;
                if *port == 0 {
                    return Err(StoreError::InvalidConfig("'port' must not be 0".to_string()));
                }
                require("user", user)?;
                require("database", database)
            }
            ConnectionConfig::SqlServer {
                server,
                database,
                auth,
            } => {
                require("server", server)?;
                require("database", database)?;
                if let SqlServerAuth::Login { user, password } = auth {
                    require("user", user)?;
                    require("password", password)?;
                }
                Ok(())
            }
        }
    }

    /// Driver options for this target
    pub fn connect_options(&self) -> AnyConnectOptions {
        match self {
            ConnectionConfig::Sqlite { path } => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(false)
                .into(),
            ConnectionConfig::MySql {
                host,
                port,
                user,
                password,
                database,
            } => {
                let mut options = MySqlConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .database(database);
                if !password.is_empty() {
                    options = options.password(password);
                }
                options.into()
            }
            ConnectionConfig::SqlServer {
                server,
                database,
                auth,
            } => {
                let (host, port) = split_server(server);
                let mut options = MssqlConnectOptions::new()
                    .host(host)
                    .port(port)
                    .database(database);
                if let SqlServerAuth::Login { user, password } = auth {
                    options = options.username(user).password(password);
                }
                options.into()
            }
        }
    }
}

/// Accept `host`, `host,port` (SQL Server style) or `host:port`
fn split_server(server: &str) -> (&str, u16) {
    let server = server.trim();
    for separator in [',', ':'] {
        if let Some((host, port)) = server.rsplit_once(separator) {
            if let Ok(port) = port.trim().parse::<u16>() {
                return (host.trim(), port);
            }
        }
    }
    (server, DEFAULT_SQLSERVER_PORT)
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionConfig::Sqlite { path } => write!(f, "sqlite {}", path.display()),
            ConnectionConfig::MySql {
                host,
                port,
                user,
                database,
                ..
            } => write!(f, "mysql {}@{}:{}/{}", user, host, port, database),
            ConnectionConfig::SqlServer {
                server,
                database,
                auth,
            } => match auth {
                SqlServerAuth::Trusted => {
                    write!(f, "sqlserver {}/{} (trusted)", server, database)
                }
                SqlServerAuth::Login { user, .. } => {
                    write!(f, "sqlserver {}@{}/{}", user, server, database)
                }
            },
        }
    }
}
