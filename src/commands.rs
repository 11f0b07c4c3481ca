//! REPL command parsing.
//!
//! Lines starting with `\` are commands; everything else is SQL and is
//! passed through untouched.

use crate::store::connection::{ConnectionConfig, SqlServerAuth};
use crate::store::ConflictPolicy;
use std::collections::HashMap;
use std::path::PathBuf;

const DEFAULT_LOG_LINES: usize = 20;

/// Command names offered by completion, in help order
pub const COMMAND_NAMES: &[&str] = &[
    "\\help",
    "\\load",
    "\\connect",
    "\\disconnect",
    "\\tables",
    "\\status",
    "\\info",
    "\\export",
    "\\reset",
    "\\logs",
    "\\clear",
    "\\quit",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectTarget {
    Config(ConnectionConfig),
    /// Name of a `[connections.<name>]` entry in the config file
    Profile(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Load(PathBuf),
    Connect(ConnectTarget),
    Disconnect,
    Tables,
    Status,
    Info,
    ExportCsv(PathBuf),
    ExportTable {
        name: String,
        /// `None` means the configured default
        policy: Option<ConflictPolicy>,
    },
    /// Copy the loaded dataset rather than the last query result
    ExportDataset {
        name: String,
        policy: Option<ConflictPolicy>,
    },
    Reset,
    Logs(usize),
    Clear,
    Quit,
    Sql(String),
}

/// Parse one line of REPL input
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(body) = line.strip_prefix('\\') else {
        return Ok(Command::Sql(line.to_string()));
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "help" | "h" | "?" => Ok(Command::Help),
        "load" => Ok(Command::Load(required_path(rest, "\\load <file>")?)),
        "connect" => parse_connect(rest).map(Command::Connect),
        "disconnect" => Ok(Command::Disconnect),
        "tables" => Ok(Command::Tables),
        "status" => Ok(Command::Status),
        "info" => Ok(Command::Info),
        "export" => parse_export(rest),
        "reset" => Ok(Command::Reset),
        "logs" => {
            if rest.is_empty() {
                return Ok(Command::Logs(DEFAULT_LOG_LINES));
            }
            rest.parse::<usize>()
                .map(Command::Logs)
                .map_err(|_| format!("Invalid line count '{}'. Usage: \\logs [n]", rest))
        }
        "clear" => Ok(Command::Clear),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!(
            "Unknown command '\\{}'. Type \\help for a list of commands.",
            other
        )),
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn required_path(rest: &str, usage: &str) -> Result<PathBuf, String> {
    let path = unquote(rest);
    if path.is_empty() {
        return Err(format!("Usage: {}", usage));
    }
    Ok(PathBuf::from(path))
}

/// `key=value` pairs; keys are case-insensitive
fn parse_key_values(
    input: &str,
    allowed: &[&str],
) -> Result<HashMap<String, String>, String> {
    let mut pairs = HashMap::new();
    for token in input.split_whitespace() {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got '{}'", token))?;
        let key = key.to_ascii_lowercase();
        if !allowed.contains(&key.as_str()) {
            return Err(format!(
                "Unknown parameter '{}' (expected one of: {})",
                key,
                allowed.join(", ")
            ));
        }
        pairs.insert(key, unquote(value).to_string());
    }
    Ok(pairs)
}

fn parse_connect(rest: &str) -> Result<ConnectTarget, String> {
    const USAGE: &str = "Usage: \\connect sqlite <path> | mysql host=.. user=.. database=.. \
                         | sqlserver server=.. database=.. | @<profile>";

    if let Some(profile) = rest.strip_prefix('@') {
        let profile = profile.trim();
        if profile.is_empty() {
            return Err(USAGE.to_string());
        }
        return Ok(ConnectTarget::Profile(profile.to_string()));
    }

    let (kind, args) = match rest.split_once(char::is_whitespace) {
        Some((kind, args)) => (kind, args.trim()),
        None => (rest, ""),
    };

    let config = match kind.to_ascii_lowercase().as_str() {
        "sqlite" => ConnectionConfig::Sqlite {
            path: required_path(args, "\\connect sqlite <path>")?,
        },
        "mysql" => {
            let mut kv =
                parse_key_values(args, &["host", "port", "user", "password", "database"])?;
            let port = match kv.remove("port") {
                Some(port) => port
                    .parse::<u16>()
                    .map_err(|_| format!("Invalid port '{}'", port))?,
                None => 3306,
            };
            // Missing fields are left empty and reported by validation
            ConnectionConfig::MySql {
                host: kv.remove("host").unwrap_or_default(),
                port,
                user: kv.remove("user").unwrap_or_default(),
                password: kv.remove("password").unwrap_or_default(),
                database: kv.remove("database").unwrap_or_default(),
            }
        }
        "sqlserver" | "mssql" => {
            let mut kv = parse_key_values(args, &["server", "database", "user", "password"])?;
            let user = kv.remove("user");
            let password = kv.remove("password");
            let auth = if user.is_none() && password.is_none() {
                SqlServerAuth::Trusted
            } else {
                SqlServerAuth::Login {
                    user: user.unwrap_or_default(),
                    password: password.unwrap_or_default(),
                }
            };
            ConnectionConfig::SqlServer {
                server: kv.remove("server").unwrap_or_default(),
                database: kv.remove("database").unwrap_or_default(),
                auth,
            }
        }
        _ => return Err(USAGE.to_string()),
    };

    Ok(ConnectTarget::Config(config))
}

fn parse_export(rest: &str) -> Result<Command, String> {
    const USAGE: &str = "Usage: \\export csv <file> | \\export table <name> [replace|append|fail] \
                         | \\export dataset <name> [replace|append|fail]";

    let (target, args) = match rest.split_once(char::is_whitespace) {
        Some((target, args)) => (target, args.trim()),
        None => (rest, ""),
    };

    match target.to_ascii_lowercase().as_str() {
        "csv" => Ok(Command::ExportCsv(required_path(args, "\\export csv <file>")?)),
        "table" => {
            let (name, policy) = table_target(args, USAGE)?;
            Ok(Command::ExportTable { name, policy })
        }
        "dataset" => {
            let (name, policy) = table_target(args, USAGE)?;
            Ok(Command::ExportDataset { name, policy })
        }
        _ => Err(USAGE.to_string()),
    }
}

/// `<name> [policy]`
fn table_target(args: &str, usage: &str) -> Result<(String, Option<ConflictPolicy>), String> {
    let mut parts = args.split_whitespace();
    let name = parts.next().ok_or_else(|| usage.to_string())?;
    let policy = parts
        .next()
        .map(|p| p.parse::<ConflictPolicy>())
        .transpose()?;
    if parts.next().is_some() {
        return Err(usage.to_string());
    }
    Ok((unquote(name).to_string(), policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sql() {
        assert_eq!(
            parse_command("  SELECT * FROM dataset  ").unwrap(),
            Command::Sql("SELECT * FROM dataset".to_string())
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_command("\\help").unwrap(), Command::Help);
        assert_eq!(parse_command("\\TABLES").unwrap(), Command::Tables);
        assert_eq!(parse_command("\\q").unwrap(), Command::Quit);
        assert_eq!(parse_command("\\logs").unwrap(), Command::Logs(20));
        assert_eq!(parse_command("\\logs 5").unwrap(), Command::Logs(5));
        assert!(parse_command("\\logs many").is_err());
        assert!(parse_command("\\frobnicate").is_err());
    }

    #[test]
    fn test_load_path_with_spaces() {
        assert_eq!(
            parse_command("\\load \"my data/sales 2024.csv\"").unwrap(),
            Command::Load(PathBuf::from("my data/sales 2024.csv"))
        );
        assert_eq!(
            parse_command("\\load data/people.xlsx").unwrap(),
            Command::Load(PathBuf::from("data/people.xlsx"))
        );
        assert!(parse_command("\\load").is_err());
    }

    #[test]
    fn test_connect_mysql() {
        let cmd = parse_command(
            "\\connect mysql host=localhost port=3307 user=root password=pw database=shop",
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::Connect(ConnectTarget::Config(ConnectionConfig::MySql {
                host: "localhost".to_string(),
                port: 3307,
                user: "root".to_string(),
                password: "pw".to_string(),
                database: "shop".to_string(),
            }))
        );

        assert!(parse_command("\\connect mysql host=x port=abc").is_err());
        assert!(parse_command("\\connect mysql hostname=x").is_err());
    }

    #[test]
    fn test_connect_sqlserver_auth_modes() {
        let trusted = parse_command("\\connect sqlserver server=db01,1433 database=sales").unwrap();
        assert!(matches!(
            trusted,
            Command::Connect(ConnectTarget::Config(ConnectionConfig::SqlServer {
                auth: SqlServerAuth::Trusted,
                ..
            }))
        ));

        let login =
            parse_command("\\connect sqlserver server=db01 database=sales user=sa password=x")
                .unwrap();
        assert!(matches!(
            login,
            Command::Connect(ConnectTarget::Config(ConnectionConfig::SqlServer {
                auth: SqlServerAuth::Login { .. },
                ..
            }))
        ));
    }

    #[test]
    fn test_connect_sqlite_and_profile() {
        assert_eq!(
            parse_command("\\connect sqlite /tmp/out.db").unwrap(),
            Command::Connect(ConnectTarget::Config(ConnectionConfig::Sqlite {
                path: PathBuf::from("/tmp/out.db")
            }))
        );
        assert_eq!(
            parse_command("\\connect @warehouse").unwrap(),
            Command::Connect(ConnectTarget::Profile("warehouse".to_string()))
        );
        assert!(parse_command("\\connect postgres x").is_err());
    }

    #[test]
    fn test_export_forms() {
        assert_eq!(
            parse_command("\\export csv out.csv").unwrap(),
            Command::ExportCsv(PathBuf::from("out.csv"))
        );
        assert_eq!(
            parse_command("\\export table results").unwrap(),
            Command::ExportTable {
                name: "results".to_string(),
                policy: None
            }
        );
        assert_eq!(
            parse_command("\\export table results fail").unwrap(),
            Command::ExportTable {
                name: "results".to_string(),
                policy: Some(ConflictPolicy::Fail)
            }
        );
        assert_eq!(
            parse_command("\\export dataset raw_copy append").unwrap(),
            Command::ExportDataset {
                name: "raw_copy".to_string(),
                policy: Some(ConflictPolicy::Append)
            }
        );
        assert!(parse_command("\\export dataset").is_err());
        assert!(parse_command("\\export table results merge").is_err());
        assert!(parse_command("\\export parquet x").is_err());
    }
}
