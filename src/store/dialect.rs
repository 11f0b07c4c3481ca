//! Per-engine SQL text: quoting, placeholders, column types and the
//! statements the store manager issues on its own behalf.

use crate::data::datatable::DataType;
use crate::store::connection::BackendKind;

/// SQL flavour of one backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    kind: BackendKind,
}

impl Dialect {
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        match self.kind {
            BackendKind::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
            BackendKind::MySql => format!("`{}`", name.replace('`', "``")),
            BackendKind::SqlServer => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Bind marker for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self.kind {
            BackendKind::Sqlite | BackendKind::MySql => "?".to_string(),
            BackendKind::SqlServer => format!("@p{}", index),
        }
    }

    pub fn column_type(&self, data_type: &DataType) -> &'static str {
        match (self.kind, data_type) {
            (BackendKind::Sqlite, DataType::Integer) => "INTEGER",
            (BackendKind::Sqlite, DataType::Float) => "REAL",
            (BackendKind::Sqlite, DataType::Boolean) => "INTEGER",
            (BackendKind::Sqlite, _) => "TEXT",
            (BackendKind::MySql, DataType::Integer) => "BIGINT",
            (BackendKind::MySql, DataType::Float) => "DOUBLE",
            (BackendKind::MySql, DataType::Boolean) => "BOOLEAN",
            (BackendKind::MySql, _) => "TEXT",
            (BackendKind::SqlServer, DataType::Integer) => "BIGINT",
            (BackendKind::SqlServer, DataType::Float) => "FLOAT",
            (BackendKind::SqlServer, DataType::Boolean) => "BIT",
            (BackendKind::SqlServer, _) => "NVARCHAR(MAX)",
        }
    }

    pub fn create_table(&self, table: &str, columns: &[(String, DataType)]) -> String {
        let definitions: Vec<String> = columns
            .iter()
            .map(|(name, data_type)| {
                format!(
                    "{} {}",
                    self.quote_identifier(name),
                    self.column_type(data_type)
                )
            })
            .collect();

        format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(table),
            definitions.join(", ")
        )
    }

    pub fn drop_table_if_exists(&self, table: &str) -> String {
        match self.kind {
            BackendKind::Sqlite | BackendKind::MySql => {
                format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
            }
            BackendKind::SqlServer => format!(
                "IF OBJECT_ID(N'{}', N'U') IS NOT NULL DROP TABLE {}",
                table.replace('\'', "''"),
                self.quote_identifier(table)
            ),
        }
    }

    pub fn insert_row(&self, table: &str, columns: &[String]) -> String {
        let names: Vec<String> = columns
            .iter()
            .map(|name| self.quote_identifier(name))
            .collect();
        let markers: Vec<String> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            names.join(", "),
            markers.join(", ")
        )
    }

    /// Catalog query returning one table name per row
    pub fn list_tables(&self) -> &'static str {
        match self.kind {
            BackendKind::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            BackendKind::MySql => "SHOW TABLES",
            BackendKind::SqlServer => {
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(
            Dialect::new(BackendKind::Sqlite).quote_identifier("a\"b"),
            "\"a\"\"b\""
        );
        assert_eq!(
            Dialect::new(BackendKind::MySql).quote_identifier("user.name"),
            "`user.name`"
        );
        assert_eq!(
            Dialect::new(BackendKind::SqlServer).quote_identifier("x]y"),
            "[x]]y]"
        );
    }

    #[test]
    fn test_insert_placeholders() {
        let columns = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            Dialect::new(BackendKind::Sqlite).insert_row("t", &columns),
            "INSERT INTO \"t\" (\"a\", \"b\") VALUES (?, ?)"
        );
        assert_eq!(
            Dialect::new(BackendKind::SqlServer).insert_row("t", &columns),
            "INSERT INTO [t] ([a], [b]) VALUES (@p1, @p2)"
        );
    }

    #[test]
    fn test_create_table_types() {
        let columns = vec![
            ("id".to_string(), DataType::Integer),
            ("score".to_string(), DataType::Float),
            ("tags".to_string(), DataType::Mixed),
        ];
        assert_eq!(
            Dialect::new(BackendKind::MySql).create_table("t", &columns),
            "CREATE TABLE `t` (`id` BIGINT, `score` DOUBLE, `tags` TEXT)"
        );
        assert_eq!(
            Dialect::new(BackendKind::SqlServer).create_table("t", &columns),
            "CREATE TABLE [t] ([id] BIGINT, [score] FLOAT, [tags] NVARCHAR(MAX))"
        );
    }

    #[test]
    fn test_sqlserver_drop_uses_object_id() {
        assert_eq!(
            Dialect::new(BackendKind::SqlServer).drop_table_if_exists("o'neil"),
            "IF OBJECT_ID(N'o''neil', N'U') IS NOT NULL DROP TABLE [o'neil]"
        );
    }
}
