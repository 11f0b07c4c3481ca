use crate::data::datatable::{DataTable, DataValue};
use crate::data::error::ExportError;
use crate::data::normalizer::canonical_text;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// UTF-8 byte-order mark, so spreadsheet tools pick the right encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write every row of `table` to `path` as CSV, prefixed with a UTF-8 BOM.
///
/// Returns the number of data rows written.
pub fn export_csv<P: AsRef<Path>>(table: &DataTable, path: P) -> Result<usize, ExportError> {
    if table.column_count() == 0 {
        return Err(ExportError::NoData);
    }

    let mut file = BufWriter::new(File::create(path.as_ref())?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(table.column_names())?;

    for row in &table.rows {
        writer.write_record(row.values.iter().map(csv_field))?;
    }
    writer.flush()?;

    info!(
        target: "export",
        "Exported {} rows to {:?}",
        table.row_count(),
        path.as_ref()
    );
    Ok(table.row_count())
}

fn csv_field(value: &DataValue) -> String {
    match value {
        DataValue::Null => String::new(),
        DataValue::Nested(json) => canonical_text(json),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datatable::{DataColumn, DataRow};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_export_writes_bom_and_quotes() -> anyhow::Result<()> {
        let mut table = DataTable::new("result");
        table.add_column(DataColumn::new("name"));
        table.add_column(DataColumn::new("note"));
        table.add_column(DataColumn::new("tags"));
        table
            .add_row(DataRow::new(vec![
                DataValue::String("Zoë".into()),
                DataValue::String("a, \"quoted\" note".into()),
                DataValue::Nested(json!({"b": 1, "a": 2})),
            ]))
            .unwrap();
        table
            .add_row(DataRow::new(vec![
                DataValue::Null,
                DataValue::Integer(3),
                DataValue::Null,
            ]))
            .unwrap();

        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        let written = export_csv(&table, &path)?;
        assert_eq!(written, 2);

        let bytes = std::fs::read(&path)?;
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec())?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name,note,tags");
        assert_eq!(
            lines[1],
            r#"Zoë,"a, ""quoted"" note","{""a"":2,""b"":1}""#
        );
        assert_eq!(lines[2], ",3,");

        Ok(())
    }

    #[test]
    fn test_export_without_columns_fails() {
        let table = DataTable::new("empty");
        let dir = tempdir().unwrap();
        let result = export_csv(&table, dir.path().join("out.csv"));
        assert!(matches!(result, Err(ExportError::NoData)));
    }
}
