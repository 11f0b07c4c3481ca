use crate::config::DisplayConfig;
use crate::data::datatable::{DataTable, DataValue};
use crate::data::normalizer::{canonical_text, NormalizationReport};
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

fn header_cells<'a>(names: impl Iterator<Item = &'a str>, bold: bool) -> Vec<Cell> {
    names
        .map(|name| {
            let cell = Cell::new(name);
            if bold {
                cell.add_attribute(Attribute::Bold)
            } else {
                cell
            }
        })
        .collect()
}

fn cell_text(value: &DataValue, null_display: &str) -> String {
    match value {
        DataValue::Null => null_display.to_string(),
        DataValue::Nested(json) => canonical_text(json),
        other => other.to_string(),
    }
}

/// Render a result grid, showing at most `max_display_rows` rows.
///
/// Only the rendering is capped; the table itself is left whole.
pub fn render_table(table: &DataTable, config: &DisplayConfig) -> String {
    if table.column_count() == 0 {
        return "Query returned no columns.".to_string();
    }

    let mut grid = Table::new();
    grid.set_content_arrangement(ContentArrangement::Dynamic);
    grid.set_header(header_cells(
        table.columns.iter().map(|c| c.name.as_str()),
        config.use_colors,
    ));

    for row in table.rows.iter().take(config.max_display_rows) {
        let cells: Vec<String> = row
            .values
            .iter()
            .map(|value| cell_text(value, &config.null_display))
            .collect();
        grid.add_row(cells);
    }

    let total = table.row_count();
    let mut output = grid.to_string();
    output.push('\n');
    if total > config.max_display_rows {
        output.push_str(&format!(
            "Showing first {} of {} rows",
            config.max_display_rows, total
        ));
    } else {
        output.push_str(&format!(
            "{} row{} returned",
            total,
            if total == 1 { "" } else { "s" }
        ));
    }
    output
}

/// Size, per-column types and null counts of a loaded frame, plus what
/// normalization changed
pub fn frame_summary(table: &DataTable, report: Option<&NormalizationReport>) -> String {
    let mut grid = Table::new();
    grid.set_content_arrangement(ContentArrangement::Dynamic);
    grid.set_header(header_cells(["Column", "Type", "Nulls"].into_iter(), true));

    for column in &table.columns {
        grid.add_row(vec![
            column.name.clone(),
            format!("{:?}", column.data_type),
            column.null_count.to_string(),
        ]);
    }

    let mut output = format!(
        "Table '{}': {} rows, {} columns\n{}",
        table.name,
        table.row_count(),
        table.column_count(),
        grid
    );

    if let Some(report) = report {
        if !report.converted_columns.is_empty() {
            output.push_str(&format!(
                "\nConverted nested columns to text: {}",
                report.converted_columns.join(", ")
            ));
        }
        if report.repaired_cells > 0 {
            output.push_str(&format!(
                "\nRepaired {} stray nested cells",
                report.repaired_cells
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datatable::{DataColumn, DataRow, DataType};

    fn numbers(count: i64) -> DataTable {
        let mut table = DataTable::new("result");
        table.add_column(DataColumn::new("n").with_type(DataType::Integer));
        table.add_column(DataColumn::new("label"));
        for i in 0..count {
            let label = if i % 2 == 0 {
                DataValue::Null
            } else {
                DataValue::String(format!("odd-{}", i))
            };
            table
                .add_row(DataRow::new(vec![DataValue::Integer(i), label]))
                .unwrap();
        }
        table
    }

    #[test]
    fn test_render_caps_rows_not_table() {
        let table = numbers(5);
        let config = DisplayConfig {
            max_display_rows: 2,
            ..DisplayConfig::default()
        };

        let output = render_table(&table, &config);
        assert!(output.contains("Showing first 2 of 5 rows"));
        assert!(!output.contains("odd-3"));
        assert_eq!(table.row_count(), 5);
    }

    #[test]
    fn test_render_null_marker() {
        let config = DisplayConfig {
            null_display: "<null>".to_string(),
            ..DisplayConfig::default()
        };
        let output = render_table(&numbers(2), &config);
        assert!(output.contains("<null>"));
        assert!(output.contains("odd-1"));
        assert!(output.ends_with("2 rows returned"));
    }

    #[test]
    fn test_frame_summary_mentions_conversions() {
        let report = NormalizationReport {
            converted_columns: vec!["tags".to_string()],
            repaired_cells: 0,
        };
        let summary = frame_summary(&numbers(3), Some(&report));
        assert!(summary.starts_with("Table 'result': 3 rows, 2 columns"));
        assert!(summary.contains("Converted nested columns to text: tags"));
        assert!(!summary.contains("Repaired"));
    }
}
