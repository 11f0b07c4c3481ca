//! Ingestion normalization
//!
//! Loaders may hand back cells that are whole JSON arrays or objects.
//! Relational stores only take scalars, so before a frame is persisted
//! every column holding such a value is rewritten as text: structures
//! become canonical JSON (keys sorted, compact separators) and the
//! remaining scalars of that column become their display text. Nulls are
//! kept as nulls.

use crate::data::datatable::{DataTable, DataValue};
use serde_json::{Map, Value as JsonValue};
use std::ops::Deref;
use tracing::{debug, warn};

/// A table that is guaranteed to hold no [`DataValue::Nested`] cell.
///
/// The only way to obtain one is [`normalize`].
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    table: DataTable,
}

impl NormalizedFrame {
    pub fn table(&self) -> &DataTable {
        &self.table
    }

    pub fn into_inner(self) -> DataTable {
        self.table
    }
}

impl Deref for NormalizedFrame {
    type Target = DataTable;

    fn deref(&self) -> &DataTable {
        &self.table
    }
}

/// What [`normalize`] had to change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    /// Columns that contained at least one nested value
    pub converted_columns: Vec<String>,
    /// Cells the safety pass still found nested; non-zero means the
    /// column pass missed something
    pub repaired_cells: usize,
}

impl NormalizationReport {
    pub fn is_noop(&self) -> bool {
        self.converted_columns.is_empty() && self.repaired_cells == 0
    }
}

/// Flatten every nested cell of `frame` into text.
///
/// Frames with scalar cells only come back unchanged.
pub fn normalize(frame: DataTable) -> (NormalizedFrame, NormalizationReport) {
    let mut table = frame;
    let mut report = NormalizationReport::default();

    debug!(
        target: "normalizer",
        "Normalizing '{}': {} rows, {} columns",
        table.name,
        table.row_count(),
        table.column_count()
    );

    for col_idx in 0..table.column_count() {
        let needs_conversion = table.column_values(col_idx).any(DataValue::is_nested);
        if !needs_conversion {
            continue;
        }

        let column_name = table.columns[col_idx].name.clone();
        debug!(target: "normalizer", "Converting column '{}' to text", column_name);

        for row in table.rows.iter_mut() {
            if let Some(cell) = row.get_mut(col_idx) {
                *cell = cell_to_text(cell);
            }
        }

        report.converted_columns.push(column_name);
    }

    // Safety pass over every cell
    for (row_idx, row) in table.rows.iter_mut().enumerate() {
        for (col_idx, cell) in row.values.iter_mut().enumerate() {
            if let DataValue::Nested(json) = cell {
                warn!(
                    target: "normalizer",
                    "Nested value still present at row {}, column {}; forcing serialization",
                    row_idx,
                    col_idx
                );
                *cell = DataValue::String(canonical_text(json));
                report.repaired_cells += 1;
            }
        }
    }

    if !report.is_noop() {
        table.infer_column_types();
    }

    (NormalizedFrame { table }, report)
}

/// Text form of one cell in a column being converted
fn cell_to_text(cell: &DataValue) -> DataValue {
    match cell {
        DataValue::Null => DataValue::Null,
        DataValue::Nested(json) => DataValue::String(canonical_text(json)),
        DataValue::String(s) => DataValue::String(s.clone()),
        DataValue::Float(f) => DataValue::String(float_text(*f)),
        other => DataValue::String(other.to_string()),
    }
}

/// Integral floats keep a trailing `.0` so they stay distinguishable
/// from integers once turned into text
fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Serialize a JSON structure deterministically: object keys sorted at
/// every depth, no whitespace, non-ASCII characters written as-is.
///
/// Falls back to the value's plain display text if serialization fails.
pub fn canonical_text(value: &JsonValue) -> String {
    match serde_json::to_string(&canonicalize(value)) {
        Ok(text) => text,
        Err(e) => {
            warn!(target: "normalizer", "Falling back to plain text for value: {}", e);
            value.to_string()
        }
    }
}

fn canonicalize(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(canonicalize).collect()),
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            JsonValue::Object(sorted)
        }
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datatable::{DataColumn, DataRow};
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<DataValue>>) -> DataTable {
        let mut table = DataTable::new("test");
        for name in columns {
            table.add_column(DataColumn::new(*name));
        }
        for row in rows {
            table.add_row(DataRow::new(row)).unwrap();
        }
        table
    }

    #[test]
    fn test_scalar_frame_is_untouched() {
        let input = table(
            &["id", "name", "score", "ok"],
            vec![
                vec![
                    DataValue::Integer(1),
                    DataValue::String("a".into()),
                    DataValue::Float(1.5),
                    DataValue::Boolean(true),
                ],
                vec![
                    DataValue::Null,
                    DataValue::Null,
                    DataValue::Null,
                    DataValue::Null,
                ],
            ],
        );

        let (normalized, report) = normalize(input.clone());

        assert!(report.is_noop());
        for (got, want) in normalized.rows.iter().zip(input.rows.iter()) {
            assert_eq!(got.values, want.values);
        }
    }

    #[test]
    fn test_whole_column_becomes_text() {
        let input = table(
            &["mixed"],
            vec![
                vec![DataValue::Integer(5)],
                vec![DataValue::Nested(json!({"b": 2, "a": [1, {"d": 4, "c": 3}]}))],
                vec![DataValue::Null],
                vec![DataValue::Boolean(false)],
            ],
        );

        let (normalized, report) = normalize(input);

        assert_eq!(report.converted_columns, vec!["mixed".to_string()]);
        assert_eq!(report.repaired_cells, 0);
        assert_eq!(normalized.rows[0].values[0], DataValue::String("5".into()));
        assert_eq!(
            normalized.rows[1].values[0],
            DataValue::String(r#"{"a":[1,{"c":3,"d":4}],"b":2}"#.into())
        );
        assert_eq!(normalized.rows[2].values[0], DataValue::Null);
        assert_eq!(
            normalized.rows[3].values[0],
            DataValue::String("false".into())
        );
    }

    #[test]
    fn test_converted_floats_keep_fraction() {
        let input = table(
            &["v"],
            vec![
                vec![DataValue::Float(1.0)],
                vec![DataValue::Float(2.5)],
                vec![DataValue::Nested(json!([1]))],
            ],
        );

        let (normalized, _) = normalize(input);

        assert_eq!(normalized.rows[0].values[0], DataValue::String("1.0".into()));
        assert_eq!(normalized.rows[1].values[0], DataValue::String("2.5".into()));
    }

    #[test]
    fn test_canonical_text_round_trips() {
        let original = json!({"name": "Ünïcode", "tags": ["x", "y"], "inner": {"z": null}});
        let text = canonical_text(&original);

        assert!(text.contains("Ünïcode"));
        assert!(!text.contains(' '));
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_other_columns_keep_their_types() {
        let input = table(
            &["a", "b"],
            vec![
                vec![DataValue::Integer(1), DataValue::Nested(json!([1, 2]))],
                vec![DataValue::Integer(2), DataValue::Nested(json!([3]))],
            ],
        );

        let (normalized, _) = normalize(input);

        assert_eq!(normalized.rows[0].values[0], DataValue::Integer(1));
        assert_eq!(
            normalized.rows[0].values[1],
            DataValue::String("[1,2]".into())
        );
        assert_eq!(normalized.rows[1].values[1], DataValue::String("[3]".into()));
    }
}
