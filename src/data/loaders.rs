use crate::data::datatable::{DataColumn, DataRow, DataTable, DataType, DataValue};
use crate::data::error::{LoadError, LoadResult};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Number of leading rows sampled for CSV type inference
const TYPE_SAMPLE_ROWS: usize = 100;

/// File formats the loaders understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Excel,
    Dbf,
    Json,
}

impl SourceFormat {
    /// Pick a format from the file extension
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceFormat::Excel),
            "dbf" => Ok(SourceFormat::Dbf),
            "json" => Ok(SourceFormat::Json),
            _ => Err(LoadError::Unsupported(format!(
                "cannot load '{}' (expected .csv, .xlsx, .xls, .dbf or .json)",
                path.display()
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "CSV",
            SourceFormat::Excel => "Excel",
            SourceFormat::Dbf => "DBF",
            SourceFormat::Json => "JSON",
        }
    }
}

/// Load any supported file into a DataTable
pub fn load_file<P: AsRef<Path>>(path: P, table_name: &str) -> LoadResult<DataTable> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path)?;
    debug!(target: "loader", "Loading {} file {:?}", format.label(), path);

    let mut table = match format {
        SourceFormat::Csv => load_csv_to_datatable(path, table_name)?,
        SourceFormat::Excel => load_excel_to_datatable(path, table_name)?,
        SourceFormat::Dbf => load_dbf_to_datatable(path, table_name)?,
        SourceFormat::Json => load_json_to_datatable(path, table_name)?,
    };

    if table.row_count() == 0 || table.column_count() == 0 {
        return Err(LoadError::Empty);
    }

    table
        .metadata
        .insert("source_type".to_string(), format.label().to_lowercase());
    table
        .metadata
        .insert("source_path".to_string(), path.display().to_string());

    debug!(
        target: "loader",
        "Loaded {} rows, {} columns",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Load a CSV file into a DataTable
pub fn load_csv_to_datatable<P: AsRef<Path>>(path: P, table_name: &str) -> LoadResult<DataTable> {
    let file = File::open(&path)?;
    let delimiter = match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let mut table = DataTable::new(table_name);

    for (idx, header) in headers.iter().enumerate() {
        table.add_column(DataColumn::new(header_or_default(header, idx)));
    }

    // Read all rows first to collect data
    let mut string_rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        row.resize(headers.len(), String::new());
        string_rows.push(row);
    }

    let column_types = infer_string_columns(&string_rows, headers.len());

    for (col_idx, column) in table.columns.iter_mut().enumerate() {
        column.data_type = column_types[col_idx].clone();
    }

    for string_row in string_rows {
        let values = string_row
            .iter()
            .enumerate()
            .map(|(col_idx, value)| DataValue::from_string(value, &column_types[col_idx]))
            .collect();
        table.add_row(DataRow::new(values))?;
    }

    table.infer_column_types();

    Ok(table)
}

/// Sample the leading rows of string data and settle on a type per column
fn infer_string_columns(rows: &[Vec<String>], width: usize) -> Vec<DataType> {
    let mut column_types = vec![DataType::Null; width];

    for row in rows.iter().take(TYPE_SAMPLE_ROWS) {
        for (col_idx, value) in row.iter().enumerate().take(width) {
            if !value.is_empty() {
                let inferred = DataType::infer_from_string(value);
                column_types[col_idx] = column_types[col_idx].merge(&inferred);
            }
        }
    }

    column_types
}

fn header_or_default(header: &str, idx: usize) -> String {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        format!("column_{}", idx + 1)
    } else {
        trimmed.to_string()
    }
}

/// Load the first worksheet of a spreadsheet; the first row is the header
pub fn load_excel_to_datatable<P: AsRef<Path>>(
    path: P,
    table_name: &str,
) -> LoadResult<DataTable> {
    let mut workbook =
        open_workbook_auto(path.as_ref()).map_err(|e| LoadError::Excel(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::Excel("workbook has no worksheets".to_string()))?
        .map_err(|e| LoadError::Excel(e.to_string()))?;

    let mut rows = range.rows();
    let mut table = DataTable::new(table_name);

    let Some(header_row) = rows.next() else {
        return Ok(table);
    };

    for (idx, cell) in header_row.iter().enumerate() {
        let header = match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        };
        table.add_column(DataColumn::new(header_or_default(&header, idx)));
    }

    let width = table.column_count();
    for row in rows {
        let mut values: Vec<DataValue> = row.iter().take(width).map(excel_cell_to_value).collect();
        values.resize(width, DataValue::Null);
        table.add_row(DataRow::new(values))?;
    }

    table.infer_column_types();

    Ok(table)
}

fn excel_cell_to_value(cell: &Data) -> DataValue {
    use calamine::DataType as _;

    match cell {
        Data::Empty => DataValue::Null,
        Data::Int(i) => DataValue::Integer(*i),
        Data::Float(f) => DataValue::Float(*f),
        Data::Bool(b) => DataValue::Boolean(*b),
        Data::String(s) if s.is_empty() => DataValue::Null,
        Data::String(s) => DataValue::String(s.clone()),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => DataValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => DataValue::String(cell.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => DataValue::String(s.clone()),
        Data::Error(e) => DataValue::String(format!("#{:?}", e)),
        #[allow(unreachable_patterns)]
        other => DataValue::String(other.to_string()),
    }
}

/// Load a dBase table
#[cfg(feature = "dbf")]
pub fn load_dbf_to_datatable<P: AsRef<Path>>(path: P, table_name: &str) -> LoadResult<DataTable> {
    let mut reader =
        dbase::Reader::from_path(path.as_ref()).map_err(|e| LoadError::Dbf(e.to_string()))?;

    let field_names: Vec<String> = reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let records = reader.read().map_err(|e| LoadError::Dbf(e.to_string()))?;

    let mut table = DataTable::new(table_name);
    for name in &field_names {
        table.add_column(DataColumn::new(name.as_str()));
    }

    for record in &records {
        let values = field_names
            .iter()
            .map(|name| record.get(name).map(dbf_field_to_value).unwrap_or(DataValue::Null))
            .collect();
        table.add_row(DataRow::new(values))?;
    }

    table.infer_column_types();

    Ok(table)
}

#[cfg(feature = "dbf")]
fn dbf_field_to_value(field: &dbase::FieldValue) -> DataValue {
    use dbase::FieldValue;

    match field {
        FieldValue::Character(Some(s)) => {
            let trimmed = s.trim_end();
            if trimmed.is_empty() {
                DataValue::Null
            } else {
                DataValue::String(trimmed.to_string())
            }
        }
        FieldValue::Numeric(Some(n)) => {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                DataValue::Integer(*n as i64)
            } else {
                DataValue::Float(*n)
            }
        }
        FieldValue::Logical(Some(b)) => DataValue::Boolean(*b),
        FieldValue::Float(Some(f)) => DataValue::Float(f64::from(*f)),
        FieldValue::Integer(i) => DataValue::Integer(i64::from(*i)),
        FieldValue::Double(d) | FieldValue::Currency(d) => DataValue::Float(*d),
        FieldValue::Date(Some(date)) => DataValue::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        FieldValue::Memo(s) => DataValue::String(s.clone()),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Logical(None)
        | FieldValue::Float(None)
        | FieldValue::Date(None) => DataValue::Null,
        other => DataValue::String(format!("{:?}", other)),
    }
}

#[cfg(not(feature = "dbf"))]
pub fn load_dbf_to_datatable<P: AsRef<Path>>(
    _path: P,
    _table_name: &str,
) -> LoadResult<DataTable> {
    Err(LoadError::Unsupported(
        "DBF support not compiled in (rebuild with --features dbf)".to_string(),
    ))
}

/// Load a JSON file into a DataTable.
///
/// Accepted shapes: an array of objects (one row each), a single object
/// (one row), a list of non-objects (column `values`) or a bare scalar
/// (column `value`). Nested objects are flattened into `parent.child`
/// columns; arrays stay as nested cells.
pub fn load_json_to_datatable<P: AsRef<Path>>(path: P, table_name: &str) -> LoadResult<DataTable> {
    let file = File::open(&path)?;
    let reader = BufReader::new(file);
    let json: JsonValue = serde_json::from_reader(reader)?;
    load_json_value_to_datatable(json, table_name)
}

/// Build a DataTable from an already parsed JSON document
pub fn load_json_value_to_datatable(json: JsonValue, table_name: &str) -> LoadResult<DataTable> {
    match json {
        JsonValue::Object(obj) => {
            debug!(target: "loader", "JSON document is a single object");
            records_to_datatable(&[JsonValue::Object(obj)], table_name)
        }
        JsonValue::Array(items) => {
            if items.first().is_some_and(JsonValue::is_object) {
                debug!(target: "loader", "JSON document is a list of {} objects", items.len());
                records_to_datatable(&items, table_name)
            } else {
                debug!(target: "loader", "JSON document is a plain list");
                single_column_table(table_name, "values", items.iter())
            }
        }
        scalar => single_column_table(table_name, "value", std::iter::once(&scalar)),
    }
}

fn single_column_table<'a>(
    table_name: &str,
    column: &str,
    values: impl Iterator<Item = &'a JsonValue>,
) -> LoadResult<DataTable> {
    let mut table = DataTable::new(table_name);
    table.add_column(DataColumn::new(column));
    for value in values {
        table.add_row(DataRow::new(vec![DataValue::from_json(value)]))?;
    }
    table.infer_column_types();
    Ok(table)
}

fn records_to_datatable(records: &[JsonValue], table_name: &str) -> LoadResult<DataTable> {
    let mut column_names: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut flat_rows: Vec<Vec<(usize, DataValue)>> = Vec::with_capacity(records.len());

    for (idx, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            LoadError::Shape(format!("element {} of the list is not an object", idx))
        })?;

        let mut flat = Vec::new();
        flatten_object("", obj, &mut flat);

        let mut row = Vec::with_capacity(flat.len());
        for (key, value) in flat {
            let position = *positions.entry(key.clone()).or_insert_with(|| {
                column_names.push(key);
                column_names.len() - 1
            });
            row.push((position, value));
        }
        flat_rows.push(row);
    }

    let mut table = DataTable::new(table_name);
    for name in &column_names {
        table.add_column(DataColumn::new(name.as_str()));
    }

    for flat in flat_rows {
        let mut values = vec![DataValue::Null; column_names.len()];
        for (position, value) in flat {
            values[position] = value;
        }
        table.add_row(DataRow::new(values))?;
    }

    table.infer_column_types();

    Ok(table)
}

/// Flatten nested objects into dotted keys, keeping arrays whole
fn flatten_object(prefix: &str, obj: &Map<String, JsonValue>, out: &mut Vec<(String, DataValue)>) {
    for (key, value) in obj {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            JsonValue::Object(inner) if !inner.is_empty() => flatten_object(&full_key, inner, out),
            other => out.push((full_key, DataValue::from_json(other))),
        }
    }
}
