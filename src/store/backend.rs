//! Async primitives over a single `sqlx` connection.
//!
//! Every function here works against whichever engine sits behind the
//! `AnyConnection`; engine differences come in through [`Dialect`].

use crate::data::datatable::{DataColumn, DataRow, DataTable, DataValue};
use crate::data::normalizer::canonical_text;
use crate::store::dialect::Dialect;
use sqlx::any::{Any, AnyArguments, AnyConnection, AnyRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};
use tracing::debug;

/// How [`write_table`] treats an existing destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop the table and create it again from the frame's columns
    Replace,
    /// Create the table if missing, then add rows to it
    Append,
}

/// Run `sql` verbatim and collect whatever rows it returns
pub async fn fetch_table(
    conn: &mut AnyConnection,
    sql: &str,
    table_name: &str,
) -> Result<DataTable, sqlx::Error> {
    let rows: Vec<AnyRow> = (&mut *conn).fetch_all(sql).await?;
    let mut table = DataTable::new(table_name);

    if let Some(first) = rows.first() {
        for column in first.columns() {
            table.add_column(DataColumn::new(column.name()));
        }
    } else if let Ok(describe) = (&mut *conn).describe(sql).await {
        // No rows to take names from; preparing the statement still
        // tells us the result shape for most SELECTs.
        for column in describe.columns() {
            table.add_column(DataColumn::new(column.name()));
        }
    }

    let width = table.column_count();
    for row in &rows {
        let values = (0..width).map(|idx| decode_cell(row, idx)).collect();
        table
            .add_row(DataRow::new(values))
            .map_err(sqlx::Error::Protocol)?;
    }

    table.infer_column_types();
    debug!(
        target: "store",
        "Query returned {} rows, {} columns",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Decode one cell, trying the common scalar types from most to least specific
fn decode_cell(row: &AnyRow, idx: usize) -> DataValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return DataValue::Null,
        Err(_) => return DataValue::Null,
        Ok(_) => {}
    }

    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return DataValue::Integer(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return DataValue::Integer(i64::from(v));
    }
    if let Ok(v) = row.try_get::<i16, _>(idx) {
        return DataValue::Integer(i64::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return DataValue::Float(v);
    }
    if let Ok(v) = row.try_get::<f32, _>(idx) {
        return DataValue::Float(f64::from(v));
    }
    if let Ok(v) = row.try_get::<bool, _>(idx) {
        return DataValue::Boolean(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return DataValue::String(v);
    }
    // Decimals, dates and friends: most drivers can still hand back text
    if let Ok(v) = row.try_get_unchecked::<String, _>(idx) {
        return DataValue::String(v);
    }

    DataValue::String(format!("<{}>", row.column(idx).type_info().name()))
}

/// Names of the tables in the connected database, sorted and deduplicated
pub async fn list_tables(
    conn: &mut AnyConnection,
    dialect: Dialect,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<AnyRow> = (&mut *conn).fetch_all(dialect.list_tables()).await?;

    let mut names: Vec<String> = rows
        .iter()
        .filter_map(|row| {
            row.try_get::<String, _>(0)
                .or_else(|_| row.try_get_unchecked::<String, _>(0))
                .ok()
        })
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

pub async fn table_exists(
    conn: &mut AnyConnection,
    dialect: Dialect,
    name: &str,
) -> Result<bool, sqlx::Error> {
    let tables = list_tables(conn, dialect).await?;
    Ok(tables.iter().any(|t| t.eq_ignore_ascii_case(name)))
}

/// Persist `table` under `name`, one INSERT per row.
///
/// No transaction is opened: a failure part way leaves the rows written
/// so far in place.
pub async fn write_table(
    conn: &mut AnyConnection,
    dialect: Dialect,
    table: &DataTable,
    name: &str,
    mode: WriteMode,
) -> Result<usize, sqlx::Error> {
    let create = match mode {
        WriteMode::Replace => {
            (&mut *conn)
                .execute(dialect.drop_table_if_exists(name).as_str())
                .await?;
            true
        }
        WriteMode::Append => !table_exists(conn, dialect, name).await?,
    };

    if create {
        let columns: Vec<_> = table
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type.clone()))
            .collect();
        let ddl = dialect.create_table(name, &columns);
        debug!(target: "store", "{}", ddl);
        (&mut *conn).execute(ddl.as_str()).await?;
    }

    let insert = dialect.insert_row(name, &table.column_names());
    for row in &table.rows {
        let mut query = sqlx::query::<Any>(&insert);
        for value in &row.values {
            query = bind_value(query, value);
        }
        query.execute(&mut *conn).await?;
    }

    debug!(
        target: "store",
        "Wrote {} rows into '{}' ({:?})",
        table.row_count(),
        name,
        mode
    );
    Ok(table.row_count())
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &DataValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        DataValue::Null => query.bind(Option::<String>::None),
        DataValue::Boolean(b) => query.bind(*b),
        DataValue::Integer(i) => query.bind(*i),
        DataValue::Float(f) => query.bind(*f),
        DataValue::String(s) => query.bind(s.clone()),
        DataValue::Nested(json) => query.bind(canonical_text(json)),
    }
}
