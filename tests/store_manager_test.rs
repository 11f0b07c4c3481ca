use dataset_analyzer::data::datatable::{DataColumn, DataRow, DataTable, DataType, DataValue};
use dataset_analyzer::data::loaders::load_file;
use dataset_analyzer::data::normalizer::normalize;
use dataset_analyzer::store::connection::{BackendKind, ConnectionConfig};
use dataset_analyzer::store::error::StoreError;
use dataset_analyzer::store::{ConflictPolicy, StoreManager, StoreState};
use std::io::Write;
use tempfile::NamedTempFile;

fn people() -> DataTable {
    let mut table = DataTable::new("people");
    table.add_column(DataColumn::new("id").with_type(DataType::Integer));
    table.add_column(DataColumn::new("name"));
    table.add_column(DataColumn::new("score").with_type(DataType::Float));
    for (id, name, score) in [(1, "Alice", 9.5), (2, "Bob", 7.25), (3, "Carol", 8.0)] {
        table
            .add_row(DataRow::new(vec![
                DataValue::Integer(id),
                DataValue::String(name.to_string()),
                DataValue::Float(score),
            ]))
            .unwrap();
    }
    table
}

/// An empty file is a valid, empty SQLite database
fn sqlite_file() -> NamedTempFile {
    tempfile::Builder::new().suffix(".db").tempfile().unwrap()
}

fn count(store: &mut StoreManager, table: &str) -> i64 {
    let result = store
        .execute(&format!("SELECT COUNT(*) AS n FROM {}", table))
        .unwrap();
    match result.get_value(0, 0) {
        Some(DataValue::Integer(n)) => *n,
        other => panic!("unexpected count value {:?}", other),
    }
}

#[test]
fn test_load_then_select_preserves_shape() {
    let mut store = StoreManager::new().unwrap();
    let (frame, report) = normalize(people());
    assert!(report.is_noop());

    store.load(&frame, "dataset").unwrap();
    assert_eq!(store.current_table(), Some("dataset"));

    let result = store.execute("SELECT * FROM dataset").unwrap();
    assert_eq!(result.row_count(), 3);
    assert_eq!(result.column_names(), vec!["id", "name", "score"]);
    assert_eq!(
        result.get_value_by_name(1, "name"),
        Some(&DataValue::String("Bob".to_string()))
    );
    assert_eq!(store.last_result().map(|r| r.row_count()), Some(3));
}

#[test]
fn test_load_replaces_previous_dataset() {
    let mut store = StoreManager::new().unwrap();
    let (frame, _) = normalize(people());
    store.load(&frame, "dataset").unwrap();
    store.load(&frame, "dataset").unwrap();
    assert_eq!(count(&mut store, "dataset"), 3);
}

#[test]
fn test_empty_result_keeps_column_names() {
    let mut store = StoreManager::new().unwrap();
    let (frame, _) = normalize(people());
    store.load(&frame, "dataset").unwrap();

    let result = store
        .execute("SELECT id, name FROM dataset WHERE id > 100")
        .unwrap();
    assert_eq!(result.row_count(), 0);
    assert_eq!(result.column_names(), vec!["id", "name"]);
}

#[test]
fn test_bad_sql_is_query_error_and_state_survives() {
    let mut store = StoreManager::new().unwrap();
    let (frame, _) = normalize(people());
    store.load(&frame, "dataset").unwrap();

    assert!(matches!(
        store.execute("SELEC nothing"),
        Err(StoreError::Query(_))
    ));
    assert_eq!(count(&mut store, "dataset"), 3);
}

#[test]
fn test_json_records_with_nested_lists() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"[{{"a":1,"b":[1,2]}},{{"a":2,"b":[3]}}]"#).unwrap();
    file.flush().unwrap();

    let table = load_file(file.path(), "dataset").unwrap();
    let (frame, report) = normalize(table);
    assert_eq!(report.converted_columns, vec!["b"]);

    let mut store = StoreManager::new().unwrap();
    store.load(&frame, "dataset").unwrap();

    let result = store.execute("SELECT a FROM dataset WHERE a = 2").unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.get_value(0, 0), Some(&DataValue::Integer(2)));

    let result = store.execute("SELECT b FROM dataset ORDER BY a").unwrap();
    assert_eq!(
        result.get_value(0, 0),
        Some(&DataValue::String("[1,2]".to_string()))
    );
    assert_eq!(
        result.get_value(1, 0),
        Some(&DataValue::String("[3]".to_string()))
    );
}

#[test]
fn test_connect_and_disconnect_restore_ephemeral() {
    let db = sqlite_file();
    let mut store = StoreManager::new().unwrap();
    let (frame, _) = normalize(people());
    store.load(&frame, "dataset").unwrap();

    store
        .connect(ConnectionConfig::Sqlite {
            path: db.path().to_path_buf(),
        })
        .unwrap();
    assert_eq!(
        store.state(),
        StoreState::ExternalConnected(BackendKind::Sqlite)
    );
    assert!(store.list_tables().unwrap().is_empty());

    store.disconnect().unwrap();
    assert_eq!(store.state(), StoreState::Ephemeral);
    assert_eq!(store.list_tables().unwrap(), vec!["dataset"]);
    assert_eq!(count(&mut store, "dataset"), 3);
}

#[test]
fn test_load_while_connected_goes_to_external() {
    let db = sqlite_file();
    let mut store = StoreManager::new().unwrap();
    store
        .connect(ConnectionConfig::Sqlite {
            path: db.path().to_path_buf(),
        })
        .unwrap();

    let (frame, _) = normalize(people());
    store.load(&frame, "dataset").unwrap();
    assert_eq!(store.list_tables().unwrap(), vec!["dataset"]);

    store.disconnect().unwrap();
    assert!(store.list_tables().unwrap().is_empty());
}

#[test]
fn test_export_policies() {
    let db = sqlite_file();
    let mut store = StoreManager::new().unwrap();
    let (frame, _) = normalize(people());
    store.load(&frame, "dataset").unwrap();
    let result = store
        .execute("SELECT id, name FROM dataset WHERE score > 8")
        .unwrap();
    assert_eq!(result.row_count(), 2);

    store
        .connect(ConnectionConfig::Sqlite {
            path: db.path().to_path_buf(),
        })
        .unwrap();

    store
        .export(&result, "top", ConflictPolicy::Replace)
        .unwrap();
    assert_eq!(count(&mut store, "top"), 2);

    store.export(&result, "top", ConflictPolicy::Append).unwrap();
    assert_eq!(count(&mut store, "top"), 4);

    store
        .export(&result, "top", ConflictPolicy::Replace)
        .unwrap();
    assert_eq!(count(&mut store, "top"), 2);
}

#[test]
fn test_export_fail_leaves_existing_table_alone() {
    let db = sqlite_file();
    let mut store = StoreManager::new().unwrap();
    store
        .connect(ConnectionConfig::Sqlite {
            path: db.path().to_path_buf(),
        })
        .unwrap();
    store.execute("CREATE TABLE results (x INTEGER)").unwrap();
    store.execute("INSERT INTO results (x) VALUES (42)").unwrap();

    let (frame, _) = normalize(people());
    let err = store
        .export(frame.table(), "results", ConflictPolicy::Fail)
        .unwrap_err();
    assert!(matches!(err, StoreError::TableExists(ref name) if name == "results"));

    let result = store.execute("SELECT x FROM results").unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.get_value(0, 0), Some(&DataValue::Integer(42)));

    store
        .export(frame.table(), "fresh", ConflictPolicy::Fail)
        .unwrap();
    assert_eq!(count(&mut store, "fresh"), 3);
}

#[test]
fn test_replace_with_columnless_result_keeps_target() {
    let db = sqlite_file();
    let mut store = StoreManager::new().unwrap();
    store
        .connect(ConnectionConfig::Sqlite {
            path: db.path().to_path_buf(),
        })
        .unwrap();
    store.execute("CREATE TABLE keep (x INTEGER)").unwrap();
    store.execute("INSERT INTO keep (x) VALUES (1)").unwrap();

    // the INSERT leaves a result with no columns behind
    let last = store.last_result().cloned().unwrap();
    assert_eq!(last.column_count(), 0);

    let err = store
        .export(&last, "keep", ConflictPolicy::Replace)
        .unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));

    assert_eq!(store.list_tables().unwrap(), vec!["keep"]);
    assert_eq!(count(&mut store, "keep"), 1);
}

#[test]
fn test_export_while_ephemeral_is_not_connected() {
    let mut store = StoreManager::new().unwrap();
    let err = store
        .export(&people(), "anything", ConflictPolicy::Replace)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotConnected));
}

#[test]
fn test_reconnect_replaces_external() {
    let first = sqlite_file();
    let second = sqlite_file();
    let mut store = StoreManager::new().unwrap();

    store
        .connect(ConnectionConfig::Sqlite {
            path: first.path().to_path_buf(),
        })
        .unwrap();
    store.execute("CREATE TABLE only_in_first (x INTEGER)").unwrap();

    store
        .connect(ConnectionConfig::Sqlite {
            path: second.path().to_path_buf(),
        })
        .unwrap();
    assert!(store.list_tables().unwrap().is_empty());
}

#[test]
fn test_reset_ephemeral_drops_tables() {
    let mut store = StoreManager::new().unwrap();
    let (frame, _) = normalize(people());
    store.load(&frame, "dataset").unwrap();

    store.reset_ephemeral().unwrap();
    assert!(store.list_tables().unwrap().is_empty());
    assert_eq!(store.current_table(), None);
}
