#![cfg(feature = "sqlite")]

use sql_session::prelude::*;

fn params(pairs: &[(&str, RowValues)]) -> NamedParams {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn setup_people(conn: &Connection) -> Result<(), SqlSessionError> {
    conn.raw_execute(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
        None,
    )?;
    for (id, name, age) in [(1, "ada", 36), (2, "brian", 12), (3, "carla", 51)] {
        conn.raw_execute(
            "INSERT INTO people (id, name, age) VALUES (:id, :name, :age)",
            Some(&params(&[
                ("id", RowValues::Int(id)),
                ("name", RowValues::Text(name.to_string())),
                ("age", RowValues::Int(age)),
            ])),
        )?;
    }
    Ok(())
}

#[test]
fn url_connection_round_trip_through_a_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}", dir.path().join("session.db").display());
    let options = SessionOptions::default();

    let mut registry = SessionRegistry::new();
    let conn = registry.connect(Some(ConnectionDescriptor::url(&url)), Some("file"), &options)?;
    assert_eq!(conn.commit_strategy(), CommitStrategy::NativeIsolation);
    setup_people(&conn)?;
    registry.close_all();
    assert!(conn.is_closed());

    let mut reopened = SessionRegistry::new();
    let conn = reopened.connect(Some(ConnectionDescriptor::url(&url)), None, &options)?;
    let mut rows = conn.raw_execute("SELECT name FROM people ORDER BY id", None)?;
    let names: Vec<String> = rows
        .rows()?
        .iter()
        .filter_map(|row| row.get("name").and_then(RowValues::as_text).map(str::to_string))
        .collect();
    assert_eq!(names, vec!["ada", "brian", "carla"]);
    Ok(())
}

#[test]
fn inserts_report_affected_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = SessionRegistry::new();
    let conn = registry.connect(
        Some(ConnectionDescriptor::url("sqlite://:memory:")),
        None,
        &SessionOptions::default(),
    )?;
    setup_people(&conn)?;

    let rows = conn.raw_execute("UPDATE people SET age = age + 1 WHERE age > 20", None)?;
    assert_eq!(rows.rowcount(), Some(2));
    assert!(rows.columns().is_empty());
    Ok(())
}

#[test]
fn fragments_run_against_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = SessionRegistry::new();
    let conn = registry.connect(
        Some(ConnectionDescriptor::url("sqlite://")),
        Some("mem"),
        &SessionOptions::default(),
    )?;
    setup_people(&conn)?;

    let mut store = FragmentStore::new();
    store.store("adults", "SELECT * FROM people WHERE age >= 18;", &[])?;
    store.store("names", "SELECT name FROM adults", &[])?;
    assert_eq!(store.dependencies("names")?, vec!["adults".to_string()]);

    let outcome = conn.execute("SELECT name FROM names ORDER BY name", &["names"], &store, None)?;
    let ExecuteOutcome::Rows(mut rows) = outcome else {
        panic!("expected rows");
    };
    let first = rows.get_by_key(&RowValues::Text("ada".into()))?;
    assert_eq!(first.get("name"), Some(&RowValues::Text("ada".into())));
    assert_eq!(rows.len()?, 2);
    Ok(())
}

#[test]
fn misspelled_fragment_is_explained() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = SessionRegistry::new();
    let conn = registry.connect(
        Some(ConnectionDescriptor::url("sqlite://")),
        None,
        &SessionOptions::default(),
    )?;
    let mut store = FragmentStore::new();
    store.store("adults", "SELECT 1 AS x", &[])?;

    let err = conn
        .execute("SELECT * FROM adult", &[], &store, None)
        .unwrap_err();
    assert!(matches!(err, SqlSessionError::TableNotFound { .. }));
    assert!(err.to_string().contains("\"adults\""));
    Ok(())
}

#[test]
fn result_sets_convert_and_write_back() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = SessionRegistry::new();
    let conn = registry.connect(
        Some(ConnectionDescriptor::url("sqlite://")),
        None,
        &SessionOptions::default(),
    )?;
    setup_people(&conn)?;

    let mut rows = conn.raw_execute("SELECT id, name, age FROM people ORDER BY id", None)?;
    let dict = rows.dict()?;
    assert_eq!(dict["age"], vec![RowValues::Int(36), RowValues::Int(12), RowValues::Int(51)]);
    let frame = rows.to_frame()?;
    assert_eq!(frame.height(), 3);
    assert_eq!(frame.column_names(), vec!["id", "name", "age"]);

    assert_eq!(conn.to_table("people_copy", &frame, IfExists::Fail, None)?, 3);
    assert!(matches!(
        conn.to_table("people_copy", &frame, IfExists::Fail, None),
        Err(SqlSessionError::Usage { .. })
    ));
    assert_eq!(conn.to_table("people_copy", &frame, IfExists::Append, None)?, 3);

    let mut count = conn.raw_execute("SELECT COUNT(*) AS n FROM people_copy", None)?;
    assert_eq!(count.rows()?[0].get("n"), Some(&RowValues::Int(6)));

    conn.to_table("people_copy", &frame, IfExists::Replace, None)?;
    let mut count = conn.raw_execute("SELECT COUNT(*) AS n FROM people_copy", None)?;
    assert_eq!(count.rows()?[0].get("n"), Some(&RowValues::Int(3)));
    Ok(())
}

#[test]
fn raw_driver_connection_commits_each_statement() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("raw.db");
    let handle = SqliteHandle::from_connection(rusqlite::Connection::open(&path)?);

    let mut registry = SessionRegistry::new();
    let conn = registry.connect(
        Some(ConnectionDescriptor::Raw(Box::new(handle))),
        None,
        &SessionOptions::default(),
    )?;
    assert_eq!(conn.alias(), "rusqlite.Connection");
    assert_eq!(conn.commit_strategy(), CommitStrategy::ManualCommit);
    conn.raw_execute("CREATE TABLE t (x INTEGER)", None)?;
    conn.raw_execute("INSERT INTO t VALUES (1), (2)", None)?;

    let check = rusqlite::Connection::open(&path)?;
    let count: i64 = check.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?;
    assert_eq!(count, 2);
    Ok(())
}

#[test]
fn autolimit_and_displaylimit_bound_fetching() -> Result<(), Box<dyn std::error::Error>> {
    let options = SessionOptions::builder().autolimit(2).displaylimit(1).finish();
    let mut registry = SessionRegistry::new();
    let conn = registry.connect(Some(ConnectionDescriptor::url("sqlite://")), None, &options)?;
    setup_people(&conn)?;

    let mut rows = conn.raw_execute("SELECT id FROM people ORDER BY id", None)?;
    assert_eq!(rows.preview()?.len(), 1);
    assert!(rows.is_truncated());
    assert_eq!(rows.len()?, 2);
    Ok(())
}
