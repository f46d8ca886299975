#![cfg(feature = "test-utils-postgres")]

use sql_session::prelude::*;
use sql_session::test_utils::{setup_postgres_embedded, stop_postgres_embedded};

fn params(pairs: &[(&str, RowValues)]) -> NamedParams {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn count(conn: &Connection, table: &str) -> Result<Option<i64>, SqlSessionError> {
    let mut rows = conn.raw_execute(&format!("SELECT COUNT(*) AS n FROM {table}"), None)?;
    Ok(rows.rows()?[0].get("n").and_then(RowValues::as_int).copied())
}

#[test]
fn named_parameters_bind_through_execute() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("session_params")?;
    let options = SessionOptions::default();
    let mut registry = SessionRegistry::new();

    let writer = registry.connect(
        Some(ConnectionDescriptor::url(&pg.database_url)),
        Some("writer"),
        &options,
    )?;
    assert_eq!(writer.commit_strategy(), CommitStrategy::NativeIsolation);
    assert_eq!(writer.dialect().as_deref(), Some("postgresql"));

    writer.raw_execute("CREATE TABLE people (id BIGINT, name TEXT)", None)?;
    let store = FragmentStore::new();
    for (id, name) in [(1, "ada"), (2, "brian")] {
        writer.execute(
            "INSERT INTO people (id, name) VALUES (:id, :name)",
            &[],
            &store,
            Some(&params(&[
                ("id", RowValues::Int(id)),
                ("name", RowValues::Text(name.to_string())),
            ])),
        )?;
    }

    let reader = registry.connect(
        Some(ConnectionDescriptor::url(&pg.database_url)),
        Some("reader"),
        &options,
    )?;
    let mut rows = reader.raw_execute(
        "SELECT name FROM people WHERE id = :id",
        Some(&params(&[("id", RowValues::Int(2))])),
    )?;
    let found = rows.get_by_key(&RowValues::Text("brian".into()))?;
    assert_eq!(found.get("name"), Some(&RowValues::Text("brian".into())));

    registry.close_all();
    stop_postgres_embedded(pg);
    Ok(())
}

#[test]
fn implicit_transactions_commit_and_roll_back() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("session_tx")?;
    let mut registry = SessionRegistry::new();
    let reader = registry.connect(
        Some(ConnectionDescriptor::url(&pg.database_url)),
        Some("reader"),
        &SessionOptions::default(),
    )?;
    reader.raw_execute("CREATE TABLE t (id BIGINT)", None)?;

    let mut engine = PostgresEngine::open_url(&pg.database_url)?;
    let insert = "INSERT INTO t (id) VALUES (:id)";
    engine.execute(insert, &params(&[("id", RowValues::Int(1))]))?;
    assert_eq!(count(&reader, "t")?, Some(0));
    engine.commit()?;
    assert_eq!(count(&reader, "t")?, Some(1));

    engine.execute(insert, &params(&[("id", RowValues::Int(2))]))?;
    engine.rollback()?;
    assert_eq!(count(&reader, "t")?, Some(1));
    // nothing open, so these are no-ops
    engine.commit()?;
    engine.rollback()?;

    assert!(engine.enable_native_autocommit()?);
    engine.execute(insert, &params(&[("id", RowValues::Int(3))]))?;
    assert_eq!(count(&reader, "t")?, Some(2));
    engine.dispose()?;

    stop_postgres_embedded(pg);
    Ok(())
}

#[test]
fn disabled_autocommit_leaves_work_uncommitted() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("session_manual")?;
    let mut registry = SessionRegistry::new();
    let reader = registry.connect(
        Some(ConnectionDescriptor::url(&pg.database_url)),
        Some("reader"),
        &SessionOptions::default(),
    )?;
    reader.raw_execute("CREATE TABLE t (id BIGINT)", None)?;

    let manual = registry.connect(
        Some(ConnectionDescriptor::url(&pg.database_url)),
        Some("manual"),
        &SessionOptions::builder().autocommit(false).finish(),
    )?;
    assert_eq!(manual.commit_strategy(), CommitStrategy::None);
    manual.raw_execute("INSERT INTO t (id) VALUES (1)", None)?;
    assert_eq!(count(&manual, "t")?, Some(1));
    assert_eq!(count(&reader, "t")?, Some(0));

    registry.close("manual")?;
    assert_eq!(count(&reader, "t")?, Some(0));

    registry.close_all();
    stop_postgres_embedded(pg);
    Ok(())
}
