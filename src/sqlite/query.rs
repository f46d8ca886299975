use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};

use crate::driver::BufferedCursor;
use crate::types::{NamedParams, RowValues};

use super::params::bind_list;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns the rusqlite error when the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<RowValues, rusqlite::Error> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run one statement and buffer its result.
///
/// Statements without result columns (DDL, DML without `RETURNING`) report the number of
/// changed rows instead.
///
/// # Errors
/// Returns the rusqlite error from preparing, binding or stepping the statement.
pub fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &NamedParams,
) -> Result<BufferedCursor, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let bound = bind_list(&stmt, params);
    let refs: Vec<(&str, &dyn ToSql)> = bound
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let column_count = stmt.column_count();
    if column_count == 0 {
        let changed = stmt.execute(refs.as_slice())?;
        return Ok(BufferedCursor::without_rows(u64::try_from(changed).ok()));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut rows = stmt.query(refs.as_slice())?;
    let mut buffered = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..column_count)
            .map(|idx| sqlite_extract_value(row, idx))
            .collect::<Result<Vec<_>, _>>()?;
        buffered.push(values);
    }
    Ok(BufferedCursor::with_rows(columns, buffered))
}
