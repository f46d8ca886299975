use std::path::Path;

use rusqlite::Connection;

use crate::driver::{Capabilities, Cursor, DriverHandle, EngineHandle};
use crate::error::{DriverError, SqlSessionError};
use crate::types::NamedParams;

use super::config::SqliteOptions;
use super::query::run_statement;

/// A `SQLite` database, usable as an engine handle or as a raw driver handle.
///
/// Until native auto-commit is switched on, the first statement after a commit or rollback
/// opens a transaction, so writes become durable only when committed.
#[derive(Debug)]
pub struct SqliteHandle {
    conn: Option<Connection>,
    url: String,
    implicit_transactions: bool,
}

impl SqliteHandle {
    /// Open the database at `options.db_path`.
    ///
    /// # Errors
    /// Returns `Driver` errors from opening or configuring the database.
    pub fn open(options: &SqliteOptions) -> Result<Self, SqlSessionError> {
        let conn = if options.is_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(&options.db_path))
        }
        .map_err(DriverError::from)?;

        if let Some(timeout) = options.busy_timeout {
            conn.busy_timeout(timeout).map_err(DriverError::from)?;
        }
        if options.wal && !options.is_memory() {
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(DriverError::from)?;
        }
        tracing::debug!(path = %options.db_path, "opened sqlite database");

        Ok(Self {
            conn: Some(conn),
            url: format!("sqlite://{}", options.db_path),
            implicit_transactions: true,
        })
    }

    /// Open a `sqlite://` URL.
    ///
    /// # Errors
    /// `ConfigError` for malformed URLs; `Driver` errors from opening the database.
    pub fn open_url(url: &str) -> Result<Self, SqlSessionError> {
        Self::open(&SqliteOptions::from_url(url)?)
    }

    /// Wrap a connection the caller opened, for use as a raw driver handle.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        let url = conn
            .path()
            .filter(|path| !path.is_empty())
            .map_or_else(|| "sqlite://:memory:".to_string(), |path| format!("sqlite://{path}"));
        Self {
            conn: Some(conn),
            url,
            implicit_transactions: true,
        }
    }

    fn live(&self) -> Result<&Connection, DriverError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DriverError::new("sqlite connection is closed"))
    }

    fn run(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError> {
        let conn = self.live()?;
        if self.implicit_transactions && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(Box::new(run_statement(conn, sql, params)?))
    }

    fn finish_transaction(&mut self, verb: &str) -> Result<(), DriverError> {
        let conn = self.live()?;
        if !conn.is_autocommit() {
            conn.execute_batch(verb)?;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| DriverError::from(err)),
            None => Ok(()),
        }
    }
}

impl EngineHandle for SqliteHandle {
    fn dialect(&self) -> Option<String> {
        Some("sqlite".to_string())
    }

    fn driver(&self) -> Option<String> {
        Some("rusqlite".to_string())
    }

    fn server_version(&self) -> Option<String> {
        Some(rusqlite::version().to_string())
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn enable_native_autocommit(&mut self) -> Result<bool, DriverError> {
        self.finish_transaction("COMMIT")?;
        self.implicit_transactions = false;
        Ok(true)
    }

    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError> {
        self.run(sql, params)
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.finish_transaction("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.finish_transaction("ROLLBACK")
    }

    fn dispose(&mut self) -> Result<(), DriverError> {
        self.shutdown()
    }
}

impl DriverHandle for SqliteHandle {
    fn class_name(&self) -> String {
        "rusqlite.Connection".to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            close: true,
            commit: true,
            rollback: true,
            native_frame: false,
            native_arrow: false,
        }
    }

    fn dialect_hint(&self) -> Option<String> {
        Some("sqlite".to_string())
    }

    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError> {
        self.run(sql, params)
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.finish_transaction("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.finish_transaction("ROLLBACK")
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    #[test]
    fn engine_form_commits_implicit_transactions() {
        let mut handle = SqliteHandle::open_url("sqlite://:memory:").unwrap();
        EngineHandle::execute(&mut handle, "CREATE TABLE t (x INTEGER)", &NamedParams::new())
            .unwrap();
        assert!(!handle.live().unwrap().is_autocommit());
        EngineHandle::commit(&mut handle).unwrap();
        assert!(handle.live().unwrap().is_autocommit());
    }

    #[test]
    fn native_autocommit_skips_begin() {
        let mut handle = SqliteHandle::open_url("sqlite://").unwrap();
        assert!(handle.enable_native_autocommit().unwrap());
        let params = NamedParams::from([("v".to_string(), RowValues::Int(7))]);
        EngineHandle::execute(&mut handle, "SELECT :v AS v", &params).unwrap();
        assert!(handle.live().unwrap().is_autocommit());
    }

    #[test]
    fn failures_carry_extended_codes() {
        let mut handle = SqliteHandle::open_url("sqlite://").unwrap();
        let Err(err) = EngineHandle::execute(&mut handle, "SELECT * FROM missing", &NamedParams::new())
        else {
            panic!("query against a missing table succeeded");
        };
        assert!(err.code.is_some());
        assert!(err.message.contains("no such table"));
    }
}
