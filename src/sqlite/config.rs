use std::time::Duration;

use crate::error::SqlSessionError;

use super::handle::SqliteHandle;

const MEMORY: &str = ":memory:";

/// Options for opening a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Switch file databases to write-ahead logging when opened.
    pub wal: bool,
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            wal: true,
            busy_timeout: None,
        }
    }

    /// Options for a `sqlite://` URL.
    ///
    /// `sqlite://` and `sqlite://:memory:` open an in-memory database; `sqlite:///abs/path.db`
    /// and `sqlite://relative.db` open files.
    ///
    /// # Errors
    /// Returns `ConfigError` when the URL does not use the `sqlite` scheme.
    pub fn from_url(url: &str) -> Result<Self, SqlSessionError> {
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(SqlSessionError::ConfigError(format!(
                "{url:?} is not a sqlite:// URL"
            )));
        };
        if !scheme.eq_ignore_ascii_case("sqlite") {
            return Err(SqlSessionError::ConfigError(format!(
                "{scheme:?} is not the sqlite scheme"
            )));
        }
        let path = rest.split_once('?').map_or(rest, |(path, _)| path);
        let path = if path.is_empty() { MEMORY } else { path };
        Ok(Self::new(path.to_string()))
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.db_path == MEMORY
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the database as an engine handle.
    ///
    /// # Errors
    /// Returns `Driver` errors from opening or configuring the database.
    pub fn open(self) -> Result<SqliteHandle, SqlSessionError> {
        SqliteHandle::open(&self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_map_to_paths() {
        assert!(SqliteOptions::from_url("sqlite://").unwrap().is_memory());
        assert!(SqliteOptions::from_url("sqlite://:memory:").unwrap().is_memory());
        assert_eq!(
            SqliteOptions::from_url("sqlite:///tmp/app.db").unwrap().db_path,
            "/tmp/app.db"
        );
        assert_eq!(
            SqliteOptions::from_url("SQLITE://data.db?mode=ro").unwrap().db_path,
            "data.db"
        );
        assert!(SqliteOptions::from_url("postgres://x").is_err());
    }
}
