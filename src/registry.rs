//! The named connections of one session and which of them is current.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::connection::{CONNECTION_STRING_HINT, Connection};
use crate::driver::{DriverHandle, EngineHandle};
use crate::error::SqlSessionError;
use crate::options::SessionOptions;
use crate::suggest::{suggest, suggestions_message};

const KNOWN_SCHEMES: &[&str] = &["sqlite", "postgres", "postgresql"];

static URL_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<head>[A-Za-z][A-Za-z0-9+.\-]*://[^:/@]*:)[^@]*(?P<tail>@)")
        .expect("valid url password regex")
});

/// What to connect to.
pub enum ConnectionDescriptor {
    /// Connection URL, e.g. `sqlite://:memory:` or `postgresql://user:pw@host/db`.
    Url(String),
    /// An engine handle the caller already opened.
    Engine(Box<dyn EngineHandle>),
    /// A raw driver connection the caller already opened.
    Raw(Box<dyn DriverHandle>),
    /// A connection built elsewhere, to be tracked by this registry.
    Existing(Connection),
}

impl ConnectionDescriptor {
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        ConnectionDescriptor::Url(url.into())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDescriptor::Url(url) => f.debug_tuple("Url").field(&redact_url(url)).finish(),
            ConnectionDescriptor::Engine(engine) => {
                f.debug_tuple("Engine").field(&engine.url()).finish()
            }
            ConnectionDescriptor::Raw(handle) => {
                f.debug_tuple("Raw").field(&handle.class_name()).finish()
            }
            ConnectionDescriptor::Existing(conn) => f.debug_tuple("Existing").field(conn).finish(),
        }
    }
}

/// One line of [`SessionRegistry::connections`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub alias: String,
    pub url: Option<String>,
    pub dialect: Option<String>,
    pub current: bool,
}

/// Replace the password of a URL's user info with `***`.
#[must_use]
pub fn redact_url(url: &str) -> String {
    URL_PASSWORD.replace(url, "${head}***${tail}").into_owned()
}

/// Every `@`-separated piece of `needle` occurs in `haystack`, ignoring case.
fn rough_match(needle: &str, haystack: &str) -> bool {
    let haystack = haystack.to_lowercase();
    needle
        .split('@')
        .all(|piece| haystack.contains(&piece.to_lowercase()))
}

/// Named connections of a session, keyed by alias, plus the current one.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    connections: BTreeMap<String, Connection>,
    current: Option<String>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `descriptor` to a connection and make it current.
    ///
    /// A URL matching a tracked connection reuses it when `alias` is absent or equal to that
    /// connection's alias. Without a descriptor the current connection is returned, falling
    /// back to the `DATABASE_URL` environment variable.
    ///
    /// # Errors
    /// - `Usage` when there is no descriptor, no current connection and no `DATABASE_URL`.
    /// - `ConnectionError` for unknown URL schemes and failures opening the backend.
    /// - `Unimplemented` when the URL's backend was compiled out.
    pub fn connect(
        &mut self,
        descriptor: Option<ConnectionDescriptor>,
        alias: Option<&str>,
        options: &SessionOptions,
    ) -> Result<Connection, SqlSessionError> {
        let descriptor = match descriptor {
            Some(descriptor) => descriptor,
            None => {
                if let Some(conn) = self.current() {
                    tracing::info!("Running query in {:?}", conn.alias());
                    return Ok(conn);
                }
                match std::env::var("DATABASE_URL") {
                    Ok(url) if !url.trim().is_empty() => ConnectionDescriptor::Url(url),
                    _ => {
                        return Err(SqlSessionError::usage(format!(
                            "No active connection.\n\n{CONNECTION_STRING_HINT}"
                        )));
                    }
                }
            }
        };

        let conn = match descriptor {
            ConnectionDescriptor::Url(url) => {
                if let Some(existing) = self.find_by_url(&url) {
                    let existing_alias = existing.alias();
                    match alias {
                        None => {
                            tracing::info!("Switching to connection {existing_alias:?}");
                            self.current = Some(existing_alias);
                            return Ok(existing);
                        }
                        Some(alias) if alias == existing_alias => {
                            self.current = Some(existing_alias);
                            return Ok(existing);
                        }
                        Some(_) => {}
                    }
                }
                open_url(&url, alias, options)?
            }
            ConnectionDescriptor::Engine(engine) => Connection::from_engine(engine, alias, options),
            ConnectionDescriptor::Raw(handle) => Connection::from_driver(handle, alias, options)?,
            ConnectionDescriptor::Existing(conn) => {
                if let Some(alias) = alias {
                    conn.set_alias(alias);
                }
                conn
            }
        };
        Ok(self.track(conn))
    }

    fn find_by_url(&self, url: &str) -> Option<Connection> {
        let redacted = redact_url(url);
        self.connections
            .iter()
            .find(|(alias, conn)| {
                rough_match(&redacted, alias)
                    || conn.url().is_some_and(|known| rough_match(&redacted, &known))
            })
            .map(|(_, conn)| conn.clone())
    }

    fn track(&mut self, conn: Connection) -> Connection {
        let alias = conn.alias();
        if let Some(previous) = self.connections.insert(alias.clone(), conn.clone())
            && !previous.ptr_eq(&conn)
        {
            tracing::info!(alias = %alias, "replacing connection with the same alias");
            if let Err(err) = previous.close() {
                tracing::warn!(alias = %alias, error = %err, "closing replaced connection failed");
            }
        }
        self.current = Some(alias);
        conn
    }

    #[must_use]
    pub fn current(&self) -> Option<Connection> {
        self.current
            .as_ref()
            .and_then(|alias| self.connections.get(alias))
            .cloned()
    }

    /// Make the connection named `alias` current.
    ///
    /// # Errors
    /// `ConnectionError` with the closest aliases when `alias` is unknown.
    pub fn set_current(&mut self, alias: &str) -> Result<Connection, SqlSessionError> {
        let conn = self.get(alias)?;
        self.current = Some(alias.to_string());
        Ok(conn)
    }

    /// # Errors
    /// `ConnectionError` with the closest aliases when `alias` is unknown.
    pub fn get(&self, alias: &str) -> Result<Connection, SqlSessionError> {
        self.connections
            .get(alias)
            .cloned()
            .ok_or_else(|| self.unknown_alias(alias))
    }

    fn unknown_alias(&self, alias: &str) -> SqlSessionError {
        let known: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        let suggestions = suggest(alias, known.iter().copied());
        SqlSessionError::ConnectionError(format!(
            "Could not find connection {alias:?} (available connections: {}).{}",
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            },
            suggestions_message(&suggestions)
        ))
    }

    /// Close the connection named `alias` and stop tracking it.
    ///
    /// # Errors
    /// `ConnectionError` when `alias` is unknown; driver errors from closing the handle.
    pub fn close(&mut self, alias: &str) -> Result<(), SqlSessionError> {
        let conn = self
            .connections
            .remove(alias)
            .ok_or_else(|| self.unknown_alias(alias))?;
        if self.current.as_deref() == Some(alias) {
            self.current = None;
        }
        conn.close()
    }

    /// Close every connection, logging failures instead of stopping at them.
    pub fn close_all(&mut self) {
        for (alias, conn) in std::mem::take(&mut self.connections) {
            if let Err(err) = conn.close() {
                tracing::warn!(alias = %alias, error = %err, "closing connection failed");
            }
        }
        self.current = None;
    }

    /// Tracked connections, sorted by alias.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections
            .iter()
            .map(|(alias, conn)| ConnectionInfo {
                alias: alias.clone(),
                url: conn.url(),
                dialect: conn.dialect(),
                current: self.current.as_deref() == Some(alias.as_str()),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn open_url(
    url: &str,
    alias: Option<&str>,
    options: &SessionOptions,
) -> Result<Connection, SqlSessionError> {
    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase());
    let creation_error = |err: &dyn fmt::Display| {
        SqlSessionError::ConnectionError(format!(
            "An error happened while creating the connection: {err}.\n\n{CONNECTION_STRING_HINT}"
        ))
    };

    match scheme.as_deref() {
        Some("sqlite") => open_sqlite(url, alias, options).map_err(|err| match err {
            SqlSessionError::Unimplemented(_) => err,
            other => creation_error(&other),
        }),
        Some("postgres" | "postgresql") => {
            open_postgres(url, alias, options).map_err(|err| match err {
                SqlSessionError::Unimplemented(_) => err,
                other => creation_error(&other),
            })
        }
        Some(other) => {
            let suggestions = suggest(other, KNOWN_SCHEMES.iter().copied());
            Err(creation_error(&format!(
                "unknown database scheme {other:?}{}",
                suggestions_message(&suggestions)
            )))
        }
        None => Err(creation_error(&format!("{:?} is not a URL", redact_url(url)))),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(
    url: &str,
    alias: Option<&str>,
    options: &SessionOptions,
) -> Result<Connection, SqlSessionError> {
    let handle = crate::sqlite::SqliteHandle::open_url(url)?;
    Ok(Connection::from_engine(Box::new(handle), alias, options))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(
    _url: &str,
    _alias: Option<&str>,
    _options: &SessionOptions,
) -> Result<Connection, SqlSessionError> {
    Err(SqlSessionError::Unimplemented(
        "SQLite support requires the `sqlite` feature".to_string(),
    ))
}

#[cfg(feature = "postgres")]
fn open_postgres(
    url: &str,
    alias: Option<&str>,
    options: &SessionOptions,
) -> Result<Connection, SqlSessionError> {
    let engine = crate::postgres::PostgresEngine::open_url(url)?;
    Ok(Connection::from_engine(Box::new(engine), alias, options))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(
    _url: &str,
    _alias: Option<&str>,
    _options: &SessionOptions,
) -> Result<Connection, SqlSessionError> {
    Err(SqlSessionError::Unimplemented(
        "PostgreSQL support requires the `postgres` feature".to_string(),
    ))
}
