//! Connections: one interface over engine-backed and raw-driver-backed handles.
//!
//! A connection resolves its commit strategy once, when it is built, from the dialect's
//! policy and the requested auto-commit flag. Every statement goes through
//! [`Connection::raw_execute`] semantics: exactly one statement, bind placeholders checked
//! against the supplied parameters, one rollback-and-retry for transient driver errors and
//! a commit when the strategy calls for one.

mod cursors;
mod errors;
mod handle;
mod params;
mod retry;
mod to_table;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::dialect::{CommitStrategy, DialectPolicy};
use crate::driver::{Cursor, DriverHandle, EngineHandle};
use crate::error::SqlSessionError;
use crate::options::SessionOptions;
use crate::results::Frame;
use crate::resultset::LazyResultSet;
use crate::sql_text::{opens_transaction, split_statements};
use crate::store::{FragmentStore, IdentifierQuoting};
use crate::types::NamedParams;

pub(crate) use cursors::FetchRequest;
pub(crate) use errors::{CONNECTION_STRING_HINT, dropped_connection};
pub(crate) use handle::{ConnectionInner, ResultSetId};
pub use to_table::IfExists;

use errors::{closed_connection, wrap_statement_error};
use handle::LiveHandle;
use params::{params_for, validate_params};
use retry::with_transient_retry;

/// What [`Connection::execute`] produced.
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// Nothing was run; carries a status line for the front-end.
    Message(String),
    Rows(LazyResultSet),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub dialect: Option<String>,
    pub driver: Option<String>,
    pub server_version: Option<String>,
}

/// A named connection to one backend.
///
/// Cloning is cheap and yields another handle to the same connection. Result sets keep
/// only a weak reference, so dropping every `Connection` clone makes them unusable.
#[derive(Clone)]
pub struct Connection {
    inner: Rc<RefCell<ConnectionInner>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Connection")
            .field("alias", &inner.alias)
            .field("dialect", &inner.dialect)
            .field("driver", &inner.driver)
            .field("commit_strategy", &inner.commit_strategy)
            .field("closed", &inner.handle.is_none())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap an engine handle.
    ///
    /// When auto-commit is requested the engine is first asked for its native auto-commit
    /// isolation mode; without one the connection commits after each statement, except for
    /// dialects on the commit blacklist.
    #[must_use]
    pub fn from_engine(
        mut engine: Box<dyn EngineHandle>,
        alias: Option<&str>,
        options: &SessionOptions,
    ) -> Self {
        let dialect = engine.dialect();
        let policy = DialectPolicy::lookup(dialect.as_deref());
        let native_isolation = options.autocommit
            && match engine.enable_native_autocommit() {
                Ok(enabled) => enabled,
                Err(err) => {
                    tracing::debug!(error = %err, "native auto-commit isolation unavailable");
                    false
                }
            };
        let commit_strategy = policy.engine_commit_strategy(options.autocommit, native_isolation);
        let url = engine.url();
        let alias = alias.map_or_else(|| url.clone(), str::to_string);
        tracing::info!(%alias, ?dialect, ?commit_strategy, "opened engine connection");

        Self::build(ConnectionInner {
            alias,
            url: Some(url),
            driver: engine.driver(),
            server_version: engine.server_version(),
            dialect,
            policy,
            autocommit_requested: options.autocommit,
            commit_strategy,
            options: options.clone(),
            handle: Some(LiveHandle::Engine(engine)),
            cursors: IndexMap::new(),
            next_id: 0,
            shared_cursor_taken: false,
        })
    }

    /// Wrap a raw driver handle.
    ///
    /// The handle's capabilities are probed once here. A handle exposing both native
    /// converters is taken to be `DuckDB`; otherwise its own dialect hint is used.
    ///
    /// # Errors
    /// Returns `ConnectionError` when the handle cannot both close and commit.
    pub fn from_driver(
        handle: Box<dyn DriverHandle>,
        alias: Option<&str>,
        options: &SessionOptions,
    ) -> Result<Self, SqlSessionError> {
        let capabilities = handle.capabilities();
        let class_name = handle.class_name();
        if !capabilities.is_usable() {
            return Err(SqlSessionError::ConnectionError(format!(
                "{class_name} is not a usable database connection: it must support close and commit"
            )));
        }

        let dialect = if capabilities.looks_like_duckdb() {
            Some("duckdb".to_string())
        } else {
            handle.dialect_hint()
        };
        let policy = DialectPolicy::lookup(dialect.as_deref());
        let commit_strategy = policy.raw_commit_strategy(options.autocommit);
        let alias = alias.map_or_else(|| class_name.clone(), str::to_string);
        tracing::info!(%alias, ?dialect, ?commit_strategy, "wrapped driver connection");

        Ok(Self::build(ConnectionInner {
            alias,
            url: None,
            dialect,
            driver: Some(class_name),
            server_version: None,
            policy,
            autocommit_requested: options.autocommit,
            commit_strategy,
            options: options.clone(),
            handle: Some(LiveHandle::Raw {
                handle,
                capabilities,
            }),
            cursors: IndexMap::new(),
            next_id: 0,
            shared_cursor_taken: false,
        }))
    }

    fn build(inner: ConnectionInner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<ConnectionInner>> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RefCell<ConnectionInner>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Whether both values refer to the same connection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn alias(&self) -> String {
        self.inner.borrow().alias.clone()
    }

    pub(crate) fn set_alias(&self, alias: &str) {
        self.inner.borrow_mut().alias = alias.to_string();
    }

    #[must_use]
    pub fn dialect(&self) -> Option<String> {
        self.inner.borrow().dialect.clone()
    }

    #[must_use]
    pub fn driver(&self) -> Option<String> {
        self.inner.borrow().driver.clone()
    }

    /// Redacted URL for engine connections; `None` for raw driver handles.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.inner.borrow().url.clone()
    }

    #[must_use]
    pub fn policy(&self) -> DialectPolicy {
        self.inner.borrow().policy
    }

    #[must_use]
    pub fn commit_strategy(&self) -> CommitStrategy {
        self.inner.borrow().commit_strategy
    }

    #[must_use]
    pub fn autocommit_requested(&self) -> bool {
        self.inner.borrow().autocommit_requested
    }

    #[must_use]
    pub fn options(&self) -> SessionOptions {
        self.inner.borrow().options.clone()
    }

    /// Replace the fetch and feedback options; the commit strategy stays as resolved.
    pub fn set_options(&self, options: SessionOptions) {
        self.inner.borrow_mut().options = options;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().handle.is_none()
    }

    /// Number of result sets still registered with this connection.
    #[must_use]
    pub fn open_result_sets(&self) -> usize {
        self.inner.borrow().cursors.len()
    }

    #[must_use]
    pub fn database_info(&self) -> DatabaseInfo {
        let inner = self.inner.borrow();
        DatabaseInfo {
            dialect: inner.dialect.clone(),
            driver: inner.driver.clone(),
            server_version: inner.server_version.clone(),
        }
    }

    fn quoting(&self) -> IdentifierQuoting {
        if self.policy().backtick_identifiers {
            IdentifierQuoting::Backtick
        } else {
            IdentifierQuoting::Plain
        }
    }

    /// Run one statement and return its cursor, committing per the resolved strategy.
    pub(crate) fn run_statement(
        &self,
        sql: &str,
        params: Option<&NamedParams>,
    ) -> Result<Box<dyn Cursor>, SqlSessionError> {
        let count = split_statements(sql).len();
        if count > 1 {
            return Err(SqlSessionError::usage(format!(
                "Only one statement can be run per call, got {count}; split the text first"
            )));
        }
        if let Some(params) = params {
            validate_params(sql, params)?;
        }
        let no_params = NamedParams::new();
        let params = params.unwrap_or(&no_params);

        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let handle = inner
            .handle
            .as_mut()
            .ok_or_else(|| closed_connection(&inner.alias))?;

        let cursor = with_transient_retry(handle, |h| h.execute(sql, params))?;
        if inner.commit_strategy == CommitStrategy::ManualCommit
            && !inner.policy.suppress_commit_for(sql)
        {
            handle.commit().map_err(SqlSessionError::Driver)?;
        }
        Ok(cursor)
    }

    /// Run exactly one statement without fragment rendering or error rewrapping.
    ///
    /// # Errors
    /// - `Usage` when `sql` holds more than one statement.
    /// - `ParameterMismatch` when `params` is given and disagrees with the placeholders.
    /// - `TransientDriver` when a transient condition survives the retry.
    /// - `Driver` for any other driver failure.
    pub fn raw_execute(
        &self,
        sql: &str,
        params: Option<&NamedParams>,
    ) -> Result<LazyResultSet, SqlSessionError> {
        let cursor = self.run_statement(sql, params)?;
        self.report_rowcount(cursor.rowcount());
        LazyResultSet::new(self, cursor, sql.to_string(), params.cloned())
    }

    /// Render `text` with the requested fragments and run it.
    ///
    /// Blank text returns a status message. Text holding several statements runs them in
    /// order; the result set belongs to the last one. Driver errors are rewrapped with a
    /// clearer explanation for syntax, missing-table and authentication failures.
    ///
    /// # Errors
    /// - `KeyNotFound` when a fragment is not stored.
    /// - `Usage` for an explicit `BEGIN` or `START TRANSACTION`.
    /// - `ParameterMismatch`, `Syntax`, `TableNotFound`, `AuthFailure`, `TransientDriver`,
    ///   `Runtime` or `Driver` from running the statements.
    pub fn execute(
        &self,
        text: &str,
        with_fragments: &[&str],
        store: &FragmentStore,
        params: Option<&NamedParams>,
    ) -> Result<ExecuteOutcome, SqlSessionError> {
        let connected = || ExecuteOutcome::Message(format!("Connected: {}", self.alias()));
        if text.trim().is_empty() {
            return Ok(connected());
        }

        let rendered = store.render(text, with_fragments, self.quoting())?;
        let statements = split_statements(&rendered);
        let Some((last, leading)) = statements.split_last() else {
            return Ok(connected());
        };
        if opens_transaction(statements[0]) {
            return Err(SqlSessionError::usage(
                "Explicit transactions are not supported; commits follow the autocommit option",
            ));
        }
        if let Some(params) = params {
            validate_params(&rendered, params)?;
        }
        let params_of = |statement: &str| params.map(|p| params_for(statement, p));

        for statement in leading {
            let statement_params = params_of(statement);
            let mut cursor = self
                .run_statement(statement, statement_params.as_ref())
                .map_err(|e| wrap_statement_error(e, statement, Some(store)))?;
            self.report_rowcount(cursor.rowcount());
            if let Err(err) = cursor.close() {
                tracing::debug!(error = %err, "closing intermediate cursor failed");
            }
        }

        let statement_params = params_of(last);
        let cursor = self
            .run_statement(last, statement_params.as_ref())
            .map_err(|e| wrap_statement_error(e, last, Some(store)))?;
        self.report_rowcount(cursor.rowcount());
        let rows = LazyResultSet::new(self, cursor, (*last).to_string(), statement_params)?;
        Ok(ExecuteOutcome::Rows(rows))
    }

    fn report_rowcount(&self, rowcount: Option<u64>) {
        if let Some(count) = rowcount
            && count > 0
            && self.inner.borrow().options.feedback
        {
            tracing::info!("{count} rows affected.");
        }
    }

    /// Run `sql` through the backend's native tabular converter, when it has one.
    pub(crate) fn native_frame(&self, sql: &str) -> Result<Option<Frame>, SqlSessionError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let handle = inner
            .handle
            .as_mut()
            .ok_or_else(|| closed_connection(&inner.alias))?;
        let frame = handle
            .native_frame(sql)
            .transpose()
            .map_err(SqlSessionError::Driver)?;
        if frame.is_some() && inner.policy.single_live_cursor && handle.is_engine() {
            inner.shared_cursor_taken = true;
        }
        Ok(frame)
    }

    /// Close every open result set, then close or dispose the handle.
    ///
    /// Closing an already closed connection does nothing.
    ///
    /// # Errors
    /// Returns the driver's error from closing the handle; result-set cursors that fail to
    /// close are only logged.
    pub fn close(&self) -> Result<(), SqlSessionError> {
        let mut inner = self.inner.borrow_mut();
        for (_, slot) in inner.cursors.iter_mut() {
            if let Err(err) = slot.cursor.close() {
                tracing::warn!(error = %err, "closing result set cursor failed");
            }
        }
        inner.cursors.clear();

        if let Some(mut handle) = inner.handle.take() {
            handle.close().map_err(SqlSessionError::Driver)?;
            tracing::info!(alias = %inner.alias, "closed connection");
        }
        Ok(())
    }
}
