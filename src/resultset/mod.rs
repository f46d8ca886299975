//! Incrementally fetched result sets.
//!
//! A [`LazyResultSet`] moves through two states, `Fetching` and `Done`. It becomes `Done`
//! when a fetch returns fewer rows than asked for, when the buffered rows reach the
//! auto-limit, or when everything has been drained. Buffered rows are always a prefix of the
//! statement's true result, in backend order.

use std::cell::RefCell;
use std::rc::Weak;

use indexmap::IndexMap;

use crate::classify::{ErrorKind, classify};
use crate::connection::{
    Connection, ConnectionInner, FetchRequest, ResultSetId, dropped_connection,
};
use crate::driver::Cursor;
use crate::error::SqlSessionError;
use crate::options::RowLimit;
use crate::results::{ColumnNames, Frame, Row, unduplicate_field_names};
use crate::sql_text::{is_select_like, leading_keyword};
use crate::types::{NamedParams, RowValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Fetching,
    Done,
}

/// Rows of one statement, fetched only as far as callers need them.
#[derive(Debug)]
pub struct LazyResultSet {
    conn: Weak<RefCell<ConnectionInner>>,
    id: ResultSetId,
    statement: String,
    columns: ColumnNames,
    rows: Vec<Row>,
    state: FetchState,
    rowcount: Option<u64>,
    displaylimit: RowLimit,
    autolimit: RowLimit,
    closed: bool,
}

impl LazyResultSet {
    /// Register `cursor` with its connection and fetch speculatively.
    ///
    /// The first fetch asks for two rows (one when the auto-limit is 1) so callers can tell
    /// whether more rows exist without another round trip.
    pub(crate) fn new(
        conn: &Connection,
        cursor: Box<dyn Cursor>,
        statement: String,
        params: Option<NamedParams>,
    ) -> Result<Self, SqlSessionError> {
        let options = conn.options();
        let columns = cursor
            .columns()
            .map(|names| unduplicate_field_names(&names))
            .unwrap_or_default();
        let rowcount = cursor.rowcount();
        let id = conn.register_cursor(cursor, statement.clone(), params);

        let mut result = Self {
            conn: conn.downgrade(),
            id,
            statement,
            columns: ColumnNames::new(columns),
            rows: Vec::new(),
            state: FetchState::Fetching,
            rowcount,
            displaylimit: options.displaylimit,
            autolimit: options.autolimit,
            closed: false,
        };
        let speculative = if options.autolimit.cap() == Some(1) { 1 } else { 2 };
        result.fetch_many(speculative)?;
        Ok(result)
    }

    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Column names, de-duplicated; empty for statements without rows.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.columns.as_slice()
    }

    /// Rows fetched so far, without fetching more.
    #[must_use]
    pub fn buffered_rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn state(&self) -> FetchState {
        self.state
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == FetchState::Done
    }

    /// Rows affected, as reported by the driver when the statement ran.
    #[must_use]
    pub fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }

    #[must_use]
    pub fn autolimit(&self) -> RowLimit {
        self.autolimit
    }

    #[must_use]
    pub fn displaylimit(&self) -> RowLimit {
        self.displaylimit
    }

    fn remaining_allowance(&self) -> Option<usize> {
        self.autolimit
            .cap()
            .map(|cap| cap.saturating_sub(self.rows.len()))
    }

    fn limit_reached(&self) -> bool {
        self.remaining_allowance() == Some(0)
    }

    /// Fetch up to `n` more rows and return the ones just fetched.
    ///
    /// Never returns more than `n` rows and never buffers past the auto-limit.
    ///
    /// # Errors
    /// - `ConnectionError` when the owning connection is closed or gone.
    /// - `Runtime` for driver failures other than "no rows to fetch".
    pub fn fetch_many(&mut self, n: usize) -> Result<&[Row], SqlSessionError> {
        let start = self.rows.len();
        if self.is_done() || n == 0 {
            return Ok(&self.rows[start..]);
        }
        let want = self.remaining_allowance().map_or(n, |left| n.min(left));
        if want == 0 {
            self.state = FetchState::Done;
            return Ok(&self.rows[start..]);
        }

        let fetched = self.pull(FetchRequest::Many(want))?;
        let short = fetched.len() < want;
        self.append(fetched);
        if short || self.limit_reached() {
            self.state = FetchState::Done;
        }
        Ok(&self.rows[start..])
    }

    /// Drain the remaining rows, up to the auto-limit. Does nothing once `Done`.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`].
    pub fn materialize_all(&mut self) -> Result<(), SqlSessionError> {
        if self.is_done() {
            return Ok(());
        }
        let fetched = match self.remaining_allowance() {
            None => self.pull(FetchRequest::All)?,
            Some(0) => Vec::new(),
            Some(left) => self.pull(FetchRequest::Many(left))?,
        };
        self.append(fetched);
        self.state = FetchState::Done;
        Ok(())
    }

    fn pull(&mut self, request: FetchRequest) -> Result<Vec<Vec<RowValues>>, SqlSessionError> {
        if self.closed {
            return Err(SqlSessionError::ExecutionError(
                "result set is closed".to_string(),
            ));
        }
        let conn = Connection::upgrade(&self.conn).ok_or_else(dropped_connection)?;
        match conn.fetch(self.id, request, self.rows.len()) {
            Ok(rows) => Ok(rows),
            Err(SqlSessionError::Driver(err)) => {
                if classify(err.code.as_deref(), &err.message, None) == ErrorKind::NoRows {
                    self.state = FetchState::Done;
                    Ok(Vec::new())
                } else {
                    Err(SqlSessionError::Runtime(err))
                }
            }
            Err(other) => Err(other),
        }
    }

    fn append(&mut self, fetched: Vec<Vec<RowValues>>) {
        self.rows.extend(
            fetched
                .into_iter()
                .map(|values| Row::new(self.columns.clone(), values)),
        );
    }

    /// Every row, fetching the rest first. Iterating the returned slice can be repeated.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`].
    pub fn rows(&mut self) -> Result<&[Row], SqlSessionError> {
        self.materialize_all()?;
        Ok(&self.rows)
    }

    /// Number of rows, fetching the rest first.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`].
    pub fn len(&mut self) -> Result<usize, SqlSessionError> {
        self.materialize_all()?;
        Ok(self.rows.len())
    }

    /// Whether the statement produced no rows, fetching the rest first.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`].
    pub fn is_empty(&mut self) -> Result<bool, SqlSessionError> {
        Ok(self.len()? == 0)
    }

    /// Rows to display: up to the display limit, or everything when it is unlimited.
    ///
    /// One row past the limit is fetched so [`LazyResultSet::is_truncated`] can tell
    /// whether more exist.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`].
    pub fn preview(&mut self) -> Result<&[Row], SqlSessionError> {
        let Some(limit) = self.displaylimit.cap() else {
            return self.rows();
        };
        let wanted = limit.saturating_add(1);
        if self.rows.len() < wanted {
            self.fetch_many(wanted - self.rows.len())?;
        }
        let shown = self.rows.len().min(limit);
        Ok(&self.rows[..shown])
    }

    /// Whether more rows exist than the display limit shows.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.displaylimit
            .cap()
            .is_some_and(|limit| self.rows.len() > limit)
    }

    /// Column name to that column's values, in row order.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`].
    pub fn dict(&mut self) -> Result<IndexMap<String, Vec<RowValues>>, SqlSessionError> {
        self.materialize_all()?;
        Ok(self
            .columns
            .as_slice()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values = self
                    .rows
                    .iter()
                    .map(|row| row.get_by_index(idx).cloned().unwrap_or(RowValues::Null))
                    .collect();
                (name.clone(), values)
            })
            .collect())
    }

    /// Rows as JSON records.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`].
    pub fn dicts(
        &mut self,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, SqlSessionError> {
        self.materialize_all()?;
        Ok(self.rows.iter().map(Row::to_json).collect())
    }

    /// Convert to a column-oriented frame.
    ///
    /// When the backend has a native tabular converter and the statement can be re-run, the
    /// converter runs the statement again and builds the frame itself; otherwise the rows are
    /// materialized and copied.
    ///
    /// # Errors
    /// As [`LazyResultSet::fetch_many`], plus driver errors from the native converter.
    pub fn to_frame(&mut self) -> Result<Frame, SqlSessionError> {
        let rerunnable = is_select_like(&self.statement)
            && leading_keyword(&self.statement).as_deref() != Some("values");
        if rerunnable
            && !self.closed
            && let Some(conn) = Connection::upgrade(&self.conn)
        {
            // an unread PIVOT cursor keeps its transaction open and the re-run fails
            if self.statement.to_ascii_lowercase().contains("pivot") && !conn.is_stale(self.id)? {
                self.materialize_all()?;
            }
            if let Some(frame) = conn.native_frame(&self.statement)? {
                tracing::debug!(statement = %self.statement, "converted result set with native frame");
                return Ok(frame);
            }
        }
        self.materialize_all()?;
        Ok(Frame::from_rows(self.columns.as_slice(), &self.rows))
    }

    /// The row whose leftmost column equals `key`.
    ///
    /// # Errors
    /// `Usage` when no row or more than one row matches.
    pub fn get_by_key(&mut self, key: &RowValues) -> Result<&Row, SqlSessionError> {
        self.materialize_all()?;
        let mut matches = self
            .rows
            .iter()
            .filter(|row| row.get_by_index(0) == Some(key));
        match (matches.next(), matches.next()) {
            (Some(row), None) => Ok(row),
            (None, _) => Err(SqlSessionError::usage(format!(
                "No row has {key:?} in its first column"
            ))),
            (Some(_), Some(_)) => Err(SqlSessionError::usage(format!(
                "More than one row has {key:?} in its first column"
            ))),
        }
    }

    /// Close the cursor and unregister from the connection. Buffered rows stay readable.
    ///
    /// # Errors
    /// Returns the driver's error from closing the cursor.
    pub fn close(&mut self) -> Result<(), SqlSessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.state = FetchState::Done;
        match Connection::upgrade(&self.conn) {
            Some(conn) => conn.close_cursor(self.id),
            None => Ok(()),
        }
    }
}

impl Drop for LazyResultSet {
    fn drop(&mut self) {
        if !self.closed
            && let Some(conn) = Connection::upgrade(&self.conn)
        {
            conn.release_cursor(self.id);
        }
    }
}
