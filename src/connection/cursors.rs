use crate::classify::{ErrorKind, classify};
use crate::driver::Cursor;
use crate::error::SqlSessionError;
use crate::types::{NamedParams, RowValues};

use super::Connection;
use super::errors::closed_connection;
use super::handle::{CursorSlot, ResultSetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchRequest {
    Many(usize),
    All,
}

/// Why a result set's cursor must be re-run before it can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staleness {
    /// Another statement ran on a connection that shares one cursor between result sets.
    Superseded,
    /// The driver closed the cursor when a newer statement ran.
    Closed,
}

impl Connection {
    pub(crate) fn register_cursor(
        &self,
        cursor: Box<dyn Cursor>,
        statement: String,
        params: Option<NamedParams>,
    ) -> ResultSetId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.shared_cursor_taken = false;
        inner.cursors.insert(
            id,
            CursorSlot {
                cursor,
                statement,
                params,
            },
        );
        id
    }

    /// Fetch from a result set's cursor, re-running its statement first when it went stale.
    ///
    /// `buffered` is how many rows the result set already holds; a re-run skips that many.
    pub(crate) fn fetch(
        &self,
        id: ResultSetId,
        request: FetchRequest,
        buffered: usize,
    ) -> Result<Vec<Vec<RowValues>>, SqlSessionError> {
        if let Some(staleness) = self.staleness(id)? {
            self.refresh(id, buffered, staleness)?;
        }

        let mut inner = self.inner.borrow_mut();
        let slot = inner.cursors.get_mut(&id).ok_or_else(|| {
            SqlSessionError::ExecutionError("result set is closed".to_string())
        })?;
        let rows = match request {
            FetchRequest::Many(n) => slot.cursor.fetch_many(n),
            FetchRequest::All => slot.cursor.fetch_all(),
        };
        rows.map_err(SqlSessionError::Driver)
    }

    /// Whether reading the result set would re-run its statement first.
    pub(crate) fn is_stale(&self, id: ResultSetId) -> Result<bool, SqlSessionError> {
        Ok(self.staleness(id)?.is_some())
    }

    fn staleness(&self, id: ResultSetId) -> Result<Option<Staleness>, SqlSessionError> {
        let inner = self.inner.borrow();
        let handle = inner
            .handle
            .as_ref()
            .ok_or_else(|| closed_connection(&inner.alias))?;
        let Some(slot) = inner.cursors.get(&id) else {
            return Ok(None);
        };

        if inner.policy.single_live_cursor
            && handle.is_engine()
            && (!inner.is_last(id) || inner.shared_cursor_taken)
        {
            return Ok(Some(Staleness::Superseded));
        }
        if slot.cursor.is_closed() && inner.policy.refreshes_closed_cursors(inner.driver.as_deref())
        {
            return Ok(Some(Staleness::Closed));
        }
        Ok(None)
    }

    fn refresh(
        &self,
        id: ResultSetId,
        buffered: usize,
        staleness: Staleness,
    ) -> Result<(), SqlSessionError> {
        let (statement, params) = {
            let mut inner = self.inner.borrow_mut();
            if staleness == Staleness::Closed {
                // the driver allows one open cursor; the others are re-run when next read
                for (_, other) in inner.cursors.iter_mut().filter(|(other, _)| **other != id) {
                    if let Err(err) = other.cursor.close() {
                        tracing::debug!(error = %err, "closing superseded cursor failed");
                    }
                }
            }
            let slot = inner.cursors.get(&id).ok_or_else(|| {
                SqlSessionError::ExecutionError("result set is closed".to_string())
            })?;
            (slot.statement.clone(), slot.params.clone())
        };

        tracing::debug!(?staleness, buffered, %statement, "re-running stale result set");
        let mut cursor = self.run_statement(&statement, params.as_ref())?;
        if buffered > 0
            && let Err(err) = cursor.fetch_many(buffered)
            && classify(err.code.as_deref(), &err.message, None) != ErrorKind::NoRows
        {
            return Err(SqlSessionError::Runtime(err));
        }

        let mut inner = self.inner.borrow_mut();
        if let Some(mut slot) = inner.cursors.shift_remove(&id) {
            slot.cursor = cursor;
            inner.cursors.insert(id, slot);
        }
        inner.shared_cursor_taken = false;
        Ok(())
    }

    pub(crate) fn close_cursor(&self, id: ResultSetId) -> Result<(), SqlSessionError> {
        let mut inner = self.inner.borrow_mut();
        match inner.cursors.shift_remove(&id) {
            Some(mut slot) => slot.cursor.close().map_err(SqlSessionError::Driver),
            None => Ok(()),
        }
    }

    /// Drop a result set's slot without reporting errors; used when the result set is dropped.
    pub(crate) fn release_cursor(&self, id: ResultSetId) {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return;
        };
        if let Some(mut slot) = inner.cursors.shift_remove(&id)
            && let Err(err) = slot.cursor.close()
        {
            tracing::debug!(error = %err, "closing released cursor failed");
        }
    }
}
