use std::collections::VecDeque;

use crate::error::DriverError;
use crate::types::RowValues;

use super::{Cursor, NO_ROWS_MESSAGE};

/// Cursor over rows the driver already materialized.
///
/// Backends whose native API returns whole result sets (`rusqlite` statements stepped to
/// completion, `tokio-postgres` queries) hand their rows to this cursor.
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Option<Vec<String>>,
    rows: VecDeque<Vec<RowValues>>,
    rowcount: Option<u64>,
    closed: bool,
}

impl BufferedCursor {
    /// Cursor for a statement that produced rows.
    #[must_use]
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            columns: Some(columns),
            rows: rows.into(),
            rowcount: None,
            closed: false,
        }
    }

    /// Cursor for a statement without a result (DDL, DML without `RETURNING`).
    #[must_use]
    pub fn without_rows(rowcount: Option<u64>) -> Self {
        Self {
            columns: None,
            rows: VecDeque::new(),
            rowcount,
            closed: false,
        }
    }

    fn check_readable(&self) -> Result<(), DriverError> {
        if self.columns.is_none() {
            return Err(DriverError::new(NO_ROWS_MESSAGE));
        }
        if self.closed {
            return Err(DriverError::new("cursor is closed"));
        }
        Ok(())
    }
}

impl Cursor for BufferedCursor {
    fn columns(&self) -> Option<Vec<String>> {
        self.columns.clone()
    }

    fn fetch_many(&mut self, n: usize) -> Result<Vec<Vec<RowValues>>, DriverError> {
        self.check_readable()?;
        let take = n.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<RowValues>>, DriverError> {
        self.check_readable()?;
        Ok(self.rows.drain(..).collect())
    }

    fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetches_in_order_then_runs_dry() {
        let mut cursor = BufferedCursor::with_rows(
            vec!["x".into()],
            (1..=3).map(|i| vec![RowValues::Int(i)]).collect(),
        );
        assert_eq!(cursor.fetch_many(2).unwrap().len(), 2);
        assert_eq!(cursor.fetch_all().unwrap(), vec![vec![RowValues::Int(3)]]);
        assert!(cursor.fetch_many(5).unwrap().is_empty());
    }

    #[test]
    fn statements_without_rows_report_it() {
        let mut cursor = BufferedCursor::without_rows(Some(4));
        assert_eq!(cursor.rowcount(), Some(4));
        let err = cursor.fetch_many(2).unwrap_err();
        assert!(err.message.contains("does not return rows"));
    }
}
