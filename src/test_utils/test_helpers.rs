//! Helper utilities for testing and development.

use crate::results::{ColumnNames, Row};
use crate::types::RowValues;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> Row {
    Row::new(ColumnNames::new(column_names), values)
}
