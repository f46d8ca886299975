use rusqlite::Statement;
use rusqlite::types::Value;

use crate::types::{NamedParams, RowValues};

/// Convert a single `RowValues` to a rusqlite `Value`.
///
/// `SQLite` has no boolean, timestamp or JSON storage classes: booleans become integers,
/// timestamps ISO-8601 text and JSON its serialized text.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// `(":name", value)` pairs for the parameters the prepared statement declares.
pub(crate) fn bind_list(stmt: &Statement<'_>, params: &NamedParams) -> Vec<(String, Value)> {
    params
        .iter()
        .map(|(name, value)| (format!(":{name}"), value))
        .filter(|(name, _)| matches!(stmt.parameter_index(name), Ok(Some(_))))
        .map(|(name, value)| (name, row_value_to_sqlite_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn values_map_to_storage_classes() {
        assert_eq!(row_value_to_sqlite_value(&RowValues::Bool(true)), Value::Integer(1));
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .unwrap();
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Timestamp(ts)),
            Value::Text("2024-03-01 12:30:00".into())
        );
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::JSON(serde_json::json!({"a": 1}))),
            Value::Text("{\"a\":1}".into())
        );
    }
}
