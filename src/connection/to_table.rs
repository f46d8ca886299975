use clap::ValueEnum;

use crate::classify::{ErrorKind, classify};
use crate::dialect::Dialect;
use crate::error::SqlSessionError;
use crate::results::{Frame, FrameColumn};
use crate::types::{NamedParams, RowValues};

use super::Connection;

/// What [`Connection::to_table`] does when the table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IfExists {
    #[default]
    Fail,
    Replace,
    Append,
}

impl Connection {
    /// Write `frame` into table `name`, creating it when needed.
    ///
    /// Column types are inferred from the first non-null value of each column; columns with
    /// only nulls become text. Returns the number of rows inserted.
    ///
    /// # Errors
    /// - `Usage` when the table exists and `if_exists` is [`IfExists::Fail`].
    /// - Driver errors from the DDL or the inserts.
    pub fn to_table(
        &self,
        name: &str,
        frame: &Frame,
        if_exists: IfExists,
        schema: Option<&str>,
    ) -> Result<u64, SqlSessionError> {
        if frame.width() == 0 {
            return Err(SqlSessionError::usage("Cannot write a frame without columns"));
        }
        let dialect = self.dialect().as_deref().and_then(Dialect::parse);
        let quote = |ident: &str| quote_identifier(ident, self.policy().backtick_identifiers);
        let table = match schema {
            Some(schema) => format!("{}.{}", quote(schema), quote(name)),
            None => quote(name),
        };

        let exists = self.table_exists(&table)?;
        match (exists, if_exists) {
            (true, IfExists::Fail) => {
                return Err(SqlSessionError::usage(format!(
                    "Table {name:?} already exists"
                )));
            }
            (true, IfExists::Replace) => {
                self.run_statement(&format!("DROP TABLE {table}"), None)?;
            }
            _ => {}
        }
        if !exists || if_exists == IfExists::Replace {
            let columns: Vec<String> = frame
                .columns
                .iter()
                .map(|column| format!("{} {}", quote(&column.name), column_type(column, dialect)))
                .collect();
            self.run_statement(
                &format!("CREATE TABLE {table} ({})", columns.join(", ")),
                None,
            )?;
        }

        let placeholders: Vec<String> = (0..frame.width()).map(|idx| format!(":p{idx}")).collect();
        let insert = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            frame
                .columns
                .iter()
                .map(|column| quote(&column.name))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders.join(", ")
        );
        let mut inserted = 0;
        for idx in 0..frame.height() {
            let params: NamedParams = frame
                .row(idx)
                .into_iter()
                .enumerate()
                .map(|(col, value)| (format!("p{col}"), value))
                .collect();
            let mut cursor = self.run_statement(&insert, Some(&params))?;
            inserted += cursor.rowcount().unwrap_or(1);
            if let Err(err) = cursor.close() {
                tracing::debug!(error = %err, "closing insert cursor failed");
            }
        }
        tracing::info!(%table, inserted, "wrote frame to table");
        Ok(inserted)
    }

    fn table_exists(&self, table: &str) -> Result<bool, SqlSessionError> {
        match self.run_statement(&format!("SELECT * FROM {table} WHERE 1 = 0"), None) {
            Ok(mut cursor) => {
                if let Err(err) = cursor.close() {
                    tracing::debug!(error = %err, "closing probe cursor failed");
                }
                Ok(true)
            }
            Err(SqlSessionError::Driver(err))
                if matches!(
                    classify(err.code.as_deref(), &err.message, None),
                    ErrorKind::ObjectNotFound { .. }
                ) =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

fn quote_identifier(ident: &str, backtick: bool) -> String {
    if backtick {
        format!("`{}`", ident.replace('`', "``"))
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

fn column_type(column: &FrameColumn, dialect: Option<Dialect>) -> &'static str {
    let sample = column.values.iter().find(|value| !value.is_null());
    match (sample, dialect) {
        (Some(RowValues::Int(_)), Some(Dialect::Sqlite)) => "INTEGER",
        (Some(RowValues::Int(_)), _) => "BIGINT",
        (Some(RowValues::Float(_)), Some(Dialect::Sqlite)) => "REAL",
        (Some(RowValues::Float(_)), Some(Dialect::Mysql)) => "DOUBLE",
        (Some(RowValues::Float(_)), _) => "DOUBLE PRECISION",
        (Some(RowValues::Bool(_)), _) => "BOOLEAN",
        (Some(RowValues::Timestamp(_)), _) => "TIMESTAMP",
        (Some(RowValues::JSON(_)), Some(Dialect::Postgres)) => "JSONB",
        (Some(RowValues::JSON(_)), Some(Dialect::Sqlite)) => "TEXT",
        (Some(RowValues::JSON(_)), _) => "JSON",
        (Some(RowValues::Blob(_)), Some(Dialect::Postgres)) => "BYTEA",
        (Some(RowValues::Blob(_)), _) => "BLOB",
        (Some(RowValues::Text(_) | RowValues::Null) | None, _) => "TEXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: Vec<RowValues>) -> FrameColumn {
        FrameColumn {
            name: "c".into(),
            values,
        }
    }

    #[test]
    fn types_follow_first_non_null_value() {
        let ints = column(vec![RowValues::Null, RowValues::Int(1)]);
        assert_eq!(column_type(&ints, Some(Dialect::Sqlite)), "INTEGER");
        assert_eq!(column_type(&ints, Some(Dialect::Postgres)), "BIGINT");
        assert_eq!(column_type(&column(vec![RowValues::Null]), None), "TEXT");
        assert_eq!(
            column_type(&column(vec![RowValues::Float(1.5)]), Some(Dialect::Mysql)),
            "DOUBLE"
        );
    }

    #[test]
    fn identifiers_are_quoted_per_dialect() {
        assert_eq!(quote_identifier("my\"t", false), "\"my\"\"t\"");
        assert_eq!(quote_identifier("t", true), "`t`");
    }
}
