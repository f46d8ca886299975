use deadpool_postgres::{Object, Pool, Runtime as PoolRuntime};
use tokio::runtime::{Builder, Runtime};
use tokio_postgres::NoTls;

use crate::driver::{BufferedCursor, Cursor, EngineHandle};
use crate::error::{DriverError, SqlSessionError};
use crate::sql_text::rewrite_named_to_positional;
use crate::types::{NamedParams, RowValues};

use super::config::PostgresOptions;
use super::params::{as_refs, positional_params};
use super::query::extract_rows;

/// PostgreSQL engine handle: one pooled client driven by a private current-thread runtime.
///
/// Statements run in autocommit mode once native auto-commit is enabled; before that, the
/// first statement after a commit or rollback opens a transaction.
pub struct PostgresEngine {
    runtime: Runtime,
    pool: Pool,
    client: Option<Object>,
    url: String,
    server_version: Option<String>,
    tx: TransactionState,
}

/// Implicit-transaction bookkeeping for the checked-out client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TransactionState {
    implicit: bool,
    open: bool,
}

impl TransactionState {
    fn new() -> Self {
        Self {
            implicit: true,
            open: false,
        }
    }

    /// Whether the next statement must be preceded by `BEGIN`; marks the transaction open.
    fn begin_statement(&mut self) -> bool {
        let begin = self.implicit && !self.open;
        if begin {
            self.open = true;
        }
        begin
    }

    /// Whether there is an open transaction to finish; marks it finished.
    fn finish(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// A replacement client starts outside any transaction.
    fn client_replaced(&mut self) {
        self.open = false;
    }

    fn autocommit(&mut self) {
        self.implicit = false;
    }
}

impl PostgresEngine {
    /// Connect with `options`.
    ///
    /// # Errors
    /// - `ConfigError` when required fields are missing.
    /// - `ConnectionError` when the pool or runtime cannot be created.
    /// - `Driver` errors from the first connection.
    pub fn open(options: &PostgresOptions) -> Result<Self, SqlSessionError> {
        options.validate()?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                SqlSessionError::ConnectionError(format!("Failed to start tokio runtime: {e}"))
            })?;
        let pool = options
            .config
            .create_pool(Some(PoolRuntime::Tokio1), NoTls)
            .map_err(|e| {
                SqlSessionError::ConnectionError(format!("Failed to create Postgres pool: {e}"))
            })?;

        let (client, server_version) = runtime.block_on(checkout(&pool))?;
        let url = options.display_url();
        tracing::debug!(%url, ?server_version, "connected to postgres");

        Ok(Self {
            runtime,
            pool,
            client: Some(client),
            url,
            server_version,
            tx: TransactionState::new(),
        })
    }

    /// Connect to a `postgres://` or `postgresql://` URL.
    ///
    /// # Errors
    /// As [`PostgresEngine::open`].
    pub fn open_url(url: &str) -> Result<Self, SqlSessionError> {
        Self::open(&PostgresOptions::from_url(url))
    }

    /// Make sure a live client is checked out, replacing one the server closed.
    fn ensure_client(&mut self) -> Result<(), DriverError> {
        let closed = match &self.client {
            Some(client) => client.is_closed(),
            None => return Err(DriverError::new("postgres connection is disposed")),
        };
        if closed {
            tracing::warn!(url = %self.url, "postgres client was closed; checking out a new one");
            let fresh = self.runtime.block_on(self.pool.get())?;
            self.client = Some(fresh);
            self.tx.client_replaced();
        }
        Ok(())
    }

    fn live(&self) -> Result<&Object, DriverError> {
        self.client
            .as_ref()
            .ok_or_else(|| DriverError::new("postgres connection is disposed"))
    }

    fn finish_transaction(&mut self, verb: &str) -> Result<(), DriverError> {
        if !self.tx.open {
            return Ok(());
        }
        self.ensure_client()?;
        if !self.tx.finish() {
            tracing::warn!(url = %self.url, %verb, "transaction was lost with its client");
            return Ok(());
        }
        self.runtime.block_on(self.live()?.batch_execute(verb))?;
        Ok(())
    }
}

impl EngineHandle for PostgresEngine {
    fn dialect(&self) -> Option<String> {
        Some("postgresql".to_string())
    }

    fn driver(&self) -> Option<String> {
        Some("tokio-postgres".to_string())
    }

    fn server_version(&self) -> Option<String> {
        self.server_version.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn enable_native_autocommit(&mut self) -> Result<bool, DriverError> {
        self.finish_transaction("COMMIT")?;
        self.tx.autocommit();
        Ok(true)
    }

    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError> {
        let (sql, names) = rewrite_named_to_positional(sql);
        let values = positional_params(&names, params);
        self.ensure_client()?;
        let begin = self.tx.begin_statement();
        let cursor = self
            .runtime
            .block_on(run_statement(self.live()?, begin, &sql, &values))?;
        Ok(Box::new(cursor))
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.finish_transaction("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.finish_transaction("ROLLBACK")
    }

    fn dispose(&mut self) -> Result<(), DriverError> {
        self.client = None;
        self.pool.close();
        tracing::debug!(url = %self.url, "disposed postgres pool");
        Ok(())
    }
}

async fn checkout(pool: &Pool) -> Result<(Object, Option<String>), DriverError> {
    let client = pool.get().await?;
    let version = client
        .query_one("SHOW server_version", &[])
        .await
        .ok()
        .and_then(|row| row.try_get::<_, String>(0).ok());
    Ok((client, version))
}

async fn run_statement(
    client: &Object,
    begin: bool,
    sql: &str,
    values: &[RowValues],
) -> Result<BufferedCursor, DriverError> {
    if begin {
        client.batch_execute("BEGIN").await?;
    }
    let stmt = client.prepare(sql).await?;
    if stmt.columns().is_empty() {
        let changed = client.execute(&stmt, &as_refs(values)).await?;
        return Ok(BufferedCursor::without_rows(Some(changed)));
    }
    let columns = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let rows = client.query(&stmt, &as_refs(values)).await?;
    Ok(BufferedCursor::with_rows(columns, extract_rows(&rows)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_statement_opens_the_transaction() {
        let mut tx = TransactionState::new();
        assert!(tx.begin_statement());
        assert!(!tx.begin_statement());
        assert!(tx.finish());
        assert!(!tx.finish());
        assert!(tx.begin_statement());
    }

    #[test]
    fn replaced_client_begins_again() {
        let mut tx = TransactionState::new();
        assert!(tx.begin_statement());
        tx.client_replaced();
        assert!(tx.begin_statement());
    }

    #[test]
    fn autocommit_never_begins() {
        let mut tx = TransactionState::new();
        tx.autocommit();
        assert!(!tx.begin_statement());
        assert!(!tx.finish());
    }
}
