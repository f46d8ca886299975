// PostgreSQL backend, built on tokio-postgres with a deadpool-postgres pool.
//
// The session layer is synchronous, so the engine owns a current-thread tokio runtime and
// blocks on every call.
//
// - config: connection options and validation
// - params: `ToSql` for bind values
// - query: value extraction from rows
// - engine: the engine handle

pub mod config;
pub mod engine;
pub mod params;
pub mod query;

pub use config::PostgresOptions;
pub use engine::PostgresEngine;

use crate::error::DriverError;

impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        let message = err
            .as_db_error()
            .map_or_else(|| err.to_string(), ToString::to_string);
        match err.code() {
            Some(state) => DriverError::with_code(state.code(), message),
            None => DriverError::new(message),
        }
    }
}

impl From<deadpool_postgres::PoolError> for DriverError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(backend) => DriverError::from(backend),
            other => DriverError::new(format!("postgres pool error: {other}")),
        }
    }
}
