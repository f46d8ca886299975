//! Test utilities: a scripted in-memory backend and row helpers.
//!
//! [`ScriptedBackend`] answers statements from a script and records what the session layer
//! did with it (executions, commits, rollbacks), so connection behaviour can be asserted
//! without a database server. With `test-utils-postgres`, [`setup_postgres_embedded`]
//! starts a real PostgreSQL server for backend tests.

#[cfg(feature = "test-utils-postgres")]
pub mod postgres;
mod scripted;
pub mod test_helpers;

#[cfg(feature = "test-utils-postgres")]
pub use postgres::{EmbeddedPostgres, setup_postgres_embedded, stop_postgres_embedded};
pub use scripted::ScriptedBackend;
pub use test_helpers::create_test_row;
