//! Session layer for interactive SQL clients.
//!
//! Three pieces work together:
//! - [`FragmentStore`] keeps named SQL fragments and renders them as CTEs;
//! - [`Connection`] unifies engine-backed and raw-driver-backed handles, resolves the
//!   commit strategy for its dialect and recovers from a fixed set of transient errors;
//! - [`LazyResultSet`] fetches rows incrementally, only as far as the limits require.
//!
//! [`SessionRegistry`] owns the named connections of a session and tracks the current one.
//!
//! ```rust,no_run
//! use sql_session::prelude::*;
//!
//! # fn demo() -> Result<(), SqlSessionError> {
//! let mut registry = SessionRegistry::new();
//! let options = SessionOptions::default();
//! let conn = registry.connect(
//!     Some(ConnectionDescriptor::url("sqlite://:memory:")),
//!     Some("local"),
//!     &options,
//! )?;
//!
//! let mut store = FragmentStore::new();
//! store.store("adults", "SELECT * FROM people WHERE age >= 18", &[])?;
//!
//! let outcome = conn.execute("SELECT COUNT(*) FROM adults", &["adults"], &store, None)?;
//! if let ExecuteOutcome::Rows(mut rows) = outcome {
//!     println!("{:?}", rows.rows()?);
//! }
//! # Ok(()) }
//! ```

pub mod classify;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod options;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod resultset;
pub mod sql_text;
pub mod store;
pub mod suggest;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use connection::{Connection, ExecuteOutcome, IfExists};
pub use error::{DriverError, SqlSessionError};
pub use options::{RowLimit, SessionOptions};
pub use registry::{ConnectionDescriptor, SessionRegistry};
pub use resultset::LazyResultSet;
pub use store::FragmentStore;
pub use types::RowValues;
