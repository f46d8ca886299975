//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::connection::{Connection, DatabaseInfo, ExecuteOutcome, IfExists};
pub use crate::dialect::{CommitStrategy, Dialect, DialectPolicy};
pub use crate::driver::{BufferedCursor, Capabilities, Cursor, DriverHandle, EngineHandle};
pub use crate::error::{DriverError, SqlSessionError};
pub use crate::options::{RowLimit, SessionOptions, SessionOptionsBuilder};
pub use crate::registry::{ConnectionDescriptor, ConnectionInfo, SessionRegistry};
pub use crate::results::{Frame, FrameColumn, Row};
pub use crate::resultset::{FetchState, LazyResultSet};
pub use crate::store::{DeleteMode, FragmentStore, IdentifierQuoting};
pub use crate::types::{NamedParams, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresEngine, PostgresOptions};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteHandle, SqliteOptions, SqliteOptionsBuilder};
