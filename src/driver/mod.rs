//! Backend seams.
//!
//! A connection talks to its backend through one of two handle shapes:
//! [`EngineHandle`] for engine/pool-backed access opened from a URL, and [`DriverHandle`]
//! for a caller-supplied raw driver connection. Both hand out [`Cursor`]s.

mod buffered;

pub use buffered::BufferedCursor;

use crate::error::DriverError;
use crate::results::Frame;
use crate::types::{NamedParams, RowValues};

/// Message drivers use when a statement has no result rows to fetch.
pub const NO_ROWS_MESSAGE: &str =
    "This result object does not return rows. It has been closed automatically.";

/// A live, stateful handle into a statement's result stream.
pub trait Cursor {
    /// Column names, or `None` when the statement produces no rows.
    fn columns(&self) -> Option<Vec<String>>;

    /// Fetch up to `n` rows; fewer than `n` means end of data.
    ///
    /// # Errors
    /// Returns the driver's error; statements without rows report a "no rows" condition.
    fn fetch_many(&mut self, n: usize) -> Result<Vec<Vec<RowValues>>, DriverError>;

    /// Fetch every remaining row.
    ///
    /// # Errors
    /// As [`Cursor::fetch_many`].
    fn fetch_all(&mut self) -> Result<Vec<Vec<RowValues>>, DriverError>;

    /// Rows affected by a DML statement, when the driver reports it.
    fn rowcount(&self) -> Option<u64>;

    /// Release the cursor. Closing twice is not an error.
    ///
    /// # Errors
    /// Returns the driver's error.
    fn close(&mut self) -> Result<(), DriverError>;

    fn is_closed(&self) -> bool;
}

/// Engine or pool-backed access, opened from a connection URL.
pub trait EngineHandle {
    /// Dialect name as the engine reports it (`"postgresql"`, `"sqlite"`, ...).
    fn dialect(&self) -> Option<String>;

    fn driver(&self) -> Option<String>;

    /// Server version, available once connected.
    fn server_version(&self) -> Option<String>;

    /// Connection URL with the password redacted.
    fn url(&self) -> String;

    /// Switch to the engine's native auto-commit isolation mode.
    ///
    /// Returns `Ok(false)` when the engine has no such mode.
    ///
    /// # Errors
    /// Returns the driver's error when the switch was attempted and failed.
    fn enable_native_autocommit(&mut self) -> Result<bool, DriverError>;

    /// Run one statement with named parameters.
    ///
    /// # Errors
    /// Returns the driver's error.
    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError>;

    /// # Errors
    /// Returns the driver's error.
    fn commit(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error.
    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Close the connection and release the engine's pooled resources.
    ///
    /// # Errors
    /// Returns the driver's error.
    fn dispose(&mut self) -> Result<(), DriverError>;

    /// Run `sql` and convert its result with the engine's native tabular converter.
    /// `None` when the engine has no such converter.
    fn native_frame(&mut self, _sql: &str) -> Option<Result<Frame, DriverError>> {
        None
    }
}

/// What a raw driver handle can do, probed once when the connection is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub close: bool,
    pub commit: bool,
    pub rollback: bool,
    /// Native conversion of the last result into a data frame.
    pub native_frame: bool,
    /// Native conversion of the last result into Arrow data.
    pub native_arrow: bool,
}

impl Capabilities {
    /// The minimum a raw handle must support to be wrapped.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.close && self.commit
    }

    /// Embedded analytical engines expose both native converters.
    #[must_use]
    pub fn looks_like_duckdb(&self) -> bool {
        self.native_frame && self.native_arrow
    }
}

/// A raw driver connection supplied by the caller.
pub trait DriverHandle {
    /// Type name of the underlying connection, used as the default alias.
    fn class_name(&self) -> String;

    fn capabilities(&self) -> Capabilities;

    /// Dialect the handle declares for itself, if any.
    fn dialect_hint(&self) -> Option<String> {
        None
    }

    /// # Errors
    /// Returns the driver's error.
    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError>;

    /// # Errors
    /// Returns the driver's error.
    fn commit(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error.
    fn rollback(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error.
    fn close(&mut self) -> Result<(), DriverError>;

    /// Run `sql` and convert its result natively; `None` without the capability.
    fn native_frame(&mut self, _sql: &str) -> Option<Result<Frame, DriverError>> {
        None
    }
}
