// SQLite backend, built on rusqlite.
//
// - config: options and URL parsing
// - params: conversion of bind values into rusqlite values
// - query: statement execution and value extraction
// - handle: the engine and raw-driver handles

pub mod config;
pub mod handle;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use handle::SqliteHandle;

use crate::error::DriverError;

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => {
                DriverError::with_code(failure.extended_code.to_string(), err.to_string())
            }
            _ => DriverError::new(err.to_string()),
        }
    }
}
