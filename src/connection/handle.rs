use indexmap::IndexMap;

use crate::dialect::{CommitStrategy, DialectPolicy};
use crate::driver::{Capabilities, Cursor, DriverHandle, EngineHandle};
use crate::error::DriverError;
use crate::options::SessionOptions;
use crate::results::Frame;
use crate::types::NamedParams;

/// The backend a connection owns, in one of its two access forms.
pub(crate) enum LiveHandle {
    Engine(Box<dyn EngineHandle>),
    Raw {
        handle: Box<dyn DriverHandle>,
        capabilities: Capabilities,
    },
}

impl LiveHandle {
    pub(crate) fn is_engine(&self) -> bool {
        matches!(self, LiveHandle::Engine(_))
    }

    pub(crate) fn execute(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Box<dyn Cursor>, DriverError> {
        match self {
            LiveHandle::Engine(engine) => engine.execute(sql, params),
            LiveHandle::Raw { handle, .. } => handle.execute(sql, params),
        }
    }

    pub(crate) fn commit(&mut self) -> Result<(), DriverError> {
        match self {
            LiveHandle::Engine(engine) => engine.commit(),
            LiveHandle::Raw { handle, .. } => handle.commit(),
        }
    }

    /// Roll back; `Ok(false)` when a raw handle has no rollback.
    pub(crate) fn rollback(&mut self) -> Result<bool, DriverError> {
        match self {
            LiveHandle::Engine(engine) => engine.rollback().map(|()| true),
            LiveHandle::Raw {
                handle,
                capabilities,
            } => {
                if capabilities.rollback {
                    handle.rollback().map(|()| true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    pub(crate) fn close(&mut self) -> Result<(), DriverError> {
        match self {
            LiveHandle::Engine(engine) => engine.dispose(),
            LiveHandle::Raw { handle, .. } => handle.close(),
        }
    }

    pub(crate) fn native_frame(&mut self, sql: &str) -> Option<Result<Frame, DriverError>> {
        match self {
            LiveHandle::Engine(engine) => engine.native_frame(sql),
            LiveHandle::Raw {
                handle,
                capabilities,
            } => {
                if capabilities.native_frame {
                    handle.native_frame(sql)
                } else {
                    None
                }
            }
        }
    }
}

pub(crate) type ResultSetId = u64;

/// A result set's cursor plus what is needed to re-run it.
pub(crate) struct CursorSlot {
    pub(crate) cursor: Box<dyn Cursor>,
    pub(crate) statement: String,
    pub(crate) params: Option<NamedParams>,
}

pub(crate) struct ConnectionInner {
    pub(crate) alias: String,
    pub(crate) url: Option<String>,
    pub(crate) dialect: Option<String>,
    pub(crate) driver: Option<String>,
    pub(crate) server_version: Option<String>,
    pub(crate) policy: DialectPolicy,
    pub(crate) autocommit_requested: bool,
    pub(crate) commit_strategy: CommitStrategy,
    pub(crate) options: SessionOptions,
    /// `None` once the connection is closed.
    pub(crate) handle: Option<LiveHandle>,
    /// Open result sets, most recently (re)executed last.
    pub(crate) cursors: IndexMap<ResultSetId, CursorSlot>,
    pub(crate) next_id: ResultSetId,
    /// A native conversion re-ran a statement on the shared cursor, so the newest result
    /// set no longer owns it.
    pub(crate) shared_cursor_taken: bool,
}

impl ConnectionInner {
    pub(crate) fn is_last(&self, id: ResultSetId) -> bool {
        self.cursors.last().is_some_and(|(last, _)| *last == id)
    }
}
