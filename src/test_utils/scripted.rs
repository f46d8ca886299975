use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::driver::{Capabilities, Cursor, DriverHandle, EngineHandle, NO_ROWS_MESSAGE};
use crate::error::DriverError;
use crate::results::Frame;
use crate::sql_text::strip_trailing_semicolons;
use crate::types::{NamedParams, RowValues};

#[derive(Debug, Clone)]
enum Script {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<RowValues>>,
    },
    Affected(u64),
    Fail(DriverError),
}

#[derive(Debug)]
struct BackendState {
    dialect: Option<String>,
    driver: String,
    native_autocommit: bool,
    shared_cursor: bool,
    closes_cursors_on_execute: bool,
    native_frames: bool,
    capabilities: Capabilities,
    scripts: HashMap<String, Script>,
    pending_errors: VecDeque<DriverError>,
    executions: Vec<String>,
    last_params: Option<NamedParams>,
    commits: usize,
    rollbacks: usize,
    closed: bool,
    generation: u64,
    shared_rows: VecDeque<Vec<RowValues>>,
}

/// In-memory backend driven by a statement script.
///
/// Statements are matched after trimming whitespace and trailing semicolons. Unscripted
/// statements succeed without producing rows. Clones share state, so a test can keep one
/// clone for assertions after handing a handle to a connection.
///
/// A `duckdb` backend shares one cursor between every result set of its engine handle, the
/// way that engine does: reading an older result set returns the newest statement's rows.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    state: Rc<RefCell<BackendState>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new(dialect: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(BackendState {
                dialect: Some(dialect.to_string()),
                driver: "scripted".to_string(),
                native_autocommit: false,
                shared_cursor: dialect.eq_ignore_ascii_case("duckdb"),
                closes_cursors_on_execute: false,
                native_frames: false,
                capabilities: Capabilities {
                    close: true,
                    commit: true,
                    rollback: true,
                    native_frame: false,
                    native_arrow: false,
                },
                scripts: HashMap::new(),
                pending_errors: VecDeque::new(),
                executions: Vec::new(),
                last_params: None,
                commits: 0,
                rollbacks: 0,
                closed: false,
                generation: 0,
                shared_rows: VecDeque::new(),
            })),
        }
    }

    /// Backend that declares no dialect.
    #[must_use]
    pub fn without_dialect() -> Self {
        let backend = Self::new("");
        backend.state.borrow_mut().dialect = None;
        backend
    }

    fn key(sql: &str) -> String {
        strip_trailing_semicolons(sql.trim()).trim().to_string()
    }

    fn script(self, sql: &str, script: Script) -> Self {
        self.state.borrow_mut().scripts.insert(Self::key(sql), script);
        self
    }

    #[must_use]
    pub fn with_rows(self, sql: &str, columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let columns = columns.iter().map(ToString::to_string).collect();
        self.script(sql, Script::Rows { columns, rows })
    }

    /// Statement that affects `count` rows and returns none.
    #[must_use]
    pub fn with_rowcount(self, sql: &str, count: u64) -> Self {
        self.script(sql, Script::Affected(count))
    }

    /// Statement that always fails with `err`.
    #[must_use]
    pub fn with_failure(self, sql: &str, err: DriverError) -> Self {
        self.script(sql, Script::Fail(err))
    }

    /// Fail the next execute, whatever the statement, with `err`.
    pub fn fail_next(&self, err: DriverError) {
        self.state.borrow_mut().pending_errors.push_back(err);
    }

    /// The engine handle accepts native auto-commit isolation.
    #[must_use]
    pub fn with_native_autocommit(self) -> Self {
        self.state.borrow_mut().native_autocommit = true;
        self
    }

    #[must_use]
    pub fn with_driver(self, driver: &str) -> Self {
        self.state.borrow_mut().driver = driver.to_string();
        self
    }

    /// Every execute closes the cursors handed out before it.
    #[must_use]
    pub fn closing_cursors_on_execute(self) -> Self {
        self.state.borrow_mut().closes_cursors_on_execute = true;
        self
    }

    /// Handles answer native frame requests from the script. A native frame runs the
    /// statement, so it takes over a shared cursor and closes cursors on backends that close
    /// them on execute.
    #[must_use]
    pub fn with_native_frames(self) -> Self {
        self.state.borrow_mut().native_frames = true;
        self
    }

    /// Capabilities reported by the raw driver handle.
    #[must_use]
    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        self.state.borrow_mut().capabilities = capabilities;
        self
    }

    /// Engine-form handle over this backend.
    #[must_use]
    pub fn engine(&self) -> Box<dyn EngineHandle> {
        Box::new(ScriptedHandle {
            state: Rc::clone(&self.state),
            engine: true,
        })
    }

    /// Raw-driver handle over this backend.
    #[must_use]
    pub fn driver(&self) -> Box<dyn DriverHandle> {
        Box::new(ScriptedHandle {
            state: Rc::clone(&self.state),
            engine: false,
        })
    }

    /// Every statement sent to the backend, in order, including failed ones.
    #[must_use]
    pub fn executions(&self) -> Vec<String> {
        self.state.borrow().executions.clone()
    }

    #[must_use]
    pub fn executions_of(&self, sql: &str) -> usize {
        let key = Self::key(sql);
        self.state
            .borrow()
            .executions
            .iter()
            .filter(|executed| **executed == key)
            .count()
    }

    /// Parameters of the most recent execute.
    #[must_use]
    pub fn last_params(&self) -> Option<NamedParams> {
        self.state.borrow().last_params.clone()
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.state.borrow().commits
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.state.borrow().rollbacks
    }

    /// Whether the handle was closed or disposed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

struct ScriptedHandle {
    state: Rc<RefCell<BackendState>>,
    engine: bool,
}

impl ScriptedHandle {
    fn run(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(DriverError::new("connection is closed"));
        }
        let key = ScriptedBackend::key(sql);
        state.executions.push(key.clone());
        state.last_params = Some(params.clone());
        if let Some(err) = state.pending_errors.pop_front() {
            return Err(err);
        }

        let script = state.scripts.get(&key).cloned();
        state.generation += 1;
        let (columns, rows, rowcount) = match script {
            Some(Script::Fail(err)) => return Err(err),
            Some(Script::Rows { columns, rows }) => (Some(columns), rows, None),
            Some(Script::Affected(count)) => (None, Vec::new(), Some(count)),
            None => (None, Vec::new(), None),
        };

        let shared = self.engine && state.shared_cursor;
        let own_rows = if shared {
            state.shared_rows = rows.into();
            VecDeque::new()
        } else {
            rows.into()
        };
        Ok(Box::new(ScriptedCursor {
            state: Rc::clone(&self.state),
            columns,
            rows: own_rows,
            rowcount,
            generation: state.generation,
            shared,
            closed: false,
        }))
    }

    fn frame(&self, sql: &str) -> Option<Result<Frame, DriverError>> {
        let mut state = self.state.borrow_mut();
        if !state.native_frames {
            return None;
        }
        let key = ScriptedBackend::key(sql);
        state.executions.push(key.clone());
        state.generation += 1;
        if self.engine && state.shared_cursor {
            state.shared_rows.clear();
        }
        match state.scripts.get(&key) {
            Some(Script::Rows { columns, rows }) => {
                let mut frame = Frame::with_columns(columns.iter().cloned());
                for row in rows {
                    for (column, value) in frame.columns.iter_mut().zip(row) {
                        column.values.push(value.clone());
                    }
                }
                Some(Ok(frame))
            }
            Some(Script::Fail(err)) => Some(Err(err.clone())),
            _ => Some(Ok(Frame::default())),
        }
    }

    fn close_handle(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

impl EngineHandle for ScriptedHandle {
    fn dialect(&self) -> Option<String> {
        self.state.borrow().dialect.clone()
    }

    fn driver(&self) -> Option<String> {
        Some(self.state.borrow().driver.clone())
    }

    fn server_version(&self) -> Option<String> {
        Some("scripted-1".to_string())
    }

    fn url(&self) -> String {
        let state = self.state.borrow();
        format!("{}://scripted", state.dialect.as_deref().unwrap_or("unknown"))
    }

    fn enable_native_autocommit(&mut self) -> Result<bool, DriverError> {
        Ok(self.state.borrow().native_autocommit)
    }

    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError> {
        self.run(sql, params)
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.state.borrow_mut().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.state.borrow_mut().rollbacks += 1;
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), DriverError> {
        self.close_handle();
        Ok(())
    }

    fn native_frame(&mut self, sql: &str) -> Option<Result<Frame, DriverError>> {
        self.frame(sql)
    }
}

impl DriverHandle for ScriptedHandle {
    fn class_name(&self) -> String {
        format!("{}.Connection", self.state.borrow().driver)
    }

    fn capabilities(&self) -> Capabilities {
        self.state.borrow().capabilities
    }

    fn dialect_hint(&self) -> Option<String> {
        self.state.borrow().dialect.clone()
    }

    fn execute(&mut self, sql: &str, params: &NamedParams) -> Result<Box<dyn Cursor>, DriverError> {
        self.run(sql, params)
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.state.borrow_mut().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.state.borrow_mut().rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.close_handle();
        Ok(())
    }

    fn native_frame(&mut self, sql: &str) -> Option<Result<Frame, DriverError>> {
        self.frame(sql)
    }
}

struct ScriptedCursor {
    state: Rc<RefCell<BackendState>>,
    columns: Option<Vec<String>>,
    rows: VecDeque<Vec<RowValues>>,
    rowcount: Option<u64>,
    generation: u64,
    shared: bool,
    closed: bool,
}

impl ScriptedCursor {
    fn take(&mut self, n: Option<usize>) -> Result<Vec<Vec<RowValues>>, DriverError> {
        if self.is_closed() {
            return Err(DriverError::new("Attempt to use a closed cursor."));
        }
        if self.columns.is_none() {
            return Err(DriverError::new(NO_ROWS_MESSAGE));
        }
        let mut state = self.state.borrow_mut();
        let source = if self.shared {
            &mut state.shared_rows
        } else {
            &mut self.rows
        };
        let take = n.map_or(source.len(), |n| n.min(source.len()));
        Ok(source.drain(..take).collect())
    }
}

impl Cursor for ScriptedCursor {
    fn columns(&self) -> Option<Vec<String>> {
        self.columns.clone()
    }

    fn fetch_many(&mut self, n: usize) -> Result<Vec<Vec<RowValues>>, DriverError> {
        self.take(Some(n))
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<RowValues>>, DriverError> {
        self.take(None)
    }

    fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        if self.closed {
            return true;
        }
        let state = self.state.borrow();
        state.closes_cursors_on_execute && state.generation != self.generation
    }
}
