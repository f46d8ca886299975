use serde::{Deserialize, Serialize};

use crate::error::SqlSessionError;

/// Row limit with an explicit "never configured" state.
///
/// Deserializes from `null` (or an absent field) as `Unset`, from `0` as `Unlimited` and
/// from any other number as `Rows(n)`. `Unset` and `Unlimited` behave the same; they are
/// kept apart so callers can tell a default from an explicit choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum RowLimit {
    #[default]
    Unset,
    Unlimited,
    Rows(u64),
}

impl From<Option<u64>> for RowLimit {
    fn from(value: Option<u64>) -> Self {
        match value {
            None => RowLimit::Unset,
            Some(0) => RowLimit::Unlimited,
            Some(n) => RowLimit::Rows(n),
        }
    }
}

impl From<RowLimit> for Option<u64> {
    fn from(value: RowLimit) -> Self {
        match value {
            RowLimit::Unset => None,
            RowLimit::Unlimited => Some(0),
            RowLimit::Rows(n) => Some(n),
        }
    }
}

impl RowLimit {
    /// The effective cap, `None` meaning unlimited.
    #[must_use]
    pub fn cap(self) -> Option<usize> {
        match self {
            RowLimit::Rows(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
            RowLimit::Unset | RowLimit::Unlimited => None,
        }
    }

    #[must_use]
    pub fn is_unlimited(self) -> bool {
        self.cap().is_none()
    }
}

fn default_autocommit() -> bool {
    true
}

fn default_displaylimit() -> RowLimit {
    RowLimit::Rows(10)
}

fn default_feedback() -> bool {
    true
}

/// Read-only session options handed in by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Commit after every statement.
    #[serde(default = "default_autocommit")]
    pub autocommit: bool,
    /// Stop fetching once this many rows are buffered.
    #[serde(default)]
    pub autolimit: RowLimit,
    /// Rows fetched for a preview; unlimited forces full materialization.
    #[serde(default = "default_displaylimit")]
    pub displaylimit: RowLimit,
    /// Report affected-row counts.
    #[serde(default = "default_feedback")]
    pub feedback: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            autocommit: default_autocommit(),
            autolimit: RowLimit::Unset,
            displaylimit: default_displaylimit(),
            feedback: default_feedback(),
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::new()
    }

    /// Parse options from JSON; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `SqlSessionError::ConfigError` when the JSON is malformed or a field has the
    /// wrong type.
    pub fn from_json(json: &str) -> Result<Self, SqlSessionError> {
        serde_json::from_str(json)
            .map_err(|e| SqlSessionError::ConfigError(format!("invalid session options: {e}")))
    }
}

/// Fluent builder for [`SessionOptions`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptionsBuilder {
    opts: SessionOptions,
}

impl SessionOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.opts.autocommit = autocommit;
        self
    }

    /// `0` means unlimited.
    #[must_use]
    pub fn autolimit(mut self, rows: u64) -> Self {
        self.opts.autolimit = RowLimit::from(Some(rows));
        self
    }

    /// `0` means unlimited.
    #[must_use]
    pub fn displaylimit(mut self, rows: u64) -> Self {
        self.opts.displaylimit = RowLimit::from(Some(rows));
        self
    }

    #[must_use]
    pub fn feedback(mut self, feedback: bool) -> Self {
        self.opts.feedback = feedback;
        self
    }

    #[must_use]
    pub fn finish(self) -> SessionOptions {
        self.opts
    }
}
