use thiserror::Error;

use crate::classify::TransientCondition;

/// Failure reported by a backend driver, independent of the crate that raised it.
///
/// `code` carries the structured error code when the driver has one (a SQLSTATE for
/// Postgres, the extended result code for `SQLite`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SqlSessionError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Bad input from the caller: invalid fragment key, missing argument, ambiguous lookup.
    #[error("{message}{}", crate::suggest::suggestions_message(.suggestions))]
    Usage {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("{key:?} is not a stored fragment{}", crate::suggest::suggestions_message(.suggestions))]
    KeyNotFound {
        key: String,
        suggestions: Vec<String>,
    },

    /// Bind placeholders in the statement disagree with the supplied parameters.
    #[error("Parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// A transient driver condition survived the rollback and single retry.
    #[error("{condition} (persisted after rollback and retry): {source}")]
    TransientDriver {
        condition: TransientCondition,
        source: DriverError,
    },

    #[error("{explanation}\n\nOriginal error message from DB driver:\n{source}")]
    TableNotFound {
        explanation: String,
        source: DriverError,
    },

    #[error("{explanation}\n\nOriginal error message from DB driver:\n{source}")]
    Syntax {
        explanation: String,
        source: DriverError,
    },

    #[error("{explanation}\n\nOriginal error message from DB driver:\n{source}")]
    AuthFailure {
        explanation: String,
        source: DriverError,
    },

    #[error("Error running the query: {0}")]
    Runtime(DriverError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlSessionError {
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        SqlSessionError::Usage {
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    /// The underlying driver error, when this error wraps one.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            SqlSessionError::Driver(err)
            | SqlSessionError::Runtime(err)
            | SqlSessionError::TransientDriver { source: err, .. }
            | SqlSessionError::TableNotFound { source: err, .. }
            | SqlSessionError::Syntax { source: err, .. }
            | SqlSessionError::AuthFailure { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_error_lists_suggestions() {
        let err = SqlSessionError::Usage {
            message: "Cannot delete 'a'".into(),
            suggestions: vec!["b".into()],
        };
        let text = err.to_string();
        assert!(text.starts_with("Cannot delete 'a'"));
        assert!(text.ends_with("Did you mean: \"b\""));
    }

    #[test]
    fn driver_error_is_reachable_through_wrappers() {
        let source = DriverError::with_code("42P01", "relation \"t\" does not exist");
        let err = SqlSessionError::TableNotFound {
            explanation: "There is no table with name 't'.".into(),
            source: source.clone(),
        };
        assert_eq!(err.driver_error(), Some(&source));
        assert!(err.to_string().contains("Original error message from DB driver"));
    }
}
