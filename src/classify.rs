//! Classification of driver-native errors.
//!
//! Drivers report failures as a message plus, sometimes, a structured code. The session
//! layer only needs a coarse taxonomy: which conditions are transient and may be retried
//! once, which mean "this statement produces no rows", and which deserve a clearer
//! wrapper when surfaced to the user.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::sql_text::referenced_tables;

/// Transient driver conditions recovered by one rollback and one retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientCondition {
    /// The server dropped a session that sat idle for too long.
    IdleSessionExpired,
    /// A previous failure left the transaction block aborted.
    AbortedTransactionBlock,
    /// The server closed the connection unexpectedly.
    ServerClosedConnection,
    /// The client-side transaction must be rolled back before continuing.
    NeedsRollback,
}

impl fmt::Display for TransientCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransientCondition::IdleSessionExpired => "idle session expired",
            TransientCondition::AbortedTransactionBlock => "aborted transaction block",
            TransientCondition::ServerClosedConnection => "server closed the connection",
            TransientCondition::NeedsRollback => "transaction needs rollback",
        };
        f.write_str(text)
    }
}

impl TransientCondition {
    /// Detect a transient condition from a driver error's code and message.
    #[must_use]
    pub fn detect(code: Option<&str>, message: &str) -> Option<Self> {
        match code {
            Some("57P05") => return Some(TransientCondition::IdleSessionExpired),
            Some("25P02") => return Some(TransientCondition::AbortedTransactionBlock),
            _ => {}
        }

        let lower = message.to_lowercase();
        if lower.contains("idle-session timeout")
            || lower.contains("idle_session_timeout")
            || lower.contains("idle session timeout")
        {
            Some(TransientCondition::IdleSessionExpired)
        } else if lower.contains("current transaction is aborted") {
            Some(TransientCondition::AbortedTransactionBlock)
        } else if lower.contains("server closed the connection unexpectedly") {
            Some(TransientCondition::ServerClosedConnection)
        } else if lower.contains("invalid transaction is rolled back")
            || lower.contains("rolled back due to a previous exception")
            || lower.contains("needs rollback")
        {
            Some(TransientCondition::NeedsRollback)
        } else {
            None
        }
    }
}

/// Coarse category of a driver error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    /// A referenced table or object does not exist; `candidates` are the table names the
    /// statement referenced, for typo suggestions.
    ObjectNotFound { candidates: Vec<String> },
    AuthFailure,
    Transient(TransientCondition),
    /// The statement does not produce rows (DDL, DML without `RETURNING`).
    NoRows,
    /// The driver complained about a bind parameter with no value.
    MissingBind,
    Other,
}

const NO_ROWS: &[&str] = &["this result object does not return rows", "no results to fetch"];

const MISSING_BIND: &[&str] = &[
    "a value is required for bind parameter",
    "bind message supplies",
    "there is no parameter $",
];

const AUTH: &[&str] = &[
    "fe_sendauth: no password supplied",
    "password authentication failed",
    "access denied for user",
    "login failed for user",
];

const SYNTAX: &[&str] = &[
    "syntax error",
    "error in your sql syntax",
    "incorrect syntax",
    "invalid sql",
    "parser error",
];

static NOT_FOUND: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\btable with name\b).+(\bdoes not exist\b)",
        r"(\btable\b).+(\bdoes not exist\b)",
        r"(\bobject\b).+(\bdoes not exist\b)",
        r"(\brelation\b).+(\bdoes not exist\b)",
        r"(\btable\b).+(\bdoesn't exist\b)",
        r"not found",
        r"could not find",
        r"no such table",
        r"invalid object name",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("not-found pattern is valid"))
    .collect()
});

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Classify a driver error.
///
/// Structured codes win over message matching; messages are matched case-insensitively.
/// `statement` supplies the candidate table names for not-found errors. The result is
/// only used to choose a clearer wrapper; retry behaviour depends on the transient
/// conditions alone.
#[must_use]
pub fn classify(code: Option<&str>, message: &str, statement: Option<&str>) -> ErrorKind {
    if let Some(condition) = TransientCondition::detect(code, message) {
        return ErrorKind::Transient(condition);
    }

    let candidates = || {
        statement
            .and_then(|sql| referenced_tables(sql).ok())
            .unwrap_or_default()
    };

    match code {
        Some("42601") => return ErrorKind::Syntax,
        Some("42P01") => {
            return ErrorKind::ObjectNotFound {
                candidates: candidates(),
            };
        }
        Some("28P01" | "28000") => return ErrorKind::AuthFailure,
        _ => {}
    }

    let lower = message.to_lowercase();
    if contains_any(&lower, NO_ROWS) {
        ErrorKind::NoRows
    } else if contains_any(&lower, MISSING_BIND) {
        ErrorKind::MissingBind
    } else if contains_any(&lower, AUTH) {
        ErrorKind::AuthFailure
    } else if contains_any(&lower, SYNTAX) {
        ErrorKind::Syntax
    } else if NOT_FOUND.iter().any(|re| re.is_match(&lower)) {
        ErrorKind::ObjectNotFound {
            candidates: candidates(),
        }
    } else {
        ErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(message: &str) -> ErrorKind {
        classify(None, message, None)
    }

    #[test]
    fn postgres_corpus() {
        assert_eq!(
            classify(Some("42601"), "syntax error at or near \"SELEC\"", None),
            ErrorKind::Syntax
        );
        assert_eq!(
            classify(
                Some("42P01"),
                "relation \"ordrs\" does not exist",
                Some("SELECT * FROM ordrs")
            ),
            ErrorKind::ObjectNotFound {
                candidates: vec!["ordrs".into()]
            }
        );
        assert_eq!(
            kind("fe_sendauth: no password supplied"),
            ErrorKind::AuthFailure
        );
        assert_eq!(
            kind("FATAL: terminating connection due to idle-session timeout"),
            ErrorKind::Transient(TransientCondition::IdleSessionExpired)
        );
        assert_eq!(
            kind("current transaction is aborted, commands ignored until end of transaction block"),
            ErrorKind::Transient(TransientCondition::AbortedTransactionBlock)
        );
        assert_eq!(
            kind("server closed the connection unexpectedly\n\tThis probably means the server terminated abnormally"),
            ErrorKind::Transient(TransientCondition::ServerClosedConnection)
        );
        assert_eq!(
            kind("bind message supplies 0 parameters, but prepared statement \"\" requires 1"),
            ErrorKind::MissingBind
        );
    }

    #[test]
    fn sqlite_corpus() {
        assert_eq!(kind("near \"SELEC\": syntax error"), ErrorKind::Syntax);
        assert_eq!(
            kind("no such table: people"),
            ErrorKind::ObjectNotFound { candidates: vec![] }
        );
        assert_eq!(
            kind("This result object does not return rows. It has been closed automatically."),
            ErrorKind::NoRows
        );
    }

    #[test]
    fn duckdb_and_mysql_corpus() {
        assert_eq!(
            kind("Catalog Error: Table with name nope does not exist!"),
            ErrorKind::ObjectNotFound { candidates: vec![] }
        );
        assert_eq!(
            kind("Parser Error: syntax error at or near \"FRM\""),
            ErrorKind::Syntax
        );
        assert_eq!(
            kind("You have an error in your SQL syntax; check the manual"),
            ErrorKind::Syntax
        );
        assert_eq!(
            kind("Access denied for user 'root'@'localhost'"),
            ErrorKind::AuthFailure
        );
        assert_eq!(kind("no results to fetch"), ErrorKind::NoRows);
    }

    #[test]
    fn rollback_conditions_and_codes() {
        assert_eq!(
            kind("Can't reconnect until invalid transaction is rolled back"),
            ErrorKind::Transient(TransientCondition::NeedsRollback)
        );
        assert_eq!(
            classify(Some("57P05"), "anything", None),
            ErrorKind::Transient(TransientCondition::IdleSessionExpired)
        );
        assert_eq!(
            classify(Some("25P02"), "anything", None),
            ErrorKind::Transient(TransientCondition::AbortedTransactionBlock)
        );
    }

    #[test]
    fn unknown_messages_are_other() {
        assert_eq!(kind("division by zero"), ErrorKind::Other);
        assert_eq!(kind("UNIQUE constraint failed: t.id"), ErrorKind::Other);
    }
}
