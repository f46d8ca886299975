//! Lexical helpers over raw SQL text.
//!
//! Nothing here parses SQL properly; the scanner only knows enough to skip string
//! literals, quoted identifiers, comments and dollar-quoted blocks, which is what
//! statement splitting, keyword sniffing and placeholder detection need.

mod parsers;
mod scanner;
mod tables;

use std::borrow::Cow;

use parsers::{is_ident_continue, is_ident_start};
pub use scanner::{ByteClass, Scan, scan};
pub use tables::{TableParseError, cte_names, referenced_tables};

/// Split `sql` on top-level semicolons.
///
/// Pieces holding only whitespace and comments are dropped, so a trailing comment after
/// the last semicolon does not count as a statement.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<&str> {
    let scan = scan(sql);
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut meaningful = false;

    for (idx, &b) in bytes.iter().enumerate() {
        let class = scan.classes[idx];
        if class == ByteClass::Code && b == b';' {
            if meaningful {
                statements.push(sql[start..idx].trim());
            }
            start = idx + 1;
            meaningful = false;
        } else if class != ByteClass::Comment && !b.is_ascii_whitespace() {
            meaningful = true;
        }
    }
    if meaningful {
        statements.push(sql[start..].trim());
    }
    statements
}

/// Drop trailing whitespace and top-level semicolons.
#[must_use]
pub fn strip_trailing_semicolons(sql: &str) -> &str {
    let scan = scan(sql);
    let bytes = sql.as_bytes();
    let mut end = bytes.len();
    while end > 0 {
        let b = bytes[end - 1];
        if b.is_ascii_whitespace() || (b == b';' && scan.is_code(end - 1)) {
            end -= 1;
        } else {
            break;
        }
    }
    &sql[..end]
}

/// First keyword of the statement, lowercased; leading comments and parentheses are skipped.
#[must_use]
pub fn leading_keyword(sql: &str) -> Option<String> {
    leading_keywords(sql, 1).into_iter().next()
}

/// Up to `n` leading keywords of the statement, lowercased.
fn leading_keywords(sql: &str, n: usize) -> Vec<String> {
    let scan = scan(sql);
    let bytes = sql.as_bytes();
    let mut words = Vec::new();
    let mut idx = 0;
    while words.len() < n {
        while idx < bytes.len()
            && (!scan.is_code(idx) || bytes[idx].is_ascii_whitespace() || bytes[idx] == b'(')
        {
            idx += 1;
        }
        let start = idx;
        while idx < bytes.len() && scan.is_code(idx) && is_ident_continue(bytes[idx]) {
            idx += 1;
        }
        if idx == start {
            break;
        }
        words.push(sql[start..idx].to_ascii_lowercase());
    }
    words
}

/// Statements that open an explicit transaction: `BEGIN` or `START TRANSACTION`.
#[must_use]
pub fn opens_transaction(sql: &str) -> bool {
    match leading_keywords(sql, 2).as_slice() {
        [first, ..] if first == "begin" => true,
        [first, second] => first == "start" && second == "transaction",
        _ => false,
    }
}

/// Statements that read rows and can be re-run without side effects.
///
/// `FROM`-first and `PIVOT` statements are accepted because some analytical engines
/// allow them as queries.
#[must_use]
pub fn is_select_like(sql: &str) -> bool {
    matches!(
        leading_keyword(sql).as_deref(),
        Some("select" | "from" | "with" | "pivot" | "values" | "table")
    )
}

/// A `:name` bind placeholder found in SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPlaceholder {
    pub name: String,
    /// Byte range of the placeholder, colon included.
    pub start: usize,
    pub end: usize,
}

/// Find `:name` placeholders outside literals and comments.
///
/// Postgres casts (`::int`) and names directly preceded by an identifier character are
/// not placeholders.
#[must_use]
pub fn named_placeholders(sql: &str) -> Vec<NamedPlaceholder> {
    let scan = scan(sql);
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b':' && scan.is_code(idx) {
            let preceded = idx > 0 && (bytes[idx - 1] == b':' || is_ident_continue(bytes[idx - 1]) || bytes[idx - 1] == b'\\');
            let followed_by_colon = bytes.get(idx + 1) == Some(&b':');
            if !preceded && !followed_by_colon && bytes.get(idx + 1).is_some_and(|b| is_ident_start(*b)) {
                let mut end = idx + 1;
                while end < bytes.len() && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                if bytes.get(end) != Some(&b':') {
                    found.push(NamedPlaceholder {
                        name: sql[idx + 1..end].to_string(),
                        start: idx,
                        end,
                    });
                }
                idx = end;
                continue;
            }
            if followed_by_colon {
                idx += 2;
                continue;
            }
        }
        idx += 1;
    }
    found
}

/// Distinct placeholder names in order of first appearance.
#[must_use]
pub fn placeholder_names(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for placeholder in named_placeholders(sql) {
        if !names.contains(&placeholder.name) {
            names.push(placeholder.name);
        }
    }
    names
}

/// Rewrite `:name` placeholders to Postgres-style `$N`.
///
/// Returns the rewritten text and the parameter names in positional order; repeated
/// names reuse their first position. Borrowed when the text has no placeholders.
#[must_use]
pub fn rewrite_named_to_positional(sql: &str) -> (Cow<'_, str>, Vec<String>) {
    let placeholders = named_placeholders(sql);
    if placeholders.is_empty() {
        return (Cow::Borrowed(sql), Vec::new());
    }

    let mut order: Vec<String> = Vec::new();
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for placeholder in placeholders {
        let position = match order.iter().position(|n| *n == placeholder.name) {
            Some(existing) => existing + 1,
            None => {
                order.push(placeholder.name.clone());
                order.len()
            }
        };
        out.push_str(&sql[cursor..placeholder.start]);
        out.push('$');
        out.push_str(&position.to_string());
        cursor = placeholder.end;
    }
    out.push_str(&sql[cursor..]);
    (Cow::Owned(out), order)
}
