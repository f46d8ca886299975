use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::scanner::{ByteClass, scan};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"]|"")*"|`[^`]*`|[A-Za-z_][A-Za-z0-9_$]*|[(),.;]|\S"#)
        .expect("token regex is valid")
});

/// Words that end a table list or can never be a table alias.
const CLAUSE_WORDS: &[&str] = &[
    "as", "cross", "except", "fetch", "for", "from", "full", "group", "having", "inner",
    "intersect", "join", "lateral", "left", "limit", "natural", "offset", "on", "order",
    "outer", "pivot", "qualify", "returning", "right", "select", "set", "tablesample",
    "union", "unpivot", "using", "values", "where", "window",
];

/// Functions whose argument syntax uses `FROM` without naming a table.
const FROM_FUNCTIONS: &[&str] = &["extract", "substring", "trim", "overlay", "position"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableParseError {
    #[error("unterminated literal, quoted identifier or comment")]
    Unterminated,
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident { text: String, quoted: bool },
    Punct(char),
}

impl Token {
    fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident { text, quoted: false } if text.eq_ignore_ascii_case(word))
    }

    fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }

    fn is_clause_word(&self) -> bool {
        matches!(self, Token::Ident { text, quoted: false }
            if CLAUSE_WORDS.iter().any(|w| text.eq_ignore_ascii_case(w)))
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>, TableParseError> {
    let scanned = scan(sql);
    if !scanned.terminated {
        return Err(TableParseError::Unterminated);
    }

    // literals and comments become blanks so the tokenizer never sees their contents
    let view = blank_non_code(sql, &scanned.classes);

    let mut tokens = Vec::new();
    let mut depth: i64 = 0;
    for m in TOKEN.find_iter(&view) {
        let text = m.as_str();
        let token = match text.as_bytes()[0] {
            b'"' => Token::Ident {
                text: text[1..text.len() - 1].replace("\"\"", "\""),
                quoted: true,
            },
            b'`' => Token::Ident {
                text: text[1..text.len() - 1].to_string(),
                quoted: true,
            },
            b if b.is_ascii_alphabetic() || b == b'_' => Token::Ident {
                text: text.to_string(),
                quoted: false,
            },
            _ => {
                let c = text.chars().next().unwrap_or(' ');
                match c {
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                }
                if depth < 0 {
                    return Err(TableParseError::UnbalancedParentheses);
                }
                Token::Punct(c)
            }
        };
        tokens.push(token);
    }
    if depth != 0 {
        return Err(TableParseError::UnbalancedParentheses);
    }
    Ok(tokens)
}

fn blank_non_code(sql: &str, classes: &[ByteClass]) -> String {
    let mut out = String::with_capacity(sql.len());
    for (idx, ch) in sql.char_indices() {
        match classes[idx] {
            ByteClass::Literal | ByteClass::Comment => out.push(' '),
            ByteClass::Code | ByteClass::QuotedIdent => out.push(ch),
        }
    }
    out
}

/// Parse `a.b.c` starting at `idx`; returns the last part and the index after it.
fn dotted_name(tokens: &[Token], mut idx: usize) -> Option<(String, usize)> {
    let mut last = match tokens.get(idx)? {
        Token::Ident { text, .. } => text.clone(),
        Token::Punct(_) => return None,
    };
    idx += 1;
    while tokens.get(idx).is_some_and(|t| t.is_punct('.')) {
        match tokens.get(idx + 1) {
            Some(Token::Ident { text, .. }) => {
                last.clone_from(text);
                idx += 2;
            }
            _ => break,
        }
    }
    Some((last, idx))
}

fn skip_parenthesized(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    let mut idx = open;
    while idx < tokens.len() {
        if tokens[idx].is_punct('(') {
            depth += 1;
        } else if tokens[idx].is_punct(')') {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return idx + 1;
            }
        }
        idx += 1;
    }
    idx
}

fn ctes_from_tokens(tokens: &[Token]) -> Vec<String> {
    let mut names = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        if !tokens[idx].is_word("with") {
            idx += 1;
            continue;
        }
        idx += 1;
        if tokens.get(idx).is_some_and(|t| t.is_word("recursive")) {
            idx += 1;
        }
        loop {
            let Some(Token::Ident { text, .. }) = tokens.get(idx) else {
                break;
            };
            let name = text.clone();
            idx += 1;
            if tokens.get(idx).is_some_and(|t| t.is_punct('(')) {
                idx = skip_parenthesized(tokens, idx);
            }
            if !tokens.get(idx).is_some_and(|t| t.is_word("as")) {
                break;
            }
            idx += 1;
            if tokens.get(idx).is_some_and(|t| t.is_word("materialized")) {
                idx += 1;
            }
            if !tokens.get(idx).is_some_and(|t| t.is_punct('(')) {
                break;
            }
            names.push(name);
            idx = skip_parenthesized(tokens, idx);
            if tokens.get(idx).is_some_and(|t| t.is_punct(',')) {
                idx += 1;
            } else {
                break;
            }
        }
    }
    names
}

/// Names of the CTEs a query defines itself.
///
/// # Errors
/// Returns `TableParseError` when the text cannot be tokenized.
pub fn cte_names(sql: &str) -> Result<Vec<String>, TableParseError> {
    Ok(ctes_from_tokens(&tokenize(sql)?))
}

/// Table-like identifiers a query reads from (`FROM` and `JOIN` targets), in order of
/// first appearance, without schema qualifiers and without the query's own CTE names.
///
/// # Errors
/// Returns `TableParseError` when the text cannot be tokenized.
pub fn referenced_tables(sql: &str) -> Result<Vec<String>, TableParseError> {
    let tokens = tokenize(sql)?;
    let ctes = ctes_from_tokens(&tokens);
    let mut found: Vec<String> = Vec::new();
    // token preceding each open parenthesis, to recognise `EXTRACT(x FROM y)`
    let mut paren_owner: Vec<Option<String>> = Vec::new();
    let mut idx = 0;

    while idx < tokens.len() {
        let token = &tokens[idx];
        if token.is_punct('(') {
            let owner = match idx.checked_sub(1).and_then(|i| tokens.get(i)) {
                Some(Token::Ident { text, quoted: false }) => Some(text.to_ascii_lowercase()),
                _ => None,
            };
            paren_owner.push(owner);
            idx += 1;
            continue;
        }
        if token.is_punct(')') {
            paren_owner.pop();
            idx += 1;
            continue;
        }

        let is_from = token.is_word("from");
        if !(is_from || token.is_word("join")) {
            idx += 1;
            continue;
        }
        let inside_function = paren_owner
            .last()
            .and_then(Option::as_deref)
            .is_some_and(|owner| FROM_FUNCTIONS.contains(&owner));
        idx += 1;
        if inside_function {
            continue;
        }

        while let Some((name, next)) = dotted_name(&tokens, idx) {
            if tokens[idx].is_clause_word() {
                break;
            }
            if !ctes.iter().any(|c| c.eq_ignore_ascii_case(&name)) && !found.contains(&name) {
                found.push(name);
            }
            idx = next;
            if tokens.get(idx).is_some_and(|t| t.is_word("as")) {
                idx += 2;
            } else if tokens
                .get(idx)
                .is_some_and(|t| matches!(t, Token::Ident { .. }) && !t.is_clause_word())
            {
                idx += 1;
            }
            if is_from && tokens.get(idx).is_some_and(|t| t.is_punct(',')) {
                idx += 1;
            } else {
                break;
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_from_and_join_targets() {
        let sql = "SELECT * FROM public.orders o JOIN customers AS c ON o.cid = c.id";
        assert_eq!(referenced_tables(sql).unwrap(), vec!["orders", "customers"]);
    }

    #[test]
    fn comma_lists_and_subqueries() {
        let sql = "select * from a, b x, (select * from c) sub where a.id = b.id";
        assert_eq!(referenced_tables(sql).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn own_ctes_and_literals_are_skipped() {
        let sql = "WITH recent AS (SELECT * FROM events) \
                   SELECT 'from fake' FROM recent -- from other";
        assert_eq!(referenced_tables(sql).unwrap(), vec!["events"]);
        assert_eq!(cte_names(sql).unwrap(), vec!["recent"]);
    }

    #[test]
    fn extract_from_is_not_a_table() {
        let sql = "SELECT EXTRACT(YEAR FROM created) FROM logs";
        assert_eq!(referenced_tables(sql).unwrap(), vec!["logs"]);
    }

    #[test]
    fn quoted_identifiers_are_unquoted() {
        let sql = r#"SELECT * FROM "My Table" JOIN `other` USING (id)"#;
        assert_eq!(referenced_tables(sql).unwrap(), vec!["My Table", "other"]);
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert_eq!(
            referenced_tables("SELECT * FROM (t"),
            Err(TableParseError::UnbalancedParentheses)
        );
        assert_eq!(
            referenced_tables("SELECT 'x FROM t"),
            Err(TableParseError::Unterminated)
        );
    }
}
