use super::parsers::{
    closing_tag_end, is_block_comment_end, is_block_comment_start, is_line_comment_start,
    try_start_dollar_quote,
};

#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backticked,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// What a byte of SQL text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    /// Plain SQL: keywords, bare identifiers, operators, whitespace.
    Code,
    /// String literal, including dollar-quoted bodies.
    Literal,
    /// Double-quoted or backticked identifier.
    QuotedIdent,
    Comment,
}

/// Per-byte classification of a SQL string.
#[derive(Debug, Clone)]
pub struct Scan {
    pub classes: Vec<ByteClass>,
    /// False when the text ends inside a literal, quoted identifier or block comment.
    pub terminated: bool,
}

impl Scan {
    #[must_use]
    pub fn is_code(&self, idx: usize) -> bool {
        self.classes.get(idx) == Some(&ByteClass::Code)
    }
}

/// Classify every byte of `sql`, skipping over quoted strings, comments and dollar-quoted
/// blocks with a small state machine.
#[must_use]
pub fn scan(sql: &str) -> Scan {
    let bytes = sql.as_bytes();
    let mut classes = vec![ByteClass::Code; bytes.len()];
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => {
                    classes[idx] = ByteClass::Literal;
                    state = State::SingleQuoted;
                }
                b'"' => {
                    classes[idx] = ByteClass::QuotedIdent;
                    state = State::DoubleQuoted;
                }
                b'`' => {
                    classes[idx] = ByteClass::QuotedIdent;
                    state = State::Backticked;
                }
                _ if is_line_comment_start(bytes, idx) => {
                    classes[idx] = ByteClass::Comment;
                    state = State::LineComment;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    classes[idx] = ByteClass::Comment;
                    classes[idx + 1] = ByteClass::Comment;
                    idx += 1;
                    state = State::BlockComment(1);
                }
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        for class in &mut classes[idx..=advance] {
                            *class = ByteClass::Literal;
                        }
                        idx = advance;
                        state = State::DollarQuoted(tag);
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                classes[idx] = ByteClass::Literal;
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        classes[idx + 1] = ByteClass::Literal;
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                classes[idx] = ByteClass::QuotedIdent;
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        classes[idx + 1] = ByteClass::QuotedIdent;
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Backticked => {
                classes[idx] = ByteClass::QuotedIdent;
                if b == b'`' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                } else {
                    classes[idx] = ByteClass::Comment;
                }
            }
            State::BlockComment(depth) => {
                classes[idx] = ByteClass::Comment;
                if is_block_comment_start(bytes, idx) {
                    classes[idx + 1] = ByteClass::Comment;
                    idx += 1;
                    state = State::BlockComment(depth + 1);
                } else if is_block_comment_end(bytes, idx) {
                    classes[idx + 1] = ByteClass::Comment;
                    idx += 1;
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                }
            }
            State::DollarQuoted(ref tag) => {
                classes[idx] = ByteClass::Literal;
                if b == b'$'
                    && let Some(end) = closing_tag_end(bytes, idx, tag)
                {
                    for class in &mut classes[idx..=end] {
                        *class = ByteClass::Literal;
                    }
                    idx = end;
                    state = State::Normal;
                }
            }
        }

        idx += 1;
    }

    let terminated = matches!(state, State::Normal | State::LineComment);
    Scan {
        classes,
        terminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_only(sql: &str) -> String {
        let scan = scan(sql);
        sql.bytes()
            .enumerate()
            .map(|(i, b)| if scan.is_code(i) { b as char } else { '_' })
            .collect()
    }

    #[test]
    fn literals_and_comments_are_not_code() {
        assert_eq!(code_only("a 'b;' c"), "a ____ c");
        assert_eq!(code_only("a -- x;\nb"), "a _____\nb");
        assert_eq!(code_only("a /* /* x */ */ b"), "a _____________ b");
    }

    #[test]
    fn dollar_quotes_and_escaped_quotes() {
        assert_eq!(code_only("$f$ ; $f$;"), "_________;");
        assert_eq!(code_only("'it''s';"), "_______;");
        assert_eq!(code_only("$1;"), "$1;");
    }

    #[test]
    fn unterminated_text_is_reported() {
        assert!(!scan("select 'oops").terminated);
        assert!(!scan("select /* open").terminated);
        assert!(scan("select 1 -- trailing").terminated);
    }
}
