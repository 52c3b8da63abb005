//! Stylesheet lexer
//!
//! Comments are dropped; whitespace is not emitted as a token but recorded on
//! the following token so selector text can be rebuilt faithfully.

use std::ops::Range;

/// Byte range in the source
pub type Span = Range<usize>;

/// A lexer error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerError {
    pub message: String,
    pub span: Span,
}

impl LexerError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    /// `@name`; the text excludes the `@`
    AtKeyword,
    /// `#name`; the text includes the `#`
    Hash,
    /// Quoted string; the text includes the quotes
    Str,
    /// Number with an optional unit or `%`
    Number,
    /// `url(...)` captured verbatim
    Url,
    Colon,
    Semicolon,
    Comma,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    /// Any other single character
    Delim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    /// Whitespace or a comment precedes this token
    pub space_before: bool,
}

impl Token {
    pub fn is_delim(&self, c: char) -> bool {
        self.kind == TokenKind::Delim && self.text.starts_with(c)
    }
}

/// Result returned by the lexer
pub type LexResult = (Vec<Token>, Vec<LexerError>);

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}

/// Lex a stylesheet into tokens, collecting errors instead of stopping
pub fn lex(input: &str) -> LexResult {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;
    let mut space_before = false;

    while i < input.len() {
        let Some(current) = input[i..].chars().next() else {
            break;
        };
        let start = i;

        if current.is_whitespace() {
            i += current.len_utf8();
            space_before = true;
            continue;
        }

        if input[i..].starts_with("/*") {
            match input[i + 2..].find("*/") {
                Some(end) => i += end + 4,
                None => {
                    errors.push(LexerError::new("Unterminated comment", start..input.len()));
                    i = input.len();
                }
            }
            space_before = true;
            continue;
        }

        let (kind, end) = match current {
            '"' | '\'' => match lex_string(input, i, current) {
                Some(end) => (TokenKind::Str, end),
                None => {
                    errors.push(LexerError::new("Unterminated string", start..input.len()));
                    (TokenKind::Str, input.len())
                }
            },
            '@' if next_starts_name(input, i + 1) => {
                let end = lex_name(input, i + 1);
                (TokenKind::AtKeyword, end)
            }
            '#' if input[i + 1..].chars().next().is_some_and(is_name_char) => {
                (TokenKind::Hash, lex_name(input, i + 1))
            }
            c if c.is_ascii_digit() || starts_number(input, i) => {
                (TokenKind::Number, lex_number(input, i))
            }
            c if is_name_start(c) || c == '\\' || next_starts_name(input, i) => {
                let end = lex_name(input, i);
                if input[start..end].eq_ignore_ascii_case("url") && bytes.get(end) == Some(&b'(') {
                    match input[end..].find(')') {
                        Some(close) => (TokenKind::Url, end + close + 1),
                        None => {
                            errors.push(LexerError::new("Unterminated url()", start..input.len()));
                            (TokenKind::Url, input.len())
                        }
                    }
                } else {
                    (TokenKind::Ident, end)
                }
            }
            ':' => (TokenKind::Colon, i + 1),
            ';' => (TokenKind::Semicolon, i + 1),
            ',' => (TokenKind::Comma, i + 1),
            '{' => (TokenKind::LBrace, i + 1),
            '}' => (TokenKind::RBrace, i + 1),
            '(' => (TokenKind::LParen, i + 1),
            ')' => (TokenKind::RParen, i + 1),
            '[' => (TokenKind::LBracket, i + 1),
            ']' => (TokenKind::RBracket, i + 1),
            other => (TokenKind::Delim, i + other.len_utf8()),
        };

        let text = match kind {
            TokenKind::AtKeyword => &input[start + 1..end],
            _ => &input[start..end],
        };
        tokens.push(Token {
            kind,
            text: text.to_string(),
            span: start..end,
            space_before,
        });
        space_before = false;
        i = end;
    }

    (tokens, errors)
}

/// `-name`, `--name` or a plain name start at `i`
fn next_starts_name(input: &str, i: usize) -> bool {
    let mut chars = input[i..].chars();
    match chars.next() {
        Some('-') => matches!(chars.next(), Some(c) if is_name_start(c) || c == '-'),
        Some(c) => is_name_start(c),
        None => false,
    }
}

/// A signed or fractional number start such as `-2`, `+.5` or `.5`
fn starts_number(input: &str, i: usize) -> bool {
    let rest = &input.as_bytes()[i..];
    match rest {
        [b'-' | b'+', b'0'..=b'9', ..] | [b'.', b'0'..=b'9', ..] => true,
        [b'-' | b'+', b'.', b'0'..=b'9', ..] => true,
        _ => false,
    }
}

fn lex_name(input: &str, start: usize) -> usize {
    let mut end = start;
    let mut chars = input[start..].char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        if c == '\\' {
            // An escape keeps the next character inside the name
            end = match chars.next() {
                Some((next_offset, next)) => start + next_offset + next.len_utf8(),
                None => start + offset + 1,
            };
        } else if is_name_char(c) {
            end = start + offset + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn lex_number(input: &str, start: usize) -> usize {
    let bytes = input.as_bytes();
    let mut end = start;
    if matches!(bytes.get(end), Some(b'-' | b'+')) {
        end += 1;
    }
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if bytes.get(end) == Some(&b'%') {
        return end + 1;
    }
    if next_starts_name(input, end) {
        return lex_name(input, end);
    }
    end
}

fn lex_string(input: &str, start: usize, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (offset, c) in input[start + 1..].char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '\n' => return None,
            c if c == quote => return Some(start + 1 + offset + 1),
            _ => {}
        }
    }
    None
}

/// Convert a byte offset to a 1-based (line, column) pair
pub fn offset_to_line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let mut line = 1u32;
    let mut line_start = 0usize;
    for (i, c) in source[..offset].char_indices() {
        if c == '\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    let column = source[line_start..offset].chars().count() as u32 + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        let (tokens, errors) = lex(input);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tokens.into_iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn test_lex_rule() {
        assert_eq!(
            kinds(".a-b { margin: -2px 50% /* c */ 1.5em; }"),
            vec![
                (TokenKind::Delim, ".".to_string()),
                (TokenKind::Ident, "a-b".to_string()),
                (TokenKind::LBrace, "{".to_string()),
                (TokenKind::Ident, "margin".to_string()),
                (TokenKind::Colon, ":".to_string()),
                (TokenKind::Number, "-2px".to_string()),
                (TokenKind::Number, "50%".to_string()),
                (TokenKind::Number, "1.5em".to_string()),
                (TokenKind::Semicolon, ";".to_string()),
                (TokenKind::RBrace, "}".to_string()),
            ]
        );
    }

    #[test]
    fn test_lex_at_keyword_hash_and_url() {
        assert_eq!(
            kinds("@def C #fff url(a b.png) -moz-box"),
            vec![
                (TokenKind::AtKeyword, "def".to_string()),
                (TokenKind::Ident, "C".to_string()),
                (TokenKind::Hash, "#fff".to_string()),
                (TokenKind::Url, "url(a b.png)".to_string()),
                (TokenKind::Ident, "-moz-box".to_string()),
            ]
        );
    }

    #[test]
    fn test_space_before_is_recorded() {
        let (tokens, _) = lex("a .b.c");
        let spaces: Vec<bool> = tokens.iter().map(|t| t.space_before).collect();
        assert_eq!(spaces, vec![false, true, false, false, false]);
    }

    #[test]
    fn test_unterminated_string() {
        let (_, errors) = lex("content: 'abc");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unterminated string");
    }

    #[test]
    fn test_offset_to_line_col() {
        let source = ".a {\n  color: red;\n}";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 7), (2, 3));
    }
}
