//! Tokenizer for condition expressions.

use serde_json::Value;

use formtree_core::pointer::{CURRENT_TOKEN, PARENT_TOKEN, ROOT_TOKEN, SEPARATOR};
use formtree_core::ConditionError;

/// A lexical token with its byte offset.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// `#/a/b`, `../a`, `./a`.
    Path(String),
    /// Any literal value. `undefined` is `None`.
    Literal(Option<Value>),
    /// Bare identifier (only valid as a method name).
    Ident(String),
    StrictEq,
    LooseEq,
    StrictNe,
    LooseNe,
    Not,
    And,
    Or,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    End,
}

impl TokenKind {
    pub(crate) fn render(&self) -> String {
        match self {
            Self::Path(p) => p.clone(),
            Self::Literal(Some(v)) => v.to_string(),
            Self::Literal(None) => "undefined".to_string(),
            Self::Ident(i) => i.clone(),
            Self::StrictEq => "===".into(),
            Self::LooseEq => "==".into(),
            Self::StrictNe => "!==".into(),
            Self::LooseNe => "!=".into(),
            Self::Not => "!".into(),
            Self::And => "&&".into(),
            Self::Or => "||".into(),
            Self::Dot => ".".into(),
            Self::Comma => ",".into(),
            Self::LParen => "(".into(),
            Self::RParen => ")".into(),
            Self::LBracket => "[".into(),
            Self::RBracket => "]".into(),
            Self::End => "<end>".into(),
        }
    }
}

/// Characters that end a path segment.
fn ends_segment(c: char) -> bool {
    c.is_whitespace() || "()[],=!&|.'\";/".contains(c)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        let offset = pos;
        let (kind, len) = if starts_path(rest) {
            let len = path_len(rest);
            let path = &rest[..len];
            (TokenKind::Path(path.to_string()), len)
        } else if rest.starts_with("===") {
            (TokenKind::StrictEq, 3)
        } else if rest.starts_with("!==") {
            (TokenKind::StrictNe, 3)
        } else if rest.starts_with("==") {
            (TokenKind::LooseEq, 2)
        } else if rest.starts_with("!=") {
            (TokenKind::LooseNe, 2)
        } else if rest.starts_with("&&") {
            (TokenKind::And, 2)
        } else if rest.starts_with("||") {
            (TokenKind::Or, 2)
        } else {
            match c {
                '!' => (TokenKind::Not, 1),
                '.' => (TokenKind::Dot, 1),
                ',' => (TokenKind::Comma, 1),
                '(' => (TokenKind::LParen, 1),
                ')' => (TokenKind::RParen, 1),
                '[' => (TokenKind::LBracket, 1),
                ']' => (TokenKind::RBracket, 1),
                '"' => lex_double_quoted(source, pos)?,
                '\'' => lex_single_quoted(source, pos)?,
                '-' | '0'..='9' => lex_number(rest)?,
                c if is_ident_start(c) => {
                    let len = rest
                        .char_indices()
                        .find(|&(_, ch)| !is_ident_char(ch))
                        .map_or(rest.len(), |(i, _)| i);
                    let word = &rest[..len];
                    let kind = match word {
                        "true" => TokenKind::Literal(Some(Value::Bool(true))),
                        "false" => TokenKind::Literal(Some(Value::Bool(false))),
                        "null" => TokenKind::Literal(Some(Value::Null)),
                        "undefined" => TokenKind::Literal(None),
                        _ => TokenKind::Ident(word.to_string()),
                    };
                    (kind, len)
                }
                other => {
                    return Err(ConditionError::UnexpectedChar {
                        found: other,
                        offset,
                    })
                }
            }
        };
        tokens.push(Token { kind, offset });
        pos += len;
    }

    tokens.push(Token {
        kind: TokenKind::End,
        offset: source.len(),
    });
    Ok(tokens)
}

/// `#/`, `./`, or `../` open a path token.
fn starts_path(rest: &str) -> bool {
    [ROOT_TOKEN, PARENT_TOKEN, CURRENT_TOKEN]
        .iter()
        .any(|marker| rest.strip_prefix(marker).is_some_and(|r| r.starts_with(SEPARATOR)))
}

/// Byte length of the path token at the start of `rest`.
fn path_len(rest: &str) -> usize {
    let mut len = 0;
    let mut remaining = rest;
    loop {
        // One segment: a navigation token or a run of name characters.
        let seg_len = if remaining.starts_with(PARENT_TOKEN) && ends_navigation(&remaining[2..]) {
            2
        } else if remaining.starts_with(CURRENT_TOKEN) && ends_navigation(&remaining[1..]) {
            1
        } else if remaining.starts_with(ROOT_TOKEN) && len == 0 {
            1
        } else {
            remaining
                .char_indices()
                .find(|&(_, c)| ends_segment(c))
                .map_or(remaining.len(), |(i, _)| i)
        };
        len += seg_len;
        remaining = &remaining[seg_len..];
        match remaining.strip_prefix(SEPARATOR) {
            Some(after) if !after.is_empty() && !after.starts_with(char::is_whitespace) => {
                len += SEPARATOR.len_utf8();
                remaining = after;
            }
            _ => return len,
        }
    }
}

fn ends_navigation(after: &str) -> bool {
    after.is_empty() || after.starts_with(SEPARATOR) || after.starts_with(ends_segment)
}

fn lex_double_quoted(source: &str, start: usize) -> Result<(TokenKind, usize), ConditionError> {
    let mut escaped = false;
    for (i, c) in source[start + 1..].char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                let end = start + 1 + i + 1;
                let text = &source[start..end];
                let value: String =
                    serde_json::from_str(text).map_err(|e| ConditionError::InvalidLiteral {
                        text: text.to_string(),
                        reason: e.to_string(),
                    })?;
                return Ok((TokenKind::Literal(Some(Value::String(value))), end - start));
            }
            _ => {}
        }
    }
    Err(ConditionError::UnterminatedString { offset: start })
}

fn lex_single_quoted(source: &str, start: usize) -> Result<(TokenKind, usize), ConditionError> {
    let mut value = String::new();
    let mut escaped = false;
    for (i, c) in source[start + 1..].char_indices() {
        match c {
            _ if escaped => {
                value.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            '\'' => {
                let len = i + 2;
                return Ok((TokenKind::Literal(Some(Value::String(value))), len));
            }
            _ => value.push(c),
        }
    }
    Err(ConditionError::UnterminatedString { offset: start })
}

fn lex_number(rest: &str) -> Result<(TokenKind, usize), ConditionError> {
    let len = rest
        .char_indices()
        .skip(1)
        .find(|&(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')))
        .map_or(rest.len(), |(i, _)| i);
    // A trailing `.` starts a method call.
    let len = if rest[..len].ends_with('.') { len - 1 } else { len };
    let text = &rest[..len];
    let number: serde_json::Number =
        serde_json::from_str(text).map_err(|e| ConditionError::InvalidLiteral {
            text: text.to_string(),
            reason: e.to_string(),
        })?;
    Ok((TokenKind::Literal(Some(Value::Number(number))), len))
}
