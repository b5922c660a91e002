//! Lexer token types

use std::fmt;

/// Token kinds for the column definition mini-language.
///
/// Keywords are not distinguished here: `primary`, `key`, `not`, ... all
/// arrive as [`TokenKind::Word`] and the compiler decides what they mean.
/// That keeps unknown words harmless.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare word: identifiers, type names, keywords, `set-null`.
    Word(String),
    /// Single-quoted string with `''` unescaped.
    Str(String),
    /// Numeric literal as written (sign and decimal point kept).
    Number(String),

    // Delimiters
    LParen,
    RParen,
    Comma,
    Dot,
    Arrow,

    // Special
    Eof,
    Error(String),
}

impl TokenKind {
    /// Lowercased word text, if this is a word.
    pub fn word(&self) -> Option<String> {
        match self {
            TokenKind::Word(w) => Some(w.to_ascii_lowercase()),
            _ => None,
        }
    }

    pub fn is_word(&self, expected: &str) -> bool {
        matches!(self, TokenKind::Word(w) if w.eq_ignore_ascii_case(expected))
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(w) => write!(f, "{}", w),
            TokenKind::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Eof => write!(f, "<eof>"),
            TokenKind::Error(e) => write!(f, "<error: {}>", e),
        }
    }
}

/// Byte span in the definition string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
