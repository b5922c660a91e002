//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

/// Lexer for a single column definition string such as
/// `"text not null default 'x' -> users.id cascade"`.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
        }
    }

    /// Tokenize the entire source into a vector of tokens ending in `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Source text covered by a span.
    pub fn slice(&self, span: Span) -> &'a str {
        &self.source[span.start..span.end]
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start_pos = self.pos;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                '.' => {
                    self.advance();
                    TokenKind::Dot
                }

                '-' => {
                    self.advance();
                    if self.peek_char() == Some('>') {
                        self.advance();
                        TokenKind::Arrow
                    } else if self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                        self.scan_number(start_pos)
                    } else {
                        TokenKind::Error("Unexpected character: -".to_string())
                    }
                }

                '\'' => self.scan_string(),

                c if c.is_ascii_digit() => self.scan_number(start_pos),

                c if c.is_alphabetic() || c == '_' => self.scan_word(),

                c => {
                    self.advance();
                    TokenKind::Error(format!("Unexpected character: {}", c))
                }
            },
        };

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
            },
        }
    }

    /// Scan a word. Hyphens join words (`set-null`) unless they start `->`.
    fn scan_word(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else if c == '-' && self.peek_next_char() != Some('>') {
                self.advance();
            } else {
                break;
            }
        }

        TokenKind::Word(self.source[start..self.pos].to_string())
    }

    /// Scan a single-quoted SQL string; `''` is an escaped quote.
    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None => return TokenKind::Error("Unterminated string".to_string()),
                Some('\'') => {
                    self.advance();
                    if self.peek_char() == Some('\'') {
                        self.advance();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        TokenKind::Str(value)
    }

    /// Scan a number whose first character (digit or sign) starts at `start`.
    fn scan_number(&mut self, start: usize) -> TokenKind {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.pos];
        if text.parse::<f64>().is_ok() {
            TokenKind::Number(text.to_string())
        } else {
            TokenKind::Error(format!("Invalid number: {}", text))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }
}

/// Tokenize a definition string.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_reference_with_hyphenated_action() {
        assert_eq!(
            kinds("-> users.id set-null"),
            vec![
                TokenKind::Arrow,
                TokenKind::Word("users".to_string()),
                TokenKind::Dot,
                TokenKind::Word("id".to_string()),
                TokenKind::Word("set-null".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_word_followed_by_arrow_without_space() {
        assert_eq!(
            kinds("text->users.id"),
            vec![
                TokenKind::Word("text".to_string()),
                TokenKind::Arrow,
                TokenKind::Word("users".to_string()),
                TokenKind::Dot,
                TokenKind::Word("id".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escape_and_negative_number() {
        assert_eq!(
            kinds("'it''s' -1.5"),
            vec![
                TokenKind::Str("it's".to_string()),
                TokenKind::Number("-1.5".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_error_token() {
        let tokens = kinds("default 'oops");
        assert!(matches!(tokens[1], TokenKind::Error(_)));
    }

    #[test]
    fn test_spans_slice_back_to_source() {
        let source = "default (lower(name))";
        let lexer = Lexer::new(source);
        let tokens = tokenize(source);
        assert_eq!(lexer.slice(tokens[0].span), "default");
        assert_eq!(lexer.slice(tokens[1].span), "(");
    }
}
