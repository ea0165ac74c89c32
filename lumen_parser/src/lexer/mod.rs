//! Lumen lexer.
//!
//! Brace-delimited C-like surface, so no indentation tracking: whitespace and
//! newlines only separate tokens. Statements are terminated by explicit
//! semicolons; there is no automatic semicolon insertion.

mod cursor;

pub use cursor::{Cursor, EOF_CHAR};

use crate::token::{Keyword, Token, TokenKind};
use lumen_core::Span;

/// Streaming lexer over Lumen source text.
#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
}

impl<'src> Lexer<'src> {
    /// Create a lexer over the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// Produce the next token. Returns an `Eof` token forever once the
    /// source is exhausted.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.cursor.pos();
        let Some(c) = self.cursor.bump() else {
            return Token::new(TokenKind::Eof, self.cursor.span_from(start));
        };

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '#' => TokenKind::Hash,
            '<' => {
                if self.cursor.eat('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.cursor.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '=' => {
                if self.cursor.eat('=') {
                    if self.cursor.eat('=') {
                        TokenKind::StrictEqual
                    } else {
                        TokenKind::Error("'==' is not an operator; use '==='".to_string())
                    }
                } else {
                    TokenKind::Equal
                }
            }
            '!' => {
                if self.cursor.eat('=') {
                    if self.cursor.eat('=') {
                        TokenKind::StrictNotEqual
                    } else {
                        TokenKind::Error("'!=' is not an operator; use '!=='".to_string())
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '&' => {
                if self.cursor.eat('&') {
                    TokenKind::AmpAmp
                } else {
                    TokenKind::Error("'&' is not an operator; use '&&'".to_string())
                }
            }
            '|' => {
                if self.cursor.eat('|') {
                    TokenKind::PipePipe
                } else {
                    TokenKind::Error("'|' is not an operator; use '||'".to_string())
                }
            }
            '"' | '\'' => self.scan_string(c),
            c if c.is_ascii_digit() => self.scan_number(start),
            c if is_ident_start(c) => self.scan_ident_or_keyword(start),
            c => TokenKind::Error(format!("unexpected character '{}'", c)),
        };

        Token::new(kind, self.cursor.span_from(start))
    }

    /// Skip whitespace and `//` line comments.
    fn skip_trivia(&mut self) {
        loop {
            self.cursor.eat_while(|c| c.is_ascii_whitespace());
            if self.cursor.first() == '/' && self.cursor.second() == '/' {
                self.cursor.eat_while(|c| c != '\n');
            } else {
                return;
            }
        }
    }

    /// Scan an integer or float literal. The leading digit is consumed.
    fn scan_number(&mut self, start: usize) -> TokenKind {
        self.cursor.eat_while(|c| c.is_ascii_digit());

        // A '.' followed by a digit makes this a float.
        let is_float = self.cursor.first() == '.' && self.cursor.second().is_ascii_digit();
        if is_float {
            self.cursor.bump();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }

        let text = self.cursor.slice_from(start);
        if is_float {
            match text.parse::<f64>() {
                Ok(n) => TokenKind::Float(n),
                Err(_) => TokenKind::Error(format!("invalid float literal '{}'", text)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(_) => TokenKind::Error(format!("integer literal '{}' is too large", text)),
            }
        }
    }

    /// Scan a string literal. The opening quote is consumed.
    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();
        loop {
            let Some(c) = self.cursor.bump() else {
                return TokenKind::Error("unterminated string literal".to_string());
            };
            match c {
                c if c == quote => return TokenKind::Str(value),
                '\n' => return TokenKind::Error("unterminated string literal".to_string()),
                '\\' => match self.cursor.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('\'') => value.push('\''),
                    Some(other) => {
                        return TokenKind::Error(format!("unknown escape '\\{}'", other));
                    }
                    None => {
                        return TokenKind::Error("unterminated string literal".to_string());
                    }
                },
                c => value.push(c),
            }
        }
    }

    /// Scan an identifier or keyword. The leading character is consumed.
    fn scan_ident_or_keyword(&mut self, start: usize) -> TokenKind {
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice_from(start);
        match Keyword::from_str(text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(text.to_string()),
        }
    }
}

/// Whether a character can start an identifier.
#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

/// Whether a character can continue an identifier.
#[inline]
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize an entire source string, including the trailing `Eof`.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.is_eof();
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}
