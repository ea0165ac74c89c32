//! Token definitions for the Lumen lexer.

use lumen_core::Span;
use std::fmt;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// Source span.
    pub span: Span,
}

impl Token {
    /// Create a new token.
    #[inline]
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Check if this is an end-of-file token.
    #[inline]
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Check if this token is the given keyword.
    #[inline]
    #[must_use]
    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }
}

/// Token kinds for Lumen lexical analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal (escapes already processed).
    Str(String),

    // Identifiers and keywords
    /// Identifier.
    Ident(String),
    /// Keyword.
    Keyword(Keyword),

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `===`
    StrictEqual,
    /// `!==`
    StrictNotEqual,
    /// `&&`
    AmpAmp,
    /// `||`
    PipePipe,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `=`
    Equal,
    /// `#` (function sigil under the sigil marker grammar)
    Hash,

    // Delimiters
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,

    // Special
    /// End of file.
    Eof,
    /// Error token with a description of the problem.
    Error(String),
}

impl TokenKind {
    /// Check if this is a comparison operator.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Less | Self::Greater | Self::LessEqual | Self::GreaterEqual
        )
    }

    /// Check if this is an equality operator.
    #[must_use]
    pub const fn is_equality(&self) -> bool {
        matches!(self, Self::StrictEqual | Self::StrictNotEqual)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Ident(s) => write!(f, "{}", s),
            Self::Keyword(kw) => write!(f, "{}", kw),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Bang => write!(f, "!"),
            Self::Less => write!(f, "<"),
            Self::Greater => write!(f, ">"),
            Self::LessEqual => write!(f, "<="),
            Self::GreaterEqual => write!(f, ">="),
            Self::StrictEqual => write!(f, "==="),
            Self::StrictNotEqual => write!(f, "!=="),
            Self::AmpAmp => write!(f, "&&"),
            Self::PipePipe => write!(f, "||"),
            Self::Question => write!(f, "?"),
            Self::Colon => write!(f, ":"),
            Self::Equal => write!(f, "="),
            Self::Hash => write!(f, "#"),
            Self::LeftParen => write!(f, "("),
            Self::RightParen => write!(f, ")"),
            Self::LeftBrace => write!(f, "{{"),
            Self::RightBrace => write!(f, "}}"),
            Self::Comma => write!(f, ","),
            Self::Semicolon => write!(f, ";"),
            Self::Eof => write!(f, "EOF"),
            Self::Error(msg) => write!(f, "ERROR({})", msg),
        }
    }
}

/// Lumen keywords.
///
/// `continue` is deliberately overloaded: at statement head it is the loop
/// control keyword, in expression position it is the tail-call marker. The
/// lexer never distinguishes the two; disambiguation is the parser's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `break`
    Break,
    /// `catch`
    Catch,
    /// `continue`
    Continue,
    /// `else`
    Else,
    /// `false`
    False,
    /// `finally`
    Finally,
    /// `function`
    Function,
    /// `if`
    If,
    /// `let`
    Let,
    /// `null`
    Null,
    /// `return`
    Return,
    /// `throw`
    Throw,
    /// `true`
    True,
    /// `try`
    Try,
    /// `while`
    While,
}

impl Keyword {
    /// Try to parse a keyword from a string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "break" => Some(Self::Break),
            "catch" => Some(Self::Catch),
            "continue" => Some(Self::Continue),
            "else" => Some(Self::Else),
            "false" => Some(Self::False),
            "finally" => Some(Self::Finally),
            "function" => Some(Self::Function),
            "if" => Some(Self::If),
            "let" => Some(Self::Let),
            "null" => Some(Self::Null),
            "return" => Some(Self::Return),
            "throw" => Some(Self::Throw),
            "true" => Some(Self::True),
            "try" => Some(Self::Try),
            "while" => Some(Self::While),
            _ => None,
        }
    }

    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Catch => "catch",
            Self::Continue => "continue",
            Self::Else => "else",
            Self::False => "false",
            Self::Finally => "finally",
            Self::Function => "function",
            Self::If => "if",
            Self::Let => "let",
            Self::Null => "null",
            Self::Return => "return",
            Self::Throw => "throw",
            Self::True => "true",
            Self::Try => "try",
            Self::While => "while",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
