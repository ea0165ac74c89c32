//! Recursive descent parser for Lumen with Pratt parsing for expressions.
//!
//! The parser also hosts the tail-call marker recognizer. Marker placement is
//! resolved here, at parse time: a marker that does not directly precede a
//! call expression aborts the parse with [`MARKER_NOT_CALL`]. Whether a
//! recognized marker actually sits in tail position is a separate question
//! answered later by the checker.
//!
//! The marker surface is pluggable through [`MarkerGrammar`]. All grammars
//! produce the same [`ExprKind::TailCall`](crate::ast::ExprKind::TailCall)
//! node, so everything downstream of the parser is grammar-agnostic.

mod expr;
mod stmt;

use crate::ast::{FunctionId, Program, Stmt};
use crate::lexer::Lexer;
use crate::token::{Keyword, Token, TokenKind};
use lumen_core::{LumenError, LumenResult, Span};
use smallvec::SmallVec;

pub use expr::ExprParser;
pub use stmt::StmtParser;

/// Parse source with the default marker grammar.
pub fn parse(source: &str) -> LumenResult<Program> {
    Parser::new(source).parse_program()
}

/// Parse source with an explicit marker grammar.
pub fn parse_with(source: &str, grammar: MarkerGrammar) -> LumenResult<Program> {
    Parser::with_grammar(source, grammar).parse_program()
}

/// Parse error message for a marker that does not precede a call.
///
/// This exact text identifies the recognizer's one fatal rule; the compile
/// driver keys on it when translating parse failures into diagnostics.
pub const MARKER_NOT_CALL: &str = "marker must directly precede a call expression";

// =============================================================================
// Marker Grammar
// =============================================================================

/// Surface syntax accepted for the tail-call marker.
///
/// The marker keyword is spelled `continue`, deliberately reusing the
/// loop-control keyword. The grammar decides in which positions that spelling
/// (or the `#` function sigil) is read as a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerGrammar {
    /// `continue` is a marker only immediately after `return`.
    Statement,
    /// `continue` is a marker in any expression operand position, which
    /// includes the statement form. This is the default.
    #[default]
    Expression,
    /// No textual marker; `#function` declarations implicitly mark every
    /// syntactic tail call in their body.
    FunctionSigil,
}

impl MarkerGrammar {
    /// Parse a grammar name as written on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "statement" => Some(Self::Statement),
            "expression" => Some(Self::Expression),
            "sigil" => Some(Self::FunctionSigil),
            _ => None,
        }
    }

    /// Canonical name of this grammar.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::Expression => "expression",
            Self::FunctionSigil => "sigil",
        }
    }

    /// Whether `continue` is read as a marker in any expression operand.
    #[inline]
    #[must_use]
    pub const fn marks_expressions(self) -> bool {
        matches!(self, Self::Expression)
    }

    /// Whether `continue` is read as a marker directly after `return`.
    #[inline]
    #[must_use]
    pub const fn marks_return_operands(self) -> bool {
        matches!(self, Self::Statement | Self::Expression)
    }
}

impl std::fmt::Display for MarkerGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Parser Core
// =============================================================================

/// Lumen parser.
pub struct Parser<'src> {
    /// Lexer for tokenization.
    lexer: Lexer<'src>,
    /// Current token.
    current: Token,
    /// Previous token (for span tracking).
    previous: Token,
    /// Active marker grammar.
    grammar: MarkerGrammar,
    /// Next function id to assign; the script body owns id 0.
    next_function: u32,
    /// Next marked-site id to assign.
    next_site: u32,
    /// Stack of enclosing function ids; the script body is the root entry.
    function_stack: SmallVec<[FunctionId; 8]>,
    /// Nesting depth of `while` bodies, reset inside function bodies. Guards
    /// `break` and `continue` in loop-control position.
    loop_depth: u32,
}

impl<'src> Parser<'src> {
    /// Create a parser with the default marker grammar.
    pub fn new(source: &'src str) -> Self {
        Self::with_grammar(source, MarkerGrammar::default())
    }

    /// Create a parser with an explicit marker grammar.
    pub fn with_grammar(source: &'src str, grammar: MarkerGrammar) -> Self {
        let mut lexer = Lexer::new(source);
        let first_token = lexer.next_token();
        let mut function_stack = SmallVec::new();
        function_stack.push(FunctionId::SCRIPT);
        Self {
            lexer,
            current: first_token.clone(),
            previous: first_token,
            grammar,
            next_function: 1,
            next_site: 0,
            function_stack,
            loop_depth: 0,
        }
    }

    /// Parse a whole program.
    ///
    /// The parse is fail-fast: the first error aborts and nothing after it is
    /// examined. In particular a misplaced marker is reported here and never
    /// reaches the checker.
    pub fn parse_program(&mut self) -> LumenResult<Program> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program {
            body,
            function_count: self.next_function,
            site_count: self.next_site,
        })
    }

    /// Parse a single statement.
    pub fn parse_statement(&mut self) -> LumenResult<Stmt> {
        StmtParser::parse(self)
    }

    /// Parse an expression at the lowest precedence.
    pub fn parse_expression(&mut self) -> LumenResult<crate::ast::Expr> {
        ExprParser::parse(self, Precedence::Lowest)
    }

    /// Active marker grammar.
    #[inline]
    pub fn grammar(&self) -> MarkerGrammar {
        self.grammar
    }

    // =========================================================================
    // Token Management
    // =========================================================================

    /// Get the current token.
    #[inline]
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Get the previous token.
    #[inline]
    pub fn previous(&self) -> &Token {
        &self.previous
    }

    /// Advance to the next token, returning the previous.
    pub fn advance(&mut self) -> &Token {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
        &self.previous
    }

    /// Check if the current token matches the given kind.
    #[inline]
    pub fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    /// Check if the current token is a specific keyword.
    #[inline]
    pub fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(k) if *k == kw)
    }

    /// Consume the current token if it matches, otherwise return false.
    pub fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the current token if it's the given keyword.
    pub fn match_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect and consume a specific token, or error.
    pub fn expect(&mut self, kind: &TokenKind, msg: &str) -> LumenResult<&Token> {
        if self.check(kind) {
            self.advance();
            Ok(&self.previous)
        } else {
            Err(self.error_at_current(msg))
        }
    }

    /// Expect and consume a specific keyword, or error.
    pub fn expect_keyword(&mut self, kw: Keyword, msg: &str) -> LumenResult<&Token> {
        if self.check_keyword(kw) {
            self.advance();
            Ok(&self.previous)
        } else {
            Err(self.error_at_current(msg))
        }
    }

    /// Expect and consume an identifier, returning the name.
    pub fn expect_identifier(&mut self, msg: &str) -> LumenResult<String> {
        if let TokenKind::Ident(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_at_current(msg))
        }
    }

    // =========================================================================
    // Id Allocation
    // =========================================================================

    /// Allocate the id for a function declaration being entered.
    pub fn push_function(&mut self) -> FunctionId {
        let id = FunctionId(self.next_function);
        self.next_function += 1;
        self.function_stack.push(id);
        id
    }

    /// Leave the innermost function declaration.
    pub fn pop_function(&mut self) {
        debug_assert!(self.function_stack.len() > 1, "cannot pop the script body");
        self.function_stack.pop();
    }

    /// Id of the function body currently being parsed.
    #[inline]
    pub fn enclosing_function(&self) -> FunctionId {
        *self
            .function_stack
            .last()
            .unwrap_or(&FunctionId::SCRIPT)
    }

    /// Allocate an id for a newly recognized marked site.
    pub fn alloc_site(&mut self) -> crate::ast::CallSiteId {
        let id = crate::ast::CallSiteId(self.next_site);
        self.next_site += 1;
        id
    }

    /// Enter a `while` body.
    pub(crate) fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    /// Leave a `while` body.
    pub(crate) fn exit_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
    }

    /// Whether a loop body encloses the current position within the same
    /// function.
    pub(crate) fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }

    /// Hide enclosing loops while a function body parses. Returns the depth
    /// to hand back to [`Parser::restore_loops`].
    pub(crate) fn suspend_loops(&mut self) -> u32 {
        std::mem::take(&mut self.loop_depth)
    }

    /// Restore the loop depth suspended at a function boundary.
    pub(crate) fn restore_loops(&mut self, depth: u32) {
        self.loop_depth = depth;
    }

    // =========================================================================
    // Span Tracking
    // =========================================================================

    /// Get a span from start to the end of the previous token.
    pub fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.previous.span.end)
    }

    /// Get the current position for span tracking.
    pub fn start_span(&self) -> u32 {
        self.current.span.start
    }

    // =========================================================================
    // Error Handling
    // =========================================================================

    /// Create an error at the current token.
    pub fn error_at_current(&self, msg: &str) -> LumenError {
        self.error_at(&self.current, msg)
    }

    /// Create an error at the previous token.
    pub fn error_at_previous(&self, msg: &str) -> LumenError {
        self.error_at(&self.previous, msg)
    }

    /// Create an error at a specific token.
    fn error_at(&self, token: &Token, msg: &str) -> LumenError {
        let location = match &token.kind {
            TokenKind::Eof => "at end of file".to_string(),
            TokenKind::Error(e) => format!("lexer error: {e}"),
            _ => format!("at '{}'", token.kind),
        };
        LumenError::syntax(format!("{location}: {msg}"), token.span)
    }

    /// Create the marker-placement error for the given offending span.
    ///
    /// The message is [`MARKER_NOT_CALL`] verbatim, with no location prefix.
    pub fn marker_not_call(&self, span: Span) -> LumenError {
        LumenError::syntax(MARKER_NOT_CALL, span)
    }
}

// =============================================================================
// Precedence Levels
// =============================================================================

/// Expression precedence levels for Pratt parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Precedence {
    /// Lowest precedence (whole expressions).
    Lowest = 0,
    /// Ternary `?:`
    Conditional = 1,
    /// `||`
    Or = 2,
    /// `&&`
    And = 3,
    /// `===`, `!==`
    Equality = 4,
    /// `<`, `<=`, `>`, `>=`
    Comparison = 5,
    /// `+`, `-`
    Additive = 6,
    /// `*`, `/`, `%`
    Multiplicative = 7,
    /// Unary `-`, `!`, and the tail-call marker.
    Unary = 8,
    /// Call arguments.
    Call = 9,
    /// Literals, identifiers, grouping.
    Primary = 10,
}
