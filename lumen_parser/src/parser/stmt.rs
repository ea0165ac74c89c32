//! Statement parsing, including the statement-level marker form and the
//! function sigil.
//!
//! Disambiguation of the overloaded `continue` keyword is positional: in
//! statement position it is always loop control, in expression operand
//! position (expression grammar) or directly after `return` (statement
//! grammar) it is the tail-call marker.

use crate::ast::{
    CatchClause, Expr, ExprKind, FunctionDecl, FunctionId, Ident, Literal, Stmt, StmtKind,
    TailCallExpr, TailValidity,
};
use crate::parser::{ExprParser, MarkerGrammar, Parser};
use crate::token::{Keyword, TokenKind};
use lumen_core::LumenResult;

/// Statement parser.
pub struct StmtParser;

impl StmtParser {
    /// Parse a single statement.
    pub fn parse(p: &mut Parser<'_>) -> LumenResult<Stmt> {
        let start = p.start_span();
        match &p.current().kind {
            TokenKind::Keyword(kw) => match kw {
                Keyword::Let => {
                    p.advance();
                    Self::parse_let(p, start)
                }
                Keyword::Function => {
                    p.advance();
                    Self::parse_function(p, false, start)
                }
                Keyword::Return => {
                    p.advance();
                    Self::parse_return(p, start)
                }
                Keyword::If => {
                    p.advance();
                    Self::parse_if(p, start)
                }
                Keyword::While => {
                    p.advance();
                    Self::parse_while(p, start)
                }
                Keyword::Break => {
                    p.advance();
                    if !p.in_loop() {
                        return Err(p.error_at_previous("'break' outside of a loop"));
                    }
                    p.expect(&TokenKind::Semicolon, "expected ';' after 'break'")?;
                    Ok(Stmt::new(StmtKind::Break, p.span_from(start)))
                }
                Keyword::Continue => {
                    // Statement position: always loop control, never a marker.
                    p.advance();
                    if !p.in_loop() {
                        return Err(p.error_at_previous("'continue' outside of a loop"));
                    }
                    p.expect(&TokenKind::Semicolon, "expected ';' after 'continue'")?;
                    Ok(Stmt::new(StmtKind::Continue, p.span_from(start)))
                }
                Keyword::Throw => {
                    p.advance();
                    let value = p.parse_expression()?;
                    p.expect(&TokenKind::Semicolon, "expected ';' after throw value")?;
                    Ok(Stmt::new(StmtKind::Throw(value), p.span_from(start)))
                }
                Keyword::Try => {
                    p.advance();
                    Self::parse_try(p, start)
                }
                _ => Self::parse_expression_statement(p, start),
            },
            TokenKind::Hash => Self::parse_sigiled_function(p, start),
            TokenKind::LeftBrace => {
                p.advance();
                let body = Self::parse_block_body(p)?;
                Ok(Stmt::new(StmtKind::Block(body), p.span_from(start)))
            }
            _ => Self::parse_expression_statement(p, start),
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn parse_let(p: &mut Parser<'_>, start: u32) -> LumenResult<Stmt> {
        let name = p.expect_identifier("expected variable name after 'let'")?;
        let name = Ident::new(name, p.previous().span);
        let value = if p.match_token(&TokenKind::Equal) {
            Some(p.parse_expression()?)
        } else {
            None
        };
        p.expect(&TokenKind::Semicolon, "expected ';' after declaration")?;
        Ok(Stmt::new(StmtKind::Let { name, value }, p.span_from(start)))
    }

    fn parse_sigiled_function(p: &mut Parser<'_>, start: u32) -> LumenResult<Stmt> {
        p.advance();
        if p.grammar() != MarkerGrammar::FunctionSigil {
            return Err(
                p.error_at_previous("the '#' function sigil requires the 'sigil' marker grammar")
            );
        }
        p.expect_keyword(Keyword::Function, "expected 'function' after '#'")?;
        Self::parse_function(p, true, start)
    }

    fn parse_function(p: &mut Parser<'_>, sigiled: bool, start: u32) -> LumenResult<Stmt> {
        let name = p.expect_identifier("expected function name")?;
        let name = Ident::new(name, p.previous().span);
        let id = p.push_function();

        p.expect(&TokenKind::LeftParen, "expected '(' after function name")?;
        let mut params = Vec::new();
        if !p.check(&TokenKind::RightParen) {
            loop {
                let param = p.expect_identifier("expected parameter name")?;
                params.push(Ident::new(param, p.previous().span));
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        p.expect(&TokenKind::RightParen, "expected ')' after parameters")?;
        p.expect(&TokenKind::LeftBrace, "expected '{' before function body")?;
        // A function body starts outside any enclosing loop.
        let outer_loops = p.suspend_loops();
        let mut body = Self::parse_block_body(p)?;
        p.restore_loops(outer_loops);
        p.pop_function();

        if sigiled {
            mark_sigiled_body(p, id, &mut body);
        }

        let span = p.span_from(start);
        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                id,
                name,
                params,
                body,
                sigiled,
                span,
            }),
            span,
        ))
    }

    // =========================================================================
    // Control Flow
    // =========================================================================

    fn parse_return(p: &mut Parser<'_>, start: u32) -> LumenResult<Stmt> {
        if p.match_token(&TokenKind::Semicolon) {
            return Ok(Stmt::new(
                StmtKind::Return { value: None },
                p.span_from(start),
            ));
        }

        // Under the statement grammar the marker is legal only here, and it
        // claims the whole return operand: `return continue f() + 1;` fails
        // because `f() + 1` is not a call. Under the expression grammar the
        // marker is recognized inside `parse_expression` instead and binds
        // tightly.
        let value = if p.grammar() == MarkerGrammar::Statement
            && p.check_keyword(Keyword::Continue)
        {
            let marker_start = p.start_span();
            p.advance();
            let operand = p.parse_expression()?;
            ExprParser::finish_marker(p, operand, marker_start)?
        } else {
            p.parse_expression()?
        };

        p.expect(&TokenKind::Semicolon, "expected ';' after return value")?;
        Ok(Stmt::new(
            StmtKind::Return { value: Some(value) },
            p.span_from(start),
        ))
    }

    fn parse_if(p: &mut Parser<'_>, start: u32) -> LumenResult<Stmt> {
        p.expect(&TokenKind::LeftParen, "expected '(' after 'if'")?;
        let condition = p.parse_expression()?;
        p.expect(&TokenKind::RightParen, "expected ')' after condition")?;
        let then_branch = Self::parse_branch(p)?;

        let else_branch = if p.match_keyword(Keyword::Else) {
            if p.check_keyword(Keyword::If) {
                let nested = p.start_span();
                p.advance();
                Some(vec![Self::parse_if(p, nested)?])
            } else {
                Some(Self::parse_branch(p)?)
            }
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            p.span_from(start),
        ))
    }

    fn parse_while(p: &mut Parser<'_>, start: u32) -> LumenResult<Stmt> {
        p.expect(&TokenKind::LeftParen, "expected '(' after 'while'")?;
        let condition = p.parse_expression()?;
        p.expect(&TokenKind::RightParen, "expected ')' after condition")?;
        p.enter_loop();
        let body = Self::parse_branch(p);
        p.exit_loop();
        Ok(Stmt::new(
            StmtKind::While {
                condition,
                body: body?,
            },
            p.span_from(start),
        ))
    }

    fn parse_try(p: &mut Parser<'_>, start: u32) -> LumenResult<Stmt> {
        p.expect(&TokenKind::LeftBrace, "expected '{' after 'try'")?;
        let body = Self::parse_block_body(p)?;

        let catch = if p.match_keyword(Keyword::Catch) {
            let catch_start = p.previous().span.start;
            let binding = if p.match_token(&TokenKind::LeftParen) {
                let name = p.expect_identifier("expected catch binding name")?;
                let binding = Ident::new(name, p.previous().span);
                p.expect(&TokenKind::RightParen, "expected ')' after catch binding")?;
                Some(binding)
            } else {
                None
            };
            p.expect(&TokenKind::LeftBrace, "expected '{' after 'catch'")?;
            let handler = Self::parse_block_body(p)?;
            Some(CatchClause {
                binding,
                body: handler,
                span: p.span_from(catch_start),
            })
        } else {
            None
        };

        let finally = if p.match_keyword(Keyword::Finally) {
            p.expect(&TokenKind::LeftBrace, "expected '{' after 'finally'")?;
            Some(Self::parse_block_body(p)?)
        } else {
            None
        };

        if catch.is_none() && finally.is_none() {
            return Err(p.error_at_current("expected 'catch' or 'finally' after try block"));
        }

        Ok(Stmt::new(
            StmtKind::Try {
                body,
                catch,
                finally,
            },
            p.span_from(start),
        ))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Parse a branch body: a braced block, or a single statement.
    fn parse_branch(p: &mut Parser<'_>) -> LumenResult<Vec<Stmt>> {
        if p.match_token(&TokenKind::LeftBrace) {
            Self::parse_block_body(p)
        } else {
            Ok(vec![Self::parse(p)?])
        }
    }

    /// Parse statements up to and including the closing `}`.
    fn parse_block_body(p: &mut Parser<'_>) -> LumenResult<Vec<Stmt>> {
        let mut body = Vec::new();
        while !p.check(&TokenKind::RightBrace) && !p.check(&TokenKind::Eof) {
            body.push(Self::parse(p)?);
        }
        p.expect(&TokenKind::RightBrace, "expected '}'")?;
        Ok(body)
    }

    fn parse_expression_statement(p: &mut Parser<'_>, start: u32) -> LumenResult<Stmt> {
        let expr = p.parse_expression()?;

        if p.match_token(&TokenKind::Equal) {
            let target = match expr.kind {
                ExprKind::Identifier(name) => Ident::new(name, expr.span),
                _ => return Err(p.error_at_previous("invalid assignment target")),
            };
            let value = p.parse_expression()?;
            p.expect(&TokenKind::Semicolon, "expected ';' after assignment")?;
            return Ok(Stmt::new(
                StmtKind::Assign { target, value },
                p.span_from(start),
            ));
        }

        p.expect(&TokenKind::Semicolon, "expected ';' after expression")?;
        Ok(Stmt::new(StmtKind::Expression(expr), p.span_from(start)))
    }
}

// =============================================================================
// Sigil Marking
// =============================================================================

/// Mark every syntactic tail call in a sigiled function body.
///
/// The walk mirrors what the checker later accepts: return operands, reached
/// through conditional branches and logical right arms, outside loops, try
/// blocks, and finalizers. Everything it marks therefore validates, so a
/// sigiled function can never fail tail-position checking. Nested function
/// declarations are skipped; each declaration answers for its own sigil.
fn mark_sigiled_body(p: &mut Parser<'_>, function: FunctionId, body: &mut [Stmt]) {
    for stmt in body {
        mark_stmt(p, function, stmt, true);
    }
}

fn mark_stmt(p: &mut Parser<'_>, function: FunctionId, stmt: &mut Stmt, allowed: bool) {
    match &mut stmt.kind {
        StmtKind::Return { value: Some(expr) } if allowed => mark_tail_expr(p, function, expr),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            for s in then_branch.iter_mut() {
                mark_stmt(p, function, s, allowed);
            }
            if let Some(else_branch) = else_branch {
                for s in else_branch.iter_mut() {
                    mark_stmt(p, function, s, allowed);
                }
            }
        }
        StmtKind::While { body, .. } => {
            for s in body.iter_mut() {
                mark_stmt(p, function, s, false);
            }
        }
        StmtKind::Try {
            body,
            catch,
            finally,
        } => {
            for s in body.iter_mut() {
                mark_stmt(p, function, s, false);
            }
            if let Some(catch) = catch {
                let transparent = allowed && finally.is_none();
                for s in catch.body.iter_mut() {
                    mark_stmt(p, function, s, transparent);
                }
            }
            if let Some(finally) = finally {
                for s in finally.iter_mut() {
                    mark_stmt(p, function, s, false);
                }
            }
        }
        StmtKind::Block(body) => {
            for s in body.iter_mut() {
                mark_stmt(p, function, s, allowed);
            }
        }
        _ => {}
    }
}

fn mark_tail_expr(p: &mut Parser<'_>, function: FunctionId, expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Call(_) => {
            let kind = std::mem::replace(&mut expr.kind, ExprKind::Literal(Literal::Null));
            if let ExprKind::Call(call) = kind {
                expr.kind = ExprKind::TailCall(TailCallExpr {
                    call,
                    site: p.alloc_site(),
                    enclosing_function: function,
                    double_marked: false,
                    validity: TailValidity::Unchecked,
                });
            }
        }
        ExprKind::Conditional {
            then_arm, else_arm, ..
        } => {
            mark_tail_expr(p, function, then_arm);
            mark_tail_expr(p, function, else_arm);
        }
        ExprKind::Logical { right, .. } => mark_tail_expr(p, function, right),
        _ => {}
    }
}
