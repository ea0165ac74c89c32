//! Expression parsing, including tail-call marker recognition.
//!
//! Under the expression marker grammar the `continue` keyword is read as a
//! marker whenever it begins an expression operand. The marker binds tightly:
//! its operand is parsed at unary precedence, so `continue f(x) + 1` marks
//! `f(x)` and leaves the addition to the checker, while `continue (1 + g(x))`
//! fails the parse because the parenthesized operand is not a call.

use crate::ast::{
    BinaryOp, CallExpr, Expr, ExprKind, Literal, LogicalOp, TailCallExpr, TailValidity, UnaryOp,
};
use crate::parser::{Parser, Precedence};
use crate::token::{Keyword, TokenKind};
use lumen_core::{LumenResult, Span};

/// Expression parser.
pub struct ExprParser;

impl ExprParser {
    /// Parse an expression with the given minimum precedence.
    pub fn parse(p: &mut Parser<'_>, min_prec: Precedence) -> LumenResult<Expr> {
        let mut left = Self::parse_prefix(p)?;

        loop {
            if p.check(&TokenKind::LeftParen) && Precedence::Call > min_prec {
                left = Self::finish_call(p, left)?;
                continue;
            }
            if p.check(&TokenKind::Question) && Precedence::Conditional > min_prec {
                left = Self::finish_conditional(p, left)?;
                continue;
            }
            let Some(prec) = Self::infix_precedence(&p.current().kind) else {
                break;
            };
            if prec <= min_prec {
                break;
            }
            left = Self::finish_infix(p, left, prec)?;
        }

        Ok(left)
    }

    // =========================================================================
    // Prefix
    // =========================================================================

    /// Parse a prefix expression: literal, identifier, grouping, unary
    /// operator, or the tail-call marker.
    fn parse_prefix(p: &mut Parser<'_>) -> LumenResult<Expr> {
        let start = p.start_span();

        if p.check_keyword(Keyword::Continue) && p.grammar().marks_expressions() {
            p.advance();
            let operand = Self::parse(p, Precedence::Unary)?;
            return Self::finish_marker(p, operand, start);
        }

        let kind = match &p.current().kind {
            TokenKind::Int(v) => {
                let v = *v;
                p.advance();
                ExprKind::Literal(Literal::Int(v))
            }
            TokenKind::Float(v) => {
                let v = *v;
                p.advance();
                ExprKind::Literal(Literal::Float(v))
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                p.advance();
                ExprKind::Literal(Literal::Str(s))
            }
            TokenKind::Keyword(Keyword::True) => {
                p.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                p.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                p.advance();
                ExprKind::Literal(Literal::Null)
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                p.advance();
                ExprKind::Identifier(name)
            }
            TokenKind::LeftParen => {
                p.advance();
                let inner = Self::parse(p, Precedence::Lowest)?;
                p.expect(&TokenKind::RightParen, "expected ')' after expression")?;
                return Ok(inner);
            }
            TokenKind::Minus => {
                p.advance();
                let operand = Self::parse(p, Precedence::Unary)?;
                let span = Span::new(start, operand.span.end);
                return Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                ));
            }
            TokenKind::Bang => {
                p.advance();
                let operand = Self::parse(p, Precedence::Unary)?;
                let span = Span::new(start, operand.span.end);
                return Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                ));
            }
            _ => return Err(p.error_at_current("expected expression")),
        };

        Ok(Expr::new(kind, p.span_from(start)))
    }

    // =========================================================================
    // Marker
    // =========================================================================

    /// Attach a recognized marker to its operand.
    ///
    /// The operand must already be a call. A second marker on an already
    /// marked call collapses into the existing node with `double_marked` set,
    /// leaving the redundancy for the checker to report. Anything else is the
    /// fatal placement error.
    pub(super) fn finish_marker(
        p: &mut Parser<'_>,
        operand: Expr,
        start: u32,
    ) -> LumenResult<Expr> {
        let span = Span::new(start, operand.span.end);
        match operand.kind {
            ExprKind::Call(call) => {
                let site = p.alloc_site();
                let enclosing_function = p.enclosing_function();
                Ok(Expr::new(
                    ExprKind::TailCall(TailCallExpr {
                        call,
                        site,
                        enclosing_function,
                        double_marked: false,
                        validity: TailValidity::Unchecked,
                    }),
                    span,
                ))
            }
            ExprKind::TailCall(inner) => Ok(Expr::new(
                ExprKind::TailCall(TailCallExpr {
                    double_marked: true,
                    ..inner
                }),
                span,
            )),
            _ => Err(p.marker_not_call(operand.span)),
        }
    }

    // =========================================================================
    // Infix
    // =========================================================================

    /// Parse the argument list of a call whose callee is `callee`.
    fn finish_call(p: &mut Parser<'_>, callee: Expr) -> LumenResult<Expr> {
        let start = callee.span.start;
        p.advance();
        let mut arguments = Vec::new();
        if !p.check(&TokenKind::RightParen) {
            loop {
                arguments.push(Self::parse(p, Precedence::Lowest)?);
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        p.expect(&TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(Expr::new(
            ExprKind::Call(CallExpr {
                callee: Box::new(callee),
                arguments,
            }),
            p.span_from(start),
        ))
    }

    /// Parse the arms of a ternary whose condition is `condition`.
    fn finish_conditional(p: &mut Parser<'_>, condition: Expr) -> LumenResult<Expr> {
        let start = condition.span.start;
        p.advance();
        let then_arm = Self::parse(p, Precedence::Lowest)?;
        p.expect(&TokenKind::Colon, "expected ':' in conditional expression")?;
        let else_arm = Self::parse(p, Precedence::Lowest)?;
        Ok(Expr::new(
            ExprKind::Conditional {
                condition: Box::new(condition),
                then_arm: Box::new(then_arm),
                else_arm: Box::new(else_arm),
            },
            p.span_from(start),
        ))
    }

    /// Parse the right-hand side of a binary or logical operator.
    fn finish_infix(p: &mut Parser<'_>, left: Expr, prec: Precedence) -> LumenResult<Expr> {
        let start = left.span.start;
        let op_token = p.advance().kind.clone();
        let right = Self::parse(p, prec)?;
        let span = Span::new(start, right.span.end);

        let kind = match op_token {
            TokenKind::AmpAmp => ExprKind::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            },
            TokenKind::PipePipe => ExprKind::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            },
            other => {
                let op = match other {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Sub,
                    TokenKind::Star => BinaryOp::Mul,
                    TokenKind::Slash => BinaryOp::Div,
                    TokenKind::Percent => BinaryOp::Mod,
                    TokenKind::Less => BinaryOp::Lt,
                    TokenKind::LessEqual => BinaryOp::Le,
                    TokenKind::Greater => BinaryOp::Gt,
                    TokenKind::GreaterEqual => BinaryOp::Ge,
                    TokenKind::StrictEqual => BinaryOp::StrictEq,
                    TokenKind::StrictNotEqual => BinaryOp::StrictNe,
                    _ => return Err(p.error_at_previous("expected binary operator")),
                };
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        };

        Ok(Expr::new(kind, span))
    }

    /// Precedence of the infix operator starting at `kind`, if any.
    fn infix_precedence(kind: &TokenKind) -> Option<Precedence> {
        match kind {
            TokenKind::PipePipe => Some(Precedence::Or),
            TokenKind::AmpAmp => Some(Precedence::And),
            TokenKind::StrictEqual | TokenKind::StrictNotEqual => Some(Precedence::Equality),
            TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => Some(Precedence::Comparison),
            TokenKind::Plus | TokenKind::Minus => Some(Precedence::Additive),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
                Some(Precedence::Multiplicative)
            }
            _ => None,
        }
    }
}
