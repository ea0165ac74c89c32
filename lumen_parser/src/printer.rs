//! Canonical source printer.
//!
//! Printing is the inverse of parsing: feeding the output back through a
//! parser configured with the same marker grammar reproduces the same tree,
//! marked sites included. Explicit markers print as `continue`; inside a
//! sigiled function the markers are implied by the `#` sigil and are not
//! printed, since re-parsing re-marks the same slots.
//!
//! Parentheses are emitted only where precedence demands them, so the output
//! is canonical rather than a copy of the original spelling.

use crate::ast::{
    CallExpr, Expr, ExprKind, FunctionDecl, Literal, Program, Stmt, StmtKind,
};
use crate::parser::Precedence;

/// Print a program as canonical Lumen source.
#[must_use]
pub fn print(program: &Program) -> String {
    let mut printer = Printer::new();
    for stmt in &program.body {
        printer.write_stmt(stmt);
    }
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
    /// True while printing the body of a sigiled function.
    suppress_markers: bool,
}

impl Printer {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
            suppress_markers: false,
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn write_stmt(&mut self, stmt: &Stmt) {
        self.write_indent();
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.write_expr(expr, Precedence::Lowest);
                self.out.push_str(";\n");
            }
            StmtKind::Let { name, value } => {
                self.out.push_str("let ");
                self.out.push_str(&name.name);
                if let Some(value) = value {
                    self.out.push_str(" = ");
                    self.write_expr(value, Precedence::Lowest);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Assign { target, value } => {
                self.out.push_str(&target.name);
                self.out.push_str(" = ");
                self.write_expr(value, Precedence::Lowest);
                self.out.push_str(";\n");
            }
            StmtKind::Function(decl) => self.write_function(decl),
            StmtKind::Return { value } => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.write_expr(value, Precedence::Lowest);
                }
                self.out.push_str(";\n");
            }
            StmtKind::If { .. } => self.write_if(stmt),
            StmtKind::While { condition, body } => {
                self.out.push_str("while (");
                self.write_expr(condition, Precedence::Lowest);
                self.out.push_str(") ");
                self.write_block(body);
                self.out.push('\n');
            }
            StmtKind::Break => self.out.push_str("break;\n"),
            StmtKind::Continue => self.out.push_str("continue;\n"),
            StmtKind::Throw(value) => {
                self.out.push_str("throw ");
                self.write_expr(value, Precedence::Lowest);
                self.out.push_str(";\n");
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                self.out.push_str("try ");
                self.write_block(body);
                if let Some(catch) = catch {
                    self.out.push_str(" catch ");
                    if let Some(binding) = &catch.binding {
                        self.out.push('(');
                        self.out.push_str(&binding.name);
                        self.out.push_str(") ");
                    }
                    self.write_block(&catch.body);
                }
                if let Some(finally) = finally {
                    self.out.push_str(" finally ");
                    self.write_block(finally);
                }
                self.out.push('\n');
            }
            StmtKind::Block(body) => {
                self.write_block(body);
                self.out.push('\n');
            }
        }
    }

    /// `if` chains print as `else if` rather than nested blocks; the two
    /// spellings parse to the same tree.
    fn write_if(&mut self, stmt: &Stmt) {
        let StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } = &stmt.kind
        else {
            return;
        };
        self.out.push_str("if (");
        self.write_expr(condition, Precedence::Lowest);
        self.out.push_str(") ");
        self.write_block(then_branch);
        if let Some(else_branch) = else_branch {
            self.out.push_str(" else ");
            if let [only] = else_branch.as_slice() {
                if matches!(only.kind, StmtKind::If { .. }) {
                    self.write_if(only);
                    return;
                }
            }
            self.write_block(else_branch);
        }
        self.out.push('\n');
    }

    fn write_function(&mut self, decl: &FunctionDecl) {
        if decl.sigiled {
            self.out.push('#');
        }
        self.out.push_str("function ");
        self.out.push_str(&decl.name.name);
        self.out.push('(');
        for (i, param) in decl.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.name);
        }
        self.out.push_str(") ");
        let was_suppressing = self.suppress_markers;
        self.suppress_markers = decl.sigiled;
        self.write_block(&decl.body);
        self.suppress_markers = was_suppressing;
        self.out.push('\n');
    }

    fn write_block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in body {
            self.write_stmt(stmt);
        }
        self.indent -= 1;
        self.write_indent();
        self.out.push('}');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn write_expr(&mut self, expr: &Expr, min_prec: Precedence) {
        if self.expr_precedence(expr) < min_prec {
            self.out.push('(');
            self.write_expr_inner(expr);
            self.out.push(')');
        } else {
            self.write_expr_inner(expr);
        }
    }

    fn write_expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(lit) => self.write_literal(lit),
            ExprKind::Identifier(name) => self.out.push_str(name),
            ExprKind::Unary { op, operand } => {
                self.out.push_str(&op.to_string());
                self.write_expr(operand, Precedence::Unary);
            }
            ExprKind::Binary { op, left, right } => {
                let prec = Self::binary_precedence(expr);
                self.write_expr(left, prec);
                self.out.push(' ');
                self.out.push_str(&op.to_string());
                self.out.push(' ');
                self.write_expr(right, Self::next_up(prec));
            }
            ExprKind::Logical { op, left, right } => {
                let prec = Self::binary_precedence(expr);
                self.write_expr(left, prec);
                self.out.push(' ');
                self.out.push_str(&op.to_string());
                self.out.push(' ');
                self.write_expr(right, Self::next_up(prec));
            }
            ExprKind::Conditional {
                condition,
                then_arm,
                else_arm,
            } => {
                self.write_expr(condition, Precedence::Or);
                self.out.push_str(" ? ");
                self.write_expr(then_arm, Precedence::Lowest);
                self.out.push_str(" : ");
                self.write_expr(else_arm, Precedence::Lowest);
            }
            ExprKind::Call(call) => self.write_call(call),
            ExprKind::TailCall(tc) => {
                if !self.suppress_markers {
                    self.out.push_str("continue ");
                    if tc.double_marked {
                        self.out.push_str("continue ");
                    }
                }
                self.write_call(&tc.call);
            }
        }
    }

    fn write_call(&mut self, call: &CallExpr) {
        self.write_expr(&call.callee, Precedence::Call);
        self.out.push('(');
        for (i, arg) in call.arguments.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.write_expr(arg, Precedence::Lowest);
        }
        self.out.push(')');
    }

    fn write_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Null => self.out.push_str("null"),
            Literal::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Literal::Int(v) => {
                self.out.push_str(&v.to_string());
            }
            Literal::Float(v) => {
                self.out.push_str(&format!("{v:?}"));
            }
            Literal::Str(s) => {
                self.out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => self.out.push_str("\\\""),
                        '\\' => self.out.push_str("\\\\"),
                        '\n' => self.out.push_str("\\n"),
                        '\t' => self.out.push_str("\\t"),
                        '\r' => self.out.push_str("\\r"),
                        _ => self.out.push(c),
                    }
                }
                self.out.push('"');
            }
        }
    }

    /// Precedence of an expression node as the parser would reconstruct it.
    fn expr_precedence(&self, expr: &Expr) -> Precedence {
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Identifier(_) => Precedence::Primary,
            ExprKind::Call(_) => Precedence::Call,
            // A printed marker binds at unary strength; a suppressed one
            // leaves a plain call behind.
            ExprKind::TailCall(_) => {
                if self.suppress_markers {
                    Precedence::Call
                } else {
                    Precedence::Unary
                }
            }
            ExprKind::Unary { .. } => Precedence::Unary,
            ExprKind::Binary { .. } | ExprKind::Logical { .. } => Self::binary_precedence(expr),
            ExprKind::Conditional { .. } => Precedence::Conditional,
        }
    }

    fn binary_precedence(expr: &Expr) -> Precedence {
        match &expr.kind {
            ExprKind::Logical { op, .. } => match op {
                crate::ast::LogicalOp::Or => Precedence::Or,
                crate::ast::LogicalOp::And => Precedence::And,
            },
            ExprKind::Binary { op, .. } => match op {
                crate::ast::BinaryOp::StrictEq | crate::ast::BinaryOp::StrictNe => {
                    Precedence::Equality
                }
                crate::ast::BinaryOp::Lt
                | crate::ast::BinaryOp::Le
                | crate::ast::BinaryOp::Gt
                | crate::ast::BinaryOp::Ge => Precedence::Comparison,
                crate::ast::BinaryOp::Add | crate::ast::BinaryOp::Sub => Precedence::Additive,
                crate::ast::BinaryOp::Mul | crate::ast::BinaryOp::Div | crate::ast::BinaryOp::Mod => {
                    Precedence::Multiplicative
                }
            },
            _ => Precedence::Lowest,
        }
    }

    /// The precedence one step tighter, used for the right operand of a
    /// left-associative operator.
    fn next_up(prec: Precedence) -> Precedence {
        match prec {
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            other => other,
        }
    }
}
