//! Lumen compile driver.
//!
//! Compilation for Lumen is parse + tail-position validation; there is no
//! separate code generation step, the interpreter executes the validated
//! tree. This crate owns the validator and the driver that strings the
//! phases together, maps parse failures into the diagnostic model, and
//! enforces the rule that error diagnostics block execution.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod validator;

pub use validator::{TailValidator, ValidationOutcome, ValidationStats};

use lumen_core::{BoundaryPolicy, Diagnostic, DiagnosticList, RuleId, Span};
use lumen_parser::ast::{Expr, ExprKind, Program, Stmt, StmtKind, TailValidity};
use lumen_parser::{parse_with, MarkerGrammar, MARKER_NOT_CALL};
use rustc_hash::FxHashSet;

// =============================================================================
// Options
// =============================================================================

/// Compilation options.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Marker grammar the parser should use.
    pub grammar: MarkerGrammar,
    /// Boundary policy the program will run under. Only consulted for
    /// compile-time advisories; enforcement is the runtime guard's job.
    pub boundary_policy: BoundaryPolicy,
    /// Names the host declares as resolving outside the program's realm.
    /// A valid marked call to one of these earns an advisory warning when
    /// the policy is `Warn`.
    pub foreign_callees: FxHashSet<String>,
}

impl CompileOptions {
    /// Options with everything defaulted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with a specific marker grammar.
    #[must_use]
    pub fn with_grammar(grammar: MarkerGrammar) -> Self {
        Self {
            grammar,
            ..Self::default()
        }
    }
}

// =============================================================================
// Compilation Result
// =============================================================================

/// A program whose marked sites have all been proven valid.
///
/// Only [`compile`] constructs this, and only when validation produced no
/// error diagnostics. The interpreter takes it by reference and may assume
/// every `TailCall` node it meets is `Valid`.
#[derive(Debug, Clone)]
pub struct ValidatedProgram {
    program: Program,
}

impl ValidatedProgram {
    /// The underlying program.
    #[inline]
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Consume the wrapper.
    #[must_use]
    pub fn into_program(self) -> Program {
        self.program
    }
}

/// Outcome of one compilation: diagnostics always, a program only when no
/// diagnostic is an error. Warnings accompany a successful compilation.
#[derive(Debug)]
pub struct Compilation {
    /// The validated program, absent if compilation failed.
    pub program: Option<ValidatedProgram>,
    /// All diagnostics, parse and validation alike.
    pub diagnostics: DiagnosticList,
    /// Validator counters; zeroed when the parse failed.
    pub stats: ValidationStats,
}

impl Compilation {
    /// Whether a program was produced.
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.program.is_some()
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Compile Lumen source text.
pub fn compile(source: &str, options: &CompileOptions) -> Compilation {
    let mut diagnostics = DiagnosticList::new();

    let mut program = match parse_with(source, options.grammar) {
        Ok(program) => program,
        Err(err) => {
            let rule = if err.message() == MARKER_NOT_CALL {
                RuleId::MarkerNotCall
            } else {
                RuleId::Parse
            };
            let span = err.span().unwrap_or_else(Span::dummy);
            diagnostics.push(Diagnostic::error(rule, err.message(), span));
            return Compilation {
                program: None,
                diagnostics,
                stats: ValidationStats::default(),
            };
        }
    };

    let outcome = TailValidator::new().validate(&mut program);
    diagnostics.merge(outcome.diagnostics);

    if options.boundary_policy == BoundaryPolicy::Warn && !options.foreign_callees.is_empty() {
        emit_foreign_callee_advisories(&program, &options.foreign_callees, &mut diagnostics);
    }

    if diagnostics.has_errors() {
        Compilation {
            program: None,
            diagnostics,
            stats: outcome.stats,
        }
    } else {
        Compilation {
            program: Some(ValidatedProgram { program }),
            diagnostics,
            stats: outcome.stats,
        }
    }
}

/// Compile with default options.
pub fn compile_default(source: &str) -> Compilation {
    compile(source, &CompileOptions::default())
}

// =============================================================================
// Foreign Callee Advisory
// =============================================================================

/// Warn about valid marked calls whose callee the host declared foreign.
///
/// This is best-effort name matching, not resolution; the warn-once runtime
/// guard is the authority. A site flagged here will also warn at runtime,
/// which is acceptable because the two channels have different audiences.
fn emit_foreign_callee_advisories(
    program: &Program,
    foreign: &FxHashSet<String>,
    diagnostics: &mut DiagnosticList,
) {
    for stmt in &program.body {
        advise_stmt(stmt, foreign, diagnostics);
    }
}

fn advise_stmt(stmt: &Stmt, foreign: &FxHashSet<String>, out: &mut DiagnosticList) {
    match &stmt.kind {
        StmtKind::Expression(e) | StmtKind::Throw(e) => advise_expr(e, foreign, out),
        StmtKind::Let { value: Some(e), .. } | StmtKind::Assign { value: e, .. } => {
            advise_expr(e, foreign, out)
        }
        StmtKind::Return { value: Some(e) } => advise_expr(e, foreign, out),
        StmtKind::Function(decl) => {
            for s in &decl.body {
                advise_stmt(s, foreign, out);
            }
        }
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            advise_expr(condition, foreign, out);
            for s in then_branch {
                advise_stmt(s, foreign, out);
            }
            if let Some(else_branch) = else_branch {
                for s in else_branch {
                    advise_stmt(s, foreign, out);
                }
            }
        }
        StmtKind::While { condition, body } => {
            advise_expr(condition, foreign, out);
            for s in body {
                advise_stmt(s, foreign, out);
            }
        }
        StmtKind::Try {
            body,
            catch,
            finally,
        } => {
            for s in body {
                advise_stmt(s, foreign, out);
            }
            if let Some(catch) = catch {
                for s in &catch.body {
                    advise_stmt(s, foreign, out);
                }
            }
            if let Some(finally) = finally {
                for s in finally {
                    advise_stmt(s, foreign, out);
                }
            }
        }
        StmtKind::Block(body) => {
            for s in body {
                advise_stmt(s, foreign, out);
            }
        }
        _ => {}
    }
}

fn advise_expr(expr: &Expr, foreign: &FxHashSet<String>, out: &mut DiagnosticList) {
    match &expr.kind {
        ExprKind::TailCall(tc) => {
            if tc.validity == TailValidity::Valid {
                if let ExprKind::Identifier(name) = &tc.call.callee.kind {
                    if foreign.contains(name) {
                        out.push(Diagnostic::warning(
                            RuleId::CrossBoundaryCall,
                            format!(
                                "marked tail call to '{name}' crosses a realm boundary; the caller frame will be retained"
                            ),
                            expr.span,
                        ));
                    }
                }
            }
            advise_expr(&tc.call.callee, foreign, out);
            for a in &tc.call.arguments {
                advise_expr(a, foreign, out);
            }
        }
        ExprKind::Call(c) => {
            advise_expr(&c.callee, foreign, out);
            for a in &c.arguments {
                advise_expr(a, foreign, out);
            }
        }
        ExprKind::Unary { operand, .. } => advise_expr(operand, foreign, out),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            advise_expr(left, foreign, out);
            advise_expr(right, foreign, out);
        }
        ExprKind::Conditional {
            condition,
            then_arm,
            else_arm,
        } => {
            advise_expr(condition, foreign, out);
            advise_expr(then_arm, foreign, out);
            advise_expr(else_arm, foreign, out);
        }
        _ => {}
    }
}
