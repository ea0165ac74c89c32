//! Tail-position validation.
//!
//! The validator walks every function body (and the script body) and decides,
//! for each marked call site, whether the marker is honest: whether the call
//! really is the last computation its function performs. Verdicts are written
//! back into the AST as [`TailValidity`] flags and rejections become error
//! diagnostics.
//!
//! Two independent questions are answered per site. The expression question:
//! does the path from the site up to its statement pass only through
//! tail-transparent edges (conditional arms, logical right operands)? Any
//! other edge means the result is consumed by further computation, which is
//! `TC0002`. The statement question: is the enclosing statement context free
//! of constructs that must observe the frame after the call returns (loops,
//! protected `try` regions, finalizers)? Those are `TC0004` and `TC0003`.
//!
//! Validation is deterministic and idempotent: re-running it rewrites the
//! same verdicts and reproduces the same diagnostics.

use lumen_parser::ast::{
    Expr, ExprKind, Program, Stmt, StmtKind, TailCallExpr, TailValidity,
};
use lumen_core::{Diagnostic, DiagnosticList, RuleId, Span};
use smallvec::SmallVec;

// =============================================================================
// Position and Context
// =============================================================================

/// Where an expression sits relative to its function's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// The expression's value is returned without further computation.
    Tail,
    /// The expression's value feeds further computation.
    Value,
}

/// Statement context that prevents frame reuse for everything inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextKind {
    /// Inside a loop body; the loop may iterate after the call.
    Loop,
    /// Inside a `try` region whose handler or finalizer must observe the
    /// frame: the `try` block itself, a `catch` block that still has a
    /// finalizer after it, or a `finally` block.
    Protected,
}

impl ContextKind {
    const fn rule(self) -> RuleId {
        match self {
            Self::Loop => RuleId::LoopContext,
            Self::Protected => RuleId::FinallyContext,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::Loop => "marked call appears inside a loop",
            Self::Protected => {
                "marked call is protected by an exception handler or finalizer"
            }
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Counters from one validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    /// Marked sites examined.
    pub sites_checked: usize,
    /// Sites proven to be in tail position.
    pub valid_sites: usize,
    /// Sites rejected.
    pub invalid_sites: usize,
}

impl ValidationStats {
    /// Fold another run's counters into this one.
    pub fn merge(&mut self, other: &ValidationStats) {
        self.sites_checked += other.sites_checked;
        self.valid_sites += other.valid_sites;
        self.invalid_sites += other.invalid_sites;
    }
}

/// Verdicts and diagnostics from one validation run.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// Rejections and advisories, in emission order.
    pub diagnostics: DiagnosticList,
    /// Run counters.
    pub stats: ValidationStats,
}

// =============================================================================
// Validator
// =============================================================================

/// Tail-position validator.
pub struct TailValidator {
    /// Enclosing statement contexts within the current function body.
    context: SmallVec<[ContextKind; 16]>,
    diagnostics: DiagnosticList,
    stats: ValidationStats,
}

impl TailValidator {
    /// Create a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: SmallVec::new(),
            diagnostics: DiagnosticList::new(),
            stats: ValidationStats::default(),
        }
    }

    /// Validate a program, writing verdicts into its marked sites.
    pub fn validate(mut self, program: &mut Program) -> ValidationOutcome {
        for stmt in &mut program.body {
            self.visit_stmt(stmt);
        }
        ValidationOutcome {
            diagnostics: self.diagnostics,
            stats: self.stats,
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Expression(expr) => self.visit_expr(expr, Position::Value),
            StmtKind::Let { value, .. } => {
                if let Some(value) = value {
                    self.visit_expr(value, Position::Value);
                }
            }
            StmtKind::Assign { value, .. } => self.visit_expr(value, Position::Value),
            StmtKind::Function(decl) => {
                // Each function body is its own context: a loop around the
                // declaration says nothing about returns inside it.
                let outer = std::mem::take(&mut self.context);
                for stmt in &mut decl.body {
                    self.visit_stmt(stmt);
                }
                self.context = outer;
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.visit_expr(value, Position::Tail);
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(condition, Position::Value);
                for stmt in then_branch.iter_mut() {
                    self.visit_stmt(stmt);
                }
                if let Some(else_branch) = else_branch {
                    for stmt in else_branch.iter_mut() {
                        self.visit_stmt(stmt);
                    }
                }
            }
            StmtKind::While { condition, body } => {
                self.visit_expr(condition, Position::Value);
                self.context.push(ContextKind::Loop);
                for stmt in body.iter_mut() {
                    self.visit_stmt(stmt);
                }
                self.context.pop();
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Throw(value) => self.visit_expr(value, Position::Value),
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                self.context.push(ContextKind::Protected);
                for stmt in body.iter_mut() {
                    self.visit_stmt(stmt);
                }
                self.context.pop();

                if let Some(catch) = catch {
                    // A catch block with no finalizer after it is ordinary
                    // control flow; with one, the finalizer still holds the
                    // frame.
                    let protected = finally.is_some();
                    if protected {
                        self.context.push(ContextKind::Protected);
                    }
                    for stmt in catch.body.iter_mut() {
                        self.visit_stmt(stmt);
                    }
                    if protected {
                        self.context.pop();
                    }
                }

                if let Some(finally) = finally {
                    self.context.push(ContextKind::Protected);
                    for stmt in finally.iter_mut() {
                        self.visit_stmt(stmt);
                    }
                    self.context.pop();
                }
            }
            StmtKind::Block(body) => {
                for stmt in body.iter_mut() {
                    self.visit_stmt(stmt);
                }
            }
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn visit_expr(&mut self, expr: &mut Expr, pos: Position) {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::Identifier(_) => {}
            ExprKind::Unary { operand, .. } => self.visit_expr(operand, Position::Value),
            ExprKind::Binary { left, right, .. } => {
                self.visit_expr(left, Position::Value);
                self.visit_expr(right, Position::Value);
            }
            ExprKind::Logical { left, right, .. } => {
                // The left operand's value is tested before the operator
                // decides anything, so only the right operand can be the
                // function's final word.
                self.visit_expr(left, Position::Value);
                self.visit_expr(right, pos);
            }
            ExprKind::Conditional {
                condition,
                then_arm,
                else_arm,
            } => {
                self.visit_expr(condition, Position::Value);
                self.visit_expr(then_arm, pos);
                self.visit_expr(else_arm, pos);
            }
            ExprKind::Call(call) => {
                self.visit_expr(&mut call.callee, Position::Value);
                for arg in &mut call.arguments {
                    self.visit_expr(arg, Position::Value);
                }
            }
            ExprKind::TailCall(tc) => {
                self.check_site(tc, pos, span);
                self.visit_expr(&mut tc.call.callee, Position::Value);
                for arg in &mut tc.call.arguments {
                    self.visit_expr(arg, Position::Value);
                }
            }
        }
    }

    /// Decide the verdict for one marked site.
    fn check_site(&mut self, tc: &mut TailCallExpr, pos: Position, span: Span) {
        self.stats.sites_checked += 1;

        if tc.double_marked {
            self.reject(tc, RuleId::DoubleMarking, "call is already marked", span);
            return;
        }
        if pos == Position::Value {
            self.reject(
                tc,
                RuleId::NotTailPosition,
                "marked call is not in tail position",
                span,
            );
            return;
        }
        if let Some(context) = self.context.last() {
            self.reject(tc, context.rule(), context.message(), span);
            return;
        }

        tc.validity = TailValidity::Valid;
        self.stats.valid_sites += 1;
    }

    fn reject(&mut self, tc: &mut TailCallExpr, rule: RuleId, message: &str, span: Span) {
        tc.validity = TailValidity::Invalid;
        self.stats.invalid_sites += 1;
        self.diagnostics.push(Diagnostic::error(rule, message, span));
    }
}

impl Default for TailValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_parser::{parse, parse_with, MarkerGrammar};

    fn validate(source: &str) -> (Program, ValidationOutcome) {
        let mut program = parse(source).unwrap();
        let outcome = TailValidator::new().validate(&mut program);
        (program, outcome)
    }

    fn first_rule(outcome: &ValidationOutcome) -> RuleId {
        outcome
            .diagnostics
            .iter()
            .next()
            .expect("expected a diagnostic")
            .rule
    }

    fn site_validities(program: &Program) -> Vec<TailValidity> {
        fn walk_stmt(stmt: &Stmt, out: &mut Vec<(u32, TailValidity)>) {
            match &stmt.kind {
                StmtKind::Expression(e) | StmtKind::Throw(e) => walk_expr(e, out),
                StmtKind::Let { value: Some(e), .. } | StmtKind::Assign { value: e, .. } => {
                    walk_expr(e, out)
                }
                StmtKind::Return { value: Some(e) } => walk_expr(e, out),
                StmtKind::Function(decl) => {
                    for s in &decl.body {
                        walk_stmt(s, out);
                    }
                }
                StmtKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    walk_expr(condition, out);
                    for s in then_branch {
                        walk_stmt(s, out);
                    }
                    if let Some(eb) = else_branch {
                        for s in eb {
                            walk_stmt(s, out);
                        }
                    }
                }
                StmtKind::While { condition, body } => {
                    walk_expr(condition, out);
                    for s in body {
                        walk_stmt(s, out);
                    }
                }
                StmtKind::Try {
                    body,
                    catch,
                    finally,
                } => {
                    for s in body {
                        walk_stmt(s, out);
                    }
                    if let Some(c) = catch {
                        for s in &c.body {
                            walk_stmt(s, out);
                        }
                    }
                    if let Some(f) = finally {
                        for s in f {
                            walk_stmt(s, out);
                        }
                    }
                }
                StmtKind::Block(body) => {
                    for s in body {
                        walk_stmt(s, out);
                    }
                }
                _ => {}
            }
        }
        fn walk_expr(expr: &Expr, out: &mut Vec<(u32, TailValidity)>) {
            match &expr.kind {
                ExprKind::TailCall(tc) => {
                    out.push((tc.site.0, tc.validity));
                    walk_expr(&tc.call.callee, out);
                    for a in &tc.call.arguments {
                        walk_expr(a, out);
                    }
                }
                ExprKind::Call(c) => {
                    walk_expr(&c.callee, out);
                    for a in &c.arguments {
                        walk_expr(a, out);
                    }
                }
                ExprKind::Unary { operand, .. } => walk_expr(operand, out),
                ExprKind::Binary { left, right, .. }
                | ExprKind::Logical { left, right, .. } => {
                    walk_expr(left, out);
                    walk_expr(right, out);
                }
                ExprKind::Conditional {
                    condition,
                    then_arm,
                    else_arm,
                } => {
                    walk_expr(condition, out);
                    walk_expr(then_arm, out);
                    walk_expr(else_arm, out);
                }
                _ => {}
            }
        }
        let mut sites = Vec::new();
        for stmt in &program.body {
            walk_stmt(stmt, &mut sites);
        }
        sites.sort_by_key(|(id, _)| *id);
        sites.into_iter().map(|(_, v)| v).collect()
    }

    // =========================================================================
    // Accepted Shapes
    // =========================================================================

    #[test]
    fn test_direct_return_is_valid() {
        let (program, outcome) = validate("function f(n) { return continue f(n - 1); }");
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(site_validities(&program), vec![TailValidity::Valid]);
        assert_eq!(outcome.stats.valid_sites, 1);
    }

    #[test]
    fn test_ternary_arms_are_valid() {
        let (program, outcome) =
            validate("function f(n) { return n === 0 ? continue g(n) : continue h(n); }");
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(
            site_validities(&program),
            vec![TailValidity::Valid, TailValidity::Valid]
        );
    }

    #[test]
    fn test_logical_right_arm_is_valid() {
        let (_, outcome) = validate("function f(n) { return n && continue g(n); }");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_nested_transparent_edges_are_valid() {
        let (_, outcome) =
            validate("function f(a, b) { return a ? b || continue g(a) : continue h(b); }");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_catch_without_finally_is_transparent() {
        let (_, outcome) =
            validate("function f(n) { try { return g(n); } catch { return continue f(n); } }");
        assert!(outcome.diagnostics.is_empty());
    }

    // =========================================================================
    // Rejected Shapes
    // =========================================================================

    #[test]
    fn test_value_transformation_is_rejected() {
        let (program, outcome) = validate("function f(n) { return continue f(n) + 1; }");
        assert_eq!(first_rule(&outcome), RuleId::NotTailPosition);
        assert_eq!(site_validities(&program), vec![TailValidity::Invalid]);
    }

    #[test]
    fn test_logical_left_arm_is_rejected() {
        let (_, outcome) = validate("function f(n) { return continue g(n) && n; }");
        assert_eq!(first_rule(&outcome), RuleId::NotTailPosition);
    }

    #[test]
    fn test_ternary_condition_is_rejected() {
        let (_, outcome) = validate("function f(n) { return continue g(n) ? 1 : 2; }");
        assert_eq!(first_rule(&outcome), RuleId::NotTailPosition);
    }

    #[test]
    fn test_call_argument_is_rejected() {
        let (_, outcome) = validate("function f(n) { return g(continue h(n)); }");
        assert_eq!(first_rule(&outcome), RuleId::NotTailPosition);
    }

    #[test]
    fn test_expression_statement_is_rejected() {
        let (_, outcome) = validate("function f(n) { continue g(n); return 0; }");
        assert_eq!(first_rule(&outcome), RuleId::NotTailPosition);
    }

    #[test]
    fn test_let_initializer_is_rejected() {
        let (_, outcome) = validate("function f(n) { let x = continue g(n); return x; }");
        assert_eq!(first_rule(&outcome), RuleId::NotTailPosition);
    }

    #[test]
    fn test_try_block_is_rejected() {
        let (_, outcome) =
            validate("function f(n) { try { return continue g(n); } finally { h(); } }");
        assert_eq!(first_rule(&outcome), RuleId::FinallyContext);
    }

    #[test]
    fn test_try_with_catch_only_still_protects_try_block() {
        let (_, outcome) =
            validate("function f(n) { try { return continue g(n); } catch { return 0; } }");
        assert_eq!(first_rule(&outcome), RuleId::FinallyContext);
    }

    #[test]
    fn test_catch_with_finally_is_rejected() {
        let (_, outcome) = validate(
            "function f(n) { try { g(); } catch { return continue f(n); } finally { h(); } }",
        );
        assert_eq!(first_rule(&outcome), RuleId::FinallyContext);
    }

    #[test]
    fn test_finally_block_is_rejected() {
        let (_, outcome) =
            validate("function f(n) { try { g(); } finally { return continue f(n); } }");
        assert_eq!(first_rule(&outcome), RuleId::FinallyContext);
    }

    #[test]
    fn test_loop_body_is_rejected() {
        let (_, outcome) =
            validate("function f(n) { while (n) { return continue f(n - 1); } return 0; }");
        assert_eq!(first_rule(&outcome), RuleId::LoopContext);
    }

    #[test]
    fn test_innermost_context_names_the_rule() {
        let (_, outcome) = validate(
            "function f(n) { while (n) { try { return continue f(n); } finally { g(); } } }",
        );
        assert_eq!(first_rule(&outcome), RuleId::FinallyContext);
    }

    #[test]
    fn test_double_marking_is_rejected() {
        let (_, outcome) = validate("function f(n) { return continue continue f(n); }");
        assert_eq!(first_rule(&outcome), RuleId::DoubleMarking);
    }

    #[test]
    fn test_marked_argument_of_marked_call_is_rejected() {
        let (program, outcome) =
            validate("function f(n) { return continue f(continue g(n)); }");
        // The outer site is a legitimate tail call; the inner one feeds an
        // argument list.
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(first_rule(&outcome), RuleId::NotTailPosition);
        assert_eq!(
            site_validities(&program),
            vec![TailValidity::Invalid, TailValidity::Valid]
        );
    }

    // =========================================================================
    // Structural Properties
    // =========================================================================

    #[test]
    fn test_nested_function_resets_context() {
        // The loop surrounds the declaration, not the inner function's
        // return.
        let source =
            "function f(n) { while (n) { function g(k) { return continue g(k); } n = n - 1; } return 0; }";
        let (_, outcome) = validate(source);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let source = "function f(n) { while (n) { return continue f(n); } return continue f(0); }";
        let mut program = parse(source).unwrap();
        let first = TailValidator::new().validate(&mut program);
        let first_validities = site_validities(&program);
        let second = TailValidator::new().validate(&mut program);
        assert_eq!(
            first.diagnostics.in_source_order(),
            second.diagnostics.in_source_order()
        );
        assert_eq!(first.stats, second.stats);
        assert_eq!(site_validities(&program), first_validities);
    }

    #[test]
    fn test_diagnostics_cover_every_invalid_site() {
        let source = "function f(n) { let a = continue g(n); while (n) { return continue f(n); } return 0; }";
        let (program, outcome) = validate(source);
        assert_eq!(outcome.diagnostics.len(), 2);
        assert_eq!(outcome.stats.invalid_sites, 2);
        assert_eq!(
            site_validities(&program),
            vec![TailValidity::Invalid, TailValidity::Invalid]
        );
    }

    #[test]
    fn test_sigiled_functions_always_validate() {
        let source = "#function f(n) { while (n) { n = g(n); } return n === 0 ? 0 : f(n); }";
        let mut program = parse_with(source, MarkerGrammar::FunctionSigil).unwrap();
        let outcome = TailValidator::new().validate(&mut program);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.stats.invalid_sites, 0);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = ValidationStats {
            sites_checked: 2,
            valid_sites: 1,
            invalid_sites: 1,
        };
        let b = ValidationStats {
            sites_checked: 3,
            valid_sites: 3,
            invalid_sites: 0,
        };
        a.merge(&b);
        assert_eq!(a.sites_checked, 5);
        assert_eq!(a.valid_sites, 4);
        assert_eq!(a.invalid_sites, 1);
    }
}
