//! Tree-walking interpreter with a frame-reusing trampoline.
//!
//! Ordinary calls recurse and push a frame, bounded by
//! [`CallFrame::MAX_FRAME_DEPTH`]. A validated tail site instead evaluates
//! its callee and arguments exactly like an ordinary call, consults the
//! cross-boundary guard, and packages the target into a [`PendingCall`] that
//! unwinds to the nearest function-execution loop. The loop swaps the pending
//! target into the current frame slot and goes around again, so a chain of N
//! marked calls runs at constant frame depth.
//!
//! The frame swap happens only after argument evaluation has fully
//! succeeded. An exception thrown by an argument therefore propagates with
//! the caller's frame still live, and the swap itself has no suspension
//! point: there is no observable moment with zero frames or with a
//! half-installed callee.

use crate::frame::{ArgBuffer, CallFrame, FrameFunction, PendingCall};
use crate::guard::{
    BoundaryDecision, BoundaryDescriptor, BoundaryGuard, HostBoundaryContract, MembraneHostTable,
    SiteKey,
};
use crate::realm::{DomainId, Realm, UnitId};
use crate::site::{SiteAttempt, TailCallStats, TailSiteState};
use crate::traceback;
use crate::value::{FunctionValue, NativeFunction, Value};
use lumen_compiler::ValidatedProgram;
use lumen_core::{
    BoundaryPolicy, Diagnostic, DiagnosticList, LumenError, LumenResult, RuleId,
    RuntimeErrorKind, Span, Traceback,
};
use lumen_parser::{
    BinaryOp, CatchClause, Expr, ExprKind, FunctionDecl, Literal, LogicalOp, Stmt, StmtKind,
    TailCallExpr, TailValidity, UnaryOp,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use std::sync::Arc;

// =============================================================================
// Options
// =============================================================================

/// Knobs of one interpreter instance.
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Policy applied to cross-domain tail sites.
    pub boundary_policy: BoundaryPolicy,
    /// Depth limit for ordinary calls.
    pub max_frames: usize,
    /// Whether validated sites may reuse frames. Disabling routes every site
    /// through the ordinary-call path with a warn-once diagnostic; a
    /// validated site never silently grows the stack.
    pub tco_enabled: bool,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            boundary_policy: BoundaryPolicy::default(),
            max_frames: CallFrame::MAX_FRAME_DEPTH,
            tco_enabled: true,
        }
    }
}

// =============================================================================
// Control Flow
// =============================================================================

/// Statement-level control flow.
enum Flow {
    /// Fall through to the next statement.
    Normal,
    /// `break;`
    Break,
    /// `continue;` in loop-control position.
    Continue,
    /// `return expr;` with an ordinary value.
    Return(Value),
    /// `return continue f(...);` whose boundary check approved frame reuse.
    /// Unwinds to the function-execution loop.
    TailCall(PendingCall),
}

/// Result of evaluating an expression in tail position.
enum TailEval {
    /// An ordinary value.
    Value(Value),
    /// A reusable pending call.
    Pending(PendingCall),
}

/// Exception propagation. `Raise` preserves the thrown value for `catch`
/// bindings; `Fail` carries an engine error. Internal errors are not
/// catchable by user code.
enum Unwind {
    Raise {
        value: Value,
        span: Span,
        traceback: Traceback,
    },
    Fail(LumenError),
}

impl Unwind {
    fn is_catchable(&self) -> bool {
        !matches!(self, Self::Fail(LumenError::InternalError { .. }))
    }

    /// Value bound by a `catch` clause. Engine errors bind their rendered
    /// message.
    fn catch_binding(&self) -> Value {
        match self {
            Self::Raise { value, .. } => value.clone(),
            Self::Fail(err) => Value::Str(Rc::from(err.to_string().as_str())),
        }
    }

    fn into_error(self) -> LumenError {
        match self {
            Self::Raise {
                value,
                span,
                traceback,
            } => LumenError::runtime(RuntimeErrorKind::Thrown, value.to_string())
                .with_span(span)
                .with_traceback(traceback),
            Self::Fail(err) => err,
        }
    }
}

type ExecResult<T> = Result<T, Unwind>;

// =============================================================================
// Interpreter
// =============================================================================

/// The Lumen interpreter. Owns the realms, the frame stack, the boundary
/// guard and the runtime diagnostic sink.
pub struct Interpreter {
    options: InterpreterOptions,
    realms: Vec<Realm>,
    frames: Vec<CallFrame>,
    guard: BoundaryGuard,
    warnings: Arc<Mutex<DiagnosticList>>,
    stats: TailCallStats,
    /// Realm of the program currently entered through `run`. Frames in other
    /// realms get annotated in traces.
    entry_domain: DomainId,
    next_unit: u32,
}

impl Interpreter {
    /// Interpreter with the default host, which supports no cross-domain
    /// reuse until pairs are registered.
    #[must_use]
    pub fn new(options: InterpreterOptions) -> Self {
        Self::with_host(options, Arc::new(MembraneHostTable::new()))
    }

    /// Interpreter with a caller-provided host contract.
    #[must_use]
    pub fn with_host(options: InterpreterOptions, host: Arc<dyn HostBoundaryContract>) -> Self {
        let guard = BoundaryGuard::new(options.boundary_policy, options.tco_enabled, host);
        let mut interp = Self {
            options,
            realms: Vec::new(),
            frames: Vec::new(),
            guard,
            warnings: Arc::new(Mutex::new(DiagnosticList::default())),
            stats: TailCallStats::new(),
            entry_domain: DomainId::MAIN,
            next_unit: 0,
        };
        interp.create_realm("main");
        interp
    }

    // =========================================================================
    // Realms and Globals
    // =========================================================================

    /// Create a realm with its own globals and builtins.
    pub fn create_realm(&mut self, name: &str) -> DomainId {
        let id = DomainId(self.realms.len() as u32);
        let mut realm = Realm::new(id, name);
        install_builtins(&mut realm, id);
        self.realms.push(realm);
        id
    }

    /// Define a global in `domain`, replacing any existing binding.
    pub fn define_global(&mut self, domain: DomainId, name: &str, value: Value) {
        if let Some(realm) = self.realms.get_mut(domain.index()) {
            realm.define(name, value);
        }
    }

    /// Look up a global in `domain`.
    #[must_use]
    pub fn global(&self, domain: DomainId, name: &str) -> Option<Value> {
        self.realms.get(domain.index()).and_then(|r| r.get(name))
    }

    // =========================================================================
    // Observability
    // =========================================================================

    /// Handle to the runtime warning sink. The host can hold this across
    /// runs and drain it on its own schedule.
    #[must_use]
    pub fn warnings(&self) -> Arc<Mutex<DiagnosticList>> {
        Arc::clone(&self.warnings)
    }

    /// Take all runtime warnings accumulated so far.
    pub fn drain_warnings(&self) -> DiagnosticList {
        std::mem::take(&mut *self.warnings.lock())
    }

    /// Counters accumulated over the interpreter's life.
    #[must_use]
    pub fn stats(&self) -> &TailCallStats {
        &self.stats
    }

    /// Capture the live frames, innermost first. Frames released by
    /// tail-call reuse are absent; after a finished run the trace is empty.
    #[must_use]
    pub fn capture_stack_trace(&self) -> Traceback {
        traceback::capture(&self.frames, self.entry_domain, &self.realms)
    }

    // =========================================================================
    // Program Execution
    // =========================================================================

    /// Run a validated program in the main realm.
    pub fn run(&mut self, program: &ValidatedProgram) -> LumenResult<Value> {
        self.run_in_realm(program, DomainId::MAIN)
    }

    /// Run a validated program with `domain` as its global scope.
    ///
    /// The script result is the value of the last top-level expression
    /// statement, or the value of a top-level `return`.
    pub fn run_in_realm(
        &mut self,
        program: &ValidatedProgram,
        domain: DomainId,
    ) -> LumenResult<Value> {
        let unit = UnitId(self.next_unit);
        self.next_unit += 1;

        let saved_entry = self.entry_domain;
        self.entry_domain = domain;
        self.frames.push(CallFrame::script(domain, unit));
        self.stats.note_depth(self.frames.len());

        let outcome = self.run_script_body(&program.program().body);

        self.frames.pop();
        self.entry_domain = saved_entry;
        outcome.map_err(Unwind::into_error)
    }

    fn run_script_body(&mut self, body: &[Stmt]) -> ExecResult<Value> {
        let mut last = Value::Null;
        for stmt in body {
            // Top-level expression statements feed the script result, which
            // is what a REPL echoes.
            if let StmtKind::Expression(expr) = &stmt.kind {
                self.set_span(stmt.span);
                last = self.eval_expr(expr)?;
                continue;
            }
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                Flow::Return(value) => return Ok(value),
                Flow::TailCall(pending) => return self.resume_pending(pending),
                Flow::Break | Flow::Continue => {
                    return Err(Unwind::Fail(LumenError::internal(
                        "loop control escaped its loop",
                    )))
                }
            }
        }
        Ok(last)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn exec_block(&mut self, body: &[Stmt]) -> ExecResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> ExecResult<Flow> {
        self.set_span(stmt.span);
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::Let { name, value } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                self.declare(&name.name, value);
                Ok(Flow::Normal)
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval_expr(value)?;
                if self.assign(&target.name, value) {
                    Ok(Flow::Normal)
                } else {
                    Err(self.fail(LumenError::reference(&target.name), target.span))
                }
            }
            StmtKind::Function(decl) => {
                let function = self.make_function(decl);
                self.declare(&decl.name.name, Value::Function(function));
                Ok(Flow::Normal)
            }
            StmtKind::Return { value } => match value {
                None => Ok(Flow::Return(Value::Null)),
                Some(expr) => match self.eval_tail_expr(expr)? {
                    TailEval::Value(v) => Ok(Flow::Return(v)),
                    TailEval::Pending(p) => Ok(Flow::TailCall(p)),
                },
            },
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.exec_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval_expr(condition)?.is_truthy() {
                    match self.exec_block(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Throw(expr) => {
                let value = self.eval_expr(expr)?;
                Err(Unwind::Raise {
                    value,
                    span: stmt.span,
                    traceback: self.capture_stack_trace(),
                })
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => self.exec_try(body, catch.as_ref(), finally.as_deref()),
            StmtKind::Block(body) => self.exec_block(body),
        }
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        catch: Option<&CatchClause>,
        finally: Option<&[Stmt]>,
    ) -> ExecResult<Flow> {
        let mut outcome = self.exec_block(body);

        if let Err(unwind) = outcome {
            outcome = match catch {
                Some(clause) if unwind.is_catchable() => {
                    if let Some(binding) = &clause.binding {
                        let caught = unwind.catch_binding();
                        self.declare(&binding.name, caught);
                    }
                    self.exec_block(&clause.body)
                }
                _ => Err(unwind),
            };
        }

        if let Some(finalizer) = finally {
            match self.exec_block(finalizer) {
                // A quietly completing finalizer lets the body's outcome
                // stand; an abrupt one replaces it.
                Ok(Flow::Normal) => {}
                abrupt => outcome = abrupt,
            }
        }
        outcome
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn eval_expr(&mut self, expr: &Expr) -> ExecResult<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Identifier(name) => match self.lookup(name) {
                Some(value) => Ok(value),
                None => Err(self.fail(LumenError::reference(name), expr.span)),
            },
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                self.apply_unary(*op, value, expr.span)
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval_expr(left)?;
                let rhs = self.eval_expr(right)?;
                self.apply_binary(*op, lhs, rhs, expr.span)
            }
            ExprKind::Logical { op, left, right } => {
                let lhs = self.eval_expr(left)?;
                match op {
                    LogicalOp::And if !lhs.is_truthy() => Ok(lhs),
                    LogicalOp::Or if lhs.is_truthy() => Ok(lhs),
                    _ => self.eval_expr(right),
                }
            }
            ExprKind::Conditional {
                condition,
                then_arm,
                else_arm,
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.eval_expr(then_arm)
                } else {
                    self.eval_expr(else_arm)
                }
            }
            ExprKind::Call(call) => {
                let callee = self.eval_expr(&call.callee)?;
                let args = self.eval_arguments(&call.arguments)?;
                self.call_value(callee, args, expr.span)
            }
            // A marked site only reaches ordinary evaluation if it was never
            // validated; the compiler refuses to hand such programs over.
            ExprKind::TailCall(tc) => Err(self.unvalidated_site(tc)),
        }
    }

    /// Evaluate an expression sitting in tail position. Conditional arms and
    /// logical right arms pass the position through; everything else is an
    /// ordinary value.
    fn eval_tail_expr(&mut self, expr: &Expr) -> ExecResult<TailEval> {
        match &expr.kind {
            ExprKind::Conditional {
                condition,
                then_arm,
                else_arm,
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.eval_tail_expr(then_arm)
                } else {
                    self.eval_tail_expr(else_arm)
                }
            }
            ExprKind::Logical { op, left, right } => {
                let lhs = self.eval_expr(left)?;
                match op {
                    LogicalOp::And if !lhs.is_truthy() => Ok(TailEval::Value(lhs)),
                    LogicalOp::Or if lhs.is_truthy() => Ok(TailEval::Value(lhs)),
                    _ => self.eval_tail_expr(right),
                }
            }
            ExprKind::TailCall(tc) => self.eval_marked_site(tc, expr.span),
            _ => self.eval_expr(expr).map(TailEval::Value),
        }
    }

    fn eval_arguments(&mut self, arguments: &[Expr]) -> ExecResult<ArgBuffer> {
        let mut args = ArgBuffer::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.eval_expr(arg)?);
        }
        Ok(args)
    }

    // =========================================================================
    // Marked Sites
    // =========================================================================

    /// Evaluate one validated tail site: arguments, boundary check, then
    /// either a pending frame reuse or an ordinary call.
    fn eval_marked_site(&mut self, tc: &TailCallExpr, span: Span) -> ExecResult<TailEval> {
        if tc.validity != TailValidity::Valid {
            return Err(self.unvalidated_site(tc));
        }
        self.set_span(span);

        let mut attempt = SiteAttempt::new(tc.site);
        attempt.advance(TailSiteState::ArgsEvaluating);

        // Callee and arguments evaluate exactly like an ordinary call; a
        // throw here leaves the caller's frame untouched and live.
        let callee = match self.eval_expr(&tc.call.callee) {
            Ok(value) => value,
            Err(unwind) => return Err(self.attempt_threw(attempt, unwind)),
        };
        let mut args = ArgBuffer::with_capacity(tc.call.arguments.len());
        for arg in &tc.call.arguments {
            match self.eval_expr(arg) {
                Ok(value) => args.push(value),
                Err(unwind) => return Err(self.attempt_threw(attempt, unwind)),
            }
        }
        attempt.advance(TailSiteState::ArgsEvaluated);

        match callee {
            Value::Function(function) => {
                if let Err(unwind) = self.check_arity(&function, args.len(), span) {
                    return Err(self.attempt_threw(attempt, unwind));
                }
                let boundary = BoundaryDescriptor::new(self.current_domain(), function.domain);
                attempt.advance(TailSiteState::BoundaryChecked);

                let key = SiteKey {
                    unit: self.current_unit(),
                    site: tc.site,
                };
                match self.guard.decide(key, boundary) {
                    BoundaryDecision::Reuse => {
                        attempt.advance(TailSiteState::FrameReused);
                        self.stats.frames_reused += 1;
                        Ok(TailEval::Pending(PendingCall {
                            function,
                            args,
                            span,
                            attempt,
                        }))
                    }
                    BoundaryDecision::OrdinaryCall { warn } => {
                        if warn {
                            self.emit_boundary_warning(span, boundary);
                        }
                        attempt.advance(TailSiteState::FrameGrown);
                        self.stats.frames_grown += 1;
                        attempt.advance(TailSiteState::Executing);
                        let result = self.call_lumen(function, args, span);
                        Ok(TailEval::Value(self.finish_grown(attempt, result)?))
                    }
                    BoundaryDecision::Refuse => {
                        attempt.advance(TailSiteState::Aborted);
                        self.stats.sites_aborted += 1;
                        self.stats.record_attempt(attempt);
                        Err(self.refuse_boundary(tc, span, boundary))
                    }
                }
            }
            Value::Native(native) => {
                // A native target owns no interpreter frame, so there is
                // nothing to reuse; the attempt takes the ordinary path.
                let boundary = BoundaryDescriptor::new(self.current_domain(), native.domain);
                attempt.advance(TailSiteState::BoundaryChecked);

                let key = SiteKey {
                    unit: self.current_unit(),
                    site: tc.site,
                };
                let decision = self.guard.decide(key, boundary);
                if decision == BoundaryDecision::Refuse {
                    attempt.advance(TailSiteState::Aborted);
                    self.stats.sites_aborted += 1;
                    self.stats.record_attempt(attempt);
                    return Err(self.refuse_boundary(tc, span, boundary));
                }
                if let BoundaryDecision::OrdinaryCall { warn: true } = decision {
                    self.emit_boundary_warning(span, boundary);
                }
                attempt.advance(TailSiteState::FrameGrown);
                self.stats.frames_grown += 1;
                attempt.advance(TailSiteState::Executing);
                let result = self.call_native(&native, &args, span);
                Ok(TailEval::Value(self.finish_grown(attempt, result)?))
            }
            other => {
                let err = self.fail(
                    LumenError::type_error(format!("{} is not callable", other.type_name())),
                    span,
                );
                Err(self.attempt_threw(attempt, err))
            }
        }
    }

    /// Terminal bookkeeping for an attempt that ended in an exception before
    /// or instead of running the callee.
    fn attempt_threw(&mut self, mut attempt: SiteAttempt, unwind: Unwind) -> Unwind {
        if attempt.state() == TailSiteState::ArgsEvaluating {
            self.stats.args_threw += 1;
        }
        attempt.advance(TailSiteState::Threw);
        self.stats.record_attempt(attempt);
        unwind
    }

    /// Terminal bookkeeping for the stack-growing path.
    fn finish_grown(
        &mut self,
        mut attempt: SiteAttempt,
        result: ExecResult<Value>,
    ) -> ExecResult<Value> {
        match result {
            Ok(value) => {
                attempt.advance(TailSiteState::Returned);
                self.stats.record_attempt(attempt);
                Ok(value)
            }
            Err(unwind) => {
                attempt.advance(TailSiteState::Threw);
                self.stats.record_attempt(attempt);
                Err(unwind)
            }
        }
    }

    fn unvalidated_site(&self, tc: &TailCallExpr) -> Unwind {
        Unwind::Fail(LumenError::internal(format!(
            "tail call {} in {} was not validated",
            tc.site, tc.enclosing_function,
        )))
    }

    fn refuse_boundary(
        &self,
        tc: &TailCallExpr,
        span: Span,
        boundary: BoundaryDescriptor,
    ) -> Unwind {
        let message = format!(
            "tail call at {} from realm '{}' into realm '{}' refused by boundary policy",
            tc.site,
            self.realm_name(boundary.caller),
            self.realm_name(boundary.callee),
        );
        self.fail(
            LumenError::runtime(RuntimeErrorKind::BoundaryError, message),
            span,
        )
    }

    fn emit_boundary_warning(&mut self, span: Span, boundary: BoundaryDescriptor) {
        let message = if !self.options.tco_enabled {
            "tail call optimization is disabled; the caller frame will be retained".to_string()
        } else {
            format!(
                "tail call crosses from realm '{}' into realm '{}'; the caller frame will be retained",
                self.realm_name(boundary.caller),
                self.realm_name(boundary.callee),
            )
        };
        self.warnings
            .lock()
            .push(Diagnostic::warning(RuleId::CrossBoundaryCall, message, span));
        self.stats.warnings_emitted += 1;
    }

    // =========================================================================
    // Calls and the Trampoline
    // =========================================================================

    fn call_value(&mut self, callee: Value, args: ArgBuffer, span: Span) -> ExecResult<Value> {
        match callee {
            Value::Function(function) => {
                self.check_arity(&function, args.len(), span)?;
                self.call_lumen(function, args, span)
            }
            Value::Native(native) => self.call_native(&native, &args, span),
            other => Err(self.fail(
                LumenError::type_error(format!("{} is not callable", other.type_name())),
                span,
            )),
        }
    }

    /// Push a frame for `function` and run its body through the trampoline
    /// loop.
    fn call_lumen(
        &mut self,
        function: Rc<FunctionValue>,
        args: ArgBuffer,
        span: Span,
    ) -> ExecResult<Value> {
        if self.frames.len() >= self.options.max_frames {
            return Err(self.fail(LumenError::stack_overflow(self.options.max_frames), span));
        }

        // The caller's recorded position is the call site while the callee
        // runs, so a trace captured below points here.
        self.set_span(span);
        let caller = (self.frames.len() - 1) as u32;
        let body = Rc::clone(&function.body);
        let mut frame = CallFrame::for_call(function, Some(caller), span);
        bind_parameters(&mut frame, args);
        self.frames.push(frame);
        self.stats.note_depth(self.frames.len());

        let result = self.frame_loop(body, None);
        self.frames.pop();
        result
    }

    /// Install a pending call into the current frame and keep executing.
    /// Used when a tail call unwinds all the way to the script body.
    fn resume_pending(&mut self, pending: PendingCall) -> ExecResult<Value> {
        let body = Rc::clone(&pending.function.body);
        let attempt = self.install_pending(pending);
        self.frame_loop(body, Some(attempt))
    }

    /// The trampoline: run `body` in the current frame; when it ends in a
    /// pending tail call, swap the target into the frame slot and loop.
    fn frame_loop(
        &mut self,
        mut body: Rc<[Stmt]>,
        mut attempt: Option<SiteAttempt>,
    ) -> ExecResult<Value> {
        loop {
            match self.exec_block(&body) {
                Ok(Flow::Return(value)) => {
                    self.finish_attempt(attempt, TailSiteState::Returned);
                    return Ok(value);
                }
                Ok(Flow::Normal) => {
                    self.finish_attempt(attempt, TailSiteState::Returned);
                    return Ok(Value::Null);
                }
                Ok(Flow::TailCall(pending)) => {
                    // The running activation completed by handing its frame
                    // to the next target.
                    self.finish_attempt(attempt.take(), TailSiteState::Returned);
                    body = Rc::clone(&pending.function.body);
                    attempt = Some(self.install_pending(pending));
                }
                Ok(Flow::Break | Flow::Continue) => {
                    self.finish_attempt(attempt, TailSiteState::Threw);
                    return Err(Unwind::Fail(LumenError::internal(
                        "loop control escaped its loop",
                    )));
                }
                Err(unwind) => {
                    self.finish_attempt(attempt, TailSiteState::Threw);
                    return Err(unwind);
                }
            }
        }
    }

    /// Swap a pending call into the current frame slot. All argument values
    /// already exist; this is pure bookkeeping with no evaluation in between,
    /// so no observable state has fewer frames or a half-bound callee.
    fn install_pending(&mut self, pending: PendingCall) -> SiteAttempt {
        let PendingCall {
            function,
            args,
            span,
            mut attempt,
        } = pending;

        let mut locals = function.captured.clone();
        locals.reserve(function.params.len());
        for (param, value) in function.params.iter().zip(args) {
            locals.insert(Rc::clone(param), value);
        }

        let reuses = {
            // Frames are never empty while user code runs; the entry frame
            // belongs to the script body.
            let frame = match self.frames.last_mut() {
                Some(frame) => frame,
                None => unreachable_frame(),
            };
            frame.locals = locals;
            frame.domain = function.domain;
            frame.unit = function.unit;
            frame.current_span = span;
            frame.reuse_count += 1;
            frame.function = FrameFunction::Function(function);
            frame.reuse_count
        };
        self.stats.note_reuse_chain(reuses);

        attempt.advance(TailSiteState::Executing);
        attempt
    }

    fn finish_attempt(&mut self, attempt: Option<SiteAttempt>, terminal: TailSiteState) {
        if let Some(mut attempt) = attempt {
            attempt.advance(terminal);
            self.stats.record_attempt(attempt);
        }
    }

    fn call_native(
        &mut self,
        native: &NativeFunction,
        args: &[Value],
        span: Span,
    ) -> ExecResult<Value> {
        self.set_span(span);
        match (native.func)(args) {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fail(err, span)),
        }
    }

    fn check_arity(
        &self,
        function: &FunctionValue,
        got: usize,
        span: Span,
    ) -> Result<(), Unwind> {
        if function.params.len() == got {
            Ok(())
        } else {
            Err(self.fail(
                LumenError::arity(&function.name, function.params.len(), got),
                span,
            ))
        }
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    fn make_function(&mut self, decl: &FunctionDecl) -> Rc<FunctionValue> {
        let captured = match self.frames.last() {
            // Script-level declarations capture nothing; they see globals
            // dynamically.
            Some(frame) if !frame.is_script() => frame.locals.clone(),
            _ => FxHashMap::default(),
        };
        Rc::new(FunctionValue {
            name: Rc::from(decl.name.name.as_str()),
            id: decl.id,
            domain: self.current_domain(),
            unit: self.current_unit(),
            params: decl
                .params
                .iter()
                .map(|p| Rc::from(p.name.as_str()))
                .collect(),
            body: decl.body.clone().into(),
            captured,
        })
    }

    fn declare(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) if !frame.is_script() => {
                frame.locals.insert(Rc::from(name), value);
            }
            Some(frame) => {
                let domain = frame.domain;
                if let Some(realm) = self.realms.get_mut(domain.index()) {
                    realm.define(name, value);
                }
            }
            None => {}
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.frames.last_mut() {
            Some(frame) if !frame.is_script() => {
                if let Some(slot) = frame.locals.get_mut(name) {
                    *slot = value;
                    return true;
                }
                let domain = frame.domain;
                self.realms
                    .get_mut(domain.index())
                    .is_some_and(|realm| realm.assign(name, value))
            }
            Some(frame) => {
                let domain = frame.domain;
                self.realms
                    .get_mut(domain.index())
                    .is_some_and(|realm| realm.assign(name, value))
            }
            None => false,
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let frame = self.frames.last()?;
        if !frame.is_script() {
            if let Some(value) = frame.locals.get(name) {
                return Some(value.clone());
            }
        }
        self.realms.get(frame.domain.index())?.get(name)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn apply_unary(&self, op: UnaryOp, value: Value, span: Span) -> ExecResult<Value> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Neg => match value {
                Value::Int(i) => match i.checked_neg() {
                    Some(n) => Ok(Value::Int(n)),
                    None => Err(self.fail(LumenError::overflow("negation"), span)),
                },
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(self.fail(
                    LumenError::type_error(format!("cannot negate {}", other.type_name())),
                    span,
                )),
            },
        }
    }

    fn apply_binary(&self, op: BinaryOp, lhs: Value, rhs: Value, span: Span) -> ExecResult<Value> {
        use BinaryOp::*;
        match op {
            StrictEq => return Ok(Value::Bool(lhs == rhs)),
            StrictNe => return Ok(Value::Bool(lhs != rhs)),
            _ => {}
        }

        // `+` concatenates when either side is a string.
        if op == Add {
            if let Value::Str(_) = lhs {
                return Ok(Value::Str(Rc::from(format!("{}{}", lhs, rhs).as_str())));
            }
            if let Value::Str(_) = rhs {
                return Ok(Value::Str(Rc::from(format!("{}{}", lhs, rhs).as_str())));
            }
        }

        match (op, &lhs, &rhs) {
            (Add, Value::Int(a), Value::Int(b)) => match a.checked_add(*b) {
                Some(v) => Ok(Value::Int(v)),
                None => Err(self.fail(LumenError::overflow("addition"), span)),
            },
            (Sub, Value::Int(a), Value::Int(b)) => match a.checked_sub(*b) {
                Some(v) => Ok(Value::Int(v)),
                None => Err(self.fail(LumenError::overflow("subtraction"), span)),
            },
            (Mul, Value::Int(a), Value::Int(b)) => match a.checked_mul(*b) {
                Some(v) => Ok(Value::Int(v)),
                None => Err(self.fail(LumenError::overflow("multiplication"), span)),
            },
            (Div, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(self.fail(LumenError::division_by_zero(), span))
                } else {
                    match a.checked_div(*b) {
                        Some(v) => Ok(Value::Int(v)),
                        None => Err(self.fail(LumenError::overflow("division"), span)),
                    }
                }
            }
            (Mod, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(self.fail(
                        LumenError::runtime(RuntimeErrorKind::DivisionError, "modulo by zero"),
                        span,
                    ))
                } else {
                    match a.checked_rem(*b) {
                        Some(v) => Ok(Value::Int(v)),
                        None => Err(self.fail(LumenError::overflow("modulo"), span)),
                    }
                }
            }
            (Add | Sub | Mul | Div | Mod, _, _) => match (numeric(&lhs), numeric(&rhs)) {
                (Some(a), Some(b)) => Ok(Value::Float(match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    _ => a % b,
                })),
                _ => Err(self.fail(
                    LumenError::type_error(format!(
                        "cannot apply '{}' to {} and {}",
                        op,
                        lhs.type_name(),
                        rhs.type_name(),
                    )),
                    span,
                )),
            },
            (Lt | Le | Gt | Ge, _, _) => self.compare(op, &lhs, &rhs, span),
            // Equality was handled above.
            (StrictEq | StrictNe, _, _) => Ok(Value::Bool(false)),
        }
    }

    fn compare(&self, op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> ExecResult<Value> {
        use std::cmp::Ordering;
        let ordering = match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => match (numeric(lhs), numeric(rhs)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => {
                    return Err(self.fail(
                        LumenError::type_error(format!(
                            "cannot compare {} and {}",
                            lhs.type_name(),
                            rhs.type_name(),
                        )),
                        span,
                    ))
                }
            },
        };
        let result = match ordering {
            Some(ordering) => match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            },
            // NaN comparisons are all false.
            None => false,
        };
        Ok(Value::Bool(result))
    }

    // =========================================================================
    // Frame Helpers
    // =========================================================================

    fn set_span(&mut self, span: Span) {
        if let Some(frame) = self.frames.last_mut() {
            frame.current_span = span;
        }
    }

    fn current_domain(&self) -> DomainId {
        self.frames
            .last()
            .map_or(DomainId::MAIN, |frame| frame.domain)
    }

    fn current_unit(&self) -> UnitId {
        self.frames.last().map_or(UnitId(0), |frame| frame.unit)
    }

    fn realm_name(&self, domain: DomainId) -> &str {
        self.realms
            .get(domain.index())
            .map_or("<unknown>", |realm| realm.name())
    }

    /// Wrap an engine error with the raise site and the live frames.
    fn fail(&self, err: LumenError, span: Span) -> Unwind {
        Unwind::Fail(
            err.with_span(span)
                .with_traceback(self.capture_stack_trace()),
        )
    }
}

// =============================================================================
// Free Helpers
// =============================================================================

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(Rc::from(s.as_str())),
    }
}

/// Numeric view of a value for mixed int/float arithmetic.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn bind_parameters(frame: &mut CallFrame, args: ArgBuffer) {
    let params = match &frame.function {
        FrameFunction::Function(f) => Rc::clone(&f.params),
        FrameFunction::Script => return,
    };
    frame.locals.reserve(params.len());
    for (param, value) in params.iter().zip(args) {
        frame.locals.insert(Rc::clone(param), value);
    }
}

#[cold]
#[inline(never)]
fn unreachable_frame() -> ! {
    panic!("interpreter ran without a frame")
}

fn install_builtins(realm: &mut Realm, domain: DomainId) {
    realm.define(
        "print",
        Value::Native(Rc::new(NativeFunction {
            name: Rc::from("print"),
            domain,
            func: builtin_print,
        })),
    );
}

fn builtin_print(args: &[Value]) -> LumenResult<Value> {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&arg.to_string());
    }
    println!("{}", line);
    Ok(Value::Null)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_compiler::compile_default;

    fn compile(source: &str) -> ValidatedProgram {
        let result = compile_default(source);
        assert!(
            result.succeeded(),
            "compile failed: {:?}",
            result.diagnostics
        );
        result.program.unwrap()
    }

    fn run_source(source: &str) -> LumenResult<Value> {
        let mut interp = Interpreter::new(InterpreterOptions::default());
        interp.run(&compile(source))
    }

    fn run_value(source: &str) -> Value {
        run_source(source).unwrap()
    }

    fn error_kind(err: &LumenError) -> RuntimeErrorKind {
        match err {
            LumenError::RuntimeError { kind, .. } => *kind,
            other => panic!("expected runtime error, got {other}"),
        }
    }

    // =========================================================================
    // Expression Semantics
    // =========================================================================

    #[test]
    fn test_arithmetic() {
        assert_eq!(run_value("1 + 2 * 3;"), Value::Int(7));
        assert_eq!(run_value("7 / 2;"), Value::Int(3));
        assert_eq!(run_value("7.0 / 2;"), Value::Float(3.5));
        assert_eq!(run_value("7 % 3;"), Value::Int(1));
        assert_eq!(run_value("-(2 + 3);"), Value::Int(-5));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_value("\"a\" + 1;"), Value::Str(Rc::from("a1")));
        assert_eq!(run_value("1 + \"a\";"), Value::Str(Rc::from("1a")));
        assert_eq!(
            run_value("\"x\" + null;"),
            Value::Str(Rc::from("xnull"))
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = run_source("1 / 0;").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::DivisionError);

        let err = run_source("1 % 0;").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::DivisionError);

        // Float division follows IEEE instead of raising.
        assert_eq!(run_value("1.0 / 0.0;"), Value::Float(f64::INFINITY));
    }

    #[test]
    fn test_integer_overflow() {
        let err = run_source("9223372036854775807 + 1;").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::OverflowError);
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(run_value("1 === 1;"), Value::Bool(true));
        assert_eq!(run_value("1 === 1.0;"), Value::Bool(false));
        assert_eq!(run_value("\"a\" !== \"b\";"), Value::Bool(true));
        assert_eq!(run_value("null === null;"), Value::Bool(true));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(run_value("0 || 5;"), Value::Int(5));
        assert_eq!(run_value("3 || 5;"), Value::Int(3));
        assert_eq!(run_value("0 && 5;"), Value::Int(0));
        assert_eq!(run_value("1 && 5;"), Value::Int(5));
    }

    #[test]
    fn test_ternary() {
        assert_eq!(run_value("1 < 2 ? \"yes\" : \"no\";"), Value::Str(Rc::from("yes")));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run_value("2 <= 2;"), Value::Bool(true));
        assert_eq!(run_value("2 < 1.5;"), Value::Bool(false));
        assert_eq!(run_value("\"abc\" < \"abd\";"), Value::Bool(true));
        let err = run_source("1 < \"a\";").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::TypeError);
    }

    // =========================================================================
    // Statements and Bindings
    // =========================================================================

    #[test]
    fn test_let_and_assignment() {
        assert_eq!(run_value("let x = 2; x = x + 3; x;"), Value::Int(5));
        assert_eq!(run_value("let y; y;"), Value::Null);
    }

    #[test]
    fn test_assignment_requires_declaration() {
        let err = run_source("ghost = 1;").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::ReferenceError);
    }

    #[test]
    fn test_unknown_name() {
        let err = run_source("missing;").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::ReferenceError);
        assert!(err.message().contains("'missing' is not defined"));
    }

    #[test]
    fn test_while_loop() {
        let source = "
            let n = 0;
            let total = 0;
            while (n < 5) {
                n = n + 1;
                if (n === 3) { continue; }
                if (n === 5) { break; }
                total = total + n;
            }
            total;
        ";
        // 1 + 2 + 4
        assert_eq!(run_value(source), Value::Int(7));
    }

    #[test]
    fn test_function_call_and_arity() {
        assert_eq!(
            run_value("function add(a, b) { return a + b; } add(2, 3);"),
            Value::Int(5)
        );
        let err = run_source("function f(a) { return a; } f();").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::ArityError);
        assert!(err.message().contains("f() expects 1 argument, got 0"));
    }

    #[test]
    fn test_falling_off_the_end_returns_null() {
        assert_eq!(run_value("function f() { } f();"), Value::Null);
    }

    #[test]
    fn test_closures_capture_by_value() {
        let source = "
            function outer() {
                let x = 10;
                function inner() { return x; }
                x = 20;
                return inner();
            }
            outer();
        ";
        // The snapshot was taken when `inner` was declared.
        assert_eq!(run_value(source), Value::Int(10));
    }

    #[test]
    fn test_calling_a_non_function() {
        let err = run_source("let x = 3; x();").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::TypeError);
        assert!(err.message().contains("int is not callable"));
    }

    // =========================================================================
    // Exceptions
    // =========================================================================

    #[test]
    fn test_throw_and_catch_binds_value() {
        assert_eq!(
            run_value("let r = 0; try { throw 42; } catch (e) { r = e; } r;"),
            Value::Int(42)
        );
    }

    #[test]
    fn test_catch_binds_engine_error_message() {
        let source = "let m = null; try { nope(); } catch (e) { m = e; } m;";
        let Value::Str(message) = run_value(source) else {
            panic!("expected string");
        };
        assert_eq!(&*message, "ReferenceError: 'nope' is not defined");
    }

    #[test]
    fn test_finally_runs_on_both_paths() {
        assert_eq!(
            run_value("let log = 0; try { log = 1; } finally { log = log + 10; } log;"),
            Value::Int(11)
        );
        let source = "
            let log = 0;
            try {
                try { throw 1; } finally { log = 5; }
            } catch (e) {
                log = log + e;
            }
            log;
        ";
        assert_eq!(run_value(source), Value::Int(6));
    }

    #[test]
    fn test_finally_overrides_return() {
        let source = "
            function f() {
                try { return 1; } finally { return 2; }
            }
            f();
        ";
        assert_eq!(run_value(source), Value::Int(2));
    }

    #[test]
    fn test_uncaught_throw_reports_value() {
        let err = run_source("throw \"kaboom\";").unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::Thrown);
        assert_eq!(err.message(), "kaboom");
    }

    // =========================================================================
    // Tail Calls: Frame Reuse
    // =========================================================================

    #[test]
    fn test_marked_self_recursion_runs_in_constant_frames() {
        let source = "
            function f(n) {
                if (n === 0) { return 0; }
                return continue f(n - 1);
            }
            f(100000);
        ";
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let value = interp.run(&compile(source)).unwrap();

        assert_eq!(value, Value::Int(0));
        // Script frame plus the single reused frame.
        assert_eq!(interp.stats().max_frame_depth, 2);
        assert_eq!(interp.stats().frames_reused, 100_000);
        assert_eq!(interp.stats().max_reuse_chain, 100_000);
        assert!(interp.drain_warnings().is_empty());
    }

    #[test]
    fn test_unmarked_recursion_overflows() {
        let source = "
            function f(n) {
                if (n === 0) { return 0; }
                return f(n - 1);
            }
            f(100000);
        ";
        let err = run_source(source).unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::StackOverflow);
    }

    #[test]
    fn test_marked_mutual_recursion() {
        let source = "
            function isEven(n) {
                if (n === 0) { return true; }
                return continue isOdd(n - 1);
            }
            function isOdd(n) {
                if (n === 0) { return false; }
                return continue isEven(n - 1);
            }
            isEven(50001);
        ";
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let value = interp.run(&compile(source)).unwrap();
        assert_eq!(value, Value::Bool(false));
        assert_eq!(interp.stats().max_frame_depth, 2);
    }

    #[test]
    fn test_marked_call_in_ternary_arm() {
        let source = "
            function f(n, acc) {
                return n === 0 ? acc : continue f(n - 1, acc + n);
            }
            f(100000, 0);
        ";
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let value = interp.run(&compile(source)).unwrap();
        assert_eq!(value, Value::Int(5_000_050_000));
        assert_eq!(interp.stats().max_frame_depth, 2);
    }

    #[test]
    fn test_script_level_marked_return() {
        let source = "
            function f(n) {
                if (n === 0) { return \"done\"; }
                return continue f(n - 1);
            }
            return continue f(10);
        ";
        assert_eq!(run_value(source), Value::Str(Rc::from("done")));
    }

    #[test]
    fn test_reuse_path_state_trace() {
        let source = "
            function f(n) {
                if (n === 0) { return 0; }
                return continue f(n - 1);
            }
            f(1);
        ";
        let mut interp = Interpreter::new(InterpreterOptions::default());
        interp.run(&compile(source)).unwrap();

        use TailSiteState::*;
        let trace = interp.stats().trace_for(lumen_parser::CallSiteId(0)).unwrap();
        assert_eq!(
            trace,
            &[
                Init,
                ArgsEvaluating,
                ArgsEvaluated,
                BoundaryChecked,
                FrameReused,
                Executing,
                Returned,
            ]
        );
    }

    #[test]
    fn test_trace_after_chain_contains_only_live_frames() {
        let source = "
            function f(n) {
                if (n === 0) { throw \"bottom\"; }
                return continue f(n - 1);
            }
            f(500);
        ";
        let err = run_source(source).unwrap_err();
        let tb = err.traceback().unwrap();

        // One reused frame plus the script frame; the 499 elided activations
        // of `f` never appear.
        assert_eq!(tb.len(), 2);
        assert_eq!(tb.frames[0].function, "f");
        assert_eq!(tb.frames[1].function, "<script>");
    }

    #[test]
    fn test_stack_trace_is_empty_after_run() {
        let mut interp = Interpreter::new(InterpreterOptions::default());
        interp.run(&compile("1 + 1;")).unwrap();
        assert!(interp.capture_stack_trace().is_empty());
    }

    // =========================================================================
    // Tail Calls: Argument Evaluation
    // =========================================================================

    #[test]
    fn test_argument_throw_keeps_caller_frame_in_trace() {
        let source = "
            function boom() { throw \"early\"; }
            function f(n) {
                return continue f(boom());
            }
            f(1);
        ";
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let err = interp.run(&compile(source)).unwrap_err();

        // The throw happened before any frame was reused, so the caller `f`
        // is still live and traced.
        let tb = err.traceback().unwrap();
        assert!(tb.contains_function("boom"));
        assert!(tb.contains_function("f"));
        assert!(tb.contains_function("<script>"));

        assert_eq!(interp.stats().args_threw, 1);
        use TailSiteState::*;
        let trace = interp.stats().trace_for(lumen_parser::CallSiteId(0)).unwrap();
        assert_eq!(trace, &[Init, ArgsEvaluating, Threw]);
    }

    #[test]
    fn test_arguments_evaluate_left_to_right() {
        let source = "
            let log = \"\";
            function note(tag, v) { log = log + tag; return v; }
            function pair(a, b) { return a + b; }
            function f() { return continue pair(note(\"L\", 1), note(\"R\", 2)); }
            f();
            log;
        ";
        assert_eq!(run_value(source), Value::Str(Rc::from("LR")));
    }

    #[test]
    fn test_marked_callee_arity_error() {
        let source = "
            function g(a, b) { return a; }
            function f() { return continue g(1); }
            f();
        ";
        let err = run_source(source).unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::ArityError);
    }

    #[test]
    fn test_marked_non_callable_target() {
        let source = "
            let g = 7;
            function f() { return continue g(); }
            f();
        ";
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let err = interp.run(&compile(source)).unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::TypeError);

        use TailSiteState::*;
        let trace = interp.stats().trace_for(lumen_parser::CallSiteId(0)).unwrap();
        assert_eq!(*trace.last().unwrap(), Threw);
        assert_eq!(trace[2], ArgsEvaluated);
    }

    #[test]
    fn test_marked_call_to_native_takes_ordinary_path() {
        let source = "function f() { return continue print(\"hi\"); } f();";
        let mut interp = Interpreter::new(InterpreterOptions::default());
        let value = interp.run(&compile(source)).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(interp.stats().frames_grown, 1);
        assert_eq!(interp.stats().frames_reused, 0);
        // Same-realm native target: nothing was promised, nothing warned.
        assert!(interp.drain_warnings().is_empty());
    }

    // =========================================================================
    // Cross-Realm Boundaries
    // =========================================================================

    fn cross_realm_interp(policy: BoundaryPolicy) -> (Interpreter, ValidatedProgram) {
        let options = InterpreterOptions {
            boundary_policy: policy,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::new(options);
        let plugin = interp.create_realm("plugin");

        let library = compile("function g(n) { return n * 2; }");
        interp.run_in_realm(&library, plugin).unwrap();
        let g = interp.global(plugin, "g").unwrap();
        interp.define_global(DomainId::MAIN, "g", g);

        let main = compile(
            "
            function f(n) { return continue g(n); }
            f(21);
            f(2);
        ",
        );
        (interp, main)
    }

    #[test]
    fn test_cross_realm_warn_grows_one_frame_and_warns_once() {
        let (mut interp, main) = cross_realm_interp(BoundaryPolicy::Warn);
        let value = interp.run(&main).unwrap();
        assert_eq!(value, Value::Int(4));

        // Two executions of the same site, one warning.
        let warnings = interp.drain_warnings();
        assert_eq!(warnings.len(), 1);
        let diags = warnings.in_source_order();
        assert_eq!(diags[0].rule, RuleId::CrossBoundaryCall);
        assert!(diags[0].message.contains("'main' into realm 'plugin'"));

        // Script, f, and the one extra frame for g.
        assert_eq!(interp.stats().max_frame_depth, 3);
        assert_eq!(interp.stats().frames_grown, 2);
        assert_eq!(interp.stats().frames_reused, 0);
    }

    #[test]
    fn test_cross_realm_error_policy_aborts() {
        let (mut interp, main) = cross_realm_interp(BoundaryPolicy::ErrorAtRuntime);
        let err = interp.run(&main).unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::BoundaryError);
        assert!(err.message().contains("from realm 'main' into realm 'plugin'"));

        use TailSiteState::*;
        let trace = interp.stats().trace_for(lumen_parser::CallSiteId(0)).unwrap();
        assert_eq!(
            trace,
            &[Init, ArgsEvaluating, ArgsEvaluated, BoundaryChecked, Aborted]
        );
        assert_eq!(interp.stats().sites_aborted, 1);
    }

    #[test]
    fn test_cross_realm_allow_reuse_with_host_support() {
        let host = Arc::new(crate::guard::MembraneHostTable::new());
        host.allow(DomainId::MAIN, DomainId(1));

        let options = InterpreterOptions {
            boundary_policy: BoundaryPolicy::AllowReuse,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::with_host(options, host);
        let plugin = interp.create_realm("plugin");

        let library = compile(
            "
            function g(n) {
                if (n === 0) { return \"plugin-done\"; }
                return continue g(n - 1);
            }
        ",
        );
        interp.run_in_realm(&library, plugin).unwrap();
        let g = interp.global(plugin, "g").unwrap();
        interp.define_global(DomainId::MAIN, "g", g);

        let main = compile("function f(n) { return continue g(n); } f(50000);");
        let value = interp.run(&main).unwrap();

        assert_eq!(value, Value::Str(Rc::from("plugin-done")));
        // The crossing reused frames: no growth, no warnings.
        assert_eq!(interp.stats().max_frame_depth, 2);
        assert_eq!(interp.stats().frames_grown, 0);
        assert!(interp.drain_warnings().is_empty());
    }

    #[test]
    fn test_cross_realm_allow_reuse_without_host_degrades_to_warn() {
        let (mut interp, main) = cross_realm_interp(BoundaryPolicy::AllowReuse);
        let value = interp.run(&main).unwrap();
        assert_eq!(value, Value::Int(4));
        // Never a silent ordinary call.
        assert_eq!(interp.drain_warnings().len(), 1);
        assert_eq!(interp.stats().frames_grown, 2);
    }

    #[test]
    fn test_cross_realm_frames_annotated_in_trace() {
        let options = InterpreterOptions {
            boundary_policy: BoundaryPolicy::Warn,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::new(options);
        let plugin = interp.create_realm("plugin");

        let library = compile("function g() { throw \"inside plugin\"; }");
        interp.run_in_realm(&library, plugin).unwrap();
        let g = interp.global(plugin, "g").unwrap();
        interp.define_global(DomainId::MAIN, "g", g);

        let err = interp.run(&compile("g();")).unwrap_err();
        let tb = err.traceback().unwrap();
        assert_eq!(tb.frames[0].function, "g");
        assert_eq!(tb.frames[0].realm.as_deref(), Some("plugin"));
        assert_eq!(tb.frames[1].realm, None);
    }

    // =========================================================================
    // Optimizer Toggle
    // =========================================================================

    #[test]
    fn test_disabled_optimizer_grows_and_warns_once() {
        let options = InterpreterOptions {
            tco_enabled: false,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::new(options);

        let source = "
            function f(n) {
                if (n === 0) { return 0; }
                return continue f(n - 1);
            }
            f(20);
        ";
        let value = interp.run(&compile(source)).unwrap();
        assert_eq!(value, Value::Int(0));

        // Every attempt grew the stack, and the site warned exactly once.
        assert_eq!(interp.stats().frames_grown, 20);
        assert_eq!(interp.stats().frames_reused, 0);
        let warnings = interp.drain_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings.in_source_order()[0]
            .message
            .contains("tail call optimization is disabled"));
    }

    #[test]
    fn test_disabled_optimizer_still_overflows_on_deep_chains() {
        let options = InterpreterOptions {
            tco_enabled: false,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::new(options);
        let source = "
            function f(n) {
                if (n === 0) { return 0; }
                return continue f(n - 1);
            }
            f(100000);
        ";
        let err = interp.run(&compile(source)).unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::StackOverflow);
    }

    // =========================================================================
    // Depth Limit
    // =========================================================================

    #[test]
    fn test_max_frames_is_configurable() {
        let options = InterpreterOptions {
            max_frames: 10,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::new(options);
        let source = "
            function f(n) {
                if (n === 0) { return 0; }
                return f(n - 1);
            }
            f(50);
        ";
        let err = interp.run(&compile(source)).unwrap_err();
        assert_eq!(error_kind(&err), RuntimeErrorKind::StackOverflow);
        assert!(err.message().contains("10 frames"));
    }
}
