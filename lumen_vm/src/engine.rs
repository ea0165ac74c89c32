//! One-stop execution facade.
//!
//! The engine owns a persistent [`Interpreter`] and strings the phases
//! together for a host that just wants to run source text: compile, refuse
//! to execute when any diagnostic is an error, run, and collect the runtime
//! warnings that accumulated. A REPL holds one engine and feeds it lines;
//! globals, realms and the warn-once registry carry over between calls.

use crate::guard::HostBoundaryContract;
use crate::interpreter::{Interpreter, InterpreterOptions};
use crate::value::Value;
use lumen_compiler::{compile, CompileOptions, Compilation};
use lumen_core::{BoundaryPolicy, DiagnosticList, LumenResult};
use lumen_parser::MarkerGrammar;
use rustc_hash::FxHashSet;
use std::sync::Arc;

// =============================================================================
// Configuration
// =============================================================================

/// Everything a host can tune about an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Marker grammar for the parser.
    pub grammar: MarkerGrammar,
    /// Policy for tail calls that cross realm boundaries.
    pub boundary_policy: BoundaryPolicy,
    /// Ordinary-call depth limit.
    pub max_frames: usize,
    /// Whether validated tail sites may reuse frames.
    pub tco_enabled: bool,
    /// Names the host declares as resolving outside the program's realm,
    /// used for compile-time advisories.
    pub foreign_callees: FxHashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let interp = InterpreterOptions::default();
        Self {
            grammar: MarkerGrammar::default(),
            boundary_policy: interp.boundary_policy,
            max_frames: interp.max_frames,
            tco_enabled: interp.tco_enabled,
            foreign_callees: FxHashSet::default(),
        }
    }
}

impl EngineConfig {
    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            grammar: self.grammar,
            boundary_policy: self.boundary_policy,
            foreign_callees: self.foreign_callees.clone(),
        }
    }

    fn interpreter_options(&self) -> InterpreterOptions {
        InterpreterOptions {
            boundary_policy: self.boundary_policy,
            max_frames: self.max_frames,
            tco_enabled: self.tco_enabled,
        }
    }
}

// =============================================================================
// Execution Report
// =============================================================================

/// Everything one [`Engine::execute`] call produced.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Parse and validation diagnostics, errors and warnings alike.
    pub compile_diagnostics: DiagnosticList,
    /// Run result; `None` when compile errors blocked execution.
    pub outcome: Option<LumenResult<Value>>,
    /// Warnings the runtime emitted during this call.
    pub runtime_warnings: DiagnosticList,
}

impl ExecutionReport {
    /// Whether compile errors prevented the program from running.
    #[inline]
    #[must_use]
    pub fn blocked(&self) -> bool {
        self.outcome.is_none()
    }

    /// The produced value, if the program ran and finished cleanly.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().and_then(|r| r.as_ref().ok())
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Compile-and-run driver around a persistent interpreter.
pub struct Engine {
    config: EngineConfig,
    interpreter: Interpreter,
}

impl Engine {
    /// Engine with the default host contract.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let interpreter = Interpreter::new(config.interpreter_options());
        Self {
            config,
            interpreter,
        }
    }

    /// Engine with a caller-provided host contract.
    #[must_use]
    pub fn with_host(config: EngineConfig, host: Arc<dyn HostBoundaryContract>) -> Self {
        let interpreter = Interpreter::with_host(config.interpreter_options(), host);
        Self {
            config,
            interpreter,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying interpreter.
    #[must_use]
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Mutable access for realm setup and global wiring.
    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Compile without running. Used by syntax-check mode.
    #[must_use]
    pub fn check(&self, source: &str) -> Compilation {
        compile(source, &self.config.compile_options())
    }

    /// Compile `source` and, if no diagnostic is an error, run it in the
    /// main realm of the persistent interpreter.
    pub fn execute(&mut self, source: &str) -> ExecutionReport {
        let compilation = compile(source, &self.config.compile_options());
        let mut report = ExecutionReport {
            compile_diagnostics: compilation.diagnostics,
            outcome: None,
            runtime_warnings: DiagnosticList::default(),
        };
        let Some(program) = compilation.program else {
            return report;
        };
        report.outcome = Some(self.interpreter.run(&program));
        report.runtime_warnings = self.interpreter.drain_warnings();
        report
    }
}

// =============================================================================
// Tests
// =============================================================================
