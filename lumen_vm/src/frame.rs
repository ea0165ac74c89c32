//! Call frames and the pending-call record used by the trampoline.

use crate::realm::{DomainId, UnitId};
use crate::site::SiteAttempt;
use crate::value::{FunctionValue, Value};
use lumen_core::Span;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::Rc;

/// Argument buffer. Calls rarely pass more than eight arguments; keeping the
/// common case inline avoids an allocation per call.
pub type ArgBuffer = SmallVec<[Value; 8]>;

// =============================================================================
// Call Frames
// =============================================================================

/// Owner of a frame: the script body or a function value.
#[derive(Debug)]
pub enum FrameFunction {
    /// The top-level script frame.
    Script,
    /// A frame executing the given function.
    Function(Rc<FunctionValue>),
}

/// One activation on the interpreter's frame stack.
///
/// Frame-count invariant: a chain of N consecutive validated tail calls
/// leaves the number of live frames unchanged; only `reuse_count` grows.
#[derive(Debug)]
pub struct CallFrame {
    /// What the frame is executing.
    pub function: FrameFunction,
    /// Local bindings. For the script frame this map stays empty; script
    /// bindings live in the realm's globals.
    pub locals: FxHashMap<Rc<str>, Value>,
    /// Index of the calling frame on the stack, if any.
    pub caller: Option<u32>,
    /// Domain the frame executes in. Follows the function's declaring realm,
    /// not the caller's.
    pub domain: DomainId,
    /// Program unit the running code came from.
    pub unit: UnitId,
    /// Span of the statement or call currently executing, kept fresh for
    /// stack traces.
    pub current_span: Span,
    /// How many validated tail calls have reused this frame slot.
    pub reuse_count: u32,
}

impl CallFrame {
    /// Depth limit for ordinary, stack-growing calls. Marked tail calls do
    /// not count against it; a validated chain runs at constant depth.
    pub const MAX_FRAME_DEPTH: usize = 1000;

    /// Frame for a script body executing in `domain`.
    #[must_use]
    pub fn script(domain: DomainId, unit: UnitId) -> Self {
        Self {
            function: FrameFunction::Script,
            locals: FxHashMap::default(),
            caller: None,
            domain,
            unit,
            current_span: Span::dummy(),
            reuse_count: 0,
        }
    }

    /// Frame for a function call. Locals start as the function's captured
    /// snapshot; the interpreter binds parameters on top.
    #[must_use]
    pub fn for_call(function: Rc<FunctionValue>, caller: Option<u32>, call_span: Span) -> Self {
        Self {
            locals: function.captured.clone(),
            caller,
            domain: function.domain,
            unit: function.unit,
            current_span: call_span,
            reuse_count: 0,
            function: FrameFunction::Function(function),
        }
    }

    /// Name shown in stack traces.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.function {
            FrameFunction::Script => "<script>",
            FrameFunction::Function(f) => &f.name,
        }
    }

    /// Whether this is the top-level script frame.
    #[inline]
    #[must_use]
    pub const fn is_script(&self) -> bool {
        matches!(self.function, FrameFunction::Script)
    }
}

// =============================================================================
// Pending Calls
// =============================================================================

/// A validated tail call whose arguments have been fully evaluated and whose
/// boundary check passed, waiting for the function-execution loop to swap it
/// into the current frame slot.
///
/// By the time a `PendingCall` exists, every observable side effect of the
/// call setup has happened; installing it into the frame is pure bookkeeping
/// with no suspension point.
#[derive(Debug)]
pub struct PendingCall {
    /// Call target.
    pub function: Rc<FunctionValue>,
    /// Evaluated arguments, left to right.
    pub args: ArgBuffer,
    /// Span of the marked call expression.
    pub span: Span,
    /// Lifecycle record for the site, already advanced to `FrameReused`.
    pub attempt: SiteAttempt,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_function() -> Rc<FunctionValue> {
        let mut captured = FxHashMap::default();
        captured.insert(Rc::from("seen"), Value::Int(9));
        Rc::new(FunctionValue {
            name: Rc::from("f"),
            id: lumen_parser::FunctionId::SCRIPT,
            domain: DomainId(2),
            unit: UnitId(1),
            params: Rc::from([Rc::from("n")]),
            body: Rc::from([]),
            captured,
        })
    }

    #[test]
    fn test_script_frame_shape() {
        let frame = CallFrame::script(DomainId::MAIN, UnitId(0));
        assert!(frame.is_script());
        assert_eq!(frame.name(), "<script>");
        assert_eq!(frame.caller, None);
        assert_eq!(frame.reuse_count, 0);
    }

    #[test]
    fn test_call_frame_starts_from_captured_snapshot() {
        let frame = CallFrame::for_call(sample_function(), Some(0), Span::new(5, 9));
        assert!(!frame.is_script());
        assert_eq!(frame.name(), "f");
        assert_eq!(frame.domain, DomainId(2));
        assert_eq!(frame.unit, UnitId(1));
        assert_eq!(frame.locals.get("seen"), Some(&Value::Int(9)));
        assert_eq!(frame.caller, Some(0));
        assert_eq!(frame.current_span, Span::new(5, 9));
    }

    #[test]
    fn test_depth_limit_is_fixed() {
        assert_eq!(CallFrame::MAX_FRAME_DEPTH, 1000);
    }
}
