//! Engine error type and runtime tracebacks.
//!
//! Compile-stage failures carry a span into the source; runtime failures
//! additionally carry a [`Traceback`] of the frames that were live when the
//! error was raised. Frames elided by tail-call reuse never appear in a
//! traceback: the trace reflects the real frame stack, not the logical call
//! history.

use crate::span::Span;
use std::fmt;

/// Result alias used across the engine.
pub type LumenResult<T> = Result<T, LumenError>;

// =============================================================================
// Tracebacks
// =============================================================================

/// One live frame captured at the moment an error was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Name of the function executing in this frame.
    pub function: String,
    /// Span of the statement or expression the frame was executing.
    pub span: Span,
    /// Realm the frame's function belongs to, when it differs from the
    /// entry realm.
    pub realm: Option<String>,
}

/// Captured stack trace, innermost frame first.
///
/// Contains only frames that were live at capture time. A frame released by
/// tail-call reuse is absent by design.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Traceback {
    /// Captured frames, innermost first.
    pub frames: Vec<TraceFrame>,
}

impl Traceback {
    /// An empty traceback.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self { frames: Vec::new() }
    }

    /// Number of captured frames.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frames were captured.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether any captured frame belongs to the named function.
    #[must_use]
    pub fn contains_function(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.function == name)
    }
}

// =============================================================================
// Runtime Error Kinds
// =============================================================================

/// Classification of runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    /// Operation applied to operands of the wrong type.
    TypeError,
    /// Unresolved variable or function name.
    ReferenceError,
    /// Call with the wrong number of arguments.
    ArityError,
    /// Integer division or modulo by zero.
    DivisionError,
    /// Integer arithmetic left the 64-bit range.
    OverflowError,
    /// Ordinary call stack exceeded its depth limit.
    StackOverflow,
    /// Tail-call site aborted by an `ErrorAtRuntime` boundary policy.
    BoundaryError,
    /// A value raised by a `throw` statement that nothing caught.
    Thrown,
}

impl RuntimeErrorKind {
    /// Display name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TypeError => "TypeError",
            Self::ReferenceError => "ReferenceError",
            Self::ArityError => "ArityError",
            Self::DivisionError => "DivisionError",
            Self::OverflowError => "OverflowError",
            Self::StackOverflow => "StackOverflow",
            Self::BoundaryError => "BoundaryError",
            Self::Thrown => "Uncaught",
        }
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Engine Error
// =============================================================================

/// Error raised by any stage of the Lumen pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum LumenError {
    /// Lexical error: malformed token.
    LexError {
        /// Description of the problem.
        message: String,
        /// Location of the offending text.
        span: Span,
    },
    /// Parse error, including marker misuse caught by the recognizer.
    SyntaxError {
        /// Description of the problem.
        message: String,
        /// Location of the offending construct.
        span: Span,
    },
    /// Error raised while a program was executing.
    RuntimeError {
        /// Classification of the failure.
        kind: RuntimeErrorKind,
        /// Description of the failure.
        message: String,
        /// Location of the expression that raised, when known.
        span: Option<Span>,
        /// Live frames at the moment of the raise, innermost first.
        traceback: Traceback,
    },
    /// Engine invariant violation. Never raised by well-formed input.
    InternalError {
        /// Description of the violated invariant.
        message: String,
    },
}

impl LumenError {
    /// Lexical error at `span`.
    #[must_use]
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self::LexError {
            message: message.into(),
            span,
        }
    }

    /// Syntax error at `span`.
    #[must_use]
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span,
        }
    }

    /// Runtime error with no location attached yet.
    #[must_use]
    pub fn runtime(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self::RuntimeError {
            kind,
            message: message.into(),
            span: None,
            traceback: Traceback::empty(),
        }
    }

    /// Type error shorthand.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::TypeError, message)
    }

    /// Reference error shorthand for an unresolved name.
    #[must_use]
    pub fn reference(name: &str) -> Self {
        Self::runtime(
            RuntimeErrorKind::ReferenceError,
            format!("'{}' is not defined", name),
        )
    }

    /// Arity error shorthand.
    #[must_use]
    pub fn arity(function: &str, expected: usize, got: usize) -> Self {
        Self::runtime(
            RuntimeErrorKind::ArityError,
            format!(
                "{}() expects {} argument{}, got {}",
                function,
                expected,
                if expected == 1 { "" } else { "s" },
                got
            ),
        )
    }

    /// Division-by-zero shorthand.
    #[must_use]
    pub fn division_by_zero() -> Self {
        Self::runtime(RuntimeErrorKind::DivisionError, "division by zero")
    }

    /// Integer-overflow shorthand. `operation` names the arithmetic step,
    /// e.g. `"addition"`.
    #[must_use]
    pub fn overflow(operation: &str) -> Self {
        Self::runtime(
            RuntimeErrorKind::OverflowError,
            format!("integer overflow in {}", operation),
        )
    }

    /// Stack overflow at the ordinary-call depth limit.
    #[must_use]
    pub fn stack_overflow(max_depth: usize) -> Self {
        Self::runtime(
            RuntimeErrorKind::StackOverflow,
            format!("call stack exceeded {} frames", max_depth),
        )
    }

    /// Internal invariant violation.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Attach a source span. Only runtime errors accept one after
    /// construction; other variants carry theirs from birth.
    #[must_use]
    pub fn with_span(mut self, at: Span) -> Self {
        if let Self::RuntimeError { span, .. } = &mut self {
            *span = Some(at);
        }
        self
    }

    /// Attach a captured traceback to a runtime error.
    #[must_use]
    pub fn with_traceback(mut self, tb: Traceback) -> Self {
        if let Self::RuntimeError { traceback, .. } = &mut self {
            *traceback = tb;
        }
        self
    }

    /// Span associated with the error, if any.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::LexError { span, .. } | Self::SyntaxError { span, .. } => Some(*span),
            Self::RuntimeError { span, .. } => *span,
            Self::InternalError { .. } => None,
        }
    }

    /// Traceback attached to the error, if it is a runtime error.
    #[must_use]
    pub fn traceback(&self) -> Option<&Traceback> {
        match self {
            Self::RuntimeError { traceback, .. } => Some(traceback),
            _ => None,
        }
    }

    /// Message text without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::LexError { message, .. }
            | Self::SyntaxError { message, .. }
            | Self::RuntimeError { message, .. }
            | Self::InternalError { message } => message,
        }
    }
}

impl fmt::Display for LumenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LexError { message, .. } | Self::SyntaxError { message, .. } => {
                write!(f, "SyntaxError: {}", message)
            }
            Self::RuntimeError { kind, message, .. } => {
                write!(f, "{}: {}", kind, message)
            }
            Self::InternalError { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for LumenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = LumenError::syntax("unexpected token", Span::new(4, 5));
        assert_eq!(format!("{}", err), "SyntaxError: unexpected token");
        assert_eq!(err.span(), Some(Span::new(4, 5)));
    }

    #[test]
    fn test_runtime_error_builders() {
        let err = LumenError::type_error("cannot call an int")
            .with_span(Span::new(10, 14))
            .with_traceback(Traceback {
                frames: vec![TraceFrame {
                    function: "main".to_string(),
                    span: Span::new(10, 14),
                    realm: None,
                }],
            });

        assert_eq!(err.span(), Some(Span::new(10, 14)));
        let tb = err.traceback().unwrap();
        assert_eq!(tb.len(), 1);
        assert!(tb.contains_function("main"));
        assert_eq!(format!("{}", err), "TypeError: cannot call an int");
    }

    #[test]
    fn test_reference_error_message() {
        let err = LumenError::reference("ghost");
        assert_eq!(format!("{}", err), "ReferenceError: 'ghost' is not defined");
    }

    #[test]
    fn test_arity_error_pluralization() {
        let one = LumenError::arity("f", 1, 3);
        let many = LumenError::arity("g", 2, 0);
        assert_eq!(format!("{}", one), "ArityError: f() expects 1 argument, got 3");
        assert_eq!(format!("{}", many), "ArityError: g() expects 2 arguments, got 0");
    }

    #[test]
    fn test_stack_overflow_names_limit() {
        let err = LumenError::stack_overflow(1000);
        assert_eq!(
            format!("{}", err),
            "StackOverflow: call stack exceeded 1000 frames"
        );
    }

    #[test]
    fn test_with_span_ignores_compile_errors() {
        let err = LumenError::syntax("bad", Span::new(1, 2)).with_span(Span::new(7, 8));
        // Syntax errors keep their original span.
        assert_eq!(err.span(), Some(Span::new(1, 2)));
    }

    #[test]
    fn test_thrown_kind_display() {
        let err = LumenError::runtime(RuntimeErrorKind::Thrown, "kaboom");
        assert_eq!(format!("{}", err), "Uncaught: kaboom");
    }

    #[test]
    fn test_traceback_contains_function() {
        let tb = Traceback {
            frames: vec![
                TraceFrame {
                    function: "inner".to_string(),
                    span: Span::dummy(),
                    realm: None,
                },
                TraceFrame {
                    function: "outer".to_string(),
                    span: Span::dummy(),
                    realm: Some("sandbox".to_string()),
                },
            ],
        };
        assert!(tb.contains_function("inner"));
        assert!(tb.contains_function("outer"));
        assert!(!tb.contains_function("elided"));
        assert_eq!(tb.len(), 2);
    }
}
