//! Error formatting and exit code handling.
//!
//! Formats [`LumenError`] for stderr and maps it to a process exit code.
//! Codes are plain `u8` internally so they stay comparable in tests; `main`
//! converts to [`std::process::ExitCode`] exactly once.

use crate::diagnostics;
use lumen_core::{LumenError, RuntimeErrorKind, SourceMap};

// =============================================================================
// Exit Codes
// =============================================================================

/// Successful execution.
pub const EXIT_SUCCESS: u8 = 0;
/// Compile error or unhandled runtime error.
pub const EXIT_ERROR: u8 = 1;
/// Command-line usage error (bad flags, bad flag values).
pub const EXIT_USAGE_ERROR: u8 = 2;
/// Engine invariant violation (should never happen).
pub const EXIT_INTERNAL_ERROR: u8 = 120;

// =============================================================================
// Error Formatting
// =============================================================================

/// Format a `LumenError` to stderr and return the exit code for it.
///
/// Pass the source map when the whole program came from one source (script,
/// `-c`, stdin); pass `None` in the REPL, where traceback frames may refer
/// to lines other than the current one.
pub fn report_error(error: &LumenError, map: Option<&SourceMap>) -> u8 {
    eprint!("{}", format_error_string(error, map));
    exit_code_for_error(error)
}

/// Format a `LumenError` into a string (for testing).
pub fn format_error_string(error: &LumenError, map: Option<&SourceMap>) -> String {
    match error {
        LumenError::LexError { span, .. } | LumenError::SyntaxError { span, .. } => {
            // `error` displays as `SyntaxError: <message>`.
            match map {
                Some(map) => {
                    format!("{}\n{}", error, diagnostics::render_source_context(map, *span))
                }
                None => format!("{}\n", error),
            }
        }

        LumenError::RuntimeError {
            kind, traceback, ..
        } => {
            // `Thrown` already displays as `Uncaught: <value>`; every other
            // kind needs the prefix added.
            let headline = if *kind == RuntimeErrorKind::Thrown {
                format!("{}", error)
            } else {
                format!("Uncaught {}", error)
            };
            format!("{}\n{}", headline, diagnostics::render_trace(traceback, map))
        }

        LumenError::InternalError { .. } => format!("{}\n", error),
    }
}

/// Map a `LumenError` to its exit code.
#[inline]
fn exit_code_for_error(error: &LumenError) -> u8 {
    match error {
        LumenError::InternalError { .. } => EXIT_INTERNAL_ERROR,
        _ => EXIT_ERROR,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::error::TraceFrame;
    use lumen_core::{Span, Traceback};

    // =========================================================================
    // Exit Code Tests
    // =========================================================================

    #[test]
    fn test_exit_code_runtime_error() {
        let err = LumenError::reference("x");
        assert_eq!(exit_code_for_error(&err), EXIT_ERROR);
    }

    #[test]
    fn test_exit_code_syntax_error() {
        let err = LumenError::syntax("bad", Span::new(0, 1));
        assert_eq!(exit_code_for_error(&err), EXIT_ERROR);
    }

    #[test]
    fn test_exit_code_internal_error() {
        let err = LumenError::internal("corruption");
        assert_eq!(exit_code_for_error(&err), EXIT_INTERNAL_ERROR);
    }

    #[test]
    fn test_exit_code_constants() {
        assert_eq!(EXIT_SUCCESS, 0);
        assert_eq!(EXIT_ERROR, 1);
        assert_eq!(EXIT_USAGE_ERROR, 2);
        assert_eq!(EXIT_INTERNAL_ERROR, 120);
    }

    // =========================================================================
    // Error Formatting Tests
    // =========================================================================

    #[test]
    fn test_format_syntax_error_with_source() {
        let err = LumenError::syntax("unexpected token", Span::new(8, 9));
        let map = SourceMap::new("let x = ?;", "test.lum");
        let output = format_error_string(&err, Some(&map));
        assert!(output.starts_with("SyntaxError: unexpected token\n"));
        assert!(output.contains("  --> test.lum:1:9\n"));
        assert!(output.contains("let x = ?;"));
        assert!(output.contains("^"));
    }

    #[test]
    fn test_format_syntax_error_without_source() {
        let err = LumenError::syntax("unexpected end of input", Span::new(0, 1));
        let output = format_error_string(&err, None);
        assert_eq!(output, "SyntaxError: unexpected end of input\n");
    }

    #[test]
    fn test_format_runtime_error_with_trace() {
        let err = LumenError::reference("nope")
            .with_span(Span::new(8, 12))
            .with_traceback(Traceback {
                frames: vec![
                    TraceFrame {
                        function: "f".to_string(),
                        span: Span::new(8, 12),
                        realm: None,
                    },
                    TraceFrame {
                        function: "<script>".to_string(),
                        span: Span::new(16, 20),
                        realm: None,
                    },
                ],
            });
        let map = SourceMap::new("function f() { return nope; } f();", "test.lum");
        let output = format_error_string(&err, Some(&map));
        assert!(output.starts_with("Uncaught ReferenceError: 'nope' is not defined\n"));
        assert!(output.contains("    at f (test.lum:1:9)\n"));
        assert!(output.contains("    at <script> (test.lum:1:17)\n"));
    }

    #[test]
    fn test_format_thrown_is_not_double_prefixed() {
        let err = LumenError::runtime(RuntimeErrorKind::Thrown, "kaboom");
        let output = format_error_string(&err, None);
        assert!(output.starts_with("Uncaught: kaboom\n"));
        assert!(!output.contains("Uncaught Uncaught"));
    }

    #[test]
    fn test_format_runtime_error_without_map_names_functions_only() {
        let err = LumenError::type_error("3 is not callable").with_traceback(Traceback {
            frames: vec![TraceFrame {
                function: "g".to_string(),
                span: Span::new(0, 1),
                realm: Some("plugin".to_string()),
            }],
        });
        let output = format_error_string(&err, None);
        assert!(output.starts_with("Uncaught TypeError: 3 is not callable\n"));
        assert!(output.contains("    at g [realm plugin]\n"));
        assert!(!output.contains(":1:"));
    }

    #[test]
    fn test_format_runtime_error_empty_trace_is_headline_only() {
        let err = LumenError::division_by_zero();
        let output = format_error_string(&err, None);
        assert_eq!(output, "Uncaught DivisionError: division by zero\n");
    }

    #[test]
    fn test_format_internal_error() {
        let err = LumenError::internal("frame stack empty");
        let output = format_error_string(&err, None);
        assert_eq!(output, "internal error: frame stack empty\n");
    }
}
