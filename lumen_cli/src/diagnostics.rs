//! Terminal rendering for diagnostics and stack traces.
//!
//! Compile diagnostics render as a severity-tagged headline followed by the
//! source line and a caret underline resolved through
//! [`SourceMap`](lumen_core::SourceMap). Runtime tracebacks render as
//! `at <function> (<file>:<line>:<column>)` lines, innermost first, with
//! cross-realm frames annotated `[realm <name>]`.
//!
//! Positions printed here are 1-indexed in both line and column; the
//! 0-indexed column of [`ResolvedDiagnostic`](lumen_core::ResolvedDiagnostic)
//! is a tooling contract, not a display convention.

use lumen_core::{Diagnostic, DiagnosticList, SourceMap, Span, Traceback};

// =============================================================================
// Compile Diagnostics
// =============================================================================

/// Render one diagnostic with source context and a caret underline.
///
/// Output format:
/// ```text
/// error[TC0002]: marked call is not in tail position
///   --> fact.lum:2:14
///     return 1 + continue fact(n - 1);
///                ~~~~~~~~~~^~~~~~~~~~~
/// ```
pub fn render_diagnostic(map: &SourceMap, diagnostic: &Diagnostic) -> String {
    let mut output = String::with_capacity(256);

    // Headline: `error[TC0002]: message`.
    output.push_str(&diagnostic.to_string());
    output.push('\n');
    output.push_str(&render_source_context(map, diagnostic.span));

    output
}

/// Render every diagnostic in a list, in source order.
///
/// Returns the empty string for an empty list, so callers can pass the
/// result straight to `eprint!` unconditionally.
pub fn render_diagnostic_list(map: &SourceMap, list: &DiagnosticList) -> String {
    if list.is_empty() {
        return String::new();
    }
    let mut output = String::new();
    for diagnostic in &list.in_source_order() {
        output.push_str(&render_diagnostic(map, diagnostic));
        output.push('\n');
    }
    output
}

/// Render the location line, source line, and caret underline for a span.
///
/// The underline covers the span when it fits on one line; a span that runs
/// past the line end is underlined to the end of the line. Single-position
/// spans get a lone caret, wider ones tildes with the caret in the center.
pub fn render_source_context(map: &SourceMap, span: Span) -> String {
    let mut output = String::with_capacity(128);

    let pos = map.resolve(span.start as usize);
    let end_pos = map.resolve(span.end.saturating_sub(1).max(span.start) as usize);

    output.push_str(&format!(
        "  --> {}:{}:{}\n",
        map.name(),
        pos.line,
        pos.column + 1,
    ));

    if let Some(line_text) = map.line_text(pos.line) {
        output.push_str(&format!("    {}\n", line_text));

        let caret_start = pos.column;
        let caret_end = if pos.line == end_pos.line {
            end_pos.column + 1
        } else {
            line_text.len()
        };
        let caret_len = caret_end.saturating_sub(caret_start).max(1);

        output.push_str("    ");
        for _ in 0..caret_start {
            output.push(' ');
        }
        if caret_len == 1 {
            output.push('^');
        } else {
            let mid = caret_len / 2;
            for i in 0..caret_len {
                if i == mid {
                    output.push('^');
                } else {
                    output.push('~');
                }
            }
        }
        output.push('\n');
    }

    output
}

// =============================================================================
// Stack Traces
// =============================================================================

/// Render a traceback as `at` lines, innermost frame first.
///
/// With a source map each line carries the frame's position; without one
/// (the REPL, where frames may come from earlier lines) only the function
/// name is shown. Cross-realm frames get a `[realm <name>]` suffix either
/// way.
pub fn render_trace(traceback: &Traceback, map: Option<&SourceMap>) -> String {
    let mut output = String::new();
    for frame in &traceback.frames {
        output.push_str("    at ");
        output.push_str(&frame.function);
        if let Some(map) = map {
            let pos = map.resolve(frame.span.start as usize);
            output.push_str(&format!(
                " ({}:{}:{})",
                map.name(),
                pos.line,
                pos.column + 1,
            ));
        }
        if let Some(realm) = &frame.realm {
            output.push_str(&format!(" [realm {}]", realm));
        }
        output.push('\n');
    }
    output
}

// =============================================================================
// Tests
// =============================================================================
