//! Span-to-position resolution.
//!
//! Byte offsets are the only location data the pipeline carries; this module
//! turns them back into line/column positions for diagnostics and stack
//! traces. Line starts are computed once per source, lookups are binary
//! search.

use crate::span::Span;

/// Pre-computed line offset table for O(log n) span-to-position lookup.
#[derive(Debug, Clone)]
pub struct SourceMap {
    /// Byte offsets of each line start (always begins with 0).
    line_starts: Vec<usize>,
    /// The original source text.
    source: String,
    /// Display name of the source (file path, `<stdin>`, `<repl>`).
    name: String,
}

/// A resolved source position (1-indexed line, 0-indexed column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    /// 1-indexed line number.
    pub line: usize,
    /// 0-indexed byte column from the line start.
    pub column: usize,
}

impl SourceMap {
    /// Build a source map from source text and a display name.
    #[must_use]
    pub fn new(source: &str, name: &str) -> Self {
        let mut line_starts = vec![0usize];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            source: source.to_string(),
            name: name.to_string(),
        }
    }

    /// Resolve a byte offset to a position.
    #[inline]
    #[must_use]
    pub fn resolve(&self, offset: usize) -> SourcePosition {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert.saturating_sub(1),
        };
        SourcePosition {
            line: line_idx + 1,
            column: offset.saturating_sub(self.line_starts[line_idx]),
        }
    }

    /// Resolve the start of a span.
    #[inline]
    #[must_use]
    pub fn position_of(&self, span: Span) -> SourcePosition {
        self.resolve(span.start as usize)
    }

    /// Text of a 1-indexed line, without its trailing newline.
    #[must_use]
    pub fn line_text(&self, line: usize) -> Option<&str> {
        if line == 0 || line > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line - 1];
        let end = if line < self.line_starts.len() {
            self.line_starts[line]
        } else {
            self.source.len()
        };
        let text = &self.source[start..end];
        Some(text.trim_end_matches('\n').trim_end_matches('\r'))
    }

    /// Display name of the source.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of lines.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
