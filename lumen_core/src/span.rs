//! Byte-offset source spans.

use std::fmt;

/// A half-open byte range `[start, end)` into the original source text.
///
/// Spans are attached to every token, AST node, and diagnostic so that any
/// stage of the pipeline can be traced back to source without carrying the
/// text itself around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the first character.
    pub start: u32,
    /// Byte offset one past the last character.
    pub end: u32,
}

impl Span {
    /// Create a new span.
    #[inline]
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A zero span for synthesized nodes with no source location.
    #[inline]
    #[must_use]
    pub const fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Length of the span in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_creation() {
        let span = Span::new(3, 9);
        assert_eq!(span.start, 3);
        assert_eq!(span.end, 9);
        assert_eq!(span.len(), 6);
        assert!(!span.is_empty());
    }

    #[test]
    fn test_span_dummy_is_empty() {
        let span = Span::dummy();
        assert_eq!(span.len(), 0);
        assert!(span.is_empty());
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(4, 8);
        let b = Span::new(10, 15);
        assert_eq!(a.merge(b), Span::new(4, 15));
        assert_eq!(b.merge(a), Span::new(4, 15));
    }

    #[test]
    fn test_span_merge_overlapping() {
        let a = Span::new(0, 10);
        let b = Span::new(5, 7);
        assert_eq!(a.merge(b), Span::new(0, 10));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(format!("{}", Span::new(2, 5)), "2..5");
    }
}
