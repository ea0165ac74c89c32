//! Diagnostic model for the tail-call checker.
//!
//! The validator and the cross-boundary guard both report through this
//! module. Diagnostics are immutable once emitted; collection order is
//! whatever the producer's traversal happened to be, and [`DiagnosticList`]
//! restores source order at delivery time so independently validated
//! functions can be checked in any order (or merged from parallel runs)
//! without changing what tooling sees.

use crate::source_map::SourceMap;
use crate::span::Span;
use std::fmt;

// =============================================================================
// Severity and Rules
// =============================================================================

/// Diagnostic severity.
///
/// `Error` blocks code generation and execution of the compilation unit;
/// `Warning` is advisory and execution proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Advisory; does not block execution.
    Warning,
    /// Fatal for the compilation unit.
    Error,
}

impl Severity {
    /// Lowercase display name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable rule identifiers for tail-call diagnostics.
///
/// Codes are part of the tooling contract and never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    /// General syntax error outside the tail-call rules.
    Parse,
    /// Marker applied to something that is not a direct call.
    MarkerNotCall,
    /// Marked call is not in tail position.
    NotTailPosition,
    /// Marked call under a `try` with a handler or finalizer.
    FinallyContext,
    /// Marked call inside a loop that may iterate again.
    LoopContext,
    /// Marked call whose callee or arguments contain another marker.
    DoubleMarking,
    /// Marked call crosses an isolation boundary under the `Warn` policy.
    CrossBoundaryCall,
    /// Marked call refused by an `ErrorAtRuntime` boundary policy.
    BoundaryRefused,
}

impl RuleId {
    /// Stable rule code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parse => "P0001",
            Self::MarkerNotCall => "TC0001",
            Self::NotTailPosition => "TC0002",
            Self::FinallyContext => "TC0003",
            Self::LoopContext => "TC0004",
            Self::DoubleMarking => "TC0005",
            Self::CrossBoundaryCall => "TC0006",
            Self::BoundaryRefused => "TC0007",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// A single diagnostic. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Stable rule identifier.
    pub rule: RuleId,
    /// Location in the source.
    pub span: Span,
}

impl Diagnostic {
    /// Build an error diagnostic.
    #[must_use]
    pub fn error(rule: RuleId, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            rule,
            span,
        }
    }

    /// Build a warning diagnostic.
    #[must_use]
    pub fn warning(rule: RuleId, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            rule,
            span,
        }
    }

    /// Resolve the span against a source map, producing the stable
    /// externally delivered shape.
    #[must_use]
    pub fn resolve(&self, map: &SourceMap) -> ResolvedDiagnostic {
        let pos = map.resolve(self.span.start as usize);
        ResolvedDiagnostic {
            severity: self.severity,
            message: self.message.clone(),
            line: pos.line,
            column: pos.column,
            rule: self.rule,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.rule, self.message)
    }
}

/// Diagnostic with its span resolved to a line/column position.
///
/// The `(severity, message, line, column, rule)` shape is the tooling
/// contract and stays stable across engine versions. Lines are 1-indexed,
/// columns 0-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDiagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// 1-indexed source line.
    pub line: usize,
    /// 0-indexed column within the line.
    pub column: usize,
    /// Stable rule identifier.
    pub rule: RuleId,
}

// =============================================================================
// Diagnostic List
// =============================================================================

/// Accumulated diagnostics from one or more producers.
///
/// Push order is not meaningful; [`DiagnosticList::in_source_order`] and
/// [`DiagnosticList::resolve_all`] deliver in source order. Merging two
/// lists and sorting is equivalent to producing them in one pass, which is
/// what makes per-function validation order-independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticList {
    items: Vec<Diagnostic>,
}

impl DiagnosticList {
    /// Empty list.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    #[inline]
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Absorb another list.
    pub fn merge(&mut self, other: DiagnosticList) {
        self.items.extend(other.items);
    }

    /// Number of diagnostics.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of error diagnostics.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Number of warning diagnostics.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Iterate in push order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Diagnostics sorted by source position. Stable, so diagnostics at the
    /// same span keep their emission order.
    #[must_use]
    pub fn in_source_order(&self) -> Vec<Diagnostic> {
        let mut sorted = self.items.clone();
        sorted.sort_by_key(|d| (d.span.start, d.span.end));
        sorted
    }

    /// Resolve every diagnostic against a source map, in source order.
    #[must_use]
    pub fn resolve_all(&self, map: &SourceMap) -> Vec<ResolvedDiagnostic> {
        self.in_source_order()
            .iter()
            .map(|d| d.resolve(map))
            .collect()
    }

    /// Drain the list, leaving it empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(rule: RuleId, start: u32) -> Diagnostic {
        Diagnostic::error(rule, "x", Span::new(start, start + 1))
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Warning), "warning");
    }

    #[test]
    fn test_rule_codes_are_stable() {
        assert_eq!(RuleId::Parse.code(), "P0001");
        assert_eq!(RuleId::MarkerNotCall.code(), "TC0001");
        assert_eq!(RuleId::NotTailPosition.code(), "TC0002");
        assert_eq!(RuleId::FinallyContext.code(), "TC0003");
        assert_eq!(RuleId::LoopContext.code(), "TC0004");
        assert_eq!(RuleId::DoubleMarking.code(), "TC0005");
        assert_eq!(RuleId::CrossBoundaryCall.code(), "TC0006");
        assert_eq!(RuleId::BoundaryRefused.code(), "TC0007");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::error(RuleId::NotTailPosition, "not a tail call", Span::new(0, 4));
        assert_eq!(format!("{}", d), "error[TC0002]: not a tail call");
    }

    #[test]
    fn test_source_order_restoration() {
        let mut list = DiagnosticList::new();
        list.push(diag(RuleId::NotTailPosition, 40));
        list.push(diag(RuleId::MarkerNotCall, 5));
        list.push(diag(RuleId::LoopContext, 20));

        let sorted = list.in_source_order();
        let starts: Vec<u32> = sorted.iter().map(|d| d.span.start).collect();
        assert_eq!(starts, vec![5, 20, 40]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_spans() {
        let mut list = DiagnosticList::new();
        list.push(Diagnostic::error(RuleId::DoubleMarking, "first", Span::new(8, 9)));
        list.push(Diagnostic::error(RuleId::NotTailPosition, "second", Span::new(8, 9)));

        let sorted = list.in_source_order();
        assert_eq!(sorted[0].message, "first");
        assert_eq!(sorted[1].message, "second");
    }

    #[test]
    fn test_merge_then_sort_matches_single_pass() {
        let mut a = DiagnosticList::new();
        a.push(diag(RuleId::MarkerNotCall, 30));
        let mut b = DiagnosticList::new();
        b.push(diag(RuleId::LoopContext, 10));

        let mut merged = DiagnosticList::new();
        merged.push(diag(RuleId::LoopContext, 10));
        merged.push(diag(RuleId::MarkerNotCall, 30));

        a.merge(b);
        assert_eq!(a.in_source_order(), merged.in_source_order());
    }

    #[test]
    fn test_error_and_warning_counts() {
        let mut list = DiagnosticList::new();
        list.push(Diagnostic::error(RuleId::NotTailPosition, "e", Span::dummy()));
        list.push(Diagnostic::warning(
            RuleId::CrossBoundaryCall,
            "w",
            Span::dummy(),
        ));
        assert!(list.has_errors());
        assert_eq!(list.error_count(), 1);
        assert_eq!(list.warning_count(), 1);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_warnings_alone_do_not_block() {
        let mut list = DiagnosticList::new();
        list.push(Diagnostic::warning(
            RuleId::CrossBoundaryCall,
            "w",
            Span::dummy(),
        ));
        assert!(!list.has_errors());
    }

    #[test]
    fn test_resolve_produces_tuple_shape() {
        let map = SourceMap::new("let x = 1;\nbad here", "test.lum");
        let d = Diagnostic::warning(RuleId::CrossBoundaryCall, "crossing", Span::new(15, 19));
        let resolved = d.resolve(&map);
        assert_eq!(resolved.severity, Severity::Warning);
        assert_eq!(resolved.line, 2);
        assert_eq!(resolved.column, 4);
        assert_eq!(resolved.rule, RuleId::CrossBoundaryCall);
        assert_eq!(resolved.message, "crossing");
    }

    #[test]
    fn test_take_empties_the_list() {
        let mut list = DiagnosticList::new();
        list.push(diag(RuleId::MarkerNotCall, 0));
        let drained = list.take();
        assert_eq!(drained.len(), 1);
        assert!(list.is_empty());
    }
}
