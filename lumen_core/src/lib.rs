//! # Lumen Core
//!
//! Shared leaf crate for the Lumen engine: source spans, the engine error
//! type, the diagnostic model used by the tail-call checker, the
//! cross-boundary reuse policy, and the span-to-position source map. Every
//! other Lumen crate depends on this one and nothing here depends back.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diagnostics;
pub mod error;
pub mod policy;
pub mod source_map;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticList, ResolvedDiagnostic, RuleId, Severity};
pub use error::{LumenError, LumenResult, RuntimeErrorKind, TraceFrame, Traceback};
pub use policy::BoundaryPolicy;
pub use source_map::{SourceMap, SourcePosition};
pub use span::Span;

/// Engine version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the Lumen language dialect this engine implements.
pub const LANGUAGE_VERSION: (u32, u32, u32) = (0, 1, 0);
