//! Cross-boundary reuse policy.
//!
//! The policy is shared vocabulary: the CLI parses it, the compiler uses it
//! for compile-time advisories, and the runtime guard enforces it.

use std::fmt;

/// What the runtime does when a marked tail call crosses a realm boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoundaryPolicy {
    /// Reuse the caller frame across the boundary, if the host supports it.
    /// If the host refuses, behaves like [`BoundaryPolicy::Warn`]; the
    /// degradation is never silent.
    AllowReuse,
    /// Keep the caller frame, perform an ordinary call, and warn once per
    /// call site. This is the default.
    #[default]
    Warn,
    /// Raise a runtime error at the crossing call site.
    ErrorAtRuntime,
}

impl BoundaryPolicy {
    /// Parse a policy name as written on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "allow" | "allow-reuse" => Some(Self::AllowReuse),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::ErrorAtRuntime),
            _ => None,
        }
    }

    /// Canonical name of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllowReuse => "allow-reuse",
            Self::Warn => "warn",
            Self::ErrorAtRuntime => "error",
        }
    }
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
