//! Runtime configuration aggregated from CLI flags and environment variables.
//!
//! All settings are resolved once at startup into a single immutable struct.
//! Flag values are validated strictly and reject with a usage error; values
//! arriving through `LUMEN*` environment variables are lenient and fall back
//! to the default when unparseable, so a stale shell export cannot brick the
//! interpreter.

use crate::args::LumenArgs;
use lumen_core::BoundaryPolicy;
use lumen_parser::MarkerGrammar;
use lumen_vm::{CallFrame, EngineConfig};

// =============================================================================
// Configuration Errors
// =============================================================================

/// A flag value that failed validation. Reported as a usage error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `--marker-grammar` named no known grammar.
    InvalidGrammar(String),
    /// `--boundary-policy` named no known policy.
    InvalidPolicy(String),
    /// `--max-frames` was not a positive integer.
    InvalidMaxFrames(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidGrammar(value) => write!(
                f,
                "unknown marker grammar '{}' (expected statement, expression, or sigil)",
                value
            ),
            ConfigError::InvalidPolicy(value) => write!(
                f,
                "unknown boundary policy '{}' (expected allow, warn, or error)",
                value
            ),
            ConfigError::InvalidMaxFrames(value) => write!(
                f,
                "invalid --max-frames value '{}' (expected a positive integer)",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Complete runtime configuration resolved from CLI args + environment.
///
/// Immutable after construction; the driver reads from this without any
/// per-operation cost.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Marker grammar for the parser (`--marker-grammar`).
    pub grammar: MarkerGrammar,

    /// Policy for tail calls that cross realm boundaries
    /// (`--boundary-policy`).
    pub boundary_policy: BoundaryPolicy,

    /// Ordinary-call depth limit (`--max-frames`).
    pub max_frames: usize,

    /// Parse and validate only (`--check`).
    pub check: bool,

    /// Enter interactive mode after script execution (`-i`).
    pub inspect: bool,

    /// Suppress the version banner in the REPL (`-q`).
    pub quiet: bool,

    /// Ignore `LUMEN*` environment variables (`-E`).
    pub ignore_environment: bool,

    /// Engine `-X` options, in order of specification.
    pub x_options: Vec<String>,
}

impl RuntimeConfig {
    /// Resolve configuration from parsed CLI args and environment variables.
    ///
    /// Environment variables are only consulted if `-E` was NOT specified.
    /// Flag values that fail validation are reported to the caller; bad
    /// environment values silently fall back to the default.
    pub fn from_args(args: &LumenArgs) -> Result<Self, ConfigError> {
        let ignore_env = args.ignore_environment;

        // Resolve grammar: CLI flag OR `LUMEN_MARKER_GRAMMAR` env var.
        let grammar = match &args.marker_grammar {
            Some(name) => MarkerGrammar::from_name(name)
                .ok_or_else(|| ConfigError::InvalidGrammar(name.clone()))?,
            None if !ignore_env => Self::env_grammar().unwrap_or_default(),
            None => MarkerGrammar::default(),
        };

        // Resolve policy: CLI flag OR `LUMEN_BOUNDARY_POLICY` env var.
        let boundary_policy = match &args.boundary_policy {
            Some(name) => BoundaryPolicy::from_name(name)
                .ok_or_else(|| ConfigError::InvalidPolicy(name.clone()))?,
            None if !ignore_env => Self::env_policy().unwrap_or_default(),
            None => BoundaryPolicy::default(),
        };

        // Resolve depth limit: CLI flag OR `LUMEN_MAX_FRAMES` env var.
        let max_frames = match &args.max_frames {
            Some(text) => match text.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidMaxFrames(text.clone())),
            },
            None if !ignore_env => Self::env_max_frames().unwrap_or(CallFrame::MAX_FRAME_DEPTH),
            None => CallFrame::MAX_FRAME_DEPTH,
        };

        // Resolve inspect: CLI flag OR `LUMEN_INSPECT` env var.
        let inspect = args.inspect || (!ignore_env && Self::env_bool("LUMEN_INSPECT"));

        Ok(Self {
            grammar,
            boundary_policy,
            max_frames,
            check: args.check,
            inspect,
            quiet: args.quiet,
            ignore_environment: ignore_env,
            x_options: args.x_options.clone(),
        })
    }

    /// Whether validated tail sites may reuse frames.
    ///
    /// Defaults to enabled. `-X` options can force behavior, last one wins:
    /// - disable: `tco=off`, `tco=0`, `notco`
    /// - enable: `tco=on`, `tco=1`
    pub fn tco_enabled(&self) -> bool {
        let mut enabled = true;

        for opt in &self.x_options {
            match opt.as_str() {
                "tco=off" | "tco=0" | "notco" => enabled = false,
                "tco=on" | "tco=1" => enabled = true,
                _ => {}
            }
        }

        enabled
    }

    /// Engine configuration carrying the resolved settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            grammar: self.grammar,
            boundary_policy: self.boundary_policy,
            max_frames: self.max_frames,
            tco_enabled: self.tco_enabled(),
            ..EngineConfig::default()
        }
    }

    /// Check if an environment variable is set to a non-empty, truthy value.
    #[inline]
    fn env_bool(var: &str) -> bool {
        std::env::var(var)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false)
    }

    /// Grammar from `LUMEN_MARKER_GRAMMAR`, ignoring unknown names.
    fn env_grammar() -> Option<MarkerGrammar> {
        std::env::var("LUMEN_MARKER_GRAMMAR")
            .ok()
            .and_then(|v| MarkerGrammar::from_name(&v))
    }

    /// Policy from `LUMEN_BOUNDARY_POLICY`, ignoring unknown names.
    fn env_policy() -> Option<BoundaryPolicy> {
        std::env::var("LUMEN_BOUNDARY_POLICY")
            .ok()
            .and_then(|v| BoundaryPolicy::from_name(&v))
    }

    /// Depth limit from `LUMEN_MAX_FRAMES`, ignoring zero and non-numbers.
    fn env_max_frames() -> Option<usize> {
        std::env::var("LUMEN_MAX_FRAMES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
    }
}

// =============================================================================
// Tests
// =============================================================================
