//! Per-attempt lifecycle of a marked call site, and interpreter counters.
//!
//! Every dynamic evaluation of a validated tail site walks a fixed state
//! machine. Transitions are debug-asserted; the trace of the last attempt at
//! each site is kept in [`TailCallStats`] so tests and tooling can inspect
//! which path a site took.

use lumen_parser::CallSiteId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

// =============================================================================
// State Machine
// =============================================================================

/// States of one marked-call attempt.
///
/// ```text
/// Init -> ArgsEvaluating -> ArgsEvaluated -> BoundaryChecked
///      -> {FrameReused | FrameGrown | Aborted} -> Executing
///      -> {Returned | Threw}
/// ```
///
/// An exception during argument evaluation ends the attempt directly from
/// `ArgsEvaluating`; a non-callable callee or an arity mismatch ends it from
/// `ArgsEvaluated`. `Returned`, `Threw` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailSiteState {
    /// Attempt created, nothing evaluated yet.
    Init,
    /// Callee and arguments are being evaluated, left to right.
    ArgsEvaluating,
    /// All argument values exist; the caller's frame is still fully live.
    ArgsEvaluated,
    /// The cross-boundary guard has resolved a decision for this attempt.
    BoundaryChecked,
    /// The caller's frame slot was handed to the callee.
    FrameReused,
    /// An ordinary stack-growing call was performed instead of reuse.
    FrameGrown,
    /// The attempt was refused by an `ErrorAtRuntime` boundary policy.
    Aborted,
    /// The callee body is running.
    Executing,
    /// The activation completed with a value. An activation that ends by
    /// handing its frame to the next tail call completes at that moment.
    Returned,
    /// The attempt ended with an exception.
    Threw,
}

impl TailSiteState {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        use TailSiteState::*;
        matches!(
            (self, next),
            (Init, ArgsEvaluating)
                | (ArgsEvaluating, ArgsEvaluated)
                | (ArgsEvaluating, Threw)
                | (ArgsEvaluated, BoundaryChecked)
                | (ArgsEvaluated, Threw)
                | (BoundaryChecked, FrameReused)
                | (BoundaryChecked, FrameGrown)
                | (BoundaryChecked, Aborted)
                | (FrameReused, Executing)
                | (FrameGrown, Executing)
                | (Executing, Returned)
                | (Executing, Threw)
        )
    }

    /// Whether the state ends an attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Returned | Self::Threw | Self::Aborted)
    }
}

/// Recorded lifecycle of one attempt at a marked site.
#[derive(Debug)]
pub struct SiteAttempt {
    site: CallSiteId,
    state: TailSiteState,
    trace: SmallVec<[TailSiteState; 10]>,
}

impl SiteAttempt {
    /// Fresh attempt in the `Init` state.
    #[must_use]
    pub fn new(site: CallSiteId) -> Self {
        let mut trace = SmallVec::new();
        trace.push(TailSiteState::Init);
        Self {
            site,
            state: TailSiteState::Init,
            trace,
        }
    }

    /// The site this attempt belongs to.
    #[inline]
    #[must_use]
    pub const fn site(&self) -> CallSiteId {
        self.site
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> TailSiteState {
        self.state
    }

    /// Move to the next state. Illegal transitions are a bug in the
    /// interpreter, not in user programs.
    pub fn advance(&mut self, next: TailSiteState) {
        debug_assert!(
            self.state.can_transition(next),
            "illegal tail-site transition {:?} -> {:?} at {}",
            self.state,
            next,
            self.site,
        );
        self.state = next;
        self.trace.push(next);
    }

    /// States visited so far, in order.
    #[must_use]
    pub fn trace(&self) -> &[TailSiteState] {
        &self.trace
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Counters kept by the interpreter for the life of the process.
#[derive(Debug, Default)]
pub struct TailCallStats {
    /// Attempts that reused the caller's frame slot.
    pub frames_reused: u64,
    /// Attempts routed through an ordinary stack-growing call.
    pub frames_grown: u64,
    /// Attempts refused by an `ErrorAtRuntime` boundary policy.
    pub sites_aborted: u64,
    /// Boundary warnings pushed to the diagnostic sink.
    pub warnings_emitted: u64,
    /// Attempts whose argument evaluation threw.
    pub args_threw: u64,
    /// Largest frame-stack depth observed.
    pub max_frame_depth: usize,
    /// Longest run of consecutive reuses of a single frame slot.
    pub max_reuse_chain: u32,
    site_traces: FxHashMap<CallSiteId, SmallVec<[TailSiteState; 10]>>,
}

impl TailCallStats {
    /// Zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current frame-stack depth.
    #[inline]
    pub fn note_depth(&mut self, depth: usize) {
        if depth > self.max_frame_depth {
            self.max_frame_depth = depth;
        }
    }

    /// Record the reuse count of a frame slot.
    #[inline]
    pub fn note_reuse_chain(&mut self, reuses: u32) {
        if reuses > self.max_reuse_chain {
            self.max_reuse_chain = reuses;
        }
    }

    /// Store the trace of a finished attempt. The last attempt per site wins.
    pub fn record_attempt(&mut self, attempt: SiteAttempt) {
        debug_assert!(
            attempt.state.is_terminal(),
            "attempt at {} recorded in non-terminal state {:?}",
            attempt.site,
            attempt.state,
        );
        self.site_traces.insert(attempt.site, attempt.trace);
    }

    /// Trace of the last attempt at `site`, if the site ever ran.
    #[must_use]
    pub fn trace_for(&self, site: CallSiteId) -> Option<&[TailSiteState]> {
        self.site_traces.get(&site).map(|t| t.as_slice())
    }

    /// Fold another stats block into this one. Counters add, maxima take the
    /// larger side, traces from `other` win on collision.
    pub fn merge(&mut self, other: TailCallStats) {
        self.frames_reused += other.frames_reused;
        self.frames_grown += other.frames_grown;
        self.sites_aborted += other.sites_aborted;
        self.warnings_emitted += other.warnings_emitted;
        self.args_threw += other.args_threw;
        self.max_frame_depth = self.max_frame_depth.max(other.max_frame_depth);
        self.max_reuse_chain = self.max_reuse_chain.max(other.max_reuse_chain);
        self.site_traces.extend(other.site_traces);
    }
}

// =============================================================================
// Tests
// =============================================================================
