//! Cross-boundary guard: decides what a validated tail site may do when the
//! callee lives in another domain.
//!
//! The decision is computed fresh for every attempt from the actual
//! `(caller, callee)` pair; nothing about a previous pair is cached, because
//! the same textual site can target different domains on different runs. The
//! only persistent piece is the warn-once registry, keyed by
//! `(UnitId, CallSiteId)`, which guarantees at most one `TC0006` warning per
//! call site for the life of the interpreter.

use crate::realm::{DomainId, UnitId};
use dashmap::DashMap;
use lumen_core::BoundaryPolicy;
use lumen_parser::CallSiteId;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Descriptors
// =============================================================================

/// The pair of domains involved in one tail-call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryDescriptor {
    /// Domain of the executing frame.
    pub caller: DomainId,
    /// Domain the callee was declared in.
    pub callee: DomainId,
}

impl BoundaryDescriptor {
    /// Describe a call from `caller` into `callee`.
    #[inline]
    #[must_use]
    pub const fn new(caller: DomainId, callee: DomainId) -> Self {
        Self { caller, callee }
    }

    /// Whether the call leaves its domain.
    #[inline]
    #[must_use]
    pub const fn is_crossing(&self) -> bool {
        self.caller.0 != self.callee.0
    }
}

impl fmt::Display for BoundaryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.caller, self.callee)
    }
}

/// Interpreter-wide identity of a marked call site. Parser site ids restart
/// at zero for every compilation, so the unit id disambiguates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteKey {
    /// Program unit the site was parsed in.
    pub unit: UnitId,
    /// Site id within that unit.
    pub site: CallSiteId,
}

// =============================================================================
// Host Contract
// =============================================================================

/// Contract an embedding host implements to vouch for frame reuse across a
/// domain boundary.
pub trait HostBoundaryContract {
    /// Whether the host supports reusing the caller's frame for a call from
    /// `caller` into `callee`. Consulted only under the `AllowReuse` policy
    /// and re-queried on every attempt.
    fn supports_tail_call_reuse_for_boundary(&self, caller: DomainId, callee: DomainId) -> bool;
}

/// Host table of explicitly allowed domain pairs.
///
/// Answers `false` for any differing pair that was never registered. The
/// default host of a fresh interpreter is an empty table, so `AllowReuse`
/// degrades to the `Warn` behavior until the embedder registers pairs.
#[derive(Debug, Default)]
pub struct MembraneHostTable {
    allowed: DashMap<(DomainId, DomainId), ()>,
}

impl MembraneHostTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register support for reuse from `caller` into `callee`.
    pub fn allow(&self, caller: DomainId, callee: DomainId) {
        self.allowed.insert((caller, callee), ());
    }

    /// Withdraw a previously registered pair.
    pub fn revoke(&self, caller: DomainId, callee: DomainId) {
        self.allowed.remove(&(caller, callee));
    }
}

impl HostBoundaryContract for MembraneHostTable {
    fn supports_tail_call_reuse_for_boundary(&self, caller: DomainId, callee: DomainId) -> bool {
        caller == callee || self.allowed.contains_key(&(caller, callee))
    }
}

// =============================================================================
// Guard
// =============================================================================

/// What the runtime must do with one validated tail-call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryDecision {
    /// Reuse the caller's frame slot.
    Reuse,
    /// Perform an ordinary stack-growing call. `warn` is `true` exactly once
    /// per site key.
    OrdinaryCall {
        /// Whether this attempt is the one that emits the warning.
        warn: bool,
    },
    /// Abort the call with a `TC0007` runtime error.
    Refuse,
}

/// Policy resolution plus the warn-once registry.
pub struct BoundaryGuard {
    policy: BoundaryPolicy,
    optimizer_enabled: bool,
    host: Arc<dyn HostBoundaryContract>,
    warned: FxHashSet<SiteKey>,
}

impl BoundaryGuard {
    /// Guard with the given policy. `optimizer_enabled = false` routes every
    /// attempt through the ordinary-call path, still warning once per site;
    /// a validated site never silently grows the stack.
    #[must_use]
    pub fn new(
        policy: BoundaryPolicy,
        optimizer_enabled: bool,
        host: Arc<dyn HostBoundaryContract>,
    ) -> Self {
        Self {
            policy,
            optimizer_enabled,
            host,
            warned: FxHashSet::default(),
        }
    }

    /// Active policy.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// Resolve one attempt.
    pub fn decide(&mut self, key: SiteKey, boundary: BoundaryDescriptor) -> BoundaryDecision {
        if !self.optimizer_enabled {
            return BoundaryDecision::OrdinaryCall {
                warn: self.first_warning(key),
            };
        }
        if !boundary.is_crossing() {
            return BoundaryDecision::Reuse;
        }
        match self.policy {
            BoundaryPolicy::AllowReuse => {
                if self
                    .host
                    .supports_tail_call_reuse_for_boundary(boundary.caller, boundary.callee)
                {
                    BoundaryDecision::Reuse
                } else {
                    // Host refusal degrades to the Warn behavior.
                    BoundaryDecision::OrdinaryCall {
                        warn: self.first_warning(key),
                    }
                }
            }
            BoundaryPolicy::Warn => BoundaryDecision::OrdinaryCall {
                warn: self.first_warning(key),
            },
            BoundaryPolicy::ErrorAtRuntime => BoundaryDecision::Refuse,
        }
    }

    fn first_warning(&mut self, key: SiteKey) -> bool {
        self.warned.insert(key)
    }
}

impl fmt::Debug for BoundaryGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryGuard")
            .field("policy", &self.policy)
            .field("optimizer_enabled", &self.optimizer_enabled)
            .field("warned_sites", &self.warned.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(unit: u32, site: u32) -> SiteKey {
        SiteKey {
            unit: UnitId(unit),
            site: CallSiteId(site),
        }
    }

    fn guard(policy: BoundaryPolicy) -> BoundaryGuard {
        BoundaryGuard::new(policy, true, Arc::new(MembraneHostTable::new()))
    }

    #[test]
    fn test_same_domain_always_reuses() {
        let mut g = guard(BoundaryPolicy::ErrorAtRuntime);
        let same = BoundaryDescriptor::new(DomainId(1), DomainId(1));
        assert_eq!(g.decide(key(0, 0), same), BoundaryDecision::Reuse);
    }

    #[test]
    fn test_warn_policy_warns_exactly_once_per_site() {
        let mut g = guard(BoundaryPolicy::Warn);
        let crossing = BoundaryDescriptor::new(DomainId(0), DomainId(1));

        assert_eq!(
            g.decide(key(0, 4), crossing),
            BoundaryDecision::OrdinaryCall { warn: true }
        );
        assert_eq!(
            g.decide(key(0, 4), crossing),
            BoundaryDecision::OrdinaryCall { warn: false }
        );
        // A different site warns independently.
        assert_eq!(
            g.decide(key(0, 5), crossing),
            BoundaryDecision::OrdinaryCall { warn: true }
        );
    }

    #[test]
    fn test_same_site_id_in_another_unit_warns_again() {
        let mut g = guard(BoundaryPolicy::Warn);
        let crossing = BoundaryDescriptor::new(DomainId(0), DomainId(1));

        assert_eq!(
            g.decide(key(0, 0), crossing),
            BoundaryDecision::OrdinaryCall { warn: true }
        );
        assert_eq!(
            g.decide(key(1, 0), crossing),
            BoundaryDecision::OrdinaryCall { warn: true }
        );
    }

    #[test]
    fn test_warned_site_still_warns_for_new_pair_only_once_overall() {
        // The registry keys on the site, not on the domain pair: one warning
        // per call site for the life of the interpreter.
        let mut g = guard(BoundaryPolicy::Warn);
        let first = BoundaryDescriptor::new(DomainId(0), DomainId(1));
        let second = BoundaryDescriptor::new(DomainId(0), DomainId(2));

        assert_eq!(
            g.decide(key(0, 0), first),
            BoundaryDecision::OrdinaryCall { warn: true }
        );
        assert_eq!(
            g.decide(key(0, 0), second),
            BoundaryDecision::OrdinaryCall { warn: false }
        );
    }

    #[test]
    fn test_allow_reuse_consults_host_every_time() {
        let host = Arc::new(MembraneHostTable::new());
        let mut g = BoundaryGuard::new(BoundaryPolicy::AllowReuse, true, Arc::clone(&host) as _);
        let crossing = BoundaryDescriptor::new(DomainId(0), DomainId(1));

        // Unregistered pair degrades to Warn behavior, never a silent call.
        assert_eq!(
            g.decide(key(0, 0), crossing),
            BoundaryDecision::OrdinaryCall { warn: true }
        );

        // Registering the pair flips the very next attempt to reuse.
        host.allow(DomainId(0), DomainId(1));
        assert_eq!(g.decide(key(0, 0), crossing), BoundaryDecision::Reuse);

        // Revoking it is honored immediately as well; the warning for this
        // site was already spent.
        host.revoke(DomainId(0), DomainId(1));
        assert_eq!(
            g.decide(key(0, 0), crossing),
            BoundaryDecision::OrdinaryCall { warn: false }
        );
    }

    #[test]
    fn test_error_policy_refuses() {
        let mut g = guard(BoundaryPolicy::ErrorAtRuntime);
        let crossing = BoundaryDescriptor::new(DomainId(0), DomainId(1));
        assert_eq!(g.decide(key(0, 0), crossing), BoundaryDecision::Refuse);
    }

    #[test]
    fn test_disabled_optimizer_grows_even_same_domain() {
        let mut g = BoundaryGuard::new(
            BoundaryPolicy::Warn,
            false,
            Arc::new(MembraneHostTable::new()),
        );
        let same = BoundaryDescriptor::new(DomainId(0), DomainId(0));

        assert_eq!(
            g.decide(key(0, 0), same),
            BoundaryDecision::OrdinaryCall { warn: true }
        );
        assert_eq!(
            g.decide(key(0, 0), same),
            BoundaryDecision::OrdinaryCall { warn: false }
        );
    }

    #[test]
    fn test_membrane_table_directionality() {
        let host = MembraneHostTable::new();
        host.allow(DomainId(0), DomainId(1));

        assert!(host.supports_tail_call_reuse_for_boundary(DomainId(0), DomainId(1)));
        // The reverse direction was not registered.
        assert!(!host.supports_tail_call_reuse_for_boundary(DomainId(1), DomainId(0)));
        // Same-domain pairs are always supported.
        assert!(host.supports_tail_call_reuse_for_boundary(DomainId(2), DomainId(2)));
    }

    #[test]
    fn test_boundary_descriptor_display() {
        let b = BoundaryDescriptor::new(DomainId(0), DomainId(2));
        assert_eq!(format!("{}", b), "domain#0 -> domain#2");
        assert!(b.is_crossing());
        assert!(!BoundaryDescriptor::new(DomainId(1), DomainId(1)).is_crossing());
    }
}
