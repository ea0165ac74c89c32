//! Realms: isolated global scopes that double as optimization domains.
//!
//! Every function value is pinned to the realm it was declared in. The
//! cross-boundary guard compares the pinned domain of a tail-call target
//! against the domain of the executing frame; same-domain sites reuse the
//! frame unconditionally, differing domains go through policy resolution.

use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// Identifiers
// =============================================================================

/// Identity of a realm, used by the guard as the optimization domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(pub u32);

impl DomainId {
    /// Domain of the default realm every interpreter starts with.
    pub const MAIN: DomainId = DomainId(0);

    /// Index into the interpreter's realm table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

/// Identity of one compiled program loaded into the interpreter.
///
/// Call-site ids restart at zero for every parse, so the warn-once registry
/// keys on `(UnitId, CallSiteId)`. A REPL session loads many units into one
/// interpreter; sites from different lines never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

// =============================================================================
// Realm
// =============================================================================

/// A global scope with its own bindings.
#[derive(Debug)]
pub struct Realm {
    id: DomainId,
    name: Rc<str>,
    globals: FxHashMap<Rc<str>, Value>,
}

impl Realm {
    /// Create an empty realm.
    #[must_use]
    pub fn new(id: DomainId, name: &str) -> Self {
        Self {
            id,
            name: Rc::from(name),
            globals: FxHashMap::default(),
        }
    }

    /// Domain identity of this realm.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> DomainId {
        self.id
    }

    /// Human-readable realm name, used in diagnostics and traces.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define or overwrite a global binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.globals.insert(Rc::from(name), value);
    }

    /// Look up a global binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Overwrite an existing global. Returns `false` when the name was never
    /// defined; assignment does not create bindings.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.globals.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Whether the realm defines `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }
}

// =============================================================================
// Tests
// =============================================================================
