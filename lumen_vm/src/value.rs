//! Runtime values.
//!
//! A `Value` is a small tagged union; heap payloads sit behind `Rc`. Equality
//! is strict: operands of different types never compare equal, and `Int` and
//! `Float` are distinct types. Function values compare by identity.

use crate::realm::{DomainId, UnitId};
use lumen_core::LumenResult;
use lumen_parser::{FunctionId, Stmt};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// Value
// =============================================================================

/// A Lumen runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Immutable string.
    Str(Rc<str>),
    /// A function declared by a program.
    Function(Rc<FunctionValue>),
    /// A function provided by the host.
    Native(Rc<NativeFunction>),
}

impl Value {
    /// Type name used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Function(_) => "function",
            Self::Native(_) => "native function",
        }
    }

    /// Truthiness: `null`, `false`, `0`, `0.0` and `""` are falsy, everything
    /// else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Function(_) | Self::Native(_) => true,
        }
    }

    /// Domain the value is pinned to, for callable values.
    #[must_use]
    pub fn domain(&self) -> Option<DomainId> {
        match self {
            Self::Function(f) => Some(f.domain),
            Self::Native(n) => Some(n.domain),
            _ => None,
        }
    }
}

/// Strict equality. `NaN !== NaN` per IEEE; `1 === 1.0` is `false` because
/// the types differ.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::Str(s) => f.write_str(s),
            Self::Function(func) => write!(f, "<function {}>", func.name),
            Self::Native(n) => write!(f, "<native {}>", n.name),
        }
    }
}

// =============================================================================
// Function Values
// =============================================================================

/// A function produced by evaluating a declaration.
///
/// The body is shared, not re-cloned per call. `captured` is a by-value
/// snapshot of the enclosing frame's locals taken when the declaration ran;
/// nothing in a function value refers back into a live frame, so frame reuse
/// can never invalidate a closure.
#[derive(Debug)]
pub struct FunctionValue {
    /// Declared name.
    pub name: Rc<str>,
    /// Id the parser assigned to the declaration.
    pub id: FunctionId,
    /// Realm the declaration executed in. Tail calls into another domain go
    /// through the cross-boundary guard.
    pub domain: DomainId,
    /// Program unit the declaration came from.
    pub unit: UnitId,
    /// Parameter names in order.
    pub params: Rc<[Rc<str>]>,
    /// Body statements.
    pub body: Rc<[Stmt]>,
    /// Enclosing locals snapshotted at declaration time.
    pub captured: FxHashMap<Rc<str>, Value>,
}

/// Signature of a host-provided builtin.
pub type NativeFn = fn(&[Value]) -> LumenResult<Value>;

/// A function implemented by the host. Natives execute on the host stack and
/// never own an interpreter frame, so a marked tail call targeting one always
/// takes the ordinary-call path.
#[derive(Debug, Clone)]
pub struct NativeFunction {
    /// Name the function is bound to.
    pub name: Rc<str>,
    /// Realm the function was installed into.
    pub domain: DomainId,
    /// Implementation.
    pub func: NativeFn,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn native(name: &str) -> Value {
        fn noop(_: &[Value]) -> LumenResult<Value> {
            Ok(Value::Null)
        }
        Value::Native(Rc::new(NativeFunction {
            name: Rc::from(name),
            domain: DomainId::MAIN,
            func: noop,
        }))
    }

    #[test]
    fn test_truthiness_table() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(Rc::from("")).is_truthy());

        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(Value::Str(Rc::from("x")).is_truthy());
        assert!(native("f").is_truthy());
    }

    #[test]
    fn test_strict_equality_requires_same_type() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(0), Value::Bool(false));
        assert_ne!(Value::Null, Value::Bool(false));
        assert_eq!(Value::Str(Rc::from("a")), Value::Str(Rc::from("a")));
    }

    #[test]
    fn test_nan_is_not_equal_to_itself() {
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn test_natives_compare_by_identity() {
        let a = native("f");
        let b = native("f");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::Int(-3)), "-3");
        assert_eq!(format!("{}", Value::Float(2.5)), "2.5");
        assert_eq!(format!("{}", Value::Float(3.0)), "3.0");
        assert_eq!(format!("{}", Value::Str(Rc::from("hi"))), "hi");
        assert_eq!(format!("{}", native("print")), "<native print>");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.0).type_name(), "float");
        assert_eq!(native("f").type_name(), "native function");
    }
}
