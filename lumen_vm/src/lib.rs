//! Lumen tree-walking runtime.
//!
//! Execution here is deliberately frame-oriented: ordinary calls push
//! [`CallFrame`]s onto an explicit stack, and validated tail-call sites go
//! through a trampoline that reuses the top frame instead of growing the
//! stack. Realms give programs isolated global scopes, the boundary guard
//! decides what happens when a marked call crosses between them, and every
//! attempt at a marked site leaves a state trace behind for the stats
//! surface.
//!
//! Hosts embed the runtime through [`Engine`], which couples a persistent
//! [`Interpreter`] with the compile pipeline, or drive the interpreter
//! directly when they need realm wiring.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod frame;
pub mod guard;
pub mod interpreter;
pub mod realm;
pub mod site;
pub mod traceback;
pub mod value;

pub use engine::{Engine, EngineConfig, ExecutionReport};
pub use frame::{ArgBuffer, CallFrame, FrameFunction, PendingCall};
pub use guard::{
    BoundaryDecision, BoundaryDescriptor, BoundaryGuard, HostBoundaryContract, MembraneHostTable,
    SiteKey,
};
pub use interpreter::{Interpreter, InterpreterOptions};
pub use realm::{DomainId, Realm, UnitId};
pub use site::{SiteAttempt, TailCallStats, TailSiteState};
pub use value::{FunctionValue, NativeFn, NativeFunction, Value};
