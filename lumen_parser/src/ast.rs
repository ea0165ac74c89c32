//! Abstract syntax tree for Lumen.
//!
//! A marked tail call is its own [`ExprKind::TailCall`] variant rather than a
//! flag on [`ExprKind::Call`]: the checker and the interpreter dispatch on it
//! exhaustively, and an unmarked call can never be mistaken for a marked one.

use lumen_core::Span;
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Identity of a function body within one parsed program.
///
/// Ids are assigned by the parser in declaration order; the top-level script
/// body is [`FunctionId::SCRIPT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u32);

impl FunctionId {
    /// Id of the top-level script body.
    pub const SCRIPT: FunctionId = FunctionId(0);
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// Identity of one marked call site within one parsed program.
///
/// Site ids key the runtime's warn-once registry: a cross-boundary warning
/// is emitted at most once per site for the life of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSiteId(pub u32);

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site#{}", self.0)
    }
}

/// A named reference with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    /// The name text.
    pub name: String,
    /// Where the name appears.
    pub span: Span,
}

impl Ident {
    /// Create a new identifier.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

// =============================================================================
// Validity
// =============================================================================

/// Checker verdict attached to a marked call site.
///
/// Fresh from the parser every site is `Unchecked`. The tail-position
/// checker rewrites every site to `Valid` or `Invalid`; the interpreter
/// refuses to execute anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailValidity {
    /// Not yet examined by the checker.
    #[default]
    Unchecked,
    /// Proven to occupy tail position; eligible for frame reuse.
    Valid,
    /// Rejected; the program must not execute.
    Invalid,
}

// =============================================================================
// Program
// =============================================================================

/// A parsed compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements, executed as the script body.
    pub body: Vec<Stmt>,
    /// Number of function ids assigned, including the script body.
    pub function_count: u32,
    /// Number of marked call sites recognized.
    pub site_count: u32,
}

// =============================================================================
// Statements
// =============================================================================

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// What kind of statement this is.
    pub kind: StmtKind,
    /// Source span.
    pub span: Span,
}

impl Stmt {
    /// Create a new statement.
    #[inline]
    #[must_use]
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement: `f();`
    Expression(Expr),
    /// Variable declaration: `let x = 1;`
    Let {
        /// Declared name.
        name: Ident,
        /// Initializer, `null` if absent.
        value: Option<Expr>,
    },
    /// Assignment to an existing binding: `x = 1;`
    Assign {
        /// Assignment target.
        target: Ident,
        /// New value.
        value: Expr,
    },
    /// Function declaration.
    Function(FunctionDecl),
    /// `return;` or `return expr;`
    Return {
        /// Returned value, `null` if absent.
        value: Option<Expr>,
    },
    /// `if (cond) ... else ...`
    If {
        /// Branch condition.
        condition: Expr,
        /// Statements of the then branch.
        then_branch: Vec<Stmt>,
        /// Statements of the else branch, if present. An `else if` chain
        /// parses as a single nested `If` statement here.
        else_branch: Option<Vec<Stmt>>,
    },
    /// `while (cond) ...`
    While {
        /// Loop condition.
        condition: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `break;`
    Break,
    /// `continue;` in loop-control position.
    Continue,
    /// `throw expr;`
    Throw(Expr),
    /// `try { ... } catch (e) { ... } finally { ... }`
    Try {
        /// Protected statements.
        body: Vec<Stmt>,
        /// Handler, if present.
        catch: Option<CatchClause>,
        /// Finalizer, if present.
        finally: Option<Vec<Stmt>>,
    },
    /// A standalone block statement.
    Block(Vec<Stmt>),
}

/// `catch` clause of a `try` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Binding for the caught value, if written.
    pub binding: Option<Ident>,
    /// Handler body.
    pub body: Vec<Stmt>,
    /// Span of the clause.
    pub span: Span,
}

/// A function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Id assigned by the parser.
    pub id: FunctionId,
    /// Declared name.
    pub name: Ident,
    /// Parameter names in order.
    pub params: Vec<Ident>,
    /// Body statements.
    pub body: Vec<Stmt>,
    /// Whether the declaration carried the `#` sigil. Only the sigil marker
    /// grammar produces `true`.
    pub sigiled: bool,
    /// Span of the whole declaration.
    pub span: Span,
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What kind of expression this is.
    pub kind: ExprKind,
    /// Source span.
    pub span: Span,
}

impl Expr {
    /// Create a new expression.
    #[inline]
    #[must_use]
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this is a marked tail call.
    #[inline]
    #[must_use]
    pub fn is_tail_call(&self) -> bool {
        matches!(self.kind, ExprKind::TailCall(_))
    }
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value.
    Literal(Literal),
    /// Variable reference.
    Identifier(String),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary arithmetic or comparison.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Short-circuit logical operation.
    Logical {
        /// Operator.
        op: LogicalOp,
        /// Left operand; evaluated first, then tested.
        left: Box<Expr>,
        /// Right operand; evaluated only if the left does not short-circuit.
        right: Box<Expr>,
    },
    /// Ternary conditional: `cond ? a : b`.
    Conditional {
        /// Tested condition.
        condition: Box<Expr>,
        /// Value when the condition is truthy.
        then_arm: Box<Expr>,
        /// Value when the condition is falsy.
        else_arm: Box<Expr>,
    },
    /// Ordinary call.
    Call(CallExpr),
    /// Marked tail call recognized by the parser.
    TailCall(TailCallExpr),
}

/// Callee and arguments of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    /// Expression producing the function to call.
    pub callee: Box<Expr>,
    /// Arguments, evaluated left to right.
    pub arguments: Vec<Expr>,
}

/// A call site carrying the explicit tail-call marker.
#[derive(Debug, Clone, PartialEq)]
pub struct TailCallExpr {
    /// The underlying call.
    pub call: CallExpr,
    /// Unique id of this marked site.
    pub site: CallSiteId,
    /// Function body the site appears in.
    pub enclosing_function: FunctionId,
    /// Whether more than one marker was written on this call. The parser
    /// collapses nested markers into one node so the checker can report the
    /// redundancy instead of losing it to a parse error.
    pub double_marked: bool,
    /// Checker verdict; `Unchecked` until validation runs.
    pub validity: TailValidity,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
}

// =============================================================================
// Operators
// =============================================================================

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical not.
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neg => write!(f, "-"),
            Self::Not => write!(f, "!"),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
        };
        f.write_str(s)
    }
}

/// Short-circuit logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stmt_creation() {
        let stmt = Stmt::new(StmtKind::Break, Span::new(0, 5));
        assert!(matches!(stmt.kind, StmtKind::Break));
        assert_eq!(stmt.span, Span::new(0, 5));
    }

    #[test]
    fn test_expr_creation() {
        let expr = Expr::new(ExprKind::Literal(Literal::Int(7)), Span::new(0, 1));
        assert!(matches!(
            expr.kind,
            ExprKind::Literal(Literal::Int(7))
        ));
    }

    #[test]
    fn test_tail_call_is_distinct_from_call() {
        let callee = Box::new(Expr::new(
            ExprKind::Identifier("f".to_string()),
            Span::new(0, 1),
        ));
        let call = CallExpr {
            callee,
            arguments: vec![],
        };
        let plain = Expr::new(ExprKind::Call(call.clone()), Span::new(0, 3));
        let marked = Expr::new(
            ExprKind::TailCall(TailCallExpr {
                call,
                site: CallSiteId(0),
                enclosing_function: FunctionId::SCRIPT,
                double_marked: false,
                validity: TailValidity::default(),
            }),
            Span::new(0, 3),
        );

        assert!(!plain.is_tail_call());
        assert!(marked.is_tail_call());
        assert_ne!(plain, marked);
    }

    #[test]
    fn test_tail_validity_defaults_to_unchecked() {
        assert_eq!(TailValidity::default(), TailValidity::Unchecked);
    }

    #[test]
    fn test_function_id_script_constant() {
        assert_eq!(FunctionId::SCRIPT, FunctionId(0));
        assert_eq!(format!("{}", FunctionId(3)), "fn#3");
        assert_eq!(format!("{}", CallSiteId(9)), "site#9");
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(format!("{}", BinaryOp::StrictEq), "===");
        assert_eq!(format!("{}", BinaryOp::StrictNe), "!==");
        assert_eq!(format!("{}", LogicalOp::And), "&&");
        assert_eq!(format!("{}", LogicalOp::Or), "||");
        assert_eq!(format!("{}", UnaryOp::Neg), "-");
        assert_eq!(format!("{}", UnaryOp::Not), "!");
    }

    #[test]
    fn test_ident_new() {
        let ident = Ident::new("counter", Span::new(4, 11));
        assert_eq!(ident.name, "counter");
        assert_eq!(ident.span, Span::new(4, 11));
    }
}
