//! HIR (High-level Intermediate Representation) definitions
//!
//! The HIR is a typed, resolved representation of Reed source that the
//! transformation passes rewrite in place. Every statement and expression
//! carries the span of the source construct it came from; expressions also
//! carry a [`NodeId`](reed_types::NodeId) keying the type side table.

use reed_diagnostics::Span;
use reed_types::{FuncId, LabelId, LocalId, NodeId, Type};

/// A complete HIR module (corresponds to one Reed source file)
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name/path
    pub name: String,
    /// Function definitions
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }
}

/// A function definition
#[derive(Debug, Clone)]
pub struct Function {
    pub id: FuncId,
    pub name: String,
    pub params: Vec<Param>,
    /// Result types; Reed functions may return multiple values
    pub results: Vec<Type>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A function or closure parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub id: LocalId,
    pub name: String,
    pub ty: Type,
}

/// Statement in a function body
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The statement variants of the Reed HIR
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Local variable declaration: `let x: T = expr`
    Let {
        id: LocalId,
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    /// Expression statement (assignment is `ExprKind::LocalSet`)
    Expr(Expr),
    /// Return statement; empty vector means a bare `return`
    Return(Vec<Expr>),
    /// If statement
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    /// Ordinary pull-style loop
    While {
        label: Option<LabelId>,
        condition: Expr,
        body: Vec<Stmt>,
    },
    /// Push-style iteration loop: `for bindings in iter { body }`.
    /// `iter` is an iterator function that drives the loop itself by
    /// invoking a per-element callback. Eliminated by `reed-transform`
    /// before code generation.
    ForIter {
        label: Option<LabelId>,
        iter: Expr,
        bindings: Vec<Binding>,
        body: Vec<Stmt>,
    },
    /// Plain statement block (scoping only)
    Block(Vec<Stmt>),
    /// Break out of a loop, optionally labeled
    Break(Option<LabelId>),
    /// Continue a loop, optionally labeled
    Continue(Option<LabelId>),
    /// Unconditional jump to a label marker
    Goto(LabelId),
    /// Label marker, the target of `Goto`
    Label(LabelId),
    /// Deferred call: runs at exit of the lexically enclosing function.
    /// `token` is `None` in source input; the push-iteration pass fills it
    /// in for defers that end up inside synthesized closures, binding them
    /// to the original function's continuation token.
    Defer {
        call: Expr,
        token: Option<LocalId>,
    },
    /// Fatal runtime trap. Never present in source input; synthesized by
    /// the push-iteration pass as the non-compliant-iterator guard.
    Fault {
        message: String,
    },
}

/// One loop variable of a push-style loop
#[derive(Debug, Clone)]
pub struct Binding {
    pub target: BindTarget,
    pub ty: Type,
    pub span: Span,
}

/// Where a loop variable's per-element value lands
#[derive(Debug, Clone)]
pub enum BindTarget {
    /// `for x := in iter` — a fresh local scoped to the loop body
    Decl { id: LocalId, name: String },
    /// `for x = in iter` — assignment to an existing local; cannot be a
    /// callback parameter directly, so the rewrite mints a proxy parameter
    Assign(LocalId),
    /// `for _ in iter` — value discarded
    Discard,
}

/// Expression
#[derive(Debug, Clone)]
pub struct Expr {
    /// Key into the type side table
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

/// The expression variants of the Reed HIR
#[derive(Debug, Clone)]
pub enum ExprKind {
    // Literals
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),

    // Variables
    LocalGet(LocalId),
    LocalSet(LocalId, Box<Expr>),

    // Operations
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // Function call
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    // Named function reference
    FuncRef(FuncId),

    // Closure (function literal)
    Closure {
        /// Parameter definitions
        params: Vec<Param>,
        /// Result types
        results: Vec<Type>,
        /// Function body
        body: Vec<Stmt>,
        /// Locals captured from the enclosing scope, by reference
        captures: Vec<LocalId>,
    },

    /// Runtime hook producing the deferred-execution continuation token of
    /// the current activation. Only synthesized by the push-iteration pass.
    DeferAnchor,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}
