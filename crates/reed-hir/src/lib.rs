//! High-level intermediate representation for the Reed compiler.

pub mod ir;
pub mod table;

pub use ir::{
    BinaryOp, BindTarget, Binding, CompareOp, Expr, ExprKind, Function, LogicalOp, Module, Param,
    Stmt, StmtKind, UnaryOp,
};
pub use table::TypeTable;
