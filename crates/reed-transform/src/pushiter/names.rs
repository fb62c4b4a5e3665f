//! Synthetic local allocation and naming.
//!
//! Every local the rewrite introduces gets a fresh [`LocalId`] above the
//! highest id already present in the function, and a `#`-prefixed name.
//! `#` cannot appear in a source identifier, so synthetic names can never
//! shadow or collide with user locals, and a reader of dumped HIR can
//! tell at a glance which variables the compiler invented.
//!
//! Names carry the ordinal of the loop nest they belong to so that two
//! nests in one function stay visually distinct: `#next1` vs `#next2`.

use reed_hir::{BindTarget, Expr, ExprKind, Function, Stmt, StmtKind};
use reed_types::LocalId;

/// Per-function allocator for synthetic locals.
#[derive(Debug)]
pub(crate) struct SyntheticNames {
    next_local: LocalId,
    next_nest: u32,
}

impl SyntheticNames {
    /// Build an allocator whose ids start above everything `func` uses.
    pub(crate) fn for_function(func: &Function) -> Self {
        let mut max = 0;
        for param in &func.params {
            max = max.max(param.id);
        }
        watermark_stmts(&func.body, &mut max);
        Self {
            next_local: max + 1,
            next_nest: 1,
        }
    }

    /// Mint a fresh local id.
    pub(crate) fn fresh_local(&mut self) -> LocalId {
        let id = self.next_local;
        self.next_local += 1;
        id
    }

    /// Start naming for a new loop nest.
    pub(crate) fn begin_nest(&mut self) -> NestNames {
        let ordinal = self.next_nest;
        self.next_nest += 1;
        NestNames { ordinal }
    }
}

/// Name builder for one loop nest's synthetic locals.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NestNames {
    ordinal: u32,
}

impl NestNames {
    /// The shared transfer-code variable of the nest.
    pub(crate) fn transfer_code(&self) -> String {
        format!("#next{}", self.ordinal)
    }

    /// The exited flag of the frame at `frame` (index into the nest).
    pub(crate) fn exit_flag(&self, frame: usize) -> String {
        format!("#exit{}_{}", self.ordinal, frame)
    }

    /// The scratch slot for return result position `index`.
    pub(crate) fn return_slot(&self, index: usize) -> String {
        format!("#ret{}_{}", self.ordinal, index)
    }

    /// The proxy callback parameter for loop binding `index` of the frame
    /// at `frame`. Used when the binding assigns an existing local or
    /// discards the value, so the callback still has a parameter to
    /// receive it.
    pub(crate) fn binding_proxy(&self, frame: usize, index: usize) -> String {
        format!("#bind{}_{}_{}", self.ordinal, frame, index)
    }
}

/// Name of the per-function deferred-execution token local.
pub(crate) const DEFER_TOKEN_NAME: &str = "#defertok";

fn watermark_stmts(stmts: &[Stmt], max: &mut LocalId) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Let { id, init, .. } => {
                *max = (*max).max(*id);
                if let Some(init) = init {
                    watermark_expr(init, max);
                }
            }
            StmtKind::Expr(e) => watermark_expr(e, max),
            StmtKind::Return(exprs) => {
                for e in exprs {
                    watermark_expr(e, max);
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                watermark_expr(condition, max);
                watermark_stmts(then_branch, max);
                if let Some(els) = else_branch {
                    watermark_stmts(els, max);
                }
            }
            StmtKind::While {
                condition, body, ..
            } => {
                watermark_expr(condition, max);
                watermark_stmts(body, max);
            }
            StmtKind::ForIter {
                iter,
                bindings,
                body,
                ..
            } => {
                watermark_expr(iter, max);
                for binding in bindings {
                    match &binding.target {
                        BindTarget::Decl { id, .. } => *max = (*max).max(*id),
                        BindTarget::Assign(id) => *max = (*max).max(*id),
                        BindTarget::Discard => {}
                    }
                }
                watermark_stmts(body, max);
            }
            StmtKind::Block(body) => watermark_stmts(body, max),
            StmtKind::Defer { call, token } => {
                watermark_expr(call, max);
                if let Some(t) = token {
                    *max = (*max).max(*t);
                }
            }
            StmtKind::Break(_)
            | StmtKind::Continue(_)
            | StmtKind::Goto(_)
            | StmtKind::Label(_)
            | StmtKind::Fault { .. } => {}
        }
    }
}

fn watermark_expr(expr: &Expr, max: &mut LocalId) {
    match &expr.kind {
        ExprKind::LocalGet(id) => *max = (*max).max(*id),
        ExprKind::LocalSet(id, value) => {
            *max = (*max).max(*id);
            watermark_expr(value, max);
        }
        ExprKind::Unary { operand, .. } => watermark_expr(operand, max),
        ExprKind::Binary { left, right, .. }
        | ExprKind::Compare { left, right, .. }
        | ExprKind::Logical { left, right, .. } => {
            watermark_expr(left, max);
            watermark_expr(right, max);
        }
        ExprKind::Call { callee, args } => {
            watermark_expr(callee, max);
            for arg in args {
                watermark_expr(arg, max);
            }
        }
        ExprKind::Closure {
            params,
            body,
            captures,
            ..
        } => {
            for param in params {
                *max = (*max).max(param.id);
            }
            for cap in captures {
                *max = (*max).max(*cap);
            }
            watermark_stmts(body, max);
        }
        ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::FuncRef(_)
        | ExprKind::DeferAnchor => {}
    }
}
