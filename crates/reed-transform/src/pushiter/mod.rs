//! Push-style iteration elimination.
//!
//! A push-style loop `for x in iter { body }` hands control to the
//! iterator function: `iter` drives the iteration itself, invoking a
//! per-element callback until the sequence ends or the callback returns
//! `false`. Code generation has no notion of such loops, so this pass
//! rewrites each one into an explicit call `iter(closure)` where the
//! closure holds the loop body.
//!
//! The difficulty is non-local control. A `break L`, `return` or `goto`
//! inside the body must cross the iterator's own stack frames, which the
//! rewrite cannot unwind directly. Instead the body's closure records
//! the intent in a shared integer transfer code, returns `false` to stop
//! the iterator, and synthesized checks after each iterator call replay
//! the transfer once control is back in a scope where the target is
//! visible. Per-loop "exited" flags catch iterators that keep calling
//! the callback after being told to stop.
//!
//! The pass runs after resolution and type checking, rewrites the HIR in
//! place, and leaves no `ForIter` statement behind.

mod classify;
mod deferral;
mod names;
mod rewrite;
mod splice;

use crate::fault::TranslationFault;
use log::debug;
use reed_diagnostics::Span;
use reed_hir::{Expr, ExprKind, Function, Module, Stmt, StmtKind, TypeTable};
use reed_types::{LabelId, LocalId, Type};
use std::collections::HashMap;

/// Message of the fault trap guarding replayed loop-body closures.
pub const REPLAY_FAULT_MESSAGE: &str = "iterator function resumed iteration after loop exit";

/// Rewrite every push-style loop in `functions`, in place.
///
/// On success no `ForIter` statement remains anywhere, including inside
/// closure bodies. On failure the HIR is left partially rewritten and
/// must be discarded; all faults found are reported together.
pub fn rewrite(
    functions: &mut [Function],
    types: &mut TypeTable,
) -> Result<(), Vec<TranslationFault>> {
    let mut faults = Vec::new();
    for func in functions.iter_mut() {
        if !has_push_loop(&func.body) {
            continue;
        }
        debug!("eliminating push-style loops in `{}`", func.name);
        let mut ctx = FunctionCtx {
            types,
            names: names::SyntheticNames::for_function(func),
            faults: Vec::new(),
            func_name: func.name.clone(),
        };
        process_scope(&mut func.body, func.results.clone(), &mut ctx);
        faults.append(&mut ctx.faults);
    }
    if faults.is_empty() {
        Ok(())
    } else {
        Err(faults)
    }
}

/// [`rewrite`] over every function of a module.
pub fn rewrite_module(
    module: &mut Module,
    types: &mut TypeTable,
) -> Result<(), Vec<TranslationFault>> {
    rewrite(&mut module.functions, types)
}

/// Per-function rewrite state: the type table for minting annotated
/// expressions, the synthetic-local allocator, and the faults found so
/// far.
pub(crate) struct FunctionCtx<'a> {
    pub types: &'a mut TypeTable,
    pub names: names::SyntheticNames,
    pub faults: Vec<TranslationFault>,
    pub func_name: String,
}

impl FunctionCtx<'_> {
    /// Build an expression and record its type.
    pub(crate) fn expr(&mut self, kind: ExprKind, ty: Type, span: Span) -> Expr {
        let id = self.types.fresh_node();
        self.types.record(id, ty);
        Expr { id, kind, span }
    }

    pub(crate) fn int(&mut self, value: i64, span: Span) -> Expr {
        self.expr(ExprKind::Int(value), Type::Int, span)
    }

    pub(crate) fn bool_lit(&mut self, value: bool, span: Span) -> Expr {
        self.expr(ExprKind::Bool(value), Type::Bool, span)
    }

    pub(crate) fn get(&mut self, local: LocalId, ty: Type, span: Span) -> Expr {
        self.expr(ExprKind::LocalGet(local), ty, span)
    }

    /// An assignment statement `local = value`.
    pub(crate) fn set_stmt(&mut self, local: LocalId, value: Expr, span: Span) -> Stmt {
        let set = self.expr(ExprKind::LocalSet(local, Box::new(value)), Type::Void, span);
        Stmt::new(StmtKind::Expr(set), span)
    }
}

/// Function-scope state shared across the nests of one function or
/// closure body: where escalated returns land, the deferred-execution
/// token (allocated on first use), and the label markers anchored at
/// this scope.
pub(crate) struct ScopeState {
    pub results: Vec<Type>,
    pub defer_token: Option<(LocalId, Span)>,
    pub anchors: HashMap<LabelId, Option<usize>>,
}

/// Rewrite all nests inside one function or closure body.
pub(crate) fn process_scope(body: &mut Vec<Stmt>, results: Vec<Type>, ctx: &mut FunctionCtx) {
    let mut scope = ScopeState {
        results,
        defer_token: None,
        anchors: HashMap::new(),
    };
    classify::collect_label_anchors(body, None, &mut scope.anchors);
    let mut ordinary = Vec::new();
    walk_stmts(body, &mut ordinary, &mut scope, ctx);
    if let Some((token, span)) = scope.defer_token {
        deferral::install_token(body, token, span, ctx);
    }
}

/// Walk a statement list outside any nest, tracking the labels of
/// enclosing ordinary loops so the root frame of a nest found here knows
/// which loop labels are still in scope at its continuation.
fn walk_stmts(
    stmts: &mut Vec<Stmt>,
    ordinary: &mut Vec<LabelId>,
    scope: &mut ScopeState,
    ctx: &mut FunctionCtx,
) {
    let mut i = 0;
    while i < stmts.len() {
        match &mut stmts[i].kind {
            StmtKind::ForIter { .. } => {
                let stmt = stmts.remove(i);
                let block = rewrite::rewrite_nest(stmt, ordinary, scope, ctx);
                let advance = block.len();
                splice::insert_at(stmts, i, block);
                i += advance;
                continue;
            }
            StmtKind::While {
                label,
                condition,
                body,
            } => {
                walk_expr(condition, ctx);
                let labeled = *label;
                if let Some(l) = labeled {
                    ordinary.push(l);
                }
                walk_stmts(body, ordinary, scope, ctx);
                if labeled.is_some() {
                    ordinary.pop();
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                walk_expr(condition, ctx);
                walk_stmts(then_branch, ordinary, scope, ctx);
                if let Some(els) = else_branch {
                    walk_stmts(els, ordinary, scope, ctx);
                }
            }
            StmtKind::Block(body) => walk_stmts(body, ordinary, scope, ctx),
            StmtKind::Let { init, .. } => {
                if let Some(init) = init {
                    walk_expr(init, ctx);
                }
            }
            StmtKind::Expr(e) => walk_expr(e, ctx),
            StmtKind::Return(exprs) => {
                for e in exprs {
                    walk_expr(e, ctx);
                }
            }
            // A defer at function scope runs off the current activation's
            // own list; only defers inside synthesized closures need the
            // token rewired.
            StmtKind::Defer { call, .. } => walk_expr(call, ctx),
            StmtKind::Break(_)
            | StmtKind::Continue(_)
            | StmtKind::Goto(_)
            | StmtKind::Label(_)
            | StmtKind::Fault { .. } => {}
        }
        i += 1;
    }
}

/// Descend into closure literals; each closure body is its own function
/// scope with its own nests, returns and deferred calls.
pub(crate) fn walk_expr(expr: &mut Expr, ctx: &mut FunctionCtx) {
    match &mut expr.kind {
        ExprKind::Closure { results, body, .. } => {
            let results = results.clone();
            process_scope(body, results, ctx);
        }
        ExprKind::LocalSet(_, value) => walk_expr(value, ctx),
        ExprKind::Unary { operand, .. } => walk_expr(operand, ctx),
        ExprKind::Binary { left, right, .. }
        | ExprKind::Compare { left, right, .. }
        | ExprKind::Logical { left, right, .. } => {
            walk_expr(left, ctx);
            walk_expr(right, ctx);
        }
        ExprKind::Call { callee, args } => {
            walk_expr(callee, ctx);
            for arg in args {
                walk_expr(arg, ctx);
            }
        }
        ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::LocalGet(_)
        | ExprKind::FuncRef(_)
        | ExprKind::DeferAnchor => {}
    }
}

fn has_push_loop(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::ForIter { .. } => true,
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            expr_has_push_loop(condition)
                || has_push_loop(then_branch)
                || else_branch.as_deref().is_some_and(has_push_loop)
        }
        StmtKind::While {
            condition, body, ..
        } => expr_has_push_loop(condition) || has_push_loop(body),
        StmtKind::Block(body) => has_push_loop(body),
        StmtKind::Let { init, .. } => init.as_ref().is_some_and(expr_has_push_loop),
        StmtKind::Expr(e) => expr_has_push_loop(e),
        StmtKind::Return(exprs) => exprs.iter().any(expr_has_push_loop),
        StmtKind::Defer { call, .. } => expr_has_push_loop(call),
        _ => false,
    })
}

fn expr_has_push_loop(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Closure { body, .. } => has_push_loop(body),
        ExprKind::LocalSet(_, value) => expr_has_push_loop(value),
        ExprKind::Unary { operand, .. } => expr_has_push_loop(operand),
        ExprKind::Binary { left, right, .. }
        | ExprKind::Compare { left, right, .. }
        | ExprKind::Logical { left, right, .. } => {
            expr_has_push_loop(left) || expr_has_push_loop(right)
        }
        ExprKind::Call { callee, args } => {
            expr_has_push_loop(callee) || args.iter().any(expr_has_push_loop)
        }
        _ => false,
    }
}
