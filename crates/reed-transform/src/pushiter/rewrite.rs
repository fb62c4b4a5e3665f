//! The nested-loop rewrite engine.
//!
//! A nest is the maximal tree of push-style loops lexically contained in
//! one another within a single function body; the engine rewrites a
//! whole nest at a time so non-local transfers can ride one shared
//! transfer code across every frame boundary between their origin and
//! their target.
//!
//! Transfer code protocol, shared by the synthesized closures, the
//! post-call guards, and the continuation after the root frame's call:
//!
//! - `0`: no transfer pending.
//! - `-1`: bare `return` of the enclosing function.
//! - `-2`: valued `return`; operands are parked in per-position scratch
//!   locals at the origin.
//! - `-3, -4, ...`: one code per distinct escalated branch target
//!   (`goto`, or `break`/`continue` of an ordinary loop beyond a frame
//!   boundary). Replayed by the guard of the outermost frame that still
//!   sees the target, then reset.
//! - positive `2*levels` / `2*levels + 1`: `break` / `continue` of an
//!   outer frame `levels` frame boundaries up. Each guard crossed
//!   subtracts 2; the guard that reaches `2` or `3` owns the target
//!   frame and resolves the transfer, resetting the code.
//!
//! Every closure that originates a transfer sets the exited flag of each
//! frame it will unwind, before returning `false` to its iterator. Each
//! closure starts by trapping if its own flag is already set, so an
//! iterator that ignores the stop request faults instead of replaying
//! the body.

use log::{debug, trace};
use reed_diagnostics::Span;
use reed_hir::{BindTarget, BinaryOp, CompareOp, Expr, ExprKind, Param, Stmt, StmtKind};
use reed_types::{FunctionType, LabelId, LocalId, Type};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::classify::{self, BranchKind, FramePlan, LabelEnv, Scope, Verdict};
use super::{deferral, splice, walk_expr, FunctionCtx, ScopeState, REPLAY_FAULT_MESSAGE};
use crate::fault::TranslationFault;

/// An escalated branch target outside the nest's frames. One transfer
/// code per distinct (kind, label) pair, replayed at each recorded site.
struct BranchUse {
    kind: BranchKind,
    label: LabelId,
    code: i64,
    /// Frames whose post-call guard replays the branch; 0 means the
    /// continuation after the root frame's call.
    sites: BTreeSet<usize>,
    span: Span,
}

/// Rewrite state for one nest.
struct NestState {
    names: super::names::NestNames,
    frames: Vec<FramePlan>,
    branches: Vec<BranchUse>,
    /// Shared transfer-code local, allocated on first escalation.
    transfer: Option<LocalId>,
    /// Scratch locals for valued-return operands, one per result
    /// position of the enclosing function.
    ret_slots: Vec<LocalId>,
    has_bare_return: bool,
    has_valued_return: bool,
    /// Label markers in scope, by owning frame (`None` = function scope).
    anchors: HashMap<LabelId, Option<usize>>,
    /// Escalated transfers originated so far. Guards are only emitted
    /// after iterator calls whose frame subtree originated at least one.
    escalations: usize,
}

impl NestState {
    fn transfer_local(&mut self, ctx: &mut FunctionCtx) -> LocalId {
        *self.transfer.get_or_insert_with(|| ctx.names.fresh_local())
    }

    fn branch_code(&mut self, kind: BranchKind, label: LabelId, site: usize, span: Span) -> i64 {
        if let Some(b) = self
            .branches
            .iter_mut()
            .find(|b| b.kind == kind && b.label == label)
        {
            b.sites.insert(site);
            return b.code;
        }
        let code = -3 - self.branches.len() as i64;
        self.branches.push(BranchUse {
            kind,
            label,
            code,
            sites: BTreeSet::from([site]),
            span,
        });
        code
    }
}

/// Rewrite one nest rooted at a `ForIter` statement into its
/// replacement block: shared-state declarations, the root frame's
/// iterator call, and the continuation that settles whatever transfer
/// code survives the unwind.
pub(crate) fn rewrite_nest(
    stmt: Stmt,
    outer_ordinary: &[LabelId],
    scope: &mut ScopeState,
    ctx: &mut FunctionCtx,
) -> Vec<Stmt> {
    let span = stmt.span;
    let StmtKind::ForIter {
        label,
        iter,
        bindings,
        body,
    } = stmt.kind
    else {
        return vec![stmt];
    };

    let mut nest = NestState {
        names: ctx.names.begin_nest(),
        frames: Vec::new(),
        branches: Vec::new(),
        transfer: None,
        ret_slots: Vec::new(),
        has_bare_return: false,
        has_valued_return: false,
        anchors: scope.anchors.clone(),
        escalations: 0,
    };

    let mut env = LabelEnv::new();
    for l in outer_ordinary {
        env.push(Scope::Ordinary { label: Some(*l) });
    }

    let (mut block, root) =
        rewrite_frame(None, label, iter, bindings, body, span, &mut env, &mut nest, scope, ctx);
    block.push(set_flag(nest.frames[root].exit_local, span, ctx));
    block.extend(build_continuation(&nest, scope, ctx, span));

    debug!(
        "rewrote push-iteration nest in `{}`: {} frame(s), {} escalated transfer(s)",
        ctx.func_name,
        nest.frames.len(),
        nest.escalations
    );

    let mut out = Vec::new();
    if let Some(transfer) = nest.transfer {
        out.push(splice::shared_state_decl(
            ctx,
            transfer,
            nest.names.transfer_code(),
            Type::Int,
            Some(0),
        ));
    }
    for (i, slot) in nest.ret_slots.iter().enumerate() {
        let ty = scope.results.get(i).cloned().unwrap_or(Type::Void);
        out.push(splice::shared_state_decl(
            ctx,
            *slot,
            nest.names.return_slot(i),
            ty,
            None,
        ));
    }
    out.extend(block);
    out
}

/// Rewrite one frame of the nest into `[let #exit = false, iter(closure)]`.
/// The caller appends the flag-set and, when needed, the guard.
#[allow(clippy::too_many_arguments)]
fn rewrite_frame(
    parent: Option<usize>,
    label: Option<LabelId>,
    mut iter: Expr,
    bindings: Vec<reed_hir::Binding>,
    body: Vec<Stmt>,
    span: Span,
    env: &mut LabelEnv,
    nest: &mut NestState,
    scope: &mut ScopeState,
    ctx: &mut FunctionCtx,
) -> (Vec<Stmt>, usize) {
    let index = nest.frames.len();
    let depth = parent.map_or(1, |p| nest.frames[p].depth + 1);
    let exit_local = ctx.names.fresh_local();
    nest.frames.push(FramePlan {
        parent,
        depth,
        label,
        exit_local,
        span,
    });

    walk_expr(&mut iter, ctx);
    check_iterator_shape(&iter, bindings.len(), ctx);

    // Callback parameters. Decl bindings become parameters directly;
    // assignments and discards go through a proxy parameter, with the
    // assignment performed first thing in the body.
    let mut params = Vec::with_capacity(bindings.len());
    let mut prologue = Vec::new();
    for (i, binding) in bindings.into_iter().enumerate() {
        match binding.target {
            BindTarget::Decl { id, name } => params.push(Param {
                id,
                name,
                ty: binding.ty,
            }),
            BindTarget::Assign(target) => {
                let proxy = ctx.names.fresh_local();
                params.push(Param {
                    id: proxy,
                    name: nest.names.binding_proxy(index, i),
                    ty: binding.ty.clone(),
                });
                let value = ctx.get(proxy, binding.ty, binding.span);
                prologue.push(ctx.set_stmt(target, value, binding.span));
            }
            BindTarget::Discard => {
                let proxy = ctx.names.fresh_local();
                params.push(Param {
                    id: proxy,
                    name: nest.names.binding_proxy(index, i),
                    ty: binding.ty,
                });
            }
        }
    }

    classify::collect_label_anchors(&body, Some(index), &mut nest.anchors);
    env.push(Scope::Frame { index });
    let new_body = rewrite_body(body, index, env, nest, scope, ctx);
    env.pop();

    let mut closure_body = Vec::with_capacity(new_body.len() + prologue.len() + 2);
    let replayed = ctx.get(exit_local, Type::Bool, span);
    closure_body.push(Stmt::new(
        StmtKind::If {
            condition: replayed,
            then_branch: vec![Stmt::new(
                StmtKind::Fault {
                    message: REPLAY_FAULT_MESSAGE.to_string(),
                },
                span,
            )],
            else_branch: None,
        },
        span,
    ));
    closure_body.extend(prologue);
    closure_body.extend(new_body);
    let keep_going = ctx.bool_lit(true, span);
    closure_body.push(Stmt::new(StmtKind::Return(vec![keep_going]), span));

    let captures = free_locals(&params, &closure_body);
    let closure_ty = Type::Func(FunctionType::new(
        params.iter().map(|p| p.ty.clone()).collect(),
        vec![Type::Bool],
    ));
    let closure = ctx.expr(
        ExprKind::Closure {
            params,
            results: vec![Type::Bool],
            body: closure_body,
            captures,
        },
        closure_ty,
        span,
    );
    let call = ctx.expr(
        ExprKind::Call {
            callee: Box::new(iter),
            args: vec![closure],
        },
        Type::Void,
        span,
    );

    let off = ctx.bool_lit(false, span);
    let block = vec![
        Stmt::new(
            StmtKind::Let {
                id: exit_local,
                name: nest.names.exit_flag(index),
                ty: Type::Bool,
                init: Some(off),
            },
            span,
        ),
        Stmt::new(StmtKind::Expr(call), span),
    ];
    (block, index)
}

/// Rewrite the statements of one frame body.
fn rewrite_body(
    stmts: Vec<Stmt>,
    frame: usize,
    env: &mut LabelEnv,
    nest: &mut NestState,
    scope: &mut ScopeState,
    ctx: &mut FunctionCtx,
) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        let span = stmt.span;
        match stmt.kind {
            StmtKind::Break(label) => {
                match classify::classify_break(env, &nest.frames, label) {
                    Some(verdict) => emit_loop_transfer(&mut out, verdict, label, false, frame, span, nest, ctx),
                    None => unresolved(label, span, ctx, &mut out, StmtKind::Break(label)),
                }
            }
            StmtKind::Continue(label) => {
                match classify::classify_continue(env, &nest.frames, label) {
                    Some(verdict) => emit_loop_transfer(&mut out, verdict, label, true, frame, span, nest, ctx),
                    None => unresolved(label, span, ctx, &mut out, StmtKind::Continue(label)),
                }
            }
            StmtKind::Goto(label) => match classify::classify_goto(env, &nest.anchors, label) {
                Some(Verdict::Keep) => out.push(Stmt::new(StmtKind::Goto(label), span)),
                Some(Verdict::Escalated { kind, label, site }) => {
                    emit_branch(&mut out, kind, label, site, frame, span, nest, ctx);
                }
                _ => unresolved(Some(label), span, ctx, &mut out, StmtKind::Goto(label)),
            },
            StmtKind::Return(mut exprs) => {
                for e in &mut exprs {
                    walk_expr(e, ctx);
                }
                emit_return(&mut out, exprs, frame, span, nest, scope, ctx);
            }
            StmtKind::ForIter {
                label,
                iter,
                bindings,
                body,
            } => {
                let before = nest.escalations;
                let (block, child) =
                    rewrite_frame(Some(frame), label, iter, bindings, body, span, env, nest, scope, ctx);
                out.extend(block);
                out.push(set_flag(nest.frames[child].exit_local, span, ctx));
                if nest.escalations > before {
                    if let Some(guard) = build_guard(child, nest, ctx) {
                        out.push(guard);
                    }
                }
            }
            StmtKind::While {
                label,
                mut condition,
                body,
            } => {
                walk_expr(&mut condition, ctx);
                env.push(Scope::Ordinary { label });
                let body = rewrite_body(body, frame, env, nest, scope, ctx);
                env.pop();
                out.push(Stmt::new(
                    StmtKind::While {
                        label,
                        condition,
                        body,
                    },
                    span,
                ));
            }
            StmtKind::If {
                mut condition,
                then_branch,
                else_branch,
            } => {
                walk_expr(&mut condition, ctx);
                let then_branch = rewrite_body(then_branch, frame, env, nest, scope, ctx);
                let else_branch =
                    else_branch.map(|els| rewrite_body(els, frame, env, nest, scope, ctx));
                out.push(Stmt::new(
                    StmtKind::If {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    span,
                ));
            }
            StmtKind::Block(body) => {
                let body = rewrite_body(body, frame, env, nest, scope, ctx);
                out.push(Stmt::new(StmtKind::Block(body), span));
            }
            StmtKind::Let {
                id,
                name,
                ty,
                mut init,
            } => {
                if let Some(init) = &mut init {
                    walk_expr(init, ctx);
                }
                out.push(Stmt::new(StmtKind::Let { id, name, ty, init }, span));
            }
            StmtKind::Expr(mut e) => {
                walk_expr(&mut e, ctx);
                out.push(Stmt::new(StmtKind::Expr(e), span));
            }
            StmtKind::Defer {
                mut call,
                mut token,
            } => {
                walk_expr(&mut call, ctx);
                deferral::rewire(&mut token, scope, ctx, span);
                out.push(Stmt::new(StmtKind::Defer { call, token }, span));
            }
            kind @ (StmtKind::Label(_) | StmtKind::Fault { .. }) => {
                out.push(Stmt::new(kind, span));
            }
        }
    }
    out
}

/// Emit the replacement for a classified `break`/`continue`.
#[allow(clippy::too_many_arguments)]
fn emit_loop_transfer(
    out: &mut Vec<Stmt>,
    verdict: Verdict,
    label: Option<LabelId>,
    repeat: bool,
    frame: usize,
    span: Span,
    nest: &mut NestState,
    ctx: &mut FunctionCtx,
) {
    match verdict {
        Verdict::Keep => {
            let kind = if repeat {
                StmtKind::Continue(label)
            } else {
                StmtKind::Break(label)
            };
            out.push(Stmt::new(kind, span));
        }
        Verdict::LocalExit { repeat } => {
            if repeat {
                // Repeating the current frame is just a compliant
                // "keep going" answer to the iterator.
                let keep_going = ctx.bool_lit(true, span);
                out.push(Stmt::new(StmtKind::Return(vec![keep_going]), span));
            } else {
                out.push(set_flag(nest.frames[frame].exit_local, span, ctx));
                let stop = ctx.bool_lit(false, span);
                out.push(Stmt::new(StmtKind::Return(vec![stop]), span));
            }
        }
        Verdict::OuterFrame { target, repeat } => {
            let levels = (nest.frames[frame].depth - nest.frames[target].depth) as i64;
            let code = if repeat { 2 * levels + 1 } else { 2 * levels };
            let mut flags = path_to(&nest.frames, frame, target);
            if repeat {
                // The target frame itself keeps iterating.
                flags.pop();
            }
            trace!(
                "frame {frame}: {} of frame {target} rides code {code}",
                if repeat { "continue" } else { "break" }
            );
            emit_escalation(out, code, &flags, span, nest, ctx);
        }
        Verdict::Escalated { kind, label, site } => {
            emit_branch(out, kind, label, site, frame, span, nest, ctx);
        }
    }
}

/// Emit an escalated branch: dedicated code, flags down to the replay
/// site, stop the iterators in between.
#[allow(clippy::too_many_arguments)]
fn emit_branch(
    out: &mut Vec<Stmt>,
    kind: BranchKind,
    label: LabelId,
    site: usize,
    frame: usize,
    span: Span,
    nest: &mut NestState,
    ctx: &mut FunctionCtx,
) {
    let code = nest.branch_code(kind, label, site, span);
    let flags = path_to(&nest.frames, frame, site);
    trace!("frame {frame}: escalated {kind:?} to label {label} rides code {code}");
    emit_escalation(out, code, &flags, span, nest, ctx);
}

/// Emit an escalated `return`: park operands, signal the unwind of the
/// whole nest.
fn emit_return(
    out: &mut Vec<Stmt>,
    exprs: Vec<Expr>,
    frame: usize,
    span: Span,
    nest: &mut NestState,
    scope: &mut ScopeState,
    ctx: &mut FunctionCtx,
) {
    let code = if exprs.is_empty() {
        nest.has_bare_return = true;
        -1
    } else {
        nest.has_valued_return = true;
        if nest.ret_slots.is_empty() {
            nest.ret_slots = scope.results.iter().map(|_| ctx.names.fresh_local()).collect();
        }
        let slots = nest.ret_slots.clone();
        for (slot, value) in slots.into_iter().zip(exprs) {
            let at = value.span;
            out.push(ctx.set_stmt(slot, value, at));
        }
        -2
    };
    let flags = path_to(&nest.frames, frame, 0);
    trace!("frame {frame}: return rides code {code}");
    emit_escalation(out, code, &flags, span, nest, ctx);
}

/// Write the transfer code, set the exited flags of every frame the
/// unwind crosses, and stop the innermost iterator.
fn emit_escalation(
    out: &mut Vec<Stmt>,
    code: i64,
    flags: &[usize],
    span: Span,
    nest: &mut NestState,
    ctx: &mut FunctionCtx,
) {
    let transfer = nest.transfer_local(ctx);
    let value = ctx.int(code, span);
    out.push(ctx.set_stmt(transfer, value, span));
    for &f in flags {
        out.push(set_flag(nest.frames[f].exit_local, span, ctx));
    }
    let stop = ctx.bool_lit(false, span);
    out.push(Stmt::new(StmtKind::Return(vec![stop]), span));
    nest.escalations += 1;
}

fn unresolved(
    label: Option<LabelId>,
    span: Span,
    ctx: &mut FunctionCtx,
    out: &mut Vec<Stmt>,
    original: StmtKind,
) {
    ctx.faults.push(TranslationFault::UnresolvedLabel {
        function: ctx.func_name.clone(),
        label: label.unwrap_or_default(),
        span,
    });
    out.push(Stmt::new(original, span));
}

/// Sanity check the iterated expression against the type side table.
fn check_iterator_shape(iter: &Expr, binding_count: usize, ctx: &mut FunctionCtx) {
    let Some(ty) = ctx.types.expr_type(iter.id).cloned() else {
        return;
    };
    match ty.iterator_callback() {
        None => ctx.faults.push(TranslationFault::NotAnIterator {
            function: ctx.func_name.clone(),
            span: iter.span,
        }),
        Some(cb) if cb.params.len() != binding_count => {
            ctx.faults.push(TranslationFault::LoopBindingArity {
                function: ctx.func_name.clone(),
                expected: cb.params.len(),
                found: binding_count,
                span: iter.span,
            });
        }
        Some(_) => {}
    }
}

/// The post-call guard inside the parent of `child`. Decides, from the
/// transfer code, whether the parent's closure keeps running, repeats,
/// replays a branch, or keeps unwinding.
fn build_guard(child: usize, nest: &mut NestState, ctx: &mut FunctionCtx) -> Option<Stmt> {
    let transfer = nest.transfer?;
    let span = nest.frames[child].span;
    let mut then = Vec::new();

    // Positive codes: exits and repeats of outer frames. A code above 3
    // still has frame boundaries to cross; 2 exits and 3 repeats the
    // frame this guard's closure belongs to.
    let decremented = {
        let current = ctx.get(transfer, Type::Int, span);
        let two = ctx.int(2, span);
        ctx.expr(
            ExprKind::Binary {
                op: BinaryOp::Sub,
                left: Box::new(current),
                right: Box::new(two),
            },
            Type::Int,
            span,
        )
    };
    let stop = ctx.bool_lit(false, span);
    let pass_up = vec![
        ctx.set_stmt(transfer, decremented, span),
        Stmt::new(StmtKind::Return(vec![stop]), span),
    ];
    let zero = ctx.int(0, span);
    let reset = ctx.set_stmt(transfer, zero, span);
    let keep_going = ctx.bool_lit(true, span);
    let repeat_here = vec![reset, Stmt::new(StmtKind::Return(vec![keep_going]), span)];

    let mut positive = Vec::new();
    positive.push(compare_if(ctx, transfer, CompareOp::Ge, 4, pass_up, span));
    positive.push(compare_if(ctx, transfer, CompareOp::Eq, 3, repeat_here, span));
    let zero = ctx.int(0, span);
    positive.push(ctx.set_stmt(transfer, zero, span));
    let stop = ctx.bool_lit(false, span);
    positive.push(Stmt::new(StmtKind::Return(vec![stop]), span));
    then.push(compare_if(ctx, transfer, CompareOp::Ge, 2, positive, span));

    // Branches whose replay site is this guard.
    for i in 0..nest.branches.len() {
        if !nest.branches[i].sites.contains(&child) {
            continue;
        }
        let replay = branch_replay(&nest.branches[i], transfer, ctx);
        let (code, at) = (nest.branches[i].code, nest.branches[i].span);
        then.push(compare_if(ctx, transfer, CompareOp::Eq, code, replay, at));
    }

    // Anything else (returns, branches for outer sites) keeps unwinding.
    let stop = ctx.bool_lit(false, span);
    then.push(Stmt::new(StmtKind::Return(vec![stop]), span));

    Some(compare_if(ctx, transfer, CompareOp::Ne, 0, then, span))
}

/// The continuation after the root frame's call: settle escalated
/// returns and the branches whose targets are visible at function
/// scope.
fn build_continuation(
    nest: &NestState,
    scope: &ScopeState,
    ctx: &mut FunctionCtx,
    span: Span,
) -> Vec<Stmt> {
    let Some(transfer) = nest.transfer else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if nest.has_bare_return {
        let body = vec![Stmt::new(StmtKind::Return(Vec::new()), span)];
        out.push(compare_if(ctx, transfer, CompareOp::Eq, -1, body, span));
    }
    if nest.has_valued_return {
        let values = nest
            .ret_slots
            .iter()
            .zip(&scope.results)
            .map(|(slot, ty)| ctx.get(*slot, ty.clone(), span))
            .collect();
        let body = vec![Stmt::new(StmtKind::Return(values), span)];
        out.push(compare_if(ctx, transfer, CompareOp::Eq, -2, body, span));
    }
    for branch in &nest.branches {
        if !branch.sites.contains(&0) {
            continue;
        }
        let replay = branch_replay(branch, transfer, ctx);
        out.push(compare_if(ctx, transfer, CompareOp::Eq, branch.code, replay, branch.span));
    }
    out
}

/// `#next = 0` followed by the branch statement itself.
fn branch_replay(branch: &BranchUse, transfer: LocalId, ctx: &mut FunctionCtx) -> Vec<Stmt> {
    let zero = ctx.int(0, branch.span);
    let reset = ctx.set_stmt(transfer, zero, branch.span);
    let stmt = match branch.kind {
        BranchKind::Goto => StmtKind::Goto(branch.label),
        BranchKind::Break => StmtKind::Break(Some(branch.label)),
        BranchKind::Continue => StmtKind::Continue(Some(branch.label)),
    };
    vec![reset, Stmt::new(stmt, branch.span)]
}

/// `if #next <op> <code> { body }`
fn compare_if(
    ctx: &mut FunctionCtx,
    transfer: LocalId,
    op: CompareOp,
    code: i64,
    body: Vec<Stmt>,
    span: Span,
) -> Stmt {
    let left = ctx.get(transfer, Type::Int, span);
    let right = ctx.int(code, span);
    let condition = ctx.expr(
        ExprKind::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        Type::Bool,
        span,
    );
    Stmt::new(
        StmtKind::If {
            condition,
            then_branch: body,
            else_branch: None,
        },
        span,
    )
}

/// `flag = true`
fn set_flag(flag: LocalId, span: Span, ctx: &mut FunctionCtx) -> Stmt {
    let on = ctx.bool_lit(true, span);
    ctx.set_stmt(flag, on, span)
}

/// Frame indices from `from` up to `ancestor`, both inclusive.
fn path_to(frames: &[FramePlan], from: usize, ancestor: usize) -> Vec<usize> {
    let mut path = Vec::new();
    let mut cur = from;
    loop {
        path.push(cur);
        if cur == ancestor {
            break;
        }
        match frames[cur].parent {
            Some(p) => cur = p,
            None => break,
        }
    }
    path
}

/// Locals a synthesized closure reads or writes without declaring.
/// Nested closures contribute their capture lists; their bodies are
/// already self-contained.
fn free_locals(params: &[Param], body: &[Stmt]) -> Vec<LocalId> {
    let mut used = BTreeSet::new();
    let mut bound: HashSet<LocalId> = params.iter().map(|p| p.id).collect();
    free_in_stmts(body, &mut used, &mut bound);
    used.into_iter().filter(|id| !bound.contains(id)).collect()
}

fn free_in_stmts(stmts: &[Stmt], used: &mut BTreeSet<LocalId>, bound: &mut HashSet<LocalId>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Let { id, init, .. } => {
                bound.insert(*id);
                if let Some(init) = init {
                    free_in_expr(init, used, bound);
                }
            }
            StmtKind::Expr(e) => free_in_expr(e, used, bound),
            StmtKind::Return(exprs) => {
                for e in exprs {
                    free_in_expr(e, used, bound);
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                free_in_expr(condition, used, bound);
                free_in_stmts(then_branch, used, bound);
                if let Some(els) = else_branch {
                    free_in_stmts(els, used, bound);
                }
            }
            StmtKind::While {
                condition, body, ..
            } => {
                free_in_expr(condition, used, bound);
                free_in_stmts(body, used, bound);
            }
            StmtKind::ForIter {
                iter,
                bindings,
                body,
                ..
            } => {
                free_in_expr(iter, used, bound);
                for binding in bindings {
                    match &binding.target {
                        BindTarget::Decl { id, .. } => {
                            bound.insert(*id);
                        }
                        BindTarget::Assign(id) => {
                            used.insert(*id);
                        }
                        BindTarget::Discard => {}
                    }
                }
                free_in_stmts(body, used, bound);
            }
            StmtKind::Block(body) => free_in_stmts(body, used, bound),
            StmtKind::Defer { call, token } => {
                free_in_expr(call, used, bound);
                if let Some(t) = token {
                    used.insert(*t);
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

fn free_in_expr(expr: &Expr, used: &mut BTreeSet<LocalId>, bound: &mut HashSet<LocalId>) {
    match &expr.kind {
        ExprKind::LocalGet(id) => {
            used.insert(*id);
        }
        ExprKind::LocalSet(id, value) => {
            used.insert(*id);
            free_in_expr(value, used, bound);
        }
        ExprKind::Unary { operand, .. } => free_in_expr(operand, used, bound),
        ExprKind::Binary { left, right, .. }
        | ExprKind::Compare { left, right, .. }
        | ExprKind::Logical { left, right, .. } => {
            free_in_expr(left, used, bound);
            free_in_expr(right, used, bound);
        }
        ExprKind::Call { callee, args } => {
            free_in_expr(callee, used, bound);
            for arg in args {
                free_in_expr(arg, used, bound);
            }
        }
        ExprKind::Closure { captures, .. } => {
            for cap in captures {
                used.insert(*cap);
            }
        }
        ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::FuncRef(_)
        | ExprKind::DeferAnchor => {}
    }
}
