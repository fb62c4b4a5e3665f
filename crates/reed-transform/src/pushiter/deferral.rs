//! Deferred-call rewiring.
//!
//! A `defer` schedules its call on the deferred list of the lexically
//! enclosing function, to run when that function exits. Once a loop
//! body moves into a synthesized closure, the runtime's notion of "the
//! current function" changes out from under the defer: left alone it
//! would fire at the end of a single iteration.
//!
//! The fix is a continuation token. The first defer that ends up inside
//! a synthesized closure causes a token local to be declared at the top
//! of the original function body, initialized from the runtime's defer
//! anchor. Every such defer is annotated with that token, so the
//! runtime files the call on the original activation's list no matter
//! how many closure frames sit in between. The token rides into the
//! closures through ordinary capture.

use reed_diagnostics::Span;
use reed_hir::{ExprKind, Stmt, StmtKind};
use reed_types::{LocalId, Type};

use super::names::DEFER_TOKEN_NAME;
use super::{FunctionCtx, ScopeState};

/// Annotate a defer found inside a frame body with the enclosing
/// function's token, allocating the token local on first use.
pub(crate) fn rewire(
    token_slot: &mut Option<LocalId>,
    scope: &mut ScopeState,
    ctx: &mut FunctionCtx,
    span: Span,
) {
    let (token, _) = *scope
        .defer_token
        .get_or_insert_with(|| (ctx.names.fresh_local(), span));
    *token_slot = Some(token);
}

/// Declare the token at the top of the function body that owns it.
/// Runs once per scope, after all of the scope's nests are rewritten.
pub(crate) fn install_token(
    body: &mut Vec<Stmt>,
    token: LocalId,
    span: Span,
    ctx: &mut FunctionCtx,
) {
    let anchor = ctx.expr(ExprKind::DeferAnchor, Type::Opaque, span);
    body.insert(
        0,
        Stmt::new(
            StmtKind::Let {
                id: token,
                name: DEFER_TOKEN_NAME.to_string(),
                ty: Type::Opaque,
                init: Some(anchor),
            },
            span,
        ),
    );
}
