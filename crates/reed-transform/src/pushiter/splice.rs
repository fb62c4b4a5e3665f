//! Statement-list splicing helpers.

use reed_diagnostics::Span;
use reed_hir::{Stmt, StmtKind};
use reed_types::{LocalId, Type};

use super::FunctionCtx;

/// Insert a replacement block where a statement was removed.
pub(crate) fn insert_at(stmts: &mut Vec<Stmt>, index: usize, block: Vec<Stmt>) {
    for (offset, stmt) in block.into_iter().enumerate() {
        stmts.insert(index + offset, stmt);
    }
}

/// Declaration of a shared-state local. These have no source
/// counterpart at all, so they carry a dummy span rather than borrowing
/// the loop's; tooling that maps positions back to source should never
/// land on them.
pub(crate) fn shared_state_decl(
    ctx: &mut FunctionCtx,
    id: LocalId,
    name: String,
    ty: Type,
    init: Option<i64>,
) -> Stmt {
    let init = init.map(|v| ctx.int(v, Span::DUMMY));
    Stmt::new(StmtKind::Let { id, name, ty, init }, Span::DUMMY)
}
