//! Typed-HIR construction helpers.
//!
//! Tests build input programs through a [`Builder`] that mints local
//! ids, label ids and distinct spans, and records an expression type
//! for every node it creates, the way the resolver would have.

use reed_diagnostics::{FileId, Span};
use reed_hir::{
    BinaryOp, BindTarget, Binding, CompareOp, Expr, ExprKind, Function, Param, Stmt, StmtKind,
    TypeTable, UnaryOp,
};
use reed_types::{FuncId, FunctionType, LabelId, LocalId, Type};

/// The type of an iterator over ints: `func(func(Int) bool)`.
pub fn iter_ty() -> Type {
    Type::Func(FunctionType::new(vec![callback_ty()], vec![]))
}

/// The type of the per-element callback: `func(Int) bool`.
pub fn callback_ty() -> Type {
    Type::Func(FunctionType::new(vec![Type::Int], vec![Type::Bool]))
}

pub fn param(id: LocalId, name: &str, ty: Type) -> Param {
    Param {
        id,
        name: name.to_string(),
        ty,
    }
}

pub struct Builder {
    pub types: TypeTable,
    next_local: LocalId,
    next_label: LabelId,
    next_pos: u32,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            types: TypeTable::new(),
            next_local: 0,
            next_label: 0,
            next_pos: 0,
        }
    }

    pub fn local(&mut self) -> LocalId {
        let id = self.next_local;
        self.next_local += 1;
        id
    }

    pub fn label(&mut self) -> LabelId {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    /// A fresh, distinct source position.
    pub fn span(&mut self) -> Span {
        let start = self.next_pos;
        self.next_pos += 2;
        Span::new(FileId(0), start, start + 1)
    }

    fn expr(&mut self, kind: ExprKind, ty: Type) -> Expr {
        let id = self.types.fresh_node();
        self.types.record(id, ty);
        let span = self.span();
        Expr { id, kind, span }
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Int(value), Type::Int)
    }

    pub fn boolean(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Bool(value), Type::Bool)
    }

    pub fn get(&mut self, id: LocalId, ty: Type) -> Expr {
        self.expr(ExprKind::LocalGet(id), ty)
    }

    pub fn set(&mut self, id: LocalId, value: Expr) -> Expr {
        self.expr(ExprKind::LocalSet(id, Box::new(value)), Type::Void)
    }

    pub fn add(&mut self, left: Expr, right: Expr) -> Expr {
        self.binary(BinaryOp::Add, left, right)
    }

    pub fn mul(&mut self, left: Expr, right: Expr) -> Expr {
        self.binary(BinaryOp::Mul, left, right)
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Type::Int,
        )
    }

    pub fn eq(&mut self, left: Expr, right: Expr) -> Expr {
        self.compare(CompareOp::Eq, left, right)
    }

    pub fn lt(&mut self, left: Expr, right: Expr) -> Expr {
        self.compare(CompareOp::Lt, left, right)
    }

    fn compare(&mut self, op: CompareOp, left: Expr, right: Expr) -> Expr {
        self.expr(
            ExprKind::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Type::Bool,
        )
    }

    pub fn not(&mut self, operand: Expr) -> Expr {
        self.expr(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            Type::Bool,
        )
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>, ty: Type) -> Expr {
        self.expr(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            ty,
        )
    }

    pub fn closure(
        &mut self,
        params: Vec<Param>,
        results: Vec<Type>,
        body: Vec<Stmt>,
        captures: Vec<LocalId>,
    ) -> Expr {
        let ty = Type::Func(FunctionType::new(
            params.iter().map(|p| p.ty.clone()).collect(),
            results.clone(),
        ));
        self.expr(
            ExprKind::Closure {
                params,
                results,
                body,
                captures,
            },
            ty,
        )
    }

    fn stmt(&mut self, kind: StmtKind) -> Stmt {
        let span = self.span();
        Stmt::new(kind, span)
    }

    pub fn s_let(&mut self, id: LocalId, name: &str, ty: Type, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Let {
            id,
            name: name.to_string(),
            ty,
            init,
        })
    }

    pub fn s_expr(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn s_ret(&mut self, exprs: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(exprs))
    }

    pub fn s_if(&mut self, condition: Expr, then: Vec<Stmt>, els: Option<Vec<Stmt>>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_branch: then,
            else_branch: els,
        })
    }

    pub fn s_while(&mut self, label: Option<LabelId>, condition: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::While {
            label,
            condition,
            body,
        })
    }

    pub fn s_for(
        &mut self,
        label: Option<LabelId>,
        iter: Expr,
        bindings: Vec<Binding>,
        body: Vec<Stmt>,
    ) -> Stmt {
        self.stmt(StmtKind::ForIter {
            label,
            iter,
            bindings,
            body,
        })
    }

    pub fn bind_decl(&mut self, id: LocalId, name: &str) -> Binding {
        let span = self.span();
        Binding {
            target: BindTarget::Decl {
                id,
                name: name.to_string(),
            },
            ty: Type::Int,
            span,
        }
    }

    pub fn bind_assign(&mut self, id: LocalId) -> Binding {
        let span = self.span();
        Binding {
            target: BindTarget::Assign(id),
            ty: Type::Int,
            span,
        }
    }

    pub fn s_break(&mut self, label: Option<LabelId>) -> Stmt {
        self.stmt(StmtKind::Break(label))
    }

    pub fn s_continue(&mut self, label: Option<LabelId>) -> Stmt {
        self.stmt(StmtKind::Continue(label))
    }

    pub fn s_goto(&mut self, label: LabelId) -> Stmt {
        self.stmt(StmtKind::Goto(label))
    }

    pub fn s_label(&mut self, label: LabelId) -> Stmt {
        self.stmt(StmtKind::Label(label))
    }

    pub fn s_defer(&mut self, call: Expr) -> Stmt {
        self.stmt(StmtKind::Defer { call, token: None })
    }

    pub fn function(
        &mut self,
        id: FuncId,
        name: &str,
        params: Vec<Param>,
        results: Vec<Type>,
        body: Vec<Stmt>,
    ) -> Function {
        let span = self.span();
        Function {
            id,
            name: name.to_string(),
            params,
            results,
            body,
            span,
        }
    }

    /// A compliant iterator yielding `0..n`.
    ///
    /// `tally` (a captured local) is incremented before each yield;
    /// `stop` is incremented when the callback answers `false`, right
    /// before the iterator returns. Both let tests observe exactly how
    /// far iteration went and whether the stop request was honored.
    pub fn range_iter(&mut self, n: i64, tally: Option<LocalId>, stop: Option<LocalId>) -> Expr {
        let yield_p = self.local();
        let i = self.local();

        let zero = self.int(0);
        let decl_i = self.s_let(i, "i", Type::Int, Some(zero));

        let mut loop_body = Vec::new();
        if let Some(t) = tally {
            let cur = self.get(t, Type::Int);
            let one = self.int(1);
            let bump = self.add(cur, one);
            let set = self.set(t, bump);
            loop_body.push(self.s_expr(set));
        }
        let mut stopped = Vec::new();
        if let Some(s) = stop {
            let cur = self.get(s, Type::Int);
            let one = self.int(1);
            let bump = self.add(cur, one);
            let set = self.set(s, bump);
            stopped.push(self.s_expr(set));
        }
        stopped.push(self.s_ret(vec![]));
        let cb = self.get(yield_p, callback_ty());
        let elem = self.get(i, Type::Int);
        let verdict = self.call(cb, vec![elem], Type::Bool);
        let refused = self.not(verdict);
        loop_body.push(self.s_if(refused, stopped, None));
        let cur = self.get(i, Type::Int);
        let one = self.int(1);
        let next = self.add(cur, one);
        let advance = self.set(i, next);
        loop_body.push(self.s_expr(advance));

        let cur = self.get(i, Type::Int);
        let limit = self.int(n);
        let in_range = self.lt(cur, limit);
        let walk = self.s_while(None, in_range, loop_body);

        let captures = tally.into_iter().chain(stop).collect();
        self.closure(
            vec![param(yield_p, "yield", callback_ty())],
            vec![],
            vec![decl_i, walk],
            captures,
        )
    }

    /// A non-compliant iterator: yields every value, ignoring the
    /// callback's verdict entirely.
    pub fn pushy_iter(&mut self, values: &[i64]) -> Expr {
        let yield_p = self.local();
        let mut body = Vec::new();
        for &v in values {
            let cb = self.get(yield_p, callback_ty());
            let elem = self.int(v);
            let call = self.call(cb, vec![elem], Type::Bool);
            body.push(self.s_expr(call));
        }
        self.closure(
            vec![param(yield_p, "yield", callback_ty())],
            vec![],
            body,
            vec![],
        )
    }
}
