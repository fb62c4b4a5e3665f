//! A small reference interpreter for rewritten HIR.
//!
//! Locals are reference cells so closures capturing them observe and
//! perform mutation, matching the runtime's by-reference capture
//! semantics. Deferred calls accumulate per activation and run in LIFO
//! order when the activation finishes; a defer annotated with a token
//! files its call on the activation the token came from.
//!
//! `ForIter` is deliberately unsupported: feeding a program through the
//! interpreter proves the rewrite left none behind.

use reed_hir::{
    BinaryOp, CompareOp, Expr, ExprKind, Function, LogicalOp, Param, Stmt, StmtKind, UnaryOp,
};
use reed_types::{FuncId, LabelId, LocalId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Func(FuncId),
    Closure(Rc<ClosureVal>),
    Defers(DeferList),
    Tuple(Vec<Value>),
}

#[derive(Debug)]
pub struct ClosureVal {
    params: Vec<Param>,
    body: Vec<Stmt>,
    env: HashMap<LocalId, Cell>,
}

pub type Cell = Rc<RefCell<Value>>;
pub type DeferList = Rc<RefCell<Vec<(Value, Vec<Value>)>>>;

#[derive(Debug)]
pub enum InterpError {
    /// A `Fault` statement fired.
    Fault(String),
    /// The program is malformed for this interpreter (an unrewritten
    /// push-style loop, an unknown local, a type confusion).
    Bug(String),
}

enum Flow {
    Normal,
    Break(Option<LabelId>),
    Continue(Option<LabelId>),
    Return(Vec<Value>),
    Goto(LabelId),
}

struct Activation {
    locals: HashMap<LocalId, Cell>,
    defers: DeferList,
}

impl Activation {
    fn cell(&self, id: LocalId) -> Result<Cell, InterpError> {
        self.locals
            .get(&id)
            .cloned()
            .ok_or(InterpError::Bug(format!("unknown local {id}")))
    }
}

pub struct Interp {
    functions: HashMap<FuncId, Function>,
}

impl Interp {
    pub fn new(functions: Vec<Function>) -> Self {
        Self {
            functions: functions.into_iter().map(|f| (f.id, f)).collect(),
        }
    }

    pub fn call_function(
        &self,
        id: FuncId,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, InterpError> {
        let func = self
            .functions
            .get(&id)
            .ok_or(InterpError::Bug(format!("unknown function {id}")))?;
        self.run_activation(&func.params, &func.body, HashMap::new(), args)
    }

    fn invoke(&self, callee: Value, args: Vec<Value>) -> Result<Vec<Value>, InterpError> {
        match callee {
            Value::Closure(c) => self.run_activation(&c.params, &c.body, c.env.clone(), args),
            Value::Func(id) => self.call_function(id, args),
            other => Err(InterpError::Bug(format!("call of non-function {other:?}"))),
        }
    }

    fn run_activation(
        &self,
        params: &[Param],
        body: &[Stmt],
        env: HashMap<LocalId, Cell>,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, InterpError> {
        if params.len() != args.len() {
            return Err(InterpError::Bug(format!(
                "arity mismatch: {} params, {} args",
                params.len(),
                args.len()
            )));
        }
        let mut act = Activation {
            locals: env,
            defers: Rc::new(RefCell::new(Vec::new())),
        };
        for (param, arg) in params.iter().zip(args) {
            act.locals.insert(param.id, Rc::new(RefCell::new(arg)));
        }
        let flow = self.exec_block(body, &mut act)?;
        // Deferred calls run last-in-first-out once the activation is
        // done, and may themselves defer more work.
        loop {
            let next = act.defers.borrow_mut().pop();
            match next {
                Some((callee, args)) => {
                    self.invoke(callee, args)?;
                }
                None => break,
            }
        }
        match flow {
            Flow::Return(values) => Ok(values),
            Flow::Normal => Ok(Vec::new()),
            Flow::Break(_) | Flow::Continue(_) => {
                Err(InterpError::Bug("loop transfer escaped a function".into()))
            }
            Flow::Goto(l) => Err(InterpError::Bug(format!("goto {l} escaped a function"))),
        }
    }

    fn exec_block(&self, stmts: &[Stmt], act: &mut Activation) -> Result<Flow, InterpError> {
        let mut i = 0;
        while i < stmts.len() {
            match self.exec_stmt(&stmts[i], act)? {
                Flow::Normal => i += 1,
                Flow::Goto(target) => {
                    match stmts
                        .iter()
                        .position(|s| matches!(s.kind, StmtKind::Label(l) if l == target))
                    {
                        Some(at) => i = at + 1,
                        None => return Ok(Flow::Goto(target)),
                    }
                }
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, act: &mut Activation) -> Result<Flow, InterpError> {
        match &stmt.kind {
            StmtKind::Let { id, init, .. } => {
                let value = match init {
                    Some(e) => self.eval(e, act)?,
                    None => Value::Unit,
                };
                act.locals.insert(*id, Rc::new(RefCell::new(value)));
                Ok(Flow::Normal)
            }
            StmtKind::Expr(e) => {
                self.eval(e, act)?;
                Ok(Flow::Normal)
            }
            StmtKind::Return(exprs) => {
                let mut values = Vec::with_capacity(exprs.len());
                for e in exprs {
                    values.push(self.eval(e, act)?);
                }
                Ok(Flow::Return(values))
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(condition, act)? {
                    self.exec_block(then_branch, act)
                } else if let Some(els) = else_branch {
                    self.exec_block(els, act)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While {
                label,
                condition,
                body,
            } => {
                while self.eval_bool(condition, act)? {
                    match self.exec_block(body, act)? {
                        Flow::Normal => {}
                        Flow::Continue(l) if l.is_none() || l == *label => {}
                        Flow::Break(l) if l.is_none() || l == *label => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForIter { .. } => Err(InterpError::Bug(
                "push-style loop survived the rewrite".into(),
            )),
            StmtKind::Block(body) => self.exec_block(body, act),
            StmtKind::Break(label) => Ok(Flow::Break(*label)),
            StmtKind::Continue(label) => Ok(Flow::Continue(*label)),
            StmtKind::Goto(label) => Ok(Flow::Goto(*label)),
            StmtKind::Label(_) => Ok(Flow::Normal),
            StmtKind::Defer { call, token } => {
                let ExprKind::Call { callee, args } = &call.kind else {
                    return Err(InterpError::Bug("defer of a non-call".into()));
                };
                let callee = self.eval(callee, act)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval(arg, act)?);
                }
                let list = match token {
                    None => act.defers.clone(),
                    Some(t) => match &*act.cell(*t)?.borrow() {
                        Value::Defers(list) => list.clone(),
                        other => {
                            return Err(InterpError::Bug(format!(
                                "defer token holds {other:?}"
                            )))
                        }
                    },
                };
                list.borrow_mut().push((callee, arg_values));
                Ok(Flow::Normal)
            }
            StmtKind::Fault { message } => Err(InterpError::Fault(message.clone())),
        }
    }

    fn eval_bool(&self, expr: &Expr, act: &mut Activation) -> Result<bool, InterpError> {
        match self.eval(expr, act)? {
            Value::Bool(b) => Ok(b),
            other => Err(InterpError::Bug(format!("expected bool, got {other:?}"))),
        }
    }

    fn eval(&self, expr: &Expr, act: &mut Activation) -> Result<Value, InterpError> {
        match &expr.kind {
            ExprKind::Bool(v) => Ok(Value::Bool(*v)),
            ExprKind::Int(v) => Ok(Value::Int(*v)),
            ExprKind::Float(v) => Ok(Value::Float(*v)),
            ExprKind::Str(v) => Ok(Value::Str(v.clone())),
            ExprKind::LocalGet(id) => {
                let cell = act.cell(*id)?;
                let value = cell.borrow().clone();
                Ok(value)
            }
            ExprKind::LocalSet(id, value) => {
                let value = self.eval(value, act)?;
                *act.cell(*id)?.borrow_mut() = value;
                Ok(Value::Unit)
            }
            ExprKind::Unary { op, operand } => {
                let v = self.eval(operand, act)?;
                match (op, v) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (op, v) => Err(InterpError::Bug(format!("bad unary {op:?} on {v:?}"))),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.eval(left, act)?;
                let r = self.eval(right, act)?;
                match (l, r) {
                    (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
                        BinaryOp::Add => a + b,
                        BinaryOp::Sub => a - b,
                        BinaryOp::Mul => a * b,
                        BinaryOp::Div => a / b,
                        BinaryOp::Mod => a % b,
                    })),
                    (Value::Float(a), Value::Float(b)) => Ok(Value::Float(match op {
                        BinaryOp::Add => a + b,
                        BinaryOp::Sub => a - b,
                        BinaryOp::Mul => a * b,
                        BinaryOp::Div => a / b,
                        BinaryOp::Mod => a % b,
                    })),
                    (l, r) => Err(InterpError::Bug(format!("bad binary on {l:?}, {r:?}"))),
                }
            }
            ExprKind::Compare { op, left, right } => {
                let l = self.eval(left, act)?;
                let r = self.eval(right, act)?;
                let result = match (l, r) {
                    (Value::Int(a), Value::Int(b)) => compare(op, a.cmp(&b)),
                    (Value::Bool(a), Value::Bool(b)) => compare(op, a.cmp(&b)),
                    (Value::Str(a), Value::Str(b)) => compare(op, a.cmp(&b)),
                    (l, r) => {
                        return Err(InterpError::Bug(format!("bad compare on {l:?}, {r:?}")))
                    }
                };
                Ok(Value::Bool(result))
            }
            ExprKind::Logical { op, left, right } => {
                let l = self.eval_bool(left, act)?;
                let short = match op {
                    LogicalOp::And => !l,
                    LogicalOp::Or => l,
                };
                if short {
                    Ok(Value::Bool(l))
                } else {
                    Ok(Value::Bool(self.eval_bool(right, act)?))
                }
            }
            ExprKind::Call { callee, args } => {
                let callee = self.eval(callee, act)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval(arg, act)?);
                }
                let mut results = self.invoke(callee, arg_values)?;
                Ok(match results.len() {
                    0 => Value::Unit,
                    1 => results.remove(0),
                    _ => Value::Tuple(results),
                })
            }
            ExprKind::FuncRef(id) => Ok(Value::Func(*id)),
            ExprKind::Closure {
                params,
                body,
                captures,
                ..
            } => {
                let mut env = HashMap::with_capacity(captures.len());
                for cap in captures {
                    env.insert(*cap, act.cell(*cap)?);
                }
                Ok(Value::Closure(Rc::new(ClosureVal {
                    params: params.clone(),
                    body: body.clone(),
                    env,
                })))
            }
            ExprKind::DeferAnchor => Ok(Value::Defers(act.defers.clone())),
        }
    }
}

fn compare(op: &CompareOp, ordering: std::cmp::Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => ordering.is_ne(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
    }
}

/// Unwrap a result vector into plain ints, for assertions.
pub fn ints(values: &[Value]) -> Vec<i64> {
    values
        .iter()
        .map(|v| match v {
            Value::Int(i) => *i,
            other => panic!("expected int result, got {other:?}"),
        })
        .collect()
}
