//! Type system for Reed
//!
//! Defines the type representations shared by the resolver, the HIR,
//! and the transformation passes.

/// Unique identifier for functions
pub type FuncId = u32;

/// Unique identifier for local variables (function-scoped)
pub type LocalId = u32;

/// Unique identifier for resolved labels
pub type LabelId = u32;

/// Unique identifier for HIR nodes, used to key the type side table
pub type NodeId = u32;

/// Core type representation
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// No value (statement-typed expressions, result-less calls)
    Void,
    /// Boolean type
    Bool,
    /// Integer type (i64)
    Int,
    /// Floating point type (f64)
    Float,
    /// String type
    String,
    /// Function type
    Func(FunctionType),
    /// Reference to a named type (struct, alias)
    Named(String),
    /// Opaque runtime value the compiler does not inspect
    /// (e.g. the deferred-execution continuation token)
    Opaque,
}

/// Function type information
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    /// Parameter types
    pub params: Vec<Type>,
    /// Result types (Reed functions may return multiple values)
    pub results: Vec<Type>,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, results: Vec<Type>) -> Self {
        Self { params, results }
    }
}

impl Type {
    /// Check if this type is a primitive (bool, int, float, string)
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Bool | Type::Int | Type::Float | Type::String)
    }

    /// For an iterator function type `func(func(T...) bool)`, the type of
    /// the per-element callback it drives. Returns `None` for anything else.
    pub fn iterator_callback(&self) -> Option<&FunctionType> {
        let Type::Func(ft) = self else { return None };
        if ft.params.len() != 1 {
            return None;
        }
        match &ft.params[0] {
            Type::Func(cb) if cb.results == [Type::Bool] => Some(cb),
            _ => None,
        }
    }
}
