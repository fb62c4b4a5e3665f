//! Type-information side table.
//!
//! The resolver annotates every expression node with its resolved type
//! here, keyed by [`NodeId`]. Passes that synthesize new expressions mint
//! fresh ids from the same table so downstream stages see a complete
//! mapping without special knowledge of any rewrite.

use reed_types::{NodeId, Type};
use std::collections::HashMap;

/// Side table mapping expression nodes to resolved type information.
#[derive(Debug, Default)]
pub struct TypeTable {
    expr_types: HashMap<NodeId, Type>,
    next_node: NodeId,
}

impl TypeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh node id, unused by any recorded expression.
    pub fn fresh_node(&mut self) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        id
    }

    /// Record the type of an expression node. Keeps the id mint ahead of
    /// every recorded id so externally chosen ids stay collision-free.
    pub fn record(&mut self, id: NodeId, ty: Type) {
        self.next_node = self.next_node.max(id + 1);
        self.expr_types.insert(id, ty);
    }

    /// Look up the recorded type of an expression node.
    pub fn expr_type(&self, id: NodeId) -> Option<&Type> {
        self.expr_types.get(&id)
    }

    /// Number of annotated expressions.
    pub fn len(&self) -> usize {
        self.expr_types.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.expr_types.is_empty()
    }
}
