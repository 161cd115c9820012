//! Stable ID newtypes for AST and program-graph entities.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that, say, a `ScopeId` cannot be accidentally used where an `ExprId`
//! is expected. Indices are into the arenas owned by [`crate::ast::SyntaxArena`].

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Index into [`crate::ast::SyntaxArena::scopes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

/// Index into [`crate::ast::SyntaxArena::stmts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StmtId(pub u32);

/// Index into [`crate::ast::SyntaxArena::exprs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprId(pub u32);

/// Index into [`crate::ast::SyntaxArena::defs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefId(pub u32);

/// Identity of a source file, stable across a compilation (hash of the
/// absolute path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// Identity of a module (a `use`-addressable unit); distinct from `FileId`
/// so that future multi-file modules do not require renumbering files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

/// A call site's id, monotonically increasing within its enclosing function
/// (spec.md §3.4: "Every `CallNode` stores... a monotonically-increasing
/// call id unique within the enclosing function").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub u32);

/// Node id in the per-program dependency graph ([`crate::graph::DepGraph`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepNodeId(pub u32);

macro_rules! display_as_inner {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

display_as_inner!(ScopeId, StmtId, ExprId, DefId, FileId, ModuleId, CallId, DepNodeId);

impl From<NodeIndex<u32>> for DepNodeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        DepNodeId(idx.index() as u32)
    }
}

impl From<DepNodeId> for NodeIndex<u32> {
    fn from(id: DepNodeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_node_id_to_node_index_roundtrip() {
        let idx = NodeIndex::<u32>::new(42);
        let id = DepNodeId::from(idx);
        assert_eq!(id.0, 42);
        let back: NodeIndex<u32> = id.into();
        assert_eq!(back.index(), 42);
    }

    #[test]
    fn ids_are_distinct_types() {
        let scope = ScopeId(1);
        let stmt = StmtId(1);
        // Same inner value, different types -- this is a compile-time guarantee;
        // we just check the inner values agree.
        assert_eq!(scope.0, stmt.0);
    }

    #[test]
    fn display_impls() {
        assert_eq!(format!("{}", ScopeId(3)), "3");
        assert_eq!(format!("{}", CallId(7)), "7");
        assert_eq!(format!("{}", FileId(0)), "0");
    }

    #[test]
    fn serde_roundtrip() {
        let id = ExprId(9);
        let json = serde_json::to_string(&id).unwrap();
        let back: ExprId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
