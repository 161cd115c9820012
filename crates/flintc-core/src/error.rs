//! Core error types for flintc-core.
//!
//! Per spec.md §7, only tier-1 "compile-time user error" conditions that can
//! arise purely from malformed core data (looking up a dangling id, a
//! duplicate type name) are represented as `Result::Err` here. Tier-2
//! "internal compiler bug" conditions -- arbitrary-precision division by
//! zero, an ill-formed numeric literal string, a non-integer `APFloat`
//! exponent -- are modelled as panics (see `apint.rs`/`apfloat.rs`), matching
//! the original's `assert`-based fatal errors.

use thiserror::Error;

use crate::id::{DefId, DepNodeId, ExprId, FileId, ScopeId};
use crate::type_id::TypeId;

/// Core errors produced by the flintc-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Attempting to register a type name that already exists in the registry.
    #[error("duplicate type name: '{name}'")]
    DuplicateTypeName { name: String },

    /// A `TypeId` was not found in the type registry.
    #[error("type not found: {id}")]
    TypeNotFound { id: TypeId },

    /// A `DefId` was not found in the syntax arena.
    #[error("definition not found: DefId({})", id.0)]
    DefNotFound { id: DefId },

    /// A `ScopeId` was not found in the syntax arena.
    #[error("scope not found: ScopeId({})", id.0)]
    ScopeNotFound { id: ScopeId },

    /// An `ExprId` was not found in the syntax arena.
    #[error("expression not found: ExprId({})", id.0)]
    ExprNotFound { id: ExprId },

    /// A file was not reachable from the program's root dependency node
    /// (spec.md §3.4 invariant: every definition must be reachable from the
    /// root `DepNode`).
    #[error("file not reachable from dependency root: FileId({})", id.0)]
    FileUnreachable { id: FileId },

    /// A cycle was detected while walking the dependency graph leaves-first.
    #[error("dependency cycle detected at DepNodeId({})", id.0)]
    DependencyCycle { id: DepNodeId },
}
