//! Diagnostics produced by semantic resolution (spec.md §7 tier 1: "compile-time
//! user errors... collected, formatted with file/line/column, and reported").
//!
//! A `thiserror`-backed enum carrying enough context (scope, expression,
//! expected/actual type) that a caller can render a useful message without
//! re-walking the arena (DESIGN.md records the typecheck-diagnostics module
//! this generalizes from a node/port-based context to a scope/expr-based
//! one).

use flintc_core::{ExprId, ScopeId, StmtId, TypeId};
use serde::{Deserialize, Serialize};

/// A diagnostic raised while resolving scopes, symbols, and types over a
/// [`flintc_core::SyntaxArena`].
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum TypeError {
    /// A declaration's initializer type does not match its declared type and
    /// no implicit (widening) coercion applies -- a narrowing conversion.
    #[error("narrowing conversion in scope {scope}: declared {declared}, initializer is {actual}")]
    NarrowingConversion {
        scope: ScopeId,
        stmt: StmtId,
        declared: TypeId,
        actual: TypeId,
    },

    /// A binary/unary operation was applied to operand types it does not
    /// support (e.g. arithmetic on a non-numeric type).
    #[error("type mismatch in scope {scope}: expected {expected}, got {actual}")]
    TypeMismatch {
        scope: ScopeId,
        expr: ExprId,
        expected: TypeId,
        actual: TypeId,
    },

    /// A variable reference has no binding in its scope chain.
    #[error("unknown symbol '{name}' referenced in scope {scope}")]
    UnknownSymbol { scope: ScopeId, name: String },

    /// An `if`/`while`/`do-while` condition did not resolve to `bool`.
    #[error("non-boolean condition in scope {scope}: got {actual}")]
    NonBooleanCondition {
        scope: ScopeId,
        expr: ExprId,
        actual: TypeId,
    },

    /// A `TypeId` referenced during resolution has no entry in the registry.
    #[error("unknown type: {type_id} not found in registry")]
    UnknownType { type_id: TypeId },
}

/// A suggested fix for a [`TypeError`], mirroring the teacher's
/// `FixSuggestion` (kept small: only the one fix resolution can propose
/// confidently -- inserting an explicit cast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixSuggestion {
    InsertCast { from: TypeId, to: TypeId },
}
