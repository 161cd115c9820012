//! Arena-based abstract syntax tree (spec.md §3.4, arena design from §9).
//!
//! The original's AST is a cyclic graph of `shared_ptr`-owned nodes (`Scope`
//! <-> `StatementNode` <-> `Scope`), with cycles broken by weak back-refs
//! from inner scopes to their parents. Rust has no ergonomic weak-by-default
//! graph of owned nodes, so per the Design Notes (spec.md §9) this is
//! rebuilt as a [`SyntaxArena`]: flat `Vec`s of node data, indexed by the
//! newtypes in [`crate::id`], with parent back-references as plain
//! `Option<ScopeId>` instead of weak pointers. This sidesteps the cycle
//! entirely -- there is nothing to break, since nothing owns anything by
//! reference.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::{CallId, DefId, ExprId, FileId, ScopeId, StmtId};
use crate::type_id::TypeId;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// A lexical scope: an ordered sequence of statements plus a symbol table
/// (name -> type), and an optional parent (spec.md §3.4: "A `Scope` owns a
/// sequence of statements and a symbol map").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeData {
    pub parent: Option<ScopeId>,
    pub statements: Vec<StmtId>,
    pub symbols: IndexMap<String, TypeId>,
}

impl ScopeData {
    pub fn new(parent: Option<ScopeId>) -> Self {
        ScopeData {
            parent,
            statements: Vec::new(),
            symbols: IndexMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    Increment,
    Decrement,
}

/// A literal value, carrying the inferred type (spec.md §3.4 invariant:
/// "Every `LiteralNode` stores the inferred Type").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(String),
    Float(String),
    Str(String),
    Char(char),
    Bool(bool),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralNode {
    pub value: LiteralValue,
    pub ty: TypeId,
}

/// A call expression/statement. Carries the call site's enclosing scope and
/// a call id monotonically increasing within the enclosing function (spec.md
/// §3.4 invariant), used by the pre-allocation pass to key the call's
/// return-struct temporary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNode {
    pub callee: String,
    pub args: Vec<ExprId>,
    pub scope: ScopeId,
    pub call_id: CallId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprData {
    Literal(LiteralNode),
    /// A variable reference; `is_reference` requests the slot pointer rather
    /// than its loaded value (required in LHS contexts, spec.md §4.3.6).
    Variable {
        name: String,
        is_reference: bool,
    },
    Call(CallNode),
    BinaryOp {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    UnaryOp {
        op: UnaryOp,
        operand: ExprId,
        prefix: bool,
    },
    /// A parenthesised group of (possibly several) expressions, used for
    /// multi-valued contexts (e.g. the LHS of a group assignment).
    Group(Vec<ExprId>),
    /// `DataName{ field: expr, ... }` -- field values in declared field order.
    Initializer {
        data_type: TypeId,
        fields: Vec<ExprId>,
    },
    /// `expr.field`
    DataAccess {
        base: ExprId,
        field_index: u32,
    },
    /// `expr.field1.field2...` -- chained access resolved to a flat index
    /// path (one GEP with multiple indices, spec.md §4.3.6).
    GroupedDataAccess {
        base: ExprId,
        field_path: Vec<u32>,
    },
    /// `target_type(expr)`
    TypeCast {
        target: TypeId,
        operand: ExprId,
    },
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// A single assignable target: either a plain variable or a nested data
/// access path, used by assignment/declaration statement variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTarget {
    pub name: String,
    pub field_path: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtData {
    Assignment {
        target: AssignTarget,
        value: ExprId,
    },
    GroupAssignment {
        targets: Vec<AssignTarget>,
        value: ExprId,
    },
    ArrayAssignment {
        array: ExprId,
        index: ExprId,
        value: ExprId,
    },
    Declaration {
        name: String,
        ty: TypeId,
        /// `None` means no initializer; the slot is zero-initialized
        /// (spec.md §4.3.5).
        init: Option<ExprId>,
    },
    GroupDeclaration {
        names: Vec<(String, TypeId)>,
        init: ExprId,
    },
    Return {
        values: Vec<ExprId>,
    },
    Throw {
        error: TypeId,
        member: String,
    },
    If {
        /// Each arm is `(condition, body)`; the last arm's condition is
        /// `None` for a trailing bare `else`.
        arms: Vec<(Option<ExprId>, ScopeId)>,
    },
    While {
        condition: ExprId,
        body: ScopeId,
    },
    DoWhile {
        body: ScopeId,
        condition: ExprId,
    },
    For {
        init: StmtId,
        condition: ExprId,
        post: StmtId,
        body: ScopeId,
    },
    EnhancedFor {
        index_name: Option<String>,
        value_name: Option<String>,
        iterable: ExprId,
        body: ScopeId,
    },
    ParallelFor {
        index_name: Option<String>,
        value_name: Option<String>,
        iterable: ExprId,
        body: ScopeId,
    },
    Catch {
        /// The guarded call statement.
        guarded: StmtId,
        error_binding: Option<String>,
        body: ScopeId,
    },
    Break,
    Continue,
    UnaryOpStatement {
        op: UnaryOp,
        target: AssignTarget,
    },
    CallStatement(CallNode),
    /// `a, b = f()` written across stacked lines in the source grammar;
    /// kept distinct from `GroupAssignment` per spec.md §3.4's node list.
    StackedAssignment {
        targets: Vec<AssignTarget>,
        value: ExprId,
    },
    StackedArrayAssignment {
        targets: Vec<(ExprId, ExprId)>,
        value: ExprId,
    },
    StackedGroupedAssignment {
        target_groups: Vec<Vec<AssignTarget>>,
        value: ExprId,
    },
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_types: Vec<TypeId>,
    pub body: ScopeId,
    pub is_aligned: bool,
    pub is_const: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataDef {
    pub name: String,
    pub fields: Vec<Param>,
    pub is_shared: bool,
    pub is_immutable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub data_fields: Vec<String>,
    pub func_fields: Vec<String>,
    pub extends: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSetDef {
    pub name: String,
    pub parent: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    pub tags: Vec<(String, Option<TypeId>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDef {
    pub name: String,
    pub body: ScopeId,
    pub should_fail: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseDef {
    /// Either a literal path string or a dotted module path.
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DefData {
    Function(FunctionDef),
    Data(DataDef),
    Entity(EntityDef),
    ErrorSet(ErrorSetDef),
    Variant(VariantDef),
    Enum(EnumDef),
    Test(TestDef),
    Use(UseDef),
}

impl DefData {
    pub fn name(&self) -> &str {
        match self {
            DefData::Function(f) => &f.name,
            DefData::Data(d) => &d.name,
            DefData::Entity(e) => &e.name,
            DefData::ErrorSet(e) => &e.name,
            DefData::Variant(v) => &v.name,
            DefData::Enum(e) => &e.name,
            DefData::Test(t) => &t.name,
            DefData::Use(u) => &u.target,
        }
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Owns a file's top-level definitions, plus the identifying hash of its
/// absolute source path (spec.md §3.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub id: FileId,
    pub path: String,
    pub defs: Vec<DefId>,
}

// ---------------------------------------------------------------------------
// SyntaxArena
// ---------------------------------------------------------------------------

/// Owns every scope, statement, expression, and definition produced while
/// parsing and resolving a program. All cross-references between AST nodes
/// are by index into this arena's vectors, replacing the original's
/// `shared_ptr`/weak-pointer graph (spec.md §9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntaxArena {
    pub scopes: Vec<ScopeData>,
    pub stmts: Vec<StmtData>,
    pub exprs: Vec<ExprData>,
    pub defs: Vec<DefData>,
    next_call_id: u32,
}

impl SyntaxArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData::new(parent));
        id
    }

    pub fn alloc_stmt(&mut self, data: StmtData) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(data);
        id
    }

    pub fn alloc_expr(&mut self, data: ExprData) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(data);
        id
    }

    pub fn alloc_def(&mut self, data: DefData) -> DefId {
        let id = DefId(self.defs.len() as u32);
        self.defs.push(data);
        id
    }

    /// Issues the next call id, monotonically increasing. Callers reset
    /// this per-function by constructing a fresh counter scope if needed;
    /// in practice the generator tracks call ids per function explicitly
    /// (see `flintc-codegen`), and this arena-wide counter is only used
    /// when building a standalone AST in tests.
    pub fn next_call_id(&mut self) -> CallId {
        let id = CallId(self.next_call_id);
        self.next_call_id += 1;
        id
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id.0 as usize]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut ScopeData {
        &mut self.scopes[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &StmtData {
        &self.stmts[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &ExprData {
        &self.exprs[id.0 as usize]
    }

    pub fn def(&self, id: DefId) -> &DefData {
        &self.defs[id.0 as usize]
    }

    /// Appends a statement to a scope's body, in source order.
    pub fn push_stmt(&mut self, scope: ScopeId, stmt: StmtId) {
        self.scope_mut(scope).statements.push(stmt);
    }

    /// Walks up a scope's parent chain looking up a symbol's type,
    /// mirroring the original's scope-chain symbol resolution.
    pub fn resolve_symbol(&self, mut scope: ScopeId, name: &str) -> Option<TypeId> {
        loop {
            let data = self.scope(scope);
            if let Some(&ty) = data.symbols.get(name) {
                return Some(ty);
            }
            scope = data.parent?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_id::TypeRegistry;

    #[test]
    fn symbol_resolution_walks_parent_chain() {
        let mut arena = SyntaxArena::new();
        let reg = TypeRegistry::new();
        let outer = arena.alloc_scope(None);
        arena
            .scope_mut(outer)
            .symbols
            .insert("x".to_string(), reg.primitive_id(crate::types::PrimitiveType::I32));
        let inner = arena.alloc_scope(Some(outer));
        assert_eq!(
            arena.resolve_symbol(inner, "x"),
            Some(reg.primitive_id(crate::types::PrimitiveType::I32))
        );
        assert_eq!(arena.resolve_symbol(inner, "missing"), None);
    }

    #[test]
    fn call_ids_are_monotonic() {
        let mut arena = SyntaxArena::new();
        let a = arena.next_call_id();
        let b = arena.next_call_id();
        assert!(b.0 > a.0);
    }
}
