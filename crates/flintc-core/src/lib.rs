pub mod apfloat;
pub mod apint;
pub mod ast;
pub mod error;
pub mod graph;
pub mod id;
pub mod signature;
pub mod signatures;
pub mod threadpool;
pub mod token;
pub mod type_id;
pub mod types;

// Re-export commonly used types
pub use apfloat::APFloat;
pub use apint::APInt;
pub use ast::{
    AssignTarget, BinaryOp, CallNode, DataDef, DefData, EntityDef, EnumDef, ErrorSetDef, ExprData,
    FileNode, FunctionDef, LiteralNode, LiteralValue, Param, ScopeData, StmtData, SyntaxArena,
    TestDef, UnaryOp, UseDef, VariantDef,
};
pub use error::CoreError;
pub use graph::{DepGraph, DepNode};
pub use id::{CallId, DefId, DepNodeId, ExprId, FileId, ModuleId, ScopeId, StmtId};
pub use signature::{Signature, SigElem};
pub use threadpool::{PersistentThreadPool, TaskHandle};
pub use token::{Token, TokenKind};
pub use type_id::{TypeId, TypeRegistry};
pub use types::{MultiWidth, PrimitiveType, Type};
