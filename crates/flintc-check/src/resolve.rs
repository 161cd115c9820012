//! Scope/symbol population and type resolution over a [`SyntaxArena`]
//! (spec.md §1: "semantic resolution depth" is explicitly out of scope for
//! the generator's sake, but `SPEC_FULL.md` module 1 keeps a small but real
//! checker here -- just enough to populate scope symbol tables and flag
//! narrowing conversions before LLIR lowering runs).
//!
//! Grounded on the teacher's `typecheck::rules`/`validate_graph` shape (walk
//! every node, check each against coercion rules, collect every error rather
//! than stopping at the first), adapted from the teacher's flat compute
//! graph to this crate's arena-based, scope-nested AST.

use flintc_core::{
    AssignTarget, BinaryOp, DefData, ExprData, ExprId, FileNode, FunctionDef, PrimitiveType,
    ScopeId, StmtData, StmtId, SyntaxArena, TypeId, TypeRegistry, UnaryOp,
};

use crate::coercion::{can_coerce, common_numeric_type};
use crate::diagnostics::TypeError;

/// Resolves every function in a file: populates parameter bindings into each
/// function's body scope, then walks statements bottom-up, collecting every
/// [`TypeError`] found (never stops at the first, mirroring the teacher's
/// `validate_graph`).
pub fn check_file(arena: &mut SyntaxArena, registry: &TypeRegistry, file: &FileNode) -> Vec<TypeError> {
    let mut errors = Vec::new();
    let def_ids = file.defs.clone();
    for def_id in def_ids {
        if let DefData::Function(func) = arena.def(def_id).clone() {
            check_function(arena, registry, &func, &mut errors);
        }
    }
    errors
}

fn check_function(arena: &mut SyntaxArena, registry: &TypeRegistry, func: &FunctionDef, errors: &mut Vec<TypeError>) {
    for param in &func.params {
        arena
            .scope_mut(func.body)
            .symbols
            .insert(param.name.clone(), param.ty);
    }
    check_scope(arena, registry, func.body, errors);
}

fn check_scope(arena: &mut SyntaxArena, registry: &TypeRegistry, scope: ScopeId, errors: &mut Vec<TypeError>) {
    let stmt_ids = arena.scope(scope).statements.clone();
    for stmt_id in stmt_ids {
        check_stmt(arena, registry, scope, stmt_id, errors);
    }
}

fn bind(arena: &mut SyntaxArena, scope: ScopeId, name: &str, ty: TypeId) {
    arena.scope_mut(scope).symbols.insert(name.to_string(), ty);
}

fn check_target(arena: &SyntaxArena, registry: &TypeRegistry, scope: ScopeId, target: &AssignTarget, errors: &mut Vec<TypeError>) -> Option<TypeId> {
    let ty = arena.resolve_symbol(scope, &target.name);
    if ty.is_none() {
        errors.push(TypeError::UnknownSymbol {
            scope,
            name: target.name.clone(),
        });
    }
    let _ = registry;
    ty
}

fn check_stmt(arena: &mut SyntaxArena, registry: &TypeRegistry, scope: ScopeId, stmt_id: StmtId, errors: &mut Vec<TypeError>) {
    let stmt = arena.stmt(stmt_id).clone();
    match stmt {
        StmtData::Declaration { name, ty, init } => {
            if let Some(init_expr) = init {
                if let Some(actual) = infer_expr_type(arena, registry, scope, init_expr) {
                    if actual != ty && !can_coerce(actual, ty, registry) {
                        errors.push(TypeError::NarrowingConversion {
                            scope,
                            stmt: stmt_id,
                            declared: ty,
                            actual,
                        });
                    }
                }
            }
            bind(arena, scope, &name, ty);
        }
        StmtData::GroupDeclaration { names, .. } => {
            for (name, ty) in names {
                bind(arena, scope, &name, ty);
            }
        }
        StmtData::Assignment { target, value } => {
            if let Some(declared) = check_target(arena, registry, scope, &target, errors) {
                if let Some(actual) = infer_expr_type(arena, registry, scope, value) {
                    if actual != declared && !can_coerce(actual, declared, registry) {
                        errors.push(TypeError::NarrowingConversion {
                            scope,
                            stmt: stmt_id,
                            declared,
                            actual,
                        });
                    }
                }
            }
        }
        StmtData::GroupAssignment { targets, .. } => {
            for target in &targets {
                check_target(arena, registry, scope, target, errors);
            }
        }
        StmtData::ArrayAssignment { array, index, value } => {
            infer_expr_type(arena, registry, scope, array);
            infer_expr_type(arena, registry, scope, index);
            infer_expr_type(arena, registry, scope, value);
        }
        StmtData::If { arms } => {
            for (cond, body) in arms {
                if let Some(cond_expr) = cond {
                    check_condition(arena, registry, scope, cond_expr, errors);
                }
                check_scope(arena, registry, body, errors);
            }
        }
        StmtData::While { condition, body } | StmtData::DoWhile { body, condition } => {
            check_condition(arena, registry, scope, condition, errors);
            check_scope(arena, registry, body, errors);
        }
        StmtData::For { init, condition, post, body } => {
            check_stmt(arena, registry, body, init, errors);
            check_condition(arena, registry, body, condition, errors);
            check_stmt(arena, registry, body, post, errors);
            check_scope(arena, registry, body, errors);
        }
        StmtData::EnhancedFor { index_name, value_name, iterable, body } => {
            infer_expr_type(arena, registry, scope, iterable);
            if let Some(name) = index_name {
                bind(arena, body, &name, registry.primitive_id(PrimitiveType::I64));
            }
            // Element type of `iterable` is not resolved at this depth; the
            // value binding is left untyped for the generator to infer.
            let _ = value_name;
            check_scope(arena, registry, body, errors);
        }
        StmtData::ParallelFor { iterable, body, .. } => {
            infer_expr_type(arena, registry, scope, iterable);
            check_scope(arena, registry, body, errors);
        }
        StmtData::Catch { guarded, body, .. } => {
            check_stmt(arena, registry, scope, guarded, errors);
            check_scope(arena, registry, body, errors);
        }
        StmtData::CallStatement(call) => {
            for arg in &call.args {
                infer_expr_type(arena, registry, scope, *arg);
            }
        }
        StmtData::UnaryOpStatement { target, .. } => {
            check_target(arena, registry, scope, &target, errors);
        }
        StmtData::StackedAssignment { targets, value } => {
            for target in &targets {
                check_target(arena, registry, scope, target, errors);
            }
            infer_expr_type(arena, registry, scope, value);
        }
        StmtData::StackedArrayAssignment { targets, value } => {
            for (array, index) in &targets {
                infer_expr_type(arena, registry, scope, *array);
                infer_expr_type(arena, registry, scope, *index);
            }
            infer_expr_type(arena, registry, scope, value);
        }
        StmtData::StackedGroupedAssignment { target_groups, value } => {
            for group in &target_groups {
                for target in group {
                    check_target(arena, registry, scope, target, errors);
                }
            }
            infer_expr_type(arena, registry, scope, value);
        }
        StmtData::Return { values } => {
            for v in values {
                infer_expr_type(arena, registry, scope, v);
            }
        }
        StmtData::Throw { .. } | StmtData::Break | StmtData::Continue => {}
    }
}

fn check_condition(arena: &SyntaxArena, registry: &TypeRegistry, scope: ScopeId, expr: ExprId, errors: &mut Vec<TypeError>) {
    if let Some(actual) = infer_expr_type(arena, registry, scope, expr) {
        let bool_id = registry.primitive_id(PrimitiveType::Bool);
        if actual != bool_id {
            errors.push(TypeError::NonBooleanCondition { scope, expr, actual });
        }
    }
}

/// Infers an expression's type from the arena alone -- no cross-file symbol
/// tables, no call-return-type lookup (those require the generator's
/// `ProgramContext`, out of scope for this small checker). Returns `None`
/// when the type genuinely cannot be determined at this depth, e.g. for
/// calls and (grouped) data access; callers treat `None` as "no opinion",
/// not an error.
fn infer_expr_type(arena: &SyntaxArena, registry: &TypeRegistry, scope: ScopeId, expr_id: ExprId) -> Option<TypeId> {
    match arena.expr(expr_id) {
        ExprData::Literal(lit) => Some(lit.ty),
        ExprData::Variable { name, .. } => arena.resolve_symbol(scope, name),
        ExprData::BinaryOp { op, lhs, rhs } => {
            let lt = infer_expr_type(arena, registry, scope, *lhs)?;
            let rt = infer_expr_type(arena, registry, scope, *rhs)?;
            match op {
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::And | BinaryOp::Or => {
                    Some(registry.primitive_id(PrimitiveType::Bool))
                }
                BinaryOp::Add => {
                    let str_id = registry.primitive_id(PrimitiveType::Str);
                    if lt == str_id || rt == str_id {
                        Some(str_id)
                    } else {
                        common_numeric_type(lt, rt, registry)
                    }
                }
                BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
                    common_numeric_type(lt, rt, registry)
                }
            }
        }
        ExprData::UnaryOp { op, operand, .. } => match op {
            UnaryOp::Not => Some(registry.primitive_id(PrimitiveType::Bool)),
            UnaryOp::Negate | UnaryOp::Increment | UnaryOp::Decrement => {
                infer_expr_type(arena, registry, scope, *operand)
            }
        },
        ExprData::Initializer { data_type, .. } => Some(*data_type),
        ExprData::TypeCast { target, .. } => Some(*target),
        ExprData::Group(items) => {
            if items.len() == 1 {
                infer_expr_type(arena, registry, scope, items[0])
            } else {
                None
            }
        }
        ExprData::Call(_) | ExprData::DataAccess { .. } | ExprData::GroupedDataAccess { .. } => None,
    }
}

/// Verifies a `Type` referenced during resolution is actually registered
/// (spec.md §7 tier 2 territory if it isn't -- but at this, user-facing
/// tier, a dangling reference to a type the parser never registered is
/// reported as an ordinary diagnostic, not a panic).
pub fn check_type_registered(registry: &TypeRegistry, type_id: TypeId) -> Option<TypeError> {
    match registry.get(type_id) {
        Ok(_) => None,
        Err(_) => Some(TypeError::UnknownType { type_id }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintc_core::{FileId, Param};

    fn make_add_function(arena: &mut SyntaxArena, registry: &TypeRegistry) -> FunctionDef {
        let body = arena.alloc_scope(None);
        let i32_id = registry.primitive_id(PrimitiveType::I32);
        let lhs = arena.alloc_expr(ExprData::Variable { name: "a".into(), is_reference: false });
        let rhs = arena.alloc_expr(ExprData::Variable { name: "b".into(), is_reference: false });
        let sum = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Add, lhs, rhs });
        let ret = arena.alloc_stmt(StmtData::Return { values: vec![sum] });
        arena.push_stmt(body, ret);
        FunctionDef {
            name: "add".into(),
            params: vec![
                Param { name: "a".into(), ty: i32_id },
                Param { name: "b".into(), ty: i32_id },
            ],
            return_types: vec![i32_id],
            body,
            is_aligned: false,
            is_const: false,
        }
    }

    #[test]
    fn well_typed_function_has_no_errors() {
        let mut arena = SyntaxArena::new();
        let registry = TypeRegistry::new();
        let func = make_add_function(&mut arena, &registry);
        let def_id = arena.alloc_def(DefData::Function(func));
        let file = FileNode { id: FileId(0), path: "a.flint".into(), defs: vec![def_id] };
        let errors = check_file(&mut arena, &registry, &file);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn narrowing_declaration_is_flagged() {
        let mut arena = SyntaxArena::new();
        let registry = TypeRegistry::new();
        let i64_id = registry.primitive_id(PrimitiveType::I64);
        let i32_id = registry.primitive_id(PrimitiveType::I32);

        let body = arena.alloc_scope(None);
        let lit = arena.alloc_expr(ExprData::Literal(flintc_core::ast::LiteralNode {
            value: flintc_core::ast::LiteralValue::Int("5".into()),
            ty: i64_id,
        }));
        let decl = arena.alloc_stmt(StmtData::Declaration {
            name: "x".into(),
            ty: i32_id,
            init: Some(lit),
        });
        arena.push_stmt(body, decl);

        let func = FunctionDef {
            name: "f".into(),
            params: vec![],
            return_types: vec![],
            body,
            is_aligned: false,
            is_const: false,
        };
        let def_id = arena.alloc_def(DefData::Function(func));
        let file = FileNode { id: FileId(0), path: "a.flint".into(), defs: vec![def_id] };
        let errors = check_file(&mut arena, &registry, &file);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TypeError::NarrowingConversion { .. }));
    }

    #[test]
    fn unknown_symbol_in_assignment_is_flagged() {
        let mut arena = SyntaxArena::new();
        let registry = TypeRegistry::new();
        let i32_id = registry.primitive_id(PrimitiveType::I32);
        let body = arena.alloc_scope(None);
        let lit = arena.alloc_expr(ExprData::Literal(flintc_core::ast::LiteralNode {
            value: flintc_core::ast::LiteralValue::Int("1".into()),
            ty: i32_id,
        }));
        let assign = arena.alloc_stmt(StmtData::Assignment {
            target: AssignTarget { name: "missing".into(), field_path: vec![] },
            value: lit,
        });
        arena.push_stmt(body, assign);
        let func = FunctionDef {
            name: "f".into(),
            params: vec![],
            return_types: vec![],
            body,
            is_aligned: false,
            is_const: false,
        };
        let def_id = arena.alloc_def(DefData::Function(func));
        let file = FileNode { id: FileId(0), path: "a.flint".into(), defs: vec![def_id] };
        let errors = check_file(&mut arena, &registry, &file);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TypeError::UnknownSymbol { .. }));
    }
}
