//! Pre-allocation pass (spec.md §4.3.4).
//!
//! Recursively walks a function's scope tree and emits every stack slot the
//! function will ever need -- declared variables, call-site return-struct
//! temporaries, if-chain condition temporaries, loop iterators -- as
//! `alloca`s in the function's entry block, before any other code. Keyed by
//! `"{scope_id}.{call_id?}.{name}"` (spec.md §4.3.4). This is what makes a
//! deep call tree inside a loop safe: the slot for a call's return struct is
//! allocated once, in the entry block, not once per loop iteration.

use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::values::{FunctionValue, PointerValue};

use flintc_core::ast::{CallNode, ExprData, Param, StmtData, SyntaxArena};
use flintc_core::id::ScopeId;
use flintc_core::type_id::TypeId;

use crate::context::ProgramContext;
use crate::error::CodegenError;
use crate::function::FunctionSig;
use crate::types::{lower_type, return_struct_type};

/// Every pre-allocated slot a function body can reference, keyed exactly as
/// spec.md §4.3.4 specifies.
pub struct Allocations<'ctx> {
    slots: HashMap<String, PointerValue<'ctx>>,
}

impl<'ctx> Allocations<'ctx> {
    pub fn get(&self, key: &str) -> Option<PointerValue<'ctx>> {
        self.slots.get(key).copied()
    }

    pub fn var_key(scope: ScopeId, name: &str) -> String {
        format!("{}..{}", scope.0, name)
    }

    pub fn call_ret_key(scope: ScopeId, call_id: u32) -> String {
        format!("{}.{}.__ret", scope.0, call_id)
    }

    pub fn cond_key(scope: ScopeId, idx: usize) -> String {
        format!("{}..__cond{}", scope.0, idx)
    }

    pub fn iter_key(scope: ScopeId, what: &str) -> String {
        format!("{}..__iter_{}", scope.0, what)
    }
}

/// Walks `scope`'s statement tree (and every nested scope) collecting every
/// slot, then emits the `alloca`s into `entry_builder` (positioned at the
/// function's entry block).
#[allow(clippy::too_many_arguments)]
pub fn run<'ctx>(
    context: &'ctx Context,
    entry_builder: &Builder<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    sigs: &HashMap<String, FunctionSig>,
    function: FunctionValue<'ctx>,
    root_scope: ScopeId,
    params: &[Param],
) -> Result<Allocations<'ctx>, CodegenError> {
    let mut slots = HashMap::new();
    // Parameters get a slot in the function's root scope just like any
    // other declared variable -- a reassignment to a parameter later in
    // the body stores into the same slot its initial value landed in.
    for param in params {
        let lty = lower_type(context, pctx, param.ty)?;
        alloc_slot(entry_builder, context, lty, &Allocations::var_key(root_scope, &param.name), &mut slots)?;
    }
    collect_scope(context, entry_builder, pctx, arena, sigs, function, root_scope, &mut slots)?;
    Ok(Allocations { slots })
}

fn alloc_slot<'ctx>(
    entry_builder: &Builder<'ctx>,
    context: &'ctx Context,
    ty: inkwell::types::BasicTypeEnum<'ctx>,
    key: &str,
    slots: &mut HashMap<String, PointerValue<'ctx>>,
) -> Result<(), CodegenError> {
    if slots.contains_key(key) {
        return Ok(());
    }
    let ptr = entry_builder
        .build_alloca(ty, key)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    // Zero-initialize so a slot read before any store observes its type's
    // zero value rather than uninitialized memory (spec.md §8 invariant 6).
    let zero = zero_value(context, ty);
    entry_builder
        .build_store(ptr, zero)
        .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    slots.insert(key.to_string(), ptr);
    Ok(())
}

fn zero_value<'ctx>(_context: &'ctx Context, ty: inkwell::types::BasicTypeEnum<'ctx>) -> inkwell::values::BasicValueEnum<'ctx> {
    use inkwell::types::BasicTypeEnum::*;
    match ty {
        IntType(t) => t.const_zero().into(),
        FloatType(t) => t.const_zero().into(),
        PointerType(t) => t.const_null().into(),
        ArrayType(t) => t.const_zero().into(),
        StructType(t) => t.const_zero().into(),
        VectorType(t) => t.const_zero().into(),
        ScalableVectorType(t) => t.const_zero().into(),
    }
}

#[allow(clippy::too_many_arguments)]
fn collect_scope<'ctx>(
    context: &'ctx Context,
    entry_builder: &Builder<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    sigs: &HashMap<String, FunctionSig>,
    function: FunctionValue<'ctx>,
    scope: ScopeId,
    slots: &mut HashMap<String, PointerValue<'ctx>>,
) -> Result<(), CodegenError> {
    let _ = function;
    let stmt_ids = arena.scope(scope).statements.clone();
    let mut cond_idx = 0usize;
    for stmt_id in stmt_ids {
        let stmt = arena.stmt(stmt_id).clone();
        collect_expr_calls(context, entry_builder, pctx, arena, sigs, scope, &stmt, slots)?;
        match stmt {
            StmtData::Declaration { name, ty, .. } => {
                let lty = lower_type(context, pctx, ty)?;
                alloc_slot(entry_builder, context, lty, &Allocations::var_key(scope, &name), slots)?;
            }
            StmtData::GroupDeclaration { names, .. } => {
                for (name, ty) in names {
                    let lty = lower_type(context, pctx, ty)?;
                    alloc_slot(entry_builder, context, lty, &Allocations::var_key(scope, &name), slots)?;
                }
            }
            StmtData::If { arms } => {
                for (cond, body) in &arms {
                    if cond.is_some() {
                        alloc_slot(entry_builder, context, context.bool_type().into(), &Allocations::cond_key(scope, cond_idx), slots)?;
                        cond_idx += 1;
                    }
                    collect_scope(context, entry_builder, pctx, arena, sigs, function, *body, slots)?;
                }
            }
            StmtData::While { body, .. } | StmtData::DoWhile { body, .. } => {
                collect_scope(context, entry_builder, pctx, arena, sigs, function, body, slots)?;
            }
            StmtData::For { body, init, post, .. } => {
                collect_scope(context, entry_builder, pctx, arena, sigs, function, body, slots)?;
                let init_stmt = arena.stmt(init).clone();
                collect_expr_calls(context, entry_builder, pctx, arena, sigs, body, &init_stmt, slots)?;
                if let StmtData::Declaration { name, ty, .. } = &init_stmt {
                    let lty = lower_type(context, pctx, *ty)?;
                    alloc_slot(entry_builder, context, lty, &Allocations::var_key(body, name), slots)?;
                }
                let post_stmt = arena.stmt(post).clone();
                collect_expr_calls(context, entry_builder, pctx, arena, sigs, body, &post_stmt, slots)?;
            }
            StmtData::EnhancedFor { index_name, value_name, body, .. } | StmtData::ParallelFor { index_name, value_name, body, .. } => {
                let i64_ty = context.i64_type().into();
                alloc_slot(entry_builder, context, i64_ty, &Allocations::iter_key(body, "index"), slots)?;
                if let Some(name) = &index_name {
                    alloc_slot(entry_builder, context, i64_ty, &Allocations::var_key(body, name), slots)?;
                }
                if let Some(name) = &value_name {
                    // Element type is not resolved at this depth; default to
                    // i64 (matches flintc-check's resolve.rs leaving element
                    // typing to the generator -- see flintc-check/src/resolve.rs).
                    alloc_slot(entry_builder, context, i64_ty, &Allocations::var_key(body, name), slots)?;
                }
                collect_scope(context, entry_builder, pctx, arena, sigs, function, body, slots)?;
            }
            StmtData::Catch { guarded, body, error_binding } => {
                let guarded_stmt = arena.stmt(guarded).clone();
                collect_expr_calls(context, entry_builder, pctx, arena, sigs, scope, &guarded_stmt, slots)?;
                if let Some(name) = error_binding {
                    alloc_slot(entry_builder, context, context.i32_type().into(), &Allocations::var_key(body, &name), slots)?;
                }
                collect_scope(context, entry_builder, pctx, arena, sigs, function, body, slots)?;
            }
            _ => {}
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn collect_expr_calls<'ctx>(
    context: &'ctx Context,
    entry_builder: &Builder<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    sigs: &HashMap<String, FunctionSig>,
    scope: ScopeId,
    stmt: &StmtData,
    slots: &mut HashMap<String, PointerValue<'ctx>>,
) -> Result<(), CodegenError> {
    let mut exprs = Vec::new();
    gather_stmt_exprs(stmt, &mut exprs);
    for e in exprs {
        walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, e, slots)?;
    }
    if let StmtData::CallStatement(call) = stmt {
        alloc_call_ret(context, entry_builder, pctx, sigs, scope, call, slots)?;
        for &arg in &call.args {
            walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, arg, slots)?;
        }
    }
    Ok(())
}

fn gather_stmt_exprs(stmt: &StmtData, out: &mut Vec<flintc_core::id::ExprId>) {
    match stmt {
        StmtData::Assignment { value, .. } => out.push(*value),
        StmtData::GroupAssignment { value, .. } => out.push(*value),
        StmtData::ArrayAssignment { array, index, value } => {
            out.push(*array);
            out.push(*index);
            out.push(*value);
        }
        StmtData::Declaration { init: Some(v), .. } => out.push(*v),
        StmtData::GroupDeclaration { init, .. } => out.push(*init),
        StmtData::Return { values } => out.extend(values.iter().copied()),
        StmtData::StackedAssignment { value, .. } => out.push(*value),
        StmtData::StackedArrayAssignment { targets, value } => {
            for (a, i) in targets {
                out.push(*a);
                out.push(*i);
            }
            out.push(*value);
        }
        StmtData::StackedGroupedAssignment { value, .. } => out.push(*value),
        StmtData::While { condition, .. } | StmtData::DoWhile { condition, .. } => out.push(*condition),
        StmtData::For { condition, .. } => out.push(*condition),
        StmtData::EnhancedFor { iterable, .. } | StmtData::ParallelFor { iterable, .. } => out.push(*iterable),
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn walk_expr_calls<'ctx>(
    context: &'ctx Context,
    entry_builder: &Builder<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    sigs: &HashMap<String, FunctionSig>,
    scope: ScopeId,
    expr_id: flintc_core::id::ExprId,
    slots: &mut HashMap<String, PointerValue<'ctx>>,
) -> Result<(), CodegenError> {
    match arena.expr(expr_id).clone() {
        ExprData::Call(call) => {
            alloc_call_ret(context, entry_builder, pctx, sigs, scope, &call, slots)?;
            for &arg in &call.args {
                walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, arg, slots)?;
            }
        }
        ExprData::BinaryOp { lhs, rhs, .. } => {
            walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, lhs, slots)?;
            walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, rhs, slots)?;
        }
        ExprData::UnaryOp { operand, .. } => {
            walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, operand, slots)?;
        }
        ExprData::Group(items) => {
            for i in items {
                walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, i, slots)?;
            }
        }
        ExprData::Initializer { fields, .. } => {
            for f in fields {
                walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, f, slots)?;
            }
        }
        ExprData::DataAccess { base, .. } | ExprData::GroupedDataAccess { base, .. } => {
            walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, base, slots)?;
        }
        ExprData::TypeCast { operand, .. } => {
            walk_expr_calls(context, entry_builder, pctx, arena, sigs, scope, operand, slots)?;
        }
        ExprData::Literal(_) | ExprData::Variable { .. } => {}
    }
    Ok(())
}

fn alloc_call_ret<'ctx>(
    context: &'ctx Context,
    entry_builder: &Builder<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    sigs: &HashMap<String, FunctionSig>,
    scope: ScopeId,
    call: &CallNode,
    slots: &mut HashMap<String, PointerValue<'ctx>>,
) -> Result<(), CodegenError> {
    if crate::lower::is_builtin_name(&call.callee) {
        // Builtins return a bare value or void, not the `{err, ...}` struct
        // user functions return, so they never need a return-struct slot.
        return Ok(());
    }
    let ret_types: Vec<TypeId> = sigs
        .get(&call.callee)
        .map(|s| s.return_types.clone())
        .unwrap_or_default();
    let st = return_struct_type(context, pctx, &ret_types)?;
    alloc_slot(entry_builder, context, st.into(), &Allocations::call_ret_key(scope, call.call_id.0), slots)
}
