//! Statement and expression lowering (spec.md §4.3.5, §4.3.6).
//!
//! A [`FunctionLowerer`] drives a single function body through the
//! pre-allocated slots built by [`crate::prealloc`]. Every expression lowers
//! to a [`GroupMapping`] -- almost always one value, but a `Group` expression
//! (the right-hand side of a group/stacked assignment) yields several, hence
//! `SmallVec` over `Vec` to avoid heap-allocating the common single-value
//! case (spec.md §4.3.6). Every lowering entry point takes the lexical
//! `ScopeId` it runs in explicitly -- the arena's expression nodes don't
//! carry a scope of their own (only `CallNode` does, for call-id keying),
//! so the scope a variable reference resolves against is whatever scope its
//! enclosing statement was lowered in.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{BasicValue, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::IntPredicate;
use smallvec::{smallvec, SmallVec};

use flintc_core::ast::{
    AssignTarget, BinaryOp, CallNode, ExprData, LiteralValue, StmtData, SyntaxArena, UnaryOp,
};
use flintc_core::id::{ExprId, FileId, ScopeId};
use flintc_core::types::{PrimitiveType, Type};

use crate::context::{mangled_fn_name, signature_key, CallKey, ProgramContext};
use crate::error::CodegenError;
use crate::function::FunctionSig;
use crate::library;
use crate::prealloc::Allocations;
use crate::types::{lower_type, return_struct_type};

/// The result of lowering an expression: almost always exactly one value.
pub type GroupMapping<'ctx> = SmallVec<[BasicValueEnum<'ctx>; 1]>;

/// Names `resolve_builtin` maps onto the compiler-emitted library (spec.md
/// §4.5) instead of user-function resolution. Most return a bare value (or
/// void) rather than the `{err, ...}` struct every user function returns,
/// so the pre-allocation pass never gives these call sites a return-struct
/// slot (see `prealloc::alloc_call_ret`); `assert` and `file_read` are the
/// two exceptions that can fail (spec.md §4.5.7, §4.5.10) -- their call
/// lowering extracts the error itself and rethrows, bypassing that slot
/// entirely, so they stay off the pre-allocation path too.
const BUILTIN_NAMES: &[&str] = &[
    "print",
    "print_str",
    "read_line",
    "assert",
    "to_str",
    "file_exists",
    "file_read",
    "file_write",
    "file_append",
    "env_get",
    "env_set",
    "sin",
    "cos",
    "sqrt",
    "abs",
    "min",
    "max",
];

pub fn is_builtin_name(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

pub struct FunctionLowerer<'a, 'ctx> {
    pub context: &'ctx Context,
    pub module: &'a Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub pctx: &'a mut ProgramContext<'ctx>,
    pub arena: &'a SyntaxArena,
    pub sigs: &'a HashMap<String, FunctionSig>,
    pub allocations: &'a Allocations<'ctx>,
    pub function: FunctionValue<'ctx>,
    pub file_id: FileId,
    loop_exit_stack: Vec<BasicBlock<'ctx>>,
    loop_continue_stack: Vec<BasicBlock<'ctx>>,
    /// Depth of enclosing `catch` bodies; a call lowered while this is
    /// nonzero does not auto-rethrow (spec.md §4.3.5).
    catch_depth: u32,
    return_types: Vec<flintc_core::type_id::TypeId>,
}

impl<'a, 'ctx> FunctionLowerer<'a, 'ctx> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: &'ctx Context,
        module: &'a Module<'ctx>,
        builder: Builder<'ctx>,
        pctx: &'a mut ProgramContext<'ctx>,
        arena: &'a SyntaxArena,
        sigs: &'a HashMap<String, FunctionSig>,
        allocations: &'a Allocations<'ctx>,
        function: FunctionValue<'ctx>,
        file_id: FileId,
        return_types: Vec<flintc_core::type_id::TypeId>,
    ) -> Self {
        FunctionLowerer {
            context,
            module,
            builder,
            pctx,
            arena,
            sigs,
            allocations,
            function,
            file_id,
            loop_exit_stack: Vec::new(),
            loop_continue_stack: Vec::new(),
            catch_depth: 0,
            return_types,
        }
    }

    /// Lowers every statement in `scope`, in source order (spec.md §4.3.5).
    pub fn lower_scope(&mut self, scope: ScopeId) -> Result<(), CodegenError> {
        let stmt_ids = self.arena.scope(scope).statements.clone();
        for stmt_id in stmt_ids {
            self.lower_stmt(scope, stmt_id)?;
            if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_some() {
                // A `return`/`break`/`continue` already closed this block;
                // later statements in the same scope are unreachable.
                break;
            }
        }
        Ok(())
    }

    fn lower_stmt(&mut self, scope: ScopeId, stmt_id: flintc_core::id::StmtId) -> Result<(), CodegenError> {
        let stmt = self.arena.stmt(stmt_id).clone();
        match stmt {
            StmtData::Declaration { name, init, .. } => {
                let slot = self.slot(scope, &name)?;
                if let Some(init_expr) = init {
                    let value = self.lower_expr_single(scope, init_expr)?;
                    self.builder.build_store(slot, value).map_err(llvm_err)?;
                }
            }
            StmtData::GroupDeclaration { names, init } => {
                let values = self.lower_expr(scope, init)?;
                for (i, (name, _ty)) in names.iter().enumerate() {
                    let slot = self.slot(scope, name)?;
                    if let Some(v) = values.get(i) {
                        self.builder.build_store(slot, *v).map_err(llvm_err)?;
                    }
                }
            }
            StmtData::Assignment { target, value } => {
                let rhs = self.lower_expr_single(scope, value)?;
                let slot = self.resolve_assign_target(scope, &target)?;
                self.builder.build_store(slot, rhs).map_err(llvm_err)?;
            }
            StmtData::GroupAssignment { targets, value } => {
                let values = self.lower_expr(scope, value)?;
                for (i, target) in targets.iter().enumerate() {
                    let slot = self.resolve_assign_target(scope, target)?;
                    if let Some(v) = values.get(i) {
                        self.builder.build_store(slot, *v).map_err(llvm_err)?;
                    }
                }
            }
            StmtData::StackedAssignment { targets, value } => {
                let values = self.lower_expr(scope, value)?;
                for (i, target) in targets.iter().enumerate() {
                    let slot = self.resolve_assign_target(scope, target)?;
                    if let Some(v) = values.get(i) {
                        self.builder.build_store(slot, *v).map_err(llvm_err)?;
                    }
                }
            }
            StmtData::StackedGroupedAssignment { target_groups, value } => {
                let values = self.lower_expr(scope, value)?;
                let mut idx = 0usize;
                for group in &target_groups {
                    for target in group {
                        let slot = self.resolve_assign_target(scope, target)?;
                        if let Some(v) = values.get(idx) {
                            self.builder.build_store(slot, *v).map_err(llvm_err)?;
                        }
                        idx += 1;
                    }
                }
            }
            StmtData::ArrayAssignment { array, index, value } => {
                let array_ptr = self.lower_expr_single(scope, array)?.into_pointer_value();
                let index_val = self.lower_expr_single(scope, index)?.into_int_value();
                let rhs = self.lower_expr_single(scope, value)?;
                let elem_ptr = unsafe {
                    self.builder
                        .build_gep(rhs.get_type(), array_ptr, &[index_val], "array_elem")
                        .map_err(llvm_err)?
                };
                self.builder.build_store(elem_ptr, rhs).map_err(llvm_err)?;
            }
            StmtData::StackedArrayAssignment { targets, value } => {
                let values = self.lower_expr(scope, value)?;
                for (i, (array_expr, index_expr)) in targets.iter().enumerate() {
                    let array_ptr = self.lower_expr_single(scope, *array_expr)?.into_pointer_value();
                    let index_val = self.lower_expr_single(scope, *index_expr)?.into_int_value();
                    if let Some(v) = values.get(i) {
                        let elem_ptr = unsafe {
                            self.builder
                                .build_gep(v.get_type(), array_ptr, &[index_val], "array_elem")
                                .map_err(llvm_err)?
                        };
                        self.builder.build_store(elem_ptr, *v).map_err(llvm_err)?;
                    }
                }
            }
            StmtData::Return { values } => {
                self.lower_return(scope, &values)?;
            }
            StmtData::Throw { error, member: _ } => {
                // Error sets lower to i32 ids, resolved from the registry's
                // `ErrorSet` variant. A Throw exits the function through the
                // same return-struct convention as a normal return, with
                // `err` set and every value field left zeroed (spec.md
                // §4.3.5, §7 tier 3).
                let err_code = self.error_id_of(error)?;
                let st = return_struct_type(self.context, self.pctx, &self.return_types)?;
                let mut agg: inkwell::values::AggregateValueEnum = st.get_undef().into();
                agg = self
                    .builder
                    .build_insert_value(agg, self.context.i32_type().const_int(err_code as u64, true), 0, "with_err")
                    .map_err(llvm_err)?;
                self.builder.build_return(Some(&agg.as_basic_value_enum())).map_err(llvm_err)?;
            }
            StmtData::If { arms } => {
                self.lower_if(scope, &arms)?;
            }
            StmtData::While { condition, body } => {
                self.lower_while(scope, condition, body, false)?;
            }
            StmtData::DoWhile { condition, body } => {
                self.lower_while(scope, condition, body, true)?;
            }
            StmtData::For { init, condition, post, body } => {
                self.lower_for(init, condition, post, body)?;
            }
            StmtData::EnhancedFor { index_name, value_name, iterable, body } => {
                self.lower_enhanced_for(scope, index_name, value_name, iterable, body)?;
            }
            StmtData::ParallelFor { index_name, value_name, iterable, body } => {
                // Lowered sequentially: the compiler-emitted runtime has no
                // work-stealing executor, only the driver's own
                // PersistentThreadPool, which schedules file generation, not
                // user loop bodies. Iteration order and results match a
                // `for`; only wall-clock parallelism is absent.
                self.lower_enhanced_for(scope, index_name, value_name, iterable, body)?;
            }
            StmtData::Catch { guarded, error_binding, body } => {
                self.lower_catch(scope, guarded, error_binding, body)?;
            }
            StmtData::Break => {
                let target = *self.loop_exit_stack.last().ok_or_else(|| CodegenError::InvalidProgram("break outside loop".into()))?;
                self.builder.build_unconditional_branch(target).map_err(llvm_err)?;
            }
            StmtData::Continue => {
                let target = *self
                    .loop_continue_stack
                    .last()
                    .ok_or_else(|| CodegenError::InvalidProgram("continue outside loop".into()))?;
                self.builder.build_unconditional_branch(target).map_err(llvm_err)?;
            }
            StmtData::UnaryOpStatement { op, target } => {
                let slot = self.resolve_assign_target(scope, &target)?;
                let current = self.builder.build_load(self.context.i64_type(), slot, "current").map_err(llvm_err)?.into_int_value();
                let one = current.get_type().const_int(1, true);
                let updated = match op {
                    UnaryOp::Increment => self.builder.build_int_add(current, one, "incremented").map_err(llvm_err)?,
                    UnaryOp::Decrement => self.builder.build_int_sub(current, one, "decremented").map_err(llvm_err)?,
                    _ => return Err(CodegenError::Unsupported("unary-op statement other than ++/--".into())),
                };
                self.builder.build_store(slot, updated).map_err(llvm_err)?;
            }
            StmtData::CallStatement(call) => {
                self.lower_call_stmt(&call)?;
            }
        }
        Ok(())
    }

    fn slot(&self, scope: ScopeId, name: &str) -> Result<PointerValue<'ctx>, CodegenError> {
        self.find_slot(scope, name)
            .ok_or_else(|| CodegenError::InvalidProgram(format!("no pre-allocated slot for `{}`", name)))
    }

    /// Walks the scope's parent chain looking for a pre-allocated slot,
    /// mirroring `SyntaxArena::resolve_symbol`'s own scope-chain walk --
    /// a variable declared in an enclosing scope (e.g. a loop counter read
    /// from inside the loop body) still resolves correctly.
    fn find_slot(&self, mut scope: ScopeId, name: &str) -> Option<PointerValue<'ctx>> {
        loop {
            if let Some(p) = self.allocations.get(&Allocations::var_key(scope, name)) {
                return Some(p);
            }
            scope = self.arena.scope(scope).parent?;
        }
    }

    fn resolve_assign_target(&mut self, scope: ScopeId, target: &AssignTarget) -> Result<PointerValue<'ctx>, CodegenError> {
        let base = self.slot(scope, &target.name)?;
        if target.field_path.is_empty() {
            return Ok(base);
        }
        // `field_path` is resolved against the declared variable's data
        // struct type by generator-level field-order bookkeeping; here we
        // just GEP through the chain (spec.md §4.3.6: "one GEP with
        // multiple indices").
        let indices: Vec<inkwell::values::IntValue<'ctx>> = target
            .field_path
            .iter()
            .map(|&i| self.context.i32_type().const_int(i as u64, false))
            .collect();
        let mut full = vec![self.context.i32_type().const_zero()];
        full.extend(indices);
        let elem_ptr = unsafe {
            self.builder
                .build_gep(self.context.i8_type(), base, &full, "field_ptr")
                .map_err(llvm_err)?
        };
        Ok(elem_ptr)
    }

    fn error_id_of(&self, error_type: flintc_core::type_id::TypeId) -> Result<i32, CodegenError> {
        let ty = self
            .pctx
            .registry
            .get(error_type)
            .map_err(|e| CodegenError::TypeMapping(e.to_string()))?;
        match ty {
            Type::ErrorSet { id, .. } => Ok(id),
            _ => Err(CodegenError::TypeMapping("Throw target is not an error-set type".into())),
        }
    }

    fn lower_return(&mut self, scope: ScopeId, values: &[ExprId]) -> Result<(), CodegenError> {
        let st = return_struct_type(self.context, self.pctx, &self.return_types)?;
        let mut agg: inkwell::values::AggregateValueEnum = st.get_undef().into();
        agg = self
            .builder
            .build_insert_value(agg, self.context.i32_type().const_zero(), 0, "ok_err")
            .map_err(llvm_err)?;
        for (i, &value_expr) in values.iter().enumerate() {
            let v = self.lower_expr_single(scope, value_expr)?;
            agg = self.builder.build_insert_value(agg, v, (i + 1) as u32, "with_value").map_err(llvm_err)?;
        }
        self.builder.build_return(Some(&agg.as_basic_value_enum())).map_err(llvm_err)?;
        Ok(())
    }

    fn lower_if(&mut self, scope: ScopeId, arms: &[(Option<ExprId>, ScopeId)]) -> Result<(), CodegenError> {
        let merge_block = self.context.append_basic_block(self.function, "if_merge");
        let mut cond_idx = 0usize;
        let mut next_check: Option<BasicBlock<'ctx>> = None;

        for (i, (cond, body)) in arms.iter().enumerate() {
            let body_block = self.context.append_basic_block(self.function, "if_body");
            if let Some(check_block) = next_check.take() {
                self.builder.position_at_end(check_block);
            }
            match cond {
                Some(cond_expr) => {
                    let cond_val = self.lower_expr_single(scope, *cond_expr)?.into_int_value();
                    let slot = self
                        .allocations
                        .get(&Allocations::cond_key(scope, cond_idx))
                        .ok_or_else(|| CodegenError::InvalidProgram("missing if-condition slot".into()))?;
                    self.builder.build_store(slot, cond_val).map_err(llvm_err)?;
                    cond_idx += 1;
                    let is_last = i + 1 == arms.len();
                    let else_block = if is_last {
                        merge_block
                    } else {
                        self.context.append_basic_block(self.function, "if_check")
                    };
                    self.builder.build_conditional_branch(cond_val, body_block, else_block).map_err(llvm_err)?;
                    if !is_last {
                        next_check = Some(else_block);
                    }
                }
                None => {
                    self.builder.build_unconditional_branch(body_block).map_err(llvm_err)?;
                }
            }
            self.builder.position_at_end(body_block);
            self.lower_scope(*body)?;
            if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
                self.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;
            }
        }
        if let Some(check_block) = next_check {
            self.builder.position_at_end(check_block);
            self.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;
        }
        self.builder.position_at_end(merge_block);
        Ok(())
    }

    fn lower_while(&mut self, scope: ScopeId, condition: ExprId, body: ScopeId, is_do_while: bool) -> Result<(), CodegenError> {
        let cond_block = self.context.append_basic_block(self.function, "while_cond");
        let body_block = self.context.append_basic_block(self.function, "while_body");
        let exit_block = self.context.append_basic_block(self.function, "while_exit");

        let entry_block = if is_do_while { body_block } else { cond_block };
        self.builder.build_unconditional_branch(entry_block).map_err(llvm_err)?;

        self.builder.position_at_end(cond_block);
        let cond_val = self.lower_expr_single(scope, condition)?.into_int_value();
        self.builder.build_conditional_branch(cond_val, body_block, exit_block).map_err(llvm_err)?;

        self.loop_exit_stack.push(exit_block);
        self.loop_continue_stack.push(cond_block);
        self.builder.position_at_end(body_block);
        self.lower_scope(body)?;
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(cond_block).map_err(llvm_err)?;
        }
        self.loop_exit_stack.pop();
        self.loop_continue_stack.pop();

        self.builder.position_at_end(exit_block);
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: flintc_core::id::StmtId,
        condition: ExprId,
        post: flintc_core::id::StmtId,
        body: ScopeId,
    ) -> Result<(), CodegenError> {
        self.lower_stmt(body, init)?;
        let cond_block = self.context.append_basic_block(self.function, "for_cond");
        let body_block = self.context.append_basic_block(self.function, "for_body");
        let post_block = self.context.append_basic_block(self.function, "for_post");
        let exit_block = self.context.append_basic_block(self.function, "for_exit");

        self.builder.build_unconditional_branch(cond_block).map_err(llvm_err)?;
        self.builder.position_at_end(cond_block);
        let cond_val = self.lower_expr_single(body, condition)?.into_int_value();
        self.builder.build_conditional_branch(cond_val, body_block, exit_block).map_err(llvm_err)?;

        self.loop_exit_stack.push(exit_block);
        self.loop_continue_stack.push(post_block);
        self.builder.position_at_end(body_block);
        self.lower_scope(body)?;
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(post_block).map_err(llvm_err)?;
        }
        self.loop_exit_stack.pop();
        self.loop_continue_stack.pop();

        self.builder.position_at_end(post_block);
        self.lower_stmt(body, post)?;
        self.builder.build_unconditional_branch(cond_block).map_err(llvm_err)?;

        self.builder.position_at_end(exit_block);
        Ok(())
    }

    /// `for value, index in iterable` over a fixed-width multi-type array:
    /// a counting loop over `0..width` that loads the element by GEP each
    /// iteration (spec.md §4.3.5).
    fn lower_enhanced_for(
        &mut self,
        scope: ScopeId,
        index_name: Option<String>,
        value_name: Option<String>,
        iterable: ExprId,
        body: ScopeId,
    ) -> Result<(), CodegenError> {
        let array_val = self.lower_expr_single(scope, iterable)?;
        let array_ptr = array_val.into_pointer_value();
        let elem_count = self.array_len_of(scope, iterable).unwrap_or(0);

        let index_slot = self
            .allocations
            .get(&Allocations::iter_key(body, "index"))
            .ok_or_else(|| CodegenError::InvalidProgram("missing enhanced-for index slot".into()))?;
        self.builder.build_store(index_slot, self.context.i64_type().const_zero()).map_err(llvm_err)?;

        let cond_block = self.context.append_basic_block(self.function, "efor_cond");
        let body_block = self.context.append_basic_block(self.function, "efor_body");
        let post_block = self.context.append_basic_block(self.function, "efor_post");
        let exit_block = self.context.append_basic_block(self.function, "efor_exit");

        self.builder.build_unconditional_branch(cond_block).map_err(llvm_err)?;
        self.builder.position_at_end(cond_block);
        let idx_val = self.builder.build_load(self.context.i64_type(), index_slot, "idx").map_err(llvm_err)?.into_int_value();
        let limit = self.context.i64_type().const_int(elem_count as u64, false);
        let keep_going = self.builder.build_int_compare(IntPredicate::ULT, idx_val, limit, "keep_going").map_err(llvm_err)?;
        self.builder.build_conditional_branch(keep_going, body_block, exit_block).map_err(llvm_err)?;

        self.loop_exit_stack.push(exit_block);
        self.loop_continue_stack.push(post_block);
        self.builder.position_at_end(body_block);
        if let Some(name) = &index_name {
            let slot = self.slot(body, name)?;
            self.builder.build_store(slot, idx_val).map_err(llvm_err)?;
        }
        if let Some(name) = &value_name {
            let slot = self.slot(body, name)?;
            let elem_ptr = unsafe { self.builder.build_gep(self.context.i64_type(), array_ptr, &[idx_val], "elem_ptr").map_err(llvm_err)? };
            let elem = self.builder.build_load(self.context.i64_type(), elem_ptr, "elem").map_err(llvm_err)?;
            self.builder.build_store(slot, elem).map_err(llvm_err)?;
        }
        self.lower_scope(body)?;
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(post_block).map_err(llvm_err)?;
        }
        self.loop_exit_stack.pop();
        self.loop_continue_stack.pop();

        self.builder.position_at_end(post_block);
        let next_idx = self.builder.build_int_add(idx_val, self.context.i64_type().const_int(1, false), "next_idx").map_err(llvm_err)?;
        self.builder.build_store(index_slot, next_idx).map_err(llvm_err)?;
        self.builder.build_unconditional_branch(cond_block).map_err(llvm_err)?;

        self.builder.position_at_end(exit_block);
        Ok(())
    }

    fn array_len_of(&self, scope: ScopeId, iterable: ExprId) -> Option<u32> {
        let name = match self.arena.expr(iterable) {
            ExprData::Variable { name, .. } => name,
            _ => return None,
        };
        let type_id = self.arena.resolve_symbol(scope, name)?;
        match self.pctx.registry.get(type_id).ok()? {
            Type::MultiType { width, .. } => Some(width.as_u8() as u32),
            _ => None,
        }
    }

    /// A guarded call's error code is inspected via its return struct's
    /// field 0 rather than thrown further: an auto-propagating call
    /// (outside any `catch`) instead returns immediately with the callee's
    /// error code forwarded, matching spec.md §4.3.5's "unless wrapped in
    /// a catch block, a nonzero error result is rethrown automatically".
    fn lower_catch(
        &mut self,
        scope: ScopeId,
        guarded: flintc_core::id::StmtId,
        error_binding: Option<String>,
        body: ScopeId,
    ) -> Result<(), CodegenError> {
        let call = match self.arena.stmt(guarded) {
            StmtData::CallStatement(call) => call.clone(),
            _ => return Err(CodegenError::InvalidProgram("catch target must be a call statement".into())),
        };
        if is_builtin_name(&call.callee) {
            // `assert`/`file_read` do raise (spec.md §4.5.7, §4.5.10), but
            // their error auto-propagates through `lower_builtin_call`
            // rather than going through the return-struct slot an explicit
            // `catch` target needs (see `prealloc::alloc_call_ret`).
            return Err(CodegenError::InvalidProgram(format!(
                "`{}` cannot be guarded by an explicit catch; its errors auto-propagate",
                call.callee
            )));
        }
        let (result_struct, _) = self.lower_call_raw(scope, &call)?;
        let err_val = self.builder.build_extract_value(result_struct, 0, "caught_err").map_err(llvm_err)?.into_int_value();

        if let Some(name) = &error_binding {
            let slot = self.slot(body, name)?;
            self.builder.build_store(slot, err_val).map_err(llvm_err)?;
        }

        let zero = self.context.i32_type().const_zero();
        let has_error = self.builder.build_int_compare(IntPredicate::NE, err_val, zero, "has_error").map_err(llvm_err)?;
        let handle_block = self.context.append_basic_block(self.function, "catch_body");
        let skip_block = self.context.append_basic_block(self.function, "catch_skip");
        self.builder.build_conditional_branch(has_error, handle_block, skip_block).map_err(llvm_err)?;

        self.builder.position_at_end(handle_block);
        self.catch_depth += 1;
        self.lower_scope(body)?;
        self.catch_depth -= 1;
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(skip_block).map_err(llvm_err)?;
        }
        self.builder.position_at_end(skip_block);
        Ok(())
    }

    fn lower_call_stmt(&mut self, call: &CallNode) -> Result<(), CodegenError> {
        if is_builtin_name(&call.callee) {
            self.lower_builtin_call(call.scope, call)?;
            return Ok(());
        }
        let (result_struct, _) = self.lower_call_raw(call.scope, call)?;
        // Unguarded calls auto-rethrow: a nonzero error immediately returns
        // from the current function with that code and zeroed value fields
        // (spec.md §4.3.5).
        if self.catch_depth == 0 {
            self.maybe_rethrow(result_struct)?;
        }
        Ok(())
    }

    /// Lowers a call to one of the compiler-emitted library builtins (spec.md
    /// §4.5). Most return a bare value or void, not the `{err, ...}` struct
    /// user functions return, so they bypass `lower_call_raw`'s return-struct
    /// slot and call-id keying entirely. `print` and `to_str` additionally
    /// dispatch on the argument's primitive type rather than resolving to a
    /// single fixed helper (spec.md §4.5.4, §4.5.6); `assert` and
    /// `file_read` return a small fallible struct of their own and rethrow
    /// through `rethrow_if_error` rather than trapping (spec.md §4.5.7,
    /// §4.5.10, §7 tier 3).
    fn lower_builtin_call(&mut self, scope: ScopeId, call: &CallNode) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        match call.callee.as_str() {
            "print" => return self.lower_print_call(scope, call),
            "to_str" => return self.lower_to_str_call(scope, call),
            _ => {}
        }
        let callee = self
            .resolve_builtin(&call.callee)?
            .ok_or_else(|| CodegenError::InvalidProgram(format!("`{}` is not a builtin", call.callee)))?;
        let mut args = Vec::with_capacity(call.args.len());
        for &arg_expr in &call.args {
            args.push(self.lower_expr_single(scope, arg_expr)?.into());
        }
        let call_site = self.builder.build_call(callee, &args, "builtin_call").map_err(llvm_err)?;
        let result = call_site.try_as_basic_value().left();

        match call.callee.as_str() {
            "assert" => {
                let struct_val = result
                    .ok_or_else(|| CodegenError::InvalidProgram("assert produced no value".into()))?
                    .into_struct_value();
                let err_val = self.builder.build_extract_value(struct_val, 0, "assert_err").map_err(llvm_err)?.into_int_value();
                self.rethrow_if_error(err_val)?;
                Ok(None)
            }
            "file_read" => {
                let struct_val = result
                    .ok_or_else(|| CodegenError::InvalidProgram("file_read produced no value".into()))?
                    .into_struct_value();
                let err_val = self.builder.build_extract_value(struct_val, 0, "file_read_err").map_err(llvm_err)?.into_int_value();
                self.rethrow_if_error(err_val)?;
                let value = self.builder.build_extract_value(struct_val, 1, "file_read_value").map_err(llvm_err)?;
                Ok(Some(value))
            }
            _ => Ok(result),
        }
    }

    /// `print(x)`: picks the library's per-width/`f64`/`bool`/`str` printer
    /// by `x`'s primitive type instead of always printing as `i64` (spec.md
    /// §4.5.4). Narrower integer/float widths widen to the `i64`/`f64` the
    /// library's printers take, matching the library's own "every numeric
    /// width widens before the shared helper" convention (spec.md §4.5.6).
    fn lower_print_call(&mut self, scope: ScopeId, call: &CallNode) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let arg_expr = *call.args.first().ok_or_else(|| CodegenError::InvalidProgram("print takes one argument".into()))?;
        let primitive = self.primitive_hint(scope, arg_expr);
        let value = self.lower_expr_single(scope, arg_expr)?;
        match primitive {
            Some(PrimitiveType::Str) => {
                let callee = library::print_str(self.context, self.module);
                self.builder.build_call(callee, &[value.into()], "print_str_call").map_err(llvm_err)?;
            }
            Some(PrimitiveType::Bool) => {
                let callee = library::print_scalar(self.context, self.module, library::PrintableScalar::Bool);
                self.builder.build_call(callee, &[value.into()], "print_bool_call").map_err(llvm_err)?;
            }
            Some(p) if p.is_float() => {
                let widened = self.widen_float_to_f64(value)?;
                let callee = library::print_scalar(self.context, self.module, library::PrintableScalar::F64);
                self.builder.build_call(callee, &[widened.into()], "print_f64_call").map_err(llvm_err)?;
            }
            Some(p) => {
                let signed = p.is_signed_integer();
                let widened = self.widen_int_to_64(value.into_int_value(), signed)?;
                let scalar = if signed { library::PrintableScalar::I64 } else { library::PrintableScalar::U64 };
                let callee = library::print_scalar(self.context, self.module, scalar);
                self.builder.build_call(callee, &[widened.into()], "print_int_call").map_err(llvm_err)?;
            }
            None => {
                let callee = library::print_scalar(self.context, self.module, library::PrintableScalar::I64);
                self.builder.build_call(callee, &[value.into()], "print_default_call").map_err(llvm_err)?;
            }
        };
        Ok(None)
    }

    /// `to_str(x)`: picks `int_to_str`/`float_to_str` by `x`'s primitive
    /// type (spec.md §4.5.6).
    fn lower_to_str_call(&mut self, scope: ScopeId, call: &CallNode) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let arg_expr = *call.args.first().ok_or_else(|| CodegenError::InvalidProgram("to_str takes one argument".into()))?;
        let primitive = self.primitive_hint(scope, arg_expr);
        let value = self.lower_expr_single(scope, arg_expr)?;
        let result = match primitive {
            Some(p) if p.is_float() => {
                let widened = self.widen_float_to_f64(value)?;
                let callee = library::float_to_str(self.context, self.module);
                self.builder.build_call(callee, &[widened.into()], "to_str_call").map_err(llvm_err)?.try_as_basic_value().left().unwrap()
            }
            Some(p) => {
                let signed = p.is_signed_integer();
                let widened = self.widen_int_to_64(value.into_int_value(), signed)?;
                let callee = library::int_to_str(self.context, self.module, signed);
                self.builder.build_call(callee, &[widened.into()], "to_str_call").map_err(llvm_err)?.try_as_basic_value().left().unwrap()
            }
            None => return Err(CodegenError::InvalidProgram("to_str on a non-numeric value".into())),
        };
        Ok(Some(result))
    }

    fn widen_float_to_f64(&mut self, value: BasicValueEnum<'ctx>) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let f = value.into_float_value();
        if f.get_type() == self.context.f64_type() {
            Ok(f.as_basic_value_enum())
        } else {
            Ok(self.builder.build_float_ext(f, self.context.f64_type(), "widen_f64").map_err(llvm_err)?.as_basic_value_enum())
        }
    }

    fn widen_int_to_64(&mut self, value: inkwell::values::IntValue<'ctx>, signed: bool) -> Result<inkwell::values::IntValue<'ctx>, CodegenError> {
        if value.get_type().get_bit_width() == 64 {
            Ok(value)
        } else if signed {
            self.builder.build_int_s_extend(value, self.context.i64_type(), "widen_sext").map_err(llvm_err)
        } else {
            self.builder.build_int_z_extend(value, self.context.i64_type(), "widen_zext").map_err(llvm_err)
        }
    }

    fn maybe_rethrow(&mut self, result_struct: inkwell::values::StructValue<'ctx>) -> Result<(), CodegenError> {
        let err_val = self.builder.build_extract_value(result_struct, 0, "call_err").map_err(llvm_err)?.into_int_value();
        self.rethrow_if_error(err_val)
    }

    /// Checks a fallible value's `err` field and rethrows through the
    /// enclosing function's own return-struct convention when nonzero
    /// (spec.md §7 tier 3). Shared by ordinary call propagation
    /// (`maybe_rethrow`) and the library's own fallible helpers (`assert`,
    /// `file_read`, checked arithmetic), which raise the same way but
    /// outside the call-statement/return-struct-slot machinery.
    fn rethrow_if_error(&mut self, err_val: inkwell::values::IntValue<'ctx>) -> Result<(), CodegenError> {
        let zero = self.context.i32_type().const_zero();
        let has_error = self.builder.build_int_compare(IntPredicate::NE, err_val, zero, "propagate_error").map_err(llvm_err)?;
        let rethrow_block = self.context.append_basic_block(self.function, "rethrow");
        let continue_block = self.context.append_basic_block(self.function, "after_fallible");
        self.builder.build_conditional_branch(has_error, rethrow_block, continue_block).map_err(llvm_err)?;

        self.builder.position_at_end(rethrow_block);
        let st = return_struct_type(self.context, self.pctx, &self.return_types)?;
        let mut agg: inkwell::values::AggregateValueEnum = st.get_undef().into();
        agg = self.builder.build_insert_value(agg, err_val, 0, "rethrown").map_err(llvm_err)?;
        self.builder.build_return(Some(&agg.as_basic_value_enum())).map_err(llvm_err)?;

        self.builder.position_at_end(continue_block);
        Ok(())
    }

    fn lower_call_raw(
        &mut self,
        scope: ScopeId,
        call: &CallNode,
    ) -> Result<(inkwell::values::StructValue<'ctx>, PointerValue<'ctx>), CodegenError> {
        let callee = self.resolve_callee(&call.callee)?;
        let mut args = Vec::with_capacity(call.args.len());
        for &arg_expr in &call.args {
            args.push(self.lower_expr_single(scope, arg_expr)?.into());
        }
        let call_site = self.builder.build_call(callee, &args, "call_result").map_err(llvm_err)?;
        let result = call_site.try_as_basic_value().left().ok_or_else(|| CodegenError::InvalidProgram("call produced no value".into()))?;
        let result_struct = result.into_struct_value();

        let ret_key = Allocations::call_ret_key(scope, call.call_id.0);
        let ret_slot = self
            .allocations
            .get(&ret_key)
            .ok_or_else(|| CodegenError::InvalidProgram("missing call return-struct slot".into()))?;
        self.builder.build_store(ret_slot, result_struct).map_err(llvm_err)?;
        Ok((result_struct, ret_slot))
    }

    /// Resolves a callee name to a `FunctionValue` in the current module.
    /// Intra-file calls reference the already-forward-declared function
    /// directly; cross-file calls go through a per-target-file placeholder
    /// that program assembly later redirects (spec.md §4.3.2 steps 5-6).
    fn resolve_callee(&mut self, name: &str) -> Result<FunctionValue<'ctx>, CodegenError> {
        if let Some(builtin) = self.resolve_builtin(name)? {
            return Ok(builtin);
        }
        let sig = self
            .sigs
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::InvalidProgram(format!("call to unknown function `{}`", name)))?;

        if sig.owner_file == self.file_id {
            let mangled = mangled_fn_name(self.file_id, sig.mangle_id);
            return self
                .module
                .get_function(&mangled)
                .ok_or_else(|| CodegenError::InvalidProgram(format!("intra-file function `{}` not forward-declared", name)));
        }

        let key: CallKey = (name.to_string(), signature_key(&sig.param_types, &sig.return_types, &self.pctx.registry));
        if let Some(existing) = self.pctx.file_unresolved_functions.entry(sig.owner_file).or_default().get(&key) {
            return Ok(*existing);
        }
        let ret_st = return_struct_type(self.context, self.pctx, &sig.return_types)?;
        let mut param_types = Vec::with_capacity(sig.param_types.len());
        for &tid in &sig.param_types {
            param_types.push(lower_type(self.context, self.pctx, tid)?.into());
        }
        let fn_ty = ret_st.fn_type(&param_types, false);
        let placeholder_name = format!("__flint_unresolved_{}_{}", sig.owner_file.0, name);
        let placeholder = self.module.add_function(&placeholder_name, fn_ty, None);
        self.pctx
            .file_unresolved_functions
            .entry(sig.owner_file)
            .or_default()
            .insert(key, placeholder);
        Ok(placeholder)
    }

    /// Maps the builtins with a single fixed signature directly onto the
    /// compiler-emitted library (spec.md §4.5). `print` and `to_str` are
    /// handled earlier in `lower_builtin_call` since they dispatch on the
    /// argument's primitive type rather than resolving to one function.
    fn resolve_builtin(&mut self, name: &str) -> Result<Option<FunctionValue<'ctx>>, CodegenError> {
        Ok(match name {
            "print_str" => Some(library::print_str(self.context, self.module)),
            "read_line" => Some(library::read_line(self.context, self.module)),
            "assert" => Some(library::assert(self.context, self.module)),
            "file_exists" => Some(library::file_exists(self.context, self.module)),
            "file_read" => Some(library::file_read(self.context, self.module)),
            "file_write" => Some(library::file_write(self.context, self.module, false)),
            "file_append" => Some(library::file_write(self.context, self.module, true)),
            "env_get" => Some(library::env_get(self.context, self.module)),
            "env_set" => Some(library::env_set(self.context, self.module)),
            "sin" => Some(library::math_unary(self.context, self.module, library::MathOp1::Sin)),
            "cos" => Some(library::math_unary(self.context, self.module, library::MathOp1::Cos)),
            "sqrt" => Some(library::math_unary(self.context, self.module, library::MathOp1::Sqrt)),
            "abs" => Some(library::math_unary(self.context, self.module, library::MathOp1::Abs)),
            "min" => Some(library::math_minmax(self.context, self.module, true)),
            "max" => Some(library::math_minmax(self.context, self.module, false)),
            _ => None,
        })
    }

    fn lower_expr_single(&mut self, scope: ScopeId, expr_id: ExprId) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let mapping = self.lower_expr(scope, expr_id)?;
        mapping
            .into_iter()
            .next()
            .ok_or_else(|| CodegenError::InvalidProgram("expression produced no value".into()))
    }

    fn lower_expr(&mut self, scope: ScopeId, expr_id: ExprId) -> Result<GroupMapping<'ctx>, CodegenError> {
        let expr = self.arena.expr(expr_id).clone();
        match expr {
            ExprData::Literal(lit) => Ok(smallvec![self.lower_literal(&lit.value, lit.ty)?]),
            ExprData::Variable { name, is_reference } => {
                let slot = self.slot(scope, &name)?;
                if is_reference {
                    Ok(smallvec![slot.as_basic_value_enum()])
                } else {
                    let loaded_ty = self.variable_basic_type(scope, &name);
                    let value = self.builder.build_load(loaded_ty, slot, &name).map_err(llvm_err)?;
                    Ok(smallvec![value])
                }
            }
            ExprData::Call(call) => {
                if is_builtin_name(&call.callee) {
                    let value = self.lower_builtin_call(call.scope, &call)?;
                    return Ok(value.into_iter().collect());
                }
                let (result_struct, _) = self.lower_call_raw(call.scope, &call)?;
                if self.catch_depth == 0 {
                    self.maybe_rethrow(result_struct)?;
                }
                let count = result_struct.get_type().count_fields();
                let mut out = GroupMapping::new();
                for i in 1..count {
                    out.push(self.builder.build_extract_value(result_struct, i, "call_field").map_err(llvm_err)?);
                }
                Ok(out)
            }
            ExprData::BinaryOp { op, lhs, rhs } => Ok(smallvec![self.lower_binary_op(scope, op, lhs, rhs)?]),
            ExprData::UnaryOp { op, operand, prefix } => Ok(smallvec![self.lower_unary_op(scope, op, operand, prefix)?]),
            ExprData::Group(items) => {
                let mut out = GroupMapping::new();
                for item in items {
                    out.push(self.lower_expr_single(scope, item)?);
                }
                Ok(out)
            }
            ExprData::Initializer { data_type, fields } => {
                let struct_ty = lower_type(self.context, self.pctx, data_type)?.into_struct_type();
                let mut agg: inkwell::values::AggregateValueEnum = struct_ty.get_undef().into();
                for (i, field_expr) in fields.iter().enumerate() {
                    let v = self.lower_expr_single(scope, *field_expr)?;
                    agg = self.builder.build_insert_value(agg, v, i as u32, "field").map_err(llvm_err)?;
                }
                Ok(smallvec![agg.as_basic_value_enum()])
            }
            ExprData::DataAccess { base, field_index } => {
                let base_val = self.lower_expr_single(scope, base)?;
                let v = self
                    .builder
                    .build_extract_value(base_val.into_struct_value(), field_index, "field_value")
                    .map_err(llvm_err)?;
                Ok(smallvec![v])
            }
            ExprData::GroupedDataAccess { base, field_path } => {
                let mut current = self.lower_expr_single(scope, base)?.into_struct_value();
                for &idx in &field_path {
                    let extracted = self.builder.build_extract_value(current, idx, "nested_field").map_err(llvm_err)?;
                    current = extracted.into_struct_value();
                }
                Ok(smallvec![current.as_basic_value_enum()])
            }
            ExprData::TypeCast { target, operand } => Ok(smallvec![self.lower_type_cast(scope, target, operand)?]),
        }
    }

    /// The LLVM type a variable's slot holds: looked up from the arena's
    /// own symbol table when resolvable, defaulting to `i64` otherwise
    /// (matches the same default the pre-allocation pass uses for
    /// untyped enhanced-for bindings, see prealloc.rs).
    fn variable_basic_type(&mut self, scope: ScopeId, name: &str) -> inkwell::types::BasicTypeEnum<'ctx> {
        match self.arena.resolve_symbol(scope, name) {
            Some(type_id) => lower_type(self.context, self.pctx, type_id).unwrap_or_else(|_| self.context.i64_type().into()),
            None => self.context.i64_type().into(),
        }
    }

    fn lower_literal(&mut self, value: &LiteralValue, ty: flintc_core::type_id::TypeId) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let lowered_ty = lower_type(self.context, self.pctx, ty)?;
        match value {
            LiteralValue::Int(text) => {
                let parsed: i64 = text.parse().unwrap_or(0);
                Ok(lowered_ty.into_int_type().const_int(parsed as u64, true).as_basic_value_enum())
            }
            LiteralValue::Float(text) => {
                let parsed: f64 = text.parse().unwrap_or(0.0);
                Ok(lowered_ty.into_float_type().const_float(parsed).as_basic_value_enum())
            }
            LiteralValue::Bool(b) => Ok(self.context.bool_type().const_int(*b as u64, false).as_basic_value_enum()),
            LiteralValue::Char(c) => Ok(self.context.i8_type().const_int(*c as u64, false).as_basic_value_enum()),
            LiteralValue::Str(text) => {
                let global = self.builder.build_global_string_ptr(text, "str_lit").map_err(llvm_err)?;
                let len = self.context.i64_type().const_int(text.len() as u64, false);
                let create_fn = library::str_create(self.context, self.module);
                let record = self
                    .builder
                    .build_call(create_fn, &[global.as_pointer_value().into(), len.into()], "str_record")
                    .map_err(llvm_err)?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| CodegenError::InvalidProgram("str literal lowering produced no value".into()))?;
                Ok(record)
            }
        }
    }

    fn lower_binary_op(&mut self, scope: ScopeId, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.lower_short_circuit(scope, op, lhs, rhs);
        }

        let primitive = self.primitive_hint(scope, lhs);
        let lhs_val = self.lower_expr_single(scope, lhs)?;
        let rhs_val = self.lower_expr_single(scope, rhs)?;

        if matches!(primitive, Some(p) if p.is_float()) {
            let l = lhs_val.into_float_value();
            let r = rhs_val.into_float_value();
            return Ok(match op {
                BinaryOp::Add => self.builder.build_float_add(l, r, "fadd").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Sub => self.builder.build_float_sub(l, r, "fsub").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Mul => self.builder.build_float_mul(l, r, "fmul").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Div => self.builder.build_float_div(l, r, "fdiv").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Mod => self.builder.build_float_rem(l, r, "frem").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Eq => self.builder.build_float_compare(inkwell::FloatPredicate::OEQ, l, r, "feq").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Ne => self.builder.build_float_compare(inkwell::FloatPredicate::ONE, l, r, "fne").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Lt => self.builder.build_float_compare(inkwell::FloatPredicate::OLT, l, r, "flt").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Le => self.builder.build_float_compare(inkwell::FloatPredicate::OLE, l, r, "fle").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Gt => self.builder.build_float_compare(inkwell::FloatPredicate::OGT, l, r, "fgt").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Ge => self.builder.build_float_compare(inkwell::FloatPredicate::OGE, l, r, "fge").map_err(llvm_err)?.as_basic_value_enum(),
                BinaryOp::Pow => {
                    let pow_fn = self.module.get_function("pow").unwrap_or_else(|| {
                        let ty = self.context.f64_type().fn_type(&[self.context.f64_type().into(), self.context.f64_type().into()], false);
                        self.module.add_function("pow", ty, None)
                    });
                    self.builder.build_call(pow_fn, &[l.into(), r.into()], "fpow").map_err(llvm_err)?.try_as_basic_value().left().unwrap()
                }
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            });
        }

        if matches!(primitive, Some(PrimitiveType::Str)) && matches!(op, BinaryOp::Add | BinaryOp::Eq | BinaryOp::Ne) {
            let l = lhs_val.into_pointer_value();
            let r = rhs_val.into_pointer_value();
            return Ok(match op {
                BinaryOp::Add => self
                    .builder
                    .build_call(library::str_concat(self.context, self.module), &[l.into(), r.into()], "concat")
                    .map_err(llvm_err)?
                    .try_as_basic_value()
                    .left()
                    .unwrap(),
                BinaryOp::Eq => self
                    .builder
                    .build_call(library::str_eq(self.context, self.module), &[l.into(), r.into()], "str_eq")
                    .map_err(llvm_err)?
                    .try_as_basic_value()
                    .left()
                    .unwrap(),
                BinaryOp::Ne => {
                    let eq = self
                        .builder
                        .build_call(library::str_eq(self.context, self.module), &[l.into(), r.into()], "str_eq")
                        .map_err(llvm_err)?
                        .try_as_basic_value()
                        .left()
                        .unwrap()
                        .into_int_value();
                    self.builder.build_not(eq, "str_ne").map_err(llvm_err)?.as_basic_value_enum()
                }
                _ => unreachable!(),
            });
        }

        let l = lhs_val.into_int_value();
        let r = rhs_val.into_int_value();
        let signed = primitive.map(|p| p.is_signed_integer()).unwrap_or(true);
        Ok(match op {
            BinaryOp::Add => self.call_safe_int(l.get_type(), library::ArithOp::Add, signed, l, r)?,
            BinaryOp::Sub => self.call_safe_int(l.get_type(), library::ArithOp::Sub, signed, l, r)?,
            BinaryOp::Mul => self.call_safe_int(l.get_type(), library::ArithOp::Mul, signed, l, r)?,
            BinaryOp::Div => self.call_safe_int(l.get_type(), library::ArithOp::Div, signed, l, r)?,
            BinaryOp::Mod => (if signed {
                self.builder.build_int_signed_rem(l, r, "srem")
            } else {
                self.builder.build_int_unsigned_rem(l, r, "urem")
            })
            .map_err(llvm_err)?
            .as_basic_value_enum(),
            BinaryOp::Eq => self.builder.build_int_compare(IntPredicate::EQ, l, r, "ieq").map_err(llvm_err)?.as_basic_value_enum(),
            BinaryOp::Ne => self.builder.build_int_compare(IntPredicate::NE, l, r, "ine").map_err(llvm_err)?.as_basic_value_enum(),
            BinaryOp::Lt => self
                .builder
                .build_int_compare(if signed { IntPredicate::SLT } else { IntPredicate::ULT }, l, r, "ilt")
                .map_err(llvm_err)?
                .as_basic_value_enum(),
            BinaryOp::Le => self
                .builder
                .build_int_compare(if signed { IntPredicate::SLE } else { IntPredicate::ULE }, l, r, "ile")
                .map_err(llvm_err)?
                .as_basic_value_enum(),
            BinaryOp::Gt => self
                .builder
                .build_int_compare(if signed { IntPredicate::SGT } else { IntPredicate::UGT }, l, r, "igt")
                .map_err(llvm_err)?
                .as_basic_value_enum(),
            BinaryOp::Ge => self
                .builder
                .build_int_compare(if signed { IntPredicate::SGE } else { IntPredicate::UGE }, l, r, "ige")
                .map_err(llvm_err)?
                .as_basic_value_enum(),
            BinaryOp::Pow => {
                // Integer exponentiation reuses the float `pow` helper and
                // truncates back, rather than emitting a repeated-squaring
                // loop inline (matches the library's f64-based math family,
                // spec.md §4.5.9).
                let lf = self.builder.build_signed_int_to_float(l, self.context.f64_type(), "lf").map_err(llvm_err)?;
                let rf = self.builder.build_signed_int_to_float(r, self.context.f64_type(), "rf").map_err(llvm_err)?;
                let pow_fn = self.module.get_function("pow").unwrap_or_else(|| {
                    let ty = self.context.f64_type().fn_type(&[self.context.f64_type().into(), self.context.f64_type().into()], false);
                    self.module.add_function("pow", ty, None)
                });
                let result_f = self.builder.build_call(pow_fn, &[lf.into(), rf.into()], "ipow").map_err(llvm_err)?.try_as_basic_value().left().unwrap().into_float_value();
                self.builder.build_float_to_signed_int(result_f, l.get_type(), "ipow_i").map_err(llvm_err)?.as_basic_value_enum()
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        })
    }

    fn call_safe_int(
        &mut self,
        int_ty: inkwell::types::IntType<'ctx>,
        op: library::ArithOp,
        signed: bool,
        l: inkwell::values::IntValue<'ctx>,
        r: inkwell::values::IntValue<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let helper = library::safe_int_op(self.context, self.module, int_ty, op, signed);
        let result = self
            .builder
            .build_call(helper, &[l.into(), r.into()], "safe_op")
            .map_err(llvm_err)?
            .try_as_basic_value()
            .left()
            .unwrap()
            .into_struct_value();
        let err_val = self.builder.build_extract_value(result, 0, "safe_op_err").map_err(llvm_err)?.into_int_value();
        self.rethrow_if_error(err_val)?;
        Ok(self.builder.build_extract_value(result, 1, "safe_op_value").map_err(llvm_err)?)
    }

    /// `&&`/`||` branch around the right-hand side rather than always
    /// evaluating it, so side-effecting calls on the right are skipped
    /// once the left side already decides the result (spec.md §4.5.3).
    fn lower_short_circuit(&mut self, scope: ScopeId, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let lhs_val = self.lower_expr_single(scope, lhs)?.into_int_value();
        let rhs_block = self.context.append_basic_block(self.function, "sc_rhs");
        let merge_block = self.context.append_basic_block(self.function, "sc_merge");
        let short_circuit_value = matches!(op, BinaryOp::Or);

        let entry_block = self.builder.get_insert_block().unwrap();
        if short_circuit_value {
            self.builder.build_conditional_branch(lhs_val, merge_block, rhs_block).map_err(llvm_err)?;
        } else {
            self.builder.build_conditional_branch(lhs_val, rhs_block, merge_block).map_err(llvm_err)?;
        }

        self.builder.position_at_end(rhs_block);
        let rhs_val = self.lower_expr_single(scope, rhs)?.into_int_value();
        let rhs_end_block = self.builder.get_insert_block().unwrap();
        self.builder.build_unconditional_branch(merge_block).map_err(llvm_err)?;

        self.builder.position_at_end(merge_block);
        let phi = self.builder.build_phi(self.context.bool_type(), "sc_result").map_err(llvm_err)?;
        let short_const = self.context.bool_type().const_int(short_circuit_value as u64, false);
        phi.add_incoming(&[(&short_const, entry_block), (&rhs_val, rhs_end_block)]);
        Ok(phi.as_basic_value().as_basic_value_enum())
    }

    fn lower_unary_op(&mut self, scope: ScopeId, op: UnaryOp, operand: ExprId, _prefix: bool) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        match op {
            UnaryOp::Not => {
                let value = self.lower_expr_single(scope, operand)?.into_int_value();
                if value.get_type().get_bit_width() == 1 {
                    Ok(self.builder.build_not(value, "not").map_err(llvm_err)?.as_basic_value_enum())
                } else {
                    let zero = value.get_type().const_zero();
                    Ok(self.builder.build_int_compare(IntPredicate::EQ, value, zero, "not_int").map_err(llvm_err)?.as_basic_value_enum())
                }
            }
            UnaryOp::Negate => {
                let value = self.lower_expr_single(scope, operand)?;
                if value.is_float_value() {
                    Ok(self.builder.build_float_neg(value.into_float_value(), "fneg").map_err(llvm_err)?.as_basic_value_enum())
                } else {
                    Ok(self.builder.build_int_neg(value.into_int_value(), "ineg").map_err(llvm_err)?.as_basic_value_enum())
                }
            }
            UnaryOp::Increment | UnaryOp::Decrement => {
                // Increment/decrement as an *expression* needs the
                // operand's slot to write back to, so it must be a plain
                // variable reference evaluated as a reference.
                let name = match self.arena.expr(operand) {
                    ExprData::Variable { name, .. } => name.clone(),
                    _ => return Err(CodegenError::Unsupported("++/-- on a non-variable expression".into())),
                };
                let slot = self.slot(scope, &name)?;
                let loaded_ty = self.variable_basic_type(scope, &name);
                let current = self.builder.build_load(loaded_ty, slot, "current").map_err(llvm_err)?.into_int_value();
                let one = current.get_type().const_int(1, true);
                let updated = if matches!(op, UnaryOp::Increment) {
                    self.builder.build_int_add(current, one, "incremented").map_err(llvm_err)?
                } else {
                    self.builder.build_int_sub(current, one, "decremented").map_err(llvm_err)?
                };
                self.builder.build_store(slot, updated).map_err(llvm_err)?;
                Ok(updated.as_basic_value_enum())
            }
        }
    }

    fn lower_type_cast(&mut self, scope: ScopeId, target: flintc_core::type_id::TypeId, operand: ExprId) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let target_ty = lower_type(self.context, self.pctx, target)?;
        let value = self.lower_expr_single(scope, operand)?;
        let target_prim = self.pctx.registry.get(target).ok().and_then(|t| match t {
            Type::Primitive(p) => Some(*p),
            _ => None,
        });

        match (value, target_ty) {
            (BasicValueEnum::IntValue(v), inkwell::types::BasicTypeEnum::IntType(t)) => {
                if v.get_type().get_bit_width() == t.get_bit_width() {
                    Ok(v.as_basic_value_enum())
                } else if v.get_type().get_bit_width() < t.get_bit_width() {
                    let signed = target_prim.map(|p| p.is_signed_integer()).unwrap_or(true);
                    Ok(if signed {
                        self.builder.build_int_s_extend(v, t, "sext").map_err(llvm_err)?.as_basic_value_enum()
                    } else {
                        self.builder.build_int_z_extend(v, t, "zext").map_err(llvm_err)?.as_basic_value_enum()
                    })
                } else {
                    Ok(self.builder.build_int_truncate(v, t, "trunc").map_err(llvm_err)?.as_basic_value_enum())
                }
            }
            (BasicValueEnum::IntValue(v), inkwell::types::BasicTypeEnum::FloatType(t)) => {
                Ok(self.builder.build_signed_int_to_float(v, t, "sitofp").map_err(llvm_err)?.as_basic_value_enum())
            }
            (BasicValueEnum::FloatValue(v), inkwell::types::BasicTypeEnum::IntType(t)) => {
                Ok(self.builder.build_float_to_signed_int(v, t, "fptosi").map_err(llvm_err)?.as_basic_value_enum())
            }
            (BasicValueEnum::FloatValue(v), inkwell::types::BasicTypeEnum::FloatType(t)) => {
                if v.get_type() == t {
                    Ok(v.as_basic_value_enum())
                } else {
                    Ok(self.builder.build_float_cast(v, t, "fpcast").map_err(llvm_err)?.as_basic_value_enum())
                }
            }
            (other, _) => Ok(other),
        }
    }

    fn primitive_hint(&self, scope: ScopeId, expr_id: ExprId) -> Option<PrimitiveType> {
        match self.arena.expr(expr_id) {
            ExprData::Literal(lit) => match self.pctx.registry.get(lit.ty).ok()? {
                Type::Primitive(p) => Some(*p),
                _ => None,
            },
            ExprData::Variable { name, .. } => {
                let type_id = self.arena.resolve_symbol(scope, name)?;
                match self.pctx.registry.get(type_id).ok()? {
                    Type::Primitive(p) => Some(*p),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

fn llvm_err(e: impl std::fmt::Display) -> CodegenError {
    CodegenError::LlvmError(e.to_string())
}
