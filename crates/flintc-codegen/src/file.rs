//! Per-file LLIR generation protocol (spec.md §4.3.2).

use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;

use flintc_core::ast::{DataDef, DefData, FileNode, FunctionDef, SyntaxArena};

use crate::context::{mangled_fn_name, ProgramContext};
use crate::error::CodegenError;
use crate::function::FunctionSig;
use crate::lower::FunctionLowerer;
use crate::prealloc;
use crate::types::{register_data_struct, return_struct_type};

/// Registers every `data` definition's LLVM struct type up front, since
/// function signatures and GEPs into data values both need the struct type
/// resolvable the moment any function in the file references it (spec.md
/// §4.3.3).
fn register_data_structs<'ctx>(
    context: &'ctx Context,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    file: &FileNode,
) -> Result<(), CodegenError> {
    for &def_id in &file.defs {
        if let DefData::Data(DataDef { fields, .. }) = arena.def(def_id) {
            let field_types: Vec<_> = fields.iter().map(|p| p.ty).collect();
            register_data_struct(context, pctx, def_id.0, &field_types)?;
        }
    }
    Ok(())
}

/// Forward-declares every function defined in `file` except `main` under its
/// deterministic mangled name, and records the file's function names and
/// mangle ids in the shared program tables (spec.md §4.3.2 step 1). Returns
/// the forward-declared `FunctionValue` per source name, `main` included
/// (declared under its own literal name, not mangled).
fn forward_declare<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    sigs: &HashMap<String, FunctionSig>,
    file: &FileNode,
    arena: &SyntaxArena,
) -> Result<HashMap<String, FunctionValue<'ctx>>, CodegenError> {
    let mut declared = HashMap::new();
    let mut names = std::collections::HashSet::new();
    let mut mangle_ids = HashMap::new();

    for &def_id in &file.defs {
        let DefData::Function(f) = arena.def(def_id) else { continue };
        let sig = sigs
            .get(&f.name)
            .ok_or_else(|| CodegenError::InvalidProgram(format!("function `{}` missing from signature table", f.name)))?;

        let ret_st = return_struct_type(context, pctx, &sig.return_types)?;
        let mut param_types = Vec::with_capacity(sig.param_types.len());
        for &tid in &sig.param_types {
            param_types.push(crate::types::lower_type(context, pctx, tid)?.into());
        }
        let fn_ty = ret_st.fn_type(&param_types, false);

        let link_name = if f.name == "main" {
            // The user's `main` keeps its literal name: it is still an
            // ordinary Flint function under the return-struct convention,
            // distinguished from the process entry point only by the
            // driver's entry-wrapper logic (compiler.rs), not by mangling.
            f.name.clone()
        } else {
            mangled_fn_name(file.id, sig.mangle_id)
        };

        let function = module.get_function(&link_name).unwrap_or_else(|| module.add_function(&link_name, fn_ty, None));
        declared.insert(f.name.clone(), function);
        names.insert(f.name.clone());
        mangle_ids.insert(f.name.clone(), sig.mangle_id);
    }

    pctx.file_function_names.entry(file.id).or_default().extend(names);
    pctx.file_function_mangle_ids.entry(file.id).or_default().extend(mangle_ids);
    Ok(declared)
}

/// Lowers one function body: computes its LLIR type, runs the
/// pre-allocation pass, then lowers statements in order (spec.md §4.3.2
/// step 3).
fn generate_function_body<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    sigs: &HashMap<String, FunctionSig>,
    function: FunctionValue<'ctx>,
    file_id: flintc_core::id::FileId,
    f: &FunctionDef,
) -> Result<(), CodegenError> {
    let entry_block = context.append_basic_block(function, "entry");
    let entry_builder = context.create_builder();
    entry_builder.position_at_end(entry_block);

    let allocations = prealloc::run(context, &entry_builder, pctx, arena, sigs, function, f.body, &f.params)?;

    // Parameters land in their pre-allocated slots immediately, so every
    // later reference (including a reassignment) goes through the same
    // slot the pre-allocation pass reserved for it.
    for (i, param) in f.params.iter().enumerate() {
        let slot = allocations.get(&prealloc::Allocations::var_key(f.body, &param.name));
        if let (Some(slot), Some(value)) = (slot, function.get_nth_param(i as u32)) {
            entry_builder.build_store(slot, value).map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        }
    }

    let body_builder = context.create_builder();
    let body_block = context.append_basic_block(function, "body");
    entry_builder.build_unconditional_branch(body_block).map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    body_builder.position_at_end(body_block);

    let mut lowerer = FunctionLowerer::new(
        context,
        module,
        body_builder,
        pctx,
        arena,
        sigs,
        &allocations,
        function,
        file_id,
        f.return_types.clone(),
    );
    lowerer.lower_scope(f.body)?;

    // A function whose body falls off the end without an explicit return
    // (every statement path covered elsewhere, or a void function with no
    // trailing `return`) implicitly succeeds with zeroed value fields.
    if lowerer.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
        let st = return_struct_type(context, lowerer.pctx, &f.return_types)?;
        let agg = st.get_undef();
        let agg = lowerer
            .builder
            .build_insert_value(agg, context.i32_type().const_zero(), 0, "implicit_ok")
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
        lowerer
            .builder
            .build_return(Some(&agg.as_basic_value_enum()))
            .map_err(|e| CodegenError::LlvmError(e.to_string()))?;
    }
    Ok(())
}

/// Generates one file's functions into the shared program module (spec.md
/// §4.3.2). Compiler-library helpers are not emitted here as a separate
/// step: each is emitted lazily, at most once per module, the first time
/// statement/expression lowering needs it (`library.rs`'s
/// `module.get_function` dedup check realizes step 2 without a dedicated
/// pre-pass).
pub fn generate_file_ir<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    sigs: &HashMap<String, FunctionSig>,
    file: &FileNode,
) -> Result<(), CodegenError> {
    register_data_structs(context, pctx, arena, file)?;
    let declared = forward_declare(context, module, pctx, sigs, file, arena)?;

    for &def_id in &file.defs {
        let DefData::Function(f) = arena.def(def_id) else { continue };
        let function = *declared
            .get(&f.name)
            .ok_or_else(|| CodegenError::InvalidProgram(format!("function `{}` not forward-declared", f.name)))?;
        generate_function_body(context, module, pctx, arena, sigs, function, file.id, f)?;
    }
    Ok(())
}
