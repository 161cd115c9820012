//! Program-level LLIR assembly (spec.md §4.3.1): walks the dependency graph
//! leaves-first, generates every file into one shared module, then rewrites
//! the cross-file placeholders `lower.rs::resolve_callee` left behind.

use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;

use flintc_core::ast::{DefData, FileNode, SyntaxArena, TestDef};
use flintc_core::graph::DepGraph;
use flintc_core::id::FileId;

use crate::context::{mangled_fn_name, ProgramContext};
use crate::error::CodegenError;
use crate::file::generate_file_ir;
use crate::function::{build_signature_table, FunctionSig};
use crate::prealloc;
use crate::{lower::FunctionLowerer, types::return_struct_type};

/// Produces one program-level LLIR module (spec.md §4.3.1).
pub fn generate_program_ir<'ctx>(
    context: &'ctx Context,
    program_name: &str,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    files: &[FileNode],
    dep_graph: &DepGraph,
    is_test: bool,
) -> Result<Module<'ctx>, CodegenError> {
    let span = tracing::debug_span!("generate_program_ir", program_name, files = files.len(), is_test);
    let _enter = span.enter();

    let module = context.create_module(program_name);
    crate::runtime::declare_runtime_functions(context, &module);

    let sigs = build_signature_table(arena, files);
    let files_by_id: HashMap<FileId, &FileNode> = files.iter().map(|f| (f.id, f)).collect();

    let order = dep_graph.generation_order().map_err(|e| CodegenError::InvalidProgram(e.to_string()))?;
    for node in order {
        let file_id = dep_graph.node_file(node);
        let Some(file) = files_by_id.get(&file_id) else { continue };
        tracing::trace!(file = %file.path, "generating file IR");
        generate_file_ir(context, &module, pctx, arena, &sigs, file)?;
    }

    resolve_cross_file_calls(&module, pctx, &sigs)?;

    if is_test {
        generate_test_runner(context, &module, pctx, arena, &sigs, files)?;
    } else {
        generate_entry_wrapper(context, &module)?;
    }

    Ok(module)
}

/// Program-level fix-up (spec.md §4.3.2 step 6): every cross-file call site
/// was lowered against a placeholder keyed by `(name, lowered_signature)`;
/// now that every file has been generated, redirect each placeholder's uses
/// to the real function and delete it.
fn resolve_cross_file_calls<'ctx>(
    module: &Module<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    sigs: &HashMap<String, FunctionSig>,
) -> Result<(), CodegenError> {
    tracing::debug!(pending = pctx.file_unresolved_functions.len(), "resolving cross-file calls");
    for (target_file, placeholders) in pctx.file_unresolved_functions.drain() {
        for ((name, _signature), placeholder) in placeholders {
            let sig = sigs
                .get(&name)
                .ok_or_else(|| CodegenError::InvalidProgram(format!("unresolved call to unknown function `{}`", name)))?;
            if sig.owner_file != target_file {
                return Err(CodegenError::InvalidProgram(format!(
                    "unresolved call `{}` recorded against file {} but its signature says file {}",
                    name, target_file.0, sig.owner_file.0
                )));
            }
            let real_name = if name == "main" { name.clone() } else { mangled_fn_name(target_file, sig.mangle_id) };
            let real = module
                .get_function(&real_name)
                .ok_or_else(|| CodegenError::InvalidProgram(format!("function `{}` never generated in file {}", name, target_file.0)))?;
            placeholder.replace_all_uses_with(&real);
            unsafe {
                placeholder.delete();
            }
        }
    }
    Ok(())
}

/// The process entry point the linked executable actually runs: calls the
/// user's `main` (return-struct convention) and forwards its error field as
/// the process exit code (spec.md §6.1, §7 tier 3 -- a nonzero exit code is
/// how an uncaught error reaches the shell).
fn generate_entry_wrapper<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> Result<(), CodegenError> {
    let user_main = module.get_function("main").ok_or(CodegenError::NoEntryFunction)?;

    let i32_type = context.i32_type();
    let main_fn_type = i32_type.fn_type(&[], false);
    let main_fn = module.add_function("__flint_process_main", main_fn_type, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(main_fn, "entry");
    builder.position_at_end(entry);

    let call = builder.build_call(user_main, &[], "call_main").map_err(llvm_err)?;
    let result = call
        .try_as_basic_value()
        .left()
        .ok_or_else(|| CodegenError::LlvmError("main produced no return struct".into()))?;
    let err = builder.build_extract_value(result.into_struct_value(), 0, "exit_code").map_err(llvm_err)?;
    builder.build_return(Some(&err)).map_err(llvm_err)?;

    // Free the `main` symbol from the user function before claiming it for
    // the process entry point.
    user_main.set_name("__flint_user_main");
    main_fn.set_name("main");
    Ok(())
}

/// Test mode (spec.md §4.3.8): replaces the entry point with a generated
/// runner that calls every `TestNode`'s body, tolerating a thrown error iff
/// the test is annotated `should_fail`, prints a pass/fail line per test,
/// and exits non-zero if any test failed.
fn generate_test_runner<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    pctx: &mut ProgramContext<'ctx>,
    arena: &SyntaxArena,
    sigs: &HashMap<String, FunctionSig>,
    files: &[FileNode],
) -> Result<(), CodegenError> {
    struct Entry<'ctx> {
        name: String,
        should_fail: bool,
        wrapper: FunctionValue<'ctx>,
    }

    let mut entries = Vec::new();
    for file in files {
        for (idx, &def_id) in file.defs.iter().enumerate() {
            let DefData::Test(TestDef { name, body, should_fail }) = arena.def(def_id) else { continue };
            let wrapper_name = format!("__flint_test_{}_{}", file.id.0, idx);
            let fn_ty = context.i32_type().fn_type(&[], false);
            let wrapper = module.add_function(&wrapper_name, fn_ty, None);
            let entry_block = context.append_basic_block(wrapper, "entry");
            let entry_builder = context.create_builder();
            entry_builder.position_at_end(entry_block);

            let allocations = prealloc::run(context, &entry_builder, pctx, arena, sigs, wrapper, *body, &[])?;
            let body_block = context.append_basic_block(wrapper, "body");
            entry_builder.build_unconditional_branch(body_block).map_err(llvm_err)?;
            let body_builder = context.create_builder();
            body_builder.position_at_end(body_block);

            let mut lowerer = FunctionLowerer::new(context, module, body_builder, pctx, arena, sigs, &allocations, wrapper, file.id, Vec::new());
            lowerer.lower_scope(*body)?;
            if lowerer.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
                lowerer.builder.build_return(Some(&context.i32_type().const_zero())).map_err(llvm_err)?;
            }
            entries.push(Entry {
                name: name.clone(),
                should_fail: *should_fail,
                wrapper,
            });
        }
    }

    let i32_type = context.i32_type();
    let main_fn = module.add_function("main", i32_type.fn_type(&[], false), None);
    let builder = context.create_builder();
    let entry_block = context.append_basic_block(main_fn, "entry");
    builder.position_at_end(entry_block);
    let fail_count_slot = builder.build_alloca(i32_type, "fail_count").map_err(llvm_err)?;
    builder.build_store(fail_count_slot, i32_type.const_zero()).map_err(llvm_err)?;

    let pass_fmt = builder.build_global_string_ptr("[PASS] %s\n", "test_pass_fmt").map_err(llvm_err)?;
    let fail_fmt = builder.build_global_string_ptr("[FAIL] %s\n", "test_fail_fmt").map_err(llvm_err)?;
    let printf_fn = crate::runtime::printf(context, module);

    for entry in &entries {
        let result = builder.build_call(entry.wrapper, &[], "test_result").map_err(llvm_err)?;
        let err_val = result.try_as_basic_value().left().ok_or_else(|| CodegenError::LlvmError("test wrapper returned nothing".into()))?.into_int_value();
        let zero = i32_type.const_zero();
        let threw = builder.build_int_compare(inkwell::IntPredicate::NE, err_val, zero, "threw").map_err(llvm_err)?;
        // A test passes when it throws iff it's annotated `should_fail`.
        let failed = if entry.should_fail {
            builder.build_not(threw, "failed").map_err(llvm_err)?
        } else {
            threw
        };

        let name_global = builder.build_global_string_ptr(&entry.name, "test_name").map_err(llvm_err)?;
        let fmt_ptr = builder
            .build_select(failed, fail_fmt.as_pointer_value(), pass_fmt.as_pointer_value(), "fmt")
            .map_err(llvm_err)?;
        builder
            .build_call(printf_fn, &[fmt_ptr.into(), name_global.as_pointer_value().into()], "print_result")
            .map_err(llvm_err)?;

        let current = builder.build_load(i32_type, fail_count_slot, "current_fails").map_err(llvm_err)?.into_int_value();
        let incremented = builder.build_int_add(current, i32_type.const_int(1, false), "incremented").map_err(llvm_err)?;
        let next = builder.build_select(failed, incremented, current, "next_fails").map_err(llvm_err)?;
        builder.build_store(fail_count_slot, next).map_err(llvm_err)?;
    }

    let total_fails = builder.build_load(i32_type, fail_count_slot, "total_fails").map_err(llvm_err)?.into_int_value();
    let any_failed = builder
        .build_int_compare(inkwell::IntPredicate::NE, total_fails, i32_type.const_zero(), "any_failed")
        .map_err(llvm_err)?;
    let exit_code = builder.build_select(any_failed, i32_type.const_int(1, false), i32_type.const_zero(), "exit_code").map_err(llvm_err)?;
    let exit_fn = crate::runtime::exit(context, module);
    builder.build_call(exit_fn, &[exit_code.into()], "exit_tests").map_err(llvm_err)?;
    builder.build_unreachable().map_err(llvm_err)?;
    Ok(())
}

fn llvm_err(e: impl std::fmt::Display) -> CodegenError {
    CodegenError::LlvmError(e.to_string())
}
