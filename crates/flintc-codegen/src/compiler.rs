//! Top-level compilation pipeline: type check -> LLIR generation -> verify
//! -> optimize -> object emission -> linking (spec.md §4.3.1, §6.1, §7).
//!
//! [`CompilationUnit`] is the fully-resolved input this crate consumes.
//! Lexing, parsing, and the deep semantic resolution that populates scopes,
//! types and the dependency graph are explicitly "surrounding functionality"
//! (spec.md §1) -- out of scope for this crate. `flintc-check::check_file`
//! still runs here as the one real semantic pass this repo keeps, confirming
//! the unit's diagnostics are clean and finishing scope/symbol population
//! before lowering starts, but building the `SyntaxArena`/`FileNode`s/
//! `DepGraph`/`TypeRegistry` in the first place is the frontend's job
//! (DESIGN.md documents how `flintc-cli` stands in for that frontend).
//!
//! The [`compile`] function is the main entry point; it creates a fresh
//! LLVM [`Context`] that is dropped at function exit, so no LLVM types
//! escape the compilation boundary. [`compile_to_ir`] is a variant that
//! returns the textual LLIR instead of producing a binary.

use std::time::Instant;

use inkwell::context::Context;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::OptimizationLevel;
use serde::{Deserialize, Serialize};

use flintc_core::ast::{FileNode, SyntaxArena};
use flintc_core::graph::DepGraph;
use flintc_core::threadpool::PersistentThreadPool;
use flintc_core::type_id::TypeRegistry;

use crate::context::ProgramContext;
use crate::error::CodegenError;
use crate::{comments, linker, program, CompileOptions, CompileResult, OptLevel};

/// A fully-resolved program ready for LLIR generation: exactly the inputs
/// `generate_program_ir` needs (spec.md §4.3.1), bundled so the driver has
/// a single value to pass around and (de)serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    /// Name of the program module; also the default output binary stem.
    pub program_name: String,
    pub registry: TypeRegistry,
    pub arena: SyntaxArena,
    pub files: Vec<FileNode>,
    pub dep_graph: DepGraph,
    /// Whether to generate the test runner entry point instead of the
    /// ordinary process entry point (spec.md §4.3.8).
    pub is_test: bool,
}

/// Runs `flintc-check`'s tier-1 diagnostic pass over every file concurrently
/// on a [`PersistentThreadPool`] (spec.md §4.4: "the driver submits files to
/// a persistent thread pool"). Each task works against its own clone of the
/// arena -- `check_file` mutates only the scopes owned by the file it's
/// given, so cloning sidesteps sharing a `&mut SyntaxArena` across threads
/// without weakening the diagnostic. Returns every [`flintc_check::TypeError`]
/// found, in file order.
fn check_files_concurrently(
    registry: &TypeRegistry,
    arena: &SyntaxArena,
    files: &[FileNode],
    threads: Option<usize>,
) -> Vec<flintc_check::TypeError> {
    let pool = match threads {
        Some(n) => PersistentThreadPool::new(n),
        None => PersistentThreadPool::with_default_size(),
    };
    let handles: Vec<_> = files
        .iter()
        .map(|file| {
            let mut arena = arena.clone();
            let registry = registry.clone();
            let file = file.clone();
            pool.enqueue(move || flintc_check::check_file(&mut arena, &registry, &file))
        })
        .collect();
    let mut errors = Vec::new();
    for handle in handles {
        errors.extend(handle.join());
    }
    pool.wait_for_all_tasks();
    errors
}

/// Compile a [`CompilationUnit`] to a native executable.
///
/// Orchestrates the full pipeline:
/// 1. Type check every file concurrently (tier-1 diagnostics, spec.md §7);
///    abort with no artifact if any file has errors.
/// 2. Re-run the checker serially against the real arena, populating every
///    function's scope symbols for the generator to read.
/// 3. Create a fresh LLVM `Context` and generate the program module
///    (spec.md §4.3.1), single-threaded (spec.md §4.4).
/// 4. Verify the module, run the requested optimization passes.
/// 5. Optionally emit annotated textual LLIR (spec.md §4.3.7, §6.1).
/// 6. Emit an object file and link it into a standalone executable.
pub fn compile(unit: &CompilationUnit, options: &CompileOptions) -> Result<CompileResult, CodegenError> {
    let start = Instant::now();

    let concurrent_errors = check_files_concurrently(&unit.registry, &unit.arena, &unit.files, options.threads);
    if !concurrent_errors.is_empty() {
        return Err(CodegenError::TypeCheckFailed(concurrent_errors));
    }

    let mut arena = unit.arena.clone();
    for file in &unit.files {
        flintc_check::check_file(&mut arena, &unit.registry, file);
    }

    std::fs::create_dir_all(&options.output_dir)?;

    if options.target_triple.is_some() {
        Target::initialize_all(&InitializationConfig::default());
    } else {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(|e| CodegenError::LlvmError(format!("failed to initialize native target: {}", e)))?;
    }

    let context = Context::create();
    let mut pctx = ProgramContext::new(unit.registry.clone());
    let module = program::generate_program_ir(
        &context,
        &unit.program_name,
        &mut pctx,
        &arena,
        &unit.files,
        &unit.dep_graph,
        unit.is_test,
    )?;

    let triple = match &options.target_triple {
        Some(t) => TargetTriple::create(t),
        None => TargetMachine::get_default_triple(),
    };
    module.set_triple(&triple);

    module
        .verify()
        .map_err(|e| CodegenError::LlvmError(format!("module verification failed: {}", e)))?;

    let target = Target::from_triple(&triple)
        .map_err(|e| CodegenError::LlvmError(format!("failed to create target from triple: {}", e)))?;
    let target_machine = target
        .create_target_machine(
            &triple,
            "generic",
            "",
            opt_to_llvm(options.opt_level),
            RelocMode::Default,
            CodeModel::Default,
        )
        .ok_or_else(|| CodegenError::LlvmError("failed to create target machine".to_string()))?;

    let pass_options = PassBuilderOptions::create();
    let pass_str = match options.opt_level {
        OptLevel::O0 => "default<O0>",
        OptLevel::O1 => "default<O1>",
        OptLevel::O2 => "default<O2>",
        OptLevel::O3 => "default<O3>",
    };
    module
        .run_passes(pass_str, &target_machine, pass_options)
        .map_err(|e| CodegenError::LlvmError(format!("optimization passes failed: {}", e)))?;

    let output_path = options
        .out_path
        .clone()
        .unwrap_or_else(|| options.output_dir.join(&unit.program_name));

    let ir_path = if options.emit_ir {
        let path = output_path.with_extension("ll");
        let resolved = comments::resolve_ir_comments(&module.print_to_string().to_string());
        std::fs::write(&path, resolved)?;
        Some(path)
    } else {
        None
    };

    let temp_dir = tempfile::tempdir()?;
    let obj_path = temp_dir.path().join("output.o");
    target_machine
        .write_to_file(&module, FileType::Object, &obj_path)
        .map_err(|e| CodegenError::LlvmError(format!("failed to write object file: {}", e)))?;

    linker::link_executable(&obj_path, &output_path, options.debug_symbols)?;

    let binary_size = std::fs::metadata(&output_path)?.len();
    let compilation_time_ms = start.elapsed().as_millis() as u64;

    Ok(CompileResult {
        binary_path: output_path,
        ir_path,
        target_triple: triple.as_str().to_string_lossy().to_string(),
        binary_size,
        compilation_time_ms,
    })
}

/// Compile a [`CompilationUnit`] to LLVM IR text (spec.md §6.1 `--emit-ir`,
/// and useful for tests that want to inspect the generated IR without
/// invoking the linker). Runs the same check/generate/verify steps as
/// [`compile`] but skips optimization passes, object emission and linking.
pub fn compile_to_ir(unit: &CompilationUnit) -> Result<String, CodegenError> {
    let mut arena = unit.arena.clone();
    let mut errors = Vec::new();
    for file in &unit.files {
        errors.extend(flintc_check::check_file(&mut arena, &unit.registry, file));
    }
    if !errors.is_empty() {
        return Err(CodegenError::TypeCheckFailed(errors));
    }

    Target::initialize_native(&InitializationConfig::default())
        .map_err(|e| CodegenError::LlvmError(format!("failed to initialize native target: {}", e)))?;

    let context = Context::create();
    let mut pctx = ProgramContext::new(unit.registry.clone());
    let module = program::generate_program_ir(
        &context,
        &unit.program_name,
        &mut pctx,
        &arena,
        &unit.files,
        &unit.dep_graph,
        unit.is_test,
    )?;
    module.set_triple(&TargetMachine::get_default_triple());
    module
        .verify()
        .map_err(|e| CodegenError::LlvmError(format!("module verification failed: {}", e)))?;

    Ok(comments::resolve_ir_comments(&module.print_to_string().to_string()))
}

/// Maps `OptLevel` to inkwell's `OptimizationLevel`.
fn opt_to_llvm(level: OptLevel) -> OptimizationLevel {
    match level {
        OptLevel::O0 => OptimizationLevel::None,
        OptLevel::O1 => OptimizationLevel::Less,
        OptLevel::O2 => OptimizationLevel::Default,
        OptLevel::O3 => OptimizationLevel::Aggressive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_to_llvm_mapping() {
        assert_eq!(opt_to_llvm(OptLevel::O0), OptimizationLevel::None);
        assert_eq!(opt_to_llvm(OptLevel::O1), OptimizationLevel::Less);
        assert_eq!(opt_to_llvm(OptLevel::O2), OptimizationLevel::Default);
        assert_eq!(opt_to_llvm(OptLevel::O3), OptimizationLevel::Aggressive);
    }

    #[test]
    fn empty_unit_yields_no_type_errors() {
        let unit = CompilationUnit {
            program_name: "empty".to_string(),
            registry: TypeRegistry::new(),
            arena: SyntaxArena::new(),
            files: Vec::new(),
            dep_graph: DepGraph::new(),
            is_test: false,
        };
        let errors = check_files_concurrently(&unit.registry, &unit.arena, &unit.files, Some(2));
        assert!(errors.is_empty());
    }
}
