//! LLIR generation and linking for the language described in spec.md.
//!
//! This crate is the back half of the pipeline (spec.md §2): it takes a
//! fully-resolved [`flintc_core::ast::SyntaxArena`] plus its per-file
//! [`flintc_core::ast::FileNode`]s and [`flintc_core::graph::DepGraph`],
//! lowers every file to LLVM IR (the external LLIR back-end spec.md §2
//! names), links the result into a native executable, and optionally emits
//! the annotated textual IR alongside it.
//!
//! # Modules
//!
//! - [`context`] -- `ProgramContext`, the shared per-program tables (spec.md §9)
//! - [`function`] -- the whole-program function signature table (spec.md §4.3.1)
//! - [`types`] -- type lowering (spec.md §4.3.3)
//! - [`prealloc`] -- the pre-allocation pass (spec.md §4.3.4)
//! - [`lower`] -- statement/expression lowering (spec.md §4.3.5, §4.3.6)
//! - [`library`] -- the compiler-emitted helper library (spec.md §4.5)
//! - [`runtime`] -- extern C runtime declarations the library wraps
//! - [`comments`] -- IR debug-comment metadata (spec.md §4.3.7)
//! - [`file`] -- per-file generation protocol (spec.md §4.3.2)
//! - [`program`] -- program-level assembly and cross-file fix-up (spec.md §4.3.1)
//! - [`compiler`] -- the top-level driver: check, generate, verify, link
//! - [`linker`] -- object file to executable linking via system `cc`
//! - [`error`] -- error types for all compilation failure modes

pub mod comments;
pub mod compiler;
pub mod context;
pub mod error;
pub mod file;
pub mod function;
pub mod library;
pub mod linker;
pub mod lower;
pub mod prealloc;
pub mod program;
pub mod runtime;
pub mod types;

pub use compiler::{compile, compile_to_ir, CompilationUnit};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Optimization level for LLVM's backend passes.
///
/// These are the optimizations "intrinsic to the LLIR back-end" spec.md §1
/// permits (source-level optimization beyond that is an explicit Non-goal).
/// Default is `O0` (no optimization, fastest compilation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptLevel {
    /// No optimization (fastest compilation, easiest debugging).
    O0,
    /// Basic optimizations (inlining, simple loop opts).
    O1,
    /// Standard optimizations (most optimizations enabled).
    O2,
    /// Aggressive optimizations (including vectorization).
    O3,
}

impl Default for OptLevel {
    fn default() -> Self {
        OptLevel::O0
    }
}

/// Options controlling the compilation pipeline (spec.md §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Scratch directory for intermediate build output (object files).
    pub output_dir: PathBuf,

    /// Final binary path. `None` means derive it from the program name
    /// (spec.md §6.1 `--out <path>`).
    pub out_path: Option<PathBuf>,

    /// Whether to also write textual LLIR next to the executable, with
    /// metadata resolved to comments (spec.md §6.1 `--emit-ir`).
    pub emit_ir: bool,

    /// Worker count for the generator's thread pool (spec.md §6.1
    /// `--threads <n>`). `None` means `hardware_concurrency()`.
    pub threads: Option<usize>,

    /// LLVM optimization level.
    pub opt_level: OptLevel,

    /// Target triple for cross-compilation. `None` means the host triple.
    pub target_triple: Option<String>,

    /// Whether to include debug symbols in the output binary.
    pub debug_symbols: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            output_dir: PathBuf::from("./build/"),
            out_path: None,
            emit_ir: false,
            threads: None,
            opt_level: OptLevel::O0,
            target_triple: None,
            debug_symbols: false,
        }
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    /// Path to the output executable binary.
    pub binary_path: PathBuf,

    /// Path to the emitted `.ll` file, if `emit_ir` was set.
    pub ir_path: Option<PathBuf>,

    /// LLVM target triple used for compilation.
    pub target_triple: String,

    /// Size of the output binary in bytes.
    pub binary_size: u64,

    /// Time taken for compilation in milliseconds.
    pub compilation_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_opt_level_is_o0() {
        assert_eq!(OptLevel::default(), OptLevel::O0);
    }

    #[test]
    fn default_compile_options() {
        let opts = CompileOptions::default();
        assert_eq!(opts.output_dir, PathBuf::from("./build/"));
        assert_eq!(opts.opt_level, OptLevel::O0);
        assert!(opts.target_triple.is_none());
        assert!(!opts.debug_symbols);
        assert!(opts.out_path.is_none());
        assert!(!opts.emit_ir);
        assert!(opts.threads.is_none());
    }

    #[test]
    fn opt_level_serde_roundtrip() {
        for level in [OptLevel::O0, OptLevel::O1, OptLevel::O2, OptLevel::O3] {
            let json = serde_json::to_string(&level).unwrap();
            let back: OptLevel = serde_json::from_str(&json).unwrap();
            assert_eq!(level, back);
        }
    }

    #[test]
    fn compile_options_serde_roundtrip() {
        let opts = CompileOptions {
            output_dir: PathBuf::from("/tmp/build"),
            out_path: Some(PathBuf::from("/tmp/build/prog")),
            emit_ir: true,
            threads: Some(4),
            opt_level: OptLevel::O2,
            target_triple: Some("aarch64-apple-darwin".to_string()),
            debug_symbols: true,
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: CompileOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output_dir, opts.output_dir);
        assert_eq!(back.out_path, opts.out_path);
        assert_eq!(back.emit_ir, opts.emit_ir);
        assert_eq!(back.threads, opts.threads);
        assert_eq!(back.opt_level, opts.opt_level);
        assert_eq!(back.target_triple, opts.target_triple);
        assert_eq!(back.debug_symbols, opts.debug_symbols);
    }

    #[test]
    fn compile_result_serde_roundtrip() {
        let result = CompileResult {
            binary_path: PathBuf::from("/tmp/build/output"),
            ir_path: None,
            target_triple: "aarch64-apple-darwin".to_string(),
            binary_size: 12345,
            compilation_time_ms: 500,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: CompileResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.binary_path, result.binary_path);
        assert_eq!(back.target_triple, result.target_triple);
        assert_eq!(back.binary_size, result.binary_size);
        assert_eq!(back.compilation_time_ms, result.compilation_time_ms);
    }
}
