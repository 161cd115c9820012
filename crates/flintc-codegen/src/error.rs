//! Codegen error types (spec.md §7 tiers 1/2).
//!
//! [`CodegenError::TypeCheckFailed`] carries tier-1 user diagnostics
//! collected by `flintc-check` before lowering starts. Every other variant
//! here is tier-2: an internal-compiler inconsistency (an unknown type
//! reaching the lowering pass, an LLVM verifier failure, a missing entry
//! point). The CLI prints these and aborts; they are never recovered from.

use flintc_check::TypeError;

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Pre-codegen type checking found errors (tier 1, §7).
    #[error("type check failed with {} error(s)", .0.len())]
    TypeCheckFailed(Vec<TypeError>),

    /// `flintc_core::types::TypeRegistry` lookup failed during type lowering
    /// (§4.3.3) -- a type the parser should have registered is missing.
    #[error("type lowering error: {0}")]
    TypeMapping(String),

    /// A construct the lowering pass does not (yet) handle.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// No viable entry point (`main`) found in the program.
    #[error("no entry function found")]
    NoEntryFunction,

    /// AST/dependency-graph structure issue preventing lowering.
    #[error("invalid program: {0}")]
    InvalidProgram(String),

    /// LLVM API failure (module verification, pass failures, target machine).
    #[error("LLVM error: {0}")]
    LlvmError(String),

    /// System linker (`cc`) subprocess failure.
    #[error("linker failed: {0}")]
    LinkerFailed(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
