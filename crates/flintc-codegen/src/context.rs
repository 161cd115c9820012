//! `ProgramContext`: every shared table the original scattered as process-wide
//! globals, gathered into one struct owned by the driver and threaded
//! explicitly through program -> file -> function lowering (spec.md §9,
//! SPEC_FULL.md §6). Resolves the Open Question on unresolved-call key
//! collisions by keying on `(name, lowered_signature)` rather than bare name.

use std::collections::HashMap;

use inkwell::values::FunctionValue;

use flintc_core::id::FileId;
use flintc_core::type_id::TypeRegistry;

/// `(function name, lowered signature)` -- the Open-Question-resolving key
/// for the unresolved-call tables (spec.md §9).
pub type CallKey = (String, String);

/// The deterministic LLVM symbol for function `mangle_id` forward-declared
/// in file `file_id` (spec.md §4.3.2 step 1: "monotonic per-file mangle id
/// starting at 1").
pub fn mangled_fn_name(file_id: FileId, mangle_id: u32) -> String {
    format!("__flint_fn_{}_{}", file_id.0, mangle_id)
}

/// Renders a function's lowered signature as a stable string: parameter
/// type spellings, then return type spellings, joined -- the "lowered
/// signature" half of the `(name, lowered_signature)` unresolved-call key.
pub fn signature_key(param_types: &[flintc_core::type_id::TypeId], return_types: &[flintc_core::type_id::TypeId], registry: &TypeRegistry) -> String {
    let params: Vec<String> = param_types
        .iter()
        .map(|t| registry.get(*t).map(|ty| ty.canonical_name()).unwrap_or_else(|_| format!("{}", t)))
        .collect();
    let rets: Vec<String> = return_types
        .iter()
        .map(|t| registry.get(*t).map(|ty| ty.canonical_name()).unwrap_or_else(|_| format!("{}", t)))
        .collect();
    format!("({})->({})", params.join(","), rets.join(","))
}

/// Per-program shared state threaded through every lowering phase.
pub struct ProgramContext<'ctx> {
    pub registry: TypeRegistry,

    /// Per-file set of declared function source names (spec.md §4.3.2 step 1:
    /// "Record the file's function names in a global map keyed by file identity").
    pub file_function_names: HashMap<FileId, std::collections::HashSet<String>>,

    /// Per-file map from source function name to its forward-declaration
    /// mangle id (spec.md §4.3.2 steps 1 and 6).
    pub file_function_mangle_ids: HashMap<FileId, HashMap<String, u32>>,

    /// Intra-file unresolved calls: populated during per-function lowering,
    /// drained (and asserted resolved) at file end (spec.md §4.3.2 step 5).
    pub unresolved_functions: HashMap<CallKey, Vec<FunctionValue<'ctx>>>,

    /// Cross-file unresolved calls, keyed by the *target* file they refer
    /// to. Each entry's value is the placeholder function object that every
    /// call site in every calling file funnels through; redirected to the
    /// real definition at program-level fix-up (spec.md §4.3.2 step 6).
    pub file_unresolved_functions: HashMap<FileId, HashMap<CallKey, FunctionValue<'ctx>>>,

    /// Return-struct type memo, keyed by the concatenation of return-type
    /// spellings (spec.md §4.3.3).
    pub return_struct_types: HashMap<String, inkwell::types::StructType<'ctx>>,

    /// Cached data/entity struct type mapping, keyed by `DefId` (spec.md
    /// §4.3.3: "Data records map to LLIR struct types keyed by field order").
    pub data_struct_types: HashMap<u32, inkwell::types::StructType<'ctx>>,
}

impl<'ctx> ProgramContext<'ctx> {
    pub fn new(registry: TypeRegistry) -> Self {
        ProgramContext {
            registry,
            file_function_names: HashMap::new(),
            file_function_mangle_ids: HashMap::new(),
            unresolved_functions: HashMap::new(),
            file_unresolved_functions: HashMap::new(),
            return_struct_types: HashMap::new(),
            data_struct_types: HashMap::new(),
        }
    }
}
