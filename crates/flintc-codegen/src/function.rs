//! Function signature table shared across the whole program (spec.md §4.3.1:
//! generation needs to know every function's shape up front to size
//! call-site return structs and forward declarations, regardless of
//! generation order).

use std::collections::HashMap;

use flintc_core::ast::{DefData, FunctionDef};
use flintc_core::id::FileId;
use flintc_core::type_id::TypeId;

#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub owner_file: FileId,
    pub param_types: Vec<TypeId>,
    pub return_types: Vec<TypeId>,
    pub mangle_id: u32,
}

/// Scans every file's top-level definitions, building the global
/// name -> signature table used by call-site lowering and the
/// pre-allocation pass's return-struct sizing. Assigns each non-`main`
/// function its per-file mangle id in declaration order, starting at 1
/// (spec.md §4.3.2 step 1).
pub fn build_signature_table(
    arena: &flintc_core::ast::SyntaxArena,
    files: &[flintc_core::ast::FileNode],
) -> HashMap<String, FunctionSig> {
    let mut table = HashMap::new();
    for file in files {
        let mut mangle_id = 1u32;
        for &def_id in &file.defs {
            if let DefData::Function(f) = arena.def(def_id) {
                let this_mangle = if f.name == "main" { 0 } else { mangle_id };
                if f.name != "main" {
                    mangle_id += 1;
                }
                table.insert(
                    f.name.clone(),
                    FunctionSig {
                        owner_file: file.id,
                        param_types: param_types(f),
                        return_types: f.return_types.clone(),
                        mangle_id: this_mangle,
                    },
                );
            }
        }
    }
    table
}

fn param_types(f: &FunctionDef) -> Vec<TypeId> {
    f.params.iter().map(|p| p.ty).collect()
}
