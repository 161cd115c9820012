//! Stable 32-bit type identities and the process-wide type registry.
//!
//! Every [`crate::types::Type`] has a stable string form (its canonical
//! name) and a stable 32-bit `TypeId` derived by hashing that name (spec.md
//! §3.3). Hashing uses FNV-1a: a small, dependency-free, deterministic hash
//! that reproduces "hash of the canonical name" without pulling in a crate
//! for something this mechanical -- the concrete choice `SPEC_FULL.md` §4
//! calls out. Primitive `Type` instances are memoised so that two lookups
//! of `i32` return identical ids without re-hashing.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{PrimitiveType, Type};

/// A stable 32-bit type identity, derived from hashing a type's canonical
/// string form (spec.md §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({:#010x})", self.0)
    }
}

/// FNV-1a, 32-bit. Deterministic, order-sensitive, no external dependency.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Computes the stable `TypeId` for a canonical type name.
pub fn type_id_of(canonical_name: &str) -> TypeId {
    TypeId(fnv1a_32(canonical_name.as_bytes()))
}

/// Registry owning every `Type` produced while lowering a program, keyed by
/// canonical string so that repeated lookups of the same spelling (e.g.
/// `i32`, or a data type's mangled name) return the same memoised [`Type`]
/// and [`TypeId`] (spec.md §3.3: "Primitive type instances are memoised").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRegistry {
    by_name: HashMap<String, TypeId>,
    types: HashMap<TypeId, Type>,
}

impl TypeRegistry {
    /// Builds a registry with the primitive types from spec.md §3.3 table
    /// pre-registered (memoised).
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            by_name: HashMap::new(),
            types: HashMap::new(),
        };
        for prim in PrimitiveType::ALL {
            registry.intern(Type::Primitive(*prim));
        }
        registry
    }

    /// Interns a `Type`, returning its stable id. Interning the same
    /// canonical string twice returns the same id and does not duplicate
    /// storage.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        let name = ty.canonical_name();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = type_id_of(&name);
        self.by_name.insert(name, id);
        self.types.insert(id, ty);
        id
    }

    /// Looks up a previously interned type by its id.
    pub fn get(&self, id: TypeId) -> Result<&Type, CoreError> {
        self.types.get(&id).ok_or(CoreError::TypeNotFound { id })
    }

    /// Looks up a previously interned type by its canonical name, without
    /// registering a new one.
    pub fn get_by_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// The pre-registered id for a primitive type.
    pub fn primitive_id(&self, prim: PrimitiveType) -> TypeId {
        type_id_of(&Type::Primitive(prim).canonical_name())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_is_deterministic() {
        assert_eq!(fnv1a_32(b"i32"), fnv1a_32(b"i32"));
        assert_ne!(fnv1a_32(b"i32"), fnv1a_32(b"i64"));
    }

    #[test]
    fn primitives_preregistered_and_memoised() {
        let mut reg = TypeRegistry::new();
        let id_a = reg.intern(Type::Primitive(PrimitiveType::I32));
        let id_b = reg.primitive_id(PrimitiveType::I32);
        assert_eq!(id_a, id_b);
        assert!(reg.get(id_a).is_ok());
    }

    #[test]
    fn distinct_names_yield_distinct_ids() {
        let mut reg = TypeRegistry::new();
        let a = reg.intern(Type::Primitive(PrimitiveType::I32));
        let b = reg.intern(Type::Primitive(PrimitiveType::U64));
        assert_ne!(a, b);
    }
}
