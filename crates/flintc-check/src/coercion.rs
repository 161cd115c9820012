//! Implicit coercion and widening rules (spec.md §3.3 narrowing-conversion
//! diagnostics), adapted from the teacher's `typecheck::coercion` module to
//! this crate's `PrimitiveType`/`TypeRegistry`.
//!
//! Policy, unchanged from the teacher:
//! - `bool` coerces to any integer type.
//! - Integer widening within the same signedness family (`i8`->`i16`->`i32`->`i64`,
//!   `u8`->`u16`->`u32`->`u64`).
//! - `f32` -> `f64`.
//! - No implicit int<->float conversion and no narrowing -- both require an
//!   explicit `TypeCast` expression.

use flintc_core::{PrimitiveType, Type, TypeId, TypeRegistry};

fn primitive_of(type_id: TypeId, registry: &TypeRegistry) -> Option<PrimitiveType> {
    match registry.get(type_id).ok()? {
        Type::Primitive(p) => Some(*p),
        _ => None,
    }
}

fn integer_rank(p: PrimitiveType) -> Option<u8> {
    match p {
        PrimitiveType::I8 | PrimitiveType::U8 => Some(0),
        PrimitiveType::I16 | PrimitiveType::U16 => Some(1),
        PrimitiveType::I32 | PrimitiveType::U32 => Some(2),
        PrimitiveType::I64 | PrimitiveType::U64 => Some(3),
        _ => None,
    }
}

/// Returns `true` if a value of type `from` can implicitly coerce to `to`.
pub fn can_coerce(from: TypeId, to: TypeId, registry: &TypeRegistry) -> bool {
    if from == to {
        return true;
    }
    let (Some(fp), Some(tp)) = (primitive_of(from, registry), primitive_of(to, registry)) else {
        return false;
    };

    if fp == PrimitiveType::Bool && tp.is_integer() {
        return true;
    }
    if fp.is_signed_integer() && tp.is_signed_integer() {
        return integer_rank(fp) < integer_rank(tp);
    }
    if fp.is_unsigned_integer() && tp.is_unsigned_integer() {
        return integer_rank(fp) < integer_rank(tp);
    }
    if fp == PrimitiveType::F32 && tp == PrimitiveType::F64 {
        return true;
    }
    false
}

pub fn is_integer(type_id: TypeId, registry: &TypeRegistry) -> bool {
    primitive_of(type_id, registry).is_some_and(PrimitiveType::is_integer)
}

pub fn is_float(type_id: TypeId, registry: &TypeRegistry) -> bool {
    primitive_of(type_id, registry).is_some_and(PrimitiveType::is_float)
}

pub fn is_numeric(type_id: TypeId, registry: &TypeRegistry) -> bool {
    is_integer(type_id, registry) || is_float(type_id, registry)
}

pub fn is_bool(type_id: TypeId, registry: &TypeRegistry) -> bool {
    primitive_of(type_id, registry) == Some(PrimitiveType::Bool)
}

/// The common (wider) numeric type for a binary arithmetic operation on `a`
/// and `b`, if one exists. `bool` resolves to `i8` for this purpose, as in
/// the teacher.
pub fn common_numeric_type(a: TypeId, b: TypeId, registry: &TypeRegistry) -> Option<TypeId> {
    let resolve = |t: TypeId| -> TypeId {
        if is_bool(t, registry) {
            registry.primitive_id(PrimitiveType::I8)
        } else {
            t
        }
    };
    let (ra, rb) = (resolve(a), resolve(b));
    if ra == rb && is_numeric(ra, registry) {
        return Some(ra);
    }
    if can_coerce(ra, rb, registry) {
        return Some(rb);
    }
    if can_coerce(rb, ra, registry) {
        return Some(ra);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_coerces_to_any_integer() {
        let reg = TypeRegistry::new();
        let bool_id = reg.primitive_id(PrimitiveType::Bool);
        let i32_id = reg.primitive_id(PrimitiveType::I32);
        assert!(can_coerce(bool_id, i32_id, &reg));
    }

    #[test]
    fn narrowing_is_rejected() {
        let reg = TypeRegistry::new();
        let i64_id = reg.primitive_id(PrimitiveType::I64);
        let i32_id = reg.primitive_id(PrimitiveType::I32);
        assert!(!can_coerce(i64_id, i32_id, &reg));
    }

    #[test]
    fn int_float_is_not_implicit() {
        let reg = TypeRegistry::new();
        let i32_id = reg.primitive_id(PrimitiveType::I32);
        let f32_id = reg.primitive_id(PrimitiveType::F32);
        assert!(!can_coerce(i32_id, f32_id, &reg));
        assert!(!can_coerce(f32_id, i32_id, &reg));
    }

    #[test]
    fn common_numeric_type_widens() {
        let reg = TypeRegistry::new();
        let i8_id = reg.primitive_id(PrimitiveType::I8);
        let i32_id = reg.primitive_id(PrimitiveType::I32);
        assert_eq!(common_numeric_type(i8_id, i32_id, &reg), Some(i32_id));
    }
}
