//! Type lowering (spec.md §4.3.3): `flintc_core::types::Type` -> LLVM types.
//!
//! Primitives map to the obvious fixed-width integer/float LLVM types.
//! `str` lowers to a pointer to `{ i64 len, [0 x i8] data }` (flex-array
//! record, spec.md §4.5.1). Multi-types lower to fixed-width LLVM arrays.
//! Data records lower to LLVM struct types keyed by field order. Every
//! function's return type is a struct `{ i32 err, ...declared fields }`,
//! memoised by the concatenation of return-type spellings (spec.md §4.3.3).

use inkwell::context::Context;
use inkwell::types::{BasicType, BasicTypeEnum, StructType};
use inkwell::AddressSpace;

use flintc_core::type_id::TypeId;
use flintc_core::types::{MultiWidth, PrimitiveType, Type};

use crate::context::ProgramContext;
use crate::error::CodegenError;

/// The LLVM representation of the language's `str` value: a pointer to a
/// heap record with a length prefix and inline byte data (spec.md §4.5.1).
pub fn str_record_type<'ctx>(context: &'ctx Context) -> StructType<'ctx> {
    context.struct_type(
        &[
            context.i64_type().into(),
            context.i8_type().array_type(0).into(),
        ],
        false,
    )
}

/// Pointer-to-`str`-record: the value type every `str` binding actually
/// carries.
pub fn str_ptr_type<'ctx>(context: &'ctx Context) -> BasicTypeEnum<'ctx> {
    context.ptr_type(AddressSpace::default()).into()
}

fn multi_width_count(width: MultiWidth) -> u32 {
    width.as_u8() as u32
}

/// Lowers a single `Type` to an LLVM `BasicTypeEnum`.
pub fn lower_type<'ctx>(
    context: &'ctx Context,
    ctx: &mut ProgramContext<'ctx>,
    type_id: TypeId,
) -> Result<BasicTypeEnum<'ctx>, CodegenError> {
    let ty = ctx
        .registry
        .get(type_id)
        .map_err(|e| CodegenError::TypeMapping(e.to_string()))?
        .clone();
    match ty {
        Type::Primitive(p) => Ok(lower_primitive(context, p)),
        Type::MultiType { element, width } => {
            let elem_id = ctx.registry.get_by_name(&element.canonical_name()).ok_or_else(|| {
                CodegenError::TypeMapping(format!("element type {} not registered", element.canonical_name()))
            })?;
            let elem_ty = lower_type(context, ctx, elem_id)?;
            Ok(elem_ty.array_type(multi_width_count(width)).into())
        }
        Type::Data(def_id) => {
            if let Some(st) = ctx.data_struct_types.get(&def_id.0) {
                return Ok((*st).into());
            }
            Err(CodegenError::TypeMapping(format!(
                "data struct for DefId({}) not yet registered -- must be lowered before first use",
                def_id.0
            )))
        }
        Type::Entity(_) => Err(CodegenError::Unsupported("entity types are not lowered by the code generator".into())),
        Type::ErrorSet { .. } => Ok(context.i32_type().into()),
        Type::Variant { .. } => Err(CodegenError::Unsupported("variant types are not yet lowered".into())),
        Type::Optional(inner) => {
            // Optional<T> lowers to {i1 has_value, T value}.
            let inner_id = ctx.registry.get_by_name(&inner.canonical_name()).ok_or_else(|| {
                CodegenError::TypeMapping(format!("optional inner type {} not registered", inner.canonical_name()))
            })?;
            let inner_ty = lower_type(context, ctx, inner_id)?;
            Ok(context.struct_type(&[context.bool_type().into(), inner_ty], false).into())
        }
    }
}

fn lower_primitive<'ctx>(context: &'ctx Context, prim: PrimitiveType) -> BasicTypeEnum<'ctx> {
    match prim {
        PrimitiveType::I8 | PrimitiveType::U8 => context.i8_type().into(),
        PrimitiveType::I16 | PrimitiveType::U16 => context.i16_type().into(),
        PrimitiveType::I32 | PrimitiveType::U32 => context.i32_type().into(),
        PrimitiveType::I64 | PrimitiveType::U64 => context.i64_type().into(),
        PrimitiveType::F32 => context.f32_type().into(),
        PrimitiveType::F64 => context.f64_type().into(),
        PrimitiveType::Bool => context.bool_type().into(),
        PrimitiveType::Str => str_ptr_type(context),
        PrimitiveType::Void => context.struct_type(&[], false).into(),
    }
}

/// Registers a `DataDef`'s LLVM struct type (field order preserved), keyed
/// by `DefId` (spec.md §4.3.3).
pub fn register_data_struct<'ctx>(
    context: &'ctx Context,
    ctx: &mut ProgramContext<'ctx>,
    def_id: u32,
    field_types: &[TypeId],
) -> Result<StructType<'ctx>, CodegenError> {
    if let Some(st) = ctx.data_struct_types.get(&def_id) {
        return Ok(*st);
    }
    let mut fields = Vec::with_capacity(field_types.len());
    for &tid in field_types {
        fields.push(lower_type(context, ctx, tid)?);
    }
    let st = context.struct_type(&fields, false);
    ctx.data_struct_types.insert(def_id, st);
    Ok(st)
}

/// Builds (or returns the memoised) return-struct type `{ i32 err, ...ret }`
/// for a function returning `return_types` (spec.md §4.3.3: "memoised by
/// the concatenation of return-type spellings"; void yields `{i32}`).
pub fn return_struct_type<'ctx>(
    context: &'ctx Context,
    ctx: &mut ProgramContext<'ctx>,
    return_types: &[TypeId],
) -> Result<StructType<'ctx>, CodegenError> {
    let key: String = {
        let mut parts = Vec::with_capacity(return_types.len());
        for &tid in return_types {
            let name = ctx
                .registry
                .get(tid)
                .map_err(|e| CodegenError::TypeMapping(e.to_string()))?
                .canonical_name();
            parts.push(name);
        }
        parts.join(",")
    };
    if let Some(st) = ctx.return_struct_types.get(&key) {
        return Ok(*st);
    }
    let mut fields: Vec<BasicTypeEnum<'ctx>> = vec![context.i32_type().into()];
    for &tid in return_types {
        fields.push(lower_type(context, ctx, tid)?);
    }
    let st = context.struct_type(&fields, false);
    ctx.return_struct_types.insert(key, st);
    Ok(st)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_return_struct_is_single_i32() {
        let context = Context::create();
        let mut ctx = ProgramContext::new(flintc_core::type_id::TypeRegistry::new());
        let st = return_struct_type(&context, &mut ctx, &[]).unwrap();
        assert_eq!(st.count_fields(), 1);
    }

    #[test]
    fn return_struct_memoised_by_spelling() {
        let context = Context::create();
        let mut registry = flintc_core::type_id::TypeRegistry::new();
        let i32_id = registry.primitive_id(PrimitiveType::I32);
        let mut ctx = ProgramContext::new(registry);
        let a = return_struct_type(&context, &mut ctx, &[i32_id]).unwrap();
        let b = return_struct_type(&context, &mut ctx, &[i32_id]).unwrap();
        assert_eq!(a, b);
        assert_eq!(ctx.return_struct_types.len(), 1);
    }

    #[test]
    fn primitive_widths_map_correctly() {
        let context = Context::create();
        assert_eq!(lower_primitive(&context, PrimitiveType::I8).into_int_type().get_bit_width(), 8);
        assert_eq!(lower_primitive(&context, PrimitiveType::I64).into_int_type().get_bit_width(), 64);
    }
}
