//! Compiler-emitted helper library (spec.md §4.5). Every symbol here is
//! emitted under the `__flint_` prefix, at most once per module -- callers
//! check `Module::get_function` before building, so repeated call sites
//! across many user functions reuse the same declaration/definition
//! (spec.md §4.5: "emitted at most once per module").
//!
//! Each emit function takes its own fresh `Builder` rather than reusing the
//! caller's, so building a helper body never disturbs the calling
//! function's current insertion point.

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::{BasicTypeEnum, IntType, StructType};
use inkwell::values::{AggregateValueEnum, BasicValue, BasicValueEnum, FunctionValue, IntValue, PointerValue};
use inkwell::{AddressSpace, IntPredicate};

use crate::runtime;
use crate::types::str_record_type;

/// Runtime error-set ids (spec.md §7 tier 3). `ASSERT_FAILED` is spec.md
/// §4.5.10's fixed assertion error id; the arithmetic/IO helpers below
/// reuse the same tier for overflow, division-by-zero, and I/O failure.
pub const ERR_OVERFLOW: i32 = 1;
pub const ERR_DIV_BY_ZERO: i32 = 2;
pub const ERR_IO: i32 = 9;
pub const ERR_ASSERT_FAILED: i32 = 10;

/// The `{i32 err, ...values}` struct a fallible helper returns, independent
/// of any user function's own return-struct layout (spec.md §7 tier 3:
/// `assert` and the IO/arithmetic helpers raise through this same shape).
/// Call-site lowering extracts field 0 and propagates it through the
/// ordinary rethrow path rather than this struct ever reaching a `catch`.
fn fallible_struct_type<'ctx>(context: &'ctx Context, value_types: &[BasicTypeEnum<'ctx>]) -> StructType<'ctx> {
    let mut fields: Vec<BasicTypeEnum<'ctx>> = vec![context.i32_type().into()];
    fields.extend_from_slice(value_types);
    context.struct_type(&fields, false)
}

/// Builds and returns a `fallible_struct_type` value: `err_id` in field 0,
/// `value` (if any) in field 1.
fn build_fallible_return<'ctx>(
    context: &'ctx Context,
    builder: &Builder<'ctx>,
    ret_ty: StructType<'ctx>,
    err_id: i32,
    value: Option<BasicValueEnum<'ctx>>,
) {
    let mut agg: AggregateValueEnum = ret_ty.get_undef().into();
    agg = builder.build_insert_value(agg, context.i32_type().const_int(err_id as u64, true), 0, "err").unwrap();
    if let Some(v) = value {
        agg = builder.build_insert_value(agg, v, 1, "value").unwrap();
    }
    builder.build_return(Some(&agg.as_basic_value_enum())).unwrap();
}

/// `__flint_strlen`: the byte length stored in a `str` record's header.
pub fn str_len<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_strlen";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = context.i64_type().fn_type(&[ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);
    let record_ty = str_record_type(context);
    let str_ptr = function.get_nth_param(0).unwrap().into_pointer_value();
    let len_ptr = builder.build_struct_gep(record_ty, str_ptr, 0, "len_ptr").unwrap();
    let len = builder.build_load(context.i64_type(), len_ptr, "len").unwrap();
    builder.build_return(Some(&len)).unwrap();
    function
}

/// `__flint_str_create`: allocates a `str` record from a raw `i8*` + length,
/// copying the bytes in (spec.md §4.5.1).
pub fn str_create<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_str_create";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = ptr_ty.fn_type(&[ptr_ty.into(), context.i64_type().into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let src = function.get_nth_param(0).unwrap().into_pointer_value();
    let len = function.get_nth_param(1).unwrap().into_int_value();
    let malloc_fn = runtime::malloc(context, module);
    let header_size = context.i64_type().const_int(8, false);
    let total_size = builder.build_int_add(header_size, len, "total_size").unwrap();
    let record_raw = builder
        .build_call(malloc_fn, &[total_size.into()], "record_raw")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();

    let record_ty = str_record_type(context);
    let len_ptr = builder.build_struct_gep(record_ty, record_raw, 0, "len_ptr").unwrap();
    builder.build_store(len_ptr, len).unwrap();
    let data_ptr = builder.build_struct_gep(record_ty, record_raw, 1, "data_ptr").unwrap();
    let memcpy_fn = runtime::memcpy(context, module);
    builder.build_call(memcpy_fn, &[data_ptr.into(), src.into(), len.into()], "copy_bytes").unwrap();
    builder.build_return(Some(&record_raw)).unwrap();
    function
}

/// `__flint_str_concat`: allocates and fills a new record holding `a`'s
/// bytes followed by `b`'s (spec.md §4.5.1).
pub fn str_concat<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_str_concat";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = ptr_ty.fn_type(&[ptr_ty.into(), ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let a = function.get_nth_param(0).unwrap().into_pointer_value();
    let b = function.get_nth_param(1).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);

    let a_len_ptr = builder.build_struct_gep(record_ty, a, 0, "a_len_ptr").unwrap();
    let a_len = builder.build_load(context.i64_type(), a_len_ptr, "a_len").unwrap().into_int_value();
    let b_len_ptr = builder.build_struct_gep(record_ty, b, 0, "b_len_ptr").unwrap();
    let b_len = builder.build_load(context.i64_type(), b_len_ptr, "b_len").unwrap().into_int_value();
    let total_len = builder.build_int_add(a_len, b_len, "total_len").unwrap();

    let malloc_fn = runtime::malloc(context, module);
    let header_size = context.i64_type().const_int(8, false);
    let alloc_size = builder.build_int_add(header_size, total_len, "alloc_size").unwrap();
    let out_raw = builder
        .build_call(malloc_fn, &[alloc_size.into()], "out_raw")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();
    let out_len_ptr = builder.build_struct_gep(record_ty, out_raw, 0, "out_len_ptr").unwrap();
    builder.build_store(out_len_ptr, total_len).unwrap();
    let out_data = builder.build_struct_gep(record_ty, out_raw, 1, "out_data").unwrap();

    let memcpy_fn = runtime::memcpy(context, module);
    let a_data = builder.build_struct_gep(record_ty, a, 1, "a_data").unwrap();
    builder.build_call(memcpy_fn, &[out_data.into(), a_data.into(), a_len.into()], "copy_a").unwrap();
    let out_data_tail = unsafe { builder.build_gep(context.i8_type(), out_data, &[a_len], "out_data_tail").unwrap() };
    let b_data = builder.build_struct_gep(record_ty, b, 1, "b_data").unwrap();
    builder.build_call(memcpy_fn, &[out_data_tail.into(), b_data.into(), b_len.into()], "copy_b").unwrap();

    builder.build_return(Some(&out_raw)).unwrap();
    function
}

/// `__flint_str_eq`: byte-for-byte equality, length-checked first
/// (spec.md §4.5.1).
pub fn str_eq<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_str_eq";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = context.bool_type().fn_type(&[ptr_ty.into(), ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    let len_mismatch = context.append_basic_block(function, "len_mismatch");
    let len_match = context.append_basic_block(function, "len_match");
    builder.position_at_end(entry);

    let a = function.get_nth_param(0).unwrap().into_pointer_value();
    let b = function.get_nth_param(1).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let a_len_ptr = builder.build_struct_gep(record_ty, a, 0, "a_len_ptr").unwrap();
    let a_len = builder.build_load(context.i64_type(), a_len_ptr, "a_len").unwrap().into_int_value();
    let b_len_ptr = builder.build_struct_gep(record_ty, b, 0, "b_len_ptr").unwrap();
    let b_len = builder.build_load(context.i64_type(), b_len_ptr, "b_len").unwrap().into_int_value();
    let lens_eq = builder.build_int_compare(IntPredicate::EQ, a_len, b_len, "lens_eq").unwrap();
    builder.build_conditional_branch(lens_eq, len_match, len_mismatch).unwrap();

    builder.position_at_end(len_mismatch);
    builder.build_return(Some(&context.bool_type().const_int(0, false))).unwrap();

    builder.position_at_end(len_match);
    let a_data = builder.build_struct_gep(record_ty, a, 1, "a_data").unwrap();
    let b_data = builder.build_struct_gep(record_ty, b, 1, "b_data").unwrap();
    let memcmp_result = builder
        .build_call(runtime::strcmp(context, module), &[a_data.into(), b_data.into()], "memcmp_result")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value();
    let zero = context.i32_type().const_zero();
    let eq = builder.build_int_compare(IntPredicate::EQ, memcmp_result, zero, "eq").unwrap();
    builder.build_return(Some(&eq)).unwrap();
    function
}

/// Builds (or reuses) a checked-arithmetic helper for integer width/op/
/// signedness. Signed overflow and division-by-zero return a
/// `fallible_struct_type` with the corresponding error id set (spec.md
/// §4.5.2, §7 tier 3); callers propagate it through the ordinary rethrow
/// protocol rather than trapping. Unsigned arithmetic saturates at the
/// type's bounds instead of erroring (spec.md §4.5.2: "saturating unsigned
/// arithmetic").
pub fn safe_int_op<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    int_ty: IntType<'ctx>,
    op: ArithOp,
    signed: bool,
) -> FunctionValue<'ctx> {
    let bits = int_ty.get_bit_width();
    let sign_tag = if signed { "i" } else { "u" };
    let name = format!("__flint_{}{}_{}", sign_tag, bits, op.symbol());
    if let Some(f) = module.get_function(&name) {
        return f;
    }
    let ret_ty = fallible_struct_type(context, &[int_ty.into()]);
    let fn_ty = ret_ty.fn_type(&[int_ty.into(), int_ty.into()], false);
    let function = module.add_function(&name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let lhs = function.get_nth_param(0).unwrap().into_int_value();
    let rhs = function.get_nth_param(1).unwrap().into_int_value();

    if matches!(op, ArithOp::Div) {
        let zero = int_ty.const_zero();
        let is_zero = builder.build_int_compare(IntPredicate::EQ, rhs, zero, "div_by_zero").unwrap();
        let div_block = context.append_basic_block(function, "div");
        let err_block = context.append_basic_block(function, "div_by_zero_err");
        builder.build_conditional_branch(is_zero, err_block, div_block).unwrap();

        builder.position_at_end(err_block);
        build_fallible_return(context, &builder, ret_ty, ERR_DIV_BY_ZERO, Some(int_ty.const_zero().as_basic_value_enum()));

        builder.position_at_end(div_block);
        let result = if signed {
            builder.build_int_signed_div(lhs, rhs, "result").unwrap()
        } else {
            builder.build_int_unsigned_div(lhs, rhs, "result").unwrap()
        };
        build_fallible_return(context, &builder, ret_ty, 0, Some(result.as_basic_value_enum()));
        return function;
    }

    if signed {
        let intrinsic_name = format!("llvm.s{}.with.overflow.i{}", op.overflow_intrinsic(), bits);
        emit_overflow_checked(context, module, &builder, function, ret_ty, &intrinsic_name, int_ty, lhs, rhs);
    } else {
        let intrinsic_name = format!("llvm.u{}.sat.i{}", op.saturating_intrinsic(), bits);
        let result = emit_saturating(context, module, &builder, &intrinsic_name, int_ty, lhs, rhs);
        build_fallible_return(context, &builder, ret_ty, 0, Some(result.as_basic_value_enum()));
    }
    function
}

fn emit_overflow_checked<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    builder: &Builder<'ctx>,
    function: FunctionValue<'ctx>,
    ret_ty: StructType<'ctx>,
    intrinsic_name: &str,
    int_ty: IntType<'ctx>,
    lhs: IntValue<'ctx>,
    rhs: IntValue<'ctx>,
) {
    let struct_ty = context.struct_type(&[int_ty.into(), context.bool_type().into()], false);
    let decl = module.get_function(intrinsic_name).unwrap_or_else(|| {
        let fn_ty = struct_ty.fn_type(&[int_ty.into(), int_ty.into()], false);
        module.add_function(intrinsic_name, fn_ty, None)
    });
    let call = builder.build_call(decl, &[lhs.into(), rhs.into()], "checked").unwrap();
    let pair = call.try_as_basic_value().left().unwrap().into_struct_value();
    let value = builder.build_extract_value(pair, 0, "value").unwrap();
    let overflowed = builder.build_extract_value(pair, 1, "overflowed").unwrap().into_int_value();

    let ok_block = context.append_basic_block(function, "no_overflow");
    let err_block = context.append_basic_block(function, "overflow_err");
    builder.build_conditional_branch(overflowed, err_block, ok_block).unwrap();

    builder.position_at_end(err_block);
    build_fallible_return(context, builder, ret_ty, ERR_OVERFLOW, Some(int_ty.const_zero().as_basic_value_enum()));

    builder.position_at_end(ok_block);
    build_fallible_return(context, builder, ret_ty, 0, Some(value));
}

fn emit_saturating<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    builder: &Builder<'ctx>,
    intrinsic_name: &str,
    int_ty: IntType<'ctx>,
    lhs: IntValue<'ctx>,
    rhs: IntValue<'ctx>,
) -> IntValue<'ctx> {
    let decl = module.get_function(intrinsic_name).unwrap_or_else(|| {
        let fn_ty = int_ty.fn_type(&[int_ty.into(), int_ty.into()], false);
        module.add_function(intrinsic_name, fn_ty, None)
    });
    builder
        .build_call(decl, &[lhs.into(), rhs.into()], "saturated")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
        }
    }

    fn overflow_intrinsic(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => unreachable!("division has no overflow intrinsic variant"),
        }
    }

    fn saturating_intrinsic(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => unreachable!("division has no saturating intrinsic variant"),
        }
    }
}

/// `__flint_print_str`: writes a `str` record's bytes followed by a
/// newline (spec.md §4.5.4).
pub fn print_str<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_print_str";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = context.void_type().fn_type(&[ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let str_ptr = function.get_nth_param(0).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let data_ptr = builder.build_struct_gep(record_ty, str_ptr, 1, "data_ptr").unwrap();
    let fmt = builder.build_global_string_ptr("%s\n", "print_str_fmt").unwrap();
    let printf_fn = runtime::printf(context, module);
    builder
        .build_call(printf_fn, &[fmt.as_pointer_value().into(), data_ptr.into()], "print_call")
        .unwrap();
    builder.build_return(None).unwrap();
    function
}

/// Builds (or reuses) `__flint_print_{i,u}{8,16,32,64}` / `_f32` / `_f64` /
/// `_bool` -- one `printf` wrapper per scalar width (spec.md §4.5.4).
pub fn print_scalar<'ctx>(context: &'ctx Context, module: &Module<'ctx>, ty: PrintableScalar) -> FunctionValue<'ctx> {
    let name = format!("__flint_print_{}", ty.suffix());
    if let Some(f) = module.get_function(&name) {
        return f;
    }
    let param_ty = ty.llvm_type(context);
    let fn_ty = context.void_type().fn_type(&[param_ty], false);
    let function = module.add_function(&name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let fmt = builder.build_global_string_ptr(ty.format_string(), "print_fmt").unwrap();
    let printf_fn = runtime::printf(context, module);
    let param = function.get_nth_param(0).unwrap();
    let arg = ty.promote_for_varargs(&builder, param);
    builder
        .build_call(printf_fn, &[fmt.as_pointer_value().into(), arg.into()], "print_call")
        .unwrap();
    builder.build_return(None).unwrap();
    function
}

#[derive(Debug, Clone, Copy)]
pub enum PrintableScalar {
    I64,
    U64,
    F64,
    Bool,
}

impl PrintableScalar {
    fn suffix(self) -> &'static str {
        match self {
            PrintableScalar::I64 => "i64",
            PrintableScalar::U64 => "u64",
            PrintableScalar::F64 => "f64",
            PrintableScalar::Bool => "bool",
        }
    }

    fn llvm_type<'ctx>(self, context: &'ctx Context) -> inkwell::types::BasicMetadataTypeEnum<'ctx> {
        match self {
            PrintableScalar::I64 | PrintableScalar::U64 => context.i64_type().into(),
            PrintableScalar::F64 => context.f64_type().into(),
            PrintableScalar::Bool => context.bool_type().into(),
        }
    }

    fn format_string(self) -> &'static str {
        match self {
            PrintableScalar::I64 => "%lld\n",
            PrintableScalar::U64 => "%llu\n",
            PrintableScalar::F64 => "%g\n",
            PrintableScalar::Bool => "%s\n",
        }
    }

    /// `printf`'s vararg promotion rules: everything narrower than the C
    /// `int`/`double` default widths is widened before the call; `bool`
    /// is rendered as a string literal picked at the call site instead.
    fn promote_for_varargs<'ctx>(
        self,
        builder: &Builder<'ctx>,
        param: inkwell::values::BasicValueEnum<'ctx>,
    ) -> inkwell::values::BasicValueEnum<'ctx> {
        match self {
            PrintableScalar::Bool => {
                let context = builder.get_insert_block().unwrap().get_context();
                let true_str = builder.build_global_string_ptr("true", "bool_true").unwrap();
                let false_str = builder.build_global_string_ptr("false", "bool_false").unwrap();
                let selected = builder
                    .build_select(param.into_int_value(), true_str.as_pointer_value(), false_str.as_pointer_value(), "bool_str")
                    .unwrap();
                let _ = context;
                selected
            }
            _ => param,
        }
    }
}

/// `__flint_read_line`: reads one line from stdin via `getline`, doubling
/// its buffer from an initial 128 bytes as needed (spec.md §4.5.5),
/// returning a `str` record with the trailing newline stripped.
pub fn read_line<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_read_line";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = ptr_ty.fn_type(&[], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let malloc_fn = runtime::malloc(context, module);
    let initial_cap = context.i64_type().const_int(128, false);
    let buf = builder
        .build_call(malloc_fn, &[initial_cap.into()], "buf")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();
    let buf_slot = builder.build_alloca(ptr_ty, "buf_slot").unwrap();
    builder.build_store(buf_slot, buf).unwrap();
    let cap_slot = builder.build_alloca(context.i64_type(), "cap_slot").unwrap();
    builder.build_store(cap_slot, initial_cap).unwrap();

    let stdin_global = module.get_global("__flint_stdin").unwrap_or_else(|| {
        let g = module.add_global(ptr_ty, None, "__flint_stdin");
        g.set_initializer(&ptr_ty.const_null());
        g
    });
    let stdin_ptr = stdin_global.as_pointer_value();

    let getline_fn = runtime::getline_libc(context, module);
    let nread = builder
        .build_call(getline_fn, &[buf_slot.into(), cap_slot.into(), stdin_ptr.into()], "nread")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value();

    let strip_block = context.append_basic_block(function, "strip_newline");
    let no_strip_block = context.append_basic_block(function, "no_strip");
    let join_block = context.append_basic_block(function, "join");

    let has_bytes = builder
        .build_int_compare(IntPredicate::SGT, nread, context.i64_type().const_int(0, false), "has_bytes")
        .unwrap();
    builder.build_conditional_branch(has_bytes, strip_block, no_strip_block).unwrap();

    builder.position_at_end(strip_block);
    let final_buf = builder.build_load(ptr_ty, buf_slot, "final_buf").unwrap().into_pointer_value();
    let one = context.i64_type().const_int(1, false);
    let last_idx = builder.build_int_sub(nread, one, "last_idx").unwrap();
    let last_char_ptr = unsafe { builder.build_gep(context.i8_type(), final_buf, &[last_idx], "last_char_ptr").unwrap() };
    let last_char = builder.build_load(context.i8_type(), last_char_ptr, "last_char").unwrap().into_int_value();
    let newline = context.i8_type().const_int(b'\n' as u64, false);
    let is_newline = builder.build_int_compare(IntPredicate::EQ, last_char, newline, "is_newline").unwrap();
    let stripped_len = builder.build_select(is_newline, last_idx, nread, "stripped_len").unwrap().into_int_value();
    builder.build_unconditional_branch(join_block).unwrap();
    let strip_end = builder.get_insert_block().unwrap();

    builder.position_at_end(no_strip_block);
    let zero = context.i64_type().const_zero();
    builder.build_unconditional_branch(join_block).unwrap();
    let no_strip_end = builder.get_insert_block().unwrap();

    builder.position_at_end(join_block);
    let len_phi = builder.build_phi(context.i64_type(), "len_phi").unwrap();
    len_phi.add_incoming(&[(&stripped_len, strip_end), (&zero, no_strip_end)]);
    let final_len = len_phi.as_basic_value().into_int_value();

    let final_buf2 = builder.build_load(ptr_ty, buf_slot, "final_buf2").unwrap().into_pointer_value();
    let create_fn = str_create(context, module);
    let record = builder
        .build_call(create_fn, &[final_buf2.into(), final_len.into()], "record")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap();
    let free_fn = runtime::free(context, module);
    builder.build_call(free_fn, &[final_buf2.into()], "free_buf").unwrap();
    builder.build_return(Some(&record)).unwrap();
    function
}

/// `__flint_i64_to_str`: renders a signed integer in base 10
/// (spec.md §4.5.6). Shares a fixed-width stack scratch buffer; every
/// numeric `i/u` width widens to i64/u64 before calling this.
pub fn int_to_str<'ctx>(context: &'ctx Context, module: &Module<'ctx>, signed: bool) -> FunctionValue<'ctx> {
    let name = if signed { "__flint_i64_to_str" } else { "__flint_u64_to_str" };
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let int_ty = context.i64_type();
    let fn_ty = ptr_ty.fn_type(&[int_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let value = function.get_nth_param(0).unwrap().into_int_value();
    let scratch = builder.build_array_alloca(context.i8_type(), context.i32_type().const_int(32, false), "scratch").unwrap();
    let fmt = if signed {
        builder.build_global_string_ptr("%lld", "i64_fmt").unwrap()
    } else {
        builder.build_global_string_ptr("%llu", "u64_fmt").unwrap()
    };
    // sprintf shares printf's calling convention; declared separately so the
    // vararg format string still resolves against libc's real symbol.
    let sprintf_fn = module.get_function("sprintf").unwrap_or_else(|| {
        let ty = context.i32_type().fn_type(&[ptr_ty.into(), ptr_ty.into()], true);
        module.add_function("sprintf", ty, None)
    });
    builder
        .build_call(sprintf_fn, &[scratch.into(), fmt.as_pointer_value().into(), value.into()], "format")
        .unwrap();
    let strlen_fn = module.get_function("strlen").unwrap_or_else(|| {
        let ty = context.i64_type().fn_type(&[ptr_ty.into()], false);
        module.add_function("strlen", ty, None)
    });
    let len = builder
        .build_call(strlen_fn, &[scratch.into()], "len")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value();
    let create_fn = str_create(context, module);
    let record = builder
        .build_call(create_fn, &[scratch.into(), len.into()], "record")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap();
    builder.build_return(Some(&record)).unwrap();
    function
}

/// `__flint_f64_to_str`: fixed-point below `1e15`, scientific notation at
/// or above it (spec.md §4.5.6's scientific-vs-fixed threshold).
pub fn float_to_str<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_f64_to_str";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = ptr_ty.fn_type(&[context.f64_type().into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let value = function.get_nth_param(0).unwrap().into_float_value();
    let scratch = builder.build_array_alloca(context.i8_type(), context.i32_type().const_int(64, false), "scratch").unwrap();

    let abs_value = builder.build_call(c_fabs(context, module), &[value.into()], "abs_value").unwrap().try_as_basic_value().left().unwrap().into_float_value();
    let threshold = context.f64_type().const_float(1.0e15);
    let use_scientific = builder.build_float_compare(inkwell::FloatPredicate::OGE, abs_value, threshold, "use_scientific").unwrap();

    let sprintf_fn = module.get_function("sprintf").unwrap_or_else(|| {
        let ty = context.i32_type().fn_type(&[ptr_ty.into(), ptr_ty.into()], true);
        module.add_function("sprintf", ty, None)
    });
    let fixed_fmt = builder.build_global_string_ptr("%f", "fixed_fmt").unwrap();
    let sci_fmt = builder.build_global_string_ptr("%e", "sci_fmt").unwrap();
    let chosen_fmt = builder
        .build_select(use_scientific, sci_fmt.as_pointer_value(), fixed_fmt.as_pointer_value(), "chosen_fmt")
        .unwrap();
    builder
        .build_call(sprintf_fn, &[scratch.into(), chosen_fmt.into(), value.into()], "format")
        .unwrap();

    let strlen_fn = module.get_function("strlen").unwrap_or_else(|| {
        let ty = context.i64_type().fn_type(&[ptr_ty.into()], false);
        module.add_function("strlen", ty, None)
    });
    let len = builder
        .build_call(strlen_fn, &[scratch.into()], "len")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value();
    let create_fn = str_create(context, module);
    let record = builder
        .build_call(create_fn, &[scratch.into(), len.into()], "record")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap();
    builder.build_return(Some(&record)).unwrap();
    function
}

fn c_fabs<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    module.get_function("fabs").unwrap_or_else(|| {
        let ty = context.f64_type().fn_type(&[context.f64_type().into()], false);
        module.add_function("fabs", ty, None)
    })
}

/// `__flint_file_read`/`_write`/`_append`/`_exists` (spec.md §4.5.7).
pub fn file_exists<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_file_exists";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = context.bool_type().fn_type(&[ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    let found_block = context.append_basic_block(function, "found");
    let missing_block = context.append_basic_block(function, "missing");
    builder.position_at_end(entry);

    let path_record = function.get_nth_param(0).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let path_data = builder.build_struct_gep(record_ty, path_record, 1, "path_data").unwrap();
    let mode = builder.build_global_string_ptr("r", "read_mode").unwrap();
    let fopen_fn = runtime::fopen(context, module);
    let handle = builder
        .build_call(fopen_fn, &[path_data.into(), mode.as_pointer_value().into()], "handle")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();
    let is_null = builder.build_is_null(handle, "is_null").unwrap();
    builder.build_conditional_branch(is_null, missing_block, found_block).unwrap();

    builder.position_at_end(found_block);
    builder.build_call(runtime::fclose(context, module), &[handle.into()], "close").unwrap();
    builder.build_return(Some(&context.bool_type().const_int(1, false))).unwrap();

    builder.position_at_end(missing_block);
    builder.build_return(Some(&context.bool_type().const_int(0, false))).unwrap();
    function
}

/// `__flint_file_read`: reads a whole file into a `str` record, returning
/// `err = ERR_IO` if the path cannot be opened (spec.md §4.5.7, §7 tier 3).
/// The caller propagates a nonzero `err` through the ordinary rethrow
/// protocol rather than this helper exiting the process itself.
pub fn file_read<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_file_read";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let ret_ty = fallible_struct_type(context, &[ptr_ty.into()]);
    let fn_ty = ret_ty.fn_type(&[ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    let opened_block = context.append_basic_block(function, "opened");
    let failed_block = context.append_basic_block(function, "failed_open");
    builder.position_at_end(entry);

    let path_record = function.get_nth_param(0).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let path_data = builder.build_struct_gep(record_ty, path_record, 1, "path_data").unwrap();
    let mode = builder.build_global_string_ptr("rb", "read_mode").unwrap();
    let handle = builder
        .build_call(runtime::fopen(context, module), &[path_data.into(), mode.as_pointer_value().into()], "handle")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();
    let is_null = builder.build_is_null(handle, "is_null").unwrap();
    builder.build_conditional_branch(is_null, failed_block, opened_block).unwrap();

    builder.position_at_end(failed_block);
    build_fallible_return(context, &builder, ret_ty, ERR_IO, Some(ptr_ty.const_null().as_basic_value_enum()));

    builder.position_at_end(opened_block);
    let seek_end = context.i32_type().const_int(2, false);
    builder
        .build_call(runtime::fseek(context, module), &[handle.into(), context.i64_type().const_zero().into(), seek_end.into()], "seek_end")
        .unwrap();
    let size = builder
        .build_call(runtime::ftell(context, module), &[handle.into()], "size")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value();
    builder.build_call(runtime::rewind_libc(context, module), &[handle.into()], "rewind").unwrap();

    let malloc_fn = runtime::malloc(context, module);
    let buf = builder
        .build_call(malloc_fn, &[size.into()], "buf")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();
    builder
        .build_call(
            runtime::fread(context, module),
            &[buf.into(), context.i64_type().const_int(1, false).into(), size.into(), handle.into()],
            "read_bytes",
        )
        .unwrap();
    builder.build_call(runtime::fclose(context, module), &[handle.into()], "close").unwrap();

    let create_fn = str_create(context, module);
    let record = builder
        .build_call(create_fn, &[buf.into(), size.into()], "record")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap();
    builder.build_call(runtime::free(context, module), &[buf.into()], "free_buf").unwrap();
    build_fallible_return(context, &builder, ret_ty, 0, Some(record));
    function
}

/// `__flint_file_write`/`__flint_file_append`: writes a `str` record's
/// bytes to `path`, truncating or appending per `mode` (spec.md §4.5.7).
pub fn file_write<'ctx>(context: &'ctx Context, module: &Module<'ctx>, append: bool) -> FunctionValue<'ctx> {
    let name = if append { "__flint_file_append" } else { "__flint_file_write" };
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = context.bool_type().fn_type(&[ptr_ty.into(), ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    let opened_block = context.append_basic_block(function, "opened");
    let failed_block = context.append_basic_block(function, "failed");
    builder.position_at_end(entry);

    let path_record = function.get_nth_param(0).unwrap().into_pointer_value();
    let data_record = function.get_nth_param(1).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let path_data = builder.build_struct_gep(record_ty, path_record, 1, "path_data").unwrap();
    let mode_str = if append { "ab" } else { "wb" };
    let mode = builder.build_global_string_ptr(mode_str, "write_mode").unwrap();
    let handle = builder
        .build_call(runtime::fopen(context, module), &[path_data.into(), mode.as_pointer_value().into()], "handle")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();
    let is_null = builder.build_is_null(handle, "is_null").unwrap();
    builder.build_conditional_branch(is_null, failed_block, opened_block).unwrap();

    builder.position_at_end(opened_block);
    let len_ptr = builder.build_struct_gep(record_ty, data_record, 0, "len_ptr").unwrap();
    let len = builder.build_load(context.i64_type(), len_ptr, "len").unwrap().into_int_value();
    let data_ptr = builder.build_struct_gep(record_ty, data_record, 1, "data_ptr").unwrap();
    builder
        .build_call(
            runtime::fwrite(context, module),
            &[data_ptr.into(), context.i64_type().const_int(1, false).into(), len.into(), handle.into()],
            "write_bytes",
        )
        .unwrap();
    builder.build_call(runtime::fclose(context, module), &[handle.into()], "close").unwrap();
    builder.build_return(Some(&context.bool_type().const_int(1, false))).unwrap();

    builder.position_at_end(failed_block);
    builder.build_return(Some(&context.bool_type().const_int(0, false))).unwrap();
    function
}

/// `__flint_env_get`: wraps `getenv`, returning a `str` record or a
/// null pointer when unset (spec.md §4.5.8; the Optional<str> discriminant
/// is built by the caller from the null check).
pub fn env_get<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_env_get";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = ptr_ty.fn_type(&[ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    let found_block = context.append_basic_block(function, "found");
    let missing_block = context.append_basic_block(function, "missing");
    builder.position_at_end(entry);

    let name_record = function.get_nth_param(0).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let name_data = builder.build_struct_gep(record_ty, name_record, 1, "name_data").unwrap();
    let raw = builder
        .build_call(runtime::getenv(context, module), &[name_data.into()], "raw")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_pointer_value();
    let is_null = builder.build_is_null(raw, "is_null").unwrap();
    builder.build_conditional_branch(is_null, missing_block, found_block).unwrap();

    builder.position_at_end(missing_block);
    builder.build_return(Some(&ptr_ty.const_null())).unwrap();

    builder.position_at_end(found_block);
    let strlen_fn = module.get_function("strlen").unwrap_or_else(|| {
        let ty = context.i64_type().fn_type(&[ptr_ty.into()], false);
        module.add_function("strlen", ty, None)
    });
    let len = builder
        .build_call(strlen_fn, &[raw.into()], "len")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value();
    let record = builder
        .build_call(str_create(context, module), &[raw.into(), len.into()], "record")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap();
    builder.build_return(Some(&record)).unwrap();
    function
}

/// `__flint_env_set`: wraps `setenv` with overwrite enabled (spec.md §4.5.8).
pub fn env_set<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_env_set";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let fn_ty = context.bool_type().fn_type(&[ptr_ty.into(), ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let name_record = function.get_nth_param(0).unwrap().into_pointer_value();
    let value_record = function.get_nth_param(1).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let name_data = builder.build_struct_gep(record_ty, name_record, 1, "name_data").unwrap();
    let value_data = builder.build_struct_gep(record_ty, value_record, 1, "value_data").unwrap();
    let overwrite = context.i32_type().const_int(1, false);
    let result = builder
        .build_call(runtime::setenv(context, module), &[name_data.into(), value_data.into(), overwrite.into()], "result")
        .unwrap()
        .try_as_basic_value()
        .left()
        .unwrap()
        .into_int_value();
    let ok = builder.build_int_compare(IntPredicate::EQ, result, context.i32_type().const_zero(), "ok").unwrap();
    builder.build_return(Some(&ok)).unwrap();
    function
}

#[derive(Debug, Clone, Copy)]
pub enum MathOp1 {
    Sin,
    Cos,
    Sqrt,
    Abs,
}

/// `__flint_f64_sin`/`_cos`/`_sqrt`/`_abs`: direct libm wrappers
/// (spec.md §4.5.9).
pub fn math_unary<'ctx>(context: &'ctx Context, module: &Module<'ctx>, op: MathOp1) -> FunctionValue<'ctx> {
    let (name, libm_fn) = match op {
        MathOp1::Sin => ("__flint_f64_sin", runtime::c_sin(context, module)),
        MathOp1::Cos => ("__flint_f64_cos", runtime::c_cos(context, module)),
        MathOp1::Sqrt => ("__flint_f64_sqrt", runtime::c_sqrt(context, module)),
        MathOp1::Abs => ("__flint_f64_abs", c_fabs(context, module)),
    };
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let fn_ty = context.f64_type().fn_type(&[context.f64_type().into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);
    let arg = function.get_nth_param(0).unwrap();
    let result = builder.build_call(libm_fn, &[arg.into()], "result").unwrap().try_as_basic_value().left().unwrap();
    builder.build_return(Some(&result)).unwrap();
    function
}

/// `__flint_f64_min`/`_max`: branchless select over an ordered comparison
/// (spec.md §4.5.9).
pub fn math_minmax<'ctx>(context: &'ctx Context, module: &Module<'ctx>, is_min: bool) -> FunctionValue<'ctx> {
    let name = if is_min { "__flint_f64_min" } else { "__flint_f64_max" };
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let f64_ty = context.f64_type();
    let fn_ty = f64_ty.fn_type(&[f64_ty.into(), f64_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);
    let a = function.get_nth_param(0).unwrap().into_float_value();
    let b = function.get_nth_param(1).unwrap().into_float_value();
    let predicate = if is_min { inkwell::FloatPredicate::OLT } else { inkwell::FloatPredicate::OGT };
    let a_wins = builder.build_float_compare(predicate, a, b, "a_wins").unwrap();
    let result = builder.build_select(a_wins, a, b, "result").unwrap();
    builder.build_return(Some(&result)).unwrap();
    function
}

/// `__flint_assert`: returns a `fallible_struct_type` with
/// `err = ERR_ASSERT_FAILED` (spec.md §4.5.10's fixed error id 10) when the
/// condition is false, `err = 0` otherwise. The caller propagates through
/// the ordinary rethrow protocol rather than this helper exiting the
/// process itself.
pub fn assert<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let name = "__flint_assert";
    if let Some(f) = module.get_function(name) {
        return f;
    }
    let bool_ty = context.bool_type();
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let ret_ty = fallible_struct_type(context, &[]);
    let fn_ty = ret_ty.fn_type(&[bool_ty.into(), ptr_ty.into()], false);
    let function = module.add_function(name, fn_ty, None);
    let builder = context.create_builder();
    let entry = context.append_basic_block(function, "entry");
    let fail_block = context.append_basic_block(function, "fail");
    let ok_block = context.append_basic_block(function, "ok");
    builder.position_at_end(entry);

    let condition = function.get_nth_param(0).unwrap().into_int_value();
    builder.build_conditional_branch(condition, ok_block, fail_block).unwrap();

    builder.position_at_end(fail_block);
    let message_record = function.get_nth_param(1).unwrap().into_pointer_value();
    let record_ty = str_record_type(context);
    let message_data = builder.build_struct_gep(record_ty, message_record, 1, "message_data").unwrap();
    let fmt = builder.build_global_string_ptr("flint: assertion failed: %s\n", "assert_fmt").unwrap();
    builder
        .build_call(runtime::printf(context, module), &[fmt.as_pointer_value().into(), message_data.into()], "print_assert")
        .unwrap();
    build_fallible_return(context, &builder, ret_ty, ERR_ASSERT_FAILED, None);

    builder.position_at_end(ok_block);
    build_fallible_return(context, &builder, ret_ty, 0, None);
    function
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_len_reuses_existing_declaration() {
        let context = Context::create();
        let module = context.create_module("test");
        let first = str_len(&context, &module);
        let second = str_len(&context, &module);
        assert_eq!(first, second);
    }

    #[test]
    fn safe_int_op_names_are_width_and_sign_specific() {
        let context = Context::create();
        let module = context.create_module("test");
        let signed_add = safe_int_op(&context, &module, context.i32_type(), ArithOp::Add, true);
        let unsigned_add = safe_int_op(&context, &module, context.i32_type(), ArithOp::Add, false);
        assert_eq!(signed_add.get_name().to_str().unwrap(), "__flint_i32_add");
        assert_eq!(unsigned_add.get_name().to_str().unwrap(), "__flint_u32_add");
        assert_ne!(signed_add, unsigned_add);
    }

    #[test]
    fn print_scalar_dedupes_by_suffix() {
        let context = Context::create();
        let module = context.create_module("test");
        let first = print_scalar(&context, &module, PrintableScalar::I64);
        let second = print_scalar(&context, &module, PrintableScalar::I64);
        assert_eq!(first, second);
    }
}
