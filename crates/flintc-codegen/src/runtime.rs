//! Extern C runtime declarations shared by the compiler-emitted library
//! (spec.md §4.5): libc functions the generated helpers wrap. Each is
//! declared at most once per module via `Module::get_function` as the
//! dedupe check -- LLVM's own symbol table doubles as the "per-subsystem
//! cache" spec.md calls for.

use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::FunctionValue;
use inkwell::AddressSpace;

macro_rules! extern_fn {
    ($name:ident, $sym:literal, |$context:ident, $module:ident| $build:expr) => {
        pub fn $name<'ctx>($context: &'ctx Context, $module: &Module<'ctx>) -> FunctionValue<'ctx> {
            if let Some(f) = $module.get_function($sym) {
                return f;
            }
            $build
        }
    };
}

extern_fn!(printf, "printf", |context, module| {
    let ty = context.i32_type().fn_type(&[context.ptr_type(AddressSpace::default()).into()], true);
    module.add_function("printf", ty, None)
});

extern_fn!(exit, "exit", |context, module| {
    let ty = context.void_type().fn_type(&[context.i32_type().into()], false);
    module.add_function("exit", ty, None)
});

extern_fn!(malloc, "malloc", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = ptr.fn_type(&[context.i64_type().into()], false);
    module.add_function("malloc", ty, None)
});

extern_fn!(realloc, "realloc", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = ptr.fn_type(&[ptr.into(), context.i64_type().into()], false);
    module.add_function("realloc", ty, None)
});

extern_fn!(free, "free", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.void_type().fn_type(&[ptr.into()], false);
    module.add_function("free", ty, None)
});

extern_fn!(memcpy, "memcpy", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = ptr.fn_type(&[ptr.into(), ptr.into(), context.i64_type().into()], false);
    module.add_function("memcpy", ty, None)
});

extern_fn!(strcmp, "strcmp", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.i32_type().fn_type(&[ptr.into(), ptr.into()], false);
    module.add_function("strcmp", ty, None)
});

extern_fn!(getline_libc, "getline", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.i64_type().fn_type(&[ptr.into(), ptr.into(), ptr.into()], false);
    module.add_function("getline", ty, None)
});

extern_fn!(fopen, "fopen", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = ptr.fn_type(&[ptr.into(), ptr.into()], false);
    module.add_function("fopen", ty, None)
});

extern_fn!(fclose, "fclose", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.i32_type().fn_type(&[ptr.into()], false);
    module.add_function("fclose", ty, None)
});

extern_fn!(fread, "fread", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context
        .i64_type()
        .fn_type(&[ptr.into(), context.i64_type().into(), context.i64_type().into(), ptr.into()], false);
    module.add_function("fread", ty, None)
});

extern_fn!(fwrite, "fwrite", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context
        .i64_type()
        .fn_type(&[ptr.into(), context.i64_type().into(), context.i64_type().into(), ptr.into()], false);
    module.add_function("fwrite", ty, None)
});

extern_fn!(fseek, "fseek", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.i32_type().fn_type(&[ptr.into(), context.i64_type().into(), context.i32_type().into()], false);
    module.add_function("fseek", ty, None)
});

extern_fn!(ftell, "ftell", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.i64_type().fn_type(&[ptr.into()], false);
    module.add_function("ftell", ty, None)
});

extern_fn!(rewind_libc, "rewind", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.void_type().fn_type(&[ptr.into()], false);
    module.add_function("rewind", ty, None)
});

extern_fn!(getenv, "getenv", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = ptr.fn_type(&[ptr.into()], false);
    module.add_function("getenv", ty, None)
});

extern_fn!(setenv, "setenv", |context, module| {
    let ptr = context.ptr_type(AddressSpace::default());
    let ty = context.i32_type().fn_type(&[ptr.into(), ptr.into(), context.i32_type().into()], false);
    module.add_function("setenv", ty, None)
});

extern_fn!(c_sin, "sin", |context, module| {
    let ty = context.f64_type().fn_type(&[context.f64_type().into()], false);
    module.add_function("sin", ty, None)
});

extern_fn!(c_cos, "cos", |context, module| {
    let ty = context.f64_type().fn_type(&[context.f64_type().into()], false);
    module.add_function("cos", ty, None)
});

extern_fn!(c_sqrt, "sqrt", |context, module| {
    let ty = context.f64_type().fn_type(&[context.f64_type().into()], false);
    module.add_function("sqrt", ty, None)
});

/// Declares every runtime extern used anywhere in the program up front. The
/// individual helper emitters also declare on demand, but pre-declaring
/// keeps `compiler.rs`'s step ordering obvious (spec.md §4.3.2 step 2).
pub fn declare_runtime_functions<'ctx>(context: &'ctx Context, module: &Module<'ctx>) {
    printf(context, module);
    exit(context, module);
    malloc(context, module);
    realloc(context, module);
    free(context, module);
    memcpy(context, module);
    strcmp(context, module);
}
