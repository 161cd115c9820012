//! End-to-end pipeline tests: hand-build a small `SyntaxArena`/`FileNode`
//! program (there is no lexer/parser in this workspace -- see
//! `flintc-check::resolve`'s own test module for the same construction
//! style), compile it through `flintc_codegen::compiler`, and check the
//! resulting binary's behavior or the emitted IR text.

use std::process::Command;

use flintc_codegen::compiler::{compile, compile_to_ir, CompilationUnit};
use flintc_codegen::{CompileOptions, OptLevel};

use flintc_core::ast::{
    AssignTarget, BinaryOp, CallNode, DefData, ExprData, FileNode, FunctionDef, LiteralNode,
    LiteralValue, Param, StmtData, SyntaxArena,
};
use flintc_core::graph::DepGraph;
use flintc_core::id::FileId;
use flintc_core::types::PrimitiveType;
use flintc_core::type_id::TypeRegistry;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Compiles `unit`, runs the resulting binary, and returns
/// `(stdout, stderr, exit_code)`.
fn compile_and_run(unit: &CompilationUnit, opt_level: OptLevel) -> (String, String, i32) {
    let temp_dir = tempfile::tempdir().unwrap();
    let options = CompileOptions {
        output_dir: temp_dir.path().to_path_buf(),
        opt_level,
        ..CompileOptions::default()
    };
    let result = compile(unit, &options).expect("compilation should succeed");
    let output = Command::new(&result.binary_path).output().expect("binary should execute");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn int_literal(arena: &mut SyntaxArena, ty: flintc_core::type_id::TypeId, value: &str) -> flintc_core::id::ExprId {
    arena.alloc_expr(ExprData::Literal(LiteralNode {
        value: LiteralValue::Int(value.to_string()),
        ty,
    }))
}

fn print_call(arena: &mut SyntaxArena, scope: flintc_core::id::ScopeId, arg: flintc_core::id::ExprId) -> StmtData {
    StmtData::CallStatement(CallNode {
        callee: "print".to_string(),
        args: vec![arg],
        scope,
        call_id: arena.next_call_id(),
    })
}

fn single_function_unit(name: &str, arena: SyntaxArena, main: FunctionDef) -> CompilationUnit {
    let mut arena = arena;
    let registry = TypeRegistry::new();
    let def_id = arena.alloc_def(DefData::Function(main));
    let file = FileNode { id: FileId(0), path: format!("{name}.flint"), defs: vec![def_id] };
    let mut dep_graph = DepGraph::new();
    dep_graph.add_node(file.id);
    CompilationUnit {
        program_name: name.to_string(),
        registry,
        arena,
        files: vec![file],
        dep_graph,
        is_test: false,
    }
}

// ---------------------------------------------------------------------------
// Arithmetic and print
// ---------------------------------------------------------------------------

/// `main` prints `2 + 3` as an `i64` and returns. Expects stdout `"5\n"` and
/// exit code `0`.
#[test]
fn simple_addition_prints_five() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i64_id = registry.primitive_id(PrimitiveType::I64);

    let body = arena.alloc_scope(None);
    let two = int_literal(&mut arena, i64_id, "2");
    let three = int_literal(&mut arena, i64_id, "3");
    let sum = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Add, lhs: two, rhs: three });
    let call = arena.alloc_stmt(print_call(&mut arena, body, sum));
    arena.push_stmt(body, call);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(body, ret);

    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body, is_aligned: false, is_const: false };
    let unit = single_function_unit("simple_add", arena, main);

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(stdout, "5\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

/// A local `i32` declaration initialized from a binary op, then printed as
/// `i64` via an explicit cast, exercises `Declaration` + `TypeCast` lowering.
#[test]
fn declared_variable_survives_a_widening_cast() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i32_id = registry.primitive_id(PrimitiveType::I32);
    let i64_id = registry.primitive_id(PrimitiveType::I64);

    let body = arena.alloc_scope(None);
    let ten = int_literal(&mut arena, i32_id, "10");
    let seven = int_literal(&mut arena, i32_id, "7");
    let diff = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Sub, lhs: ten, rhs: seven });
    let decl = arena.alloc_stmt(StmtData::Declaration { name: "x".to_string(), ty: i32_id, init: Some(diff) });
    arena.push_stmt(body, decl);

    let x_ref = arena.alloc_expr(ExprData::Variable { name: "x".to_string(), is_reference: false });
    let widened = arena.alloc_expr(ExprData::TypeCast { target: i64_id, operand: x_ref });
    let call = arena.alloc_stmt(print_call(&mut arena, body, widened));
    arena.push_stmt(body, call);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(body, ret);

    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body, is_aligned: false, is_const: false };
    let unit = single_function_unit("widening_cast", arena, main);

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(stdout, "3\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

/// A `while` loop counts from 0 to 3, printing each value, then returns.
#[test]
fn while_loop_prints_each_iteration() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i64_id = registry.primitive_id(PrimitiveType::I64);

    let outer = arena.alloc_scope(None);
    let zero = int_literal(&mut arena, i64_id, "0");
    let decl = arena.alloc_stmt(StmtData::Declaration { name: "i".to_string(), ty: i64_id, init: Some(zero) });
    arena.push_stmt(outer, decl);

    let loop_body = arena.alloc_scope(Some(outer));
    let i_ref_cond = arena.alloc_expr(ExprData::Variable { name: "i".to_string(), is_reference: false });
    let three = int_literal(&mut arena, i64_id, "3");
    let condition = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Lt, lhs: i_ref_cond, rhs: three });

    let i_ref_print = arena.alloc_expr(ExprData::Variable { name: "i".to_string(), is_reference: false });
    let call = arena.alloc_stmt(print_call(&mut arena, loop_body, i_ref_print));
    arena.push_stmt(loop_body, call);

    let i_ref_inc = arena.alloc_expr(ExprData::Variable { name: "i".to_string(), is_reference: false });
    let one = int_literal(&mut arena, i64_id, "1");
    let incremented = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Add, lhs: i_ref_inc, rhs: one });
    let assign = arena.alloc_stmt(StmtData::Assignment {
        target: AssignTarget { name: "i".to_string(), field_path: vec![] },
        value: incremented,
    });
    arena.push_stmt(loop_body, assign);

    let while_stmt = arena.alloc_stmt(StmtData::While { condition, body: loop_body });
    arena.push_stmt(outer, while_stmt);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(outer, ret);

    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body: outer, is_aligned: false, is_const: false };
    let unit = single_function_unit("while_loop", arena, main);

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(stdout, "0\n1\n2\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

/// An `if`/`else` prints one branch or the other depending on a boolean
/// literal condition.
#[test]
fn if_else_takes_the_false_branch() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i64_id = registry.primitive_id(PrimitiveType::I64);
    let bool_id = registry.primitive_id(PrimitiveType::Bool);

    let outer = arena.alloc_scope(None);
    let cond = arena.alloc_expr(ExprData::Literal(LiteralNode { value: LiteralValue::Bool(false), ty: bool_id }));

    let then_scope = arena.alloc_scope(Some(outer));
    let one = int_literal(&mut arena, i64_id, "1");
    let then_call = arena.alloc_stmt(print_call(&mut arena, then_scope, one));
    arena.push_stmt(then_scope, then_call);

    let else_scope = arena.alloc_scope(Some(outer));
    let two = int_literal(&mut arena, i64_id, "2");
    let else_call = arena.alloc_stmt(print_call(&mut arena, else_scope, two));
    arena.push_stmt(else_scope, else_call);

    let if_stmt = arena.alloc_stmt(StmtData::If { arms: vec![(Some(cond), then_scope), (None, else_scope)] });
    arena.push_stmt(outer, if_stmt);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(outer, ret);

    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body: outer, is_aligned: false, is_const: false };
    let unit = single_function_unit("if_else", arena, main);

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(stdout, "2\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

// ---------------------------------------------------------------------------
// Runtime traps (spec.md §7 tier 3 / §4.5.2)
// ---------------------------------------------------------------------------

/// Signed integer division by a runtime zero traps with the fixed
/// `ERR_DIV_BY_ZERO` exit code rather than producing undefined behavior.
#[test]
fn division_by_runtime_zero_traps() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i32_id = registry.primitive_id(PrimitiveType::I32);

    let body = arena.alloc_scope(None);
    let zero = int_literal(&mut arena, i32_id, "0");
    let decl = arena.alloc_stmt(StmtData::Declaration { name: "divisor".to_string(), ty: i32_id, init: Some(zero) });
    arena.push_stmt(body, decl);

    let ten = int_literal(&mut arena, i32_id, "10");
    let divisor_ref = arena.alloc_expr(ExprData::Variable { name: "divisor".to_string(), is_reference: false });
    let quotient = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Div, lhs: ten, rhs: divisor_ref });
    let call = arena.alloc_stmt(print_call(&mut arena, body, quotient));
    arena.push_stmt(body, call);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(body, ret);

    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body, is_aligned: false, is_const: false };
    let unit = single_function_unit("div_by_zero", arena, main);

    let (_stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(code, 2, "stderr was: {stderr}");
}

/// Signed `i8` addition that overflows its range traps with the fixed
/// `ERR_OVERFLOW` exit code instead of wrapping.
#[test]
fn signed_overflow_traps() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i8_id = registry.primitive_id(PrimitiveType::I8);

    let body = arena.alloc_scope(None);
    let max = int_literal(&mut arena, i8_id, "127");
    let one = int_literal(&mut arena, i8_id, "1");
    let sum = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Add, lhs: max, rhs: one });
    let decl = arena.alloc_stmt(StmtData::Declaration { name: "overflowed".to_string(), ty: i8_id, init: Some(sum) });
    arena.push_stmt(body, decl);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(body, ret);

    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body, is_aligned: false, is_const: false };
    let unit = single_function_unit("overflow", arena, main);

    let (_stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(code, 1, "stderr was: {stderr}");
}

// ---------------------------------------------------------------------------
// Error sets / catch
// ---------------------------------------------------------------------------

/// A helper function throws its declared error; the caller guards the call
/// with `catch`, binds the error code, and prints it instead of letting the
/// error auto-propagate (spec.md §4.3.5, §7 tier 3).
#[test]
fn caught_error_does_not_propagate() {
    let mut arena = SyntaxArena::new();
    let mut registry = TypeRegistry::new();
    let i64_id = registry.primitive_id(PrimitiveType::I64);
    let err_ty = registry.intern(flintc_core::Type::ErrorSet {
        name: "IoError".to_string(),
        parent: None,
        values: vec!["NotFound".to_string()],
        id: 1,
    });

    let helper_body = arena.alloc_scope(None);
    let throw = arena.alloc_stmt(StmtData::Throw { error: err_ty, member: "NotFound".to_string() });
    arena.push_stmt(helper_body, throw);
    let helper = FunctionDef {
        name: "maybe_fail".to_string(),
        params: vec![],
        return_types: vec![i64_id],
        body: helper_body,
        is_aligned: false,
        is_const: false,
    };
    let helper_id = arena.alloc_def(DefData::Function(helper));

    let main_body = arena.alloc_scope(None);
    let call = CallNode { callee: "maybe_fail".to_string(), args: vec![], scope: main_body, call_id: arena.next_call_id() };
    let call_stmt = arena.alloc_stmt(StmtData::CallStatement(call));

    let catch_body = arena.alloc_scope(Some(main_body));
    let err_ref = arena.alloc_expr(ExprData::Variable { name: "e".to_string(), is_reference: false });
    let err_print = arena.alloc_stmt(print_call(&mut arena, catch_body, err_ref));
    arena.push_stmt(catch_body, err_print);

    let catch_stmt = arena.alloc_stmt(StmtData::Catch { guarded: call_stmt, error_binding: Some("e".to_string()), body: catch_body });
    arena.push_stmt(main_body, catch_stmt);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(main_body, ret);

    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body: main_body, is_aligned: false, is_const: false };
    let main_id = arena.alloc_def(DefData::Function(main));

    let file = FileNode { id: FileId(0), path: "catch.flint".to_string(), defs: vec![helper_id, main_id] };
    let mut dep_graph = DepGraph::new();
    dep_graph.add_node(file.id);
    let unit = CompilationUnit {
        program_name: "catch_demo".to_string(),
        registry,
        arena,
        files: vec![file],
        dep_graph,
        is_test: false,
    };

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(code, 0, "caught error must not propagate to the process exit code, stderr was: {stderr}");
    assert!(!stdout.is_empty(), "the error code should still have been printed");
}

// ---------------------------------------------------------------------------
// Multi-file programs (spec.md §3.4, §4.3.1 dependency graph)
// ---------------------------------------------------------------------------

/// `main` in file 0 calls `double`, declared in file 1; the dependency
/// graph records file 0 depending on file 1, and `double`'s result is
/// printed. Exercises cross-file call resolution (spec.md §4.3.2 step 6).
#[test]
fn cross_file_call_resolves_through_dependency_graph() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i64_id = registry.primitive_id(PrimitiveType::I64);

    // File 1: `double(n) -> n + n`
    let double_body = arena.alloc_scope(None);
    let n_ref_a = arena.alloc_expr(ExprData::Variable { name: "n".to_string(), is_reference: false });
    let n_ref_b = arena.alloc_expr(ExprData::Variable { name: "n".to_string(), is_reference: false });
    let doubled = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Add, lhs: n_ref_a, rhs: n_ref_b });
    let double_ret = arena.alloc_stmt(StmtData::Return { values: vec![doubled] });
    arena.push_stmt(double_body, double_ret);
    let double_fn = FunctionDef {
        name: "double".to_string(),
        params: vec![Param { name: "n".to_string(), ty: i64_id }],
        return_types: vec![i64_id],
        body: double_body,
        is_aligned: false,
        is_const: false,
    };
    let double_id = arena.alloc_def(DefData::Function(double_fn));
    let file1 = FileNode { id: FileId(1), path: "helper.flint".to_string(), defs: vec![double_id] };

    // File 0: `main` calls `double(21)`, prints the result.
    let main_body = arena.alloc_scope(None);
    let arg = int_literal(&mut arena, i64_id, "21");
    let call = CallNode { callee: "double".to_string(), args: vec![arg], scope: main_body, call_id: arena.next_call_id() };
    let call_expr = arena.alloc_expr(ExprData::Call(call));
    let call_stmt = print_call(&mut arena, main_body, call_expr);
    let call_stmt_id = arena.alloc_stmt(call_stmt);
    arena.push_stmt(main_body, call_stmt_id);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(main_body, ret);
    let main_fn = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body: main_body, is_aligned: false, is_const: false };
    let main_id = arena.alloc_def(DefData::Function(main_fn));
    let file0 = FileNode { id: FileId(0), path: "main.flint".to_string(), defs: vec![main_id] };

    let mut dep_graph = DepGraph::new();
    let node0 = dep_graph.add_node(file0.id);
    let node1 = dep_graph.add_node(file1.id);
    dep_graph.add_dependency(node0, node1);

    let unit = CompilationUnit {
        program_name: "cross_file".to_string(),
        registry,
        arena,
        files: vec![file0, file1],
        dep_graph,
        is_test: false,
    };

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert_eq!(stdout, "42\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

// ---------------------------------------------------------------------------
// CompileOptions / CompileResult / compile_to_ir
// ---------------------------------------------------------------------------

fn empty_main_unit(name: &str) -> CompilationUnit {
    let mut arena = SyntaxArena::new();
    let body = arena.alloc_scope(None);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(body, ret);
    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body, is_aligned: false, is_const: false };
    single_function_unit(name, arena, main)
}

#[test]
fn compile_result_reports_existing_binary_and_triple() {
    let unit = empty_main_unit("noop");
    let temp_dir = tempfile::tempdir().unwrap();
    let options = CompileOptions { output_dir: temp_dir.path().to_path_buf(), ..CompileOptions::default() };
    let result = compile(&unit, &options).unwrap();
    assert!(result.binary_path.exists());
    assert!(result.binary_size > 0);
    assert!(!result.target_triple.is_empty());
    assert!(result.ir_path.is_none());
}

#[test]
fn emit_ir_option_writes_a_ll_file_next_to_the_binary() {
    let unit = empty_main_unit("noop_ir");
    let temp_dir = tempfile::tempdir().unwrap();
    let options = CompileOptions { output_dir: temp_dir.path().to_path_buf(), emit_ir: true, ..CompileOptions::default() };
    let result = compile(&unit, &options).unwrap();
    let ir_path = result.ir_path.expect("emit_ir requested an IR file");
    let ir_text = std::fs::read_to_string(ir_path).unwrap();
    assert!(ir_text.contains("define"));
    assert!(ir_text.contains("__flint_process_main"));
}

#[test]
fn optimized_build_still_prints_the_same_output() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();
    let i64_id = registry.primitive_id(PrimitiveType::I64);
    let body = arena.alloc_scope(None);
    let a = int_literal(&mut arena, i64_id, "6");
    let b = int_literal(&mut arena, i64_id, "7");
    let product = arena.alloc_expr(ExprData::BinaryOp { op: BinaryOp::Mul, lhs: a, rhs: b });
    let call = arena.alloc_stmt(print_call(&mut arena, body, product));
    arena.push_stmt(body, call);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(body, ret);
    let main = FunctionDef { name: "main".to_string(), params: vec![], return_types: vec![], body, is_aligned: false, is_const: false };
    let unit = single_function_unit("opt_mul", arena, main);

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O2);
    assert_eq!(stdout, "42\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

/// `compile_to_ir` skips object emission and linking entirely, returning
/// the annotated textual LLIR (spec.md §6.1 `--emit-ir`).
#[test]
fn compile_to_ir_returns_textual_llir_without_linking() {
    let unit = empty_main_unit("ir_only");
    let ir = compile_to_ir(&unit).expect("IR generation should succeed");
    assert!(ir.contains("define"));
    assert!(ir.contains("__flint_user_main"));
}

// ---------------------------------------------------------------------------
// Test-mode runner (spec.md §4.3.8)
// ---------------------------------------------------------------------------

/// A passing test and a `should_fail` test that does throw both report
/// `[PASS]`; the runner's overall exit code is 0 when nothing unexpectedly
/// failed.
#[test]
fn test_runner_reports_pass_for_ok_and_expected_failures() {
    let mut arena = SyntaxArena::new();
    let mut registry = TypeRegistry::new();
    let err_ty = registry.intern(flintc_core::Type::ErrorSet {
        name: "TestError".to_string(),
        parent: None,
        values: vec!["Boom".to_string()],
        id: 2,
    });

    let ok_body = arena.alloc_scope(None);
    let ok_ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(ok_body, ok_ret);
    let ok_test = arena.alloc_def(DefData::Test(flintc_core::ast::TestDef { name: "adds_up".to_string(), body: ok_body, should_fail: false }));

    let failing_body = arena.alloc_scope(None);
    let throw = arena.alloc_stmt(StmtData::Throw { error: err_ty, member: "Boom".to_string() });
    arena.push_stmt(failing_body, throw);
    let failing_test = arena.alloc_def(DefData::Test(flintc_core::ast::TestDef { name: "expected_to_blow_up".to_string(), body: failing_body, should_fail: true }));

    let file = FileNode { id: FileId(0), path: "tests.flint".to_string(), defs: vec![ok_test, failing_test] };
    let mut dep_graph = DepGraph::new();
    dep_graph.add_node(file.id);
    let unit = CompilationUnit {
        program_name: "test_suite".to_string(),
        registry,
        arena,
        files: vec![file],
        dep_graph,
        is_test: true,
    };

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert!(stdout.contains("[PASS] adds_up"), "stdout was: {stdout}, stderr: {stderr}");
    assert!(stdout.contains("[PASS] expected_to_blow_up"), "stdout was: {stdout}, stderr: {stderr}");
    assert_eq!(code, 0);
}

/// A test annotated `should_fail` that does NOT throw is itself a failure,
/// and the runner's overall exit code is nonzero.
#[test]
fn test_runner_fails_an_unexpectedly_passing_should_fail_test() {
    let mut arena = SyntaxArena::new();
    let registry = TypeRegistry::new();

    let body = arena.alloc_scope(None);
    let ret = arena.alloc_stmt(StmtData::Return { values: vec![] });
    arena.push_stmt(body, ret);
    let test_def = arena.alloc_def(DefData::Test(flintc_core::ast::TestDef { name: "never_fails".to_string(), body, should_fail: true }));

    let file = FileNode { id: FileId(0), path: "tests.flint".to_string(), defs: vec![test_def] };
    let mut dep_graph = DepGraph::new();
    dep_graph.add_node(file.id);
    let unit = CompilationUnit {
        program_name: "test_suite_unmet".to_string(),
        registry,
        arena,
        files: vec![file],
        dep_graph,
        is_test: true,
    };

    let (stdout, stderr, code) = compile_and_run(&unit, OptLevel::O0);
    assert!(stdout.contains("[FAIL] never_fails"), "stdout was: {stdout}, stderr: {stderr}");
    assert_ne!(code, 0);
}
