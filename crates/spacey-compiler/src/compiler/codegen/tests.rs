//! Tests for the bytecode compiler.

use crate::compiler::bytecode::{
    CALL_FLAG_EVALCALL, CALL_FLAG_TAILCALL, DECLVAR_FLAG_FUNC_DECL, DECLVAR_FLAG_UNDEF_VALUE,
    ExtraOp, Instruction, OpCode, PROPDESC_FLAG_CONFIGURABLE, RETURN_FLAG_FAST,
    RETURN_FLAG_HAVE_RETVAL, TRYCATCH_FLAG_CATCH_BINDING, TRYCATCH_FLAG_HAVE_CATCH,
    TRYCATCH_FLAG_HAVE_FINALLY,
};
use crate::compiler::template::{Constant, FunctionTemplate};
use crate::compiler::{CompileOptions, DEFAULT_RECURSION_LIMIT, compile};
use crate::error::Error;

fn compile_with(src: &str, options: &CompileOptions) -> Result<FunctionTemplate, Error> {
    compile(src, options)
}

fn compile_ok(src: &str) -> FunctionTemplate {
    compile_with(src, &CompileOptions::default()).expect("Compilation should succeed")
}

fn compile_err(src: &str) -> Error {
    match compile_with(src, &CompileOptions::default()) {
        Ok(template) => panic!("Compilation should fail:\n{}", template.disassemble()),
        Err(err) => err,
    }
}

fn assert_syntax_error(src: &str, message: &str) {
    let err = compile_err(src);
    assert!(err.is_syntax_error(), "expected SyntaxError for {:?}, got {}", src, err);
    assert_eq!(err.message(), message, "source: {:?}", src);
}

fn ops(template: &FunctionTemplate) -> Vec<OpCode> {
    template.code.iter().map(|ins| ins.op()).collect()
}

fn has_op(template: &FunctionTemplate, op: OpCode) -> bool {
    template.code.iter().any(|ins| ins.op() == op)
}

fn has_extra(template: &FunctionTemplate, op: ExtraOp) -> bool {
    template.code.iter().any(|ins| ins.extra_op() == Some(op))
}

fn find_op(template: &FunctionTemplate, op: OpCode) -> Vec<Instruction> {
    template.code.iter().copied().filter(|ins| ins.op() == op).collect()
}

fn inner(template: &FunctionTemplate, i: usize) -> &FunctionTemplate {
    &template.funcs[i]
}

// ============================================================================
// Program Shape
// ============================================================================

#[test]
fn test_compile_empty_program() {
    let t = compile_ok("");
    assert_eq!(t.name.as_deref(), Some("global"));
    assert!(!t.is_function);
    assert_eq!(t.code.len(), 2);
    assert_eq!(t.code[0].extra_op(), Some(ExtraOp::LdUndef));
    assert_eq!(t.code[1].op(), OpCode::Return);
    assert_eq!(t.code[1].a(), RETURN_FLAG_FAST | RETURN_FLAG_HAVE_RETVAL);
    assert_eq!(t.nregs, 1);
}

#[test]
fn test_statement_value_goes_to_result_register() {
    let t = compile_ok("'hello';");
    let ldconst = find_op(&t, OpCode::LdConst);
    assert_eq!(ldconst.len(), 1);
    assert_eq!(ldconst[0].a(), 0);
    assert!(matches!(&t.consts[0], Constant::String(s) if s == "hello"));
}

#[test]
fn test_function_body_returns_undefined() {
    let t = compile_ok("function f() {}");
    let f = inner(&t, 0);
    assert!(f.is_function);
    assert_eq!(f.name.as_deref(), Some("f"));
    let last = *f.code.last().expect("function has code");
    assert_eq!(last.op(), OpCode::Return);
    assert_eq!(last.a(), RETURN_FLAG_FAST);
}

#[test]
fn test_pc2line_covers_code() {
    let t = compile_ok("var a = 1;\nvar b = 2;\n\na + b;\n");
    assert_eq!(t.pc2line.len(), t.code.len());
    assert!(t.pc2line.contains(&4));
}

#[test]
fn test_compile_is_deterministic() {
    let src = "var o = { a: 1, get b() { return 2; } };\n\
               function f(x) { for (var k in o) { if (k == x) return k; } }\n\
               switch (f('a')) { case 'a': o.a++; break; default: o = null; }";
    let a = compile_ok(src);
    let b = compile_ok(src);
    assert_eq!(a.code, b.code);
    assert_eq!(a.disassemble(), b.disassemble());
}

// ============================================================================
// Bindings
// ============================================================================

#[test]
fn test_function_locals_bind_to_registers() {
    let t = compile_ok("function f(a) { var x = 1; x = x + a; return x; }");
    let f = inner(&t, 0);
    assert_eq!(f.nargs, 1);
    assert_eq!(f.formals, vec!["a".to_string()]);
    assert!(!has_op(f, OpCode::GetVar));
    assert!(!has_op(f, OpCode::PutVar));
    // nothing looks names up, so no varmap is needed
    assert_eq!(f.varmap, None);
}

#[test]
fn test_bound_left_operand_copied_only_when_right_side_emits_code() {
    let t = compile_ok("function f(a) { return a + 1; }");
    let add = find_op(inner(&t, 0), OpCode::Add);
    assert_eq!(add[0].b(), 0);
    assert!(!has_op(inner(&t, 0), OpCode::LdReg));

    let t = compile_ok("function f(a) { return a + (a = 5); }");
    let f = inner(&t, 0);
    // the copy of `a` runs before the assignment
    assert_eq!(f.code[0].op(), OpCode::LdReg);
    assert_eq!(f.code[0].bc(), 0);
    let add = find_op(f, OpCode::Add);
    assert_eq!(add[0].b(), f.code[0].a());
    assert_eq!(f.pc2line.len(), f.code.len());
}

#[test]
fn test_var_used_before_declaration_is_register_bound() {
    let t = compile_ok("function f() { x = 1; var x; return x; }");
    let f = inner(&t, 0);
    assert!(!has_op(f, OpCode::PutVar));
    assert!(!has_op(f, OpCode::GetVar));
}

#[test]
fn test_free_identifier_keeps_varmap() {
    let t = compile_ok("function f(a) { var b = a; return c; }");
    let f = inner(&t, 0);
    assert!(has_op(f, OpCode::GetVar));
    let varmap = f.varmap.as_ref().expect("slow access keeps the varmap");
    assert_eq!(varmap.get("a"), Some(&0));
    assert!(varmap.contains_key("b"));
}

#[test]
fn test_global_declarations_use_declvar() {
    let t = compile_ok("var x = 1; function g() {}");
    let declvars = find_op(&t, OpCode::DeclVar);
    assert_eq!(declvars.len(), 2);
    // function declarations come first
    assert!(declvars[0].a() & DECLVAR_FLAG_FUNC_DECL != 0);
    assert!(declvars[1].a() & DECLVAR_FLAG_UNDEF_VALUE != 0);
    assert!(declvars.iter().all(|d| d.a() & PROPDESC_FLAG_CONFIGURABLE == 0));
    assert!(has_op(&t, OpCode::Closure));
    assert!(has_op(&t, OpCode::PutVar));
}

#[test]
fn test_eval_bindings_are_configurable() {
    let options = CompileOptions::default().with_eval(true);
    let t = compile_with("var x;", &options).expect("Compilation should succeed");
    assert_eq!(t.name.as_deref(), Some("eval"));
    let declvar = find_op(&t, OpCode::DeclVar);
    assert_eq!(declvar.len(), 1);
    assert!(declvar[0].a() & PROPDESC_FLAG_CONFIGURABLE != 0);
    assert!(!t.newenv);

    let strict = compile_with("var x;", &options.with_strict(true)).expect("Compilation should succeed");
    assert!(strict.newenv);
}

#[test]
fn test_function_declaration_shadows_argument_register() {
    let t = compile_ok("function f(a) { function a() {} return a; }");
    let f = inner(&t, 0);
    let closure = find_op(f, OpCode::Closure);
    assert_eq!(closure.len(), 1);
    assert_eq!(closure[0].a(), 0);
}

#[test]
fn test_duplicate_args_last_one_wins() {
    let t = compile_ok("function f(a, a) { return a; }");
    let f = inner(&t, 0);
    assert_eq!(f.nargs, 2);
    let ret = find_op(f, OpCode::Return);
    assert_eq!(ret[0].b(), 1);
}

#[test]
fn test_catch_binding_hides_register() {
    let t = compile_ok("function f(e) { try { g(); } catch (e) { e; } return e; }");
    let f = inner(&t, 0);
    // the catch body reads `e` by name, the final return reads the register
    assert!(has_op(f, OpCode::GetVar));
    let ret = find_op(f, OpCode::Return);
    assert_eq!(ret[0].b(), 0);
}

#[test]
fn test_with_forces_slow_lookup() {
    let t = compile_ok("function f(o, x) { with (o) { x; } return x; }");
    let f = inner(&t, 0);
    assert_eq!(find_op(f, OpCode::GetVar).len(), 1);
}

// ============================================================================
// Template Flags
// ============================================================================

#[test]
fn test_arguments_object_creation() {
    let t = compile_ok("function f() { return arguments; }");
    assert!(inner(&t, 0).createargs);

    let t = compile_ok("function f(arguments) { return arguments; }");
    assert!(!inner(&t, 0).createargs);

    let t = compile_ok("function f() { return 1; }");
    assert!(!inner(&t, 0).createargs);
}

#[test]
fn test_direct_eval_flags() {
    let t = compile_ok("function f(s) { return eval(s); }");
    let f = inner(&t, 0);
    assert!(f.createargs);
    assert!(f.varmap.is_some());
    let calls = find_op(f, OpCode::Call);
    assert!(calls[0].a() & CALL_FLAG_EVALCALL != 0);
}

#[test]
fn test_name_binding() {
    let t = compile_ok("(function named() {}); (function () {}); function decl() {}");
    assert!(inner(&t, 0).namebinding);
    assert!(!inner(&t, 1).namebinding);
    assert!(!inner(&t, 2).namebinding);
    assert!(inner(&t, 2).newenv);
}

#[test]
fn test_accessors_have_no_name_binding() {
    let t = compile_ok("({ get x() { return 1; }, set x(v) {} });");
    assert_eq!(t.funcs.len(), 2);
    assert!(t.funcs.iter().all(|f| !f.namebinding));
    assert!(has_op(&t, OpCode::InitGet));
    assert!(has_op(&t, OpCode::InitSet));
}

#[test]
fn test_filename_reaches_inner_templates() {
    let options = CompileOptions::default().with_filename("lib.js");
    let t = compile_with("function f() { return function () {}; }", &options)
        .expect("Compilation should succeed");
    assert_eq!(t.filename.as_deref(), Some("lib.js"));
    assert_eq!(inner(&t, 0).filename.as_deref(), Some("lib.js"));
    assert_eq!(inner(inner(&t, 0), 0).filename.as_deref(), Some("lib.js"));
}

#[test]
fn test_function_expression_mode() {
    let options = CompileOptions::default().with_function_expression(true);
    let t = compile_with("function add(a, b) { return a + b; }", &options)
        .expect("Compilation should succeed");
    assert!(t.is_function);
    assert_eq!(t.name.as_deref(), Some("add"));
    assert_eq!(t.nargs, 2);
    assert!(has_op(&t, OpCode::Add));
}

// ============================================================================
// Strictness
// ============================================================================

#[test]
fn test_use_strict_directive() {
    let t = compile_ok("'use strict'; var x;");
    assert!(t.strict);

    let t = compile_ok("function f() { 'use strict'; } function g() {}");
    assert!(!t.strict);
    assert!(inner(&t, 0).strict);
    assert!(!inner(&t, 1).strict);
}

#[test]
fn test_strictness_is_inherited() {
    let t = compile_ok("'use strict'; function f() { return function () {}; }");
    assert!(inner(&t, 0).strict);
    assert!(inner(inner(&t, 0), 0).strict);
}

#[test]
fn test_directive_must_be_escape_free_and_first() {
    assert!(!compile_ok("'use\\x20strict'; var x;").strict);
    assert!(!compile_ok("var y; 'use strict';").strict);
    assert!(compile_ok("'foo'; 'use strict';").strict);
}

#[test]
fn test_strict_duplicate_args() {
    assert_syntax_error("'use strict'; function f(a, a) {}", "invalid arg name");
    assert_syntax_error("function f(a, a) { 'use strict'; }", "invalid arg name");
    assert_syntax_error("function f(eval) { 'use strict'; }", "invalid arg name");
}

#[test]
fn test_strict_function_name() {
    assert_syntax_error("function eval() { 'use strict'; }", "invalid function name");
    assert_syntax_error("'use strict'; (function arguments() {});", "invalid function name");
    compile_ok("function eval() {}");
}

#[test]
fn test_strict_restrictions() {
    assert_syntax_error("'use strict'; with (o) {}", "with in strict mode");
    assert_syntax_error("'use strict'; var eval;", "invalid variable declaration");
    assert_syntax_error("'use strict'; try {} catch (arguments) {}", "invalid try statement");
    assert_syntax_error("'use strict'; delete x;", "cannot delete identifier");
    assert_syntax_error("'use strict'; eval = 1;", "invalid lvalue");
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_constant_folding() {
    let t = compile_ok("x = 1 + 2 * 3;");
    assert!(!has_op(&t, OpCode::Add));
    assert!(!has_op(&t, OpCode::Mul));
    let ldint = find_op(&t, OpCode::LdInt);
    assert!(ldint.iter().any(|ins| ins.ldint_value() == 7));

    let t = compile_ok("x = 'a' + 'b';");
    assert!(!has_op(&t, OpCode::Add));
    assert!(t.consts.iter().any(|k| matches!(k, Constant::String(s) if s == "ab")));
}

#[test]
fn test_no_folding_with_variables() {
    let t = compile_ok("function f(a) { return a + 1; }");
    assert!(has_op(inner(&t, 0), OpCode::Add));
}

#[test]
fn test_constants_are_deduplicated() {
    let t = compile_ok("x = 'k'; y = 'k'; z = 1.5; w = 1.5;");
    let strings = t.consts.iter().filter(|k| matches!(k, Constant::String(s) if s == "k")).count();
    let numbers = t.consts.iter().filter(|k| matches!(k, Constant::Number(n) if *n == 1.5)).count();
    assert_eq!(strings, 1);
    assert_eq!(numbers, 1);
}

#[test]
fn test_method_call_uses_csprop() {
    let t = compile_ok("o.m(1, 2);");
    assert!(has_op(&t, OpCode::CsProp));
    let call = find_op(&t, OpCode::Call);
    assert_eq!(call[0].c(), 2);
}

#[test]
fn test_new_without_arguments() {
    let t = compile_ok("new Foo;");
    let new = find_op(&t, OpCode::New);
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].c(), 0);
}

#[test]
fn test_logical_and_conditional() {
    let t = compile_ok("x = a && b || c ? d : e;");
    assert!(has_op(&t, OpCode::If));
    assert!(has_op(&t, OpCode::Jump));
}

#[test]
fn test_array_literal_batches() {
    let elems: Vec<String> = (0..45).map(|i| i.to_string()).collect();
    let t = compile_ok(&format!("[{}];", elems.join(",")));
    assert_eq!(find_op(&t, OpCode::MPutArr).len(), 3);

    let t = compile_ok("[1, , ];");
    assert!(has_extra(&t, ExtraOp::SetALen));
}

#[test]
fn test_object_literal_batches() {
    let props: Vec<String> = (0..12).map(|i| format!("p{}: {}", i, i)).collect();
    let t = compile_ok(&format!("({{{}}});", props.join(",")));
    assert_eq!(find_op(&t, OpCode::MPutObj).len(), 2);
}

#[test]
fn test_object_literal_errors() {
    assert_syntax_error("({a: 1 b: 2});", "invalid object literal");
    assert_syntax_error("({get a() {}, a: 1});", "invalid object literal");
    assert_syntax_error("'use strict'; ({a: 1, a: 2});", "invalid object literal");
    compile_ok("({a: 1, a: 2});");
}

#[test]
fn test_regexp_literal() {
    let t = compile_ok("x = /ab+c/gi;");
    assert!(has_op(&t, OpCode::Regexp));
    let t = compile_ok("x = a / b / c;");
    assert!(!has_op(&t, OpCode::Regexp));
    assert_eq!(find_op(&t, OpCode::Div).len(), 2);
}

#[test]
fn test_typeof_unresolved_identifier() {
    let t = compile_ok("typeof undeclared;");
    assert!(has_extra(&t, ExtraOp::TypeOfId));
}

#[test]
fn test_invalid_assignment_target() {
    let t = compile_ok("f() = 1;");
    assert!(has_extra(&t, ExtraOp::InvLhs));
    let t = compile_ok("1++;");
    assert!(has_extra(&t, ExtraOp::InvLhs));
}

#[test]
fn test_expression_errors() {
    assert_syntax_error("x = ;", "empty expression not allowed");
    assert_syntax_error("();", "empty expression not allowed");
    assert_syntax_error("a b;", "unterminated statement");
    assert_syntax_error("a.(b);", "expecting identifier name");
    assert_syntax_error("x = *;", "unexpected token");
}

// ============================================================================
// Control Flow
// ============================================================================

#[test]
fn test_loops_open_label_sites() {
    for src in ["while (a) {}", "do {} while (a);", "for (;;) {}", "for (k in o) {}", "switch (a) {}"] {
        let t = compile_ok(src);
        assert!(has_op(&t, OpCode::Label), "{}", src);
        assert!(has_op(&t, OpCode::EndLabel), "{}", src);
    }
}

#[test]
fn test_loop_label_slots_are_patched() {
    for src in ["while (a) {}", "do {} while (a)", "for (i = 0; i < 2; i++) {}", "for (var k in o) {}"] {
        let t = compile_ok(src);
        let pc = t.code.iter().position(|ins| ins.op() == OpCode::Label).expect("label site");
        assert_eq!(t.code[pc + 1].op(), OpCode::Jump, "break slot of {}", src);
        assert_eq!(t.code[pc + 2].op(), OpCode::Jump, "continue slot of {}", src);
    }
}

#[test]
fn test_labelled_block_break_slot() {
    let t = compile_ok("a: { break a; }");
    let pc = t.code.iter().position(|ins| ins.op() == OpCode::Label).expect("label site");
    assert_eq!(t.code[pc + 1].op(), OpCode::Jump);
    assert_eq!(t.code[pc + 2].op(), OpCode::Invalid);
}

#[test]
fn test_fast_break_within_catch_depth() {
    let t = compile_ok("outer: for (;;) { for (;;) { break outer; } }");
    assert!(!has_op(&t, OpCode::Break));
    assert!(!has_op(&t, OpCode::Continue));
}

#[test]
fn test_slow_break_across_try() {
    let t = compile_ok("outer: for (;;) { try { break outer; } finally { x(); } }");
    let breaks = find_op(&t, OpCode::Break);
    assert_eq!(breaks.len(), 1);
    // label ids are numbered per function from zero
    assert_eq!(breaks[0].abc_field(), 0);

    let t = compile_ok("for (;;) { with (o) { continue; } }");
    assert!(has_op(&t, OpCode::Continue));
}

#[test]
fn test_for_in_splice() {
    let t = compile_ok("for (var k in o) { k; }");
    let ops = ops(&t);
    let init = ops.iter().position(|op| *op == OpCode::Extra).expect("extra ops");
    assert!(init > 0);
    assert!(has_extra(&t, ExtraOp::InitEnum));
    assert!(has_extra(&t, ExtraOp::NextEnum));
    // the jump entering the loop goes forward to the enumerator setup
    let pc_label = ops.iter().position(|op| *op == OpCode::Label).expect("label site");
    let entry = t.code[pc_label + 3];
    assert_eq!(entry.op(), OpCode::Jump);
    assert!(entry.jump_target(pc_label + 3) > pc_label + 4);
}

#[test]
fn test_for_in_targets() {
    let t = compile_ok("for (o.p in q) {}");
    assert!(has_op(&t, OpCode::PutProp));
    let t = compile_ok("for (f() in q) {}");
    assert!(has_extra(&t, ExtraOp::InvLhs));
    assert_syntax_error("for ( in q) {}", "unexpected token");
}

#[test]
fn test_for_var_list() {
    let t = compile_ok("function f() { for (var i = 0, j = 10; i < j; i++, j--) {} }");
    let f = inner(&t, 0);
    assert!(!has_op(f, OpCode::PutVar));
    assert!(has_op(f, OpCode::Lt));
}

#[test]
fn test_switch_compiles_to_strict_equality_chain() {
    let t = compile_ok("switch (x) { case 1: a(); case 2: b(); break; default: c(); }");
    assert_eq!(find_op(&t, OpCode::SEq).len(), 2);
}

#[test]
fn test_switch_errors() {
    assert_syntax_error("switch (x) { default: ; default: ; }", "duplicate default clause");
    assert_syntax_error("switch (x) { a(); }", "invalid switch statement");
}

#[test]
fn test_tail_call() {
    let t = compile_ok("function f() { return g(1); }");
    let f = inner(&t, 0);
    let call = find_op(f, OpCode::Call);
    assert!(call[0].a() & CALL_FLAG_TAILCALL != 0);

    let t = compile_ok("function f() { try { return g(); } catch (e) {} }");
    let f = inner(&t, 0);
    let call = find_op(f, OpCode::Call);
    assert_eq!(call[0].a() & CALL_FLAG_TAILCALL, 0);
    let ret = find_op(f, OpCode::Return);
    assert_eq!(ret[0].a(), RETURN_FLAG_HAVE_RETVAL);

    let t = compile_ok("function f(o) { with (o) { return g(); } }");
    let call = find_op(inner(&t, 0), OpCode::Call);
    assert_eq!(call[0].a() & CALL_FLAG_TAILCALL, 0);

    // Label catchers do not block the flag.
    let t = compile_ok("function f() { a: while (x) { return g(); } }");
    let call = find_op(inner(&t, 0), OpCode::Call);
    assert!(call[0].a() & CALL_FLAG_TAILCALL != 0);
}

#[test]
fn test_try_catch_finally_layout() {
    let t = compile_ok("try { a(); } catch (e) { b(); } finally { c(); }");
    let pc = t.code.iter().position(|ins| ins.op() == OpCode::TryCatch).expect("trycatch");
    let trycatch = t.code[pc];
    assert_eq!(
        trycatch.a(),
        TRYCATCH_FLAG_HAVE_CATCH | TRYCATCH_FLAG_HAVE_FINALLY | TRYCATCH_FLAG_CATCH_BINDING
    );
    assert!(trycatch.c() >= 256);
    assert_eq!(t.code[pc + 1].op(), OpCode::Jump);
    assert_eq!(t.code[pc + 2].op(), OpCode::Jump);
    assert!(has_extra(&t, ExtraOp::EndTry));
    assert!(has_extra(&t, ExtraOp::EndCatch));
    assert!(has_extra(&t, ExtraOp::EndFin));
}

#[test]
fn test_try_finally_without_catch() {
    let t = compile_ok("try { a(); } finally { c(); }");
    let trycatch = find_op(&t, OpCode::TryCatch);
    assert_eq!(trycatch[0].a(), TRYCATCH_FLAG_HAVE_FINALLY);
    assert_eq!(trycatch[0].c(), 0);
    assert_syntax_error("try { a(); }", "invalid try statement");
}

#[test]
fn test_statement_errors() {
    assert_syntax_error("return 1;", "invalid return");
    assert_syntax_error("break;", "cannot resolve label");
    assert_syntax_error("a: a: ;", "duplicate (non-empty) label");
    assert_syntax_error("a: { continue a; }", "continue label matches an invalid statement type");
    assert_syntax_error("while (x) { continue nope; }", "cannot resolve label");
    assert_syntax_error("if (x) function f() {}", "function declaration not allowed outside of top level");
    assert_syntax_error("function () {}", "function name required");
    assert_syntax_error("var 1;", "invalid variable declaration");
    assert_syntax_error("throw\nx;", "invalid throw");
}

#[test]
fn test_automatic_semicolon_insertion() {
    compile_ok("a = 1\nb = 2");
    compile_ok("{ a = 1 }");
    compile_ok("do x++; while (x < 3) y = 1;");
    compile_ok("function f() { return\n1; }");
}

#[test]
fn test_labels_scope_ends_with_statement() {
    compile_ok("a: ; a: ;");
    compile_ok("a: while (x) { b: while (y) { continue a; } }");
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_recursion_limit() {
    let src = format!("{}1{};", "(".repeat(50), ")".repeat(50));
    let options = CompileOptions::default().with_recursion_limit(20);
    let err = compile_with(&src, &options).expect_err("deep nesting should fail");
    assert!(err.is_internal_error());
    assert_eq!(err.message(), "compiler recursion limit reached");

    compile_ok(&src);
}

/// Deepest accepted nesting, and one step past the limit, for each shape
/// that recurses through the parser. Runs on a 2 MiB stack.
#[test]
fn test_deep_nesting_fits_small_stack() {
    const LIMIT: usize = DEFAULT_RECURSION_LIMIT as usize;

    fn parens(n: usize) -> String {
        format!("{}1{};", "(".repeat(n), ")".repeat(n))
    }
    fn nots(n: usize) -> String {
        format!("{}x;", "!".repeat(n))
    }
    fn blocks(n: usize) -> String {
        format!("{}{}", "{".repeat(n), "}".repeat(n))
    }
    fn ifs(n: usize) -> String {
        format!("{};", "if (1) ".repeat(n))
    }
    fn functions(n: usize) -> String {
        let mut body = String::from("1");
        for _ in 0..n {
            body = format!("function () {{ return {}; }}", body);
        }
        format!("x = {};", body)
    }

    let handle = std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(|| {
            let cases: [(&str, String, String); 5] = [
                ("parens", parens(LIMIT - 8), parens(LIMIT)),
                ("nots", nots(LIMIT - 8), nots(LIMIT)),
                ("blocks", blocks(LIMIT / 2 - 4), blocks(LIMIT / 2)),
                ("ifs", ifs(LIMIT / 2 - 4), ifs(LIMIT / 2)),
                // Each outer pass recompiles the inner functions, so keep the
                // accepted case shallow.
                ("functions", functions(10), functions(60)),
            ];
            for (shape, ok_src, err_src) in cases {
                if let Err(err) = compile_with(&ok_src, &CompileOptions::default()) {
                    panic!("{} near the limit should compile: {}", shape, err);
                }
                match compile_with(&err_src, &CompileOptions::default()) {
                    Ok(_) => panic!("{} past the limit should fail", shape),
                    Err(err) => {
                        assert!(err.is_internal_error(), "{}: {}", shape, err);
                        assert_eq!(err.message(), "compiler recursion limit reached");
                    }
                }
            }
        })
        .expect("spawn compiler thread");
    handle.join().expect("deep nesting should not overflow the stack");
}

#[test]
fn test_out_of_temp_regs() {
    let args: Vec<String> = (0..300).map(|i| i.to_string()).collect();
    let err = compile_err(&format!("f({});", args.join(",")));
    assert!(err.is_internal_error());
    assert_eq!(err.message(), "out of temp regs");

    let args: Vec<String> = (0..200).map(|i| i.to_string()).collect();
    compile_ok(&format!("f({});", args.join(",")));
}

#[test]
fn test_out_of_funcs() {
    let funcs = vec!["function () {}"; 300];
    let err = compile_err(&format!("x = [{}];", funcs.join(",")));
    assert!(err.is_internal_error());
    assert_eq!(err.message(), "out of funcs");

    let template = compile_ok(&format!("x = [{}];", vec!["function () {}"; 256].join(",")));
    assert_eq!(template.funcs.len(), 256);
}

/// The scanning pass has no register bindings yet, so every declared name
/// takes a constant slot there before any register runs out.
#[test]
fn test_many_vars_exhaust_consts_in_scanning_pass() {
    let vars = |n: usize| -> String {
        let decls: Vec<String> = (0..n).map(|i| format!("var v{};", i)).collect();
        format!("function f() {{ {} }}", decls.join(" "))
    };

    let err = compile_err(&vars(300));
    assert!(err.is_internal_error());
    assert_eq!(err.message(), "out of consts");

    let template = compile_ok(&vars(200));
    let func = inner(&template, 0);
    assert!(func.nregs >= 200);
    assert!(!has_op(func, OpCode::PutVar));
}

#[test]
fn test_out_of_consts() {
    let strings: Vec<String> = (0..300).map(|i| format!("'s{}'", i)).collect();
    let err = compile_err(&format!("x = [{}];", strings.join(",")));
    assert!(err.is_internal_error());
    assert_eq!(err.message(), "out of consts");
}

#[test]
fn test_error_carries_line() {
    let err = compile_err("var a = 1;\nvar b = 2;\nvar = 3;");
    assert_eq!(err.line(), Some(3));
}
