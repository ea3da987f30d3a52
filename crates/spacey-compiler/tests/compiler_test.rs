//! Compiler integration tests through the public API.

use spacey_compiler::compiler::OpCode;
use spacey_compiler::{CompileOptions, Error, compile, compile_many};

#[test]
fn test_program_template_shape() {
    let t = compile("var a = 1; function f(x) { return x; }", &CompileOptions::default()).unwrap();
    assert_eq!(t.name.as_deref(), Some("global"));
    assert!(!t.is_function);
    assert_eq!(t.funcs.len(), 1);
    assert_eq!(t.funcs[0].name.as_deref(), Some("f"));
    assert_eq!(t.funcs[0].nargs, 1);
    assert!(t.funcs[0].is_function);
    assert_eq!(t.pc2line.len(), t.code.len());
}

#[test]
fn test_eval_code_options() {
    let t = compile("var v = 1;", &CompileOptions::new().with_eval(true)).unwrap();
    assert_eq!(t.name.as_deref(), Some("eval"));
    assert!(!t.newenv);

    let strict = compile("var v = 1;", &CompileOptions::new().with_eval(true).with_strict(true)).unwrap();
    assert!(strict.strict);
    assert!(strict.newenv);
}

#[test]
fn test_function_expression_option() {
    let options = CompileOptions::new().with_function_expression(true);
    let t = compile("function add(a, b) { return a + b; }", &options).unwrap();
    assert!(t.is_function);
    assert_eq!(t.formals, ["a", "b"]);

    let err = compile("function () {} 1;", &options).unwrap_err();
    assert!(err.is_syntax_error());
}

#[test]
fn test_disassembly_lists_every_function() {
    let options = CompileOptions::new().with_filename("demo.js");
    let t = compile("function outer() { return function inner() {}; }", &options).unwrap();
    let listing = t.disassemble();
    assert!(listing.starts_with("function global"));
    assert!(listing.contains("file: demo.js"));
    assert!(listing.contains("function f0/outer"));
    assert!(listing.contains("function f0/f0/inner"));
    assert!(listing.contains("RETURN"));
}

#[test]
fn test_syntax_errors_carry_line() {
    let err = compile("var a = 1;\nvar b = ;\n", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::SyntaxError { line: 2, .. }));
}

#[test]
fn test_strict_mode_rejections() {
    let strict = CompileOptions::new().with_strict(true);
    for src in ["with (o) {}", "delete x;", "var eval = 1;", "function f(a, a) {}", "010;"] {
        let err = compile(src, &strict).unwrap_err();
        assert!(err.is_syntax_error(), "{:?} should be rejected: {}", src, err);
    }
}

#[test]
fn test_recursion_limit_is_internal_error() {
    let deep = format!("{}1{}", "(".repeat(64), ")".repeat(64));
    let options = CompileOptions::new().with_recursion_limit(32);
    let err = compile(&deep, &options).unwrap_err();
    assert!(err.is_internal_error());
    assert!(compile(&deep, &CompileOptions::default()).is_ok());
}

#[test]
fn test_compile_many_keeps_order() {
    let sources = ["1;", "var = ;", "function f() {}"];
    let results = compile_many(&sources, &CompileOptions::default());
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].as_ref().is_err_and(|e| e.is_syntax_error()));
    assert_eq!(results[2].as_ref().map(|t| t.funcs.len()).ok(), Some(1));
}

#[test]
fn test_compilation_is_deterministic() {
    let src = "var o = {a: 1, b: [1, 2]}; for (var k in o) { if (k) break; } try { f(); } catch (e) {}";
    let a = compile(src, &CompileOptions::default()).unwrap();
    let b = compile(src, &CompileOptions::default()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_tail_call_only_outside_try() {
    let t = compile(
        "function f(g) { return g(); } function h(g) { try { return g(); } finally {} }",
        &CompileOptions::default(),
    )
    .unwrap();
    let tail = |i: usize| {
        t.funcs[i]
            .code
            .iter()
            .any(|ins| ins.op() == OpCode::Call && ins.a() & 1 != 0)
    };
    assert!(tail(0));
    assert!(!tail(1));
}
