//! Runs the numbered scenarios through both back ends and checks they
//! agree, since the library exposes both a compiler/VM pair and a
//! tree-walking evaluator over the same AST.

use m_lang::compiler::Compiler;
use m_lang::evaluator;
use m_lang::object::{Environment, Object};
use m_lang::parser::Parser;
use m_lang::vm::Vm;

fn run_vm(source: &str) -> Object {
    let program = Parser::from_source(source).parse_program();
    let mut compiler = Compiler::new();
    compiler.compile_program(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("vm error");
    vm.last_popped_stack_element()
}

fn run_eval(source: &str) -> Object {
    let program = Parser::from_source(source).parse_program();
    let env = Environment::new();
    evaluator::eval_program(&program, &env)
}

fn assert_both_backends(source: &str, expected: &str) {
    assert_eq!(run_vm(source).to_string(), expected, "vm mismatch for {source:?}");
    assert_eq!(
        run_eval(source).to_string(),
        expected,
        "evaluator mismatch for {source:?}"
    );
}

#[test]
fn arithmetic_expression() {
    assert_both_backends("(5 + 10 * 2 + 15 / 3) * 2 + -10", "50");
}

#[test]
fn nested_function_calls() {
    assert_both_backends(
        r#"
        let a = fn() { 1 };
        let b = fn() { a() + 1 };
        let c = fn() { b() + 1 };
        c();
        "#,
        "2",
    );
}

#[test]
fn closures_accumulate_over_calls() {
    assert_both_backends(
        r#"
        let newAdder = fn(a, b) {
            fn(c) { a + b + c };
        };
        let adder = newAdder(1, 2);
        adder(8);
        "#,
        "11",
    );
}

#[test]
fn recursion_terminates_at_the_base_case() {
    assert_both_backends(
        r#"
        let countdown = fn(x) {
            if (x == 0) {
                0
            } else {
                countdown(x - 1);
            }
        };
        countdown(5);
        "#,
        "0",
    );
}

#[test]
fn len_builtin_succeeds_on_strings_and_arrays() {
    assert_both_backends(r#"len("hello")"#, "5");
    assert_both_backends("len([1, 2, 3, 4])", "4");
}

#[test]
fn len_builtin_rejects_unsupported_types() {
    match run_vm("len(1)") {
        Object::Error(msg) => assert_eq!(&*msg, "argument to `len` not supported, got INTEGER"),
        other => panic!("expected error, got {other:?}"),
    }
    match run_eval("len(1)") {
        Object::Error(msg) => assert_eq!(&*msg, "argument to `len` not supported, got INTEGER"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[test]
fn hash_indexing_and_unhashable_key_errors() {
    assert_both_backends(r#"{"name": "m", "age": 1}["name"]"#, "m");

    match run_eval("{1: 2}[fn(x) { x }]") {
        Object::Error(msg) => assert_eq!(&*msg, "unhashable as hash key: FUNCTION"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[test]
fn wrong_arity_call_is_a_runtime_error() {
    let source = "let f = fn(a, b) { a + b }; f(1);";

    let program = Parser::from_source(source).parse_program();
    let mut compiler = Compiler::new();
    compiler.compile_program(&program).unwrap();
    let mut vm = Vm::new(compiler.bytecode());
    let err = vm.run().expect_err("expected a vm error");
    assert_eq!(err.to_string(), "wrong number of arguments: want=2, got=1");

    match run_eval(source) {
        Object::Error(msg) => assert_eq!(
            &*msg,
            "wrong number of arguments: want=2, got=1"
        ),
        other => panic!("expected error object, got {other:?}"),
    }
}

#[test]
fn array_and_string_values_render_with_inspect_formatting() {
    assert_both_backends("[1, 2 + 2, 3 * 3]", "[1, 4, 9]");
    assert_both_backends(r#""foo" + "bar""#, "foobar");
}
