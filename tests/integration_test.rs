// ABOUTME: End-to-end tests driving the public cou::run entry point against whole programs

use cou::error::CouError;
use cou::eval::StringSink;

fn run_ok(src: &str) -> Vec<String> {
    let mut sink = StringSink::new();
    cou::run(src, &mut sink).expect("program should run successfully");
    sink.0
}

fn run_err(src: &str) -> CouError {
    let mut sink = StringSink::new();
    cou::run(src, &mut sink).expect_err("program should fail")
}

#[test]
fn scenario_a_arithmetic_and_precedence() {
    let out = run_ok(
        r#"
        a: num = 2 + 3 * 4;
        say a;
        say (2 + 3) * 4;
        "#,
    );
    assert_eq!(out, vec!["14", "20"]);
}

#[test]
fn scenario_b_lexical_closure_via_process() {
    let out = run_ok(
        r#"
        x: num = 10;
        proc f: num () { return x + 1; }
        say f();
        "#,
    );
    assert_eq!(out, vec!["11"]);
}

#[test]
fn scenario_c_shadowing_across_nested_scopes_is_rejected() {
    let err = run_err(
        r#"
        x: num = 1;
        if (true) { x: num = 2; say x; }
        "#,
    );
    assert!(matches!(err, CouError::Scope(_)));
}

#[test]
fn scenario_d_as_loop_with_step() {
    let out = run_ok(
        r#"
        i: num;
        as (i = 0; i < 3; i = i + 1) { say i; }
        "#,
    );
    assert_eq!(out, vec!["0", "1", "2"]);
}

#[test]
fn scenario_e_nested_array_indexing() {
    let out = run_ok(
        r#"
        a: arr = arr[2];
        a[0] = arr[2];
        a[0][1] = 'hi';
        say a[0][1];
        "#,
    );
    assert_eq!(out, vec!["hi"]);
}

#[test]
fn scenario_f_short_circuit_skips_division_by_zero() {
    let out = run_ok(
        r#"
        proc bad: num () { return 1 / 0; }
        say (false && bad() == 0);
        "#,
    );
    assert_eq!(out, vec!["false"]);
}

#[test]
fn integer_floor_division_identity_holds() {
    let out = run_ok(
        r#"
        x: num = 17;
        y: num = 5;
        say x %/ y * y + x % y == x;
        "#,
    );
    assert_eq!(out, vec!["true"]);
}

#[test]
fn string_concatenation_coerces_numbers_and_identity_holds() {
    let out = run_ok(
        r#"
        say 'a' + 1;
        x: num = 42;
        say '' + x;
        "#,
    );
    assert_eq!(out, vec!["a1", "42"]);
}

#[test]
fn array_of_length_n_starts_all_nothing() {
    let out = run_ok(
        r#"
        a: arr = arr[3];
        say a[0];
        a[1] = 7;
        say a[0];
        say a[1];
        "#,
    );
    assert_eq!(out, vec!["nothing", "nothing", "7"]);
}

#[test]
fn array_index_out_of_bounds_is_runtime_error() {
    let err = run_err(
        r#"
        a: arr = arr[0];
        say a[0];
        "#,
    );
    assert!(matches!(err, CouError::Runtime(_)));
}

#[test]
fn division_by_zero_is_runtime_error() {
    let err = run_err("say 1 / 0;");
    assert!(matches!(err, CouError::Runtime(_)));
}

#[test]
fn non_bool_condition_is_type_error() {
    let err = run_err("if (1) { say 1; }");
    assert!(matches!(err, CouError::Type(_)));
}

#[test]
fn return_type_mismatch_is_type_error() {
    let err = run_err("proc f: num () { return true; } say f();");
    assert!(matches!(err, CouError::Type(_)));
}

#[test]
fn calling_a_non_process_identifier_is_scope_error() {
    let err = run_err(
        r#"
        x: num = 1;
        say x();
        "#,
    );
    assert!(matches!(err, CouError::Scope(_)));
}

#[test]
fn undeclared_reference_is_scope_error() {
    let err = run_err("say y;");
    assert!(matches!(err, CouError::Scope(_)));
}

#[test]
fn duplicate_declaration_in_same_scope_is_scope_error() {
    let err = run_err(
        r#"
        x: num = 1;
        x: num = 2;
        "#,
    );
    assert!(matches!(err, CouError::Scope(_)));
}

#[test]
fn recursive_process_computes_factorial() {
    let out = run_ok(
        r#"
        proc fact: num (n: num) {
            if (n <= 1) { return 1; }
            return n * fact(n - 1);
        }
        say fact(5);
        "#,
    );
    assert_eq!(out, vec!["120"]);
}

#[test]
fn say_output_order_matches_statement_order() {
    let out = run_ok(
        r#"
        say 1;
        say 2;
        say 3;
        "#,
    );
    assert_eq!(out, vec!["1", "2", "3"]);
}

#[test]
fn top_level_return_halts_the_program() {
    let out = run_ok(
        r#"
        say 1;
        return;
        say 2;
        "#,
    );
    assert_eq!(out, vec!["1"]);
}

#[test]
fn floor_division_identity_holds_for_negative_operands() {
    let out = run_ok(
        r#"
        x: num = -7;
        y: num = 2;
        say x %/ y;
        say x % y;
        say x %/ y * y + x % y == x;
        "#,
    );
    assert_eq!(out, vec!["-4", "1", "true"]);
}

#[test]
fn real_division_by_zero_is_runtime_error() {
    let err = run_err("say 1 / 0;");
    assert!(matches!(err, CouError::Runtime(_)));
}

#[test]
fn process_declared_inside_nested_block_resolves_enclosing_frame() {
    let out = run_ok(
        r#"
        proc outer: num () {
            if (true) {
                proc inner: num () { return 1; }
                return inner();
            }
            return 0;
        }
        say outer();
        "#,
    );
    assert_eq!(out, vec!["1"]);
}
