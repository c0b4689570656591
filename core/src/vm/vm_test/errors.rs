use super::*;
use crate::error::ErrorKind;

#[test]
fn division_by_zero() {
    let mut vm = vm();
    let err = vm.doit("1 / 0").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Value);
    assert!(err.message.contains("division by zero"));
}

#[test]
fn int_div_requires_integers() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "7 // 2"), Val::Int(3));
    assert_eq!(eval(&mut vm, "7 \\ 2"), Val::Int(1));
    assert!(vm.doit("7.0 // 2").is_err());
    assert!(vm.doit("7 \\ 2.0").is_err());
}

#[test]
fn undefined_variable_is_a_value_error() {
    let mut vm = vm();
    let err = vm.doit("nonexistentThing + 1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Value);
    assert!(err.message.contains("nonexistentThing"));
}

#[test]
fn parse_errors_surface_with_position() {
    let mut vm = vm();
    let err = vm.doit("1 + (").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
}

#[test]
fn on_do_catches_signals() {
    let mut vm = vm();
    let source = r#"[Error signal: "boom"] on: Error do: [:e | e message]"#;
    assert_eq!(eval(&mut vm, source), Val::str("boom"));
}

#[test]
fn on_do_catches_runtime_errors() {
    let mut vm = vm();
    let source = r#"[1 / 0] on: Error do: [:e | "caught"]"#;
    assert_eq!(eval(&mut vm, source), Val::str("caught"));
}

#[test]
fn on_do_passes_through_on_success() {
    let mut vm = vm();
    let source = "[40 + 2] on: Error do: [:e | 0]";
    assert_eq!(eval(&mut vm, source), Val::Int(42));
}

#[test]
fn handler_filter_by_subclass() {
    let mut vm = vm();
    let source = r#"
        Overflow := Error derive.
        [Overflow signal: "too big"] on: Overflow do: [:e | e message]
    "#;
    assert_eq!(eval(&mut vm, source), Val::str("too big"));
}

#[test]
fn handler_filter_skips_unrelated_classes() {
    let mut vm = vm();
    // A plain Error signal is not an Overflow; the inner handler must not
    // catch it, the outer one must.
    let source = r#"
        Overflow := Error derive.
        [[Error signal: "plain"] on: Overflow do: [:e | "wrong"]]
            on: Error do: [:e | "outer"]
    "#;
    assert_eq!(eval(&mut vm, source), Val::str("outer"));
}

#[test]
fn nested_handlers_unwind_inside_out() {
    let mut vm = vm();
    let source = r#"
        [[Error signal: "x"] on: Error do: [:e | "inner"]]
            on: Error do: [:e | "outer"]
    "#;
    assert_eq!(eval(&mut vm, source), Val::str("inner"));
}

#[test]
fn uncaught_error_carries_the_stack_trace() {
    let mut vm = vm();
    let source = r#"
        A := Object derive.
        A >> inner [ ^ 1 / 0 ].
        A >> outer [ ^ self inner ].
        A new outer
    "#;
    let err = vm.doit(source).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Value);
    // Innermost first.
    assert!(err.trace[0].contains("inner"), "trace: {:?}", err.trace);
    assert!(err.trace.iter().any(|f| f.contains("outer")));
}

#[test]
fn exception_exposes_stack_trace_object() {
    let mut vm = vm();
    let source = r#"
        A := Object derive.
        A >> kaboom [ ^ Error signal: "nope" ].
        [A new kaboom] on: Error do: [:e | e stackTrace size > 0]
    "#;
    assert_eq!(eval(&mut vm, source), Val::Bool(true));
}

#[test]
fn handler_may_ignore_the_exception() {
    let mut vm = vm();
    let source = r#"[Error signal: "x"] on: Error do: [7]"#;
    assert_eq!(eval(&mut vm, source), Val::Int(7));
}

#[test]
fn error_message_cascade_render() {
    let mut vm = vm();
    let err = vm.doit("Error signal: \"rendered\"").unwrap_err();
    let text = err.to_string();
    assert!(text.contains("signal"));
    assert!(text.contains("rendered"));
}

#[test]
fn vm_is_reusable_after_an_error() {
    let mut vm = vm();
    assert!(vm.doit("1 / 0").is_err());
    assert_eq!(eval(&mut vm, "2 + 2"), Val::Int(4));
    let (work, stack, acts) = vm.main_depths();
    assert_eq!((work, stack, acts), (0, 0, 0));
}
