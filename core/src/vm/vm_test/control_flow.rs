use super::*;

#[test]
fn conditionals() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "true ifTrue: [1]"), Val::Int(1));
    assert_eq!(eval(&mut vm, "false ifTrue: [1]"), Val::Nil);
    assert_eq!(eval(&mut vm, "false ifFalse: [2]"), Val::Int(2));
    assert_eq!(eval(&mut vm, "3 > 2 ifTrue: [1] ifFalse: [0]"), Val::Int(1));
    assert_eq!(eval(&mut vm, "3 < 2 ifTrue: [1] ifFalse: [0]"), Val::Int(0));
    assert_eq!(eval(&mut vm, "true ifFalse: [1] ifTrue: [2]"), Val::Int(2));
}

#[test]
fn short_circuit_and_or() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "true and: [false]"), Val::Bool(false));
    assert_eq!(eval(&mut vm, "false and: [1 / 0]"), Val::Bool(false));
    assert_eq!(eval(&mut vm, "true or: [1 / 0]"), Val::Bool(true));
    assert_eq!(eval(&mut vm, "false or: [true]"), Val::Bool(true));
}

#[test]
fn while_loop_accumulates() {
    let mut vm = vm();
    let source = "i := 0. sum := 0. [i < 10] whileTrue: [i := i + 1. sum := sum + i]. sum";
    assert_eq!(eval(&mut vm, source), Val::Int(55));
}

#[test]
fn while_false_runs_until_true() {
    let mut vm = vm();
    let source = "i := 0. [i >= 3] whileFalse: [i := i + 1]. i";
    assert_eq!(eval(&mut vm, source), Val::Int(3));
}

#[test]
fn while_result_is_nil() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "[false] whileTrue: [nil]"), Val::Nil);
}

#[test]
fn times_repeat_and_to_do() {
    let mut vm = vm_with_prelude();
    assert_eq!(
        eval(&mut vm, "n := 0. 5 timesRepeat: [n := n + 2]. n"),
        Val::Int(10)
    );
    assert_eq!(
        eval(&mut vm, "sum := 0. 1 to: 4 do: [:i | sum := sum + i]. sum"),
        Val::Int(10)
    );
}

#[test]
fn user_class_may_define_control_selectors() {
    let mut vm = vm();
    // `ifTrue:` only short-circuits for Booleans; other receivers dispatch.
    let source = r#"
        Maybe := Object derive.
        Maybe >> ifTrue: aBlock [ ^ "dispatched" ].
        Maybe new ifTrue: [1]
    "#;
    assert_eq!(eval(&mut vm, source), Val::str("dispatched"));
}

#[test]
fn deep_recursion_does_not_touch_the_host_stack() {
    let mut vm = vm();
    // 100k nested block activations; a host-recursive evaluator would
    // overflow its stack long before this completes.
    let source = "sum := nil. \
                  sum := [:n | n == 0 ifTrue: [0] ifFalse: [n + (sum value: n - 1)]]. \
                  sum value: 100000";
    assert_eq!(eval(&mut vm, source), Val::Int(5000050000));
}

#[test]
fn deep_arithmetic_overflow_is_an_error_not_a_crash() {
    let mut vm = vm();
    let source = "fact := nil. \
                  fact := [:n | n < 2 ifTrue: [1] ifFalse: [n * (fact value: n - 1)]]. \
                  fact value: 100000";
    let err = vm.doit(source).unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Value);
    assert!(err.message.contains("overflow"));
}

#[test]
fn primitive_marker_falls_back_when_unregistered() {
    let mut vm = vm();
    let source = r#"
        A := Object derive.
        A >> answer [ <primitive: "noSuchNative"> ^ 42 ].
        A new answer
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(42));
}

#[test]
fn primitive_marker_calls_registered_native() {
    use crate::obj::NativeDef;
    use crate::error::RtResult;

    fn double(_receiver: &Val, args: &[Val]) -> RtResult<Val> {
        Ok(Val::Int(args[0].as_int()? * 2))
    }

    let mut vm = vm();
    vm.kernel().register_primitive("testDouble", NativeDef::Plain(double));
    let source = r#"
        A := Object derive.
        A >> twice: n [ <primitive: "testDouble"> ^ 0 ].
        A new twice: 21
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(42));
}
