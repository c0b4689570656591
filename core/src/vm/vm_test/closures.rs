use super::*;

#[test]
fn block_value_family() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "[42] value"), Val::Int(42));
    assert_eq!(eval(&mut vm, "[:a | a + 1] value: 41"), Val::Int(42));
    assert_eq!(eval(&mut vm, "[:a :b | a * b] value: 6 value: 7"), Val::Int(42));
    assert_eq!(
        eval(&mut vm, "[:a :b | a - b] valueWithArguments: #(50 8)"),
        Val::Int(42)
    );
    assert_eq!(eval(&mut vm, "[:a :b | a] numArgs"), Val::Int(2));
}

#[test]
fn block_arity_is_checked() {
    let mut vm = vm();
    let err = vm.doit("[:a | a] value").unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Dispatch);
}

#[test]
fn counter_closure_keeps_state() {
    let mut vm = vm();
    let source = "makeCounter := [| c | c := 0. [c := c + 1. c]]. \
                  k := makeCounter value. k value. k value. k value";
    assert_eq!(eval(&mut vm, source), Val::Int(3));
}

#[test]
fn sibling_blocks_share_cells() {
    let mut vm = vm();
    let source = r#"
        pair := [| x | x := 0. {[x := x + 10. x]. [x]}] value.
        (pair at: 1) value.
        (pair at: 2) value
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(10));
}

#[test]
fn separate_invocations_do_not_share_cells() {
    let mut vm = vm();
    let source = r#"
        makeCounter := [| c | c := 0. [c := c + 1. c]].
        k1 := makeCounter value.
        k2 := makeCounter value.
        k1 value. k1 value.
        k2 value
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(1));
}

#[test]
fn non_local_return_exits_the_search() {
    let mut vm = vm_with_prelude();
    let source = "findFirstEven := [:arr | arr do: [:n | (n \\ 2) == 0 ifTrue: [^ n]]. ^ nil]. \
                  findFirstEven value: #(1 3 5 2 4)";
    assert_eq!(eval(&mut vm, source), Val::Int(2));
}

#[test]
fn non_local_return_misses_yield_nil_path() {
    let mut vm = vm_with_prelude();
    let source = "findFirstEven := [:arr | arr do: [:n | (n \\ 2) == 0 ifTrue: [^ n]]. ^ nil]. \
                  findFirstEven value: #(1 3 5)";
    assert_eq!(eval(&mut vm, source), Val::Nil);
}

#[test]
fn return_skips_rest_of_method() {
    let mut vm = vm();
    let source = r#"
        hits := Array new.
        A := Object derive.
        A >> probe: flag [
            flag ifTrue: [^ "early"].
            hits add: "late".
            ^ "late"
        ].
        r := A new probe: true.
        {r. hits size}
    "#;
    let result = eval(&mut vm, source);
    let items = result.as_array().unwrap().borrow().clone();
    assert_eq!(items, vec![Val::str("early"), Val::Int(0)]);
}

#[test]
fn detect_if_none_returns_through_do() {
    let mut vm = vm_with_prelude();
    assert_eq!(
        eval(&mut vm, "#(4 8 15) detect: [:n | n > 5] ifNone: [0]"),
        Val::Int(8)
    );
    assert_eq!(
        eval(&mut vm, "#(4) detect: [:n | n > 5] ifNone: [0]"),
        Val::Int(0)
    );
}

#[test]
fn escaped_block_return_is_an_error() {
    let mut vm = vm();
    let source = r#"
        A := Object derive.
        A >> maker [ ^ [^ 99] ].
        escaped := A new maker.
        escaped value
    "#;
    let err = vm.doit(source).unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::ReturnFromDeadActivation);
}

#[test]
fn blocks_see_the_method_receiver() {
    let mut vm = vm();
    let source = r#"
        Box := Object derive: #(v).
        Box >> eventually [ ^ [v] ].
        b := Box new.
        b v: 7.
        b eventually value
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(7));
}

#[test]
fn captured_cells_outlive_their_activation() {
    let mut vm = vm();
    let source = r#"
        A := Object derive.
        A >> stash [ | secret | secret := 21. ^ [secret * 2] ].
        A new stash value
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(42));
}

#[test]
fn assignment_through_capture_is_visible_outside() {
    let mut vm = vm();
    let source = r#"
        result := [| total | total := 0. [:n | total := total + n] value: 5. total] value.
        result
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(5));
}
