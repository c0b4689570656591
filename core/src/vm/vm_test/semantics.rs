use super::*;

#[test]
fn integer_addition() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "3 + 4"), Val::Int(7));
}

#[test]
fn precedence_unary_binary_keyword() {
    let mut vm = vm();
    // Binary before keyword, unary before binary, left-to-right binaries.
    assert_eq!(eval(&mut vm, "2 + 3 * 4"), Val::Int(20));
    assert_eq!(eval(&mut vm, "2 + (3 * 4)"), Val::Int(14));
    assert_eq!(eval(&mut vm, "3 negated abs"), Val::Int(3));
    assert_eq!(eval(&mut vm, "1 max: 2 + 3"), Val::Int(5));
}

#[test]
fn top_level_globals() {
    let mut vm = vm();
    let values = vm.eval_statements("x := 10. y := x * 2. y + 1").unwrap();
    assert_eq!(values, vec![Val::Int(10), Val::Int(20), Val::Int(21)]);
}

#[test]
fn literal_arrays_and_tables() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "#(1 2 3) size"), Val::Int(3));
    assert_eq!(eval(&mut vm, "#(1 2 3) at: 2"), Val::Int(2));
    assert_eq!(eval(&mut vm, "#(x y) at: 1"), Val::symbol("x"));
    assert_eq!(eval(&mut vm, "{1 + 1. 2 + 2} at: 2"), Val::Int(4));
    assert_eq!(
        eval(&mut vm, r#"#{"a" -> 1. "b" -> 2} at: "b""#),
        Val::Int(2)
    );
}

#[test]
fn literal_array_evaluations_are_fresh() {
    let mut vm = vm();
    let source = "mk := [#(1 2 3)]. a := mk value. a at: 1 put: 99. mk value at: 1";
    assert_eq!(eval(&mut vm, source), Val::Int(1));
}

#[test]
fn class_definition_and_slot_methods() {
    let mut vm = vm();
    let source = r#"
        Point := Object derive: #(x y).
        Point >> moveBy: dx and: dy [ x := x + dx. y := y + dy. ^ self ].
        p := Point new.
        p x: 100.
        p y: 200.
        p moveBy: 10 and: 20.
        p x
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(110));
}

#[test]
fn generated_accessors_read_and_write() {
    let mut vm = vm();
    let source = "Point := Object derive: #(x y). p := Point new. p x: 5. p x";
    assert_eq!(eval(&mut vm, source), Val::Int(5));
    // Slots start out nil.
    assert_eq!(eval(&mut vm, "Point new y"), Val::Nil);
}

#[test]
fn methods_answer_self_by_default() {
    let mut vm = vm();
    let source = "A := Object derive. A >> touch [ 42 ]. a := A new. a touch == a";
    assert_eq!(eval(&mut vm, source), Val::Bool(true));
}

#[test]
fn derived_class_is_named_by_assignment() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "Point := Object derive. Point name"), Val::str("Point"));
    assert_eq!(
        eval(&mut vm, "Point new printString"),
        Val::str("a Point")
    );
}

#[test]
fn super_chain_concatenation() {
    let mut vm = vm();
    let source = r#"
        A := Object derive.
        A >> foo [ ^ "A" ].
        B := A derive.
        B >> foo [ ^ super foo , "B" ].
        C := B derive.
        C >> foo [ ^ super foo , "C" ].
        C new foo
    "#;
    assert_eq!(eval(&mut vm, source), Val::str("ABC"));
}

#[test]
fn qualified_super_picks_the_named_parent() {
    let mut vm = vm();
    let source = r#"
        L := Object derive.
        L >> who [ ^ "L" ].
        R := Object derive.
        R >> who [ ^ "R" ].
        Both := L derive.
        Both >> who [ ^ super<R> who ].
        Both addParent: R.
        Both new who
    "#;
    assert_eq!(eval(&mut vm, source), Val::str("R"));
}

#[test]
fn qualified_super_rejects_non_parents() {
    let mut vm = vm();
    let source = r#"
        A := Object derive.
        B := Object derive.
        A >> go [ ^ super<B> go ].
        A new go
    "#;
    let err = vm.doit(source).unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Dispatch);
}

#[test]
fn cascade_sends_to_one_receiver() {
    let mut vm = vm_with_prelude();
    let source = "a := Array new. a add: 1; add: 2; add: 3. a size";
    assert_eq!(eval(&mut vm, source), Val::Int(3));
    // The cascade's value is the last message's result.
    assert_eq!(eval(&mut vm, "Array new add: 1; add: 9"), Val::Int(9));
}

#[test]
fn does_not_understand_default_raises() {
    let mut vm = vm();
    let err = vm.doit("3 frobnicate").unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Dispatch);
    assert!(err.message.contains("frobnicate"), "message: {}", err.message);
}

#[test]
fn does_not_understand_is_overridable() {
    let mut vm = vm();
    let source = r#"
        Echo := Object derive.
        Echo >> doesNotUnderstand: aMessage [ ^ aMessage at: 1 ].
        Echo new someUnknownSelector
    "#;
    assert_eq!(eval(&mut vm, source), Val::symbol("someUnknownSelector"));
}

#[test]
fn implicit_keyword_message_arity_checked() {
    let mut vm = vm();
    let source = "A := Object derive. A >> one: x [ ^ x ]. A new one: 1";
    assert_eq!(eval(&mut vm, source), Val::Int(1));
}

#[test]
fn equality_and_identity_messages() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, r#""abc" = "abc""#), Val::Bool(true));
    assert_eq!(eval(&mut vm, "#(1) = #(1)"), Val::Bool(false));
    assert_eq!(eval(&mut vm, "x := #(1). x == x"), Val::Bool(true));
    assert_eq!(eval(&mut vm, "3 = 3.0"), Val::Bool(true));
    assert_eq!(eval(&mut vm, "3 == 3.0"), Val::Bool(false));
    assert_eq!(eval(&mut vm, "nil isNil"), Val::Bool(true));
}

#[test]
fn user_defined_equals_wins_dispatch() {
    let mut vm = vm();
    let source = r#"
        Money := Object derive: #(amount).
        Money >> = other [ ^ amount = other amount ].
        a := Money new.
        a amount: 5.
        b := Money new.
        b amount: 5.
        a = b
    "#;
    assert_eq!(eval(&mut vm, source), Val::Bool(true));
}

#[test]
fn symbols_and_strings_do_not_compare_equal() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, r#"#abc = "abc""#), Val::Bool(false));
    assert_eq!(eval(&mut vm, r#"#abc asString = "abc""#), Val::Bool(true));
}

#[test]
fn class_side_methods() {
    let mut vm = vm();
    let source = r#"
        Counter := Object derive: #(n).
        Counter class >> startingAt: start [ | c | c := self new. c n: start. ^ c ].
        (Counter startingAt: 7) n
    "#;
    assert_eq!(eval(&mut vm, source), Val::Int(7));
}

#[test]
fn respond_to_and_kind_of() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "3 respondsTo: #abs"), Val::Bool(true));
    assert_eq!(eval(&mut vm, "3 respondsTo: #frob"), Val::Bool(false));
    assert_eq!(eval(&mut vm, "3 isKindOf: Number"), Val::Bool(true));
    assert_eq!(eval(&mut vm, "3 isKindOf: Float"), Val::Bool(false));
    assert_eq!(eval(&mut vm, "3 class name"), Val::str("Integer"));
}

#[test]
fn comments_are_skipped() {
    let mut vm = vm();
    assert_eq!(eval(&mut vm, "1 + 'a comment' 2"), Val::Int(3));
}
