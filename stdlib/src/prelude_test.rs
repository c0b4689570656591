use smalt_core::val::Val;

use crate::test_vm;

#[test]
fn iteration_protocol() {
    let mut vm = test_vm();
    assert_eq!(
        vm.doit("sum := 0. #(1 2 3 4) do: [:n | sum := sum + n]. sum")
            .unwrap(),
        Val::Int(10)
    );
    assert_eq!(
        vm.doit("(#(1 2 3) collect: [:n | n * n]) at: 3").unwrap(),
        Val::Int(9)
    );
    assert_eq!(
        vm.doit("(#(1 2 3 4 5) select: [:n | n even]) size").unwrap(),
        Val::Int(2)
    );
    assert_eq!(
        vm.doit("(#(1 2 3 4 5) reject: [:n | n even]) size").unwrap(),
        Val::Int(3)
    );
    assert_eq!(
        vm.doit("#(3 5 8 9) detect: [:n | n even]").unwrap(),
        Val::Int(8)
    );
    assert_eq!(
        vm.doit("#(1 2 3) inject: 100 into: [:acc :n | acc + n]")
            .unwrap(),
        Val::Int(106)
    );
    assert_eq!(vm.doit("#(1 2 3 4) sum").unwrap(), Val::Int(10));
    assert_eq!(vm.doit("#(7 8 9) indexOf: 8").unwrap(), Val::Int(2));
    assert_eq!(vm.doit("#(7 8 9) indexOf: 99").unwrap(), Val::Int(0));
}

#[test]
fn any_and_all() {
    let mut vm = test_vm();
    assert_eq!(
        vm.doit("#(1 3 5) anySatisfy: [:n | n even]").unwrap(),
        Val::Bool(false)
    );
    assert_eq!(
        vm.doit("#(1 3 6) anySatisfy: [:n | n even]").unwrap(),
        Val::Bool(true)
    );
    assert_eq!(
        vm.doit("#(2 4 6) allSatisfy: [:n | n even]").unwrap(),
        Val::Bool(true)
    );
}

#[test]
fn numeric_loops() {
    let mut vm = test_vm();
    assert_eq!(
        vm.doit("n := 0. 10 timesRepeat: [n := n + 1]. n").unwrap(),
        Val::Int(10)
    );
    assert_eq!(
        vm.doit("acc := 0. 1 to: 10 by: 2 do: [:i | acc := acc + i]. acc")
            .unwrap(),
        Val::Int(25)
    );
    assert_eq!(vm.doit("5 between: 1 and: 10").unwrap(), Val::Bool(true));
    assert_eq!(vm.doit("15 between: 1 and: 10").unwrap(), Val::Bool(false));
}

#[test]
fn primitive_backed_math() {
    let mut vm = test_vm();
    assert_eq!(vm.doit("16 sqrt").unwrap(), Val::Float(4.0));
    assert_eq!(vm.doit("2 raisedTo: 10").unwrap(), Val::Int(1024));
    assert_eq!(vm.doit("2.5 floor").unwrap(), Val::Int(2));
    assert_eq!(vm.doit("2.5 ceiling").unwrap(), Val::Int(3));
    assert!(vm.doit("-1 sqrt").is_err());
}

#[test]
fn table_iteration() {
    let mut vm = test_vm();
    let source = r#"
        t := #{"a" -> 1. "b" -> 2. "c" -> 3}.
        total := 0.
        t keysAndValuesDo: [:k :v | total := total + v].
        total
    "#;
    assert_eq!(vm.doit(source).unwrap(), Val::Int(6));
}

#[test]
fn transcript_answers_itself() {
    let mut vm = test_vm();
    assert_eq!(
        vm.doit(r#"(Transcript show: "") == Transcript"#).unwrap(),
        Val::Bool(true)
    );
}
