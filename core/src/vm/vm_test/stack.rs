use super::*;

#[test]
fn one_value_per_statement() {
    let mut vm = vm();
    let values = vm.eval_statements("1. 2 + 2. \"three\"").unwrap();
    assert_eq!(
        values,
        vec![Val::Int(1), Val::Int(4), Val::str("three")]
    );
}

#[test]
fn machine_is_quiescent_after_eval() {
    let mut vm = vm();
    vm.eval_statements("x := 1. y := [x + 1] value. y * 2").unwrap();
    let (work, stack, acts) = vm.main_depths();
    assert_eq!(work, 0, "work queue must drain");
    assert_eq!(stack, 0, "eval stack is handed to the caller");
    assert_eq!(acts, 0, "no activation survives a statement");
}

#[test]
fn trailing_period_is_allowed() {
    let mut vm = vm();
    let values = vm.eval_statements("1. 2.").unwrap();
    assert_eq!(values.len(), 2);
}

#[test]
fn empty_source_yields_no_values() {
    let mut vm = vm();
    let values = vm.eval_statements("").unwrap();
    assert!(values.is_empty());
}

#[test]
fn doit_returns_last_value_only() {
    let mut vm = vm();
    assert_eq!(vm.doit("1. 2. 3").unwrap(), Val::Int(3));
    assert_eq!(vm.doit("").unwrap(), Val::Nil);
}

#[test]
fn script_block_wrapping() {
    let mut vm = vm();
    let script = "#!/usr/bin/env smalt\n[| a b | a := 2. b := 3. a * b]";
    assert_eq!(vm.eval_script(script).unwrap(), Val::Int(6));
}

#[test]
fn script_block_return_terminates_the_script() {
    let mut vm = vm();
    let script = "[ true ifTrue: [^ 5]. 99 ]";
    assert_eq!(vm.eval_script(script).unwrap(), Val::Int(5));
}

#[test]
fn plain_scripts_run_as_statements() {
    let mut vm = vm();
    let script = "#!/usr/bin/env smalt\nx := 4. x * x";
    assert_eq!(vm.eval_script(script).unwrap(), Val::Int(16));
}
