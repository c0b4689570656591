use smalt_core::val::Val;

use crate::test_vm;

#[test]
fn case_conversion_and_reverse() {
    let mut vm = test_vm();
    assert_eq!(vm.doit(r#""abc" asUppercase"#).unwrap(), Val::str("ABC"));
    assert_eq!(vm.doit(r#""AbC" asLowercase"#).unwrap(), Val::str("abc"));
    assert_eq!(vm.doit(r#""abc" reversed"#).unwrap(), Val::str("cba"));
}

#[test]
fn predicates() {
    let mut vm = test_vm();
    assert_eq!(
        vm.doit(r#""hello world" startsWith: "hello""#).unwrap(),
        Val::Bool(true)
    );
    assert_eq!(
        vm.doit(r#""hello world" endsWith: "world""#).unwrap(),
        Val::Bool(true)
    );
    assert_eq!(
        vm.doit(r#""hello world" includesSubstring: "lo wo""#).unwrap(),
        Val::Bool(true)
    );
    assert_eq!(
        vm.doit(r#""hello" includesSubstring: "xyz""#).unwrap(),
        Val::Bool(false)
    );
}

#[test]
fn char_access_is_one_based() {
    let mut vm = test_vm();
    assert_eq!(vm.doit(r#""abc" at: 2"#).unwrap(), Val::str("b"));
    assert!(vm.doit(r#""abc" at: 0"#).is_err());
    assert!(vm.doit(r#""abc" at: 4"#).is_err());
}

#[test]
fn trimming_and_parsing() {
    let mut vm = test_vm();
    assert_eq!(vm.doit(r#""  pad  " trimmed"#).unwrap(), Val::str("pad"));
    assert_eq!(vm.doit(r#""42" asInteger"#).unwrap(), Val::Int(42));
    assert!(vm.doit(r#""nope" asInteger"#).is_err());
}

#[test]
fn concatenation_chains() {
    let mut vm = test_vm();
    assert_eq!(
        vm.doit(r#""a" , "b" , "c""#).unwrap(),
        Val::str("abc")
    );
}
