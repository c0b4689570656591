use std::cmp::Ordering;

use super::Val;

#[test]
fn numeric_widening() {
    assert_eq!((&Val::Int(1) + &Val::Int(2)).unwrap(), Val::Int(3));
    assert_eq!((&Val::Int(1) + &Val::Float(0.5)).unwrap(), Val::Float(1.5));
    assert_eq!((&Val::Float(2.0) * &Val::Int(3)).unwrap(), Val::Float(6.0));
}

#[test]
fn checked_arithmetic_overflows_to_error() {
    let err = (&Val::Int(i64::MAX) + &Val::Int(1)).unwrap_err();
    assert!(err.message.contains("overflow"));
    let err = (&Val::Int(i64::MAX) * &Val::Int(2)).unwrap_err();
    assert!(err.message.contains("overflow"));
}

#[test]
fn division_rules() {
    assert_eq!((&Val::Int(6) / &Val::Int(2)).unwrap(), Val::Int(3));
    assert_eq!((&Val::Int(7) / &Val::Int(2)).unwrap(), Val::Float(3.5));
    assert!((&Val::Int(1) / &Val::Int(0)).is_err());
    assert!((&Val::Float(1.0) / &Val::Int(0)).is_err());
}

#[test]
fn int_div_and_modulo_require_integers() {
    assert_eq!(Val::Int(7).int_div(&Val::Int(2)).unwrap(), Val::Int(3));
    assert_eq!(Val::Int(-7).int_div(&Val::Int(2)).unwrap(), Val::Int(-4));
    assert_eq!(Val::Int(7).modulo(&Val::Int(2)).unwrap(), Val::Int(1));
    assert_eq!(Val::Int(-7).modulo(&Val::Int(2)).unwrap(), Val::Int(1));
    assert!(Val::Float(7.0).int_div(&Val::Int(2)).is_err());
    assert!(Val::Int(7).modulo(&Val::Float(2.0)).is_err());
    assert!(Val::Int(7).modulo(&Val::Int(0)).is_err());
}

#[test]
fn structural_equality_for_primitives() {
    assert_eq!(Val::Int(3), Val::Int(3));
    assert_eq!(Val::Int(3), Val::Float(3.0));
    assert_eq!(Val::str("abc"), Val::str("abc"));
    assert_ne!(Val::str("abc"), Val::symbol("abc"));
    assert_ne!(Val::Bool(true), Val::Int(1));
}

#[test]
fn identity_for_heap_values() {
    let a = Val::array(vec![Val::Int(1)]);
    let b = Val::array(vec![Val::Int(1)]);
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
    assert!(a.identical(&a.clone()));
    assert!(!a.identical(&b));
    // Identity does not widen across Int/Float.
    assert!(!Val::Int(3).identical(&Val::Float(3.0)));
}

#[test]
fn comparison_widens() {
    assert_eq!(Val::Int(1).compare(&Val::Float(1.5)).unwrap(), Ordering::Less);
    assert_eq!(Val::str("a").compare(&Val::str("b")).unwrap(), Ordering::Less);
    assert!(Val::str("a").compare(&Val::Int(1)).is_err());
}

#[test]
fn print_strings() {
    assert_eq!(Val::Int(42).print_string(), "42");
    assert_eq!(Val::Float(1.5).print_string(), "1.5");
    assert_eq!(Val::str("hi").print_string(), "\"hi\"");
    assert_eq!(Val::str("hi").display_string(), "hi");
    assert_eq!(Val::symbol("foo").print_string(), "#foo");
    assert_eq!(
        Val::array(vec![Val::Int(1), Val::str("x")]).print_string(),
        "#(1 \"x\")"
    );
    assert_eq!(Val::Nil.print_string(), "nil");
}
