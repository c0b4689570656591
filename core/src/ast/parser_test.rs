use std::rc::Rc;

use super::*;
use crate::val::Val;

fn parse(src: &str) -> Vec<Rc<Node>> {
    Parser::parse_source(src).unwrap()
}

fn parse_one(src: &str) -> Rc<Node> {
    let mut stmts = parse(src);
    assert_eq!(stmts.len(), 1, "expected a single statement");
    stmts.pop().unwrap()
}

fn selector_of(node: &Node) -> &str {
    match node {
        Node::Message { selector, .. } => selector,
        other => panic!("not a message: {:?}", other),
    }
}

#[test]
fn unary_chain_nests_leftward() {
    let node = parse_one("3 negated abs");
    assert_eq!(selector_of(&node), "abs");
    let Node::Message { receiver: Some(inner), .. } = node.as_ref() else {
        panic!();
    };
    assert_eq!(selector_of(inner), "negated");
}

#[test]
fn binary_before_keyword() {
    let node = parse_one("1 max: 2 + 3");
    let Node::Message { selector, args, .. } = node.as_ref() else {
        panic!();
    };
    assert_eq!(selector.as_ref(), "max:");
    assert_eq!(selector_of(&args[0]), "+");
}

#[test]
fn keyword_selector_concatenates() {
    let node = parse_one("p moveBy: 1 and: 2");
    assert_eq!(selector_of(&node), "moveBy:and:");
}

#[test]
fn assignment_chains_right() {
    let node = parse_one("a := b := 1");
    let Node::Assign { name, expr } = node.as_ref() else {
        panic!();
    };
    assert_eq!(name.as_ref(), "a");
    assert!(matches!(expr.as_ref(), Node::Assign { .. }));
}

#[test]
fn cascade_reuses_the_receiver() {
    let node = parse_one(r#"t show: "a"; show: "b"; cr"#);
    let Node::Cascade { receiver, messages } = node.as_ref() else {
        panic!("not a cascade");
    };
    assert!(matches!(receiver.as_ref(), Node::Ident(n) if n.as_ref() == "t"));
    let sels: Vec<&str> = messages.iter().map(|m| m.selector.as_ref()).collect();
    assert_eq!(sels, vec!["show:", "show:", "cr"]);
}

#[test]
fn cascade_receiver_is_of_the_last_message() {
    // `a foo bar; baz` resends to `a foo`, not to `a`.
    let node = parse_one("a foo bar; baz");
    let Node::Cascade { receiver, messages } = node.as_ref() else {
        panic!("not a cascade");
    };
    assert_eq!(selector_of(receiver), "foo");
    assert_eq!(messages[0].selector.as_ref(), "bar");
    assert_eq!(messages[1].selector.as_ref(), "baz");
}

#[test]
fn block_with_params_and_temps() {
    let node = parse_one("[:a :b | | t | t := a. t]");
    let Node::Block(template) = node.as_ref() else {
        panic!();
    };
    assert_eq!(template.parameters.len(), 2);
    assert_eq!(template.temporaries.len(), 1);
    assert_eq!(template.body.len(), 2);
    assert!(!template.is_method);
}

#[test]
fn return_statement_forms() {
    assert!(matches!(
        parse_one("^ 5").as_ref(),
        Node::Return(Some(_))
    ));
    let stmts = parse("[^. 1] value");
    assert_eq!(stmts.len(), 1);
}

#[test]
fn method_definition_desugars_to_selector_put() {
    let node = parse_one("Point >> moveBy: dx and: dy [ ^ self ]");
    let Node::Message {
        receiver: Some(receiver),
        selector,
        args,
    } = node.as_ref()
    else {
        panic!();
    };
    assert!(matches!(receiver.as_ref(), Node::Ident(n) if n.as_ref() == "Point"));
    assert_eq!(selector.as_ref(), "selector:put:");
    assert_eq!(
        args[0].as_ref(),
        &Node::Literal(Val::symbol("moveBy:and:"))
    );
    let Node::Block(template) = args[1].as_ref() else {
        panic!();
    };
    assert!(template.is_method);
    assert_eq!(template.parameters.len(), 2);
}

#[test]
fn class_side_method_definition() {
    let node = parse_one("Point class >> origin [ ^ self new ]");
    assert_eq!(selector_of(&node), "classSelector:put:");
}

#[test]
fn binary_method_definition() {
    let node = parse_one("Vec >> + other [ ^ other ]");
    let Node::Message { args, .. } = node.as_ref() else {
        panic!();
    };
    assert_eq!(args[0].as_ref(), &Node::Literal(Val::symbol("+")));
}

#[test]
fn primitive_marker() {
    let node = parse_one(r#"Num >> sqrt [ <primitive: "numberSqrt"> ^ 0 ]"#);
    let Node::Message { args, .. } = node.as_ref() else {
        panic!();
    };
    let Node::Block(template) = args[1].as_ref() else {
        panic!();
    };
    let Node::Primitive { name, fallback } = template.body[0].as_ref() else {
        panic!("expected primitive body, got {:?}", template.body[0]);
    };
    assert_eq!(name.as_ref(), "numberSqrt");
    assert_eq!(fallback.len(), 1);
}

#[test]
fn super_sends() {
    let node = parse_one("A >> foo [ ^ super foo ]");
    let Node::Message { args, .. } = node.as_ref() else {
        panic!();
    };
    let Node::Block(template) = args[1].as_ref() else {
        panic!();
    };
    let Node::Return(Some(ret)) = template.body[0].as_ref() else {
        panic!();
    };
    let Node::SuperSend { selector, qualifier, .. } = ret.as_ref() else {
        panic!("expected super send, got {:?}", ret);
    };
    assert_eq!(selector.as_ref(), "foo");
    assert!(qualifier.is_none());
}

#[test]
fn qualified_super_send() {
    let stmts = parse("A >> foo [ ^ super<B> foo ]");
    let Node::Message { args, .. } = stmts[0].as_ref() else {
        panic!();
    };
    let Node::Block(template) = args[1].as_ref() else {
        panic!();
    };
    let Node::Return(Some(ret)) = template.body[0].as_ref() else {
        panic!();
    };
    let Node::SuperSend { qualifier, .. } = ret.as_ref() else {
        panic!();
    };
    assert_eq!(qualifier.as_deref(), Some("B"));
}

#[test]
fn bare_super_is_rejected() {
    assert!(Parser::parse_source("x := super").is_err());
}

#[test]
fn literal_arrays_desugar_to_fresh_builders() {
    let node = parse_one("#(1 two \"three\" #(4))");
    let Node::Array(elements) = node.as_ref() else {
        panic!();
    };
    assert_eq!(elements[0].as_ref(), &Node::Literal(Val::Int(1)));
    assert_eq!(elements[1].as_ref(), &Node::Literal(Val::symbol("two")));
    assert_eq!(elements[2].as_ref(), &Node::Literal(Val::str("three")));
    assert!(matches!(elements[3].as_ref(), Node::Array(_)));
}

#[test]
fn table_literal_entries() {
    let node = parse_one(r#"#{"a" -> 1. "b" -> 2}"#);
    let Node::Table(entries) = node.as_ref() else {
        panic!();
    };
    assert_eq!(entries.len(), 2);
}

#[test]
fn dynamic_array_evaluates_statements() {
    let node = parse_one("{1 + 1. x}");
    let Node::Array(elements) = node.as_ref() else {
        panic!();
    };
    assert_eq!(elements.len(), 2);
    assert_eq!(selector_of(&elements[0]), "+");
}

#[test]
fn pseudo_variables() {
    assert_eq!(parse_one("nil").as_ref(), &Node::PseudoVar(PseudoVar::Nil));
    assert_eq!(parse_one("true").as_ref(), &Node::PseudoVar(PseudoVar::True));
    assert_eq!(
        parse_one("self").as_ref(),
        &Node::PseudoVar(PseudoVar::SelfRef)
    );
}

#[test]
fn trailing_garbage_is_an_error() {
    assert!(Parser::parse_source("1 + 2 )").is_err());
    assert!(Parser::parse_source("[1").is_err());
}
