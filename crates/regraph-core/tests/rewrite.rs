//! Exercises `Hierarchy::rewrite`'s backward propagation across a small
//! chain of typings.

use std::collections::BTreeMap;

use regraph_core::{AttrBag, Graph, Hierarchy, Mapping, Rule, Value};

fn chain_graph(n: i64) -> Graph {
    let mut g = Graph::new(true);
    g.add_node(Value::from(n), AttrBag::new());
    g
}

fn identity_mapping(n: i64) -> Mapping {
    let mut m = Mapping::new();
    m.insert(Value::from(n), Value::from(n));
    m
}

#[test]
fn rewrite_propagates_a_deletion_through_every_ancestor() {
    let mut h = Hierarchy::new(true);
    h.add_graph(Value::from("a"), chain_graph(1), AttrBag::new()).unwrap();
    h.add_graph(Value::from("b"), chain_graph(1), AttrBag::new()).unwrap();
    h.add_graph(Value::from("c"), chain_graph(1), AttrBag::new()).unwrap();
    h.add_typing(&Value::from("a"), &Value::from("b"), identity_mapping(1), false, AttrBag::new()).unwrap();
    h.add_typing(&Value::from("b"), &Value::from("c"), identity_mapping(1), false, AttrBag::new()).unwrap();

    let pattern = chain_graph(1);
    let mut rule = Rule::identity(&pattern);
    rule.inject_remove_node(&Value::from(1i64));

    h.rewrite(
        &Value::from("c"),
        &identity_mapping(1),
        &rule,
        &BTreeMap::new(),
        &BTreeMap::new(),
    )
    .unwrap();

    assert!(!h.graph(&Value::from("c")).unwrap().has_node(&Value::from(1i64)));
    assert!(!h.graph(&Value::from("b")).unwrap().has_node(&Value::from(1i64)));
    assert!(!h.graph(&Value::from("a")).unwrap().has_node(&Value::from(1i64)));

    // the two remaining typing edges must still be valid homomorphisms,
    // even though both ancestors lost the same node.
    let typings = h.typings();
    assert_eq!(typings.len(), 2);
    for (from, to, mapping, ignore_attrs, _attrs) in typings {
        regraph_core::check_hom(h.graph(&from).unwrap(), h.graph(&to).unwrap(), &mapping, ignore_attrs).unwrap();
    }
}

#[test]
fn rewrite_on_a_rule_id_is_rejected() {
    let mut h = Hierarchy::new(true);
    let pattern = chain_graph(1);
    let rule = Rule::identity(&pattern);
    h.add_rule(Value::from("r"), rule.clone(), AttrBag::new()).unwrap();

    let err = h
        .rewrite(&Value::from("r"), &identity_mapping(1), &rule, &BTreeMap::new(), &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, regraph_core::Error::WrongNodeKind(_)));
}
