//! Round-trips a small typed hierarchy through the JSON wire format and
//! checks node sets, edge sets, attribute bags, and typing mappings all
//! survive the trip.

use regraph_core::{attrs, AttrBag, Graph, Hierarchy, Mapping, Value};

#[test]
fn export_then_load_preserves_a_typed_hierarchy() {
    let mut h = Hierarchy::new(true);

    let mut concrete = Graph::new(true);
    concrete.add_node(Value::from(1i64), attrs(vec![("color", vec![Value::from("red")])]));
    concrete.add_node(Value::from(2i64), AttrBag::new());
    concrete.add_edge(Value::from(1i64), Value::from(2i64), AttrBag::new());
    h.add_graph(Value::from("concrete"), concrete, AttrBag::new()).unwrap();

    let mut meta = Graph::new(true);
    meta.add_node(Value::from("node"), AttrBag::new());
    h.add_graph(Value::from("meta"), meta, AttrBag::new()).unwrap();

    let mut typing = Mapping::new();
    typing.insert(Value::from(1i64), Value::from("node"));
    typing.insert(Value::from(2i64), Value::from("node"));
    h.add_typing(&Value::from("concrete"), &Value::from("meta"), typing, false, AttrBag::new()).unwrap();

    let dir = std::env::temp_dir().join(format!("regraph-test-{}", std::process::id()));
    h.export(&dir).unwrap();
    let reloaded = Hierarchy::load(&dir).unwrap();
    std::fs::remove_file(&dir).ok();

    assert_eq!(reloaded.node_ids(), h.node_ids());
    assert_eq!(reloaded.graph(&Value::from("concrete")).unwrap(), h.graph(&Value::from("concrete")).unwrap());
    assert_eq!(reloaded.graph(&Value::from("meta")).unwrap(), h.graph(&Value::from("meta")).unwrap());

    let original_typings = h.typings();
    let reloaded_typings = reloaded.typings();
    assert_eq!(original_typings.len(), 1);
    assert_eq!(original_typings, reloaded_typings);
}
