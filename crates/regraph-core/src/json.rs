//! The on-disk wire format: a single JSON document listing every graph,
//! rule, typing, and rule-typing in a [`Hierarchy`], round-tripped through
//! `serde_json`. Node/edge order in the arrays is irrelevant to equality,
//! since everything is reassembled into the same `BTreeMap`/`BTreeSet`
//! structures `Hierarchy` itself uses.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::graph::Graph;
use crate::hierarchy::Hierarchy;
use crate::hom::Mapping;
use crate::rule::Rule;
use crate::value::{AttrBag, Value};

#[derive(Serialize, Deserialize)]
struct NodeEntry {
    id: Value,
    #[serde(default)]
    attrs: AttrBag,
}

#[derive(Serialize, Deserialize)]
struct EdgeEntry {
    from: Value,
    to: Value,
    #[serde(default)]
    attrs: AttrBag,
}

#[derive(Serialize, Deserialize)]
struct GraphDoc {
    nodes: Vec<NodeEntry>,
    edges: Vec<EdgeEntry>,
}

impl GraphDoc {
    fn from_graph(g: &Graph) -> Self {
        GraphDoc {
            nodes: g
                .nodes()
                .map(|n| NodeEntry { id: n.clone(), attrs: g.node_attrs(n).cloned().unwrap_or_default() })
                .collect(),
            edges: g
                .edges()
                .map(|(u, v, a)| EdgeEntry { from: u.clone(), to: v.clone(), attrs: a.clone() })
                .collect(),
        }
    }

    fn into_graph(self, directed: bool) -> Graph {
        let mut g = Graph::new(directed);
        for n in self.nodes {
            g.add_node(n.id, n.attrs);
        }
        for e in self.edges {
            g.add_edge(e.from, e.to, e.attrs);
        }
        g
    }
}

#[derive(Serialize, Deserialize)]
struct GraphEntry {
    id: Value,
    graph: GraphDoc,
    #[serde(default)]
    attrs: AttrBag,
}

#[derive(Serialize, Deserialize)]
struct RuleEntry {
    id: Value,
    lhs: GraphDoc,
    p: GraphDoc,
    rhs: GraphDoc,
    p_lhs: Mapping,
    p_rhs: Mapping,
    #[serde(default)]
    attrs: AttrBag,
}

#[derive(Serialize, Deserialize)]
struct TypingEntry {
    from: Value,
    to: Value,
    mapping: Mapping,
    #[serde(default)]
    ignore_attrs: bool,
    #[serde(default)]
    attrs: AttrBag,
}

#[derive(Serialize, Deserialize)]
struct RuleTypingEntry {
    from: Value,
    to: Value,
    lhs_mapping: Mapping,
    rhs_mapping: Mapping,
    #[serde(default)]
    ignore_attrs: bool,
    #[serde(default)]
    attrs: AttrBag,
}

#[derive(Serialize, Deserialize)]
struct HierarchyDoc {
    directed: bool,
    graphs: Vec<GraphEntry>,
    rules: Vec<RuleEntry>,
    typing: Vec<TypingEntry>,
    rule_typing: Vec<RuleTypingEntry>,
}

impl Hierarchy {
    /// Serialize this hierarchy to the wire schema as a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        let doc = HierarchyDoc {
            directed: self.is_directed(),
            graphs: self
                .node_ids()
                .into_iter()
                .map(|id| GraphEntry {
                    graph: GraphDoc::from_graph(self.graph(&id).expect("node_ids returned a graph id")),
                    attrs: self.graph_attrs(&id).expect("node_ids returned a graph id").clone(),
                    id,
                })
                .collect(),
            rules: self
                .rule_ids()
                .into_iter()
                .map(|id| {
                    let rule = self.rule(&id).expect("rule_ids returned a rule id");
                    RuleEntry {
                        lhs: GraphDoc::from_graph(&rule.lhs),
                        p: GraphDoc::from_graph(&rule.p),
                        rhs: GraphDoc::from_graph(&rule.rhs),
                        p_lhs: rule.p_lhs.clone(),
                        p_rhs: rule.p_rhs.clone(),
                        attrs: self.rule_attrs(&id).expect("rule_ids returned a rule id").clone(),
                        id,
                    }
                })
                .collect(),
            typing: self
                .typings()
                .into_iter()
                .map(|(from, to, mapping, ignore_attrs, attrs)| TypingEntry { from, to, mapping, ignore_attrs, attrs })
                .collect(),
            rule_typing: self
                .rule_typings()
                .into_iter()
                .map(|(from, to, lhs_mapping, rhs_mapping, ignore_attrs, attrs)| RuleTypingEntry {
                    from,
                    to,
                    lhs_mapping,
                    rhs_mapping,
                    ignore_attrs,
                    attrs,
                })
                .collect(),
        };
        serde_json::to_value(doc).expect("HierarchyDoc serialization is infallible")
    }

    /// Write this hierarchy to `path` as pretty-printed JSON.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let json = self.to_json();
        let text = serde_json::to_string_pretty(&json)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Read a hierarchy previously written by [`Hierarchy::export`] (or any
    /// document matching the wire schema) from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Hierarchy, Error> {
        let text = std::fs::read_to_string(path)?;
        let doc: HierarchyDoc = serde_json::from_str(&text)?;
        Self::from_doc(doc)
    }

    /// Parse a hierarchy from an already-decoded `serde_json::Value`.
    pub fn from_json(value: serde_json::Value) -> Result<Hierarchy, Error> {
        let doc: HierarchyDoc = serde_json::from_value(value)?;
        Self::from_doc(doc)
    }

    fn from_doc(doc: HierarchyDoc) -> Result<Hierarchy, Error> {
        let mut h = Hierarchy::new(doc.directed);
        for g in doc.graphs {
            h.add_graph(g.id, g.graph.into_graph(doc.directed), g.attrs)?;
        }
        for r in doc.rules {
            let rule = Rule::new(
                r.lhs.into_graph(doc.directed),
                r.p.into_graph(doc.directed),
                r.rhs.into_graph(doc.directed),
                r.p_lhs,
                r.p_rhs,
            )?;
            h.add_rule(r.id, rule, r.attrs)?;
        }
        for t in doc.typing {
            h.add_typing(&t.from, &t.to, t.mapping, t.ignore_attrs, t.attrs)?;
        }
        for rt in doc.rule_typing {
            h.add_rule_typing(&rt.from, &rt.to, rt.lhs_mapping, rt.rhs_mapping, rt.ignore_attrs, rt.attrs)?;
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::attrs as attr_bag;

    #[test]
    fn round_trips_a_typed_graph() {
        let mut h = Hierarchy::new(true);
        let mut g0 = Graph::new(true);
        g0.add_node(Value::from("a"), AttrBag::new());
        let mut g1 = Graph::new(true);
        g1.add_node(Value::from(1i64), attr_bag(vec![("color", vec![Value::from("red")])]));
        h.add_graph(Value::from("g0"), g0, AttrBag::new()).unwrap();
        h.add_graph(Value::from("g1"), g1, AttrBag::new()).unwrap();
        let mut m = Mapping::new();
        m.insert(Value::from(1i64), Value::from("a"));
        h.add_typing(&Value::from("g1"), &Value::from("g0"), m, false, AttrBag::new()).unwrap();

        let json = h.to_json();
        let reloaded = Hierarchy::from_json(json).unwrap();
        assert_eq!(reloaded.graph(&Value::from("g1")).unwrap(), h.graph(&Value::from("g1")).unwrap());
        assert_eq!(reloaded.graph(&Value::from("g0")).unwrap(), h.graph(&Value::from("g0")).unwrap());
        assert_eq!(reloaded.node_type(&Value::from("g1"), &Value::from(1i64)).unwrap(), vec![Value::from("a")]);
    }

    #[test]
    fn round_trips_a_rule() {
        let mut h = Hierarchy::new(true);
        let mut pattern = Graph::new(true);
        pattern.add_node(Value::from(1i64), AttrBag::new());
        let rule = Rule::from_transform(&pattern, Some("delete_node 1.")).unwrap();
        h.add_rule(Value::from("r1"), rule, AttrBag::new()).unwrap();

        let json = h.to_json();
        let reloaded = Hierarchy::from_json(json).unwrap();
        assert!(reloaded.rule(&Value::from("r1")).unwrap().removed_nodes().contains(&Value::from(1i64)));
    }
}
