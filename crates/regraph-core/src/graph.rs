//! Attributed graph primitives: nodes and edges each carry an attribute
//! bag, on top of plain directed-or-undirected adjacency.
//!
//! No off-the-shelf graph library does attribute-subsumption in the Rust
//! ecosystem, so this is implemented here as a small, deliberately minimal
//! leaf module that the category operations, rule model, and hierarchy are
//! built on top of.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value::{AttrBag, AttrBagExt, Value};

/// A directed or undirected graph whose node and edge identifiers are
/// opaque `Value`s, each carrying a normalized attribute bag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Graph {
    directed: bool,
    nodes: BTreeMap<Value, AttrBag>,
    edges: BTreeMap<(Value, Value), AttrBag>,
}

impl Graph {
    pub fn new(directed: bool) -> Self {
        Graph {
            directed,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, n: &Value) -> bool {
        self.nodes.contains_key(n)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Value> {
        self.nodes.keys()
    }

    pub fn node_attrs(&self, n: &Value) -> Option<&AttrBag> {
        self.nodes.get(n)
    }

    pub fn add_node(&mut self, n: Value, mut attrs: AttrBag) {
        attrs.normalize();
        self.nodes.insert(n, attrs);
    }

    /// Remove a node and every edge incident to it.
    pub fn remove_node(&mut self, n: &Value) {
        self.nodes.remove(n);
        self.edges.retain(|(u, v), _| u != n && v != n);
    }

    pub fn add_node_attrs(&mut self, n: &Value, new_attrs: &AttrBag) {
        if let Some(bag) = self.nodes.get_mut(n) {
            *bag = bag.union_with(new_attrs);
        }
    }

    /// Silent no-op on attribute keys that don't exist.
    pub fn remove_node_attrs(&mut self, n: &Value, attrs_to_remove: &AttrBag) {
        if let Some(bag) = self.nodes.get_mut(n) {
            for (k, vs) in attrs_to_remove {
                if let Some(existing) = bag.get_mut(k) {
                    for v in vs {
                        existing.remove(v);
                    }
                }
            }
            bag.normalize();
        }
    }

    fn canon(&self, u: &Value, v: &Value) -> (Value, Value) {
        if !self.directed && v < u {
            (v.clone(), u.clone())
        } else {
            (u.clone(), v.clone())
        }
    }

    pub fn has_edge(&self, u: &Value, v: &Value) -> bool {
        self.edges.contains_key(&(u.clone(), v.clone()))
            || (!self.directed && self.edges.contains_key(&(v.clone(), u.clone())))
    }

    pub fn edge_attrs(&self, u: &Value, v: &Value) -> Option<&AttrBag> {
        self.edges
            .get(&(u.clone(), v.clone()))
            .or_else(|| {
                if !self.directed {
                    self.edges.get(&(v.clone(), u.clone()))
                } else {
                    None
                }
            })
    }

    pub fn add_edge(&mut self, u: Value, v: Value, mut attrs: AttrBag) {
        attrs.normalize();
        let key = self.canon(&u, &v);
        self.edges.insert(key, attrs);
    }

    pub fn remove_edge(&mut self, u: &Value, v: &Value) {
        self.edges.remove(&(u.clone(), v.clone()));
        if !self.directed {
            self.edges.remove(&(v.clone(), u.clone()));
        }
    }

    pub fn add_edge_attrs(&mut self, u: &Value, v: &Value, new_attrs: &AttrBag) {
        let key = self.canon(u, v);
        if let Some(bag) = self.edges.get_mut(&key) {
            *bag = bag.union_with(new_attrs);
        }
    }

    /// Silent no-op on attribute keys that don't exist.
    /// Removes attribute values only; never removes the edge itself.
    pub fn remove_edge_attrs_values(&mut self, u: &Value, v: &Value, attrs_to_remove: &AttrBag) {
        let key = self.canon(u, v);
        if let Some(bag) = self.edges.get_mut(&key) {
            for (k, vs) in attrs_to_remove {
                if let Some(existing) = bag.get_mut(k) {
                    for v in vs {
                        existing.remove(v);
                    }
                }
            }
            bag.normalize();
        }
    }

    /// Iterate edges exactly as stored (canonicalized once on insertion for
    /// undirected graphs; each undirected edge yielded once).
    pub fn edges(&self) -> impl Iterator<Item = (&Value, &Value, &AttrBag)> {
        self.edges.iter().map(|((u, v), a)| (u, v, a))
    }

    /// Structural clone: add a new node with the same attributes as `old`
    /// and duplicate every edge incident to `old` so that it is also
    /// incident to `new` (same direction, same attributes). Used by
    /// pullback-complement's clone step and `Rule::inject_clone_node`.
    pub fn clone_node(&mut self, old: &Value, new: Value) {
        let attrs = self.nodes.get(old).cloned().unwrap_or_default();
        self.add_node(new.clone(), attrs);
        let incident: Vec<(Value, Value, AttrBag)> = self
            .edges
            .iter()
            .filter(|((u, v), _)| u == old || v == old)
            .map(|((u, v), a)| (u.clone(), v.clone(), a.clone()))
            .collect();
        for (u, v, a) in incident {
            let (nu, nv) = (
                if &u == old { new.clone() } else { u },
                if &v == old { new.clone() } else { v },
            );
            self.add_edge(nu, nv, a);
        }
    }

    /// The subgraph induced by `keep`, with all attributes preserved. Used
    /// by `Hierarchy::add_partial_typing` to synthesize the restricted
    /// source subgraph.
    pub fn restrict(&self, keep: &BTreeSet<Value>) -> Graph {
        let mut out = Graph::new(self.directed);
        for n in keep {
            if let Some(a) = self.nodes.get(n) {
                out.add_node(n.clone(), a.clone());
            }
        }
        for ((u, v), a) in &self.edges {
            if keep.contains(u) && keep.contains(v) {
                out.add_edge(u.clone(), v.clone(), a.clone());
            }
        }
        out
    }

    /// Produce a graph with nodes and edges renamed under `mapping`
    /// (which must be injective over this graph's node set).
    pub fn relabeled(&self, mapping: &BTreeMap<Value, Value>) -> Graph {
        let mut out = Graph::new(self.directed);
        for (n, a) in &self.nodes {
            let new_n = mapping.get(n).cloned().unwrap_or_else(|| n.clone());
            out.add_node(new_n, a.clone());
        }
        for ((u, v), a) in &self.edges {
            let nu = mapping.get(u).cloned().unwrap_or_else(|| u.clone());
            let nv = mapping.get(v).cloned().unwrap_or_else(|| v.clone());
            out.add_edge(nu, nv, a.clone());
        }
        out
    }
}

impl PartialEq for Graph {
    /// Structural equality up to the ordered representation: same
    /// directedness, same node set with same attrs, same edge set with
    /// same attrs. Used by the JSON round-trip tests.
    fn eq(&self, other: &Self) -> bool {
        self.directed == other.directed && self.nodes == other.nodes && self.edges == other.edges
    }
}
impl Eq for Graph {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::attrs;

    #[test]
    fn undirected_edge_lookup_is_symmetric() {
        let mut g = Graph::new(false);
        g.add_node(Value::from("a"), AttrBag::new());
        g.add_node(Value::from("b"), AttrBag::new());
        g.add_edge(Value::from("a"), Value::from("b"), AttrBag::new());
        assert!(g.has_edge(&Value::from("a"), &Value::from("b")));
        assert!(g.has_edge(&Value::from("b"), &Value::from("a")));
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut g = Graph::new(true);
        g.add_node(Value::from("a"), AttrBag::new());
        g.add_node(Value::from("b"), AttrBag::new());
        g.add_edge(Value::from("a"), Value::from("b"), AttrBag::new());
        g.remove_node(&Value::from("a"));
        assert!(!g.has_edge(&Value::from("a"), &Value::from("b")));
    }

    #[test]
    fn clone_node_duplicates_incident_edges() {
        let mut g = Graph::new(true);
        g.add_node(Value::from(1i64), attrs(vec![("k", vec![Value::from("v")])]));
        g.add_node(Value::from(2i64), AttrBag::new());
        g.add_edge(Value::from(1i64), Value::from(2i64), AttrBag::new());
        g.clone_node(&Value::from(1i64), Value::from("1_clone"));
        assert!(g.has_edge(&Value::from("1_clone"), &Value::from(2i64)));
        assert_eq!(
            g.node_attrs(&Value::from("1_clone")),
            g.node_attrs(&Value::from(1i64))
        );
    }
}
