//! The typing hierarchy: a DAG of graphs and rules linked by typing
//! homomorphisms.
//!
//! Acyclicity is enforced by `daggy::Dag::add_edge`, which refuses any edge
//! that would close a cycle. Path commutation is checked by hand below,
//! since `daggy` has no notion of it.

use std::collections::BTreeMap;
use std::fmt;

use daggy::petgraph::Direction;
use daggy::{Dag, NodeIndex};

use crate::error::Error;
use crate::graph::Graph;
use crate::hom::{check_hom, compose, keys_by_value, Mapping};
use crate::rule::Rule;
use crate::value::{fresh_name, AttrBag, AttrBagExt, Value};

#[derive(Clone, Debug)]
pub(crate) enum HNode {
    Graph { id: Value, graph: Graph, attrs: AttrBag },
    Rule { id: Value, rule: Rule, attrs: AttrBag },
}

impl HNode {
    pub(crate) fn id(&self) -> &Value {
        match self {
            HNode::Graph { id, .. } => id,
            HNode::Rule { id, .. } => id,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum HEdge {
    Typing {
        mapping: Mapping,
        ignore_attrs: bool,
        attrs: AttrBag,
    },
    RuleTyping {
        lhs_mapping: Mapping,
        rhs_mapping: Mapping,
        ignore_attrs: bool,
        attrs: AttrBag,
    },
}

/// A DAG of typed graphs and rules, linked by typing homomorphisms that
/// must stay commuting as the hierarchy grows.
pub struct Hierarchy {
    directed: bool,
    pub(crate) dag: Dag<HNode, HEdge, u32>,
    pub(crate) ids: BTreeMap<Value, NodeIndex<u32>>,
}

impl Hierarchy {
    pub fn new(directed: bool) -> Self {
        Hierarchy {
            directed,
            dag: Dag::new(),
            ids: BTreeMap::new(),
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub(crate) fn idx(&self, id: &Value) -> Result<NodeIndex<u32>, Error> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownId(id.to_string()))
    }

    pub(crate) fn node(&self, idx: NodeIndex<u32>) -> &HNode {
        &self.dag[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex<u32>) -> &mut HNode {
        &mut self.dag[idx]
    }

    pub(crate) fn graph_at(&self, idx: NodeIndex<u32>) -> Result<&Graph, Error> {
        match self.node(idx) {
            HNode::Graph { graph, .. } => Ok(graph),
            HNode::Rule { id, .. } => Err(Error::WrongNodeKind(format!("{id} is a rule, not a graph"))),
        }
    }

    pub(crate) fn rule_at(&self, idx: NodeIndex<u32>) -> Result<&Rule, Error> {
        match self.node(idx) {
            HNode::Rule { rule, .. } => Ok(rule),
            HNode::Graph { id, .. } => Err(Error::WrongNodeKind(format!("{id} is a graph, not a rule"))),
        }
    }

    pub fn graph(&self, id: &Value) -> Result<&Graph, Error> {
        self.graph_at(self.idx(id)?)
    }

    pub fn rule(&self, id: &Value) -> Result<&Rule, Error> {
        self.rule_at(self.idx(id)?)
    }

    pub fn has_id(&self, id: &Value) -> bool {
        self.ids.contains_key(id)
    }

    // -- construction ------------------------------------------------------

    pub fn add_graph(&mut self, id: Value, graph: Graph, attrs: AttrBag) -> Result<(), Error> {
        if self.ids.contains_key(&id) {
            return Err(Error::IdConflict(id.to_string()));
        }
        if graph.is_directed() != self.directed {
            return Err(Error::DirectednessMismatch {
                hierarchy_directed: self.directed,
                graph_directed: graph.is_directed(),
            });
        }
        log::debug!("adding graph node {id} ({} nodes)", graph.nodes().count());
        let idx = self.dag.add_node(HNode::Graph { id: id.clone(), graph, attrs });
        self.ids.insert(id, idx);
        Ok(())
    }

    pub fn add_rule(&mut self, id: Value, rule: Rule, attrs: AttrBag) -> Result<(), Error> {
        if self.ids.contains_key(&id) {
            return Err(Error::IdConflict(id.to_string()));
        }
        for g in [&rule.lhs, &rule.p, &rule.rhs] {
            if g.is_directed() != self.directed {
                return Err(Error::DirectednessMismatch {
                    hierarchy_directed: self.directed,
                    graph_directed: g.is_directed(),
                });
            }
        }
        log::debug!("adding rule node {id}");
        let idx = self.dag.add_node(HNode::Rule { id: id.clone(), rule, attrs });
        self.ids.insert(id, idx);
        Ok(())
    }

    /// Any already-accepted mapping from `src` to `tgt` along an existing
    /// path (composed edge-by-edge), used to check path commutation.
    /// Checking one (shortest) path suffices: if any path disagreed with
    /// another, the hierarchy's existing edges would already be
    /// inconsistent with each other, which earlier `add_typing` calls rule
    /// out.
    fn existing_composed_mapping(&self, src: NodeIndex<u32>, tgt: NodeIndex<u32>) -> Option<Mapping> {
        if src == tgt {
            let ids: Mapping = match self.node(src) {
                HNode::Graph { graph, .. } => graph.nodes().map(|n| (n.clone(), n.clone())).collect(),
                HNode::Rule { .. } => return None,
            };
            return Some(ids);
        }
        let start_ids: Mapping = match self.node(src) {
            HNode::Graph { graph, .. } => graph.nodes().map(|n| (n.clone(), n.clone())).collect(),
            HNode::Rule { .. } => return None,
        };
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((src, start_ids));
        let mut visited = std::collections::BTreeSet::new();
        visited.insert(src);
        while let Some((at, acc)) = queue.pop_front() {
            for edge in self.dag.graph().edges_directed(at, Direction::Outgoing) {
                let next = edge.target();
                let mapping = match edge.weight() {
                    HEdge::Typing { mapping, .. } => mapping,
                    HEdge::RuleTyping { .. } => continue,
                };
                let composed = compose(&acc, mapping);
                if next == tgt {
                    return Some(composed);
                }
                if visited.insert(next) {
                    queue.push_back((next, composed));
                }
            }
        }
        None
    }

    pub fn add_typing(
        &mut self,
        src: &Value,
        tgt: &Value,
        mapping: Mapping,
        ignore_attrs: bool,
        attrs: AttrBag,
    ) -> Result<(), Error> {
        let src_idx = self.idx(src)?;
        let tgt_idx = self.idx(tgt)?;
        self.graph_at(src_idx)?;
        self.graph_at(tgt_idx)?;
        check_hom(self.graph_at(src_idx)?, self.graph_at(tgt_idx)?, &mapping, ignore_attrs)?;

        let existing = self.existing_composed_mapping(src_idx, tgt_idx);

        let edge_idx = self
            .dag
            .add_edge(src_idx, tgt_idx, HEdge::Typing { mapping: mapping.clone(), ignore_attrs, attrs })
            .map_err(|_| Error::HierarchyCycle)?;

        if let Some(prior) = existing {
            if prior != mapping {
                self.dag.remove_edge(edge_idx);
                log::warn!("rejected typing {src} -> {tgt}: commutation violation");
                return Err(Error::CommutationViolation(format!(
                    "typing {src} -> {tgt} disagrees with an existing path's composed mapping"
                )));
            }
        }
        log::debug!("added typing {src} -> {tgt} ({} node(s) mapped)", mapping.len());
        Ok(())
    }

    pub fn add_rule_typing(
        &mut self,
        rule_id: &Value,
        graph_id: &Value,
        lhs_mapping: Mapping,
        rhs_mapping: Mapping,
        ignore_attrs: bool,
        attrs: AttrBag,
    ) -> Result<(), Error> {
        let rule_idx = self.idx(rule_id)?;
        let graph_idx = self.idx(graph_id)?;
        let rule = self.rule_at(rule_idx)?.clone();
        let graph = self.graph_at(graph_idx)?;
        check_hom(&rule.lhs, graph, &lhs_mapping, ignore_attrs)?;
        check_hom(&rule.rhs, graph, &rhs_mapping, ignore_attrs)?;

        self.dag
            .add_edge(
                rule_idx,
                graph_idx,
                HEdge::RuleTyping { lhs_mapping, rhs_mapping, ignore_attrs, attrs },
            )
            .map_err(|_| Error::HierarchyCycle)?;
        Ok(())
    }

    /// Synthesize a fresh subgraph of `src` restricted to `partial`'s
    /// domain, and add it with two typings: `new -> src` (inclusion) and
    /// `new -> tgt` (`partial`). Returns the fresh subgraph's id.
    ///
    /// The restricted subgraph's directedness is taken from `src`'s own
    /// graph (via [`Graph::restrict`]), which was validated against the
    /// hierarchy's `directed` flag when `src` was added — not from a
    /// truthy check on an accessor.
    pub fn add_partial_typing(
        &mut self,
        src: &Value,
        tgt: &Value,
        partial: Mapping,
        ignore_attrs: bool,
        attrs: AttrBag,
    ) -> Result<Value, Error> {
        let src_idx = self.idx(src)?;
        let source_graph = self.graph_at(src_idx)?.clone();
        let keep: std::collections::BTreeSet<Value> = partial.keys().cloned().collect();
        let restricted = source_graph.restrict(&keep);

        let new_id = fresh_name(src, |cand| self.ids.contains_key(cand));
        self.add_graph(new_id.clone(), restricted, AttrBag::new())?;

        let inclusion: Mapping = keep.iter().map(|n| (n.clone(), n.clone())).collect();
        self.add_typing(&new_id, src, inclusion, false, AttrBag::new())?;
        self.add_typing(&new_id, tgt, partial, ignore_attrs, attrs)?;
        Ok(new_id)
    }

    /// Remove `id`. If `reconnect`, every predecessor-successor pair gets a
    /// composed typing edge (unless one already exists) before the node and
    /// its incident edges are dropped.
    pub fn remove_graph(&mut self, id: &Value, reconnect: bool) -> Result<(), Error> {
        let idx = self.idx(id)?;
        log::debug!("removing graph node {id} (reconnect={reconnect})");

        if reconnect {
            let preds: Vec<NodeIndex<u32>> = self
                .dag
                .graph()
                .neighbors_directed(idx, Direction::Incoming)
                .collect();
            let succs: Vec<NodeIndex<u32>> = self
                .dag
                .graph()
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();

            for &p in &preds {
                let pred_to_id = self.edge_between(p, idx).clone();
                for &s in &succs {
                    if self.edge_between_opt(p, s).is_some() {
                        continue;
                    }
                    let id_to_succ = self.edge_between(idx, s).clone();
                    if let Some(new_edge) = compose_edges(&pred_to_id, &id_to_succ) {
                        let _ = self.dag.add_edge(p, s, new_edge);
                    }
                }
            }
        }

        self.dag.remove_node(idx);
        self.rebuild_ids();
        Ok(())
    }

    pub(crate) fn edge_between(&self, from: NodeIndex<u32>, to: NodeIndex<u32>) -> &HEdge {
        self.edge_between_opt(from, to).expect("edge must exist")
    }

    pub(crate) fn edge_between_opt(&self, from: NodeIndex<u32>, to: NodeIndex<u32>) -> Option<&HEdge> {
        self.dag
            .graph()
            .edges_directed(from, Direction::Outgoing)
            .find(|e| e.target() == to)
            .map(|e| e.weight())
    }

    pub(crate) fn rebuild_ids(&mut self) {
        self.ids.clear();
        for idx in self.dag.graph().node_indices() {
            let id = self.node(idx).id().clone();
            self.ids.insert(id, idx);
        }
    }

    pub fn node_type(&self, graph_id: &Value, node_id: &Value) -> Result<Vec<Value>, Error> {
        let idx = self.idx(graph_id)?;
        self.graph_at(idx)?;
        let mut out = Vec::new();
        for edge in self.dag.graph().edges_directed(idx, Direction::Outgoing) {
            if let HEdge::Typing { mapping, .. } = edge.weight() {
                if let Some(image) = mapping.get(node_id) {
                    out.push(image.clone());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Every graph reachable via outgoing typings from `graph_id`, paired
    /// with the total composed mapping from `graph_id` to it.
    pub fn get_ancestors(&self, graph_id: &Value) -> Result<BTreeMap<Value, Mapping>, Error> {
        let idx = self.idx(graph_id)?;
        self.graph_at(idx)?;
        let start: Mapping = self.graph_at(idx)?.nodes().map(|n| (n.clone(), n.clone())).collect();

        let mut out = BTreeMap::new();
        let mut stack = vec![(idx, start)];
        let mut visited = std::collections::BTreeSet::new();
        while let Some((at, acc)) = stack.pop() {
            for edge in self.dag.graph().edges_directed(at, Direction::Outgoing) {
                let HEdge::Typing { mapping, .. } = edge.weight() else { continue };
                let next = edge.target();
                let composed = compose(&acc, mapping);
                let next_id = self.node(next).id().clone();
                out.entry(next_id).or_insert_with(|| composed.clone());
                if visited.insert(next) {
                    stack.push((next, composed));
                }
            }
        }
        Ok(out)
    }

    /// All matches of `pattern` in `graph_id`'s graph: mappings
    /// `V(pattern) -> V(graph)` such that node/edge attributes are
    /// subsumed and, if `pattern_typing` is given, every listed parent's
    /// typing of the candidate agrees with `pattern_typing`.
    ///
    /// This is a direct, unoptimized backtracking search: fine for the
    /// small- to medium-sized graphs this engine targets, not meant to
    /// scale to large-graph subgraph isomorphism search.
    pub fn find_matching(
        &self,
        graph_id: &Value,
        pattern: &Graph,
        pattern_typing: Option<&BTreeMap<Value, Mapping>>,
    ) -> Result<Vec<Mapping>, Error> {
        let idx = self.idx(graph_id)?;
        let graph = self.graph_at(idx)?;

        let has_parents = self
            .dag
            .graph()
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .is_some();
        if has_parents && pattern_typing.map(BTreeMap::is_empty).unwrap_or(true) {
            return Err(Error::InvalidHomomorphism(format!(
                "{graph_id} has parent typings but no pattern_typing was supplied"
            )));
        }

        let pattern_nodes: Vec<Value> = pattern.nodes().cloned().collect();
        let candidates: Vec<Value> = graph.nodes().cloned().collect();
        let mut results = Vec::new();
        let mut current = Mapping::new();
        self.search_matches(
            graph_id,
            pattern,
            graph,
            &pattern_nodes,
            &candidates,
            pattern_typing,
            &mut current,
            &mut results,
        )?;
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn search_matches(
        &self,
        graph_id: &Value,
        pattern: &Graph,
        graph: &Graph,
        remaining: &[Value],
        candidates: &[Value],
        pattern_typing: Option<&BTreeMap<Value, Mapping>>,
        current: &mut Mapping,
        results: &mut Vec<Mapping>,
    ) -> Result<(), Error> {
        let Some((p, rest)) = remaining.split_first() else {
            if check_hom(pattern, graph, current, false).is_ok() {
                results.push(current.clone());
            }
            return Ok(());
        };

        for candidate in candidates {
            let p_attrs = pattern.node_attrs(p).cloned().unwrap_or_default();
            let c_attrs = graph.node_attrs(candidate).cloned().unwrap_or_default();
            if !crate::value::AttrBagExt::subsumed_by(&p_attrs, &c_attrs) {
                continue;
            }
            if let Some(typings) = pattern_typing {
                let mut consistent = true;
                for (parent, parent_map) in typings {
                    if let Some(expected) = parent_map.get(p) {
                        match self.node_type(graph_id, candidate) {
                            Ok(images) => {
                                let parent_images = self.node_type_in(parent, candidate, graph_id)?;
                                if !parent_images.contains(expected) && !images.contains(expected) {
                                    consistent = false;
                                }
                            }
                            Err(_) => consistent = false,
                        }
                    }
                }
                if !consistent {
                    continue;
                }
            }
            current.insert(p.clone(), candidate.clone());
            self.search_matches(graph_id, pattern, graph, rest, candidates, pattern_typing, current, results)?;
            current.remove(p);
        }
        Ok(())
    }

    /// The image of `node_id` (a node of `graph_id`) under the composed
    /// typing into `parent`, if reachable.
    fn node_type_in(&self, parent: &Value, node_id: &Value, graph_id: &Value) -> Result<Vec<Value>, Error> {
        let ancestors = self.get_ancestors(graph_id)?;
        Ok(ancestors
            .get(parent)
            .and_then(|m| m.get(node_id))
            .cloned()
            .into_iter()
            .collect())
    }

    /// Ids of every graph node, in sorted order.
    pub fn node_ids(&self) -> Vec<Value> {
        let mut out: Vec<Value> = self
            .dag
            .graph()
            .node_indices()
            .filter_map(|idx| match self.node(idx) {
                HNode::Graph { id, .. } => Some(id.clone()),
                HNode::Rule { .. } => None,
            })
            .collect();
        out.sort();
        out
    }

    /// Ids of every rule node, in sorted order.
    pub fn rule_ids(&self) -> Vec<Value> {
        let mut out: Vec<Value> = self
            .dag
            .graph()
            .node_indices()
            .filter_map(|idx| match self.node(idx) {
                HNode::Rule { id, .. } => Some(id.clone()),
                HNode::Graph { .. } => None,
            })
            .collect();
        out.sort();
        out
    }

    pub fn graph_attrs(&self, id: &Value) -> Result<&AttrBag, Error> {
        match self.node(self.idx(id)?) {
            HNode::Graph { attrs, .. } => Ok(attrs),
            HNode::Rule { .. } => Err(Error::WrongNodeKind(format!("{id} is a rule, not a graph"))),
        }
    }

    pub fn rule_attrs(&self, id: &Value) -> Result<&AttrBag, Error> {
        match self.node(self.idx(id)?) {
            HNode::Rule { attrs, .. } => Ok(attrs),
            HNode::Graph { .. } => Err(Error::WrongNodeKind(format!("{id} is a graph, not a rule"))),
        }
    }

    /// Every outgoing `Typing` edge as `(from, to, mapping, ignore_attrs, attrs)`.
    pub fn typings(&self) -> Vec<(Value, Value, Mapping, bool, AttrBag)> {
        let mut out = Vec::new();
        for idx in self.dag.graph().node_indices() {
            let from = self.node(idx).id().clone();
            for edge in self.dag.graph().edges_directed(idx, Direction::Outgoing) {
                if let HEdge::Typing { mapping, ignore_attrs, attrs } = edge.weight() {
                    let to = self.node(edge.target()).id().clone();
                    out.push((from.clone(), to, mapping.clone(), *ignore_attrs, attrs.clone()));
                }
            }
        }
        out
    }

    /// Every outgoing `RuleTyping` edge as
    /// `(from, to, lhs_mapping, rhs_mapping, ignore_attrs, attrs)`.
    pub fn rule_typings(&self) -> Vec<(Value, Value, Mapping, Mapping, bool, AttrBag)> {
        let mut out = Vec::new();
        for idx in self.dag.graph().node_indices() {
            let from = self.node(idx).id().clone();
            for edge in self.dag.graph().edges_directed(idx, Direction::Outgoing) {
                if let HEdge::RuleTyping { lhs_mapping, rhs_mapping, ignore_attrs, attrs } = edge.weight() {
                    let to = self.node(edge.target()).id().clone();
                    out.push((from.clone(), to, lhs_mapping.clone(), rhs_mapping.clone(), *ignore_attrs, attrs.clone()));
                }
            }
        }
        out
    }

    /// Remove attribute values from a node inside one of the hierarchy's
    /// graphs. Unless `force`, refuses if doing so would make some
    /// predecessor's (non-`ignore_attrs`) typing of this node no longer
    /// subsumed — removing attributes tightens what a typing must satisfy.
    pub fn remove_attrs(&mut self, graph_id: &Value, node_id: &Value, attrs_to_remove: &AttrBag, force: bool) -> Result<(), Error> {
        let idx = self.idx(graph_id)?;
        let current = self
            .graph_at(idx)?
            .node_attrs(node_id)
            .cloned()
            .unwrap_or_default();
        let after = current.difference(attrs_to_remove);

        if !force {
            let preds: Vec<NodeIndex<u32>> = self.dag.graph().neighbors_directed(idx, Direction::Incoming).collect();
            for p in preds {
                let HEdge::Typing { mapping, ignore_attrs, .. } = self.edge_between(p, idx) else { continue };
                if *ignore_attrs {
                    continue;
                }
                let pred_graph = self.graph_at(p)?;
                for pred_node in keys_by_value(mapping, node_id) {
                    let pred_attrs = pred_graph.node_attrs(&pred_node).cloned().unwrap_or_default();
                    if !pred_attrs.subsumed_by(&after) {
                        return Err(Error::InvalidHomomorphism(format!(
                            "removing attrs from {node_id} in {graph_id} would break the typing from {pred_node}"
                        )));
                    }
                }
            }
        }

        if let HNode::Graph { graph, .. } = self.node_mut(idx) {
            graph.remove_node_attrs(node_id, attrs_to_remove);
        }
        Ok(())
    }
}

fn compose_edges(first: &HEdge, second: &HEdge) -> Option<HEdge> {
    match (first, second) {
        (
            HEdge::Typing { mapping: m1, ignore_attrs: i1, .. },
            HEdge::Typing { mapping: m2, ignore_attrs: i2, .. },
        ) => Some(HEdge::Typing {
            mapping: compose(m1, m2),
            ignore_attrs: *i1 || *i2,
            attrs: AttrBag::new(),
        }),
        (
            HEdge::RuleTyping { lhs_mapping, rhs_mapping, ignore_attrs: i1, .. },
            HEdge::Typing { mapping: m2, ignore_attrs: i2, .. },
        ) => Some(HEdge::RuleTyping {
            lhs_mapping: compose(lhs_mapping, m2),
            rhs_mapping: compose(rhs_mapping, m2),
            ignore_attrs: *i1 || *i2,
            attrs: AttrBag::new(),
        }),
        _ => None,
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hierarchy(directed={}):", self.directed)?;
        for idx in self.dag.graph().node_indices() {
            match self.node(idx) {
                HNode::Graph { id, graph, .. } => {
                    writeln!(f, "  graph {id} ({} nodes, {} edges)", graph.node_count(), graph.edges().count())?
                }
                HNode::Rule { id, .. } => writeln!(f, "  rule {id}")?,
            }
            for edge in self.dag.graph().edges_directed(idx, Direction::Outgoing) {
                let tgt_id = self.node(edge.target()).id();
                match edge.weight() {
                    HEdge::Typing { .. } => writeln!(f, "    -> {tgt_id} (typing)")?,
                    HEdge::RuleTyping { .. } => writeln!(f, "    -> {tgt_id} (rule typing)")?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrBag;

    fn single_node_graph(directed: bool, n: i64) -> Graph {
        let mut g = Graph::new(directed);
        g.add_node(Value::from(n), AttrBag::new());
        g
    }

    #[test]
    fn add_typing_rejects_cycle() {
        let mut h = Hierarchy::new(true);
        h.add_graph(Value::from("a"), single_node_graph(true, 1), AttrBag::new()).unwrap();
        h.add_graph(Value::from("b"), single_node_graph(true, 1), AttrBag::new()).unwrap();
        let mut m = Mapping::new();
        m.insert(Value::from(1i64), Value::from(1i64));
        h.add_typing(&Value::from("a"), &Value::from("b"), m.clone(), false, AttrBag::new())
            .unwrap();
        let err = h
            .add_typing(&Value::from("b"), &Value::from("a"), m, false, AttrBag::new())
            .unwrap_err();
        assert!(matches!(err, Error::HierarchyCycle));
    }

    #[test]
    fn add_typing_rejects_commutation_violation() {
        let mut h = Hierarchy::new(true);
        let mut a = Graph::new(true);
        a.add_node(Value::from(1i64), AttrBag::new());
        let mut b = Graph::new(true);
        b.add_node(Value::from("x"), AttrBag::new());
        b.add_node(Value::from("y"), AttrBag::new());
        let mut c = Graph::new(true);
        c.add_node(Value::from("p"), AttrBag::new());
        c.add_node(Value::from("q"), AttrBag::new());

        h.add_graph(Value::from("a"), a, AttrBag::new()).unwrap();
        h.add_graph(Value::from("b"), b, AttrBag::new()).unwrap();
        h.add_graph(Value::from("c"), c, AttrBag::new()).unwrap();

        let mut ab = Mapping::new();
        ab.insert(Value::from(1i64), Value::from("x"));
        h.add_typing(&Value::from("a"), &Value::from("b"), ab, false, AttrBag::new())
            .unwrap();

        let mut ac = Mapping::new();
        ac.insert(Value::from(1i64), Value::from("p"));
        h.add_typing(&Value::from("a"), &Value::from("c"), ac, false, AttrBag::new())
            .unwrap();

        let mut bc = Mapping::new();
        bc.insert(Value::from("x"), Value::from("q")); // disagrees: a->b->c sends 1->x->q, but a->c sends 1->p
        bc.insert(Value::from("y"), Value::from("q"));
        let err = h
            .add_typing(&Value::from("b"), &Value::from("c"), bc, false, AttrBag::new())
            .unwrap_err();
        assert!(matches!(err, Error::CommutationViolation(_)));
        assert!(h.idx(&Value::from("b")).is_ok());
        assert!(!h
            .dag
            .graph()
            .edges_directed(h.idx(&Value::from("b")).unwrap(), Direction::Outgoing)
            .any(|e| e.target() == h.idx(&Value::from("c")).unwrap()));
    }

    #[test]
    fn remove_graph_reconnects_through_composed_typing() {
        let mut h = Hierarchy::new(true);
        h.add_graph(Value::from("a"), single_node_graph(true, 1), AttrBag::new()).unwrap();
        h.add_graph(Value::from("b"), single_node_graph(true, 1), AttrBag::new()).unwrap();
        h.add_graph(Value::from("c"), single_node_graph(true, 1), AttrBag::new()).unwrap();
        let mut m = Mapping::new();
        m.insert(Value::from(1i64), Value::from(1i64));
        h.add_typing(&Value::from("a"), &Value::from("b"), m.clone(), false, AttrBag::new())
            .unwrap();
        h.add_typing(&Value::from("b"), &Value::from("c"), m, false, AttrBag::new())
            .unwrap();

        h.remove_graph(&Value::from("b"), true).unwrap();
        assert!(!h.has_id(&Value::from("b")));
        let ancestors = h.get_ancestors(&Value::from("a")).unwrap();
        assert!(ancestors.contains_key(&Value::from("c")));
    }
}
