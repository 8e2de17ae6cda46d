//! Rule model: a span `L ← P → R` plus the transformation-authoring
//! operations used to build one up incrementally.

use std::collections::{BTreeMap, BTreeSet};

use crate::commands;
use crate::error::Error;
use crate::graph::Graph;
use crate::hom::{check_hom, is_monic, keys_by_value, Mapping};
use crate::value::{fresh_name, join_names, AttrBag, AttrBagExt, Value};

/// A span `L ← P → R` of attributed graphs, with `pL: P → L` monic.
#[derive(Clone, Debug)]
pub struct Rule {
    pub lhs: Graph,
    pub p: Graph,
    pub rhs: Graph,
    pub p_lhs: Mapping,
    pub p_rhs: Mapping,
}

impl Rule {
    pub fn new(lhs: Graph, p: Graph, rhs: Graph, p_lhs: Mapping, p_rhs: Mapping) -> Result<Self, Error> {
        check_hom(&p, &lhs, &p_lhs, false)?;
        check_hom(&p, &rhs, &p_rhs, false)?;
        if !is_monic(&p_lhs) {
            return Err(Error::InvalidHomomorphism(
                "pL must be monic (no two P-nodes may coincide in L)".into(),
            ));
        }
        Ok(Rule { lhs, p, rhs, p_lhs, p_rhs })
    }

    /// The identity rule on `pattern`: `L = P = R = pattern`, `pL = pR = id`.
    pub fn identity(pattern: &Graph) -> Self {
        let id: Mapping = pattern.nodes().map(|n| (n.clone(), n.clone())).collect();
        Rule {
            lhs: pattern.clone(),
            p: pattern.clone(),
            rhs: pattern.clone(),
            p_lhs: id.clone(),
            p_rhs: id,
        }
    }

    /// Build the identity rule on `pattern`, then optionally interpret a
    /// textual transformation script against it.
    pub fn from_transform(pattern: &Graph, script: Option<&str>) -> Result<Self, Error> {
        let mut rule = Rule::identity(pattern);
        if let Some(text) = script {
            commands::interpret(&mut rule, text)?;
        }
        Ok(rule)
    }

    // -- transformation-authoring operations -----------------------------

    /// Drop from `P` and `R` every preimage of `n_lhs` and every edge
    /// incident to it.
    pub fn inject_remove_node(&mut self, n_lhs: &Value) {
        for p_node in keys_by_value(&self.p_lhs, n_lhs) {
            if let Some(r_node) = self.p_rhs.get(&p_node).cloned() {
                self.rhs.remove_node(&r_node);
                self.p_rhs.remove(&p_node);
            }
            self.p.remove_node(&p_node);
            self.p_lhs.remove(&p_node);
        }
        self.lhs.remove_node(n_lhs);
    }

    /// Add one new node to `P` and to `R` with fresh ids, duplicating
    /// every `P`-edge (resp. `R`-edge) incident to the original preimage.
    /// `new_name`, if given, names both the new `P`-node and the new
    /// `R`-node (so a following command can target either by that name);
    /// it is rejected if either graph already has a node with that id.
    /// Returns the fresh `P`-node id.
    pub fn inject_clone_node(&mut self, n_lhs: &Value, new_name: Option<Value>) -> Result<Value, Error> {
        let p_orig = keys_by_value(&self.p_lhs, n_lhs)
            .into_iter()
            .next()
            .ok_or_else(|| Error::UnknownId(format!("no P-preimage of lhs node {n_lhs}")))?;
        let r_orig = self.p_rhs[&p_orig].clone();

        let new_p = match &new_name {
            Some(n) if !self.p.has_node(n) => n.clone(),
            Some(n) => return Err(Error::IdConflict(format!("P already has a node named {n}"))),
            None => fresh_name(&p_orig, |cand| self.p.has_node(cand)),
        };
        let new_r = match &new_name {
            Some(n) if !self.rhs.has_node(n) => n.clone(),
            Some(n) => return Err(Error::IdConflict(format!("R already has a node named {n}"))),
            None => fresh_name(&r_orig, |cand| self.rhs.has_node(cand)),
        };

        self.p.clone_node(&p_orig, new_p.clone());
        self.p_lhs.insert(new_p.clone(), n_lhs.clone());
        self.rhs.clone_node(&r_orig, new_r.clone());
        self.p_rhs.insert(new_p.clone(), new_r);

        Ok(new_p)
    }

    /// Add one `R`-node, redirecting `pR` for every `P`-preimage of any
    /// listed `L`-node to it, and union the incident `R`-edges (and their
    /// attributes). Fails if any listed node was already removed.
    pub fn inject_merge_nodes(&mut self, nodes: &[Value]) -> Result<Value, Error> {
        let mut preimages: Vec<Value> = Vec::new();
        for n in nodes {
            let ps = keys_by_value(&self.p_lhs, n);
            if ps.is_empty() {
                return Err(Error::UnknownId(format!(
                    "node {n} has already been removed and cannot be merged"
                )));
            }
            preimages.extend(ps);
        }

        let r_images: BTreeSet<Value> = preimages.iter().map(|p| self.p_rhs[p].clone()).collect();
        let ordered: Vec<Value> = r_images.iter().cloned().collect();
        let merged_name = join_names(&ordered);

        let mut merged_attrs = AttrBag::new();
        for r in &ordered {
            merged_attrs = merged_attrs.union_with(&self.rhs.node_attrs(r).cloned().unwrap_or_default());
        }
        self.rhs.add_node(merged_name.clone(), merged_attrs);

        for r in &ordered {
            let incident: Vec<(Value, Value, AttrBag)> = self
                .rhs
                .edges()
                .filter(|(u, v, _)| *u == r || *v == r)
                .map(|(u, v, a)| (u.clone(), v.clone(), a.clone()))
                .collect();
            for (u, v, a) in incident {
                let nu = if &u == r { merged_name.clone() } else { u };
                let nv = if &v == r { merged_name.clone() } else { v };
                if self.rhs.has_edge(&nu, &nv) {
                    self.rhs.add_edge_attrs(&nu, &nv, &a);
                } else {
                    self.rhs.add_edge(nu, nv, a);
                }
            }
            self.rhs.remove_node(r);
        }

        for p in preimages {
            self.p_rhs.insert(p, merged_name.clone());
        }

        Ok(merged_name)
    }

    /// Remove the corresponding edge in `P` and `R`, across all clones of
    /// its endpoints.
    pub fn inject_remove_edge(&mut self, u_lhs: &Value, v_lhs: &Value) {
        let pus = keys_by_value(&self.p_lhs, u_lhs);
        let pvs = keys_by_value(&self.p_lhs, v_lhs);
        for pu in &pus {
            for pv in &pvs {
                if self.p.has_edge(pu, pv) {
                    self.p.remove_edge(pu, pv);
                    let ru = self.p_rhs[pu].clone();
                    let rv = self.p_rhs[pv].clone();
                    self.rhs.remove_edge(&ru, &rv);
                }
            }
        }
        self.lhs.remove_edge(u_lhs, v_lhs);
    }

    /// Create a node in `R` only. Fails if it already exists.
    pub fn inject_add_node(&mut self, n_rhs: Value, attrs: AttrBag) -> Result<(), Error> {
        if self.rhs.has_node(&n_rhs) {
            return Err(Error::IdConflict(format!("R already has a node named {n_rhs}")));
        }
        self.rhs.add_node(n_rhs, attrs);
        Ok(())
    }

    /// Create an edge in `R` only. Fails if it already exists.
    pub fn inject_add_edge(&mut self, u_rhs: Value, v_rhs: Value, attrs: AttrBag) -> Result<(), Error> {
        if self.rhs.has_edge(&u_rhs, &v_rhs) {
            return Err(Error::IdConflict(format!(
                "R already has an edge ({u_rhs}, {v_rhs})"
            )));
        }
        self.rhs.add_edge(u_rhs, v_rhs, attrs);
        Ok(())
    }

    /// Removals apply to both `P` and `L`.
    pub fn remove_node_attrs(&mut self, n_lhs: &Value, attrs: &AttrBag) {
        self.lhs.remove_node_attrs(n_lhs, attrs);
        for p in keys_by_value(&self.p_lhs, n_lhs) {
            self.p.remove_node_attrs(&p, attrs);
        }
    }

    /// Additions apply only to `R`.
    pub fn add_node_attrs(&mut self, n_rhs: &Value, attrs: &AttrBag) {
        self.rhs.add_node_attrs(n_rhs, attrs);
    }

    /// Remove the listed edge's attribute values from `L` and `P` (all
    /// clones) without removing the edge itself.
    pub fn remove_edge_attrs_values(&mut self, u_lhs: &Value, v_lhs: &Value, attrs: &AttrBag) {
        self.lhs.remove_edge_attrs_values(u_lhs, v_lhs, attrs);
        let pus = keys_by_value(&self.p_lhs, u_lhs);
        let pvs = keys_by_value(&self.p_lhs, v_lhs);
        for pu in &pus {
            for pv in &pvs {
                self.p.remove_edge_attrs_values(pu, pv, attrs);
            }
        }
    }

    pub fn add_edge_attrs(&mut self, u_rhs: &Value, v_rhs: &Value, attrs: &AttrBag) {
        self.rhs.add_edge_attrs(u_rhs, v_rhs, attrs);
    }

    // -- derived queries ---------------------------------------------------

    pub fn removed_nodes(&self) -> BTreeSet<Value> {
        self.lhs
            .nodes()
            .filter(|n| keys_by_value(&self.p_lhs, n).is_empty())
            .cloned()
            .collect()
    }

    pub fn removed_edges(&self) -> Vec<(Value, Value)> {
        self.lhs
            .edges()
            .filter(|(u, v, _)| {
                let pus = keys_by_value(&self.p_lhs, u);
                let pvs = keys_by_value(&self.p_lhs, v);
                !pus.iter().any(|pu| pvs.iter().any(|pv| self.p.has_edge(pu, pv)))
            })
            .map(|(u, v, _)| (u.clone(), v.clone()))
            .collect()
    }

    pub fn added_nodes(&self) -> BTreeSet<Value> {
        self.rhs
            .nodes()
            .filter(|n| keys_by_value(&self.p_rhs, n).is_empty())
            .cloned()
            .collect()
    }

    pub fn added_edges(&self) -> Vec<(Value, Value)> {
        self.rhs
            .edges()
            .filter(|(u, v, _)| {
                let pus = keys_by_value(&self.p_rhs, u);
                let pvs = keys_by_value(&self.p_rhs, v);
                !pus.iter().any(|pu| pvs.iter().any(|pv| self.p.has_edge(pu, pv)))
            })
            .map(|(u, v, _)| (u.clone(), v.clone()))
            .collect()
    }

    /// `L`-node → its `P`-preimages, restricted to those cloned (size > 1).
    pub fn cloned_nodes(&self) -> BTreeMap<Value, Vec<Value>> {
        let mut by_lhs: BTreeMap<Value, Vec<Value>> = BTreeMap::new();
        for (p, l) in &self.p_lhs {
            by_lhs.entry(l.clone()).or_default().push(p.clone());
        }
        by_lhs.retain(|_, ps| ps.len() > 1);
        by_lhs
    }

    /// `R`-node → its `P`-preimages, restricted to those merged (size > 1).
    pub fn merged_nodes(&self) -> BTreeMap<Value, Vec<Value>> {
        let mut by_rhs: BTreeMap<Value, Vec<Value>> = BTreeMap::new();
        for (p, r) in &self.p_rhs {
            by_rhs.entry(r.clone()).or_default().push(p.clone());
        }
        by_rhs.retain(|_, ps| ps.len() > 1);
        by_rhs
    }

    pub fn added_node_attrs(&self) -> BTreeMap<Value, AttrBag> {
        let mut out = BTreeMap::new();
        for r in self.rhs.nodes() {
            let preimages = keys_by_value(&self.p_rhs, r);
            let base = preimages.iter().fold(AttrBag::new(), |acc, p| {
                acc.union_with(&self.p.node_attrs(p).cloned().unwrap_or_default())
            });
            let delta = self.rhs.node_attrs(r).cloned().unwrap_or_default().difference(&base);
            if !delta.is_empty() {
                out.insert(r.clone(), delta);
            }
        }
        out
    }

    pub fn removed_node_attrs(&self) -> BTreeMap<Value, AttrBag> {
        let mut out = BTreeMap::new();
        for l in self.lhs.nodes() {
            let preimages = keys_by_value(&self.p_lhs, l);
            let base = preimages.iter().fold(AttrBag::new(), |acc, p| {
                acc.union_with(&self.p.node_attrs(p).cloned().unwrap_or_default())
            });
            let delta = self.lhs.node_attrs(l).cloned().unwrap_or_default().difference(&base);
            if !delta.is_empty() {
                out.insert(l.clone(), delta);
            }
        }
        out
    }

    pub fn is_restrictive(&self) -> bool {
        !self.removed_nodes().is_empty()
            || !self.removed_edges().is_empty()
            || !self.removed_node_attrs().is_empty()
    }

    pub fn is_relaxing(&self) -> bool {
        !self.added_nodes().is_empty()
            || !self.added_edges().is_empty()
            || !self.added_node_attrs().is_empty()
            || !self.merged_nodes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrBag;

    fn pattern_123() -> Graph {
        let mut g = Graph::new(true);
        g.add_node(Value::from(1i64), AttrBag::new());
        g.add_node(Value::from(2i64), AttrBag::new());
        g.add_node(Value::from(3i64), AttrBag::new());
        g.add_edge(Value::from(1i64), Value::from(2i64), AttrBag::new());
        g.add_edge(Value::from(3i64), Value::from(2i64), AttrBag::new());
        g
    }

    #[test]
    fn clone_and_delete() {
        let pattern = pattern_123();
        let mut rule = Rule::identity(&pattern);
        rule.inject_remove_edge(&Value::from(3i64), &Value::from(2i64));
        let x = rule.inject_clone_node(&Value::from(2i64), None).unwrap();
        let y = rule.p_rhs[&x].clone();

        assert!(rule.p.has_edge(&Value::from(1i64), &x));
        assert!(rule.p.has_edge(&Value::from(3i64), &x));
        assert!(rule.rhs.has_edge(&Value::from(1i64), &y));
        assert!(rule.rhs.has_edge(&Value::from(3i64), &y));
        assert_eq!(rule.p_rhs[&x], y);
        assert!(!rule.p.has_edge(&Value::from(3i64), &Value::from(2i64)));
    }

    #[test]
    fn merge_and_add_edge() {
        let pattern = pattern_123();
        let mut rule = Rule::identity(&pattern);
        let m = rule
            .inject_merge_nodes(&[Value::from(1i64), Value::from(2i64)])
            .unwrap();
        rule.inject_add_edge(m.clone(), Value::from(3i64), AttrBag::new())
            .unwrap();

        assert!(rule.rhs.has_edge(&m, &Value::from(3i64)));
        // the identity rule's 1->2 edge collapses into a self-loop on m.
        assert!(rule.rhs.has_edge(&m, &m));
    }

    #[test]
    fn merge_rejects_already_removed_node() {
        let pattern = pattern_123();
        let mut rule = Rule::identity(&pattern);
        rule.inject_remove_node(&Value::from(1i64));
        let err = rule
            .inject_merge_nodes(&[Value::from(1i64), Value::from(2i64)])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownId(_)));
    }

    #[test]
    fn queries_reflect_deletions_and_additions() {
        let pattern = pattern_123();
        let mut rule = Rule::identity(&pattern);
        rule.inject_remove_node(&Value::from(1i64));
        rule.inject_add_node(Value::from("new"), AttrBag::new()).unwrap();
        assert!(rule.removed_nodes().contains(&Value::from(1i64)));
        assert!(rule.added_nodes().contains(&Value::from("new")));
        assert!(rule.is_restrictive());
        assert!(rule.is_relaxing());
    }
}
