//! Homomorphism utilities.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::graph::Graph;
use crate::value::{AttrBagExt, Value};

/// A total mapping on node identifiers, materialized densely and keyed by
/// source id.
pub type Mapping = BTreeMap<Value, Value>;

/// Validate that `f: dom -> codom` is a homomorphism: `f` is total on
/// `dom`'s nodes, edges are preserved, and (unless `ignore_attrs`) node and
/// edge attributes are subsumed.
pub fn check_hom(dom: &Graph, codom: &Graph, f: &Mapping, ignore_attrs: bool) -> Result<(), Error> {
    for n in dom.nodes() {
        let image = f.get(n).ok_or_else(|| {
            Error::InvalidHomomorphism(format!("mapping is not total: node {n} has no image"))
        })?;
        if !codom.has_node(image) {
            return Err(Error::InvalidHomomorphism(format!(
                "node {n} maps to {image}, which is not in the codomain"
            )));
        }
        if !ignore_attrs {
            let dom_attrs = dom.node_attrs(n).cloned().unwrap_or_default();
            let codom_attrs = codom.node_attrs(image).cloned().unwrap_or_default();
            if !dom_attrs.subsumed_by(&codom_attrs) {
                return Err(Error::InvalidHomomorphism(format!(
                    "attributes of node {n} are not subsumed by those of its image {image}"
                )));
            }
        }
    }

    for (u, v, attrs) in dom.edges() {
        let fu = f.get(u).expect("totality checked above");
        let fv = f.get(v).expect("totality checked above");
        if !codom.has_edge(fu, fv) {
            return Err(Error::InvalidHomomorphism(format!(
                "edge ({u}, {v}) has no image edge ({fu}, {fv})"
            )));
        }
        if !ignore_attrs {
            let codom_attrs = codom.edge_attrs(fu, fv).cloned().unwrap_or_default();
            if !attrs.subsumed_by(&codom_attrs) {
                return Err(Error::InvalidHomomorphism(format!(
                    "attributes of edge ({u}, {v}) are not subsumed by those of its image ({fu}, {fv})"
                )));
            }
        }
    }

    Ok(())
}

/// `g ∘ f`, applied to every key of `f`.
pub fn compose(f: &Mapping, g: &Mapping) -> Mapping {
    f.iter()
        .map(|(k, v)| {
            let gv = g
                .get(v)
                .unwrap_or_else(|| panic!("composition is not defined at {v}"));
            (k.clone(), gv.clone())
        })
        .collect()
}

/// A homomorphism is monic iff its underlying function is injective.
pub fn is_monic(f: &Mapping) -> bool {
    let mut seen = std::collections::BTreeSet::new();
    f.values().all(|v| seen.insert(v.clone()))
}

/// All preimages of `value` under `f`, i.e. `{k : f[k] == value}`.
pub fn keys_by_value(f: &Mapping, value: &Value) -> Vec<Value> {
    f.iter()
        .filter(|(_, v)| *v == value)
        .map(|(k, _)| k.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrBag;

    fn path_graph(directed: bool) -> Graph {
        let mut g = Graph::new(directed);
        g.add_node(Value::from(1i64), AttrBag::new());
        g.add_node(Value::from(2i64), AttrBag::new());
        g.add_edge(Value::from(1i64), Value::from(2i64), AttrBag::new());
        g
    }

    #[test]
    fn check_hom_rejects_partial_mapping() {
        let dom = path_graph(true);
        let codom = path_graph(true);
        let mut f = Mapping::new();
        f.insert(Value::from(1i64), Value::from(1i64));
        assert!(check_hom(&dom, &codom, &f, false).is_err());
    }

    #[test]
    fn check_hom_rejects_missing_edge_image() {
        let dom = path_graph(true);
        let mut codom = Graph::new(true);
        codom.add_node(Value::from(1i64), AttrBag::new());
        codom.add_node(Value::from(2i64), AttrBag::new());
        let mut f = Mapping::new();
        f.insert(Value::from(1i64), Value::from(1i64));
        f.insert(Value::from(2i64), Value::from(2i64));
        assert!(check_hom(&dom, &codom, &f, false).is_err());
    }

    #[test]
    fn is_monic_detects_collisions() {
        let mut f = Mapping::new();
        f.insert(Value::from(1i64), Value::from("x"));
        f.insert(Value::from(2i64), Value::from("x"));
        assert!(!is_monic(&f));
    }

    #[test]
    fn compose_chains_mappings() {
        let mut f = Mapping::new();
        f.insert(Value::from(1i64), Value::from("a"));
        let mut g = Mapping::new();
        g.insert(Value::from("a"), Value::from("b"));
        let h = compose(&f, &g);
        assert_eq!(h.get(&Value::from(1i64)), Some(&Value::from("b")));
    }
}
