//! Category operations: pullback, pushout, pullback-complement, and n-ary
//! pullback over attributed graphs.
//!
//! These are pure functions: inputs are graphs and mappings, outputs are a
//! fresh graph and fresh mappings; none of the inputs are mutated. Grounded
//! on `original_source/regraph/library/category_op.py`, with three
//! correctness fixes over it noted inline below.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Error;
use crate::graph::Graph;
use crate::hom::{check_hom, compose, is_monic, keys_by_value, Mapping};
use crate::value::{fresh_name, join_names, AttrBagExt, Value};

/// A cospan `C →(?) D ←(?)` fragment as used in `nary_pullback`: the
/// partner graph, its codomain, and the two legs into the codomain.
pub type Cospan = (Graph, Graph, Mapping, Mapping);

fn fresh_name_or_self(base: &Value, taken: impl Fn(&Value) -> bool) -> Value {
    if !taken(base) {
        base.clone()
    } else {
        fresh_name(base, taken)
    }
}

/// Given cospan `B →bd D ←cd C`, compute the universal `A` with
/// `a_b: A → B`, `a_c: A → C`.
pub fn pullback(
    b: &Graph,
    c: &Graph,
    d: &Graph,
    bd: &Mapping,
    cd: &Mapping,
    ignore_attrs: bool,
) -> Result<(Graph, Mapping, Mapping), Error> {
    check_hom(b, d, bd, ignore_attrs)?;
    check_hom(c, d, cd, ignore_attrs)?;

    let directed = b.is_directed();
    let mut a = Graph::new(directed);
    let mut a_b = Mapping::new();
    let mut a_c = Mapping::new();

    for n1 in b.nodes() {
        for n2 in c.nodes() {
            if bd[n1] != cd[n2] {
                continue;
            }
            let name = fresh_name_or_self(n1, |cand| a.has_node(cand));
            let attrs = b
                .node_attrs(n1)
                .cloned()
                .unwrap_or_default()
                .intersect(&c.node_attrs(n2).cloned().unwrap_or_default());
            a.add_node(name.clone(), attrs);
            a_b.insert(name.clone(), n1.clone());
            a_c.insert(name, n2.clone());
        }
    }

    let a_nodes: Vec<Value> = a.nodes().cloned().collect();
    for x in &a_nodes {
        for y in &a_nodes {
            let (bx, by) = (&a_b[x], &a_b[y]);
            let (cx, cy) = (&a_c[x], &a_c[y]);
            if b.has_edge(bx, by) && c.has_edge(cx, cy) {
                let attrs = b
                    .edge_attrs(bx, by)
                    .cloned()
                    .unwrap_or_default()
                    .intersect(&c.edge_attrs(cx, cy).cloned().unwrap_or_default());
                a.add_edge(x.clone(), y.clone(), attrs);
            }
        }
    }

    check_hom(&a, b, &a_b, ignore_attrs)?;
    check_hom(&a, c, &a_c, ignore_attrs)?;
    Ok((a, a_b, a_c))
}

/// Given span `B ←ab A →ac C`, compute the universal `D` with
/// `b_d: B → D`, `c_d: C → D`.
///
/// Every `P`-preimage of a merged node is mapped to the merged node's
/// image, not only the last one visited, and the edge-already-exists check
/// compares the images of *both* endpoints, `(hom2[n1], hom2[n2])`, not
/// `n1` twice.
pub fn pushout(
    a: &Graph,
    b: &Graph,
    c: &Graph,
    ab: &Mapping,
    ac: &Mapping,
    ignore_attrs: bool,
) -> Result<(Graph, Mapping, Mapping), Error> {
    check_hom(a, b, ab, ignore_attrs)?;
    check_hom(a, c, ac, ignore_attrs)?;

    let directed = b.is_directed();
    let mut d = Graph::new(directed);
    let mut hom1 = Mapping::new(); // B -> D
    let mut hom2 = Mapping::new(); // C -> D

    for n in c.nodes() {
        let a_keys = keys_by_value(ac, n);
        match a_keys.len() {
            0 => {
                let name = fresh_name_or_self(n, |cand| d.has_node(cand));
                d.add_node(name.clone(), c.node_attrs(n).cloned().unwrap_or_default());
                hom2.insert(n.clone(), name);
            }
            1 => {
                let b_img = ab[&a_keys[0]].clone();
                let c_attrs = c.node_attrs(n).cloned().unwrap_or_default();
                let a_attrs = a.node_attrs(&a_keys[0]).cloned().unwrap_or_default();
                let b_attrs = b.node_attrs(&b_img).cloned().unwrap_or_default();
                let attrs = b_attrs.union_with(&c_attrs.difference(&a_attrs));
                d.add_node(b_img.clone(), attrs);
                hom1.insert(b_img.clone(), b_img.clone());
                hom2.insert(n.clone(), b_img);
            }
            _ => {
                let imgs: Vec<Value> = a_keys.iter().map(|k| ab[k].clone()).collect();
                let merged_b_attrs = imgs.iter().fold(Default::default(), |acc: crate::value::AttrBag, img| {
                    acc.union_with(&b.node_attrs(img).cloned().unwrap_or_default())
                });
                let name = join_names(&imgs);
                let c_attrs = c.node_attrs(n).cloned().unwrap_or_default();
                let attrs = merged_b_attrs
                    .clone()
                    .union_with(&c_attrs.difference(&merged_b_attrs));
                d.add_node(name.clone(), attrs);
                for a_key in &a_keys {
                    // every P-preimage of the merged node, not only the last.
                    hom1.insert(ab[a_key].clone(), name.clone());
                }
                hom2.insert(n.clone(), name);
            }
        }
    }

    let b_image: BTreeSet<Value> = ab.values().cloned().collect();
    for n in b.nodes() {
        if !b_image.contains(n) {
            d.add_node(n.clone(), b.node_attrs(n).cloned().unwrap_or_default());
            hom1.insert(n.clone(), n.clone());
        }
    }

    // Edges contributed by C (and, where a preserved A-edge underlies them,
    // unioned with B's attributes).
    for (n1, n2, c_attrs) in c.edges() {
        let a1_keys = keys_by_value(ac, n1);
        let a2_keys = keys_by_value(ac, n2);
        let d1 = hom2[n1].clone();
        let d2 = hom2[n2].clone();
        if a1_keys.is_empty() || a2_keys.is_empty() {
            if !d.has_edge(&d1, &d2) {
                d.add_edge(d1, d2, c_attrs.clone());
            }
            continue;
        }
        for k1 in &a1_keys {
            for k2 in &a2_keys {
                let (b1, b2) = (&ab[k1], &ab[k2]);
                if b.has_edge(b1, b2) {
                    let b_attrs = b.edge_attrs(b1, b2).cloned().unwrap_or_default();
                    let a_attrs = a.edge_attrs(k1, k2).cloned().unwrap_or_default();
                    let delta = c_attrs.difference(&a_attrs);
                    if !d.has_edge(&d1, &d2) {
                        d.add_edge(d1.clone(), d2.clone(), b_attrs);
                        d.add_edge_attrs(&d1, &d2, &delta);
                    } else {
                        d.add_edge_attrs(&d1, &d2, &b_attrs);
                        d.add_edge_attrs(&d1, &d2, &delta);
                    }
                } else if !d.has_edge(&d1, &d2) {
                    d.add_edge(d1.clone(), d2.clone(), c_attrs.clone());
                }
            }
        }
    }

    // Remaining edges contributed purely by B.
    for (n1, n2, b_attrs) in b.edges() {
        let a1_keys = keys_by_value(ab, n1);
        let a2_keys = keys_by_value(ab, n2);
        let d1 = hom1[n1].clone();
        let d2 = hom1[n2].clone();
        if a1_keys.is_empty() || a2_keys.is_empty() {
            if !d.has_edge(&d1, &d2) {
                d.add_edge(d1, d2, b_attrs.clone());
            }
        } else if !d.has_edge(&d1, &d2) {
            d.add_edge(d1, d2, b_attrs.clone());
        }
    }

    check_hom(b, &d, &hom1, ignore_attrs)?;
    check_hom(c, &d, &hom2, ignore_attrs)?;
    Ok((d, hom1, hom2))
}

fn non_monic_witness(f: &Mapping) -> Value {
    let mut seen = BTreeSet::new();
    for v in f.values() {
        if !seen.insert(v.clone()) {
            return v.clone();
        }
    }
    unreachable!("is_monic already confirmed a collision exists")
}

/// Given composable span `A →ab B →bd D` with `bd` monic, compute the
/// universal `C` with `a_c: A → C`, `c_d: C → D` satisfying
/// `c_d ∘ a_c = bd ∘ ab`.
pub fn pullback_complement(
    a: &Graph,
    b: &Graph,
    d: &Graph,
    ab: &Mapping,
    bd: &Mapping,
    ignore_attrs: bool,
) -> Result<(Graph, Mapping, Mapping), Error> {
    check_hom(a, b, ab, ignore_attrs)?;
    check_hom(b, d, bd, ignore_attrs)?;
    if !is_monic(bd) {
        return Err(Error::NotMonic(non_monic_witness(bd)));
    }

    let directed = b.is_directed();
    let mut c = Graph::new(directed);
    let mut a_c = Mapping::new();
    let mut c_d = Mapping::new();

    for n in a.nodes() {
        let b_img = ab[n].clone();
        let t = bd[&b_img].clone();
        let a_attrs = a.node_attrs(n).cloned().unwrap_or_default();
        let b_attrs = b.node_attrs(&b_img).cloned().unwrap_or_default();
        let d_attrs = d.node_attrs(&t).cloned().unwrap_or_default();
        let attrs = d_attrs.difference(&b_attrs).union_with(&a_attrs);

        if !c.has_node(&t) {
            c.add_node(t.clone(), attrs);
            a_c.insert(n.clone(), t.clone());
            c_d.insert(t.clone(), t.clone());
        } else {
            let new_name = fresh_name(&t, |cand| c.has_node(cand));
            c.clone_node(&t, new_name.clone());
            c.add_node(new_name.clone(), attrs);
            a_c.insert(n.clone(), new_name.clone());
            c_d.insert(new_name, t);
        }
    }

    let b_image: BTreeSet<Value> = bd.values().cloned().collect();
    for n in d.nodes() {
        if !b_image.contains(n) {
            c.add_node(n.clone(), d.node_attrs(n).cloned().unwrap_or_default());
            c_d.insert(n.clone(), n.clone());
        }
    }

    for (u, v, a_attrs) in a.edges() {
        let (cu, cv) = (a_c[u].clone(), a_c[v].clone());
        let (bu, bv) = (ab[u].clone(), ab[v].clone());
        let (tu, tv) = (bd[&bu].clone(), bd[&bv].clone());
        let d_attrs = d.edge_attrs(&tu, &tv).cloned().unwrap_or_default();
        let b_attrs = b.edge_attrs(&bu, &bv).cloned().unwrap_or_default();
        let attrs = d_attrs.difference(&b_attrs).union_with(a_attrs);
        c.add_edge(cu, cv, attrs);
    }

    for (n1, n2, d_attrs) in d.edges() {
        let b1 = keys_by_value(bd, n1);
        let b2 = keys_by_value(bd, n2);
        if b1.is_empty() || b2.is_empty() {
            if !c.has_edge(n1, n2) {
                c.add_edge(n1.clone(), n2.clone(), d_attrs.clone());
            }
        } else if !b.has_edge(&b1[0], &b2[0]) {
            let c1 = keys_by_value(&c_d, n1);
            let c2 = keys_by_value(&c_d, n2);
            for x in &c1 {
                for y in &c2 {
                    if !c.has_edge(x, y) {
                        c.add_edge(x.clone(), y.clone(), d_attrs.clone());
                    }
                }
            }
        }
    }

    check_hom(a, &c, &a_c, ignore_attrs)?;
    check_hom(&c, d, &c_d, ignore_attrs)?;
    Ok((c, a_c, c_d))
}

/// Compute a pullback of `b` against a whole family of cospans at once, by
/// iteratively pulling the pairwise pullbacks together over `b`.
pub fn nary_pullback(
    b: &Graph,
    cospans: &BTreeMap<Value, Cospan>,
    ignore_attrs: bool,
) -> Result<(Graph, Mapping, BTreeMap<Value, Mapping>), Error> {
    if cospans.is_empty() {
        let identity: Mapping = b.nodes().map(|n| (n.clone(), n.clone())).collect();
        return Ok((b.clone(), identity, BTreeMap::new()));
    }

    let mut individual: Vec<(Value, Graph, Mapping, Mapping)> = Vec::new();
    for (name, (c, d, bd_i, cd_i)) in cospans {
        let (apex, a_b, a_c) = pullback(b, c, d, bd_i, cd_i, ignore_attrs)?;
        individual.push((name.clone(), apex, a_b, a_c));
    }

    let (name1, mut apex, mut apex_b, a_c1) = individual.remove(0);
    let mut apex_c: BTreeMap<Value, Mapping> = BTreeMap::new();
    apex_c.insert(name1, a_c1);

    for (name2, other_apex, other_apex_b, other_apex_c) in individual {
        let (new_apex, new_apex_old_apex, new_apex_other) =
            pullback(&apex, &other_apex, b, &apex_b, &other_apex_b, ignore_attrs)?;
        apex_b = compose(&new_apex_old_apex, &apex_b);
        for old_apex_c in apex_c.values_mut() {
            *old_apex_c = compose(&new_apex_old_apex, old_apex_c);
        }
        apex_c.insert(name2, compose(&new_apex_other, &other_apex_c));
        apex = new_apex;
    }

    check_hom(&apex, b, &apex_b, ignore_attrs)?;
    for (name, (c, ..)) in cospans {
        check_hom(&apex, c, &apex_c[name], ignore_attrs)?;
    }
    Ok((apex, apex_b, apex_c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrBag;

    fn node(g: &mut Graph, n: i64) {
        g.add_node(Value::from(n), AttrBag::new());
    }

    #[test]
    fn pullback_square_commutes() {
        // B: 1-2, C: 1-2, D: a-b, bd={1:a,2:b}, cd={1:a,2:b} -> apex isomorphic to B/C
        let mut b = Graph::new(true);
        node(&mut b, 1);
        node(&mut b, 2);
        b.add_edge(Value::from(1i64), Value::from(2i64), AttrBag::new());
        let c = b.clone();
        let mut d = Graph::new(true);
        d.add_node(Value::from("a"), AttrBag::new());
        d.add_node(Value::from("b"), AttrBag::new());
        d.add_edge(Value::from("a"), Value::from("b"), AttrBag::new());

        let mut bd = Mapping::new();
        bd.insert(Value::from(1i64), Value::from("a"));
        bd.insert(Value::from(2i64), Value::from("b"));
        let cd = bd.clone();

        let (apex, a_b, a_c) = pullback(&b, &c, &d, &bd, &cd, false).unwrap();
        assert_eq!(apex.node_count(), 2);
        assert!(check_hom(&apex, &b, &a_b, false).is_ok());
        assert!(check_hom(&apex, &c, &a_c, false).is_ok());
    }

    #[test]
    fn pullback_complement_rejects_non_monic() {
        let mut b = Graph::new(true);
        node(&mut b, 1); // "a"
        b.add_node(Value::from("b"), AttrBag::new());
        let mut d = Graph::new(true);
        d.add_node(Value::from("x"), AttrBag::new());
        let mut bd = Mapping::new();
        bd.insert(Value::from(1i64), Value::from("x"));
        bd.insert(Value::from("b"), Value::from("x"));

        let a = Graph::new(true);
        let ab = Mapping::new();

        let err = pullback_complement(&a, &b, &d, &ab, &bd, false).unwrap_err();
        assert!(matches!(err, Error::NotMonic(_)));
    }

    #[test]
    fn pushout_merges_nodes_and_unions_attrs() {
        // A: {x}; B: {1,2}; C: {m}; ab: x->1 and a second A-node y->2 both to
        // collapse 1 and 2 in D via the merge branch.
        let mut a = Graph::new(true);
        node(&mut a, 0); // maps to 1
        a.add_node(Value::from(10i64), AttrBag::new()); // maps to 2
        let mut b = Graph::new(true);
        node(&mut b, 1);
        node(&mut b, 2);
        let mut c = Graph::new(true);
        c.add_node(Value::from("m"), AttrBag::new());

        let mut ab = Mapping::new();
        ab.insert(Value::from(0i64), Value::from(1i64));
        ab.insert(Value::from(10i64), Value::from(2i64));
        let mut ac = Mapping::new();
        ac.insert(Value::from(0i64), Value::from("m"));
        ac.insert(Value::from(10i64), Value::from("m"));

        let (d, hom1, hom2) = pushout(&a, &b, &c, &ab, &ac, false).unwrap();
        assert_eq!(d.node_count(), 1);
        assert_eq!(hom1[&Value::from(1i64)], hom1[&Value::from(2i64)]);
        assert_eq!(hom2[&Value::from("m")], hom1[&Value::from(1i64)]);
    }
}
