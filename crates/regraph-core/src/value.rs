//! Opaque hashable values used as node/edge identifiers and as attribute
//! scalars.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single hashable, orderable scalar. The same type is used for node and
/// edge identifiers and for attribute values, matching the original's
/// untyped-but-hashable Python values.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Render a fresh, unique identifier derived from `base`, by appending the
/// lowest positive integer suffix `_<i>` that is not already taken.
///
/// Grounded on `category_op.py`'s pullback/pushout fresh-name loops: both
/// loop `i` from 1 upward over `str(base) [+ "_"] + str(i)` until the name
/// is unique in the target graph.
pub fn fresh_name<F>(base: &Value, taken: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    let mut i = 1usize;
    loop {
        let candidate = Value::Str(format!("{base}_{i}"));
        if !taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

/// Join a list of identifiers with `_`, as pushout does when naming a
/// merged node (`"_".join([str(node) for node in merging_nodes])`).
pub fn join_names(names: &[Value]) -> Value {
    Value::Str(
        names
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("_"),
    )
}

/// A mapping from attribute name to a set of scalar values. Missing key is
/// equivalent to an empty set; bags are always normalized.
pub type AttrBag = BTreeMap<String, BTreeSet<Value>>;

/// Helper constructors and algebra over `AttrBag`: normalization, merge,
/// and subsumption.
pub trait AttrBagExt {
    /// Per-key set intersection restricted to keys present in both bags.
    fn intersect(&self, other: &AttrBag) -> AttrBag;
    /// Per-key set union over keys present in either bag.
    fn union_with(&self, other: &AttrBag) -> AttrBag;
    /// Per-key set difference: `self[k] \ other[k]` for keys in `self`.
    fn difference(&self, other: &AttrBag) -> AttrBag;
    /// `self ⊑ other`: for every key in `self`, `self[k] ⊆ other[k]`.
    fn subsumed_by(&self, other: &AttrBag) -> bool;
    /// Drop keys that map to an empty set, keeping bags normalized.
    fn normalize(&mut self);
}

impl AttrBagExt for AttrBag {
    fn intersect(&self, other: &AttrBag) -> AttrBag {
        let mut out = AttrBag::new();
        for (k, vs) in self {
            if let Some(ovs) = other.get(k) {
                let inter: BTreeSet<Value> = vs.intersection(ovs).cloned().collect();
                if !inter.is_empty() {
                    out.insert(k.clone(), inter);
                }
            }
        }
        out
    }

    fn union_with(&self, other: &AttrBag) -> AttrBag {
        let mut out = self.clone();
        for (k, vs) in other {
            out.entry(k.clone()).or_default().extend(vs.iter().cloned());
        }
        out.normalize();
        out
    }

    fn difference(&self, other: &AttrBag) -> AttrBag {
        let mut out = AttrBag::new();
        for (k, vs) in self {
            let rest: BTreeSet<Value> = match other.get(k) {
                Some(ovs) => vs.difference(ovs).cloned().collect(),
                None => vs.clone(),
            };
            if !rest.is_empty() {
                out.insert(k.clone(), rest);
            }
        }
        out
    }

    fn subsumed_by(&self, other: &AttrBag) -> bool {
        self.iter().all(|(k, vs)| match other.get(k) {
            Some(ovs) => vs.is_subset(ovs),
            None => vs.is_empty(),
        })
    }

    fn normalize(&mut self) {
        self.retain(|_, vs| !vs.is_empty());
    }
}

/// Build a normalized, singleton-sugared attribute bag from `(key, [values])`
/// pairs. A bare scalar `v` is sugar for the singleton set `{v}`.
pub fn attrs<K, I, V>(pairs: I) -> AttrBag
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Vec<V>)>,
    V: Into<Value>,
{
    let mut bag = AttrBag::new();
    for (k, vs) in pairs {
        let set: BTreeSet<Value> = vs.into_iter().map(Into::into).collect();
        if !set.is_empty() {
            bag.insert(k.into(), set);
        }
    }
    bag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsumption_missing_key_is_empty_set() {
        let a: AttrBag = attrs(vec![("color", vec![Value::from("red")])]);
        let b: AttrBag = AttrBag::new();
        assert!(!a.subsumed_by(&b));
        assert!(b.subsumed_by(&a));
    }

    #[test]
    fn intersection_keeps_only_common_keys() {
        let a = attrs(vec![
            ("color", vec![Value::from("red"), Value::from("blue")]),
            ("size", vec![Value::Int(1)]),
        ]);
        let b = attrs(vec![("color", vec![Value::from("red")])]);
        let i = a.intersect(&b);
        assert_eq!(i.len(), 1);
        assert_eq!(i.get("color").unwrap().len(), 1);
    }

    #[test]
    fn fresh_name_appends_lowest_suffix() {
        let base = Value::from("n");
        let taken: BTreeSet<Value> = vec![Value::from("n_1"), Value::from("n_2")]
            .into_iter()
            .collect();
        let got = fresh_name(&base, |v| taken.contains(v));
        assert_eq!(got, Value::from("n_3"));
    }

    #[test]
    fn join_names_underscore_joins() {
        let names = vec![Value::from("a"), Value::Int(2)];
        assert_eq!(join_names(&names), Value::from("a_2"));
    }
}
