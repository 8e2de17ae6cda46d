//! Category operations, rule model, typing hierarchy, and rewrite driver
//! for a typed graph rewriting engine built on double-pushout rewriting
//! over attributed graphs.
//!
//! Modules are layered bottom-up: `value` and `graph` are the data model,
//! `hom` and `category` are the pure category-theoretic operations built on
//! top of them, `rule` and `commands` build rewriting rules out of those
//! operations, and `hierarchy`/`rewrite` tie everything into a DAG of typed
//! graphs and rules that stays consistent across rewrites. `json` is the
//! on-disk wire format.

mod category;
mod commands;
mod error;
mod graph;
mod hierarchy;
mod hom;
mod json;
mod rewrite;
mod rule;
mod value;

pub use error::{Error, Result};
pub use graph::Graph;
pub use hierarchy::Hierarchy;
pub use hom::{check_hom, compose, is_monic, keys_by_value, Mapping};
pub use rule::Rule;
pub use value::{attrs, AttrBag, AttrBagExt, Value};
