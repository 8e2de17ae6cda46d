//! Typed graph rewriting engine.
//!
//! This crate is a thin re-export of [`regraph_core`], which contains the
//! category operations, rule model, hierarchy bookkeeping, and rewrite
//! driver. Downstream crates should depend on `regraph` rather than on
//! `regraph-core` directly.

pub use regraph_core::*;
