//! Error kinds. Each variant is a distinct failure tag; cross-category
//! reuse is deliberate and noted at the call site, not accidental.

use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid homomorphism: {0}")]
    InvalidHomomorphism(String),

    #[error("pullback-complement requires a monic second arrow, but node {0} has multiple preimages")]
    NotMonic(Value),

    #[error("adding this edge would create a cycle in the hierarchy")]
    HierarchyCycle,

    #[error("adding this typing would break path commutation: {0}")]
    CommutationViolation(String),

    #[error("id already present: {0}")]
    IdConflict(String),

    #[error("wrong node kind: {0}")]
    WrongNodeKind(String),

    #[error("unknown id: {0}")]
    UnknownId(String),

    #[error("propagation inconsistent: {0}")]
    PropagationInconsistent(String),

    #[error("directedness mismatch: hierarchy is {hierarchy_directed}, graph is {graph_directed}")]
    DirectednessMismatch {
        hierarchy_directed: bool,
        graph_directed: bool,
    },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
