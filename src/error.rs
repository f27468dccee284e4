//! Error type shared by the graph, automaton, construction and lexicon layers.
//!
//! Structural mistakes (stale handles, automata without states) fail fast.
//! Lookup failures (`NotActive`, `AmbiguousRelation`) are surfaced to the caller
//! of the lexicon operation. Soft construction failures are *not* errors: they
//! are reported as `Ok(None)` by `Construction::act`.

use crate::graph::MachineId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The handle does not refer to a live machine (never allocated, or freed
    /// by `MachineGraph::retain_reachable`).
    #[error("stale or unknown machine handle {0:?}")]
    StaleMachine(MachineId),

    #[error("machine \"{child}\" not found in partition {partition} of \"{parent}\"")]
    NotFound { parent: String, child: String, partition: usize },

    #[error("machine \"{0}\" is not an active instance")]
    NotActive(String),

    #[error("relation \"{relation}\" of \"{machine}\" is ambiguous: {candidates:?}")]
    AmbiguousRelation { machine: String, relation: String, candidates: Vec<String> },

    #[error("automaton misconfigured: {0}")]
    Automaton(&'static str),

    #[error("verb \"{verb}\" has no free deep case for argument \"{argument}\"")]
    UnknownDeepCase { verb: String, argument: String },

    #[error("invalid matcher pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid tag \"{0}\"")]
    InvalidTag(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
