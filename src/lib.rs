//! machina: machine-graph unification and construction matching.
//!
//! Meaning is modelled as a graph of *machines*: named nodes with ordered
//! partitions of children (0 = hypernym, 1 = first argument, ...). A sentence
//! arrives as pre-analysed tokens; every token becomes an active machine, and a
//! spreading-activation loop expands machines against a static lexicon,
//! matches finite-state constructions over them and promotes compound entries
//! until nothing grows. The result is a list of plugin / AVM messages.
//!
//! ```text
//! tokens ─▶ machines ─▶ chunk reduction ─▶ expand ⇄ constructions ⇄ activate ─▶ messages
//!                               ▲                      ▲
//!                        rules::np (chunk)     ConstructionSet (semantic, AVM)
//! ```

extern crate self as machina;

#[macro_use]
mod macros;
mod api;
mod construction;
mod engine;
mod error;
mod fsa;
mod fst;
pub mod graph;
mod lexicon;
mod matcher;
pub mod rules;

pub use api::{Analysis, AnalyzedToken, Chunk, Options, analyze, analyze_batch};
pub use construction::{
    AppendConstruction, AppendDirection, Avm, AvmConstruction, Construction, ConstructionKind, DeepCaseTable, Formula,
    PluginConstruction, Slot, SlotKind, VerbConstruction,
};
pub use engine::{ActivationOutcome, ConstructionSet, IterationMetrics, RunMetrics, SpreadingActivation, StopReason};
pub use error::{Error, Result};
pub use fsa::{Fsa, State};
pub use fst::{Fst, Operator};
pub use lexicon::{IS_A, Lexicon};
pub use matcher::Matcher;
