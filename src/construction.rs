//! Constructions: automaton-backed rules that recognise a sequence of machines
//! and rewrite the graph on acceptance.
//!
//! ```text
//!            check(seq)                     act(seq)
//! idle ──reset──▶ reading ──▶ accepting ──────────────▶ Some(replacement)
//!                        └──▶ rejecting        └─ last_check fails ─▶ None
//! ```
//!
//! `check` never mutates the graph. `act` is only called after a successful
//! `check` on the same sequence.
//!
//! - `append.rs`: modifier + head, splices the modifier into a head partition.
//! - `verb.rs`: per-verb argument linking over a hypercube of deep cases.
//! - `plugin.rs`: literal trigger sequence that synthesises a plugin machine.
//! - `avm.rs`: attribute-value matrices filled one machine at a time.

#[path = "construction/append.rs"]
mod append;
#[path = "construction/avm.rs"]
mod avm;
#[path = "construction/plugin.rs"]
mod plugin;
#[path = "construction/verb.rs"]
mod verb;

pub use append::{AppendConstruction, AppendDirection};
pub use avm::{Avm, AvmConstruction, Formula, Slot, SlotKind};
pub use plugin::PluginConstruction;
pub use verb::{DeepCaseTable, VerbConstruction};

use crate::graph::{MachineGraph, MachineId, Message};
use crate::{Lexicon, Result};
use std::fmt;

/// Where a construction runs in the spreading-activation driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructionKind {
    /// Contiguous sub-sequences of a chunk, before the main loop.
    Chunk,
    /// Permutations of active machines, inside the main loop.
    Semantic,
    /// One active machine at a time, inside the main loop.
    Avm,
}

pub trait Construction: fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> ConstructionKind;

    /// Reset the automaton, read `seq` and report whether it ends in a final
    /// state.
    fn check(&mut self, graph: &MachineGraph, seq: &[MachineId]) -> Result<bool>;

    /// Structural test run by `act` after the automaton accepted.
    fn last_check(&self, _graph: &MachineGraph, _seq: &[MachineId]) -> bool {
        true
    }

    /// Rewrite the graph for an accepted `seq`. Returns the replacement
    /// sequence, or `None` when `last_check` rejects.
    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>>;

    /// Slots filled so far; only AVMs have any.
    fn filled_slots(&self) -> usize {
        0
    }

    /// Payload produced once the construction is satisfied.
    fn message(&self, _graph: &MachineGraph) -> Option<Message> {
        None
    }

    /// Forget per-sentence state.
    fn reset(&mut self) {}
}
