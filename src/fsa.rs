//! Finite-state acceptor over sequences of machines.
//!
//! The alphabet is machines, not characters: each transition is guarded by a
//! `Matcher`. Simulation is nondeterministic and memoryless: `read` replaces the
//! active-state set with the union of targets reachable from it in one step.
//!
//! ```text
//! reset()        active = init
//! read(m)        active = { t | s ∈ active, (s --matcher--> t), matcher(m) }
//! in_final()     active ∩ final ≠ ∅
//! ```

use crate::graph::{MachineGraph, MachineId};
use crate::{Error, Matcher, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Opaque automaton state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State(pub usize);

#[derive(Debug, Clone, Default)]
pub struct Fsa {
    state_count: usize,
    init: BTreeSet<State>,
    finals: BTreeSet<State>,
    transitions: BTreeMap<State, Vec<(Matcher, State)>>,
    active: BTreeSet<State>,
}

impl Fsa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, is_init: bool, is_final: bool) -> State {
        let state = State(self.state_count);
        self.state_count += 1;
        if is_init {
            self.init.insert(state);
        }
        if is_final {
            self.finals.insert(state);
        }
        state
    }

    pub fn set_init(&mut self, state: State) {
        self.init.insert(state);
    }

    pub fn set_final(&mut self, state: State) {
        self.finals.insert(state);
    }

    pub fn add_transition(&mut self, from: State, matcher: Matcher, to: State) {
        self.transitions.entry(from).or_default().push((matcher, to));
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn init_states(&self) -> &BTreeSet<State> {
        &self.init
    }

    pub fn final_states(&self) -> &BTreeSet<State> {
        &self.finals
    }

    pub fn active_states(&self) -> &BTreeSet<State> {
        &self.active
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.values().map(Vec::len).sum()
    }

    pub fn reset(&mut self) {
        self.active = self.init.clone();
    }

    pub fn read(&mut self, graph: &MachineGraph, machine: MachineId) -> Result<()> {
        let taken = self.taken(graph, machine)?;
        self.advance(taken.into_iter().map(|(_, target)| target));
        Ok(())
    }

    /// Transitions out of the active set that accept `machine`, as
    /// `((from, edge index), target)`. The active set is left as is.
    pub(crate) fn taken(&self, graph: &MachineGraph, machine: MachineId) -> Result<Vec<((State, usize), State)>> {
        self.validate()?;
        let mut taken = Vec::new();
        for state in &self.active {
            for (index, (matcher, target)) in self.transitions.get(state).into_iter().flatten().enumerate() {
                if matcher.matches(graph, machine) {
                    taken.push(((*state, index), *target));
                }
            }
        }
        Ok(taken)
    }

    pub(crate) fn advance(&mut self, targets: impl IntoIterator<Item = State>) {
        self.active = targets.into_iter().collect();
    }

    /// Number of transitions leaving `state`; the next one added gets this index.
    pub(crate) fn out_degree(&self, state: State) -> usize {
        self.transitions.get(&state).map_or(0, Vec::len)
    }

    pub fn in_final(&self) -> Result<bool> {
        self.validate()?;
        Ok(self.active.iter().any(|s| self.finals.contains(s)))
    }

    /// Reset, read all of `seq` and report acceptance.
    pub fn accepts(&mut self, graph: &MachineGraph, seq: &[MachineId]) -> Result<bool> {
        self.reset();
        for machine in seq {
            self.read(graph, *machine)?;
            if self.active.is_empty() {
                return Ok(false);
            }
        }
        self.in_final()
    }

    fn validate(&self) -> Result<()> {
        if self.state_count == 0 {
            return Err(Error::Automaton("no states"));
        }
        if self.init.is_empty() {
            return Err(Error::Automaton("no initial state"));
        }
        if self.finals.is_empty() {
            return Err(Error::Automaton("no final state"));
        }
        Ok(())
    }
}
