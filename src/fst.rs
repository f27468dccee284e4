//! Finite-state transducer: an `Fsa` whose transitions also carry graph
//! operators.
//!
//! Operators of a taken transition run once, in order, right after the step
//! that took it, unless the read is a dry run. A scan keeps a register of the
//! machines consumed so far so operators can address earlier positions.
//!
//! ```text
//!   s0 --[ART]--> s1 --[NOUN / AppendPrevious{0, p0}]--> s2
//!   read(the)   register = [the]
//!   read(train) train.partition[0] += the ; register = [the, train]
//! ```

use crate::fsa::{Fsa, State};
use crate::graph::{Control, MachineGraph, MachineId};
use crate::{Error, Matcher, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Graph mutation attached to an FST transition. `index` refers to the
/// register of machines read earlier in the same scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Append the current machine into `partition` of the machine read at `index`.
    AppendToPrevious { index: usize, partition: usize },
    /// Append the machine read at `index` into `partition` of the current machine.
    AppendPrevious { index: usize, partition: usize },
    /// Replace the current machine's control.
    SetControl(Option<Control>),
}

impl Operator {
    fn execute(&self, graph: &mut MachineGraph, register: &[MachineId], current: MachineId) -> Result<()> {
        match self {
            Operator::AppendToPrevious { index, partition } => {
                let previous = register.get(*index).ok_or(Error::Automaton("operator refers to an unread position"))?;
                graph.append(*previous, current, *partition)
            }
            Operator::AppendPrevious { index, partition } => {
                let previous = register.get(*index).ok_or(Error::Automaton("operator refers to an unread position"))?;
                graph.append(current, *previous, *partition)
            }
            Operator::SetControl(control) => graph.replace_control(current, control.clone()).map(|_| ()),
        }
    }
}

/// An `Fsa` core plus the operators of each transition, keyed by
/// `(from, edge index)` in the core.
#[derive(Debug, Clone, Default)]
pub struct Fst {
    core: Fsa,
    operators: BTreeMap<(State, usize), Vec<Operator>>,
    register: Vec<MachineId>,
}

impl Fst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, is_init: bool, is_final: bool) -> State {
        self.core.add_state(is_init, is_final)
    }

    pub fn add_transition(&mut self, from: State, matcher: Matcher, to: State, operators: Vec<Operator>) {
        let index = self.core.out_degree(from);
        self.core.add_transition(from, matcher, to);
        if !operators.is_empty() {
            self.operators.insert((from, index), operators);
        }
    }

    pub fn automaton(&self) -> &Fsa {
        &self.core
    }

    pub fn active_states(&self) -> &BTreeSet<State> {
        self.core.active_states()
    }

    /// Machines consumed since the last `reset`.
    pub fn register(&self) -> &[MachineId] {
        &self.register
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.register.clear();
    }

    /// Lookahead step: advance states without touching the graph.
    pub fn read_dry(&mut self, graph: &MachineGraph, machine: MachineId) -> Result<()> {
        self.core.read(graph, machine)?;
        self.register.push(machine);
        Ok(())
    }

    /// Advance states and, unless `dry_run`, run the operators of every taken
    /// transition.
    pub fn read(&mut self, graph: &mut MachineGraph, machine: MachineId, dry_run: bool) -> Result<()> {
        if dry_run {
            return self.read_dry(graph, machine);
        }
        let taken = self.core.taken(graph, machine)?;
        for (edge, _) in &taken {
            for operator in self.operators.get(edge).into_iter().flatten() {
                operator.execute(graph, &self.register, machine)?;
            }
        }
        self.core.advance(taken.into_iter().map(|(_, target)| target));
        self.register.push(machine);
        Ok(())
    }

    pub fn in_final(&self) -> Result<bool> {
        self.core.in_final()
    }
}
