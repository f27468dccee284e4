//! Append constructions: `modifier head` (or `head modifier`) where the
//! modifier ends up inside one partition of the head.
//!
//! ```text
//! ModifierFirst:  s0 --modifier--> s1 --head / AppendPrevious{0, p}-->   s2
//! HeadFirst:      s0 --head-->     s1 --modifier / AppendToPrevious{0, p}--> s2
//! ```

use super::{Construction, ConstructionKind};
use crate::graph::{MachineGraph, MachineId};
use crate::{Fst, Lexicon, Matcher, Operator, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendDirection {
    /// The modifier precedes the head (`the train`).
    ModifierFirst,
    /// The head precedes the modifier.
    HeadFirst,
}

#[derive(Debug, Clone)]
pub struct AppendConstruction {
    name: String,
    kind: ConstructionKind,
    direction: AppendDirection,
    partition: usize,
    fst: Fst,
}

impl AppendConstruction {
    pub fn new(
        name: impl Into<String>,
        modifier: Matcher,
        head: Matcher,
        partition: usize,
        direction: AppendDirection,
    ) -> Self {
        let mut fst = Fst::new();
        let start = fst.add_state(true, false);
        let middle = fst.add_state(false, false);
        let end = fst.add_state(false, true);
        match direction {
            AppendDirection::ModifierFirst => {
                fst.add_transition(start, modifier, middle, Vec::new());
                fst.add_transition(middle, head, end, vec![Operator::AppendPrevious { index: 0, partition }]);
            }
            AppendDirection::HeadFirst => {
                fst.add_transition(start, head, middle, Vec::new());
                fst.add_transition(middle, modifier, end, vec![Operator::AppendToPrevious { index: 0, partition }]);
            }
        }
        AppendConstruction { name: name.into(), kind: ConstructionKind::Chunk, direction, partition, fst }
    }

    /// Run the construction in the semantic pass instead of chunk reduction.
    #[must_use]
    pub fn semantic(mut self) -> Self {
        self.kind = ConstructionKind::Semantic;
        self
    }

    /// `(modifier, head)` of a two-machine sequence.
    fn roles(&self, seq: &[MachineId]) -> (MachineId, MachineId) {
        match self.direction {
            AppendDirection::ModifierFirst => (seq[0], seq[1]),
            AppendDirection::HeadFirst => (seq[1], seq[0]),
        }
    }
}

impl Construction for AppendConstruction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstructionKind {
        self.kind
    }

    fn check(&mut self, graph: &MachineGraph, seq: &[MachineId]) -> Result<bool> {
        self.fst.reset();
        for machine in seq {
            self.fst.read_dry(graph, *machine)?;
            if self.fst.active_states().is_empty() {
                return Ok(false);
            }
        }
        self.fst.in_final()
    }

    /// Two distinct machines, and the modifier is not already in the head's
    /// partition.
    fn last_check(&self, graph: &MachineGraph, seq: &[MachineId]) -> bool {
        if seq.len() != 2 || seq[0] == seq[1] {
            return false;
        }
        let (modifier, head) = self.roles(seq);
        !graph.get(head).is_ok_and(|node| node.partition(self.partition).contains(&modifier))
    }

    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        if !self.last_check(lexicon.graph(), seq) {
            return Ok(None);
        }
        self.fst.reset();
        for machine in seq {
            self.fst.read(lexicon.graph_mut(), *machine, false)?;
        }
        if !self.fst.in_final()? {
            return Ok(None);
        }
        let (_, head) = self.roles(seq);
        tracing::trace!(construction = %self.name, head = %lexicon.graph().name(head)?, "append fired");
        Ok(Some(vec![head]))
    }
}
