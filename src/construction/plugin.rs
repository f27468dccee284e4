//! Plugin-triggering constructions.
//!
//! A fixed literal sequence of printnames (e.g. `train ticket`) synthesises a
//! machine carrying a `Plugin` control. Other constructions later fill the
//! plugin's slot partitions; the driver asks the control to compile a message.

use super::{Construction, ConstructionKind};
use crate::graph::{Control, MachineGraph, MachineId, PluginControl};
use crate::{Fsa, Lexicon, Matcher, Result};

#[derive(Debug, Clone)]
pub struct PluginConstruction {
    name: String,
    control: PluginControl,
    fsa: Fsa,
}

impl PluginConstruction {
    pub fn new<'a>(name: impl Into<String>, trigger: impl IntoIterator<Item = &'a str>, control: PluginControl) -> Self {
        let mut fsa = Fsa::new();
        let mut state = fsa.add_state(true, false);
        for word in trigger {
            let next = fsa.add_state(false, false);
            fsa.add_transition(state, Matcher::printname_exact(word), next);
            state = next;
        }
        fsa.set_final(state);
        PluginConstruction { name: name.into(), control, fsa }
    }

    pub fn endpoint(&self) -> &str {
        &self.control.endpoint
    }

    fn is_own_plugin(&self, graph: &MachineGraph, machine: MachineId) -> bool {
        matches!(graph.control(machine), Ok(Some(Control::Plugin(p))) if p.endpoint == self.control.endpoint)
    }

    /// The machine is one of our plugin machines, or already sits inside one.
    fn owned_by_plugin(&self, graph: &MachineGraph, machine: MachineId) -> bool {
        let Ok(node) = graph.get(machine) else { return false };
        self.is_own_plugin(graph, machine) || node.parents().iter().any(|(parent, _)| self.is_own_plugin(graph, *parent))
    }
}

impl Construction for PluginConstruction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstructionKind {
        ConstructionKind::Semantic
    }

    fn check(&mut self, graph: &MachineGraph, seq: &[MachineId]) -> Result<bool> {
        self.fsa.accepts(graph, seq)
    }

    /// Triggers already consumed by a plugin machine for the same endpoint do
    /// not fire again.
    fn last_check(&self, graph: &MachineGraph, seq: &[MachineId]) -> bool {
        !seq.is_empty() && !seq.iter().any(|m| self.owned_by_plugin(graph, *m))
    }

    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        if !self.last_check(lexicon.graph(), seq) {
            return Ok(None);
        }
        let graph = lexicon.graph_mut();
        let plugin = graph.create(self.name.clone(), Some(Control::Plugin(self.control.clone())));
        for trigger in seq {
            graph.append(plugin, *trigger, 0)?;
        }
        lexicon.add_active([plugin])?;
        tracing::debug!(plugin = %self.name, endpoint = %self.control.endpoint, "plugin machine created");
        Ok(Some(vec![plugin]))
    }
}
