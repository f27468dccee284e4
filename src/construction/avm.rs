//! Attribute-value matrices.
//!
//! An AVM is a set of named slots, each guarded by a matcher. The AVM
//! construction looks at one active machine at a time and fills every empty
//! slot whose matcher accepts it. It is satisfied when its formula holds, or,
//! without a formula, when every `Required` slot is filled and no `Negative`
//! slot is.
//!
//! ```text
//! ticket_query
//!   from : Pos(<CAS<ELA>>)   Required
//!   to   : Pos(<CAS<ILL>>)   Required
//!   when : Printname(...)    Optional  default "today"
//! ```

use super::{Construction, ConstructionKind};
use crate::graph::{MachineGraph, MachineId, Message};
use crate::{Lexicon, Matcher, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Required,
    Optional,
    /// Must stay empty for the default rule to hold.
    Negative,
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub name: String,
    pub matcher: Matcher,
    pub kind: SlotKind,
    pub default: Option<String>,
    value: Option<MachineId>,
}

impl Slot {
    pub fn value(&self) -> Option<MachineId> {
        self.value
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }
}

/// Boolean formula over slot names; a name is true when its slot is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Filled(String),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub fn filled(slot: impl Into<String>) -> Formula {
        Formula::Filled(slot.into())
    }

    pub fn eval(&self, filled: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Formula::Filled(name) => filled(name),
            Formula::Not(inner) => !inner.eval(filled),
            Formula::And(all) => all.iter().all(|f| f.eval(filled)),
            Formula::Or(any) => any.iter().any(|f| f.eval(filled)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Avm {
    slots: Vec<Slot>,
    formula: Option<Formula>,
}

impl Avm {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, matcher: Matcher, kind: SlotKind) -> Self {
        self.add_slot(name, matcher, kind, None);
        self
    }

    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, matcher: Matcher, default: impl Into<String>) -> Self {
        self.add_slot(name, matcher, SlotKind::Optional, Some(default.into()));
        self
    }

    #[must_use]
    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formula = Some(formula);
        self
    }

    /// Add a slot; a slot with an existing name replaces it.
    pub fn add_slot(&mut self, name: impl Into<String>, matcher: Matcher, kind: SlotKind, default: Option<String>) {
        let slot = Slot { name: name.into(), matcher, kind, default, value: None };
        match self.slots.iter_mut().find(|s| s.name == slot.name) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn get(&self, name: &str) -> Option<MachineId> {
        self.slots.iter().find(|s| s.name == name).and_then(Slot::value)
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_filled()).count()
    }

    /// Whether any empty slot would take `machine`.
    pub fn accepts(&self, graph: &MachineGraph, machine: MachineId) -> bool {
        self.slots.iter().any(|s| !s.is_filled() && s.matcher.matches(graph, machine))
    }

    /// Fill every empty slot that takes `machine`. Returns how many were filled.
    pub fn fill(&mut self, graph: &MachineGraph, machine: MachineId) -> usize {
        let mut filled = 0;
        for slot in self.slots.iter_mut().filter(|s| !s.is_filled()) {
            if slot.matcher.matches(graph, machine) {
                slot.value = Some(machine);
                filled += 1;
            }
        }
        filled
    }

    pub fn is_satisfied(&self) -> bool {
        let filled = |name: &str| self.slots.iter().any(|s| s.name == name && s.is_filled());
        match &self.formula {
            Some(formula) => formula.eval(&filled),
            None => self.slots.iter().all(|s| match s.kind {
                SlotKind::Required => s.is_filled(),
                SlotKind::Optional => true,
                SlotKind::Negative => !s.is_filled(),
            }),
        }
    }

    /// Slot name → filler printname, or the slot default when empty. Negative
    /// slots are left out.
    pub fn to_dict(&self, graph: &MachineGraph) -> BTreeMap<String, String> {
        self.slots
            .iter()
            .filter(|s| s.kind != SlotKind::Negative)
            .filter_map(|s| {
                let value = match s.value {
                    Some(machine) => graph.name(machine).ok().map(str::to_string),
                    None => s.default.clone(),
                }?;
                Some((s.name.clone(), value))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.value = None;
        }
    }
}

#[derive(Debug, Clone)]
pub struct AvmConstruction {
    name: String,
    avm: Avm,
}

impl AvmConstruction {
    pub fn new(name: impl Into<String>, avm: Avm) -> Self {
        AvmConstruction { name: name.into(), avm }
    }

    pub fn avm(&self) -> &Avm {
        &self.avm
    }
}

impl Construction for AvmConstruction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstructionKind {
        ConstructionKind::Avm
    }

    fn check(&mut self, graph: &MachineGraph, seq: &[MachineId]) -> Result<bool> {
        Ok(matches!(seq, [machine] if self.avm.accepts(graph, *machine)))
    }

    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        let [machine] = seq else { return Ok(None) };
        let filled = self.avm.fill(lexicon.graph(), *machine);
        if filled == 0 {
            return Ok(None);
        }
        tracing::trace!(avm = %self.name, machine = %lexicon.graph().name(*machine)?, filled, "filled avm slots");
        Ok(Some(seq.to_vec()))
    }

    fn filled_slots(&self) -> usize {
        self.avm.filled_count()
    }

    fn message(&self, graph: &MachineGraph) -> Option<Message> {
        self.avm.is_satisfied().then(|| Message { endpoint: self.name.clone(), fields: self.avm.to_dict(graph) })
    }

    fn reset(&mut self) {
        self.avm.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Control, KrCode};

    fn city(lex: &mut Lexicon, name: &str, case: &str) -> MachineId {
        lex.graph_mut().create(name, Some(Control::Kr(KrCode::new("NOUN").with_feature("CAS", case))))
    }

    fn route() -> Avm {
        Avm::new()
            .with_slot("from", Matcher::pos("<CAS<ELA>>").unwrap(), SlotKind::Required)
            .with_slot("to", Matcher::pos("<CAS<ILL>>").unwrap(), SlotKind::Required)
            .with_slot("via", Matcher::pos("<CAS<PRL>>").unwrap(), SlotKind::Negative)
            .with_default("when", Matcher::printname_exact("tomorrow"), "today")
    }

    #[test]
    fn default_rule_needs_required_and_no_negative() {
        let mut lex = Lexicon::new();
        let from = city(&mut lex, "budapest", "ELA");
        let to = city(&mut lex, "szeged", "ILL");
        let via = city(&mut lex, "kecskemet", "PRL");
        let mut c = AvmConstruction::new("route", route());

        for m in [from, to] {
            assert!(c.check(lex.graph(), &[m]).unwrap());
            c.act(&mut lex, &[m]).unwrap();
        }
        assert_eq!(c.filled_slots(), 2);
        let message = c.message(lex.graph()).unwrap();
        assert_eq!(message.endpoint, "route");
        assert_eq!(message.fields.get("from").map(String::as_str), Some("budapest"));
        assert_eq!(message.fields.get("when").map(String::as_str), Some("today"));
        assert!(!message.fields.contains_key("via"));

        c.act(&mut lex, &[via]).unwrap();
        assert!(c.message(lex.graph()).is_none());

        c.reset();
        assert_eq!(c.filled_slots(), 0);
    }

    #[test]
    fn filled_slots_do_not_take_more_machines() {
        let mut lex = Lexicon::new();
        let first = city(&mut lex, "budapest", "ELA");
        let second = city(&mut lex, "gyor", "ELA");
        let mut c = AvmConstruction::new("route", route());
        c.act(&mut lex, &[first]).unwrap();
        assert!(!c.check(lex.graph(), &[second]).unwrap());
        assert_eq!(c.act(&mut lex, &[second]).unwrap(), None);
        assert_eq!(c.avm().get("from"), Some(first));
    }

    #[test]
    fn formula_overrides_default_rule() {
        let mut lex = Lexicon::new();
        let to = city(&mut lex, "szeged", "ILL");
        let formula = Formula::Or(vec![Formula::filled("from"), Formula::filled("to")]);
        let mut c = AvmConstruction::new("route", route().with_formula(formula));
        assert!(c.message(lex.graph()).is_none());
        c.act(&mut lex, &[to]).unwrap();
        assert!(c.message(lex.graph()).is_some());

        let negated = Formula::Not(Box::new(Formula::filled("to")));
        assert!(!negated.eval(&|name| name == "to"));
        assert!(Formula::And(vec![]).eval(&|_| false));
    }

    #[test]
    fn check_takes_one_machine_at_a_time() {
        let mut lex = Lexicon::new();
        let from = city(&mut lex, "budapest", "ELA");
        let to = city(&mut lex, "szeged", "ILL");
        let mut c = AvmConstruction::new("route", route());
        assert!(!c.check(lex.graph(), &[from, to]).unwrap());
        assert!(!c.check(lex.graph(), &[]).unwrap());
    }
}
