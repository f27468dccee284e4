//! The lexicon: static background knowledge and the active working set.
//!
//! ```text
//! static : printname ──▶ canonical machine            (loaded once)
//! active : printname ──▶ [(instance, expanded), ...]  (per sentence)
//! ```
//!
//! Both tables point into one `MachineGraph` owned by the lexicon. Expansion
//! lazily copies static structure into active instances; activation promotes
//! static entries whose argument parts are all active. `clear_active` drops the
//! working set and releases every machine no longer connected to the static
//! table.

use crate::graph::{MachineGraph, MachineId};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Name of the binary relation used for enumeration membership.
pub const IS_A: &str = "IS_A";

#[derive(Debug, Clone, Copy)]
struct ActiveEntry {
    machine: MachineId,
    expanded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    graph: MachineGraph,
    statics: BTreeMap<String, MachineId>,
    active: HashMap<String, Vec<ActiveEntry>>,
    /// Active machines in registration order.
    order: Vec<MachineId>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &MachineGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut MachineGraph {
        &mut self.graph
    }

    // --- static table ---------------------------------------------------------

    /// Register canonical background machines by printname. A later machine
    /// with an already-registered name replaces the earlier one.
    pub fn add_static(&mut self, machines: impl IntoIterator<Item = MachineId>) -> Result<()> {
        for machine in machines {
            let name = self.graph.name(machine)?.to_string();
            if let Some(previous) = self.statics.insert(name.clone(), machine) {
                if previous != machine {
                    tracing::warn!(name = %name, "static machine redefined, keeping the last definition");
                }
            }
        }
        Ok(())
    }

    pub fn static_machine(&self, name: &str) -> Option<MachineId> {
        self.statics.get(name).copied()
    }

    pub fn static_len(&self) -> usize {
        self.statics.len()
    }

    // --- active table ---------------------------------------------------------

    /// Register instances as active and unexpanded. Already active instances
    /// keep their expansion flag.
    pub fn add_active(&mut self, machines: impl IntoIterator<Item = MachineId>) -> Result<()> {
        for machine in machines {
            let name = self.graph.name(machine)?.to_string();
            let entries = self.active.entry(name).or_default();
            if entries.iter().any(|e| e.machine == machine) {
                continue;
            }
            entries.push(ActiveEntry { machine, expanded: false });
            self.order.push(machine);
        }
        Ok(())
    }

    pub fn is_active(&self, machine: MachineId) -> bool {
        self.entry(machine).is_some()
    }

    pub fn is_name_active(&self, name: &str) -> bool {
        self.active.get(name).is_some_and(|entries| !entries.is_empty())
    }

    pub fn active_instances(&self, name: &str) -> Vec<MachineId> {
        self.active.get(name).map(|entries| entries.iter().map(|e| e.machine).collect()).unwrap_or_default()
    }

    /// All active machines in registration order.
    pub fn active_machines(&self) -> Vec<MachineId> {
        self.order.clone()
    }

    pub fn active_len(&self) -> usize {
        self.order.len()
    }

    pub fn is_expanded(&self, machine: MachineId) -> Result<bool> {
        match self.entry(machine) {
            Some(entry) => Ok(entry.expanded),
            None => Err(Error::NotActive(self.graph.name(machine)?.to_string())),
        }
    }

    pub fn get_unexpanded(&self) -> Vec<MachineId> {
        self.get_expanded(true)
    }

    /// Active machines that are expanded, or with `inverse` the ones that are not.
    pub fn get_expanded(&self, inverse: bool) -> Vec<MachineId> {
        self.order.iter().copied().filter(|m| self.entry(*m).is_some_and(|e| e.expanded != inverse)).collect()
    }

    /// Drop the working set and release machines only it kept alive.
    ///
    /// Background knowledge is everything connected to a static entry in
    /// either direction, so relation machines (`IS_A`, `IN`, ...) holding
    /// statics as arguments survive. Connectivity never passes through the
    /// working set itself.
    pub fn clear_active(&mut self) {
        let working: HashSet<MachineId> = self.order.drain(..).collect();
        self.active.clear();
        let background = self.graph.connected(self.statics.values().copied(), &working);
        self.graph.retain_reachable(background);
    }

    fn entry(&self, machine: MachineId) -> Option<&ActiveEntry> {
        let name = self.graph.name(machine).ok()?;
        self.active.get(name)?.iter().find(|e| e.machine == machine)
    }

    fn set_expanded(&mut self, machine: MachineId) -> Result<()> {
        let name = self.graph.name(machine)?;
        let entry = self
            .active
            .get_mut(name)
            .and_then(|entries| entries.iter_mut().find(|e| e.machine == machine))
            .ok_or_else(|| Error::NotActive(name.to_string()))?;
        entry.expanded = true;
        Ok(())
    }

    // --- expansion and activation ---------------------------------------------

    /// Pull the static definition of `machine` into the active graph.
    ///
    /// For every child `s` of partition `i` of the static counterpart, link the
    /// first active instance named like `s`, else a child of partition `i` that
    /// already carries that name, else a fresh deep copy of `s`. Returns the
    /// machines newly registered as active.
    pub fn expand(&mut self, machine: MachineId) -> Result<Vec<MachineId>> {
        let name = self.graph.name(machine)?.to_string();
        if !self.is_active(machine) {
            return Err(Error::NotActive(name));
        }
        let Some(static_machine) = self.static_machine(&name) else {
            tracing::warn!(name = %name, "no static definition, treating as expanded");
            self.set_expanded(machine)?;
            return Ok(Vec::new());
        };

        let partitions = self.graph.get(static_machine)?.partitions().to_vec();
        let mut registered = Vec::new();
        for (index, part) in partitions.iter().enumerate() {
            for source in part {
                let source_name = self.graph.name(*source)?.to_string();
                let target = if let Some(active) = self.active_instances(&source_name).first() {
                    *active
                } else if let Some(existing) = self.child_named(machine, index, &source_name)? {
                    self.add_active([existing])?;
                    registered.push(existing);
                    existing
                } else {
                    let copy = self.graph.deep_copy(*source)?;
                    self.add_active([copy])?;
                    registered.push(copy);
                    copy
                };
                self.graph.append(machine, target, index)?;
            }
        }
        self.set_expanded(machine)?;
        tracing::debug!(name = %name, new_active = registered.len(), "expanded machine");
        Ok(registered)
    }

    fn child_named(&self, machine: MachineId, partition: usize, name: &str) -> Result<Option<MachineId>> {
        let node = self.graph.get(machine)?;
        for child in node.partition(partition) {
            if self.graph.name(*child)? == name {
                return Ok(Some(*child));
            }
        }
        Ok(None)
    }

    /// Promote static entries that are not active yet but whose argument parts
    /// (children of partitions 1..) are all active by printname. Returns the
    /// fresh instances.
    pub fn activate(&mut self) -> Result<Vec<MachineId>> {
        let mut promoted = Vec::new();
        let candidates: Vec<(String, MachineId)> =
            self.statics.iter().filter(|(name, _)| !self.is_name_active(name)).map(|(n, m)| (n.clone(), *m)).collect();

        for (name, static_machine) in candidates {
            let node = self.graph.get(static_machine)?;
            let arguments: Vec<MachineId> = node.partitions().iter().skip(1).flatten().copied().collect();
            if arguments.is_empty() {
                continue;
            }
            let mut all_active = true;
            for argument in &arguments {
                if !self.is_name_active(self.graph.name(*argument)?) {
                    all_active = false;
                    break;
                }
            }
            if !all_active {
                continue;
            }
            let control = node.control().cloned();
            let instance = self.graph.create(name.clone(), control);
            self.add_active([instance])?;
            promoted.push(instance);
            tracing::debug!(name = %name, "activated static entry");
        }
        Ok(promoted)
    }

    /// Fold construction results into the working set. A result that is not
    /// active yet is unified into the first active instance with its
    /// printname, or registered active when there is none. Returns the
    /// machines the results resolved to.
    pub fn merge_active(&mut self, machines: impl IntoIterator<Item = MachineId>) -> Result<Vec<MachineId>> {
        let mut resolved = Vec::new();
        for machine in machines {
            if self.is_active(machine) {
                resolved.push(machine);
                continue;
            }
            let name = self.graph.name(machine)?.to_string();
            match self.active_instances(&name).first().copied() {
                Some(existing) => {
                    self.unify(existing, machine)?;
                    resolved.push(existing);
                }
                None => {
                    self.add_active([machine])?;
                    resolved.push(machine);
                }
            }
        }
        Ok(resolved)
    }

    /// Merge `merge` into `keep`: its partition children move over, its parents
    /// point at `keep` instead, and it leaves the active set.
    pub fn unify(&mut self, keep: MachineId, merge: MachineId) -> Result<()> {
        if keep == merge {
            return Ok(());
        }
        self.graph.get(keep)?;
        let partitions = self.graph.get(merge)?.partitions().to_vec();
        for (index, part) in partitions.iter().enumerate() {
            for child in part {
                self.graph.remove(merge, *child, Some(index))?;
                let child = if *child == merge { keep } else { *child };
                self.graph.append(keep, child, index)?;
            }
        }
        let parents: Vec<(MachineId, usize)> = self.graph.get(merge)?.parents().iter().copied().collect();
        for (parent, index) in parents {
            self.graph.remove(parent, merge, Some(index))?;
            self.graph.append(parent, keep, index)?;
        }

        let name = self.graph.name(merge)?.to_string();
        if let Some(entries) = self.active.get_mut(&name) {
            entries.retain(|e| e.machine != merge);
            if entries.is_empty() {
                self.active.remove(&name);
            }
        }
        self.order.retain(|m| *m != merge);
        tracing::trace!(name = %name, "unified machines");
        Ok(())
    }

    // --- relations --------------------------------------------------------------

    /// Every `t` such that a machine named `relation` holds `source` in
    /// partition 1 and `t` in partition 2.
    pub fn relation_targets(&self, source: MachineId, relation: &str) -> Result<Vec<MachineId>> {
        let mut targets = Vec::new();
        for (parent, index) in self.graph.get(source)?.parents() {
            if *index != 1 || self.graph.name(*parent)? != relation {
                continue;
            }
            for target in self.graph.get(*parent)?.partition(2) {
                if !targets.contains(target) {
                    targets.push(*target);
                }
            }
        }
        Ok(targets)
    }

    /// The single target of `relation` from `source`, if any.
    pub fn relation_target(&self, source: MachineId, relation: &str) -> Result<Option<MachineId>> {
        let targets = self.relation_targets(source, relation)?;
        match targets.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(Error::AmbiguousRelation {
                machine: self.graph.name(source)?.to_string(),
                relation: relation.to_string(),
                candidates: many.iter().filter_map(|m| self.graph.name(*m).ok()).map(str::to_string).collect(),
            }),
        }
    }

    /// Printnames of static machines that are (transitively) a `name`, through
    /// hypernym partitions or `IS_A` relations.
    pub fn is_a_members(&self, name: &str) -> HashSet<String> {
        self.statics
            .iter()
            .filter(|(member, machine)| member.as_str() != name && self.hypernyms(**machine).contains(name))
            .map(|(member, _)| member.clone())
            .collect()
    }

    fn hypernyms(&self, start: MachineId) -> HashSet<String> {
        let mut names = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Ok(node) = self.graph.get(current) else { continue };
            let mut next: Vec<MachineId> = node.partition(0).to_vec();
            next.extend(self.relation_targets(current, IS_A).unwrap_or_default());
            for up in next {
                let Ok(up_name) = self.graph.name(up) else { continue };
                names.insert(up_name.to_string());
                if let Some(definition) = self.static_machine(up_name) {
                    stack.push(definition);
                }
                stack.push(up);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Control;

    /// dog[0: animal]; animal[0: living]; train[0: vehicle]
    fn zoo() -> Lexicon {
        let mut lex = Lexicon::new();
        let g = lex.graph_mut();
        let dog = g.create("dog", Some(Control::Concept));
        let animal = g.create("animal", None);
        g.append(dog, animal, 0).unwrap();
        let animal_def = g.create("animal", None);
        let living = g.create("living", None);
        g.append(animal_def, living, 0).unwrap();
        let train = g.create("train", None);
        let vehicle = g.create("vehicle", None);
        g.append(train, vehicle, 0).unwrap();
        lex.add_static([dog, animal_def, train]).unwrap();
        lex
    }

    #[test]
    fn expand_requires_active_instance() {
        let mut lex = zoo();
        let dog = lex.graph_mut().create("dog", None);
        assert!(matches!(lex.expand(dog), Err(Error::NotActive(name)) if name == "dog"));
    }

    #[test]
    fn expand_without_static_only_flips_flag() {
        let mut lex = zoo();
        let cat = lex.graph_mut().create("cat", None);
        lex.add_active([cat]).unwrap();
        assert!(!lex.is_expanded(cat).unwrap());

        let added = lex.expand(cat).unwrap();
        assert!(added.is_empty());
        assert!(lex.is_expanded(cat).unwrap());
        assert_eq!(lex.graph().get(cat).unwrap().partitions().len(), 1);
        assert!(lex.graph().children(cat).unwrap().is_empty());
    }

    #[test]
    fn expand_copies_static_children() {
        let mut lex = zoo();
        let dog = lex.graph_mut().create("dog", None);
        lex.add_active([dog]).unwrap();

        let added = lex.expand(dog).unwrap();
        assert_eq!(added.len(), 1);
        let animal = added[0];
        assert_eq!(lex.graph().name(animal).unwrap(), "animal");
        assert_ne!(Some(animal), lex.static_machine("animal"));
        assert_eq!(lex.graph().get(dog).unwrap().partition(0), &[animal]);
        assert!(!lex.is_expanded(animal).unwrap());
        assert_eq!(lex.get_unexpanded(), vec![animal]);
        assert_eq!(lex.get_expanded(false), vec![dog]);

        // A second expansion of the copy reuses nothing twice.
        lex.expand(animal).unwrap();
        let living: Vec<_> = lex.graph().get(animal).unwrap().partition(0).to_vec();
        assert_eq!(living.len(), 1);
        assert_eq!(lex.graph().name(living[0]).unwrap(), "living");
    }

    #[test]
    fn expand_links_existing_active_instance() {
        let mut lex = zoo();
        let dog = lex.graph_mut().create("dog", None);
        let animal = lex.graph_mut().create("animal", None);
        lex.add_active([dog, animal]).unwrap();

        let added = lex.expand(dog).unwrap();
        assert!(added.is_empty());
        assert_eq!(lex.graph().get(dog).unwrap().partition(0), &[animal]);
    }

    #[test]
    fn same_printname_instances_stay_distinct_until_unified() {
        let mut lex = zoo();
        let first = lex.graph_mut().create("dog", None);
        let second = lex.graph_mut().create("dog", None);
        let bone = lex.graph_mut().create("bone", None);
        lex.graph_mut().append(second, bone, 1).unwrap();
        lex.add_active([first, second]).unwrap();
        assert_eq!(lex.active_instances("dog"), vec![first, second]);

        lex.unify(first, second).unwrap();
        assert_eq!(lex.active_instances("dog"), vec![first]);
        assert_eq!(lex.graph().get(first).unwrap().partition(1), &[bone]);
        assert!(lex.graph().get(bone).unwrap().parents().contains(&(first, 1)));
        assert!(!lex.graph().get(bone).unwrap().parents().contains(&(second, 1)));
    }

    #[test]
    fn merge_active_unifies_fresh_results_only() {
        let mut lex = zoo();
        let first = lex.graph_mut().create("dog", None);
        let second = lex.graph_mut().create("dog", None);
        lex.add_active([first, second]).unwrap();

        let fresh = lex.graph_mut().create("dog", None);
        let bone = lex.graph_mut().create("bone", None);
        lex.graph_mut().append(fresh, bone, 1).unwrap();
        let cat = lex.graph_mut().create("cat", None);

        let resolved = lex.merge_active([fresh, second, cat]).unwrap();
        assert_eq!(resolved, vec![first, second, cat]);
        assert_eq!(lex.active_instances("dog"), vec![first, second]);
        assert_eq!(lex.graph().get(first).unwrap().partition(1), &[bone]);
        assert!(lex.is_active(cat));
    }

    #[test]
    fn activate_requires_all_argument_parts() {
        let mut lex = Lexicon::new();
        let g = lex.graph_mut();
        let ticket = g.create("train_ticket", Some(Control::Concept));
        let train = g.create("train", None);
        let paper = g.create("ticket", None);
        g.append(ticket, train, 1).unwrap();
        g.append(ticket, paper, 2).unwrap();
        let lonely = g.create("lonely", None);
        lex.add_static([ticket, lonely]).unwrap();

        let train_token = lex.graph_mut().create("train", None);
        lex.add_active([train_token]).unwrap();
        assert!(lex.activate().unwrap().is_empty());

        let ticket_token = lex.graph_mut().create("ticket", None);
        lex.add_active([ticket_token]).unwrap();
        let promoted = lex.activate().unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(lex.graph().name(promoted[0]).unwrap(), "train_ticket");
        assert_eq!(lex.graph().control(promoted[0]).unwrap(), Some(&Control::Concept));
        assert_ne!(promoted[0], lex.static_machine("train_ticket").unwrap());

        // Already active: not promoted again.
        assert!(lex.activate().unwrap().is_empty());
    }

    #[test]
    fn clear_active_releases_working_machines() {
        let mut lex = zoo();
        let before = lex.graph().len();
        let dog = lex.graph_mut().create("dog", None);
        lex.add_active([dog]).unwrap();
        lex.expand(dog).unwrap();
        assert!(lex.graph().len() > before);

        lex.clear_active();
        assert_eq!(lex.active_len(), 0);
        assert_eq!(lex.graph().len(), before);
        assert!(!lex.graph().contains(dog));
        assert!(lex.static_machine("dog").is_some_and(|m| lex.graph().contains(m)));
    }

    #[test]
    fn clear_active_keeps_background_relations() {
        let mut lex = Lexicon::new();
        let g = lex.graph_mut();
        let cat = g.create("cat", None);
        let animal = g.create("animal", None);
        let isa = g.create(IS_A, None);
        g.append(isa, cat, 1).unwrap();
        g.append(isa, animal, 2).unwrap();
        lex.add_static([cat, animal]).unwrap();

        let token = lex.graph_mut().create("cat", None);
        lex.add_active([token]).unwrap();
        lex.expand(token).unwrap();
        lex.clear_active();

        assert!(lex.graph().contains(isa));
        assert!(!lex.graph().contains(token));
        assert_eq!(lex.relation_target(cat, IS_A).unwrap(), Some(animal));
        assert_eq!(lex.is_a_members("animal"), HashSet::from(["cat".to_string()]));
    }

    #[test]
    fn static_collisions_keep_last_definition() {
        let mut lex = Lexicon::new();
        let first = lex.graph_mut().create("bank", None);
        let second = lex.graph_mut().create("bank", None);
        lex.add_static([first, second]).unwrap();
        assert_eq!(lex.static_machine("bank"), Some(second));
        assert_eq!(lex.static_len(), 1);
    }

    #[test]
    fn relation_lookup_and_ambiguity() {
        let mut lex = Lexicon::new();
        let g = lex.graph_mut();
        let budapest = g.create("budapest", None);
        let hungary = g.create("hungary", None);
        let europe = g.create("europe", None);
        let in1 = g.create("IN", None);
        g.append(in1, budapest, 1).unwrap();
        g.append(in1, hungary, 2).unwrap();
        assert_eq!(lex.relation_target(budapest, "IN").unwrap(), Some(hungary));
        assert_eq!(lex.relation_target(hungary, "IN").unwrap(), None);

        let g = lex.graph_mut();
        let in2 = g.create("IN", None);
        g.append(in2, budapest, 1).unwrap();
        g.append(in2, europe, 2).unwrap();
        let err = lex.relation_target(budapest, "IN").unwrap_err();
        assert!(matches!(err, Error::AmbiguousRelation { ref candidates, .. } if candidates.len() == 2));
    }

    #[test]
    fn is_a_members_follow_hypernyms_and_relations() {
        let mut lex = zoo();
        let g = lex.graph_mut();
        let cat = g.create("cat", None);
        let animal = g.create("animal", None);
        let isa = g.create(IS_A, None);
        g.append(isa, cat, 1).unwrap();
        g.append(isa, animal, 2).unwrap();
        lex.add_static([cat]).unwrap();

        let members = lex.is_a_members("animal");
        assert!(members.contains("dog"));
        assert!(members.contains("cat"));
        assert!(!members.contains("train"));
        assert!(lex.is_a_members("living").contains("dog"));
    }
}
