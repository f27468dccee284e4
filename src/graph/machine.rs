//! Machine arena.
//!
//! Machines reference each other freely (shared children, back-links, cycles),
//! so they live in a `MachineGraph` arena and are addressed by generational
//! `MachineId` handles. A freed slot bumps its generation; any later use of an
//! old handle fails with `Error::StaleMachine` instead of aliasing a new node.
//!
//! ```text
//!   parent ──partition[i]──▶ child
//!   child.parents ∋ (parent, i)      (non-owning back-link)
//! ```
//!
//! Every traversal (tree collection, deep copy, debug rendering, reachability)
//! threads a visited set so cyclic graphs terminate.

use super::control::Control;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;

/// Handle to a machine in a `MachineGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId {
    index: u32,
    generation: u32,
}

/// A graph node: printname, partitions of children, optional control and the
/// set of `(parent, partition)` back-links.
#[derive(Debug, Clone)]
pub struct Machine {
    name: String,
    partitions: Vec<Vec<MachineId>>,
    control: Option<Control>,
    parents: BTreeSet<(MachineId, usize)>,
}

impl Machine {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn control(&self) -> Option<&Control> {
        self.control.as_ref()
    }

    pub fn partitions(&self) -> &[Vec<MachineId>] {
        &self.partitions
    }

    /// Children in partition `index`; empty when the partition does not exist.
    pub fn partition(&self, index: usize) -> &[MachineId] {
        self.partitions.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parents(&self) -> &BTreeSet<(MachineId, usize)> {
        &self.parents
    }
}

#[derive(Debug, Clone)]
struct Slot {
    /// Odd generations are live, even generations are free.
    generation: u32,
    machine: Option<Machine>,
}

#[derive(Debug, Clone, Default)]
pub struct MachineGraph {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
}

impl MachineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live machines.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Allocate a new machine with a single (empty) hypernym partition.
    pub fn create(&mut self, name: impl Into<String>, control: Option<Control>) -> MachineId {
        let machine = Machine { name: name.into(), partitions: vec![Vec::new()], control, parents: BTreeSet::new() };
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.machine = Some(machine);
            MachineId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 1, machine: Some(machine) });
            MachineId { index, generation: 1 }
        }
    }

    pub fn contains(&self, id: MachineId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: MachineId) -> Result<&Machine> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.machine.as_ref())
            .ok_or(Error::StaleMachine(id))
    }

    fn get_mut(&mut self, id: MachineId) -> Result<&mut Machine> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.machine.as_mut())
            .ok_or(Error::StaleMachine(id))
    }

    pub fn name(&self, id: MachineId) -> Result<&str> {
        Ok(self.get(id)?.name())
    }

    pub fn control(&self, id: MachineId) -> Result<Option<&Control>> {
        Ok(self.get(id)?.control())
    }

    /// Swap the control of `id`, returning the old one. This is graph surgery
    /// reserved for construction `act` steps.
    pub fn replace_control(&mut self, id: MachineId, control: Option<Control>) -> Result<Option<Control>> {
        let machine = self.get_mut(id)?;
        Ok(std::mem::replace(&mut machine.control, control))
    }

    /// Append `child` into partition `partition` of `parent`.
    ///
    /// Idempotent per (child, partition); grows the partition list as needed and
    /// records the back-link on the child.
    pub fn append(&mut self, parent: MachineId, child: MachineId, partition: usize) -> Result<()> {
        self.get(child)?;
        let node = self.get_mut(parent)?;
        if node.partitions.len() <= partition {
            node.partitions.resize_with(partition + 1, Vec::new);
        }
        if node.partitions[partition].contains(&child) {
            return Ok(());
        }
        node.partitions[partition].push(child);
        self.get_mut(child)?.parents.insert((parent, partition));
        Ok(())
    }

    /// Remove `child` from one partition (`Some(p)`, fails if absent) or from
    /// every partition (`None`, absent partitions are skipped).
    pub fn remove(&mut self, parent: MachineId, child: MachineId, partition: Option<usize>) -> Result<()> {
        self.get(child)?;
        let node = self.get_mut(parent)?;
        let removed: Vec<usize> = match partition {
            Some(p) => {
                let pos = node.partitions.get(p).and_then(|part| part.iter().position(|c| *c == child));
                match pos {
                    Some(pos) => {
                        node.partitions[p].remove(pos);
                        vec![p]
                    }
                    None => {
                        let parent_name = node.name.clone();
                        return Err(Error::NotFound {
                            parent: parent_name,
                            child: self.name(child)?.to_string(),
                            partition: p,
                        });
                    }
                }
            }
            None => {
                let mut removed = Vec::new();
                for (p, part) in node.partitions.iter_mut().enumerate() {
                    if let Some(pos) = part.iter().position(|c| *c == child) {
                        part.remove(pos);
                        removed.push(p);
                    }
                }
                removed
            }
        };
        let child_node = self.get_mut(child)?;
        for p in removed {
            child_node.parents.remove(&(parent, p));
        }
        Ok(())
    }

    /// Union of all partitions, first occurrence wins.
    pub fn children(&self, id: MachineId) -> Result<Vec<MachineId>> {
        let node = self.get(id)?;
        let mut seen = HashSet::new();
        Ok(node.partitions.iter().flatten().copied().filter(|c| seen.insert(*c)).collect())
    }

    /// Every machine reachable from `id` (including itself), in DFS preorder.
    pub fn unique_machines_in_tree(&self, id: MachineId) -> Result<Vec<MachineId>> {
        self.get(id)?;
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current);
            let node = self.get(current)?;
            for child in node.partitions.iter().flatten().rev() {
                if !visited.contains(child) {
                    stack.push(*child);
                }
            }
        }
        Ok(order)
    }

    /// Machines connected to `roots` through child edges or back-links, never
    /// entering `blocked`. Stale roots are skipped.
    pub fn connected(
        &self,
        roots: impl IntoIterator<Item = MachineId>,
        blocked: &HashSet<MachineId>,
    ) -> HashSet<MachineId> {
        let mut visited = HashSet::new();
        let mut stack: Vec<MachineId> = roots.into_iter().filter(|r| !blocked.contains(r)).collect();
        while let Some(current) = stack.pop() {
            let Ok(node) = self.get(current) else { continue };
            if !visited.insert(current) {
                continue;
            }
            let neighbours = node.partitions.iter().flatten().copied().chain(node.parents.iter().map(|(p, _)| *p));
            stack.extend(neighbours.filter(|n| !visited.contains(n) && !blocked.contains(n)));
        }
        visited
    }

    /// Structural clone of the subgraph reachable from `id`.
    ///
    /// One new machine per distinct original, controls cloned, partitions and
    /// back-links rebuilt among the copies. Links from the subgraph to parents
    /// outside of it are not copied.
    pub fn deep_copy(&mut self, id: MachineId) -> Result<MachineId> {
        let mut memo = HashMap::new();
        self.copy_into(id, &mut memo)
    }

    fn copy_into(&mut self, id: MachineId, memo: &mut HashMap<MachineId, MachineId>) -> Result<MachineId> {
        if let Some(copy) = memo.get(&id) {
            return Ok(*copy);
        }
        let (name, control, partitions) = {
            let node = self.get(id)?;
            (node.name.clone(), node.control.clone(), node.partitions.clone())
        };
        let copy = self.create(name, control);
        memo.insert(id, copy);
        self.get_mut(copy)?.partitions.resize_with(partitions.len().max(1), Vec::new);
        for (p, part) in partitions.iter().enumerate() {
            for child in part {
                let child_copy = self.copy_into(*child, memo)?;
                self.append(copy, child_copy, p)?;
            }
        }
        Ok(copy)
    }

    /// Render `id` for debugging, at most `max_depth` levels deep. Machines
    /// already rendered on the current path or elsewhere print as `@name`.
    ///
    /// ```text
    /// train[0: the, vehicle[0: thing]]
    /// ```
    pub fn to_debug_str(&self, id: MachineId, max_depth: usize) -> String {
        let mut out = String::new();
        let mut visited = HashSet::new();
        self.write_debug(id, 0, max_depth, &mut visited, &mut out);
        out
    }

    fn write_debug(
        &self,
        id: MachineId,
        depth: usize,
        max_depth: usize,
        visited: &mut HashSet<MachineId>,
        out: &mut String,
    ) {
        let Ok(node) = self.get(id) else {
            out.push_str("<stale>");
            return;
        };
        if !visited.insert(id) {
            let _ = write!(out, "@{}", node.name);
            return;
        }
        out.push_str(&node.name);
        if depth >= max_depth || node.partitions.iter().all(Vec::is_empty) {
            return;
        }
        out.push('[');
        let mut first_part = true;
        for (p, part) in node.partitions.iter().enumerate().filter(|(_, part)| !part.is_empty()) {
            if !first_part {
                out.push_str("; ");
            }
            first_part = false;
            let _ = write!(out, "{p}: ");
            for (i, child) in part.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.write_debug(*child, depth + 1, max_depth, visited, out);
            }
        }
        out.push(']');
    }

    /// Free every machine not reachable from `roots`. Returns how many were
    /// freed. Back-links pointing at freed machines are dropped from survivors.
    pub fn retain_reachable(&mut self, roots: impl IntoIterator<Item = MachineId>) -> usize {
        let mut reachable = HashSet::new();
        for root in roots {
            if reachable.contains(&root) {
                continue;
            }
            if let Ok(tree) = self.unique_machines_in_tree(root) {
                reachable.extend(tree);
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let id = MachineId { index: index as u32, generation: slot.generation };
            if slot.machine.is_some() && !reachable.contains(&id) {
                slot.machine = None;
                slot.generation += 1;
                self.free_list.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;

        if freed > 0 {
            for slot in self.slots.iter_mut() {
                if let Some(machine) = slot.machine.as_mut() {
                    machine.parents.retain(|(parent, _)| reachable.contains(parent));
                }
            }
            tracing::debug!(freed, live = self.live, "released unreachable machines");
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn append_links_both_sides() {
        let mut g = MachineGraph::new();
        let train = g.create("train", None);
        let the = g.create("the", None);
        g.append(train, the, 0).unwrap();

        assert_eq!(g.get(train).unwrap().partition(0), &[the]);
        assert!(g.get(the).unwrap().parents().contains(&(train, 0)));
    }

    #[test]
    fn append_extends_partitions() {
        let mut g = MachineGraph::new();
        let go = g.create("go", None);
        let to = g.create("TO", None);
        g.append(go, to, 3).unwrap();

        let node = g.get(go).unwrap();
        assert_eq!(node.partitions().len(), 4);
        assert!(node.partition(1).is_empty());
        assert_eq!(node.partition(3), &[to]);
    }

    #[test]
    fn remove_from_specific_partition_requires_presence() {
        let mut g = MachineGraph::new();
        let a = g.create("a", None);
        let b = g.create("b", None);
        g.append(a, b, 1).unwrap();

        assert!(matches!(g.remove(a, b, Some(0)), Err(Error::NotFound { partition: 0, .. })));
        g.remove(a, b, Some(1)).unwrap();
        assert!(g.get(a).unwrap().partition(1).is_empty());
        assert!(g.get(b).unwrap().parents().is_empty());
    }

    #[test]
    fn remove_from_all_partitions_skips_absent() {
        let mut g = MachineGraph::new();
        let a = g.create("a", None);
        let b = g.create("b", None);
        g.append(a, b, 0).unwrap();
        g.append(a, b, 2).unwrap();

        g.remove(a, b, None).unwrap();
        assert!(g.children(a).unwrap().is_empty());
        assert!(g.get(b).unwrap().parents().is_empty());
        // Nothing left to remove: still fine.
        g.remove(a, b, None).unwrap();
    }

    #[test]
    fn children_are_deduplicated() {
        let mut g = MachineGraph::new();
        let a = g.create("a", None);
        let b = g.create("b", None);
        let c = g.create("c", None);
        g.append(a, b, 0).unwrap();
        g.append(a, c, 1).unwrap();
        g.append(a, b, 2).unwrap();

        assert_eq!(g.children(a).unwrap(), vec![b, c]);
    }

    #[test]
    fn unique_machines_terminates_on_cycles() {
        let mut g = MachineGraph::new();
        let a = g.create("a", None);
        let b = g.create("b", None);
        g.append(a, b, 1).unwrap();
        g.append(b, a, 0).unwrap();
        g.append(a, a, 2).unwrap();

        let tree = g.unique_machines_in_tree(a).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0], a);
    }

    #[test]
    fn deep_copy_preserves_shape_and_cycles() {
        let mut g = MachineGraph::new();
        let root = g.create("root", Some(Control::Concept));
        let shared = g.create("shared", None);
        let left = g.create("left", None);
        g.append(root, left, 1).unwrap();
        g.append(root, shared, 2).unwrap();
        g.append(left, shared, 0).unwrap();
        g.append(shared, root, 0).unwrap();

        let copy = g.deep_copy(root).unwrap();
        let original: HashSet<_> = g.unique_machines_in_tree(root).unwrap().into_iter().collect();
        let copied = g.unique_machines_in_tree(copy).unwrap();

        assert_eq!(copied.len(), 3);
        assert!(copied.iter().all(|m| !original.contains(m)));
        assert_eq!(g.control(copy).unwrap(), Some(&Control::Concept));

        let copy_node = g.get(copy).unwrap();
        let left_copy = copy_node.partition(1)[0];
        let shared_copy = copy_node.partition(2)[0];
        assert_eq!(g.name(left_copy).unwrap(), "left");
        assert_eq!(g.get(left_copy).unwrap().partition(0), &[shared_copy]);
        assert_eq!(g.get(shared_copy).unwrap().partition(0), &[copy]);
        assert!(g.get(shared_copy).unwrap().parents().contains(&(left_copy, 0)));
        assert!(g.get(copy).unwrap().parents().contains(&(shared_copy, 0)));
    }

    #[test]
    fn debug_str_marks_revisits() {
        let mut g = MachineGraph::new();
        let a = g.create("a", None);
        let b = g.create("b", None);
        g.append(a, b, 0).unwrap();
        g.append(b, a, 1).unwrap();

        assert_eq!(g.to_debug_str(a, 5), "a[0: b[1: @a]]");
        assert_eq!(g.to_debug_str(a, 0), "a");
    }

    #[test]
    fn retain_reachable_invalidates_handles() {
        let mut g = MachineGraph::new();
        let keep = g.create("keep", None);
        let child = g.create("child", None);
        let drop = g.create("drop", None);
        g.append(keep, child, 0).unwrap();
        g.append(drop, child, 1).unwrap();

        assert_eq!(g.retain_reachable([keep]), 1);
        assert_eq!(g.len(), 2);
        assert!(matches!(g.get(drop), Err(Error::StaleMachine(_))));
        assert_eq!(g.get(child).unwrap().parents().len(), 1);

        let reused = g.create("new", None);
        assert_ne!(reused, drop);
        assert!(g.append(keep, drop, 0).is_err());
    }

    #[test]
    fn replace_control_swaps() {
        let mut g = MachineGraph::new();
        let m = g.create("m", Some(Control::Pos("NOUN".into())));
        let old = g.replace_control(m, Some(Control::Concept)).unwrap();
        assert_eq!(old, Some(Control::Pos("NOUN".into())));
        assert_eq!(g.control(m).unwrap(), Some(&Control::Concept));
    }

    proptest! {
        #[test]
        fn append_then_remove_round_trips(partition in 0usize..6, extra in 0usize..4) {
            let mut g = MachineGraph::new();
            let m = g.create("m", None);
            let c = g.create("c", None);
            for i in 0..extra {
                let other = g.create(format!("o{i}"), None);
                g.append(m, other, partition).unwrap();
            }
            g.append(m, c, partition).unwrap();
            g.remove(m, c, Some(partition)).unwrap();

            prop_assert!(!g.get(m).unwrap().partition(partition).contains(&c));
            prop_assert!(!g.get(c).unwrap().parents().contains(&(m, partition)));
        }

        #[test]
        fn append_is_idempotent(partition in 0usize..6, repeats in 1usize..5) {
            let mut g = MachineGraph::new();
            let m = g.create("m", None);
            let c = g.create("c", None);
            g.append(m, c, partition).unwrap();
            let before = g.get(m).unwrap().partition(partition).len();
            for _ in 0..repeats {
                g.append(m, c, partition).unwrap();
            }
            prop_assert_eq!(g.get(m).unwrap().partition(partition).len(), before);
            prop_assert_eq!(g.get(c).unwrap().parents().len(), 1);
        }

        #[test]
        fn deep_copy_of_random_graph_is_isomorphic(edges in proptest::collection::vec((0usize..6, 0usize..6, 0usize..3), 0..20)) {
            let mut g = MachineGraph::new();
            let nodes: Vec<_> = (0..6).map(|i| g.create(format!("n{i}"), None)).collect();
            for (from, to, p) in edges {
                g.append(nodes[from], nodes[to], p).unwrap();
            }
            let original = g.unique_machines_in_tree(nodes[0]).unwrap();
            let copy = g.deep_copy(nodes[0]).unwrap();
            let copied = g.unique_machines_in_tree(copy).unwrap();

            prop_assert_eq!(original.len(), copied.len());
            let original_set: HashSet<_> = original.iter().copied().collect();
            prop_assert!(copied.iter().all(|m| !original_set.contains(m)));
            for (o, c) in original.iter().zip(copied.iter()) {
                let on = g.get(*o).unwrap();
                let cn = g.get(*c).unwrap();
                prop_assert_eq!(on.name(), cn.name());
                let o_shape: Vec<usize> = on.partitions().iter().map(Vec::len).collect();
                let c_shape: Vec<usize> = cn.partitions().iter().map(Vec::len).collect();
                prop_assert_eq!(o_shape, c_shape);
            }
        }
    }
}
