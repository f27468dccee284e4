//! The spreading-activation driver.
//!
//! One run per sentence, single-threaded, mutating the lexicon's graph in
//! place:
//!
//! ```text
//! seed tokens ─▶ chunk reduction ─▶ ┌─ (a) expand unexpanded actives
//!                                   │  (b) semantic constructions over permutations
//!                                   │  (c) AVM constructions per machine
//!                                   │  (d) activate()
//!                                   └─ (e) grew? ──yes──┘
//!                                           │ no / AVM satisfied / safety out / cap
//!                                           ▼
//!                                  plugin + AVM messages
//! ```
//!
//! An iteration changed something when a semantic construction fired, the
//! active machine count grew or an AVM slot was filled. Constructions reject
//! sequences they already applied, so firing dries up. Once the
//! first plugin machine shows up, at most `safety_iterations` more iterations
//! run.

use super::chunker::reduce_chunk;
use super::construction_set::ConstructionSet;
use super::metrics::{IterationMetrics, RunMetrics, StopReason};
use crate::construction::Construction;
use crate::graph::{Control, MachineId, Message};
use crate::{Lexicon, Options, Result};
use std::time::Instant;

/// Result of a driver run.
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    /// Chunks after reduction, in input order.
    pub chunks: Vec<Vec<MachineId>>,
    /// Indices of chunks that did not reduce to a single machine.
    pub unreduced: Vec<usize>,
    /// Compiled plugin messages, then satisfied AVM dictionaries.
    pub messages: Vec<Message>,
    pub metrics: RunMetrics,
}

pub struct SpreadingActivation<'a> {
    lexicon: &'a mut Lexicon,
    constructions: &'a mut ConstructionSet,
    options: &'a Options,
}

impl<'a> SpreadingActivation<'a> {
    pub fn new(lexicon: &'a mut Lexicon, constructions: &'a mut ConstructionSet, options: &'a Options) -> Self {
        SpreadingActivation { lexicon, constructions, options }
    }

    /// Register every chunk machine as active, reduce the chunks and run the
    /// main loop to its fixpoint.
    pub fn run(&mut self, chunks: Vec<Vec<MachineId>>) -> Result<ActivationOutcome> {
        let started = Instant::now();
        let mut metrics = RunMetrics::default();

        for chunk in &chunks {
            self.lexicon.add_active(chunk.iter().copied())?;
        }

        let chunking = Instant::now();
        let mut reduced = Vec::with_capacity(chunks.len());
        let mut unreduced = Vec::new();
        let max_rewrites = self.options.max_iterations.max(1) * chunks.iter().map(Vec::len).sum::<usize>().max(1);
        for (index, mut chunk) in chunks.into_iter().enumerate() {
            metrics.rewrites += reduce_chunk(self.lexicon, self.constructions.chunk_mut(), &mut chunk, max_rewrites)?;
            if chunk.len() != 1 {
                tracing::debug!(chunk = index, machines = chunk.len(), "chunk did not reduce to one machine");
                unreduced.push(index);
            }
            reduced.push(chunk);
        }
        metrics.chunking = chunking.elapsed();

        metrics.stop = self.saturate(&mut metrics.iterations)?;
        let messages = self.messages()?;
        metrics.total = started.elapsed();
        tracing::debug!(
            iterations = metrics.iterations.len(),
            messages = messages.len(),
            stop = ?metrics.stop,
            "spreading activation finished"
        );
        Ok(ActivationOutcome { chunks: reduced, unreduced, messages, metrics })
    }

    fn saturate(&mut self, iterations: &mut Vec<IterationMetrics>) -> Result<StopReason> {
        let mut first_plugin: Option<usize> = None;
        loop {
            if iterations.len() >= self.options.max_iterations {
                tracing::warn!(max_iterations = self.options.max_iterations, "spreading activation hit its iteration cap");
                return Ok(StopReason::IterationCap);
            }
            let iteration = iterations.len() + 1;
            let started = Instant::now();
            let before = self.growth();
            let mut pass = IterationMetrics::default();

            // (a)
            for machine in self.lexicon.get_unexpanded() {
                self.lexicon.expand(machine)?;
                pass.expanded += 1;
            }

            // (b)
            for construction in self.constructions.semantic_mut() {
                if apply_semantic(self.lexicon, construction.as_mut(), self.options.max_arity)? {
                    pass.semantic_fired += 1;
                }
            }

            // (c)
            let mut satisfied = false;
            for construction in self.constructions.avm_mut() {
                let filled_before = construction.filled_slots();
                for machine in self.lexicon.active_machines() {
                    if construction.check(self.lexicon.graph(), &[machine])? {
                        construction.act(self.lexicon, &[machine])?;
                    }
                }
                pass.avm_filled += construction.filled_slots() - filled_before;
                satisfied |= construction.message(self.lexicon.graph()).is_some();
            }

            // (d)
            pass.activated = self.lexicon.activate()?.len();

            pass.active = self.lexicon.active_len();
            pass.duration = started.elapsed();
            tracing::trace!(
                iteration,
                expanded = pass.expanded,
                fired = pass.semantic_fired,
                filled = pass.avm_filled,
                activated = pass.activated,
                active = pass.active,
                "activation iteration"
            );
            let fired = pass.semantic_fired;
            iterations.push(pass);

            if satisfied {
                return Ok(StopReason::AvmSatisfied);
            }
            if first_plugin.is_none() && self.has_plugin() {
                first_plugin = Some(iteration);
            }
            if let Some(found) = first_plugin {
                if iteration - found >= self.options.safety_iterations {
                    return Ok(StopReason::SafetyExhausted);
                }
            }
            // (e)
            if fired == 0 && self.growth() <= before {
                return Ok(StopReason::NoGrowth);
            }
        }
    }

    fn growth(&self) -> usize {
        self.lexicon.active_len() + self.constructions.avm().iter().map(|c| c.filled_slots()).sum::<usize>()
    }

    fn plugin_machines(&self) -> Vec<MachineId> {
        let graph = self.lexicon.graph();
        self.lexicon
            .active_machines()
            .into_iter()
            .filter(|m| matches!(graph.control(*m), Ok(Some(Control::Plugin(_)))))
            .collect()
    }

    fn has_plugin(&self) -> bool {
        !self.plugin_machines().is_empty()
    }

    fn messages(&self) -> Result<Vec<Message>> {
        let graph = self.lexicon.graph();
        let mut messages = Vec::new();
        for machine in self.plugin_machines() {
            if let Some(Control::Plugin(control)) = graph.control(machine)? {
                if let Some(message) = control.compile_message(graph, machine) {
                    messages.push(message);
                }
            }
        }
        messages.extend(self.constructions.avm().iter().filter_map(|c| c.message(graph)));
        Ok(messages)
    }
}

/// Try `construction` on every permutation of active machines up to
/// `max_arity`, longest first, and act on the first candidate that succeeds.
/// The replacement machines are merged into the working set.
fn apply_semantic(lexicon: &mut Lexicon, construction: &mut dyn Construction, max_arity: usize) -> Result<bool> {
    let active = lexicon.active_machines();
    let mut candidates = Vec::new();
    for len in (1..=max_arity.min(active.len())).rev() {
        for seq in permutations(&active, len) {
            if construction.check(lexicon.graph(), &seq)? {
                candidates.push(seq);
            }
        }
    }

    for seq in candidates {
        if let Some(result) = construction.act(lexicon, &seq)? {
            tracing::trace!(construction = construction.name(), arity = seq.len(), "semantic construction fired");
            lexicon.merge_active(result)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Ordered selections of `len` distinct items, in index order.
pub(crate) fn permutations(items: &[MachineId], len: usize) -> Vec<Vec<MachineId>> {
    fn walk(items: &[MachineId], len: usize, used: &mut [bool], current: &mut Vec<MachineId>, out: &mut Vec<Vec<MachineId>>) {
        if current.len() == len {
            out.push(current.clone());
            return;
        }
        for (index, item) in items.iter().enumerate() {
            if used[index] {
                continue;
            }
            used[index] = true;
            current.push(*item);
            walk(items, len, used, current, out);
            current.pop();
            used[index] = false;
        }
    }

    let mut out = Vec::new();
    if len > items.len() {
        return out;
    }
    let mut used = vec![false; items.len()];
    walk(items, len, &mut used, &mut Vec::with_capacity(len), &mut out);
    out
}
