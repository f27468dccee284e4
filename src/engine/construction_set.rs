//! Construction tables.
//!
//! A `ConstructionSet` owns the compiled constructions for a run and indexes
//! them by `ConstructionKind`, so each driver phase only walks its own list:
//!
//! ```text
//! constructions ──┬── Chunk    ─▶ chunk reduction
//!                 ├── Semantic ─▶ permutation search
//!                 └── Avm      ─▶ per-machine filling
//! ```
//!
//! Insertion order is preserved inside each kind; earlier constructions win ties.

use crate::construction::{Construction, ConstructionKind};

#[derive(Debug, Default)]
pub struct ConstructionSet {
    chunk: Vec<Box<dyn Construction>>,
    semantic: Vec<Box<dyn Construction>>,
    avm: Vec<Box<dyn Construction>>,
}

impl ConstructionSet {
    pub fn new(constructions: impl IntoIterator<Item = Box<dyn Construction>>) -> Self {
        let mut set = ConstructionSet::default();
        set.extend(constructions);
        set
    }

    pub fn push(&mut self, construction: Box<dyn Construction>) {
        match construction.kind() {
            ConstructionKind::Chunk => self.chunk.push(construction),
            ConstructionKind::Semantic => self.semantic.push(construction),
            ConstructionKind::Avm => self.avm.push(construction),
        }
    }

    pub fn extend(&mut self, constructions: impl IntoIterator<Item = Box<dyn Construction>>) {
        for construction in constructions {
            self.push(construction);
        }
    }

    pub fn len(&self) -> usize {
        self.chunk.len() + self.semantic.len() + self.avm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<&str> {
        self.chunk.iter().chain(&self.semantic).chain(&self.avm).map(|c| c.name()).collect()
    }

    pub fn chunk_mut(&mut self) -> &mut [Box<dyn Construction>] {
        &mut self.chunk
    }

    pub fn semantic_mut(&mut self) -> &mut [Box<dyn Construction>] {
        &mut self.semantic
    }

    pub fn avm(&self) -> &[Box<dyn Construction>] {
        &self.avm
    }

    pub fn avm_mut(&mut self) -> &mut [Box<dyn Construction>] {
        &mut self.avm
    }

    /// Forget per-sentence state in every construction.
    pub fn reset(&mut self) {
        for construction in self.chunk.iter_mut().chain(&mut self.semantic).chain(&mut self.avm) {
            construction.reset();
        }
    }
}
