//! Engine run metrics.
//!
//! Small structs used to observe a spreading-activation run: how long chunk
//! reduction took, and what each loop iteration expanded, fired and
//! activated. They are always collected; the counters are cheap.

use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for the run.
    pub total: Duration,
    /// Time spent in chunk reduction.
    pub chunking: Duration,
    /// Successful chunk rewrites.
    pub rewrites: usize,
    /// One entry per main-loop iteration.
    pub iterations: Vec<IterationMetrics>,
    /// Why the main loop stopped.
    pub stop: StopReason,
}

/// Counters for a single main-loop iteration.
#[derive(Debug, Default, Clone)]
pub struct IterationMetrics {
    pub duration: Duration,
    /// Machines expanded in step (a).
    pub expanded: usize,
    /// Semantic constructions whose `act` succeeded.
    pub semantic_fired: usize,
    /// AVM slots filled during this iteration.
    pub avm_filled: usize,
    /// Static entries promoted by `activate`.
    pub activated: usize,
    /// Active machines at the end of the iteration.
    pub active: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Active count plus filled AVM slots did not grow.
    #[default]
    NoGrowth,
    /// An AVM construction became satisfied.
    AvmSatisfied,
    /// The extra iterations after the first plugin machine ran out.
    SafetyExhausted,
    /// The `max_iterations` cap was hit.
    IterationCap,
}
