//! Spreading-activation engine.
//!
//! The engine is split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! constructions ──┐
//!                 │  ConstructionSet::new        (construction_set.rs)
//!                 └──────────┬──────────────
//!                            │
//! token machines ────────────┼─ reduce_chunk     (chunker.rs)
//!                            │    - longest window first
//!                            │    - restart on every rewrite
//!                            v
//!              SpreadingActivation::run           (activation.rs)
//!                - expand unexpanded actives
//!                - semantic constructions over permutations
//!                - AVM filling
//!                - activate()
//!                - iterate until no growth
//!                            │
//!                            v
//!                 plugin / AVM messages + RunMetrics (metrics.rs)
//! ```
//!
//! The loop leans on saturation: one construction can create or link machines
//! that enable another on the next iteration. Termination comes from the
//! no-growth test, the safety budget after the first plugin machine, and the
//! `Options::max_iterations` cap.
//!
//! ## Debugging
//!
//! Every phase emits `tracing` events: `trace` per rewrite and iteration,
//! `debug` per run, `warn` when a cap is hit.

#[path = "engine/activation.rs"]
mod activation;
#[path = "engine/chunker.rs"]
mod chunker;
#[path = "engine/construction_set.rs"]
mod construction_set;
#[path = "engine/metrics.rs"]
mod metrics;


pub use activation::{ActivationOutcome, SpreadingActivation};
pub use construction_set::ConstructionSet;
pub use metrics::{IterationMetrics, RunMetrics, StopReason};
