//! Chunk reduction.
//!
//! Each chunk (a phrase from the analyzer) is rewritten bottom-up by the chunk
//! constructions until none fires:
//!
//! ```text
//! [the, old, train]          windows of 3, then 2, then 1, left to right
//!   adj_noun(old, train)  -> [the, train]     restart from the top
//!   det_noun(the, train)  -> [train]          restart, nothing fires
//! ```
//!
//! A rewrite counts only when `act` returns a sequence different from the
//! window it replaced.

use crate::construction::Construction;
use crate::graph::MachineId;
use crate::{Lexicon, Result};

/// Reduce `chunk` in place. Returns the number of rewrites applied.
///
/// `max_rewrites` bounds constructions that keep producing new sequences.
pub(crate) fn reduce_chunk(
    lexicon: &mut Lexicon,
    constructions: &mut [Box<dyn Construction>],
    chunk: &mut Vec<MachineId>,
    max_rewrites: usize,
) -> Result<usize> {
    let mut rewrites = 0;
    while rewrites < max_rewrites {
        if !rewrite_once(lexicon, constructions, chunk)? {
            return Ok(rewrites);
        }
        rewrites += 1;
    }
    tracing::warn!(rewrites, "chunk reduction hit its rewrite cap");
    Ok(rewrites)
}

fn rewrite_once(
    lexicon: &mut Lexicon,
    constructions: &mut [Box<dyn Construction>],
    chunk: &mut Vec<MachineId>,
) -> Result<bool> {
    for len in (1..=chunk.len()).rev() {
        for start in 0..=chunk.len() - len {
            let window: Vec<MachineId> = chunk[start..start + len].to_vec();
            for construction in constructions.iter_mut() {
                if !construction.check(lexicon.graph(), &window)? {
                    continue;
                }
                let Some(replacement) = construction.act(lexicon, &window)? else { continue };
                if replacement == window {
                    continue;
                }
                tracing::trace!(construction = construction.name(), start, len, "chunk rewrite");
                chunk.splice(start..start + len, replacement);
                return Ok(true);
            }
        }
    }
    Ok(false)
}
