use crate::engine::{ConstructionSet, RunMetrics, SpreadingActivation};
use crate::graph::{Control, MachineId, Message};
use crate::{Lexicon, Result};
use std::time::{Duration, Instant};

/// Options that bound a spreading-activation run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Longest permutation of active machines tried by semantic constructions.
    pub max_arity: usize,
    /// Extra iterations allowed once the first plugin machine is active.
    pub safety_iterations: usize,
    /// Hard cap on main-loop iterations. A heuristic cutoff, not a
    /// convergence guarantee.
    pub max_iterations: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options { max_arity: 3, safety_iterations: 2, max_iterations: 64 }
    }
}

/// One pre-analysed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedToken {
    /// Surface form, as written.
    pub surface: String,
    /// Stem; becomes the machine printname.
    pub stem: String,
    /// Analyzer tag, `stem/CODE` or a bare `CODE`.
    pub tag: String,
}

impl AnalyzedToken {
    pub fn new(surface: impl Into<String>, stem: impl Into<String>, tag: impl Into<String>) -> Self {
        AnalyzedToken { surface: surface.into(), stem: stem.into(), tag: tag.into() }
    }
}

/// A phrase from the analyzer with its optional case label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    pub tokens: Vec<AnalyzedToken>,
    pub case: Option<String>,
}

impl Chunk {
    pub fn new(tokens: Vec<AnalyzedToken>) -> Self {
        Chunk { tokens, case: None }
    }

    #[must_use]
    pub fn with_case(mut self, case: impl Into<String>) -> Self {
        self.case = Some(case.into());
        self
    }
}

/// Result from [`analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Plugin messages and satisfied AVM dictionaries.
    pub messages: Vec<Message>,
    /// Each chunk after reduction. Handles stay valid until the lexicon's
    /// active set is cleared.
    pub chunks: Vec<Vec<MachineId>>,
    /// Indices of chunks that did not reduce to one machine.
    pub unreduced_chunks: Vec<usize>,
    pub metrics: RunMetrics,
    /// Total elapsed time, token conversion included.
    pub elapsed: Duration,
}

impl Analysis {
    /// Every chunk reduced to exactly one machine.
    pub fn is_fully_reduced(&self) -> bool {
        self.unreduced_chunks.is_empty()
    }
}

/// Analyse one sentence.
///
/// Clears the previous sentence's active set, turns every token into a machine
/// (printname = stem, control from the tag), then runs spreading activation.
/// A chunk case label is written into the `CAS` feature of the chunk's last
/// token when its KR code carries no case yet.
pub fn analyze(
    lexicon: &mut Lexicon,
    constructions: &mut ConstructionSet,
    sentence: &[Chunk],
    options: &Options,
) -> Result<Analysis> {
    let started = Instant::now();
    lexicon.clear_active();
    constructions.reset();

    let mut chunks = Vec::with_capacity(sentence.len());
    for chunk in sentence {
        let mut machines = Vec::with_capacity(chunk.tokens.len());
        for (index, token) in chunk.tokens.iter().enumerate() {
            let mut control = Control::from_tag(&token.tag)?;
            if let (Some(case), Control::Kr(code)) = (&chunk.case, &mut control) {
                if index + 1 == chunk.tokens.len() && code.get("CAS").is_none() {
                    code.set("CAS", case.clone());
                }
            }
            machines.push(lexicon.graph_mut().create(token.stem.clone(), Some(control)));
        }
        chunks.push(machines);
    }

    let outcome = SpreadingActivation::new(lexicon, constructions, options).run(chunks)?;
    Ok(Analysis {
        messages: outcome.messages,
        chunks: outcome.chunks,
        unreduced_chunks: outcome.unreduced,
        metrics: outcome.metrics,
        elapsed: started.elapsed(),
    })
}

/// Analyse many sentences. A failing sentence is logged and skipped; the
/// result pairs each successful analysis with its sentence index.
pub fn analyze_batch(
    lexicon: &mut Lexicon,
    constructions: &mut ConstructionSet,
    sentences: &[Vec<Chunk>],
    options: &Options,
) -> Vec<(usize, Analysis)> {
    let mut out = Vec::with_capacity(sentences.len());
    for (index, sentence) in sentences.iter().enumerate() {
        match analyze(lexicon, constructions, sentence, options) {
            Ok(analysis) => out.push((index, analysis)),
            Err(error) => tracing::warn!(sentence = index, error = %error, "skipping sentence"),
        }
    }
    out
}
