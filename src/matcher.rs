//! Boolean predicates over a single machine.
//!
//! Matchers guard automaton transitions. They never fail: a stale handle, a
//! missing control or a control of the wrong kind all evaluate to `false`, so a
//! bad machine can only ever make a construction not match.
//!
//! ```text
//! Printname("^the$")        name regex
//! Pos("CAS<ABL>")           regex over a POS / KR control
//! Concept                   concept marker
//! ControlKind(PLUGIN)       control kind in a set
//! Enum("vehicle")           IS_A-derived member set
//! FileContains(path)        string set loaded from a file
//! Not / And / Or            short-circuiting combinators
//! ```

use crate::graph::{ControlKind, MachineGraph, MachineId};
use crate::{Error, Lexicon, Result};
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub enum Matcher {
    Printname(Regex),
    Pos(Regex),
    Concept,
    ControlKind(ControlKind),
    Enum { name: String, members: HashSet<String> },
    FileContains { path: String, members: HashSet<String> },
    Not(Box<Matcher>),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
}

impl Matcher {
    /// Printname regex, searched anywhere in the name.
    pub fn printname(pattern: &str) -> Result<Matcher> {
        Ok(Matcher::Printname(Regex::new(pattern)?))
    }

    /// Printname equal to `name`.
    pub fn printname_exact(name: &str) -> Matcher {
        match Regex::new(&format!("^{}$", regex::escape(name))) {
            Ok(re) => Matcher::Printname(re),
            // An escaped literal always compiles; fall back to a matcher that
            // compares nothing rather than panicking.
            Err(_) => Matcher::Or(Vec::new()),
        }
    }

    pub fn pos(pattern: &str) -> Result<Matcher> {
        Ok(Matcher::Pos(Regex::new(pattern)?))
    }

    /// Members of the `name` enumeration: every static machine that IS_A
    /// `name` according to the lexicon. Computed once, here.
    pub fn enumeration(name: &str, lexicon: &Lexicon) -> Matcher {
        let members = lexicon.is_a_members(name);
        tracing::trace!(enumeration = name, members = members.len(), "built enum matcher");
        Matcher::Enum { name: name.to_string(), members }
    }

    /// Printname contained in a file of strings, one per line.
    pub fn file_contains(path: &str) -> Result<Matcher> {
        let text =
            std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_string(), source })?;
        let members = text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
        Ok(Matcher::FileContains { path: path.to_string(), members })
    }

    #[must_use]
    pub fn negate(self) -> Matcher {
        Matcher::Not(Box::new(self))
    }

    pub fn matches(&self, graph: &MachineGraph, machine: MachineId) -> bool {
        match self.try_match(graph, machine) {
            Ok(result) => result,
            Err(err) => {
                tracing::trace!(error = %err, matcher = ?self, "matcher evaluation failed, treating as no match");
                false
            }
        }
    }

    fn try_match(&self, graph: &MachineGraph, machine: MachineId) -> Result<bool> {
        Ok(match self {
            Matcher::Printname(re) => re.is_match(graph.name(machine)?),
            Matcher::Pos(re) => match graph.control(machine)?.and_then(|c| c.pos_string()) {
                Some(pos) => re.is_match(&pos),
                None => false,
            },
            Matcher::Concept => graph.control(machine)?.is_some_and(|c| c.kind() == ControlKind::CONCEPT),
            Matcher::ControlKind(kinds) => graph.control(machine)?.is_some_and(|c| kinds.contains(c.kind())),
            Matcher::Enum { members, .. } | Matcher::FileContains { members, .. } => {
                members.contains(graph.name(machine)?)
            }
            Matcher::Not(inner) => !inner.matches(graph, machine),
            Matcher::And(all) => all.iter().all(|m| m.matches(graph, machine)),
            Matcher::Or(any) => any.iter().any(|m| m.matches(graph, machine)),
        })
    }
}
