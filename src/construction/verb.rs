//! Verb argument linking.
//!
//! The verb's static definition names the deep cases it expects: every child of
//! a partition `p >= 1` whose printname is a known deep case yields an argument
//! `(case, p)`. With `n` arguments the automaton is a pre-verb state plus an
//! `n`-dimensional hypercube, one bit per argument:
//!
//! ```text
//!           verb
//!   pre ───────────▶ 00 ──FROM──▶ 01
//!   (init)       (init)│           │TO
//!                      TO          ▼
//!                      └────────▶ 10 ──FROM──▶ 11 (final)
//! ```
//!
//! Every ordering of the arguments reaches the all-ones state; the verb token
//! itself may be absent from the sequence.

use super::{Construction, ConstructionKind};
use crate::graph::{Control, MachineGraph, MachineId};
use crate::{Error, Fsa, Lexicon, Matcher, Result};
use std::collections::BTreeMap;

/// Largest supported argument count (the cube has `2^n` states).
const MAX_ARGUMENTS: usize = 8;

/// Deep case name → matcher recognising an argument in that case.
#[derive(Debug, Clone)]
pub struct DeepCaseTable {
    cases: BTreeMap<String, Matcher>,
}

impl Default for DeepCaseTable {
    /// Locative cases over KR case features.
    fn default() -> Self {
        DeepCaseTable::new()
            .with_case("FROM", Matcher::Pos(regex!(r"<CAS<(ABL|ELA|DEL)>>").clone()))
            .with_case("TO", Matcher::Pos(regex!(r"<CAS<(ALL|ILL|SBL|TER)>>").clone()))
            .with_case("AT", Matcher::Pos(regex!(r"<CAS<(ADE|INE|SUE)>>").clone()))
            .with_case("AGT", Matcher::Pos(regex!(r"<CAS<NOM>>").clone()))
            .with_case("PAT", Matcher::Pos(regex!(r"<CAS<ACC>>").clone()))
    }
}

impl DeepCaseTable {
    pub fn new() -> Self {
        DeepCaseTable { cases: BTreeMap::new() }
    }

    #[must_use]
    pub fn with_case(mut self, case: impl Into<String>, matcher: Matcher) -> Self {
        self.insert(case, matcher);
        self
    }

    pub fn insert(&mut self, case: impl Into<String>, matcher: Matcher) {
        self.cases.insert(case.into(), matcher);
    }

    pub fn get(&self, case: &str) -> Option<&Matcher> {
        self.cases.get(case)
    }

    pub fn contains(&self, case: &str) -> bool {
        self.cases.contains_key(case)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Argument {
    case: String,
    partition: usize,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
pub struct VerbConstruction {
    name: String,
    verb: String,
    static_control: Option<Control>,
    arguments: Vec<Argument>,
    fsa: Fsa,
}

impl VerbConstruction {
    /// Build the construction for `verb` from its static definition. `None`
    /// when the verb is unknown or expects no deep case.
    pub fn from_lexicon(verb: &str, lexicon: &Lexicon, cases: &DeepCaseTable) -> Result<Option<Self>> {
        let Some(definition) = lexicon.static_machine(verb) else {
            tracing::debug!(verb, "no static definition for verb");
            return Ok(None);
        };
        let graph = lexicon.graph();
        let mut arguments = Vec::new();
        for (case, partition) in Self::discover_arguments(graph, definition, cases)? {
            if let Some(matcher) = cases.get(&case) {
                arguments.push(Argument { case, partition, matcher: matcher.clone() });
            }
        }
        if arguments.is_empty() {
            return Ok(None);
        }
        if arguments.len() > MAX_ARGUMENTS {
            tracing::warn!(verb, arguments = arguments.len(), "too many deep cases, keeping the first {MAX_ARGUMENTS}");
            arguments.truncate(MAX_ARGUMENTS);
        }

        let static_control = graph.control(definition)?.cloned();
        let fsa = Self::hypercube(verb, &arguments);
        tracing::trace!(verb, arguments = arguments.len(), states = fsa.state_count(), "built verb construction");
        Ok(Some(VerbConstruction { name: format!("verb:{verb}"), verb: verb.to_string(), static_control, arguments, fsa }))
    }

    /// `(case, partition)` pairs for every deep-case child of the argument
    /// partitions of `definition`, in partition order.
    pub fn discover_arguments(
        graph: &MachineGraph,
        definition: MachineId,
        cases: &DeepCaseTable,
    ) -> Result<Vec<(String, usize)>> {
        let node = graph.get(definition)?;
        let mut found = Vec::new();
        for (partition, part) in node.partitions().iter().enumerate().skip(1) {
            for child in part {
                let name = graph.name(*child)?;
                if cases.contains(name) {
                    found.push((name.to_string(), partition));
                }
            }
        }
        Ok(found)
    }

    fn hypercube(verb: &str, arguments: &[Argument]) -> Fsa {
        let mut fsa = Fsa::new();
        let pre = fsa.add_state(true, false);
        let full = (1usize << arguments.len()) - 1;
        let cube: Vec<_> = (0..=full).map(|mask| fsa.add_state(mask == 0, mask == full)).collect();
        fsa.add_transition(pre, Matcher::printname_exact(verb), cube[0]);
        for mask in 0..=full {
            for (bit, argument) in arguments.iter().enumerate() {
                if mask & (1 << bit) == 0 {
                    fsa.add_transition(cube[mask], argument.matcher.clone(), cube[mask | (1 << bit)]);
                }
            }
        }
        fsa
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Expected `(case, partition)` pairs.
    pub fn arguments(&self) -> Vec<(&str, usize)> {
        self.arguments.iter().map(|a| (a.case.as_str(), a.partition)).collect()
    }

    pub fn automaton(&self) -> &Fsa {
        &self.fsa
    }

    /// Assign each machine of `args` to a distinct argument it matches.
    fn assign(&self, graph: &MachineGraph, args: &[MachineId]) -> Option<Vec<usize>> {
        fn search(
            this: &VerbConstruction,
            graph: &MachineGraph,
            args: &[MachineId],
            used: &mut Vec<bool>,
            out: &mut Vec<usize>,
        ) -> bool {
            let Some(machine) = args.get(out.len()) else { return true };
            for (slot, argument) in this.arguments.iter().enumerate() {
                if used[slot] || !argument.matcher.matches(graph, *machine) {
                    continue;
                }
                used[slot] = true;
                out.push(slot);
                if search(this, graph, args, used, out) {
                    return true;
                }
                out.pop();
                used[slot] = false;
            }
            false
        }

        let mut used = vec![false; self.arguments.len()];
        let mut out = Vec::with_capacity(args.len());
        search(self, graph, args, &mut used, &mut out).then_some(out)
    }
}

impl Construction for VerbConstruction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstructionKind {
        ConstructionKind::Semantic
    }

    fn check(&mut self, graph: &MachineGraph, seq: &[MachineId]) -> Result<bool> {
        self.fsa.accepts(graph, seq)
    }

    /// Sequences whose arguments all already hang off the verb (the verb token
    /// in `seq` if present, else any machine with the verb's printname) in an
    /// argument partition are not linked again.
    fn last_check(&self, graph: &MachineGraph, seq: &[MachineId]) -> bool {
        let token = seq.iter().copied().find(|m| graph.name(*m).is_ok_and(|n| n == self.verb));
        let mut args = seq.iter().copied().filter(|m| Some(*m) != token).peekable();
        if args.peek().is_none() {
            return true;
        }
        let linked = |machine: MachineId| {
            graph.get(machine).is_ok_and(|node| {
                node.parents().iter().any(|(parent, index)| {
                    let is_verb = match token {
                        Some(token) => *parent == token,
                        None => graph.name(*parent).is_ok_and(|n| n == self.verb),
                    };
                    is_verb && self.arguments.iter().any(|a| a.partition == *index)
                })
            })
        };
        !args.all(linked)
    }

    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        if !self.last_check(lexicon.graph(), seq) {
            return Ok(None);
        }
        let graph = lexicon.graph();
        let mut token = None;
        let mut args = Vec::new();
        for machine in seq {
            if token.is_none() && graph.name(*machine)? == self.verb {
                token = Some(*machine);
            } else {
                args.push(*machine);
            }
        }
        let instance = match token.or_else(|| lexicon.active_instances(&self.verb).first().copied()) {
            Some(instance) => instance,
            None => return Ok(None),
        };
        let control = match token {
            Some(token) => graph.control(token)?.cloned(),
            None => self.static_control.clone(),
        };

        let Some(assignment) = self.assign(graph, &args) else {
            let stray = args
                .iter()
                .find(|m| !self.arguments.iter().any(|a| a.matcher.matches(graph, **m)))
                .or(args.first())
                .map(|m| graph.name(*m).map(str::to_string))
                .transpose()?
                .unwrap_or_default();
            return Err(Error::UnknownDeepCase { verb: self.verb.clone(), argument: stray });
        };

        let graph = lexicon.graph_mut();
        graph.replace_control(instance, control)?;
        for (machine, slot) in args.iter().zip(assignment) {
            let argument = &self.arguments[slot];
            graph.append(instance, *machine, argument.partition)?;
            tracing::trace!(verb = %self.verb, case = %argument.case, partition = argument.partition, "linked argument");
        }
        Ok(Some(vec![instance]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KrCode;

    fn noun(lex: &mut Lexicon, name: &str, case: &str) -> MachineId {
        let control = Control::Kr(KrCode::new("NOUN").with_feature("CAS", case));
        lex.graph_mut().create(name, Some(control))
    }

    /// go[1: FROM; 2: TO]
    fn lexicon_with_go() -> Lexicon {
        let mut lex = Lexicon::new();
        let g = lex.graph_mut();
        let go = g.create("go", Some(Control::Pos("VERB".into())));
        let from = g.create("FROM", None);
        let to = g.create("TO", None);
        g.append(go, from, 1).unwrap();
        g.append(go, to, 2).unwrap();
        lex.add_static([go]).unwrap();
        lex
    }

    #[test]
    fn discovers_cases_and_builds_hypercube() {
        let lex = lexicon_with_go();
        let c = VerbConstruction::from_lexicon("go", &lex, &DeepCaseTable::default()).unwrap().unwrap();
        assert_eq!(c.arguments(), vec![("FROM", 1), ("TO", 2)]);
        // pre-verb state + 2^2 cube states, two of them initial, one final.
        assert_eq!(c.automaton().state_count(), 5);
        assert_eq!(c.automaton().init_states().len(), 2);
        assert_eq!(c.automaton().final_states().len(), 1);
        // verb edge + 4 cube edges
        assert_eq!(c.automaton().transition_count(), 5);
    }

    #[test]
    fn accepts_every_argument_order() {
        let mut lex = lexicon_with_go();
        let source = noun(&mut lex, "budapest", "ELA");
        let goal = noun(&mut lex, "szeged", "ILL");
        let go = lex.graph_mut().create("go", Some(Control::Pos("VERB".into())));
        let mut c = VerbConstruction::from_lexicon("go", &lex, &DeepCaseTable::default()).unwrap().unwrap();

        assert!(c.check(lex.graph(), &[source, goal]).unwrap());
        assert!(c.check(lex.graph(), &[goal, source]).unwrap());
        assert!(c.check(lex.graph(), &[go, goal, source]).unwrap());
        assert!(!c.check(lex.graph(), &[source]).unwrap());
        assert!(!c.check(lex.graph(), &[source, source]).unwrap());
        assert!(!c.check(lex.graph(), &[goal, go, source]).unwrap());
    }

    #[test]
    fn act_routes_arguments_into_case_partitions() {
        let mut lex = lexicon_with_go();
        let source = noun(&mut lex, "budapest", "ELA");
        let goal = noun(&mut lex, "szeged", "ILL");
        let go = lex.graph_mut().create("go", Some(Control::Pos("VERB".into())));
        lex.add_active([go, source, goal]).unwrap();
        let mut c = VerbConstruction::from_lexicon("go", &lex, &DeepCaseTable::default()).unwrap().unwrap();

        assert!(c.check(lex.graph(), &[goal, source]).unwrap());
        assert_eq!(c.act(&mut lex, &[goal, source]).unwrap(), Some(vec![go]));
        assert_eq!(lex.graph().get(go).unwrap().partition(1), &[source]);
        assert_eq!(lex.graph().get(go).unwrap().partition(2), &[goal]);
        assert_eq!(lex.graph().control(go).unwrap(), Some(&Control::Pos("VERB".into())));

        // Linked once; the same arguments do not fire again.
        assert!(!c.last_check(lex.graph(), &[goal, source]));
        assert!(!c.last_check(lex.graph(), &[go, source, goal]));
        assert_eq!(c.act(&mut lex, &[goal, source]).unwrap(), None);
    }

    #[test]
    fn act_without_verb_instance_is_no_match() {
        let mut lex = lexicon_with_go();
        let source = noun(&mut lex, "budapest", "ELA");
        let goal = noun(&mut lex, "szeged", "ILL");
        let mut c = VerbConstruction::from_lexicon("go", &lex, &DeepCaseTable::default()).unwrap().unwrap();
        assert!(c.check(lex.graph(), &[source, goal]).unwrap());
        assert_eq!(c.act(&mut lex, &[source, goal]).unwrap(), None);
    }

    #[test]
    fn unmatched_argument_is_an_unknown_deep_case() {
        let mut lex = lexicon_with_go();
        let go = lex.graph_mut().create("go", None);
        let stray = noun(&mut lex, "cake", "ACC");
        lex.add_active([go]).unwrap();
        let mut c = VerbConstruction::from_lexicon("go", &lex, &DeepCaseTable::default()).unwrap().unwrap();

        let err = c.act(&mut lex, &[go, stray]).unwrap_err();
        assert!(matches!(err, Error::UnknownDeepCase { ref verb, ref argument } if verb == "go" && argument == "cake"));
    }

    #[test]
    fn verbs_without_cases_build_nothing() {
        let mut lex = Lexicon::new();
        let sleep = lex.graph_mut().create("sleep", None);
        lex.add_static([sleep]).unwrap();
        assert!(VerbConstruction::from_lexicon("sleep", &lex, &DeepCaseTable::default()).unwrap().is_none());
        assert!(VerbConstruction::from_lexicon("fly", &lex, &DeepCaseTable::default()).unwrap().is_none());
    }
}
