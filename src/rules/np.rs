//! Default noun-phrase grammar.
//!
//! ```text
//! ART  NOUN  ->  NOUN[0: ART]
//! ADJ  NOUN  ->  NOUN[0: ADJ]
//! NUM  NOUN  ->  NOUN[0: NUM]
//! ```
//!
//! POS patterns match both plain tags (`NOUN`) and KR codes
//! (`NOUN<CAS<ACC>>`), so the same table serves either analyzer.

use crate::construction::Construction;

pub fn constructions() -> Vec<Box<dyn Construction>> {
    vec![
        Box::new(append_rule! {
            name: "det_noun",
            modifier: pos!(r"^(ART|DET)(<|$)"),
            head: pos!(r"^NOUN(<|$)"),
        }),
        Box::new(append_rule! {
            name: "adj_noun",
            modifier: pos!(r"^ADJ(<|$)"),
            head: pos!(r"^NOUN(<|$)"),
        }),
        Box::new(append_rule! {
            name: "num_noun",
            modifier: pos!(r"^NUM(<|$)"),
            head: pos!(r"^NOUN(<|$)"),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Control, KrCode, MachineId};
    use crate::{ConstructionKind, Lexicon};

    fn run(names: &[(&str, Control)]) -> (Lexicon, Vec<MachineId>) {
        let mut lex = Lexicon::new();
        let seq = names.iter().map(|(n, c)| lex.graph_mut().create(*n, Some(c.clone()))).collect();
        (lex, seq)
    }

    #[test]
    fn all_rules_are_chunk_rules() {
        let rules = constructions();
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|r| r.kind() == ConstructionKind::Chunk));
    }

    #[test]
    fn kr_tagged_phrase_matches() {
        let (mut lex, seq) = run(&[
            ("a", Control::Kr(KrCode::new("ART"))),
            ("haz", Control::Kr(KrCode::new("NOUN").with_feature("CAS", "ACC"))),
        ]);
        let mut rules = constructions();
        assert!(rules[0].check(lex.graph(), &seq).unwrap());
        assert_eq!(rules[0].act(&mut lex, &seq).unwrap(), Some(vec![seq[1]]));
    }

    #[test]
    fn pos_prefixes_do_not_leak() {
        let (lex, seq) = run(&[("the", Control::Pos("ARTX".into())), ("train", Control::Pos("NOUNISH".into()))]);
        let mut rules = constructions();
        assert!(!rules[0].check(lex.graph(), &seq).unwrap());
    }
}
