//! Machine controls.
//!
//! A control is the optional annotation carried by a machine: a POS tag, a KR
//! feature code, a concept marker, or a plugin-invocation descriptor. Matchers
//! dispatch on the variant and fail closed when the kind does not fit.

use super::machine::{MachineGraph, MachineId};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

bitflags::bitflags! {
    /// Set of control kinds, used by `Matcher::ControlKind`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlKind: u8 {
        const POS     = 1 << 0;
        const KR      = 1 << 1;
        const CONCEPT = 1 << 2;
        const PLUGIN  = 1 << 3;
        /// Anything that carries a part-of-speech.
        const POS_TYPED = Self::POS.bits() | Self::KR.bits();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Pos(String),
    Kr(KrCode),
    Concept,
    Plugin(PluginControl),
}

impl Control {
    pub fn kind(&self) -> ControlKind {
        match self {
            Control::Pos(_) => ControlKind::POS,
            Control::Kr(_) => ControlKind::KR,
            Control::Concept => ControlKind::CONCEPT,
            Control::Plugin(_) => ControlKind::PLUGIN,
        }
    }

    /// The POS string a `Pos` matcher runs against. `None` for kinds that do
    /// not carry a part-of-speech.
    pub fn pos_string(&self) -> Option<String> {
        match self {
            Control::Pos(pos) => Some(pos.clone()),
            Control::Kr(code) => Some(code.to_string()),
            Control::Concept | Control::Plugin(_) => None,
        }
    }

    /// Build a control from an analyzer tag.
    ///
    /// ```text
    /// "train/NOUN"             -> Pos("NOUN")
    /// "NOUN<CAS<ABL>>"         -> Kr { pos: NOUN, CAS=ABL }
    /// "haz/NOUN<PLUR><CAS<ACC>>" -> Kr { pos: NOUN, PLUR, CAS=ACC }
    /// ```
    pub fn from_tag(tag: &str) -> Result<Control> {
        let code = match tag.rfind('/') {
            Some(idx) => &tag[idx + 1..],
            None => tag,
        };
        if code.is_empty() {
            return Err(Error::InvalidTag(tag.to_string()));
        }
        if code.contains('<') {
            KrCode::parse(code).map(Control::Kr).ok_or_else(|| Error::InvalidTag(tag.to_string()))
        } else {
            Ok(Control::Pos(code.to_string()))
        }
    }
}

/// A KR morphological code: a part-of-speech followed by features, each
/// either a flag (`<PLUR>`) or a keyed value (`<CAS<ACC>>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrCode {
    pub pos: String,
    /// Features in source order; flags carry an empty value.
    pub features: Vec<(String, String)>,
}

impl KrCode {
    pub fn new(pos: impl Into<String>) -> Self {
        KrCode { pos: pos.into(), features: Vec::new() }
    }

    #[must_use]
    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn parse(code: &str) -> Option<KrCode> {
        let caps = regex!(r"^([^<>]+)((?:<[^<>]+(?:<[^<>]*>)?>)*)$").captures(code)?;
        let pos = caps.get(1)?.as_str().to_string();
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let features = regex!(r"<([^<>]+?)(?:<([^<>]*)>)?>")
            .captures_iter(rest)
            .filter_map(|f| {
                let key = f.get(1)?.as_str().to_string();
                let value = f.get(2).map(|v| v.as_str().to_string()).unwrap_or_default();
                Some((key, value))
            })
            .collect();
        Some(KrCode { pos, features })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.features.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.features.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.features.push((key, value)),
        }
    }
}

impl fmt::Display for KrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pos)?;
        for (key, value) in &self.features {
            if value.is_empty() { write!(f, "<{key}>")? } else { write!(f, "<{key}<{value}>>")? }
        }
        Ok(())
    }
}

/// A required argument of a plugin, read from one partition of the plugin
/// machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSlot {
    pub name: String,
    pub partition: usize,
}

/// Plugin-invocation descriptor. The engine only compiles the message; the
/// actual plugin call happens outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginControl {
    pub endpoint: String,
    pub slots: Vec<PluginSlot>,
}

impl PluginControl {
    pub fn new(endpoint: impl Into<String>) -> Self {
        PluginControl { endpoint: endpoint.into(), slots: Vec::new() }
    }

    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, partition: usize) -> Self {
        self.slots.push(PluginSlot { name: name.into(), partition });
        self
    }

    /// Compile the outgoing message for `machine`, the machine carrying this
    /// control. Returns `None` while any slot partition is still empty.
    pub fn compile_message(&self, graph: &MachineGraph, machine: MachineId) -> Option<Message> {
        let node = graph.get(machine).ok()?;
        let mut fields = BTreeMap::new();
        for slot in &self.slots {
            let filler = node.partition(slot.partition).first()?;
            fields.insert(slot.name.clone(), graph.name(*filler).ok()?.to_string());
        }
        Some(Message { endpoint: self.endpoint.clone(), fields })
    }
}

/// A compiled payload: the endpoint (plugin or AVM name) and its basic
/// attribute dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub endpoint: String,
    pub fields: BTreeMap<String, String>,
}
