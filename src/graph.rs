//! The machine graph.
//!
//! - `machine.rs`: the `MachineGraph` arena, `MachineId` handles and the graph
//!   operations (append/remove, traversal, deep copy, debug rendering,
//!   reachability-based release).
//! - `control.rs`: the closed set of control annotations and the plugin
//!   message compiler.

#[path = "graph/control.rs"]
mod control;
#[path = "graph/machine.rs"]
mod machine;

pub use control::{Control, ControlKind, KrCode, Message, PluginControl, PluginSlot};
pub use machine::{Machine, MachineGraph, MachineId};
