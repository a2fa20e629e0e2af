//! Process analysis: classify a state table against clock/reset signals.
//!
//! Back-ends use the classification to choose between method and thread
//! processes and to recognize synchronous reset shapes.

use crate::base::Name;
use crate::semantics::LanguageSemantics;
use crate::tree::nav;
use crate::tree::{Arena, Node, NodeId, NodeKind};

/// Options of [`analyze_process`].
#[derive(Clone, Debug)]
pub struct AnalyzeProcessOptions {
    /// Name of the clock signal, when known.
    pub clock: Option<Name>,
    /// Name of the reset signal, when known.
    pub reset: Option<Name>,
    pub skip_standard_declarations: bool,
    pub print_warnings: bool,
}

impl Default for AnalyzeProcessOptions {
    fn default() -> Self {
        Self {
            clock: None,
            reset: None,
            skip_standard_declarations: true,
            print_warnings: false,
        }
    }
}

/// How a process is driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStyle {
    /// Sensitive only to the clock (and possibly the reset).
    Synchronous,
    /// Sensitive to its data inputs.
    Combinational,
    /// Clock plus non-reset data signals.
    Mixed,
    /// No sensitivity at all.
    Unclocked,
}

/// Classify the process `st` against the options' clock/reset names.
pub fn analyze_process(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    st: NodeId,
    opts: &AnalyzeProcessOptions,
) -> ProcessStyle {
    let Node::StateTable(table) = arena.node(st).clone() else {
        return ProcessStyle::Unclocked;
    };
    if table.sensitivity.is_empty() {
        return ProcessStyle::Unclocked;
    }
    let mut clocked = false;
    let mut data = false;
    for entry in table.sensitivity {
        let root = nav::terminal_prefix(arena, entry);
        let name = match arena.kind(root) {
            NodeKind::Identifier => arena.node(root).name().cloned(),
            NodeKind::FunctionCall => {
                // Edge calls carry the clock in their single argument.
                if sem.is_event_call(arena, root) {
                    edge_call_signal(arena, root)
                } else {
                    None
                }
            }
            _ => None,
        };
        let Some(name) = name else {
            continue;
        };
        if opts.skip_standard_declarations {
            if let Some(decl) = crate::resolve::get_declaration(arena, sem, root) {
                if crate::resolve::is_part_of_standard(arena, decl) {
                    continue;
                }
            }
        }
        let is_clock = opts.clock.as_ref() == Some(&name);
        let is_reset = opts.reset.as_ref() == Some(&name);
        if is_clock {
            clocked = true;
        } else if !is_reset {
            data = true;
        }
    }
    let style = match (clocked, data) {
        (true, false) => ProcessStyle::Synchronous,
        (true, true) => ProcessStyle::Mixed,
        (false, true) => ProcessStyle::Combinational,
        (false, false) => ProcessStyle::Unclocked,
    };
    if opts.print_warnings && style == ProcessStyle::Mixed {
        tracing::warn!(process = ?arena.node(st).name(), "mixed process sensitivity");
    }
    style
}

fn edge_call_signal(arena: &Arena, call: NodeId) -> Option<Name> {
    let Node::FunctionCall(fc) = arena.node(call) else {
        return None;
    };
    let &arg = fc.args.first()?;
    let Node::ParameterAssign(pa) = arena.node(arg) else {
        return None;
    };
    let root = nav::terminal_prefix(arena, pa.value);
    arena.node(root).name().cloned()
}
