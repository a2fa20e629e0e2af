//! Statement/action nodes and the structural pieces that own them:
//! processes (state tables), instances, generates, and the name→actual
//! binding nodes used by calls and instantiations.

use crate::base::Name;
use crate::tree::NodeId;

#[derive(Clone, Debug)]
pub struct Assign {
    pub target: NodeId,
    pub source: NodeId,
}

#[derive(Clone, Debug)]
pub struct If {
    pub alts: Vec<NodeId>,
    /// Else branch.
    pub default: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct IfAlt {
    pub condition: NodeId,
    pub actions: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Switch {
    pub condition: NodeId,
    pub alts: Vec<NodeId>,
    pub default: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct SwitchAlt {
    pub conditions: Vec<NodeId>,
    pub actions: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct For {
    pub label: Option<Name>,
    /// Loop-variable declarations (`DataDeclaration`).
    pub init_declarations: Vec<NodeId>,
    /// Assignments initializing pre-existing variables.
    pub init_values: Vec<NodeId>,
    /// Boolean condition, or a `Range` value for range-style loops.
    pub condition: Option<NodeId>,
    pub step_actions: Vec<NodeId>,
    pub actions: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct While {
    pub label: Option<Name>,
    pub condition: NodeId,
    pub actions: Vec<NodeId>,
    pub do_while: bool,
}

#[derive(Clone, Debug)]
pub struct Return {
    pub value: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Break {
    pub label: Option<Name>,
}

#[derive(Clone, Debug)]
pub struct Continue {
    pub label: Option<Name>,
}

#[derive(Clone, Debug)]
pub struct ProcedureCall {
    pub name: Name,
    pub instance: Option<NodeId>,
    pub template_args: Vec<NodeId>,
    pub args: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Wait {
    pub conditions: Vec<NodeId>,
    pub time: Option<NodeId>,
}

/// A bare value in statement position.
#[derive(Clone, Debug)]
pub struct ValueStatement {
    pub value: NodeId,
}

/// Concurrent actions of a contents; lifted into processes by
/// `transform_global_actions`.
#[derive(Clone, Debug)]
pub struct GlobalAction {
    pub actions: Vec<NodeId>,
}

// ============================================================================
// PROCESSES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessFlavor {
    Method,
    Thread,
}

/// A process: a sensitivity list plus one state (or a finite state machine).
#[derive(Clone, Debug)]
pub struct StateTable {
    pub name: Name,
    pub flavor: ProcessFlavor,
    /// Identifiers, calls, or identifier prefixes only.
    pub sensitivity: Vec<NodeId>,
    pub declarations: Vec<NodeId>,
    pub states: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct State {
    pub name: Name,
    pub actions: Vec<NodeId>,
}

/// FSM edge between two states. Carried in the model; no simplification
/// rule targets it.
#[derive(Clone, Debug)]
pub struct Transition {
    pub name: Name,
    pub prev_state: Name,
    pub next_state: Name,
    pub guards: Vec<NodeId>,
    pub actions: Vec<NodeId>,
}

// ============================================================================
// STRUCTURE
// ============================================================================

/// Module instantiation.
#[derive(Clone, Debug)]
pub struct Instance {
    pub name: Name,
    /// A `ViewReference` type (template args ride on it).
    pub referenced: NodeId,
    pub port_assigns: Vec<NodeId>,
}

/// Structural `for` iteration producing design content at elaboration time.
#[derive(Clone, Debug)]
pub struct ForGenerate {
    pub label: Name,
    pub init_declarations: Vec<NodeId>,
    pub init_values: Vec<NodeId>,
    pub condition: Option<NodeId>,
    pub step_actions: Vec<NodeId>,
    /// A `Contents` node.
    pub body: NodeId,
}

/// Structural conditional producing design content at elaboration time.
#[derive(Clone, Debug)]
pub struct IfGenerate {
    pub label: Name,
    pub condition: NodeId,
    /// A `Contents` node.
    pub body: NodeId,
}

// ============================================================================
// BINDINGS
// ============================================================================

/// Actual bound to a formal port.
#[derive(Clone, Debug)]
pub struct PortAssign {
    pub name: Name,
    pub value: NodeId,
}

/// Actual bound to a formal parameter.
#[derive(Clone, Debug)]
pub struct ParameterAssign {
    pub name: Name,
    pub value: NodeId,
}

/// Actual bound to a value template parameter.
#[derive(Clone, Debug)]
pub struct ValueTpAssign {
    pub name: Name,
    pub value: NodeId,
}

/// Actual bound to a type template parameter.
#[derive(Clone, Debug)]
pub struct TypeTpAssign {
    pub name: Name,
    pub ty: NodeId,
}
