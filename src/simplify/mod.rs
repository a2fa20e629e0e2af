//! The simplification driver.
//!
//! Applies, per node kind and in a fixed priority, a catalogue of rewrites
//! until a local fixed point: constant folding, algebraic laws, tree
//! rebalancing, cast elimination, member/slice/aggregate canonicalization,
//! conditional flattening, loop unrolling, generate expansion. A global
//! fixed point is not guaranteed in one traversal; callers opt into more
//! aggressive rewrites through [`SimplifyOptions`].
//!
//! Local rewrite failures are never global failures: a rule that does not
//! apply leaves its node unchanged and the driver moves on.

mod aggregates;
mod casts;
mod conditionals;
mod expressions;
mod loops;
mod members;
mod names;

use rustc_hash::FxHashSet;

use crate::semantics::LanguageSemantics;
use crate::tree::key::object_key;
use crate::tree::{Arena, Node, NodeId, NodeKind, Trash};

/// Maximum `iterations × body-size` a constant `for` is unrolled at.
pub const FOR_UNROLL_THRESHOLD: usize = 1000;
/// Maximum number of alternates an aggregate `others` is unrolled into.
pub const AGGREGATE_UNROLL_THRESHOLD: u64 = 128;

/// How adventurous the driver is about rewrites that may change observable
/// behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Behavior {
    /// Only rewrites that are always safe.
    Conservative,
    #[default]
    Normal,
    /// Also unsafe rewrites, e.g. integer division with a remainder.
    Aggressive,
}

/// Call-site options of [`simplify`].
#[derive(Clone, Debug)]
pub struct SimplifyOptions {
    /// Substitute constants for their named references.
    pub simplify_constants: bool,
    /// Substitute define-style constants.
    pub simplify_defines: bool,
    /// Substitute default parameter values where safe.
    pub simplify_parameters: bool,
    /// Substitute template parameter bindings.
    pub simplify_template_parameters: bool,
    /// Substitute compile-time-constant template parameters.
    pub simplify_ctc_template_parameters: bool,
    /// Substitute non-compile-time-constant template parameters.
    pub simplify_non_ctc_template_parameters: bool,
    /// Unroll constant-bound `for` loops without control-flow escapes.
    pub simplify_statements: bool,
    /// Expand `for`/`if` generates into their parent scope.
    pub simplify_generates: bool,
    /// Reserved; currently a no-op.
    pub simplify_declarations: bool,
    /// Recursively simplify cached semantic types.
    pub simplify_semantics_types: bool,
    /// Unfold typedef references to their base types.
    pub simplify_typereferences: bool,
    /// Inline pure function calls whose bodies are a single `return`.
    pub simplify_functioncalls: bool,
    /// Simplify in place (true) or on a copy (false).
    pub replace_result: bool,
    pub behavior: Behavior,
    /// Scope overriding declaration-visibility checks.
    pub context: Option<NodeId>,
    /// Restrict name substitution to declarations inside this subtree.
    pub root: Option<NodeId>,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            simplify_constants: false,
            simplify_defines: true,
            simplify_parameters: false,
            simplify_template_parameters: false,
            simplify_ctc_template_parameters: true,
            simplify_non_ctc_template_parameters: true,
            simplify_statements: false,
            simplify_generates: false,
            simplify_declarations: false,
            simplify_semantics_types: false,
            simplify_typereferences: false,
            simplify_functioncalls: false,
            replace_result: true,
            behavior: Behavior::default(),
            context: None,
            root: None,
        }
    }
}

impl SimplifyOptions {
    /// The aggressive profile used by the structural fix passes.
    pub fn aggressive() -> Self {
        Self {
            behavior: Behavior::Aggressive,
            ..Default::default()
        }
    }
}

/// Simplify the subtree rooted at `root` in place with default options.
/// Returns the (possibly new) root of the simplified subtree.
pub fn simplify(arena: &mut Arena, sem: &dyn LanguageSemantics, root: NodeId) -> NodeId {
    simplify_with(arena, sem, root, &SimplifyOptions::default())
}

/// Simplify with options. With `replace_result` false the input is left
/// untouched and a simplified copy is returned.
pub fn simplify_with(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    root: NodeId,
    opts: &SimplifyOptions,
) -> NodeId {
    let target = if opts.replace_result {
        root
    } else {
        crate::tree::copy::deep_copy(arena, root)
    };
    let mut pass = Simplifier {
        sem,
        opts: opts.clone(),
        trash: Trash::new(),
        expression_keys: FxHashSet::default(),
        result: target,
    };
    pass.visit(arena, target);
    pass.trash.flush(arena);
    pass.result
}

/// One simplification invocation. Per-pass caches (expression keys, fresh
/// names, trash) live here and die with the pass.
pub(crate) struct Simplifier<'s> {
    pub(crate) sem: &'s dyn LanguageSemantics,
    pub(crate) opts: SimplifyOptions,
    pub(crate) trash: Trash,
    /// Keys of expression shapes already visited in this invocation;
    /// re-entry is refused to break rewrite loops.
    pub(crate) expression_keys: FxHashSet<String>,
    /// Root of the simplified subtree; updated when the root itself is
    /// replaced.
    pub(crate) result: NodeId,
}

impl Simplifier<'_> {
    /// Post-order visit: children first, then this node's rules.
    pub(crate) fn visit(&mut self, arena: &mut Arena, id: NodeId) {
        if !arena.is_alive(id) {
            return;
        }
        let children = arena.children(id);
        for child in children {
            self.visit(arena, child);
        }
        if arena.is_alive(id) {
            self.dispatch(arena, id);
            self.trash.flush(arena);
        }
    }

    /// Swap `new` in for `old`, keeping `result` current and queueing the
    /// detached subtree.
    pub(crate) fn replace(&mut self, arena: &mut Arena, old: NodeId, new: NodeId) {
        arena.replace(old, new);
        crate::typing::reset_types(arena, old, false);
        if self.result == old {
            self.result = new;
        }
        self.trash.insert(old);
    }

    /// Rebuild the slot currently holding `child` with a node produced by
    /// `make` (which receives `child` detached, ready to embed). Returns
    /// the new occupant of the slot.
    pub(crate) fn rebuild_slot(
        &mut self,
        arena: &mut Arena,
        child: NodeId,
        make: impl FnOnce(&mut Arena, NodeId) -> NodeId,
    ) -> NodeId {
        match arena.extract(child) {
            Some(placeholder) => {
                let new = make(arena, child);
                arena.replace(placeholder, new);
                arena.free_subtree(placeholder);
                new
            }
            None => {
                let new = make(arena, child);
                if self.result == child {
                    self.result = new;
                }
                new
            }
        }
    }

    /// Hoist `inner` (a descendant of `old`) into `old`'s slot, trashing
    /// the rest of `old`'s subtree.
    pub(crate) fn hoist(&mut self, arena: &mut Arena, old: NodeId, inner: NodeId) {
        arena.hoist(old, inner);
        if self.result == old {
            self.result = inner;
        }
        self.trash.insert(old);
    }

    fn dispatch(&mut self, arena: &mut Arena, id: NodeId) {
        match arena.kind(id) {
            NodeKind::Expression => self.visit_expression(arena, id),
            NodeKind::Identifier => {
                let _ = self.simplify_names(arena, id);
            }
            NodeKind::FieldReference => {
                if self.simplify_names(arena, id) {
                    return;
                }
                let _ = self.simplify_record_value_field(arena, id);
            }
            NodeKind::Member => self.visit_member(arena, id),
            NodeKind::Slice => self.visit_slice(arena, id),
            NodeKind::Aggregate => self.visit_aggregate(arena, id),
            NodeKind::AggregateAlt => self.visit_aggregate_alt(arena, id),
            NodeKind::Cast => self.visit_cast(arena, id),
            NodeKind::When => self.visit_when(arena, id),
            NodeKind::With => self.visit_with(arena, id),
            NodeKind::If => self.visit_if(arena, id),
            NodeKind::IfAlt => self.visit_if_alt(arena, id),
            NodeKind::Switch => self.visit_switch(arena, id),
            NodeKind::WhenAlt => self.visit_when_alt(arena, id),
            NodeKind::For => self.visit_for(arena, id),
            NodeKind::ForGenerate => self.visit_for_generate(arena, id),
            NodeKind::IfGenerate => self.visit_if_generate(arena, id),
            NodeKind::While => self.visit_while(arena, id),
            NodeKind::Range => self.visit_range(arena, id),
            NodeKind::Assign => self.visit_assign(arena, id),
            NodeKind::Return => self.visit_return(arena, id),
            NodeKind::ValueStatement => self.visit_value_statement(arena, id),
            NodeKind::FunctionCall => self.visit_function_call(arena, id),
            NodeKind::TypeReference => self.visit_type_reference(arena, id),
            NodeKind::Break | NodeKind::Continue => self.visit_loop_escape(arena, id),
            NodeKind::BitVal
            | NodeKind::BitvectorVal
            | NodeKind::BoolVal
            | NodeKind::CharVal
            | NodeKind::IntVal
            | NodeKind::RealVal
            | NodeKind::StringVal
            | NodeKind::TimeVal => self.visit_constant(arena, id),
            _ => {}
        }
    }

    /// Constants: keep syntactic types canonical.
    fn visit_constant(&mut self, arena: &mut Arena, id: NodeId) {
        self.fix_syntactic_type(arena, id);
    }

    /// Drop the syntactic type where the position must not carry one
    /// (aggregate index, already-constrained range bound, member index),
    /// and make sure it is present elsewhere.
    fn fix_syntactic_type(&mut self, arena: &mut Arena, id: NodeId) {
        let Some(parent) = arena.parent(id) else {
            return;
        };
        let bare_position = match arena.node(parent) {
            Node::AggregateAlt(alt) => alt.indices.contains(&id),
            Node::Member(m) => m.index == id,
            Node::Range(r) => {
                // Bounds constrained by the surrounding type stay bare.
                arena
                    .parent(parent)
                    .is_some_and(|pp| arena.node(pp).is_type())
                    && (r.left == Some(id) || r.right == Some(id))
            }
            _ => false,
        };
        if bare_position {
            if let Some(ty) = crate::typing::syntactic_type(arena, id) {
                let detached = arena.node_mut(id).remove_child(ty);
                debug_assert!(detached);
                arena.force_disown(ty);
                arena.free_subtree(ty);
            }
        } else {
            crate::typing::assure_syntactic_type(arena, self.sem, id);
        }
    }

    /// Ranges: collapse null ranges to `[-1 downto 0]`.
    fn visit_range(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::Range(r) = arena.node(id).clone() else {
            return;
        };
        let (Some(left), Some(right)) = (r.left, r.right) else {
            return;
        };
        let (Some(l), Some(r_val)) = (arena.int_value(left), arena.int_value(right)) else {
            return;
        };
        let is_null = match r.direction {
            crate::tree::Direction::Downto => l < r_val,
            crate::tree::Direction::Upto => l > r_val,
        };
        let already_canonical = l == -1 && r_val == 0;
        if is_null && !already_canonical {
            let mut b = crate::tree::build::Builder::new(arena);
            let canonical = b.downto(-1, 0);
            self.replace(arena, id, canonical);
        }
    }

    pub(crate) fn expression_key_seen(&self, arena: &Arena, id: NodeId) -> bool {
        self.expression_keys.contains(&object_key(arena, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::HifSemantics;
    use crate::tree::Operator;
    use crate::tree::build::Builder;

    #[test]
    fn default_option_profile() {
        let opts = SimplifyOptions::default();
        assert!(!opts.simplify_constants);
        assert!(opts.simplify_defines);
        assert!(opts.simplify_ctc_template_parameters);
        assert!(opts.simplify_non_ctc_template_parameters);
        assert!(!opts.simplify_statements);
        assert!(opts.replace_result);
        assert_eq!(opts.behavior, Behavior::Normal);
    }

    #[test]
    fn copy_mode_leaves_input_untouched() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let two = b.int_val(2);
        let three = b.int_val(3);
        let e = b.binary(Operator::Plus, two, three);
        let opts = SimplifyOptions {
            replace_result: false,
            ..Default::default()
        };
        let out = simplify_with(&mut arena, &sem, e, &opts);
        assert_ne!(out, e);
        assert!(arena.is_alive(e));
        assert!(matches!(arena.node(e), Node::Expression(_)));
        assert_eq!(arena.int_value(out), Some(5));
    }

    #[test]
    fn null_range_collapses_to_canonical_form() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let r = b.downto(0, 5); // null: left < right under downto
        let out = simplify(&mut arena, &sem, r);
        let Node::Range(range) = arena.node(out) else {
            panic!("expected range");
        };
        assert_eq!(range.direction, crate::tree::Direction::Downto);
        assert_eq!(arena.int_value(range.left.unwrap()), Some(-1));
        assert_eq!(arena.int_value(range.right.unwrap()), Some(0));
    }
}
