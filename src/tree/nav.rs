//! Tree navigation helpers shared by the rewrite passes.

use crate::tree::{Arena, Node, NodeId, NodeKind};

/// Nearest ancestor (excluding `id` itself) satisfying `pred`.
pub fn nearest_parent(
    arena: &Arena,
    id: NodeId,
    pred: impl Fn(&Node) -> bool,
) -> Option<NodeId> {
    let mut current = arena.parent(id);
    while let Some(p) = current {
        if pred(arena.node(p)) {
            return Some(p);
        }
        current = arena.parent(p);
    }
    None
}

/// Nearest ancestor of the given kind.
pub fn nearest_parent_of_kind(arena: &Arena, id: NodeId, kind: NodeKind) -> Option<NodeId> {
    nearest_parent(arena, id, |n| n.kind() == kind)
}

/// Is `id` inside the subtree rooted at `root` (inclusive)?
pub fn is_sub_node(arena: &Arena, id: NodeId, root: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(n) = current {
        if n == root {
            return true;
        }
        current = arena.parent(n);
    }
    false
}

/// Does `id` sit (possibly under members/slices/field references) in the
/// target position of an assignment, port binding, or parameter binding?
pub fn is_in_left_hand_side(arena: &Arena, id: NodeId) -> bool {
    let mut child = id;
    while let Some(parent) = arena.parent(child) {
        match arena.node(parent) {
            Node::Assign(a) => return a.target == child,
            Node::Member(m) => {
                if m.index == child {
                    return false;
                }
            }
            Node::Slice(_) | Node::FieldReference(_) | Node::Cast(_) => {}
            _ => return false,
        }
        child = parent;
    }
    false
}

/// The whole left-hand side this target reference belongs to.
pub fn left_hand_side(arena: &Arena, id: NodeId) -> NodeId {
    let mut current = id;
    while let Some(parent) = arena.parent(current) {
        match arena.node(parent) {
            Node::Member(_) | Node::Slice(_) | Node::FieldReference(_) => current = parent,
            _ => break,
        }
    }
    current
}

/// Is `id` (or a prefix chain containing it) an entry of a process
/// sensitivity list?
pub fn is_in_sensitivity_list(arena: &Arena, id: NodeId) -> bool {
    let mut child = id;
    while let Some(parent) = arena.parent(child) {
        if let Node::StateTable(st) = arena.node(parent) {
            return st.sensitivity.contains(&child);
        }
        match arena.node(parent) {
            Node::Member(_) | Node::Slice(_) | Node::FieldReference(_) | Node::FunctionCall(_) => {
                child = parent;
            }
            _ => return false,
        }
    }
    false
}

/// Follow `Member`/`Slice`/`FieldReference` prefixes down to the base value.
pub fn terminal_prefix(arena: &Arena, id: NodeId) -> NodeId {
    let mut current = id;
    loop {
        current = match arena.node(current) {
            Node::Member(m) => m.prefix,
            Node::Slice(s) => s.prefix,
            Node::FieldReference(f) => f.prefix,
            _ => return current,
        };
    }
}

/// Strip any number of cast wrappers.
pub fn skip_casts(arena: &Arena, id: NodeId) -> NodeId {
    let mut current = id;
    while let Node::Cast(c) = arena.node(current) {
        current = c.value;
    }
    current
}

/// The loop a `break`/`continue` escapes from, honoring labels.
/// `None` means the statement is dangling and may be dropped.
pub fn matching_scope(arena: &Arena, id: NodeId) -> Option<NodeId> {
    let label = match arena.node(id) {
        Node::Break(b) => b.label.clone(),
        Node::Continue(c) => c.label.clone(),
        _ => return None,
    };
    let mut current = arena.parent(id);
    while let Some(p) = current {
        match arena.node(p) {
            Node::For(f) => {
                if label.is_none() || f.label == label {
                    return Some(p);
                }
            }
            Node::While(w) => {
                if label.is_none() || w.label == label {
                    return Some(p);
                }
            }
            // Loops are not visible through process/subprogram boundaries.
            Node::StateTable(_) | Node::SubProgram(_) => return None,
            _ => {}
        }
        current = arena.parent(p);
    }
    None
}

/// Collect every node of the subtree satisfying `pred`, child-first.
pub fn collect(arena: &Arena, root: NodeId, pred: impl Fn(&Node) -> bool) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        stack.extend(arena.children(id));
        if pred(arena.node(id)) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Operator;
    use crate::tree::build::Builder;

    #[test]
    fn lhs_detection_sees_through_slices() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let target_base = b.identifier("sig");
        let span = b.downto(3, 0);
        let target = b.slice(target_base, span);
        let source = b.int_val(0);
        let assign = b.assign(target, source);
        assert!(is_in_left_hand_side(&arena, target_base));
        assert!(!is_in_left_hand_side(&arena, source));
        assert_eq!(left_hand_side(&arena, target_base), target);
        assert!(is_sub_node(&arena, target_base, assign));
    }

    #[test]
    fn member_index_is_not_lhs() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let base = b.identifier("x");
        let idx = b.identifier("i");
        let member = b.member(base, idx);
        let src = b.int_val(1);
        let _assign = b.assign(member, src);
        assert!(is_in_left_hand_side(&arena, base));
        assert!(!is_in_left_hand_side(&arena, idx));
    }

    #[test]
    fn terminal_prefix_unwraps_chains() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let base = b.identifier("mem");
        let i = b.int_val(0);
        let m = b.member(base, i);
        let f = b.field_reference(m, "lo");
        assert_eq!(terminal_prefix(&arena, f), base);
        let _ = Operator::Plus;
    }
}
