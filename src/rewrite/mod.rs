//! Child-first traversal.
//!
//! Every mutating pass is a callback dispatched over nodes after their
//! children (post-order). The walker snapshots child lists before
//! descending, so callbacks may replace or delete the nodes they are
//! called on; nodes freed by an earlier callback are skipped.

use crate::tree::{Arena, NodeId, Trash};

/// Visit the subtree under `root` post-order, calling `f` once per live
/// node after its children.
pub fn walk_post(arena: &mut Arena, root: NodeId, f: &mut dyn FnMut(&mut Arena, NodeId)) {
    if !arena.is_alive(root) {
        return;
    }
    let children = arena.children(root);
    for child in children {
        walk_post(arena, child, f);
    }
    if arena.is_alive(root) {
        f(arena, root);
    }
}

/// Like [`walk_post`], flushing `trash` after each callback so deferred
/// deletes never outlive one traversal step.
pub fn walk_post_with_trash(
    arena: &mut Arena,
    root: NodeId,
    trash: &mut Trash,
    f: &mut dyn FnMut(&mut Arena, NodeId, &mut Trash),
) {
    if !arena.is_alive(root) {
        return;
    }
    let children = arena.children(root);
    for child in children {
        walk_post_with_trash(arena, child, trash, f);
    }
    if arena.is_alive(root) {
        f(arena, root, trash);
        trash.flush(arena);
    }
}

/// Pre-order walk; `f` returning `false` prunes the subtree below a node.
pub fn walk_pre(arena: &mut Arena, root: NodeId, f: &mut dyn FnMut(&mut Arena, NodeId) -> bool) {
    if !arena.is_alive(root) {
        return;
    }
    if !f(arena, root) {
        return;
    }
    let children = arena.children(root);
    for child in children {
        walk_pre(arena, child, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Operator;
    use crate::tree::build::Builder;

    #[test]
    fn post_order_visits_children_first() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let x = b.identifier("x");
        let y = b.identifier("y");
        let inner = b.binary(Operator::Plus, x, y);
        let z = b.identifier("z");
        let outer = b.binary(Operator::Mult, inner, z);

        let mut order = Vec::new();
        walk_post(&mut arena, outer, &mut |_, id| order.push(id));
        assert_eq!(order, vec![x, y, inner, z, outer]);
    }

    #[test]
    fn replaced_nodes_do_not_confuse_the_walk() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let x = b.int_val(1);
        let y = b.int_val(2);
        let e = b.binary(Operator::Plus, x, y);
        let mut visited = 0;
        let mut trash = Trash::new();
        walk_post_with_trash(&mut arena, e, &mut trash, &mut |arena, id, trash| {
            visited += 1;
            if id == y {
                let replacement = Builder::new(arena).int_val(9);
                arena.replace(y, replacement);
                trash.insert(y);
            }
        });
        assert_eq!(visited, 3);
        assert!(!arena.is_alive(y));
    }
}
