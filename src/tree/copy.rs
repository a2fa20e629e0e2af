//! Deep copy of subtrees.
//!
//! Duplicating a node into a second parent slot is forbidden by the
//! single-parent invariant; `deep_copy` is the explicit way to materialize
//! a duplicate.

use crate::tree::{Arena, NodeId};

/// Options for [`deep_copy`].
#[derive(Clone, Copy, Debug)]
pub struct CopyOptions {
    /// When false, child slots are dropped: optional children disappear and
    /// list slots come out empty. Used e.g. to build the "empty shell" of a
    /// contents for component detection. Required single slots are still
    /// copied (a member without its prefix would not be a tree).
    pub copy_children: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            copy_children: true,
        }
    }
}

/// Copy the subtree rooted at `id`, returning a parentless duplicate.
pub fn deep_copy(arena: &mut Arena, id: NodeId) -> NodeId {
    deep_copy_with(arena, id, CopyOptions::default())
}

/// Copy with options.
pub fn deep_copy_with(arena: &mut Arena, id: NodeId, opts: CopyOptions) -> NodeId {
    let mut node = arena.node(id).clone();
    if !opts.copy_children {
        let mut shell = node.clone();
        let mut required = Vec::new();
        // Keep only required single slots: drop everything removable.
        for child in node.children() {
            if !shell.remove_child(child) {
                required.push(child);
            }
        }
        for child in required {
            let copy = deep_copy_with(arena, child, opts);
            let replaced = shell.replace_child(child, copy);
            debug_assert!(replaced);
        }
        return arena.alloc(shell);
    }
    let children = node.children();
    for child in children {
        let copy = deep_copy(arena, child);
        let replaced = node.replace_child(child, copy);
        debug_assert!(replaced);
    }
    arena.alloc(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Operator;
    use crate::tree::build::Builder;

    #[test]
    fn copy_is_deep_and_parentless() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let a = b.identifier("a");
        let three = b.int_val(3);
        let e = b.binary(Operator::Plus, a, three);

        let copy = deep_copy(&mut arena, e);
        assert_ne!(copy, e);
        assert_eq!(arena.parent(copy), None);
        let kids = arena.children(copy);
        assert_eq!(kids.len(), 2);
        assert_ne!(kids[0], a);
        assert!(crate::tree::equals::equals_default(&arena, copy, e));
    }

    #[test]
    fn shell_copy_drops_list_children() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let v = b.int_val(0);
        let alt = b.aggregate_alt(vec![], v);
        let agg = b.aggregate(vec![alt], None);
        let shell = deep_copy_with(
            &mut arena,
            agg,
            CopyOptions {
                copy_children: false,
            },
        );
        assert!(arena.children(shell).is_empty());
    }
}
