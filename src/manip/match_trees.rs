//! Structural tree matching.
//!
//! Walks the reference tree top-down, pairing each node with its slot-wise
//! counterpart in the matched tree. Comparison disables child checks at
//! each node, so a mismatching subtree is recorded once and pruned.

use indexmap::IndexMap;

use crate::tree::equals::{EqualsOptions, equals};
use crate::tree::{Arena, NodeId};

/// Result of [`match_trees`]: reference-side node → counterpart.
#[derive(Debug, Default)]
pub struct MatchMaps {
    pub matched: IndexMap<NodeId, NodeId>,
    /// Reference nodes with no structurally equal counterpart, mapped to
    /// the nearest candidate (the matched tree root when none).
    pub unmatched: IndexMap<NodeId, NodeId>,
}

/// Collect matches between `reference` and `matched` trees.
pub fn match_trees(arena: &Arena, reference: NodeId, matched: NodeId) -> MatchMaps {
    let mut maps = MatchMaps::default();
    visit(arena, reference, Some(matched), matched, &mut maps);
    maps
}

fn visit(
    arena: &Arena,
    current: NodeId,
    candidate: Option<NodeId>,
    matched_top: NodeId,
    maps: &mut MatchMaps,
) {
    let opts = EqualsOptions {
        skip_children: true,
        ..Default::default()
    };
    let Some(candidate) = candidate else {
        maps.unmatched.insert(current, matched_top);
        return;
    };
    if !equals(arena, current, candidate, opts) {
        maps.unmatched.insert(current, candidate);
        // Children of unmatched objects are excluded.
        return;
    }
    maps.matched.insert(current, candidate);

    let ref_children = arena.children(current);
    let matched_children = arena.children(candidate);
    for (i, &child) in ref_children.iter().enumerate() {
        visit(
            arena,
            child,
            matched_children.get(i).copied(),
            matched_top,
            maps,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Operator;
    use crate::tree::build::Builder;

    #[test]
    fn identical_trees_match_fully() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let t1 = {
            let x = b.identifier("x");
            let c = b.int_val(1);
            b.binary(Operator::Plus, x, c)
        };
        let t2 = {
            let x = b.identifier("x");
            let c = b.int_val(1);
            b.binary(Operator::Plus, x, c)
        };
        let maps = match_trees(&arena, t1, t2);
        assert_eq!(maps.matched.len(), 3);
        assert!(maps.unmatched.is_empty());
        assert_eq!(maps.matched.get(&t1), Some(&t2));
    }

    #[test]
    fn mismatching_subtrees_are_pruned() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let t1 = {
            let x = b.identifier("x");
            let inner = {
                let a = b.identifier("a");
                let c = b.int_val(1);
                b.binary(Operator::Mult, a, c)
            };
            b.binary(Operator::Plus, x, inner)
        };
        let t2 = {
            let x = b.identifier("x");
            let other = b.identifier("y");
            b.binary(Operator::Plus, x, other)
        };
        let maps = match_trees(&arena, t1, t2);
        // Root and `x` match; the Mult subtree is unmatched once, its
        // children not at all.
        assert_eq!(maps.matched.len(), 2);
        assert_eq!(maps.unmatched.len(), 1);
    }
}
