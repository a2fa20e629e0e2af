//! Arena storage for HIF trees.
//!
//! Every node lives in one [`Arena`] slot and is addressed by [`NodeId`].
//! Ownership is strictly tree shaped: each live node has at most one parent
//! slot referencing it, recorded in the entry. Cross references (symbol →
//! declaration, value → semantic type) are side tables on the arena and are
//! invalidated explicitly by the passes that mutate the tree.
//!
//! Single-parent violations are programming errors and panic immediately;
//! recoverable failures (unresolved names, untypeable values) are `Option`s
//! and `Result`s on the query layers above.

use rustc_hash::FxHashMap;

use crate::tree::Node;

/// Index of a node in its [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Entry {
    node: Node,
    parent: Option<NodeId>,
}

/// Owner of every node of a design plus the resolution/typing side tables.
#[derive(Debug, Default)]
pub struct Arena {
    entries: Vec<Option<Entry>>,
    /// symbol node → declaration node
    pub(crate) decl_cache: FxHashMap<NodeId, NodeId>,
    /// value node → cached semantic type (a parentless tree owned by the
    /// cache; freed on invalidation)
    pub(crate) type_cache: FxHashMap<NodeId, NodeId>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // ALLOCATION & ACCESS
    // ========================================================================

    /// Store `node`, claiming its children. Children must be parentless
    /// (allocate bottom-up, or deep-copy attached subtrees first).
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.entries.len() as u32);
        let children = node.children();
        self.entries.push(Some(Entry { node, parent: None }));
        for child in children {
            self.claim(id, child);
        }
        id
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.entries
            .get(id.index())
            .is_some_and(|entry| entry.is_some())
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self
            .entries
            .get(id.index())
            .and_then(|e| e.as_ref())
            .unwrap_or_else(|| panic!("access to dead node {id:?}"))
            .node
    }

    /// Raw mutable access. Callers that add or remove child references must
    /// fix ownership through [`claim`](Self::claim)/[`replace`](Self::replace)
    /// afterwards.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self
            .entries
            .get_mut(id.index())
            .and_then(|e| e.as_mut())
            .unwrap_or_else(|| panic!("access to dead node {id:?}"))
            .node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries
            .get(id.index())
            .and_then(|e| e.as_ref())
            .and_then(|e| e.parent)
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Ids of all live nodes, in allocation order.
    pub fn live_ids(&self) -> Vec<NodeId> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|_| NodeId(i as u32)))
            .collect()
    }

    // ========================================================================
    // OWNERSHIP
    // ========================================================================

    /// Record `parent` as the owner of `child`.
    ///
    /// Panics if `child` already has a different parent: duplications
    /// require an explicit deep copy.
    pub fn claim(&mut self, parent: NodeId, child: NodeId) {
        let entry = self
            .entries
            .get_mut(child.index())
            .and_then(|e| e.as_mut())
            .unwrap_or_else(|| panic!("claim of dead node {child:?}"));
        match entry.parent {
            None => entry.parent = Some(parent),
            Some(p) if p == parent => {}
            Some(p) => panic!("node {child:?} already owned by {p:?}, claimed by {parent:?}"),
        }
    }

    fn disown(&mut self, child: NodeId) {
        if let Some(entry) = self.entries.get_mut(child.index()).and_then(|e| e.as_mut()) {
            entry.parent = None;
        }
    }

    /// Clear a node's parent pointer after its slot was overwritten
    /// directly. Crate-internal: normal code goes through
    /// [`replace`](Self::replace)/[`detach`](Self::detach).
    pub(crate) fn force_disown(&mut self, child: NodeId) {
        self.disown(child);
    }

    /// Detach `id` from its parent slot, leaving it a parentless root.
    /// Works for optional and list slots; panics for required single slots
    /// (use [`replace`](Self::replace) there).
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let removed = self.node_mut(parent).remove_child(id);
        assert!(
            removed,
            "cannot detach {id:?}: it fills a required slot of {parent:?}"
        );
        self.disown(id);
    }

    /// Swap `new` into the parent slot currently holding `old`.
    ///
    /// `old` becomes a parentless root (typically trashed by the caller);
    /// `new` must be parentless. When `old` has no parent this only checks
    /// `new` and succeeds, mirroring root replacement.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let Some(parent) = self.parent(old) else {
            return;
        };
        let swapped = self.node_mut(parent).replace_child(old, new);
        assert!(swapped, "{old:?} not found among children of {parent:?}");
        self.disown(old);
        self.claim(parent, new);
    }

    /// Replace `old` — which must sit in a list slot — with zero or more
    /// siblings in place.
    pub fn replace_with_list(&mut self, old: NodeId, new: &[NodeId]) {
        let parent = self
            .parent(old)
            .unwrap_or_else(|| panic!("replace_with_list on parentless {old:?}"));
        let list = self
            .node_mut(parent)
            .list_containing_mut(old)
            .unwrap_or_else(|| panic!("{old:?} is not in a list slot of {parent:?}"));
        let pos = list.iter().position(|&x| x == old).expect("child in list");
        list.splice(pos..=pos, new.iter().copied());
        self.disown(old);
        for &id in new {
            self.claim(parent, id);
        }
    }

    /// Append `child` to the list slot of `parent` selected by `pick`, and
    /// claim it.
    pub fn push_to_list(
        &mut self,
        parent: NodeId,
        child: NodeId,
        pick: impl FnOnce(&mut Node) -> &mut Vec<NodeId>,
    ) {
        pick(self.node_mut(parent)).push(child);
        self.claim(parent, child);
    }

    /// Insert `child` into a list slot of `parent` at `pos`.
    pub fn insert_in_list(
        &mut self,
        parent: NodeId,
        pos: usize,
        child: NodeId,
        pick: impl FnOnce(&mut Node) -> &mut Vec<NodeId>,
    ) {
        pick(self.node_mut(parent)).insert(pos, child);
        self.claim(parent, child);
    }

    /// Replace the attached node `old` with `inner`, where `inner` lives
    /// somewhere inside `old`'s own subtree. `inner`'s former slot gets a
    /// placeholder so the discarded subtree stays well formed until it is
    /// trashed. `old` comes out parentless.
    pub fn hoist(&mut self, old: NodeId, inner: NodeId) {
        let parent = self
            .parent(inner)
            .unwrap_or_else(|| panic!("hoist of parentless {inner:?}"));
        let placeholder = self.alloc(Node::IntVal(crate::tree::value::IntVal {
            value: 0,
            ty: None,
        }));
        let swapped = self.node_mut(parent).replace_child(inner, placeholder);
        assert!(swapped, "{inner:?} not a child of {parent:?}");
        self.claim(parent, placeholder);
        self.disown(inner);
        self.replace(old, inner);
    }

    /// Detach `child` from its slot by swapping in a placeholder, which is
    /// returned (attached where `child` was). `None` when `child` is a
    /// root. The caller typically replaces the placeholder and frees it.
    pub fn extract(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.parent(child)?;
        let placeholder = self.alloc(Node::IntVal(crate::tree::value::IntVal {
            value: 0,
            ty: None,
        }));
        let swapped = self.node_mut(parent).replace_child(child, placeholder);
        assert!(swapped, "{child:?} not a child of {parent:?}");
        self.claim(parent, placeholder);
        self.disown(child);
        Some(placeholder)
    }

    /// Exchange two attached nodes between their parent slots.
    pub fn swap_nodes(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        let pa = self
            .parent(a)
            .unwrap_or_else(|| panic!("swap of parentless {a:?}"));
        let pb = self
            .parent(b)
            .unwrap_or_else(|| panic!("swap of parentless {b:?}"));
        if pa == pb {
            self.node_mut(pa).walk_slots_mut(&mut |slot| {
                if *slot == a {
                    *slot = b;
                } else if *slot == b {
                    *slot = a;
                }
            });
            return;
        }
        let sa = self.node_mut(pa).replace_child(a, b);
        let sb = self.node_mut(pb).replace_child(b, a);
        assert!(sa && sb, "swap slots not found");
        self.entries[a.index()].as_mut().expect("live").parent = Some(pb);
        self.entries[b.index()].as_mut().expect("live").parent = Some(pa);
    }

    // ========================================================================
    // DEALLOCATION
    // ========================================================================

    /// Free `id` and everything below it. The node must be detached (no
    /// parent). Cached declarations and semantic types of freed nodes are
    /// purged.
    pub fn free_subtree(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        assert!(
            self.parent(id).is_none(),
            "free of attached node {id:?}; detach or replace first"
        );
        let mut stack = vec![id];
        let mut freed = Vec::new();
        while let Some(current) = stack.pop() {
            if !self.is_alive(current) {
                continue;
            }
            stack.extend(self.node(current).children());
            self.entries[current.index()] = None;
            freed.push(current);
        }
        for node in freed {
            self.decl_cache.remove(&node);
            if let Some(cached_ty) = self.type_cache.remove(&node) {
                // Cached types are parentless cache-owned trees.
                if self.is_alive(cached_ty) && self.parent(cached_ty).is_none() {
                    self.free_subtree(cached_ty);
                }
            }
        }
    }

    // ========================================================================
    // CONVENIENCE ACCESSORS
    // ========================================================================

    pub fn kind(&self, id: NodeId) -> crate::tree::NodeKind {
        self.node(id).kind()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children()
    }

    /// The integer payload, when `id` is an `IntVal`.
    pub fn int_value(&self, id: NodeId) -> Option<i64> {
        match self.node(id) {
            Node::IntVal(x) => Some(x.value),
            _ => None,
        }
    }

    pub fn bool_value(&self, id: NodeId) -> Option<bool> {
        match self.node(id) {
            Node::BoolVal(x) => Some(x.value),
            _ => None,
        }
    }
}

/// Deferred-deletion queue.
///
/// Rewrites detach nodes mid-traversal and queue them here; the queue is
/// flushed after each node's post-visit so sibling iteration never observes
/// a half-deleted tree.
#[derive(Debug, Default)]
pub struct Trash {
    queue: Vec<NodeId>,
}

impl Trash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a detached subtree for deletion.
    pub fn insert(&mut self, id: NodeId) {
        self.queue.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Free every queued subtree. Entries freed earlier in the same flush
    /// (nested queueing) are skipped.
    pub fn flush(&mut self, arena: &mut Arena) {
        for id in self.queue.drain(..) {
            if arena.is_alive(id) && arena.parent(id).is_none() {
                arena.free_subtree(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build::Builder;

    #[test]
    fn alloc_claims_children() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let lhs = b.int_val(1);
        let rhs = b.int_val(2);
        let e = b.binary(crate::tree::Operator::Plus, lhs, rhs);
        assert_eq!(arena.parent(lhs), Some(e));
        assert_eq!(arena.parent(rhs), Some(e));
        assert_eq!(arena.parent(e), None);
    }

    #[test]
    fn replace_rewires_parent() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let lhs = b.int_val(1);
        let rhs = b.int_val(2);
        let e = b.binary(crate::tree::Operator::Plus, lhs, rhs);
        let new_rhs = Builder::new(&mut arena).int_val(7);
        arena.replace(rhs, new_rhs);
        assert_eq!(arena.parent(new_rhs), Some(e));
        assert_eq!(arena.parent(rhs), None);
        arena.free_subtree(rhs);
        assert!(!arena.is_alive(rhs));
        assert!(arena.is_alive(new_rhs));
    }

    #[test]
    #[should_panic(expected = "already owned")]
    fn double_claim_panics() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let shared = b.int_val(3);
        let one = b.int_val(1);
        let _e1 = b.binary(crate::tree::Operator::Plus, one, shared);
        let two = b.int_val(2);
        let _e2 = b.binary(crate::tree::Operator::Plus, two, shared);
    }

    #[test]
    fn trash_flush_frees_detached_subtrees() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let lhs = b.int_val(1);
        let rhs = b.int_val(2);
        let e = b.binary(crate::tree::Operator::Plus, lhs, rhs);
        let before = arena.live_count();
        let replacement = Builder::new(&mut arena).int_val(3);
        arena.replace(e, replacement); // no parent: no-op swap
        let mut trash = Trash::new();
        trash.insert(e);
        trash.flush(&mut arena);
        assert_eq!(arena.live_count(), before + 1 - 3);
    }
}
