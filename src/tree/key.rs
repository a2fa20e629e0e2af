//! Canonical string keys for subtrees.
//!
//! The simplification driver remembers the keys of expression shapes it has
//! already visited within one invocation and refuses re-entry, which breaks
//! rewrite loops between rebalancing, linearization and sorting. Keys
//! depend only on structure, never on arena indices.

use std::fmt::Write;

use crate::tree::{Arena, Node, NodeId};

/// Canonical key of the subtree rooted at `id`.
pub fn object_key(arena: &Arena, id: NodeId) -> String {
    let mut out = String::new();
    write_key(arena, id, &mut out);
    out
}

fn write_key(arena: &Arena, id: NodeId, out: &mut String) {
    let node = arena.node(id);
    let _ = write!(out, "{:?}", node.kind());
    match node {
        Node::BitVal(x) => {
            let _ = write!(out, ":{}", x.value.to_char());
        }
        Node::BitvectorVal(x) => {
            let _ = write!(out, ":{}", x.value);
        }
        Node::BoolVal(x) => {
            let _ = write!(out, ":{}", x.value);
        }
        Node::CharVal(x) => {
            let _ = write!(out, ":{}", x.value);
        }
        Node::IntVal(x) => {
            let _ = write!(out, ":{}", x.value);
        }
        Node::RealVal(x) => {
            let _ = write!(out, ":{}", x.value);
        }
        Node::StringVal(x) => {
            let _ = write!(out, ":{:?}", x.value);
        }
        Node::TimeVal(x) => {
            let _ = write!(out, ":{}{:?}", x.value, x.unit);
        }
        Node::Expression(x) => {
            let _ = write!(out, ":{:?}", x.op);
        }
        Node::Range(x) => {
            let _ = write!(out, ":{:?}", x.direction);
        }
        other => {
            if let Some(name) = other.name() {
                let _ = write!(out, ":{name}");
            }
        }
    }
    out.push('[');
    for (i, child) in node.children().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_key(arena, *child, out);
    }
    out.push(']');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Operator;
    use crate::tree::build::Builder;

    #[test]
    fn keys_identify_shapes_not_nodes() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let e1 = {
            let x = b.identifier("x");
            let c = b.int_val(1);
            b.binary(Operator::Plus, x, c)
        };
        let e2 = {
            let x = b.identifier("x");
            let c = b.int_val(1);
            b.binary(Operator::Plus, x, c)
        };
        let e3 = {
            let x = b.identifier("x");
            let c = b.int_val(2);
            b.binary(Operator::Plus, x, c)
        };
        assert_eq!(object_key(&arena, e1), object_key(&arena, e2));
        assert_ne!(object_key(&arena, e1), object_key(&arena, e3));
    }
}
