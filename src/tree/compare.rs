//! Stable total order over nodes.
//!
//! Used to canonicalize commutative operands, aggregate alternates and
//! `with` alternates. The order is defined by kind, then by the node's own
//! payload, then by children lexicographically — never by arena addresses,
//! so sorting is deterministic across runs (and a node equal to another
//! under default [`equals`](crate::tree::equals::equals_default) compares
//! `Equal`).

use std::cmp::Ordering;

use crate::tree::{Arena, Node, NodeId};

/// Total order over subtrees.
pub fn compare(arena: &Arena, a: NodeId, b: NodeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let na = arena.node(a);
    let nb = arena.node(b);

    match na.kind().cmp(&nb.kind()) {
        Ordering::Equal => {}
        other => return other,
    }

    match compare_headers(na, nb) {
        Ordering::Equal => {}
        other => return other,
    }

    let ca = na.children();
    let cb = nb.children();
    for (&x, &y) in ca.iter().zip(cb.iter()) {
        match compare(arena, x, y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    ca.len().cmp(&cb.len())
}

fn compare_headers(a: &Node, b: &Node) -> Ordering {
    use Node::*;
    match (a, b) {
        (BitVal(x), BitVal(y)) => x.value.cmp(&y.value),
        (BitvectorVal(x), BitvectorVal(y)) => x.value.cmp(&y.value),
        (BoolVal(x), BoolVal(y)) => x.value.cmp(&y.value),
        (CharVal(x), CharVal(y)) => x.value.cmp(&y.value),
        (IntVal(x), IntVal(y)) => x.value.cmp(&y.value),
        (RealVal(x), RealVal(y)) => x.value.total_cmp(&y.value),
        (StringVal(x), StringVal(y)) => x.value.cmp(&y.value),
        (TimeVal(x), TimeVal(y)) => x
            .unit
            .cmp(&y.unit)
            .then_with(|| x.value.total_cmp(&y.value)),
        (Identifier(x), Identifier(y)) => x.name.cmp(&y.name),
        (FieldReference(x), FieldReference(y)) => x.field.cmp(&y.field),
        (Expression(x), Expression(y)) => x.op.cmp(&y.op),
        (FunctionCall(x), FunctionCall(y)) => x.name.cmp(&y.name),
        (RecordValueAlt(x), RecordValueAlt(y)) => x.field.cmp(&y.field),
        (Range(x), Range(y)) => x.direction.cmp(&y.direction),
        (BitT(x), BitT(y)) => (x.logic, x.resolved, x.constexpr)
            .cmp(&(y.logic, y.resolved, y.constexpr)),
        (IntT(x), IntT(y)) => (x.signed, x.constexpr).cmp(&(y.signed, y.constexpr)),
        (BitvectorT(x), BitvectorT(y)) => (x.signed, x.logic, x.resolved, x.constexpr)
            .cmp(&(y.signed, y.logic, y.resolved, y.constexpr)),
        (ArrayT(x), ArrayT(y)) => (x.signed, x.constexpr).cmp(&(y.signed, y.constexpr)),
        (TypeReference(x), TypeReference(y)) => x.name.cmp(&y.name),
        (ViewReference(x), ViewReference(y)) => x
            .design_unit
            .cmp(&y.design_unit)
            .then_with(|| x.name.cmp(&y.name)),
        _ => match (a.name(), b.name()) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Operator;
    use crate::tree::build::Builder;
    use crate::tree::equals::equals_default;

    #[test]
    fn equal_trees_compare_equal() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let x1 = b.identifier("x");
        let x2 = b.identifier("x");
        assert_eq!(compare(&arena, x1, x2), Ordering::Equal);
        assert!(equals_default(&arena, x1, x2));
    }

    #[test]
    fn order_is_antisymmetric_and_stable() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let a = b.identifier("a");
        let c = b.int_val(3);
        let e1 = b.binary(Operator::Plus, a, c);
        let d = b.identifier("d");
        let f = b.int_val(3);
        let e2 = b.binary(Operator::Mult, d, f);
        let first = compare(&arena, e1, e2);
        let second = compare(&arena, e2, e1);
        assert_eq!(first, second.reverse());
        assert_eq!(first, compare(&arena, e1, e2));
    }

    #[test]
    fn constants_order_by_value() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let two = b.int_val(2);
        let ten = b.int_val(10);
        assert_eq!(compare(&arena, two, ten), Ordering::Less);
    }
}
