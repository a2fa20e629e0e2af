//! End-to-end simplification scenarios at the tree level, plus the
//! whole-pass properties: idempotence, determinism, ownership integrity.

mod common;

use common::{Fixture, assert_ownership_integrity};
use hif::semantics::HifSemantics;
use hif::simplify::{SimplifyOptions, simplify, simplify_with};
use hif::tree::key::object_key;
use hif::tree::nav::skip_casts;
use hif::tree::{Node, Operator};

/// `(a + 3) + (2 − 1)` with `a : Int32` becomes `a + 4`.
#[test]
fn s1_constants_group_and_fold() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_int32("a");
    f.declare_int32("b");
    let mut b = f.builder();
    let a = b.identifier("a");
    let three = b.int_val(3);
    let left = b.binary(Operator::Plus, a, three);
    let two = b.int_val(2);
    let one = b.int_val(1);
    let right = b.binary(Operator::Minus, two, one);
    let expr = b.binary(Operator::Plus, left, right);
    let target = b.identifier("b");
    let assign = f.assign(target, expr);

    simplify(&mut f.arena, &sem, f.system);

    let Node::Assign(a_node) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    let source = skip_casts(&f.arena, a_node.source);
    let Node::Expression(e) = f.arena.node(source).clone() else {
        panic!("expected `a + 4`, got {:?}", f.arena.node(a_node.source));
    };
    assert_eq!(e.op, Operator::Plus);
    assert_eq!(
        f.arena.node(e.lhs).name().map(|n| n.as_str()),
        Some("a"),
        "variable operand keeps its place"
    );
    assert_eq!(f.arena.int_value(skip_casts(&f.arena, e.rhs.unwrap())), Some(4));
    assert_ownership_integrity(&f.arena, f.system);
}

/// A slice selecting exactly one concat segment reduces to that segment.
#[test]
fn s2_concat_slice_selects_whole_segment() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bitvector("a_64", 8);
    f.declare_bitvector("b_64", 8);
    f.declare_bitvector("c", 8);
    let mut b = f.builder();
    let a = b.identifier("a_64");
    let bb = b.identifier("b_64");
    let concat = b.binary(Operator::Concat, a, bb);
    let span = b.downto(7, 0);
    let slice = b.slice(concat, span);
    let target = b.identifier("c");
    let assign = f.assign(target, slice);

    simplify(&mut f.arena, &sem, f.system);

    let Node::Assign(a_node) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    let source = skip_casts(&f.arena, a_node.source);
    assert_eq!(
        f.arena.node(source).name().map(|n| n.as_str()),
        Some("b_64"),
        "the low half of (a_64, b_64) is b_64 itself"
    );
    assert_ownership_integrity(&f.arena, f.system);
}

/// A constant-bound `for` unrolls into its iterations.
#[test]
fn s3_constant_for_unrolls() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_int_array("x", 4);
    let mut b = f.builder();
    let i_ty = b.int32_type();
    let zero = b.int_val(0);
    let i_decl = b.data_declaration(
        hif::tree::decl::DataKind::Variable,
        "i",
        i_ty,
        Some(zero),
    );
    let i1 = b.identifier("i");
    let four = b.int_val(4);
    let cond = b.binary(Operator::Lt, i1, four);
    let i2 = b.identifier("i");
    let i3 = b.identifier("i");
    let one = b.int_val(1);
    let inc = b.binary(Operator::Plus, i3, one);
    let step = b.assign(i2, inc);
    let x = b.identifier("x");
    let i4 = b.identifier("i");
    let member = b.member(x, i4);
    let zero2 = b.int_val(0);
    let body = b.assign(member, zero2);
    let for_loop = b.arena.alloc(Node::For(hif::tree::action::For {
        label: None,
        init_declarations: vec![i_decl],
        init_values: vec![],
        condition: Some(cond),
        step_actions: vec![step],
        actions: vec![body],
    }));
    f.add_action(for_loop);

    let opts = SimplifyOptions {
        simplify_statements: true,
        ..Default::default()
    };
    simplify_with(&mut f.arena, &sem, f.system, &opts);

    assert!(!f.arena.is_alive(for_loop), "the for statement is gone");
    let Node::State(state) = f.arena.node(f.state).clone() else {
        panic!("state expected");
    };
    assert_eq!(state.actions.len(), 4, "four unrolled assignments");
    for (expected, &action) in state.actions.iter().enumerate().map(|(i, a)| (i as i64, a)) {
        let Node::Assign(a_node) = f.arena.node(action).clone() else {
            panic!("assign expected");
        };
        let Node::Member(m) = f.arena.node(a_node.target).clone() else {
            panic!("member target expected");
        };
        assert_eq!(
            f.arena.int_value(skip_casts(&f.arena, m.index)),
            Some(expected)
        );
        assert_eq!(
            f.arena.int_value(skip_casts(&f.arena, a_node.source)),
            Some(0)
        );
    }
    assert_ownership_integrity(&f.arena, f.system);
}

/// An aggregate of consecutive members of one prefix becomes a slice cast
/// to the aggregate type.
#[test]
fn s4_aggregate_of_members_becomes_slice() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bitvector("a", 8);
    f.declare_bit_array("d", 3);
    let mut b = f.builder();
    let mut alts = Vec::new();
    for i in 0..3 {
        let prefix = b.identifier("a");
        let idx_v = b.int_val(i);
        let member = b.member(prefix, idx_v);
        let idx_a = b.int_val(i);
        alts.push(b.aggregate_alt(vec![idx_a], member));
    }
    let agg = b.aggregate(alts, None);
    let target = b.identifier("d");
    let assign = f.assign(target, agg);

    simplify(&mut f.arena, &sem, f.system);

    let Node::Assign(a_node) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    let Node::Cast(cast) = f.arena.node(a_node.source).clone() else {
        panic!(
            "expected a cast of a slice, got {:?}",
            f.arena.node(a_node.source)
        );
    };
    let Node::Slice(slice) = f.arena.node(cast.value).clone() else {
        panic!("expected a slice under the cast");
    };
    assert_eq!(
        f.arena.node(slice.prefix).name().map(|n| n.as_str()),
        Some("a")
    );
    let (left, right) =
        hif::typing::range_literal_bounds(&f.arena, slice.span).expect("literal span");
    assert_eq!((left, right), (2, 0));
    assert_ownership_integrity(&f.arena, f.system);
}

/// `when c then true else false` in boolean position reduces to `c`.
#[test]
fn s6_boolean_when_reduces_to_condition() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bool("c");
    f.declare_bool("b");
    let mut b = f.builder();
    let cond = b.identifier("c");
    let t = b.bool_val(true);
    let alt = b.when_alt(cond, t);
    let e = b.bool_val(false);
    let when = b.when(vec![alt], Some(e));
    let target = b.identifier("b");
    let assign = f.assign(target, when);

    simplify(&mut f.arena, &sem, f.system);

    let Node::Assign(a_node) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    let source = skip_casts(&f.arena, a_node.source);
    assert_eq!(
        f.arena.node(source).name().map(|n| n.as_str()),
        Some("c"),
        "the when folds to its condition"
    );
    assert_ownership_integrity(&f.arena, f.system);
}

/// Inverted polarity gets a negation.
#[test]
fn inverted_boolean_when_negates_condition() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bool("c");
    f.declare_bool("b");
    let mut b = f.builder();
    let cond = b.identifier("c");
    let t = b.bool_val(false);
    let alt = b.when_alt(cond, t);
    let e = b.bool_val(true);
    let when = b.when(vec![alt], Some(e));
    let target = b.identifier("b");
    let assign = f.assign(target, when);

    simplify(&mut f.arena, &sem, f.system);

    let Node::Assign(a_node) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    let source = skip_casts(&f.arena, a_node.source);
    let Node::Expression(e) = f.arena.node(source).clone() else {
        panic!("expected a negation");
    };
    assert_eq!(e.op, Operator::Not);
    assert_eq!(f.arena.node(e.lhs).name().map(|n| n.as_str()), Some("c"));
}

/// A logic-typed boolean `when` is preserved: the guard may be `X`.
#[test]
fn logic_when_is_not_reduced() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bool("c");
    f.declare_bit("lb", true);
    let mut b = f.builder();
    let cond = b.identifier("c");
    let bit_ty = b.bit_type(true, true);
    let t = b.typed_bit_val(hif::tree::BitConstant::One, bit_ty);
    let alt = b.when_alt(cond, t);
    let bit_ty2 = b.bit_type(true, true);
    let e = b.typed_bit_val(hif::tree::BitConstant::Zero, bit_ty2);
    let when = b.when(vec![alt], Some(e));
    let target = b.identifier("lb");
    let assign = f.assign(target, when);

    simplify(&mut f.arena, &sem, f.system);

    let Node::Assign(a_node) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    assert!(
        matches!(
            f.arena.node(skip_casts(&f.arena, a_node.source)),
            Node::When(_)
        ),
        "logic-typed when must survive"
    );
}

// ============================================================================
// WHOLE-PASS PROPERTIES
// ============================================================================

fn build_mixed_design(f: &mut Fixture) {
    f.declare_int32("a");
    f.declare_int32("b");
    f.declare_bitvector("v", 8);
    let mut b = f.builder();
    let a = b.identifier("a");
    let c3 = b.int_val(3);
    let left = b.binary(Operator::Plus, a, c3);
    let c2 = b.int_val(2);
    let c1 = b.int_val(1);
    let right = b.binary(Operator::Minus, c2, c1);
    let expr = b.binary(Operator::Plus, left, right);
    let t1 = b.identifier("b");
    f.assign(t1, expr);
    let mut b = f.builder();
    let v = b.identifier("v");
    let span = b.downto(7, 0);
    let sl = b.slice(v, span);
    let t2 = b.identifier("v");
    f.assign(t2, sl);
}

/// `simplify ∘ simplify = simplify` (tree equality).
#[test]
fn simplify_is_idempotent() {
    let sem = HifSemantics;
    let mut once = Fixture::new();
    build_mixed_design(&mut once);
    simplify(&mut once.arena, &sem, once.system);
    let key_once = object_key(&once.arena, once.system);

    let mut twice = Fixture::new();
    build_mixed_design(&mut twice);
    simplify(&mut twice.arena, &sem, twice.system);
    simplify(&mut twice.arena, &sem, twice.system);
    let key_twice = object_key(&twice.arena, twice.system);

    assert_eq!(key_once, key_twice);
}

/// The output depends only on the input tree and options.
#[test]
fn simplify_is_deterministic() {
    let sem = HifSemantics;
    let mut first = Fixture::new();
    build_mixed_design(&mut first);
    simplify(&mut first.arena, &sem, first.system);

    let mut second = Fixture::new();
    build_mixed_design(&mut second);
    simplify(&mut second.arena, &sem, second.system);

    assert_eq!(
        object_key(&first.arena, first.system),
        object_key(&second.arena, second.system)
    );
}

/// No reachable node is dead, shared, or mis-parented after a pass.
#[test]
fn simplify_preserves_ownership() {
    let sem = HifSemantics;
    let mut f = Fixture::new();
    build_mixed_design(&mut f);
    simplify(&mut f.arena, &sem, f.system);
    assert_ownership_integrity(&f.arena, f.system);
}
