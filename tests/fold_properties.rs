//! Folding properties over operand grids: every folded operator is
//! checked against an independently computed expectation, plus the edge
//! rules (division by zero, wide shifts, modulo normalization, nine-valued
//! logic, short-circuiting, time units).

mod common;

use common::Fixture;
use hif::semantics::HifSemantics;
use hif::simplify::{Behavior, SimplifyOptions, simplify_with};
use hif::tree::nav::skip_casts;
use hif::tree::{BitConstant, Node, NodeId, Operator, TimeUnit};
use rstest::rstest;

/// Fold `lhs op rhs` (integers) through a full simplify of a detached
/// expression and return the folded integer, when any.
fn fold_ints(op: Operator, lhs: i64, rhs: i64, behavior: Behavior) -> Option<i64> {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.int_val(lhs);
    let r = b.int_val(rhs);
    let e = b.binary(op, l, r);
    let opts = SimplifyOptions {
        behavior,
        ..Default::default()
    };
    let out = simplify_with(&mut f.arena, &sem, e, &opts);
    f.arena.int_value(skip_casts(&f.arena, out))
}

fn fold_bits(op: Operator, lhs: BitConstant, rhs: BitConstant) -> Option<BitConstant> {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.bit_val(lhs);
    let r = b.bit_val(rhs);
    let e = b.binary(op, l, r);
    let out = simplify_with(&mut f.arena, &sem, e, &SimplifyOptions::default());
    match f.arena.node(skip_casts(&f.arena, out)) {
        Node::BitVal(x) => Some(x.value),
        Node::BoolVal(x) => Some(if x.value {
            BitConstant::One
        } else {
            BitConstant::Zero
        }),
        _ => None,
    }
}

#[rstest]
#[case(Operator::Plus, 17, 25, 42)]
#[case(Operator::Plus, -3, 3, 0)]
#[case(Operator::Minus, 17, 25, -8)]
#[case(Operator::Mult, 6, 7, 42)]
#[case(Operator::Div, 42, 6, 7)]
#[case(Operator::Div, -42, 6, -7)]
#[case(Operator::Rem, 7, 3, 1)]
#[case(Operator::Rem, -7, 3, -1)]
#[case(Operator::BAnd, 0b1100, 0b1010, 0b1000)]
#[case(Operator::BOr, 0b1100, 0b1010, 0b1110)]
#[case(Operator::BXor, 0b1100, 0b1010, 0b0110)]
#[case(Operator::Sll, 1, 5, 32)]
fn integer_arithmetic_folds(
    #[case] op: Operator,
    #[case] lhs: i64,
    #[case] rhs: i64,
    #[case] expected: i64,
) {
    assert_eq!(fold_ints(op, lhs, rhs, Behavior::Normal), Some(expected));
}

#[rstest]
#[case(Operator::Eq, 4, 4, true)]
#[case(Operator::Eq, 4, 5, false)]
#[case(Operator::Neq, 4, 5, true)]
#[case(Operator::Lt, 3, 4, true)]
#[case(Operator::Ge, 3, 4, false)]
#[case(Operator::Le, 4, 4, true)]
fn integer_relational_folds(
    #[case] op: Operator,
    #[case] lhs: i64,
    #[case] rhs: i64,
    #[case] expected: bool,
) {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.int_val(lhs);
    let r = b.int_val(rhs);
    let e = b.binary(op, l, r);
    let out = simplify_with(&mut f.arena, &sem, e, &SimplifyOptions::default());
    assert_eq!(f.arena.bool_value(skip_casts(&f.arena, out)), Some(expected));
}

/// Division by zero is an absence, never a panic.
#[test]
fn division_by_zero_does_not_fold() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.int_val(42);
    let r = b.int_val(0);
    let e = b.binary(Operator::Div, l, r);
    let out = simplify_with(&mut f.arena, &sem, e, &SimplifyOptions::default());
    assert!(
        matches!(f.arena.node(out), Node::Expression(_)),
        "42 / 0 must stay an expression"
    );
}

/// Inexact integer division folds only in aggressive mode.
#[test]
fn inexact_division_respects_behavior() {
    assert_eq!(fold_ints(Operator::Div, 7, 2, Behavior::Normal), None);
    assert_eq!(fold_ints(Operator::Div, 7, 2, Behavior::Aggressive), Some(3));
}

/// Shifts of 64 or more positions collapse.
#[rstest]
#[case(Operator::Sll, 1, 64, 0)]
#[case(Operator::Srl, -1, 64, 0)]
#[case(Operator::Sra, -8, 2, -2)]
fn wide_shifts_collapse(
    #[case] op: Operator,
    #[case] lhs: i64,
    #[case] rhs: i64,
    #[case] expected: i64,
) {
    assert_eq!(fold_ints(op, lhs, rhs, Behavior::Normal), Some(expected));
}

/// Arithmetic right shift by ≥ 64 of a negative signed value is −1.
#[test]
fn sra_of_negative_by_64_is_minus_one() {
    assert_eq!(fold_ints(Operator::Sra, -5, 64, Behavior::Normal), Some(-1));
}

/// Modulo normalizes to a non-negative remainder for non-negative moduli.
#[rstest]
#[case(7, 3, 1)]
#[case(-7, 3, 2)]
#[case(7, -3, -2)]
#[case(-7, -3, -1)]
fn modulo_sign_normalization(#[case] a: i64, #[case] n: i64, #[case] expected: i64) {
    assert_eq!(fold_ints(Operator::Mod, a, n, Behavior::Normal), Some(expected));
}

// ============================================================================
// NINE-VALUED LOGIC
// ============================================================================

#[rstest]
#[case(Operator::BAnd, BitConstant::Zero, BitConstant::X, BitConstant::Zero)]
#[case(Operator::BAnd, BitConstant::One, BitConstant::X, BitConstant::X)]
#[case(Operator::BOr, BitConstant::One, BitConstant::X, BitConstant::One)]
#[case(Operator::BOr, BitConstant::Zero, BitConstant::X, BitConstant::X)]
#[case(Operator::BXor, BitConstant::One, BitConstant::X, BitConstant::X)]
#[case(Operator::BAnd, BitConstant::L, BitConstant::One, BitConstant::Zero)]
#[case(Operator::BOr, BitConstant::H, BitConstant::Zero, BitConstant::One)]
fn nine_valued_bitwise(
    #[case] op: Operator,
    #[case] a: BitConstant,
    #[case] b: BitConstant,
    #[case] expected: BitConstant,
) {
    assert_eq!(fold_bits(op, a, b), Some(expected));
}

/// `X == X` stays unknown under plain equality but is decided by
/// case-equality.
#[test]
fn case_equality_decides_unknowns() {
    assert_eq!(
        fold_bits(Operator::Eq, BitConstant::X, BitConstant::X),
        Some(BitConstant::X)
    );
    assert_eq!(
        fold_bits(Operator::CaseEq, BitConstant::X, BitConstant::X),
        Some(BitConstant::One)
    );
    assert_eq!(
        fold_bits(Operator::CaseNeq, BitConstant::X, BitConstant::Z),
        Some(BitConstant::One)
    );
}

/// `false ∧ X ⇒ false`, `true ∨ X ⇒ true` without evaluating `X`.
#[test]
fn logical_operators_short_circuit() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bool("x");
    f.declare_bool("t");
    let mut b = f.builder();
    let c = b.bool_val(false);
    let x = b.identifier("x");
    let e = b.binary(Operator::And, c, x);
    let t = b.identifier("t");
    let assign = f.assign(t, e);
    simplify_with(&mut f.arena, &sem, f.system, &SimplifyOptions::default());
    let Node::Assign(a) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    assert_eq!(
        f.arena.bool_value(skip_casts(&f.arena, a.source)),
        Some(false)
    );
}

#[test]
fn true_or_absorbs() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bool("x");
    f.declare_bool("t");
    let mut b = f.builder();
    let c = b.bool_val(true);
    let x = b.identifier("x");
    let e = b.binary(Operator::Or, c, x);
    let t = b.identifier("t");
    let assign = f.assign(t, e);
    simplify_with(&mut f.arena, &sem, f.system, &SimplifyOptions::default());
    let Node::Assign(a) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    assert_eq!(
        f.arena.bool_value(skip_casts(&f.arena, a.source)),
        Some(true)
    );
}

// ============================================================================
// EQUAL SUBTREES
// ============================================================================

/// Build `target := x op x`, simplify the design, and return the folded
/// source. The caller declares `x` and `target` up front.
fn fold_identifier_pair(fixture: &mut Fixture, op: Operator, target: &str) -> NodeId {
    let sem = HifSemantics;
    let mut b = fixture.builder();
    let x1 = b.identifier("x");
    let x2 = b.identifier("x");
    let e = b.binary(op, x1, x2);
    let t = b.identifier(target);
    let assign = fixture.assign(t, e);
    simplify_with(
        &mut fixture.arena,
        &sem,
        fixture.system,
        &SimplifyOptions::default(),
    );
    let Node::Assign(a) = fixture.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    skip_casts(&fixture.arena, a.source)
}

#[test]
fn equal_subtrees_fold_arithmetically() {
    let mut f = Fixture::new();
    f.declare_int32("x");
    f.declare_int32("scratch");
    let out = fold_identifier_pair(&mut f, Operator::Minus, "scratch");
    assert_eq!(f.arena.int_value(out), Some(0));

    let mut f = Fixture::new();
    f.declare_int32("x");
    f.declare_int32("scratch");
    let out = fold_identifier_pair(&mut f, Operator::Div, "scratch");
    assert_eq!(f.arena.int_value(out), Some(1));

    let mut f = Fixture::new();
    f.declare_int32("x");
    f.declare_bool("flag");
    let out = fold_identifier_pair(&mut f, Operator::Eq, "flag");
    assert_eq!(f.arena.bool_value(out), Some(true));
}

/// `x == x` on logic operands is preserved (`X == X ⇒ X`).
#[test]
fn logic_equality_on_equal_subtrees_is_preserved() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bit("x", true);
    f.declare_bool("t");
    let mut b = f.builder();
    let x1 = b.identifier("x");
    let x2 = b.identifier("x");
    let e = b.binary(Operator::Eq, x1, x2);
    let t = b.identifier("t");
    let assign = f.assign(t, e);
    simplify_with(&mut f.arena, &sem, f.system, &SimplifyOptions::default());
    let Node::Assign(a) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    assert!(
        matches!(
            f.arena.node(skip_casts(&f.arena, a.source)),
            Node::Expression(_)
        ),
        "logic equality must not fold"
    );
}

// ============================================================================
// STRINGS, VECTORS, TIME
// ============================================================================

#[test]
fn string_concat_is_pointwise() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.string_val("foo");
    let r = b.string_val("bar");
    let e = b.binary(Operator::Concat, l, r);
    let out = simplify_with(&mut f.arena, &sem, e, &SimplifyOptions::default());
    match f.arena.node(skip_casts(&f.arena, out)) {
        Node::StringVal(s) => assert_eq!(s.value, "foobar"),
        other => panic!("expected folded string, got {other:?}"),
    }
}

#[test]
fn bitvector_concat_joins_digits() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.bitvector_val("10");
    let r = b.bitvector_val("0X");
    let e = b.binary(Operator::Concat, l, r);
    let out = simplify_with(&mut f.arena, &sem, e, &SimplifyOptions::default());
    match f.arena.node(skip_casts(&f.arena, out)) {
        Node::BitvectorVal(v) => assert_eq!(v.value, "100X"),
        other => panic!("expected folded bitvector, got {other:?}"),
    }
}

#[test]
fn bitvector_bitwise_keeps_nine_valued_semantics() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.bitvector_val("1X0");
    let r = b.bitvector_val("110");
    let e = b.binary(Operator::BAnd, l, r);
    let out = simplify_with(&mut f.arena, &sem, e, &SimplifyOptions::default());
    match f.arena.node(skip_casts(&f.arena, out)) {
        Node::BitvectorVal(v) => assert_eq!(v.value, "1X0"),
        other => panic!("expected folded bitvector, got {other:?}"),
    }
}

/// Time values normalize to the smaller unit before combining.
#[test]
fn time_addition_normalizes_units() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    let mut b = f.builder();
    let l = b.time_val(1.0, TimeUnit::Ns);
    let r = b.time_val(500.0, TimeUnit::Ps);
    let e = b.binary(Operator::Plus, l, r);
    let out = simplify_with(&mut f.arena, &sem, e, &SimplifyOptions::default());
    match f.arena.node(skip_casts(&f.arena, out)) {
        Node::TimeVal(t) => {
            assert_eq!(t.unit, TimeUnit::Ps);
            assert_eq!(t.value, 1500.0);
        }
        other => panic!("expected folded time value, got {other:?}"),
    }
}

/// `0 + x`, `x · 1`, `x · 0` and friends.
#[test]
fn neutral_and_absorbing_elements() {
    let sem = HifSemantics;

    let mut f = Fixture::new();
    f.declare_int32("x");
    f.declare_int32("t");
    let mut b = f.builder();
    let zero = b.int_val(0);
    let x = b.identifier("x");
    let e = b.binary(Operator::Plus, zero, x);
    let t = b.identifier("t");
    let assign = f.assign(t, e);
    simplify_with(&mut f.arena, &sem, f.system, &SimplifyOptions::default());
    let Node::Assign(a) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    assert_eq!(
        f.arena
            .node(skip_casts(&f.arena, a.source))
            .name()
            .map(|n| n.as_str()),
        Some("x")
    );

    let mut f = Fixture::new();
    f.declare_int32("x");
    f.declare_int32("t");
    let mut b = f.builder();
    let x = b.identifier("x");
    let zero = b.int_val(0);
    let e = b.binary(Operator::Mult, x, zero);
    let t = b.identifier("t");
    let assign = f.assign(t, e);
    simplify_with(&mut f.arena, &sem, f.system, &SimplifyOptions::default());
    let Node::Assign(a) = f.arena.node(assign).clone() else {
        panic!("assign expected");
    };
    assert_eq!(
        f.arena.int_value(skip_casts(&f.arena, a.source)),
        Some(0)
    );
}
