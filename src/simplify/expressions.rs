//! Expression rewrites: the driver's order for expression nodes is
//!
//! 1. reduce `op_none` wrappers;
//! 2. drop redundant casts on operands;
//! 3. distribute over `when` branches;
//! 4. recognize complementary bitwise constants;
//! 5. map arithmetic on 1-bit operands to the bitwise/logical family;
//! 6. collapse multiplications around a repeated operand;
//! 7. rebalance so nested constants become neighbours and fold;
//! 8. push unary operators downward, constants upward;
//! 9. canonicalize commutative branches, linearize right-heavy trees;
//! 10. constant-fold, wrapping in a cast when folding shifted the type.
//!
//! A key set of already-visited expression shapes breaks rewrite loops
//! between 7, 9 and the re-visits.

use crate::fold::fold_expression;
use crate::simplify::Simplifier;
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::equals::{EqualsOptions, equals, equals_default};
use crate::tree::key::object_key;
use crate::tree::{Arena, Node, NodeId, NodeKind, Operator};
use crate::typing::{semantic_type, type_bitwidth, type_is_logic};

/// Operators the rebalancer may regroup.
fn rebalance_compatible(oper1: Operator, oper2: Operator) -> bool {
    let additive = |op| matches!(op, Operator::Plus | Operator::Minus);
    let multiplicative = |op| matches!(op, Operator::Mult | Operator::Div);
    if additive(oper1) && additive(oper2) {
        return true;
    }
    if multiplicative(oper1) && multiplicative(oper2) {
        return true;
    }
    // Bitwise/xor only when both levels use the same operator.
    oper1 == oper2
        && matches!(
            oper1,
            Operator::BAnd | Operator::BOr | Operator::BXor | Operator::Xor
        )
}

fn allowed_commutative(op: Operator) -> bool {
    matches!(
        op,
        Operator::Plus | Operator::Mult | Operator::BAnd | Operator::BOr | Operator::BXor
            | Operator::Xor
    ) && op.is_commutative()
}

fn allowed_inverse(op: Operator) -> Operator {
    match op {
        Operator::Plus | Operator::Minus | Operator::Mult | Operator::Div => op.inverse(),
        _ => Operator::None,
    }
}

/// Operand roles of a rebalanceable shape. `outer_const` is the operand of
/// the outer expression that pairs with `inner_const`; `rest` is hoisted.
struct NestedOperands {
    rest: NodeId,
    outer_const: NodeId,
    inner_const: NodeId,
    oper1: Operator,
    oper2: Operator,
    /// Inner expression is the outer's left operand.
    left1: bool,
    /// `rest` is the inner expression's left operand.
    left2: bool,
}

impl Simplifier<'_> {
    pub(crate) fn visit_expression(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_op_none(arena, id) {
            return;
        }
        if self.simplify_operand_casts(arena, id) {
            return;
        }
        if self.simplify_double_when(arena, id) {
            return;
        }
        if self.simplify_bitwise_constants(arena, id) {
            return;
        }
        if self.simplify_arith_bit_operation(arena, id) {
            return;
        }
        if self.simplify_multiplication(arena, id) {
            return;
        }

        if self.expression_key_seen(arena, id) {
            return;
        }
        let key = object_key(arena, id);

        let Some(orig_ty_cached) = semantic_type(arena, self.sem, id) else {
            return;
        };
        let orig_ty = deep_copy(arena, orig_ty_cached);

        let rebalanced = self.rebalance_expression(arena, id);
        let current = rebalanced.unwrap_or(id);
        let pushed = self.push_down_operators(arena, current);
        let lifted = self.push_up_constants(arena, current);
        let linearized = self.linearize_expression_tree(arena, current);
        let sorted = self.sort_branches(arena, current)
            | crate::manip::sort::sort_expression(arena, self.sem, current);
        if pushed | lifted | linearized | sorted {
            crate::typing::reset_types(arena, current, false);
        }

        let folded = fold_expression(arena, self.sem, &self.opts.clone(), current);
        if let Some(result) = folded {
            let final_id = self.accept_fold_result(arena, current, result, orig_ty);
            if let Some(final_id) = final_id {
                self.visit(arena, final_id);
            }
            return;
        }
        arena.free_subtree(orig_ty);

        let structural = rebalanced.is_some() || pushed || lifted || linearized || sorted;
        if structural && arena.is_alive(current) {
            let possible_loop = linearized && (rebalanced.is_some() || sorted);
            if possible_loop {
                self.expression_keys.insert(key.clone());
            }
            self.visit(arena, current);
            if possible_loop {
                self.expression_keys.remove(&key);
            }
        }
    }

    /// Install a fold result, preserving the original type: identical
    /// types swap directly; a flag-level difference (or a non-expression
    /// result) gets a restoring cast; anything else abandons the fold.
    fn accept_fold_result(
        &mut self,
        arena: &mut Arena,
        old: NodeId,
        result: NodeId,
        orig_ty: NodeId,
    ) -> Option<NodeId> {
        let Some(result_ty) = semantic_type(arena, self.sem, result) else {
            arena.free_subtree(result);
            arena.free_subtree(orig_ty);
            return None;
        };
        let strict = equals_default(arena, orig_ty, result_ty);
        let relaxed = equals(
            arena,
            orig_ty,
            result_ty,
            EqualsOptions {
                check_constexpr_flag: false,
                check_signed_flag: false,
                check_resolved_flag: false,
                ..Default::default()
            },
        );
        if strict {
            arena.free_subtree(orig_ty);
            self.replace(arena, old, result);
            return Some(result);
        }
        if relaxed || arena.kind(result) != NodeKind::Expression {
            let inner = crate::typing::assure_syntactic_type(arena, self.sem, result);
            let cast = Builder::new(arena).cast(orig_ty, inner);
            self.replace(arena, old, cast);
            return Some(cast);
        }
        // Unsafe manipulation: keep the original expression.
        arena.free_subtree(result);
        arena.free_subtree(orig_ty);
        None
    }

    // ========================================================================
    // QUICK RULES
    // ========================================================================

    fn simplify_op_none(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        if e.op != Operator::None {
            return false;
        }
        let inner = e.lhs;
        self.hoist(arena, id, inner);
        self.visit(arena, inner);
        true
    }

    /// Drop operand casts that do not change the operation's result.
    fn simplify_operand_casts(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        let cast1 = match arena.node(e.lhs) {
            Node::Cast(c) => Some(c.clone()),
            _ => None,
        };
        let cast2 = e.rhs.and_then(|rhs| match arena.node(rhs) {
            Node::Cast(c) => Some(c.clone()),
            _ => None,
        });
        if cast1.is_none() && cast2.is_none() {
            return false;
        }

        let Some(orig_ty_cached) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let orig_ty = deep_copy(arena, orig_ty_cached);

        let base_of = |s: &mut Self, arena: &mut Arena, v: NodeId| -> Option<NodeId> {
            let t = semantic_type(arena, s.sem, v)?;
            Some(crate::typing::base_type(arena, s.sem, t, false))
        };
        let Some(t1base) = base_of(self, arena, e.lhs) else {
            arena.free_subtree(orig_ty);
            return false;
        };
        let t2base = match e.rhs {
            Some(rhs) => match base_of(self, arena, rhs) {
                Some(t) => Some(t),
                None => {
                    arena.free_subtree(orig_ty);
                    return false;
                }
            },
            None => None,
        };
        let sub1 = match &cast1 {
            Some(c) => match base_of(self, arena, c.value) {
                Some(t) => t,
                None => {
                    arena.free_subtree(orig_ty);
                    return false;
                }
            },
            None => t1base,
        };
        let sub2 = match (&cast2, e.rhs) {
            (Some(c), Some(_)) => match base_of(self, arena, c.value) {
                Some(t) => Some(t),
                None => {
                    arena.free_subtree(orig_ty);
                    return false;
                }
            },
            _ => t2base,
        };

        // Which side's cast can actually go?
        let mut drop1 = cast1.is_some();
        let mut drop2 = cast2.is_some();
        let mut simplified = self.sem.expr_type(arena, sub1, sub2, e.op, Some(id));
        if simplified.is_none() && drop1 {
            simplified = self.sem.expr_type(arena, sub1, t2base, e.op, Some(id));
            if simplified.is_some() {
                drop2 = false;
            }
        }
        if simplified.is_none() && drop2 {
            simplified = self.sem.expr_type(arena, t1base, sub2, e.op, Some(id));
            if simplified.is_some() {
                drop1 = false;
            }
        }
        let Some(simplified) = simplified else {
            arena.free_subtree(orig_ty);
            return false;
        };
        let Some(orig_info) = self.sem.expr_type(arena, t1base, t2base, e.op, Some(id))
        else {
            arena.free_subtree(simplified.returned);
            arena.free_subtree(simplified.precision);
            arena.free_subtree(orig_ty);
            return false;
        };

        let verdict =
            self.sem
                .can_remove_cast_on_operands(arena, &orig_info, &simplified, e.op);
        for t in [
            simplified.returned,
            simplified.precision,
            orig_info.returned,
            orig_info.precision,
        ] {
            arena.free_subtree(t);
        }
        if !verdict.safe {
            arena.free_subtree(orig_ty);
            return false;
        }
        if !drop1 && drop2 && e.op.is_shift() && !verdict.safe_on_shift {
            // The shift amount cast is load-bearing.
            arena.free_subtree(orig_ty);
            return false;
        }

        let mut removed_any = false;
        if let Some(c) = &cast1 {
            if drop1 {
                self.hoist(arena, e.lhs, c.value);
                removed_any = true;
            }
        }
        if let Some(c) = &cast2 {
            if drop2 && (!e.op.is_shift() || verdict.safe_on_shift) {
                self.hoist(arena, e.rhs.expect("binary"), c.value);
                removed_any = true;
            }
        }
        if !removed_any {
            arena.free_subtree(orig_ty);
            return false;
        }
        crate::typing::reset_types(arena, id, false);

        let changed_type = match semantic_type(arena, self.sem, id) {
            Some(new_ty) => !equals_default(arena, new_ty, orig_ty),
            None => true,
        };
        let final_id = if changed_type {
            self.rebuild_slot(arena, id, |arena, inner| {
                Builder::new(arena).cast(orig_ty, inner)
            })
        } else {
            arena.free_subtree(orig_ty);
            id
        };
        self.visit(arena, final_id);
        true
    }

    /// Distribute an operation over `when` alternatives so each branch can
    /// fold independently: `when ⊕ x` becomes a `when` of `⊕`-expressions.
    fn simplify_double_when(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        let lhs_when = arena.kind(e.lhs) == NodeKind::When;
        let rhs_when = e.rhs.is_some_and(|r| arena.kind(r) == NodeKind::When);
        if !lhs_when && !rhs_when {
            return false;
        }

        // when ⊕ when distributes only over identical alternative guards.
        if lhs_when && rhs_when {
            return self.merge_double_when(arena, id, &e);
        }

        let (when_id, other, when_is_left) = if lhs_when {
            (e.lhs, e.rhs, true)
        } else {
            (e.rhs.expect("checked"), Some(e.lhs), false)
        };
        let Some(when_ty_cached) = semantic_type(arena, self.sem, when_id) else {
            return false;
        };
        let when_ty = deep_copy(arena, when_ty_cached);

        let Node::When(w) = arena.node(when_id).clone() else {
            return false;
        };
        let mut branch_values: Vec<NodeId> = Vec::new();
        for &alt in &w.alts {
            if let Node::WhenAlt(wa) = arena.node(alt) {
                branch_values.push(wa.value);
            }
        }
        branch_values.extend(w.default);

        for value in branch_values {
            let ty_copy = deep_copy(arena, when_ty);
            let op = e.op;
            let other_copy = other.map(|o| deep_copy(arena, o));
            self.rebuild_slot(arena, value, |arena, inner| {
                let mut b = Builder::new(arena);
                let casted = b.cast(ty_copy, inner);
                match (other_copy, when_is_left) {
                    (None, _) => b.unary(op, casted),
                    (Some(o), true) => b.binary(op, casted, o),
                    (Some(o), false) => b.binary(op, o, casted),
                }
            });
        }
        arena.free_subtree(when_ty);
        self.hoist(arena, id, when_id);
        crate::typing::reset_types(arena, when_id, false);
        self.visit(arena, when_id);
        true
    }

    fn merge_double_when(
        &mut self,
        arena: &mut Arena,
        id: NodeId,
        e: &crate::tree::value::Expression,
    ) -> bool {
        let (lw_id, rw_id) = (e.lhs, e.rhs.expect("binary"));
        let (Node::When(lw), Node::When(rw)) =
            (arena.node(lw_id).clone(), arena.node(rw_id).clone())
        else {
            return false;
        };
        if lw.alts.len() != rw.alts.len() || lw.default.is_some() != rw.default.is_some() {
            return false;
        }
        let alt_parts = |arena: &Arena, alt: NodeId| match arena.node(alt) {
            Node::WhenAlt(wa) => (wa.condition, wa.value),
            _ => unreachable!("when owns when-alts"),
        };
        for (&la, &ra) in lw.alts.iter().zip(rw.alts.iter()) {
            let (lc, _) = alt_parts(arena, la);
            let (rc, _) = alt_parts(arena, ra);
            if !equals_default(arena, lc, rc) {
                return false;
            }
        }
        let Some(l_ty_cached) = semantic_type(arena, self.sem, lw_id) else {
            return false;
        };
        let l_ty = deep_copy(arena, l_ty_cached);
        let Some(r_ty_cached) = semantic_type(arena, self.sem, rw_id) else {
            arena.free_subtree(l_ty);
            return false;
        };
        let r_ty = deep_copy(arena, r_ty_cached);

        let pairs: Vec<(NodeId, NodeId)> = lw
            .alts
            .iter()
            .zip(rw.alts.iter())
            .map(|(&la, &ra)| (alt_parts(arena, la).1, alt_parts(arena, ra).1))
            .chain(lw.default.into_iter().zip(rw.default))
            .collect();

        for (lv, rv) in pairs {
            let lt = deep_copy(arena, l_ty);
            let rt = deep_copy(arena, r_ty);
            let rv_copy = deep_copy(arena, rv);
            let op = e.op;
            self.rebuild_slot(arena, lv, |arena, inner| {
                let mut b = Builder::new(arena);
                let lc = b.cast(lt, inner);
                let rc = b.cast(rt, rv_copy);
                b.binary(op, lc, rc)
            });
        }
        arena.free_subtree(l_ty);
        arena.free_subtree(r_ty);
        self.hoist(arena, id, lw_id);
        crate::typing::reset_types(arena, lw_id, false);
        self.visit(arena, lw_id);
        true
    }

    /// `(val | −c) & c ⇒ c` and `(val & −c) | c ⇒ c` (two's-complement
    /// complementary masks).
    fn simplify_bitwise_constants(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        let Some(rhs) = e.rhs else {
            return false;
        };
        let Node::Expression(inner) = arena.node(e.lhs).clone() else {
            return false;
        };
        let Some(inner_rhs) = inner.rhs else {
            return false;
        };
        let case1 = e.op == Operator::BAnd && inner.op == Operator::BOr;
        let case2 = e.op == Operator::BOr && inner.op == Operator::BAnd;
        if !case1 && !case2 {
            return false;
        }

        let complementary = match (arena.node(rhs), arena.node(inner_rhs)) {
            (Node::IntVal(a), Node::IntVal(b)) => a.value == b.value.wrapping_neg(),
            (Node::BitvectorVal(a), Node::BitvectorVal(b)) => {
                if !a.is_01() || !b.is_01() || a.value.len() > 64 || b.value.len() > 64 {
                    false
                } else {
                    let u1 = crate::typing::bits_to_i64(&a.value, false).unwrap_or(0) as u64;
                    let i2 = crate::typing::bits_to_i64(&b.value, true).unwrap_or(0);
                    u1 == (i2.wrapping_neg()) as u64
                }
            }
            _ => false,
        };
        if !complementary {
            return false;
        }

        let Some(expr_ty_cached) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let expr_ty = deep_copy(arena, expr_ty_cached);
        let cv_copy = deep_copy(arena, rhs);
        let cast = Builder::new(arena).cast(expr_ty, cv_copy);
        self.replace(arena, id, cast);
        self.visit(arena, cast);
        true
    }

    /// Arithmetic whose result and precision are one bit wide maps into
    /// the boolean/bitwise family: `a+b ⇒ a xor b`, `a*b ⇒ a and b`,
    /// `a/b`, `a**b ⇒ a`.
    fn simplify_arith_bit_operation(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        if !e.op.is_arithmetic() {
            return false;
        }
        let Some(rhs) = e.rhs else {
            return false;
        };
        let Some(t1) = semantic_type(arena, self.sem, e.lhs) else {
            return false;
        };
        let Some(t2) = semantic_type(arena, self.sem, rhs) else {
            return false;
        };
        let Some(info) = self.sem.expr_type(arena, t1, Some(t2), e.op, Some(id)) else {
            return false;
        };
        let ret_logic = type_is_logic(arena, info.returned);
        let prec_logic = type_is_logic(arena, info.precision);
        let ret_w = type_bitwidth(arena, info.returned);
        let prec_w = type_bitwidth(arena, info.precision);
        let prec_base =
            crate::typing::base_type(arena, self.sem, info.precision, false);
        let is_boolean = matches!(arena.node(prec_base), Node::BoolT(_));
        arena.free_subtree(info.returned);
        arena.free_subtree(info.precision);
        if ret_logic || prec_logic || ret_w != 1 || prec_w != 1 {
            return false;
        }

        match e.op {
            Operator::Plus | Operator::Minus => {
                let new_op = if is_boolean {
                    Operator::Xor
                } else {
                    Operator::BXor
                };
                if let Node::Expression(x) = arena.node_mut(id) {
                    x.op = new_op;
                }
                crate::typing::reset_types(arena, id, false);
                true
            }
            Operator::Mult => {
                let new_op = if is_boolean {
                    Operator::And
                } else {
                    Operator::BAnd
                };
                if let Node::Expression(x) = arena.node_mut(id) {
                    x.op = new_op;
                }
                crate::typing::reset_types(arena, id, false);
                true
            }
            Operator::Div | Operator::Pow => {
                let lhs_copy = deep_copy(arena, e.lhs);
                self.replace(arena, id, lhs_copy);
                true
            }
            _ => false,
        }
    }

    /// `(v · c) ± v ⇒ v · (c ± 1)`.
    fn simplify_multiplication(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        if !matches!(e.op, Operator::Plus | Operator::Minus) {
            return false;
        }
        let Some(rhs) = e.rhs else {
            return false;
        };
        let Node::Expression(inner) = arena.node(e.lhs).clone() else {
            return false;
        };
        if inner.op != Operator::Mult {
            return false;
        }
        let Some(inner_rhs) = inner.rhs else {
            return false;
        };
        if !arena.node(inner_rhs).is_const_value() {
            return false;
        }
        if !equals_default(arena, inner.lhs, rhs) {
            return false;
        }

        let v = deep_copy(arena, inner.lhs);
        let c = deep_copy(arena, inner_rhs);
        let outer_op = e.op;
        let mut b = Builder::new(arena);
        let one = b.int_val(1);
        let adjusted = b.binary(outer_op, c, one);
        let product = b.binary(Operator::Mult, v, adjusted);
        self.replace(arena, id, product);
        self.visit(arena, product);
        true
    }

    // ========================================================================
    // REBALANCING
    // ========================================================================

    /// Regroup `expr(op1)[expr(op2)[…], …]` shapes so that the two
    /// non-hoisted operands become neighbours (and can fold), preserving
    /// arithmetic meaning via the operator tables. Returns the new
    /// expression id when a rebalance happened.
    pub(crate) fn rebalance_expression(
        &mut self,
        arena: &mut Arena,
        id: NodeId,
    ) -> Option<NodeId> {
        let operands = self.find_nested_operands(arena, id)?;

        let NestedOperands {
            rest,
            outer_const,
            inner_const,
            oper1,
            oper2,
            left1,
            left2,
        } = operands;

        let rest_copy = deep_copy(arena, rest);
        let cv1_copy = deep_copy(arena, outer_const);
        let cv2_copy = deep_copy(arena, inner_const);

        let mut b = Builder::new(arena);
        // Operator tables per shape; see the four cases in the module
        // tests for worked examples.
        let (inner_pair, outer_op, inner_op, rest_right) = match (left1, left2) {
            (true, false) => ((cv2_copy, cv1_copy), oper2, oper1, true),
            (true, true) => {
                if oper1 == Operator::Mult && oper2 == Operator::Div {
                    ((cv1_copy, cv2_copy), Operator::Mult, Operator::Div, false)
                } else {
                    let op2 = if allowed_commutative(oper1) {
                        oper2
                    } else {
                        allowed_inverse(oper2)
                    };
                    ((cv2_copy, cv1_copy), oper2, op2, false)
                }
            }
            (false, false) => {
                let op1 = if oper1 == oper2 {
                    if allowed_commutative(oper1) {
                        oper1
                    } else {
                        allowed_inverse(oper1)
                    }
                } else if allowed_commutative(oper1) {
                    oper2
                } else {
                    oper1
                };
                ((cv1_copy, cv2_copy), op1, oper1, true)
            }
            (false, true) => {
                let op2 = if allowed_commutative(oper1) {
                    oper2
                } else {
                    allowed_inverse(oper2)
                };
                ((cv1_copy, cv2_copy), oper1, op2, true)
            }
        };
        if outer_op == Operator::None || inner_op == Operator::None {
            for n in [rest_copy, inner_pair.0, inner_pair.1] {
                b.arena.free_subtree(n);
            }
            return None;
        }
        let pair = b.binary(inner_op, inner_pair.0, inner_pair.1);
        let rebuilt = if rest_right {
            b.binary(outer_op, pair, rest_copy)
        } else {
            // Keep the variable operand on the right when the outer
            // operator commutes.
            if allowed_commutative(outer_op) {
                b.binary(outer_op, pair, rest_copy)
            } else {
                b.binary(outer_op, rest_copy, pair)
            }
        };

        // The regrouped expression must still type.
        if semantic_type(arena, self.sem, rebuilt).is_none() {
            arena.free_subtree(rebuilt);
            return None;
        }

        // Fold the now-adjacent pair.
        let folded = fold_expression(arena, self.sem, &self.opts.clone(), pair);
        match folded {
            Some(result) => {
                arena.replace(pair, result);
                arena.free_subtree(pair);
            }
            None => {
                let both_const = arena.node(inner_pair.0).is_const_value()
                    && arena.node(inner_pair.1).is_const_value();
                if both_const {
                    // Paired constants that refuse to fold (e.g. inexact
                    // integer division) would rebalance forever.
                    arena.free_subtree(rebuilt);
                    return None;
                }
            }
        }

        self.replace(arena, id, rebuilt);
        Some(rebuilt)
    }

    fn find_nested_operands(&mut self, arena: &mut Arena, id: NodeId) -> Option<NestedOperands> {
        let Node::Expression(e) = arena.node(id).clone() else {
            return None;
        };
        e.rhs?;
        self.nested_const_operands(arena, &e)
            .or_else(|| self.nested_equal_operands(arena, &e))
            .or_else(|| self.nested_single_const_operands(arena, &e))
            .filter(|n| rebalance_compatible(n.oper1, n.oper2))
    }

    /// Outer constant + inner expression with exactly one constant.
    fn nested_const_operands(
        &mut self,
        arena: &mut Arena,
        e: &crate::tree::value::Expression,
    ) -> Option<NestedOperands> {
        let rhs = e.rhs?;
        let e1 = matches!(arena.node(e.lhs), Node::Expression(_));
        let e2 = matches!(arena.node(rhs), Node::Expression(_));
        if e1 == e2 {
            return None;
        }
        let cv_outer = if arena.node(e.lhs).is_const_value() {
            e.lhs
        } else if arena.node(rhs).is_const_value() {
            rhs
        } else {
            return None;
        };
        let (inner_id, left1) = if e1 { (e.lhs, true) } else { (rhs, false) };
        let Node::Expression(inner) = arena.node(inner_id).clone() else {
            return None;
        };
        let inner_rhs = inner.rhs?;
        let const_left = arena.node(inner.lhs).is_const_value();
        let const_right = arena.node(inner_rhs).is_const_value();
        if const_left == const_right {
            return None;
        }
        let (rest, inner_const, left2) = if const_right {
            (inner.lhs, inner_rhs, true)
        } else {
            (inner_rhs, inner.lhs, false)
        };
        // All-const trees are already foldable without rebalancing.
        if arena.node(rest).is_const_value() {
            return None;
        }
        Some(NestedOperands {
            rest,
            outer_const: cv_outer,
            inner_const,
            oper1: e.op,
            oper2: inner.op,
            left1,
            left2,
        })
    }

    /// An outer operand structurally equal to one inner operand: pairing
    /// them enables the equal-subtree folds (`x − x`, `x + x`, …).
    fn nested_equal_operands(
        &mut self,
        arena: &mut Arena,
        e: &crate::tree::value::Expression,
    ) -> Option<NestedOperands> {
        let rhs = e.rhs?;
        let found = if let Node::Expression(inner) = arena.node(rhs).clone() {
            let inner_rhs = inner.rhs?;
            if equals_default(arena, e.lhs, inner.lhs) {
                Some(NestedOperands {
                    rest: inner_rhs,
                    outer_const: e.lhs,
                    inner_const: inner.lhs,
                    oper1: e.op,
                    oper2: inner.op,
                    left1: false,
                    left2: false,
                })
            } else if equals_default(arena, e.lhs, inner_rhs) {
                Some(NestedOperands {
                    rest: inner.lhs,
                    outer_const: e.lhs,
                    inner_const: inner_rhs,
                    oper1: e.op,
                    oper2: inner.op,
                    left1: false,
                    left2: true,
                })
            } else {
                None
            }
        } else {
            None
        };
        let found = found.or_else(|| {
            if let Node::Expression(inner) = arena.node(e.lhs).clone() {
                let inner_rhs = inner.rhs?;
                if equals_default(arena, inner.lhs, rhs) {
                    return Some(NestedOperands {
                        rest: inner_rhs,
                        outer_const: rhs,
                        inner_const: inner.lhs,
                        oper1: e.op,
                        oper2: inner.op,
                        left1: true,
                        left2: false,
                    });
                }
                if equals_default(arena, inner_rhs, rhs) {
                    return Some(NestedOperands {
                        rest: inner.lhs,
                        outer_const: rhs,
                        inner_const: inner_rhs,
                        oper1: e.op,
                        oper2: inner.op,
                        left1: true,
                        left2: true,
                    });
                }
            }
            None
        })?;

        // Loop guards: a third equal subtree would oscillate.
        if equals_default(arena, found.rest, found.outer_const) {
            return None;
        }
        if let Node::Expression(third) = arena.node(found.rest).clone() {
            if matches!(
                third.op,
                Operator::Plus | Operator::Minus | Operator::Mult | Operator::Div
            ) {
                if let Some(trhs) = third.rhs {
                    if equals_default(arena, third.lhs, trhs)
                        && crate::tree::compare::compare(
                            arena,
                            found.outer_const,
                            third.lhs,
                        ) != std::cmp::Ordering::Less
                    {
                        return None;
                    }
                }
            }
        }
        Some(found)
    }

    /// Inner expression with one constant; the outer sibling is anything.
    fn nested_single_const_operands(
        &mut self,
        arena: &mut Arena,
        e: &crate::tree::value::Expression,
    ) -> Option<NestedOperands> {
        let rhs = e.rhs?;
        for (inner_id, sibling, left1) in [(rhs, e.lhs, false), (e.lhs, rhs, true)] {
            let Node::Expression(inner) = arena.node(inner_id).clone() else {
                continue;
            };
            let Some(inner_rhs) = inner.rhs else {
                continue;
            };
            let c1 = arena.node(inner.lhs).is_const_value();
            let c2 = arena.node(inner_rhs).is_const_value();
            if c1 && c2 {
                return None; // constants already grouped
            }
            if c2 {
                return Some(NestedOperands {
                    rest: inner_rhs,
                    outer_const: sibling,
                    inner_const: inner.lhs,
                    oper1: e.op,
                    oper2: inner.op,
                    left1,
                    left2: false,
                });
            }
            if c1 {
                return Some(NestedOperands {
                    rest: inner.lhs,
                    outer_const: sibling,
                    inner_const: inner_rhs,
                    oper1: e.op,
                    oper2: inner.op,
                    left1,
                    left2: true,
                });
            }
        }
        None
    }

    // ========================================================================
    // STRUCTURAL NORMALIZATION
    // ========================================================================

    /// `A + (+B) ⇒ A + B`; `A − (−B) ⇒ A + B`; `A − (B − C) ⇒ A + (C − B)`;
    /// `A ÷ (B ÷ C) ⇒ A × (C ÷ B)`.
    pub(crate) fn push_down_operators(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        let Some(rhs) = e.rhs else {
            return false;
        };
        let Node::Expression(inner) = arena.node(rhs).clone() else {
            return false;
        };
        match inner.rhs {
            None => {
                // Unary inner.
                let new_op = if e.op == inner.op && e.op == Operator::Plus {
                    Some(Operator::Plus)
                } else if e.op == inner.op && e.op == Operator::Minus {
                    Some(Operator::Plus)
                } else if e.op == inner.op.inverse()
                    && matches!(e.op, Operator::Plus | Operator::Minus)
                {
                    Some(Operator::Minus)
                } else {
                    None
                };
                let Some(new_op) = new_op else {
                    return false;
                };
                self.hoist(arena, rhs, inner.lhs);
                if let Node::Expression(x) = arena.node_mut(id) {
                    x.op = new_op;
                }
                true
            }
            Some(inner_rhs) => {
                if e.op != inner.op {
                    return false;
                }
                if e.op != Operator::Minus && e.op != Operator::Div {
                    return false;
                }
                let flipped = e.op.inverse();
                if let Node::Expression(x) = arena.node_mut(id) {
                    x.op = flipped;
                }
                arena.swap_nodes(inner.lhs, inner_rhs);
                true
            }
        }
    }

    /// Move a nested constant up so it can meet other constants toward the
    /// root: `(v ∘ c) ∘ w ⇒ (v ∘ w) ∘ c` for a commutative `∘`.
    pub(crate) fn push_up_constants(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        let Some(rhs) = e.rhs else {
            return false;
        };
        if arena.node(rhs).is_const_value() {
            return false;
        }
        let Node::Expression(inner) = arena.node(e.lhs).clone() else {
            return false;
        };
        let Some(inner_rhs) = inner.rhs else {
            return false;
        };
        if !arena.node(inner_rhs).is_const_value()
            || arena.node(inner.lhs).is_const_value()
        {
            return false;
        }
        if e.op != inner.op || !allowed_commutative(e.op) {
            return false;
        }
        arena.swap_nodes(rhs, inner_rhs);
        true
    }

    /// Order the right operands of a two-level chain by the canonical
    /// total order, refusing swaps that stop the expression from typing.
    pub(crate) fn sort_branches(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        let Some(b1) = e.rhs else {
            return false;
        };
        let Node::Expression(inner) = arena.node(e.lhs).clone() else {
            return false;
        };
        let Some(b2) = inner.rhs else {
            return false;
        };
        // A constant on the inner left is a rebalancer product; keep it.
        if arena.node(inner.lhs).is_const_value() {
            return false;
        }
        if !matches!(
            e.op,
            Operator::Plus | Operator::Minus | Operator::Mult | Operator::Div
        ) {
            return false;
        }
        if e.op != inner.op && e.op.inverse() != inner.op {
            return false;
        }
        if crate::tree::compare::compare(arena, b1, b2) != std::cmp::Ordering::Less {
            return false;
        }

        let typed_before = semantic_type(arena, self.sem, id).is_some();
        arena.swap_nodes(b1, b2);
        let (outer_op, inner_op) = (inner.op, e.op);
        if let Node::Expression(x) = arena.node_mut(id) {
            x.op = outer_op;
        }
        if let Node::Expression(x) = arena.node_mut(e.lhs) {
            x.op = inner_op;
        }
        crate::typing::reset_types(arena, id, false);
        crate::typing::reset_types(arena, e.lhs, false);

        if typed_before && semantic_type(arena, self.sem, id).is_none() {
            // Restore.
            arena.swap_nodes(b1, b2);
            if let Node::Expression(x) = arena.node_mut(id) {
                x.op = e.op;
            }
            if let Node::Expression(x) = arena.node_mut(e.lhs) {
                x.op = inner.op;
            }
            crate::typing::reset_types(arena, id, false);
            crate::typing::reset_types(arena, e.lhs, false);
            return false;
        }
        true
    }

    /// Rotate right-heavy trees left so rebalancing sees them:
    /// `a ∘ (b ∘ c) ⇒ (a ∘ b) ∘ c` with operator fixes.
    pub(crate) fn linearize_expression_tree(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Expression(e) = arena.node(id).clone() else {
            return false;
        };
        let Some(rhs) = e.rhs else {
            return false;
        };
        let Node::Expression(inner) = arena.node(rhs).clone() else {
            return false;
        };
        let Some(inner_rhs) = inner.rhs else {
            return false;
        };
        let four = |op| {
            matches!(
                op,
                Operator::Plus | Operator::Minus | Operator::Mult | Operator::Div
            )
        };
        if !four(e.op) && !four(inner.op) {
            return false;
        }

        if arena.node(e.lhs).is_const_value() {
            if !e.op.is_commutative() {
                return false;
            }
            arena.swap_nodes(e.lhs, rhs);
            return true;
        }

        if e.op != inner.op && e.op != inner.op.inverse() {
            return false;
        }

        // Rotate o=(a, i=(b, c)) into o=(i=(a, b), c) by three slot swaps.
        let a = e.lhs;
        let b_node = inner.lhs;
        let c = inner_rhs;
        arena.swap_nodes(a, rhs); // o=(i, a)          i=(b, c)
        arena.swap_nodes(a, c); // o=(i, c)          i=(b, a)
        arena.swap_nodes(b_node, a); // o=(i, c)          i=(a, b)

        // op fixes: (+,+)/(*,*) keep; (+·,−/÷ inner) → swap; (−/÷ outer) →
        // push outer op into the inner level.
        let (op1, op2) = (e.op, inner.op);
        if op1 == op2 {
            // Already-pushed additive/multiplicative chains keep their op.
        } else if matches!(op1, Operator::Plus | Operator::Mult) {
            if let Node::Expression(x) = arena.node_mut(id) {
                x.op = op2;
            }
            if let Node::Expression(x) = arena.node_mut(rhs) {
                x.op = op1;
            }
        } else if let Node::Expression(x) = arena.node_mut(rhs) {
            x.op = op1;
        }
        crate::typing::reset_types(arena, id, false);
        crate::typing::reset_types(arena, rhs, false);
        true
    }

}
