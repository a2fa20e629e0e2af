//! Cast elimination and conversion, plus the assignment fixes that hinge
//! on casts (LHS cast motion, assignability, null-range targets).

use crate::simplify::Simplifier;
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::equals::{EqualsOptions, equals, equals_default};
use crate::tree::value::Direction;
use crate::tree::{Arena, Node, NodeId, NodeKind, Operator};
use crate::typing::{
    self, semantic_type, transform_constant, type_bitwidth, value_base_type,
};

impl Simplifier<'_> {
    pub(crate) fn visit_cast(&mut self, arena: &mut Arena, id: NodeId) {
        self.remove_useless_nested_cast(arena, id);
        if !arena.is_alive(id) {
            return;
        }
        if self.remove_same_type_cast(arena, id) {
            return;
        }
        if self.transform_cast_of_const_value(arena, id) {
            return;
        }
        if self.explicit_aggregate_cast(arena, id) {
            return;
        }
        if self.explicit_record_cast(arena, id) {
            return;
        }
        if self.transform_cast_from_aggregate_to_bitvector(arena, id) {
            return;
        }
        if self.transform_cast_of_concat(arena, id) {
            return;
        }
        if self.fix_cast_from_bitvector_to_array(arena, id) {
            return;
        }
        if self.transform_cast_from_array_of_bool_to_int(arena, id) {
            return;
        }
        let _ = self.simplify_cast_of_vector_multiplication(arena, id);
    }

    /// `T1(T2(v))` drops the middle cast when it neither truncates nor
    /// reinterprets.
    fn remove_useless_nested_cast(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Cast(outer) = arena.node(id).clone() else {
            return false;
        };
        let Node::Cast(mid) = arena.node(outer.value).clone() else {
            return false;
        };
        let Some(t3) = semantic_type(arena, self.sem, mid.value) else {
            return false;
        };
        if !self
            .sem
            .can_remove_internal_cast(arena, outer.ty, mid.ty, t3)
        {
            return false;
        }
        let inner_value = mid.value;
        arena.hoist(outer.value, inner_value);
        self.trash.insert(outer.value);
        crate::typing::reset_types(arena, id, false);
        true
    }

    /// A cast to the value's own type disappears.
    fn remove_same_type_cast(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        let Some(value_ty) = semantic_type(arena, self.sem, cast.value) else {
            return false;
        };
        let relaxed = EqualsOptions {
            check_constexpr_flag: false,
            check_resolved_flag: false,
            ..Default::default()
        };
        if !equals(arena, cast.ty, value_ty, relaxed) {
            return false;
        }
        let value = cast.value;
        self.hoist(arena, id, value);
        true
    }

    /// A cast of a constant folds through constant transformation.
    fn transform_cast_of_const_value(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        if !arena.node(cast.value).is_const_value() {
            return false;
        }
        let Some(converted) = transform_constant(arena, self.sem, cast.value, cast.ty)
        else {
            return false;
        };
        self.replace(arena, id, converted);
        self.visit(arena, converted);
        true
    }

    /// A cast to an array type pushes into each aggregate alternate (and
    /// `others`) as an element cast.
    fn explicit_aggregate_cast(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        if arena.kind(cast.value) != NodeKind::Aggregate {
            return false;
        }
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        let Node::ArrayT(arr) = arena.node(ty_base).clone() else {
            return false;
        };
        let Node::Aggregate(agg) = arena.node(cast.value).clone() else {
            return false;
        };
        let mut branch_values: Vec<NodeId> = Vec::new();
        for &alt in &agg.alts {
            if let Node::AggregateAlt(a) = arena.node(alt) {
                branch_values.push(a.value);
            }
        }
        branch_values.extend(agg.others);
        for value in branch_values {
            let elem_ty = deep_copy(arena, arr.element);
            self.rebuild_slot(arena, value, |arena, inner| {
                Builder::new(arena).cast(elem_ty, inner)
            });
        }
        let aggregate = cast.value;
        self.hoist(arena, id, aggregate);
        crate::typing::reset_types(arena, aggregate, false);
        self.visit(arena, aggregate);
        true
    }

    /// Defined but intentionally not wired into the dispatch: converting a
    /// plain cast into an aggregate is disabled pending back-end support
    /// for per-element defaults.
    #[allow(dead_code)]
    pub(crate) fn transform_cast_to_aggregate(
        &mut self,
        arena: &mut Arena,
        id: NodeId,
    ) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        let Node::ArrayT(arr) = arena.node(ty_base).clone() else {
            return false;
        };
        let value_copy = deep_copy(arena, cast.value);
        let elem_ty = deep_copy(arena, arr.element);
        let mut b = Builder::new(arena);
        let others = b.cast(elem_ty, value_copy);
        let agg = b.aggregate(vec![], Some(others));
        self.replace(arena, id, agg);
        true
    }

    /// A cast to a record type pushes into each field of a record value.
    fn explicit_record_cast(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        if arena.kind(cast.value) != NodeKind::RecordValue {
            return false;
        }
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        let Node::RecordT(rec) = arena.node(ty_base).clone() else {
            return false;
        };
        let Node::RecordValue(rv) = arena.node(cast.value).clone() else {
            return false;
        };
        let mut field_types = std::collections::HashMap::new();
        for &field in &rec.fields {
            if let Node::DataDeclaration(d) = arena.node(field) {
                field_types.insert(d.name.clone(), d.ty);
            }
        }
        for &alt in &rv.alts {
            let Node::RecordValueAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            let Some(&field_ty) = field_types.get(&a.field) else {
                return false;
            };
            let ty_copy = deep_copy(arena, field_ty);
            self.rebuild_slot(arena, a.value, |arena, inner| {
                Builder::new(arena).cast(ty_copy, inner)
            });
        }
        let record_value = cast.value;
        self.hoist(arena, id, record_value);
        crate::typing::reset_types(arena, record_value, false);
        self.visit(arena, record_value);
        true
    }

    /// A vector-targeted cast of a literal-bit aggregate is the bitvector
    /// literal.
    fn transform_cast_from_aggregate_to_bitvector(
        &mut self,
        arena: &mut Arena,
        id: NodeId,
    ) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        if arena.kind(cast.value) != NodeKind::Aggregate {
            return false;
        }
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        if !typing::is_vector_type(arena, ty_base) {
            return false;
        }
        let width = type_bitwidth(arena, ty_base);
        if width == 0 || width > crate::simplify::AGGREGATE_UNROLL_THRESHOLD {
            return false;
        }
        let Node::Aggregate(agg) = arena.node(cast.value).clone() else {
            return false;
        };
        let digit_of = |arena: &Arena, v: NodeId| -> Option<char> {
            match arena.node(v) {
                Node::BitVal(x) => Some(x.value.to_char()),
                Node::BoolVal(x) => Some(if x.value { '1' } else { '0' }),
                _ => None,
            }
        };
        let mut digits: Vec<Option<char>> = vec![None; width as usize];
        for &alt in &agg.alts {
            let Node::AggregateAlt(a) = arena.node(alt).clone() else {
                return false;
            };
            for &idx in &a.indices {
                let Some(i) = arena.int_value(idx) else {
                    return false;
                };
                if i < 0 || i as u64 >= width {
                    return false;
                }
                let Some(d) = digit_of(arena, a.value) else {
                    return false;
                };
                digits[width as usize - 1 - i as usize] = Some(d);
            }
        }
        let others_digit = agg.others.and_then(|o| digit_of(arena, o));
        let mut out = String::with_capacity(width as usize);
        for d in digits {
            match d.or(others_digit) {
                Some(c) => out.push(c),
                None => return false,
            }
        }
        let ty_copy = deep_copy(arena, cast.ty);
        typing::set_type_constexpr(arena, ty_copy, true);
        let result = Builder::new(arena).bitvector_val(&out);
        typing::attach_syntactic_type(arena, result, ty_copy);
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    /// A narrowing cast of a concat keeps only the right-most segments
    /// that survive the truncation.
    fn transform_cast_of_concat(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        let Node::Expression(e) = arena.node(cast.value).clone() else {
            return false;
        };
        if e.op != Operator::Concat {
            return false;
        }
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        if !typing::is_vector_type(arena, ty_base) {
            return false;
        }
        let target_width = type_bitwidth(arena, ty_base);
        if target_width == 0 {
            return false;
        }
        let mut elements = Vec::new();
        collect_concat(arena, cast.value, &mut elements);
        // Walk from the right, keeping segments until the target width is
        // reached.
        let mut kept = Vec::new();
        let mut acc = 0u64;
        for &el in elements.iter().rev() {
            if acc >= target_width {
                break;
            }
            let Some(t) = semantic_type(arena, self.sem, el) else {
                return false;
            };
            let w = type_bitwidth(arena, t);
            if w == 0 {
                return false;
            }
            kept.push(el);
            acc += w;
        }
        if kept.len() == elements.len() {
            return false; // nothing dropped
        }
        if acc != target_width {
            // The cut falls inside a segment; leave it to the slice rules.
            return false;
        }
        kept.reverse();
        let mut result: Option<NodeId> = None;
        for &el in &kept {
            let piece = deep_copy(arena, el);
            result = Some(match result {
                None => piece,
                Some(acc_id) => Builder::new(arena).binary(Operator::Concat, acc_id, piece),
            });
        }
        let reduced = result.expect("kept non-empty");
        let ty_copy = deep_copy(arena, cast.ty);
        let new_cast = Builder::new(arena).cast(ty_copy, reduced);
        self.replace(arena, id, new_cast);
        self.visit(arena, new_cast);
        true
    }

    /// A bitvector→array cast becomes an explicit aggregate of element
    /// slices.
    fn fix_cast_from_bitvector_to_array(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        let Node::ArrayT(arr) = arena.node(ty_base).clone() else {
            return false;
        };
        let Some(value_base) = value_base_type(arena, self.sem, cast.value) else {
            return false;
        };
        if !typing::is_vector_type(arena, value_base) {
            return false;
        }
        let Some(span) = arr.span else {
            return false;
        };
        let count = typing::span_bitwidth(arena, span);
        let elem_width = type_bitwidth(arena, arr.element);
        let total = type_bitwidth(arena, value_base);
        // Per-bit arrays cast directly; only multi-bit elements need the
        // explicit slice aggregate.
        if count == 0 || elem_width <= 1 || total != count * elem_width {
            return false;
        }
        if count > crate::simplify::AGGREGATE_UNROLL_THRESHOLD {
            return false;
        }

        let mut alts = Vec::new();
        for i in 0..count {
            let value_copy = deep_copy(arena, cast.value);
            let elem_ty = deep_copy(arena, arr.element);
            let mut b = Builder::new(arena);
            let lo = (i * elem_width) as i64;
            let hi = ((i + 1) * elem_width - 1) as i64;
            let piece = if elem_width == 1 {
                let idx = b.int_val(lo);
                b.member(value_copy, idx)
            } else {
                let span = b.downto(hi, lo);
                b.slice(value_copy, span)
            };
            let piece = b.cast(elem_ty, piece);
            let idx = b.int_val(i as i64);
            alts.push(b.aggregate_alt(vec![idx], piece));
        }
        let agg = Builder::new(arena).aggregate(alts, None);
        self.replace(arena, id, agg);
        self.visit(arena, agg);
        true
    }

    /// An array-of-bool→integer cast becomes an `or` of shifted members.
    fn transform_cast_from_array_of_bool_to_int(
        &mut self,
        arena: &mut Arena,
        id: NodeId,
    ) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        if !matches!(arena.node(ty_base), Node::IntT(_)) {
            return false;
        }
        let Some(value_base) = value_base_type(arena, self.sem, cast.value) else {
            return false;
        };
        let Node::ArrayT(arr) = arena.node(value_base).clone() else {
            return false;
        };
        let elem_base = typing::base_type(arena, self.sem, arr.element, false);
        if !matches!(arena.node(elem_base), Node::BoolT(_) | Node::BitT(_)) {
            return false;
        }
        let count = match arr.span {
            Some(s) => typing::span_bitwidth(arena, s),
            None => 0,
        };
        if count == 0 || count > 64 {
            return false;
        }

        let mut result: Option<NodeId> = None;
        for i in 0..count {
            let value_copy = deep_copy(arena, cast.value);
            let int_ty = deep_copy(arena, cast.ty);
            let mut b = Builder::new(arena);
            let idx = b.int_val(i as i64);
            let member = b.member(value_copy, idx);
            let as_int = b.cast(int_ty, member);
            let term = if i == 0 {
                as_int
            } else {
                let amount = b.int_val(i as i64);
                b.binary(Operator::Sll, as_int, amount)
            };
            result = Some(match result {
                None => term,
                Some(acc) => Builder::new(arena).binary(Operator::BOr, acc, term),
            });
        }
        let expr = result.expect("count > 0");
        self.replace(arena, id, expr);
        self.visit(arena, expr);
        true
    }

    /// A narrowing cast of a wide vector multiplication narrows the
    /// multiplication itself: only the low bits survive anyway.
    fn simplify_cast_of_vector_multiplication(
        &mut self,
        arena: &mut Arena,
        id: NodeId,
    ) -> bool {
        let Node::Cast(cast) = arena.node(id).clone() else {
            return false;
        };
        let Node::Expression(e) = arena.node(cast.value).clone() else {
            return false;
        };
        if e.op != Operator::Mult {
            return false;
        }
        let Some(rhs) = e.rhs else {
            return false;
        };
        let ty_base = typing::base_type(arena, self.sem, cast.ty, false);
        if !typing::is_vector_type(arena, ty_base) {
            return false;
        }
        let target_width = type_bitwidth(arena, ty_base);
        if target_width == 0 || target_width > 64 {
            return false;
        }
        let Some(t1) = value_base_type(arena, self.sem, e.lhs) else {
            return false;
        };
        let Some(t2) = value_base_type(arena, self.sem, rhs) else {
            return false;
        };
        let w1 = type_bitwidth(arena, t1);
        let w2 = type_bitwidth(arena, t2);
        if w1 <= target_width || w2 <= target_width {
            return false;
        }
        if !typing::is_vector_type(arena, t1) || !typing::is_vector_type(arena, t2) {
            return false;
        }

        let lhs_copy = deep_copy(arena, e.lhs);
        let rhs_copy = deep_copy(arena, rhs);
        let lt = deep_copy(arena, cast.ty);
        let rt = deep_copy(arena, cast.ty);
        let mut b = Builder::new(arena);
        let lc = b.cast(lt, lhs_copy);
        let rc = b.cast(rt, rhs_copy);
        let product = b.binary(Operator::Mult, lc, rc);
        self.replace(arena, id, product);
        self.visit(arena, product);
        true
    }

    // ========================================================================
    // RETURNS & VALUE STATEMENTS
    // ========================================================================

    /// A `return cast(T, v)` where `v` already has the function's return
    /// type drops the cast.
    pub(crate) fn visit_return(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::Return(r) = arena.node(id).clone() else {
            return;
        };
        let Some(value) = r.value else {
            return;
        };
        let Node::Cast(cast) = arena.node(value).clone() else {
            return;
        };
        let Some(sub) = crate::tree::nav::nearest_parent_of_kind(
            arena,
            id,
            NodeKind::SubProgram,
        ) else {
            return;
        };
        let Node::SubProgram(sp) = arena.node(sub).clone() else {
            return;
        };
        let crate::tree::decl::SubKind::Function { ret } = sp.kind else {
            return;
        };
        let Some(inner_ty) = semantic_type(arena, self.sem, cast.value) else {
            return;
        };
        if equals_default(arena, inner_ty, ret) {
            let inner = cast.value;
            self.hoist(arena, value, inner);
        }
    }

    /// Value statements discard their value: casts on them are dead.
    pub(crate) fn visit_value_statement(&mut self, arena: &mut Arena, id: NodeId) {
        loop {
            let Node::ValueStatement(vs) = arena.node(id).clone() else {
                return;
            };
            let Node::Cast(cast) = arena.node(vs.value).clone() else {
                return;
            };
            let inner = cast.value;
            self.hoist(arena, vs.value, inner);
        }
    }

    // ========================================================================
    // ASSIGNMENTS
    // ========================================================================

    pub(crate) fn visit_assign(&mut self, arena: &mut Arena, id: NodeId) {
        if self.remove_null_range_assign(arena, id) {
            return;
        }
        if self.remove_self_assign(arena, id) {
            return;
        }
        self.move_left_hand_side_cast(arena, id);
        self.ensure_assignability(arena, id);
    }

    /// An assignment into a null-range slice writes nothing.
    fn remove_null_range_assign(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Assign(a) = arena.node(id).clone() else {
            return false;
        };
        let Node::Slice(s) = arena.node(a.target).clone() else {
            return false;
        };
        let Some((left, right)) = typing::range_literal_bounds(arena, s.span) else {
            return false;
        };
        let Node::Range(r) = arena.node(s.span).clone() else {
            return false;
        };
        let is_null = match r.direction {
            Direction::Downto => left < right,
            Direction::Upto => left > right,
        };
        if !is_null {
            return false;
        }
        arena.detach(id);
        self.trash.insert(id);
        true
    }

    /// `x := x` is a no-op.
    fn remove_self_assign(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Assign(a) = arena.node(id).clone() else {
            return false;
        };
        if arena.kind(a.target) != NodeKind::Identifier {
            return false;
        }
        if !equals_default(arena, a.target, a.source) {
            return false;
        }
        if arena.parent(id).is_none() {
            return false;
        }
        arena.detach(id);
        self.trash.insert(id);
        true
    }

    /// `cast(T, lhs) := rhs` moves the cast to the source:
    /// `lhs := cast(type(lhs), rhs)`.
    fn move_left_hand_side_cast(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::Assign(a) = arena.node(id).clone() else {
            return;
        };
        let Node::Cast(cast) = arena.node(a.target).clone() else {
            return;
        };
        let Some(target_ty_cached) = semantic_type(arena, self.sem, cast.value) else {
            return;
        };
        let target_ty = deep_copy(arena, target_ty_cached);
        let inner = cast.value;
        arena.hoist(a.target, inner);
        self.trash.insert(a.target);
        let new_cast = self.rebuild_slot(arena, a.source, |arena, source| {
            Builder::new(arena).cast(target_ty, source)
        });
        crate::typing::reset_types(arena, id, false);
        self.visit(arena, new_cast);
    }

    /// When the target/source types fail the assignability rules, insert
    /// a restoring cast on the source.
    fn ensure_assignability(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::Assign(a) = arena.node(id).clone() else {
            return;
        };
        let Some(target_ty) = semantic_type(arena, self.sem, a.target) else {
            return;
        };
        let Some(source_ty) = semantic_type(arena, self.sem, a.source) else {
            return;
        };
        let relaxed = EqualsOptions {
            check_constexpr_flag: false,
            check_resolved_flag: false,
            ..Default::default()
        };
        if equals(arena, target_ty, source_ty, relaxed) {
            return;
        }
        if !self.sem.is_cast_allowed(arena, target_ty, source_ty) {
            return;
        }
        let ty_copy = deep_copy(arena, target_ty);
        let cast = self.rebuild_slot(arena, a.source, |arena, source| {
            Builder::new(arena).cast(ty_copy, source)
        });
        self.visit(arena, cast);
    }
}

fn collect_concat(arena: &Arena, id: NodeId, out: &mut Vec<NodeId>) {
    if let Node::Expression(e) = arena.node(id) {
        if e.op == Operator::Concat {
            collect_concat(arena, e.lhs, out);
            if let Some(rhs) = e.rhs {
                collect_concat(arena, rhs, out);
            }
            return;
        }
    }
    out.push(id);
}
