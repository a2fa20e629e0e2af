//! Member and slice canonicalization.
//!
//! Members reduce against their prefixes: single-bit prefixes disappear,
//! literal bitvector prefixes select the digit, aggregate prefixes select
//! the matching alternate, concat prefixes reduce to the covering segment
//! with a rebased index, bitwise-expression prefixes distribute. Slices
//! reduce to members when one position wide, distribute over concats and
//! bitwise expressions, push through casts/`when`/`with`, and become casts
//! when they keep the whole value.
//!
//! Several integer-slice rewrites are valid only in `downto` form and
//! outside sensitivity lists; those guards are load-bearing.

use crate::simplify::Simplifier;
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::nav::{is_in_left_hand_side, is_in_sensitivity_list};
use crate::tree::value::Direction;
use crate::tree::{Arena, Node, NodeId, NodeKind, Operator};
use crate::typing::{
    self, range_literal_bounds, range_min_bound, semantic_type, span_bitwidth, type_bitwidth,
    type_span, value_base_type,
};

impl Simplifier<'_> {
    pub(crate) fn visit_member(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_member_internal_cast(arena, id) {
            return;
        }
        if self.simplify_single_bit_member(arena, id) {
            return;
        }
        if self.simplify_bitvector_value_member(arena, id) {
            return;
        }
        if self.simplify_aggregate_member(arena, id) {
            return;
        }
        if self.simplify_slice_member(arena, id) {
            return;
        }
        if self.simplify_bitwise_expression_member(arena, id) {
            return;
        }
        let _ = self.simplify_concat_member(arena, id);
    }

    pub(crate) fn visit_slice(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_slice_to_member(arena, id) {
            return;
        }
        if self.simplify_useless_slice(arena, id) {
            return;
        }
        if self.simplify_bitwise_expression_slice(arena, id) {
            return;
        }
        if self.simplify_concat_slice(arena, id) {
            return;
        }
        if self.push_slice_into_cast(arena, id) {
            return;
        }
        if self.push_slice_into_when(arena, id) {
            return;
        }
        if self.push_slice_into_with(arena, id) {
            return;
        }
        let _ = self.transform_slice_to_cast(arena, id);
    }

    // ========================================================================
    // MEMBERS
    // ========================================================================

    /// `b[0]` of a scalar bit/bool prefix is the prefix; a one-bit vector
    /// prefix needs a restoring cast in rvalue position.
    fn simplify_single_bit_member(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Member(m) = arena.node(id).clone() else {
            return false;
        };
        let Some(prefix_base) = value_base_type(arena, self.sem, m.prefix) else {
            return false;
        };
        if matches!(arena.node(prefix_base), Node::BitT(_) | Node::BoolT(_)) {
            let prefix = m.prefix;
            self.hoist(arena, id, prefix);
            return true;
        }
        let is_vector = typing::is_vector_type(arena, prefix_base);
        if is_vector
            && !is_in_left_hand_side(arena, id)
            && type_bitwidth(arena, prefix_base) == 1
        {
            let Some(member_ty) = semantic_type(arena, self.sem, id) else {
                return false;
            };
            let Some(prefix_ty) = semantic_type(arena, self.sem, m.prefix) else {
                return false;
            };
            if is_in_sensitivity_list(arena, id) {
                let prefix = m.prefix;
                self.hoist(arena, id, prefix);
                return true;
            }
            if !self.sem.is_cast_allowed(arena, member_ty, prefix_ty) {
                return false;
            }
            let ty_copy = deep_copy(arena, member_ty);
            let prefix = m.prefix;
            self.hoist(arena, id, prefix);
            let cast = self.rebuild_slot(arena, prefix, |arena, inner| {
                Builder::new(arena).cast(ty_copy, inner)
            });
            self.visit(arena, cast);
            return true;
        }
        false
    }

    /// `"01zx0"[i]` selects the digit at `i`, honoring span direction.
    fn simplify_bitvector_value_member(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Member(m) = arena.node(id).clone() else {
            return false;
        };
        let Node::BitvectorVal(bv) = arena.node(m.prefix).clone() else {
            return false;
        };
        let Some(index) = self.literal_index(arena, m.index) else {
            return false;
        };
        let Some(prefix_ty) = semantic_type(arena, self.sem, m.prefix) else {
            return false;
        };
        let Some(span) = type_span(arena, prefix_ty) else {
            return false;
        };
        let Node::Range(r) = arena.node(span).clone() else {
            return false;
        };
        let digits: Vec<char> = bv.value.chars().collect();
        let position = match r.direction {
            Direction::Upto => index,
            Direction::Downto => digits.len() as i64 - index - 1,
        };
        if position < 0 || position as usize >= digits.len() {
            return false;
        }
        let Some(digit) = crate::tree::BitConstant::from_char(digits[position as usize])
        else {
            return false;
        };
        let Some(member_ty) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let ty_copy = deep_copy(arena, member_ty);
        typing::set_type_constexpr(arena, ty_copy, true);
        let result = Builder::new(arena).typed_bit_val(digit, ty_copy);
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    /// `{10, 20, 30}[2]` selects the matching alternate, or `others` when
    /// every other alternate index is literal.
    fn simplify_aggregate_member(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Member(m) = arena.node(id).clone() else {
            return false;
        };
        let Node::Aggregate(agg) = arena.node(m.prefix).clone() else {
            return false;
        };
        let literal = self.literal_index(arena, m.index);
        let mut chosen = None;
        let mut others_usable = true;
        'alts: for &alt in &agg.alts {
            let Node::AggregateAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            for &idx in &a.indices {
                if crate::tree::equals::equals_default(arena, idx, m.index) {
                    chosen = Some(a.value);
                    break 'alts;
                }
                match (self.literal_index(arena, idx), literal) {
                    (Some(alt_val), Some(idx_val)) => {
                        if alt_val == idx_val {
                            chosen = Some(a.value);
                            break 'alts;
                        }
                    }
                    _ => others_usable = false,
                }
            }
        }
        let selected = match chosen {
            Some(v) => v,
            None if others_usable => match agg.others {
                Some(v) => v,
                None => return false,
            },
            None => return false,
        };
        let result = deep_copy(arena, selected);
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    /// A member on a slice collapses the slice: rebased semantics add the
    /// slice minimum back into the index, declared-base semantics drop the
    /// slice outright.
    fn simplify_slice_member(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Member(m) = arena.node(id).clone() else {
            return false;
        };
        let Node::Slice(slice) = arena.node(m.prefix).clone() else {
            return false;
        };
        if self.sem.slice_type_is_rebased() {
            let Some(min) = range_min_bound(arena, slice.span) else {
                return false;
            };
            let min_copy = deep_copy(arena, min);
            let min_copy = typing::assure_syntactic_type(arena, self.sem, min_copy);
            self.rebuild_slot(arena, m.index, |arena, inner| {
                Builder::new(arena).binary(Operator::Plus, inner, min_copy)
            });
        }
        // Either way the slice node itself goes away.
        let prefix = slice.prefix;
        arena.hoist(m.prefix, prefix);
        self.trash.insert(m.prefix);
        crate::typing::reset_types(arena, id, false);
        self.visit(arena, id);
        true
    }

    /// `(a ⊕ b)[i] ⇒ a[i] ⊕ b[i]` for bitwise prefixes.
    fn simplify_bitwise_expression_member(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Member(m) = arena.node(id).clone() else {
            return false;
        };
        let Node::Expression(e) = arena.node(m.prefix).clone() else {
            return false;
        };
        if !e.op.is_bitwise() {
            return false;
        }
        let index_copy_l = deep_copy(arena, m.index);
        let mut b = Builder::new(arena);
        let lhs_copy = deep_copy(b.arena, e.lhs);
        let lhs_member = b.member(lhs_copy, index_copy_l);
        let rhs_member = e.rhs.map(|rhs| {
            let rhs_copy = deep_copy(b.arena, rhs);
            let idx = deep_copy(b.arena, m.index);
            b.member(rhs_copy, idx)
        });
        let rebuilt = match rhs_member {
            Some(r) => b.binary(e.op, lhs_member, r),
            None => b.unary(e.op, lhs_member),
        };
        self.replace(arena, id, rebuilt);
        self.visit(arena, rebuilt);
        true
    }

    /// `(a_64, b_64, c_64)[100] ⇒ b_64[36]`: find the concatenated segment
    /// covering the position, rebase the index into it.
    fn simplify_concat_member(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Member(m) = arena.node(id).clone() else {
            return false;
        };
        let Node::Expression(e) = arena.node(m.prefix).clone() else {
            return false;
        };
        if e.op != Operator::Concat {
            return false;
        }
        let Some(prefix_ty) = semantic_type(arena, self.sem, m.prefix) else {
            return false;
        };
        let Some(span) = type_span(arena, prefix_ty) else {
            return false;
        };
        let Node::Range(r) = arena.node(span).clone() else {
            return false;
        };
        let downto = r.direction == Direction::Downto;
        let prefix_base_ty = crate::typing::base_type(arena, self.sem, prefix_ty, false);
        let prefix_is_array = matches!(arena.node(prefix_base_ty), Node::ArrayT(_));

        let mut elements = Vec::new();
        collect_concat_elements(arena, m.prefix, &mut elements);
        let mut widths = Vec::new();
        for &el in &elements {
            let Some(t) = semantic_type(arena, self.sem, el) else {
                return false;
            };
            let w = type_bitwidth(arena, t);
            if w == 0 {
                return false;
            }
            widths.push(w as i64);
        }

        let Some(mut position) = arena.int_value(m.index) else {
            return false;
        };
        let order: Vec<usize> = if downto {
            (0..elements.len()).rev().collect()
        } else {
            (0..elements.len()).collect()
        };
        let mut selected = None;
        for i in order {
            if position < widths[i] {
                selected = Some(elements[i]);
                break;
            }
            position -= widths[i];
        }
        let Some(selected) = selected else {
            return false;
        };

        let segment = deep_copy(arena, selected);
        let result = if prefix_is_array {
            segment
        } else {
            let mut b = Builder::new(arena);
            let idx = b.int_val(position);
            b.member(segment, idx)
        };
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    /// A member whose prefix casts between same-direction vectors of
    /// sufficient width pushes through the cast, rebasing the index for
    /// base or direction differences.
    fn simplify_member_internal_cast(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Member(m) = arena.node(id).clone() else {
            return false;
        };
        let Node::Cast(cast) = arena.node(m.prefix).clone() else {
            return false;
        };
        let Some(member_ty_cached) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let member_ty = deep_copy(arena, member_ty_cached);
        let Some(cast_base) = value_base_type(arena, self.sem, m.prefix) else {
            arena.free_subtree(member_ty);
            return false;
        };
        let Some(value_base) = value_base_type(arena, self.sem, cast.value) else {
            arena.free_subtree(member_ty);
            return false;
        };
        if !typing::is_vector_type(arena, cast_base) || !typing::is_vector_type(arena, value_base)
        {
            arena.free_subtree(member_ty);
            return false;
        }
        // The cast must not extend: a widening cast manufactures bits the
        // inner value does not have.
        let comp = typing::compare_precision(arena, cast_base, value_base);
        if !matches!(
            comp,
            typing::PrecisionCompare::Less | typing::PrecisionCompare::Equal
        ) {
            arena.free_subtree(member_ty);
            return false;
        }
        let (Some(cast_span), Some(value_span)) =
            (type_span(arena, cast_base), type_span(arena, value_base))
        else {
            arena.free_subtree(member_ty);
            return false;
        };
        let (Node::Range(cr), Node::Range(vr)) = (
            arena.node(cast_span).clone(),
            arena.node(value_span).clone(),
        ) else {
            arena.free_subtree(member_ty);
            return false;
        };

        // Direction difference mirrors the index on the cast's max bound.
        if cr.direction != vr.direction {
            let Some(cast_max) = crate::typing::range_max_bound(arena, cast_span) else {
                arena.free_subtree(member_ty);
                return false;
            };
            let max_copy = deep_copy(arena, cast_max);
            let max_copy = typing::assure_syntactic_type(arena, self.sem, max_copy);
            self.rebuild_slot(arena, m.index, |arena, inner| {
                Builder::new(arena).binary(Operator::Minus, max_copy, inner)
            });
        }

        // Base difference shifts the index by (cast min − value min).
        let cast_min = range_min_bound(arena, cast_span);
        let value_min = range_min_bound(arena, value_span);
        if let (Some(cmin), Some(vmin)) = (cast_min, value_min) {
            if !crate::tree::equals::equals_default(arena, cmin, vmin) {
                let cmin_copy = deep_copy(arena, cmin);
                let vmin_copy = deep_copy(arena, vmin);
                let cmin_copy = typing::assure_syntactic_type(arena, self.sem, cmin_copy);
                let vmin_copy = typing::assure_syntactic_type(arena, self.sem, vmin_copy);
                let Node::Member(m_now) = arena.node(id).clone() else {
                    arena.free_subtree(member_ty);
                    return false;
                };
                self.rebuild_slot(arena, m_now.index, |arena, inner| {
                    let mut b = Builder::new(arena);
                    let shift = b.binary(Operator::Minus, cmin_copy, vmin_copy);
                    b.binary(Operator::Minus, inner, shift)
                });
            }
        }

        // Drop the cast from the prefix chain.
        let inner_value = cast.value;
        arena.hoist(m.prefix, inner_value);
        self.trash.insert(m.prefix);
        crate::typing::reset_types(arena, id, false);

        // Restore the member's observed type when the new element type
        // differs (e.g. logic flag changes).
        let same = match semantic_type(arena, self.sem, id) {
            Some(new_ty) => crate::tree::equals::equals_default(arena, new_ty, member_ty),
            None => false,
        };
        let final_id = if same {
            arena.free_subtree(member_ty);
            id
        } else {
            self.rebuild_slot(arena, id, |arena, inner| {
                Builder::new(arena).cast(member_ty, inner)
            })
        };
        self.visit(arena, final_id);
        true
    }

    fn literal_index(&mut self, arena: &mut Arena, index: NodeId) -> Option<i64> {
        match arena.node(index) {
            Node::IntVal(x) => Some(x.value),
            Node::BoolVal(x) => Some(x.value as i64),
            Node::BitVal(x) if x.value.is_01() => Some(x.value.is_high() as i64),
            _ => None,
        }
    }

    // ========================================================================
    // SLICES
    // ========================================================================

    /// A one-position slice of an array is a member.
    fn simplify_slice_to_member(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        let Some((left, right)) = range_literal_bounds(arena, s.span) else {
            return false;
        };
        if left != right {
            return false;
        }
        let Some(prefix_base) = value_base_type(arena, self.sem, s.prefix) else {
            return false;
        };
        if !matches!(arena.node(prefix_base), Node::ArrayT(_)) {
            return false;
        }
        let prefix_copy = deep_copy(arena, s.prefix);
        let mut b = Builder::new(arena);
        let idx = b.int_val(left);
        let member = b.member(prefix_copy, idx);
        self.replace(arena, id, member);
        self.visit(arena, member);
        true
    }

    /// A slice covering the prefix's whole declared span is the prefix.
    fn simplify_useless_slice(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        let Some(prefix_ty) = semantic_type(arena, self.sem, s.prefix) else {
            return false;
        };
        let Some(prefix_span) = type_span(arena, prefix_ty) else {
            return false;
        };
        if !crate::tree::equals::equals_default(arena, s.span, prefix_span) {
            return false;
        }
        let prefix = s.prefix;
        self.hoist(arena, id, prefix);
        self.visit(arena, prefix);
        true
    }

    /// `(a ⊕ b)[h:l] ⇒ a[h:l] ⊕ b[h:l]`.
    fn simplify_bitwise_expression_slice(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        let Node::Expression(e) = arena.node(s.prefix).clone() else {
            return false;
        };
        if !e.op.is_bitwise() {
            return false;
        }
        let mut make_side = |arena: &mut Arena, side: NodeId| {
            let side_copy = deep_copy(arena, side);
            let span_copy = deep_copy(arena, s.span);
            Builder::new(arena).slice(side_copy, span_copy)
        };
        let lhs_slice = make_side(arena, e.lhs);
        let rebuilt = match e.rhs {
            Some(rhs) => {
                let rhs_slice = make_side(arena, rhs);
                Builder::new(arena).binary(e.op, lhs_slice, rhs_slice)
            }
            None => Builder::new(arena).unary(e.op, lhs_slice),
        };
        self.replace(arena, id, rebuilt);
        self.visit(arena, rebuilt);
        true
    }

    /// A literal-bounded slice of a concat keeps only the segments it
    /// covers; a slice fully inside one segment reduces to a slice of it.
    fn simplify_concat_slice(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        let Node::Expression(e) = arena.node(s.prefix).clone() else {
            return false;
        };
        if e.op != Operator::Concat {
            return false;
        }
        let Some((left, right)) = range_literal_bounds(arena, s.span) else {
            return false;
        };
        let Node::Range(slice_range) = arena.node(s.span).clone() else {
            return false;
        };
        if slice_range.direction != Direction::Downto {
            return false;
        }
        let (hi, lo) = (left.max(right), left.min(right));

        let mut elements = Vec::new();
        collect_concat_elements(arena, s.prefix, &mut elements);
        let mut widths = Vec::new();
        for &el in &elements {
            let Some(t) = semantic_type(arena, self.sem, el) else {
                return false;
            };
            let w = type_bitwidth(arena, t);
            if w == 0 {
                return false;
            }
            widths.push(w as i64);
        }
        // Rightmost element holds position 0 (downto concat).
        let mut base = 0i64;
        let mut kept: Vec<(NodeId, i64, i64)> = Vec::new();
        for i in (0..elements.len()).rev() {
            let el_lo = base;
            let el_hi = base + widths[i] - 1;
            base += widths[i];
            if el_hi < lo || el_lo > hi {
                continue;
            }
            kept.push((elements[i], el_lo.max(lo) - el_lo, el_hi.min(hi) - el_lo));
        }
        if kept.is_empty() {
            return false;
        }

        // Build the reduced value, leftmost segment first.
        kept.reverse();
        let mut pieces = Vec::new();
        for (el, seg_lo, seg_hi) in kept {
            let full_width = {
                let t = semantic_type(arena, self.sem, el).expect("typed above");
                type_bitwidth(arena, t) as i64
            };
            let piece = if seg_lo == 0 && seg_hi == full_width - 1 {
                deep_copy(arena, el)
            } else if seg_lo == seg_hi {
                let el_copy = deep_copy(arena, el);
                let mut b = Builder::new(arena);
                let idx = b.int_val(seg_lo);
                b.member(el_copy, idx)
            } else {
                let el_copy = deep_copy(arena, el);
                let mut b = Builder::new(arena);
                let span = b.downto(seg_hi, seg_lo);
                b.slice(el_copy, span)
            };
            pieces.push(piece);
        }
        let mut result = pieces.remove(0);
        for piece in pieces {
            result = Builder::new(arena).binary(Operator::Concat, result, piece);
        }
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    /// Push a slice through a non-widening cast.
    fn push_slice_into_cast(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        let Node::Cast(cast) = arena.node(s.prefix).clone() else {
            return false;
        };
        let Some(cast_base) = value_base_type(arena, self.sem, s.prefix) else {
            return false;
        };
        let Some(value_base) = value_base_type(arena, self.sem, cast.value) else {
            return false;
        };
        if !typing::is_vector_type(arena, cast_base) || !typing::is_vector_type(arena, value_base)
        {
            return false;
        }
        let comp = typing::compare_precision(arena, cast_base, value_base);
        if !matches!(
            comp,
            typing::PrecisionCompare::Less | typing::PrecisionCompare::Equal
        ) {
            return false;
        }
        let (Some(cast_span), Some(value_span)) =
            (type_span(arena, cast_base), type_span(arena, value_base))
        else {
            return false;
        };
        let (Node::Range(cr), Node::Range(vr)) = (
            arena.node(cast_span).clone(),
            arena.node(value_span).clone(),
        ) else {
            return false;
        };
        if cr.direction != vr.direction {
            return false;
        }
        let Some(slice_ty_cached) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let slice_ty = deep_copy(arena, slice_ty_cached);
        let inner_value = cast.value;
        arena.hoist(s.prefix, inner_value);
        self.trash.insert(s.prefix);
        crate::typing::reset_types(arena, id, false);
        let final_id = self.rebuild_slot(arena, id, |arena, inner| {
            Builder::new(arena).cast(slice_ty, inner)
        });
        self.visit(arena, final_id);
        true
    }

    /// Distribute a slice into every `when` branch.
    fn push_slice_into_when(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        if arena.kind(s.prefix) != NodeKind::When {
            return false;
        }
        let when_id = s.prefix;
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
            let span_copy = deep_copy(arena, s.span);
            self.rebuild_slot(arena, value, |arena, inner| {
                Builder::new(arena).slice(inner, span_copy)
            });
        }
        self.hoist(arena, id, when_id);
        crate::typing::reset_types(arena, when_id, false);
        self.visit(arena, when_id);
        true
    }

    /// Distribute a slice into every `with` alternative.
    fn push_slice_into_with(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        if arena.kind(s.prefix) != NodeKind::With {
            return false;
        }
        let with_id = s.prefix;
        let Node::With(w) = arena.node(with_id).clone() else {
            return false;
        };
        let mut branch_values: Vec<NodeId> = Vec::new();
        for &alt in &w.alts {
            if let Node::WithAlt(wa) = arena.node(alt) {
                branch_values.push(wa.value);
            }
        }
        branch_values.extend(w.default);
        for value in branch_values {
            let span_copy = deep_copy(arena, s.span);
            self.rebuild_slot(arena, value, |arena, inner| {
                Builder::new(arena).slice(inner, span_copy)
            });
        }
        self.hoist(arena, id, with_id);
        crate::typing::reset_types(arena, with_id, false);
        self.visit(arena, with_id);
        true
    }

    /// A `downto` slice keeping the prefix's minimum bound truncates the
    /// value: expressible as a cast in rvalue position.
    fn transform_slice_to_cast(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Slice(s) = arena.node(id).clone() else {
            return false;
        };
        if is_in_left_hand_side(arena, id) || is_in_sensitivity_list(arena, id) {
            return false;
        }
        // Under a cast the truncation is already explicit; a second cast
        // would just nest.
        if arena
            .parent(id)
            .is_some_and(|p| arena.kind(p) == NodeKind::Cast)
        {
            return false;
        }
        let Node::Range(r) = arena.node(s.span).clone() else {
            return false;
        };
        if r.direction != Direction::Downto {
            return false;
        }
        let Some(prefix_ty) = semantic_type(arena, self.sem, s.prefix) else {
            return false;
        };
        let Some(prefix_span) = type_span(arena, prefix_ty) else {
            return false;
        };
        let (Some(slice_min), Some(prefix_min)) = (
            range_min_bound(arena, s.span),
            range_min_bound(arena, prefix_span),
        ) else {
            return false;
        };
        if !crate::tree::equals::equals_default(arena, slice_min, prefix_min) {
            return false;
        }
        if span_bitwidth(arena, s.span) == 0 {
            return false;
        }
        let Some(slice_ty_cached) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let slice_ty = deep_copy(arena, slice_ty_cached);
        let prefix_copy = deep_copy(arena, s.prefix);
        let cast = Builder::new(arena).cast(slice_ty, prefix_copy);
        self.replace(arena, id, cast);
        self.visit(arena, cast);
        true
    }
}

/// Flatten nested concat expressions left-to-right.
fn collect_concat_elements(arena: &Arena, id: NodeId, out: &mut Vec<NodeId>) {
    if let Node::Expression(e) = arena.node(id) {
        if e.op == Operator::Concat {
            let (lhs, rhs) = (e.lhs, e.rhs);
            collect_concat_elements(arena, lhs, out);
            if let Some(rhs) = rhs {
                collect_concat_elements(arena, rhs, out);
            }
            return;
        }
    }
    out.push(id);
}
