//! Aggregate canonicalization.

use crate::simplify::{AGGREGATE_UNROLL_THRESHOLD, Simplifier};
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::equals::equals_default;
use crate::tree::value::Direction;
use crate::tree::{Arena, Node, NodeId, Operator};
use crate::typing::{self, semantic_type, type_bitwidth, type_span, value_base_type};

/// One decoded aggregate alternate: literal index → value.
struct LiteralAlt {
    index: i64,
    value: NodeId,
}

impl Simplifier<'_> {
    pub(crate) fn visit_aggregate(&mut self, arena: &mut Arena, id: NodeId) {
        self.sort_aggregate_alts(arena, id);
        if self.simplify_bit_aggregate(arena, id) {
            return;
        }
        if self.simplify_bitvector_aggregate(arena, id) {
            return;
        }
        if self.simplify_string_aggregate(arena, id) {
            return;
        }
        if self.simplify_aggregate_to_slice(arena, id) {
            return;
        }
        if self.simplify_aggregate_to_concat(arena, id) {
            return;
        }
        if self.simplify_unrolling_aggregate(arena, id) {
            return;
        }
        let _ = self.simplify_rolling_aggregate(arena, id);
    }

    pub(crate) fn visit_aggregate_alt(&mut self, arena: &mut Arena, id: NodeId) {
        // Alt indices never carry syntactic types; handled at the constant
        // visit. Nothing else to normalize here.
        let _ = (arena, id);
    }

    fn sort_aggregate_alts(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return;
        };
        let mut sorted = agg.alts.clone();
        sorted.sort_by(|&a, &b| crate::tree::compare::compare(arena, a, b));
        if sorted != agg.alts {
            if let Node::Aggregate(a) = arena.node_mut(id) {
                a.alts = sorted;
            }
        }
    }

    fn literal_alts(&mut self, arena: &Arena, alts: &[NodeId]) -> Option<Vec<LiteralAlt>> {
        let mut out = Vec::new();
        for &alt in alts {
            let Node::AggregateAlt(a) = arena.node(alt) else {
                return None;
            };
            let value = a.value;
            for &idx in &a.indices {
                match arena.node(idx) {
                    Node::IntVal(x) => out.push(LiteralAlt {
                        index: x.value,
                        value,
                    }),
                    Node::Range(_) => {
                        let (left, right) = typing::range_literal_bounds(arena, idx)?;
                        let (lo, hi) = (left.min(right), left.max(right));
                        if hi - lo > AGGREGATE_UNROLL_THRESHOLD as i64 {
                            return None;
                        }
                        for i in lo..=hi {
                            out.push(LiteralAlt {
                                index: i,
                                value,
                            });
                        }
                    }
                    _ => return None,
                }
            }
        }
        Some(out)
    }

    /// A scalar-typed aggregate carrying only `others` is the default
    /// value itself.
    fn simplify_bit_aggregate(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return false;
        };
        if !agg.alts.is_empty() {
            return false;
        }
        let Some(others) = agg.others else {
            return false;
        };
        let Some(base) = value_base_type(arena, self.sem, id) else {
            return false;
        };
        if !matches!(arena.node(base), Node::BitT(_) | Node::BoolT(_)) {
            return false;
        }
        let value = deep_copy(arena, others);
        self.replace(arena, id, value);
        self.visit(arena, value);
        true
    }

    /// A vector-typed aggregate whose positions are all literal bits
    /// becomes the bitvector literal.
    fn simplify_bitvector_aggregate(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return false;
        };
        let Some(base) = value_base_type(arena, self.sem, id) else {
            return false;
        };
        if !typing::is_vector_type(arena, base) {
            return false;
        }
        let width = type_bitwidth(arena, base);
        if width == 0 || width > AGGREGATE_UNROLL_THRESHOLD {
            return false;
        }
        let downto = match type_span(arena, base).map(|s| arena.node(s).clone()) {
            Some(Node::Range(r)) => r.direction == Direction::Downto,
            _ => true,
        };
        let digit_of = |arena: &Arena, v: NodeId| -> Option<char> {
            match arena.node(v) {
                Node::BitVal(x) => Some(x.value.to_char()),
                Node::BoolVal(x) => Some(if x.value { '1' } else { '0' }),
                _ => None,
            }
        };
        let Some(alts) = self.literal_alts(arena, &agg.alts) else {
            return false;
        };
        let mut digits: Vec<Option<char>> = vec![None; width as usize];
        for alt in &alts {
            if alt.index < 0 || alt.index as u64 >= width {
                return false;
            }
            let Some(d) = digit_of(arena, alt.value) else {
                return false;
            };
            let pos = if downto {
                width as usize - 1 - alt.index as usize
            } else {
                alt.index as usize
            };
            digits[pos] = Some(d);
        }
        let others_digit = match agg.others {
            Some(o) => digit_of(arena, o),
            None => None,
        };
        let mut out = String::with_capacity(width as usize);
        for d in digits {
            match d.or(others_digit) {
                Some(c) => out.push(c),
                None => return false,
            }
        }
        let Some(agg_ty) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let ty_copy = deep_copy(arena, agg_ty);
        typing::set_type_constexpr(arena, ty_copy, true);
        let result = Builder::new(arena).bitvector_val(&out);
        typing::attach_syntactic_type(arena, result, ty_copy);
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    /// A string-typed aggregate of character literals becomes the string.
    fn simplify_string_aggregate(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return false;
        };
        let Some(base) = value_base_type(arena, self.sem, id) else {
            return false;
        };
        if !matches!(arena.node(base), Node::StringT(_)) {
            return false;
        }
        if agg.others.is_some() || agg.alts.is_empty() {
            return false;
        }
        let Some(alts) = self.literal_alts(arena, &agg.alts) else {
            return false;
        };
        let mut chars: Vec<Option<char>> = vec![None; alts.len()];
        for alt in &alts {
            let Node::CharVal(c) = arena.node(alt.value) else {
                return false;
            };
            let idx = alt.index;
            if idx < 0 || idx as usize >= chars.len() {
                return false;
            }
            chars[idx as usize] = Some(c.value);
        }
        let out: Option<String> = chars.into_iter().collect();
        let Some(out) = out else {
            return false;
        };
        let result = Builder::new(arena).string_val(&out);
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    /// `{0 ⇒ a[k], 1 ⇒ a[k+1], …}` over one common prefix is a slice of
    /// that prefix, cast back to the aggregate's type.
    fn simplify_aggregate_to_slice(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return false;
        };
        if agg.others.is_some() || agg.alts.len() < 2 {
            return false;
        }
        let Some(mut alts) = self.literal_alts(arena, &agg.alts) else {
            return false;
        };
        alts.sort_by_key(|a| a.index);

        let mut common_prefix: Option<NodeId> = None;
        let mut member_base: Option<i64> = None;
        for (offset, alt) in alts.iter().enumerate() {
            if alt.index != alts[0].index + offset as i64 {
                return false;
            }
            let Node::Member(m) = arena.node(alt.value).clone() else {
                return false;
            };
            let Some(member_index) = arena.int_value(m.index) else {
                return false;
            };
            match common_prefix {
                None => {
                    common_prefix = Some(m.prefix);
                    member_base = Some(member_index - offset as i64);
                }
                Some(p) => {
                    if !equals_default(arena, p, m.prefix) {
                        return false;
                    }
                    if member_index != member_base.expect("set") + offset as i64 {
                        return false;
                    }
                }
            }
        }
        let (Some(prefix), Some(base)) = (common_prefix, member_base) else {
            return false;
        };
        let Some(agg_ty_cached) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let agg_ty = deep_copy(arena, agg_ty_cached);

        let prefix_copy = deep_copy(arena, prefix);
        let n = alts.len() as i64;
        let mut b = Builder::new(arena);
        let span = b.downto(base + n - 1, base);
        let slice = b.slice(prefix_copy, span);
        let cast = b.cast(agg_ty, slice);
        self.replace(arena, id, cast);
        self.visit(arena, cast);
        true
    }

    /// A fully literal vector aggregate of wider values unpacks into a
    /// concat (element 0 rightmost).
    fn simplify_aggregate_to_concat(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return false;
        };
        if agg.others.is_some() || agg.alts.len() < 2 {
            return false;
        }
        let Some(base) = value_base_type(arena, self.sem, id) else {
            return false;
        };
        if !typing::is_vector_type(arena, base) {
            return false;
        }
        let Some(mut alts) = self.literal_alts(arena, &agg.alts) else {
            return false;
        };
        alts.sort_by_key(|a| a.index);
        for (offset, alt) in alts.iter().enumerate() {
            if alt.index != offset as i64 {
                return false;
            }
            let Some(t) = semantic_type(arena, self.sem, alt.value) else {
                return false;
            };
            // Scalar elements are the bitvector-literal case, not this one.
            if type_bitwidth(arena, t) <= 1 {
                return false;
            }
        }
        let Some(agg_ty_cached) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        let agg_ty = deep_copy(arena, agg_ty_cached);
        let mut result: Option<NodeId> = None;
        for alt in alts.iter().rev() {
            let piece = deep_copy(arena, alt.value);
            result = Some(match result {
                None => piece,
                Some(acc) => Builder::new(arena).binary(Operator::Concat, acc, piece),
            });
        }
        let concat = result.expect("non-empty");
        let cast = Builder::new(arena).cast(agg_ty, concat);
        self.replace(arena, id, cast);
        self.visit(arena, cast);
        true
    }

    /// Unroll `others` into explicit alternates when the span is a small
    /// constant.
    fn simplify_unrolling_aggregate(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return false;
        };
        let Some(others) = agg.others else {
            return false;
        };
        let Some(base) = value_base_type(arena, self.sem, id) else {
            return false;
        };
        // Only array aggregates unroll; vector ones became literals above.
        if !matches!(arena.node(base), Node::ArrayT(_)) {
            return false;
        }
        let width = type_bitwidth(arena, base);
        if width == 0 || width > AGGREGATE_UNROLL_THRESHOLD {
            return false;
        }
        let Some(alts) = self.literal_alts(arena, &agg.alts) else {
            return false;
        };
        let covered: Vec<i64> = alts.iter().map(|a| a.index).collect();
        let mut new_alts = Vec::new();
        for i in 0..width as i64 {
            if covered.contains(&i) {
                continue;
            }
            let value = deep_copy(arena, others);
            let mut b = Builder::new(arena);
            let idx = b.int_val(i);
            new_alts.push(b.aggregate_alt(vec![idx], value));
        }
        if new_alts.is_empty() {
            // Fully covered: the default is dead weight.
            arena.detach(others);
            self.trash.insert(others);
            return true;
        }
        for alt in new_alts {
            arena.push_to_list(id, alt, |n| match n {
                Node::Aggregate(a) => &mut a.alts,
                _ => unreachable!("aggregate visited"),
            });
        }
        arena.detach(others);
        self.trash.insert(others);
        self.sort_aggregate_alts(arena, id);
        true
    }

    /// Identical alternates roll back into `others`.
    fn simplify_rolling_aggregate(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Aggregate(agg) = arena.node(id).clone() else {
            return false;
        };
        if agg.alts.len() < 2 {
            return false;
        }
        let values: Vec<NodeId> = agg
            .alts
            .iter()
            .filter_map(|&alt| match arena.node(alt) {
                Node::AggregateAlt(a) => Some(a.value),
                _ => None,
            })
            .collect();
        if values.len() != agg.alts.len() {
            return false;
        }
        let first = values[0];
        if !values[1..]
            .iter()
            .all(|&v| equals_default(arena, v, first))
        {
            return false;
        }
        match agg.others {
            Some(others) => {
                if !equals_default(arena, others, first) {
                    return false;
                }
            }
            None => {
                // Without a default the alternates must cover the span.
                let Some(base) = value_base_type(arena, self.sem, id) else {
                    return false;
                };
                let width = type_bitwidth(arena, base);
                let Some(alts) = self.literal_alts(arena, &agg.alts) else {
                    return false;
                };
                if width == 0 || alts.len() as u64 != width {
                    return false;
                }
                let rolled = deep_copy(arena, first);
                if let Node::Aggregate(a) = arena.node_mut(id) {
                    a.others = Some(rolled);
                }
                arena.claim(id, rolled);
            }
        }
        let Node::Aggregate(agg_now) = arena.node(id).clone() else {
            return false;
        };
        for alt in agg_now.alts {
            arena.detach(alt);
            self.trash.insert(alt);
        }
        true
    }
}
