//! Range direction normalization: `upto` spans on vector and numeric
//! types flip to `downto`, and every index expression over a flipped type
//! is mirrored (`max + min − index`, or `size − 1 − index` for symbolic
//! bounds) so observable behavior is preserved. String spans go the other
//! way: they must stay `upto`.
//!
//! Types are fully computed *before* any span is flipped: the index fixes
//! key off the pre-inversion spans. The pass ends with a full type-cache
//! reset and a simplification sweep.

use crate::semantics::LanguageSemantics;
use crate::simplify::SimplifyOptions;
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::value::Direction;
use crate::tree::{Arena, Node, NodeId, Operator};
use crate::typing::{
    self, range_max_bound, range_min_bound, semantic_type, type_span,
};

/// Normalize range directions across the whole design.
pub fn fix_ranges_direction(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    system: NodeId,
) {
    // Freeze the pre-inversion typing: every value's semantic type is
    // computed (and cached) now.
    let values = crate::tree::nav::collect(arena, system, |n| n.is_value());
    for v in values.iter().rev() {
        let _ = semantic_type(arena, sem, *v);
    }

    let mut spans_to_revert: Vec<NodeId> = Vec::new();

    // Collect type spans needing inversion.
    let types = crate::tree::nav::collect(arena, system, |n| n.is_type());
    for ty in types.into_iter().rev() {
        let Some(span) = type_span(arena, ty) else {
            continue;
        };
        if must_be_reverted(arena, ty, span) {
            spans_to_revert.push(span);
        }
    }

    // Mirror member indices over prefixes whose type will flip.
    let members = crate::tree::nav::collect(arena, system, |n| {
        matches!(n, Node::Member(_))
    });
    for member in members.into_iter().rev() {
        let Node::Member(m) = arena.node(member).clone() else {
            continue;
        };
        let Some(prefix_ty) = semantic_type(arena, sem, m.prefix) else {
            continue;
        };
        let Some(ref_span) = type_span(arena, prefix_ty) else {
            continue;
        };
        if !must_be_reverted(arena, prefix_ty, ref_span) {
            continue;
        }
        fix_index(arena, sem, m.index, ref_span, m.prefix);
    }

    // Mirror slice spans likewise.
    let slices = crate::tree::nav::collect(arena, system, |n| {
        matches!(n, Node::Slice(_))
    });
    for slice in slices.into_iter().rev() {
        let Node::Slice(s) = arena.node(slice).clone() else {
            continue;
        };
        let Some(prefix_ty) = semantic_type(arena, sem, s.prefix) else {
            continue;
        };
        let Some(ref_span) = type_span(arena, prefix_ty) else {
            continue;
        };
        if !must_be_reverted(arena, prefix_ty, ref_span) {
            continue;
        }
        fix_range(arena, sem, s.span, ref_span, s.prefix);
    }

    // Aggregate alternates over flipped array types transform their
    // indices identically.
    let aggregates = crate::tree::nav::collect(arena, system, |n| {
        matches!(n, Node::Aggregate(_))
    });
    for agg_id in aggregates.into_iter().rev() {
        let Some(agg_ty) = semantic_type(arena, sem, agg_id) else {
            continue;
        };
        let Some(ref_span) = type_span(arena, agg_ty) else {
            continue;
        };
        if !must_be_reverted(arena, agg_ty, ref_span) {
            continue;
        }
        let Node::Aggregate(agg) = arena.node(agg_id).clone() else {
            continue;
        };
        for alt in agg.alts {
            let Node::AggregateAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            for idx in a.indices {
                if matches!(arena.node(idx), Node::Range(_)) {
                    fix_range(arena, sem, idx, ref_span, agg_id);
                } else {
                    fix_index(arena, sem, idx, ref_span, agg_id);
                }
            }
        }
    }

    // Out/inout bindings to standard subprograms observe the original
    // order: reverse the actual after the call.
    fix_standard_out_parameters(arena, sem, system);

    // Flip the collected spans.
    for span in spans_to_revert {
        if !arena.is_alive(span) {
            continue;
        }
        if let Node::Range(r) = arena.node_mut(span) {
            r.direction = r.direction.flipped();
            std::mem::swap(&mut r.left, &mut r.right);
        }
    }

    // Everything typed before is now stale.
    typing::reset_types(arena, system, true);
    crate::resolve::reset_declarations(arena, system);
    crate::simplify::simplify_with(arena, sem, system, &SimplifyOptions::default());
}

/// A span flips when it runs `upto` — except string spans, which are the
/// `upto` case and flip when running `downto`.
fn must_be_reverted(arena: &Arena, owner_ty: NodeId, span: NodeId) -> bool {
    let Node::Range(r) = arena.node(span) else {
        return false;
    };
    let must_be_upto = matches!(arena.node(owner_ty), Node::StringT(_));
    match r.direction {
        Direction::Downto => must_be_upto,
        Direction::Upto => !must_be_upto,
    }
}

/// `index ⇒ (max + min) − index`, or `(size(prefix) − 1) − index` when
/// the bounds are symbolic.
fn fix_index(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    index: NodeId,
    ref_span: NodeId,
    prefix: NodeId,
) {
    let Some(mirror) = mirror_base(arena, sem, ref_span, prefix, index) else {
        return;
    };
    let Some(placeholder) = arena.extract(index) else {
        return;
    };
    let index = typing::assure_syntactic_type(arena, sem, index);
    let flipped = Builder::new(arena).binary(Operator::Minus, mirror, index);
    arena.replace(placeholder, flipped);
    arena.free_subtree(placeholder);
}

/// `[a op b] ⇒ [bound − a (op flipped) bound − b]`.
fn fix_range(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    span: NodeId,
    ref_span: NodeId,
    prefix: NodeId,
) {
    let Node::Range(r) = arena.node(span).clone() else {
        return;
    };
    let (Some(left), Some(right)) = (r.left, r.right) else {
        return;
    };
    for bound in [left, right] {
        let Some(mirror) = mirror_base(arena, sem, ref_span, prefix, bound) else {
            return;
        };
        let Some(placeholder) = arena.extract(bound) else {
            return;
        };
        let bound = typing::assure_syntactic_type(arena, sem, bound);
        let flipped = Builder::new(arena).binary(Operator::Minus, mirror, bound);
        arena.replace(placeholder, flipped);
        arena.free_subtree(placeholder);
    }
    if let Node::Range(rr) = arena.node_mut(span) {
        rr.direction = rr.direction.flipped();
    }
}

/// The mirroring base: `max + min` when both bounds exist, else
/// `size(prefix) − 1` (plus `min` when only the maximum is symbolic).
fn mirror_base(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    ref_span: NodeId,
    prefix: NodeId,
    index_for_type: NodeId,
) -> Option<NodeId> {
    let max = range_max_bound(arena, ref_span);
    let min = range_min_bound(arena, ref_span);
    match (max, min) {
        (Some(max), Some(min)) => {
            let max_c = deep_copy(arena, max);
            let min_c = deep_copy(arena, min);
            let max_c = typing::assure_syntactic_type(arena, sem, max_c);
            let min_c = typing::assure_syntactic_type(arena, sem, min_c);
            let bound = Builder::new(arena).binary(Operator::Plus, max_c, min_c);
            // Cast the base to the index's type so the rewritten
            // expression still types.
            match semantic_type(arena, sem, index_for_type) {
                Some(index_ty) => {
                    let ty_copy = deep_copy(arena, index_ty);
                    Some(Builder::new(arena).cast(ty_copy, bound))
                }
                None => Some(bound),
            }
        }
        (None, maybe_min) => {
            let prefix_copy = deep_copy(arena, prefix);
            let mut b = Builder::new(arena);
            let mut size = b.unary(Operator::Size, prefix_copy);
            if let Some(min) = maybe_min {
                let min_c = deep_copy(arena, min);
                let min_c = typing::assure_syntactic_type(arena, sem, min_c);
                size = Builder::new(arena).binary(Operator::Plus, size, min_c);
            }
            let mut b = Builder::new(arena);
            let one = b.int_val(1);
            Some(b.binary(Operator::Minus, size, one))
        }
        _ => None,
    }
}

/// For each out/inout actual bound to a standard subprogram whose value
/// type flips, append a reversing self-assignment after the call.
fn fix_standard_out_parameters(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    system: NodeId,
) {
    let param_assigns = crate::tree::nav::collect(arena, system, |n| {
        matches!(n, Node::ParameterAssign(_))
    });
    for pa in param_assigns.into_iter().rev() {
        let Some(param) = crate::resolve::get_declaration(arena, sem, pa) else {
            continue;
        };
        let Node::DataDeclaration(d) = arena.node(param).clone() else {
            continue;
        };
        let crate::tree::decl::DataKind::Parameter(dir) = d.kind else {
            continue;
        };
        if !matches!(
            dir,
            crate::tree::decl::PortDirection::Out | crate::tree::decl::PortDirection::Inout
        ) {
            continue;
        }
        if !crate::resolve::is_part_of_standard(arena, param) {
            continue;
        }
        let Node::ParameterAssign(assign) = arena.node(pa).clone() else {
            continue;
        };
        let Some(value_ty) = semantic_type(arena, sem, assign.value) else {
            continue;
        };
        let Some(span) = type_span(arena, value_ty) else {
            continue;
        };
        if !must_be_reverted(arena, value_ty, span) {
            continue;
        }
        // Find the enclosing action inside an action list.
        let Some(call_action) = crate::tree::nav::nearest_parent(arena, pa, |n| {
            n.is_action()
        }) else {
            continue;
        };
        let Some(list_parent) = arena.parent(call_action) else {
            continue;
        };
        let target = deep_copy(arena, assign.value);
        let source_inner = deep_copy(arena, assign.value);
        let mut b = Builder::new(arena);
        let reversed = b.unary(Operator::Reverse, source_inner);
        let fixup = b.assign(target, reversed);
        let Some(list) = arena.node_mut(list_parent).list_containing_mut(call_action)
        else {
            arena.free_subtree(fixup);
            continue;
        };
        let pos = list
            .iter()
            .position(|&x| x == call_action)
            .expect("parent holds child");
        list.insert(pos + 1, fixup);
        arena.claim(list_parent, fixup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::HifSemantics;
    use crate::tree::decl::*;

    /// signal s: bitvector(0 upto 7); process { x := s[2] }
    #[test]
    fn upto_span_flips_and_member_index_mirrors() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let span = b.upto(0, 7);
        let bv = b.bitvector_type(span, true, false);
        let sig = b.signal("s", bv, None);
        let span_x = b.downto(7, 0);
        let bvx = b.bitvector_type(span_x, true, false);
        let var = b.variable("x", bvx, None);
        let bit = b.bit_type(true, true);
        let xvar = b.variable("xb", bit, None);
        let prefix = b.identifier("s");
        let two = b.int_val(2);
        let member = b.member(prefix, two);
        let target = b.identifier("xb");
        let assign = b.assign(target, member);
        let proc = b.process("p", vec![], vec![assign]);
        let contents = b.arena.alloc(Node::Contents(Contents {
            libraries: vec![],
            declarations: vec![sig, var, xvar],
            instances: vec![],
            state_tables: vec![proc],
            generates: vec![],
            global_action: None,
        }));
        let view = b.arena.alloc(Node::View(View {
            name: "rtl".into(),
            entity: None,
            contents: Some(contents),
            template_params: vec![],
            standard: false,
            style: ViewStyle::Rtl,
        }));
        let du = b.arena.alloc(Node::DesignUnit(DesignUnit {
            name: "m".into(),
            views: vec![view],
        }));
        let sys = b.arena.alloc(Node::System(System {
            name: "sys".into(),
            library_defs: vec![],
            design_units: vec![du],
            declarations: vec![],
        }));

        fix_ranges_direction(&mut arena, &sem, sys);

        // The declared span is now downto with swapped bounds.
        let Node::DataDeclaration(d) = arena.node(sig).clone() else {
            panic!("signal expected");
        };
        let span = type_span(&arena, d.ty).expect("span");
        let Node::Range(r) = arena.node(span).clone() else {
            panic!("range expected");
        };
        assert_eq!(r.direction, Direction::Downto);
        assert_eq!(arena.int_value(r.left.unwrap()), Some(7));
        assert_eq!(arena.int_value(r.right.unwrap()), Some(0));

        // The index mirrored: 7 + 0 − 2 = 5 after the final simplify.
        let Node::Assign(a) = arena.node(assign).clone() else {
            panic!("assign expected");
        };
        let Node::Member(m) = arena.node(a.source).clone() else {
            panic!("member expected, index should fold to a literal");
        };
        assert_eq!(arena.int_value(crate::tree::nav::skip_casts(&arena, m.index)), Some(5));
    }
}
