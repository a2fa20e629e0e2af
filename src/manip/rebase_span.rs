//! Span rebasing: every numeric type span is rebuilt to start at 0, and
//! every indexing operation into a rebased type is shifted by the old
//! minimum. "Typed ranges" — `(W−1) downto 0` whose bounds are two value
//! template parameters of the same owner — lose the right-bound parameter
//! entirely: literal 0 replaces its uses and the owner's references are
//! re-sorted against the shrunken template list.

use crate::semantics::LanguageSemantics;
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::{Arena, Node, NodeId, Operator};
use crate::typing::{self, range_min_bound, semantic_type, type_span};

/// Rebase all type spans under `root` to start at zero.
pub fn rebase_type_span(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    root: NodeId,
) -> bool {
    let mut collected: Vec<NodeId> = Vec::new();

    // Collect candidate spans (non-zero minimum), fixing typed ranges
    // instead of collecting them.
    let types = crate::tree::nav::collect(arena, root, |n| n.is_type());
    for ty in types.into_iter().rev() {
        let Some(span) = type_span(arena, ty) else {
            continue;
        };
        let Some(min) = range_min_bound(arena, span) else {
            continue;
        };
        if arena.int_value(min) == Some(0) {
            continue;
        }
        if fix_typed_range(arena, sem, span, root) {
            continue;
        }
        collected.push(span);
    }

    // Shift member indices into rebased prefixes.
    let members = crate::tree::nav::collect(arena, root, |n| {
        matches!(n, Node::Member(_))
    });
    for member in members.into_iter().rev() {
        let Node::Member(m) = arena.node(member).clone() else {
            continue;
        };
        let Some(shift) = prefix_min(arena, sem, m.prefix) else {
            continue;
        };
        shift_value(arena, sem, m.index, shift);
    }

    // Shift slice spans, casting top-level slices back to their original
    // type so enclosing expressions keep typing.
    let slices = crate::tree::nav::collect(arena, root, |n| {
        matches!(n, Node::Slice(_))
    });
    for slice in slices.into_iter().rev() {
        let Node::Slice(s) = arena.node(slice).clone() else {
            continue;
        };
        let Some(shift) = prefix_min(arena, sem, s.prefix) else {
            continue;
        };
        let slice_ty = semantic_type(arena, sem, slice).map(|t| deep_copy(arena, t));
        let Node::Range(r) = arena.node(s.span).clone() else {
            continue;
        };
        if let Some(left) = r.left {
            shift_value(arena, sem, left, shift);
        }
        if let Some(right) = r.right {
            shift_value(arena, sem, right, shift);
        }
        let is_top = !matches!(
            arena.parent(slice).map(|p| arena.kind(p)),
            Some(crate::tree::NodeKind::Slice)
                | Some(crate::tree::NodeKind::Member)
                | Some(crate::tree::NodeKind::Cast)
        );
        if is_top {
            if let Some(ty) = slice_ty {
                if let Some(placeholder) = arena.extract(slice) {
                    let cast = Builder::new(arena).cast(ty, slice);
                    arena.replace(placeholder, cast);
                    arena.free_subtree(placeholder);
                } else {
                    arena.free_subtree(ty);
                }
            }
        } else if let Some(ty) = slice_ty {
            arena.free_subtree(ty);
        }
    }

    // Shift aggregate alternate indices of rebased array aggregates.
    let aggregates = crate::tree::nav::collect(arena, root, |n| {
        matches!(n, Node::Aggregate(_))
    });
    for agg_id in aggregates.into_iter().rev() {
        let Some(agg_ty) = semantic_type(arena, sem, agg_id) else {
            continue;
        };
        let Some(span) = type_span(arena, agg_ty) else {
            continue;
        };
        let Some(min) = range_min_bound(arena, span) else {
            continue;
        };
        if arena.int_value(min) == Some(0) {
            continue;
        }
        let shift = deep_copy(arena, min);
        let Node::Aggregate(agg) = arena.node(agg_id).clone() else {
            continue;
        };
        for alt in agg.alts {
            let Node::AggregateAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            for idx in a.indices {
                if let Node::Range(r) = arena.node(idx).clone() {
                    if let Some(left) = r.left {
                        shift_value(arena, sem, left, shift);
                    }
                    if let Some(right) = r.right {
                        shift_value(arena, sem, right, shift);
                    }
                } else {
                    shift_value(arena, sem, idx, shift);
                }
            }
        }
        arena.free_subtree(shift);
    }

    // Rebase the collected spans themselves: bound − min.
    let mut changed = false;
    for span in collected {
        if !arena.is_alive(span) {
            continue;
        }
        let Some(min) = range_min_bound(arena, span) else {
            continue;
        };
        let min_copy = deep_copy(arena, min);
        let Node::Range(r) = arena.node(span).clone() else {
            arena.free_subtree(min_copy);
            continue;
        };
        for bound in [r.left, r.right].into_iter().flatten() {
            shift_value(arena, sem, bound, min_copy);
        }
        arena.free_subtree(min_copy);
        changed = true;
    }

    typing::reset_types(arena, root, true);
    changed
}

/// The minimum bound of a prefix's span, when it is not already zero.
/// Returned as a fresh copy owned by the caller.
fn prefix_min(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    prefix: NodeId,
) -> Option<NodeId> {
    let ty = semantic_type(arena, sem, prefix)?;
    let span = type_span(arena, ty)?;
    let min = range_min_bound(arena, span)?;
    if arena.int_value(min) == Some(0) {
        return None;
    }
    Some(deep_copy(arena, min))
}

/// `value ⇒ value − shift` in place. `shift` stays owned by the caller.
fn shift_value(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    value: NodeId,
    shift: NodeId,
) {
    let Some(placeholder) = arena.extract(value) else {
        return;
    };
    let value = typing::assure_syntactic_type(arena, sem, value);
    let shift_copy = deep_copy(arena, shift);
    let shift_copy = typing::assure_syntactic_type(arena, sem, shift_copy);
    let shifted = Builder::new(arena).binary(Operator::Minus, value, shift_copy);
    arena.replace(placeholder, shifted);
    arena.free_subtree(placeholder);
}

/// A typed range `(W−1) downto 0`-style with both bounds referring to
/// value template parameters of the same owner. For standard subprograms
/// the right-bound parameter is deleted and its uses become literal 0;
/// for everything else the owner's reference sites re-sort their template
/// bindings against the formal list.
fn fix_typed_range(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    span: NodeId,
    root: NodeId,
) -> bool {
    let Node::Range(r) = arena.node(span).clone() else {
        return false;
    };
    let (Some(left), Some(right)) = (r.left, r.right) else {
        return false;
    };
    let left_id = terminal_identifier(arena, left);
    let right_id = terminal_identifier(arena, right);
    let (Some(left_id), Some(right_id)) = (left_id, right_id) else {
        return false;
    };
    let Some(left_decl) = crate::resolve::get_declaration(arena, sem, left_id) else {
        return false;
    };
    let Some(right_decl) = crate::resolve::get_declaration(arena, sem, right_id) else {
        return false;
    };
    let is_value_tp = |arena: &Arena, d: NodeId| {
        matches!(
            arena.node(d),
            Node::DataDeclaration(x) if matches!(x.kind, crate::tree::decl::DataKind::ValueTp { .. })
        )
    };
    if !is_value_tp(arena, left_decl) || !is_value_tp(arena, right_decl) {
        return false;
    }
    let Some(owner) = arena.parent(left_decl) else {
        return false;
    };
    if arena.parent(right_decl) != Some(owner) {
        return false;
    }

    let owner_is_standard_sub = matches!(arena.node(owner), Node::SubProgram(_))
        && crate::resolve::is_part_of_standard(arena, owner);

    if owner_is_standard_sub {
        // Replace every reference to the right-bound parameter with 0 and
        // delete the parameter.
        let refs = crate::resolve::get_references(arena, sem, right_decl, root);
        for r in refs {
            if !arena.is_alive(r) {
                continue;
            }
            let zero = Builder::new(arena).int_val(0);
            let zero = typing::assure_syntactic_type(arena, sem, zero);
            arena.replace(r, zero);
            arena.free_subtree(r);
        }
        arena.detach(right_decl);
        arena.free_subtree(right_decl);
        crate::resolve::reset_declarations(arena, root);
        return true;
    }

    // Non-standard owner: re-sort template bindings at every reference.
    let formals: Vec<NodeId> = match arena.node(owner) {
        Node::SubProgram(sp) => sp.template_params.clone(),
        Node::TypeDef(td) => td.template_params.clone(),
        Node::View(v) => v.template_params.clone(),
        _ => return false,
    };
    let refs = crate::resolve::get_references(arena, sem, owner, root);
    for site in refs {
        let _ = crate::manip::sort::sort_parameters(
            arena,
            sem,
            site,
            &formals,
            crate::manip::sort::ParameterList::TemplateArguments,
            crate::manip::sort::SortMissingKind::All,
        );
    }
    false
}

/// The identifier at the bottom of a bound expression, when the bound is
/// an identifier or `identifier − literal` shape.
fn terminal_identifier(arena: &Arena, bound: NodeId) -> Option<NodeId> {
    match arena.node(bound) {
        Node::Identifier(_) => Some(bound),
        Node::Expression(e) => match arena.node(e.lhs) {
            Node::Identifier(_) => Some(e.lhs),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::HifSemantics;

    #[test]
    fn nonzero_based_span_rebases_and_member_shifts() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        // signal s : bitvector(11 downto 4); read s[6].
        let span = b.downto(11, 4);
        let bv = b.bitvector_type(span, true, false);
        let sig = b.signal("s", bv, None);
        let prefix = b.identifier("s");
        let six = b.int_val(6);
        let member = b.member(prefix, six);
        let bit = b.bit_type(true, true);
        let xvar = b.variable("x", bit, None);
        let target = b.identifier("x");
        let assign = b.assign(target, member);
        let proc = b.process("p", vec![], vec![assign]);
        let contents = b.arena.alloc(Node::Contents(crate::tree::decl::Contents {
            libraries: vec![],
            declarations: vec![sig, xvar],
            instances: vec![],
            state_tables: vec![proc],
            generates: vec![],
            global_action: None,
        }));

        assert!(rebase_type_span(&mut arena, &sem, contents));

        // Span is now (11−4 downto 4−4); simplify folds the arithmetic.
        crate::simplify::simplify(&mut arena, &sem, contents);
        let Node::DataDeclaration(d) = arena.node(sig).clone() else {
            panic!("signal expected");
        };
        let new_span = type_span(&arena, d.ty).expect("span");
        let (left, right) =
            crate::typing::range_literal_bounds(&arena, new_span).expect("literal bounds");
        assert_eq!((left, right), (7, 0));

        // Index 6 became 6 − 4 = 2.
        let Node::Assign(a) = arena.node(assign).clone() else {
            panic!("assign expected");
        };
        let Node::Member(m) = arena.node(a.source).clone() else {
            panic!("member expected");
        };
        assert_eq!(
            arena.int_value(crate::tree::nav::skip_casts(&arena, m.index)),
            Some(2)
        );
    }
}
