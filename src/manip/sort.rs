//! Canonical ordering.
//!
//! Sorts aggregate and `with` alternatives and commutative expression
//! operands by the stable total order, and reorders actual parameters
//! against their formal declaration order.

use crate::semantics::LanguageSemantics;
use crate::tree::compare::compare;
use crate::tree::copy::deep_copy;
use crate::tree::{Arena, Node, NodeId};
use crate::typing::semantic_type;

/// Options of [`sort`].
#[derive(Clone, Copy, Debug)]
pub struct SortOptions {
    /// Recurse into children before sorting a node.
    pub sort_children: bool,
    /// Also reorder port/parameter/template bindings against formals.
    pub sort_parameters: bool,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            sort_children: true,
            sort_parameters: false,
        }
    }
}

/// Which binding list of an owner to reorder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterList {
    Ports,
    Arguments,
    TemplateArguments,
}

/// What to do about formals with no matching actual.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortMissingKind {
    /// Leave them missing.
    Nothing,
    /// Materialize every missing actual from the formal's default value.
    All,
}

/// Sort the subtree rooted at `id`. Returns true when anything moved.
pub fn sort(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    id: NodeId,
    opts: SortOptions,
) -> bool {
    let mut changed = false;
    if opts.sort_children {
        for child in arena.children(id) {
            changed |= sort(arena, sem, child, opts);
        }
    }
    changed |= sort_node(arena, sem, id, opts);
    changed
}

fn sort_node(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    id: NodeId,
    opts: SortOptions,
) -> bool {
    match arena.node(id).clone() {
        Node::Aggregate(agg) => sort_list(arena, id, &agg.alts, |n| match n {
            Node::Aggregate(a) => &mut a.alts,
            _ => unreachable!("sorting aggregate"),
        }),
        Node::With(w) => sort_list(arena, id, &w.alts, |n| match n {
            Node::With(x) => &mut x.alts,
            _ => unreachable!("sorting with"),
        }),
        Node::Expression(_) => sort_expression(arena, sem, id),
        Node::Instance(inst) if opts.sort_parameters => {
            let Some(view) = crate::resolve::get_declaration(arena, sem, id) else {
                return false;
            };
            let formals = match arena.node(view) {
                Node::View(v) => match v.entity {
                    Some(entity) => match arena.node(entity) {
                        Node::Entity(en) => en.ports.clone(),
                        _ => return false,
                    },
                    None => return false,
                },
                _ => return false,
            };
            let _ = inst;
            sort_parameters(
                arena,
                sem,
                id,
                &formals,
                ParameterList::Ports,
                SortMissingKind::Nothing,
            )
        }
        _ => false,
    }
}

fn sort_list(
    arena: &mut Arena,
    owner: NodeId,
    current: &[NodeId],
    pick: fn(&mut Node) -> &mut Vec<NodeId>,
) -> bool {
    let mut sorted = current.to_vec();
    sorted.sort_by(|&a, &b| compare(arena, a, b));
    if sorted == current {
        return false;
    }
    *pick(arena.node_mut(owner)) = sorted;
    true
}

/// Commutative operands in ascending [`compare`] order — the one
/// canonicalization shared by the whole crate (the simplification driver
/// calls this too). A swap that stops the expression from typing is
/// refused.
pub(crate) fn sort_expression(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    id: NodeId,
) -> bool {
    let Node::Expression(e) = arena.node(id).clone() else {
        return false;
    };
    let Some(rhs) = e.rhs else {
        return false;
    };
    if !e.op.is_commutative() {
        return false;
    }
    if compare(arena, e.lhs, rhs) != std::cmp::Ordering::Greater {
        return false;
    }
    let typed_before = semantic_type(arena, sem, id).is_some();
    arena.swap_nodes(e.lhs, rhs);
    crate::typing::reset_types(arena, id, false);
    if typed_before && semantic_type(arena, sem, id).is_none() {
        // The swap broke typing; keep the original order.
        arena.swap_nodes(e.lhs, rhs);
        crate::typing::reset_types(arena, id, false);
        return false;
    }
    true
}

/// Reorder the actuals of `owner`'s binding list to match `formals`,
/// inserting defaulted missing actuals per `missing`.
pub fn sort_parameters(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    owner: NodeId,
    formals: &[NodeId],
    which: ParameterList,
    missing: SortMissingKind,
) -> bool {
    let list: Vec<NodeId> = match (arena.node(owner), which) {
        (Node::Instance(x), ParameterList::Ports) => x.port_assigns.clone(),
        (Node::FunctionCall(x), ParameterList::Arguments) => x.args.clone(),
        (Node::FunctionCall(x), ParameterList::TemplateArguments) => x.template_args.clone(),
        (Node::ProcedureCall(x), ParameterList::Arguments) => x.args.clone(),
        (Node::ProcedureCall(x), ParameterList::TemplateArguments) => x.template_args.clone(),
        (Node::ViewReference(x), ParameterList::TemplateArguments) => x.template_args.clone(),
        (Node::TypeReference(x), ParameterList::TemplateArguments) => x.template_args.clone(),
        _ => return false,
    };

    let mut ordered: Vec<NodeId> = Vec::with_capacity(formals.len());
    let mut leftovers = list.clone();
    let mut changed = false;
    for &formal in formals {
        let Some(formal_name) = arena.node(formal).name().cloned() else {
            continue;
        };
        let position = leftovers.iter().position(|&a| {
            arena.node(a).name().is_some_and(|n| *n == formal_name)
        });
        match position {
            Some(pos) => ordered.push(leftovers.remove(pos)),
            None => {
                if missing == SortMissingKind::All {
                    let default = match arena.node(formal).clone() {
                        Node::DataDeclaration(d) => d.init,
                        Node::TypeTp(t) => t.default,
                        _ => None,
                    };
                    let Some(default) = default else {
                        continue;
                    };
                    let value = deep_copy(arena, default);
                    let value =
                        crate::typing::assure_syntactic_type(arena, sem, value);
                    let assign = build_assign_for(arena, which, formal_name, value);
                    arena.claim(owner, assign);
                    ordered.push(assign);
                    changed = true;
                }
            }
        }
    }
    // Unknown actuals keep their relative order at the tail.
    ordered.extend(leftovers);
    if ordered != list {
        changed = true;
    }
    if !changed {
        return false;
    }
    match (arena.node_mut(owner), which) {
        (Node::Instance(x), ParameterList::Ports) => x.port_assigns = ordered,
        (Node::FunctionCall(x), ParameterList::Arguments) => x.args = ordered,
        (Node::FunctionCall(x), ParameterList::TemplateArguments) => {
            x.template_args = ordered;
        }
        (Node::ProcedureCall(x), ParameterList::Arguments) => x.args = ordered,
        (Node::ProcedureCall(x), ParameterList::TemplateArguments) => {
            x.template_args = ordered;
        }
        (Node::ViewReference(x), ParameterList::TemplateArguments) => {
            x.template_args = ordered;
        }
        (Node::TypeReference(x), ParameterList::TemplateArguments) => {
            x.template_args = ordered;
        }
        _ => return false,
    }
    true
}

fn build_assign_for(
    arena: &mut Arena,
    which: ParameterList,
    name: crate::base::Name,
    value: NodeId,
) -> NodeId {
    match which {
        ParameterList::Ports => arena.alloc(Node::PortAssign(
            crate::tree::action::PortAssign { name, value },
        )),
        ParameterList::Arguments => arena.alloc(Node::ParameterAssign(
            crate::tree::action::ParameterAssign { name, value },
        )),
        ParameterList::TemplateArguments => arena.alloc(Node::ValueTpAssign(
            crate::tree::action::ValueTpAssign { name, value },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::HifSemantics;
    use crate::tree::Operator;
    use crate::tree::build::Builder;
    use crate::tree::equals::equals_default;

    #[test]
    fn repeat_sort_is_a_no_op() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let z = b.identifier("z");
        let a = b.identifier("a");
        let e = b.binary(Operator::Plus, z, a);
        assert!(sort(&mut arena, &sem, e, SortOptions::default()));
        assert!(!sort(&mut arena, &sem, e, SortOptions::default()));
        let Node::Expression(expr) = arena.node(e).clone() else {
            panic!("expression expected");
        };
        assert_eq!(arena.node(expr.lhs).name().map(|n| n.as_str()), Some("a"));
    }

    #[test]
    fn commutative_operands_follow_the_total_order() {
        // Constant kinds rank after references in the total order, so
        // `1 + x` is descending and swaps, while `x + 1` already is
        // canonical.
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let c = b.int_val(1);
        let x = b.identifier("x");
        let e = b.binary(Operator::Plus, c, x);
        assert!(sort(&mut arena, &sem, e, SortOptions::default()));
        let Node::Expression(expr) = arena.node(e).clone() else {
            panic!("expression expected");
        };
        assert!(arena.node(expr.rhs.unwrap()).is_const_value());
        assert!(!sort(&mut arena, &sem, e, SortOptions::default()));
    }

    #[test]
    fn aggregate_alts_order_by_compare() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let v1 = b.int_val(10);
        let i1 = b.int_val(1);
        let alt1 = b.aggregate_alt(vec![i1], v1);
        let v0 = b.int_val(20);
        let i0 = b.int_val(0);
        let alt0 = b.aggregate_alt(vec![i0], v0);
        let agg = b.aggregate(vec![alt1, alt0], None);
        assert!(sort(&mut arena, &sem, agg, SortOptions::default()));
        let Node::Aggregate(a) = arena.node(agg).clone() else {
            panic!("aggregate expected");
        };
        assert_eq!(a.alts, vec![alt0, alt1]);
        // Values equal under equals compare zero: stability check.
        let copy0 = crate::tree::copy::deep_copy(&mut arena, alt0);
        assert!(equals_default(&arena, copy0, alt0));
        assert_eq!(
            crate::tree::compare::compare(&arena, copy0, alt0),
            std::cmp::Ordering::Equal
        );
    }
}
