//! Global-action lifting: each concurrent assignment becomes its own
//! one-state process, sensitive to the identifiers its right-hand side
//! reads. Procedure calls may remain in place only when they resolve to
//! MACRO-kind procedures.

use crate::base::NameTable;
use crate::diag::HifError;
use crate::semantics::LanguageSemantics;
use crate::tree::decl::{DataKind, SubFlavor};
use crate::tree::{Arena, Node, NodeId};

/// Lift every global-action assignment under `root` into a process.
/// Returns the created state tables.
pub fn transform_global_actions(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    root: NodeId,
    names: &mut NameTable,
    add_variables_in_sensitivity: bool,
) -> Result<Vec<NodeId>, HifError> {
    let mut created = Vec::new();
    let globals = crate::tree::nav::collect(arena, root, |n| {
        matches!(n, Node::GlobalAction(_))
    });
    for ga in globals.into_iter().rev() {
        let contents = arena
            .parent(ga)
            .filter(|&p| matches!(arena.node(p), Node::Contents(_)))
            .ok_or_else(|| {
                HifError::assertion("global action outside contents", Some(ga))
            })?;
        let Node::GlobalAction(g) = arena.node(ga).clone() else {
            continue;
        };
        for action in g.actions {
            match arena.node(action).clone() {
                Node::Assign(assign) => {
                    let st = lift_assign(
                        arena,
                        sem,
                        action,
                        &assign,
                        contents,
                        names,
                        add_variables_in_sensitivity,
                    );
                    created.push(st);
                }
                Node::ProcedureCall(_) => {
                    let decl = crate::resolve::get_declaration(arena, sem, action);
                    let is_macro = decl.is_some_and(|d| {
                        matches!(
                            arena.node(d),
                            Node::SubProgram(sp) if sp.flavor == SubFlavor::Macro
                        )
                    });
                    if !is_macro {
                        return Err(HifError::assertion(
                            "global procedure call must resolve to a MACRO procedure",
                            Some(action),
                        ));
                    }
                }
                _ => {
                    return Err(HifError::assertion(
                        "global actions other than assignments are not supported",
                        Some(action),
                    ));
                }
            }
        }
    }
    Ok(created)
}

fn lift_assign(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    action: NodeId,
    assign: &crate::tree::action::Assign,
    contents: NodeId,
    names: &mut NameTable,
    add_variables_in_sensitivity: bool,
) -> NodeId {
    let sensitivity = collect_sensitivity(
        arena,
        sem,
        assign.source,
        add_variables_in_sensitivity,
    );

    // Detach the assignment and re-home it inside a fresh process.
    arena.detach(action);
    let process_name = names.fresh("globact_process");
    let state_name = names.fresh("state");
    let mut b = crate::tree::build::Builder::new(arena);
    let state = b.state(state_name, vec![action]);
    let st = b.arena.alloc(Node::StateTable(crate::tree::action::StateTable {
        name: process_name,
        flavor: crate::tree::action::ProcessFlavor::Method,
        sensitivity,
        declarations: Vec::new(),
        states: vec![state],
    }));
    arena.push_to_list(contents, st, |n| match n {
        Node::Contents(c) => &mut c.state_tables,
        _ => unreachable!("contents checked by caller"),
    });
    st
}

/// Identifiers read by `root` that denote signals, ports, or (optionally)
/// variables. Members and slices contribute only their root identifier.
pub(crate) fn collect_sensitivity(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    root: NodeId,
    add_variables: bool,
) -> Vec<NodeId> {
    let mut seen = indexmap::IndexSet::new();
    let hits = crate::tree::nav::collect(arena, root, |n| {
        matches!(n, Node::Identifier(_))
    });
    for hit in hits.into_iter().rev() {
        // Member/slice prefixes bottom out in an identifier, so whole
        // signals enter the list even for subrange reads.
        let Some(decl) = crate::resolve::get_declaration(arena, sem, hit) else {
            continue;
        };
        let Node::DataDeclaration(d) = arena.node(decl).clone() else {
            continue;
        };
        let wanted = match d.kind {
            DataKind::Signal | DataKind::Port(_) => true,
            DataKind::Variable => add_variables,
            _ => false,
        };
        if wanted {
            seen.insert(d.name);
        }
    }
    let mut out = Vec::new();
    for name in seen {
        out.push(crate::tree::build::Builder::new(arena).identifier(name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::NameTable;
    use crate::semantics::HifSemantics;
    use crate::tree::build::Builder;
    use crate::tree::decl::*;

    fn system_with_global_assign(arena: &mut Arena) -> (NodeId, NodeId) {
        let mut b = Builder::new(arena);
        let bit = b.bit_type(true, true);
        let a = b.signal("a", bit, None);
        let bit2 = b.bit_type(true, true);
        let c = b.signal("c", bit2, None);
        let target = b.identifier("a");
        let src = b.identifier("c");
        let assign = b.assign(target, src);
        let ga = b.arena.alloc(Node::GlobalAction(
            crate::tree::action::GlobalAction {
                actions: vec![assign],
            },
        ));
        let contents = b.arena.alloc(Node::Contents(Contents {
            libraries: vec![],
            declarations: vec![a, c],
            instances: vec![],
            state_tables: vec![],
            generates: vec![],
            global_action: Some(ga),
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
        (sys, contents)
    }

    #[test]
    fn assign_moves_into_fresh_process_with_rhs_sensitivity() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut names = NameTable::new();
        let (sys, contents) = system_with_global_assign(&mut arena);
        let created =
            transform_global_actions(&mut arena, &sem, sys, &mut names, false).unwrap();
        assert_eq!(created.len(), 1);
        let Node::Contents(c) = arena.node(contents).clone() else {
            panic!("contents expected");
        };
        assert_eq!(c.state_tables.len(), 1);
        let Node::StateTable(st) = arena.node(c.state_tables[0]).clone() else {
            panic!("state table expected");
        };
        assert_eq!(st.name, "globact_process");
        assert_eq!(st.sensitivity.len(), 1);
        assert_eq!(
            arena.node(st.sensitivity[0]).name().map(|n| n.as_str()),
            Some("c")
        );
        // The lifted assign lives in the single state now.
        let Node::State(state) = arena.node(st.states[0]).clone() else {
            panic!("state expected");
        };
        assert_eq!(state.actions.len(), 1);
        let Node::GlobalAction(g) = arena.node(c.global_action.unwrap()).clone() else {
            panic!("global action expected");
        };
        assert!(g.actions.is_empty());
    }
}
