//! Top-level module discovery over 0/1/many candidates and the
//! `check_at_most_one` / `check_at_least_one` contracts.

use hif::HifError;
use hif::manip::{FindTopOptions, find_top_level_module, find_top_level_modules};
use hif::semantics::HifSemantics;
use hif::tree::build::Builder;
use hif::tree::decl::{Contents, DesignUnit, System, View, ViewStyle};
use hif::tree::{Arena, Node, NodeId};

/// A design unit with one view whose contents hold a single declaration
/// (so the view is not an empty component shell).
fn add_module(arena: &mut Arena, system: NodeId, name: &str) -> NodeId {
    let mut b = Builder::new(arena);
    let ty = b.bit_type(true, true);
    let sig = b.signal("keep", ty, None);
    let contents = b.arena.alloc(Node::Contents(Contents {
        libraries: vec![],
        declarations: vec![sig],
        instances: vec![],
        state_tables: vec![],
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
        name: name.into(),
        views: vec![view],
    }));
    arena.push_to_list(system, du, |n| match n {
        Node::System(s) => &mut s.design_units,
        _ => unreachable!("system"),
    });
    view
}

/// Instantiate `child` (a design unit name) inside `parent_view`.
fn add_instance(arena: &mut Arena, parent_view: NodeId, child_du: &str) {
    let contents = match arena.node(parent_view) {
        Node::View(v) => v.contents.expect("view has contents"),
        _ => panic!("view expected"),
    };
    let mut b = Builder::new(arena);
    let vref = b.view_reference(child_du, "rtl");
    let inst = b.arena.alloc(Node::Instance(hif::tree::action::Instance {
        name: "u0".into(),
        referenced: vref,
        port_assigns: vec![],
    }));
    arena.push_to_list(contents, inst, |n| match n {
        Node::Contents(c) => &mut c.instances,
        _ => unreachable!("contents"),
    });
}

fn empty_system(arena: &mut Arena) -> NodeId {
    arena.alloc(Node::System(System {
        name: "sys".into(),
        library_defs: vec![],
        design_units: vec![],
        declarations: vec![],
    }))
}

#[test]
fn single_parentless_view_is_the_top() {
    let mut arena = Arena::new();
    let sem = HifSemantics;
    let system = empty_system(&mut arena);
    let top = add_module(&mut arena, system, "soc");
    let _child = add_module(&mut arena, system, "uart");
    add_instance(&mut arena, top, "uart");

    let found = find_top_level_module(&mut arena, &sem, system, &FindTopOptions::default())
        .expect("discovery succeeds");
    assert_eq!(found, Some(top));
}

#[test]
fn empty_system_raises_only_when_required() {
    let mut arena = Arena::new();
    let sem = HifSemantics;
    let system = empty_system(&mut arena);

    let relaxed = find_top_level_modules(&mut arena, &sem, system, &FindTopOptions::default())
        .expect("no check, no error");
    assert!(relaxed.is_empty());

    let strict = find_top_level_modules(
        &mut arena,
        &sem,
        system,
        &FindTopOptions {
            check_at_least_one: true,
            ..Default::default()
        },
    );
    assert!(matches!(strict, Err(HifError::NoTopLevel)));
}

#[test]
fn several_candidates_raise_only_when_required() {
    let mut arena = Arena::new();
    let sem = HifSemantics;
    let system = empty_system(&mut arena);
    let a = add_module(&mut arena, system, "a");
    let b = add_module(&mut arena, system, "b");

    let relaxed = find_top_level_modules(&mut arena, &sem, system, &FindTopOptions::default())
        .expect("no check, no error");
    assert_eq!(relaxed.len(), 2);
    assert!(relaxed.contains(&a) && relaxed.contains(&b));

    let strict = find_top_level_modules(
        &mut arena,
        &sem,
        system,
        &FindTopOptions {
            check_at_most_one: true,
            ..Default::default()
        },
    );
    assert!(matches!(strict, Err(HifError::AmbiguousTopLevel(2))));
}

#[test]
fn name_hint_selects_among_candidates() {
    let mut arena = Arena::new();
    let sem = HifSemantics;
    let system = empty_system(&mut arena);
    let a = add_module(&mut arena, system, "a");
    let b = add_module(&mut arena, system, "b");
    let _ = a;

    let named = find_top_level_modules(
        &mut arena,
        &sem,
        system,
        &FindTopOptions {
            top_level_name: Some("b".to_string()),
            ..Default::default()
        },
    )
    .expect("named discovery succeeds");
    assert_eq!(named, vec![b]);
}

#[test]
fn weight_heuristic_prefers_the_structured_candidate() {
    let mut arena = Arena::new();
    let sem = HifSemantics;
    let system = empty_system(&mut arena);
    let heavy = add_module(&mut arena, system, "heavy");
    let light = add_module(&mut arena, system, "light");
    let shared = add_module(&mut arena, system, "shared");
    // `heavy` instantiates `shared` (5 points per instance); both heavy
    // and light stay parentless.
    add_instance(&mut arena, heavy, "shared");
    let _ = (light, shared);

    let found = find_top_level_modules(
        &mut arena,
        &sem,
        system,
        &FindTopOptions {
            use_heuristics: true,
            ..Default::default()
        },
    )
    .expect("heuristic discovery succeeds");
    assert_eq!(found, vec![heavy]);
}

#[test]
fn component_shells_are_never_candidates() {
    let mut arena = Arena::new();
    let sem = HifSemantics;
    let system = empty_system(&mut arena);
    let real = add_module(&mut arena, system, "real");
    // A bare component: view without meaningful contents.
    let mut b = Builder::new(&mut arena);
    let contents = b.arena.alloc(Node::Contents(Contents {
        libraries: vec![],
        declarations: vec![],
        instances: vec![],
        state_tables: vec![],
        generates: vec![],
        global_action: None,
    }));
    let shell_view = b.arena.alloc(Node::View(View {
        name: "rtl".into(),
        entity: None,
        contents: Some(contents),
        template_params: vec![],
        standard: false,
        style: ViewStyle::Rtl,
    }));
    let du = b.arena.alloc(Node::DesignUnit(DesignUnit {
        name: "shell".into(),
        views: vec![shell_view],
    }));
    arena.push_to_list(system, du, |n| match n {
        Node::System(s) => &mut s.design_units,
        _ => unreachable!("system"),
    });

    let found = find_top_level_module(&mut arena, &sem, system, &FindTopOptions::default())
        .expect("discovery succeeds");
    assert_eq!(found, Some(real));
}
