//! Whole-design fixes: partial-write flattening, cross-process
//! multi-writer support signals, subrange sensitivity, edge lowering.

mod common;

use common::{Fixture, assert_ownership_integrity};
use hif::base::NameTable;
use hif::manip::{
    FixMultipleSignalPortAssignsOptions, LastValueOptions, fix_multiple_signal_port_assigns,
    map_last_value_to_systemc,
};
use hif::semantics::{HifSemantics, LanguageSemantics, stdlib};
use hif::tree::build::Builder;
use hif::tree::{Node, NodeId};

fn declaration_names(f: &Fixture) -> Vec<String> {
    let Node::Contents(c) = f.arena.node(f.contents).clone() else {
        panic!("contents expected");
    };
    c.declarations
        .iter()
        .filter_map(|&d| f.arena.node(d).name().map(|n| n.to_string()))
        .collect()
}

fn process_names(f: &Fixture) -> Vec<String> {
    let Node::Contents(c) = f.arena.node(f.contents).clone() else {
        panic!("contents expected");
    };
    c.state_tables
        .iter()
        .filter_map(|&p| f.arena.node(p).name().map(|n| n.to_string()))
        .collect()
}

/// A process writing a slice of a signal goes through a support variable
/// loaded at entry and flushed at the end.
#[test]
fn partial_writes_flatten_through_a_variable() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_signal_bitvector("s", 8);
    f.declare_bitvector("x", 4);
    let mut b = f.builder();
    let target_base = b.identifier("s");
    let span = b.downto(3, 0);
    let target = b.slice(target_base, span);
    let source = b.identifier("x");
    let assign = b.assign(target, source);
    f.add_action(assign);

    let mut names = NameTable::new();
    let opts = FixMultipleSignalPortAssignsOptions::default();
    let changed =
        fix_multiple_signal_port_assigns(&mut f.arena, &sem, f.system, &opts, &mut names)
            .expect("fix succeeds");
    assert!(changed);

    assert!(
        declaration_names(&f).iter().any(|n| n == "s_var"),
        "support variable declared next to the signal"
    );
    let Node::State(state) = f.arena.node(f.state).clone() else {
        panic!("state expected");
    };
    assert_eq!(state.actions.len(), 3, "load, partial write, flush");
    let Node::Assign(load) = f.arena.node(state.actions[0]).clone() else {
        panic!("entry load expected");
    };
    assert_eq!(
        f.arena.node(load.target).name().map(|n| n.as_str()),
        Some("s_var")
    );
    assert_eq!(
        f.arena.node(load.source).name().map(|n| n.as_str()),
        Some("s")
    );
    let Node::Assign(partial) = f.arena.node(state.actions[1]).clone() else {
        panic!("partial write expected");
    };
    let Node::Slice(sl) = f.arena.node(partial.target).clone() else {
        panic!("slice target expected");
    };
    assert_eq!(
        f.arena.node(sl.prefix).name().map(|n| n.as_str()),
        Some("s_var"),
        "the partial write goes through the variable"
    );
    let Node::Assign(flush) = f.arena.node(state.actions[2]).clone() else {
        panic!("flush expected");
    };
    assert_eq!(
        f.arena.node(flush.target).name().map(|n| n.as_str()),
        Some("s")
    );
    assert_eq!(
        f.arena.node(flush.source).name().map(|n| n.as_str()),
        Some("s_var")
    );
    assert_ownership_integrity(&f.arena, f.system);
}

/// Two processes writing one signal get a support signal and a single
/// composing updater, so at most one process writes the full value.
#[test]
fn cross_process_writers_merge_through_mspw() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_bit("x", true);
    let bit_ty = Builder::new(&mut f.arena).bit_type(true, true);
    let sig = Builder::new(&mut f.arena).signal("s", bit_ty, None);
    f.arena.push_to_list(f.contents, sig, |n| match n {
        Node::Contents(c) => &mut c.declarations,
        _ => unreachable!("contents"),
    });
    // First writer lives in the fixture process.
    let mut b = Builder::new(&mut f.arena);
    let t1 = b.identifier("s");
    let s1 = b.identifier("x");
    let a1 = b.assign(t1, s1);
    f.add_action(a1);
    // Second writer is its own process.
    let mut b = Builder::new(&mut f.arena);
    let t2 = b.identifier("s");
    let s2 = b.identifier("x");
    let a2 = b.assign(t2, s2);
    let p2 = b.process("q", vec![], vec![a2]);
    f.arena.push_to_list(f.contents, p2, |n| match n {
        Node::Contents(c) => &mut c.state_tables,
        _ => unreachable!("contents"),
    });

    let mut names = NameTable::new();
    let opts = FixMultipleSignalPortAssignsOptions {
        fix_partial_writings: false,
        ..Default::default()
    };
    let changed =
        fix_multiple_signal_port_assigns(&mut f.arena, &sem, f.system, &opts, &mut names)
            .expect("fix succeeds");
    assert!(changed);

    assert!(
        declaration_names(&f).iter().any(|n| n == "s_mspw"),
        "support signal created"
    );
    assert!(
        process_names(&f).iter().any(|n| n.contains("_mspw_proc_tgt")),
        "single composing updater process created"
    );
    // Both original writers now target the support signal.
    for assign in [a1, a2] {
        let Node::Assign(a) = f.arena.node(assign).clone() else {
            panic!("assign expected");
        };
        assert_eq!(
            f.arena.node(a.target).name().map(|n| n.as_str()),
            Some("s_mspw")
        );
    }
    // The updater is the only writer of `s` itself.
    let writers: Vec<NodeId> = hif::tree::nav::collect(&f.arena, f.system, |n| {
        matches!(n, Node::Assign(_))
    })
    .into_iter()
    .filter(|&a| {
        let Node::Assign(asg) = f.arena.node(a).clone() else {
            return false;
        };
        f.arena.node(asg.target).name().is_some_and(|n| n == "s")
    })
    .collect();
    assert_eq!(writers.len(), 1, "exactly one full writer of s remains");
    assert_ownership_integrity(&f.arena, f.system);
}

/// Subrange sensitivity entries normalize to whole signals when asked.
#[test]
fn subrange_sensitivity_normalizes_to_whole_signal() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_signal_bitvector("s", 8);
    let mut b = f.builder();
    let prefix = b.identifier("s");
    let zero = b.int_val(0);
    let entry = b.member(prefix, zero);
    f.arena.push_to_list(f.process, entry, |n| match n {
        Node::StateTable(st) => &mut st.sensitivity,
        _ => unreachable!("process"),
    });

    let mut names = NameTable::new();
    let opts = FixMultipleSignalPortAssignsOptions {
        fix_subranges_in_sensitivity: true,
        fix_multiple_writings: false,
        fix_partial_writings: false,
    };
    fix_multiple_signal_port_assigns(&mut f.arena, &sem, f.system, &opts, &mut names)
        .expect("fix succeeds");

    let Node::StateTable(st) = f.arena.node(f.process).clone() else {
        panic!("process expected");
    };
    assert_eq!(st.sensitivity.len(), 1);
    assert_eq!(
        f.arena.node(st.sensitivity[0]).name().map(|n| n.as_str()),
        Some("s"),
        "the member entry became the whole signal"
    );
    assert_ownership_integrity(&f.arena, f.system);
}

/// A slice in a sensitivity list (without the subrange option) gets a
/// mirror signal and an updater process.
#[test]
fn sensitivity_subrange_gets_mspw_mirror() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    f.declare_signal_bitvector("s", 8);
    let mut b = f.builder();
    let prefix = b.identifier("s");
    let zero = b.int_val(0);
    let entry = b.member(prefix, zero);
    f.arena.push_to_list(f.process, entry, |n| match n {
        Node::StateTable(st) => &mut st.sensitivity,
        _ => unreachable!("process"),
    });

    let mut names = NameTable::new();
    let opts = FixMultipleSignalPortAssignsOptions {
        fix_partial_writings: false,
        ..Default::default()
    };
    fix_multiple_signal_port_assigns(&mut f.arena, &sem, f.system, &opts, &mut names)
        .expect("fix succeeds");

    assert!(declaration_names(&f).iter().any(|n| n == "s_mspw"));
    assert!(
        process_names(&f).iter().any(|n| n.contains("_mspw_proc_src")),
        "mirror updater created"
    );
    assert_ownership_integrity(&f.arena, f.system);
}

// ============================================================================
// EDGE LOWERING (S5)
// ============================================================================

/// `rising_edge(clk)` lowers to
/// `event(clk) && clk === '1' && last_value(clk) === '0'` with the
/// support library included.
#[test]
fn s5_rising_edge_lowers_to_last_value_form() {
    let mut f = Fixture::new();
    let sem = HifSemantics;
    // Standard libraries must be present for the lowering to engage.
    for lib_name in [stdlib::VHDL_STANDARD, stdlib::VHDL_1164] {
        let lib = sem
            .standard_library(&mut f.arena, lib_name)
            .expect("known library");
        f.arena.push_to_list(f.system, lib, |n| match n {
            Node::System(s) => &mut s.library_defs,
            _ => unreachable!("system"),
        });
    }
    let bit_ty = Builder::new(&mut f.arena).bit_type(true, true);
    let clk = Builder::new(&mut f.arena).signal("clk", bit_ty, None);
    f.arena.push_to_list(f.contents, clk, |n| match n {
        Node::Contents(c) => &mut c.declarations,
        _ => unreachable!("contents"),
    });
    f.declare_bool("fired");
    let mut b = f.builder();
    let clk_ref = b.identifier("clk");
    let arg = b.parameter_assign("param1", clk_ref);
    let edge = b.function_call("hif_vhdl_rising_edge", None, vec![arg]);
    let t = b.bool_val(true);
    let tgt = b.identifier("fired");
    let body = b.assign(tgt, t);
    let alt = b.arena.alloc(Node::IfAlt(hif::tree::action::IfAlt {
        condition: edge,
        actions: vec![body],
    }));
    let if_stmt = b.arena.alloc(Node::If(hif::tree::action::If {
        alts: vec![alt],
        default: vec![],
    }));
    f.add_action(if_stmt);

    let mut names = NameTable::new();
    let opts = LastValueOptions::default();
    let rewritten = map_last_value_to_systemc(&mut f.arena, f.system, &opts, &mut names);
    assert!(rewritten);

    // The condition is now a conjunction.
    let Node::IfAlt(alt_now) = f.arena.node(alt).clone() else {
        panic!("if alt expected");
    };
    let Node::Expression(cond) = f.arena.node(alt_now.condition).clone() else {
        panic!("lowered condition expected");
    };
    assert_eq!(cond.op, hif::tree::Operator::And);

    // The last_value call got its support arguments and library instance.
    let calls = hif::tree::nav::collect(&f.arena, f.system, |n| {
        matches!(n, Node::FunctionCall(fc) if fc.name == "hif_systemc_hif_lastValue")
    });
    assert_eq!(calls.len(), 1, "one mapped last_value call");
    let Node::FunctionCall(fc) = f.arena.node(calls[0]).clone() else {
        panic!("call expected");
    };
    assert_eq!(fc.args.len(), 3, "current value plus two support signals");
    assert!(fc.instance.is_some(), "library-qualified call");

    // Support declarations and the edge process appeared.
    let decls = declaration_names(&f);
    assert!(decls.iter().any(|n| n == "clk_last"));
    assert!(decls.iter().any(|n| n == "clk_prev"));
    assert!(process_names(&f).iter().any(|n| n.contains("clk_edge_process")));

    // The support library landed first in the system.
    let Node::System(sys) = f.arena.node(f.system).clone() else {
        panic!("system expected");
    };
    assert_eq!(
        f.arena.node(sys.library_defs[0]).name().map(|n| n.as_str()),
        Some(stdlib::SYSTEMC_EXTENSIONS)
    );
    assert_ownership_integrity(&f.arena, f.system);
}
