//! Shared test fixture: a minimal design
//! (`system / design unit / view / contents / process`) with helpers to
//! declare data and add process actions.
//!
//! Each integration test binary compiles its own copy; not every binary
//! touches every helper.
#![allow(dead_code)]

use hif::tree::build::Builder;
use hif::tree::decl::{Contents, DataKind, DesignUnit, System, View, ViewStyle};
use hif::tree::{Arena, Node, NodeId};

pub struct Fixture {
    pub arena: Arena,
    pub system: NodeId,
    pub contents: NodeId,
    pub process: NodeId,
    pub state: NodeId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let state = b.state("p", vec![]);
        let process = b.arena.alloc(Node::StateTable(
            hif::tree::action::StateTable {
                name: "p".into(),
                flavor: hif::tree::action::ProcessFlavor::Method,
                sensitivity: vec![],
                declarations: vec![],
                states: vec![state],
            },
        ));
        let contents = b.arena.alloc(Node::Contents(Contents {
            libraries: vec![],
            declarations: vec![],
            instances: vec![],
            state_tables: vec![process],
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
            name: "top".into(),
            views: vec![view],
        }));
        let system = b.arena.alloc(Node::System(System {
            name: "sys".into(),
            library_defs: vec![],
            design_units: vec![du],
            declarations: vec![],
        }));
        Self {
            arena,
            system,
            contents,
            process,
            state,
        }
    }

    fn declare(&mut self, name: &str, ty: NodeId, kind: DataKind) -> NodeId {
        let decl = Builder::new(&mut self.arena).data_declaration(kind, name, ty, None);
        self.arena.push_to_list(self.contents, decl, |n| match n {
            Node::Contents(c) => &mut c.declarations,
            _ => unreachable!("contents"),
        });
        decl
    }

    pub fn declare_int32(&mut self, name: &str) -> NodeId {
        let ty = Builder::new(&mut self.arena).int32_type();
        self.declare(name, ty, DataKind::Variable)
    }

    pub fn declare_bool(&mut self, name: &str) -> NodeId {
        let ty = Builder::new(&mut self.arena).bool_type();
        self.declare(name, ty, DataKind::Variable)
    }

    pub fn declare_bit(&mut self, name: &str, logic: bool) -> NodeId {
        let ty = Builder::new(&mut self.arena).bit_type(logic, logic);
        self.declare(name, ty, DataKind::Variable)
    }

    pub fn declare_signal_bitvector(&mut self, name: &str, width: i64) -> NodeId {
        let mut b = Builder::new(&mut self.arena);
        let span = b.downto(width - 1, 0);
        let ty = b.bitvector_type(span, true, false);
        self.declare(name, ty, DataKind::Signal)
    }

    pub fn declare_bitvector(&mut self, name: &str, width: i64) -> NodeId {
        let mut b = Builder::new(&mut self.arena);
        let span = b.downto(width - 1, 0);
        let ty = b.bitvector_type(span, true, false);
        self.declare(name, ty, DataKind::Variable)
    }

    pub fn declare_int_array(&mut self, name: &str, len: i64) -> NodeId {
        let mut b = Builder::new(&mut self.arena);
        let span = b.downto(len - 1, 0);
        let elem = b.int32_type();
        let ty = b.array_type(span, elem, false);
        self.declare(name, ty, DataKind::Variable)
    }

    pub fn declare_bit_array(&mut self, name: &str, len: i64) -> NodeId {
        let mut b = Builder::new(&mut self.arena);
        let span = b.downto(len - 1, 0);
        let elem = b.bit_type(true, true);
        let ty = b.array_type(span, elem, false);
        self.declare(name, ty, DataKind::Variable)
    }

    pub fn add_action(&mut self, action: NodeId) {
        self.arena.push_to_list(self.state, action, |n| match n {
            Node::State(s) => &mut s.actions,
            _ => unreachable!("state"),
        });
    }

    /// `target := source` appended to the process.
    pub fn assign(&mut self, target: NodeId, source: NodeId) -> NodeId {
        let assign = Builder::new(&mut self.arena).assign(target, source);
        self.add_action(assign);
        assign
    }

    pub fn builder(&mut self) -> Builder<'_> {
        Builder::new(&mut self.arena)
    }
}

/// Walk the tree from `root`, asserting single-parent ownership: every
/// reachable node is alive, reached exactly once, and its children point
/// back at it.
pub fn assert_ownership_integrity(arena: &Arena, root: NodeId) {
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        assert!(arena.is_alive(id), "reachable node {id:?} is dead");
        assert!(seen.insert(id), "node {id:?} reached twice from the root");
        for child in arena.children(id) {
            assert_eq!(
                arena.parent(child),
                Some(id),
                "child {child:?} does not point back at its owner {id:?}"
            );
            stack.push(child);
        }
    }
}
