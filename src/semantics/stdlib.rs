//! Standard library blueprints.
//!
//! Front-ends resolve VHDL/Verilog builtins against these canonical
//! library definitions; the edge-lowering pass materializes the SystemC
//! support library through the same entry point. Each call builds a fresh
//! parentless `LibraryDef` the caller inserts into the system.

use crate::tree::build::Builder;
use crate::tree::decl::{
    DataDeclaration, DataKind, LibraryDef, PortDirection, SubFlavor, SubKind, SubProgram,
};
use crate::tree::{Arena, Node, NodeId};

/// VHDL `standard`: `last_value` and `event` attributes as functions.
pub const VHDL_STANDARD: &str = "hif_vhdl_standard";
/// VHDL `ieee.std_logic_1164`: `rising_edge`/`falling_edge`.
pub const VHDL_1164: &str = "hif_vhdl_ieee_std_logic_1164";
/// SystemC support library carrying `hif_lastValue`.
pub const SYSTEMC_EXTENSIONS: &str = "hif_systemc_hif_systemc_extensions";

/// Build the standard library `name`, or `None` for an unknown name.
pub fn build_standard_library(arena: &mut Arena, name: &str) -> Option<NodeId> {
    match name {
        VHDL_STANDARD => Some(build_vhdl_standard(arena)),
        VHDL_1164 => Some(build_vhdl_1164(arena)),
        SYSTEMC_EXTENSIONS => Some(build_systemc_extensions(arena)),
        _ => None,
    }
}

fn logic_bit(arena: &mut Arena) -> NodeId {
    Builder::new(arena).bit_type(true, true)
}

fn bool_ret(arena: &mut Arena) -> NodeId {
    Builder::new(arena).bool_type()
}

fn unary_function(
    arena: &mut Arena,
    name: &str,
    param_ty: NodeId,
    ret: NodeId,
) -> NodeId {
    let param = arena.alloc(Node::DataDeclaration(DataDeclaration {
        name: "param1".into(),
        ty: param_ty,
        init: None,
        kind: DataKind::Parameter(PortDirection::In),
    }));
    arena.alloc(Node::SubProgram(SubProgram {
        name: name.into(),
        kind: SubKind::Function { ret },
        flavor: SubFlavor::Ordinary,
        template_params: Vec::new(),
        params: vec![param],
        state_table: None,
    }))
}

fn build_vhdl_standard(arena: &mut Arena) -> NodeId {
    let bit1 = logic_bit(arena);
    let bit_ret = logic_bit(arena);
    let last_value = unary_function(arena, "hif_vhdl_last_value", bit1, bit_ret);
    let bit2 = logic_bit(arena);
    let bool1 = bool_ret(arena);
    let event = unary_function(arena, "hif_vhdl_event", bit2, bool1);
    arena.alloc(Node::LibraryDef(LibraryDef {
        name: VHDL_STANDARD.into(),
        declarations: vec![last_value, event],
        standard: true,
    }))
}

fn build_vhdl_1164(arena: &mut Arena) -> NodeId {
    let bit1 = logic_bit(arena);
    let bool1 = bool_ret(arena);
    let rising = unary_function(arena, "hif_vhdl_rising_edge", bit1, bool1);
    let bit2 = logic_bit(arena);
    let bool2 = bool_ret(arena);
    let falling = unary_function(arena, "hif_vhdl_falling_edge", bit2, bool2);
    arena.alloc(Node::LibraryDef(LibraryDef {
        name: VHDL_1164.into(),
        declarations: vec![rising, falling],
        standard: true,
    }))
}

fn build_systemc_extensions(arena: &mut Arena) -> NodeId {
    // hif_lastValue(current, last, prev) -> logic bit
    let mut params = Vec::new();
    for pname in ["param1", "param2", "param3"] {
        let ty = logic_bit(arena);
        params.push(arena.alloc(Node::DataDeclaration(DataDeclaration {
            name: pname.into(),
            ty,
            init: None,
            kind: DataKind::Parameter(PortDirection::In),
        })));
    }
    let ret = logic_bit(arena);
    let last_value = arena.alloc(Node::SubProgram(SubProgram {
        name: "hif_systemc_hif_lastValue".into(),
        kind: SubKind::Function { ret },
        flavor: SubFlavor::Ordinary,
        template_params: Vec::new(),
        params,
        state_table: None,
    }));
    arena.alloc(Node::LibraryDef(LibraryDef {
        name: SYSTEMC_EXTENSIONS.into(),
        declarations: vec![last_value],
        standard: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_libraries_build() {
        let mut arena = Arena::new();
        for name in [VHDL_STANDARD, VHDL_1164, SYSTEMC_EXTENSIONS] {
            let lib = build_standard_library(&mut arena, name).expect("known library");
            match arena.node(lib) {
                Node::LibraryDef(l) => {
                    assert!(l.standard);
                    assert!(!l.declarations.is_empty());
                }
                other => panic!("expected library def, got {other:?}"),
            }
        }
        assert!(build_standard_library(&mut arena, "no_such_library").is_none());
    }
}
