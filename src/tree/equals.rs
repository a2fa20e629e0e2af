//! Structural equality with configurable strictness.
//!
//! The default compares everything. Rewrites that only care about shape
//! relax individual aspects: constant-expression flags, signedness, spans,
//! children. Two nodes of different kinds are never equal, except for the
//! vector-type bridging enabled by `handle_vector_types`.

use crate::tree::{Arena, Node, NodeId, NodeKind};

/// Aspects checked by [`equals`].
#[derive(Clone, Copy, Debug)]
pub struct EqualsOptions {
    pub check_constexpr_flag: bool,
    pub check_signed_flag: bool,
    pub check_resolved_flag: bool,
    pub check_logic_flag: bool,
    pub check_spans: bool,
    pub check_string_span: bool,
    /// Compare only kinds and names; used to deduplicate library includes.
    pub check_only_names: bool,
    /// Compare only this node, not the subtrees below it.
    pub skip_children: bool,
    /// Let `Bitvector`, `Signed` and `Unsigned` match each other.
    pub handle_vector_types: bool,
}

impl Default for EqualsOptions {
    fn default() -> Self {
        Self {
            check_constexpr_flag: true,
            check_signed_flag: true,
            check_resolved_flag: true,
            check_logic_flag: true,
            check_spans: true,
            check_string_span: true,
            check_only_names: false,
            skip_children: false,
            handle_vector_types: false,
        }
    }
}

/// Structural equality with default options.
pub fn equals_default(arena: &Arena, a: NodeId, b: NodeId) -> bool {
    equals(arena, a, b, EqualsOptions::default())
}

/// Structural equality under `opts`.
pub fn equals(arena: &Arena, a: NodeId, b: NodeId, opts: EqualsOptions) -> bool {
    if a == b {
        return true;
    }
    let na = arena.node(a);
    let nb = arena.node(b);

    let ka = na.kind();
    let kb = nb.kind();
    if ka != kb {
        if !(opts.handle_vector_types && is_vector_kind(ka) && is_vector_kind(kb)) {
            return false;
        }
    }

    if opts.check_only_names {
        return na.name() == nb.name();
    }

    if !headers_equal(na, nb, opts) {
        return false;
    }

    if opts.skip_children {
        return true;
    }

    let ca = equality_children(na, opts);
    let cb = equality_children(nb, opts);
    if ca.len() != cb.len() {
        return false;
    }
    ca.iter()
        .zip(cb.iter())
        .all(|(&x, &y)| equals(arena, x, y, opts))
}

fn is_vector_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::BitvectorT | NodeKind::SignedT | NodeKind::UnsignedT
    )
}

/// Non-child payload comparison.
fn headers_equal(a: &Node, b: &Node, opts: EqualsOptions) -> bool {
    use Node::*;
    match (a, b) {
        (BitVal(x), BitVal(y)) => x.value == y.value,
        (BitvectorVal(x), BitvectorVal(y)) => x.value == y.value,
        (BoolVal(x), BoolVal(y)) => x.value == y.value,
        (CharVal(x), CharVal(y)) => x.value == y.value,
        (IntVal(x), IntVal(y)) => x.value == y.value,
        (RealVal(x), RealVal(y)) => x.value == y.value,
        (StringVal(x), StringVal(y)) => x.value == y.value,
        (TimeVal(x), TimeVal(y)) => x.value == y.value && x.unit == y.unit,
        (Identifier(x), Identifier(y)) => x.name == y.name,
        (FieldReference(x), FieldReference(y)) => x.field == y.field,
        (Expression(x), Expression(y)) => x.op == y.op,
        (FunctionCall(x), FunctionCall(y)) => x.name == y.name,
        (RecordValueAlt(x), RecordValueAlt(y)) => x.field == y.field,
        (Range(x), Range(y)) => x.direction == y.direction,
        (BitT(x), BitT(y)) => {
            (!opts.check_logic_flag || x.logic == y.logic)
                && (!opts.check_resolved_flag || x.resolved == y.resolved)
                && (!opts.check_constexpr_flag || x.constexpr == y.constexpr)
        }
        (BoolT(x), BoolT(y)) => !opts.check_constexpr_flag || x.constexpr == y.constexpr,
        (CharT(x), CharT(y)) => !opts.check_constexpr_flag || x.constexpr == y.constexpr,
        (TimeT(x), TimeT(y)) => !opts.check_constexpr_flag || x.constexpr == y.constexpr,
        (IntT(x), IntT(y)) => {
            (!opts.check_signed_flag || x.signed == y.signed)
                && (!opts.check_constexpr_flag || x.constexpr == y.constexpr)
        }
        (RealT(x), RealT(y)) => !opts.check_constexpr_flag || x.constexpr == y.constexpr,
        (StringT(x), StringT(y)) => !opts.check_constexpr_flag || x.constexpr == y.constexpr,
        (BitvectorT(x), BitvectorT(y)) => {
            (!opts.check_signed_flag || x.signed == y.signed)
                && (!opts.check_logic_flag || x.logic == y.logic)
                && (!opts.check_resolved_flag || x.resolved == y.resolved)
                && (!opts.check_constexpr_flag || x.constexpr == y.constexpr)
        }
        (ArrayT(x), ArrayT(y)) => {
            (!opts.check_signed_flag || x.signed == y.signed)
                && (!opts.check_constexpr_flag || x.constexpr == y.constexpr)
        }
        (SignedT(x), SignedT(y)) => !opts.check_constexpr_flag || x.constexpr == y.constexpr,
        (UnsignedT(x), UnsignedT(y)) => !opts.check_constexpr_flag || x.constexpr == y.constexpr,
        (TypeReference(x), TypeReference(y)) => x.name == y.name,
        (ViewReference(x), ViewReference(y)) => {
            x.design_unit == y.design_unit && x.name == y.name
        }
        (DataDeclaration(x), DataDeclaration(y)) => x.name == y.name && x.kind == y.kind,
        (SubProgram(x), SubProgram(y)) => x.name == y.name && x.flavor == y.flavor,
        (TypeDef(x), TypeDef(y)) => x.name == y.name && x.opaque == y.opaque,
        (TypeTp(x), TypeTp(y)) => x.name == y.name,
        (Library(x), Library(y)) => {
            x.name == y.name && x.standard == y.standard && x.system == y.system
        }
        (LibraryDef(x), LibraryDef(y)) => x.name == y.name && x.standard == y.standard,
        (View(x), View(y)) => x.name == y.name && x.style == y.style,
        (Entity(x), Entity(y)) => x.name == y.name,
        (DesignUnit(x), DesignUnit(y)) => x.name == y.name,
        (System(x), System(y)) => x.name == y.name,
        (While(x), While(y)) => x.do_while == y.do_while && x.label == y.label,
        (For(x), For(y)) => x.label == y.label,
        (Break(x), Break(y)) => x.label == y.label,
        (Continue(x), Continue(y)) => x.label == y.label,
        (ProcedureCall(x), ProcedureCall(y)) => x.name == y.name,
        (StateTable(x), StateTable(y)) => x.name == y.name && x.flavor == y.flavor,
        (State(x), State(y)) => x.name == y.name,
        (Transition(x), Transition(y)) => {
            x.name == y.name && x.prev_state == y.prev_state && x.next_state == y.next_state
        }
        (Instance(x), Instance(y)) => x.name == y.name,
        (ForGenerate(x), ForGenerate(y)) => x.label == y.label,
        (IfGenerate(x), IfGenerate(y)) => x.label == y.label,
        (PortAssign(x), PortAssign(y)) => x.name == y.name,
        (ParameterAssign(x), ParameterAssign(y)) => x.name == y.name,
        (ValueTpAssign(x), ValueTpAssign(y)) => x.name == y.name,
        (TypeTpAssign(x), TypeTpAssign(y)) => x.name == y.name,
        // Same kind, no payload beyond children.
        _ => a.kind() == b.kind() || (a.is_type() && b.is_type()),
    }
}

/// Children that participate in equality under `opts` (spans may be
/// excluded).
fn equality_children(node: &Node, opts: EqualsOptions) -> Vec<NodeId> {
    use Node::*;
    if !opts.check_spans {
        match node {
            IntT(_) | RealT(_) | BitvectorT(_) | SignedT(_) | UnsignedT(_) => return Vec::new(),
            ArrayT(x) => return vec![x.element],
            StringT(_) => return Vec::new(),
            _ => {}
        }
    }
    if !opts.check_string_span {
        if let StringT(_) = node {
            return Vec::new();
        }
    }
    node.children()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Operator;
    use crate::tree::build::Builder;

    #[test]
    fn equal_expressions_compare_equal() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let e1 = {
            let x = b.identifier("x");
            let c = b.int_val(4);
            b.binary(Operator::Plus, x, c)
        };
        let e2 = {
            let x = b.identifier("x");
            let c = b.int_val(4);
            b.binary(Operator::Plus, x, c)
        };
        let e3 = {
            let x = b.identifier("x");
            let c = b.int_val(5);
            b.binary(Operator::Plus, x, c)
        };
        assert!(equals_default(&arena, e1, e2));
        assert!(!equals_default(&arena, e1, e3));
    }

    #[test]
    fn skip_children_compares_headers_only() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let e1 = {
            let x = b.identifier("x");
            let c = b.int_val(4);
            b.binary(Operator::Plus, x, c)
        };
        let e2 = {
            let y = b.identifier("y");
            let c = b.int_val(9);
            b.binary(Operator::Plus, y, c)
        };
        let opts = EqualsOptions {
            skip_children: true,
            ..Default::default()
        };
        assert!(equals(&arena, e1, e2, opts));
    }

    #[test]
    fn constexpr_flag_can_be_ignored() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let t1 = b.bool_type();
        let t2 = b.bool_type();
        if let Node::BoolT(x) = arena.node_mut(t2) {
            x.constexpr = true;
        }
        assert!(!equals_default(&arena, t1, t2));
        let opts = EqualsOptions {
            check_constexpr_flag: false,
            ..Default::default()
        };
        assert!(equals(&arena, t1, t2, opts));
    }
}
