//! Name substitution: constants, defines, parameters, and template
//! parameters fold into their values; typedef references unfold; pure
//! single-return functions inline.

use crate::simplify::Simplifier;
use crate::tree::copy::deep_copy;
use crate::tree::decl::{DataKind, SubKind};
use crate::tree::{Arena, Node, NodeId, NodeKind, Operator};

impl Simplifier<'_> {
    /// Substitute a symbol with its declared value when the options allow
    /// it. Applies to identifiers and symbol-bearing references.
    pub(crate) fn simplify_names(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        if arena.kind(id) != NodeKind::Identifier {
            return false;
        }
        // Targets keep their name: writing into a substituted constant is
        // meaningless.
        if crate::tree::nav::is_in_left_hand_side(arena, id) {
            return false;
        }
        // An explicit context overrides the symbol's own scope chain.
        let resolve_opts = crate::resolve::GetDeclarationOptions {
            location: self.opts.context,
            ..Default::default()
        };
        let Some(decl) =
            crate::resolve::get_declaration_with(arena, self.sem, id, resolve_opts)
        else {
            return false;
        };
        if let Some(root) = self.opts.root {
            if !crate::tree::nav::is_sub_node(arena, decl, root) {
                return false;
            }
        }
        let Node::DataDeclaration(d) = arena.node(decl).clone() else {
            return false;
        };
        let allowed = match d.kind {
            DataKind::Const => self.opts.simplify_constants,
            DataKind::Define => self.opts.simplify_defines,
            DataKind::Parameter(_) => self.opts.simplify_parameters,
            DataKind::ValueTp { is_ctc } => {
                self.opts.simplify_template_parameters
                    && if is_ctc {
                        self.opts.simplify_ctc_template_parameters
                    } else {
                        self.opts.simplify_non_ctc_template_parameters
                    }
            }
            _ => false,
        };
        if !allowed {
            return false;
        }
        let Some(init) = d.init else {
            return false;
        };
        // Self-referential initializers never terminate.
        if crate::tree::nav::is_sub_node(arena, id, decl) {
            return false;
        }
        let value = deep_copy(arena, init);
        let value = crate::typing::assure_syntactic_type(arena, self.sem, value);
        self.replace(arena, id, value);
        self.visit(arena, value);
        true
    }

    /// `record_value.field` selects the field's value.
    pub(crate) fn simplify_record_value_field(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::FieldReference(fr) = arena.node(id).clone() else {
            return false;
        };
        let Node::RecordValue(rv) = arena.node(fr.prefix).clone() else {
            return false;
        };
        for &alt in &rv.alts {
            let Node::RecordValueAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            if a.field == fr.field {
                let value = deep_copy(arena, a.value);
                self.replace(arena, id, value);
                self.visit(arena, value);
                return true;
            }
        }
        false
    }

    // ========================================================================
    // CALLS
    // ========================================================================

    pub(crate) fn visit_function_call(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_iterated_concat(arena, id) {
            return;
        }
        let _ = self.simplify_function_call_inline(arena, id);
    }

    /// Inline a pure function whose body reduces to a single `return` of
    /// an expression over its parameters.
    fn simplify_function_call_inline(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        if !self.opts.simplify_functioncalls {
            return false;
        }
        let Node::FunctionCall(fc) = arena.node(id).clone() else {
            return false;
        };
        let Some(decl) = crate::resolve::get_declaration(arena, self.sem, id) else {
            return false;
        };
        let Node::SubProgram(sp) = arena.node(decl).clone() else {
            return false;
        };
        if !matches!(sp.kind, SubKind::Function { .. }) {
            return false;
        }
        let Some(state_table) = sp.state_table else {
            return false;
        };
        let Node::StateTable(st) = arena.node(state_table).clone() else {
            return false;
        };
        if st.states.len() != 1 || !st.declarations.is_empty() {
            return false;
        }
        let Node::State(state) = arena.node(st.states[0]).clone() else {
            return false;
        };
        if state.actions.len() != 1 {
            return false;
        }
        let Node::Return(ret) = arena.node(state.actions[0]).clone() else {
            return false;
        };
        let Some(ret_value) = ret.value else {
            return false;
        };

        // Bind formals to actuals by name.
        let mut bindings: Vec<(crate::base::Name, NodeId)> = Vec::new();
        for &arg in &fc.args {
            let Node::ParameterAssign(pa) = arena.node(arg).clone() else {
                return false;
            };
            bindings.push((pa.name, pa.value));
        }
        for &param in &sp.params {
            let Node::DataDeclaration(p) = arena.node(param).clone() else {
                return false;
            };
            if !bindings.iter().any(|(n, _)| *n == p.name) {
                // A missing actual falls back to the declared default.
                let Some(default) = p.init else {
                    return false;
                };
                bindings.push((p.name, default));
            }
        }

        let body = deep_copy(arena, ret_value);
        for (name, actual) in bindings {
            let hits = crate::tree::nav::collect(arena, body, |n| {
                matches!(n, Node::Identifier(i) if i.name == name)
            });
            for hit in hits {
                if !arena.is_alive(hit) {
                    continue;
                }
                let replacement = deep_copy(arena, actual);
                arena.replace(hit, replacement);
                arena.free_subtree(hit);
            }
        }
        self.replace(arena, id, body);
        self.visit(arena, body);
        true
    }

    /// `replicate(n, v)` with a literal count expands into an explicit
    /// concat chain.
    fn simplify_iterated_concat(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::FunctionCall(fc) = arena.node(id).clone() else {
            return false;
        };
        if fc.name != "hif_verilog_iterated_concat" || fc.args.len() != 2 {
            return false;
        }
        let arg_value = |arena: &Arena, arg: NodeId| match arena.node(arg) {
            Node::ParameterAssign(pa) => Some(pa.value),
            _ => None,
        };
        let (Some(count_arg), Some(value_arg)) = (
            arg_value(arena, fc.args[0]),
            arg_value(arena, fc.args[1]),
        ) else {
            return false;
        };
        let Some(count) = arena.int_value(count_arg) else {
            return false;
        };
        if count < 1 || count > 64 {
            return false;
        }
        let mut result = deep_copy(arena, value_arg);
        for _ in 1..count {
            let piece = deep_copy(arena, value_arg);
            result = crate::tree::build::Builder::new(arena)
                .binary(Operator::Concat, result, piece);
        }
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    // ========================================================================
    // TYPE REFERENCES
    // ========================================================================

    /// Unfold a typedef reference to its base type.
    pub(crate) fn visit_type_reference(&mut self, arena: &mut Arena, id: NodeId) {
        if !self.opts.simplify_typereferences {
            return;
        }
        let Some(decl) = crate::resolve::get_declaration(arena, self.sem, id) else {
            return;
        };
        let Node::TypeDef(td) = arena.node(decl).clone() else {
            return;
        };
        if td.opaque || !td.template_params.is_empty() {
            return;
        }
        let base = deep_copy(arena, td.ty);
        self.replace(arena, id, base);
        self.visit(arena, base);
    }
}
