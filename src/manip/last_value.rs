//! Edge-expression lowering for SystemC back-ends.
//!
//! `rising_edge(x)` / `falling_edge(x)` lower into
//! `event(x) && x === '1' && last_value(x) === '0'` (dually for falling),
//! and `last_value(x)` maps either onto the support-library call
//! `hif_lastValue(x, x_last, x_prev)` — with the two support variables and
//! a one-state edge process per signal — or onto a small generated
//! function when inlining is requested.

use indexmap::IndexMap;

use crate::base::NameTable;
use crate::semantics::stdlib;
use crate::semantics::{HifSemantics, LanguageSemantics};
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::value::BitConstant;
use crate::tree::{Arena, Node, NodeId, NodeKind, Operator};

/// Options of [`map_last_value_to_systemc`].
#[derive(Clone, Copy, Debug)]
pub struct LastValueOptions {
    /// Lower `rising_edge`/`falling_edge` into last-value form first.
    pub replace_rising_falling_edge: bool,
    /// Generate a per-declaration function instead of the library call.
    pub inline_last_value: bool,
}

impl Default for LastValueOptions {
    fn default() -> Self {
        Self {
            replace_rising_falling_edge: true,
            inline_last_value: false,
        }
    }
}

/// Per-declaration support names created by the pass.
struct SupportNames {
    last: crate::base::Name,
    prev: crate::base::Name,
    function: crate::base::Name,
}

/// Lower edge expressions under `system`. Returns true when anything was
/// rewritten.
pub fn map_last_value_to_systemc(
    arena: &mut Arena,
    system: NodeId,
    opts: &LastValueOptions,
    names: &mut NameTable,
) -> bool {
    let sem = HifSemantics;

    // The VHDL standard library must be present: `last_value` is its
    // attribute.
    let Some(_std_lib) = find_library_def(arena, system, stdlib::VHDL_STANDARD) else {
        return false;
    };
    let has_1164 = find_library_def(arena, system, stdlib::VHDL_1164).is_some();

    // Lower rising/falling edges to last-value form.
    let mut last_value_calls: Vec<NodeId> = Vec::new();
    if opts.replace_rising_falling_edge && has_1164 {
        let edges = crate::tree::nav::collect(arena, system, |n| {
            matches!(
                n,
                Node::FunctionCall(fc)
                    if fc.name == "hif_vhdl_rising_edge" || fc.name == "hif_vhdl_falling_edge"
            )
        });
        for call in edges.into_iter().rev() {
            let Node::FunctionCall(fc) = arena.node(call).clone() else {
                continue;
            };
            let rising = fc.name == "hif_vhdl_rising_edge";
            if let Some(lowered) = lower_edge(arena, &sem, call, rising) {
                last_value_calls.push(lowered);
            }
        }
    }

    // Collect pre-existing last_value calls.
    let existing = crate::tree::nav::collect(arena, system, |n| {
        matches!(n, Node::FunctionCall(fc) if fc.name == "hif_vhdl_last_value")
    });
    for call in existing.into_iter().rev() {
        if !last_value_calls.contains(&call) {
            last_value_calls.push(call);
        }
    }

    let mut rewritten = false;
    let mut supports: IndexMap<NodeId, SupportNames> = IndexMap::new();
    for call in last_value_calls {
        if !arena.is_alive(call) {
            continue;
        }
        rewritten |= fix_last_value_call(arena, &sem, call, opts, names, &mut supports);
    }

    // The support library rides along unless everything was inlined.
    if rewritten && !opts.inline_last_value {
        if find_library_def(arena, system, stdlib::SYSTEMC_EXTENSIONS).is_none() {
            if let Some(lib) = sem.standard_library(arena, stdlib::SYSTEMC_EXTENSIONS) {
                arena.insert_in_list(system, 0, lib, |n| match n {
                    Node::System(s) => &mut s.library_defs,
                    _ => unreachable!("system expected"),
                });
            }
        }
    }
    rewritten
}

fn find_library_def(arena: &Arena, system: NodeId, name: &str) -> Option<NodeId> {
    let Node::System(sys) = arena.node(system) else {
        return None;
    };
    sys.library_defs
        .iter()
        .copied()
        .find(|&l| matches!(arena.node(l), Node::LibraryDef(d) if d.name == name))
}

/// Rewrite one `rising_edge(x)`/`falling_edge(x)` call into
/// `event(x) && (bool)(x === edge) && (bool)(last_value(x) === !edge)`.
/// Returns the generated `last_value` call for the later fix.
fn lower_edge(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    call: NodeId,
    rising: bool,
) -> Option<NodeId> {
    let Node::FunctionCall(fc) = arena.node(call).clone() else {
        return None;
    };
    if fc.args.len() != 1 {
        return None;
    }
    let Node::ParameterAssign(pa) = arena.node(fc.args[0]).clone() else {
        return None;
    };
    let operand = crate::tree::nav::skip_casts(arena, pa.value);

    let edge_digit = if rising {
        BitConstant::One
    } else {
        BitConstant::Zero
    };
    let prev_digit = if rising {
        BitConstant::Zero
    } else {
        BitConstant::One
    };

    let op_copy1 = deep_copy(arena, operand);
    let op_copy2 = deep_copy(arena, operand);
    let op_copy3 = deep_copy(arena, operand);

    let mut b = Builder::new(arena);
    let event_arg = b.parameter_assign("param1", op_copy1);
    let event = b.function_call("hif_vhdl_event", None, vec![event_arg]);

    let bit_ty1 = b.bit_type(true, false);
    let edge_val = b.typed_bit_val(edge_digit, bit_ty1);
    let cur_cmp = b.binary(Operator::CaseEq, op_copy2, edge_val);
    let bool_ty1 = b.bool_type();
    let cur_check = b.cast(bool_ty1, cur_cmp);

    let lv_arg = b.parameter_assign("param1", op_copy3);
    let last_value = b.function_call("hif_vhdl_last_value", None, vec![lv_arg]);
    let bit_ty2 = b.bit_type(true, false);
    let prev_val = b.typed_bit_val(prev_digit, bit_ty2);
    let prev_cmp = b.binary(Operator::CaseEq, last_value, prev_val);
    let bool_ty2 = b.bool_type();
    let prev_check = b.cast(bool_ty2, prev_cmp);

    let left = b.binary(Operator::And, event, cur_check);
    let lowered = b.binary(Operator::And, left, prev_check);

    arena.replace(call, lowered);
    arena.free_subtree(call);
    let _ = sem;
    Some(last_value)
}

/// Rewrite one `last_value(x)` call onto the support-library form (or an
/// inline generated function), creating the per-declaration support
/// variables and edge process on first encounter.
fn fix_last_value_call(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    call: NodeId,
    opts: &LastValueOptions,
    names: &mut NameTable,
    supports: &mut IndexMap<NodeId, SupportNames>,
) -> bool {
    let Node::FunctionCall(fc) = arena.node(call).clone() else {
        return false;
    };
    if fc.args.len() != 1 {
        return false;
    }
    let Node::ParameterAssign(pa) = arena.node(fc.args[0]).clone() else {
        return false;
    };
    let operand = crate::tree::nav::skip_casts(arena, pa.value);
    let signal_id = crate::tree::nav::terminal_prefix(arena, operand);
    if arena.kind(signal_id) != NodeKind::Identifier {
        return false;
    }
    let Some(decl) = crate::resolve::get_declaration(arena, sem, signal_id) else {
        return false;
    };
    let Some(contents) = crate::tree::nav::nearest_parent_of_kind(
        arena,
        call,
        NodeKind::Contents,
    ) else {
        return false;
    };

    let first_in_scope = !supports.contains_key(&decl);
    if first_in_scope {
        let support = create_support(arena, sem, decl, contents, opts, names);
        supports.insert(decl, support);
    }
    let support = supports.get(&decl).expect("just inserted");
    let (last, prev, fname) = (
        support.last.clone(),
        support.prev.clone(),
        support.function.clone(),
    );

    // Rewire the call: name, extra params, library instance.
    let operand_copy = deep_copy(arena, operand);
    let mut extra_args = Vec::new();
    {
        let mut b = Builder::new(arena);
        extra_args.push(b.parameter_assign("param1", operand_copy));
        if !opts.inline_last_value {
            let last_id = b.identifier(last);
            extra_args.push(b.parameter_assign("param2", last_id));
            let prev_id = b.identifier(prev);
            extra_args.push(b.parameter_assign("param3", prev_id));
        }
    }
    let new_instance = if opts.inline_last_value {
        None
    } else {
        Some(Builder::new(arena).library(stdlib::SYSTEMC_EXTENSIONS, false, true))
    };
    // Drop the old argument list and install the rewritten call parts.
    let Node::FunctionCall(fc_now) = arena.node(call).clone() else {
        return false;
    };
    for old_arg in fc_now.args {
        arena.detach(old_arg);
        arena.free_subtree(old_arg);
    }
    if let Some(old_instance) = fc_now.instance {
        arena.detach(old_instance);
        arena.free_subtree(old_instance);
    }
    if let Node::FunctionCall(f) = arena.node_mut(call) {
        f.name = fname;
        f.args = extra_args.clone();
        f.instance = new_instance;
    }
    for arg in extra_args {
        arena.claim(call, arg);
    }
    if let Some(inst) = new_instance {
        arena.claim(call, inst);
    }
    crate::typing::reset_types(arena, call, true);
    crate::resolve::reset_declarations(arena, call);
    first_in_scope
}

/// Create `x_last`/`x_prev`, the edge process, and (when inlining) the
/// generated function for one declaration.
fn create_support(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    decl: NodeId,
    contents: NodeId,
    opts: &LastValueOptions,
    names: &mut NameTable,
) -> SupportNames {
    let Node::DataDeclaration(d) = arena.node(decl).clone() else {
        unreachable!("data declaration checked by caller");
    };
    let last = names.fresh_suffixed(&d.name, "_last");
    let prev = names.fresh_suffixed(&d.name, "_prev");
    let function = if opts.inline_last_value {
        names.fresh_suffixed(&d.name, "_last_value")
    } else {
        crate::base::Name::new("hif_systemc_hif_lastValue")
    };

    // Support variables initialized like the signal (or its default).
    // Defaults use the SystemC semantics: this fix always lands in the
    // back-end.
    let sysc = crate::semantics::SystemCSemantics;
    for name in [&last, &prev] {
        let ty_copy = deep_copy(arena, d.ty);
        let init = match d.init {
            Some(init) => Some(deep_copy(arena, init)),
            None => sysc.default_value(arena, ty_copy, Some(decl)),
        };
        let var = Builder::new(arena).variable(name.clone(), ty_copy, init);
        arena.push_to_list(contents, var, |n| match n {
            Node::Contents(c) => &mut c.declarations,
            _ => unreachable!("contents expected"),
        });
    }

    // Edge process: calls the mapped function on every signal event.
    let process_name = names.fresh_suffixed(&d.name, "_edge_process");
    let sens = Builder::new(arena).identifier(d.name.clone());
    let mut call_args = Vec::new();
    {
        let mut b = Builder::new(arena);
        let sig = b.identifier(d.name.clone());
        call_args.push(b.parameter_assign("param1", sig));
        if !opts.inline_last_value {
            let l = b.identifier(last.clone());
            call_args.push(b.parameter_assign("param2", l));
            let p = b.identifier(prev.clone());
            call_args.push(b.parameter_assign("param3", p));
        }
    }
    let instance = if opts.inline_last_value {
        None
    } else {
        Some(Builder::new(arena).library(stdlib::SYSTEMC_EXTENSIONS, false, true))
    };
    let pcall = arena.alloc(Node::ProcedureCall(crate::tree::action::ProcedureCall {
        name: function.clone(),
        instance,
        template_args: Vec::new(),
        args: call_args,
    }));
    let process = Builder::new(arena).process(process_name, vec![sens], vec![pcall]);
    arena.push_to_list(contents, process, |n| match n {
        Node::Contents(c) => &mut c.state_tables,
        _ => unreachable!("contents expected"),
    });

    if opts.inline_last_value {
        build_inline_function(arena, sem, decl, &d, &last, &prev, &function, contents);
    }

    SupportNames {
        last,
        prev,
        function,
    }
}

/// The generated inline function:
/// ```text
/// fn x_last_value(param1) {
///     if (bool)(param1 !== x_prev) { x_last := x_prev; x_prev := param1; }
///     return x_last;
/// }
/// ```
fn build_inline_function(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    decl: NodeId,
    d: &crate::tree::decl::DataDeclaration,
    last: &crate::base::Name,
    prev: &crate::base::Name,
    function: &crate::base::Name,
    contents: NodeId,
) {
    let _ = decl;
    let mut b = Builder::new(arena);
    let param_ty = deep_copy(b.arena, d.ty);
    let param = b.arena.alloc(Node::DataDeclaration(
        crate::tree::decl::DataDeclaration {
            name: "param1".into(),
            ty: param_ty,
            init: None,
            kind: crate::tree::decl::DataKind::Parameter(
                crate::tree::decl::PortDirection::In,
            ),
        },
    ));

    let arg = b.identifier("param1");
    let prev_read = b.identifier(prev.clone());
    let changed = b.binary(Operator::CaseNeq, arg, prev_read);
    let cond_ty = b.bool_type();
    let condition = b.cast(cond_ty, changed);
    let last_t = b.identifier(last.clone());
    let prev_s = b.identifier(prev.clone());
    let update_last = b.assign(last_t, prev_s);
    let prev_t = b.identifier(prev.clone());
    let arg_s = b.identifier("param1");
    let update_prev = b.assign(prev_t, arg_s);
    let alt = b.arena.alloc(Node::IfAlt(crate::tree::action::IfAlt {
        condition,
        actions: vec![update_last, update_prev],
    }));
    let if_stmt = b.arena.alloc(Node::If(crate::tree::action::If {
        alts: vec![alt],
        default: vec![],
    }));
    let ret_val = b.identifier(last.clone());
    let ret = b.arena.alloc(Node::Return(crate::tree::action::Return {
        value: Some(ret_val),
    }));
    let state = b.state("lastValue", vec![if_stmt, ret]);
    let st = b.arena.alloc(Node::StateTable(crate::tree::action::StateTable {
        name: "lastValue".into(),
        flavor: crate::tree::action::ProcessFlavor::Method,
        sensitivity: vec![],
        declarations: vec![],
        states: vec![state],
    }));
    let ret_ty = deep_copy(b.arena, d.ty);
    let function_decl = b.arena.alloc(Node::SubProgram(crate::tree::decl::SubProgram {
        name: function.clone(),
        kind: crate::tree::decl::SubKind::Function { ret: ret_ty },
        flavor: crate::tree::decl::SubFlavor::Ordinary,
        template_params: vec![],
        params: vec![param],
        state_table: Some(st),
    }));
    arena.push_to_list(contents, function_decl, |n| match n {
        Node::Contents(c) => &mut c.declarations,
        _ => unreachable!("contents expected"),
    });
    let _ = sem;
}
