//! Shared type-rule machinery behind the concrete dialects.
//!
//! The HIF and SystemC semantics agree on most folding rules and differ in
//! a handful of toggles (slice rebasing, logic values in condition
//! position, default logic digit). Both delegate here.

use crate::semantics::{CastRemovalInfo, ExprTypeInfo, LanguageSemantics};
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::equals::{EqualsOptions, equals};
use crate::tree::value::BitConstant;
use crate::tree::{Arena, Node, NodeId, Operator};
use crate::typing::{
    self, base_type, span_bitwidth, type_bitwidth, type_is_constexpr, type_is_logic,
    type_is_signed,
};

/// Per-dialect toggles.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Dialect {
    /// Are slice indices on vectors zero-based in the emitted code?
    pub slice_rebased: bool,
    /// Digit used when defaulting logic bits.
    pub default_logic: BitConstant,
}

// ============================================================================
// EXPRESSION TYPING
// ============================================================================

pub(crate) fn expr_type(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    t1: NodeId,
    t2: Option<NodeId>,
    op: Operator,
) -> Option<ExprTypeInfo> {
    let b1 = base_type(arena, sem, t1, false);
    let b2 = t2.map(|t| base_type(arena, sem, t, false));

    if op == Operator::None {
        let returned = deep_copy(arena, b1);
        let precision = deep_copy(arena, b1);
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    if op == Operator::Concat {
        return concat_type(arena, b1, b2?);
    }

    if op.is_arithmetic() {
        return arithmetic_type(arena, b1, b2, op);
    }

    if op.is_relational() {
        let wide = b2.map_or(b1, |b2| wider(arena, b1, b2));
        let logic_operands =
            type_is_logic(arena, b1) || b2.is_some_and(|b2| type_is_logic(arena, b2));
        let precision = deep_copy(arena, wide);
        let mut b = Builder::new(arena);
        let returned = if logic_operands && !op_is_case_equality(op) {
            b.bit_type(true, true)
        } else {
            b.bool_type()
        };
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    if op.is_logical() {
        if !condition_capable(arena, b1) {
            return None;
        }
        if let Some(b2) = b2 {
            if !condition_capable(arena, b2) {
                return None;
            }
        }
        let logic_operands =
            type_is_logic(arena, b1) || b2.is_some_and(|b2| type_is_logic(arena, b2));
        let bit_operands = matches!(arena.node(b1), Node::BitT(_))
            && b2.is_none_or(|b2| matches!(arena.node(b2), Node::BitT(_)));
        let mut b = Builder::new(arena);
        let returned = if bit_operands {
            b.bit_type(logic_operands, logic_operands)
        } else {
            b.bool_type()
        };
        let precision = deep_copy(arena, returned);
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    if op.is_bitwise() {
        let ok = |arena: &Arena, t: NodeId| {
            matches!(
                arena.node(t),
                Node::BitT(_)
                    | Node::BitvectorT(_)
                    | Node::SignedT(_)
                    | Node::UnsignedT(_)
                    | Node::IntT(_)
                    | Node::BoolT(_)
            )
        };
        if !ok(arena, b1) || b2.is_some_and(|b2| !ok(arena, b2)) {
            return None;
        }
        let wide = b2.map_or(b1, |b2| wider(arena, b1, b2));
        let returned = deep_copy(arena, wide);
        let precision = deep_copy(arena, wide);
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    if op.is_shift() || op.is_rotate() {
        let returned = deep_copy(arena, b1);
        let precision = deep_copy(arena, b1);
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    if op.is_reduce() {
        let logic = type_is_logic(arena, b1);
        let precision = deep_copy(arena, b1);
        let is_bool = matches!(arena.node(b1), Node::BoolT(_));
        let mut b = Builder::new(arena);
        let returned = if is_bool {
            b.bool_type()
        } else {
            b.bit_type(logic, logic)
        };
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    match op {
        Operator::Ref => {
            let pointed = deep_copy(arena, b1);
            let precision = deep_copy(arena, b1);
            let returned = arena.alloc(Node::PointerT(crate::tree::types::PointerT {
                pointed,
            }));
            Some(ExprTypeInfo {
                returned,
                precision,
            })
        }
        Operator::Deref => match arena.node(b1).clone() {
            Node::PointerT(p) => {
                let returned = deep_copy(arena, p.pointed);
                let precision = deep_copy(arena, b1);
                Some(ExprTypeInfo {
                    returned,
                    precision,
                })
            }
            _ => None,
        },
        Operator::Size => {
            let precision = deep_copy(arena, b1);
            let mut b = Builder::new(arena);
            let returned = b.int_type(None, true);
            Some(ExprTypeInfo {
                returned,
                precision,
            })
        }
        Operator::Reverse => {
            let returned = deep_copy(arena, b1);
            let precision = deep_copy(arena, b1);
            Some(ExprTypeInfo {
                returned,
                precision,
            })
        }
        _ => None,
    }
}

fn op_is_case_equality(op: Operator) -> bool {
    matches!(op, Operator::CaseEq | Operator::CaseNeq)
}

fn concat_type(arena: &mut Arena, b1: NodeId, b2: NodeId) -> Option<ExprTypeInfo> {
    let stringish = |arena: &Arena, t: NodeId| {
        matches!(arena.node(t), Node::StringT(_) | Node::CharT(_))
    };
    if stringish(arena, b1) && stringish(arena, b2) {
        let mut b = Builder::new(arena);
        let returned = b.string_type();
        let precision = b.string_type();
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }
    let w1 = type_bitwidth(arena, b1);
    let w2 = type_bitwidth(arena, b2);
    if w1 == 0 || w2 == 0 {
        return None;
    }
    let logic = type_is_logic(arena, b1) || type_is_logic(arena, b2);
    let mut b = Builder::new(arena);
    let span = b.downto((w1 + w2) as i64 - 1, 0);
    let returned = b.bitvector_type(span, logic, false);
    let precision = deep_copy(arena, returned);
    Some(ExprTypeInfo {
        returned,
        precision,
    })
}

fn arithmetic_type(
    arena: &mut Arena,
    b1: NodeId,
    b2: Option<NodeId>,
    op: Operator,
) -> Option<ExprTypeInfo> {
    let timeish =
        |arena: &Arena, t: NodeId| matches!(arena.node(t), Node::TimeT(_));
    let realish =
        |arena: &Arena, t: NodeId| matches!(arena.node(t), Node::RealT(_));
    let numericish = |arena: &Arena, t: NodeId| {
        matches!(
            arena.node(t),
            Node::IntT(_)
                | Node::RealT(_)
                | Node::CharT(_)
                | Node::TimeT(_)
                | Node::BitvectorT(_)
                | Node::SignedT(_)
                | Node::UnsignedT(_)
                | Node::BitT(_)
                | Node::BoolT(_)
        )
    };

    if !numericish(arena, b1) || b2.is_some_and(|b2| !numericish(arena, b2)) {
        return None;
    }

    if timeish(arena, b1) || b2.is_some_and(|b2| timeish(arena, b2)) {
        let mut b = Builder::new(arena);
        let returned = b.time_type();
        let precision = b.time_type();
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    if op == Operator::Log {
        let mut b = Builder::new(arena);
        let returned = b.real_type();
        let precision = b.real_type();
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    if realish(arena, b1) || b2.is_some_and(|b2| realish(arena, b2)) {
        let mut b = Builder::new(arena);
        let returned = b.real_type();
        let precision = b.real_type();
        return Some(ExprTypeInfo {
            returned,
            precision,
        });
    }

    // Division keys its result off the dividend.
    let wide = match b2 {
        Some(b2) if op != Operator::Div => wider(arena, b1, b2),
        _ => b1,
    };
    let returned = deep_copy(arena, wide);
    let signed = type_is_signed(arena, b1) || b2.is_some_and(|b2| type_is_signed(arena, b2));
    if matches!(arena.node(returned), Node::IntT(_)) {
        typing::set_type_signed(arena, returned, signed);
    }
    let precision = deep_copy(arena, returned);
    Some(ExprTypeInfo {
        returned,
        precision,
    })
}

/// The operand whose type dominates. Constant-expression types adapt to
/// the non-constant side regardless of width; otherwise the wider operand
/// wins, preferring the first on ties/unknowns.
fn wider(arena: &Arena, a: NodeId, b: NodeId) -> NodeId {
    let ca = type_is_constexpr(arena, a);
    let cb = type_is_constexpr(arena, b);
    if ca != cb {
        return if ca { b } else { a };
    }
    let wa = type_bitwidth(arena, a);
    let wb = type_bitwidth(arena, b);
    // Vectors dominate plain integers of equal width.
    let rank = |arena: &Arena, t: NodeId| match arena.node(t) {
        Node::BitvectorT(_) | Node::SignedT(_) | Node::UnsignedT(_) => 2,
        Node::IntT(_) => 1,
        _ => 0,
    };
    if wa == 0 && wb != 0 {
        return if rank(arena, a) >= rank(arena, b) { a } else { b };
    }
    if wb > wa {
        return b;
    }
    if wb == wa && rank(arena, b) > rank(arena, a) {
        return b;
    }
    a
}

pub(crate) fn condition_capable(arena: &Arena, ty: NodeId) -> bool {
    matches!(
        arena.node(ty),
        Node::BoolT(_) | Node::BitT(_) | Node::IntT(_)
    )
}

// ============================================================================
// CONSTANTS & DEFAULTS
// ============================================================================

pub(crate) fn type_for_constant(arena: &mut Arena, cv: NodeId) -> Option<NodeId> {
    let node = arena.node(cv).clone();
    let mut b = Builder::new(arena);
    let ty = match &node {
        Node::BitVal(x) => {
            let logic = !x.value.is_01();
            b.bit_type(logic, false)
        }
        Node::BitvectorVal(x) => {
            let logic = !x.is_01();
            let span = b.downto(x.value.len() as i64 - 1, 0);
            b.bitvector_type(span, logic, false)
        }
        Node::BoolVal(_) => b.bool_type(),
        Node::CharVal(_) => b
            .arena
            .alloc(Node::CharT(crate::tree::types::CharT::default())),
        Node::IntVal(_) => {
            let span = b.downto(63, 0);
            b.int_type(Some(span), true)
        }
        Node::RealVal(_) => b.real_type(),
        Node::StringVal(_) => b.string_type(),
        Node::TimeVal(_) => b.time_type(),
        _ => return None,
    };
    typing::set_type_constexpr(arena, ty, true);
    Some(ty)
}

pub(crate) fn default_value(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    ty: NodeId,
    decl: Option<NodeId>,
    dialect: &Dialect,
) -> Option<NodeId> {
    let base = base_type(arena, sem, ty, false);
    match arena.node(base).clone() {
        Node::BitT(t) => {
            let digit = if t.logic {
                dialect.default_logic
            } else {
                BitConstant::Zero
            };
            let mut b = Builder::new(arena);
            let v = b.bit_val(digit);
            let vty = deep_copy(arena, base);
            typing::attach_syntactic_type(arena, v, vty);
            Some(v)
        }
        Node::BoolT(_) => Some(Builder::new(arena).bool_val(false)),
        Node::CharT(_) => Some(Builder::new(arena).char_val('\0')),
        Node::IntT(_) => {
            let mut b = Builder::new(arena);
            let v = b.int_val(0);
            let vty = deep_copy(arena, base);
            typing::attach_syntactic_type(arena, v, vty);
            Some(v)
        }
        Node::RealT(_) => Some(Builder::new(arena).real_val(0.0)),
        Node::StringT(_) => Some(Builder::new(arena).string_val("")),
        Node::TimeT(_) => {
            Some(Builder::new(arena).time_val(0.0, crate::tree::TimeUnit::Ns))
        }
        Node::BitvectorT(t) => {
            let width = t.span.map(|s| span_bitwidth(arena, s)).unwrap_or(0);
            let digit = if t.logic {
                dialect.default_logic
            } else {
                BitConstant::Zero
            }
            .to_char();
            if width == 0 {
                return None;
            }
            let digits: String = std::iter::repeat(digit).take(width as usize).collect();
            let mut b = Builder::new(arena);
            let v = b.bitvector_val(&digits);
            let vty = deep_copy(arena, base);
            typing::attach_syntactic_type(arena, v, vty);
            Some(v)
        }
        Node::SignedT(t) => {
            let width = t.span.map(|s| span_bitwidth(arena, s)).unwrap_or(0);
            if width == 0 {
                return None;
            }
            let digits: String = std::iter::repeat('0').take(width as usize).collect();
            let mut b = Builder::new(arena);
            let v = b.bitvector_val(&digits);
            let vty = deep_copy(arena, base);
            typing::attach_syntactic_type(arena, v, vty);
            Some(v)
        }
        Node::UnsignedT(t) => {
            let width = t.span.map(|s| span_bitwidth(arena, s)).unwrap_or(0);
            if width == 0 {
                return None;
            }
            let digits: String = std::iter::repeat('0').take(width as usize).collect();
            let mut b = Builder::new(arena);
            let v = b.bitvector_val(&digits);
            let vty = deep_copy(arena, base);
            typing::attach_syntactic_type(arena, v, vty);
            Some(v)
        }
        Node::ArrayT(t) => {
            let elem_default = default_value(arena, sem, t.element, decl, dialect)?;
            let mut b = Builder::new(arena);
            Some(b.aggregate(vec![], Some(elem_default)))
        }
        Node::RecordT(t) => {
            let mut alts = Vec::new();
            for field in t.fields {
                let Node::DataDeclaration(d) = arena.node(field).clone() else {
                    return None;
                };
                let v = default_value(arena, sem, d.ty, Some(field), dialect)?;
                alts.push(arena.alloc(Node::RecordValueAlt(
                    crate::tree::value::RecordValueAlt {
                        field: d.name,
                        value: v,
                    },
                )));
            }
            Some(arena.alloc(Node::RecordValue(crate::tree::value::RecordValue {
                alts,
            })))
        }
        Node::EnumT(t) => {
            let first = t.values.first().copied()?;
            let name = arena.node(first).name()?.clone();
            Some(Builder::new(arena).identifier(name))
        }
        _ => None,
    }
}

// ============================================================================
// CAST REMOVAL
// ============================================================================

pub(crate) fn can_remove_cast_on_operands(
    arena: &mut Arena,
    orig: &ExprTypeInfo,
    simplified: &ExprTypeInfo,
    op: Operator,
) -> CastRemovalInfo {
    let relaxed = EqualsOptions {
        check_constexpr_flag: false,
        check_resolved_flag: false,
        ..Default::default()
    };
    let returned_equal = equals(arena, orig.returned, simplified.returned, relaxed);
    if !returned_equal {
        return CastRemovalInfo::default();
    }
    let wo = type_bitwidth(arena, orig.precision);
    let ws = type_bitwidth(arena, simplified.precision);
    let signed_equal = type_is_signed(arena, orig.precision)
        == type_is_signed(arena, simplified.precision);
    let precision_ok = if wo == 0 || ws == 0 {
        equals(arena, orig.precision, simplified.precision, relaxed)
    } else {
        ws >= wo
    };
    let _ = op;
    CastRemovalInfo {
        safe: signed_equal && precision_ok,
        safe_on_shift: signed_equal,
    }
}

pub(crate) fn can_remove_internal_cast(
    arena: &mut Arena,
    t1: NodeId,
    t2: NodeId,
    t3: NodeId,
) -> bool {
    let relaxed = EqualsOptions {
        check_constexpr_flag: false,
        check_resolved_flag: false,
        ..Default::default()
    };
    if equals(arena, t1, t2, relaxed) {
        return true;
    }
    let w2 = type_bitwidth(arena, t2);
    let w3 = type_bitwidth(arena, t3);
    if w2 == 0 || w3 == 0 {
        return false;
    }
    // The middle cast must not truncate nor reinterpret the sign.
    w2 >= w3 && type_is_signed(arena, t2) == type_is_signed(arena, t3)
}

// ============================================================================
// MEMBERS & CASTS
// ============================================================================

pub(crate) fn member_semantic_type(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    member: NodeId,
) -> Option<NodeId> {
    let Node::Member(m) = arena.node(member).clone() else {
        return None;
    };
    let prefix_ty = typing::value_base_type(arena, sem, m.prefix)?;
    match arena.node(prefix_ty).clone() {
        Node::BitvectorT(t) => {
            let mut b = Builder::new(arena);
            Some(b.bit_type(t.logic, t.resolved))
        }
        Node::SignedT(_) | Node::UnsignedT(_) => {
            let mut b = Builder::new(arena);
            Some(b.bit_type(true, true))
        }
        Node::ArrayT(t) => Some(deep_copy(arena, t.element)),
        Node::IntT(_) => Some(Builder::new(arena).bool_type()),
        Node::StringT(_) => Some(
            arena.alloc(Node::CharT(crate::tree::types::CharT::default())),
        ),
        Node::BitT(t) => {
            // Single-bit selected as [0].
            let mut b = Builder::new(arena);
            Some(b.bit_type(t.logic, t.resolved))
        }
        _ => None,
    }
}

pub(crate) fn is_cast_allowed(arena: &mut Arena, target: NodeId, source: NodeId) -> bool {
    let castable = |arena: &Arena, t: NodeId| {
        matches!(
            arena.node(t),
            Node::BitT(_)
                | Node::BoolT(_)
                | Node::CharT(_)
                | Node::IntT(_)
                | Node::RealT(_)
                | Node::BitvectorT(_)
                | Node::SignedT(_)
                | Node::UnsignedT(_)
                | Node::ArrayT(_)
        )
    };
    if castable(arena, target) && castable(arena, source) {
        return true;
    }
    arena.kind(target) == arena.kind(source)
}

pub(crate) fn type_allowed_as_bound(arena: &mut Arena, ty: NodeId) -> Option<NodeId> {
    if matches!(arena.node(ty), Node::IntT(_)) {
        return None;
    }
    let mut b = Builder::new(arena);
    Some(b.int_type(None, true))
}

pub(crate) fn is_template_allowed_type(arena: &Arena, ty: NodeId) -> bool {
    matches!(
        arena.node(ty),
        Node::IntT(_)
            | Node::BoolT(_)
            | Node::RealT(_)
            | Node::StringT(_)
            | Node::CharT(_)
            | Node::TimeT(_)
    )
}

pub(crate) fn is_event_call(arena: &Arena, call: NodeId) -> bool {
    match arena.node(call) {
        Node::FunctionCall(fc) => matches!(
            fc.name.as_str(),
            "hif_vhdl_event" | "hif_vhdl_rising_edge" | "hif_vhdl_falling_edge"
        ),
        _ => false,
    }
}
