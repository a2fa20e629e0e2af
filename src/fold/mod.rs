//! Constant folding over pairs of operand values.
//!
//! For every pair of constant kinds and operator family the folder either
//! produces a replacement value or reports "cannot fold" (`None`). The
//! dispatch is a two-level match over the operand kinds, most specific
//! pair first, with one-sided constant algebra and the equal-subtree rules
//! as fallbacks.
//!
//! Guarantees kept here:
//! - logical operators short-circuit (`false ∧ X ⇒ false` without
//!   evaluating `X`);
//! - bit constants keep nine-valued semantics: any operation touching an
//!   unknown yields an unknown unless case-equality is used;
//! - division by zero folds to nothing, never a panic;
//! - integer shifts by ≥ 64 collapse to 0 (or −1 for arithmetic right
//!   shifts of negative signed values);
//! - integer modulo is normalized to a non-negative remainder for
//!   non-negative moduli;
//! - relational operators on equal operands fold only when the operand
//!   type is not logic (`X == X` stays `X`);
//! - time values are normalized to the smaller unit before combining.

use crate::semantics::LanguageSemantics;
use crate::simplify::{Behavior, SimplifyOptions};
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::equals::{EqualsOptions, equals};
use crate::tree::value::{BitConstant, TimeUnit};
use crate::tree::{Arena, Node, NodeId, NodeKind, Operator};
use crate::typing::{
    self, semantic_type, transform_constant, type_bitwidth, type_is_logic, type_is_signed,
    value_base_type,
};

/// Try to fold `expr` (an `Expression` node). Returns a fresh parentless
/// replacement value, or `None` when the pair cannot be folded.
pub fn fold_expression(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    opts: &SimplifyOptions,
    expr: NodeId,
) -> Option<NodeId> {
    let Node::Expression(e) = arena.node(expr).clone() else {
        return None;
    };
    let mut folder = Folder {
        arena,
        sem,
        opts,
        op: e.op,
        expr,
    };
    match e.rhs {
        None => folder.unary(e.lhs),
        Some(rhs) => folder.binary(e.lhs, rhs),
    }
}

struct Folder<'a> {
    arena: &'a mut Arena,
    sem: &'a dyn LanguageSemantics,
    opts: &'a SimplifyOptions,
    op: Operator,
    expr: NodeId,
}

impl Folder<'_> {
    // ========================================================================
    // TYPING HELPERS
    // ========================================================================

    /// Returned type of the original operation, as a fresh owned tree.
    fn returned_type(&mut self, v1: NodeId, v2: Option<NodeId>) -> Option<NodeId> {
        let t1 = semantic_type(self.arena, self.sem, v1)?;
        let t2 = match v2 {
            Some(v2) => Some(semantic_type(self.arena, self.sem, v2)?),
            None => None,
        };
        let info = self
            .sem
            .expr_type(self.arena, t1, t2, self.op, Some(self.expr))?;
        if info.precision != info.returned {
            self.arena.free_subtree(info.precision);
        }
        Some(info.returned)
    }

    /// Operation precision of the original operation, as a fresh owned
    /// tree.
    fn precision_type(&mut self, v1: NodeId, v2: Option<NodeId>) -> Option<NodeId> {
        let t1 = semantic_type(self.arena, self.sem, v1)?;
        let t2 = match v2 {
            Some(v2) => Some(semantic_type(self.arena, self.sem, v2)?),
            None => None,
        };
        let info = self
            .sem
            .expr_type(self.arena, t1, t2, self.op, Some(self.expr))?;
        if info.precision != info.returned {
            self.arena.free_subtree(info.returned);
        }
        Some(info.precision)
    }

    /// Convert a candidate constant result to the type of the original
    /// operation. Non-constant results pass through unchanged.
    fn finish(&mut self, result: NodeId, v1: NodeId, v2: Option<NodeId>) -> Option<NodeId> {
        if !self.arena.node(result).is_const_value() {
            return Some(result);
        }
        let Some(rty) = self.returned_type(v1, v2) else {
            self.arena.free_subtree(result);
            return None;
        };
        let converted = transform_constant(self.arena, self.sem, result, rty);
        self.arena.free_subtree(result);
        self.arena.free_subtree(rty);
        converted
    }

    /// Wrap a non-constant replacement in a cast to the operation type, as
    /// the one-sided bitwise/relational rules require.
    fn finish_with_cast(
        &mut self,
        result: NodeId,
        v1: NodeId,
        v2: Option<NodeId>,
    ) -> Option<NodeId> {
        if self.arena.node(result).is_const_value() {
            return self.finish(result, v1, v2);
        }
        let Some(rty) = self.returned_type(v1, v2) else {
            self.arena.free_subtree(result);
            return None;
        };
        let inner = typing::assure_syntactic_type(self.arena, self.sem, result);
        Some(Builder::new(self.arena).cast(rty, inner))
    }

    fn copy(&mut self, id: NodeId) -> NodeId {
        deep_copy(self.arena, id)
    }

    fn num(&self, id: NodeId) -> Option<f64> {
        match self.arena.node(id) {
            Node::IntVal(x) => Some(x.value as f64),
            Node::RealVal(x) => Some(x.value),
            Node::CharVal(x) => Some(x.value as u32 as f64),
            Node::TimeVal(x) => Some(x.value),
            _ => None,
        }
    }

    // ========================================================================
    // UNARY
    // ========================================================================

    fn unary(&mut self, v1: NodeId) -> Option<NodeId> {
        let node = self.arena.node(v1).clone();
        let result = match node {
            Node::BitVal(x) => match self.op {
                Operator::Not | Operator::BNot => {
                    let mut b = Builder::new(self.arena);
                    Some(b.bit_val(x.value.negate()))
                }
                op if op.is_reduce() => Some(self.copy(v1)),
                _ => None,
            },
            Node::BitvectorVal(x) => match self.op {
                Operator::BNot => {
                    let digits: String = x
                        .value
                        .chars()
                        .map(|c| {
                            BitConstant::from_char(c)
                                .map(|b| b.negate().to_char())
                                .unwrap_or(c)
                        })
                        .collect();
                    Some(Builder::new(self.arena).bitvector_val(&digits))
                }
                _ => None,
            },
            Node::BoolVal(x) => match self.op {
                Operator::Not => Some(Builder::new(self.arena).bool_val(!x.value)),
                op if op.is_reduce() => Some(self.copy(v1)),
                _ => None,
            },
            Node::CharVal(x) => match self.op {
                Operator::Plus => Some(self.copy(v1)),
                Operator::Minus => {
                    Some(Builder::new(self.arena).int_val(-(x.value as i64)))
                }
                Operator::Not => {
                    Some(Builder::new(self.arena).int_val((x.value as u32 == 0) as i64))
                }
                _ => None,
            },
            Node::IntVal(x) => match self.op {
                Operator::Plus => Some(self.copy(v1)),
                Operator::Minus => Some(Builder::new(self.arena).int_val(x.value.wrapping_neg())),
                Operator::Not => Some(Builder::new(self.arena).int_val((x.value == 0) as i64)),
                Operator::BNot => Some(Builder::new(self.arena).int_val(!x.value)),
                Operator::Abs => Some(Builder::new(self.arena).int_val(x.value.wrapping_abs())),
                _ => None,
            },
            Node::RealVal(x) => match self.op {
                Operator::Plus => Some(self.copy(v1)),
                Operator::Minus => Some(Builder::new(self.arena).real_val(-x.value)),
                Operator::Not => {
                    Some(Builder::new(self.arena).real_val((x.value == 0.0) as u8 as f64))
                }
                Operator::Abs => Some(Builder::new(self.arena).real_val(x.value.abs())),
                _ => None,
            },
            Node::Expression(inner) => return self.unary_of_expression(&inner),
            _ => {
                // Reduce of a single-bit value is the value itself.
                if self.op.is_reduce() {
                    let ty = value_base_type(self.arena, self.sem, v1)?;
                    if matches!(self.arena.node(ty), Node::BitT(_) | Node::BoolT(_)) {
                        return Some(self.copy(v1));
                    }
                }
                return None;
            }
        };
        let result = result?;
        self.finish(result, v1, None)
    }

    /// Sign and negation push-through on nested expressions.
    fn unary_of_expression(
        &mut self,
        inner: &crate::tree::value::Expression,
    ) -> Option<NodeId> {
        match inner.rhs {
            Some(rhs) => {
                if self.op == Operator::Minus && inner.op == Operator::Minus {
                    // -(a - b) ⇒ b - a
                    let b_copy = self.copy(rhs);
                    let a_copy = self.copy(inner.lhs);
                    return Some(
                        Builder::new(self.arena).binary(Operator::Minus, b_copy, a_copy),
                    );
                }
                if self.op == Operator::Not && inner.op.is_relational() {
                    // !(a < b) ⇒ a >= b
                    let flipped = inner.op.inverse();
                    if flipped == Operator::None {
                        return None;
                    }
                    let a_copy = self.copy(inner.lhs);
                    let b_copy = self.copy(rhs);
                    return Some(Builder::new(self.arena).binary(flipped, a_copy, b_copy));
                }
                None
            }
            None => match (self.op, inner.op) {
                (Operator::Minus, Operator::Minus) => Some(self.copy(inner.lhs)),
                (Operator::Minus, Operator::Plus) => {
                    let a = self.copy(inner.lhs);
                    Some(Builder::new(self.arena).unary(Operator::Minus, a))
                }
                (Operator::Plus, Operator::Minus) => {
                    let a = self.copy(inner.lhs);
                    Some(Builder::new(self.arena).unary(Operator::Minus, a))
                }
                (Operator::Plus, Operator::Plus) => Some(self.copy(inner.lhs)),
                _ => None,
            },
        }
    }

    // ========================================================================
    // BINARY DISPATCH
    // ========================================================================

    fn binary(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        use NodeKind::*;
        let k1 = self.arena.kind(v1);
        let k2 = self.arena.kind(v2);
        match (k1, k2) {
            (BitVal, BitVal) => self.bit_bit(v1, v2),
            (BitVal, BoolVal) => {
                let promoted = self.bool_as_bit(v2);
                self.bit_bit_vals(self.bit_of(v1), promoted, v1, v2)
            }
            (BoolVal, BitVal) => {
                let promoted = self.bool_as_bit(v1);
                self.bit_bit_vals(promoted, self.bit_of(v2), v1, v2)
            }
            (BoolVal, BoolVal) => {
                self.bit_bit_vals(self.bool_as_bit(v1), self.bool_as_bit(v2), v1, v2)
            }
            (BitVal, BitvectorVal) => {
                let digits = self.bit_of(v1).to_char().to_string();
                self.bv_bv_digits(&digits, &self.bv_of(v2), v1, v2)
            }
            (BitvectorVal, BitVal) => {
                let digits = self.bit_of(v2).to_char().to_string();
                let d1 = self.bv_of(v1);
                self.bv_bv_digits(&d1, &digits, v1, v2)
            }
            (BoolVal, BitvectorVal) => {
                let digits = if self.arena.bool_value(v1) == Some(true) {
                    "1"
                } else {
                    "0"
                };
                self.bv_bv_digits(digits, &self.bv_of(v2), v1, v2)
            }
            (BitvectorVal, BoolVal) => {
                let digits = if self.arena.bool_value(v2) == Some(true) {
                    "1"
                } else {
                    "0"
                };
                let d1 = self.bv_of(v1);
                self.bv_bv_digits(&d1, digits, v1, v2)
            }
            (BitvectorVal, BitvectorVal) => {
                let (d1, d2) = (self.bv_of(v1), self.bv_of(v2));
                self.bv_bv_digits(&d1, &d2, v1, v2)
            }
            (BitvectorVal, IntVal) => self.bv_int(v1, v2),
            (IntVal, BitvectorVal) => self.int_bv(v1, v2),
            (BitvectorVal, RealVal) | (RealVal, BitvectorVal) => {
                self.bv_numeric_via_int(v1, v2)
            }
            (CharVal, CharVal)
            | (CharVal, IntVal)
            | (CharVal, RealVal)
            | (IntVal, CharVal)
            | (IntVal, IntVal)
            | (IntVal, RealVal)
            | (RealVal, CharVal)
            | (RealVal, IntVal)
            | (RealVal, RealVal) => {
                let r1 = self.num(v1)?;
                let r2 = self.num(v2)?;
                self.resolve_real(r1, r2, v1, v2)
            }
            (IntVal, TimeVal) | (RealVal, TimeVal) => {
                let r1 = self.num(v1)?;
                let r2 = self.num(v2)?;
                let unit = self.time_unit_of(v2)?;
                self.fold_time(r1, r2, unit)
            }
            (TimeVal, IntVal) | (TimeVal, RealVal) => {
                let r1 = self.num(v1)?;
                let r2 = self.num(v2)?;
                let unit = self.time_unit_of(v1)?;
                self.fold_time(r1, r2, unit)
            }
            (TimeVal, TimeVal) => self.time_time(v1, v2),
            (StringVal, StringVal) => self.string_string(v1, v2),
            // One-sided constants.
            (BitVal, _) => self.bit_any(v1, v2),
            (_, BitVal) => {
                if !self.op.is_commutative() {
                    return None;
                }
                self.bit_any(v2, v1)
            }
            (BoolVal, _) => self.bool_any_left(v1, v2),
            (_, BoolVal) => self.bool_any_right(v1, v2),
            (IntVal, _) | (RealVal, _) => {
                let r1 = self.num(v1)?;
                self.const_left(r1, v1, v2)
            }
            (_, IntVal) | (_, RealVal) => {
                let r2 = self.num(v2)?;
                self.const_right(v1, r2, v2)
            }
            _ => self.equal_operands(v1, v2),
        }
    }

    fn bit_of(&self, id: NodeId) -> BitConstant {
        match self.arena.node(id) {
            Node::BitVal(x) => x.value,
            _ => BitConstant::X,
        }
    }

    fn bool_as_bit(&self, id: NodeId) -> BitConstant {
        match self.arena.bool_value(id) {
            Some(true) => BitConstant::One,
            _ => BitConstant::Zero,
        }
    }

    fn bv_of(&self, id: NodeId) -> String {
        match self.arena.node(id) {
            Node::BitvectorVal(x) => x.value.clone(),
            _ => String::new(),
        }
    }

    fn time_unit_of(&self, id: NodeId) -> Option<TimeUnit> {
        match self.arena.node(id) {
            Node::TimeVal(x) => Some(x.unit),
            _ => None,
        }
    }

    // ========================================================================
    // BIT × BIT
    // ========================================================================

    fn bit_bit(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if self.op == Operator::Concat {
            return None;
        }
        self.bit_bit_vals(self.bit_of(v1), self.bit_of(v2), v1, v2)
    }

    fn bit_bit_vals(
        &mut self,
        b1: BitConstant,
        b2: BitConstant,
        v1: NodeId,
        v2: NodeId,
    ) -> Option<NodeId> {
        if !self.op.is_logical() && !self.op.is_relational() && !self.op.is_bitwise() {
            return None;
        }
        if b1 == BitConstant::DontCare || b2 == BitConstant::DontCare {
            return None;
        }
        let a = b1.is_high();
        let b = b2.is_high();
        let ax = b1.is_unknown();
        let bx = b2.is_unknown();

        let (res, unknown) = match self.op {
            Operator::And | Operator::BAnd => (a && b, (ax || bx) && (!a || !b)),
            Operator::Or | Operator::BOr => (a || b, (ax && !b) || (bx && !a)),
            Operator::Xor | Operator::BXor => (a ^ b, ax || bx),
            Operator::Eq => (a == b, ax || bx),
            Operator::CaseEq => (b1 == b2, false),
            Operator::Neq => (a != b, ax || bx),
            Operator::CaseNeq => (b1 != b2, false),
            Operator::Le => (a <= b, ax || bx),
            Operator::Lt => (a < b, ax || bx),
            Operator::Ge => (a >= b, ax || bx),
            Operator::Gt => (a > b, ax || bx),
            _ => return None,
        };

        let digit = if unknown {
            BitConstant::X
        } else if res {
            BitConstant::One
        } else {
            BitConstant::Zero
        };
        let result = Builder::new(self.arena).bit_val(digit);
        self.finish(result, v1, Some(v2))
    }

    /// Bit constant against an arbitrary value: absorbing/neutral elements
    /// of the bitwise and logical families.
    fn bit_any(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if !self.op.is_bitwise() && !self.op.is_logical() {
            return None;
        }
        let bit = self.bit_of(v1);
        let high = bit.is_high();
        let low = bit.is_low();
        match self.op {
            Operator::BAnd | Operator::And => {
                if high {
                    Some(self.copy(v2))
                } else if low {
                    Some(self.copy(v1))
                } else {
                    None
                }
            }
            Operator::BOr | Operator::Or => {
                if low {
                    Some(self.copy(v2))
                } else if high {
                    Some(self.copy(v1))
                } else {
                    None
                }
            }
            Operator::BXor | Operator::Xor => {
                if low {
                    Some(self.copy(v2))
                } else if high {
                    let inner = self.copy(v2);
                    Some(Builder::new(self.arena).unary(Operator::Not, inner))
                } else {
                    Some(Builder::new(self.arena).bit_val(BitConstant::X))
                }
            }
            _ => None,
        }
    }

    /// Left boolean constant: logical short-circuit. `false ∧ X ⇒ false`
    /// without evaluating `X`.
    fn bool_any_left(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if !self.op.is_logical() {
            return None;
        }
        let val = self.arena.bool_value(v1)?;
        match self.op {
            Operator::And => Some(if val { self.copy(v2) } else { self.copy(v1) }),
            Operator::Or => Some(if val { self.copy(v1) } else { self.copy(v2) }),
            Operator::Xor => {
                if val {
                    let inner = self.copy(v2);
                    Some(Builder::new(self.arena).unary(Operator::Not, inner))
                } else {
                    Some(self.copy(v2))
                }
            }
            _ => None,
        }
    }

    /// Right boolean constant. The left operand is kept (it was already
    /// evaluated), so `X ∧ true ⇒ X` but `X ∧ false ⇒ false` stays: the
    /// constant absorbs.
    fn bool_any_right(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if !self.op.is_logical() {
            return None;
        }
        let val = self.arena.bool_value(v2)?;
        match self.op {
            Operator::And => Some(if val { self.copy(v1) } else { self.copy(v2) }),
            Operator::Or => Some(if val { self.copy(v2) } else { self.copy(v1) }),
            Operator::Xor => {
                if val {
                    let inner = self.copy(v1);
                    Some(Builder::new(self.arena).unary(Operator::Not, inner))
                } else {
                    Some(self.copy(v1))
                }
            }
            _ => None,
        }
    }

    // ========================================================================
    // NUMERIC × NUMERIC
    // ========================================================================

    fn resolve_real(&mut self, r1: f64, r2: f64, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        let only_integers = self.arena.kind(v1) == NodeKind::IntVal
            && self.arena.kind(v2) == NodeKind::IntVal;
        let i1 = self.arena.int_value(v1);
        let i2 = self.arena.int_value(v2);

        if self.op.is_arithmetic() || self.op.is_shift() {
            let result = match self.op {
                Operator::Plus => {
                    if only_integers {
                        Builder::new(self.arena).int_val(i1?.wrapping_add(i2?))
                    } else {
                        Builder::new(self.arena).real_val(r1 + r2)
                    }
                }
                Operator::Minus => {
                    if only_integers {
                        Builder::new(self.arena).int_val(i1?.wrapping_sub(i2?))
                    } else {
                        Builder::new(self.arena).real_val(r1 - r2)
                    }
                }
                Operator::Mult => {
                    if only_integers {
                        Builder::new(self.arena).int_val(i1?.wrapping_mul(i2?))
                    } else {
                        Builder::new(self.arena).real_val(r1 * r2)
                    }
                }
                Operator::Div => {
                    if r2 == 0.0 {
                        return None;
                    }
                    if only_integers {
                        let (a, n) = (i1?, i2?);
                        // Rounding an inexact quotient is observable; the
                        // rebalancer may have created this division, so
                        // refuse unless the caller allows it.
                        if self.opts.behavior != Behavior::Aggressive && a % n != 0 {
                            return None;
                        }
                        Builder::new(self.arena).int_val(a / n)
                    } else {
                        Builder::new(self.arena).real_val(r1 / r2)
                    }
                }
                Operator::Pow => Builder::new(self.arena).real_val(r1.powf(r2)),
                Operator::Log => {
                    if r2 == 2.0 {
                        Builder::new(self.arena).real_val(r1.log2())
                    } else if r2 == 10.0 {
                        Builder::new(self.arena).real_val(r1.ln())
                    } else {
                        return None;
                    }
                }
                Operator::Sll | Operator::Sla if only_integers => {
                    let s = i2?;
                    let v = if s >= 64 || s < 0 {
                        0
                    } else {
                        i1?.wrapping_shl(s as u32)
                    };
                    Builder::new(self.arena).int_val(v)
                }
                Operator::Srl if only_integers => {
                    let s = i2?;
                    let a = i1?;
                    let v = if s >= 64 || s < 0 {
                        0
                    } else if s == 0 || a == 0 {
                        a
                    } else {
                        let width = self.int_operand_width(v1);
                        (mask_to_width(a, width) as u64 >> s) as i64
                    };
                    Builder::new(self.arena).int_val(v)
                }
                Operator::Sra if only_integers => {
                    let s = i2?;
                    let a = i1?;
                    let signed = self.operand_is_signed(v1);
                    let v = if s >= 64 || s < 0 {
                        if signed && a < 0 { -1 } else { 0 }
                    } else if s == 0 || a == 0 {
                        a
                    } else if signed {
                        a >> s
                    } else {
                        let width = self.int_operand_width(v1);
                        (mask_to_width(a, width) as u64 >> s) as i64
                    };
                    Builder::new(self.arena).int_val(v)
                }
                Operator::Rem if only_integers => {
                    let n = i2?;
                    if n == 0 {
                        return None;
                    }
                    Builder::new(self.arena).int_val(i1? % n)
                }
                Operator::Mod if only_integers => {
                    let (a, n) = (i1?, i2?);
                    if n == 0 {
                        return None;
                    }
                    let r = if a >= 0 && n >= 0 {
                        a % n
                    } else if a < 0 && n < 0 {
                        -((-a) % (-n))
                    } else if a < 0 {
                        (n - ((-a) % n)) % n
                    } else {
                        ((a % (-n)) + n) % n
                    };
                    Builder::new(self.arena).int_val(r)
                }
                _ => return None,
            };
            return self.finish(result, v1, Some(v2));
        }

        if self.op.is_relational() {
            let result = match self.op {
                Operator::Eq | Operator::CaseEq => r1 == r2,
                Operator::Neq | Operator::CaseNeq => r1 != r2,
                Operator::Gt => r1 > r2,
                Operator::Lt => r1 < r2,
                Operator::Ge => r1 >= r2,
                Operator::Le => r1 <= r2,
                _ => return None,
            };
            let bv = Builder::new(self.arena).bool_val(result);
            return self.finish(bv, v1, Some(v2));
        }

        if self.op.is_bitwise() && only_integers {
            let (a, b) = (i1?, i2?);
            let v = match self.op {
                Operator::BAnd => a & b,
                Operator::BOr => a | b,
                Operator::BXor => a ^ b,
                _ => return None,
            };
            let iv = Builder::new(self.arena).int_val(v);
            return self.finish(iv, v1, Some(v2));
        }

        None
    }

    fn int_operand_width(&mut self, v: NodeId) -> u64 {
        let ty = match typing::syntactic_type(self.arena, v) {
            Some(t) => t,
            None => match self.sem.type_for_constant(self.arena, v) {
                Some(t) => t,
                None => return 64,
            },
        };
        let w = type_bitwidth(self.arena, ty);
        if w == 0 { 64 } else { w }
    }

    fn operand_is_signed(&mut self, v: NodeId) -> bool {
        match semantic_type(self.arena, self.sem, v) {
            Some(t) => type_is_signed(self.arena, t),
            None => true,
        }
    }

    // ========================================================================
    // ONE-SIDED CONSTANT ALGEBRA
    // ========================================================================

    /// `const op X` identities.
    fn const_left(&mut self, r1: f64, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if self.op.is_arithmetic() || self.op.is_shift() {
            let result = match self.op {
                Operator::Plus if r1 == 0.0 => self.copy(v2),
                Operator::Minus if r1 == 0.0 => {
                    let inner = self.copy(v2);
                    Builder::new(self.arena).unary(Operator::Minus, inner)
                }
                Operator::Mult if r1 == 0.0 => Builder::new(self.arena).int_val(0),
                Operator::Mult if r1 == 1.0 => self.copy(v2),
                Operator::Mult if r1 == -1.0 => {
                    let inner = self.copy(v2);
                    Builder::new(self.arena).unary(Operator::Minus, inner)
                }
                Operator::Div if r1 == 0.0 => Builder::new(self.arena).int_val(0),
                Operator::Pow if r1 == 0.0 => Builder::new(self.arena).int_val(0),
                Operator::Pow if r1 == 1.0 => Builder::new(self.arena).int_val(1),
                Operator::Sll | Operator::Srl | Operator::Sla if r1 == 0.0 => {
                    Builder::new(self.arena).int_val(0)
                }
                Operator::Sra if r1 == 0.0 => Builder::new(self.arena).int_val(0),
                Operator::Sra if r1 == -1.0 => Builder::new(self.arena).int_val(-1),
                Operator::Log if r1 == 1.0 => Builder::new(self.arena).int_val(0),
                _ => return None,
            };
            return self.finish(result, v1, Some(v2));
        }
        if self.op.is_bitwise() {
            return self.bitwise_with_int_const(v1, v2, true);
        }
        if self.op.is_relational() {
            return self.relational_with_const(r1, v1, v2, true);
        }
        None
    }

    /// `X op const` identities.
    fn const_right(&mut self, v1: NodeId, r2: f64, v2: NodeId) -> Option<NodeId> {
        if self.op.is_arithmetic() || self.op.is_shift() {
            let span = self.operand_width(v1);
            let result = match self.op {
                Operator::Plus | Operator::Minus if r2 == 0.0 => self.copy(v1),
                Operator::Mult if r2 == 0.0 => Builder::new(self.arena).int_val(0),
                Operator::Mult if r2 == 1.0 => self.copy(v1),
                Operator::Mult if r2 == -1.0 => {
                    let inner = self.copy(v1);
                    Builder::new(self.arena).unary(Operator::Minus, inner)
                }
                Operator::Div if r2 == 1.0 => self.copy(v1),
                Operator::Div if r2 == -1.0 => {
                    let inner = self.copy(v1);
                    Builder::new(self.arena).unary(Operator::Minus, inner)
                }
                Operator::Pow if r2 == 0.0 => Builder::new(self.arena).int_val(1),
                Operator::Pow if r2 == 1.0 => self.copy(v1),
                Operator::Sll | Operator::Srl | Operator::Sla | Operator::Sra if r2 == 0.0 => {
                    self.copy(v1)
                }
                Operator::Sll | Operator::Sla | Operator::Srl
                    if span != 0 && r2 >= span as f64 =>
                {
                    Builder::new(self.arena).int_val(0)
                }
                _ => return None,
            };
            return self.finish(result, v1, Some(v2));
        }
        if self.op.is_bitwise() {
            return self.bitwise_with_int_const(v2, v1, false);
        }
        if self.op.is_relational() {
            return self.relational_with_const(r2, v2, v1, false);
        }
        None
    }

    fn operand_width(&mut self, v: NodeId) -> u64 {
        match semantic_type(self.arena, self.sem, v) {
            Some(t) => type_bitwidth(self.arena, t),
            None => 0,
        }
    }

    /// Bitwise family with one integer constant. `cv` is the constant,
    /// `other` the remaining operand.
    fn bitwise_with_int_const(
        &mut self,
        cv: NodeId,
        other: NodeId,
        const_is_left: bool,
    ) -> Option<NodeId> {
        let c = self.arena.int_value(cv)?;
        let other_base = value_base_type(self.arena, self.sem, other)?;
        if !matches!(self.arena.node(other_base), Node::IntT(_)) {
            return None;
        }
        let (v1, v2) = if const_is_left {
            (cv, other)
        } else {
            (other, cv)
        };
        let result = match self.op {
            Operator::BAnd => {
                if c == 0 {
                    Builder::new(self.arena).int_val(0)
                } else if c == -1 {
                    self.copy(other)
                } else if c == 1 && self.cast_of_bool(other).is_some() {
                    self.copy(other)
                } else if let Some((lhs, or_val)) = self.bor_with_int(other) {
                    // ((x | c1) & c2) with c1 covering c2 ⇒ x & c2
                    if or_val as u64 >= c as u64 {
                        let lhs_copy = self.copy(lhs);
                        let c_copy = self.copy(cv);
                        Builder::new(self.arena).binary(Operator::BAnd, lhs_copy, c_copy)
                    } else {
                        return None;
                    }
                } else {
                    return None;
                }
            }
            Operator::BOr => {
                if c == 0 {
                    self.copy(other)
                } else if c == -1 {
                    Builder::new(self.arena).int_val(-1)
                } else {
                    return None;
                }
            }
            Operator::BXor => return None,
            _ => return None,
        };
        self.finish_with_cast(result, v1, Some(v2))
    }

    /// The inner value when `v` is a cast of a boolean.
    fn cast_of_bool(&mut self, v: NodeId) -> Option<NodeId> {
        let Node::Cast(c) = self.arena.node(v).clone() else {
            return None;
        };
        let inner_base = value_base_type(self.arena, self.sem, c.value)?;
        matches!(self.arena.node(inner_base), Node::BoolT(_)).then_some(c.value)
    }

    /// `(lhs | int-const)` decomposition of `v`.
    fn bor_with_int(&self, v: NodeId) -> Option<(NodeId, i64)> {
        let Node::Expression(e) = self.arena.node(v) else {
            return None;
        };
        if e.op != Operator::BOr {
            return None;
        }
        let rhs = e.rhs?;
        Some((e.lhs, self.arena.int_value(rhs)?))
    }

    /// Relational family with one numeric constant; `cv` holds `c`,
    /// `other` is the remaining operand, `const_is_left` gives the side.
    fn relational_with_const(
        &mut self,
        c: f64,
        cv: NodeId,
        other: NodeId,
        const_is_left: bool,
    ) -> Option<NodeId> {
        let (v1, v2) = if const_is_left {
            (cv, other)
        } else {
            (other, cv)
        };
        // Normalize to the form `other <op> c`.
        let op = if const_is_left {
            match self.op {
                Operator::Lt => Operator::Gt,
                Operator::Gt => Operator::Lt,
                Operator::Le => Operator::Ge,
                Operator::Ge => Operator::Le,
                other_op => other_op,
            }
        } else {
            self.op
        };

        let prec = self.precision_type(v1, Some(v2))?;
        let is_unsigned = !type_is_signed(self.arena, prec);
        self.arena.free_subtree(prec);
        let is_zero = c == 0.0;

        // Unsigned comparisons against zero.
        if op == Operator::Lt && is_zero && is_unsigned {
            let bv = Builder::new(self.arena).bool_val(false);
            return self.finish(bv, v1, Some(v2));
        }
        if op == Operator::Ge && is_zero && is_unsigned {
            let bv = Builder::new(self.arena).bool_val(true);
            return self.finish(bv, v1, Some(v2));
        }

        // `(x | negative) <op> 0`: the value is certainly negative.
        if is_zero {
            if let Some((_, or_val)) = self.bor_with_int(other) {
                if or_val < 0 {
                    let truth = matches!(
                        op,
                        Operator::Lt | Operator::Le | Operator::Neq | Operator::CaseNeq
                    );
                    let bv = Builder::new(self.arena).bool_val(truth);
                    return self.finish(bv, v1, Some(v2));
                }
            }
        }

        // Comparisons of a cast-of-bool against a constant fold to the
        // boolean itself (or its negation, or a truth constant).
        if let Some(inner) = self.cast_of_bool(other) {
            let is_one = c == 1.0;
            let is_positive = c >= 0.0;
            let result = if is_zero {
                match op {
                    Operator::Eq | Operator::CaseEq | Operator::Le => {
                        let i = self.copy(inner);
                        Builder::new(self.arena).unary(Operator::Not, i)
                    }
                    Operator::Neq | Operator::CaseNeq | Operator::Gt => self.copy(inner),
                    Operator::Lt => Builder::new(self.arena).bool_val(false),
                    Operator::Ge => Builder::new(self.arena).bool_val(true),
                    _ => return None,
                }
            } else if is_one {
                match op {
                    Operator::Eq | Operator::CaseEq | Operator::Ge => self.copy(inner),
                    Operator::Neq | Operator::CaseNeq | Operator::Lt => {
                        let i = self.copy(inner);
                        Builder::new(self.arena).unary(Operator::Not, i)
                    }
                    Operator::Gt => Builder::new(self.arena).bool_val(false),
                    Operator::Le => Builder::new(self.arena).bool_val(true),
                    _ => return None,
                }
            } else if is_positive {
                match op {
                    Operator::Eq | Operator::CaseEq | Operator::Gt | Operator::Ge => {
                        Builder::new(self.arena).bool_val(false)
                    }
                    Operator::Neq | Operator::CaseNeq | Operator::Lt | Operator::Le => {
                        Builder::new(self.arena).bool_val(true)
                    }
                    _ => return None,
                }
            } else {
                match op {
                    Operator::Eq | Operator::CaseEq | Operator::Lt | Operator::Le => {
                        Builder::new(self.arena).bool_val(false)
                    }
                    Operator::Neq | Operator::CaseNeq | Operator::Gt | Operator::Ge => {
                        Builder::new(self.arena).bool_val(true)
                    }
                    _ => return None,
                }
            };
            return self.finish_with_cast(result, v1, Some(v2));
        }

        None
    }

    // ========================================================================
    // BITVECTORS
    // ========================================================================

    fn bv_bv_digits(
        &mut self,
        d1: &str,
        d2: &str,
        v1: NodeId,
        v2: NodeId,
    ) -> Option<NodeId> {
        if self.op == Operator::Concat {
            let joined = format!("{d1}{d2}");
            let result = Builder::new(self.arena).bitvector_val(&joined);
            let ty = self.sem.type_for_constant(self.arena, result)?;
            typing::attach_syntactic_type(self.arena, result, ty);
            return self.finish(result, v1, Some(v2));
        }

        if !(self.op.is_arithmetic()
            || self.op.is_bitwise()
            || self.op.is_relational()
            || self.op.is_shift())
        {
            return None;
        }

        let all01 = d1.chars().all(|c| c == '0' || c == '1')
            && d2.chars().all(|c| c == '0' || c == '1');

        if !all01 {
            if self.op.is_equality() {
                let exact = d1 == d2;
                let digit = match self.op {
                    Operator::Eq | Operator::Neq => BitConstant::X,
                    Operator::CaseEq => {
                        if exact {
                            BitConstant::One
                        } else {
                            BitConstant::Zero
                        }
                    }
                    Operator::CaseNeq => {
                        if exact {
                            BitConstant::Zero
                        } else {
                            BitConstant::One
                        }
                    }
                    _ => return None,
                };
                let result = Builder::new(self.arena).bit_val(digit);
                return self.finish(result, v1, Some(v2));
            }
            if self.op.is_bitwise() {
                if d1.len() != d2.len() {
                    return None;
                }
                let digits = fold_bitwise_digits(d1, d2, self.op)?;
                let result = Builder::new(self.arena).bitvector_val(&digits);
                let ty = self.sem.type_for_constant(self.arena, result)?;
                typing::attach_syntactic_type(self.arena, result, ty);
                return self.finish(result, v1, Some(v2));
            }
            return None;
        }

        // Plain 01 vectors fold through their integer images.
        let s1 = self.operand_is_signed(v1);
        let s2 = self.operand_is_signed(v2);
        let i1 = typing::bits_to_i64(d1, s1)?;
        let i2 = typing::bits_to_i64(d2, s2)?;
        let r = self.resolve_real_as_ints(i1, i2, v1, v2)?;
        self.finish(r, v1, Some(v2))
    }

    /// Integer-image folding for 01-vectors: produce a bare result that
    /// `finish` converts back to the vector type.
    fn resolve_real_as_ints(
        &mut self,
        i1: i64,
        i2: i64,
        v1: NodeId,
        v2: NodeId,
    ) -> Option<NodeId> {
        if self.op.is_relational() {
            let result = match self.op {
                Operator::Eq | Operator::CaseEq => i1 == i2,
                Operator::Neq | Operator::CaseNeq => i1 != i2,
                Operator::Gt => i1 > i2,
                Operator::Lt => i1 < i2,
                Operator::Ge => i1 >= i2,
                Operator::Le => i1 <= i2,
                _ => return None,
            };
            return Some(Builder::new(self.arena).bool_val(result));
        }
        let v = match self.op {
            Operator::Plus => i1.wrapping_add(i2),
            Operator::Minus => i1.wrapping_sub(i2),
            Operator::Mult => i1.wrapping_mul(i2),
            Operator::Div => {
                if i2 == 0 {
                    return None;
                }
                if self.opts.behavior != Behavior::Aggressive && i1 % i2 != 0 {
                    return None;
                }
                i1 / i2
            }
            Operator::BAnd => i1 & i2,
            Operator::BOr => i1 | i2,
            Operator::BXor => i1 ^ i2,
            _ => {
                let _ = (v1, v2);
                return None;
            }
        };
        Some(Builder::new(self.arena).int_val(v))
    }

    /// Bitvector shifted by an integer amount: string-level shift with
    /// zero or sign fill.
    fn bv_int(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if self.op.is_arithmetic() || self.op.is_relational() {
            let d1 = self.bv_of(v1);
            if !d1.chars().all(|c| c == '0' || c == '1') {
                return None;
            }
            let signed = self.operand_is_signed(v1);
            let i1 = typing::bits_to_i64(&d1, signed)?;
            let i2 = self.arena.int_value(v2)?;
            let r = self.resolve_real_as_ints(i1, i2, v1, v2)?;
            return self.finish(r, v1, Some(v2));
        }
        if self.op.is_shift() {
            let d1 = self.bv_of(v1);
            let amount = self.arena.int_value(v2)?;
            if amount < 0 {
                return None;
            }
            let n = (amount as usize).min(d1.len());
            let width = d1.len();
            let shifted = match self.op {
                Operator::Sll | Operator::Sla => {
                    let mut s: String = d1[n..].to_string();
                    s.extend(std::iter::repeat('0').take(n));
                    s
                }
                Operator::Srl => {
                    let mut s: String = std::iter::repeat('0').take(n).collect();
                    s.push_str(&d1[..width - n]);
                    s
                }
                Operator::Sra => {
                    let fill = if self.operand_is_signed(v1) {
                        d1.chars().next().unwrap_or('0')
                    } else {
                        '0'
                    };
                    let mut s: String = std::iter::repeat(fill).take(n).collect();
                    s.push_str(&d1[..width - n]);
                    s
                }
                _ => return None,
            };
            let result = Builder::new(self.arena).bitvector_val(&shifted);
            return self.finish(result, v1, Some(v2));
        }
        None
    }

    fn int_bv(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if !(self.op.is_arithmetic() || self.op.is_relational() || self.op.is_shift()) {
            return None;
        }
        let d2 = self.bv_of(v2);
        if !d2.chars().all(|c| c == '0' || c == '1') {
            return None;
        }
        let signed = self.operand_is_signed(v2);
        let i1 = self.arena.int_value(v1)?;
        let i2 = typing::bits_to_i64(&d2, signed)?;
        let r = self.resolve_real_as_ints(i1, i2, v1, v2)?;
        self.finish(r, v1, Some(v2))
    }

    fn bv_numeric_via_int(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        if !self.op.is_arithmetic() {
            return None;
        }
        let (bv, num, bv_left) = if self.arena.kind(v1) == NodeKind::BitvectorVal {
            (v1, v2, true)
        } else {
            (v2, v1, false)
        };
        let digits = self.bv_of(bv);
        if !digits.chars().all(|c| c == '0' || c == '1') {
            return None;
        }
        let signed = self.operand_is_signed(bv);
        let iv = typing::bits_to_i64(&digits, signed)? as f64;
        let rn = self.num(num)?;
        let (r1, r2) = if bv_left { (iv, rn) } else { (rn, iv) };
        self.resolve_real(r1, r2, v1, v2)
    }

    // ========================================================================
    // STRINGS & TIME
    // ========================================================================

    fn string_string(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        let (s1, s2) = match (self.arena.node(v1), self.arena.node(v2)) {
            (Node::StringVal(a), Node::StringVal(b)) => (a.value.clone(), b.value.clone()),
            _ => return None,
        };
        if self.op.is_relational() {
            let result = match self.op {
                Operator::Eq | Operator::CaseEq => s1 == s2,
                Operator::Neq | Operator::CaseNeq => s1 != s2,
                Operator::Lt => s1 < s2,
                Operator::Gt => s1 > s2,
                Operator::Le => s1 <= s2,
                Operator::Ge => s1 >= s2,
                _ => return None,
            };
            let bv = Builder::new(self.arena).bool_val(result);
            return self.finish(bv, v1, Some(v2));
        }
        if self.op == Operator::Concat || self.op == Operator::Plus {
            let rty = self.returned_type(v1, Some(v2))?;
            let joined = format!("{s1}{s2}");
            let result = Builder::new(self.arena).string_val(&joined);
            typing::attach_syntactic_type(self.arena, result, rty);
            return Some(result);
        }
        None
    }

    fn time_time(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        let (t1, t2) = match (self.arena.node(v1), self.arena.node(v2)) {
            (Node::TimeVal(a), Node::TimeVal(b)) => (a.clone(), b.clone()),
            _ => return None,
        };
        // Normalize to the smaller unit before combining.
        let unit = t1.unit.min(t2.unit);
        let r1 = t1.value * t1.unit.in_fs() / unit.in_fs();
        let r2 = t2.value * t2.unit.in_fs() / unit.in_fs();
        self.fold_time(r1, r2, unit)
    }

    /// Fold an operation over normalized time magnitudes. Arithmetic
    /// keeps the unit; relational operators compare the magnitudes.
    fn fold_time(&mut self, r1: f64, r2: f64, unit: TimeUnit) -> Option<NodeId> {
        if self.op.is_relational() {
            let result = match self.op {
                Operator::Eq | Operator::CaseEq => r1 == r2,
                Operator::Neq | Operator::CaseNeq => r1 != r2,
                Operator::Gt => r1 > r2,
                Operator::Lt => r1 < r2,
                Operator::Ge => r1 >= r2,
                Operator::Le => r1 <= r2,
                _ => return None,
            };
            return Some(Builder::new(self.arena).bool_val(result));
        }
        let value = match self.op {
            Operator::Plus => r1 + r2,
            Operator::Minus => r1 - r2,
            Operator::Mult => r1 * r2,
            Operator::Div => {
                if r2 == 0.0 {
                    return None;
                }
                r1 / r2
            }
            _ => return None,
        };
        Some(Builder::new(self.arena).time_val(value, unit))
    }

    // ========================================================================
    // EQUAL SUBTREES
    // ========================================================================

    fn equal_operands(&mut self, v1: NodeId, v2: NodeId) -> Option<NodeId> {
        let eq_opts = EqualsOptions {
            check_constexpr_flag: false,
            ..Default::default()
        };
        if !equals(self.arena, v1, v2, eq_opts) {
            return None;
        }
        let rty = self.returned_type(v1, Some(v2))?;
        let is_logic = type_is_logic(self.arena, rty);
        self.arena.free_subtree(rty);

        match self.op {
            Operator::Eq | Operator::Neq => {
                // `x == x ⇒ X` when x may be X: fold only non-logic.
                if is_logic {
                    return None;
                }
                let bv = Builder::new(self.arena).bool_val(self.op == Operator::Eq);
                self.finish(bv, v1, Some(v2))
            }
            Operator::CaseEq | Operator::CaseNeq => {
                let bv = Builder::new(self.arena).bool_val(self.op == Operator::CaseEq);
                self.finish(bv, v1, Some(v2))
            }
            Operator::Gt | Operator::Lt => {
                if is_logic {
                    return None;
                }
                let bv = Builder::new(self.arena).bool_val(false);
                self.finish(bv, v1, Some(v2))
            }
            Operator::Ge | Operator::Le => {
                if is_logic {
                    return None;
                }
                let bv = Builder::new(self.arena).bool_val(true);
                self.finish(bv, v1, Some(v2))
            }
            Operator::And | Operator::Or | Operator::BAnd | Operator::BOr => {
                Some(self.copy(v1))
            }
            Operator::Xor => {
                let bv = Builder::new(self.arena).bool_val(false);
                self.finish(bv, v1, Some(v2))
            }
            Operator::BXor => {
                let iv = Builder::new(self.arena).int_val(0);
                self.finish(iv, v1, Some(v2))
            }
            Operator::Plus => self.double_value(v1),
            Operator::Minus => {
                let iv = Builder::new(self.arena).int_val(0);
                self.finish(iv, v1, Some(v2))
            }
            Operator::Div => {
                let iv = Builder::new(self.arena).int_val(1);
                self.finish(iv, v1, Some(v2))
            }
            _ => None,
        }
    }

    /// `x + x ⇒ 2 · x`, keeping the factor typed like `x` so the product
    /// types under the semantics; abandoned otherwise.
    fn double_value(&mut self, v1: NodeId) -> Option<NodeId> {
        let t1 = semantic_type(self.arena, self.sem, v1)?;
        let t1_copy = deep_copy(self.arena, t1);
        let mut b = Builder::new(self.arena);
        let two = b.int_val(2);
        typing::attach_syntactic_type(self.arena, two, t1_copy);
        let x = self.copy(v1);
        let product = Builder::new(self.arena).binary(Operator::Mult, two, x);
        if semantic_type(self.arena, self.sem, product).is_none() {
            self.arena.free_subtree(product);
            return None;
        }
        Some(product)
    }
}

/// Truncate a value to its declared `width` low bits, zero-extended.
fn mask_to_width(value: i64, width: u64) -> i64 {
    if width == 0 || width >= 64 {
        return value;
    }
    let mask = (!0u64) >> (64 - width);
    (value as u64 & mask) as i64
}

/// Nine-valued bitwise tables over digit strings of equal length.
fn fold_bitwise_digits(d1: &str, d2: &str, op: Operator) -> Option<String> {
    let mut out = String::with_capacity(d1.len());
    for (a, b) in d1.chars().zip(d2.chars()) {
        let ba = BitConstant::from_char(a)?;
        let bb = BitConstant::from_char(b)?;
        let digit = match op {
            Operator::BAnd => {
                if ba.is_low() || bb.is_low() {
                    '0'
                } else if ba.is_high() && bb.is_high() {
                    '1'
                } else {
                    'X'
                }
            }
            Operator::BOr => {
                if ba.is_high() || bb.is_high() {
                    '1'
                } else if ba.is_low() && bb.is_low() {
                    '0'
                } else {
                    'X'
                }
            }
            Operator::BXor => {
                if (ba.is_high() && bb.is_low()) || (ba.is_low() && bb.is_high()) {
                    '1'
                } else if (ba.is_low() && bb.is_low()) || (ba.is_high() && bb.is_high()) {
                    '0'
                } else {
                    'X'
                }
            }
            _ => return None,
        };
        out.push(digit);
    }
    Some(out)
}
