//! The SystemC back-end dialect.
//!
//! Differs from the unifying semantics where C++ does: slice accessors are
//! zero-based, logic values cannot stand directly in condition position
//! (an explicit conversion is inserted), and the native condition type is
//! plain `bool`.

use crate::semantics::dialect::{self, Dialect};
use crate::semantics::{CastRemovalInfo, ExprTypeInfo, LanguageSemantics};
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::value::BitConstant;
use crate::tree::{Arena, Node, NodeId, Operator};

const DIALECT: Dialect = Dialect {
    slice_rebased: true,
    default_logic: BitConstant::X,
};

/// SystemC semantics.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCSemantics;

impl LanguageSemantics for SystemCSemantics {
    fn name(&self) -> &'static str {
        "systemc"
    }

    fn expr_type(
        &self,
        arena: &mut Arena,
        t1: NodeId,
        t2: Option<NodeId>,
        op: Operator,
        _ctx: Option<NodeId>,
    ) -> Option<ExprTypeInfo> {
        dialect::expr_type(arena, self, t1, t2, op)
    }

    fn type_for_constant(&self, arena: &mut Arena, cv: NodeId) -> Option<NodeId> {
        dialect::type_for_constant(arena, cv)
    }

    fn default_value(
        &self,
        arena: &mut Arena,
        ty: NodeId,
        decl: Option<NodeId>,
    ) -> Option<NodeId> {
        dialect::default_value(arena, self, ty, decl, &DIALECT)
    }

    fn is_template_allowed_type(&self, arena: &Arena, ty: NodeId) -> bool {
        dialect::is_template_allowed_type(arena, ty)
    }

    fn template_allowed_type(&self, arena: &mut Arena, ty: NodeId) -> NodeId {
        if dialect::is_template_allowed_type(arena, ty) {
            return deep_copy(arena, ty);
        }
        Builder::new(arena).int_type(None, true)
    }

    fn type_allowed_as_bound(&self, arena: &mut Arena, ty: NodeId) -> Option<NodeId> {
        dialect::type_allowed_as_bound(arena, ty)
    }

    fn can_remove_cast_on_operands(
        &self,
        arena: &mut Arena,
        orig: &ExprTypeInfo,
        simplified: &ExprTypeInfo,
        op: Operator,
    ) -> CastRemovalInfo {
        dialect::can_remove_cast_on_operands(arena, orig, simplified, op)
    }

    fn can_remove_internal_cast(
        &self,
        arena: &mut Arena,
        t1: NodeId,
        t2: NodeId,
        t3: NodeId,
    ) -> bool {
        dialect::can_remove_internal_cast(arena, t1, t2, t3)
    }

    fn check_condition(&self, arena: &mut Arena, ty: NodeId) -> bool {
        let base = crate::typing::base_type(arena, self, ty, false);
        if crate::typing::type_is_logic(arena, base) {
            // sc_logic needs an explicit conversion before `if`.
            return false;
        }
        dialect::condition_capable(arena, base)
    }

    fn explicit_bool_conversion(&self, arena: &mut Arena, value: NodeId) -> Option<NodeId> {
        // v  ⇒  (bool)(v == '1')
        let ty = crate::typing::semantic_type(arena, self, value)?;
        let logic = crate::typing::type_is_logic(arena, ty);
        let mut b = Builder::new(arena);
        if logic {
            let bit_ty = b.bit_type(true, true);
            let one = b.typed_bit_val(BitConstant::One, bit_ty);
            let cmp = b.binary(Operator::CaseEq, value, one);
            let bool_ty = b.bool_type();
            Some(b.cast(bool_ty, cmp))
        } else {
            let bool_ty = b.bool_type();
            Some(b.cast(bool_ty, value))
        }
    }

    fn is_event_call(&self, arena: &Arena, call: NodeId) -> bool {
        dialect::is_event_call(arena, call)
    }

    fn standard_library(&self, arena: &mut Arena, name: &str) -> Option<NodeId> {
        super::stdlib::build_standard_library(arena, name)
    }

    fn slice_type_is_rebased(&self) -> bool {
        DIALECT.slice_rebased
    }

    fn member_semantic_type(&self, arena: &mut Arena, member: NodeId) -> Option<NodeId> {
        dialect::member_semantic_type(arena, self, member)
    }

    fn is_cast_allowed(&self, arena: &mut Arena, target: NodeId, source: NodeId) -> bool {
        dialect::is_cast_allowed(arena, target, source)
    }

    fn map_for_type(&self, arena: &mut Arena, ty: NodeId) -> Option<NodeId> {
        match arena.node(ty) {
            Node::BoolT(_) | Node::BitT(_) | Node::IntT(_) => {
                Some(Builder::new(arena).bool_type())
            }
            _ => None,
        }
    }
}
