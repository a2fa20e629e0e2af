//! Language semantics oracle.
//!
//! All language-dependent type rules live behind [`LanguageSemantics`]:
//! result/precision types of operators, canonical types of constant
//! literals, default values, cast-removal legality, boolean-context checks,
//! edge-call recognition, standard libraries. The engine never hardcodes a
//! dialect; every pass takes a `&dyn LanguageSemantics`.
//!
//! Every operation returns an explicit absence instead of failing: callers
//! must handle `None`.

mod dialect;
mod hif;
pub mod stdlib;
mod systemc;

pub use hif::HifSemantics;
pub use systemc::SystemCSemantics;

use crate::tree::{Arena, NodeId, Operator};

/// Successful result of [`LanguageSemantics::expr_type`]: the type the
/// expression yields and the internal precision the operation is computed
/// at. Both are freshly allocated parentless trees owned by the caller.
#[derive(Clone, Copy, Debug)]
pub struct ExprTypeInfo {
    pub returned: NodeId,
    pub precision: NodeId,
}

/// Verdict of [`LanguageSemantics::can_remove_cast_on_operands`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CastRemovalInfo {
    /// Removing the operand casts preserves the result.
    pub safe: bool,
    /// Also safe when the operator is a shift (shifts key their width off
    /// the left operand only).
    pub safe_on_shift: bool,
}

/// The pluggable per-dialect oracle.
pub trait LanguageSemantics: std::fmt::Debug {
    /// Dialect name for diagnostics.
    fn name(&self) -> &'static str;

    /// Result and precision types of applying `op` to operands of types
    /// `t1` (and `t2` for binary operators). `ctx` is the expression node
    /// when available, for context-sensitive rules.
    fn expr_type(
        &self,
        arena: &mut Arena,
        t1: NodeId,
        t2: Option<NodeId>,
        op: Operator,
        ctx: Option<NodeId>,
    ) -> Option<ExprTypeInfo>;

    /// Canonical syntactic type of a constant literal.
    fn type_for_constant(&self, arena: &mut Arena, cv: NodeId) -> Option<NodeId>;

    /// Initial value for a data declaration of type `ty`.
    fn default_value(&self, arena: &mut Arena, ty: NodeId, decl: Option<NodeId>)
    -> Option<NodeId>;

    /// May `ty` be the type of a template parameter?
    fn is_template_allowed_type(&self, arena: &Arena, ty: NodeId) -> bool;

    /// Native replacement for a template parameter type that is not
    /// allowed.
    fn template_allowed_type(&self, arena: &mut Arena, ty: NodeId) -> NodeId;

    /// `Some(replacement)` when `ty` is not a legal span bound, `None` when
    /// it already is.
    fn type_allowed_as_bound(&self, arena: &mut Arena, ty: NodeId) -> Option<NodeId>;

    /// May casts on the operands of an expression be dropped, given the
    /// typing of the original (`orig`) and of the cast-free (`simplified`)
    /// form?
    fn can_remove_cast_on_operands(
        &self,
        arena: &mut Arena,
        orig: &ExprTypeInfo,
        simplified: &ExprTypeInfo,
        op: Operator,
    ) -> CastRemovalInfo;

    /// Is `t1(t2(value: t3))` reducible to `t1(value)`?
    fn can_remove_internal_cast(
        &self,
        arena: &mut Arena,
        t1: NodeId,
        t2: NodeId,
        t3: NodeId,
    ) -> bool;

    /// Can a value of type `ty` stand in boolean (condition) position?
    fn check_condition(&self, arena: &mut Arena, ty: NodeId) -> bool;

    /// Rewrite forcing `value` into boolean position, when one is needed
    /// and possible. Returns the replacement (unattached).
    fn explicit_bool_conversion(&self, arena: &mut Arena, value: NodeId) -> Option<NodeId>;

    /// Is this function call an edge-detection builtin (`event`,
    /// `rising_edge`, …)?
    fn is_event_call(&self, arena: &Arena, call: NodeId) -> bool;

    /// Build (or fetch the blueprint of) a standard library by canonical
    /// name. The returned `LibraryDef` is parentless.
    fn standard_library(&self, arena: &mut Arena, name: &str) -> Option<NodeId>;

    /// Are slice indices on vectors zero-based in the emitted code?
    fn slice_type_is_rebased(&self) -> bool;

    /// Element type of `prefix[index]` for this member node.
    fn member_semantic_type(&self, arena: &mut Arena, member: NodeId) -> Option<NodeId>;

    /// Is an explicit cast from `source` to `target` expressible?
    fn is_cast_allowed(&self, arena: &mut Arena, target: NodeId, source: NodeId) -> bool;

    /// Native type a condition of type `ty` maps to.
    fn map_for_type(&self, arena: &mut Arena, ty: NodeId) -> Option<NodeId>;
}
