//! Type nodes.
//!
//! Vector-like types carry a span (a `Range` node); scalar numeric types may
//! carry one too, describing their precision. Every type has a `constexpr`
//! flag: the marker for types synthesized from constant literals, which
//! equality can be told to ignore.

use crate::base::Name;
use crate::tree::NodeId;

#[derive(Clone, Debug, Default)]
pub struct BitT {
    pub logic: bool,
    pub resolved: bool,
    pub constexpr: bool,
}

#[derive(Clone, Debug, Default)]
pub struct BoolT {
    pub constexpr: bool,
}

#[derive(Clone, Debug, Default)]
pub struct CharT {
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct IntT {
    pub span: Option<NodeId>,
    pub signed: bool,
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct RealT {
    pub span: Option<NodeId>,
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct StringT {
    /// Length information, when statically known.
    pub span_info: Option<NodeId>,
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct BitvectorT {
    pub span: Option<NodeId>,
    pub signed: bool,
    pub logic: bool,
    pub resolved: bool,
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct ArrayT {
    pub span: Option<NodeId>,
    pub element: NodeId,
    pub signed: bool,
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct SignedT {
    pub span: Option<NodeId>,
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct UnsignedT {
    pub span: Option<NodeId>,
    pub constexpr: bool,
}

/// Enumeration type owning its `EnumValue` declarations.
#[derive(Clone, Debug)]
pub struct EnumT {
    pub values: Vec<NodeId>,
    pub constexpr: bool,
}

/// Record type owning its `Field` declarations.
#[derive(Clone, Debug)]
pub struct RecordT {
    pub fields: Vec<NodeId>,
    pub constexpr: bool,
}

#[derive(Clone, Debug)]
pub struct ReferenceT {
    pub referenced: NodeId,
}

#[derive(Clone, Debug)]
pub struct PointerT {
    pub pointed: NodeId,
}

#[derive(Clone, Debug)]
pub struct FileT {
    pub element: NodeId,
}

#[derive(Clone, Debug, Default)]
pub struct TimeT {
    pub constexpr: bool,
}

/// Reference to a named, possibly parameterized type declaration
/// (`TypeDef` or `TypeTp`).
#[derive(Clone, Debug)]
pub struct TypeReference {
    pub name: Name,
    /// `ValueTpAssign`/`TypeTpAssign` bindings.
    pub template_args: Vec<NodeId>,
}

/// Reference to a named module (`View` of a `DesignUnit`).
#[derive(Clone, Debug)]
pub struct ViewReference {
    pub design_unit: Name,
    pub name: Name,
    pub template_args: Vec<NodeId>,
}
