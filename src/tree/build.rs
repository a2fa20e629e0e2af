//! Node factory.
//!
//! Thin constructors over [`Arena::alloc`] so rewrite code reads like the
//! trees it builds. All constructors return parentless roots ready to be
//! claimed by a parent slot.

use crate::base::Name;
use crate::tree::action::*;
use crate::tree::decl::*;
use crate::tree::types::*;
use crate::tree::value::*;
use crate::tree::{Arena, Node, NodeId, Operator};

/// Factory over an arena borrow.
pub struct Builder<'a> {
    pub arena: &'a mut Arena,
}

impl<'a> Builder<'a> {
    pub fn new(arena: &'a mut Arena) -> Self {
        Self { arena }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.arena.alloc(node)
    }

    // ========================================================================
    // CONSTANTS
    // ========================================================================

    pub fn int_val(&mut self, value: i64) -> NodeId {
        self.alloc(Node::IntVal(IntVal { value, ty: None }))
    }

    pub fn typed_int_val(&mut self, value: i64, ty: NodeId) -> NodeId {
        self.alloc(Node::IntVal(IntVal { value, ty: Some(ty) }))
    }

    pub fn real_val(&mut self, value: f64) -> NodeId {
        self.alloc(Node::RealVal(RealVal { value, ty: None }))
    }

    pub fn bool_val(&mut self, value: bool) -> NodeId {
        self.alloc(Node::BoolVal(BoolVal { value, ty: None }))
    }

    pub fn char_val(&mut self, value: char) -> NodeId {
        self.alloc(Node::CharVal(CharVal { value, ty: None }))
    }

    pub fn bit_val(&mut self, value: BitConstant) -> NodeId {
        self.alloc(Node::BitVal(BitVal { value, ty: None }))
    }

    pub fn typed_bit_val(&mut self, value: BitConstant, ty: NodeId) -> NodeId {
        self.alloc(Node::BitVal(BitVal { value, ty: Some(ty) }))
    }

    pub fn bitvector_val(&mut self, digits: &str) -> NodeId {
        self.alloc(Node::BitvectorVal(BitvectorVal {
            value: digits.to_string(),
            ty: None,
        }))
    }

    pub fn string_val(&mut self, value: &str) -> NodeId {
        self.alloc(Node::StringVal(StringVal {
            value: value.to_string(),
            ty: None,
        }))
    }

    pub fn time_val(&mut self, value: f64, unit: TimeUnit) -> NodeId {
        self.alloc(Node::TimeVal(TimeVal {
            value,
            unit,
            ty: None,
        }))
    }

    // ========================================================================
    // REFERENCES & EXPRESSIONS
    // ========================================================================

    pub fn identifier(&mut self, name: impl Into<Name>) -> NodeId {
        self.alloc(Node::Identifier(Identifier { name: name.into() }))
    }

    pub fn field_reference(&mut self, prefix: NodeId, field: impl Into<Name>) -> NodeId {
        self.alloc(Node::FieldReference(FieldReference {
            prefix,
            field: field.into(),
        }))
    }

    pub fn member(&mut self, prefix: NodeId, index: NodeId) -> NodeId {
        self.alloc(Node::Member(Member { prefix, index }))
    }

    pub fn slice(&mut self, prefix: NodeId, span: NodeId) -> NodeId {
        self.alloc(Node::Slice(Slice { prefix, span }))
    }

    pub fn unary(&mut self, op: Operator, operand: NodeId) -> NodeId {
        self.alloc(Node::Expression(Expression {
            op,
            lhs: operand,
            rhs: None,
        }))
    }

    pub fn binary(&mut self, op: Operator, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.alloc(Node::Expression(Expression {
            op,
            lhs,
            rhs: Some(rhs),
        }))
    }

    pub fn cast(&mut self, ty: NodeId, value: NodeId) -> NodeId {
        self.alloc(Node::Cast(Cast { ty, value }))
    }

    pub fn function_call(
        &mut self,
        name: impl Into<Name>,
        instance: Option<NodeId>,
        args: Vec<NodeId>,
    ) -> NodeId {
        self.alloc(Node::FunctionCall(FunctionCall {
            name: name.into(),
            instance,
            template_args: Vec::new(),
            args,
        }))
    }

    pub fn parameter_assign(&mut self, name: impl Into<Name>, value: NodeId) -> NodeId {
        self.alloc(Node::ParameterAssign(ParameterAssign {
            name: name.into(),
            value,
        }))
    }

    // ========================================================================
    // RANGES & COMPOSITES
    // ========================================================================

    pub fn range(&mut self, direction: Direction, left: NodeId, right: NodeId) -> NodeId {
        self.alloc(Node::Range(Range {
            direction,
            left: Some(left),
            right: Some(right),
        }))
    }

    /// `[left downto right]` with literal bounds.
    pub fn downto(&mut self, left: i64, right: i64) -> NodeId {
        let l = self.int_val(left);
        let r = self.int_val(right);
        self.range(Direction::Downto, l, r)
    }

    /// `[left upto right]` with literal bounds.
    pub fn upto(&mut self, left: i64, right: i64) -> NodeId {
        let l = self.int_val(left);
        let r = self.int_val(right);
        self.range(Direction::Upto, l, r)
    }

    pub fn aggregate(&mut self, alts: Vec<NodeId>, others: Option<NodeId>) -> NodeId {
        self.alloc(Node::Aggregate(Aggregate { alts, others }))
    }

    pub fn aggregate_alt(&mut self, indices: Vec<NodeId>, value: NodeId) -> NodeId {
        self.alloc(Node::AggregateAlt(AggregateAlt { indices, value }))
    }

    pub fn when(&mut self, alts: Vec<NodeId>, default: Option<NodeId>) -> NodeId {
        self.alloc(Node::When(When { alts, default }))
    }

    pub fn when_alt(&mut self, condition: NodeId, value: NodeId) -> NodeId {
        self.alloc(Node::WhenAlt(WhenAlt { condition, value }))
    }

    pub fn with(&mut self, condition: NodeId, alts: Vec<NodeId>, default: Option<NodeId>) -> NodeId {
        self.alloc(Node::With(With {
            condition,
            alts,
            default,
        }))
    }

    pub fn with_alt(&mut self, conditions: Vec<NodeId>, value: NodeId) -> NodeId {
        self.alloc(Node::WithAlt(WithAlt { conditions, value }))
    }

    // ========================================================================
    // TYPES
    // ========================================================================

    pub fn bit_type(&mut self, logic: bool, resolved: bool) -> NodeId {
        self.alloc(Node::BitT(BitT {
            logic,
            resolved,
            constexpr: false,
        }))
    }

    pub fn bool_type(&mut self) -> NodeId {
        self.alloc(Node::BoolT(BoolT::default()))
    }

    pub fn int_type(&mut self, span: Option<NodeId>, signed: bool) -> NodeId {
        self.alloc(Node::IntT(IntT {
            span,
            signed,
            constexpr: false,
        }))
    }

    /// 32-bit signed integer with a `[31 downto 0]` span.
    pub fn int32_type(&mut self) -> NodeId {
        let span = self.downto(31, 0);
        self.int_type(Some(span), true)
    }

    pub fn real_type(&mut self) -> NodeId {
        self.alloc(Node::RealT(RealT {
            span: None,
            constexpr: false,
        }))
    }

    pub fn string_type(&mut self) -> NodeId {
        self.alloc(Node::StringT(StringT {
            span_info: None,
            constexpr: false,
        }))
    }

    pub fn time_type(&mut self) -> NodeId {
        self.alloc(Node::TimeT(TimeT::default()))
    }

    pub fn bitvector_type(&mut self, span: NodeId, logic: bool, signed: bool) -> NodeId {
        self.alloc(Node::BitvectorT(BitvectorT {
            span: Some(span),
            signed,
            logic,
            resolved: logic,
            constexpr: false,
        }))
    }

    pub fn array_type(&mut self, span: NodeId, element: NodeId, signed: bool) -> NodeId {
        self.alloc(Node::ArrayT(ArrayT {
            span: Some(span),
            element,
            signed,
            constexpr: false,
        }))
    }

    pub fn type_reference(&mut self, name: impl Into<Name>) -> NodeId {
        self.alloc(Node::TypeReference(TypeReference {
            name: name.into(),
            template_args: Vec::new(),
        }))
    }

    pub fn view_reference(
        &mut self,
        design_unit: impl Into<Name>,
        view: impl Into<Name>,
    ) -> NodeId {
        self.alloc(Node::ViewReference(ViewReference {
            design_unit: design_unit.into(),
            name: view.into(),
            template_args: Vec::new(),
        }))
    }

    // ========================================================================
    // DECLARATIONS & STRUCTURE
    // ========================================================================

    pub fn data_declaration(
        &mut self,
        kind: DataKind,
        name: impl Into<Name>,
        ty: NodeId,
        init: Option<NodeId>,
    ) -> NodeId {
        self.alloc(Node::DataDeclaration(DataDeclaration {
            name: name.into(),
            ty,
            init,
            kind,
        }))
    }

    pub fn signal(&mut self, name: impl Into<Name>, ty: NodeId, init: Option<NodeId>) -> NodeId {
        self.data_declaration(DataKind::Signal, name, ty, init)
    }

    pub fn variable(&mut self, name: impl Into<Name>, ty: NodeId, init: Option<NodeId>) -> NodeId {
        self.data_declaration(DataKind::Variable, name, ty, init)
    }

    pub fn port(
        &mut self,
        name: impl Into<Name>,
        direction: PortDirection,
        ty: NodeId,
    ) -> NodeId {
        self.data_declaration(DataKind::Port(direction), name, ty, None)
    }

    pub fn assign(&mut self, target: NodeId, source: NodeId) -> NodeId {
        self.alloc(Node::Assign(Assign { target, source }))
    }

    pub fn state(&mut self, name: impl Into<Name>, actions: Vec<NodeId>) -> NodeId {
        self.alloc(Node::State(State {
            name: name.into(),
            actions,
        }))
    }

    /// One-state method process.
    pub fn process(
        &mut self,
        name: impl Into<Name>,
        sensitivity: Vec<NodeId>,
        actions: Vec<NodeId>,
    ) -> NodeId {
        let name = name.into();
        let state = self.state(name.clone(), actions);
        self.alloc(Node::StateTable(StateTable {
            name,
            flavor: ProcessFlavor::Method,
            sensitivity,
            declarations: Vec::new(),
            states: vec![state],
        }))
    }

    pub fn contents(&mut self) -> NodeId {
        self.alloc(Node::Contents(Contents::empty()))
    }

    pub fn library(&mut self, name: impl Into<Name>, standard: bool, system: bool) -> NodeId {
        self.alloc(Node::Library(Library {
            name: name.into(),
            standard,
            system,
        }))
    }
}
