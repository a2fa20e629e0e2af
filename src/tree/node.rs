//! The node sum type and its child-slot machinery.
//!
//! Every rewrite in the crate is a `match` over [`Node`] with a default
//! "not applicable" arm. The child-slot functions below are the only places
//! that know where every variant keeps its children; everything else
//! (traversal, copy, equality, replacement) is built on them.

use crate::base::Name;
use crate::tree::NodeId;
use crate::tree::action::*;
use crate::tree::decl::*;
use crate::tree::types::*;
use crate::tree::value::*;

/// Discriminant of [`Node`], used for dispatch and ordering.
///
/// Declaration order here IS the kind rank of the canonical total order
/// ([`compare`]): references and expressions precede constant literals, so
/// sorting commutative operands in ascending order settles constants on
/// the right, where the folding and rebalancing rules look for them.
///
/// [`compare`]: crate::tree::compare::compare
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    // values
    Identifier,
    FieldReference,
    Member,
    Slice,
    Expression,
    Cast,
    FunctionCall,
    Aggregate,
    AggregateAlt,
    RecordValue,
    RecordValueAlt,
    When,
    WhenAlt,
    With,
    WithAlt,
    Range,
    BitVal,
    BitvectorVal,
    BoolVal,
    CharVal,
    IntVal,
    RealVal,
    StringVal,
    TimeVal,
    // types
    BitT,
    BoolT,
    CharT,
    IntT,
    RealT,
    StringT,
    BitvectorT,
    ArrayT,
    SignedT,
    UnsignedT,
    EnumT,
    RecordT,
    ReferenceT,
    PointerT,
    FileT,
    TimeT,
    TypeReference,
    ViewReference,
    // declarations
    DataDeclaration,
    SubProgram,
    TypeDef,
    TypeTp,
    Library,
    LibraryDef,
    View,
    Entity,
    DesignUnit,
    Contents,
    System,
    // actions
    Assign,
    If,
    IfAlt,
    Switch,
    SwitchAlt,
    For,
    While,
    Return,
    Break,
    Continue,
    ProcedureCall,
    Wait,
    ValueStatement,
    GlobalAction,
    // processes and structure
    StateTable,
    State,
    Transition,
    Instance,
    ForGenerate,
    IfGenerate,
    PortAssign,
    ParameterAssign,
    ValueTpAssign,
    TypeTpAssign,
}

/// A HIF object. Exactly one parent owns each node (see [`Arena`]).
///
/// [`Arena`]: crate::tree::Arena
#[derive(Clone, Debug)]
pub enum Node {
    BitVal(BitVal),
    BitvectorVal(BitvectorVal),
    BoolVal(BoolVal),
    CharVal(CharVal),
    IntVal(IntVal),
    RealVal(RealVal),
    StringVal(StringVal),
    TimeVal(TimeVal),
    Identifier(Identifier),
    FieldReference(FieldReference),
    Member(Member),
    Slice(Slice),
    Expression(Expression),
    Cast(Cast),
    FunctionCall(FunctionCall),
    Aggregate(Aggregate),
    AggregateAlt(AggregateAlt),
    RecordValue(RecordValue),
    RecordValueAlt(RecordValueAlt),
    When(When),
    WhenAlt(WhenAlt),
    With(With),
    WithAlt(WithAlt),
    Range(Range),
    BitT(BitT),
    BoolT(BoolT),
    CharT(CharT),
    IntT(IntT),
    RealT(RealT),
    StringT(StringT),
    BitvectorT(BitvectorT),
    ArrayT(ArrayT),
    SignedT(SignedT),
    UnsignedT(UnsignedT),
    EnumT(EnumT),
    RecordT(RecordT),
    ReferenceT(ReferenceT),
    PointerT(PointerT),
    FileT(FileT),
    TimeT(TimeT),
    TypeReference(TypeReference),
    ViewReference(ViewReference),
    DataDeclaration(DataDeclaration),
    SubProgram(SubProgram),
    TypeDef(TypeDef),
    TypeTp(TypeTp),
    Library(Library),
    LibraryDef(LibraryDef),
    View(View),
    Entity(Entity),
    DesignUnit(DesignUnit),
    Contents(Contents),
    System(System),
    Assign(Assign),
    If(If),
    IfAlt(IfAlt),
    Switch(Switch),
    SwitchAlt(SwitchAlt),
    For(For),
    While(While),
    Return(Return),
    Break(Break),
    Continue(Continue),
    ProcedureCall(ProcedureCall),
    Wait(Wait),
    ValueStatement(ValueStatement),
    GlobalAction(GlobalAction),
    StateTable(StateTable),
    State(State),
    Transition(Transition),
    Instance(Instance),
    ForGenerate(ForGenerate),
    IfGenerate(IfGenerate),
    PortAssign(PortAssign),
    ParameterAssign(ParameterAssign),
    ValueTpAssign(ValueTpAssign),
    TypeTpAssign(TypeTpAssign),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::BitVal(_) => NodeKind::BitVal,
            Node::BitvectorVal(_) => NodeKind::BitvectorVal,
            Node::BoolVal(_) => NodeKind::BoolVal,
            Node::CharVal(_) => NodeKind::CharVal,
            Node::IntVal(_) => NodeKind::IntVal,
            Node::RealVal(_) => NodeKind::RealVal,
            Node::StringVal(_) => NodeKind::StringVal,
            Node::TimeVal(_) => NodeKind::TimeVal,
            Node::Identifier(_) => NodeKind::Identifier,
            Node::FieldReference(_) => NodeKind::FieldReference,
            Node::Member(_) => NodeKind::Member,
            Node::Slice(_) => NodeKind::Slice,
            Node::Expression(_) => NodeKind::Expression,
            Node::Cast(_) => NodeKind::Cast,
            Node::FunctionCall(_) => NodeKind::FunctionCall,
            Node::Aggregate(_) => NodeKind::Aggregate,
            Node::AggregateAlt(_) => NodeKind::AggregateAlt,
            Node::RecordValue(_) => NodeKind::RecordValue,
            Node::RecordValueAlt(_) => NodeKind::RecordValueAlt,
            Node::When(_) => NodeKind::When,
            Node::WhenAlt(_) => NodeKind::WhenAlt,
            Node::With(_) => NodeKind::With,
            Node::WithAlt(_) => NodeKind::WithAlt,
            Node::Range(_) => NodeKind::Range,
            Node::BitT(_) => NodeKind::BitT,
            Node::BoolT(_) => NodeKind::BoolT,
            Node::CharT(_) => NodeKind::CharT,
            Node::IntT(_) => NodeKind::IntT,
            Node::RealT(_) => NodeKind::RealT,
            Node::StringT(_) => NodeKind::StringT,
            Node::BitvectorT(_) => NodeKind::BitvectorT,
            Node::ArrayT(_) => NodeKind::ArrayT,
            Node::SignedT(_) => NodeKind::SignedT,
            Node::UnsignedT(_) => NodeKind::UnsignedT,
            Node::EnumT(_) => NodeKind::EnumT,
            Node::RecordT(_) => NodeKind::RecordT,
            Node::ReferenceT(_) => NodeKind::ReferenceT,
            Node::PointerT(_) => NodeKind::PointerT,
            Node::FileT(_) => NodeKind::FileT,
            Node::TimeT(_) => NodeKind::TimeT,
            Node::TypeReference(_) => NodeKind::TypeReference,
            Node::ViewReference(_) => NodeKind::ViewReference,
            Node::DataDeclaration(_) => NodeKind::DataDeclaration,
            Node::SubProgram(_) => NodeKind::SubProgram,
            Node::TypeDef(_) => NodeKind::TypeDef,
            Node::TypeTp(_) => NodeKind::TypeTp,
            Node::Library(_) => NodeKind::Library,
            Node::LibraryDef(_) => NodeKind::LibraryDef,
            Node::View(_) => NodeKind::View,
            Node::Entity(_) => NodeKind::Entity,
            Node::DesignUnit(_) => NodeKind::DesignUnit,
            Node::Contents(_) => NodeKind::Contents,
            Node::System(_) => NodeKind::System,
            Node::Assign(_) => NodeKind::Assign,
            Node::If(_) => NodeKind::If,
            Node::IfAlt(_) => NodeKind::IfAlt,
            Node::Switch(_) => NodeKind::Switch,
            Node::SwitchAlt(_) => NodeKind::SwitchAlt,
            Node::For(_) => NodeKind::For,
            Node::While(_) => NodeKind::While,
            Node::Return(_) => NodeKind::Return,
            Node::Break(_) => NodeKind::Break,
            Node::Continue(_) => NodeKind::Continue,
            Node::ProcedureCall(_) => NodeKind::ProcedureCall,
            Node::Wait(_) => NodeKind::Wait,
            Node::ValueStatement(_) => NodeKind::ValueStatement,
            Node::GlobalAction(_) => NodeKind::GlobalAction,
            Node::StateTable(_) => NodeKind::StateTable,
            Node::State(_) => NodeKind::State,
            Node::Transition(_) => NodeKind::Transition,
            Node::Instance(_) => NodeKind::Instance,
            Node::ForGenerate(_) => NodeKind::ForGenerate,
            Node::IfGenerate(_) => NodeKind::IfGenerate,
            Node::PortAssign(_) => NodeKind::PortAssign,
            Node::ParameterAssign(_) => NodeKind::ParameterAssign,
            Node::ValueTpAssign(_) => NodeKind::ValueTpAssign,
            Node::TypeTpAssign(_) => NodeKind::TypeTpAssign,
        }
    }

    /// Declared name, for the variants that carry one.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Node::Identifier(x) => Some(&x.name),
            Node::FieldReference(x) => Some(&x.field),
            Node::FunctionCall(x) => Some(&x.name),
            Node::TypeReference(x) => Some(&x.name),
            Node::ViewReference(x) => Some(&x.name),
            Node::DataDeclaration(x) => Some(&x.name),
            Node::SubProgram(x) => Some(&x.name),
            Node::TypeDef(x) => Some(&x.name),
            Node::TypeTp(x) => Some(&x.name),
            Node::Library(x) => Some(&x.name),
            Node::LibraryDef(x) => Some(&x.name),
            Node::View(x) => Some(&x.name),
            Node::Entity(x) => Some(&x.name),
            Node::DesignUnit(x) => Some(&x.name),
            Node::System(x) => Some(&x.name),
            Node::ProcedureCall(x) => Some(&x.name),
            Node::StateTable(x) => Some(&x.name),
            Node::State(x) => Some(&x.name),
            Node::Transition(x) => Some(&x.name),
            Node::Instance(x) => Some(&x.name),
            Node::PortAssign(x) => Some(&x.name),
            Node::ParameterAssign(x) => Some(&x.name),
            Node::ValueTpAssign(x) => Some(&x.name),
            Node::TypeTpAssign(x) => Some(&x.name),
            _ => None,
        }
    }

    /// Rename, for the variants that carry a name.
    pub fn set_name(&mut self, name: Name) -> bool {
        match self {
            Node::Identifier(x) => x.name = name,
            Node::FieldReference(x) => x.field = name,
            Node::FunctionCall(x) => x.name = name,
            Node::TypeReference(x) => x.name = name,
            Node::ViewReference(x) => x.name = name,
            Node::DataDeclaration(x) => x.name = name,
            Node::SubProgram(x) => x.name = name,
            Node::TypeDef(x) => x.name = name,
            Node::TypeTp(x) => x.name = name,
            Node::LibraryDef(x) => x.name = name,
            Node::View(x) => x.name = name,
            Node::DesignUnit(x) => x.name = name,
            Node::ProcedureCall(x) => x.name = name,
            Node::StateTable(x) => x.name = name,
            Node::Instance(x) => x.name = name,
            Node::PortAssign(x) => x.name = name,
            Node::ParameterAssign(x) => x.name = name,
            Node::ValueTpAssign(x) => x.name = name,
            Node::TypeTpAssign(x) => x.name = name,
            _ => return false,
        }
        true
    }

    pub fn is_value(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::BitVal
                | NodeKind::BitvectorVal
                | NodeKind::BoolVal
                | NodeKind::CharVal
                | NodeKind::IntVal
                | NodeKind::RealVal
                | NodeKind::StringVal
                | NodeKind::TimeVal
                | NodeKind::Identifier
                | NodeKind::FieldReference
                | NodeKind::Member
                | NodeKind::Slice
                | NodeKind::Expression
                | NodeKind::Cast
                | NodeKind::FunctionCall
                | NodeKind::Aggregate
                | NodeKind::RecordValue
                | NodeKind::When
                | NodeKind::With
                | NodeKind::Range
        )
    }

    /// A constant literal (carries a value the folding engine understands).
    pub fn is_const_value(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::BitVal
                | NodeKind::BitvectorVal
                | NodeKind::BoolVal
                | NodeKind::CharVal
                | NodeKind::IntVal
                | NodeKind::RealVal
                | NodeKind::StringVal
                | NodeKind::TimeVal
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::BitT
                | NodeKind::BoolT
                | NodeKind::CharT
                | NodeKind::IntT
                | NodeKind::RealT
                | NodeKind::StringT
                | NodeKind::BitvectorT
                | NodeKind::ArrayT
                | NodeKind::SignedT
                | NodeKind::UnsignedT
                | NodeKind::EnumT
                | NodeKind::RecordT
                | NodeKind::ReferenceT
                | NodeKind::PointerT
                | NodeKind::FileT
                | NodeKind::TimeT
                | NodeKind::TypeReference
                | NodeKind::ViewReference
        )
    }

    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::DataDeclaration
                | NodeKind::SubProgram
                | NodeKind::TypeDef
                | NodeKind::TypeTp
                | NodeKind::LibraryDef
                | NodeKind::View
                | NodeKind::Entity
                | NodeKind::DesignUnit
                | NodeKind::Contents
                | NodeKind::System
                | NodeKind::StateTable
                | NodeKind::State
                | NodeKind::Instance
        )
    }

    pub fn is_action(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::Assign
                | NodeKind::If
                | NodeKind::Switch
                | NodeKind::For
                | NodeKind::While
                | NodeKind::Return
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::ProcedureCall
                | NodeKind::Wait
                | NodeKind::ValueStatement
        )
    }

    /// A scope that name resolution searches through.
    pub fn is_scope(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::StateTable
                | NodeKind::SubProgram
                | NodeKind::Contents
                | NodeKind::View
                | NodeKind::Entity
                | NodeKind::DesignUnit
                | NodeKind::LibraryDef
                | NodeKind::System
                | NodeKind::For
                | NodeKind::ForGenerate
                | NodeKind::RecordT
                | NodeKind::EnumT
        )
    }

    /// Children in slot order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.push_children(&mut out);
        out
    }

    /// Push every child id into `out`, in slot order.
    pub fn push_children(&self, out: &mut Vec<NodeId>) {
        fn opt(o: &Option<NodeId>, out: &mut Vec<NodeId>) {
            if let Some(id) = o {
                out.push(*id);
            }
        }
        match self {
            Node::BitVal(x) => opt(&x.ty, out),
            Node::BitvectorVal(x) => opt(&x.ty, out),
            Node::BoolVal(x) => opt(&x.ty, out),
            Node::CharVal(x) => opt(&x.ty, out),
            Node::IntVal(x) => opt(&x.ty, out),
            Node::RealVal(x) => opt(&x.ty, out),
            Node::StringVal(x) => opt(&x.ty, out),
            Node::TimeVal(x) => opt(&x.ty, out),
            Node::Identifier(_) => {}
            Node::FieldReference(x) => out.push(x.prefix),
            Node::Member(x) => out.extend([x.prefix, x.index]),
            Node::Slice(x) => out.extend([x.prefix, x.span]),
            Node::Expression(x) => {
                out.push(x.lhs);
                opt(&x.rhs, out);
            }
            Node::Cast(x) => out.extend([x.ty, x.value]),
            Node::FunctionCall(x) => {
                opt(&x.instance, out);
                out.extend_from_slice(&x.template_args);
                out.extend_from_slice(&x.args);
            }
            Node::Aggregate(x) => {
                out.extend_from_slice(&x.alts);
                opt(&x.others, out);
            }
            Node::AggregateAlt(x) => {
                out.extend_from_slice(&x.indices);
                out.push(x.value);
            }
            Node::RecordValue(x) => out.extend_from_slice(&x.alts),
            Node::RecordValueAlt(x) => out.push(x.value),
            Node::When(x) => {
                out.extend_from_slice(&x.alts);
                opt(&x.default, out);
            }
            Node::WhenAlt(x) => out.extend([x.condition, x.value]),
            Node::With(x) => {
                out.push(x.condition);
                out.extend_from_slice(&x.alts);
                opt(&x.default, out);
            }
            Node::WithAlt(x) => {
                out.extend_from_slice(&x.conditions);
                out.push(x.value);
            }
            Node::Range(x) => {
                opt(&x.left, out);
                opt(&x.right, out);
            }
            Node::BitT(_) | Node::BoolT(_) | Node::CharT(_) | Node::TimeT(_) => {}
            Node::IntT(x) => opt(&x.span, out),
            Node::RealT(x) => opt(&x.span, out),
            Node::StringT(x) => opt(&x.span_info, out),
            Node::BitvectorT(x) => opt(&x.span, out),
            Node::ArrayT(x) => {
                opt(&x.span, out);
                out.push(x.element);
            }
            Node::SignedT(x) => opt(&x.span, out),
            Node::UnsignedT(x) => opt(&x.span, out),
            Node::EnumT(x) => out.extend_from_slice(&x.values),
            Node::RecordT(x) => out.extend_from_slice(&x.fields),
            Node::ReferenceT(x) => out.push(x.referenced),
            Node::PointerT(x) => out.push(x.pointed),
            Node::FileT(x) => out.push(x.element),
            Node::TypeReference(x) => out.extend_from_slice(&x.template_args),
            Node::ViewReference(x) => out.extend_from_slice(&x.template_args),
            Node::DataDeclaration(x) => {
                out.push(x.ty);
                opt(&x.init, out);
            }
            Node::SubProgram(x) => {
                if let SubKind::Function { ret } = &x.kind {
                    out.push(*ret);
                }
                out.extend_from_slice(&x.template_params);
                out.extend_from_slice(&x.params);
                opt(&x.state_table, out);
            }
            Node::TypeDef(x) => {
                out.extend_from_slice(&x.template_params);
                out.push(x.ty);
            }
            Node::TypeTp(x) => opt(&x.default, out),
            Node::Library(_) => {}
            Node::LibraryDef(x) => out.extend_from_slice(&x.declarations),
            Node::View(x) => {
                out.extend_from_slice(&x.template_params);
                opt(&x.entity, out);
                opt(&x.contents, out);
            }
            Node::Entity(x) => out.extend_from_slice(&x.ports),
            Node::DesignUnit(x) => out.extend_from_slice(&x.views),
            Node::Contents(x) => {
                out.extend_from_slice(&x.libraries);
                out.extend_from_slice(&x.declarations);
                out.extend_from_slice(&x.instances);
                out.extend_from_slice(&x.state_tables);
                out.extend_from_slice(&x.generates);
                opt(&x.global_action, out);
            }
            Node::System(x) => {
                out.extend_from_slice(&x.library_defs);
                out.extend_from_slice(&x.declarations);
                out.extend_from_slice(&x.design_units);
            }
            Node::Assign(x) => out.extend([x.target, x.source]),
            Node::If(x) => {
                out.extend_from_slice(&x.alts);
                out.extend_from_slice(&x.default);
            }
            Node::IfAlt(x) => {
                out.push(x.condition);
                out.extend_from_slice(&x.actions);
            }
            Node::Switch(x) => {
                out.push(x.condition);
                out.extend_from_slice(&x.alts);
                out.extend_from_slice(&x.default);
            }
            Node::SwitchAlt(x) => {
                out.extend_from_slice(&x.conditions);
                out.extend_from_slice(&x.actions);
            }
            Node::For(x) => {
                out.extend_from_slice(&x.init_declarations);
                out.extend_from_slice(&x.init_values);
                opt(&x.condition, out);
                out.extend_from_slice(&x.step_actions);
                out.extend_from_slice(&x.actions);
            }
            Node::While(x) => {
                out.push(x.condition);
                out.extend_from_slice(&x.actions);
            }
            Node::Return(x) => opt(&x.value, out),
            Node::Break(_) | Node::Continue(_) => {}
            Node::ProcedureCall(x) => {
                opt(&x.instance, out);
                out.extend_from_slice(&x.template_args);
                out.extend_from_slice(&x.args);
            }
            Node::Wait(x) => {
                out.extend_from_slice(&x.conditions);
                opt(&x.time, out);
            }
            Node::ValueStatement(x) => out.push(x.value),
            Node::GlobalAction(x) => out.extend_from_slice(&x.actions),
            Node::StateTable(x) => {
                out.extend_from_slice(&x.sensitivity);
                out.extend_from_slice(&x.declarations);
                out.extend_from_slice(&x.states);
            }
            Node::State(x) => out.extend_from_slice(&x.actions),
            Node::Transition(x) => {
                out.extend_from_slice(&x.guards);
                out.extend_from_slice(&x.actions);
            }
            Node::Instance(x) => {
                out.push(x.referenced);
                out.extend_from_slice(&x.port_assigns);
            }
            Node::ForGenerate(x) => {
                out.extend_from_slice(&x.init_declarations);
                out.extend_from_slice(&x.init_values);
                opt(&x.condition, out);
                out.extend_from_slice(&x.step_actions);
                out.push(x.body);
            }
            Node::IfGenerate(x) => out.extend([x.condition, x.body]),
            Node::PortAssign(x) => out.push(x.value),
            Node::ParameterAssign(x) => out.push(x.value),
            Node::ValueTpAssign(x) => out.push(x.value),
            Node::TypeTpAssign(x) => out.push(x.ty),
        }
    }

    /// Replace the first slot holding `old` with `new`. Returns `false`
    /// when `old` is not a child.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> bool {
        let mut done = false;
        self.walk_slots_mut(&mut |slot| {
            if !done && *slot == old {
                *slot = new;
                done = true;
            }
        });
        done
    }

    /// Remove `id` from an optional or list slot. Returns `false` when `id`
    /// sits in a required single slot (callers must `replace` instead).
    pub fn remove_child(&mut self, id: NodeId) -> bool {
        if self.clear_optional_slot(id) {
            return true;
        }
        if let Some(list) = self.list_containing_mut(id) {
            if let Some(pos) = list.iter().position(|&x| x == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Visit `&mut NodeId` for every child slot: required singles, engaged
    /// options, and each list element, in declaration order.
    pub fn walk_slots_mut(&mut self, f: &mut dyn FnMut(&mut NodeId)) {
        fn opt(o: &mut Option<NodeId>, f: &mut dyn FnMut(&mut NodeId)) {
            if let Some(id) = o.as_mut() {
                f(id);
            }
        }
        fn list(v: &mut [NodeId], f: &mut dyn FnMut(&mut NodeId)) {
            for id in v {
                f(id);
            }
        }
        match self {
            Node::BitVal(x) => opt(&mut x.ty, f),
            Node::BitvectorVal(x) => opt(&mut x.ty, f),
            Node::BoolVal(x) => opt(&mut x.ty, f),
            Node::CharVal(x) => opt(&mut x.ty, f),
            Node::IntVal(x) => opt(&mut x.ty, f),
            Node::RealVal(x) => opt(&mut x.ty, f),
            Node::StringVal(x) => opt(&mut x.ty, f),
            Node::TimeVal(x) => opt(&mut x.ty, f),
            Node::Identifier(_) => {}
            Node::FieldReference(x) => f(&mut x.prefix),
            Node::Member(x) => {
                f(&mut x.prefix);
                f(&mut x.index);
            }
            Node::Slice(x) => {
                f(&mut x.prefix);
                f(&mut x.span);
            }
            Node::Expression(x) => {
                f(&mut x.lhs);
                opt(&mut x.rhs, f);
            }
            Node::Cast(x) => {
                f(&mut x.ty);
                f(&mut x.value);
            }
            Node::FunctionCall(x) => {
                opt(&mut x.instance, f);
                list(&mut x.template_args, f);
                list(&mut x.args, f);
            }
            Node::Aggregate(x) => {
                list(&mut x.alts, f);
                opt(&mut x.others, f);
            }
            Node::AggregateAlt(x) => {
                list(&mut x.indices, f);
                f(&mut x.value);
            }
            Node::RecordValue(x) => list(&mut x.alts, f),
            Node::RecordValueAlt(x) => f(&mut x.value),
            Node::When(x) => {
                list(&mut x.alts, f);
                opt(&mut x.default, f);
            }
            Node::WhenAlt(x) => {
                f(&mut x.condition);
                f(&mut x.value);
            }
            Node::With(x) => {
                f(&mut x.condition);
                list(&mut x.alts, f);
                opt(&mut x.default, f);
            }
            Node::WithAlt(x) => {
                list(&mut x.conditions, f);
                f(&mut x.value);
            }
            Node::Range(x) => {
                opt(&mut x.left, f);
                opt(&mut x.right, f);
            }
            Node::BitT(_) | Node::BoolT(_) | Node::CharT(_) | Node::TimeT(_) => {}
            Node::IntT(x) => opt(&mut x.span, f),
            Node::RealT(x) => opt(&mut x.span, f),
            Node::StringT(x) => opt(&mut x.span_info, f),
            Node::BitvectorT(x) => opt(&mut x.span, f),
            Node::ArrayT(x) => {
                opt(&mut x.span, f);
                f(&mut x.element);
            }
            Node::SignedT(x) => opt(&mut x.span, f),
            Node::UnsignedT(x) => opt(&mut x.span, f),
            Node::EnumT(x) => list(&mut x.values, f),
            Node::RecordT(x) => list(&mut x.fields, f),
            Node::ReferenceT(x) => f(&mut x.referenced),
            Node::PointerT(x) => f(&mut x.pointed),
            Node::FileT(x) => f(&mut x.element),
            Node::TypeReference(x) => list(&mut x.template_args, f),
            Node::ViewReference(x) => list(&mut x.template_args, f),
            Node::DataDeclaration(x) => {
                f(&mut x.ty);
                opt(&mut x.init, f);
            }
            Node::SubProgram(x) => {
                if let SubKind::Function { ret } = &mut x.kind {
                    f(ret);
                }
                list(&mut x.template_params, f);
                list(&mut x.params, f);
                opt(&mut x.state_table, f);
            }
            Node::TypeDef(x) => {
                list(&mut x.template_params, f);
                f(&mut x.ty);
            }
            Node::TypeTp(x) => opt(&mut x.default, f),
            Node::Library(_) => {}
            Node::LibraryDef(x) => list(&mut x.declarations, f),
            Node::View(x) => {
                list(&mut x.template_params, f);
                opt(&mut x.entity, f);
                opt(&mut x.contents, f);
            }
            Node::Entity(x) => list(&mut x.ports, f),
            Node::DesignUnit(x) => list(&mut x.views, f),
            Node::Contents(x) => {
                list(&mut x.libraries, f);
                list(&mut x.declarations, f);
                list(&mut x.instances, f);
                list(&mut x.state_tables, f);
                list(&mut x.generates, f);
                opt(&mut x.global_action, f);
            }
            Node::System(x) => {
                list(&mut x.library_defs, f);
                list(&mut x.declarations, f);
                list(&mut x.design_units, f);
            }
            Node::Assign(x) => {
                f(&mut x.target);
                f(&mut x.source);
            }
            Node::If(x) => {
                list(&mut x.alts, f);
                list(&mut x.default, f);
            }
            Node::IfAlt(x) => {
                f(&mut x.condition);
                list(&mut x.actions, f);
            }
            Node::Switch(x) => {
                f(&mut x.condition);
                list(&mut x.alts, f);
                list(&mut x.default, f);
            }
            Node::SwitchAlt(x) => {
                list(&mut x.conditions, f);
                list(&mut x.actions, f);
            }
            Node::For(x) => {
                list(&mut x.init_declarations, f);
                list(&mut x.init_values, f);
                opt(&mut x.condition, f);
                list(&mut x.step_actions, f);
                list(&mut x.actions, f);
            }
            Node::While(x) => {
                f(&mut x.condition);
                list(&mut x.actions, f);
            }
            Node::Return(x) => opt(&mut x.value, f),
            Node::Break(_) | Node::Continue(_) => {}
            Node::ProcedureCall(x) => {
                opt(&mut x.instance, f);
                list(&mut x.template_args, f);
                list(&mut x.args, f);
            }
            Node::Wait(x) => {
                list(&mut x.conditions, f);
                opt(&mut x.time, f);
            }
            Node::ValueStatement(x) => f(&mut x.value),
            Node::GlobalAction(x) => list(&mut x.actions, f),
            Node::StateTable(x) => {
                list(&mut x.sensitivity, f);
                list(&mut x.declarations, f);
                list(&mut x.states, f);
            }
            Node::State(x) => list(&mut x.actions, f),
            Node::Transition(x) => {
                list(&mut x.guards, f);
                list(&mut x.actions, f);
            }
            Node::Instance(x) => {
                f(&mut x.referenced);
                list(&mut x.port_assigns, f);
            }
            Node::ForGenerate(x) => {
                list(&mut x.init_declarations, f);
                list(&mut x.init_values, f);
                opt(&mut x.condition, f);
                list(&mut x.step_actions, f);
                f(&mut x.body);
            }
            Node::IfGenerate(x) => {
                f(&mut x.condition);
                f(&mut x.body);
            }
            Node::PortAssign(x) => f(&mut x.value),
            Node::ParameterAssign(x) => f(&mut x.value),
            Node::ValueTpAssign(x) => f(&mut x.value),
            Node::TypeTpAssign(x) => f(&mut x.ty),
        }
    }

    fn clear_optional_slot(&mut self, id: NodeId) -> bool {
        fn take(o: &mut Option<NodeId>, id: NodeId) -> bool {
            if *o == Some(id) {
                *o = None;
                true
            } else {
                false
            }
        }
        match self {
            Node::BitVal(x) => take(&mut x.ty, id),
            Node::BitvectorVal(x) => take(&mut x.ty, id),
            Node::BoolVal(x) => take(&mut x.ty, id),
            Node::CharVal(x) => take(&mut x.ty, id),
            Node::IntVal(x) => take(&mut x.ty, id),
            Node::RealVal(x) => take(&mut x.ty, id),
            Node::StringVal(x) => take(&mut x.ty, id),
            Node::TimeVal(x) => take(&mut x.ty, id),
            Node::Expression(x) => take(&mut x.rhs, id),
            Node::FunctionCall(x) => take(&mut x.instance, id),
            Node::Aggregate(x) => take(&mut x.others, id),
            Node::When(x) => take(&mut x.default, id),
            Node::With(x) => take(&mut x.default, id),
            Node::Range(x) => take(&mut x.left, id) || take(&mut x.right, id),
            Node::IntT(x) => take(&mut x.span, id),
            Node::RealT(x) => take(&mut x.span, id),
            Node::StringT(x) => take(&mut x.span_info, id),
            Node::BitvectorT(x) => take(&mut x.span, id),
            Node::ArrayT(x) => take(&mut x.span, id),
            Node::SignedT(x) => take(&mut x.span, id),
            Node::UnsignedT(x) => take(&mut x.span, id),
            Node::DataDeclaration(x) => take(&mut x.init, id),
            Node::SubProgram(x) => take(&mut x.state_table, id),
            Node::TypeTp(x) => take(&mut x.default, id),
            Node::View(x) => take(&mut x.entity, id) || take(&mut x.contents, id),
            Node::Contents(x) => take(&mut x.global_action, id),
            Node::Return(x) => take(&mut x.value, id),
            Node::ProcedureCall(x) => take(&mut x.instance, id),
            Node::Wait(x) => take(&mut x.time, id),
            Node::For(x) => take(&mut x.condition, id),
            Node::ForGenerate(x) => take(&mut x.condition, id),
            _ => false,
        }
    }

    /// The list slot containing `id`, when `id` sits in one.
    pub fn list_containing_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        macro_rules! find_in {
            ($($list:expr),+ $(,)?) => {
                $( if $list.contains(&id) { return Some(&mut $list); } )+
            };
        }
        match self {
            Node::FunctionCall(x) => { find_in!(x.template_args, x.args); }
            Node::Aggregate(x) => { find_in!(x.alts); }
            Node::AggregateAlt(x) => { find_in!(x.indices); }
            Node::RecordValue(x) => { find_in!(x.alts); }
            Node::When(x) => { find_in!(x.alts); }
            Node::With(x) => { find_in!(x.alts); }
            Node::WithAlt(x) => { find_in!(x.conditions); }
            Node::EnumT(x) => { find_in!(x.values); }
            Node::RecordT(x) => { find_in!(x.fields); }
            Node::TypeReference(x) => { find_in!(x.template_args); }
            Node::ViewReference(x) => { find_in!(x.template_args); }
            Node::SubProgram(x) => { find_in!(x.template_params, x.params); }
            Node::TypeDef(x) => { find_in!(x.template_params); }
            Node::LibraryDef(x) => { find_in!(x.declarations); }
            Node::View(x) => { find_in!(x.template_params); }
            Node::Entity(x) => { find_in!(x.ports); }
            Node::DesignUnit(x) => { find_in!(x.views); }
            Node::Contents(x) => {
                find_in!(
                    x.libraries,
                    x.declarations,
                    x.instances,
                    x.state_tables,
                    x.generates,
                );
            }
            Node::System(x) => { find_in!(x.library_defs, x.declarations, x.design_units); }
            Node::If(x) => { find_in!(x.alts, x.default); }
            Node::IfAlt(x) => { find_in!(x.actions); }
            Node::Switch(x) => { find_in!(x.alts, x.default); }
            Node::SwitchAlt(x) => { find_in!(x.conditions, x.actions); }
            Node::For(x) => {
                find_in!(
                    x.init_declarations,
                    x.init_values,
                    x.step_actions,
                    x.actions,
                );
            }
            Node::While(x) => { find_in!(x.actions); }
            Node::ProcedureCall(x) => { find_in!(x.template_args, x.args); }
            Node::Wait(x) => { find_in!(x.conditions); }
            Node::GlobalAction(x) => { find_in!(x.actions); }
            Node::StateTable(x) => { find_in!(x.sensitivity, x.declarations, x.states); }
            Node::State(x) => { find_in!(x.actions); }
            Node::Transition(x) => { find_in!(x.guards, x.actions); }
            Node::Instance(x) => { find_in!(x.port_assigns); }
            Node::ForGenerate(x) => {
                find_in!(x.init_declarations, x.init_values, x.step_actions);
            }
            _ => {}
        }
        None
    }
}
