//! Semantic type inference.
//!
//! Every well-formed value has a unique semantic type under the active
//! language semantics; failure to derive one is an explicit `None`, never a
//! default. Computed types are cached on the arena and must be reset when
//! a mutation could change them.

use crate::semantics::LanguageSemantics;
use crate::tree::copy::deep_copy;
use crate::tree::value::Direction;
use crate::tree::{Arena, Node, NodeId, NodeKind};

// ============================================================================
// SPANS
// ============================================================================

/// The declared span of a type: bitvector/array/signed/unsigned span,
/// integer precision, string length information.
pub fn type_span(arena: &Arena, ty: NodeId) -> Option<NodeId> {
    match arena.node(ty) {
        Node::IntT(x) => x.span,
        Node::RealT(x) => x.span,
        Node::BitvectorT(x) => x.span,
        Node::ArrayT(x) => x.span,
        Node::SignedT(x) => x.span,
        Node::UnsignedT(x) => x.span,
        Node::StringT(x) => x.span_info,
        _ => None,
    }
}

/// Install `span` (a `Range`) as the span of `ty`, freeing any previous
/// one. Returns false when the type has no span slot.
pub fn set_type_span(arena: &mut Arena, ty: NodeId, span: NodeId) -> bool {
    let old = type_span(arena, ty);
    if old == Some(span) {
        return true;
    }
    let slot_set = match arena.node_mut(ty) {
        Node::IntT(x) => {
            x.span = Some(span);
            true
        }
        Node::RealT(x) => {
            x.span = Some(span);
            true
        }
        Node::BitvectorT(x) => {
            x.span = Some(span);
            true
        }
        Node::ArrayT(x) => {
            x.span = Some(span);
            true
        }
        Node::SignedT(x) => {
            x.span = Some(span);
            true
        }
        Node::UnsignedT(x) => {
            x.span = Some(span);
            true
        }
        Node::StringT(x) => {
            x.span_info = Some(span);
            true
        }
        _ => false,
    };
    if !slot_set {
        return false;
    }
    arena.claim(ty, span);
    if let Some(old) = old {
        arena.force_disown(old);
        arena.free_subtree(old);
    }
    true
}

/// Minimum bound of a range: the right bound for `downto`, the left for
/// `upto`.
pub fn range_min_bound(arena: &Arena, range: NodeId) -> Option<NodeId> {
    match arena.node(range) {
        Node::Range(r) => match r.direction {
            Direction::Downto => r.right,
            Direction::Upto => r.left,
        },
        _ => None,
    }
}

/// Maximum bound of a range.
pub fn range_max_bound(arena: &Arena, range: NodeId) -> Option<NodeId> {
    match arena.node(range) {
        Node::Range(r) => match r.direction {
            Direction::Downto => r.left,
            Direction::Upto => r.right,
        },
        _ => None,
    }
}

/// Literal `(left, right)` bounds, when both are integer constants.
pub fn range_literal_bounds(arena: &Arena, range: NodeId) -> Option<(i64, i64)> {
    let Node::Range(r) = arena.node(range) else {
        return None;
    };
    let left = arena.int_value(r.left?)?;
    let right = arena.int_value(r.right?)?;
    Some((left, right))
}

/// Number of positions a range spans. Zero means symbolic/unknown; this
/// never panics.
pub fn span_bitwidth(arena: &Arena, range: NodeId) -> u64 {
    let Some((left, right)) = range_literal_bounds(arena, range) else {
        return 0;
    };
    let Node::Range(r) = arena.node(range) else {
        return 0;
    };
    let (min, max) = match r.direction {
        Direction::Downto => (right, left),
        Direction::Upto => (left, right),
    };
    if min > max {
        // Null range [-1 downto 0].
        return 0;
    }
    (max - min + 1) as u64
}

/// Bit width of a type: 1 for scalars, the span width for vectors and
/// integers. Zero when symbolic.
pub fn type_bitwidth(arena: &Arena, ty: NodeId) -> u64 {
    match arena.node(ty) {
        Node::BitT(_) | Node::BoolT(_) => 1,
        Node::CharT(_) => 8,
        _ => match type_span(arena, ty) {
            Some(span) => span_bitwidth(arena, span),
            None => 0,
        },
    }
}

// ============================================================================
// TYPE PREDICATES
// ============================================================================

pub fn type_is_signed(arena: &Arena, ty: NodeId) -> bool {
    match arena.node(ty) {
        Node::IntT(x) => x.signed,
        Node::BitvectorT(x) => x.signed,
        Node::ArrayT(x) => x.signed,
        Node::SignedT(_) => true,
        Node::RealT(_) => true,
        _ => false,
    }
}

pub fn type_is_logic(arena: &Arena, ty: NodeId) -> bool {
    match arena.node(ty) {
        Node::BitT(x) => x.logic,
        Node::BitvectorT(x) => x.logic,
        Node::SignedT(_) | Node::UnsignedT(_) => true,
        Node::ArrayT(x) => type_is_logic(arena, x.element),
        _ => false,
    }
}

pub fn type_is_resolved(arena: &Arena, ty: NodeId) -> bool {
    match arena.node(ty) {
        Node::BitT(x) => x.resolved,
        Node::BitvectorT(x) => x.resolved,
        _ => false,
    }
}

pub fn type_is_constexpr(arena: &Arena, ty: NodeId) -> bool {
    match arena.node(ty) {
        Node::BitT(x) => x.constexpr,
        Node::BoolT(x) => x.constexpr,
        Node::CharT(x) => x.constexpr,
        Node::IntT(x) => x.constexpr,
        Node::RealT(x) => x.constexpr,
        Node::StringT(x) => x.constexpr,
        Node::BitvectorT(x) => x.constexpr,
        Node::ArrayT(x) => x.constexpr,
        Node::SignedT(x) => x.constexpr,
        Node::UnsignedT(x) => x.constexpr,
        Node::TimeT(x) => x.constexpr,
        _ => false,
    }
}

pub fn set_type_constexpr(arena: &mut Arena, ty: NodeId, value: bool) {
    match arena.node_mut(ty) {
        Node::BitT(x) => x.constexpr = value,
        Node::BoolT(x) => x.constexpr = value,
        Node::CharT(x) => x.constexpr = value,
        Node::IntT(x) => x.constexpr = value,
        Node::RealT(x) => x.constexpr = value,
        Node::StringT(x) => x.constexpr = value,
        Node::BitvectorT(x) => x.constexpr = value,
        Node::ArrayT(x) => x.constexpr = value,
        Node::SignedT(x) => x.constexpr = value,
        Node::UnsignedT(x) => x.constexpr = value,
        Node::TimeT(x) => x.constexpr = value,
        _ => {}
    }
}

pub fn set_type_signed(arena: &mut Arena, ty: NodeId, value: bool) {
    match arena.node_mut(ty) {
        Node::IntT(x) => x.signed = value,
        Node::BitvectorT(x) => x.signed = value,
        Node::ArrayT(x) => x.signed = value,
        _ => {}
    }
}

/// Bitvector, signed, or unsigned: a packed vector of bits.
pub fn is_vector_type(arena: &Arena, ty: NodeId) -> bool {
    matches!(
        arena.kind(ty),
        NodeKind::BitvectorT | NodeKind::SignedT | NodeKind::UnsignedT
    )
}

/// Relative precision of two types, by bit width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrecisionCompare {
    Less,
    Equal,
    Greater,
    Unknown,
}

pub fn compare_precision(arena: &Arena, a: NodeId, b: NodeId) -> PrecisionCompare {
    let wa = type_bitwidth(arena, a);
    let wb = type_bitwidth(arena, b);
    if wa == 0 || wb == 0 {
        return PrecisionCompare::Unknown;
    }
    match wa.cmp(&wb) {
        std::cmp::Ordering::Less => PrecisionCompare::Less,
        std::cmp::Ordering::Equal => PrecisionCompare::Equal,
        std::cmp::Ordering::Greater => PrecisionCompare::Greater,
    }
}

// ============================================================================
// BASE TYPES
// ============================================================================

/// Unwrap named and wrapper types: `TypeReference`s are followed to the
/// referenced typedef's type (unless the typedef is opaque and
/// `follow_opaque` is false); `ReferenceT` wrappers are peeled.
pub fn base_type(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    ty: NodeId,
    follow_opaque: bool,
) -> NodeId {
    let mut current = ty;
    let mut fuel = 64;
    while fuel > 0 {
        fuel -= 1;
        match arena.node(current) {
            Node::ReferenceT(r) => current = r.referenced,
            Node::TypeReference(_) => {
                let Some(decl) = crate::resolve::get_declaration(arena, sem, current) else {
                    return current;
                };
                match arena.node(decl) {
                    Node::TypeDef(td) => {
                        if td.opaque && !follow_opaque {
                            return current;
                        }
                        current = td.ty;
                    }
                    Node::TypeTp(tp) => match tp.default {
                        Some(d) => current = d,
                        None => return current,
                    },
                    _ => return current,
                }
            }
            _ => return current,
        }
    }
    current
}

/// Base type of a value: `base_type` of its semantic type.
pub fn value_base_type(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    value: NodeId,
) -> Option<NodeId> {
    let ty = semantic_type(arena, sem, value)?;
    Some(base_type(arena, sem, ty, false))
}

// ============================================================================
// SEMANTIC TYPES
// ============================================================================

/// Semantic type of `value`, cached on the arena. The returned node is
/// owned by the cache: deep-copy before embedding it in the tree.
pub fn semantic_type(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    value: NodeId,
) -> Option<NodeId> {
    if let Some(&cached) = arena.type_cache.get(&value) {
        if arena.is_alive(cached) {
            return Some(cached);
        }
        arena.type_cache.remove(&value);
    }
    let computed = compute_semantic_type(arena, sem, value)?;
    arena.type_cache.insert(value, computed);
    Some(computed)
}

fn compute_semantic_type(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    value: NodeId,
) -> Option<NodeId> {
    match arena.node(value).clone() {
        Node::BitVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::BitvectorVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::BoolVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::CharVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::IntVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::RealVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::StringVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::TimeVal(x) => syntactic_or_constant(arena, sem, value, x.ty),
        Node::Identifier(_) => {
            let decl = crate::resolve::get_declaration(arena, sem, value)?;
            let decl_ty = match arena.node(decl) {
                Node::DataDeclaration(d) => d.ty,
                _ => return None,
            };
            Some(deep_copy(arena, decl_ty))
        }
        Node::FieldReference(fr) => {
            let prefix_ty = value_base_type(arena, sem, fr.prefix)?;
            let Node::RecordT(rec) = arena.node(prefix_ty).clone() else {
                return None;
            };
            for field in rec.fields {
                if let Node::DataDeclaration(d) = arena.node(field).clone() {
                    if d.name == fr.field {
                        return Some(deep_copy(arena, d.ty));
                    }
                }
            }
            None
        }
        Node::Member(_) => sem.member_semantic_type(arena, value),
        Node::Slice(s) => {
            let prefix_ty = value_base_type(arena, sem, s.prefix)?;
            let new_ty = deep_copy(arena, prefix_ty);
            let new_span = deep_copy(arena, s.span);
            if !set_type_span(arena, new_ty, new_span) {
                arena.free_subtree(new_ty);
                arena.free_subtree(new_span);
                return None;
            }
            Some(new_ty)
        }
        Node::Expression(e) => {
            let t1 = semantic_type(arena, sem, e.lhs)?;
            let t2 = match e.rhs {
                Some(rhs) => Some(semantic_type(arena, sem, rhs)?),
                None => None,
            };
            let info = sem.expr_type(arena, t1, t2, e.op, Some(value))?;
            // The precision tree is not cached; release it.
            if info.precision != info.returned {
                arena.free_subtree(info.precision);
            }
            Some(info.returned)
        }
        Node::Cast(c) => Some(deep_copy(arena, c.ty)),
        Node::FunctionCall(_) => {
            let decl = crate::resolve::get_declaration(arena, sem, value)?;
            match arena.node(decl).clone() {
                Node::SubProgram(sp) => match sp.kind {
                    crate::tree::decl::SubKind::Function { ret } => Some(deep_copy(arena, ret)),
                    crate::tree::decl::SubKind::Procedure => None,
                },
                _ => None,
            }
        }
        Node::Aggregate(agg) => {
            // Array of as many elements as the alternates describe, typed
            // by the first alternate's value.
            let first = agg
                .alts
                .first()
                .and_then(|&alt| match arena.node(alt) {
                    Node::AggregateAlt(a) => Some(a.value),
                    _ => None,
                })
                .or(agg.others)?;
            let elem_ty = semantic_type(arena, sem, first)?;
            let elem_copy = deep_copy(arena, elem_ty);
            let count = aggregate_alt_count(arena, &agg.alts)?;
            let mut b = crate::tree::build::Builder::new(arena);
            let span = b.downto(count as i64 - 1, 0);
            Some(b.array_type(span, elem_copy, false))
        }
        Node::RecordValue(_) => None,
        Node::When(w) => {
            let first = w
                .alts
                .first()
                .and_then(|&alt| match arena.node(alt) {
                    Node::WhenAlt(a) => Some(a.value),
                    _ => None,
                })
                .or(w.default)?;
            let ty = semantic_type(arena, sem, first)?;
            Some(deep_copy(arena, ty))
        }
        Node::With(w) => {
            let first = w
                .alts
                .first()
                .and_then(|&alt| match arena.node(alt) {
                    Node::WithAlt(a) => Some(a.value),
                    _ => None,
                })
                .or(w.default)?;
            let ty = semantic_type(arena, sem, first)?;
            Some(deep_copy(arena, ty))
        }
        Node::Range(_) => {
            let mut b = crate::tree::build::Builder::new(arena);
            Some(b.int_type(None, true))
        }
        _ => None,
    }
}

fn syntactic_or_constant(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    value: NodeId,
    ty: Option<NodeId>,
) -> Option<NodeId> {
    match ty {
        Some(t) => Some(deep_copy(arena, t)),
        None => sem.type_for_constant(arena, value),
    }
}

fn aggregate_alt_count(arena: &Arena, alts: &[NodeId]) -> Option<u64> {
    let mut count = 0u64;
    for &alt in alts {
        let Node::AggregateAlt(a) = arena.node(alt) else {
            return None;
        };
        if a.indices.is_empty() {
            count += 1;
            continue;
        }
        for &idx in &a.indices {
            match arena.node(idx) {
                Node::Range(_) => {
                    let w = span_bitwidth(arena, idx);
                    if w == 0 {
                        return None;
                    }
                    count += w;
                }
                _ => count += 1,
            }
        }
    }
    Some(count)
}

/// Purge cached semantic types for the subtree rooted at `root` (or only
/// the root when `deep` is false).
pub fn reset_types(arena: &mut Arena, root: NodeId, deep: bool) {
    let mut ids = vec![root];
    if deep {
        let mut stack = vec![root];
        ids.clear();
        while let Some(id) = stack.pop() {
            stack.extend(arena.children(id));
            ids.push(id);
        }
    }
    for id in ids {
        if let Some(cached) = arena.type_cache.remove(&id) {
            if arena.is_alive(cached) && arena.parent(cached).is_none() {
                arena.free_subtree(cached);
            }
        }
    }
}

// ============================================================================
// CONSTANT TRANSFORMATION
// ============================================================================

/// Convert the constant `cv` to the syntactic type `target`, producing a
/// fresh constant (with `target`'s copy installed as its type), or `None`
/// when the conversion is lossy or not meaningful.
pub fn transform_constant(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    cv: NodeId,
    target: NodeId,
) -> Option<NodeId> {
    use crate::tree::value::*;
    let target_base = base_type(arena, sem, target, false);
    let node = arena.node(cv).clone();

    let result: Option<Node> = match arena.node(target_base).clone() {
        Node::IntT(_) => constant_to_i64(arena, &node).map(|v| {
            Node::IntVal(IntVal { value: v, ty: None })
        }),
        Node::RealT(_) => constant_to_f64(arena, &node).map(|v| {
            Node::RealVal(RealVal { value: v, ty: None })
        }),
        Node::BoolT(_) => match &node {
            Node::BoolVal(x) => Some(Node::BoolVal(BoolVal {
                value: x.value,
                ty: None,
            })),
            Node::BitVal(x) if x.value.is_01() => Some(Node::BoolVal(BoolVal {
                value: x.value.is_high(),
                ty: None,
            })),
            Node::IntVal(x) => Some(Node::BoolVal(BoolVal {
                value: x.value != 0,
                ty: None,
            })),
            _ => None,
        },
        Node::BitT(t) => match &node {
            Node::BitVal(x) => {
                if !t.logic && !x.value.is_01() {
                    None
                } else {
                    Some(Node::BitVal(BitVal {
                        value: x.value,
                        ty: None,
                    }))
                }
            }
            Node::BoolVal(x) => Some(Node::BitVal(BitVal {
                value: if x.value {
                    BitConstant::One
                } else {
                    BitConstant::Zero
                },
                ty: None,
            })),
            Node::IntVal(x) if x.value == 0 || x.value == 1 => Some(Node::BitVal(BitVal {
                value: if x.value == 1 {
                    BitConstant::One
                } else {
                    BitConstant::Zero
                },
                ty: None,
            })),
            _ => None,
        },
        Node::BitvectorT(t) => {
            let width = t.span.map(|s| span_bitwidth(arena, s)).unwrap_or(0);
            constant_to_bitvector(arena, &node, width, t.signed)
                .map(|digits| Node::BitvectorVal(BitvectorVal {
                    value: digits,
                    ty: None,
                }))
        }
        Node::SignedT(t) => {
            let width = t.span.map(|s| span_bitwidth(arena, s)).unwrap_or(0);
            constant_to_bitvector(arena, &node, width, true)
                .map(|digits| Node::BitvectorVal(BitvectorVal {
                    value: digits,
                    ty: None,
                }))
        }
        Node::UnsignedT(t) => {
            let width = t.span.map(|s| span_bitwidth(arena, s)).unwrap_or(0);
            constant_to_bitvector(arena, &node, width, false)
                .map(|digits| Node::BitvectorVal(BitvectorVal {
                    value: digits,
                    ty: None,
                }))
        }
        Node::CharT(_) => match &node {
            Node::CharVal(x) => Some(Node::CharVal(CharVal {
                value: x.value,
                ty: None,
            })),
            Node::IntVal(x) => u32::try_from(x.value)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Node::CharVal(CharVal { value: c, ty: None })),
            _ => None,
        },
        Node::StringT(_) => match &node {
            Node::StringVal(x) => Some(Node::StringVal(StringVal {
                value: x.value.clone(),
                ty: None,
            })),
            _ => None,
        },
        Node::TimeT(_) => match &node {
            Node::TimeVal(x) => Some(Node::TimeVal(TimeVal {
                value: x.value,
                unit: x.unit,
                ty: None,
            })),
            _ => None,
        },
        _ => None,
    };

    let new_node = result?;
    let id = arena.alloc(new_node);
    let ty_copy = deep_copy(arena, target);
    set_type_constexpr(arena, ty_copy, true);
    attach_syntactic_type(arena, id, ty_copy);
    Some(id)
}

fn constant_to_i64(arena: &Arena, node: &Node) -> Option<i64> {
    match node {
        Node::IntVal(x) => Some(x.value),
        Node::BoolVal(x) => Some(x.value as i64),
        Node::CharVal(x) => Some(x.value as i64),
        Node::BitVal(x) if x.value.is_01() => Some(x.value.is_high() as i64),
        Node::RealVal(x) if x.value.fract() == 0.0 => Some(x.value as i64),
        Node::BitvectorVal(x) if x.is_01() => {
            let _ = arena;
            bits_to_i64(&x.value, false)
        }
        _ => None,
    }
}

fn constant_to_f64(_arena: &Arena, node: &Node) -> Option<f64> {
    match node {
        Node::IntVal(x) => Some(x.value as f64),
        Node::RealVal(x) => Some(x.value),
        Node::CharVal(x) => Some(x.value as u32 as f64),
        Node::BoolVal(x) => Some(x.value as u8 as f64),
        _ => None,
    }
}

/// Interpret a `01` digit string as an integer (two's complement when
/// `signed` and the leading digit is 1).
pub fn bits_to_i64(digits: &str, signed: bool) -> Option<i64> {
    if digits.is_empty() || digits.len() > 64 {
        return None;
    }
    let mut value: u64 = 0;
    for c in digits.chars() {
        value = (value << 1)
            | match c {
                '0' => 0,
                '1' => 1,
                _ => return None,
            };
    }
    if signed && digits.len() < 64 && digits.starts_with('1') {
        let sign_extend = !0u64 << digits.len();
        return Some((value | sign_extend) as i64);
    }
    Some(value as i64)
}

/// Binary digit string of `value`, `width` digits wide (two's complement).
pub fn i64_to_bits(value: i64, width: u64) -> Option<String> {
    if width == 0 || width > 64 {
        return None;
    }
    let mut out = String::with_capacity(width as usize);
    for i in (0..width).rev() {
        out.push(if (value >> i) & 1 == 1 { '1' } else { '0' });
    }
    Some(out)
}

fn constant_to_bitvector(
    arena: &Arena,
    node: &Node,
    width: u64,
    signed: bool,
) -> Option<String> {
    let _ = arena;
    match node {
        Node::BitvectorVal(x) => {
            if width == 0 || x.value.len() as u64 == width {
                return Some(x.value.clone());
            }
            let len = x.value.len() as u64;
            if width < len {
                // Keep the rightmost digits.
                return Some(x.value[(len - width) as usize..].to_string());
            }
            let fill = if signed {
                x.value.chars().next().unwrap_or('0')
            } else {
                '0'
            };
            let mut out: String =
                std::iter::repeat(fill).take((width - len) as usize).collect();
            out.push_str(&x.value);
            Some(out)
        }
        Node::IntVal(x) => {
            if width == 0 {
                return None;
            }
            i64_to_bits(x.value, width)
        }
        Node::BitVal(x) if width <= 1 => Some(x.value.to_char().to_string()),
        Node::BoolVal(x) if width <= 1 => Some(if x.value { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

/// Attach `ty` as the syntactic type of the constant `cv`, replacing any
/// previous one.
pub fn attach_syntactic_type(arena: &mut Arena, cv: NodeId, ty: NodeId) {
    let old = syntactic_type(arena, cv);
    let set = match arena.node_mut(cv) {
        Node::BitVal(x) => {
            x.ty = Some(ty);
            true
        }
        Node::BitvectorVal(x) => {
            x.ty = Some(ty);
            true
        }
        Node::BoolVal(x) => {
            x.ty = Some(ty);
            true
        }
        Node::CharVal(x) => {
            x.ty = Some(ty);
            true
        }
        Node::IntVal(x) => {
            x.ty = Some(ty);
            true
        }
        Node::RealVal(x) => {
            x.ty = Some(ty);
            true
        }
        Node::StringVal(x) => {
            x.ty = Some(ty);
            true
        }
        Node::TimeVal(x) => {
            x.ty = Some(ty);
            true
        }
        _ => false,
    };
    if !set {
        arena.free_subtree(ty);
        return;
    }
    arena.claim(cv, ty);
    if let Some(old) = old {
        if old != ty {
            arena.force_disown(old);
            arena.free_subtree(old);
        }
    }
}

/// Syntactic type slot of a constant.
pub fn syntactic_type(arena: &Arena, cv: NodeId) -> Option<NodeId> {
    match arena.node(cv) {
        Node::BitVal(x) => x.ty,
        Node::BitvectorVal(x) => x.ty,
        Node::BoolVal(x) => x.ty,
        Node::CharVal(x) => x.ty,
        Node::IntVal(x) => x.ty,
        Node::RealVal(x) => x.ty,
        Node::StringVal(x) => x.ty,
        Node::TimeVal(x) => x.ty,
        _ => None,
    }
}

/// Ensure a constant placed in a typed position carries a syntactic type,
/// deriving one from the semantics when missing. Non-constants pass
/// through untouched.
pub fn assure_syntactic_type(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    value: NodeId,
) -> NodeId {
    if !arena.node(value).is_const_value() {
        return value;
    }
    if syntactic_type(arena, value).is_some() {
        return value;
    }
    if let Some(ty) = sem.type_for_constant(arena, value) {
        attach_syntactic_type(arena, value, ty);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::HifSemantics;
    use crate::tree::build::Builder;

    #[test]
    fn span_bitwidth_handles_directions_and_null() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let d = b.downto(7, 0);
        let u = b.upto(0, 7);
        let null = b.downto(-1, 0);
        assert_eq!(span_bitwidth(&arena, d), 8);
        assert_eq!(span_bitwidth(&arena, u), 8);
        assert_eq!(span_bitwidth(&arena, null), 0);
    }

    #[test]
    fn symbolic_span_is_zero_width() {
        let mut arena = Arena::new();
        let mut b = Builder::new(&mut arena);
        let n = b.identifier("W");
        let zero = b.int_val(0);
        let r = b.range(Direction::Downto, n, zero);
        assert_eq!(span_bitwidth(&arena, r), 0);
    }

    #[test]
    fn int_constant_types_itself() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let c = b.int_val(42);
        let ty = semantic_type(&mut arena, &sem, c).expect("typeable");
        assert!(matches!(arena.node(ty), Node::IntT(_)));
    }

    #[test]
    fn transform_int_to_bitvector_and_back() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let mut b = Builder::new(&mut arena);
        let c = b.int_val(5);
        let span = b.downto(3, 0);
        let bv_ty = b.bitvector_type(span, false, false);
        let bv = transform_constant(&mut arena, &sem, c, bv_ty).expect("convertible");
        match arena.node(bv) {
            Node::BitvectorVal(x) => assert_eq!(x.value, "0101"),
            other => panic!("expected bitvector value, got {other:?}"),
        }
        let int_ty = Builder::new(&mut arena).int32_type();
        let back = transform_constant(&mut arena, &sem, bv, int_ty).expect("convertible");
        assert_eq!(arena.int_value(back), Some(5));
    }

    #[test]
    fn bits_roundtrip_signed() {
        assert_eq!(bits_to_i64("1111", true), Some(-1));
        assert_eq!(bits_to_i64("1111", false), Some(15));
        assert_eq!(i64_to_bits(-1, 4).as_deref(), Some("1111"));
        assert_eq!(i64_to_bits(5, 4).as_deref(), Some("0101"));
    }
}
