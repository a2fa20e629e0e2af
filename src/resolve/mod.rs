//! Reference resolution: symbol → declaration.
//!
//! Resolution searches outward from the symbol's enclosing scopes and is
//! deterministic: same tree, same answer. Results are cached on the arena;
//! passes that move or rewrite declarations must call
//! [`reset_declarations`] (or resolve with
//! [`GetDeclarationOptions::force_refresh`]) before trusting lookups
//! again.

use indexmap::IndexMap;

use crate::semantics::LanguageSemantics;
use crate::tree::{Arena, Node, NodeId, NodeKind};

/// Options for [`get_declaration_with`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GetDeclarationOptions {
    /// Ignore the cache and search again.
    pub force_refresh: bool,
    /// Search from this node's scope chain instead of the symbol's own.
    pub location: Option<NodeId>,
}

/// Options for [`get_all_references`].
#[derive(Clone, Copy, Default)]
pub struct GetReferencesOptions<'a> {
    /// Leave declarations living in standard libraries/views out of the
    /// map, to bound cost.
    pub skip_standard_declarations: bool,
    /// Extra per-occurrence filter; entries it rejects are not collected.
    pub collect_predicate: Option<&'a dyn Fn(&Arena, NodeId) -> bool>,
}

/// Resolve `symbol` to its declaration.
pub fn get_declaration(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    symbol: NodeId,
) -> Option<NodeId> {
    get_declaration_with(arena, sem, symbol, GetDeclarationOptions::default())
}

/// Resolve with options.
pub fn get_declaration_with(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    symbol: NodeId,
    opts: GetDeclarationOptions,
) -> Option<NodeId> {
    if !opts.force_refresh {
        if let Some(&cached) = arena.decl_cache.get(&symbol) {
            if arena.is_alive(cached) {
                return Some(cached);
            }
            arena.decl_cache.remove(&symbol);
        }
    }
    let found = search_declaration(arena, sem, symbol, opts.location)?;
    arena.decl_cache.insert(symbol, found);
    Some(found)
}

/// Record a known symbol → declaration association.
pub fn set_declaration(arena: &mut Arena, symbol: NodeId, decl: NodeId) {
    arena.decl_cache.insert(symbol, decl);
}

/// Drop cached resolutions for the subtree rooted at `root`.
pub fn reset_declarations(arena: &mut Arena, root: NodeId) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        stack.extend(arena.children(id));
        arena.decl_cache.remove(&id);
    }
}

/// All occurrences of `decl` inside `root`, in traversal order.
pub fn get_references(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    decl: NodeId,
    root: NodeId,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let mut kids = arena.children(id);
        kids.reverse();
        stack.extend(kids);
        if is_symbol(arena.node(id)) && get_declaration(arena, sem, id) == Some(decl) {
            out.push(id);
        }
    }
    out
}

/// Populate the full declaration → occurrences map for `root`.
pub fn get_all_references(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    root: NodeId,
    opts: GetReferencesOptions<'_>,
) -> IndexMap<NodeId, Vec<NodeId>> {
    let mut map: IndexMap<NodeId, Vec<NodeId>> = IndexMap::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let mut kids = arena.children(id);
        kids.reverse();
        stack.extend(kids);
        let node = arena.node(id);
        if node.is_declaration() && !node.is_value() {
            if !(opts.skip_standard_declarations && is_part_of_standard(arena, id)) {
                map.entry(id).or_default();
            }
            continue;
        }
        if !is_symbol(node) {
            continue;
        }
        if let Some(pred) = opts.collect_predicate {
            if !pred(arena, id) {
                continue;
            }
        }
        let Some(decl) = get_declaration(arena, sem, id) else {
            continue;
        };
        if opts.skip_standard_declarations && is_part_of_standard(arena, decl) {
            continue;
        }
        map.entry(decl).or_default().push(id);
    }
    map
}

/// Does this node refer to a declaration by name?
pub fn is_symbol(node: &Node) -> bool {
    matches!(
        node.kind(),
        NodeKind::Identifier
            | NodeKind::FieldReference
            | NodeKind::FunctionCall
            | NodeKind::ProcedureCall
            | NodeKind::TypeReference
            | NodeKind::ViewReference
            | NodeKind::Library
            | NodeKind::PortAssign
            | NodeKind::ParameterAssign
            | NodeKind::ValueTpAssign
            | NodeKind::TypeTpAssign
            | NodeKind::Instance
    )
}

/// Is `id` declared inside a standard library or standard view?
pub fn is_part_of_standard(arena: &Arena, id: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(n) = current {
        match arena.node(n) {
            Node::LibraryDef(l) if l.standard => return true,
            Node::View(v) if v.standard => return true,
            _ => {}
        }
        current = arena.parent(n);
    }
    false
}

// ============================================================================
// SEARCH
// ============================================================================

fn search_declaration(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    symbol: NodeId,
    location: Option<NodeId>,
) -> Option<NodeId> {
    let start = location.unwrap_or(symbol);
    match arena.node(symbol).clone() {
        Node::Identifier(id) => search_data_in_scopes(arena, start, &id.name),
        Node::FunctionCall(fc) => {
            search_subprogram(arena, sem, start, &fc.name, fc.instance)
        }
        Node::ProcedureCall(pc) => {
            search_subprogram(arena, sem, start, &pc.name, pc.instance)
        }
        Node::TypeReference(tr) => search_type_decl(arena, start, &tr.name),
        Node::ViewReference(vr) => search_view(arena, start, &vr.design_unit, &vr.name),
        Node::Library(lib) => search_library_def(arena, start, &lib.name),
        Node::Instance(inst) => get_declaration(arena, sem, inst.referenced),
        Node::FieldReference(fr) => {
            let prefix_ty = crate::typing::value_base_type(arena, sem, fr.prefix)?;
            let Node::RecordT(rec) = arena.node(prefix_ty).clone() else {
                return None;
            };
            rec.fields.into_iter().find(|&f| {
                matches!(arena.node(f), Node::DataDeclaration(d) if d.name == fr.field)
            })
        }
        Node::PortAssign(pa) => {
            let instance = crate::tree::nav::nearest_parent_of_kind(
                arena,
                symbol,
                NodeKind::Instance,
            )
            .or_else(|| arena.parent(symbol))?;
            let view = get_declaration(arena, sem, instance)?;
            let Node::View(v) = arena.node(view).clone() else {
                return None;
            };
            let entity = v.entity?;
            let Node::Entity(e) = arena.node(entity).clone() else {
                return None;
            };
            e.ports.into_iter().find(|&p| {
                matches!(arena.node(p), Node::DataDeclaration(d) if d.name == pa.name)
            })
        }
        Node::ParameterAssign(pa) => {
            let call = arena.parent(symbol)?;
            let sp = get_declaration(arena, sem, call)?;
            let Node::SubProgram(s) = arena.node(sp).clone() else {
                return None;
            };
            s.params.into_iter().find(|&p| {
                matches!(arena.node(p), Node::DataDeclaration(d) if d.name == pa.name)
            })
        }
        Node::ValueTpAssign(ta) => {
            search_template_param(arena, sem, symbol, &ta.name)
        }
        Node::TypeTpAssign(ta) => {
            search_template_param(arena, sem, symbol, &ta.name)
        }
        _ => None,
    }
}

fn search_template_param(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    assign: NodeId,
    name: &str,
) -> Option<NodeId> {
    let owner_ref = arena.parent(assign)?;
    let owner = get_declaration(arena, sem, owner_ref)?;
    let params = match arena.node(owner) {
        Node::SubProgram(s) => s.template_params.clone(),
        Node::TypeDef(t) => t.template_params.clone(),
        Node::View(v) => v.template_params.clone(),
        _ => return None,
    };
    params.into_iter().find(|&p| match arena.node(p) {
        Node::DataDeclaration(d) => d.name == name,
        Node::TypeTp(t) => t.name == name,
        _ => false,
    })
}

/// Scope chain of `start`, innermost first, ending at the system.
fn scope_chain(arena: &Arena, start: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if arena.node(id).is_scope() {
            out.push(id);
        }
        current = arena.parent(id);
    }
    out
}

fn search_data_in_scopes(arena: &Arena, start: NodeId, name: &str) -> Option<NodeId> {
    for scope in scope_chain(arena, start) {
        if let Some(found) = search_data_in_scope(arena, scope, name) {
            return Some(found);
        }
    }
    None
}

fn scope_declaration_lists(arena: &Arena, scope: NodeId) -> Vec<Vec<NodeId>> {
    match arena.node(scope) {
        Node::StateTable(x) => vec![x.declarations.clone()],
        Node::SubProgram(x) => vec![x.params.clone(), x.template_params.clone()],
        Node::Contents(x) => vec![x.declarations.clone()],
        Node::View(x) => {
            let mut lists = vec![x.template_params.clone()];
            if let Some(entity) = x.entity {
                if let Node::Entity(e) = arena.node(entity) {
                    lists.push(e.ports.clone());
                }
            }
            lists
        }
        Node::Entity(x) => vec![x.ports.clone()],
        Node::LibraryDef(x) => vec![x.declarations.clone()],
        Node::For(x) => vec![x.init_declarations.clone()],
        Node::ForGenerate(x) => vec![x.init_declarations.clone()],
        Node::RecordT(x) => vec![x.fields.clone()],
        Node::EnumT(x) => vec![x.values.clone()],
        Node::System(x) => {
            let mut lists = vec![x.declarations.clone()];
            // Standard-library declarations are visible everywhere.
            for &lib in &x.library_defs {
                if let Node::LibraryDef(l) = arena.node(lib) {
                    lists.push(l.declarations.clone());
                }
            }
            lists
        }
        _ => Vec::new(),
    }
}

fn search_data_in_scope(arena: &Arena, scope: NodeId, name: &str) -> Option<NodeId> {
    for list in scope_declaration_lists(arena, scope) {
        for decl in list {
            match arena.node(decl) {
                Node::DataDeclaration(d) if d.name == name => return Some(decl),
                // Enum values are visible wherever their typedef is.
                Node::TypeDef(td) => {
                    if let Node::EnumT(e) = arena.node(td.ty) {
                        for &v in &e.values {
                            if matches!(
                                arena.node(v),
                                Node::DataDeclaration(d) if d.name == name
                            ) {
                                return Some(v);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    None
}

fn search_subprogram(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    start: NodeId,
    name: &str,
    instance: Option<NodeId>,
) -> Option<NodeId> {
    let _ = sem;
    // A library-qualified call searches only that library.
    if let Some(inst) = instance {
        if let Node::Library(lib) = arena.node(inst).clone() {
            let lib_def = search_library_def(arena, start, &lib.name)?;
            return search_subprogram_in_list(arena, lib_def, name);
        }
    }
    for scope in scope_chain(arena, start) {
        for list in scope_declaration_lists(arena, scope) {
            for decl in list {
                if matches!(arena.node(decl), Node::SubProgram(s) if s.name == name) {
                    return Some(decl);
                }
            }
        }
    }
    None
}

fn search_subprogram_in_list(arena: &Arena, lib_def: NodeId, name: &str) -> Option<NodeId> {
    let Node::LibraryDef(l) = arena.node(lib_def) else {
        return None;
    };
    l.declarations
        .iter()
        .copied()
        .find(|&d| matches!(arena.node(d), Node::SubProgram(s) if s.name == name))
}

fn search_type_decl(arena: &Arena, start: NodeId, name: &str) -> Option<NodeId> {
    for scope in scope_chain(arena, start) {
        // Template type parameters shadow outer typedefs.
        let template_lists = match arena.node(scope) {
            Node::SubProgram(x) => vec![x.template_params.clone()],
            Node::View(x) => vec![x.template_params.clone()],
            Node::TypeDef(x) => vec![x.template_params.clone()],
            _ => Vec::new(),
        };
        for list in template_lists {
            for decl in list {
                if matches!(arena.node(decl), Node::TypeTp(t) if t.name == name) {
                    return Some(decl);
                }
            }
        }
        for list in scope_declaration_lists(arena, scope) {
            for decl in list {
                match arena.node(decl) {
                    Node::TypeDef(t) if t.name == name => return Some(decl),
                    Node::TypeTp(t) if t.name == name => return Some(decl),
                    _ => {}
                }
            }
        }
    }
    None
}

fn search_view(
    arena: &Arena,
    start: NodeId,
    design_unit: &str,
    view_name: &str,
) -> Option<NodeId> {
    let system = scope_chain(arena, start)
        .into_iter()
        .find(|&s| arena.kind(s) == NodeKind::System)?;
    let Node::System(sys) = arena.node(system) else {
        return None;
    };
    let mut units = sys.design_units.clone();
    // Design units may also live inside library defs.
    for &lib in &sys.library_defs {
        if let Node::LibraryDef(l) = arena.node(lib) {
            units.extend(
                l.declarations
                    .iter()
                    .copied()
                    .filter(|&d| arena.kind(d) == NodeKind::DesignUnit),
            );
        }
    }
    for unit in units {
        let Node::DesignUnit(du) = arena.node(unit) else {
            continue;
        };
        if du.name != design_unit {
            continue;
        }
        for &view in &du.views {
            if matches!(arena.node(view), Node::View(v) if v.name == view_name) {
                return Some(view);
            }
        }
        // A unit with a single view matches an empty view name.
        if view_name.is_empty() && du.views.len() == 1 {
            return Some(du.views[0]);
        }
    }
    None
}

fn search_library_def(arena: &Arena, start: NodeId, name: &str) -> Option<NodeId> {
    let system = scope_chain(arena, start)
        .into_iter()
        .find(|&s| arena.kind(s) == NodeKind::System)?;
    let Node::System(sys) = arena.node(system) else {
        return None;
    };
    sys.library_defs
        .iter()
        .copied()
        .find(|&l| matches!(arena.node(l), Node::LibraryDef(d) if d.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::HifSemantics;
    use crate::tree::build::Builder;
    use crate::tree::decl::*;

    /// sys { du(top) { view(rtl) { contents { signal s; process p { s := s } } } } }
    fn sample(arena: &mut Arena) -> (NodeId, NodeId, NodeId, NodeId) {
        let mut b = Builder::new(arena);
        let ty = b.bit_type(true, true);
        let sig = b.signal("s", ty, None);
        let target = b.identifier("s");
        let source = b.identifier("s");
        let assign = b.assign(target, source);
        let proc = b.process("p", vec![], vec![assign]);
        let contents = b.arena.alloc(Node::Contents(Contents {
            libraries: vec![],
            declarations: vec![sig],
            instances: vec![],
            state_tables: vec![proc],
            generates: vec![],
            global_action: None,
        }));
        let view = b.arena.alloc(Node::View(View {
            name: "rtl".into(),
            entity: None,
            contents: Some(contents),
            template_params: vec![],
            standard: false,
            style: ViewStyle::Rtl,
        }));
        let du = b.arena.alloc(Node::DesignUnit(DesignUnit {
            name: "top".into(),
            views: vec![view],
        }));
        let sys = b.arena.alloc(Node::System(System {
            name: "sys".into(),
            library_defs: vec![],
            design_units: vec![du],
            declarations: vec![],
        }));
        (sys, sig, target, source)
    }

    #[test]
    fn identifier_resolves_to_enclosing_signal() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let (_sys, sig, target, source) = sample(&mut arena);
        assert_eq!(get_declaration(&mut arena, &sem, target), Some(sig));
        assert_eq!(get_declaration(&mut arena, &sem, source), Some(sig));
    }

    #[test]
    fn resolution_is_cached_and_resettable() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let (sys, sig, target, _source) = sample(&mut arena);
        assert_eq!(get_declaration(&mut arena, &sem, target), Some(sig));
        assert!(arena.decl_cache.contains_key(&target));
        reset_declarations(&mut arena, sys);
        assert!(!arena.decl_cache.contains_key(&target));
    }

    #[test]
    fn references_finds_all_occurrences() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let (sys, sig, target, source) = sample(&mut arena);
        let refs = get_references(&mut arena, &sem, sig, sys);
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&target));
        assert!(refs.contains(&source));
    }

    #[test]
    fn all_references_maps_decl_to_uses() {
        let mut arena = Arena::new();
        let sem = HifSemantics;
        let (sys, sig, _target, _source) = sample(&mut arena);
        let map = get_all_references(
            &mut arena,
            &sem,
            sys,
            GetReferencesOptions::default(),
        );
        assert_eq!(map.get(&sig).map(Vec::len), Some(2));
    }
}
