//! View dependencies and top-level module discovery.

use indexmap::{IndexMap, IndexSet};

use crate::diag::HifError;
use crate::semantics::LanguageSemantics;
use crate::tree::{Arena, Node, NodeId, NodeKind};

/// Filters of [`find_view_dependencies`].
#[derive(Clone, Copy, Debug)]
pub struct ViewDependencyOptions {
    pub skip_standard_views: bool,
    pub skip_standard_libraries: bool,
    pub skip_rtl_dependencies: bool,
    pub skip_tlm_dependencies: bool,
    pub skip_cpp_dependencies: bool,
    pub skip_c_dependencies: bool,
    pub skip_psl_dependencies: bool,
}

impl Default for ViewDependencyOptions {
    fn default() -> Self {
        Self {
            skip_standard_views: false,
            skip_standard_libraries: true,
            skip_rtl_dependencies: false,
            skip_tlm_dependencies: false,
            skip_cpp_dependencies: false,
            skip_c_dependencies: false,
            skip_psl_dependencies: false,
        }
    }
}

/// Sub-module and parent-module maps over every view of the system.
pub type ViewDependencyMap = IndexMap<NodeId, IndexSet<NodeId>>;

/// Options of [`find_top_level_modules`].
#[derive(Clone, Debug, Default)]
pub struct FindTopOptions {
    pub verbose: bool,
    /// Expected design-unit name of the top level.
    pub top_level_name: Option<String>,
    /// Precomputed maps from [`find_view_dependencies`], for reuse.
    pub sub_module_map: Option<ViewDependencyMap>,
    pub parent_module_map: Option<ViewDependencyMap>,
    pub use_heuristics: bool,
    pub check_at_most_one: bool,
    pub check_at_least_one: bool,
}

fn style_skipped(style: crate::tree::decl::ViewStyle, opts: &ViewDependencyOptions) -> bool {
    use crate::tree::decl::ViewStyle::*;
    match style {
        Rtl => opts.skip_rtl_dependencies,
        Tlm => opts.skip_tlm_dependencies,
        Cpp => opts.skip_cpp_dependencies,
        C => opts.skip_c_dependencies,
        Psl => opts.skip_psl_dependencies,
    }
}

/// Record every `ViewReference` of every view, producing the sub-module
/// and parent-module maps.
pub fn find_view_dependencies(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    system: NodeId,
    opts: ViewDependencyOptions,
) -> (ViewDependencyMap, ViewDependencyMap) {
    let mut sub: ViewDependencyMap = IndexMap::new();
    let mut parents: ViewDependencyMap = IndexMap::new();

    let views = crate::tree::nav::collect(arena, system, |n| {
        matches!(n, Node::View(_))
    });
    let views: Vec<NodeId> = views
        .into_iter()
        .rev() // collect is reverse-preorder; restore document order
        .filter(|&v| {
            let Node::View(view) = arena.node(v) else {
                return false;
            };
            if opts.skip_standard_views && view.standard {
                return false;
            }
            if opts.skip_standard_libraries
                && crate::resolve::is_part_of_standard(arena, v)
            {
                return false;
            }
            !style_skipped(view.style, &opts)
        })
        .collect();

    for &view in &views {
        sub.entry(view).or_default();
        parents.entry(view).or_default();
    }

    for &view in &views {
        let refs = crate::tree::nav::collect(arena, view, |n| {
            matches!(n, Node::ViewReference(_))
        });
        for vref in refs.into_iter().rev() {
            let Some(child) = crate::resolve::get_declaration(arena, sem, vref) else {
                continue;
            };
            if arena.kind(child) != NodeKind::View || child == view {
                continue;
            }
            if !sub.contains_key(&child) {
                continue; // filtered out above
            }
            sub.entry(view).or_default().insert(child);
            parents.entry(child).or_default().insert(view);
        }
    }
    (sub, parents)
}

/// Identify the top-level views of `system` per the options.
pub fn find_top_level_modules(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    system: NodeId,
    opts: &FindTopOptions,
) -> Result<Vec<NodeId>, HifError> {
    let (sub, parents) = match (&opts.sub_module_map, &opts.parent_module_map) {
        (Some(s), Some(p)) => (s.clone(), p.clone()),
        _ => find_view_dependencies(arena, sem, system, ViewDependencyOptions::default()),
    };

    // Candidates: no parent modules, not standard, not an empty component
    // shell.
    let mut candidates: Vec<NodeId> = Vec::new();
    for (&view, view_parents) in &parents {
        if !view_parents.is_empty() {
            continue;
        }
        if crate::resolve::is_part_of_standard(arena, view) {
            continue;
        }
        if is_component(arena, view) {
            continue;
        }
        candidates.push(view);
    }

    if candidates.is_empty() {
        if opts.check_at_least_one {
            return Err(HifError::NoTopLevel);
        }
        return Ok(candidates);
    }

    if let Some(name) = &opts.top_level_name {
        let named: Vec<NodeId> = candidates
            .iter()
            .copied()
            .filter(|&v| design_unit_name(arena, v).is_some_and(|n| n == *name))
            .collect();
        return match named.len() {
            0 => {
                if opts.check_at_least_one {
                    Err(HifError::TopLevelNameNotFound(name.clone()))
                } else {
                    Ok(Vec::new())
                }
            }
            1 => {
                if opts.verbose {
                    tracing::info!(top = %name, "found top level design unit");
                }
                Ok(named)
            }
            // A duplicated explicit name is always an error.
            n => Err(HifError::AmbiguousTopLevel(n)),
        };
    }

    if candidates.len() == 1 {
        return Ok(candidates);
    }

    if !opts.use_heuristics {
        if opts.check_at_most_one {
            return Err(HifError::AmbiguousTopLevel(candidates.len()));
        }
        return Ok(candidates);
    }

    // H1: pick the heaviest candidates by structural weight.
    let h1 = weight_heuristic(arena, sem, &candidates, &sub);
    if h1.len() == 1 {
        if opts.verbose {
            if let Some(name) = design_unit_name(arena, h1[0]) {
                tracing::warn!(top = %name, "assuming top level design unit");
            }
        }
        return Ok(h1);
    }

    // H2: direct children of the system root.
    let h2 = system_children_heuristic(arena, &candidates, system);
    if h2.len() == 1 {
        return Ok(h2);
    }

    if h1.len() > 1 && h2.len() > 1 && opts.check_at_most_one {
        return Err(HifError::AmbiguousTopLevel(candidates.len()));
    }
    if h1.is_empty() && h2.is_empty() && opts.check_at_least_one {
        return Err(HifError::NoTopLevel);
    }
    if !h1.is_empty() {
        return Ok(h1);
    }
    if !h2.is_empty() {
        return Ok(h2);
    }
    Ok(candidates)
}

/// The single top-level view, enforcing at most one candidate.
pub fn find_top_level_module(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    system: NodeId,
    opts: &FindTopOptions,
) -> Result<Option<NodeId>, HifError> {
    let mut strict = opts.clone();
    strict.check_at_most_one = true;
    let found = find_top_level_modules(arena, sem, system, &strict)?;
    Ok(found.first().copied())
}

/// Views without contents (or with empty contents) are component shells,
/// never top levels.
fn is_component(arena: &Arena, view: NodeId) -> bool {
    let Node::View(v) = arena.node(view) else {
        return true;
    };
    match v.contents {
        None => true,
        Some(c) => match arena.node(c) {
            Node::Contents(contents) => contents.is_empty(),
            _ => true,
        },
    }
}

fn design_unit_name(arena: &Arena, view: NodeId) -> Option<String> {
    let parent = arena.parent(view)?;
    match arena.node(parent) {
        Node::DesignUnit(du) => Some(du.name.to_string()),
        _ => None,
    }
}

/// Weight of a view: ports + declarations + 5·instances + processes +
/// global actions + child weights scaled by instance counts.
fn weight(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    view: NodeId,
    sub: &ViewDependencyMap,
    memo: &mut IndexMap<NodeId, u64>,
) -> u64 {
    if let Some(&w) = memo.get(&view) {
        return w;
    }
    memo.insert(view, 0); // cycle guard
    let Node::View(v) = arena.node(view).clone() else {
        return 0;
    };
    let mut score = 0u64;
    if let Some(entity) = v.entity {
        if let Node::Entity(e) = arena.node(entity) {
            score += e.ports.len() as u64;
        }
    }
    if let Some(contents) = v.contents {
        if let Node::Contents(c) = arena.node(contents).clone() {
            score += c.declarations.len() as u64;
            score += c.instances.len() as u64 * 5;
            score += c.state_tables.len() as u64;
            if let Some(ga) = c.global_action {
                if let Node::GlobalAction(g) = arena.node(ga) {
                    score += g.actions.len() as u64;
                }
            }
        }
    }
    let children: Vec<NodeId> = sub
        .get(&view)
        .map(|s| s.iter().copied().collect())
        .unwrap_or_default();
    for child in children {
        let child_weight = weight(arena, sem, child, sub, memo);
        score += child_weight * instance_count(arena, sem, view, child);
    }
    memo.insert(view, score);
    score
}

fn instance_count(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    view: NodeId,
    child: NodeId,
) -> u64 {
    let Node::View(v) = arena.node(view).clone() else {
        return 0;
    };
    let Some(contents) = v.contents else {
        return 0;
    };
    let Node::Contents(c) = arena.node(contents).clone() else {
        return 0;
    };
    let mut count = 0;
    for inst in c.instances {
        let Node::Instance(i) = arena.node(inst).clone() else {
            continue;
        };
        if crate::resolve::get_declaration(arena, sem, i.referenced) == Some(child) {
            count += 1;
        }
    }
    count
}

fn weight_heuristic(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    candidates: &[NodeId],
    sub: &ViewDependencyMap,
) -> Vec<NodeId> {
    let mut memo = IndexMap::new();
    let mut best = Vec::new();
    let mut max = 0u64;
    for &view in candidates {
        let score = weight(arena, sem, view, sub, &mut memo);
        match score.cmp(&max) {
            std::cmp::Ordering::Greater => {
                max = score;
                best.clear();
                best.push(view);
            }
            std::cmp::Ordering::Equal => best.push(view),
            std::cmp::Ordering::Less => {}
        }
    }
    best
}

fn system_children_heuristic(
    arena: &Arena,
    candidates: &[NodeId],
    system: NodeId,
) -> Vec<NodeId> {
    candidates
        .iter()
        .copied()
        .filter(|&view| {
            arena
                .parent(view)
                .and_then(|du| {
                    matches!(arena.node(du), Node::DesignUnit(_))
                        .then(|| arena.parent(du))
                        .flatten()
                })
                .is_some_and(|grand| grand == system)
        })
        .collect()
}
