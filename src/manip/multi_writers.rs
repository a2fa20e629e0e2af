//! Multi-writer signal/port fixes.
//!
//! SystemC cannot write slices or members of a signal independently, nor
//! tolerate two processes writing one signal. The fixes, in order:
//!
//! 1. optional: subrange sensitivity entries become whole-signal entries
//!    (with a warning per signal);
//! 2. signals referenced via slices/members inside a sensitivity list get
//!    a `_mspw` mirror signal, a one-state updater process, and rewritten
//!    uses in the affected process;
//! 3. signals written by more than one process get a `_mspw` support
//!    signal per (record field), all writers retargeted onto it, and a
//!    single updater process composing the real signal;
//! 4. partial writes inside a process go through a scoped `_var` support
//!    variable, loaded at entry and flushed at every suspension point.
//!
//! The sensitivity fix must run before the cross-process fix: it renames
//! targets into the shared map so the later fix never produces
//! whole-signal = whole-signal assigns. Partial writes run last. After
//! the pass, at most one process writes any signal's full value; the
//! added delta cycle per fixed signal is reported once through the
//! warning set.

use indexmap::{IndexMap, IndexSet};

use crate::base::NameTable;
use crate::diag::{HifError, WarningSet};
use crate::semantics::LanguageSemantics;
use crate::tree::build::Builder;
use crate::tree::copy::deep_copy;
use crate::tree::decl::DataKind;
use crate::tree::equals::equals_default;
use crate::tree::nav;
use crate::tree::{Arena, Node, NodeId, NodeKind};
use crate::typing::{self, semantic_type};

/// Options of [`fix_multiple_signal_port_assigns`].
#[derive(Clone, Copy, Debug)]
pub struct FixMultipleSignalPortAssignsOptions {
    pub fix_multiple_writings: bool,
    pub fix_partial_writings: bool,
    pub fix_subranges_in_sensitivity: bool,
}

impl Default for FixMultipleSignalPortAssignsOptions {
    fn default() -> Self {
        Self {
            fix_multiple_writings: true,
            fix_partial_writings: true,
            fix_subranges_in_sensitivity: false,
        }
    }
}

/// decl → (process → whole-target identifiers written there)
type Targets = IndexMap<NodeId, IndexMap<NodeId, Vec<NodeId>>>;
/// process → signals referenced via subranges in its sensitivity list
type Sensitivities = IndexMap<NodeId, IndexSet<NodeId>>;

/// Run the multi-writer fixes over `system`.
pub fn fix_multiple_signal_port_assigns(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    system: NodeId,
    opts: &FixMultipleSignalPortAssignsOptions,
    names: &mut NameTable,
) -> Result<bool, HifError> {
    // Concurrent assignments become processes first, so every write lives
    // in a state table.
    crate::manip::transform_global_actions(arena, sem, system, names, false)?;

    let mut pass = MspwPass {
        support_src: IndexMap::new(),
        support_tgt: IndexMap::new(),
        updater_src: IndexSet::new(),
        updater_tgt: IndexSet::new(),
        warnings: WarningSet::new(),
        subrange_warnings: WarningSet::new(),
    };

    let mut changed = false;
    if opts.fix_subranges_in_sensitivity {
        changed |= pass.fix_subranges_in_sensitivity(arena, sem, system);
    }
    if opts.fix_multiple_writings {
        let (mut targets, sensitivities) = collect_assignments(arena, sem, system);
        changed |= pass.fix_sensitivity_processes(
            arena,
            sem,
            system,
            &sensitivities,
            &mut targets,
            names,
        )?;
        changed |= pass.fix_between_processes(arena, sem, &mut targets, names)?;
    }
    if opts.fix_partial_writings {
        changed |= pass.fix_partial_writings(arena, sem, system, names)?;
    }

    pass.subrange_warnings
        .flush("replaced subrange sensitivity entries with whole signals");
    pass.warnings.flush(
        "found at least one signal (partially) written by multiple processes; \
         added intermediate support signals, introducing one delta cycle",
    );
    Ok(changed)
}

struct MspwPass {
    /// Signal-mirroring supports created by the sensitivity fix.
    support_src: IndexMap<NodeId, IndexMap<crate::base::Name, NodeId>>,
    /// Write-collecting supports created by the cross-process fix.
    support_tgt: IndexMap<NodeId, IndexMap<crate::base::Name, NodeId>>,
    updater_src: IndexSet<NodeId>,
    updater_tgt: IndexSet<NodeId>,
    warnings: WarningSet,
    subrange_warnings: WarningSet,
}

// ============================================================================
// COLLECTION
// ============================================================================

fn signal_or_port(arena: &Arena, decl: NodeId) -> bool {
    matches!(
        arena.node(decl),
        Node::DataDeclaration(d) if matches!(d.kind, DataKind::Signal | DataKind::Port(_))
    )
}

fn collect_assignments(
    arena: &mut Arena,
    sem: &dyn LanguageSemantics,
    system: NodeId,
) -> (Targets, Sensitivities) {
    let mut targets: Targets = IndexMap::new();
    let mut sensitivities: Sensitivities = IndexMap::new();

    let processes = nav::collect(arena, system, |n| matches!(n, Node::StateTable(_)));
    for st in processes.into_iter().rev() {
        if crate::resolve::is_part_of_standard(arena, st) {
            continue;
        }
        // Skip subprogram bodies: only real processes write signals.
        if !arena
            .parent(st)
            .is_some_and(|p| matches!(arena.node(p), Node::Contents(_)))
        {
            continue;
        }

        let assigns = nav::collect(arena, st, |n| matches!(n, Node::Assign(_)));
        for assign in assigns.into_iter().rev() {
            let Node::Assign(a) = arena.node(assign).clone() else {
                continue;
            };
            let root_ref = nav::terminal_prefix(arena, a.target);
            if arena.kind(root_ref) != NodeKind::Identifier {
                continue;
            }
            let Some(decl) = crate::resolve::get_declaration(arena, sem, root_ref) else {
                continue;
            };
            if !signal_or_port(arena, decl) {
                continue;
            }
            targets
                .entry(decl)
                .or_default()
                .entry(st)
                .or_default()
                .push(root_ref);
        }

        let Node::StateTable(table) = arena.node(st).clone() else {
            continue;
        };
        for entry in table.sensitivity {
            if !matches!(
                arena.kind(entry),
                NodeKind::Member | NodeKind::Slice
            ) {
                continue;
            }
            let root_ref = nav::terminal_prefix(arena, entry);
            if arena.kind(root_ref) != NodeKind::Identifier {
                continue;
            }
            let Some(decl) = crate::resolve::get_declaration(arena, sem, root_ref) else {
                continue;
            };
            if signal_or_port(arena, decl) {
                sensitivities.entry(st).or_default().insert(decl);
            }
        }
    }
    (targets, sensitivities)
}

impl MspwPass {
    // ========================================================================
    // 1. SUBRANGE SENSITIVITY
    // ========================================================================

    /// Replace every member/slice sensitivity entry with its whole
    /// prefix, recording a warning per signal.
    fn fix_subranges_in_sensitivity(
        &mut self,
        arena: &mut Arena,
        sem: &dyn LanguageSemantics,
        system: NodeId,
    ) -> bool {
        let _ = sem;
        let mut changed = false;
        let processes = nav::collect(arena, system, |n| matches!(n, Node::StateTable(_)));
        for st in processes.into_iter().rev() {
            if crate::resolve::is_part_of_standard(arena, st) {
                continue;
            }
            let Node::StateTable(table) = arena.node(st).clone() else {
                continue;
            };
            for entry in table.sensitivity {
                if !matches!(arena.kind(entry), NodeKind::Member | NodeKind::Slice) {
                    continue;
                }
                let root_ref = nav::terminal_prefix(arena, entry);
                if arena.kind(root_ref) != NodeKind::Identifier {
                    continue;
                }
                if let Some(name) = arena.node(root_ref).name().cloned() {
                    self.subrange_warnings.insert(name);
                }
                let whole = deep_copy(arena, root_ref);
                arena.replace(entry, whole);
                arena.free_subtree(entry);
                changed = true;
            }
        }
        changed
    }

    // ========================================================================
    // 2. SENSITIVITY MSPW FIX
    // ========================================================================

    fn fix_sensitivity_processes(
        &mut self,
        arena: &mut Arena,
        sem: &dyn LanguageSemantics,
        system: NodeId,
        sensitivities: &Sensitivities,
        targets: &mut Targets,
        names: &mut NameTable,
    ) -> Result<bool, HifError> {
        let _ = system;
        let mut changed = false;
        for (&process, decls) in sensitivities {
            for &decl in decls {
                let supports =
                    self.create_support_signals(arena, sem, decl, names, true)?;
                if supports.len() != 1 {
                    return Err(HifError::assertion(
                        "record signals in sensitivity are not supported",
                        Some(decl),
                    ));
                }
                let support = *supports.values().next().expect("one support");

                // Is the signal actually written by this process?
                let refs = crate::resolve::get_references(arena, sem, decl, process);
                let is_target = refs
                    .iter()
                    .any(|&r| nav::is_in_left_hand_side(arena, r));

                let support_name = arena
                    .node(support)
                    .name()
                    .cloned()
                    .expect("support signal named");
                for r in refs {
                    if arena.kind(r) != NodeKind::Identifier {
                        continue;
                    }
                    // Occurrences inside event calls always retarget; a
                    // read-only use inside the body keeps the original
                    // signal (its value semantics are unchanged).
                    let event_prefix = nav::nearest_parent(arena, r, |n| {
                        matches!(n, Node::FunctionCall(_))
                    })
                    .is_some_and(|fc| self_is_event(arena, sem, fc));
                    let in_body = in_process_body(arena, r, process);
                    if !is_target && !event_prefix && in_body {
                        continue;
                    }
                    arena.node_mut(r).set_name(support_name.clone());
                    crate::resolve::set_declaration(arena, r, support);
                    typing::reset_types(arena, r, true);
                    if let Some(assign) =
                        nav::nearest_parent_of_kind(arena, r, NodeKind::Assign)
                    {
                        typing::reset_types(arena, assign, false);
                        add_eventual_cast(arena, sem, assign);
                    }
                }

                // Updater: mirror the original signal into the support.
                self.create_src_updater(arena, sem, decl, support, names)?;

                // The process's writes now target the support signal.
                if let Some(moved) = targets
                    .get_mut(&decl)
                    .and_then(|m| m.shift_remove(&process))
                {
                    targets
                        .entry(support)
                        .or_default()
                        .entry(process)
                        .or_default()
                        .extend(moved);
                }
                changed = true;
            }
        }
        Ok(changed)
    }

    // ========================================================================
    // 3. CROSS-PROCESS FIX
    // ========================================================================

    fn fix_between_processes(
        &mut self,
        arena: &mut Arena,
        sem: &dyn LanguageSemantics,
        targets: &mut Targets,
        names: &mut NameTable,
    ) -> Result<bool, HifError> {
        let mut changed = false;
        let decls: Vec<NodeId> = targets.keys().copied().collect();
        for decl in decls {
            let writer_count = targets.get(&decl).map(|m| m.len()).unwrap_or(0);
            if writer_count <= 1 {
                continue;
            }
            let Some(name) = arena.node(decl).name().cloned() else {
                continue;
            };
            // Support signals are already bit-split; re-fixing them loops.
            if name.contains("_mspw") {
                continue;
            }
            self.warnings.insert(name);
            changed = true;

            let supports = self.create_support_signals(arena, sem, decl, names, false)?;

            let writers: Vec<(NodeId, Vec<NodeId>)> = targets
                .get(&decl)
                .map(|m| m.iter().map(|(&k, v)| (k, v.clone())).collect())
                .unwrap_or_default();
            let mut moved: IndexMap<NodeId, IndexMap<NodeId, Vec<NodeId>>> = IndexMap::new();
            for (process, identifiers) in writers {
                for target in identifiers {
                    if !arena.is_alive(target) {
                        continue;
                    }
                    // Record targets rename through their field reference.
                    let support = match arena.parent(target).map(|p| arena.node(p).clone())
                    {
                        Some(Node::FieldReference(fr))
                            if supports.contains_key(&fr.field) =>
                        {
                            let support = supports[&fr.field];
                            let field_ref = arena.parent(target).expect("parent");
                            let support_name = arena
                                .node(support)
                                .name()
                                .cloned()
                                .expect("support named");
                            arena.node_mut(target).set_name(support_name);
                            arena.hoist(field_ref, target);
                            arena.free_subtree(field_ref);
                            support
                        }
                        _ => {
                            let field = arena
                                .node(target)
                                .name()
                                .cloned()
                                .expect("identifier named");
                            let Some(&support) = supports.get(&field) else {
                                return Err(HifError::assertion(
                                    "expected support signal in map",
                                    Some(target),
                                ));
                            };
                            let support_name = arena
                                .node(support)
                                .name()
                                .cloned()
                                .expect("support named");
                            arena.node_mut(target).set_name(support_name);
                            support
                        }
                    };
                    crate::resolve::set_declaration(arena, target, support);
                    typing::reset_types(arena, target, true);
                    if let Some(assign) =
                        nav::nearest_parent_of_kind(arena, target, NodeKind::Assign)
                    {
                        typing::reset_types(arena, assign, false);
                        add_eventual_cast(arena, sem, assign);
                    }
                    moved
                        .entry(support)
                        .or_default()
                        .entry(process)
                        .or_default()
                        .push(target);
                }
            }
            if let Some(m) = targets.get_mut(&decl) {
                m.clear();
            }
            for (support, processes) in moved {
                targets.entry(support).or_default().extend(processes);
            }

            self.create_tgt_updater(arena, sem, decl, &supports, names)?;
        }
        Ok(changed)
    }

    // ========================================================================
    // 4. PARTIAL WRITES
    // ========================================================================

    fn fix_partial_writings(
        &mut self,
        arena: &mut Arena,
        sem: &dyn LanguageSemantics,
        system: NodeId,
        names: &mut NameTable,
    ) -> Result<bool, HifError> {
        // decl → processes writing it partially
        let mut partial: IndexMap<NodeId, IndexSet<NodeId>> = IndexMap::new();
        let refs = nav::collect(arena, system, |n| matches!(n, Node::Identifier(_)));
        for r in refs.into_iter().rev() {
            if !is_partial_write(arena, sem, r) {
                continue;
            }
            let Some(decl) = crate::resolve::get_declaration(arena, sem, r) else {
                continue;
            };
            if !signal_or_port(arena, decl)
                || crate::resolve::is_part_of_standard(arena, decl)
            {
                continue;
            }
            let Some(st) = nav::nearest_parent_of_kind(arena, r, NodeKind::StateTable)
            else {
                continue;
            };
            partial.entry(decl).or_default().insert(st);
        }

        let mut changed = false;
        for (decl, processes) in partial {
            let Node::DataDeclaration(d) = arena.node(decl).clone() else {
                continue;
            };
            // Scoped support variable, declared next to the signal.
            let var_name = names.fresh_suffixed(&d.name, "_var");
            let ty_copy = deep_copy(arena, d.ty);
            let init_copy = d.init.map(|i| deep_copy(arena, i));
            let var = Builder::new(arena).variable(var_name.clone(), ty_copy, init_copy);
            add_declaration_in_context(arena, decl, var)?;

            for st in processes {
                changed = true;
                // Entry load: var := signal.
                let mut b = Builder::new(arena);
                let t = b.identifier(var_name.clone());
                let s = b.identifier(d.name.clone());
                let load = b.assign(t, s);
                insert_at_entries(arena, st, load);

                // Rewrite the partial writes onto the variable.
                let refs = crate::resolve::get_references(arena, sem, decl, st);
                for r in refs {
                    if !nav::is_in_left_hand_side(arena, r) {
                        continue;
                    }
                    if arena.kind(r) != NodeKind::Identifier {
                        continue;
                    }
                    arena.node_mut(r).set_name(var_name.clone());
                    crate::resolve::set_declaration(arena, r, var);
                    typing::reset_types(arena, r, true);
                }

                // Flush at every suspension point: var back to the signal.
                let mut b = Builder::new(arena);
                let t = b.identifier(d.name.clone());
                let s = b.identifier(var_name.clone());
                let flush = b.assign(t, s);
                insert_at_suspensions(arena, st, flush);
            }
        }
        Ok(changed)
    }

    // ========================================================================
    // SUPPORT CONSTRUCTION
    // ========================================================================

    /// Create (or fetch) the `_mspw` support signals of `decl`: one per
    /// record field, else a single unpacked mirror.
    fn create_support_signals(
        &mut self,
        arena: &mut Arena,
        sem: &dyn LanguageSemantics,
        decl: NodeId,
        names: &mut NameTable,
        is_src: bool,
    ) -> Result<IndexMap<crate::base::Name, NodeId>, HifError> {
        let cache = if is_src {
            &mut self.support_src
        } else {
            &mut self.support_tgt
        };
        if let Some(existing) = cache.get(&decl) {
            return Ok(existing.clone());
        }
        let Node::DataDeclaration(d) = arena.node(decl).clone() else {
            return Err(HifError::assertion("expected data declaration", Some(decl)));
        };
        let base = typing::base_type(arena, sem, d.ty, false);
        let mut supports = IndexMap::new();
        if let Node::RecordT(rec) = arena.node(base).clone() {
            for field in rec.fields {
                let Node::DataDeclaration(f) = arena.node(field).clone() else {
                    continue;
                };
                let support_name =
                    names.fresh(&format!("{}_{}_mspw", d.name, f.name));
                let ty_copy = deep_copy(arena, f.ty);
                let init = match d.init {
                    Some(init) => {
                        // Record initializers may hold aggregates with
                        // `others`: go through a cast and a field select.
                        let init_copy = deep_copy(arena, init);
                        let decl_ty_copy = deep_copy(arena, d.ty);
                        let mut b = Builder::new(arena);
                        let cast = b.cast(decl_ty_copy, init_copy);
                        Some(b.field_reference(cast, f.name.clone()))
                    }
                    None => sem.default_value(arena, ty_copy, Some(decl)),
                };
                let support = Builder::new(arena).signal(support_name, ty_copy, init);
                add_declaration_in_context(arena, decl, support)?;
                supports.insert(f.name.clone(), support);
            }
        } else {
            let support_name = names.fresh_suffixed(&d.name, "_mspw");
            let support_ty = unpacked_type(arena, sem, d.ty);
            let init = match d.init {
                Some(init) => {
                    let converted = arena.node(init).is_const_value().then(|| {
                        typing::transform_constant(arena, sem, init, support_ty)
                    });
                    match converted.flatten() {
                        Some(v) => Some(v),
                        None => sem.default_value(arena, support_ty, Some(decl)),
                    }
                }
                None => sem.default_value(arena, support_ty, Some(decl)),
            };
            let support =
                Builder::new(arena).signal(support_name, support_ty, init);
            add_declaration_in_context(arena, decl, support)?;
            supports.insert(d.name.clone(), support);
        }
        let cache = if is_src {
            &mut self.support_src
        } else {
            &mut self.support_tgt
        };
        cache.insert(decl, supports.clone());
        Ok(supports)
    }

    /// Updater mirroring the original signal into its support
    /// (sensitivity fix): sensitive to the signal, assigns `mspw := sig`.
    fn create_src_updater(
        &mut self,
        arena: &mut Arena,
        sem: &dyn LanguageSemantics,
        decl: NodeId,
        support: NodeId,
        names: &mut NameTable,
    ) -> Result<(), HifError> {
        if self.updater_src.contains(&decl) {
            return Ok(());
        }
        self.updater_src.insert(decl);
        let Some(contents) = enclosing_contents_of_decl(arena, support) else {
            return Err(HifError::assertion(
                "support signal outside contents",
                Some(support),
            ));
        };
        let decl_name = arena.node(decl).name().cloned().expect("named");
        let support_name = arena.node(support).name().cloned().expect("named");
        let process_name = names.fresh_suffixed(&decl_name, "_mspw_proc_src");
        let mut b = Builder::new(arena);
        let sens = b.identifier(decl_name.clone());
        let t = b.identifier(support_name);
        let s = b.identifier(decl_name);
        let assign = b.assign(t, s);
        let process = b.process(process_name, vec![sens], vec![assign]);
        arena.push_to_list(contents, process, |n| match n {
            Node::Contents(c) => &mut c.state_tables,
            _ => unreachable!("contents expected"),
        });
        add_eventual_cast(arena, sem, assign);
        Ok(())
    }

    /// Updater composing the real signal from its supports
    /// (cross-process fix): sensitive to the supports, assigns
    /// `sig := mspw` (record: a record value of field supports).
    fn create_tgt_updater(
        &mut self,
        arena: &mut Arena,
        sem: &dyn LanguageSemantics,
        decl: NodeId,
        supports: &IndexMap<crate::base::Name, NodeId>,
        names: &mut NameTable,
    ) -> Result<(), HifError> {
        if self.updater_tgt.contains(&decl) {
            return Ok(());
        }
        self.updater_tgt.insert(decl);
        let first_support = *supports
            .values()
            .next()
            .ok_or_else(|| HifError::assertion("no support signals", Some(decl)))?;
        let Some(contents) = enclosing_contents_of_decl(arena, first_support) else {
            return Err(HifError::assertion(
                "support signal outside contents",
                Some(first_support),
            ));
        };
        let decl_name = arena.node(decl).name().cloned().expect("named");
        let process_name = names.fresh_suffixed(&decl_name, "_mspw_proc_tgt");

        let mut sens = Vec::new();
        for &support in supports.values() {
            let support_name = arena.node(support).name().cloned().expect("named");
            sens.push(Builder::new(arena).identifier(support_name));
        }
        let source = if supports.len() == 1 {
            let support_name = arena
                .node(*supports.values().next().expect("one"))
                .name()
                .cloned()
                .expect("named");
            Builder::new(arena).identifier(support_name)
        } else {
            let mut alts = Vec::new();
            for (field, &support) in supports {
                let support_name = arena.node(support).name().cloned().expect("named");
                let value = Builder::new(arena).identifier(support_name);
                alts.push(arena.alloc(Node::RecordValueAlt(
                    crate::tree::value::RecordValueAlt {
                        field: field.clone(),
                        value,
                    },
                )));
            }
            arena.alloc(Node::RecordValue(crate::tree::value::RecordValue { alts }))
        };
        let mut b = Builder::new(arena);
        let t = b.identifier(decl_name);
        let assign = b.assign(t, source);
        let process = b.process(process_name, sens, vec![assign]);
        arena.push_to_list(contents, process, |n| match n {
            Node::Contents(c) => &mut c.state_tables,
            _ => unreachable!("contents expected"),
        });
        add_eventual_cast(arena, sem, assign);
        Ok(())
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

fn self_is_event(arena: &Arena, sem: &dyn LanguageSemantics, call: NodeId) -> bool {
    sem.is_event_call(arena, call)
}

fn in_process_body(arena: &Arena, id: NodeId, process: NodeId) -> bool {
    let Node::StateTable(st) = arena.node(process) else {
        return false;
    };
    st.states
        .iter()
        .any(|&state| nav::is_sub_node(arena, id, state))
}

/// Insert a cast on the source when the assignment's sides no longer
/// agree, then fold the result.
fn add_eventual_cast(arena: &mut Arena, sem: &dyn LanguageSemantics, assign: NodeId) {
    let Node::Assign(a) = arena.node(assign).clone() else {
        return;
    };
    let Some(tgt_ty_cached) = semantic_type(arena, sem, a.target) else {
        return;
    };
    let tgt_ty = deep_copy(arena, tgt_ty_cached);
    let Some(src_ty) = semantic_type(arena, sem, a.source) else {
        arena.free_subtree(tgt_ty);
        return;
    };
    if equals_default(arena, tgt_ty, src_ty) {
        arena.free_subtree(tgt_ty);
        return;
    }
    if let Some(placeholder) = arena.extract(a.source) {
        let cast = Builder::new(arena).cast(tgt_ty, a.source);
        arena.replace(placeholder, cast);
        arena.free_subtree(placeholder);
        crate::simplify::simplify(arena, sem, assign);
    } else {
        arena.free_subtree(tgt_ty);
    }
}

/// The unpacked rendition of a type: packed vectors become arrays of
/// bits, integers arrays of bools, arrays recurse.
fn unpacked_type(arena: &mut Arena, sem: &dyn LanguageSemantics, ty: NodeId) -> NodeId {
    let base = typing::base_type(arena, sem, ty, false);
    match arena.node(base).clone() {
        Node::ArrayT(a) => {
            let span = a.span.map(|s| deep_copy(arena, s));
            let element = unpacked_type(arena, sem, a.element);
            arena.alloc(Node::ArrayT(crate::tree::types::ArrayT {
                span,
                element,
                signed: a.signed,
                constexpr: false,
            }))
        }
        Node::SignedT(s) => {
            let span = s.span.map(|x| deep_copy(arena, x));
            let mut b = Builder::new(arena);
            let bit = b.bit_type(true, true);
            alloc_array(arena, span, bit, true)
        }
        Node::UnsignedT(u) => {
            let span = u.span.map(|x| deep_copy(arena, x));
            let mut b = Builder::new(arena);
            let bit = b.bit_type(true, true);
            alloc_array(arena, span, bit, false)
        }
        Node::BitvectorT(v) => {
            let span = v.span.map(|x| deep_copy(arena, x));
            let mut b = Builder::new(arena);
            let bit = b.bit_type(v.logic, v.resolved);
            alloc_array(arena, span, bit, v.signed)
        }
        Node::IntT(i) => {
            let span = i.span.map(|x| deep_copy(arena, x));
            let mut b = Builder::new(arena);
            let element = b.bool_type();
            alloc_array(arena, span, element, i.signed)
        }
        _ => deep_copy(arena, ty),
    }
}

fn alloc_array(
    arena: &mut Arena,
    span: Option<NodeId>,
    element: NodeId,
    signed: bool,
) -> NodeId {
    arena.alloc(Node::ArrayT(crate::tree::types::ArrayT {
        span,
        element,
        signed,
        constexpr: false,
    }))
}

/// Insert `new_decl` into the declaration list holding `decl`, right
/// after it.
fn add_declaration_in_context(
    arena: &mut Arena,
    decl: NodeId,
    new_decl: NodeId,
) -> Result<(), HifError> {
    let Some(parent) = arena.parent(decl) else {
        return Err(HifError::assertion("declaration has no scope", Some(decl)));
    };
    let Some(list) = arena.node_mut(parent).list_containing_mut(decl) else {
        return Err(HifError::assertion(
            "declaration not in a list slot",
            Some(decl),
        ));
    };
    let pos = list.iter().position(|&x| x == decl).expect("in list");
    list.insert(pos + 1, new_decl);
    arena.claim(parent, new_decl);
    Ok(())
}

/// Is this identifier a *partial* left-hand-side write: under a member,
/// slice, or record field selection whose prefix type is not an array?
fn is_partial_write(arena: &mut Arena, sem: &dyn LanguageSemantics, id: NodeId) -> bool {
    if !nav::is_in_left_hand_side(arena, id) {
        return false;
    }
    let mut current = arena.parent(id);
    while let Some(p) = current {
        match arena.node(p).clone() {
            Node::Member(m) => {
                if let Some(prefix_base) = typing::value_base_type(arena, sem, m.prefix) {
                    if !matches!(arena.node(prefix_base), Node::ArrayT(_)) {
                        return true;
                    }
                }
            }
            Node::Slice(s) => {
                if let Some(prefix_base) = typing::value_base_type(arena, sem, s.prefix) {
                    if !matches!(arena.node(prefix_base), Node::ArrayT(_)) {
                        return true;
                    }
                }
            }
            Node::FieldReference(f) => {
                if let Some(prefix_base) = typing::value_base_type(arena, sem, f.prefix) {
                    if matches!(arena.node(prefix_base), Node::RecordT(_)) {
                        return true;
                    }
                }
            }
            Node::Assign(_) => return false,
            _ => return false,
        }
        current = arena.parent(p);
    }
    false
}

/// The contents owning a declaration.
fn enclosing_contents_of_decl(arena: &Arena, decl: NodeId) -> Option<NodeId> {
    nav::nearest_parent_of_kind(arena, decl, NodeKind::Contents)
}

/// Insert `action` at the process entry points: after every wait, or at
/// the front of the single state when the process never suspends.
fn insert_at_entries(arena: &mut Arena, st: NodeId, action: NodeId) {
    let waits = nav::collect(arena, st, |n| matches!(n, Node::Wait(_)));
    if waits.is_empty() {
        let Node::StateTable(table) = arena.node(st).clone() else {
            arena.free_subtree(action);
            return;
        };
        let Some(&first_state) = table.states.first() else {
            arena.free_subtree(action);
            return;
        };
        arena.insert_in_list(first_state, 0, action, |n| match n {
            Node::State(s) => &mut s.actions,
            _ => unreachable!("state expected"),
        });
        return;
    }
    let mut pending = Some(action);
    for wait in waits.into_iter().rev() {
        let copy = match pending.take() {
            Some(first) => first,
            None => deep_copy(arena, action),
        };
        insert_relative(arena, wait, copy, 1);
    }
}

/// Insert `action` before every suspension point (waits and returns), or
/// at the end of the single state when the process never suspends.
fn insert_at_suspensions(arena: &mut Arena, st: NodeId, action: NodeId) {
    let suspensions = nav::collect(arena, st, |n| {
        matches!(n, Node::Wait(_) | Node::Return(_))
    });
    if suspensions.is_empty() {
        let Node::StateTable(table) = arena.node(st).clone() else {
            arena.free_subtree(action);
            return;
        };
        let Some(&last_state) = table.states.last() else {
            arena.free_subtree(action);
            return;
        };
        arena.push_to_list(last_state, action, |n| match n {
            Node::State(s) => &mut s.actions,
            _ => unreachable!("state expected"),
        });
        return;
    }
    let mut pending = Some(action);
    for point in suspensions.into_iter().rev() {
        let copy = match pending.take() {
            Some(first) => first,
            None => deep_copy(arena, action),
        };
        insert_relative(arena, point, copy, 0);
    }
}

/// Insert `new_action` into the action list holding `anchor`, at the
/// anchor's position plus `offset`.
fn insert_relative(arena: &mut Arena, anchor: NodeId, new_action: NodeId, offset: usize) {
    let Some(parent) = arena.parent(anchor) else {
        arena.free_subtree(new_action);
        return;
    };
    let Some(list) = arena.node_mut(parent).list_containing_mut(anchor) else {
        arena.free_subtree(new_action);
        return;
    };
    let pos = list.iter().position(|&x| x == anchor).expect("in list") + offset;
    list.insert(pos.min(list.len()), new_action);
    arena.claim(parent, new_action);
}
