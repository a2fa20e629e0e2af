//! Loop and generate simplification: dead loops, constant-bound unrolling,
//! structural generate expansion.

use crate::base::Name;
use crate::simplify::{FOR_UNROLL_THRESHOLD, Simplifier};
use crate::tree::copy::deep_copy;
use crate::tree::value::Direction;
use crate::tree::{Arena, Node, NodeId, NodeKind, Operator};

/// Extracted iteration plan of a constant-bound loop.
pub(crate) struct LoopPlan {
    pub(crate) var: Name,
    pub(crate) start: i64,
    pub(crate) step: i64,
    pub(crate) iterations: i64,
}

impl Simplifier<'_> {
    pub(crate) fn visit_while(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::While(w) = arena.node(id).clone() else {
            return;
        };
        self.simplify_condition(arena, w.condition);
        let Node::While(w) = arena.node(id).clone() else {
            return;
        };
        if self.resolve_bool_condition(arena, w.condition) != Some(false) {
            return;
        }
        if arena.parent(id).is_none() {
            return;
        }
        if !w.do_while {
            // while(false) never runs.
            arena.detach(id);
            self.trash.insert(id);
            return;
        }
        // do-while(false) runs once; its body lifts out unless an
        // unlabeled break targets this loop.
        let escapes = crate::tree::nav::collect(arena, id, |n| {
            matches!(n, Node::Break(b) if b.label.is_none())
        });
        for esc in escapes {
            if crate::tree::nav::matching_scope(arena, esc) == Some(id) {
                return;
            }
        }
        let body: Vec<NodeId> = w.actions.iter().map(|&a| deep_copy(arena, a)).collect();
        arena.replace_with_list(id, &body);
        self.trash.insert(id);
    }

    pub(crate) fn visit_loop_escape(&mut self, arena: &mut Arena, id: NodeId) {
        // A break/continue with no loop to escape is dead.
        if crate::tree::nav::matching_scope(arena, id).is_none()
            && arena.parent(id).is_some()
        {
            arena.detach(id);
            self.trash.insert(id);
        }
    }

    // ========================================================================
    // FOR
    // ========================================================================

    pub(crate) fn visit_for(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::For(f) = arena.node(id).clone() else {
            return;
        };
        if let Some(cond) = f.condition {
            if arena.kind(cond) != NodeKind::Range {
                self.simplify_condition(arena, cond);
            }
        }
        if self.simplify_useless_for(arena, id) {
            return;
        }
        let _ = self.simplify_constant_loop_for(arena, id);
    }

    fn simplify_useless_for(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::For(f) = arena.node(id).clone() else {
            return false;
        };
        let Some(cond) = f.condition else {
            return false;
        };
        if self.resolve_bool_condition(arena, cond) != Some(false) {
            return false;
        }
        if self.loop_has_control_actions(arena, id) {
            return false;
        }
        if arena.parent(id).is_none() {
            return false;
        }
        arena.detach(id);
        self.trash.insert(id);
        true
    }

    fn loop_has_control_actions(&self, arena: &Arena, id: NodeId) -> bool {
        let escapes = crate::tree::nav::collect(arena, id, |n| {
            matches!(n.kind(), NodeKind::Break | NodeKind::Continue)
        });
        escapes
            .into_iter()
            .any(|esc| crate::tree::nav::matching_scope(arena, esc) == Some(id))
    }

    /// Unroll a constant-bound `for` into its iterations when small
    /// enough and free of control-flow escapes.
    fn simplify_constant_loop_for(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::For(f) = arena.node(id).clone() else {
            return false;
        };
        let Some(plan) = self.resolve_for_loop_bounds(arena, &f) else {
            return false;
        };
        if plan.iterations > 1 && !self.opts.simplify_statements {
            return false;
        }
        if self.loop_has_control_actions(arena, id) {
            return false;
        }
        // Initializations of pre-existing variables would need a final
        // loop-variable assignment to stay observable.
        if !f.init_values.is_empty() {
            return false;
        }
        let body_cost = f.actions.len() as i64 * plan.iterations;
        if body_cost > FOR_UNROLL_THRESHOLD as i64 {
            return false;
        }
        if arena.parent(id).is_none() {
            return false;
        }

        let mut unrolled = Vec::new();
        let mut current = plan.start;
        for _ in 0..plan.iterations {
            for &action in &f.actions {
                let copy = deep_copy(arena, action);
                self.substitute_identifier(arena, copy, &plan.var, current);
                unrolled.push(copy);
            }
            current += plan.step;
        }
        arena.replace_with_list(id, &unrolled);
        self.trash.insert(id);
        for &action in &unrolled {
            self.visit(arena, action);
        }
        true
    }

    /// Extract `(var, start, step, iterations)` from the canonical loop
    /// shapes: relational conditions matched against the step sign, or a
    /// literal range condition.
    pub(crate) fn resolve_for_loop_bounds(
        &mut self,
        arena: &mut Arena,
        f: &crate::tree::action::For,
    ) -> Option<LoopPlan> {
        if f.init_declarations.len() != 1 {
            return None;
        }
        let decl = f.init_declarations[0];
        let Node::DataDeclaration(d) = arena.node(decl).clone() else {
            return None;
        };
        let cond = f.condition?;

        // Range-style condition: iterate the whole range upward.
        if let Node::Range(r) = arena.node(cond).clone() {
            let (left, right) = (
                arena.int_value(r.left?)?,
                arena.int_value(r.right?)?,
            );
            let (lo, hi) = match r.direction {
                Direction::Upto => (left, right),
                Direction::Downto => (right, left),
            };
            if hi < lo {
                return Some(LoopPlan {
                    var: d.name,
                    start: lo,
                    step: 1,
                    iterations: 0,
                });
            }
            return Some(LoopPlan {
                var: d.name,
                start: lo,
                step: 1,
                iterations: hi - lo + 1,
            });
        }

        let start = arena.int_value(d.init?)?;

        // Step: a single `var := var ± literal`.
        if f.step_actions.len() != 1 {
            return None;
        }
        let Node::Assign(step_assign) = arena.node(f.step_actions[0]).clone() else {
            return None;
        };
        let Node::Identifier(target) = arena.node(step_assign.target).clone() else {
            return None;
        };
        if target.name != d.name {
            return None;
        }
        let Node::Expression(step_expr) = arena.node(step_assign.source).clone() else {
            return None;
        };
        let step_rhs = step_expr.rhs?;
        let step_amount = arena.int_value(step_rhs)?;
        let step = match step_expr.op {
            Operator::Plus => step_amount,
            Operator::Minus => -step_amount,
            _ => return None,
        };
        if step == 0 {
            return None;
        }

        // Condition: `var <rel> literal`, with the relation matching the
        // step direction.
        let Node::Expression(cond_expr) = arena.node(cond).clone() else {
            return None;
        };
        let cond_rhs = cond_expr.rhs?;
        let Node::Identifier(cond_var) = arena.node(cond_expr.lhs).clone() else {
            return None;
        };
        if cond_var.name != d.name {
            return None;
        }
        let limit = arena.int_value(cond_rhs)?;

        let iterations = match (cond_expr.op, step > 0) {
            (Operator::Lt, true) => ceil_div(limit - start, step).max(0),
            (Operator::Le, true) => (ceil_div(limit - start + 1, step)).max(0),
            (Operator::Gt, false) => ceil_div(start - limit, -step).max(0),
            (Operator::Ge, false) => (ceil_div(start - limit + 1, -step)).max(0),
            _ => return None,
        };
        Some(LoopPlan {
            var: d.name,
            start,
            step,
            iterations,
        })
    }

    /// Replace every free occurrence of `name` below `root` with the
    /// literal `value`. Scopes that redeclare the name are left alone.
    pub(crate) fn substitute_identifier(
        &mut self,
        arena: &mut Arena,
        root: NodeId,
        name: &str,
        value: i64,
    ) {
        let hits = crate::tree::nav::collect(arena, root, |n| {
            matches!(n, Node::Identifier(i) if i.name == name)
        });
        for hit in hits {
            if !arena.is_alive(hit) {
                continue;
            }
            if shadowed_between(arena, hit, root, name) {
                continue;
            }
            let literal = crate::tree::build::Builder::new(arena).int_val(value);
            let literal =
                crate::typing::assure_syntactic_type(arena, self.sem, literal);
            arena.replace(hit, literal);
            arena.free_subtree(hit);
        }
    }

    // ========================================================================
    // GENERATES
    // ========================================================================

    pub(crate) fn visit_if_generate(&mut self, arena: &mut Arena, id: NodeId) {
        if !self.opts.simplify_generates {
            return;
        }
        let Node::IfGenerate(g) = arena.node(id).clone() else {
            return;
        };
        match self.resolve_bool_condition(arena, g.condition) {
            Some(true) => {
                let Some(parent_contents) = enclosing_contents(arena, id) else {
                    return;
                };
                self.splice_contents(arena, g.body, parent_contents);
                arena.detach(id);
                self.trash.insert(id);
            }
            Some(false) => {
                arena.detach(id);
                self.trash.insert(id);
            }
            None => {}
        }
    }

    pub(crate) fn visit_for_generate(&mut self, arena: &mut Arena, id: NodeId) {
        if !self.opts.simplify_generates {
            return;
        }
        let Node::ForGenerate(g) = arena.node(id).clone() else {
            return;
        };
        let as_for = crate::tree::action::For {
            label: None,
            init_declarations: g.init_declarations.clone(),
            init_values: g.init_values.clone(),
            condition: g.condition,
            step_actions: g.step_actions.clone(),
            actions: Vec::new(),
        };
        let Some(plan) = self.resolve_for_loop_bounds(arena, &as_for) else {
            return;
        };
        let Some(parent_contents) = enclosing_contents(arena, id) else {
            return;
        };

        let mut current = plan.start;
        for _ in 0..plan.iterations {
            let body_copy = deep_copy(arena, g.body);
            self.substitute_identifier(arena, body_copy, &plan.var, current);
            self.suffix_local_declarations(arena, body_copy, current);
            self.splice_contents(arena, body_copy, parent_contents);
            // The drained shell is dead weight.
            arena.free_subtree(body_copy);
            current += plan.step;
        }
        arena.detach(id);
        self.trash.insert(id);
    }

    /// Rename the declarations local to an expanded generate body with a
    /// per-iteration suffix, rewriting their uses inside the body.
    fn suffix_local_declarations(&mut self, arena: &mut Arena, body: NodeId, iteration: i64) {
        let Node::Contents(c) = arena.node(body).clone() else {
            return;
        };
        let mut renames: Vec<(Name, Name)> = Vec::new();
        for &decl in c
            .declarations
            .iter()
            .chain(c.instances.iter())
            .chain(c.state_tables.iter())
        {
            let Some(old) = arena.node(decl).name().cloned() else {
                continue;
            };
            let new = Name::new(format!("{old}_{iteration}"));
            renames.push((old, new.clone()));
            arena.node_mut(decl).set_name(new);
        }
        // Rewrite references by name within the expanded body.
        for (old, new) in renames {
            let hits = crate::tree::nav::collect(arena, body, |n| {
                matches!(n, Node::Identifier(i) if i.name == old)
            });
            for hit in hits {
                arena.node_mut(hit).set_name(new.clone());
            }
        }
        crate::resolve::reset_declarations(arena, body);
    }

    /// Move every member of the `Contents` node `body` into
    /// `parent_contents`, preserving list order.
    fn splice_contents(&mut self, arena: &mut Arena, body: NodeId, parent_contents: NodeId) {
        let Node::Contents(c) = arena.node(body).clone() else {
            return;
        };
        let move_list = |arena: &mut Arena,
                         items: &[NodeId],
                         pick: fn(&mut Node) -> &mut Vec<NodeId>| {
            for &item in items {
                arena.detach(item);
                arena.push_to_list(parent_contents, item, pick);
            }
        };
        move_list(arena, &c.libraries, |n| match n {
            Node::Contents(x) => &mut x.libraries,
            _ => unreachable!("contents expected"),
        });
        move_list(arena, &c.declarations, |n| match n {
            Node::Contents(x) => &mut x.declarations,
            _ => unreachable!("contents expected"),
        });
        move_list(arena, &c.instances, |n| match n {
            Node::Contents(x) => &mut x.instances,
            _ => unreachable!("contents expected"),
        });
        move_list(arena, &c.state_tables, |n| match n {
            Node::Contents(x) => &mut x.state_tables,
            _ => unreachable!("contents expected"),
        });
        if let Some(ga) = c.global_action {
            let Node::GlobalAction(g) = arena.node(ga).clone() else {
                return;
            };
            let parent_ga = match arena.node(parent_contents) {
                Node::Contents(x) => x.global_action,
                _ => None,
            };
            match parent_ga {
                Some(target) => {
                    for &action in &g.actions {
                        arena.detach(action);
                        arena.push_to_list(target, action, |n| match n {
                            Node::GlobalAction(x) => &mut x.actions,
                            _ => unreachable!("global action expected"),
                        });
                    }
                }
                None => {
                    arena.detach(ga);
                    if let Node::Contents(x) = arena.node_mut(parent_contents) {
                        x.global_action = Some(ga);
                    }
                    arena.claim(parent_contents, ga);
                }
            }
        }
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    debug_assert!(b > 0);
    (a + b - 1).div_euclid(b)
}

/// The contents a generate expands into: the parent of its generates list.
fn enclosing_contents(arena: &Arena, id: NodeId) -> Option<NodeId> {
    let parent = arena.parent(id)?;
    match arena.node(parent) {
        Node::Contents(_) => Some(parent),
        _ => crate::tree::nav::nearest_parent_of_kind(
            arena,
            id,
            crate::tree::NodeKind::Contents,
        ),
    }
}

/// Is there a scope between `hit` and `root` redeclaring `name`?
fn shadowed_between(arena: &Arena, hit: NodeId, root: NodeId, name: &str) -> bool {
    let mut current = arena.parent(hit);
    while let Some(p) = current {
        if p == root {
            return false;
        }
        let declares = match arena.node(p) {
            Node::For(f) => f.init_declarations.clone(),
            Node::ForGenerate(f) => f.init_declarations.clone(),
            Node::StateTable(st) => st.declarations.clone(),
            Node::SubProgram(sp) => sp.params.clone(),
            _ => Vec::new(),
        };
        if declares
            .iter()
            .any(|&d| arena.node(d).name().is_some_and(|n| n == name))
        {
            return true;
        }
        current = arena.parent(p);
    }
    false
}
