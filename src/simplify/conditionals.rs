//! Conditional flattening: `if`/`switch` statements and `when`/`with`
//! expressions with constant or redundant branches.

use crate::simplify::Simplifier;
use crate::tree::copy::deep_copy;
use crate::tree::equals::equals_default;
use crate::tree::{Arena, Node, NodeId, Operator};
use crate::typing::{semantic_type, type_is_logic};

impl Simplifier<'_> {
    /// Constant truth value of a condition, when it has one.
    pub(crate) fn resolve_bool_condition(&self, arena: &Arena, cond: NodeId) -> Option<bool> {
        match arena.node(cond) {
            Node::BoolVal(x) => Some(x.value),
            Node::BitVal(x) if x.value.is_01() => Some(x.value.is_high()),
            Node::IntVal(x) => Some(x.value != 0),
            Node::Cast(c) => self.resolve_bool_condition(arena, c.value),
            _ => None,
        }
    }

    /// Force a value into boolean position when the semantics requires an
    /// explicit conversion there.
    pub(crate) fn simplify_condition(&mut self, arena: &mut Arena, cond: NodeId) {
        let Some(ty) = semantic_type(arena, self.sem, cond) else {
            return;
        };
        if self.sem.check_condition(arena, ty) {
            return;
        }
        if arena.kind(cond) == crate::tree::NodeKind::Cast {
            return;
        }
        let placeholder = arena.extract(cond);
        let Some(placeholder) = placeholder else {
            return;
        };
        match self.sem.explicit_bool_conversion(arena, cond) {
            Some(converted) => {
                arena.replace(placeholder, converted);
                arena.free_subtree(placeholder);
            }
            None => {
                // Put it back untouched.
                arena.replace(placeholder, cond);
                arena.free_subtree(placeholder);
            }
        }
    }

    pub(crate) fn visit_if_alt(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::IfAlt(alt) = arena.node(id).clone() else {
            return;
        };
        self.simplify_condition(arena, alt.condition);
    }

    pub(crate) fn visit_when_alt(&mut self, arena: &mut Arena, id: NodeId) {
        let Node::WhenAlt(alt) = arena.node(id).clone() else {
            return;
        };
        self.simplify_condition(arena, alt.condition);
    }

    // ========================================================================
    // IF
    // ========================================================================

    pub(crate) fn visit_if(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_if_constant_condition(arena, id) {
            return;
        }
        let _ = self.simplify_if_merging_cases(arena, id);
    }

    /// Drop false alternatives; a true alternative replaces the whole
    /// statement (with everything after it unreachable).
    fn simplify_if_constant_condition(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::If(stmt) = arena.node(id).clone() else {
            return false;
        };
        let mut kept = Vec::new();
        let mut winner: Option<NodeId> = None;
        for &alt in &stmt.alts {
            let Node::IfAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            match self.resolve_bool_condition(arena, a.condition) {
                Some(false) => {
                    arena.detach(alt);
                    self.trash.insert(alt);
                }
                Some(true) => {
                    winner = Some(alt);
                    break;
                }
                None => kept.push(alt),
            }
        }

        if let Some(winner) = winner {
            if kept.is_empty() {
                // No live guard before the winner: its body replaces the if.
                let Node::IfAlt(a) = arena.node(winner).clone() else {
                    return false;
                };
                let body: Vec<NodeId> =
                    a.actions.iter().map(|&x| deep_copy(arena, x)).collect();
                if arena.parent(id).is_some() {
                    arena.replace_with_list(id, &body);
                    self.trash.insert(id);
                    for &b in &body {
                        self.visit(arena, b);
                    }
                } else {
                    for b in body {
                        arena.free_subtree(b);
                    }
                    return false;
                }
                return true;
            }
            // Guards remain: the winner becomes the new default.
            let Node::IfAlt(a) = arena.node(winner).clone() else {
                return false;
            };
            let body: Vec<NodeId> = a.actions.iter().map(|&x| deep_copy(arena, x)).collect();
            let Node::If(stmt_now) = arena.node(id).clone() else {
                return false;
            };
            for &later in stmt_now
                .alts
                .iter()
                .skip_while(|&&x| x != winner)
                .filter(|&&x| x != winner)
            {
                arena.detach(later);
                self.trash.insert(later);
            }
            for old_default in stmt_now.default {
                arena.detach(old_default);
                self.trash.insert(old_default);
            }
            arena.detach(winner);
            self.trash.insert(winner);
            for b in body {
                arena.push_to_list(id, b, |n| match n {
                    Node::If(x) => &mut x.default,
                    _ => unreachable!("if visited"),
                });
            }
            return true;
        }

        let Node::If(stmt_now) = arena.node(id).clone() else {
            return false;
        };
        if stmt_now.alts.is_empty() {
            // Only the else remains.
            let body: Vec<NodeId> = stmt_now
                .default
                .iter()
                .map(|&x| deep_copy(arena, x))
                .collect();
            if arena.parent(id).is_some() {
                arena.replace_with_list(id, &body);
                self.trash.insert(id);
                return true;
            }
        }
        false
    }

    /// Adjacent alternatives with identical bodies merge their guards
    /// with `or`; trailing alternatives equal to the else body are
    /// dropped.
    fn simplify_if_merging_cases(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::If(stmt) = arena.node(id).clone() else {
            return false;
        };
        let mut changed = false;

        // Merge adjacent identical bodies.
        let mut i = 0;
        while i + 1 < self.if_alts(arena, id).len() {
            let alts = self.if_alts(arena, id);
            let (a, b) = (alts[i], alts[i + 1]);
            if self.bodies_equal(arena, a, b) {
                let (Node::IfAlt(aa), Node::IfAlt(ab)) =
                    (arena.node(a).clone(), arena.node(b).clone())
                else {
                    break;
                };
                let ca = deep_copy(arena, aa.condition);
                let cb = deep_copy(arena, ab.condition);
                let merged = crate::tree::build::Builder::new(arena)
                    .binary(Operator::Or, ca, cb);
                let old = aa.condition;
                arena.replace(old, merged);
                arena.free_subtree(old);
                arena.detach(b);
                self.trash.insert(b);
                changed = true;
                continue;
            }
            i += 1;
        }

        // Drop trailing alternatives whose body equals the else body.
        if !stmt.default.is_empty() {
            loop {
                let alts = self.if_alts(arena, id);
                let Some(&last) = alts.last() else {
                    break;
                };
                let Node::IfAlt(a) = arena.node(last).clone() else {
                    break;
                };
                let Node::If(s) = arena.node(id).clone() else {
                    break;
                };
                if !action_lists_equal(arena, &a.actions, &s.default) {
                    break;
                }
                arena.detach(last);
                self.trash.insert(last);
                changed = true;
            }
        }
        changed
    }

    fn if_alts(&self, arena: &Arena, id: NodeId) -> Vec<NodeId> {
        match arena.node(id) {
            Node::If(s) => s.alts.clone(),
            _ => Vec::new(),
        }
    }

    fn bodies_equal(&self, arena: &Arena, a: NodeId, b: NodeId) -> bool {
        let (Node::IfAlt(aa), Node::IfAlt(ab)) = (arena.node(a), arena.node(b)) else {
            return false;
        };
        action_lists_equal(arena, &aa.actions, &ab.actions)
    }

    // ========================================================================
    // SWITCH
    // ========================================================================

    pub(crate) fn visit_switch(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_switch_constant_condition(arena, id) {
            return;
        }
        let _ = self.simplify_switch_useless_alts(arena, id);
    }

    fn simplify_switch_constant_condition(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Switch(stmt) = arena.node(id).clone() else {
            return false;
        };
        if !arena.node(stmt.condition).is_const_value() {
            return false;
        }
        let mut selected: Option<Vec<NodeId>> = None;
        for &alt in &stmt.alts {
            let Node::SwitchAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            let mut all_literal = true;
            for &c in &a.conditions {
                if !arena.node(c).is_const_value() {
                    all_literal = false;
                    continue;
                }
                if equals_default(arena, c, stmt.condition) {
                    selected = Some(a.actions.clone());
                    break;
                }
            }
            if selected.is_some() {
                break;
            }
            if !all_literal {
                return false;
            }
        }
        let body_src = match selected {
            Some(actions) => actions,
            None => stmt.default.clone(),
        };
        let body: Vec<NodeId> = body_src.iter().map(|&x| deep_copy(arena, x)).collect();
        if arena.parent(id).is_none() {
            for b in body {
                arena.free_subtree(b);
            }
            return false;
        }
        arena.replace_with_list(id, &body);
        self.trash.insert(id);
        for &b in &body {
            self.visit(arena, b);
        }
        true
    }

    /// Alternatives whose bodies equal the default body are redundant.
    fn simplify_switch_useless_alts(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::Switch(stmt) = arena.node(id).clone() else {
            return false;
        };
        if stmt.default.is_empty() {
            return false;
        }
        let mut changed = false;
        for &alt in &stmt.alts {
            let Node::SwitchAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            if action_lists_equal(arena, &a.actions, &stmt.default) {
                arena.detach(alt);
                self.trash.insert(alt);
                changed = true;
            }
        }
        changed
    }

    // ========================================================================
    // WHEN
    // ========================================================================

    pub(crate) fn visit_when(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_when_constant_condition(arena, id) {
            return;
        }
        if self.simplify_when_merging_cases(arena, id) {
            return;
        }
        let _ = self.simplify_when_bool_constants(arena, id);
    }

    fn simplify_when_constant_condition(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::When(w) = arena.node(id).clone() else {
            return false;
        };
        for &alt in &w.alts {
            let Node::WhenAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            match self.resolve_bool_condition(arena, a.condition) {
                Some(true) => {
                    let value = deep_copy(arena, a.value);
                    self.replace(arena, id, value);
                    self.visit(arena, value);
                    return true;
                }
                Some(false) => {
                    arena.detach(alt);
                    self.trash.insert(alt);
                }
                None => return false,
            }
        }
        let Node::When(now) = arena.node(id).clone() else {
            return false;
        };
        if now.alts.is_empty() {
            if let Some(default) = now.default {
                let value = deep_copy(arena, default);
                self.replace(arena, id, value);
                self.visit(arena, value);
                return true;
            }
        }
        false
    }

    fn simplify_when_merging_cases(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let mut changed = false;
        loop {
            let Node::When(w) = arena.node(id).clone() else {
                return changed;
            };
            let mut merged = false;
            for pair in w.alts.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let (Node::WhenAlt(aa), Node::WhenAlt(ab)) =
                    (arena.node(a).clone(), arena.node(b).clone())
                else {
                    continue;
                };
                if !equals_default(arena, aa.value, ab.value) {
                    continue;
                }
                let ca = deep_copy(arena, aa.condition);
                let cb = deep_copy(arena, ab.condition);
                let or = crate::tree::build::Builder::new(arena)
                    .binary(Operator::Or, ca, cb);
                let old = aa.condition;
                arena.replace(old, or);
                arena.free_subtree(old);
                arena.detach(b);
                self.trash.insert(b);
                merged = true;
                changed = true;
                break;
            }
            if !merged {
                break;
            }
        }
        // A trailing alternative equal to the default folds away.
        loop {
            let Node::When(w) = arena.node(id).clone() else {
                return changed;
            };
            let (Some(&last), Some(default)) = (w.alts.last(), w.default) else {
                break;
            };
            let Node::WhenAlt(a) = arena.node(last).clone() else {
                break;
            };
            if !equals_default(arena, a.value, default) {
                break;
            }
            arena.detach(last);
            self.trash.insert(last);
            changed = true;
        }
        changed
    }

    /// `when c then true else false` in non-logic position reduces to `c`
    /// (with polarity and cast adjustments); logic positions keep the
    /// `when`, because the condition may be `X`.
    fn simplify_when_bool_constants(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::When(w) = arena.node(id).clone() else {
            return false;
        };
        if w.alts.len() != 1 {
            return false;
        }
        let Some(default) = w.default else {
            return false;
        };
        let Node::WhenAlt(alt) = arena.node(w.alts[0]).clone() else {
            return false;
        };
        let truth = |arena: &Arena, v: NodeId| -> Option<bool> {
            match arena.node(v) {
                Node::BoolVal(x) => Some(x.value),
                Node::BitVal(x) if x.value.is_01() => Some(x.value.is_high()),
                _ => None,
            }
        };
        let (Some(then_val), Some(else_val)) =
            (truth(arena, alt.value), truth(arena, default))
        else {
            return false;
        };
        if then_val == else_val {
            return false;
        }
        let Some(when_ty) = semantic_type(arena, self.sem, id) else {
            return false;
        };
        if type_is_logic(arena, when_ty) {
            return false;
        }
        let when_ty_copy = deep_copy(arena, when_ty);

        let mut result = deep_copy(arena, alt.condition);
        if !then_val {
            result = crate::tree::build::Builder::new(arena).unary(Operator::Not, result);
        }
        let needs_cast = match semantic_type(arena, self.sem, result) {
            Some(cond_ty) => !equals_default(arena, cond_ty, when_ty_copy),
            None => true,
        };
        let result = if needs_cast {
            crate::tree::build::Builder::new(arena).cast(when_ty_copy, result)
        } else {
            arena.free_subtree(when_ty_copy);
            result
        };
        self.replace(arena, id, result);
        self.visit(arena, result);
        true
    }

    // ========================================================================
    // WITH
    // ========================================================================

    pub(crate) fn visit_with(&mut self, arena: &mut Arena, id: NodeId) {
        if self.simplify_with_constant_condition(arena, id) {
            return;
        }
        let _ = self.simplify_with_useless_alts(arena, id);
    }

    fn simplify_with_constant_condition(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::With(w) = arena.node(id).clone() else {
            return false;
        };
        if !arena.node(w.condition).is_const_value() {
            return false;
        }
        let mut selected = None;
        for &alt in &w.alts {
            let Node::WithAlt(a) = arena.node(alt).clone() else {
                continue;
            };
            for &c in &a.conditions {
                if !arena.node(c).is_const_value() {
                    return false;
                }
                if equals_default(arena, c, w.condition) {
                    selected = Some(a.value);
                    break;
                }
            }
            if selected.is_some() {
                break;
            }
        }
        let value_src = selected.or(w.default);
        let Some(value_src) = value_src else {
            return false;
        };
        let value = deep_copy(arena, value_src);
        self.replace(arena, id, value);
        self.visit(arena, value);
        true
    }

    /// Alternatives selecting the same value as the default are
    /// redundant; identical neighbours merge their selector lists.
    fn simplify_with_useless_alts(&mut self, arena: &mut Arena, id: NodeId) -> bool {
        let Node::With(w) = arena.node(id).clone() else {
            return false;
        };
        let mut changed = false;
        if let Some(default) = w.default {
            for &alt in &w.alts {
                let Node::WithAlt(a) = arena.node(alt).clone() else {
                    continue;
                };
                if equals_default(arena, a.value, default) {
                    arena.detach(alt);
                    self.trash.insert(alt);
                    changed = true;
                }
            }
        }
        // Merge identical neighbours.
        loop {
            let Node::With(now) = arena.node(id).clone() else {
                return changed;
            };
            let mut merged = false;
            for pair in now.alts.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let (Node::WithAlt(aa), Node::WithAlt(ab)) =
                    (arena.node(a).clone(), arena.node(b).clone())
                else {
                    continue;
                };
                if !equals_default(arena, aa.value, ab.value) {
                    continue;
                }
                let _ = aa;
                for &cond in &ab.conditions {
                    let copy = deep_copy(arena, cond);
                    arena.push_to_list(a, copy, |n| match n {
                        Node::WithAlt(x) => &mut x.conditions,
                        _ => unreachable!("with owns with-alts"),
                    });
                }
                arena.detach(b);
                self.trash.insert(b);
                merged = true;
                changed = true;
                break;
            }
            if !merged {
                break;
            }
        }
        changed
    }
}

fn action_lists_equal(arena: &Arena, a: &[NodeId], b: &[NodeId]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(&x, &y)| equals_default(arena, x, y))
}
