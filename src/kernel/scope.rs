//! Canonicalization of terms.
//!
//! Canonicalization does not operate on terms directly. Terms are first
//! converted into an intermediate `Scope` form whose commutative nodes keep
//! two sorted operand lists (positive and negated) and whose conditional node
//! keeps four, so that flattening, deduplication, annihilation, and
//! quantifier hoisting are sorted-list operations. Every scope caches the set
//! of canonical variables occurring free in it, which makes hoisting
//! decisions O(1). A final pass emits the canonical term through the bank.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::kernel::term::{Term, TermBank};
use crate::kernel::types::{infer_types, TypeError, TypeMap};

#[derive(Clone, Debug, Error)]
pub enum CanonicalizeError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error("variable {0} is bound more than once")]
    DuplicateBinding(u32),
}

/// Options for canonicalization.
///
/// `all_constants_distinct` reduces an equality between two distinct
/// constants to `False`. `polymorphic_equality` gives the two operands of an
/// equality independent type variables during inference.
#[derive(Clone, Copy, Debug, Default)]
pub struct Canonicalizer {
    pub all_constants_distinct: bool,
    pub polymorphic_equality: bool,
}

impl Canonicalizer {
    pub fn new() -> Canonicalizer {
        Canonicalizer::default()
    }

    /// Rewrites `term` to the unique representative of its equivalence
    /// class. Idempotent: canonicalizing a canonical term returns it
    /// unchanged.
    pub fn canonicalize(
        &self,
        bank: &mut TermBank,
        term: &Arc<Term>,
    ) -> Result<Arc<Term>, CanonicalizeError> {
        let types = infer_types(term, self.polymorphic_equality)?;
        let mut context = Context {
            types: &types,
            variable_map: vec![],
            all_constants_distinct: self.all_constants_distinct,
        };
        let scope = context.canonicalize_scope(term)?;
        Ok(scope_to_term(bank, &scope))
    }

    pub fn is_canonical(
        &self,
        bank: &mut TermBank,
        term: &Arc<Term>,
    ) -> Result<bool, CanonicalizeError> {
        let canonical = self.canonicalize(bank, term)?;
        Ok(canonical == *term)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ScopeOp {
    And,
    Or,
    Iff,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum QuantifierOp {
    ForAll,
    Exists,
    Lambda,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct CommutativeScope {
    children: Vec<Scope>,
    negated: Vec<Scope>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct ConditionalScope {
    left: Vec<Scope>,
    left_negated: Vec<Scope>,
    right: Vec<Scope>,
    right_negated: Vec<Scope>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum ScopeKind {
    Variable(u32),
    Constant(u32),
    Parameter(u32),
    Integer(i64),
    True,
    False,
    Not(Box<Scope>),
    Commutative(ScopeOp, CommutativeScope),
    Conditional(ConditionalScope),
    Quantifier(QuantifierOp, u32, Box<Scope>),
    Equals(Box<Scope>, Box<Scope>),
    App1(Box<Scope>, Box<Scope>),
    App2(Box<Scope>, Box<Scope>, Box<Scope>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Scope {
    /// Sorted canonical variables occurring free in this scope.
    vars: Vec<u32>,
    kind: ScopeKind,
}

impl Scope {
    fn truth() -> Scope {
        Scope {
            vars: vec![],
            kind: ScopeKind::True,
        }
    }

    fn falsity() -> Scope {
        Scope {
            vars: vec![],
            kind: ScopeKind::False,
        }
    }

    fn commutative(op: ScopeOp) -> Scope {
        Scope {
            vars: vec![],
            kind: ScopeKind::Commutative(op, CommutativeScope::default()),
        }
    }

    fn is_true(&self) -> bool {
        matches!(self.kind, ScopeKind::True)
    }

    fn is_false(&self) -> bool {
        matches!(self.kind, ScopeKind::False)
    }

    /// A biconditional scope whose trailing child is `False` is a negated
    /// biconditional.
    fn is_negated_iff(&self) -> bool {
        match &self.kind {
            ScopeKind::Commutative(ScopeOp::Iff, commutative) => commutative
                .children
                .last()
                .map_or(false, |child| child.is_false()),
            _ => false,
        }
    }
}

/// Position of the scope's variant in the total order. This mirrors the term
/// order so that operand lists of emitted terms read in scope order.
fn scope_rank(kind: &ScopeKind) -> u8 {
    match kind {
        ScopeKind::Variable(_) => 0,
        ScopeKind::Constant(_) => 1,
        ScopeKind::Parameter(_) => 2,
        ScopeKind::App1(..) => 3,
        ScopeKind::App2(..) => 4,
        ScopeKind::Commutative(ScopeOp::And, _) => 5,
        ScopeKind::Commutative(ScopeOp::Or, _) => 6,
        ScopeKind::Conditional(_) => 7,
        ScopeKind::Equals(..) => 8,
        ScopeKind::Commutative(ScopeOp::Iff, _) => 9,
        ScopeKind::Not(_) => 10,
        ScopeKind::Quantifier(QuantifierOp::ForAll, ..) => 11,
        ScopeKind::Quantifier(QuantifierOp::Exists, ..) => 12,
        ScopeKind::Quantifier(QuantifierOp::Lambda, ..) => 13,
        ScopeKind::Integer(_) => 14,
        ScopeKind::True => 15,
        ScopeKind::False => 16,
    }
}

fn compare_lists(first: &[Scope], second: &[Scope]) -> Ordering {
    first.len().cmp(&second.len()).then_with(|| {
        for (a, b) in first.iter().zip(second) {
            let result = compare(a, b);
            if result != Ordering::Equal {
                return result;
            }
        }
        Ordering::Equal
    })
}

fn compare(first: &Scope, second: &Scope) -> Ordering {
    let rank = scope_rank(&first.kind).cmp(&scope_rank(&second.kind));
    if rank != Ordering::Equal {
        return rank;
    }
    match (&first.kind, &second.kind) {
        (ScopeKind::Variable(a), ScopeKind::Variable(b)) => a.cmp(b),
        (ScopeKind::Constant(a), ScopeKind::Constant(b)) => a.cmp(b),
        (ScopeKind::Parameter(a), ScopeKind::Parameter(b)) => a.cmp(b),
        (ScopeKind::Integer(a), ScopeKind::Integer(b)) => a.cmp(b),
        (ScopeKind::True, ScopeKind::True) | (ScopeKind::False, ScopeKind::False) => {
            Ordering::Equal
        }
        (ScopeKind::Not(a), ScopeKind::Not(b)) => compare(a, b),
        (ScopeKind::Commutative(_, a), ScopeKind::Commutative(_, b)) => {
            compare_lists(&a.children, &b.children)
                .then_with(|| compare_lists(&a.negated, &b.negated))
        }
        (ScopeKind::Conditional(a), ScopeKind::Conditional(b)) => {
            compare_lists(&a.left, &b.left)
                .then_with(|| compare_lists(&a.left_negated, &b.left_negated))
                .then_with(|| compare_lists(&a.right, &b.right))
                .then_with(|| compare_lists(&a.right_negated, &b.right_negated))
        }
        (ScopeKind::Quantifier(_, v, a), ScopeKind::Quantifier(_, w, b)) => {
            v.cmp(w).then_with(|| compare(a, b))
        }
        (ScopeKind::Equals(a, b), ScopeKind::Equals(c, d))
        | (ScopeKind::App1(a, b), ScopeKind::App1(c, d)) => {
            compare(a, c).then_with(|| compare(b, d))
        }
        (ScopeKind::App2(a, b, c), ScopeKind::App2(d, e, f)) => compare(a, d)
            .then_with(|| compare(b, e))
            .then_with(|| compare(c, f)),
        _ => unreachable!("scope ranks matched for different kinds"),
    }
}

/// Sorted union of variable sets.
fn merge_vars(dst: &mut Vec<u32>, src: &[u32]) {
    for &v in src {
        if let Err(index) = dst.binary_search(&v) {
            dst.insert(index, v);
        }
    }
}

fn commutative_vars(commutative: &CommutativeScope) -> Vec<u32> {
    let mut vars = vec![];
    for child in &commutative.children {
        merge_vars(&mut vars, &child.vars);
    }
    for child in &commutative.negated {
        merge_vars(&mut vars, &child.vars);
    }
    vars
}

fn conditional_vars(conditional: &ConditionalScope) -> Vec<u32> {
    let mut vars = vec![];
    for child in conditional
        .left
        .iter()
        .chain(&conditional.left_negated)
        .chain(&conditional.right)
        .chain(&conditional.right_negated)
    {
        merge_vars(&mut vars, &child.vars);
    }
    vars
}

/// Decrements every variable above `removed` in a scope hoisted out of the
/// quantifier that bound `removed`.
fn shift_variables(scope: &mut Scope, removed: u32) {
    for v in scope.vars.iter_mut() {
        if *v > removed {
            *v -= 1;
        }
    }
    match &mut scope.kind {
        ScopeKind::Variable(v) => {
            if *v > removed {
                *v -= 1;
            }
        }
        ScopeKind::Constant(_)
        | ScopeKind::Parameter(_)
        | ScopeKind::Integer(_)
        | ScopeKind::True
        | ScopeKind::False => {}
        ScopeKind::Not(operand) => shift_variables(operand, removed),
        ScopeKind::Commutative(_, commutative) => {
            for child in &mut commutative.children {
                shift_variables(child, removed);
            }
            for child in &mut commutative.negated {
                shift_variables(child, removed);
            }
        }
        ScopeKind::Conditional(conditional) => {
            for child in conditional
                .left
                .iter_mut()
                .chain(&mut conditional.left_negated)
                .chain(&mut conditional.right)
                .chain(&mut conditional.right_negated)
            {
                shift_variables(child, removed);
            }
        }
        ScopeKind::Quantifier(_, v, operand) => {
            if *v > removed {
                *v -= 1;
            }
            shift_variables(operand, removed);
        }
        ScopeKind::Equals(a, b) | ScopeKind::App1(a, b) => {
            shift_variables(a, removed);
            shift_variables(b, removed);
        }
        ScopeKind::App2(a, b, c) => {
            shift_variables(a, removed);
            shift_variables(b, removed);
            shift_variables(c, removed);
        }
    }
}

/// Toggles the trailing-`False` sentinel that marks a negated biconditional.
fn negate_iff(scope: &mut Scope) {
    if let ScopeKind::Commutative(ScopeOp::Iff, commutative) = &mut scope.kind {
        if commutative
            .children
            .last()
            .map_or(false, |child| child.is_false())
        {
            commutative.children.pop();
        } else {
            commutative.children.push(Scope::falsity());
        }
    }
}

fn negate_scope(scope: Scope) -> Scope {
    match scope.kind {
        ScopeKind::True => Scope::falsity(),
        ScopeKind::False => Scope::truth(),
        ScopeKind::Not(operand) => *operand,
        ScopeKind::Commutative(ScopeOp::Iff, _) => {
            let mut scope = scope;
            negate_iff(&mut scope);
            scope
        }
        _ => {
            let vars = scope.vars.clone();
            Scope {
                vars,
                kind: ScopeKind::Not(Box::new(scope)),
            }
        }
    }
}

fn are_negations(first: &Scope, second: &Scope) -> bool {
    if let ScopeKind::Not(operand) = &first.kind {
        if **operand == *second {
            return true;
        }
    }
    if let ScopeKind::Not(operand) = &second.kind {
        if **operand == *first {
            return true;
        }
    }
    match (&first.kind, &second.kind) {
        (
            ScopeKind::Commutative(ScopeOp::Iff, a),
            ScopeKind::Commutative(ScopeOp::Iff, b),
        ) => match (first.is_negated_iff(), second.is_negated_iff()) {
            (true, false) => {
                a.children[..a.children.len() - 1] == b.children[..] && a.negated == b.negated
            }
            (false, true) => {
                b.children[..b.children.len() - 1] == a.children[..] && b.negated == a.negated
            }
            _ => false,
        },
        _ => false,
    }
}

/// Finds `scope` in the sorted `list`, or the position where it belongs.
fn scope_position(scope: &Scope, list: &[Scope]) -> Result<usize, usize> {
    for (index, entry) in list.iter().enumerate() {
        match compare(scope, entry) {
            Ordering::Less => return Err(index),
            Ordering::Equal => return Ok(index),
            Ordering::Greater => {}
        }
    }
    Err(list.len())
}

/// Whether two sorted lists share an element.
fn lists_intersect(first: &[Scope], second: &[Scope]) -> bool {
    let mut i = 0;
    let mut j = 0;
    while i < first.len() && j < second.len() {
        match compare(&first[i], &second[j]) {
            Ordering::Equal => return true,
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    false
}

/// Removes the elements common to both sorted lists (biconditional operands
/// cancel in pairs) and returns how many pairs were removed.
fn cancel_common(first: &mut Vec<Scope>, second: &mut Vec<Scope>) -> usize {
    let mut cancelled = 0;
    let mut i = 0;
    while i < first.len() {
        match scope_position(&first[i], second) {
            Ok(j) => {
                first.remove(i);
                second.remove(j);
                cancelled += 1;
            }
            Err(_) => i += 1,
        }
    }
    cancelled
}

/// Inserts `sub` into the sorted positive list, unless it already occurs
/// there or its negation occurs in `negated`. Returns true when a negation
/// was found. For `Iff`, a duplicate cancels with its twin and a negation
/// cancels with the negated twin.
fn add_to_scope_helper(
    op: ScopeOp,
    sub: Scope,
    children: &mut Vec<Scope>,
    negated: &mut Vec<Scope>,
) -> bool {
    if let Ok(index) = scope_position(&sub, negated) {
        if op == ScopeOp::Iff {
            negated.remove(index);
        }
        return true;
    }
    match scope_position(&sub, children) {
        Ok(index) => {
            if op == ScopeOp::Iff {
                children.remove(index);
            }
            false
        }
        Err(index) => {
            children.insert(index, sub);
            false
        }
    }
}

/// Adds a canonicalized subscope to a commutative scope, routing negations
/// (explicit `Not` or negated biconditionals) to the negated list.
fn add_to_scope(
    op: ScopeOp,
    sub: Scope,
    children: &mut Vec<Scope>,
    negated: &mut Vec<Scope>,
) -> bool {
    let negated_iff = sub.is_negated_iff();
    match sub.kind {
        ScopeKind::Not(operand) => add_to_scope_helper(op, *operand, negated, children),
        ScopeKind::Commutative(ScopeOp::Iff, _) if negated_iff => {
            let mut sub = sub;
            negate_iff(&mut sub);
            add_to_scope_helper(op, sub, negated, children)
        }
        _ => add_to_scope_helper(op, sub, children, negated),
    }
}

/// Merges `src` into the sorted `dst`, deduplicating (`And`/`Or`) or
/// cancelling equal pairs (`Iff`).
fn merge_sorted(op: ScopeOp, dst: &mut Vec<Scope>, src: Vec<Scope>) {
    let mut merged = Vec::with_capacity(dst.len() + src.len());
    let mut dst_iter = std::mem::take(dst).into_iter().peekable();
    let mut src_iter = src.into_iter().peekable();
    loop {
        match (dst_iter.peek(), src_iter.peek()) {
            (Some(a), Some(b)) => match compare(a, b) {
                Ordering::Equal => {
                    let kept = dst_iter.next().unwrap();
                    src_iter.next();
                    if op != ScopeOp::Iff {
                        merged.push(kept);
                    }
                }
                Ordering::Less => merged.push(dst_iter.next().unwrap()),
                Ordering::Greater => merged.push(src_iter.next().unwrap()),
            },
            (Some(_), None) => merged.push(dst_iter.next().unwrap()),
            (None, Some(_)) => merged.push(src_iter.next().unwrap()),
            (None, None) => break,
        }
    }
    *dst = merged;
}

/// Merges the operand lists of a same-operator subscope into a scope under
/// construction. Returns true when the merge annihilates the whole scope
/// (`And`/`Or`) or toggles the biconditional's negation (`Iff`).
fn merge_scopes(
    op: ScopeOp,
    dst_children: &mut Vec<Scope>,
    dst_negated: &mut Vec<Scope>,
    mut src_children: Vec<Scope>,
    mut src_negated: Vec<Scope>,
) -> bool {
    if op != ScopeOp::Iff {
        if lists_intersect(&src_children, dst_negated)
            || lists_intersect(&src_negated, dst_children)
        {
            return true;
        }
        merge_sorted(op, dst_children, src_children);
        merge_sorted(op, dst_negated, src_negated);
        return false;
    }

    let cancelled = cancel_common(&mut src_children, dst_negated)
        + cancel_common(&mut src_negated, dst_children);
    merge_sorted(op, dst_children, src_children);
    merge_sorted(op, dst_negated, src_negated);
    cancelled % 2 == 1
}

struct Context<'a> {
    types: &'a TypeMap,
    /// Source variable to canonical variable, in binding order. Free
    /// variables are recorded on first occurrence and never popped.
    variable_map: Vec<(u32, u32)>,
    all_constants_distinct: bool,
}

impl<'a> Context<'a> {
    fn next_variable(&self) -> u32 {
        1 + self
            .variable_map
            .iter()
            .map(|(_, dst)| *dst)
            .max()
            .unwrap_or(0)
    }

    fn bind(&mut self, src: u32) -> Result<u32, CanonicalizeError> {
        if self.variable_map.iter().any(|(s, _)| *s == src) {
            return Err(CanonicalizeError::DuplicateBinding(src));
        }
        let dst = self.next_variable();
        self.variable_map.push((src, dst));
        Ok(dst)
    }

    fn unbind(&mut self, src: u32) {
        if let Some(index) = self.variable_map.iter().rposition(|(s, _)| *s == src) {
            self.variable_map.remove(index);
        }
    }

    fn canonical_variable(&mut self, src: u32) -> u32 {
        if let Some((_, dst)) = self.variable_map.iter().find(|(s, _)| *s == src) {
            return *dst;
        }
        let dst = self.next_variable();
        self.variable_map.push((src, dst));
        dst
    }

    fn canonicalize_scope(&mut self, term: &Arc<Term>) -> Result<Scope, CanonicalizeError> {
        match &**term {
            Term::True => Ok(Scope::truth()),
            Term::False => Ok(Scope::falsity()),
            Term::Constant(c) => Ok(Scope {
                vars: vec![],
                kind: ScopeKind::Constant(*c),
            }),
            Term::Parameter(p) => Ok(Scope {
                vars: vec![],
                kind: ScopeKind::Parameter(*p),
            }),
            Term::Integer(i) => Ok(Scope {
                vars: vec![],
                kind: ScopeKind::Integer(*i),
            }),
            Term::Variable(v) => {
                let dst = self.canonical_variable(*v);
                Ok(Scope {
                    vars: vec![dst],
                    kind: ScopeKind::Variable(dst),
                })
            }
            Term::Not(operand) => {
                let operand = self.canonicalize_scope(operand)?;
                Ok(negate_scope(operand))
            }
            Term::And(operands) => self.canonicalize_commutative(ScopeOp::And, operands),
            Term::Or(operands) => self.canonicalize_commutative(ScopeOp::Or, operands),
            Term::Iff(operands) => self.canonicalize_commutative(ScopeOp::Iff, operands),
            Term::IfThen(left, right) => self.canonicalize_conditional(left, right),
            Term::Equals(..) => self.canonicalize_equals(term),
            Term::App1(f, x) => {
                let f = self.canonicalize_scope(f)?;
                let x = self.canonicalize_scope(x)?;
                let mut vars = f.vars.clone();
                merge_vars(&mut vars, &x.vars);
                Ok(Scope {
                    vars,
                    kind: ScopeKind::App1(Box::new(f), Box::new(x)),
                })
            }
            Term::App2(f, x, y) => {
                let f = self.canonicalize_scope(f)?;
                let x = self.canonicalize_scope(x)?;
                let y = self.canonicalize_scope(y)?;
                let mut vars = f.vars.clone();
                merge_vars(&mut vars, &x.vars);
                merge_vars(&mut vars, &y.vars);
                Ok(Scope {
                    vars,
                    kind: ScopeKind::App2(Box::new(f), Box::new(x), Box::new(y)),
                })
            }
            Term::ForAll(v, body) => {
                self.canonicalize_quantifier(QuantifierOp::ForAll, *v, body)
            }
            Term::Exists(v, body) => {
                self.canonicalize_quantifier(QuantifierOp::Exists, *v, body)
            }
            Term::Lambda(v, body) => {
                self.canonicalize_quantifier(QuantifierOp::Lambda, *v, body)
            }
        }
    }

    fn canonicalize_commutative(
        &mut self,
        op: ScopeOp,
        operands: &[Arc<Term>],
    ) -> Result<Scope, CanonicalizeError> {
        let mut out = Scope::commutative(op);
        for operand in operands {
            let next = self.canonicalize_scope(operand)?;
            if self.absorb_into_commutative(op, &mut out, next)? {
                return Ok(out);
            }
        }
        Ok(unwrap_commutative(op, out))
    }

    /// Folds one canonicalized operand into a commutative scope under
    /// construction. Returns true when the whole scope collapsed to a
    /// constant (`out` then holds the result).
    fn absorb_into_commutative(
        &mut self,
        op: ScopeOp,
        out: &mut Scope,
        next: Scope,
    ) -> Result<bool, CanonicalizeError> {
        if next.is_false() {
            match op {
                ScopeOp::And => {
                    *out = Scope::falsity();
                    return Ok(true);
                }
                ScopeOp::Iff => negate_iff(out),
                ScopeOp::Or => {}
            }
            return Ok(false);
        }
        if next.is_true() {
            if op == ScopeOp::Or {
                *out = Scope::truth();
                return Ok(true);
            }
            return Ok(false);
        }

        let (children, negated) = match &mut out.kind {
            ScopeKind::Commutative(_, commutative) => {
                (&mut commutative.children, &mut commutative.negated)
            }
            _ => unreachable!("commutative scope under construction"),
        };

        let found_negation = match next.kind {
            ScopeKind::Commutative(next_op, inner) if next_op == op => {
                let found = merge_scopes(op, children, negated, inner.children, inner.negated);
                if op != ScopeOp::Iff {
                    merge_vars(&mut out.vars, &next.vars);
                }
                found
            }
            _ => {
                let next_vars = next.vars.clone();
                let found = add_to_scope(op, next, children, negated);
                if op != ScopeOp::Iff {
                    merge_vars(&mut out.vars, &next_vars);
                }
                found
            }
        };

        if op == ScopeOp::Iff {
            if let ScopeKind::Commutative(_, commutative) = &out.kind {
                out.vars = commutative_vars(commutative);
            }
        }

        if found_negation {
            match op {
                ScopeOp::And => {
                    *out = Scope::falsity();
                    return Ok(true);
                }
                ScopeOp::Or => {
                    *out = Scope::truth();
                    return Ok(true);
                }
                ScopeOp::Iff => negate_iff(out),
            }
        }
        Ok(false)
    }

    fn canonicalize_conditional(
        &mut self,
        left_term: &Arc<Term>,
        right_term: &Arc<Term>,
    ) -> Result<Scope, CanonicalizeError> {
        let left = self.canonicalize_scope(left_term)?;
        if left.is_false() {
            return Ok(Scope::truth());
        }
        if left.is_true() {
            return self.canonicalize_scope(right_term);
        }

        let out = self.canonicalize_scope(right_term)?;
        if out == left {
            return Ok(Scope::truth());
        }
        if out.is_false() {
            return Ok(negate_scope(left));
        }
        if out.is_true() {
            return Ok(out);
        }
        if are_negations(&out, &left) {
            return Ok(out);
        }

        let mut out = into_conditional(out);
        if raise_consequent_implications(&mut out) {
            return Ok(Scope::truth());
        }

        let conditional = match &mut out.kind {
            ScopeKind::Conditional(conditional) => conditional,
            _ => unreachable!("conditional scope under construction"),
        };

        // fold the antecedent into the left lists
        let found_negation = match left.kind {
            ScopeKind::Commutative(ScopeOp::And, inner) => merge_scopes(
                ScopeOp::And,
                &mut conditional.left,
                &mut conditional.left_negated,
                inner.children,
                inner.negated,
            ),
            _ => add_to_scope(
                ScopeOp::And,
                left,
                &mut conditional.left,
                &mut conditional.left_negated,
            ),
        };
        if found_negation {
            return Ok(Scope::truth());
        }

        // an operand shared by antecedent and consequent proves the whole
        // implication
        if lists_intersect(&conditional.left, &conditional.right)
            || lists_intersect(&conditional.left_negated, &conditional.right_negated)
        {
            return Ok(Scope::truth());
        }

        out.vars = match &out.kind {
            ScopeKind::Conditional(conditional) => conditional_vars(conditional),
            _ => unreachable!(),
        };
        Ok(out)
    }

    fn canonicalize_quantifier(
        &mut self,
        op: QuantifierOp,
        variable: u32,
        body: &Arc<Term>,
    ) -> Result<Scope, CanonicalizeError> {
        let canonical_variable = self.bind(variable)?;
        let operand = self.canonicalize_scope(body)?;
        self.unbind(variable);

        if operand.vars.binary_search(&canonical_variable).is_err() {
            // the bound variable does not occur: drop the quantifier
            return Ok(operand);
        }

        match operand.kind {
            ScopeKind::Commutative(ScopeOp::And | ScopeOp::Or, _) => {
                process_commutative_quantifier(op, operand, canonical_variable)
            }
            ScopeKind::Conditional(_) => {
                process_conditional_quantifier(op, operand, canonical_variable)
            }
            _ => Ok(make_quantifier(op, operand, canonical_variable)),
        }
    }

    fn canonicalize_equals(&mut self, term: &Arc<Term>) -> Result<Scope, CanonicalizeError> {
        let (left_term, right_term) = match &**term {
            Term::Equals(left, right) => (left, right),
            _ => unreachable!("canonicalize_equals expects an equality"),
        };
        let (left_bool, right_bool) = match self.types.equals_arg_types(term) {
            Some((left, right)) => (left.is_bool(), right.is_bool()),
            None => (false, false),
        };

        let left = self.canonicalize_scope(left_term)?;
        if right_bool && left.is_false() {
            let right = self.canonicalize_scope(right_term)?;
            return Ok(negate_scope(right));
        }
        if right_bool && left.is_true() {
            return self.canonicalize_scope(right_term);
        }
        if right_bool && matches!(left.kind, ScopeKind::Commutative(ScopeOp::Iff, _)) {
            let mut out = left;
            let right = self.canonicalize_scope(right_term)?;
            if right.is_false() {
                negate_iff(&mut out);
                return Ok(unwrap_commutative(ScopeOp::Iff, out));
            }
            if right.is_true() {
                return Ok(unwrap_commutative(ScopeOp::Iff, out));
            }
            let found_negation = {
                let (children, negated) = match &mut out.kind {
                    ScopeKind::Commutative(_, commutative) => {
                        (&mut commutative.children, &mut commutative.negated)
                    }
                    _ => unreachable!(),
                };
                match right.kind {
                    ScopeKind::Commutative(ScopeOp::Iff, inner) => merge_scopes(
                        ScopeOp::Iff,
                        children,
                        negated,
                        inner.children,
                        inner.negated,
                    ),
                    _ => add_to_scope(ScopeOp::Iff, right, children, negated),
                }
            };
            if let ScopeKind::Commutative(_, commutative) = &out.kind {
                out.vars = commutative_vars(commutative);
            }
            if found_negation {
                negate_iff(&mut out);
            }
            return Ok(unwrap_commutative(ScopeOp::Iff, out));
        }

        let right = self.canonicalize_scope(right_term)?;
        if left_bool && right.is_false() {
            return Ok(negate_scope(left));
        }
        if left_bool && right.is_true() {
            return Ok(left);
        }
        if left_bool && matches!(right.kind, ScopeKind::Commutative(ScopeOp::Iff, _)) {
            let mut out = right;
            let found_negation = {
                let (children, negated) = match &mut out.kind {
                    ScopeKind::Commutative(_, commutative) => {
                        (&mut commutative.children, &mut commutative.negated)
                    }
                    _ => unreachable!(),
                };
                add_to_scope(ScopeOp::Iff, left, children, negated)
            };
            if let ScopeKind::Commutative(_, commutative) = &out.kind {
                out.vars = commutative_vars(commutative);
            }
            if found_negation {
                negate_iff(&mut out);
            }
            return Ok(unwrap_commutative(ScopeOp::Iff, out));
        }
        if left == right {
            return Ok(Scope::truth());
        }
        if self.all_constants_distinct {
            if let (ScopeKind::Constant(a), ScopeKind::Constant(b)) = (&left.kind, &right.kind) {
                if a != b {
                    return Ok(Scope::falsity());
                }
            }
        }

        if left_bool && right_bool {
            let mut out = Scope::commutative(ScopeOp::Iff);
            let mut negations = 0;
            {
                let (children, negated) = match &mut out.kind {
                    ScopeKind::Commutative(_, commutative) => {
                        (&mut commutative.children, &mut commutative.negated)
                    }
                    _ => unreachable!(),
                };
                if add_to_scope(ScopeOp::Iff, left, children, negated) {
                    negations += 1;
                }
                if add_to_scope(ScopeOp::Iff, right, children, negated) {
                    negations += 1;
                }
            }
            if let ScopeKind::Commutative(_, commutative) = &out.kind {
                out.vars = commutative_vars(commutative);
            }
            if negations % 2 == 1 {
                negate_iff(&mut out);
            }
            return Ok(unwrap_commutative(ScopeOp::Iff, out));
        }

        // not known to be booleans: an ordered equality node
        let (first, second) = if compare(&left, &right) == Ordering::Greater {
            (right, left)
        } else {
            (left, right)
        };
        let mut vars = first.vars.clone();
        merge_vars(&mut vars, &second.vars);
        Ok(Scope {
            vars,
            kind: ScopeKind::Equals(Box::new(first), Box::new(second)),
        })
    }
}

/// Collapses an empty commutative scope to its unit and unwraps singletons.
fn unwrap_commutative(op: ScopeOp, mut out: Scope) -> Scope {
    let commutative = match &mut out.kind {
        ScopeKind::Commutative(_, commutative) => commutative,
        _ => return out,
    };
    match (commutative.children.len(), commutative.negated.len()) {
        (0, 0) => match op {
            ScopeOp::And | ScopeOp::Iff => Scope::truth(),
            ScopeOp::Or => Scope::falsity(),
        },
        (1, 0) => commutative.children.pop().unwrap(),
        (0, 1) => negate_scope(commutative.negated.pop().unwrap()),
        _ => out,
    }
}

/// Converts a canonicalized consequent into a conditional scope shell.
fn into_conditional(out: Scope) -> Scope {
    let vars = out.vars.clone();
    let negated_iff = out.is_negated_iff();
    let kind = match out.kind {
        ScopeKind::Commutative(ScopeOp::Or, commutative) => {
            ScopeKind::Conditional(ConditionalScope {
                left: vec![],
                left_negated: vec![],
                right: commutative.children,
                right_negated: commutative.negated,
            })
        }
        ScopeKind::Not(operand) => ScopeKind::Conditional(ConditionalScope {
            left: vec![],
            left_negated: vec![],
            right: vec![],
            right_negated: vec![*operand],
        }),
        ScopeKind::Commutative(ScopeOp::Iff, commutative) if negated_iff => {
            let mut stripped = Scope {
                vars: vars.clone(),
                kind: ScopeKind::Commutative(ScopeOp::Iff, commutative),
            };
            negate_iff(&mut stripped);
            ScopeKind::Conditional(ConditionalScope {
                left: vec![],
                left_negated: vec![],
                right: vec![],
                right_negated: vec![stripped],
            })
        }
        ScopeKind::Conditional(conditional) => ScopeKind::Conditional(conditional),
        other => ScopeKind::Conditional(ConditionalScope {
            left: vec![],
            left_negated: vec![],
            right: vec![Scope {
                vars: vars.clone(),
                kind: other,
            }],
            right_negated: vec![],
        }),
    };
    Scope { vars, kind }
}

/// Raises implications nested in the consequent disjunction into the outer
/// conditional: `A ⇒ (B ∨ (C ⇒ D))` normalizes like `(A ∧ C) ⇒ (B ∨ D)`.
/// Returns true when a merge annihilates the implication.
fn raise_consequent_implications(out: &mut Scope) -> bool {
    let conditional = match &mut out.kind {
        ScopeKind::Conditional(conditional) => conditional,
        _ => return false,
    };
    loop {
        let index = conditional
            .right
            .iter()
            .position(|child| matches!(child.kind, ScopeKind::Conditional(_)));
        let index = match index {
            Some(index) => index,
            None => return false,
        };
        let child = conditional.right.remove(index);
        let inner = match child.kind {
            ScopeKind::Conditional(inner) => inner,
            _ => unreachable!(),
        };
        if merge_scopes(
            ScopeOp::And,
            &mut conditional.left,
            &mut conditional.left_negated,
            inner.left,
            inner.left_negated,
        ) {
            return true;
        }
        if merge_scopes(
            ScopeOp::Or,
            &mut conditional.right,
            &mut conditional.right_negated,
            inner.right,
            inner.right_negated,
        ) {
            return true;
        }
    }
}

fn make_quantifier(op: QuantifierOp, operand: Scope, variable: u32) -> Scope {
    let mut vars = operand.vars.clone();
    if let Ok(index) = vars.binary_search(&variable) {
        vars.remove(index);
    }
    Scope {
        vars,
        kind: ScopeKind::Quantifier(op, variable, Box::new(operand)),
    }
}

/// Moves the operands that do not use the quantified variable out of the
/// quantifier, shifting their variable numbering past the removed binder.
fn promote_from_quantifier(list: &mut Vec<Scope>, dst: &mut Vec<Scope>, variable: u32) {
    let mut kept = Vec::with_capacity(list.len());
    for mut child in list.drain(..) {
        if child.vars.binary_search(&variable).is_err() {
            shift_variables(&mut child, variable);
            dst.push(child);
        } else {
            kept.push(child);
        }
    }
    *list = kept;
}

/// Combines a rebuilt quantifier scope with the hoisted operands.
fn combine_with_hoisted(
    op: ScopeOp,
    mut out: Scope,
    quantifier: Scope,
) -> Result<Scope, CanonicalizeError> {
    let (children, negated) = match &mut out.kind {
        ScopeKind::Commutative(_, commutative) => {
            (&mut commutative.children, &mut commutative.negated)
        }
        _ => unreachable!("hoist target is commutative"),
    };
    if children.is_empty() && negated.is_empty() {
        return Ok(quantifier);
    }
    if quantifier.is_false() {
        if op == ScopeOp::And {
            return Ok(Scope::falsity());
        }
    } else if quantifier.is_true() {
        if op == ScopeOp::Or {
            return Ok(Scope::truth());
        }
    } else if add_to_scope(op, quantifier, children, negated) {
        return Ok(match op {
            ScopeOp::And => Scope::falsity(),
            _ => Scope::truth(),
        });
    }
    if let ScopeKind::Commutative(_, commutative) = &out.kind {
        out.vars = commutative_vars(commutative);
    }
    Ok(out)
}

fn process_commutative_quantifier(
    qop: QuantifierOp,
    operand: Scope,
    variable: u32,
) -> Result<Scope, CanonicalizeError> {
    let (op, mut inner) = match operand.kind {
        ScopeKind::Commutative(op, inner) => (op, inner),
        _ => unreachable!("process_commutative_quantifier expects And/Or"),
    };
    let mut out = Scope::commutative(op);
    {
        let commutative = match &mut out.kind {
            ScopeKind::Commutative(_, commutative) => commutative,
            _ => unreachable!(),
        };
        promote_from_quantifier(&mut inner.children, &mut commutative.children, variable);
        promote_from_quantifier(&mut inner.negated, &mut commutative.negated, variable);
    }

    if inner.children.is_empty() && inner.negated.is_empty() {
        // everything moved out of the quantifier
        if let ScopeKind::Commutative(_, commutative) = &out.kind {
            out.vars = commutative_vars(commutative);
        }
        return Ok(unwrap_commutative(op, out));
    }

    let quantifier_operand = if inner.children.len() == 1 && inner.negated.is_empty() {
        inner.children.pop().unwrap()
    } else if inner.children.is_empty() && inner.negated.len() == 1 {
        negate_scope(inner.negated.pop().unwrap())
    } else {
        let vars = commutative_vars(&inner);
        Scope {
            vars,
            kind: ScopeKind::Commutative(op, inner),
        }
    };

    // removing operands can expose further hoisting in the remainder
    let quantifier = match &quantifier_operand.kind {
        ScopeKind::Commutative(inner_op, _)
            if *inner_op != op && *inner_op != ScopeOp::Iff =>
        {
            process_commutative_quantifier(qop, quantifier_operand, variable)?
        }
        ScopeKind::Conditional(_) => {
            process_conditional_quantifier(qop, quantifier_operand, variable)?
        }
        _ => make_quantifier(qop, quantifier_operand, variable),
    };

    let out = combine_with_hoisted(op, out, quantifier)?;
    Ok(unwrap_commutative(op, out))
}

fn process_conditional_quantifier(
    qop: QuantifierOp,
    operand: Scope,
    variable: u32,
) -> Result<Scope, CanonicalizeError> {
    let mut inner = match operand.kind {
        ScopeKind::Conditional(inner) => inner,
        _ => unreachable!("process_conditional_quantifier expects a conditional"),
    };
    let mut promoted = ConditionalScope::default();
    promote_from_quantifier(&mut inner.left, &mut promoted.left, variable);
    promote_from_quantifier(&mut inner.left_negated, &mut promoted.left_negated, variable);
    promote_from_quantifier(&mut inner.right, &mut promoted.right, variable);
    promote_from_quantifier(
        &mut inner.right_negated,
        &mut promoted.right_negated,
        variable,
    );

    let antecedent_empty = inner.left.is_empty() && inner.left_negated.is_empty();
    let consequent_empty = inner.right.is_empty() && inner.right_negated.is_empty();

    let quantifier = if antecedent_empty && consequent_empty {
        None
    } else if antecedent_empty {
        // the quantifier wraps only the consequent remainder
        let quantifier_operand = if inner.right.len() == 1 && inner.right_negated.is_empty() {
            inner.right.pop().unwrap()
        } else if inner.right.is_empty() && inner.right_negated.len() == 1 {
            negate_scope(inner.right_negated.pop().unwrap())
        } else {
            let commutative = CommutativeScope {
                children: std::mem::take(&mut inner.right),
                negated: std::mem::take(&mut inner.right_negated),
            };
            let vars = commutative_vars(&commutative);
            Scope {
                vars,
                kind: ScopeKind::Commutative(ScopeOp::Or, commutative),
            }
        };
        Some(match &quantifier_operand.kind {
            ScopeKind::Commutative(ScopeOp::And | ScopeOp::Or, _) => {
                process_commutative_quantifier(qop, quantifier_operand, variable)?
            }
            _ => make_quantifier(qop, quantifier_operand, variable),
        })
    } else if consequent_empty {
        // the implication degenerates to the negated antecedent
        let quantifier_operand = if inner.left.len() == 1 && inner.left_negated.is_empty() {
            negate_scope(inner.left.pop().unwrap())
        } else if inner.left.is_empty() && inner.left_negated.len() == 1 {
            inner.left_negated.pop().unwrap()
        } else {
            let commutative = CommutativeScope {
                children: std::mem::take(&mut inner.left),
                negated: std::mem::take(&mut inner.left_negated),
            };
            let vars = commutative_vars(&commutative);
            negate_scope(Scope {
                vars,
                kind: ScopeKind::Commutative(ScopeOp::And, commutative),
            })
        };
        Some(match &quantifier_operand.kind {
            ScopeKind::Commutative(ScopeOp::And | ScopeOp::Or, _) => {
                process_commutative_quantifier(qop, quantifier_operand, variable)?
            }
            ScopeKind::Conditional(_) => {
                process_conditional_quantifier(qop, quantifier_operand, variable)?
            }
            _ => make_quantifier(qop, quantifier_operand, variable),
        })
    } else {
        let vars = conditional_vars(&inner);
        let remainder = Scope {
            vars,
            kind: ScopeKind::Conditional(inner),
        };
        Some(make_quantifier(qop, remainder, variable))
    };

    let mut out = Scope {
        vars: vec![],
        kind: ScopeKind::Conditional(promoted),
    };
    if let Some(quantifier) = quantifier {
        let conditional = match &mut out.kind {
            ScopeKind::Conditional(conditional) => conditional,
            _ => unreachable!(),
        };
        if quantifier.is_true() {
            return Ok(Scope::truth());
        }
        if !quantifier.is_false()
            && add_to_scope(
                ScopeOp::Or,
                quantifier,
                &mut conditional.right,
                &mut conditional.right_negated,
            )
        {
            return Ok(Scope::truth());
        }
    }

    // when nothing remains in the antecedent the node is a disjunction
    let conditional = match &mut out.kind {
        ScopeKind::Conditional(conditional) => conditional,
        _ => unreachable!(),
    };
    if conditional.left.is_empty() && conditional.left_negated.is_empty() {
        if conditional.right.len() == 1 && conditional.right_negated.is_empty() {
            return Ok(conditional.right.pop().unwrap());
        }
        if conditional.right.is_empty() && conditional.right_negated.len() == 1 {
            return Ok(negate_scope(conditional.right_negated.pop().unwrap()));
        }
        let commutative = CommutativeScope {
            children: std::mem::take(&mut conditional.right),
            negated: std::mem::take(&mut conditional.right_negated),
        };
        let vars = commutative_vars(&commutative);
        return Ok(Scope {
            vars,
            kind: ScopeKind::Commutative(ScopeOp::Or, commutative),
        });
    }
    out.vars = conditional_vars(conditional);
    Ok(out)
}

/// Emits an `And`/`Or` term from positive and negated operand lists.
fn commutative_to_term(
    bank: &mut TermBank,
    op: ScopeOp,
    children: &[Scope],
    negated: &[Scope],
) -> Arc<Term> {
    if children.is_empty() && negated.is_empty() {
        return match op {
            ScopeOp::And | ScopeOp::Iff => bank.tru(),
            ScopeOp::Or => bank.fls(),
        };
    }
    if children.len() == 1 && negated.is_empty() {
        return scope_to_term(bank, &children[0]);
    }
    if children.is_empty() && negated.len() == 1 {
        let operand = scope_to_term(bank, &negated[0]);
        return bank.not(operand);
    }
    let mut operands = Vec::with_capacity(children.len() + negated.len());
    for child in children {
        operands.push(scope_to_term(bank, child));
    }
    for child in negated {
        let operand = scope_to_term(bank, child);
        operands.push(bank.not(operand));
    }
    match op {
        ScopeOp::And => bank.and(operands),
        ScopeOp::Or => bank.or(operands),
        ScopeOp::Iff => bank.iff(operands),
    }
}

/// Emits the canonical term for a scope.
fn scope_to_term(bank: &mut TermBank, scope: &Scope) -> Arc<Term> {
    match &scope.kind {
        ScopeKind::True => bank.tru(),
        ScopeKind::False => bank.fls(),
        ScopeKind::Variable(v) => bank.variable(*v),
        ScopeKind::Constant(c) => bank.constant(*c),
        ScopeKind::Parameter(p) => bank.parameter(*p),
        ScopeKind::Integer(i) => bank.integer(*i),
        ScopeKind::Not(operand) => {
            let operand = scope_to_term(bank, operand);
            bank.not(operand)
        }
        ScopeKind::Commutative(ScopeOp::Iff, commutative) => {
            if scope.is_negated_iff() {
                let children = &commutative.children[..commutative.children.len() - 1];
                let operand =
                    commutative_to_term(bank, ScopeOp::Iff, children, &commutative.negated);
                match &*operand {
                    Term::Not(inner) => inner.clone(),
                    _ => bank.not(operand),
                }
            } else {
                commutative_to_term(
                    bank,
                    ScopeOp::Iff,
                    &commutative.children,
                    &commutative.negated,
                )
            }
        }
        ScopeKind::Commutative(op, commutative) => {
            commutative_to_term(bank, *op, &commutative.children, &commutative.negated)
        }
        ScopeKind::Conditional(conditional) => {
            let antecedent = commutative_to_term(
                bank,
                ScopeOp::And,
                &conditional.left,
                &conditional.left_negated,
            );
            let consequent = commutative_to_term(
                bank,
                ScopeOp::Or,
                &conditional.right,
                &conditional.right_negated,
            );
            bank.if_then(antecedent, consequent)
        }
        ScopeKind::Quantifier(op, variable, operand) => {
            let operand = scope_to_term(bank, operand);
            match op {
                QuantifierOp::ForAll => bank.for_all(*variable, operand),
                QuantifierOp::Exists => bank.exists(*variable, operand),
                QuantifierOp::Lambda => bank.lambda(*variable, operand),
            }
        }
        ScopeKind::Equals(left, right) => {
            let left = scope_to_term(bank, left);
            let right = scope_to_term(bank, right);
            bank.equals(left, right)
        }
        ScopeKind::App1(f, x) => {
            let f = scope_to_term(bank, f);
            let x = scope_to_term(bank, x);
            bank.apply(f, x)
        }
        ScopeKind::App2(f, x, y) => {
            let f = scope_to_term(bank, f);
            let x = scope_to_term(bank, x);
            let y = scope_to_term(bank, y);
            bank.apply2(f, x, y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(bank: &mut TermBank, term: &Arc<Term>) -> Arc<Term> {
        Canonicalizer::new().canonicalize(bank, term).unwrap()
    }

    #[test]
    fn test_flattening_and_dedup() {
        // A & (B & A) -> And(A, B)
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let b = bank.constant(2);
        let inner = bank.and(vec![b.clone(), a.clone()]);
        let term = bank.and(vec![a.clone(), inner]);
        let expected = bank.and(vec![a, b]);
        assert_eq!(canon(&mut bank, &term), expected);
    }

    #[test]
    fn test_annihilation() {
        // A | ~A -> True
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let not_a = bank.not(a.clone());
        let term = bank.or(vec![a.clone(), not_a.clone()]);
        assert_eq!(canon(&mut bank, &term), bank.tru());

        // A & ~A -> False
        let term = bank.and(vec![a, not_a]);
        assert_eq!(canon(&mut bank, &term), bank.fls());
    }

    #[test]
    fn test_double_negation() {
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let not_a = bank.not(a.clone());
        let term = bank.not(not_a);
        assert_eq!(canon(&mut bank, &term), a);
    }

    #[test]
    fn test_units_are_dropped() {
        // A & T -> A, A | F -> A
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let t = bank.tru();
        let f = bank.fls();
        let term = bank.and(vec![a.clone(), t]);
        assert_eq!(canon(&mut bank, &term), a);
        let term = bank.or(vec![a.clone(), f]);
        assert_eq!(canon(&mut bank, &term), a);
    }

    #[test]
    fn test_quantifier_hoisting() {
        // ![X]: (P & Q(X)) -> And(P, ForAll 1. Q(1))
        let mut bank = TermBank::new();
        let p = bank.constant(1);
        let x = bank.variable(7);
        let q_of_x = bank.atom1(2, x);
        let body = bank.and(vec![p.clone(), q_of_x]);
        let term = bank.for_all(7, body);

        let x1 = bank.variable(1);
        let q1 = bank.atom1(2, x1);
        let quantified = bank.for_all(1, q1);
        let expected = bank.and(vec![p, quantified]);
        assert_eq!(canon(&mut bank, &term), expected);
    }

    #[test]
    fn test_vacuous_quantifier_is_dropped() {
        let mut bank = TermBank::new();
        let p = bank.constant(1);
        let term = bank.for_all(3, p.clone());
        assert_eq!(canon(&mut bank, &term), p);
    }

    #[test]
    fn test_equals_of_booleans_becomes_iff() {
        let mut bank = TermBank::new();
        let p = bank.constant(1);
        let q = bank.constant(2);
        let not_p = bank.not(p.clone());
        // force P and Q boolean through the conjunction context
        let eq = bank.equals(p.clone(), q.clone());
        let term = bank.and(vec![not_p.clone(), eq, q.clone()]);
        let canonical = canon(&mut bank, &term);
        match &*canonical {
            Term::And(operands) => {
                assert!(operands
                    .iter()
                    .any(|operand| matches!(&**operand, Term::Iff(_))));
            }
            other => panic!("expected a conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_equality_self_identity() {
        let mut bank = TermBank::new();
        let c = bank.constant(1);
        let term = bank.equals(c.clone(), c);
        assert_eq!(canon(&mut bank, &term), bank.tru());
    }

    #[test]
    fn test_all_constants_distinct() {
        let mut bank = TermBank::new();
        let c1 = bank.constant(1);
        let c2 = bank.constant(2);
        let term = bank.equals(c1, c2);
        let options = Canonicalizer {
            all_constants_distinct: true,
            polymorphic_equality: false,
        };
        assert_eq!(options.canonicalize(&mut bank, &term).unwrap(), bank.fls());
        // without the flag the equality is kept
        let kept = Canonicalizer::new().canonicalize(&mut bank, &term).unwrap();
        assert!(matches!(&*kept, Term::Equals(..)));
    }

    #[test]
    fn test_conditional_units() {
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let f = bank.fls();
        let t = bank.tru();

        // F => A -> T
        let term = bank.if_then(f.clone(), a.clone());
        assert_eq!(canon(&mut bank, &term), bank.tru());
        // T => A -> A
        let term = bank.if_then(t, a.clone());
        assert_eq!(canon(&mut bank, &term), a);
        // A => F -> ~A
        let term = bank.if_then(a.clone(), f);
        let expected = bank.not(a.clone());
        assert_eq!(canon(&mut bank, &term), expected);
        // A => A -> T
        let term = bank.if_then(a.clone(), a);
        assert_eq!(canon(&mut bank, &term), bank.tru());
    }

    #[test]
    fn test_alpha_equivalence() {
        // ![X]: P(X) and ![Y]: P(Y) share a canonical form
        let mut bank = TermBank::new();
        let x = bank.variable(5);
        let p_x = bank.atom1(1, x);
        let first = bank.for_all(5, p_x);
        let y = bank.variable(9);
        let p_y = bank.atom1(1, y);
        let second = bank.for_all(9, p_y);
        assert!(Arc::ptr_eq(
            &canon(&mut bank, &first),
            &canon(&mut bank, &second)
        ));
    }

    #[test]
    fn test_sibling_quantifiers_converge() {
        // And(!x P(x), !y Q(y)) equals And(!y Q(y), !x P(x)) canonically
        let mut bank = TermBank::new();
        let x = bank.variable(3);
        let p = bank.atom1(1, x);
        let forall_p = bank.for_all(3, p);
        let y = bank.variable(8);
        let q = bank.atom1(2, y);
        let forall_q = bank.for_all(8, q);
        let first = bank.and(vec![forall_p.clone(), forall_q.clone()]);
        let second = bank.and(vec![forall_q, forall_p]);
        assert_eq!(canon(&mut bank, &first), canon(&mut bank, &second));
    }

    #[test]
    fn test_idempotence() {
        let mut bank = TermBank::new();
        let x = bank.variable(4);
        let p = bank.atom1(1, x.clone());
        let q = bank.atom1(2, x);
        let c = bank.constant(3);
        let or = bank.or(vec![p.clone(), c.clone()]);
        let body = bank.if_then(q, or);
        let term = bank.exists(4, body);
        let once = canon(&mut bank, &term);
        let twice = canon(&mut bank, &once);
        assert!(Arc::ptr_eq(&once, &twice));
    }

    #[test]
    fn test_implication_shared_operand() {
        // (A & B) => (A | C) -> T
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let b = bank.constant(2);
        let c = bank.constant(3);
        let antecedent = bank.and(vec![a.clone(), b]);
        let consequent = bank.or(vec![a, c]);
        let term = bank.if_then(antecedent, consequent);
        assert_eq!(canon(&mut bank, &term), bank.tru());
    }

    #[test]
    fn test_nested_implication_raising() {
        // A => (B | (C => D)) keeps one implication with a merged antecedent
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let b = bank.constant(2);
        let c = bank.constant(3);
        let d = bank.constant(4);
        let inner = bank.if_then(c.clone(), d.clone());
        let consequent = bank.or(vec![b.clone(), inner]);
        let term = bank.if_then(a.clone(), consequent);
        let canonical = canon(&mut bank, &term);
        match &*canonical {
            Term::IfThen(antecedent, consequent) => {
                let expected_antecedent = bank.and(vec![a, c]);
                let expected_consequent = bank.or(vec![b, d]);
                assert_eq!(*antecedent, expected_antecedent);
                assert_eq!(*consequent, expected_consequent);
            }
            other => panic!("expected an implication, got {:?}", other),
        }
    }
}
