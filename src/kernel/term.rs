use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A higher-order-logic term.
///
/// Subterms are shared: two equal subterms may be (and, when built through a
/// [`TermBank`], are) the same allocation. Terms are immutable after
/// construction.
///
/// The declaration order of the variants is the total order used by
/// canonicalization and the subset decider. `False` must stay last.
#[derive(Clone, Debug, Hash, Serialize, Deserialize)]
pub enum Term {
    Variable(u32),
    Constant(u32),
    Parameter(u32),

    /// f(x)
    App1(Arc<Term>, Arc<Term>),
    /// f(x, y). Applications of higher arity do not exist.
    App2(Arc<Term>, Arc<Term>, Arc<Term>),

    And(Vec<Arc<Term>>),
    Or(Vec<Arc<Term>>),
    IfThen(Arc<Term>, Arc<Term>),
    Equals(Arc<Term>, Arc<Term>),
    /// Produced only by canonicalization. A trailing `False` operand marks a
    /// negated biconditional.
    Iff(Vec<Arc<Term>>),
    Not(Arc<Term>),

    ForAll(u32, Arc<Term>),
    Exists(u32, Arc<Term>),
    Lambda(u32, Arc<Term>),

    Integer(i64),

    True,
    False,
}

/// Structural equality with a pointer-identity fast path.
/// Hash-consed terms compare in O(1) in the common case.
fn arc_eq(first: &Arc<Term>, second: &Arc<Term>) -> bool {
    Arc::ptr_eq(first, second) || **first == **second
}

fn list_eq(first: &[Arc<Term>], second: &[Arc<Term>]) -> bool {
    first.len() == second.len() && first.iter().zip(second).all(|(a, b)| arc_eq(a, b))
}

impl PartialEq for Term {
    fn eq(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Variable(a), Term::Variable(b)) => a == b,
            (Term::Constant(a), Term::Constant(b)) => a == b,
            (Term::Parameter(a), Term::Parameter(b)) => a == b,
            (Term::Integer(a), Term::Integer(b)) => a == b,
            (Term::App1(f, x), Term::App1(g, y)) => arc_eq(f, g) && arc_eq(x, y),
            (Term::App2(f, x, y), Term::App2(g, u, v)) => {
                arc_eq(f, g) && arc_eq(x, u) && arc_eq(y, v)
            }
            (Term::And(a), Term::And(b)) => list_eq(a, b),
            (Term::Or(a), Term::Or(b)) => list_eq(a, b),
            (Term::Iff(a), Term::Iff(b)) => list_eq(a, b),
            (Term::IfThen(a, b), Term::IfThen(c, d)) => arc_eq(a, c) && arc_eq(b, d),
            (Term::Equals(a, b), Term::Equals(c, d)) => arc_eq(a, c) && arc_eq(b, d),
            (Term::Not(a), Term::Not(b)) => arc_eq(a, b),
            (Term::ForAll(v, a), Term::ForAll(w, b)) => v == w && arc_eq(a, b),
            (Term::Exists(v, a), Term::Exists(w, b)) => v == w && arc_eq(a, b),
            (Term::Lambda(v, a), Term::Lambda(w, b)) => v == w && arc_eq(a, b),
            (Term::True, Term::True) => true,
            (Term::False, Term::False) => true,
            _ => false,
        }
    }
}

impl Eq for Term {}

fn arc_cmp(first: &Arc<Term>, second: &Arc<Term>) -> Ordering {
    if Arc::ptr_eq(first, second) {
        return Ordering::Equal;
    }
    first.cmp(second)
}

/// Lists compare by length first, then lexicographically, matching the order
/// the canonicalizer uses for commutative operand lists.
fn list_cmp(first: &[Arc<Term>], second: &[Arc<Term>]) -> Ordering {
    first.len().cmp(&second.len()).then_with(|| {
        for (a, b) in first.iter().zip(second) {
            let result = arc_cmp(a, b);
            if result != Ordering::Equal {
                return result;
            }
        }
        Ordering::Equal
    })
}

impl Term {
    /// Position of the variant in the total order of terms.
    fn variant_rank(&self) -> u8 {
        match self {
            Term::Variable(_) => 0,
            Term::Constant(_) => 1,
            Term::Parameter(_) => 2,
            Term::App1(..) => 3,
            Term::App2(..) => 4,
            Term::And(_) => 5,
            Term::Or(_) => 6,
            Term::IfThen(..) => 7,
            Term::Equals(..) => 8,
            Term::Iff(_) => 9,
            Term::Not(_) => 10,
            Term::ForAll(..) => 11,
            Term::Exists(..) => 12,
            Term::Lambda(..) => 13,
            Term::Integer(_) => 14,
            Term::True => 15,
            Term::False => 16,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Term::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Term::False)
    }

    /// Whether `parameter` occurs anywhere in this term.
    pub fn contains_parameter(&self, parameter: u32) -> bool {
        let mut found = false;
        self.visit(&mut |term| {
            if let Term::Parameter(p) = term {
                if *p == parameter {
                    found = true;
                }
            }
        });
        found
    }

    /// Collects every parameter id occurring in this term, sorted and
    /// deduplicated.
    pub fn parameters(&self) -> Vec<u32> {
        let mut parameters = vec![];
        self.visit(&mut |term| {
            if let Term::Parameter(p) = term {
                parameters.push(*p);
            }
        });
        parameters.sort_unstable();
        parameters.dedup();
        parameters
    }

    /// Preorder traversal over every node of the term, parents before
    /// children, left to right.
    pub fn visit<F: FnMut(&Term)>(&self, f: &mut F) {
        f(self);
        match self {
            Term::Variable(_)
            | Term::Constant(_)
            | Term::Parameter(_)
            | Term::Integer(_)
            | Term::True
            | Term::False => {}
            Term::Not(operand) => operand.visit(f),
            Term::App1(left, right)
            | Term::IfThen(left, right)
            | Term::Equals(left, right) => {
                left.visit(f);
                right.visit(f);
            }
            Term::App2(first, second, third) => {
                first.visit(f);
                second.visit(f);
                third.visit(f);
            }
            Term::And(operands) | Term::Or(operands) | Term::Iff(operands) => {
                for operand in operands {
                    operand.visit(f);
                }
            }
            Term::ForAll(_, body) | Term::Exists(_, body) | Term::Lambda(_, body) => body.visit(f),
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Term) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Term) -> Ordering {
        let rank = self.variant_rank().cmp(&other.variant_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Term::Variable(a), Term::Variable(b)) => a.cmp(b),
            (Term::Constant(a), Term::Constant(b)) => a.cmp(b),
            (Term::Parameter(a), Term::Parameter(b)) => a.cmp(b),
            (Term::Integer(a), Term::Integer(b)) => a.cmp(b),
            (Term::App1(f, x), Term::App1(g, y)) => arc_cmp(f, g).then_with(|| arc_cmp(x, y)),
            (Term::App2(f, x, y), Term::App2(g, u, v)) => arc_cmp(f, g)
                .then_with(|| arc_cmp(x, u))
                .then_with(|| arc_cmp(y, v)),
            (Term::And(a), Term::And(b)) => list_cmp(a, b),
            (Term::Or(a), Term::Or(b)) => list_cmp(a, b),
            (Term::Iff(a), Term::Iff(b)) => list_cmp(a, b),
            (Term::IfThen(a, b), Term::IfThen(c, d)) => arc_cmp(a, c).then_with(|| arc_cmp(b, d)),
            (Term::Equals(a, b), Term::Equals(c, d)) => arc_cmp(a, c).then_with(|| arc_cmp(b, d)),
            (Term::Not(a), Term::Not(b)) => arc_cmp(a, b),
            (Term::ForAll(v, a), Term::ForAll(w, b)) => v.cmp(w).then_with(|| arc_cmp(a, b)),
            (Term::Exists(v, a), Term::Exists(w, b)) => v.cmp(w).then_with(|| arc_cmp(a, b)),
            (Term::Lambda(v, a), Term::Lambda(w, b)) => v.cmp(w).then_with(|| arc_cmp(a, b)),
            (Term::True, Term::True) => Ordering::Equal,
            (Term::False, Term::False) => Ordering::Equal,
            _ => unreachable!("variant ranks matched for different variants"),
        }
    }
}

/// The hash-consing builder for terms.
///
/// Every construction goes through the bank, which collapses structurally
/// identical subterms onto one shared allocation. The `True`/`False`
/// singletons are created once, at bank construction, and are never
/// collected. A bank is private to one reasoning session.
pub struct TermBank {
    table: HashSet<Arc<Term>>,
    tru: Arc<Term>,
    fls: Arc<Term>,
}

impl TermBank {
    pub fn new() -> TermBank {
        let tru = Arc::new(Term::True);
        let fls = Arc::new(Term::False);
        let mut table = HashSet::new();
        table.insert(tru.clone());
        table.insert(fls.clone());
        TermBank { table, tru, fls }
    }

    /// Returns the shared node for `term`, allocating it if the bank has not
    /// seen this structure before.
    pub fn intern(&mut self, term: Term) -> Arc<Term> {
        if let Some(existing) = self.table.get(&term) {
            return existing.clone();
        }
        let shared = Arc::new(term);
        self.table.insert(shared.clone());
        shared
    }

    /// Number of distinct terms the bank has allocated.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn tru(&self) -> Arc<Term> {
        self.tru.clone()
    }

    pub fn fls(&self) -> Arc<Term> {
        self.fls.clone()
    }

    pub fn variable(&mut self, variable: u32) -> Arc<Term> {
        self.intern(Term::Variable(variable))
    }

    pub fn constant(&mut self, constant: u32) -> Arc<Term> {
        self.intern(Term::Constant(constant))
    }

    pub fn parameter(&mut self, parameter: u32) -> Arc<Term> {
        self.intern(Term::Parameter(parameter))
    }

    pub fn integer(&mut self, value: i64) -> Arc<Term> {
        self.intern(Term::Integer(value))
    }

    pub fn not(&mut self, operand: Arc<Term>) -> Arc<Term> {
        self.intern(Term::Not(operand))
    }

    pub fn and(&mut self, operands: Vec<Arc<Term>>) -> Arc<Term> {
        self.intern(Term::And(operands))
    }

    pub fn or(&mut self, operands: Vec<Arc<Term>>) -> Arc<Term> {
        self.intern(Term::Or(operands))
    }

    pub fn iff(&mut self, operands: Vec<Arc<Term>>) -> Arc<Term> {
        self.intern(Term::Iff(operands))
    }

    pub fn if_then(&mut self, antecedent: Arc<Term>, consequent: Arc<Term>) -> Arc<Term> {
        self.intern(Term::IfThen(antecedent, consequent))
    }

    pub fn equals(&mut self, left: Arc<Term>, right: Arc<Term>) -> Arc<Term> {
        self.intern(Term::Equals(left, right))
    }

    pub fn apply(&mut self, function: Arc<Term>, arg: Arc<Term>) -> Arc<Term> {
        self.intern(Term::App1(function, arg))
    }

    pub fn apply2(&mut self, function: Arc<Term>, arg1: Arc<Term>, arg2: Arc<Term>) -> Arc<Term> {
        self.intern(Term::App2(function, arg1, arg2))
    }

    pub fn for_all(&mut self, variable: u32, body: Arc<Term>) -> Arc<Term> {
        self.intern(Term::ForAll(variable, body))
    }

    pub fn exists(&mut self, variable: u32, body: Arc<Term>) -> Arc<Term> {
        self.intern(Term::Exists(variable, body))
    }

    pub fn lambda(&mut self, variable: u32, body: Arc<Term>) -> Arc<Term> {
        self.intern(Term::Lambda(variable, body))
    }

    /// Convenience for predicate applications: `predicate(arg)`.
    pub fn atom1(&mut self, predicate: u32, arg: Arc<Term>) -> Arc<Term> {
        let head = self.constant(predicate);
        self.apply(head, arg)
    }

    /// Convenience for predicate applications: `predicate(arg1, arg2)`.
    pub fn atom2(&mut self, predicate: u32, arg1: Arc<Term>, arg2: Arc<Term>) -> Arc<Term> {
        let head = self.constant(predicate);
        self.apply2(head, arg1, arg2)
    }
}

impl Default for TermBank {
    fn default() -> TermBank {
        TermBank::new()
    }
}

fn shift_var(variable: u32, shift: i32) -> u32 {
    (variable as i64 + shift as i64) as u32
}

/// Replaces every subterm equal to `src` with `dst`, shifting every other
/// variable (bound or free) by `shift`.
///
/// A positive shift makes room for a new outermost binder; `-1` removes one.
/// The result is rebuilt through the bank so sharing is preserved.
pub fn substitute(
    bank: &mut TermBank,
    term: &Arc<Term>,
    src: &Arc<Term>,
    dst: &Arc<Term>,
    shift: i32,
) -> Arc<Term> {
    if arc_eq(term, src) {
        return dst.clone();
    }
    match &**term {
        Term::Variable(v) => {
            if shift == 0 {
                term.clone()
            } else {
                bank.variable(shift_var(*v, shift))
            }
        }
        Term::Constant(_) | Term::Parameter(_) | Term::Integer(_) | Term::True | Term::False => {
            term.clone()
        }
        Term::Not(operand) => {
            let operand = substitute(bank, operand, src, dst, shift);
            bank.not(operand)
        }
        Term::App1(f, x) => {
            let f = substitute(bank, f, src, dst, shift);
            let x = substitute(bank, x, src, dst, shift);
            bank.apply(f, x)
        }
        Term::App2(f, x, y) => {
            let f = substitute(bank, f, src, dst, shift);
            let x = substitute(bank, x, src, dst, shift);
            let y = substitute(bank, y, src, dst, shift);
            bank.apply2(f, x, y)
        }
        Term::IfThen(a, b) => {
            let a = substitute(bank, a, src, dst, shift);
            let b = substitute(bank, b, src, dst, shift);
            bank.if_then(a, b)
        }
        Term::Equals(a, b) => {
            let a = substitute(bank, a, src, dst, shift);
            let b = substitute(bank, b, src, dst, shift);
            bank.equals(a, b)
        }
        Term::And(operands) => {
            let operands = operands
                .iter()
                .map(|operand| substitute(bank, operand, src, dst, shift))
                .collect();
            bank.and(operands)
        }
        Term::Or(operands) => {
            let operands = operands
                .iter()
                .map(|operand| substitute(bank, operand, src, dst, shift))
                .collect();
            bank.or(operands)
        }
        Term::Iff(operands) => {
            let operands = operands
                .iter()
                .map(|operand| substitute(bank, operand, src, dst, shift))
                .collect();
            bank.iff(operands)
        }
        Term::ForAll(v, body) => {
            let body = substitute(bank, body, src, dst, shift);
            bank.for_all(shift_var(*v, shift), body)
        }
        Term::Exists(v, body) => {
            let body = substitute(bank, body, src, dst, shift);
            bank.exists(shift_var(*v, shift), body)
        }
        Term::Lambda(v, body) => {
            let body = substitute(bank, body, src, dst, shift);
            bank.lambda(shift_var(*v, shift), body)
        }
    }
}

struct IndexSubstituter<'a> {
    indices: &'a [u32],
    next: usize,
    current: u32,
    replaced: Option<Arc<Term>>,
}

/// Replaces the subterms at the given preorder traversal indices with `dst`.
///
/// All replaced subterms must be structurally identical; returns `None`
/// otherwise. Indices must be sorted ascending.
pub fn substitute_at_indices(
    bank: &mut TermBank,
    term: &Arc<Term>,
    indices: &[u32],
    dst: &Arc<Term>,
) -> Option<Arc<Term>> {
    let mut substituter = IndexSubstituter {
        indices,
        next: 0,
        current: 0,
        replaced: None,
    };
    let result = substitute_at_indices_helper(bank, term, dst, &mut substituter)?;
    if substituter.next < indices.len() {
        return None;
    }
    Some(result)
}

fn substitute_at_indices_helper(
    bank: &mut TermBank,
    term: &Arc<Term>,
    dst: &Arc<Term>,
    substituter: &mut IndexSubstituter,
) -> Option<Arc<Term>> {
    let here = substituter.current;
    substituter.current += 1;
    if substituter.next < substituter.indices.len() && substituter.indices[substituter.next] == here
    {
        match &substituter.replaced {
            None => substituter.replaced = Some(term.clone()),
            Some(previous) => {
                if !arc_eq(previous, term) {
                    return None;
                }
            }
        }
        substituter.next += 1;
        // substituted occurrences are treated as leaves: their subterms are
        // not visited, and do not advance the traversal counter
        return Some(dst.clone());
    }

    match &**term {
        Term::Variable(_)
        | Term::Constant(_)
        | Term::Parameter(_)
        | Term::Integer(_)
        | Term::True
        | Term::False => Some(term.clone()),
        Term::Not(operand) => {
            let operand = substitute_at_indices_helper(bank, operand, dst, substituter)?;
            Some(bank.not(operand))
        }
        Term::App1(f, x) => {
            let f = substitute_at_indices_helper(bank, f, dst, substituter)?;
            let x = substitute_at_indices_helper(bank, x, dst, substituter)?;
            Some(bank.apply(f, x))
        }
        Term::App2(f, x, y) => {
            let f = substitute_at_indices_helper(bank, f, dst, substituter)?;
            let x = substitute_at_indices_helper(bank, x, dst, substituter)?;
            let y = substitute_at_indices_helper(bank, y, dst, substituter)?;
            Some(bank.apply2(f, x, y))
        }
        Term::IfThen(a, b) => {
            let a = substitute_at_indices_helper(bank, a, dst, substituter)?;
            let b = substitute_at_indices_helper(bank, b, dst, substituter)?;
            Some(bank.if_then(a, b))
        }
        Term::Equals(a, b) => {
            let a = substitute_at_indices_helper(bank, a, dst, substituter)?;
            let b = substitute_at_indices_helper(bank, b, dst, substituter)?;
            Some(bank.equals(a, b))
        }
        Term::And(operands) => {
            let mut result = Vec::with_capacity(operands.len());
            for operand in operands {
                result.push(substitute_at_indices_helper(bank, operand, dst, substituter)?);
            }
            Some(bank.and(result))
        }
        Term::Or(operands) => {
            let mut result = Vec::with_capacity(operands.len());
            for operand in operands {
                result.push(substitute_at_indices_helper(bank, operand, dst, substituter)?);
            }
            Some(bank.or(result))
        }
        Term::Iff(operands) => {
            let mut result = Vec::with_capacity(operands.len());
            for operand in operands {
                result.push(substitute_at_indices_helper(bank, operand, dst, substituter)?);
            }
            Some(bank.iff(result))
        }
        Term::ForAll(v, body) => {
            let body = substitute_at_indices_helper(bank, body, dst, substituter)?;
            Some(bank.for_all(*v, body))
        }
        Term::Exists(v, body) => {
            let body = substitute_at_indices_helper(bank, body, dst, substituter)?;
            Some(bank.exists(*v, body))
        }
        Term::Lambda(v, body) => {
            let body = substitute_at_indices_helper(bank, body, dst, substituter)?;
            Some(bank.lambda(*v, body))
        }
    }
}

/// One-hole matching: checks that `second` is `first` with every occurrence
/// of `src` replaced by a single consistent term, recorded in `binding`.
pub fn unify_with_binding(
    first: &Arc<Term>,
    second: &Arc<Term>,
    src: &Arc<Term>,
    binding: &mut Option<Arc<Term>>,
) -> bool {
    if arc_eq(first, src) {
        match binding {
            None => {
                *binding = Some(second.clone());
                return true;
            }
            Some(bound) => return arc_eq(bound, second),
        }
    }
    match (&**first, &**second) {
        (Term::Variable(a), Term::Variable(b)) => a == b,
        (Term::Constant(a), Term::Constant(b)) => a == b,
        (Term::Parameter(a), Term::Parameter(b)) => a == b,
        (Term::Integer(a), Term::Integer(b)) => a == b,
        (Term::True, Term::True) | (Term::False, Term::False) => true,
        (Term::Not(a), Term::Not(b)) => unify_with_binding(a, b, src, binding),
        (Term::App1(f, x), Term::App1(g, y)) => {
            unify_with_binding(f, g, src, binding) && unify_with_binding(x, y, src, binding)
        }
        (Term::App2(f, x, y), Term::App2(g, u, v)) => {
            unify_with_binding(f, g, src, binding)
                && unify_with_binding(x, u, src, binding)
                && unify_with_binding(y, v, src, binding)
        }
        (Term::IfThen(a, b), Term::IfThen(c, d)) | (Term::Equals(a, b), Term::Equals(c, d)) => {
            unify_with_binding(a, c, src, binding) && unify_with_binding(b, d, src, binding)
        }
        (Term::And(a), Term::And(b)) | (Term::Or(a), Term::Or(b)) | (Term::Iff(a), Term::Iff(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| unify_with_binding(x, y, src, binding))
        }
        (Term::ForAll(v, a), Term::ForAll(w, b))
        | (Term::Exists(v, a), Term::Exists(w, b))
        | (Term::Lambda(v, a), Term::Lambda(w, b)) => {
            v == w && unify_with_binding(a, b, src, binding)
        }
        _ => false,
    }
}

/// Checks whether `hypothesis` is `body` with the quantified variable
/// uniformly replaced by a parameter, and returns that parameter.
pub fn unifies_parameter(
    body: &Arc<Term>,
    hypothesis: &Arc<Term>,
    variable: &Arc<Term>,
) -> Option<u32> {
    let mut binding = None;
    if !unify_with_binding(body, hypothesis, variable, &mut binding) {
        return None;
    }
    match binding.as_deref() {
        Some(Term::Parameter(p)) => Some(*p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_order() {
        let mut bank = TermBank::new();
        let v = bank.variable(1);
        let c = bank.constant(1);
        let t = bank.tru();
        let f = bank.fls();
        assert!(*v < *c);
        assert!(*c < *t);
        assert!(*t < *f);
    }

    #[test]
    fn test_bank_interning_shares_nodes() {
        let mut bank = TermBank::new();
        let a = bank.constant(3);
        let b = bank.constant(3);
        assert!(Arc::ptr_eq(&a, &b));

        let x = bank.variable(1);
        let app1 = bank.atom1(7, x.clone());
        let app2 = bank.atom1(7, x);
        assert!(Arc::ptr_eq(&app1, &app2));
    }

    #[test]
    fn test_true_false_singletons() {
        let mut bank = TermBank::new();
        let t = bank.intern(Term::True);
        assert!(Arc::ptr_eq(&t, &bank.tru()));
    }

    #[test]
    fn test_substitute_with_shift() {
        // substituting #2 -> $1 with shift 1 inside P(#2, $1) gives P($1, $2)
        let mut bank = TermBank::new();
        let p2 = bank.parameter(2);
        let x1 = bank.variable(1);
        let term = bank.atom2(5, p2.clone(), x1.clone());
        let result = substitute(&mut bank, &term, &p2, &x1, 1);
        let x2 = bank.variable(2);
        let expected = bank.atom2(5, x1, x2);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_substitute_at_indices_requires_identical_subterms() {
        let mut bank = TermBank::new();
        let c1 = bank.constant(1);
        let c2 = bank.constant(2);
        let term = bank.atom2(5, c1.clone(), c1.clone());
        let x = bank.variable(1);

        // App2 node is index 0, head constant 1, args at 2 and 3
        let replaced = substitute_at_indices(&mut bank, &term, &[2, 3], &x).unwrap();
        let expected = bank.atom2(5, x.clone(), x.clone());
        assert_eq!(replaced, expected);

        let term = bank.atom2(5, c1, c2);
        assert!(substitute_at_indices(&mut bank, &term, &[2, 3], &x).is_none());
    }

    #[test]
    fn test_unifies_parameter() {
        // body = P($1), hypothesis = P(#4): $1 unifies with #4
        let mut bank = TermBank::new();
        let x = bank.variable(1);
        let p = bank.parameter(4);
        let body = bank.atom1(9, x.clone());
        let hypothesis = bank.atom1(9, p);
        assert_eq!(unifies_parameter(&body, &hypothesis, &x), Some(4));

        // hypothesis with a constant witness is not a parameter
        let c = bank.constant(2);
        let hypothesis = bank.atom1(9, c);
        assert_eq!(unifies_parameter(&body, &hypothesis, &x), None);
    }
}
