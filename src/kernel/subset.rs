//! Deciding inclusion between sets of the form `{x : A}` where `A` is a
//! canonical formula.
//!
//! The decider is sound but deliberately incomplete: conditionals,
//! equalities, biconditionals, and quantified forms are not analyzed and
//! report `false`. Its only caller uses the answer to add subset edges, never
//! to reject them, so a missed inclusion costs precision and not soundness.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::kernel::scope::{CanonicalizeError, Canonicalizer};
use crate::kernel::term::{Term, TermBank};

/// Whether `{x : first}` is included in `{x : second}`. Both formulas must be
/// canonical.
pub fn is_subset(first: &Arc<Term>, second: &Arc<Term>) -> bool {
    if first.is_true() {
        return second.is_true();
    }
    if second.is_true() {
        return true;
    }
    if first.is_false() {
        return true;
    }
    if second.is_false() {
        return false;
    }
    match (&**first, &**second) {
        (Term::And(first_operands), Term::And(second_operands)) => {
            conjunction_subset(first_operands, second_operands)
        }
        (Term::And(first_operands), _) => {
            conjunction_subset(first_operands, std::slice::from_ref(second))
        }
        (_, Term::And(_)) => false,
        (Term::Or(first_operands), Term::Or(second_operands)) => {
            disjunction_subset(first_operands, second_operands)
        }
        (Term::Or(_), _) => false,
        (_, Term::Or(second_operands)) => {
            disjunction_subset(std::slice::from_ref(first), second_operands)
        }
        (Term::Constant(a), Term::Constant(b)) => a == b,
        (Term::Variable(a), Term::Variable(b)) => a == b,
        (Term::Parameter(a), Term::Parameter(b)) => a == b,
        (Term::Not(first_operand), Term::Not(second_operand)) => {
            is_subset(second_operand, first_operand)
        }
        (Term::App1(..), _) | (Term::App2(..), _) => first == second,
        _ => false,
    }
}

/// A conjunction is included in another when every conjunct of the weaker
/// formula is matched, or implied, by one of the stronger formula's
/// conjuncts. Both operand lists are in canonical order, so equal literals
/// are found by a merge walk before falling back to the recursive check.
fn conjunction_subset(first: &[Arc<Term>], second: &[Arc<Term>]) -> bool {
    let mut i = 0;
    let mut j = 0;
    while j < second.len() {
        if i < first.len() {
            match first[i].cmp(&second[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                    continue;
                }
                Ordering::Less => {
                    i += 1;
                    continue;
                }
                Ordering::Greater => {}
            }
        }
        if !first
            .iter()
            .any(|literal| literal == &second[j] || is_subset(literal, &second[j]))
        {
            return false;
        }
        j += 1;
    }
    true
}

/// The dual: every disjunct of the stronger formula must be included in one
/// of the weaker formula's disjuncts.
fn disjunction_subset(first: &[Arc<Term>], second: &[Arc<Term>]) -> bool {
    let mut i = 0;
    let mut j = 0;
    while i < first.len() {
        if j < second.len() {
            match first[i].cmp(&second[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                    continue;
                }
                Ordering::Greater => {
                    j += 1;
                    continue;
                }
                Ordering::Less => {}
            }
        }
        if !second
            .iter()
            .any(|literal| literal == &first[i] || is_subset(&first[i], literal))
        {
            return false;
        }
        i += 1;
    }
    true
}

/// The canonical intersection of two set formulas.
pub fn intersect(
    bank: &mut TermBank,
    first: &Arc<Term>,
    second: &Arc<Term>,
) -> Result<Arc<Term>, CanonicalizeError> {
    let conjunction = bank.and(vec![first.clone(), second.clone()]);
    Canonicalizer::new().canonicalize(bank, &conjunction)
}
