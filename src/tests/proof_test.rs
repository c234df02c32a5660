use super::common::Session;
use crate::kernel::scope::Canonicalizer;
use crate::proof::{canonical_order, Proof, ProofChecker, ProofError};

#[test]
fn test_modus_ponens_scenario() {
    // axioms A and A => B; the eliminated implication concludes B with both
    // axioms still assumed
    let mut session = Session::new();
    let a = session.parse("a");
    let implication = session.parse("a => b");
    let b = session.parse("b");

    let axiom_a = Proof::new_axiom(a.clone());
    let axiom_impl = Proof::new_axiom(implication.clone());
    let step = Proof::new_implication_elim(axiom_impl, axiom_a);
    let state = ProofChecker::new(&mut session.bank).check(&step).unwrap();
    assert_eq!(state.conclusion, b);
    assert_eq!(state.assumptions.len(), 2);
    assert!(state.assumptions.contains(&a));
    assert!(state.assumptions.contains(&implication));
}

#[test]
fn test_discharge_scenario() {
    // axiom A; implication introduction discharges it, concluding A => A
    // with no assumptions left
    let mut session = Session::new();
    let a = session.parse("a");
    let axiom = Proof::new_axiom(a.clone());
    let step = Proof::new_implication_intro(axiom.clone(), axiom).unwrap();
    let state = ProofChecker::new(&mut session.bank).check(&step).unwrap();
    let expected = session.parse("a => a");
    assert_eq!(state.conclusion, expected);
    assert!(state.assumptions.is_empty());
}

#[test]
fn test_canonical_mode_requires_canonical_axioms() {
    let mut session = Session::new();
    let redundant = session.parse("a & a");
    let axiom = Proof::new_axiom(redundant);
    let result = ProofChecker::with_canonicalization(&mut session.bank, Canonicalizer::new())
        .check(&axiom);
    assert!(matches!(result, Err(ProofError::AxiomNotCanonical)));
}

#[test]
fn test_canonical_mode_canonicalizes_conclusions() {
    let mut session = Session::new();
    let a = session.canonicalize("a");
    let axiom = Proof::new_axiom(a.clone());
    let step = Proof::new_conjunction_intro(axiom.clone(), axiom);
    let state = ProofChecker::with_canonicalization(&mut session.bank, Canonicalizer::new())
        .check(&step)
        .unwrap();
    // A & A collapses back to A
    assert_eq!(state.conclusion, a);
}

#[test]
fn test_reordered_proof_rechecks_identically() {
    let mut session = Session::new();
    let a = session.parse("a");
    let implication = session.parse("a => b");
    let axiom_a = Proof::new_axiom(a);
    let axiom_impl = Proof::new_axiom(implication);
    let step = Proof::new_implication_elim(axiom_impl, axiom_a);

    let before = ProofChecker::new(&mut session.bank).check(&step).unwrap();
    let order = canonical_order(&step);
    assert_eq!(order.len(), 3);
    let after = ProofChecker::new(&mut session.bank).check(&step).unwrap();
    assert_eq!(before.conclusion, after.conclusion);
    assert_eq!(before.assumptions, after.assumptions);
}

#[test]
fn test_shared_subproofs() {
    // one conjunction axiom feeds both elimination steps
    let mut session = Session::new();
    let conjunction = session.parse("a & b");
    let axiom = Proof::new_axiom(conjunction.clone());
    let left = Proof::new_conjunction_elim_left(axiom.clone());
    let right = Proof::new_conjunction_elim_right(axiom.clone());
    let rebuilt = Proof::new_conjunction_intro(left, right);
    let state = ProofChecker::new(&mut session.bank).check(&rebuilt).unwrap();
    assert_eq!(state.conclusion, conjunction);
    assert_eq!(state.assumptions, vec![conjunction]);
    assert_eq!(axiom.children().len(), 2);
}

#[test]
fn test_undischarged_hypothesis_fails() {
    // implication introduction over a hypothesis that was never assumed
    let mut session = Session::new();
    let a = session.parse("a");
    let b = session.parse("b");
    let axiom_a = Proof::new_axiom(a);
    let axiom_b = Proof::new_axiom(b);
    let step = Proof::new_implication_intro(axiom_a, axiom_b).unwrap();
    let result = ProofChecker::new(&mut session.bank).check(&step);
    assert!(matches!(result, Err(ProofError::AssumptionNotDischarged)));
}

#[test]
fn test_existential_elimination_discharges_witness() {
    // from ?[x]: p(x) and a branch assuming p(#5) concluding q, conclude q
    // without the witness hypothesis
    let mut session = Session::new();
    let existential = session.parse("?[x]: p(x)");
    let witness = session.parse("p(#5)");
    let q = session.parse("q");

    let axiom_exists = Proof::new_axiom(existential.clone());
    let axiom_witness = Proof::new_axiom(witness);
    let axiom_q_impl = Proof::new_axiom(session.parse("p(#5) => q"));
    let branch = Proof::new_implication_elim(axiom_q_impl.clone(), axiom_witness);
    let step = Proof::new_existential_elim(axiom_exists, branch);
    let state = ProofChecker::new(&mut session.bank).check(&step).unwrap();
    assert_eq!(state.conclusion, q);
    // the existential and the implication remain; the witness is discharged
    assert_eq!(state.assumptions.len(), 2);
}
