//! Natural-deduction proof objects.
//!
//! A proof is a DAG of steps. Sub-proof sharing is first-class: any step may
//! be an operand of several parents, so steps are reference counted and keep
//! a list of back-references to the parents using them. The checker rebuilds
//! the proof state (undischarged assumptions and concluding formula) at every
//! node, leaf-first.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Weak};

use thiserror::Error;

use crate::kernel::scope::{CanonicalizeError, Canonicalizer};
use crate::kernel::term::{
    substitute, substitute_at_indices, unifies_parameter, Term, TermBank,
};

/// Number of rules in the calculus, for the length prior.
const ND_RULE_COUNT: usize = 22;

const OPERAND_COUNT: usize = 3;

#[derive(Clone, Debug)]
pub enum ProofKind {
    /// A hypothesis; concludes its formula and assumes it.
    Axiom(Arc<Term>),
    /// A fresh-parameter operand for universal introduction.
    Parameter(u32),
    /// Occurrence indices for existential introduction.
    ArrayParameter(Vec<u32>),
    /// A term operand for universal elimination.
    TermParameter(Arc<Term>),
    /// A formula operand for disjunction introduction.
    FormulaParameter(Arc<Term>),

    ConjunctionIntro,
    ConjunctionElimLeft,
    ConjunctionElimRight,
    DisjunctionIntroLeft,
    DisjunctionIntroRight,
    DisjunctionElim,
    ImplicationIntro,
    ImplicationElim,
    BiconditionalIntro,
    BiconditionalElimLeft,
    BiconditionalElimRight,
    ProofByContradiction,
    NegationElim,
    UniversalIntro,
    UniversalElim,
    ExistentialIntro,
    ExistentialElim,
}

impl ProofKind {
    fn rank(&self) -> u8 {
        match self {
            ProofKind::Axiom(_) => 0,
            ProofKind::Parameter(_) => 1,
            ProofKind::ArrayParameter(_) => 2,
            ProofKind::TermParameter(_) => 3,
            ProofKind::FormulaParameter(_) => 4,
            ProofKind::ConjunctionIntro => 5,
            ProofKind::ConjunctionElimLeft => 6,
            ProofKind::ConjunctionElimRight => 7,
            ProofKind::DisjunctionIntroLeft => 8,
            ProofKind::DisjunctionIntroRight => 9,
            ProofKind::DisjunctionElim => 10,
            ProofKind::ImplicationIntro => 11,
            ProofKind::ImplicationElim => 12,
            ProofKind::BiconditionalIntro => 13,
            ProofKind::BiconditionalElimLeft => 14,
            ProofKind::BiconditionalElimRight => 15,
            ProofKind::ProofByContradiction => 16,
            ProofKind::NegationElim => 17,
            ProofKind::UniversalIntro => 18,
            ProofKind::UniversalElim => 19,
            ProofKind::ExistentialIntro => 20,
            ProofKind::ExistentialElim => 21,
        }
    }

    /// Parameter-kind steps are operands of inference steps but are not
    /// themselves deductions.
    fn is_deduction(&self) -> bool {
        !matches!(
            self,
            ProofKind::Parameter(_)
                | ProofKind::ArrayParameter(_)
                | ProofKind::TermParameter(_)
                | ProofKind::FormulaParameter(_)
        )
    }
}

pub struct Proof {
    kind: ProofKind,
    operands: [Option<Arc<Proof>>; OPERAND_COUNT],
    /// Steps that use this step as an operand.
    children: RefCell<Vec<Weak<Proof>>>,
}

impl Drop for Proof {
    fn drop(&mut self) {
        // unlink operand chains iteratively so deep proofs cannot overflow
        // the stack
        let mut stack: Vec<Arc<Proof>> = self
            .operands
            .iter_mut()
            .filter_map(|operand| operand.take())
            .collect();
        while let Some(operand) = stack.pop() {
            if let Some(mut inner) = Arc::into_inner(operand) {
                stack.extend(inner.operands.iter_mut().filter_map(|o| o.take()));
            }
        }
    }
}

fn proof_key(proof: &Arc<Proof>) -> usize {
    Arc::as_ptr(proof) as usize
}

fn register_children(step: &Arc<Proof>) {
    for operand in step.operands.iter().flatten() {
        operand.children.borrow_mut().push(Arc::downgrade(step));
    }
}

fn new_step(kind: ProofKind, operands: [Option<Arc<Proof>>; OPERAND_COUNT]) -> Arc<Proof> {
    let step = Arc::new(Proof {
        kind,
        operands,
        children: RefCell::new(vec![]),
    });
    register_children(&step);
    step
}

impl Proof {
    pub fn kind(&self) -> &ProofKind {
        &self.kind
    }

    pub fn operands(&self) -> impl Iterator<Item = &Arc<Proof>> {
        self.operands.iter().flatten()
    }

    /// The steps currently using this step as an operand.
    pub fn children(&self) -> Vec<Arc<Proof>> {
        self.children
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn new_axiom(formula: Arc<Term>) -> Arc<Proof> {
        new_step(ProofKind::Axiom(formula), [None, None, None])
    }

    pub fn new_conjunction_intro(left: Arc<Proof>, right: Arc<Proof>) -> Arc<Proof> {
        new_step(ProofKind::ConjunctionIntro, [Some(left), Some(right), None])
    }

    pub fn new_conjunction_elim_left(proof: Arc<Proof>) -> Arc<Proof> {
        new_step(ProofKind::ConjunctionElimLeft, [Some(proof), None, None])
    }

    pub fn new_conjunction_elim_right(proof: Arc<Proof>) -> Arc<Proof> {
        new_step(ProofKind::ConjunctionElimRight, [Some(proof), None, None])
    }

    pub fn new_disjunction_intro_left(proof: Arc<Proof>, formula: Arc<Term>) -> Arc<Proof> {
        let parameter = new_step(ProofKind::FormulaParameter(formula), [None, None, None]);
        new_step(
            ProofKind::DisjunctionIntroLeft,
            [Some(proof), Some(parameter), None],
        )
    }

    pub fn new_disjunction_intro_right(proof: Arc<Proof>, formula: Arc<Term>) -> Arc<Proof> {
        let parameter = new_step(ProofKind::FormulaParameter(formula), [None, None, None]);
        new_step(
            ProofKind::DisjunctionIntroRight,
            [Some(proof), Some(parameter), None],
        )
    }

    pub fn new_disjunction_elim(
        disjunction: Arc<Proof>,
        left: Arc<Proof>,
        right: Arc<Proof>,
    ) -> Arc<Proof> {
        new_step(
            ProofKind::DisjunctionElim,
            [Some(disjunction), Some(left), Some(right)],
        )
    }

    /// The hypothesis operand must be an axiom; refuses otherwise.
    pub fn new_implication_intro(
        proof: Arc<Proof>,
        assumption: Arc<Proof>,
    ) -> Option<Arc<Proof>> {
        if !matches!(assumption.kind, ProofKind::Axiom(_)) {
            return None;
        }
        Some(new_step(
            ProofKind::ImplicationIntro,
            [Some(proof), Some(assumption), None],
        ))
    }

    pub fn new_implication_elim(implication: Arc<Proof>, antecedent: Arc<Proof>) -> Arc<Proof> {
        new_step(
            ProofKind::ImplicationElim,
            [Some(implication), Some(antecedent), None],
        )
    }

    pub fn new_biconditional_intro(forward: Arc<Proof>, backward: Arc<Proof>) -> Arc<Proof> {
        new_step(
            ProofKind::BiconditionalIntro,
            [Some(forward), Some(backward), None],
        )
    }

    pub fn new_biconditional_elim_left(
        biconditional: Arc<Proof>,
        left: Arc<Proof>,
    ) -> Arc<Proof> {
        new_step(
            ProofKind::BiconditionalElimLeft,
            [Some(biconditional), Some(left), None],
        )
    }

    pub fn new_biconditional_elim_right(
        biconditional: Arc<Proof>,
        right: Arc<Proof>,
    ) -> Arc<Proof> {
        new_step(
            ProofKind::BiconditionalElimRight,
            [Some(biconditional), Some(right), None],
        )
    }

    /// The hypothesis operand must be an axiom concluding a negation.
    pub fn new_proof_by_contradiction(
        proof: Arc<Proof>,
        assumption: Arc<Proof>,
    ) -> Option<Arc<Proof>> {
        if !matches!(assumption.kind, ProofKind::Axiom(_)) {
            return None;
        }
        Some(new_step(
            ProofKind::ProofByContradiction,
            [Some(proof), Some(assumption), None],
        ))
    }

    pub fn new_negation_elim(proof: Arc<Proof>, negation: Arc<Proof>) -> Arc<Proof> {
        new_step(ProofKind::NegationElim, [Some(proof), Some(negation), None])
    }

    pub fn new_universal_intro(proof: Arc<Proof>, parameter: u32) -> Arc<Proof> {
        let operand = new_step(ProofKind::Parameter(parameter), [None, None, None]);
        new_step(
            ProofKind::UniversalIntro,
            [Some(proof), Some(operand), None],
        )
    }

    pub fn new_universal_elim(proof: Arc<Proof>, term: Arc<Term>) -> Arc<Proof> {
        let operand = new_step(ProofKind::TermParameter(term), [None, None, None]);
        new_step(ProofKind::UniversalElim, [Some(proof), Some(operand), None])
    }

    pub fn new_existential_intro(proof: Arc<Proof>, indices: Vec<u32>) -> Arc<Proof> {
        let operand = new_step(ProofKind::ArrayParameter(indices), [None, None, None]);
        new_step(
            ProofKind::ExistentialIntro,
            [Some(proof), Some(operand), None],
        )
    }

    pub fn new_existential_elim(existential: Arc<Proof>, proof: Arc<Proof>) -> Arc<Proof> {
        new_step(
            ProofKind::ExistentialElim,
            [Some(existential), Some(proof), None],
        )
    }
}

/// Total order over proof steps, used by the canonical ordering.
pub fn compare_proofs(first: &Proof, second: &Proof) -> Ordering {
    let rank = first.kind.rank().cmp(&second.kind.rank());
    if rank != Ordering::Equal {
        return rank;
    }
    match (&first.kind, &second.kind) {
        (ProofKind::Axiom(a), ProofKind::Axiom(b))
        | (ProofKind::TermParameter(a), ProofKind::TermParameter(b))
        | (ProofKind::FormulaParameter(a), ProofKind::FormulaParameter(b)) => a.cmp(b),
        (ProofKind::Parameter(a), ProofKind::Parameter(b)) => a.cmp(b),
        (ProofKind::ArrayParameter(a), ProofKind::ArrayParameter(b)) => a.cmp(b),
        _ => {
            for i in 0..OPERAND_COUNT {
                let result = match (&first.operands[i], &second.operands[i]) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(a), Some(b)) => compare_proofs(a, b),
                };
                if result != Ordering::Equal {
                    return result;
                }
            }
            Ordering::Equal
        }
    }
}

/// The state reconstructed at a proof node: the undischarged assumptions
/// along every path from the axioms, and the concluding formula.
#[derive(Clone, Debug)]
pub struct ProofState {
    /// Sorted, deduplicated.
    pub assumptions: Vec<Arc<Term>>,
    pub conclusion: Arc<Term>,
}

impl ProofState {
    fn assumptions_contain_parameter(&self, parameter: u32) -> bool {
        self.assumptions
            .iter()
            .any(|assumption| assumption.contains_parameter(parameter))
    }
}

#[derive(Clone, Debug, Error)]
pub enum ProofError {
    #[error("expected {expected} at the top of the operand's conclusion")]
    StructuralMismatch { expected: &'static str },
    #[error("the discharged assumption is not among the operand's assumptions")]
    AssumptionNotDischarged,
    #[error("parameter {0} occurs free in the assumptions")]
    ParameterEscapes(u32),
    #[error("operand has the wrong kind for this rule")]
    OperandKindMismatch,
    #[error("axiom formula is not in canonical form")]
    AxiomNotCanonical,
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
}

fn insert_assumption(assumptions: &mut Vec<Arc<Term>>, formula: Arc<Term>) {
    match assumptions.binary_search(&formula) {
        Ok(_) => {}
        Err(index) => assumptions.insert(index, formula),
    }
}

fn union_assumptions(first: &[Arc<Term>], second: &[Arc<Term>]) -> Vec<Arc<Term>> {
    let mut result = first.to_vec();
    for assumption in second {
        insert_assumption(&mut result, assumption.clone());
    }
    result
}

/// Removes `formula` from the assumption set; reports whether it was there.
fn discharge(assumptions: &[Arc<Term>], formula: &Arc<Term>) -> (Vec<Arc<Term>>, bool) {
    let mut result = vec![];
    let mut discharged = false;
    for assumption in assumptions {
        if assumption == formula {
            discharged = true;
        } else {
            result.push(assumption.clone());
        }
    }
    (result, discharged)
}

fn max_variable(term: &Term) -> u32 {
    let mut max = 0;
    term.visit(&mut |node| match node {
        Term::Variable(v) => max = max.max(*v),
        Term::ForAll(v, _) | Term::Exists(v, _) | Term::Lambda(v, _) => max = max.max(*v),
        _ => {}
    });
    max
}

/// Checks a proof DAG.
///
/// Builds a topological order with Kahn's algorithm and reconstructs the
/// state at every node leaf-first, validating each rule application. When
/// constructed with a canonicalizer, freshly built conclusions are
/// canonicalized and axiom formulas are required to be canonical already.
pub struct ProofChecker<'a> {
    bank: &'a mut TermBank,
    canonicalizer: Option<Canonicalizer>,
}

impl<'a> ProofChecker<'a> {
    pub fn new(bank: &'a mut TermBank) -> ProofChecker<'a> {
        ProofChecker {
            bank,
            canonicalizer: None,
        }
    }

    pub fn with_canonicalization(
        bank: &'a mut TermBank,
        canonicalizer: Canonicalizer,
    ) -> ProofChecker<'a> {
        ProofChecker {
            bank,
            canonicalizer: Some(canonicalizer),
        }
    }

    pub fn check(&mut self, root: &Arc<Proof>) -> Result<ProofState, ProofError> {
        let order = topological_order(root);
        let mut states: HashMap<usize, ProofState> = HashMap::new();
        for node in order.iter().rev() {
            if !node.kind.is_deduction() {
                continue;
            }
            let state = self.check_step(node, &states)?;
            states.insert(proof_key(node), state);
        }
        states
            .remove(&proof_key(root))
            .ok_or(ProofError::OperandKindMismatch)
    }

    fn maybe_canonicalize(&mut self, term: Arc<Term>) -> Result<Arc<Term>, ProofError> {
        match &self.canonicalizer {
            Some(canonicalizer) => Ok(canonicalizer.canonicalize(self.bank, &term)?),
            None => Ok(term),
        }
    }

    fn operand_state<'s>(
        &self,
        states: &'s HashMap<usize, ProofState>,
        node: &Proof,
        index: usize,
    ) -> Result<&'s ProofState, ProofError> {
        let operand = node.operands[index]
            .as_ref()
            .ok_or(ProofError::OperandKindMismatch)?;
        states
            .get(&proof_key(operand))
            .ok_or(ProofError::OperandKindMismatch)
    }

    fn operand_kind<'p>(&self, node: &'p Proof, index: usize) -> Result<&'p ProofKind, ProofError> {
        node.operands[index]
            .as_ref()
            .map(|operand| &operand.kind)
            .ok_or(ProofError::OperandKindMismatch)
    }

    /// The left conjunct/disjunct and the rest of an n-ary operand list.
    fn split_operands(
        &mut self,
        operands: &[Arc<Term>],
        conjunction: bool,
    ) -> (Arc<Term>, Arc<Term>) {
        let left = operands[0].clone();
        let rest = if operands.len() == 2 {
            operands[1].clone()
        } else if conjunction {
            self.bank.and(operands[1..].to_vec())
        } else {
            self.bank.or(operands[1..].to_vec())
        };
        (left, rest)
    }

    fn check_step(
        &mut self,
        node: &Proof,
        states: &HashMap<usize, ProofState>,
    ) -> Result<ProofState, ProofError> {
        match &node.kind {
            ProofKind::Axiom(formula) => {
                if let Some(canonicalizer) = self.canonicalizer {
                    if !canonicalizer.is_canonical(self.bank, formula)? {
                        return Err(ProofError::AxiomNotCanonical);
                    }
                }
                Ok(ProofState {
                    assumptions: vec![formula.clone()],
                    conclusion: formula.clone(),
                })
            }
            ProofKind::ConjunctionIntro => {
                let first = self.operand_state(states, node, 0)?.clone();
                let second = self.operand_state(states, node, 1)?.clone();
                let conclusion = self
                    .bank
                    .and(vec![first.conclusion.clone(), second.conclusion.clone()]);
                let conclusion = self.maybe_canonicalize(conclusion)?;
                Ok(ProofState {
                    assumptions: union_assumptions(&first.assumptions, &second.assumptions),
                    conclusion,
                })
            }
            ProofKind::ConjunctionElimLeft | ProofKind::ConjunctionElimRight => {
                let state = self.operand_state(states, node, 0)?.clone();
                let operands = match &*state.conclusion {
                    Term::And(operands) => operands.clone(),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "a conjunction",
                        })
                    }
                };
                let (left, right) = self.split_operands(&operands, true);
                let conclusion = match node.kind {
                    ProofKind::ConjunctionElimLeft => left,
                    _ => right,
                };
                Ok(ProofState {
                    assumptions: state.assumptions,
                    conclusion,
                })
            }
            ProofKind::DisjunctionIntroLeft | ProofKind::DisjunctionIntroRight => {
                let state = self.operand_state(states, node, 0)?.clone();
                let parameter = match self.operand_kind(node, 1)? {
                    ProofKind::FormulaParameter(formula) => formula.clone(),
                    _ => return Err(ProofError::OperandKindMismatch),
                };
                let conclusion = match node.kind {
                    ProofKind::DisjunctionIntroLeft => {
                        self.bank.or(vec![parameter, state.conclusion.clone()])
                    }
                    _ => self.bank.or(vec![state.conclusion.clone(), parameter]),
                };
                let conclusion = self.maybe_canonicalize(conclusion)?;
                Ok(ProofState {
                    assumptions: state.assumptions,
                    conclusion,
                })
            }
            ProofKind::DisjunctionElim => {
                let disjunction = self.operand_state(states, node, 0)?.clone();
                let first = self.operand_state(states, node, 1)?.clone();
                let second = self.operand_state(states, node, 2)?.clone();
                let operands = match &*disjunction.conclusion {
                    Term::Or(operands) => operands.clone(),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "a disjunction",
                        })
                    }
                };
                if first.conclusion != second.conclusion {
                    return Err(ProofError::StructuralMismatch {
                        expected: "matching branch conclusions",
                    });
                }
                let (left, right) = self.split_operands(&operands, false);
                let (first_assumptions, first_discharged) =
                    discharge(&first.assumptions, &left);
                let (second_assumptions, second_discharged) =
                    discharge(&second.assumptions, &right);
                if !first_discharged || !second_discharged {
                    return Err(ProofError::AssumptionNotDischarged);
                }
                let assumptions = union_assumptions(
                    &union_assumptions(&disjunction.assumptions, &first_assumptions),
                    &second_assumptions,
                );
                Ok(ProofState {
                    assumptions,
                    conclusion: first.conclusion,
                })
            }
            ProofKind::ImplicationIntro => {
                let state = self.operand_state(states, node, 0)?.clone();
                let hypothesis = match self.operand_kind(node, 1)? {
                    ProofKind::Axiom(formula) => formula.clone(),
                    _ => return Err(ProofError::OperandKindMismatch),
                };
                let (assumptions, discharged) = discharge(&state.assumptions, &hypothesis);
                if !discharged {
                    return Err(ProofError::AssumptionNotDischarged);
                }
                let conclusion = self.bank.if_then(hypothesis, state.conclusion.clone());
                let conclusion = self.maybe_canonicalize(conclusion)?;
                Ok(ProofState {
                    assumptions,
                    conclusion,
                })
            }
            ProofKind::ImplicationElim => {
                let implication = self.operand_state(states, node, 0)?.clone();
                let antecedent = self.operand_state(states, node, 1)?.clone();
                let (left, right) = match &*implication.conclusion {
                    Term::IfThen(left, right) => (left.clone(), right.clone()),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "an implication",
                        })
                    }
                };
                if left != antecedent.conclusion {
                    return Err(ProofError::StructuralMismatch {
                        expected: "the implication's antecedent",
                    });
                }
                Ok(ProofState {
                    assumptions: union_assumptions(
                        &implication.assumptions,
                        &antecedent.assumptions,
                    ),
                    conclusion: right,
                })
            }
            ProofKind::BiconditionalIntro => {
                let forward = self.operand_state(states, node, 0)?.clone();
                let backward = self.operand_state(states, node, 1)?.clone();
                let (forward_left, forward_right) = match &*forward.conclusion {
                    Term::IfThen(left, right) => (left.clone(), right.clone()),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "an implication",
                        })
                    }
                };
                let (backward_left, backward_right) = match &*backward.conclusion {
                    Term::IfThen(left, right) => (left.clone(), right.clone()),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "an implication",
                        })
                    }
                };
                if forward_left != backward_right || forward_right != backward_left {
                    return Err(ProofError::StructuralMismatch {
                        expected: "cross-matched implications",
                    });
                }
                let conclusion = self.bank.iff(vec![forward_left, forward_right]);
                let conclusion = self.maybe_canonicalize(conclusion)?;
                Ok(ProofState {
                    assumptions: union_assumptions(&forward.assumptions, &backward.assumptions),
                    conclusion,
                })
            }
            ProofKind::BiconditionalElimLeft | ProofKind::BiconditionalElimRight => {
                let biconditional = self.operand_state(states, node, 0)?.clone();
                let side = self.operand_state(states, node, 1)?.clone();
                let operands = match &*biconditional.conclusion {
                    Term::Iff(operands) => operands.clone(),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "a biconditional",
                        })
                    }
                };
                let left = operands[0].clone();
                let right = if operands.len() == 2 {
                    operands[1].clone()
                } else {
                    self.bank.iff(operands[1..].to_vec())
                };
                let conclusion = match node.kind {
                    ProofKind::BiconditionalElimLeft => {
                        if side.conclusion != left {
                            return Err(ProofError::StructuralMismatch {
                                expected: "the biconditional's left operand",
                            });
                        }
                        right
                    }
                    _ => {
                        if side.conclusion != right {
                            return Err(ProofError::StructuralMismatch {
                                expected: "the biconditional's right operand",
                            });
                        }
                        left
                    }
                };
                Ok(ProofState {
                    assumptions: union_assumptions(
                        &biconditional.assumptions,
                        &side.assumptions,
                    ),
                    conclusion,
                })
            }
            ProofKind::ProofByContradiction => {
                let state = self.operand_state(states, node, 0)?.clone();
                let hypothesis = match self.operand_kind(node, 1)? {
                    ProofKind::Axiom(formula) => formula.clone(),
                    _ => return Err(ProofError::OperandKindMismatch),
                };
                if !state.conclusion.is_false() {
                    return Err(ProofError::StructuralMismatch {
                        expected: "a contradiction",
                    });
                }
                let conclusion = match &*hypothesis {
                    Term::Not(operand) => operand.clone(),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "a negated hypothesis",
                        })
                    }
                };
                let (assumptions, discharged) = discharge(&state.assumptions, &hypothesis);
                if !discharged {
                    return Err(ProofError::AssumptionNotDischarged);
                }
                Ok(ProofState {
                    assumptions,
                    conclusion,
                })
            }
            ProofKind::NegationElim => {
                let positive = self.operand_state(states, node, 0)?.clone();
                let negative = self.operand_state(states, node, 1)?.clone();
                match &*negative.conclusion {
                    Term::Not(operand) if *operand == positive.conclusion => {}
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "the negation of the first operand",
                        })
                    }
                }
                Ok(ProofState {
                    assumptions: union_assumptions(&positive.assumptions, &negative.assumptions),
                    conclusion: self.bank.fls(),
                })
            }
            ProofKind::UniversalIntro => {
                let state = self.operand_state(states, node, 0)?.clone();
                let parameter = match self.operand_kind(node, 1)? {
                    ProofKind::Parameter(parameter) => *parameter,
                    _ => return Err(ProofError::OperandKindMismatch),
                };
                if state.assumptions_contain_parameter(parameter) {
                    return Err(ProofError::ParameterEscapes(parameter));
                }
                let src = self.bank.parameter(parameter);
                let dst = self.bank.variable(1);
                let body = substitute(self.bank, &state.conclusion, &src, &dst, 1);
                let conclusion = self.bank.for_all(1, body);
                let conclusion = self.maybe_canonicalize(conclusion)?;
                Ok(ProofState {
                    assumptions: state.assumptions,
                    conclusion,
                })
            }
            ProofKind::UniversalElim => {
                let state = self.operand_state(states, node, 0)?.clone();
                let term = match self.operand_kind(node, 1)? {
                    ProofKind::TermParameter(term) => term.clone(),
                    _ => return Err(ProofError::OperandKindMismatch),
                };
                let (variable, body) = match &*state.conclusion {
                    Term::ForAll(variable, body) => (*variable, body.clone()),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "a universal quantifier",
                        })
                    }
                };
                let src = self.bank.variable(variable);
                let conclusion = substitute(self.bank, &body, &src, &term, -1);
                let conclusion = self.maybe_canonicalize(conclusion)?;
                Ok(ProofState {
                    assumptions: state.assumptions,
                    conclusion,
                })
            }
            ProofKind::ExistentialIntro => {
                let state = self.operand_state(states, node, 0)?.clone();
                let indices = match self.operand_kind(node, 1)? {
                    ProofKind::ArrayParameter(indices) => indices.clone(),
                    _ => return Err(ProofError::OperandKindMismatch),
                };
                let variable = max_variable(&state.conclusion) + 1;
                let dst = self.bank.variable(variable);
                let body =
                    substitute_at_indices(self.bank, &state.conclusion, &indices, &dst)
                        .ok_or(ProofError::StructuralMismatch {
                            expected: "identical subterms at the abstracted occurrences",
                        })?;
                let conclusion = self.bank.exists(variable, body);
                let conclusion = self.maybe_canonicalize(conclusion)?;
                Ok(ProofState {
                    assumptions: state.assumptions,
                    conclusion,
                })
            }
            ProofKind::ExistentialElim => {
                let existential = self.operand_state(states, node, 0)?.clone();
                let branch = self.operand_state(states, node, 1)?.clone();
                let (variable, body) = match &*existential.conclusion {
                    Term::Exists(variable, body) => (*variable, body.clone()),
                    _ => {
                        return Err(ProofError::StructuralMismatch {
                            expected: "an existential quantifier",
                        })
                    }
                };
                let witness_variable = self.bank.variable(variable);
                let mut assumptions = existential.assumptions.clone();
                for hypothesis in &branch.assumptions {
                    let discharged = match unifies_parameter(&body, hypothesis, &witness_variable)
                    {
                        Some(parameter) => !branch.conclusion.contains_parameter(parameter),
                        None => false,
                    };
                    if !discharged {
                        insert_assumption(&mut assumptions, hypothesis.clone());
                    }
                }
                Ok(ProofState {
                    assumptions,
                    conclusion: branch.conclusion,
                })
            }
            ProofKind::Parameter(_)
            | ProofKind::ArrayParameter(_)
            | ProofKind::TermParameter(_)
            | ProofKind::FormulaParameter(_) => Err(ProofError::OperandKindMismatch),
        }
    }
}

/// All reachable nodes, roots first, every node before its operands'
/// turn in the reversed traversal (Kahn's algorithm on in-degrees).
fn topological_order(root: &Arc<Proof>) -> Vec<Arc<Proof>> {
    let mut in_degrees: HashMap<usize, (Arc<Proof>, usize)> = HashMap::new();
    let mut stack = vec![root.clone()];
    in_degrees.insert(proof_key(root), (root.clone(), 0));
    while let Some(node) = stack.pop() {
        for operand in node.operands() {
            match in_degrees.get_mut(&proof_key(operand)) {
                Some((_, degree)) => *degree += 1,
                None => {
                    in_degrees.insert(proof_key(operand), (operand.clone(), 1));
                    stack.push(operand.clone());
                }
            }
        }
    }

    let mut ready: Vec<Arc<Proof>> = in_degrees
        .values()
        .filter(|(_, degree)| *degree == 0)
        .map(|(node, _)| node.clone())
        .collect();
    let mut order = vec![];
    while let Some(node) = ready.pop() {
        for operand in node.operands() {
            let entry = in_degrees.get_mut(&proof_key(operand)).unwrap();
            entry.1 -= 1;
            if entry.1 == 0 {
                ready.push(operand.clone());
            }
        }
        order.push(node);
    }
    order
}

struct OrderedStep(Arc<Proof>);

impl PartialEq for OrderedStep {
    fn eq(&self, other: &OrderedStep) -> bool {
        compare_proofs(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for OrderedStep {}

impl PartialOrd for OrderedStep {
    fn partial_cmp(&self, other: &OrderedStep) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedStep {
    fn cmp(&self, other: &OrderedStep) -> Ordering {
        // reversed so the max-heap pops the least step first
        compare_proofs(&other.0, &self.0)
    }
}

/// The canonical ordering of a proof DAG: a topological linearization that
/// always emits the least available step (by the step total order) next.
pub fn canonical_order(root: &Arc<Proof>) -> Vec<Arc<Proof>> {
    let mut in_degrees: HashMap<usize, (Arc<Proof>, usize)> = HashMap::new();
    let mut stack = vec![root.clone()];
    in_degrees.insert(proof_key(root), (root.clone(), 0));
    while let Some(node) = stack.pop() {
        for operand in node.operands() {
            match in_degrees.get_mut(&proof_key(operand)) {
                Some((_, degree)) => *degree += 1,
                None => {
                    in_degrees.insert(proof_key(operand), (operand.clone(), 1));
                    stack.push(operand.clone());
                }
            }
        }
    }

    let mut heap: BinaryHeap<OrderedStep> = in_degrees
        .values()
        .filter(|(_, degree)| *degree == 0)
        .map(|(node, _)| OrderedStep(node.clone()))
        .collect();
    let mut order = vec![];
    while let Some(OrderedStep(node)) = heap.pop() {
        for operand in node.operands() {
            let entry = in_degrees.get_mut(&proof_key(operand)).unwrap();
            entry.1 -= 1;
            if entry.1 == 0 {
                heap.push(OrderedStep(operand.clone()));
            }
        }
        order.push(node);
    }
    order
}

/// A prior over axiom and introduced formulas.
pub trait FormulaPrior {
    fn log_probability(&mut self, formula: &Arc<Term>) -> f64;
}

/// A prior over the parameter chosen by universal introduction, given the
/// currently available parameters.
pub trait ParameterPrior {
    fn clear(&mut self) {}
    fn log_probability(&mut self, parameter: u32, available: &[u32]) -> f64;
}

/// A prior over the term substituted by universal elimination.
pub trait TermPrior {
    fn clear(&mut self) {}
    fn log_probability(&mut self, term: &Arc<Term>) -> f64;
}

/// Uniform over the currently available parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformParameterPrior;

impl ParameterPrior for UniformParameterPrior {
    fn log_probability(&mut self, _parameter: u32, available: &[u32]) -> f64 {
        if available.is_empty() {
            f64::NEG_INFINITY
        } else {
            -(available.len() as f64).ln()
        }
    }
}

fn ln_step(counter: usize) -> f64 {
    if counter == 0 {
        0.0
    } else {
        (counter as f64).ln()
    }
}

/// The factored log-probability of a proof under exchangeable priors.
///
/// Every deduction step pays a `log(1/N_rules)` choice term plus a
/// `log(step_counter)` length term per sub-proof operand; axioms pay the
/// formula prior and publish their parameters; universal introduction pays
/// the parameter prior and consumes its parameter; universal elimination
/// pays the term prior and makes parameter witnesses available.
pub fn log_probability<F, P, T>(
    root: &Arc<Proof>,
    log_stop_probability: f64,
    log_continue_probability: f64,
    formula_prior: &mut F,
    introduction_prior: &mut P,
    elimination_prior: &mut T,
) -> f64
where
    F: FormulaPrior,
    P: ParameterPrior,
    T: TermPrior,
{
    let order = canonical_order(root);
    introduction_prior.clear();
    elimination_prior.clear();

    let log_rule_count = (ND_RULE_COUNT as f64).ln();
    let mut value =
        (order.len() as f64 - 1.0) * log_continue_probability + log_stop_probability;
    let mut counter = 0usize;
    let mut available_parameters: Vec<u32> = vec![];

    for step in &order {
        match &step.kind {
            ProofKind::Parameter(_)
            | ProofKind::ArrayParameter(_)
            | ProofKind::TermParameter(_)
            | ProofKind::FormulaParameter(_) => {}
            ProofKind::Axiom(formula) => {
                counter += 1;
                for parameter in formula.parameters() {
                    if let Err(index) = available_parameters.binary_search(&parameter) {
                        available_parameters.insert(index, parameter);
                    }
                }
                value += formula_prior.log_probability(formula);
            }
            ProofKind::ConjunctionElimLeft | ProofKind::ConjunctionElimRight => {
                value += -log_rule_count - ln_step(counter);
                counter += 1;
            }
            ProofKind::ConjunctionIntro
            | ProofKind::ImplicationIntro
            | ProofKind::ImplicationElim
            | ProofKind::BiconditionalIntro
            | ProofKind::BiconditionalElimLeft
            | ProofKind::BiconditionalElimRight
            | ProofKind::ProofByContradiction
            | ProofKind::NegationElim
            | ProofKind::ExistentialElim => {
                value += -log_rule_count - 2.0 * ln_step(counter);
                counter += 1;
            }
            ProofKind::DisjunctionElim => {
                value += -log_rule_count - 3.0 * ln_step(counter);
                counter += 1;
            }
            ProofKind::DisjunctionIntroLeft | ProofKind::DisjunctionIntroRight => {
                value += -log_rule_count - ln_step(counter);
                counter += 1;
                if let Some(operand) = &step.operands[1] {
                    if let ProofKind::FormulaParameter(formula) = &operand.kind {
                        value += formula_prior.log_probability(formula);
                    }
                }
            }
            ProofKind::ExistentialIntro => {
                value += -log_rule_count - ln_step(counter);
                counter += 1;
            }
            ProofKind::UniversalIntro => {
                counter += 1;
                if let Some(operand) = &step.operands[1] {
                    if let ProofKind::Parameter(parameter) = &operand.kind {
                        value +=
                            introduction_prior.log_probability(*parameter, &available_parameters);
                        if let Ok(index) = available_parameters.binary_search(parameter) {
                            available_parameters.remove(index);
                        }
                    }
                }
            }
            ProofKind::UniversalElim => {
                counter += 1;
                if let Some(operand) = &step.operands[1] {
                    if let ProofKind::TermParameter(term) = &operand.kind {
                        if let Term::Parameter(parameter) = &**term {
                            if let Err(index) = available_parameters.binary_search(parameter) {
                                available_parameters.insert(index, *parameter);
                            }
                        }
                        value += elimination_prior.log_probability(term);
                    }
                }
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with_ab() -> (TermBank, Arc<Term>, Arc<Term>) {
        let mut bank = TermBank::new();
        let a = bank.constant(1);
        let b = bank.constant(2);
        (bank, a, b)
    }

    #[test]
    fn test_implication_elim() {
        // axioms A and A => B; modus ponens concludes B assuming both
        let (mut bank, a, b) = bank_with_ab();
        let implication = bank.if_then(a.clone(), b.clone());
        let axiom_a = Proof::new_axiom(a.clone());
        let axiom_impl = Proof::new_axiom(implication.clone());
        let step = Proof::new_implication_elim(axiom_impl, axiom_a);
        let state = ProofChecker::new(&mut bank).check(&step).unwrap();
        assert_eq!(state.conclusion, b);
        let mut expected = vec![a, implication];
        expected.sort();
        assert_eq!(state.assumptions, expected);
    }

    #[test]
    fn test_implication_intro_discharges() {
        // from axiom A, introduce A => A with no remaining assumptions
        let (mut bank, a, _) = bank_with_ab();
        let axiom = Proof::new_axiom(a.clone());
        let step = Proof::new_implication_intro(axiom.clone(), axiom).unwrap();
        let state = ProofChecker::new(&mut bank).check(&step).unwrap();
        let expected = bank.if_then(a.clone(), a);
        assert_eq!(state.conclusion, expected);
        assert!(state.assumptions.is_empty());
    }

    #[test]
    fn test_implication_intro_requires_axiom_operand() {
        let (_bank, a, b) = bank_with_ab();
        let axiom_a = Proof::new_axiom(a);
        let axiom_b = Proof::new_axiom(b);
        let conj = Proof::new_conjunction_intro(axiom_a.clone(), axiom_b);
        assert!(Proof::new_implication_intro(axiom_a, conj).is_none());
    }

    #[test]
    fn test_conjunction_rules() {
        let (mut bank, a, b) = bank_with_ab();
        let axiom_a = Proof::new_axiom(a.clone());
        let axiom_b = Proof::new_axiom(b.clone());
        let conj = Proof::new_conjunction_intro(axiom_a, axiom_b);
        let left = Proof::new_conjunction_elim_left(conj.clone());
        let right = Proof::new_conjunction_elim_right(conj.clone());
        let mut checker = ProofChecker::new(&mut bank);
        assert_eq!(checker.check(&left).unwrap().conclusion, a);
        assert_eq!(checker.check(&right).unwrap().conclusion, b);
    }

    #[test]
    fn test_conjunction_elim_needs_conjunction() {
        let (mut bank, a, _) = bank_with_ab();
        let axiom = Proof::new_axiom(a);
        let step = Proof::new_conjunction_elim_left(axiom);
        let result = ProofChecker::new(&mut bank).check(&step);
        assert!(matches!(
            result,
            Err(ProofError::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn test_negation_elim_and_contradiction() {
        // assume ~A; from A and ~A derive falsum; discharge ~A to conclude A
        let (mut bank, a, _) = bank_with_ab();
        let not_a = bank.not(a.clone());
        let axiom_a = Proof::new_axiom(a.clone());
        let axiom_not_a = Proof::new_axiom(not_a);
        let falsum = Proof::new_negation_elim(axiom_a, axiom_not_a.clone());
        let step = Proof::new_proof_by_contradiction(falsum, axiom_not_a).unwrap();
        let state = ProofChecker::new(&mut bank).check(&step).unwrap();
        assert_eq!(state.conclusion, a.clone());
        assert_eq!(state.assumptions, vec![a]);
    }

    #[test]
    fn test_universal_intro_and_elim() {
        // from P(#1) conclude ![1]: P($1), then instantiate back at c
        let mut bank = TermBank::new();
        let p0 = bank.parameter(1);
        let p_of_param = bank.atom1(5, p0);
        let axiom = Proof::new_axiom(p_of_param.clone());
        let generalized = Proof::new_universal_intro(axiom, 2);
        // parameter 2 does not occur: generalization binds nothing
        let state = ProofChecker::new(&mut bank).check(&generalized).unwrap();
        match &*state.conclusion {
            Term::ForAll(1, _) => {}
            other => panic!("expected a universal, got {:?}", other),
        }

        let axiom = Proof::new_axiom(p_of_param.clone());
        let generalized = Proof::new_universal_intro(axiom, 1);
        let c = bank.constant(9);
        let instantiated = Proof::new_universal_elim(generalized, c.clone());
        // universal introduction over an assumed parameter escapes
        let result = ProofChecker::new(&mut bank).check(&instantiated);
        assert!(matches!(result, Err(ProofError::ParameterEscapes(1))));
    }

    #[test]
    fn test_universal_elim_substitutes() {
        let mut bank = TermBank::new();
        let x = bank.variable(1);
        let p_of_x = bank.atom1(5, x);
        let forall = bank.for_all(1, p_of_x);
        let axiom = Proof::new_axiom(forall);
        let c = bank.constant(9);
        let step = Proof::new_universal_elim(axiom, c.clone());
        let state = ProofChecker::new(&mut bank).check(&step).unwrap();
        let expected = bank.atom1(5, c);
        assert_eq!(state.conclusion, expected);
    }

    #[test]
    fn test_existential_intro() {
        // P(c) with c abstracted at its occurrence index
        let mut bank = TermBank::new();
        let c = bank.constant(9);
        let p_of_c = bank.atom1(5, c);
        let axiom = Proof::new_axiom(p_of_c.clone());
        // App1 at 0, head at 1, argument at 2
        let step = Proof::new_existential_intro(axiom, vec![2]);
        let state = ProofChecker::new(&mut bank).check(&step).unwrap();
        match &*state.conclusion {
            Term::Exists(_, _) => {}
            other => panic!("expected an existential, got {:?}", other),
        }

        // mismatched occurrence indices fail
        let axiom = Proof::new_axiom(p_of_c);
        let step = Proof::new_existential_intro(axiom, vec![1, 2]);
        let result = ProofChecker::new(&mut bank).check(&step);
        assert!(matches!(
            result,
            Err(ProofError::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn test_disjunction_rules() {
        let (mut bank, a, b) = bank_with_ab();
        let disjunction = bank.or(vec![a.clone(), b.clone()]);
        let axiom_disj = Proof::new_axiom(disjunction);
        // both branches assume their disjunct and conclude it disjoined the
        // same way, through disjunction introduction
        let axiom_a = Proof::new_axiom(a.clone());
        let axiom_b = Proof::new_axiom(b.clone());
        // both branches conclude A | B from their own hypothesis
        let left_branch = Proof::new_disjunction_intro_right(axiom_a, b.clone());
        let right_branch = Proof::new_disjunction_intro_left(axiom_b, a.clone());
        let step = Proof::new_disjunction_elim(axiom_disj, left_branch, right_branch);
        let state = ProofChecker::new(&mut bank).check(&step).unwrap();
        let expected = bank.or(vec![a, b]);
        assert_eq!(state.conclusion, expected);
        assert_eq!(state.assumptions, vec![expected.clone()]);
    }

    #[test]
    fn test_biconditional_rules() {
        let (mut bank, a, b) = bank_with_ab();
        let forward = bank.if_then(a.clone(), b.clone());
        let backward = bank.if_then(b.clone(), a.clone());
        let intro = Proof::new_biconditional_intro(
            Proof::new_axiom(forward.clone()),
            Proof::new_axiom(backward.clone()),
        );
        let state = ProofChecker::new(&mut bank).check(&intro).unwrap();
        let iff = bank.iff(vec![a.clone(), b.clone()]);
        assert_eq!(state.conclusion, iff);

        let axiom_a = Proof::new_axiom(a.clone());
        let elim = Proof::new_biconditional_elim_left(intro, axiom_a);
        let state = ProofChecker::new(&mut bank).check(&elim).unwrap();
        assert_eq!(state.conclusion, b);
    }

    #[test]
    fn test_proof_sharing_registers_children() {
        let (_bank, a, _) = bank_with_ab();
        let axiom = Proof::new_axiom(a);
        let left = Proof::new_conjunction_elim_left(axiom.clone());
        let right = Proof::new_conjunction_elim_right(axiom.clone());
        assert_eq!(axiom.children().len(), 2);
        drop(left);
        assert_eq!(axiom.children().len(), 1);
        drop(right);
    }

    #[test]
    fn test_canonical_order_is_deterministic() {
        let (_bank, a, b) = bank_with_ab();
        let axiom_a = Proof::new_axiom(a);
        let axiom_b = Proof::new_axiom(b);
        let conj = Proof::new_conjunction_intro(axiom_a.clone(), axiom_b.clone());
        let order = canonical_order(&conj);
        assert_eq!(order.len(), 3);
        assert!(matches!(order[0].kind(), ProofKind::ConjunctionIntro));
        // axioms follow in formula order
        match (order[1].kind(), order[2].kind()) {
            (ProofKind::Axiom(first), ProofKind::Axiom(second)) => {
                assert!(first < second);
            }
            _ => panic!("expected axioms after the root"),
        }
    }

    #[test]
    fn test_log_probability_is_finite() {
        struct ConstantPrior;
        impl FormulaPrior for ConstantPrior {
            fn log_probability(&mut self, _formula: &Arc<Term>) -> f64 {
                -1.0
            }
        }
        struct FreeTermPrior;
        impl TermPrior for FreeTermPrior {
            fn log_probability(&mut self, _term: &Arc<Term>) -> f64 {
                -0.5
            }
        }
        let (_bank, a, b) = bank_with_ab();
        let axiom_a = Proof::new_axiom(a);
        let axiom_b = Proof::new_axiom(b);
        let conj = Proof::new_conjunction_intro(axiom_a, axiom_b);
        let value = log_probability(
            &conj,
            (0.1f64).ln(),
            (0.9f64).ln(),
            &mut ConstantPrior,
            &mut UniformParameterPrior,
            &mut FreeTermPrior,
        );
        assert!(value.is_finite());
        assert!(value < 0.0);
    }

    #[test]
    fn test_long_proof_chain_drops_iteratively() {
        let (_bank, a, _) = bank_with_ab();
        let mut proof = Proof::new_axiom(a);
        for _ in 0..100_000 {
            proof = Proof::new_conjunction_elim_left(proof);
        }
        drop(proof);
    }
}
