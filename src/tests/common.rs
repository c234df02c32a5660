use std::sync::Arc;

use proptest::prelude::*;

use crate::kernel::scope::Canonicalizer;
use crate::kernel::term::{Term, TermBank};
use crate::syntax::parser::parse_term;
use crate::syntax::symbols::SymbolTable;

pub struct Session {
    pub bank: TermBank,
    pub symbols: SymbolTable,
}

impl Session {
    pub fn new() -> Session {
        Session {
            bank: TermBank::new(),
            symbols: SymbolTable::new(),
        }
    }

    pub fn parse(&mut self, input: &str) -> Arc<Term> {
        parse_term(&mut self.bank, &mut self.symbols, input).unwrap()
    }

    pub fn canonicalize(&mut self, input: &str) -> Arc<Term> {
        let term = self.parse(input);
        Canonicalizer::new()
            .canonicalize(&mut self.bank, &term)
            .unwrap()
    }
}

/// Formulas for property tests. Propositional constants, monadic atoms over
/// individuals, the connectives, and well-scoped quantifiers; every binder
/// introduces a fresh source variable so formulas are always well formed.
pub fn arb_formula() -> impl Strategy<Value = Term> {
    arb_formula_at(0, 3)
}

fn arb_formula_at(bound: u32, depth: u32) -> BoxedStrategy<Term> {
    let atom = arb_atom(bound);
    if depth == 0 {
        return atom;
    }
    let sub = arb_formula_at(bound, depth - 1);
    let quantified = arb_formula_at(bound + 1, depth - 1);
    prop_oneof![
        atom,
        sub.clone().prop_map(|t| Term::Not(Arc::new(t))),
        proptest::collection::vec(arb_formula_at(bound, depth - 1), 2..4)
            .prop_map(|ts| Term::And(ts.into_iter().map(Arc::new).collect())),
        proptest::collection::vec(arb_formula_at(bound, depth - 1), 2..4)
            .prop_map(|ts| Term::Or(ts.into_iter().map(Arc::new).collect())),
        (sub.clone(), sub)
            .prop_map(|(a, b)| Term::IfThen(Arc::new(a), Arc::new(b))),
        quantified
            .clone()
            .prop_map(move |t| Term::ForAll(bound + 1, Arc::new(t))),
        quantified.prop_map(move |t| Term::Exists(bound + 1, Arc::new(t))),
    ]
    .boxed()
}

fn arb_atom(bound: u32) -> BoxedStrategy<Term> {
    // propositional constants live below 10, predicates at 10..13, and
    // individual constants at 20..23, so no symbol is used at two types
    let mut options: Vec<BoxedStrategy<Term>> = vec![
        Just(Term::True).boxed(),
        Just(Term::False).boxed(),
        (0u32..3).prop_map(Term::Constant).boxed(),
        ((10u32..13), (20u32..23))
            .prop_map(|(predicate, constant)| {
                Term::App1(
                    Arc::new(Term::Constant(predicate)),
                    Arc::new(Term::Constant(constant)),
                )
            })
            .boxed(),
    ];
    if bound > 0 {
        options.push(
            ((10u32..13), (1u32..=bound))
                .prop_map(|(predicate, variable)| {
                    Term::App1(
                        Arc::new(Term::Constant(predicate)),
                        Arc::new(Term::Variable(variable)),
                    )
                })
                .boxed(),
        );
    }
    proptest::strategy::Union::new(options).boxed()
}
