use std::sync::Arc;

use proptest::prelude::*;

use super::common::{arb_formula, Session};
use crate::syntax::parser::{parse_term, parse_type};
use crate::syntax::printer::DisplayTerm;
use crate::syntax::symbols::SymbolTable;

fn round_trips(input: &str) {
    let mut session = Session::new();
    let term = session.parse(input);
    let printed = DisplayTerm::tptp(&term, Some(&session.symbols)).to_string();
    let reparsed = parse_term(&mut session.bank, &mut session.symbols, &printed).unwrap();
    assert!(Arc::ptr_eq(&term, &reparsed), "{} -> {}", input, printed);
}

#[test]
fn test_round_trips() {
    round_trips("T");
    round_trips("dog(rex)");
    round_trips("~(a & b & c)");
    round_trips("(a | b) => (c & d)");
    round_trips("![x]: (dog(x) => animal(x))");
    round_trips("?[x,y]: likes(x,y)");
    round_trips("^[x]: (x = rex)");
    round_trips("f(a) = g(b)");
    round_trips("p(#3) & q($2)");
    round_trips("42");
}

#[test]
fn test_type_round_trips() {
    for input in ["o", "i", "*", "(i -> o)", "((i -> o) -> (i -> i))"] {
        let parsed = parse_type(input).unwrap();
        let printed = parsed.to_string();
        assert_eq!(parse_type(&printed).unwrap(), parsed);
    }
}

#[test]
fn test_parse_errors_carry_positions() {
    let mut bank = crate::kernel::term::TermBank::new();
    let mut symbols = SymbolTable::new();
    let error = parse_term(&mut bank, &mut symbols, "p &").unwrap_err();
    assert_eq!(error.line, 1);
    assert!(error.column >= 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_print_parse_round_trip(formula in arb_formula()) {
        let mut session = Session::new();
        // line the symbol table up with the fallback names the printer uses
        // for unnamed constants
        for id in 0..32 {
            session.symbols.intern(&format!("c{}", id));
        }
        let term = session.bank.intern(formula);
        let printed = DisplayTerm::tptp(&term, None).to_string();
        let reparsed = parse_term(&mut session.bank, &mut session.symbols, &printed);
        prop_assert!(reparsed.is_ok(), "failed to reparse {}", printed);
        prop_assert!(Arc::ptr_eq(&term, &reparsed.unwrap()), "{}", printed);
    }
}
