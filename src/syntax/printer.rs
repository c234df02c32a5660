use std::fmt;

use crate::kernel::term::Term;
use crate::syntax::symbols::SymbolTable;

/// The two supported output syntaxes: the TPTP-like form the reader accepts,
/// and the classic form with logical glyphs and subscripted variables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TermSyntax {
    Tptp,
    Classic,
}

/// Wraps a term for display. Printing the TPTP form of a term and reading it
/// back yields the same term.
pub struct DisplayTerm<'a> {
    term: &'a Term,
    symbols: Option<&'a SymbolTable>,
    syntax: TermSyntax,
}

impl<'a> DisplayTerm<'a> {
    pub fn tptp(term: &'a Term, symbols: Option<&'a SymbolTable>) -> DisplayTerm<'a> {
        DisplayTerm {
            term,
            symbols,
            syntax: TermSyntax::Tptp,
        }
    }

    pub fn classic(term: &'a Term, symbols: Option<&'a SymbolTable>) -> DisplayTerm<'a> {
        DisplayTerm {
            term,
            symbols,
            syntax: TermSyntax::Classic,
        }
    }

    fn with(&self, term: &'a Term) -> DisplayTerm<'a> {
        DisplayTerm {
            term,
            symbols: self.symbols,
            syntax: self.syntax,
        }
    }

    fn write_variable(&self, f: &mut fmt::Formatter, variable: u32) -> fmt::Result {
        match self.syntax {
            TermSyntax::Tptp => write!(f, "${}", variable),
            TermSyntax::Classic => {
                write!(f, "x")?;
                write_subscript(f, variable)
            }
        }
    }

    fn write_parameter(&self, f: &mut fmt::Formatter, parameter: u32) -> fmt::Result {
        match self.syntax {
            TermSyntax::Tptp => write!(f, "#{}", parameter),
            TermSyntax::Classic => {
                write!(f, "a")?;
                write_subscript(f, parameter)
            }
        }
    }

    fn write_constant(&self, f: &mut fmt::Formatter, constant: u32) -> fmt::Result {
        match self.symbols.and_then(|symbols| symbols.name(constant)) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "c{}", constant),
        }
    }

    fn write_list(
        &self,
        f: &mut fmt::Formatter,
        operands: &'a [std::sync::Arc<Term>],
        separator: &str,
    ) -> fmt::Result {
        write!(f, "(")?;
        for (index, operand) in operands.iter().enumerate() {
            if index > 0 {
                write!(f, "{}", separator)?;
            }
            write!(f, "{}", self.with(operand))?;
        }
        write!(f, ")")
    }

    /// Biconditionals print as a right-nested equality chain.
    fn write_iff(
        &self,
        f: &mut fmt::Formatter,
        operands: &'a [std::sync::Arc<Term>],
        equals: &str,
    ) -> fmt::Result {
        for operand in &operands[..operands.len() - 1] {
            write!(f, "({}{}", self.with(operand), equals)?;
        }
        write!(f, "{}", self.with(&operands[operands.len() - 1]))?;
        for _ in 0..operands.len() - 1 {
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn write_subscript(f: &mut fmt::Formatter, number: u32) -> fmt::Result {
    const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    for digit in number.to_string().bytes() {
        write!(f, "{}", DIGITS[(digit - b'0') as usize])?;
    }
    Ok(())
}

impl fmt::Display for DisplayTerm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tptp = self.syntax == TermSyntax::Tptp;
        match self.term {
            Term::Variable(v) => self.write_variable(f, *v),
            Term::Constant(c) => self.write_constant(f, *c),
            Term::Parameter(p) => self.write_parameter(f, *p),
            Term::Integer(i) => write!(f, "{}", i),
            Term::True => write!(f, "{}", if tptp { "T" } else { "⊤" }),
            Term::False => write!(f, "{}", if tptp { "F" } else { "⊥" }),
            Term::Not(operand) => {
                write!(f, "{}", if tptp { "~" } else { "¬" })?;
                write!(f, "{}", self.with(operand))
            }
            Term::And(operands) => {
                self.write_list(f, operands, if tptp { " & " } else { " ∧ " })
            }
            Term::Or(operands) => {
                self.write_list(f, operands, if tptp { " | " } else { " ∨ " })
            }
            Term::Iff(operands) => self.write_iff(f, operands, if tptp { " = " } else { " = " }),
            Term::IfThen(left, right) => {
                write!(
                    f,
                    "({}{}{})",
                    self.with(left),
                    if tptp { " => " } else { " → " },
                    self.with(right)
                )
            }
            Term::Equals(left, right) => {
                write!(f, "({} = {})", self.with(left), self.with(right))
            }
            Term::App1(function, arg) => {
                write!(f, "{}({})", self.with(function), self.with(arg))
            }
            Term::App2(function, arg1, arg2) => {
                write!(
                    f,
                    "{}({},{})",
                    self.with(function),
                    self.with(arg1),
                    self.with(arg2)
                )
            }
            Term::ForAll(v, body) => {
                if tptp {
                    write!(f, "![${}]:{}", v, self.with(body))
                } else {
                    write!(f, "∀")?;
                    write_subscript_variable(f, *v)?;
                    write!(f, "{}", self.with(body))
                }
            }
            Term::Exists(v, body) => {
                if tptp {
                    write!(f, "?[${}]:{}", v, self.with(body))
                } else {
                    write!(f, "∃")?;
                    write_subscript_variable(f, *v)?;
                    write!(f, "{}", self.with(body))
                }
            }
            Term::Lambda(v, body) => {
                if tptp {
                    write!(f, "^[${}]:{}", v, self.with(body))
                } else {
                    write!(f, "λ")?;
                    write_subscript_variable(f, *v)?;
                    write!(f, "{}", self.with(body))
                }
            }
        }
    }
}

fn write_subscript_variable(f: &mut fmt::Formatter, variable: u32) -> fmt::Result {
    write!(f, "x")?;
    write_subscript(f, variable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::term::TermBank;
    use crate::syntax::parser::parse_term;

    #[test]
    fn test_tptp_printing() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        let term = parse_term(&mut bank, &mut symbols, "![x]: (dog(x) => animal(x))").unwrap();
        let printed = DisplayTerm::tptp(&term, Some(&symbols)).to_string();
        assert_eq!(printed, "![$1]:(dog($1) => animal($1))");
    }

    #[test]
    fn test_classic_printing() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        let term = parse_term(&mut bank, &mut symbols, "![x]: ~(p(x) & q)").unwrap();
        let printed = DisplayTerm::classic(&term, Some(&symbols)).to_string();
        assert_eq!(printed, "∀x₁¬(p(x₁) ∧ q)");
    }

    #[test]
    fn test_subscripts_print_in_order() {
        let mut bank = TermBank::new();
        let term = bank.variable(12);
        let printed = DisplayTerm::classic(&term, None).to_string();
        assert_eq!(printed, "x₁₂");
    }

    #[test]
    fn test_unnamed_constants() {
        let mut bank = TermBank::new();
        let term = bank.constant(4);
        let printed = DisplayTerm::tptp(&term, None).to_string();
        assert_eq!(printed, "c4");
    }
}
