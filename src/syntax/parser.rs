use std::sync::Arc;

use crate::kernel::term::{Term, TermBank};
use crate::kernel::types::Type;
use crate::syntax::lexer::{tokenize, ParseError, Token, TokenKind};
use crate::syntax::symbols::SymbolTable;

/// Reads a formula in the TPTP-like surface syntax.
///
/// Binder lists `![v1,...,vn]:` introduce one quantifier per variable.
/// Identifiers of the form `$n` and `#n` denote variables and parameters
/// directly, `T` and `F` the truth values, and digit sequences integers;
/// every other identifier is a constant interned in the symbol table.
pub fn parse_term(
    bank: &mut TermBank,
    symbols: &mut SymbolTable,
    input: &str,
) -> Result<Arc<Term>, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let term = parser.parse_formula(bank, symbols)?;
    parser.expect_end()?;
    Ok(term)
}

/// Reads a type in the `o`/`i`/`*`/`->` syntax.
pub fn parse_type(input: &str) -> Result<Type, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let parsed = parser.parse_type_inner()?;
    parser.expect_end()?;
    Ok(parsed)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    /// Bound variables in scope, innermost last. Named binders get
    /// stack-position numbers; `$n` binders name their number directly.
    variables: Vec<(Option<String>, u32)>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Parser {
        Parser {
            tokens,
            index: 0,
            variables: vec![],
        }
    }

    fn position(&self) -> (u32, u32) {
        match self.tokens.get(self.index).or_else(|| self.tokens.last()) {
            Some(token) => (token.line, token.column),
            None => (1, 1),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.position();
        ParseError::new(message, line, column)
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.index).map(|token| &token.kind)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.index);
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn consume(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(found) if found == kind => {
                self.index += 1;
                Ok(())
            }
            _ => Err(self.error(format!("expected {}", expected))),
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.index < self.tokens.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(())
    }

    fn parse_formula(
        &mut self,
        bank: &mut TermBank,
        symbols: &mut SymbolTable,
    ) -> Result<Arc<Term>, ParseError> {
        let left = self.parse_operand_sequence(bank, symbols)?;
        match self.peek() {
            Some(TokenKind::IfThen) => {
                self.index += 1;
                let right = self.parse_operand_sequence(bank, symbols)?;
                Ok(bank.if_then(left, right))
            }
            Some(TokenKind::Equals) => {
                self.index += 1;
                let right = self.parse_operand_sequence(bank, symbols)?;
                Ok(bank.equals(left, right))
            }
            _ => Ok(left),
        }
    }

    /// A `&`- or `|`-joined sequence of unary terms; mixing the two at one
    /// level requires parentheses.
    fn parse_operand_sequence(
        &mut self,
        bank: &mut TermBank,
        symbols: &mut SymbolTable,
    ) -> Result<Arc<Term>, ParseError> {
        let first = self.parse_unary(bank, symbols)?;
        match self.peek() {
            Some(TokenKind::And) => {
                let mut operands = vec![first];
                while self.peek() == Some(&TokenKind::And) {
                    self.index += 1;
                    operands.push(self.parse_unary(bank, symbols)?);
                }
                if self.peek() == Some(&TokenKind::Or) {
                    return Err(self.error("mixing '&' and '|' requires parentheses"));
                }
                Ok(bank.and(operands))
            }
            Some(TokenKind::Or) => {
                let mut operands = vec![first];
                while self.peek() == Some(&TokenKind::Or) {
                    self.index += 1;
                    operands.push(self.parse_unary(bank, symbols)?);
                }
                if self.peek() == Some(&TokenKind::And) {
                    return Err(self.error("mixing '&' and '|' requires parentheses"));
                }
                Ok(bank.or(operands))
            }
            _ => Ok(first),
        }
    }

    fn parse_unary(
        &mut self,
        bank: &mut TermBank,
        symbols: &mut SymbolTable,
    ) -> Result<Arc<Term>, ParseError> {
        let mut term = match self.peek().cloned() {
            Some(TokenKind::Not) => {
                self.index += 1;
                let operand = self.parse_unary(bank, symbols)?;
                bank.not(operand)
            }
            Some(TokenKind::LParen) => {
                self.index += 1;
                let inner = self.parse_formula(bank, symbols)?;
                self.consume(&TokenKind::RParen, "a closing parenthesis")?;
                inner
            }
            Some(TokenKind::ForAll) => {
                self.index += 1;
                self.parse_quantifier(bank, symbols, QuantifierKind::ForAll)?
            }
            Some(TokenKind::Exists) => {
                self.index += 1;
                self.parse_quantifier(bank, symbols, QuantifierKind::Exists)?
            }
            Some(TokenKind::Lambda) => {
                self.index += 1;
                self.parse_quantifier(bank, symbols, QuantifierKind::Lambda)?
            }
            Some(TokenKind::Identifier(text)) => {
                self.index += 1;
                self.identifier_term(bank, symbols, &text)?
            }
            _ => return Err(self.error("expected a unary term")),
        };

        // application suffixes: f(a) and f(a, b)
        while self.peek() == Some(&TokenKind::LParen) {
            let (line, column) = self.position();
            self.index += 1;
            let mut args = vec![self.parse_formula(bank, symbols)?];
            while self.peek() == Some(&TokenKind::Comma) {
                self.index += 1;
                args.push(self.parse_formula(bank, symbols)?);
            }
            self.consume(&TokenKind::RParen, "a closing parenthesis after arguments")?;
            term = match args.len() {
                1 => {
                    let arg = args.pop().unwrap();
                    bank.apply(term, arg)
                }
                2 => {
                    let second = args.pop().unwrap();
                    let first = args.pop().unwrap();
                    bank.apply2(term, first, second)
                }
                _ => {
                    return Err(ParseError::new(
                        "applications with arity greater than 2 are unsupported",
                        line,
                        column,
                    ))
                }
            };
        }
        Ok(term)
    }

    fn identifier_term(
        &mut self,
        bank: &mut TermBank,
        symbols: &mut SymbolTable,
        text: &str,
    ) -> Result<Arc<Term>, ParseError> {
        if text == "T" {
            return Ok(bank.tru());
        }
        if text == "F" {
            return Ok(bank.fls());
        }
        if let Some(rest) = text.strip_prefix('$') {
            let variable: u32 = rest
                .parse()
                .map_err(|_| self.error("expected a variable number after '$'"))?;
            return Ok(bank.variable(variable));
        }
        if let Some(rest) = text.strip_prefix('#') {
            let parameter: u32 = rest
                .parse()
                .map_err(|_| self.error("expected a parameter number after '#'"))?;
            return Ok(bank.parameter(parameter));
        }
        if text.chars().all(|c| c.is_ascii_digit()) {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error("integer literal out of range"))?;
            return Ok(bank.integer(value));
        }
        if let Some((_, variable)) = self
            .variables
            .iter()
            .rev()
            .find(|(name, _)| name.as_deref() == Some(text))
        {
            return Ok(bank.variable(*variable));
        }
        Ok(bank.constant(symbols.intern(text)))
    }

    fn parse_quantifier(
        &mut self,
        bank: &mut TermBank,
        symbols: &mut SymbolTable,
        kind: QuantifierKind,
    ) -> Result<Arc<Term>, ParseError> {
        self.consume(&TokenKind::LBracket, "a bracketed list of variables")?;
        let mut declared = vec![];
        loop {
            let text = match self.peek().cloned() {
                Some(TokenKind::Identifier(text)) => {
                    self.index += 1;
                    text
                }
                _ => return Err(self.error("expected a variable name")),
            };
            let variable = if let Some(rest) = text.strip_prefix('$') {
                rest.parse()
                    .map_err(|_| self.error("expected a variable number after '$'"))?
            } else {
                if self
                    .variables
                    .iter()
                    .any(|(name, _)| name.as_deref() == Some(text.as_str()))
                {
                    return Err(self.error(format!("variable '{}' redeclared", text)));
                }
                self.variables.len() as u32 + 1
            };
            let name = if text.starts_with('$') {
                None
            } else {
                Some(text)
            };
            self.variables.push((name, variable));
            declared.push(variable);

            match self.peek() {
                Some(TokenKind::Comma) => {
                    self.index += 1;
                }
                Some(TokenKind::RBracket) => {
                    self.index += 1;
                    break;
                }
                _ => return Err(self.error("expected ',' or ']' in the variable list")),
            }
        }
        self.consume(&TokenKind::Colon, "':' after the variable list")?;
        let mut body = self.parse_unary(bank, symbols)?;
        for &variable in declared.iter().rev() {
            body = match kind {
                QuantifierKind::ForAll => bank.for_all(variable, body),
                QuantifierKind::Exists => bank.exists(variable, body),
                QuantifierKind::Lambda => bank.lambda(variable, body),
            };
        }
        self.variables
            .truncate(self.variables.len() - declared.len());
        Ok(body)
    }

    fn parse_type_inner(&mut self) -> Result<Type, ParseError> {
        let left = self.parse_type_atom()?;
        if self.peek() == Some(&TokenKind::Arrow) {
            self.index += 1;
            let right = self.parse_type_inner()?;
            return Ok(Type::function(left, right));
        }
        Ok(left)
    }

    fn parse_type_atom(&mut self) -> Result<Type, ParseError> {
        match self.next().map(|token| token.kind.clone()) {
            Some(TokenKind::LParen) => {
                let inner = self.parse_type_inner()?;
                self.consume(&TokenKind::RParen, "a closing parenthesis")?;
                Ok(inner)
            }
            Some(TokenKind::Identifier(text)) => match text.as_str() {
                "o" | "𝝄" => Ok(Type::Bool),
                "i" | "𝜾" => Ok(Type::Individual),
                "*" => Ok(Type::Any),
                _ => Err(self.error(format!("unknown type '{}'", text))),
            },
            _ => Err(self.error("expected a type")),
        }
    }
}

#[derive(Clone, Copy)]
enum QuantifierKind {
    ForAll,
    Exists,
    Lambda,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bank: &mut TermBank, symbols: &mut SymbolTable, input: &str) -> Arc<Term> {
        parse_term(bank, symbols, input).unwrap()
    }

    #[test]
    fn test_conjunction_and_application() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        let term = parse(&mut bank, &mut symbols, "dog(rex) & cat(tom)");
        let rex = bank.constant(symbols.get("rex").unwrap());
        let tom = bank.constant(symbols.get("tom").unwrap());
        let dog = bank.atom1(symbols.get("dog").unwrap(), rex);
        let cat = bank.atom1(symbols.get("cat").unwrap(), tom);
        let expected = bank.and(vec![dog, cat]);
        assert_eq!(term, expected);
    }

    #[test]
    fn test_quantifier_binds_variables() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        let term = parse(&mut bank, &mut symbols, "![x,y]: likes(x,y)");
        let x = bank.variable(1);
        let y = bank.variable(2);
        let likes = bank.atom2(symbols.get("likes").unwrap(), x, y);
        let inner = bank.for_all(2, likes);
        let expected = bank.for_all(1, inner);
        assert_eq!(term, expected);
    }

    #[test]
    fn test_binders_nest_and_shadowing_is_rejected() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        assert!(parse_term(&mut bank, &mut symbols, "![x]: ?[x]: p(x)").is_err());
        // reusing a name after the binder closes is fine
        assert!(parse_term(&mut bank, &mut symbols, "(![x]: p(x)) & (?[x]: q(x))").is_ok());
    }

    #[test]
    fn test_implication_and_equality() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        let term = parse(&mut bank, &mut symbols, "p & q => r");
        assert!(matches!(&*term, Term::IfThen(..)));
        let term = parse(&mut bank, &mut symbols, "f(a) = b");
        assert!(matches!(&*term, Term::Equals(..)));
    }

    #[test]
    fn test_arity_limit() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        let error = parse_term(&mut bank, &mut symbols, "f(a, b, c)").unwrap_err();
        assert!(error.message.contains("arity"));
    }

    #[test]
    fn test_truth_values_and_literals() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        assert!(parse(&mut bank, &mut symbols, "T").is_true());
        assert!(parse(&mut bank, &mut symbols, "F").is_false());
        let term = parse(&mut bank, &mut symbols, "42");
        assert_eq!(&*term, &Term::Integer(42));
        let term = parse(&mut bank, &mut symbols, "$3");
        assert_eq!(&*term, &Term::Variable(3));
        let term = parse(&mut bank, &mut symbols, "#7");
        assert_eq!(&*term, &Term::Parameter(7));
    }

    #[test]
    fn test_mixed_connectives_need_parens() {
        let mut bank = TermBank::new();
        let mut symbols = SymbolTable::new();
        assert!(parse_term(&mut bank, &mut symbols, "p & q | r").is_err());
        assert!(parse_term(&mut bank, &mut symbols, "p & (q | r)").is_ok());
    }

    #[test]
    fn test_parse_type() {
        assert_eq!(parse_type("o").unwrap(), Type::Bool);
        assert_eq!(
            parse_type("(i -> o) -> *").unwrap(),
            Type::function(Type::function(Type::Individual, Type::Bool), Type::Any)
        );
    }
}
