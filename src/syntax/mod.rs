pub mod lexer;
pub mod parser;
pub mod printer;
pub mod symbols;

pub use lexer::{tokenize, ParseError, Token, TokenKind};
pub use parser::{parse_term, parse_type};
pub use printer::{DisplayTerm, TermSyntax};
pub use symbols::SymbolTable;
