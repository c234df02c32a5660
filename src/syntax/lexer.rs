use thiserror::Error;

/// A lexical or syntactic failure, with the 1-based source position.
#[derive(Clone, Debug, Error)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> ParseError {
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Colon,
    Semicolon,

    And,
    Or,
    Not,
    /// `->`, the type arrow.
    Arrow,
    /// `=>`
    IfThen,
    Equals,
    ForAll,
    Exists,
    Lambda,

    Identifier(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

struct Scanner {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
}

impl Scanner {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

/// Splits the input into tokens, tracking line and column positions.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut scanner = Scanner {
        chars: input.chars().collect(),
        index: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = vec![];

    while let Some(c) = scanner.peek() {
        if c.is_whitespace() {
            scanner.advance();
            continue;
        }
        let line = scanner.line;
        let column = scanner.column;

        let kind = match c {
            '[' => {
                scanner.advance();
                TokenKind::LBracket
            }
            ']' => {
                scanner.advance();
                TokenKind::RBracket
            }
            '(' => {
                scanner.advance();
                TokenKind::LParen
            }
            ')' => {
                scanner.advance();
                TokenKind::RParen
            }
            ',' => {
                scanner.advance();
                TokenKind::Comma
            }
            ':' => {
                scanner.advance();
                TokenKind::Colon
            }
            ';' => {
                scanner.advance();
                TokenKind::Semicolon
            }
            '&' => {
                scanner.advance();
                TokenKind::And
            }
            '|' => {
                scanner.advance();
                TokenKind::Or
            }
            '~' => {
                scanner.advance();
                TokenKind::Not
            }
            '!' => {
                scanner.advance();
                TokenKind::ForAll
            }
            '?' => {
                scanner.advance();
                TokenKind::Exists
            }
            '^' => {
                scanner.advance();
                TokenKind::Lambda
            }
            '=' => {
                scanner.advance();
                if scanner.peek() == Some('>') {
                    scanner.advance();
                    TokenKind::IfThen
                } else {
                    TokenKind::Equals
                }
            }
            '-' => {
                scanner.advance();
                if scanner.peek() == Some('>') {
                    scanner.advance();
                    TokenKind::Arrow
                } else {
                    return Err(ParseError::new("expected '>' after '-'", line, column));
                }
            }
            '$' | '#' | '*' => {
                let mut text = String::new();
                text.push(c);
                scanner.advance();
                while let Some(next) = scanner.peek() {
                    if is_identifier_char(next) {
                        text.push(next);
                        scanner.advance();
                    } else {
                        break;
                    }
                }
                TokenKind::Identifier(text)
            }
            c if is_identifier_char(c) => {
                let mut text = String::new();
                while let Some(next) = scanner.peek() {
                    if is_identifier_char(next) {
                        text.push(next);
                        scanner.advance();
                    } else {
                        break;
                    }
                }
                TokenKind::Identifier(text)
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", other),
                    line,
                    column,
                ));
            }
        };
        tokens.push(Token { kind, line, column });
    }
    Ok(tokens)
}
