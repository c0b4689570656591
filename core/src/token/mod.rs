mod error;
mod lexer;

pub use error::{ParseError, Position, Span};
pub use lexer::{Lexer, Tok, Token};

#[cfg(test)]
mod token_test;
