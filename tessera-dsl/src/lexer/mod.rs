//! Lexer module for the column definition mini-language

pub mod token;
pub mod scanner;

pub use token::*;
pub use scanner::*;
