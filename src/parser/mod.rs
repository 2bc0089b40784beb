//! Parser module for shell scripts
//!
//! This module contains the lexer and parser for shell scripts.

pub mod types;
pub mod lexer;
pub mod word_parser;
pub mod compound_parser;
pub mod parser;
pub mod substitution;

// Re-exports
pub use types::{ParseException, ParseOutcome};
pub use lexer::{Lexeme, LexemeKind, Lexer};
pub use parser::{is_valid_name, parse, parse_incremental, Parser};
