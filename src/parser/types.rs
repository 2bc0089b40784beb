//! Parser Types and Constants
//!
//! Shared types and limits used across parser modules.

use std::fmt;
use thiserror::Error;

use crate::ast::types::Prog;

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_INPUT_SIZE: usize = 1_000_000; // 1MB max input
pub const MAX_PARSER_DEPTH: usize = 200; // Max recursion depth for nested constructs

/// A parse failure. `incomplete` distinguishes "more input needed" from a
/// genuine syntax error; the interactive driver branches on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct ParseException {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub incomplete: bool,
}

impl fmt::Display for ParseException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl ParseException {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            incomplete: false,
        }
    }

    /// Input ended while a construct was still open.
    pub fn incomplete(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            incomplete: true,
        }
    }
}

/// Outcome of parsing a possibly partial chunk of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Complete(Prog),
    Incomplete,
    Error(ParseException),
}

impl From<Result<Prog, ParseException>> for ParseOutcome {
    fn from(res: Result<Prog, ParseException>) -> Self {
        match res {
            Ok(prog) => ParseOutcome::Complete(prog),
            Err(e) if e.incomplete => ParseOutcome::Incomplete,
            Err(e) => ParseOutcome::Error(e),
        }
    }
}
