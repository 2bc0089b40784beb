//! Interpreter Errors
//!
//! Error types used during execution:
//! - break / continue / return / exit: control flow, unwound through the
//!   call stack until the construct that handles them
//! - expansion failures: reported on stderr, recorded as status 1
//! - execution limits and I/O failures: fatal, abort `Runner::run`

use std::fmt;
use std::io;

use thiserror::Error;

/// The type of execution limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Recursion,
    Commands,
    Iterations,
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitType::Recursion => write!(f, "recursion"),
            LimitType::Commands => write!(f, "commands"),
            LimitType::Iterations => write!(f, "iterations"),
        }
    }
}

/// Unified error enum for all interpreter errors.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// `break [n]`, with the number of enclosing loops still to leave
    #[error("break")]
    Break(u32),
    /// `continue [n]`
    #[error("continue")]
    Continue(u32),
    /// `return [n]` out of a function
    #[error("return")]
    Return(i32),
    /// `exit [n]`
    #[error("exit {0}")]
    Exit(i32),
    #[error("{0}")]
    Expansion(String),
    #[error("{0}")]
    Arithmetic(String),
    #[error("{0}: bad substitution")]
    BadSubstitution(String),
    /// Always thrown before Rust's own stack or memory limits kick in.
    #[error("{message}")]
    ExecutionLimit { message: String, limit_type: LimitType },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl InterpreterError {
    /// Exit code reported when a limit stops execution.
    pub const LIMIT_EXIT_CODE: i32 = 126;

    pub fn limit(message: impl Into<String>, limit_type: LimitType) -> Self {
        InterpreterError::ExecutionLimit {
            message: message.into(),
            limit_type,
        }
    }

    /// Errors local to one command: printed and recorded as its status.
    pub fn is_expansion_error(&self) -> bool {
        matches!(
            self,
            InterpreterError::Expansion(_)
                | InterpreterError::Arithmetic(_)
                | InterpreterError::BadSubstitution(_)
        )
    }

    /// The write side of a pipe went away (SIGPIPE analog).
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, InterpreterError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

/// Check if an error is a scope exit error (return, break, continue).
pub fn is_scope_exit_error(error: &InterpreterError) -> bool {
    matches!(
        error,
        InterpreterError::Break(_) | InterpreterError::Continue(_) | InterpreterError::Return(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            InterpreterError::BadSubstitution("${x/}".to_string()).to_string(),
            "${x/}: bad substitution"
        );
        assert_eq!(
            InterpreterError::limit("too many commands", LimitType::Commands).to_string(),
            "too many commands"
        );
    }

    #[test]
    fn test_classification() {
        assert!(InterpreterError::Arithmetic("division by 0".into()).is_expansion_error());
        assert!(!InterpreterError::Exit(0).is_expansion_error());
        assert!(is_scope_exit_error(&InterpreterError::Break(1)));
        assert!(!is_scope_exit_error(&InterpreterError::Exit(1)));

        let err: InterpreterError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert!(err.is_broken_pipe());
    }
}
