//! treesh - a POSIX-style shell front end
//!
//! This library parses shell source into an AST with a canonical textual
//! rendering, executes it with a tree-walking interpreter, and drives
//! interactive sessions over channel-backed byte pipes.

pub mod ast;
pub mod interactive;
pub mod interpreter;
pub mod parser;
pub mod pipe;
pub mod shell;

pub use ast::types::*;
pub use interactive::{Session, CONTINUATION_PROMPT, PRIMARY_PROMPT};
pub use interpreter::{
    CommandExecutor, ExecResult, ExecutionLimits, ExternalCommand, InterpreterError, OsExecutor,
    Runner, RUNNER_STACK_SIZE,
};
pub use parser::{parse, parse_incremental, ParseException, ParseOutcome, Parser};
pub use pipe::{ChanPipe, PipeError, PipeReader, PipeWriter};
pub use shell::{ConfigError, Shell, ShellConfig, ShellOptions};
