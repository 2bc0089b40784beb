//! Interpreter module
//!
//! This module contains the tree-walking interpreter: the [`Runner`], its
//! state, expansion, builtins, pipelines, jobs and external commands.

pub mod arithmetic;
pub mod builtin_dispatch;
pub mod builtins;
pub mod command_resolution;
pub mod control_flow;
pub mod errors;
pub mod execution_engine;
pub mod functions;
pub mod jobs;
pub mod pattern;
pub mod pipeline_execution;
pub mod redirections;
pub mod stdio;
pub mod subshell_group;
pub mod types;
pub mod word_expansion;

pub use command_resolution::{CommandExecutor, ExternalCommand, OsExecutor, ResolveCommandResult};
pub use errors::{InterpreterError, LimitType};
pub use execution_engine::{Runner, RUNNER_STACK_SIZE};
pub use jobs::{Job, JobTable};
pub use stdio::{CaptureBuffer, InStream, OutStream, Stdio};
pub use types::{ExecResult, ExecutionLimits, InterpreterState};
