//! continue - Skip to next loop iteration builtin

use super::break_cmd::loop_levels;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// Handle the continue builtin command.
pub fn handle_continue(state: &InterpreterState, args: &[String]) -> Result<ExecResult, InterpreterError> {
    if state.loop_depth == 0 {
        return Ok(ExecResult::ok());
    }
    match loop_levels("continue", args) {
        Ok(levels) => Err(InterpreterError::Continue(levels.min(state.loop_depth))),
        Err(result) => Ok(result),
    }
}
