//! shift - Shift positional parameters
//!
//! shift [n]
//!
//! Shifts positional parameters to the left by n (default 1).
//! $n+1 becomes $1, $n+2 becomes $2, etc.

use crate::interpreter::types::{ExecResult, InterpreterState};

/// Handle the shift builtin command.
pub fn handle_shift(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    let n = match args.first() {
        None => 1,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                return ExecResult::failure(format!(
                    "treesh: shift: {}: numeric argument required\n",
                    arg
                ))
            }
        },
    };

    if n > state.positional.len() {
        return ExecResult::failure("treesh: shift: shift count out of range\n");
    }
    state.positional.drain(..n);
    ExecResult::ok()
}
