//! break - Exit from loops builtin

use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// Parse the optional loop count shared by `break` and `continue`.
pub(crate) fn loop_levels(name: &str, args: &[String]) -> Result<u32, ExecResult> {
    if args.len() > 1 {
        return Err(ExecResult::failure(format!("treesh: {}: too many arguments\n", name)));
    }
    match args.first() {
        None => Ok(1),
        Some(arg) => match arg.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(ExecResult::failure(format!(
                "treesh: {}: {}: loop count out of range\n",
                name, arg
            ))),
        },
    }
}

/// Handle the break builtin command.
///
/// Outside of any loop this is a no-op with status 0.
pub fn handle_break(state: &InterpreterState, args: &[String]) -> Result<ExecResult, InterpreterError> {
    if state.loop_depth == 0 {
        return Ok(ExecResult::ok());
    }
    match loop_levels("break", args) {
        Ok(levels) => Err(InterpreterError::Break(levels.min(state.loop_depth))),
        Err(result) => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_loop() -> InterpreterState {
        let mut state = InterpreterState::default();
        state.loop_depth = 1;
        state
    }

    #[test]
    fn test_break_outside_loop() {
        let state = InterpreterState::default();
        let result = handle_break(&state, &[]).unwrap();
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_break_levels() {
        let mut state = in_loop();
        assert!(matches!(handle_break(&state, &[]), Err(InterpreterError::Break(1))));

        // capped at the number of enclosing loops
        assert!(matches!(
            handle_break(&state, &["3".to_string()]),
            Err(InterpreterError::Break(1))
        ));
        state.loop_depth = 3;
        assert!(matches!(
            handle_break(&state, &["3".to_string()]),
            Err(InterpreterError::Break(3))
        ));
    }

    #[test]
    fn test_break_bad_arguments() {
        let state = in_loop();
        let result = handle_break(&state, &["0".to_string()]).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("loop count out of range"));

        let result = handle_break(&state, &["1".to_string(), "2".to_string()]).unwrap();
        assert!(result.stderr.contains("too many arguments"));
    }
}
