//! return - Return from a function with an exit code

use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// Parse a status argument the way `exit` and `return` do: modulo 256.
pub(crate) fn parse_status(arg: &str) -> Option<i32> {
    if arg.is_empty() || !arg.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return None;
    }
    arg.parse::<i64>().ok().map(|n| n.rem_euclid(256) as i32)
}

/// Handle the return builtin command.
///
/// # Returns
/// Ok(ExecResult) for error cases, Err(InterpreterError::Return) for control flow
pub fn handle_return(state: &InterpreterState, args: &[String]) -> Result<ExecResult, InterpreterError> {
    if state.call_depth == 0 {
        return Ok(ExecResult::failure(
            "treesh: return: can only `return' from a function\n",
        ));
    }

    let code = match args.first() {
        None => state.last_exit_code,
        Some(arg) => match parse_status(arg) {
            Some(code) => code,
            None => {
                return Ok(ExecResult::failure_with_code(
                    format!("treesh: return: {}: numeric argument required\n", arg),
                    2,
                ))
            }
        },
    };

    Err(InterpreterError::Return(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_outside_function() {
        let state = InterpreterState::default();
        let result = handle_return(&state, &[]).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("can only `return'"));
    }

    #[test]
    fn test_return_codes() {
        let mut state = InterpreterState::default();
        state.call_depth = 1;
        state.last_exit_code = 7;
        assert!(matches!(handle_return(&state, &[]), Err(InterpreterError::Return(7))));
        assert!(matches!(
            handle_return(&state, &["258".to_string()]),
            Err(InterpreterError::Return(2))
        ));
        assert!(matches!(
            handle_return(&state, &["-1".to_string()]),
            Err(InterpreterError::Return(255))
        ));
        let result = handle_return(&state, &["abc".to_string()]).unwrap();
        assert_eq!(result.exit_code, 2);
    }
}
