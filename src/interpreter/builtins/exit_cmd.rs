//! exit - Exit shell builtin

use super::return_cmd::parse_status;
use crate::interpreter::types::InterpreterState;

/// Handle the exit builtin command.
///
/// Returns the status the shell exits with and any diagnostic to print
/// before leaving. Without an argument the last status is reused.
pub fn handle_exit(state: &InterpreterState, args: &[String]) -> (i32, String) {
    match args.first() {
        None => (state.last_exit_code, String::new()),
        Some(arg) => match parse_status(arg) {
            Some(code) => (code, String::new()),
            None => (2, format!("treesh: exit: {}: numeric argument required\n", arg)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_no_args() {
        let mut state = InterpreterState::default();
        state.last_exit_code = 42;
        assert_eq!(handle_exit(&state, &[]), (42, String::new()));
    }

    #[test]
    fn test_exit_with_code() {
        let state = InterpreterState::default();
        assert_eq!(handle_exit(&state, &["5".to_string()]).0, 5);
        assert_eq!(handle_exit(&state, &["256".to_string()]).0, 0);
    }

    #[test]
    fn test_exit_invalid() {
        let state = InterpreterState::default();
        let (code, stderr) = handle_exit(&state, &["abc".to_string()]);
        assert_eq!(code, 2);
        assert!(stderr.contains("numeric argument required"));
    }
}
