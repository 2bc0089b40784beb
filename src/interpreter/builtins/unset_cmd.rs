//! unset - Remove variables/functions builtin
//!
//! Supports:
//! - unset VAR - remove variable, falling back to a function of that name
//! - unset -v VAR - remove variable only
//! - unset -f FUNC - remove function only

use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::parser::is_valid_name;

/// Handle the unset builtin command
pub fn handle_unset(state: &mut InterpreterState, args: &[String]) -> ExecResult {
    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Variable,
        Function,
        Both,
    }

    let mut mode = Mode::Both;
    let mut stderr = String::new();

    for arg in args {
        match arg.as_str() {
            "-v" => {
                mode = Mode::Variable;
                continue;
            }
            "-f" => {
                mode = Mode::Function;
                continue;
            }
            _ => {}
        }

        if mode == Mode::Function {
            state.functions.remove(arg);
            continue;
        }
        if !is_valid_name(arg) {
            stderr.push_str(&format!("treesh: unset: `{}': not a valid identifier\n", arg));
            continue;
        }
        if !state.unset_var(arg) && mode == Mode::Both {
            state.functions.remove(arg);
        }
    }

    if stderr.is_empty() {
        ExecResult::ok()
    } else {
        ExecResult::failure(stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::AST;

    #[test]
    fn test_unset_variable() {
        let mut state = InterpreterState::default();
        state.set_var("x", "1");
        state.export_var("x");
        let result = handle_unset(&mut state, &["x".to_string()]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(state.get_var("x"), None);
        assert!(!state.exported.contains("x"));
    }

    #[test]
    fn test_unset_function() {
        let mut state = InterpreterState::default();
        state.functions.insert("f".to_string(), AST::command(&["true"]));
        handle_unset(&mut state, &["-v".to_string(), "f".to_string()]);
        assert!(state.functions.contains_key("f"));
        handle_unset(&mut state, &["f".to_string()]);
        assert!(!state.functions.contains_key("f"));
    }

    #[test]
    fn test_unset_invalid_name() {
        let mut state = InterpreterState::default();
        let result = handle_unset(&mut state, &["a-b".to_string()]);
        assert_eq!(result.exit_code, 1);
    }
}
